//! Available commands, autocomplete and command-line parsing.

use crate::routes::{Route, RouteError};

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "wishlists",
    aliases: &["w", "home"],
    description: "Browse wishlists",
  },
  Command {
    name: "list",
    aliases: &["l", "products"],
    description: "All products by priority",
  },
  Command {
    name: "open",
    aliases: &["o", "go"],
    description: "Open a route (/, /list, /wishlist/<id>)",
  },
  Command {
    name: "refresh",
    aliases: &["r", "reload"],
    description: "Clear the cache and reload",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit wishlist",
  },
];

/// A submitted command line, resolved against the command table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
  Navigate(Route),
  Refresh,
  Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
  #[error("unknown command: {0}")]
  Unknown(String),
  #[error("usage: open <route>")]
  MissingRoute,
  #[error(transparent)]
  Route(#[from] RouteError),
}

/// Parse a command line such as `list` or `open /wishlist/<id>`.
pub fn parse(line: &str) -> Result<Action, CommandError> {
  let line = line.trim();
  let (name, args) = match line.split_once(char::is_whitespace) {
    Some((name, args)) => (name, args.trim()),
    None => (line, ""),
  };
  let name = name.to_lowercase();
  let command = COMMANDS
    .iter()
    .find(|c| c.name == name || c.aliases.contains(&name.as_str()))
    .ok_or_else(|| CommandError::Unknown(name.clone()))?;

  match command.name {
    "wishlists" => Ok(Action::Navigate(Route::Home)),
    "list" => Ok(Action::Navigate(Route::Products)),
    "open" if args.is_empty() => Err(CommandError::MissingRoute),
    "open" => Ok(Action::Navigate(args.parse()?)),
    "refresh" => Ok(Action::Refresh),
    _ => Ok(Action::Quit),
  }
}

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input.to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = Vec::new();

  for cmd in COMMANDS {
    // Exact match on name
    if cmd.name == input_lower {
      matches.push((cmd, 0)); // Highest priority
      continue;
    }

    // Exact match on alias
    if cmd.aliases.contains(&input_lower.as_str()) {
      matches.push((cmd, 1));
      continue;
    }

    // Prefix match on name
    if cmd.name.starts_with(&input_lower) {
      matches.push((cmd, 2));
      continue;
    }

    // Prefix match on alias
    if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      matches.push((cmd, 3));
      continue;
    }

    // Fuzzy match (contains)
    if cmd.name.contains(&input_lower) {
      matches.push((cmd, 4));
      continue;
    }

    // Fuzzy match on alias
    if cmd.aliases.iter().any(|a| a.contains(&input_lower)) {
      matches.push((cmd, 5));
    }
  }

  // Sort by priority
  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_input_returns_all() {
    let suggestions = get_suggestions("");
    assert_eq!(suggestions.len(), COMMANDS.len());
  }

  #[test]
  fn test_exact_match() {
    let suggestions = get_suggestions("list");
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "list");
  }

  #[test]
  fn test_alias_match() {
    let suggestions = get_suggestions("w");
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "wishlists");
  }

  #[test]
  fn test_prefix_match() {
    let suggestions = get_suggestions("wish");
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "wishlists");
  }

  #[test]
  fn test_fuzzy_match() {
    let suggestions = get_suggestions("fres");
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "refresh");
  }

  #[test]
  fn test_parse_navigation() {
    assert_eq!(parse("wishlists"), Ok(Action::Navigate(Route::Home)));
    assert_eq!(parse(" L "), Ok(Action::Navigate(Route::Products)));
    assert_eq!(
      parse("open /wishlist/AbC"),
      Ok(Action::Navigate(Route::Wishlist {
        id: "AbC".to_string()
      }))
    );
  }

  #[test]
  fn test_parse_errors() {
    assert_eq!(parse("open"), Err(CommandError::MissingRoute));
    assert!(matches!(parse("open /nope"), Err(CommandError::Route(_))));
    assert_eq!(
      parse("checkout"),
      Err(CommandError::Unknown("checkout".to_string()))
    );
  }

  #[test]
  fn test_parse_quit_and_refresh() {
    assert_eq!(parse("q"), Ok(Action::Quit));
    assert_eq!(parse("refresh"), Ok(Action::Refresh));
  }
}
