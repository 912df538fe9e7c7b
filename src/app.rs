use crate::commands::{self, Action};
use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::routes::Route;
use crate::ui;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult, Notification};
use crate::ui::view::{View, ViewAction};
use crate::ui::views;
use crate::wishlist::WishlistClient;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Main application state
pub struct App {
  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,

  /// Command line overlay (after pressing :)
  command: CommandInput,

  /// Latest message for the footer
  notification: Option<Notification>,

  title: String,
  client: WishlistClient,
  should_quit: bool,
}

impl App {
  pub fn new(config: &Config, client: WishlistClient, route: &Route) -> Self {
    info!(route = %route, "starting");
    Self {
      view_stack: vec![views::for_route(route, client.clone())],
      command: CommandInput::new(),
      notification: None,
      title: config.title().to_string(),
      client,
      should_quit: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let result = self.event_loop().await;

    // Cleanup terminal, even when the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop(&mut self) -> Result<()> {
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    let mut events = EventHandler::new(Duration::from_millis(250));

    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(event) => self.handle_event(event),
        None => break,
      }
    }
    Ok(())
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => self.tick(),
      // The next draw picks up the new size
      Event::Resize => {}
    }
  }

  fn tick(&mut self) {
    let action = match self.view_stack.last_mut() {
      Some(view) => view.tick(),
      None => ViewAction::None,
    };
    self.collect_notification();
    self.apply(action);

    if self
      .notification
      .as_ref()
      .is_some_and(|n| n.is_expired(Instant::now()))
    {
      self.notification = None;
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    let captured = self
      .view_stack
      .last()
      .is_some_and(|view| view.captures_input());
    if !captured {
      match self.command.handle_key(key) {
        KeyResult::Handled | KeyResult::Event(CommandEvent::Cancelled) => return,
        KeyResult::Event(CommandEvent::Submitted(line)) => {
          self.execute(&line);
          return;
        }
        KeyResult::NotHandled => {}
      }
    }

    let action = match self.view_stack.last_mut() {
      Some(view) => view.handle_key(key),
      None => ViewAction::None,
    };
    self.collect_notification();
    self.apply(action);
  }

  fn execute(&mut self, line: &str) {
    match commands::parse(line) {
      Ok(Action::Navigate(route)) => {
        info!(route = %route, "navigating");
        self.view_stack = vec![views::for_route(&route, self.client.clone())];
      }
      Ok(Action::Refresh) => {
        if let Err(e) = self.client.clear_cache() {
          warn!(error = %e, "failed to clear cache");
          self.notification = Some(Notification::error("Failed to clear the cache."));
          return;
        }
        if let Some(view) = self.view_stack.last_mut() {
          view.reload();
        }
        self.notification = Some(Notification::success("Cache cleared"));
      }
      Ok(Action::Quit) => self.should_quit = true,
      Err(e) => self.notification = Some(Notification::error(e.to_string())),
    }
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => self.view_stack.push(view),
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
          if let Some(view) = self.view_stack.last_mut() {
            view.on_resume();
          }
        } else {
          self.should_quit = true;
        }
      }
    }
  }

  fn collect_notification(&mut self) {
    if let Some(n) = self
      .view_stack
      .last_mut()
      .and_then(|view| view.take_notification())
    {
      self.notification = Some(n);
    }
  }

  // Accessors for UI rendering
  pub fn current_view_mut(&mut self) -> Option<&mut Box<dyn View>> {
    self.view_stack.last_mut()
  }

  pub fn title(&self) -> &str {
    &self.title
  }

  pub fn breadcrumb(&self) -> Vec<String> {
    self
      .view_stack
      .iter()
      .map(|v| v.breadcrumb_label())
      .collect()
  }

  pub fn notification(&self) -> Option<&Notification> {
    self.notification.as_ref()
  }

  pub fn command_input(&self) -> &CommandInput {
    &self.command
  }

  #[cfg(test)]
  fn routes(&self) -> Vec<Route> {
    self.view_stack.iter().map(|v| v.route()).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{AnyStorage, CacheLayer, MemoryStorage};
  use crate::store::MemoryStore;
  use std::sync::Arc;

  fn test_app(route: Route) -> App {
    let client = WishlistClient::new(
      Arc::new(MemoryStore::with_sample_data()),
      CacheLayer::new(AnyStorage::Memory(MemoryStorage::new())),
    );
    App::new(&Config::default(), client, &route)
  }

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn type_command(app: &mut App, line: &str) {
    app.handle_key(key(KeyCode::Char(':')));
    for c in line.chars() {
      app.handle_key(key(KeyCode::Char(c)));
    }
    app.handle_key(key(KeyCode::Enter));
  }

  #[tokio::test]
  async fn test_command_navigates_and_replaces_stack() {
    let mut app = test_app(Route::Home);
    app.handle_key(key(KeyCode::Char('l')));
    assert_eq!(app.routes(), vec![Route::Home, Route::Products]);

    type_command(&mut app, "open /wishlist/abc");
    assert_eq!(
      app.routes(),
      vec![Route::Wishlist {
        id: "abc".to_string()
      }]
    );
    assert_eq!(app.title(), "Wishlist");
  }

  #[tokio::test]
  async fn test_unknown_command_notifies() {
    let mut app = test_app(Route::Products);
    type_command(&mut app, "bogus");
    let n = app.notification().map(|n| n.message.clone());
    assert_eq!(n.as_deref(), Some("unknown command: bogus"));
    assert_eq!(app.routes(), vec![Route::Products]);
  }

  #[tokio::test]
  async fn test_back_pops_then_quits() {
    let mut app = test_app(Route::Home);
    app.handle_key(key(KeyCode::Char('l')));
    app.handle_key(key(KeyCode::Char('q')));
    assert_eq!(app.routes(), vec![Route::Home]);
    assert!(!app.should_quit);

    app.handle_key(key(KeyCode::Esc));
    assert!(app.should_quit);
  }

  #[tokio::test]
  async fn test_quit_command_and_ctrl_c() {
    let mut app = test_app(Route::Home);
    type_command(&mut app, "quit");
    assert!(app.should_quit);

    let mut app = test_app(Route::Home);
    app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
    assert!(app.should_quit);
  }

  #[tokio::test]
  async fn test_open_form_captures_command_key() {
    let mut app = test_app(Route::Home);
    app.handle_key(key(KeyCode::Char('n')));
    app.handle_key(key(KeyCode::Char(':')));
    assert!(!app.command_input().is_active());
  }
}
