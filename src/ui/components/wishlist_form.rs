use super::input::TextInput;
use super::KeyResult;
use crate::ui::renderfns::centered_rect;
use crate::wishlist::{WishlistForm, ICONS};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

/// Events emitted by a form popup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent<T> {
  Submitted(T),
  Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Field {
  #[default]
  Name,
  Icon,
}

/// Popup for creating a wishlist: a name and an icon from the fixed set.
#[derive(Debug, Clone, Default)]
pub struct WishlistFormPopup {
  name: TextInput,
  icon: usize,
  field: Field,
  open: bool,
  saving: bool,
}

impl WishlistFormPopup {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_open(&self) -> bool {
    self.open
  }

  pub fn open(&mut self) {
    self.open = true;
  }

  /// Close and clear every field.
  pub fn reset(&mut self) {
    *self = Self::default();
  }

  /// Show the form as busy while the insert runs.
  pub fn set_saving(&mut self, saving: bool) {
    self.saving = saving;
  }

  pub fn form(&self) -> WishlistForm {
    WishlistForm {
      name: self.name.value().to_string(),
      icon: ICONS[self.icon % ICONS.len()].to_string(),
    }
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<FormEvent<WishlistForm>> {
    if !self.open {
      return KeyResult::NotHandled;
    }
    if self.saving {
      return KeyResult::Handled;
    }

    match key.code {
      KeyCode::Esc => {
        self.open = false;
        return KeyResult::Event(FormEvent::Cancelled);
      }
      KeyCode::Enter => return KeyResult::Event(FormEvent::Submitted(self.form())),
      KeyCode::Tab | KeyCode::BackTab => {
        self.field = match self.field {
          Field::Name => Field::Icon,
          Field::Icon => Field::Name,
        };
        return KeyResult::Handled;
      }
      _ => {}
    }

    match self.field {
      Field::Name => {
        self.name.handle_key(key);
      }
      Field::Icon => match key.code {
        KeyCode::Right | KeyCode::Char('l') => self.icon = (self.icon + 1) % ICONS.len(),
        KeyCode::Left | KeyCode::Char('h') => {
          self.icon = (self.icon + ICONS.len() - 1) % ICONS.len()
        }
        _ => {}
      },
    }
    KeyResult::Handled
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.open {
      return;
    }
    let popup = centered_rect(area, 48, 8);
    frame.render_widget(Clear, popup);

    let title = if self.saving {
      " New wishlist (saving...) "
    } else {
      " New wishlist "
    };
    let block = Block::default()
      .title(title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow));

    let label = |field: Field, text: &'static str| {
      let style = if self.field == field {
        Style::default().fg(Color::Yellow).bold()
      } else {
        Style::default().fg(Color::DarkGray)
      };
      Span::styled(text, style)
    };

    let (before, after) = self.name.split_at_cursor();
    let mut name_line = vec![label(Field::Name, "Name  "), Span::raw(before)];
    if self.field == Field::Name {
      name_line.push(Span::styled("_", Style::default().fg(Color::Yellow)));
    }
    name_line.push(Span::raw(after));

    let mut icon_line = vec![label(Field::Icon, "Icon  ")];
    for (i, icon) in ICONS.iter().enumerate() {
      let style = if i == self.icon {
        Style::default().bg(Color::DarkGray)
      } else {
        Style::default()
      };
      icon_line.push(Span::styled(format!(" {} ", icon), style));
    }

    let lines = vec![
      Line::from(name_line),
      Line::raw(""),
      Line::from(icon_line),
      Line::raw(""),
      Line::styled(
        "Tab: next field  ←/→: icon  Enter: create  Esc: cancel",
        Style::default().fg(Color::DarkGray),
      ),
    ];
    frame.render_widget(Paragraph::new(lines).block(block), popup);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  #[test]
  fn test_closed_form_ignores_keys() {
    let mut popup = WishlistFormPopup::new();
    assert_eq!(popup.handle_key(key(KeyCode::Enter)), KeyResult::NotHandled);
  }

  #[test]
  fn test_fill_and_submit() {
    let mut popup = WishlistFormPopup::new();
    popup.open();
    for c in "Kitchen".chars() {
      popup.handle_key(key(KeyCode::Char(c)));
    }
    popup.handle_key(key(KeyCode::Tab));
    popup.handle_key(key(KeyCode::Right));

    let expected = WishlistForm {
      name: "Kitchen".to_string(),
      icon: "🍳".to_string(),
    };
    assert_eq!(
      popup.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(FormEvent::Submitted(expected))
    );
    // Submitting leaves the form open until the parent resets it.
    assert!(popup.is_open());
  }

  #[test]
  fn test_icon_wraps_left() {
    let mut popup = WishlistFormPopup::new();
    popup.open();
    popup.handle_key(key(KeyCode::Tab));
    popup.handle_key(key(KeyCode::Left));
    assert_eq!(popup.form().icon, ICONS[ICONS.len() - 1]);
  }

  #[test]
  fn test_saving_blocks_input_and_reset_clears() {
    let mut popup = WishlistFormPopup::new();
    popup.open();
    popup.handle_key(key(KeyCode::Char('a')));
    popup.set_saving(true);
    popup.handle_key(key(KeyCode::Char('b')));
    assert_eq!(popup.form().name, "a");

    popup.reset();
    assert!(!popup.is_open());
    assert!(popup.form().name.is_empty());
  }
}
