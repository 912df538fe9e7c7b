use super::input::TextInput;
use super::wishlist_form::FormEvent;
use super::KeyResult;
use crate::ui::renderfns::{centered_rect, priority_color};
use crate::wishlist::{Priority, ProductForm};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Field {
  #[default]
  Name,
  Priority,
}

/// Popup for adding a product to a wishlist: a name and a priority.
#[derive(Debug, Clone, Default)]
pub struct ProductFormPopup {
  name: TextInput,
  priority: Priority,
  field: Field,
  open: bool,
  saving: bool,
}

impl ProductFormPopup {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_open(&self) -> bool {
    self.open
  }

  pub fn open(&mut self) {
    self.open = true;
  }

  pub fn reset(&mut self) {
    *self = Self::default();
  }

  pub fn set_saving(&mut self, saving: bool) {
    self.saving = saving;
  }

  pub fn form(&self) -> ProductForm {
    ProductForm {
      name: self.name.value().to_string(),
      priority: self.priority,
    }
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<FormEvent<ProductForm>> {
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
          Field::Name => Field::Priority,
          Field::Priority => Field::Name,
        };
        return KeyResult::Handled;
      }
      _ => {}
    }

    match self.field {
      Field::Name => {
        self.name.handle_key(key);
      }
      Field::Priority => match key.code {
        KeyCode::Right | KeyCode::Char('l') | KeyCode::Char(' ') => {
          self.priority = self.priority.next()
        }
        KeyCode::Left | KeyCode::Char('h') => self.priority = self.priority.prev(),
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
      " Add product (saving...) "
    } else {
      " Add product "
    };
    let block = Block::default()
      .title(title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow));

    let label_style = |field: Field| {
      if self.field == field {
        Style::default().fg(Color::Yellow).bold()
      } else {
        Style::default().fg(Color::DarkGray)
      }
    };

    let (before, after) = self.name.split_at_cursor();
    let mut name_line = vec![
      Span::styled("Name      ", label_style(Field::Name)),
      Span::raw(before),
    ];
    if self.field == Field::Name {
      name_line.push(Span::styled("_", Style::default().fg(Color::Yellow)));
    }
    name_line.push(Span::raw(after));

    let mut priority_line = vec![Span::styled("Priority  ", label_style(Field::Priority))];
    for p in Priority::ALL {
      let style = if p == self.priority {
        Style::default().fg(Color::Black).bg(priority_color(Some(p)))
      } else {
        Style::default().fg(priority_color(Some(p)))
      };
      priority_line.push(Span::styled(format!(" {} ", p), style));
      priority_line.push(Span::raw(" "));
    }

    let lines = vec![
      Line::from(name_line),
      Line::raw(""),
      Line::from(priority_line),
      Line::raw(""),
      Line::styled(
        "Tab: next field  ←/→: priority  Enter: add  Esc: cancel",
        Style::default().fg(Color::DarkGray),
      ),
    ];
    frame.render_widget(Paragraph::new(lines).block(block), popup);
  }
}
