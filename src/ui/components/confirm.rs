use super::KeyResult;
use crate::ui::renderfns::centered_rect;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmEvent {
  Confirmed,
  Declined,
}

/// Yes/no prompt for destructive actions.
#[derive(Debug, Clone, Default)]
pub struct ConfirmPrompt {
  question: Option<String>,
}

impl ConfirmPrompt {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn ask(&mut self, question: impl Into<String>) {
    self.question = Some(question.into());
  }

  pub fn is_active(&self) -> bool {
    self.question.is_some()
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<ConfirmEvent> {
    if self.question.is_none() {
      return KeyResult::NotHandled;
    }
    let event = match key.code {
      KeyCode::Char('y') | KeyCode::Char('Y') => ConfirmEvent::Confirmed,
      KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => ConfirmEvent::Declined,
      _ => return KeyResult::Handled,
    };
    self.question = None;
    KeyResult::Event(event)
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    let Some(question) = &self.question else {
      return;
    };
    let popup = centered_rect(area, 44, 5);
    frame.render_widget(Clear, popup);
    let block = Block::default()
      .title(" Confirm ")
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Red));
    let text = vec![
      Line::raw(question.as_str()),
      Line::styled("y: yes   n: no", Style::default().fg(Color::DarkGray)),
    ];
    frame.render_widget(
      Paragraph::new(text).block(block).wrap(Wrap { trim: true }),
      popup,
    );
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
  fn test_confirm_flow() {
    let mut prompt = ConfirmPrompt::new();
    assert_eq!(prompt.handle_key(key(KeyCode::Char('y'))), KeyResult::NotHandled);

    prompt.ask("Delete?");
    assert_eq!(prompt.handle_key(key(KeyCode::Char('x'))), KeyResult::Handled);
    assert!(prompt.is_active());
    assert_eq!(
      prompt.handle_key(key(KeyCode::Char('y'))),
      KeyResult::Event(ConfirmEvent::Confirmed)
    );
    assert!(!prompt.is_active());

    prompt.ask("Delete?");
    assert_eq!(
      prompt.handle_key(key(KeyCode::Esc)),
      KeyResult::Event(ConfirmEvent::Declined)
    );
  }
}
