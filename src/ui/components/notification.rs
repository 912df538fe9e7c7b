use std::time::{Duration, Instant};

use ratatui::prelude::*;

const TTL: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
  Success,
  Error,
}

/// Transient message shown in the footer.
#[derive(Debug, Clone)]
pub struct Notification {
  pub message: String,
  pub kind: NotificationKind,
  shown_at: Instant,
}

impl Notification {
  pub fn success(message: impl Into<String>) -> Self {
    Self::new(message.into(), NotificationKind::Success)
  }

  pub fn error(message: impl Into<String>) -> Self {
    Self::new(message.into(), NotificationKind::Error)
  }

  fn new(message: String, kind: NotificationKind) -> Self {
    Self {
      message,
      kind,
      shown_at: Instant::now(),
    }
  }

  pub fn is_expired(&self, now: Instant) -> bool {
    now.duration_since(self.shown_at) >= TTL
  }

  pub fn span(&self) -> Span<'_> {
    let color = match self.kind {
      NotificationKind::Success => Color::Green,
      NotificationKind::Error => Color::Red,
    };
    Span::styled(self.message.as_str(), Style::default().fg(color).bold())
  }
}
