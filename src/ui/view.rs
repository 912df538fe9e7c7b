use crossterm::event::KeyEvent;
use ratatui::prelude::*;

use chrono::{DateTime, Utc};

use crate::cache::CacheSource;
use crate::routes::Route;
use crate::ui::components::Notification;

/// A keyboard shortcut hint for display in the header
#[derive(Debug, Clone)]
pub struct ShortcutInfo {
  pub key: &'static str,
  pub label: &'static str,
  pub priority: u8, // Lower = shown first
}

impl ShortcutInfo {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

pub type Shortcut = ShortcutInfo;

/// Actions that a view can request in response to user input
pub enum ViewAction {
  /// No action needed
  None,
  /// Push a new view onto the stack
  Push(Box<dyn View>),
  /// Pop current view from stack (go back)
  Pop,
}

/// Trait for view behavior
///
/// Views handle their own input modes (forms, confirmations) and return
/// actions for the App to execute. This creates a clean delegation chain:
/// App → View → Components
///
/// Views that load data asynchronously use Query<T> internally and poll it
/// in `tick()`; writes use Mutation<T> the same way.
pub trait View {
  /// Handle a key event, returning an action for App to execute
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  /// Render the view to the frame
  fn render(&mut self, frame: &mut Frame, area: Rect);

  /// Get the breadcrumb label for this view
  fn breadcrumb_label(&self) -> String;

  /// Route this view is reachable at
  fn route(&self) -> Route;

  /// Where the data on screen came from and when it was cached, once loaded
  fn data_source(&self) -> Option<(CacheSource, Option<DateTime<Utc>>)> {
    None
  }

  /// True while a form or prompt owns the keyboard
  fn captures_input(&self) -> bool {
    false
  }

  /// Called on each tick to poll async queries and mutations
  fn tick(&mut self) -> ViewAction {
    ViewAction::None
  }

  /// Called when the view becomes top of the stack again after a pop
  fn on_resume(&mut self) {}

  /// Re-request data after the cache was cleared
  fn reload(&mut self) {}

  /// Take a pending notification for the footer, if any
  fn take_notification(&mut self) -> Option<Notification> {
    None
  }

  /// Get keyboard shortcuts to display in the header
  /// Override this to provide view-specific shortcuts
  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("q", "back").with_priority(30),
    ]
  }
}
