use crate::wishlist::Priority;
use ratatui::prelude::{Color, Rect};

/// Truncate a string to at most `max_len` characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Display color for a product priority
pub fn priority_color(priority: Option<Priority>) -> Color {
  match priority {
    Some(Priority::High) => Color::Red,
    Some(Priority::Medium) => Color::Yellow,
    Some(Priority::Low) => Color::Green,
    None => Color::DarkGray,
  }
}

/// Rect of at most `width` x `height` centered in `area`
pub fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
  let width = width.min(area.width);
  let height = height.min(area.height);
  Rect {
    x: area.x + (area.width - width) / 2,
    y: area.y + (area.height - height) / 2,
    width,
    height,
  }
}

/// Text progress bar for a percentage in `0.0..=100.0`
pub fn progress_bar(percent: f64, width: usize) -> String {
  let filled = ((percent.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
  let filled = filled.min(width);
  format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

/// Parse a `#rrggbb` card color
pub fn hex_color(hex: &str) -> Option<Color> {
  let hex = hex.strip_prefix('#')?;
  if hex.len() != 6 {
    return None;
  }
  let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
  Some(Color::Rgb(channel(0)?, channel(2)?, channel(4)?))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("hello", 10), "hello");
    assert_eq!(truncate("hello", 5), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_counts_chars() {
    assert_eq!(truncate("Panela de pressão", 17), "Panela de pressão");
    assert_eq!(truncate("açaí açaí", 7), "açaí...");
  }

  #[test]
  fn test_priority_color() {
    assert_eq!(priority_color(Some(Priority::High)), Color::Red);
    assert_eq!(priority_color(Some(Priority::Medium)), Color::Yellow);
    assert_eq!(priority_color(Some(Priority::Low)), Color::Green);
    assert_eq!(priority_color(None), Color::DarkGray);
  }

  #[test]
  fn test_centered_rect_clamps() {
    let area = Rect::new(0, 0, 100, 40);
    assert_eq!(centered_rect(area, 40, 10), Rect::new(30, 15, 40, 10));

    let small = Rect::new(2, 1, 20, 5);
    assert_eq!(centered_rect(small, 40, 10), small);
  }

  #[test]
  fn test_progress_bar() {
    assert_eq!(progress_bar(0.0, 4), "░░░░");
    assert_eq!(progress_bar(50.0, 4), "██░░");
    assert_eq!(progress_bar(100.0, 4), "████");
    assert_eq!(progress_bar(250.0, 4), "████");
  }

  #[test]
  fn test_hex_color() {
    assert_eq!(hex_color("#ffd977"), Some(Color::Rgb(0xff, 0xd9, 0x77)));
    assert_eq!(hex_color("ffd977"), None);
    assert_eq!(hex_color("#fff"), None);
  }
}
