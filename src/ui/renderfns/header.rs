use crate::cache::CacheSource;
use chrono::{DateTime, Local, Utc};
use crate::routes::Route;
use crate::ui::view::ShortcutInfo;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the header bar with title, route, data source and shortcuts
pub fn draw_header(
  frame: &mut Frame,
  area: Rect,
  title: &str,
  route: &Route,
  source: Option<(CacheSource, Option<DateTime<Utc>>)>,
  shortcuts: &[ShortcutInfo],
) {
  let mut spans = vec![
    Span::styled(format!(" {} ", title), Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", route), Style::default().fg(Color::Yellow).bold()),
  ];

  if let Some((source, cached_at)) = source {
    if let Some(label) = source_label(source, cached_at) {
      let color = if source.is_offline() {
        Color::Red
      } else {
        Color::DarkGray
      };
      spans.push(Span::styled("│", Style::default().fg(Color::DarkGray)));
      spans.push(Span::styled(format!(" {} ", label), Style::default().fg(color)));
    }
  }

  spans.push(Span::raw("  "));

  let mut sorted: Vec<&ShortcutInfo> = shortcuts.iter().collect();
  sorted.sort_by_key(|s| s.priority);
  for (i, shortcut) in sorted.iter().enumerate() {
    if i > 0 {
      spans.push(Span::raw("   "));
    }
    // Keys and brackets highlighted, descriptions dimmed
    spans.push(Span::styled(
      format!("<{}>", shortcut.key),
      Style::default().fg(Color::Cyan),
    ));
    spans.push(Span::styled(
      format!(" {}", shortcut.label),
      Style::default().fg(Color::DarkGray),
    ));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}

fn source_label(source: CacheSource, cached_at: Option<DateTime<Utc>>) -> Option<String> {
  let label = match source {
    CacheSource::Network => return None,
    CacheSource::CacheFresh => "cached",
    CacheSource::Offline => "offline",
  };
  Some(match cached_at {
    Some(at) => format!("{} {}", label, at.with_timezone(&Local).format("%H:%M")),
    None => label.to_string(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_source_label() {
    let now = Utc::now();
    assert_eq!(source_label(CacheSource::Network, None), None);
    assert_eq!(
      source_label(CacheSource::CacheFresh, None).as_deref(),
      Some("cached")
    );
    let stamp = now.with_timezone(&Local).format("%H:%M").to_string();
    assert_eq!(
      source_label(CacheSource::Offline, Some(now)),
      Some(format!("offline {}", stamp))
    );
  }
}
