use chrono::{DateTime, Utc};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use super::utils::format_age;
use crate::ui::view::ShortcutInfo;

/// Context shown on the left of the header
pub struct HeaderInfo<'a> {
  pub title: &'a str,
  pub store: &'a str,
  pub cached_at: Option<DateTime<Utc>>,
}

/// Draw the header bar: title, store, cache age and the view's shortcuts
pub fn draw_header(frame: &mut Frame, area: Rect, info: &HeaderInfo, shortcuts: &[ShortcutInfo]) {
  let separator = || Span::styled("│", Style::default().fg(Color::DarkGray));

  let cache = match info.cached_at {
    Some(at) => format!(" cached {} ", format_age(Utc::now() - at)),
    None => " not loaded ".to_string(),
  };

  let mut spans = vec![
    Span::styled(format!(" {} ", info.title), Style::default().fg(Color::Green).bold()),
    separator(),
    Span::styled(format!(" {} ", info.store), Style::default().fg(Color::White)),
    separator(),
    Span::styled(cache, Style::default().fg(Color::Yellow)),
    Span::raw(" "),
  ];

  let mut shortcuts = shortcuts.to_vec();
  shortcuts.sort_by_key(|s| s.priority);
  for shortcut in shortcuts {
    spans.push(Span::styled(format!("<{}>", shortcut.key), Style::default().fg(Color::Cyan)));
    spans.push(Span::styled(
      format!(" {}  ", shortcut.label),
      Style::default().fg(Color::DarkGray),
    ));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}
