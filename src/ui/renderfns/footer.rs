use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// A one-line message for the footer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusMessage {
  Info(String),
  Error(String),
}

/// Draw the footer: view breadcrumb on the left, latest status message on
/// the right
pub fn draw_footer(
  frame: &mut Frame,
  area: Rect,
  breadcrumb: &[String],
  status: Option<&StatusMessage>,
) {
  let mut spans = vec![Span::raw(" ")];

  for (i, part) in breadcrumb.iter().enumerate() {
    if i > 0 {
      spans.push(Span::styled(" > ", Style::default().fg(Color::DarkGray)));
    }
    let style = if i + 1 == breadcrumb.len() {
      Style::default().fg(Color::Cyan).bold()
    } else {
      Style::default().fg(Color::White)
    };
    spans.push(Span::styled(part.clone(), style));
  }

  let left = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(left, area);

  if let Some(status) = status {
    let (text, color) = match status {
      StatusMessage::Info(text) => (text, Color::Green),
      StatusMessage::Error(text) => (text, Color::Red),
    };
    let right = Paragraph::new(Span::styled(format!("{} ", text), Style::default().fg(color)))
      .alignment(Alignment::Right);
    frame.render_widget(right, area);
  }
}
