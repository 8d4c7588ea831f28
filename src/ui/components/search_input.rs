use super::input::{InputResult, TextInput};
use super::KeyResult;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

/// Events emitted by the filter input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
  /// Filter text changed (every keystroke; empty string on cancel)
  Changed(String),
  /// Overlay closed, filter stays applied
  Submitted,
}

/// `/` filter overlay
#[derive(Debug, Clone)]
pub struct SearchInput {
  input: TextInput,
  active: bool,
  placeholder: &'static str,
}

impl SearchInput {
  pub fn new(placeholder: &'static str) -> Self {
    Self {
      input: TextInput::new(),
      active: false,
      placeholder,
    }
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  /// Handle a key whether or not the overlay is open; `/` opens it.
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<SearchEvent> {
    if !self.active {
      if key.code == KeyCode::Char('/') {
        self.active = true;
        self.input.clear();
        return KeyResult::Event(SearchEvent::Changed(String::new()));
      }
      return KeyResult::NotHandled;
    }

    match self.input.handle_key(key) {
      InputResult::Submitted(_) => {
        self.active = false;
        KeyResult::Event(SearchEvent::Submitted)
      }
      InputResult::Cancelled => {
        self.active = false;
        self.input.clear();
        KeyResult::Event(SearchEvent::Changed(String::new()))
      }
      InputResult::Consumed => {
        KeyResult::Event(SearchEvent::Changed(self.input.value().to_string()))
      }
      // Swallow everything else so list navigation keys don't leak through
      InputResult::NotHandled => KeyResult::Handled,
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active {
      return;
    }

    let width = (area.width * 60 / 100).clamp(30, 60).min(area.width);
    let overlay_area =
      Rect::new(area.x + 1, area.y + 1, width.saturating_sub(1), 3.min(area.height));
    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(" Filter ");
    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);
    if inner.height == 0 {
      return;
    }

    let mut spans = vec![Span::styled("/", Style::default().fg(Color::Yellow))];
    if self.input.is_empty() {
      spans.push(Span::styled(" ", Style::default().add_modifier(Modifier::REVERSED)));
      spans.push(Span::styled(self.placeholder, Style::default().fg(Color::DarkGray)));
    } else {
      spans.extend(self.input.spans(None));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), inner);
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
  fn test_activation_and_typing() {
    let mut search = SearchInput::new("code or name");
    assert_eq!(search.handle_key(key(KeyCode::Char('j'))), KeyResult::NotHandled);

    search.handle_key(key(KeyCode::Char('/')));
    assert!(search.is_active());
    assert_eq!(
      search.handle_key(key(KeyCode::Char('b'))),
      KeyResult::Event(SearchEvent::Changed("b".to_string()))
    );
    assert_eq!(search.handle_key(key(KeyCode::Enter)), KeyResult::Event(SearchEvent::Submitted));
    assert!(!search.is_active());
    assert_eq!(search.input.value(), "b");
  }

  #[test]
  fn test_cancel_clears_filter() {
    let mut search = SearchInput::new("code or name");
    search.handle_key(key(KeyCode::Char('/')));
    search.handle_key(key(KeyCode::Char('x')));
    assert_eq!(
      search.handle_key(key(KeyCode::Esc)),
      KeyResult::Event(SearchEvent::Changed(String::new()))
    );
    assert_eq!(search.input.value(), "");
  }
}
