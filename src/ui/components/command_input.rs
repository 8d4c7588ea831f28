use super::input::{InputResult, TextInput};
use super::KeyResult;
use crate::commands::{self, Command};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};

const MAX_SUGGESTIONS: usize = 8;

/// Events emitted by the command palette
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandEvent {
  Submitted(String),
  Cancelled,
}

/// `:` command palette with autocomplete
#[derive(Debug, Clone, Default)]
pub struct CommandInput {
  input: TextInput,
  active: bool,
  selected_suggestion: usize,
}

impl CommandInput {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  pub fn activate(&mut self) {
    self.active = true;
    self.input.clear();
    self.selected_suggestion = 0;
  }

  fn close(&mut self) {
    self.active = false;
    self.input.clear();
    self.selected_suggestion = 0;
  }

  pub fn suggestions(&self) -> Vec<&'static Command> {
    commands::get_suggestions(self.input.value())
  }

  /// Handle a key while the palette is open. Callers open it with
  /// `activate()`.
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<CommandEvent> {
    if !self.active {
      return KeyResult::NotHandled;
    }

    match key.code {
      KeyCode::Esc => {
        self.close();
        return KeyResult::Event(CommandEvent::Cancelled);
      }
      KeyCode::Enter => {
        let cmd = self.resolve_command();
        self.close();
        return KeyResult::Event(CommandEvent::Submitted(cmd));
      }
      KeyCode::Tab | KeyCode::Down => {
        let count = self.suggestions().len().min(MAX_SUGGESTIONS);
        if count > 0 {
          self.selected_suggestion = (self.selected_suggestion + 1) % count;
        }
        return KeyResult::Handled;
      }
      KeyCode::BackTab | KeyCode::Up => {
        let count = self.suggestions().len().min(MAX_SUGGESTIONS);
        if count > 0 {
          self.selected_suggestion = (self.selected_suggestion + count - 1) % count;
        }
        return KeyResult::Handled;
      }
      _ => {}
    }

    if self.input.handle_key(key) == InputResult::Consumed {
      self.selected_suggestion = 0;
    }
    KeyResult::Handled
  }

  /// The highlighted suggestion, or the raw input when nothing matches.
  fn resolve_command(&self) -> String {
    match self.suggestions().get(self.selected_suggestion) {
      Some(cmd) => cmd.name.to_string(),
      None => self.input.value().trim().to_lowercase(),
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active {
      return;
    }

    let suggestions = self.suggestions();
    let shown = suggestions.len().min(MAX_SUGGESTIONS) as u16;
    let width = (area.width * 60 / 100).clamp(30, 60).min(area.width.saturating_sub(1));
    let height = (3 + shown).min(area.height);
    let overlay_area = Rect::new(area.x + 1, area.y + 1, width, height);
    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(" Command ");
    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);
    if inner.height == 0 {
      return;
    }

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Length(1), Constraint::Min(0)])
      .split(inner);

    let mut line = vec![Span::styled(":", Style::default().fg(Color::Yellow))];
    line.extend(self.input.spans(None));
    frame.render_widget(Paragraph::new(Line::from(line)), chunks[0]);

    if suggestions.is_empty() || chunks[1].height == 0 {
      return;
    }

    let items: Vec<ListItem> = suggestions
      .iter()
      .take(MAX_SUGGESTIONS)
      .map(|cmd| {
        ListItem::new(Line::from(vec![
          Span::styled(format!("{:<12}", cmd.name), Style::default().fg(Color::Cyan)),
          Span::styled(cmd.description, Style::default().fg(Color::DarkGray)),
        ]))
      })
      .collect();
    let list =
      List::new(items).highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White));
    let mut state = ListState::default();
    state.select(Some(self.selected_suggestion));
    frame.render_stateful_widget(list, chunks[1], &mut state);
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
  fn test_inactive_ignores_keys() {
    let mut palette = CommandInput::new();
    assert_eq!(palette.handle_key(key(KeyCode::Char('q'))), KeyResult::NotHandled);
  }

  #[test]
  fn test_submit_resolves_suggestion() {
    let mut palette = CommandInput::new();
    palette.activate();
    palette.handle_key(key(KeyCode::Char('s')));
    palette.handle_key(key(KeyCode::Char('p')));
    assert_eq!(
      palette.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(CommandEvent::Submitted("spectra".to_string()))
    );
    assert!(!palette.is_active());
  }

  #[test]
  fn test_tab_cycles_suggestions() {
    let mut palette = CommandInput::new();
    palette.activate();
    palette.handle_key(key(KeyCode::BackTab));
    let last = palette.suggestions()[MAX_SUGGESTIONS.min(palette.suggestions().len()) - 1].name;
    assert_eq!(
      palette.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(CommandEvent::Submitted(last.to_string()))
    );
  }

  #[test]
  fn test_unknown_command_passes_through() {
    let mut palette = CommandInput::new();
    palette.activate();
    for c in "Nope".chars() {
      palette.handle_key(key(KeyCode::Char(c)));
    }
    assert_eq!(
      palette.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(CommandEvent::Submitted("nope".to_string()))
    );
  }
}
