use crate::query::{Query, QueryState};
use crate::store::RemoteEntry;
use crate::ui::renderfns::{format_age, StatusMessage};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::{clamp_selection, SharedSession};
use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

/// Submissions already uploaded for review
pub struct HistoryView {
  session: SharedSession,
  query: Query<Vec<RemoteEntry>>,
  list_state: ListState,
}

impl HistoryView {
  pub fn new(session: SharedSession) -> Self {
    let session_for_query = session.clone();
    let mut query = Query::new(move || {
      let session = session_for_query.clone();
      async move { session.submissions().await.map_err(|e| e.to_string()) }
    });
    query.fetch();

    Self {
      session,
      query,
      list_state: ListState::default(),
    }
  }
}

pub(crate) fn entry_line(entry: &RemoteEntry) -> Line<'static> {
  let mut spans = vec![Span::raw(entry.name.clone())];
  if let Some(size) = entry.size {
    spans.push(Span::styled(format!("  {} B", size), Style::default().fg(Color::DarkGray)));
  }
  if let Some(modified) = entry.modified {
    spans.push(Span::styled(
      format!("  {}", format_age(Utc::now() - modified)),
      Style::default().fg(Color::DarkGray),
    ));
  }
  Line::from(spans)
}

impl View for HistoryView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('r') => self.query.refetch(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let dir = &self.session.config().paths.submissions;
    let block = Block::default()
      .title(format!(" Submissions in {} ", dir))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Green));

    let entries = match self.query.state() {
      QueryState::Success(entries) => entries,
      QueryState::Error(e) => {
        let text = format!("Failed to list submissions: {}", e);
        frame.render_widget(Paragraph::new(text).block(block), area);
        return;
      }
      QueryState::Idle | QueryState::Loading => {
        frame.render_widget(Paragraph::new("Loading...").block(block), area);
        return;
      }
    };

    if entries.is_empty() {
      let paragraph = Paragraph::new("No submissions yet.")
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = entries.iter().map(|e| ListItem::new(entry_line(e))).collect();
    let list = List::new(items)
      .block(block)
      .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD));

    let selected = clamp_selection(self.list_state.selected(), entries.len());
    self.list_state.select(selected);
    frame.render_stateful_widget(list, area, &mut self.list_state);
  }

  fn breadcrumb_label(&self) -> String {
    "History".to_string()
  }

  fn tick(&mut self) {
    self.query.poll();
  }

  fn status(&self) -> Option<StatusMessage> {
    self.query.error().map(|e| StatusMessage::Error(e.to_string()))
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("r", "reload").with_priority(20),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
