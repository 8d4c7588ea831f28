use crate::inventory::{required_field_hints, SAMPLE_CODE};
use crate::query::Query;
use crate::submission::{SubmissionKind, SubmissionRecord};
use crate::table::Table;
use crate::ui::components::{InputResult, TextInput};
use crate::ui::renderfns::{truncate, StatusMessage};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::{clamp_selection, SharedSession};
use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{self, Block, Borders, Cell, Paragraph, Row, TableState};

const COLUMN_WIDTH: u16 = 14;

/// Spreadsheet-style editing of a working copy of the inventory.
///
/// Changes stay local until they are submitted (a new file for review) or
/// committed (overwriting the master).
pub struct EditorView {
  session: SharedSession,
  /// Table as loaded; partial submissions diff against it
  master: Table,
  table: Table,
  table_state: TableState,
  column: usize,
  column_offset: usize,
  editing: Option<TextInput>,
  upload: Option<Query<String>>,
  commit: Option<Query<Table>>,
  message: Option<StatusMessage>,
}

impl EditorView {
  pub fn new(session: SharedSession, master: Table) -> Self {
    let table = master.clone();
    Self {
      session,
      master,
      table,
      table_state: TableState::default(),
      column: 0,
      column_offset: 0,
      editing: None,
      upload: None,
      commit: None,
      message: None,
    }
  }

  fn current_row(&self) -> Option<usize> {
    clamp_selection(self.table_state.selected(), self.table.len())
  }

  fn is_busy(&self) -> bool {
    self.upload.as_ref().is_some_and(|q| q.is_loading())
      || self.commit.as_ref().is_some_and(|q| q.is_loading())
  }

  fn is_modified(&self, row: usize) -> bool {
    self.master.row(row) != self.table.row(row)
  }

  fn start_editing(&mut self) {
    let Some(row) = self.current_row() else {
      return;
    };
    let value = self
      .table
      .row(row)
      .and_then(|cells| cells.get(self.column))
      .map(String::as_str)
      .unwrap_or("");
    self.editing = Some(TextInput::with_value(value));
  }

  fn finish_editing(&mut self, value: String) {
    self.editing = None;
    let Some(row) = self.current_row() else {
      return;
    };
    if let Err(e) = self.table.set_cell(row, self.column, value.trim()) {
      self.message = Some(StatusMessage::Error(e.to_string()));
    }
  }

  fn add_row(&mut self) {
    let row = self.table.push_empty_row();
    self.table_state.select(Some(row));
    self.column = self.table.column_index(SAMPLE_CODE).unwrap_or(0);
  }

  fn delete_row(&mut self) {
    if let Some(row) = self.current_row() {
      self.table.remove_row(row);
    }
  }

  fn submit(&mut self, kind: SubmissionKind) {
    if self.is_busy() {
      self.message = Some(StatusMessage::Error("Still uploading, please wait".to_string()));
      return;
    }
    let author = self.session.config().author().to_string();
    let record = match kind {
      SubmissionKind::Full => SubmissionRecord::full(self.table.clone(), &author, Utc::now()),
      SubmissionKind::Partial => {
        SubmissionRecord::partial(&self.master, &self.table, &author, Utc::now())
      }
    };
    let record = match record {
      Ok(record) => record,
      Err(e) => {
        self.message = Some(StatusMessage::Error(e.to_string()));
        return;
      }
    };

    self.message = Some(StatusMessage::Info(format!(
      "Uploading {} submission ({} rows)...",
      kind.as_str(),
      record.table.len()
    )));
    let session = self.session.clone();
    self.upload = Some(Query::start(move || {
      let session = session.clone();
      let record = record.clone();
      async move { session.submit(&record).await.map_err(|e| e.to_string()) }
    }));
  }

  fn commit(&mut self) {
    if self.is_busy() {
      self.message = Some(StatusMessage::Error("Still uploading, please wait".to_string()));
      return;
    }
    self.message = Some(StatusMessage::Info("Committing to the master inventory...".to_string()));
    let session = self.session.clone();
    let table = self.table.clone();
    self.commit = Some(Query::start(move || {
      let session = session.clone();
      let table = table.clone();
      async move {
        session
          .commit_inventory(table)
          .await
          .map(|result| result.data.into_table())
          .map_err(|e| e.to_string())
      }
    }));
  }

  /// Keep the cursor column on screen given how many columns fit.
  fn scroll_columns(&mut self, visible: usize) {
    let visible = visible.max(1);
    if self.column < self.column_offset {
      self.column_offset = self.column;
    } else if self.column >= self.column_offset + visible {
      self.column_offset = self.column + 1 - visible;
    }
  }

  fn render_table(&mut self, frame: &mut Frame, area: Rect) {
    let dirty = (0..self.table.len().max(self.master.len())).any(|row| self.is_modified(row));
    let title = format!(
      " Edit inventory ({} rows{}) ",
      self.table.len(),
      if dirty { ", modified" } else { "" }
    );
    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(if dirty { Color::Yellow } else { Color::Green }));

    let width = self.table.headers().len();
    self.column = self.column.min(width.saturating_sub(1));
    let visible = (area.width.saturating_sub(8) / (COLUMN_WIDTH + 1)) as usize;
    self.scroll_columns(visible);
    let end = (self.column_offset + visible.max(1)).min(width);
    let headers = self.table.headers();
    let shown = self.column_offset..end;

    let header_style = Style::default().fg(Color::Yellow).bold();
    let mut header_cells = vec![Cell::from("#")];
    header_cells.extend(headers[shown.clone()].iter().enumerate().map(|(i, name)| {
      let cell = Cell::from(truncate(name.trim(), COLUMN_WIDTH as usize));
      if self.column_offset + i == self.column {
        cell.style(header_style.add_modifier(Modifier::UNDERLINED))
      } else {
        cell
      }
    }));
    let header = Row::new(header_cells).style(header_style);

    let selected = self.current_row();
    let rows: Vec<Row> = self
      .table
      .rows()
      .iter()
      .enumerate()
      .map(|(index, cells)| {
        let marker = if self.is_modified(index) { "*" } else { " " };
        let mut row_cells = vec![Cell::from(format!("{}{}", marker, index + 1))
          .style(Style::default().fg(Color::DarkGray))];
        row_cells.extend(shown.clone().map(|col| {
          let text = cells.get(col).map(String::as_str).unwrap_or("");
          let cell = Cell::from(truncate(text, COLUMN_WIDTH as usize));
          if Some(index) == selected && col == self.column {
            cell.style(Style::default().add_modifier(Modifier::REVERSED))
          } else {
            cell
          }
        }));
        Row::new(row_cells)
      })
      .collect();

    let mut widths = vec![Constraint::Length(6)];
    widths.extend(shown.map(|_| Constraint::Length(COLUMN_WIDTH)));

    let widget = widgets::Table::new(rows, widths)
      .header(header)
      .block(block)
      .row_highlight_style(Style::default().bg(Color::DarkGray));

    self.table_state.select(selected);
    frame.render_stateful_widget(widget, area, &mut self.table_state);
  }

  fn render_prompt(&self, frame: &mut Frame, area: Rect) {
    let column = self
      .table
      .headers()
      .get(self.column)
      .map(|h| h.trim())
      .unwrap_or("");

    let first = match &self.editing {
      Some(input) => {
        let mut spans =
          vec![Span::styled(format!(" {}: ", column), Style::default().fg(Color::Cyan))];
        spans.extend(input.spans(None));
        Line::from(spans)
      }
      None => {
        let value = self
          .current_row()
          .and_then(|row| self.table.row(row))
          .and_then(|cells| cells.get(self.column))
          .cloned()
          .unwrap_or_default();
        Line::from(vec![
          Span::styled(format!(" {}: ", column), Style::default().fg(Color::DarkGray)),
          Span::raw(value),
        ])
      }
    };

    let hints = self
      .current_row()
      .map(|row| required_field_hints(&self.table, row))
      .unwrap_or_default();
    let second = Line::from(Span::styled(
      format!(" {}", hints.join(", ")),
      Style::default().fg(Color::Red),
    ));

    frame.render_widget(Paragraph::new(vec![first, second]), area);
  }

  fn handle_editing(&mut self, key: KeyEvent) -> Option<ViewAction> {
    let input = self.editing.as_mut()?;
    match input.handle_key(key) {
      InputResult::Submitted(value) => self.finish_editing(value),
      InputResult::Cancelled => self.editing = None,
      InputResult::Consumed | InputResult::NotHandled => {}
    }
    Some(ViewAction::None)
  }

  fn handle_navigation(&mut self, key: KeyEvent) -> Option<ViewAction> {
    let last_column = self.table.headers().len().saturating_sub(1);
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.table_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.table_state.select_previous(),
      KeyCode::Char('g') | KeyCode::Home => self.table_state.select_first(),
      KeyCode::Char('G') | KeyCode::End => self.table_state.select_last(),
      KeyCode::Char('l') | KeyCode::Right | KeyCode::Tab => {
        self.column = (self.column + 1).min(last_column)
      }
      KeyCode::Char('h') | KeyCode::Left | KeyCode::BackTab => {
        self.column = self.column.saturating_sub(1)
      }
      KeyCode::Char('0') => self.column = 0,
      KeyCode::Char('$') => self.column = last_column,
      _ => return None,
    }
    Some(ViewAction::None)
  }

  fn handle_actions(&mut self, key: KeyEvent) -> Option<ViewAction> {
    match key.code {
      KeyCode::Enter | KeyCode::Char('i') => self.start_editing(),
      KeyCode::Char('a') => self.add_row(),
      KeyCode::Char('d') => self.delete_row(),
      KeyCode::Char('u') => {
        self.table = self.master.clone();
        self.message = Some(StatusMessage::Info("Edits discarded".to_string()));
      }
      KeyCode::Char('s') => self.submit(SubmissionKind::Full),
      KeyCode::Char('p') => self.submit(SubmissionKind::Partial),
      KeyCode::Char('C') => self.commit(),
      KeyCode::Char('q') | KeyCode::Esc => return Some(ViewAction::Pop),
      _ => return None,
    }
    Some(ViewAction::None)
  }
}

impl View for EditorView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    self
      .handle_editing(key)
      .or_else(|| self.handle_navigation(key))
      .or_else(|| self.handle_actions(key))
      .unwrap_or(ViewAction::None)
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Min(3), Constraint::Length(2)])
      .split(area);
    self.render_table(frame, chunks[0]);
    self.render_prompt(frame, chunks[1]);
  }

  fn breadcrumb_label(&self) -> String {
    "Edit".to_string()
  }

  fn tick(&mut self) {
    if let Some(upload) = &mut self.upload {
      if upload.poll() {
        self.message = match upload.take() {
          Some(Ok(path)) => Some(StatusMessage::Info(format!("Submitted {}", path))),
          Some(Err(e)) => Some(StatusMessage::Error(format!("Submission failed: {}", e))),
          None => None,
        };
        self.upload = None;
      }
    }

    if let Some(commit) = &mut self.commit {
      if commit.poll() {
        match commit.take() {
          Some(Ok(table)) => {
            self.master = table.clone();
            self.table = table;
            self.message = Some(StatusMessage::Info("Master inventory updated".to_string()));
          }
          Some(Err(e)) => {
            self.message = Some(StatusMessage::Error(format!("Commit refused: {}", e)))
          }
          None => {}
        }
        self.commit = None;
      }
    }
  }

  fn accepts_commands(&self) -> bool {
    self.editing.is_none()
  }

  fn status(&self) -> Option<StatusMessage> {
    self.message.clone()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    if self.editing.is_some() {
      return vec![
        ShortcutInfo::new("enter", "save cell").with_priority(10),
        ShortcutInfo::new("esc", "cancel").with_priority(20),
      ];
    }
    vec![
      ShortcutInfo::new("enter", "edit").with_priority(10),
      ShortcutInfo::new("a", "add").with_priority(20),
      ShortcutInfo::new("d", "delete").with_priority(30),
      ShortcutInfo::new("s", "submit").with_priority(40),
      ShortcutInfo::new("p", "submit changes").with_priority(50),
      ShortcutInfo::new("C", "commit").with_priority(60),
      ShortcutInfo::new("u", "undo all").with_priority(70),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
