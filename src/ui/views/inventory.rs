use crate::cache::{CacheResult, CacheSource};
use crate::inventory::{Inventory, LONG_NAME, SAMPLE_CODE};
use crate::query::Query;
use crate::ui::components::{KeyResult, SearchEvent, SearchInput};
use crate::ui::renderfns::{truncate, StatusMessage};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::{DocsView, EditorView, HistoryView, SpectraView, VisualizeView};
use crate::ui::{clamp_selection, SharedSession};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const CODE_WIDTH: u16 = 10;

/// The master inventory as a scrollable table
pub struct InventoryView {
  session: SharedSession,
  /// Set before refetching to make the next fetch bypass the cache
  force_refresh: Arc<AtomicBool>,
  query: Query<CacheResult<Inventory>>,
  inventory: Option<Inventory>,
  table_state: TableState,
  search: SearchInput,
  filter: String,
  /// Sample codes picked with space, in the order picked
  selected: Vec<String>,
  /// First non-key column shown
  column_offset: usize,
  message: Option<StatusMessage>,
}

impl InventoryView {
  pub fn new(session: SharedSession) -> Self {
    let force_refresh = Arc::new(AtomicBool::new(false));

    let session_for_query = session.clone();
    let force = force_refresh.clone();
    let mut query = Query::new(move || {
      let session = session_for_query.clone();
      let refresh = force.swap(false, Ordering::SeqCst);
      async move {
        let result = if refresh {
          session.refresh().await
        } else {
          session.inventory().await
        };
        result.map_err(|e| e.to_string())
      }
    });
    query.fetch();

    Self {
      session,
      force_refresh,
      query,
      inventory: None,
      table_state: TableState::default(),
      search: SearchInput::new("sample code or name"),
      filter: String::new(),
      selected: Vec::new(),
      column_offset: 0,
      message: None,
    }
  }

  fn refresh(&mut self) {
    self.force_refresh.store(true, Ordering::SeqCst);
    self.message = Some(StatusMessage::Info("Refreshing...".to_string()));
    self.query.refetch();
  }

  /// Row indices that pass the filter
  fn visible_rows(&self) -> Vec<usize> {
    let Some(inventory) = &self.inventory else {
      return Vec::new();
    };
    let table = inventory.table();
    let needle = self.filter.to_lowercase();
    (0..table.len())
      .filter(|&row| {
        needle.is_empty()
          || [SAMPLE_CODE, LONG_NAME].iter().any(|column| {
            table
              .cell(row, column)
              .map(|v| v.to_lowercase().contains(&needle))
              .unwrap_or(false)
          })
      })
      .collect()
  }

  fn current_code(&self) -> Option<String> {
    let inventory = self.inventory.as_ref()?;
    let row = *self.visible_rows().get(self.table_state.selected()?)?;
    inventory.table().cell(row, SAMPLE_CODE).map(String::from)
  }

  fn toggle_selected(&mut self) {
    let Some(code) = self.current_code().filter(|c| !c.is_empty()) else {
      return;
    };
    match self.selected.iter().position(|c| *c == code) {
      Some(i) => {
        self.selected.remove(i);
      }
      None => self.selected.push(code),
    }
  }

  fn visualize(&mut self) -> ViewAction {
    match &self.inventory {
      Some(inventory) => ViewAction::Push(Box::new(VisualizeView::new(
        inventory.clone(),
        self.selected.clone(),
      ))),
      None => self.not_loaded(),
    }
  }

  fn edit(&mut self) -> ViewAction {
    match &self.inventory {
      Some(inventory) => ViewAction::Push(Box::new(EditorView::new(
        self.session.clone(),
        inventory.table().clone(),
      ))),
      None => self.not_loaded(),
    }
  }

  fn not_loaded(&mut self) -> ViewAction {
    self.message = Some(StatusMessage::Error("The inventory is not loaded yet".to_string()));
    ViewAction::None
  }

  fn render_table(&mut self, frame: &mut Frame, area: Rect) {
    let title = match (&self.inventory, self.query.is_loading()) {
      (None, true) => " Master Biochar Inventory (loading...) ".to_string(),
      (None, false) => " Master Biochar Inventory ".to_string(),
      (Some(inventory), loading) => {
        let visible = self.visible_rows().len();
        let count = if visible == inventory.len() {
          format!("{} samples", visible)
        } else {
          format!("{} of {} samples", visible, inventory.len())
        };
        let suffix = if loading { ", refreshing..." } else { "" };
        format!(" Master Biochar Inventory ({}{}) ", count, suffix)
      }
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Green));

    let Some(inventory) = &self.inventory else {
      let text = match (&self.message, self.query.is_loading()) {
        (Some(StatusMessage::Error(e)), false) => {
          format!("Failed to load the inventory: {}\n\nPress 'r' to retry.", e)
        }
        _ => "Connecting to the store...".to_string(),
      };
      let paragraph = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    };

    if inventory.is_empty() {
      let text = "The master inventory has no samples yet. Press 'e' to add one.";
      let paragraph = Paragraph::new(text)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let table = inventory.table();
    let code_col = table.column_index(SAMPLE_CODE);
    let other_cols: Vec<usize> = (0..table.headers().len())
      .filter(|&c| Some(c) != code_col)
      .collect();
    self.column_offset = self.column_offset.min(other_cols.len().saturating_sub(1));
    let shown_cols = &other_cols[self.column_offset.min(other_cols.len())..];

    let mut widths = vec![Constraint::Length(1), Constraint::Length(CODE_WIDTH)];
    widths.extend(shown_cols.iter().map(|&c| {
      let width = table.headers()[c].trim().chars().count().clamp(6, 24) as u16 + 1;
      Constraint::Length(width)
    }));

    let header_style = Style::default().fg(Color::Yellow).bold();
    let mut header_cells = vec![Cell::from(""), Cell::from(SAMPLE_CODE)];
    header_cells.extend(shown_cols.iter().map(|&c| Cell::from(table.headers()[c].clone())));
    let header = Row::new(header_cells).style(header_style);

    let visible = self.visible_rows();
    let rows: Vec<Row> = visible
      .iter()
      .map(|&row| {
        let cells = table.row(row).unwrap_or(&[]);
        let code = code_col.and_then(|c| cells.get(c)).map(String::as_str).unwrap_or("");
        let picked = self.selected.iter().any(|s| s == code);
        let marker = if picked { "●" } else { " " };
        let mut row_cells = vec![
          Cell::from(marker).style(Style::default().fg(Color::Green)),
          Cell::from(truncate(code, CODE_WIDTH as usize)).style(Style::default().fg(Color::Cyan)),
        ];
        row_cells.extend(
          shown_cols
            .iter()
            .map(|&c| Cell::from(cells.get(c).cloned().unwrap_or_default())),
        );
        Row::new(row_cells)
      })
      .collect();

    let widget = Table::new(rows, widths)
      .header(header)
      .block(block)
      .column_spacing(1)
      .row_highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD));

    let selected = clamp_selection(self.table_state.selected(), visible.len());
    self.table_state.select(selected);
    frame.render_stateful_widget(widget, area, &mut self.table_state);
  }

  fn render_info(&self, frame: &mut Frame, area: Rect) {
    let mut spans = vec![Span::styled(" Selected: ", Style::default().fg(Color::DarkGray))];
    if self.selected.is_empty() {
      spans.push(Span::styled(
        "none (space to pick samples)",
        Style::default().fg(Color::DarkGray),
      ));
    } else {
      spans.push(Span::styled(self.selected.join(", "), Style::default().fg(Color::Green)));
    }
    if let Some(inventory) = &self.inventory {
      if !inventory.missing_columns().is_empty() {
        spans.push(Span::styled(
          format!("   missing columns: {}", inventory.missing_columns().join(", ")),
          Style::default().fg(Color::Red),
        ));
      }
    }
    if !self.filter.is_empty() && !self.search.is_active() {
      spans.push(Span::styled(
        format!("   filter: /{}", self.filter),
        Style::default().fg(Color::Yellow),
      ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
  }

  // Key handling helpers for or_else chain pattern
  fn handle_overlays(&mut self, key: KeyEvent) -> Option<ViewAction> {
    match self.search.handle_key(key) {
      KeyResult::Handled | KeyResult::Event(SearchEvent::Submitted) => Some(ViewAction::None),
      KeyResult::Event(SearchEvent::Changed(filter)) => {
        self.filter = filter;
        self.table_state.select(Some(0));
        Some(ViewAction::None)
      }
      KeyResult::NotHandled => None,
    }
  }

  fn handle_navigation(&mut self, key: KeyEvent) -> Option<ViewAction> {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.table_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.table_state.select_previous(),
      KeyCode::Char('g') | KeyCode::Home => self.table_state.select_first(),
      KeyCode::Char('G') | KeyCode::End => self.table_state.select_last(),
      KeyCode::Char('l') | KeyCode::Right => self.column_offset += 1,
      KeyCode::Char('h') | KeyCode::Left => {
        self.column_offset = self.column_offset.saturating_sub(1)
      }
      _ => return None,
    }
    Some(ViewAction::None)
  }

  fn handle_actions(&mut self, key: KeyEvent) -> Option<ViewAction> {
    let action = match key.code {
      KeyCode::Char(' ') => {
        self.toggle_selected();
        ViewAction::None
      }
      KeyCode::Char('c') => {
        self.selected.clear();
        ViewAction::None
      }
      KeyCode::Char('r') => {
        self.refresh();
        ViewAction::None
      }
      KeyCode::Char('v') => self.visualize(),
      KeyCode::Char('e') => self.edit(),
      KeyCode::Esc if !self.filter.is_empty() => {
        self.filter.clear();
        ViewAction::None
      }
      KeyCode::Char('q') | KeyCode::Esc => ViewAction::Pop,
      _ => return None,
    };
    Some(action)
  }
}

impl View for InventoryView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    self
      .handle_overlays(key)
      .or_else(|| self.handle_navigation(key))
      .or_else(|| self.handle_actions(key))
      .unwrap_or(ViewAction::None)
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Min(3), Constraint::Length(1)])
      .split(area);
    self.render_table(frame, chunks[0]);
    self.render_info(frame, chunks[1]);
    self.search.render_overlay(frame, chunks[0]);
  }

  fn breadcrumb_label(&self) -> String {
    "Inventory".to_string()
  }

  fn tick(&mut self) {
    if !self.query.poll() {
      return;
    }
    match self.query.take() {
      Some(Ok(result)) => {
        self.message = match result.source {
          CacheSource::Network => Some(StatusMessage::Info(format!(
            "Loaded {} samples from {}",
            result.data.len(),
            self.session.config().paths.inventory
          ))),
          CacheSource::Cache => None,
        };
        let codes = result.data.sample_codes();
        self.selected.retain(|code| codes.contains(code));
        self.inventory = Some(result.data);
      }
      Some(Err(e)) => self.message = Some(StatusMessage::Error(e)),
      None => {}
    }
  }

  fn resume(&mut self) {
    // Picks up a committed table from the session cache.
    self.query.fetch();
  }

  fn accepts_commands(&self) -> bool {
    !self.search.is_active()
  }

  fn status(&self) -> Option<StatusMessage> {
    self.message.clone()
  }

  fn handle_command(&mut self, command: &str) -> ViewAction {
    match command {
      "visualize" => self.visualize(),
      "edit" => self.edit(),
      "history" => ViewAction::Push(Box::new(HistoryView::new(self.session.clone()))),
      "spectra" => ViewAction::Push(Box::new(SpectraView::new(self.session.clone()))),
      "docs" => ViewAction::Push(Box::new(DocsView::new())),
      "refresh" => {
        self.refresh();
        ViewAction::None
      }
      _ => ViewAction::None,
    }
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("/", "filter").with_priority(20),
      ShortcutInfo::new("space", "pick").with_priority(30),
      ShortcutInfo::new("v", "visualize").with_priority(40),
      ShortcutInfo::new("e", "edit").with_priority(50),
      ShortcutInfo::new("r", "refresh").with_priority(60),
      ShortcutInfo::new("q", "quit").with_priority(90),
    ]
  }
}
