use crate::cache::CacheResult;
use crate::naming::DataFileName;
use crate::query::Query;
use crate::spectrum::{bounds, InstrumentData};
use crate::store::RemoteEntry;
use crate::ui::components::{KeyResult, SearchEvent, SearchInput};
use crate::ui::renderfns::{format_age, format_value, StatusMessage};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::history::entry_line;
use crate::ui::{clamp_selection, SharedSession};
use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::symbols::Marker;
use ratatui::widgets::{
  Axis, Block, Borders, Cell, Chart, Dataset, GraphType, List, ListItem, ListState, Paragraph, Row,
  Table, TableState, Wrap,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Instrument data files on the store
pub struct SpectraView {
  session: SharedSession,
  query: Query<Vec<RemoteEntry>>,
  list_state: ListState,
  search: SearchInput,
  filter: String,
}

impl SpectraView {
  pub fn new(session: SharedSession) -> Self {
    let session_for_query = session.clone();
    let mut query = Query::new(move || {
      let session = session_for_query.clone();
      async move { session.spectra_files().await.map_err(|e| e.to_string()) }
    });
    query.fetch();

    Self {
      session,
      query,
      list_state: ListState::default(),
      search: SearchInput::new("file name"),
      filter: String::new(),
    }
  }

  fn visible(&self) -> Vec<&RemoteEntry> {
    let needle = self.filter.to_lowercase();
    self
      .query
      .data()
      .map(|entries| {
        entries
          .iter()
          .filter(|e| e.name.to_lowercase().contains(&needle))
          .collect()
      })
      .unwrap_or_default()
  }

  fn open_selected(&self) -> ViewAction {
    let visible = self.visible();
    match self.list_state.selected().and_then(|i| visible.get(i)) {
      Some(entry) => ViewAction::Push(Box::new(SpectrumView::new(self.session.clone(), entry))),
      None => ViewAction::None,
    }
  }
}

impl View for SpectraView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.search.handle_key(key) {
      KeyResult::Event(SearchEvent::Changed(filter)) => {
        self.filter = filter;
        self.list_state.select(Some(0));
        return ViewAction::None;
      }
      KeyResult::Handled | KeyResult::Event(SearchEvent::Submitted) => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('r') => self.query.refetch(),
      KeyCode::Enter => return self.open_selected(),
      KeyCode::Esc if !self.filter.is_empty() => self.filter.clear(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .title(format!(" Instrument data in {} ", self.session.config().paths.spectra))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Green));

    if self.query.data().is_none() {
      let text = match self.query.error() {
        Some(e) => format!("Failed to list instrument data: {}", e),
        None => "Loading...".to_string(),
      };
      frame.render_widget(Paragraph::new(text).block(block), area);
      self.search.render_overlay(frame, area);
      return;
    }

    let items: Vec<ListItem> = self
      .visible()
      .into_iter()
      .map(|entry| {
        let mut line = entry_line(entry);
        let detail = match DataFileName::parse(&entry.name) {
          Ok(name) => {
            let date = name.date.format("%Y-%m-%d");
            Span::styled(
              format!("  [{} {} {}]", name.instrument, name.sample_code(), date),
              Style::default().fg(Color::Cyan),
            )
          }
          Err(_) => Span::styled("  [non-standard name]", Style::default().fg(Color::Red)),
        };
        line.spans.push(detail);
        ListItem::new(line)
      })
      .collect();
    let len = items.len();

    let list = List::new(items)
      .block(block)
      .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD));
    let selected = clamp_selection(self.list_state.selected(), len);
    self.list_state.select(selected);
    frame.render_stateful_widget(list, area, &mut self.list_state);
    self.search.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Spectra".to_string()
  }

  fn tick(&mut self) {
    self.query.poll();
  }

  fn accepts_commands(&self) -> bool {
    !self.search.is_active()
  }

  fn status(&self) -> Option<StatusMessage> {
    self.query.error().map(|e| StatusMessage::Error(e.to_string()))
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("enter", "open").with_priority(10),
      ShortcutInfo::new("/", "filter").with_priority(20),
      ShortcutInfo::new("r", "reload").with_priority(30),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}

/// One instrument data file, charted when it has two numeric columns
pub struct SpectrumView {
  name: String,
  file_name: Option<DataFileName>,
  /// Set before refetching to bypass the session memo
  reload: Arc<AtomicBool>,
  query: Query<CacheResult<InstrumentData>>,
  /// Column plotted against column 0
  y_column: usize,
  table_state: TableState,
}

impl SpectrumView {
  pub fn new(session: SharedSession, entry: &RemoteEntry) -> Self {
    let reload = Arc::new(AtomicBool::new(false));
    let path = entry.path.clone();
    let force = reload.clone();
    let query = Query::start(move || {
      let session = session.clone();
      let path = path.clone();
      let fresh = force.swap(false, Ordering::SeqCst);
      async move {
        let result = if fresh {
          session.reload_spectrum(&path).await
        } else {
          session.spectrum(&path).await
        };
        result.map_err(|e| e.to_string())
      }
    });

    Self {
      name: entry.name.clone(),
      file_name: DataFileName::parse(&entry.name).ok(),
      reload,
      query,
      y_column: 1,
      table_state: TableState::default(),
    }
  }

  fn layout_warning(&self, data: &InstrumentData) -> Option<String> {
    let name = self.file_name.as_ref()?;
    data.check_against(name.instrument).err().map(|e| e.to_string())
  }

  fn column_label(&self, column: usize) -> String {
    self
      .file_name
      .as_ref()
      .and_then(|name| name.instrument.column_labels().get(column))
      .map(|label| label.to_string())
      .unwrap_or_else(|| format!("column {}", column + 1))
  }

  /// Axis titles: the instrument's x/y labels for its own two column
  /// layout, column labels otherwise.
  fn axis_titles(&self) -> (String, String) {
    self
      .file_name
      .as_ref()
      .and_then(|name| name.instrument.axis_labels())
      .filter(|_| self.y_column == 1)
      .map(|(x, y)| (x.to_string(), y.to_string()))
      .unwrap_or_else(|| (self.column_label(0), self.column_label(self.y_column)))
  }

  fn render_chart(
    &self,
    frame: &mut Frame,
    area: Rect,
    data: &InstrumentData,
    block: Block,
  ) -> bool {
    let points = data.series(0, self.y_column);
    let Some((x_bounds, y_bounds)) = bounds(&points) else {
      return false;
    };
    let (x_title, y_title) = self.axis_titles();

    let dataset = Dataset::default()
      .name(y_title.clone())
      .marker(Marker::Braille)
      .graph_type(GraphType::Line)
      .style(Style::default().fg(Color::Cyan))
      .data(&points);

    let axis_labels = |[lo, hi]: [f64; 2]| {
      vec![
        Span::raw(format_value(lo)),
        Span::raw(format_value((lo + hi) / 2.0)),
        Span::raw(format_value(hi)),
      ]
    };

    let chart = Chart::new(vec![dataset])
      .block(block)
      .x_axis(
        Axis::default()
          .title(x_title)
          .style(Style::default().fg(Color::Gray))
          .bounds(x_bounds)
          .labels(axis_labels(x_bounds)),
      )
      .y_axis(
        Axis::default()
          .title(y_title)
          .style(Style::default().fg(Color::Gray))
          .bounds(y_bounds)
          .labels(axis_labels(y_bounds)),
      );
    frame.render_widget(chart, area);
    true
  }

  fn render_rows(&mut self, frame: &mut Frame, area: Rect, data: &InstrumentData, block: Block) {
    let header = Row::new((0..data.columns()).map(|c| Cell::from(self.column_label(c))))
      .style(Style::default().fg(Color::Yellow).bold());
    let rows: Vec<Row> = data
      .rows()
      .iter()
      .map(|row| Row::new(row.iter().map(|v| Cell::from(v.clone()))))
      .collect();
    let widths = vec![Constraint::Min(10); data.columns().max(1)];

    let table = Table::new(rows, widths)
      .header(header)
      .block(block)
      .row_highlight_style(Style::default().bg(Color::DarkGray));
    let selected = clamp_selection(self.table_state.selected(), data.len());
    self.table_state.select(selected);
    frame.render_stateful_widget(table, area, &mut self.table_state);
  }
}

impl View for SpectrumView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    let columns = self.query.data().map(|r| r.data.columns()).unwrap_or(0);
    match key.code {
      KeyCode::Char('l') | KeyCode::Right | KeyCode::Tab if columns > 2 => {
        self.y_column = self.y_column % (columns - 1) + 1;
      }
      KeyCode::Char('h') | KeyCode::Left | KeyCode::BackTab if columns > 2 => {
        self.y_column = if self.y_column <= 1 {
          columns - 1
        } else {
          self.y_column - 1
        };
      }
      KeyCode::Char('j') | KeyCode::Down => self.table_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.table_state.select_previous(),
      KeyCode::Char('r') => {
        self.reload.store(true, Ordering::SeqCst);
        self.query.refetch();
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let title = match &self.file_name {
      Some(name) => format!(
        " {} ({}, {} on {}) ",
        self.name,
        name.instrument.description(),
        name.sample_code(),
        name.date.format("%Y-%m-%d")
      ),
      None => format!(" {} ", self.name),
    };
    let block = Block::default()
      .title(title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Green));

    // Clone out of the query so the table state can be borrowed mutably.
    let data = match self.query.data() {
      Some(result) => result.data.clone(),
      None => {
        let text = match self.query.error() {
          Some(e) => format!("Failed to load {}: {}", self.name, e),
          None => "Loading...".to_string(),
        };
        let paragraph = Paragraph::new(text).block(block).wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
        return;
      }
    };

    let warning = self.layout_warning(&data);
    let (body, info) = match warning {
      Some(_) => {
        let chunks = Layout::default()
          .direction(Direction::Vertical)
          .constraints([Constraint::Min(3), Constraint::Length(1)])
          .split(area);
        (chunks[0], Some(chunks[1]))
      }
      None => (area, None),
    };

    let charted = data.columns() >= 2 && self.render_chart(frame, body, &data, block.clone());
    if !charted {
      self.render_rows(frame, body, &data, block);
    }

    if let (Some(info), Some(warning)) = (info, warning) {
      let style = Style::default().fg(Color::Red);
      let line = Paragraph::new(Span::styled(format!(" ⚠ {}", warning), style));
      frame.render_widget(line, info);
    }
  }

  fn breadcrumb_label(&self) -> String {
    self.name.clone()
  }

  fn tick(&mut self) {
    self.query.poll();
  }

  fn status(&self) -> Option<StatusMessage> {
    let result = self.query.data()?;
    let header = if result.data.header.is_empty() {
      String::new()
    } else {
      format!(", header: {}", result.data.header.join(" "))
    };
    Some(StatusMessage::Info(format!(
      "{} rows, {} columns, fetched {}{}",
      result.data.len(),
      result.data.columns(),
      format_age(Utc::now() - result.cached_at),
      header
    )))
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("h/l", "y column").with_priority(10),
      ShortcutInfo::new("r", "reload").with_priority(20),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
