use crate::inventory::{AdsorptionPoint, Inventory, ELEMENTS, PARAMETERS};
use crate::ui::clamp_selection;
use crate::ui::renderfns::{format_value, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{
  Bar, BarChart, BarGroup, Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap,
};

const ELEMENT_COLORS: [Color; 4] = [Color::White, Color::Yellow, Color::Blue, Color::Red];

/// Bars are drawn from integers, so values keep two decimals this way.
const BAR_SCALE: f64 = 100.0;

/// Charts for the samples picked in the inventory
pub struct VisualizeView {
  inventory: Inventory,
  codes: Vec<String>,
  parameter: usize,
  adsorption: Vec<AdsorptionPoint>,
  table_state: TableState,
}

impl VisualizeView {
  pub fn new(inventory: Inventory, codes: Vec<String>) -> Self {
    let adsorption = inventory.adsorption_points();
    Self {
      inventory,
      codes,
      parameter: 0,
      adsorption,
      table_state: TableState::default(),
    }
  }

  fn parameter_name(&self) -> &'static str {
    PARAMETERS[self.parameter % PARAMETERS.len()]
  }

  fn render_parameter(&self, frame: &mut Frame, area: Rect) {
    let param = self.parameter_name();
    let block = Block::default()
      .title(format!(" ◀ {} ▶ ", param.trim()))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Green));

    let values = self.inventory.parameter_series(param, &self.codes);
    let bars: Vec<Bar> = values
      .iter()
      .map(|sample| {
        let text = sample.value.map(format_value).unwrap_or_else(|| "n/a".to_string());
        Bar::default()
          .value(scaled(sample.value))
          .text_value(text)
          .label(Line::from(sample.code.clone()))
          .style(Style::default().fg(Color::Cyan))
      })
      .collect();

    let chart = BarChart::default()
      .block(block)
      .data(BarGroup::default().bars(&bars))
      .bar_width(bar_width(area.width, bars.len().max(1)))
      .bar_gap(1);
    frame.render_widget(chart, area);
  }

  fn render_elements(&self, frame: &mut Frame, area: Rect) {
    let mut title = vec![Span::raw(" Elemental composition ")];
    for (element, color) in ELEMENTS.iter().zip(ELEMENT_COLORS) {
      title.push(Span::styled(format!("■{} ", element), Style::default().fg(color)));
    }
    let block = Block::default()
      .title(Line::from(title))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Green));

    let compositions = self.inventory.elemental_composition(&self.codes);
    let label_width = compositions.iter().map(|c| c.code.chars().count()).max().unwrap_or(0);
    let max_total = compositions.iter().map(|c| stack_total(&c.percentages)).fold(0.0, f64::max);
    // Label, a space, the bar, then room for the total
    let bar_room = area.width.saturating_sub(2 + label_width as u16 + 1 + 8);

    let mut lines = Vec::new();
    for composition in &compositions {
      let label = format!("{:<width$} ", composition.code, width = label_width);
      let mut spans = vec![Span::raw(label)];
      let widths = stack_segments(&composition.percentages, max_total, bar_room);
      for (width, color) in widths.iter().zip(ELEMENT_COLORS) {
        spans.push(Span::styled("█".repeat(*width as usize), Style::default().fg(color)));
      }
      let total = stack_total(&composition.percentages);
      spans.push(Span::styled(
        format!(" {}", format_value(total)),
        Style::default().fg(Color::DarkGray),
      ));
      lines.push(Line::from(spans));
      lines.push(Line::from(""));
    }
    if lines.is_empty() {
      lines.push(Line::from(Span::styled(
        "No elemental data for the picked samples.",
        Style::default().fg(Color::DarkGray),
      )));
    }

    frame.render_widget(Paragraph::new(lines).block(block), area);
  }

  fn render_adsorption(&mut self, frame: &mut Frame, area: Rect) {
    let title = match self.table_state.selected().and_then(|i| self.adsorption.get(i)) {
      Some(point) => format!(" Adsorption vs SSA vs (O+N)/C  {} ", point.label()),
      None => " Adsorption vs SSA vs (O+N)/C ".to_string(),
    };
    let block = Block::default()
      .title(title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Green));

    if self.adsorption.is_empty() {
      let text = "No sample has adsorption capacity, BET and elemental data together.";
      let paragraph = Paragraph::new(text)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let header = Row::new(["Code", "Name", "Capacity", "BET", "(O+N)/C"])
      .style(Style::default().fg(Color::Yellow).bold());
    let rows: Vec<Row> = self
      .adsorption
      .iter()
      .map(|point| {
        let picked = self.codes.contains(&point.code);
        let style = if picked {
          Style::default().fg(Color::Green)
        } else {
          Style::default()
        };
        Row::new([
          Cell::from(point.code.clone()),
          Cell::from(truncate(&point.long_name, 30)),
          Cell::from(format_value(point.capacity)),
          Cell::from(format_value(point.bet)),
          Cell::from(format!("{:.3}", point.ratio)),
        ])
        .style(style)
      })
      .collect();

    let widths = [
      Constraint::Length(10),
      Constraint::Min(12),
      Constraint::Length(10),
      Constraint::Length(10),
      Constraint::Length(8),
    ];
    let table = Table::new(rows, widths)
      .header(header)
      .block(block)
      .row_highlight_style(Style::default().bg(Color::DarkGray));

    let selected = clamp_selection(self.table_state.selected(), self.adsorption.len());
    self.table_state.select(selected);
    frame.render_stateful_widget(table, area, &mut self.table_state);
  }
}

fn scaled(value: Option<f64>) -> u64 {
  value
    .filter(|v| v.is_finite() && *v > 0.0)
    .map(|v| (v * BAR_SCALE).round() as u64)
    .unwrap_or(0)
}

fn stack_total(values: &[Option<f64>]) -> f64 {
  values.iter().flatten().filter(|v| v.is_finite() && **v > 0.0).sum()
}

/// Cell widths of the stacked segments of one bar, where `max_total` fills
/// `width` cells. Boundaries are rounded from the running total so segments
/// add up to the rounded bar length.
fn stack_segments(values: &[Option<f64>; 4], max_total: f64, width: u16) -> [u16; 4] {
  let mut widths = [0; 4];
  if max_total <= 0.0 {
    return widths;
  }
  let mut running = 0.0;
  let mut previous = 0u16;
  for (slot, value) in widths.iter_mut().zip(values) {
    running += value.filter(|v| v.is_finite() && *v > 0.0).unwrap_or(0.0);
    let boundary = ((running / max_total) * f64::from(width)).round() as u16;
    *slot = boundary.saturating_sub(previous);
    previous = boundary.max(previous);
  }
  widths
}

/// Width that fits `slots` bars (plus a gap each) inside a bordered area.
fn bar_width(width: u16, slots: usize) -> u16 {
  let inner = width.saturating_sub(2) as usize;
  ((inner / slots.max(1)).saturating_sub(1)).clamp(1, 9) as u16
}

impl View for VisualizeView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('l') | KeyCode::Right | KeyCode::Tab => {
        self.parameter = (self.parameter + 1) % PARAMETERS.len();
      }
      KeyCode::Char('h') | KeyCode::Left | KeyCode::BackTab => {
        self.parameter = (self.parameter + PARAMETERS.len() - 1) % PARAMETERS.len();
      }
      KeyCode::Char('j') | KeyCode::Down => self.table_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.table_state.select_previous(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let rows = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
      .split(area);

    if self.codes.is_empty() {
      let hint = Paragraph::new(
        "No samples picked. Go back to the inventory, pick samples with space and press 'v' again.",
      )
      .block(Block::default().borders(Borders::ALL).title(" Parameters "))
      .wrap(Wrap { trim: true })
      .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(hint, rows[0]);
    } else {
      let charts = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[0]);
      self.render_parameter(frame, charts[0]);
      self.render_elements(frame, charts[1]);
    }

    self.render_adsorption(frame, rows[1]);
  }

  fn breadcrumb_label(&self) -> String {
    format!("Visualize ({})", self.codes.len())
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("h/l", "parameter").with_priority(10),
      ShortcutInfo::new("j/k", "scroll").with_priority(20),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_scaled_drops_missing_and_negative() {
    assert_eq!(scaled(Some(6.54)), 654);
    assert_eq!(scaled(None), 0);
    assert_eq!(scaled(Some(-1.0)), 0);
    assert_eq!(scaled(Some(f64::NAN)), 0);
  }

  #[test]
  fn test_stack_segments_fill_the_widest_bar() {
    let full = [Some(60.0), Some(5.0), Some(5.0), Some(30.0)];
    assert_eq!(stack_segments(&full, 100.0, 20), [12, 1, 1, 6]);

    // A sample with half the total gets half the length
    let half = [Some(30.0), None, Some(3.0), Some(17.0)];
    let widths = stack_segments(&half, 100.0, 20);
    assert_eq!(widths, [6, 0, 1, 3]);
    assert_eq!(widths.iter().sum::<u16>(), 10);
  }

  #[test]
  fn test_stack_segments_without_data() {
    let empty = [None, None, None, None];
    assert_eq!(stack_segments(&empty, 0.0, 20), [0, 0, 0, 0]);
    assert_eq!(stack_total(&empty), 0.0);
    assert_eq!(stack_total(&[Some(1.5), None, Some(-2.0), Some(f64::NAN)]), 1.5);
  }

  #[test]
  fn test_bar_width_stays_in_range() {
    assert_eq!(bar_width(0, 0), 1);
    assert_eq!(bar_width(42, 4), 9);
    assert_eq!(bar_width(22, 5), 3);
  }
}
