use crate::naming::Instrument;
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

/// Naming convention and instrument layouts
pub struct DocsView {
  scroll: u16,
}

impl DocsView {
  pub fn new() -> Self {
    Self { scroll: 0 }
  }

  fn lines() -> Vec<Line<'static>> {
    let styled = |text: &'static str, style: Style| Line::from(Span::styled(text, style));
    let heading = |text: &'static str| styled(text, Style::default().fg(Color::Yellow).bold());
    let code = |text: &'static str| styled(text, Style::default().fg(Color::Cyan));

    let mut lines = vec![
      heading("Data file names"),
      Line::from(""),
      code("  ProjectName_instrument_date(yyyymmdd)_ResearcherSampleCode_test.format"),
      Line::from(""),
      Line::from("  Example: ACBC_IR_20240906_BEA001_1.dpt"),
      Line::from("    ACBC     project name, letters and digits"),
      Line::from("    IR       instrument code, see below"),
      Line::from("    20240906 measurement date"),
      Line::from("    BEA001   researcher initials followed by the sample number"),
      Line::from("    1        test number or letter"),
      Line::from("    dpt      the instrument's export format"),
      Line::from(""),
      Line::from("  The sample code (BEA001) is the inventory's SampleCode for the sample."),
      Line::from(""),
      heading("Instruments and column layouts"),
      Line::from(""),
    ];

    for instrument in Instrument::ALL {
      let columns = match instrument.expected_columns() {
        Some(n) => format!("{} columns", n),
        None => "free layout".to_string(),
      };
      lines.push(Line::from(vec![
        Span::styled(format!("  {:<8}", instrument.code()), Style::default().fg(Color::Cyan)),
        Span::raw(format!("{} ({})", instrument.description(), columns)),
      ]));
      let labels = instrument.column_labels();
      if !labels.is_empty() {
        lines.push(Line::from(Span::styled(
          format!("          {}", labels.join(" | ")),
          Style::default().fg(Color::DarkGray),
        )));
      }
    }

    lines.extend([
      Line::from(""),
      heading("Submitting data"),
      Line::from(""),
      Line::from("  Edit the inventory with 'e'. 's' uploads the whole table and 'p' only the"),
      Line::from("  rows that are new or changed. Submissions are saved as new files for review"),
      Line::from("  and never overwrite the master inventory. 'C' commits the edited table to"),
      Line::from("  the master directly, and is refused when someone changed it since it was"),
      Line::from("  loaded."),
    ]);
    lines
  }
}

impl Default for DocsView {
  fn default() -> Self {
    Self::new()
  }
}

impl View for DocsView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.scroll = self.scroll.saturating_add(1),
      KeyCode::Char('k') | KeyCode::Up => self.scroll = self.scroll.saturating_sub(1),
      KeyCode::PageDown => self.scroll = self.scroll.saturating_add(10),
      KeyCode::PageUp => self.scroll = self.scroll.saturating_sub(10),
      KeyCode::Char('g') | KeyCode::Home => self.scroll = 0,
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let lines = Self::lines();
    let max_scroll = (lines.len() as u16).saturating_sub(area.height.saturating_sub(2));
    self.scroll = self.scroll.min(max_scroll);

    let paragraph = Paragraph::new(lines)
      .block(
        Block::default()
          .title(" Documentation ")
          .borders(Borders::ALL)
          .border_style(Style::default().fg(Color::Green)),
      )
      .wrap(Wrap { trim: false })
      .scroll((self.scroll, 0));
    frame.render_widget(paragraph, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Docs".to_string()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("j/k", "scroll").with_priority(20),
      ShortcutInfo::new("g", "top").with_priority(30),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
