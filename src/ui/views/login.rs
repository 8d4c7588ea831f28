use crate::gate::{Gate, GateState};
use crate::ui::components::{InputResult, TextInput};
use crate::ui::renderfns::centered_rect;
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::InventoryView;
use crate::ui::SharedSession;
use crossterm::event::KeyEvent;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

/// Password prompt in front of everything else
pub struct LoginView {
  session: SharedSession,
  gate: Gate,
  input: TextInput,
}

impl LoginView {
  pub fn new(session: SharedSession, gate: Gate) -> Self {
    Self {
      session,
      gate,
      input: TextInput::new(),
    }
  }
}

impl View for LoginView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.input.handle_key(key) {
      InputResult::Submitted(attempt) => {
        self.input.clear();
        match self.gate.verify(&attempt) {
          GateState::Unlocked => {
            ViewAction::Replace(Box::new(InventoryView::new(self.session.clone())))
          }
          _ => ViewAction::None,
        }
      }
      InputResult::Cancelled => ViewAction::Quit,
      InputResult::Consumed | InputResult::NotHandled => ViewAction::None,
    }
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let title = self.session.config().title.as_deref().unwrap_or("AC/BC");
    let box_area = centered_rect(52, 9, area);

    let block = Block::default()
      .title(format!(" Welcome to {} ", title))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Green));

    let mut password = vec![Span::styled("Password: ", Style::default().fg(Color::Cyan))];
    password.extend(self.input.spans(Some('*')));

    let mut lines = vec![
      Line::from("Enter the group's password to access the dashboard."),
      Line::from(""),
      Line::from(password),
      Line::from(""),
    ];
    if let GateState::Rejected { attempts } = self.gate.state() {
      let suffix = if attempts > 1 { format!(" ({} attempts)", attempts) } else { String::new() };
      lines.push(Line::from(Span::styled(
        format!("Password incorrect{}", suffix),
        Style::default().fg(Color::Red),
      )));
    }

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    frame.render_widget(paragraph, box_area);
  }

  fn breadcrumb_label(&self) -> String {
    "Login".to_string()
  }

  fn accepts_commands(&self) -> bool {
    false
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("enter", "unlock").with_priority(10),
      ShortcutInfo::new("esc", "quit").with_priority(90),
    ]
  }
}
