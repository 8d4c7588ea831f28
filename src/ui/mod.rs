pub mod components;
pub mod renderfns;
pub mod view;
pub mod views;

use std::sync::Arc;

use crate::app::App;
use crate::session::Session;
use crate::store::AnyStore;
use ratatui::prelude::*;
use renderfns::{draw_footer, draw_header};

/// The session every view talks to
pub type SharedSession = Arc<Session<AnyStore>>;

/// Keep a list/table selection inside `0..len`, selecting the first row
/// when there is none.
pub fn clamp_selection(selected: Option<usize>, len: usize) -> Option<usize> {
  match (selected, len) {
    (_, 0) => None,
    (None, _) => Some(0),
    (Some(i), len) => Some(i.min(len - 1)),
  }
}

pub fn draw(frame: &mut Frame, app: &mut App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Current view
      Constraint::Length(1), // Footer
    ])
    .split(frame.area());

  let header = app.header_info();
  let shortcuts = app.shortcuts();
  draw_header(frame, chunks[0], &header, &shortcuts);

  app.render_view(frame, chunks[1]);

  let status = app.status();
  draw_footer(frame, chunks[2], &app.breadcrumb(), status.as_ref());
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_clamp_selection() {
    assert_eq!(clamp_selection(Some(3), 0), None);
    assert_eq!(clamp_selection(None, 4), Some(0));
    assert_eq!(clamp_selection(Some(9), 4), Some(3));
    assert_eq!(clamp_selection(Some(1), 4), Some(1));
  }
}
