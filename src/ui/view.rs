use crossterm::event::KeyEvent;
use ratatui::prelude::*;

use super::renderfns::StatusMessage;

/// A keyboard shortcut hint for display in the header
#[derive(Debug, Clone)]
pub struct ShortcutInfo {
  pub key: &'static str,
  pub label: &'static str,
  pub priority: u8, // Lower = shown first
}

impl ShortcutInfo {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

/// Actions that a view can request in response to user input
pub enum ViewAction {
  None,
  /// Push a new view onto the stack
  Push(Box<dyn View>),
  /// Go back to the view underneath
  Pop,
  /// Swap the current view for another (login -> inventory)
  Replace(Box<dyn View>),
  Quit,
}

/// Trait for view behavior
///
/// Views handle their own input modes (search, cell editing) and return
/// actions for the App to execute: App → View → Components.
///
/// Views that load data asynchronously own a `Query<T>` and poll it in
/// `tick()`.
pub trait View {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  fn render(&mut self, frame: &mut Frame, area: Rect);

  fn breadcrumb_label(&self) -> String;

  /// Called on each tick to poll async queries
  fn tick(&mut self) {}

  /// Called when the view becomes visible again after the one above it
  /// was popped
  fn resume(&mut self) {}

  /// Whether `:` opens the command palette. False while the view is taking
  /// text input or before the dashboard is unlocked.
  fn accepts_commands(&self) -> bool {
    true
  }

  /// Latest outcome to show in the footer (upload done, request failed)
  fn status(&self) -> Option<StatusMessage> {
    None
  }

  /// Run a palette command. Only called on the root view.
  fn handle_command(&mut self, _command: &str) -> ViewAction {
    ViewAction::None
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
