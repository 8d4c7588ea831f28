use crate::commands;
use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::gate::Gate;
use crate::store::RemoteStore;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::renderfns::{HeaderInfo, StatusMessage};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::LoginView;
use crate::ui::{self, SharedSession};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::{stdout, Stdout};
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_TITLE: &str = "AC/BC";

/// Main application state
pub struct App {
  session: SharedSession,

  /// Navigation stack; the root is the login view, then the inventory
  views: Vec<Box<dyn View>>,

  /// `:` palette, shared by every view
  command: CommandInput,

  /// Palette feedback (unknown command)
  status: Option<StatusMessage>,

  store_label: String,

  should_quit: bool,
}

impl App {
  pub fn new(session: SharedSession) -> Result<Self> {
    let gate = Gate::new(&Config::dashboard_password()?);
    let store_label = session.store().describe();
    let login = LoginView::new(session.clone(), gate);

    Ok(Self {
      session,
      views: vec![Box::new(login)],
      command: CommandInput::new(),
      status: None,
      store_label,
      should_quit: false,
    })
  }

  pub async fn run(&mut self) -> Result<()> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    info!("Dashboard started");

    let result = self.event_loop(&mut terminal).await;

    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    info!("Dashboard closed");
    result
  }

  async fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    let mut events = EventHandler::new(Duration::from_millis(250));

    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(Event::Key(key)) => self.handle_key(key),
        Some(Event::Tick) => self.tick(),
        Some(Event::Resize) => {}
        None => break,
      }
    }
    Ok(())
  }

  fn tick(&mut self) {
    // Every view polls so a fetch started underneath still lands.
    for view in &mut self.views {
      view.tick();
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    if self.command.is_active() {
      if let KeyResult::Event(CommandEvent::Submitted(cmd)) = self.command.handle_key(key) {
        self.run_command(&cmd);
      }
      return;
    }

    let Some(view) = self.views.last_mut() else {
      self.should_quit = true;
      return;
    };

    if key.code == KeyCode::Char(':') && view.accepts_commands() {
      self.status = None;
      self.command.activate();
      return;
    }

    let action = view.handle_key(key);
    self.apply(action);
  }

  fn run_command(&mut self, cmd: &str) {
    debug!(cmd, "Running command");
    if cmd == "quit" {
      self.should_quit = true;
      return;
    }
    if !commands::COMMANDS.iter().any(|c| c.name == cmd) {
      self.status = Some(StatusMessage::Error(format!("Unknown command: {}", cmd)));
      return;
    }

    // Commands start from the root view, like a fresh navigation.
    if self.views.len() > 1 {
      self.views.truncate(1);
      if let Some(root) = self.views.first_mut() {
        root.resume();
      }
    }
    let action = match self.views.first_mut() {
      Some(root) => root.handle_command(cmd),
      None => ViewAction::None,
    };
    self.apply(action);
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => self.views.push(view),
      ViewAction::Pop => {
        if self.views.len() > 1 {
          self.views.pop();
          if let Some(view) = self.views.last_mut() {
            view.resume();
          }
        } else {
          self.should_quit = true;
        }
      }
      ViewAction::Replace(view) => {
        self.views.pop();
        self.views.push(view);
      }
      ViewAction::Quit => self.should_quit = true,
    }
  }

  // Accessors for rendering

  pub fn header_info(&self) -> HeaderInfo<'_> {
    HeaderInfo {
      title: self
        .session
        .config()
        .title
        .as_deref()
        .unwrap_or(DEFAULT_TITLE),
      store: &self.store_label,
      cached_at: self.session.inventory_cached_at(),
    }
  }

  pub fn shortcuts(&self) -> Vec<ShortcutInfo> {
    self
      .views
      .last()
      .map(|view| view.shortcuts())
      .unwrap_or_default()
  }

  pub fn breadcrumb(&self) -> Vec<String> {
    self.views.iter().map(|v| v.breadcrumb_label()).collect()
  }

  pub fn status(&self) -> Option<StatusMessage> {
    self
      .status
      .clone()
      .or_else(|| self.views.last().and_then(|v| v.status()))
  }

  pub fn render_view(&mut self, frame: &mut Frame, area: Rect) {
    if let Some(view) = self.views.last_mut() {
      view.render(frame, area);
    }
    self.command.render_overlay(frame, area);
  }
}
