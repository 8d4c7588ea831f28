use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Application events
#[derive(Debug)]
pub enum Event {
  Key(KeyEvent),
  /// Terminal was resized; the next draw picks up the new size
  Resize,
  /// Periodic tick for polling queries
  Tick,
}

/// Terminal input and a tick timer merged into one channel.
pub struct EventHandler {
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    // crossterm's poll/read block, so they get a thread of their own.
    tokio::task::spawn_blocking(move || loop {
      let event = match event::poll(tick_rate) {
        Ok(true) => match event::read() {
          Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => Event::Key(key),
          Ok(CrosstermEvent::Resize(..)) => Event::Resize,
          Ok(_) => continue,
          Err(e) => {
            debug!("Failed to read terminal event: {}", e);
            continue;
          }
        },
        Ok(false) => Event::Tick,
        Err(e) => {
          debug!("Failed to poll terminal: {}", e);
          Event::Tick
        }
      };
      if tx.send(event).is_err() {
        break;
      }
    });

    Self { rx }
  }

  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
