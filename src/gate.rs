//! Shared group password in front of the dashboard.

use sha2::{Digest, Sha256};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
  Locked,
  Rejected { attempts: u32 },
  Unlocked,
}

pub struct Gate {
  expected: [u8; 32],
  state: GateState,
}

impl Gate {
  pub fn new(expected: &str) -> Self {
    Self {
      expected: digest(expected),
      state: GateState::Locked,
    }
  }

  pub fn state(&self) -> GateState {
    self.state
  }

  pub fn is_unlocked(&self) -> bool {
    self.state == GateState::Unlocked
  }

  /// Check an attempt. Once unlocked the gate stays unlocked.
  pub fn verify(&mut self, attempt: &str) -> GateState {
    if self.is_unlocked() {
      return self.state;
    }

    // Both sides are hashed so the comparison length never depends on input.
    let matches = digest(attempt)
      .iter()
      .zip(self.expected.iter())
      .fold(0u8, |acc, (a, b)| acc | (a ^ b))
      == 0;

    self.state = if matches {
      info!("Dashboard unlocked");
      GateState::Unlocked
    } else {
      let attempts = match self.state {
        GateState::Rejected { attempts } => attempts.saturating_add(1),
        _ => 1,
      };
      warn!(attempts, "Dashboard password rejected");
      GateState::Rejected { attempts }
    };
    self.state
  }
}

fn digest(value: &str) -> [u8; 32] {
  Sha256::digest(value.as_bytes()).into()
}
