//! Admission control for fan-out passes.
//!
//! The platform enforces a fixed per-minute ceiling per bot, so a pass
//! spends from a batch bucket that refills completely after a cooldown,
//! and consecutive items are additionally spaced apart.

use std::time::Duration;

use tracing::info;

/// Decision for the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admit {
    Now,
    /// The batch is spent; wait this long, then go.
    AfterCooldown(Duration),
}

/// Fixed-size batch bucket, refilled in full after each cooldown.
/// Successes and failures spend from it alike.
#[derive(Debug, Clone)]
pub struct BatchBucket {
    capacity: u32,
    remaining: u32,
    cooldown: Duration,
}

impl BatchBucket {
    pub fn new(capacity: u32, cooldown: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            remaining: capacity,
            cooldown,
        }
    }

    /// Spend one attempt.
    pub fn take(&mut self) -> Admit {
        if self.remaining == 0 {
            self.remaining = self.capacity - 1;
            Admit::AfterCooldown(self.cooldown)
        } else {
            self.remaining -= 1;
            Admit::Now
        }
    }
}

/// Rate and burst parameters shared by every pass of one kind.
#[derive(Debug, Clone, Copy)]
pub struct AdmissionPolicy {
    pub batch_size: u32,
    pub cooldown: Duration,
    pub spacing: Duration,
}

impl AdmissionPolicy {
    /// Fresh counters for one pass over a destination list.
    pub fn start(&self) -> Admission {
        Admission {
            bucket: BatchBucket::new(self.batch_size, self.cooldown),
            spacing: self.spacing,
            started: false,
            cooldowns: 0,
        }
    }
}

/// Admission state of a single pass.
#[derive(Debug)]
pub struct Admission {
    bucket: BatchBucket,
    spacing: Duration,
    started: bool,
    cooldowns: u32,
}

impl Admission {
    /// Wait until the next attempt may go out.
    pub async fn acquire(&mut self) {
        match self.bucket.take() {
            Admit::AfterCooldown(wait) => {
                self.cooldowns += 1;
                info!(
                    cooldown_secs = wait.as_secs(),
                    round = self.cooldowns,
                    "Batch spent, cooling down"
                );
                tokio::time::sleep(wait).await;
            }
            Admit::Now if self.started && !self.spacing.is_zero() => {
                tokio::time::sleep(self.spacing).await;
            }
            Admit::Now => {}
        }
        self.started = true;
    }

    /// Cooldowns taken so far in this pass.
    pub fn cooldowns(&self) -> u32 {
        self.cooldowns
    }
}
