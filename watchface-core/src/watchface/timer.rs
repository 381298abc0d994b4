use std::time::Duration;
use tokio::{sync::mpsc, task::JoinHandle};

use super::engine::EngineMessage;

/// The repaint timer runs only while the face is visible and interactive.
pub fn should_run(visible: bool, ambient: bool) -> bool {
    visible && !ambient
}

/// Time left until the next whole multiple of `rate`.
pub fn delay_until_next_tick(now_ms: i64, rate: Duration) -> Duration {
    let rate_ms = (rate.as_millis() as i64).max(1);
    Duration::from_millis((rate_ms - now_ms.rem_euclid(rate_ms)) as u64)
}

/// Self-rescheduling delayed message into the engine inbox.
///
/// Only a weak sender is held, so a pending firing never keeps the engine
/// alive. Every firing carries the generation it was scheduled under; a
/// firing from an older generation is stale and must be dropped.
#[derive(Debug)]
pub struct RepaintTimer {
    rate: Duration,
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

impl RepaintTimer {
    pub fn new(rate: Duration) -> Self {
        Self { rate, generation: 0, pending: None }
    }

    pub fn rate(&self) -> Duration {
        self.rate
    }

    /// Drop any pending firing, including one already sitting in the inbox.
    pub fn cancel(&mut self) {
        self.generation += 1;
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }

    /// Replace any pending firing with one after `delay`.
    pub fn schedule(&mut self, delay: Duration, inbox: mpsc::WeakUnboundedSender<EngineMessage>) {
        self.cancel();
        let generation = self.generation;

        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inbox) = inbox.upgrade() {
                let _ = inbox.send(EngineMessage::UpdateTime { generation });
            }
        }));
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.pending.is_some() && self.generation == generation
    }

    /// A firing is pending or delivered but not yet handled.
    pub fn is_scheduled(&self) -> bool {
        self.pending.is_some()
    }

    /// Mark the current firing as handled.
    pub fn fired(&mut self) {
        self.pending = None;
    }
}

impl Drop for RepaintTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
