//! Buffered-position watcher.
//!
//! A one-shot delayed tick re-armed after every tick. The interval is picked
//! from the player's state at tick time; when no interval applies the watcher
//! goes quiet until restarted.

use crate::command::Command;
use core_runtime::config::BufferPollIntervals;
use core_runtime::events::PlaybackPhase;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep;
use tracing::trace;

/// Delay before the next tick, or `None` to stop watching.
pub fn next_poll_interval(
    intervals: &BufferPollIntervals,
    phase: PlaybackPhase,
    buffering: bool,
    just_connected: bool,
) -> Option<Duration> {
    if buffering {
        Some(intervals.buffering)
    } else if phase == PlaybackPhase::Playing {
        Some(intervals.playing)
    } else if phase == PlaybackPhase::Paused {
        Some(intervals.paused)
    } else if just_connected {
        Some(intervals.connected)
    } else {
        None
    }
}

#[derive(Debug, Default)]
pub(crate) struct BufferWatcher {
    generation: u64,
    cancel: Option<oneshot::Sender<()>>,
}

impl BufferWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop any pending tick and post one immediately.
    pub fn restart(&mut self, sender: &mpsc::WeakUnboundedSender<Command>) {
        self.cancel();
        if let Some(sender) = sender.upgrade() {
            let _ = sender.send(Command::WatchBuffer {
                generation: self.generation,
            });
        }
    }

    /// Drop any pending tick. Ticks already queued become stale.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Post a tick of the current generation after `delay`.
    pub fn schedule(&mut self, delay: Duration, sender: mpsc::WeakUnboundedSender<Command>) {
        let generation = self.generation;
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();
        // Replacing the sender also cancels a tick scheduled earlier.
        self.cancel = Some(cancel_tx);

        tokio::spawn(async move {
            let delay_sleep = sleep(delay);
            tokio::pin!(delay_sleep);
            tokio::select! {
                _ = &mut cancel_rx => {
                    trace!(generation, "Buffer tick cancelled");
                    return;
                }
                _ = delay_sleep.as_mut() => {}
            }

            if let Some(sender) = sender.upgrade() {
                let _ = sender.send(Command::WatchBuffer { generation });
            }
        });
    }
}
