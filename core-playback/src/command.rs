//! Messages drained by a player task.

use crate::error::{PlaybackError, Result};
use crate::request::Request;
use bridge_traits::{EngineEvent, EngineListener};
use core_runtime::events::PlayerEvent;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

/// Everything that can happen to a player, in arrival order.
#[derive(Debug)]
pub(crate) enum Command {
    /// Caller request, answered through `reply`.
    Invoke { request: Request, reply: Reply },
    /// Callback posted by the engine.
    Engine(EngineEvent),
    /// Replace the event subscriber.
    Subscribe(mpsc::UnboundedSender<PlayerEvent>),
    /// Buffer watcher tick for the given watcher generation.
    WatchBuffer { generation: u64 },
}

/// One-shot completion of a caller request.
///
/// Consumed on use, so a request cannot be answered twice. Dropping it
/// unanswered makes the caller observe [`PlaybackError::Disposed`].
#[derive(Debug)]
pub(crate) struct Reply(oneshot::Sender<Result<Value>>);

impl Reply {
    pub fn channel() -> (Self, oneshot::Receiver<Result<Value>>) {
        let (sender, receiver) = oneshot::channel();
        (Self(sender), receiver)
    }

    pub fn send(self, result: Result<Value>) {
        // The caller may have stopped waiting.
        let _ = self.0.send(result);
    }

    pub fn ok(self, value: Value) {
        self.send(Ok(value));
    }

    pub fn err(self, error: PlaybackError) {
        self.send(Err(error));
    }
}

/// Engine listener that forwards callbacks onto the player's queue.
///
/// Holds a weak sender so an engine outliving its player does not keep the
/// player task alive.
pub(crate) struct ChannelListener {
    sender: mpsc::WeakUnboundedSender<Command>,
}

impl ChannelListener {
    pub fn new(sender: mpsc::WeakUnboundedSender<Command>) -> Self {
        Self { sender }
    }
}

impl EngineListener for ChannelListener {
    fn on_event(&self, event: EngineEvent) {
        if let Some(sender) = self.sender.upgrade() {
            let _ = sender.send(Command::Engine(event));
        }
    }
}
