//! Host-level table of players keyed by caller-chosen id.

use crate::error::Result;
use crate::player::PlayerHandle;
use core_runtime::config::PlayerConfig;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{info, warn};

/// Creates players from one shared [`PlayerConfig`] and tracks them by id.
pub struct PlayerRegistry {
    config: PlayerConfig,
    players: Mutex<HashMap<String, PlayerHandle>>,
}

impl PlayerRegistry {
    pub fn new(config: PlayerConfig) -> Self {
        Self {
            config,
            players: Mutex::new(HashMap::new()),
        }
    }

    /// Spawn a player under `id`. A player already registered under the same
    /// id is disposed first.
    pub async fn init(&self, id: impl Into<String>) -> PlayerHandle {
        let id = id.into();
        let handle = PlayerHandle::spawn(id.clone(), self.config.clone());
        let previous = self.players.lock().insert(id.clone(), handle.clone());

        if let Some(previous) = previous {
            warn!(player = %id, "Replacing existing player");
            if let Err(error) = previous.dispose().await {
                warn!(player = %id, error = %error, "Failed to dispose replaced player");
            }
        }

        info!(player = %id, "Player initialised");
        handle
    }

    pub fn get(&self, id: &str) -> Option<PlayerHandle> {
        self.players.lock().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.players.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.lock().is_empty()
    }

    /// Dispose the player registered under `id` and forget it. Unknown ids
    /// are ignored.
    pub async fn dispose(&self, id: &str) -> Result<()> {
        let Some(handle) = self.players.lock().remove(id) else {
            return Ok(());
        };
        info!(player = %id, "Disposing player");
        handle.dispose().await
    }

    /// Dispose every player. Failures are logged and do not stop the sweep.
    pub async fn dispose_all(&self) {
        let players: Vec<PlayerHandle> = self.players.lock().drain().map(|(_, h)| h).collect();
        for handle in players {
            if let Err(error) = handle.dispose().await {
                warn!(player = handle.id(), error = %error, "Failed to dispose player");
            }
        }
    }
}
