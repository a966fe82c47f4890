//! # Player Usage Example
//!
//! Drives a player against a console engine that acknowledges everything
//! immediately, printing the snapshots the player publishes.
//!
//! Run with: `cargo run --example playback_demo --package core-playback`

use bridge_traits::{
    EditTicket, Engine, EngineEvent, EngineFactory, EngineListener, EngineState, LogLevel,
    MediaHandle, MediaKind, RepeatMode, ShuffleOrder,
};
use core_playback::{AudioSourceDescriptor, PlayerHandle, PlaylistEdit};
use core_runtime::config::PlayerConfig;
use core_runtime::events::PlayerEvent;
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use std::sync::Arc;

// ============================================================================
// Console Engine (for demonstration)
// ============================================================================

struct ConsoleEngine {
    listener: Arc<dyn EngineListener>,
    next_handle: u64,
    position_ms: i64,
    shuffle: bool,
}

impl ConsoleEngine {
    fn mint(&mut self, what: &str) -> bridge_traits::Result<MediaHandle> {
        self.next_handle += 1;
        println!("  engine: create {} -> media#{}", what, self.next_handle);
        Ok(MediaHandle::new(self.next_handle))
    }

    fn ack(&self, ticket: EditTicket) {
        self.listener
            .on_event(EngineEvent::PlaylistEditApplied(ticket));
    }
}

impl Engine for ConsoleEngine {
    fn create_media(&mut self, kind: MediaKind, uri: &str) -> bridge_traits::Result<MediaHandle> {
        self.mint(&format!("{} {}", kind.as_str(), uri))
    }

    fn create_concatenating(
        &mut self,
        children: &[MediaHandle],
        _use_lazy_preparation: bool,
    ) -> bridge_traits::Result<MediaHandle> {
        self.mint(&format!("playlist of {}", children.len()))
    }

    fn create_clipping(
        &mut self,
        child: MediaHandle,
        start_ms: i64,
        end_ms: Option<i64>,
    ) -> bridge_traits::Result<MediaHandle> {
        self.mint(&format!("clip {} [{}..{:?}]", child, start_ms, end_ms))
    }

    fn create_looping(&mut self, child: MediaHandle, count: u32) -> bridge_traits::Result<MediaHandle> {
        self.mint(&format!("loop {} x{}", child, count))
    }

    fn insert_children(
        &mut self,
        playlist: MediaHandle,
        index: usize,
        children: &[MediaHandle],
        ticket: EditTicket,
    ) {
        println!("  engine: {} insert {} at {}", playlist, children.len(), index);
        self.ack(ticket);
    }

    fn remove_range(&mut self, playlist: MediaHandle, from: usize, to: usize, ticket: EditTicket) {
        println!("  engine: {} remove {}..{}", playlist, from, to);
        self.ack(ticket);
    }

    fn move_child(&mut self, playlist: MediaHandle, from: usize, to: usize, ticket: EditTicket) {
        println!("  engine: {} move {} -> {}", playlist, from, to);
        self.ack(ticket);
    }

    fn clear(&mut self, playlist: MediaHandle, ticket: EditTicket) {
        println!("  engine: {} clear", playlist);
        self.ack(ticket);
    }

    fn set_shuffle_order(&mut self, playlist: MediaHandle, order: ShuffleOrder) {
        println!("  engine: {} shuffle order {:?}", playlist, order.indices);
    }

    fn prepare(&mut self, root: MediaHandle) {
        println!("  engine: prepare {}", root);
        self.listener.on_event(EngineEvent::StateChanged {
            play_when_ready: false,
            state: EngineState::Ready,
        });
    }

    fn stop(&mut self) {}

    fn release(&mut self) {
        println!("  engine: released");
    }

    fn set_play_when_ready(&mut self, play_when_ready: bool) {
        println!("  engine: play_when_ready = {}", play_when_ready);
    }

    fn seek_to(&mut self, window_index: usize, position_ms: Option<i64>) {
        self.position_ms = position_ms.unwrap_or(0);
        println!("  engine: seek window {} to {:?}", window_index, position_ms);
        self.listener.on_event(EngineEvent::SeekProcessed);
    }

    fn set_volume(&mut self, _volume: f32) {}

    fn set_playback_rate(&mut self, _rate: f32) {}

    fn set_repeat_mode(&mut self, mode: RepeatMode) {
        println!("  engine: repeat {:?}", mode);
    }

    fn set_shuffle_mode_enabled(&mut self, enabled: bool) {
        self.shuffle = enabled;
    }

    fn shuffle_mode_enabled(&self) -> bool {
        self.shuffle
    }

    fn state(&self) -> EngineState {
        EngineState::Ready
    }

    fn current_position_ms(&self) -> i64 {
        self.position_ms
    }

    fn buffered_position_ms(&self) -> i64 {
        self.position_ms + 15_000
    }

    fn duration_ms(&self) -> Option<i64> {
        Some(240_000)
    }

    fn current_window_index(&self) -> usize {
        0
    }
}

struct ConsoleEngineFactory;

impl EngineFactory for ConsoleEngineFactory {
    fn create(&self, listener: Arc<dyn EngineListener>) -> bridge_traits::Result<Box<dyn Engine>> {
        Ok(Box::new(ConsoleEngine {
            listener,
            next_handle: 0,
            position_ms: 0,
            shuffle: false,
        }))
    }
}

// ============================================================================
// Main Example
// ============================================================================

fn track(id: &str) -> AudioSourceDescriptor {
    AudioSourceDescriptor::Progressive {
        id: id.to_string(),
        uri: format!("https://example.com/audio/{id}.mp3"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_level(LogLevel::Debug),
    )
    .ok();

    println!("=== Player Demo ===\n");

    let config = PlayerConfig::builder()
        .engine_factory(Arc::new(ConsoleEngineFactory))
        .build()?;
    let player = PlayerHandle::spawn("demo", config);

    let mut events = player.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                PlayerEvent::Snapshot(s) => println!(
                    "  event: {} position={}ms buffered={}ms item={:?}",
                    s.phase, s.position_ms, s.buffered_position_ms, s.current_item_index
                ),
                PlayerEvent::Error { code, message } => {
                    println!("  event: error {} {}", code, message)
                }
            }
        }
    });

    println!("1. Loading a playlist...");
    let duration = player
        .load(AudioSourceDescriptor::Concatenating {
            id: "queue".into(),
            audio_sources: vec![track("opening"), track("interlude")],
            use_lazy_preparation: true,
        })
        .await?;
    println!("   ✓ Ready, duration {:?} ms\n", duration);

    println!("2. Editing the queue...");
    player
        .edit("queue", PlaylistEdit::Add(track("finale")))
        .await?;
    player
        .edit("queue", PlaylistEdit::Move { from: 2, to: 0 })
        .await?;
    println!("   ✓ Edits applied\n");

    println!("3. Transport...");
    player.set_loop_mode(RepeatMode::All).await?;
    player.play().await?;
    player.seek(Some(42_000), None).await?;
    player.pause().await?;
    println!("   ✓ Done\n");

    println!("4. Disposing...");
    player.dispose().await?;
    drop(player);
    printer.await.ok();

    println!("\n=== Demo Complete ===");
    Ok(())
}
