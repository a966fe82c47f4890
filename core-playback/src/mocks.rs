//! Shared mockall doubles for unit tests.

use bridge_traits::{
    Clock, EditTicket, Engine, EngineState, MediaHandle, MediaKind, RepeatMode, ShuffleOrder,
};
use mockall::mock;

mock! {
    pub Engine {}

    impl Engine for Engine {
        fn create_media(&mut self, kind: MediaKind, uri: &str) -> bridge_traits::Result<MediaHandle>;
        fn create_concatenating(&mut self, children: &[MediaHandle], use_lazy_preparation: bool) -> bridge_traits::Result<MediaHandle>;
        fn create_clipping(&mut self, child: MediaHandle, start_ms: i64, end_ms: Option<i64>) -> bridge_traits::Result<MediaHandle>;
        fn create_looping(&mut self, child: MediaHandle, count: u32) -> bridge_traits::Result<MediaHandle>;
        fn insert_children(&mut self, playlist: MediaHandle, index: usize, children: &[MediaHandle], ticket: EditTicket);
        fn remove_range(&mut self, playlist: MediaHandle, from: usize, to: usize, ticket: EditTicket);
        fn move_child(&mut self, playlist: MediaHandle, from: usize, to: usize, ticket: EditTicket);
        fn clear(&mut self, playlist: MediaHandle, ticket: EditTicket);
        fn set_shuffle_order(&mut self, playlist: MediaHandle, order: ShuffleOrder);
        fn prepare(&mut self, root: MediaHandle);
        fn stop(&mut self);
        fn release(&mut self);
        fn set_play_when_ready(&mut self, play_when_ready: bool);
        fn seek_to(&mut self, window_index: usize, position_ms: Option<i64>);
        fn set_volume(&mut self, volume: f32);
        fn set_playback_rate(&mut self, rate: f32);
        fn set_repeat_mode(&mut self, mode: RepeatMode);
        fn set_shuffle_mode_enabled(&mut self, enabled: bool);
        fn shuffle_mode_enabled(&self) -> bool;
        fn state(&self) -> EngineState;
        fn current_position_ms(&self) -> i64;
        fn buffered_position_ms(&self) -> i64;
        fn duration_ms(&self) -> Option<i64>;
        fn current_window_index(&self) -> usize;
    }
}

mock! {
    pub Clock {}

    impl Clock for Clock {
        fn now(&self) -> chrono::DateTime<chrono::Utc>;
    }
}
