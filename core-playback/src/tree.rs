//! # Audio Source Tree
//!
//! Arena of resolved source nodes keyed by caller id. Resolving a descriptor
//! builds the matching engine constructs bottom-up and caches them, so a
//! second reference to the same id yields the same [`MediaHandle`] without
//! touching the engine.
//!
//! Composite nodes store child *ids*, never handles, which keeps playlist
//! edits a matter of splicing strings in a `Vec` while the engine is told the
//! same splice through its own handles.
//!
//! ## Slots
//!
//! Playback positions are counted in slots, the depth-first flattening of the
//! tree: a leaf is one slot, a concatenation the sum of its children, a clip
//! its child's slots and a loop its child's slots times the repeat count.

use crate::descriptor::AudioSourceDescriptor;
use crate::error::{PlaybackError, Result};
use crate::shuffle::ShuffleGenerator;
use bridge_traits::{Engine, MediaHandle, MediaKind};
use core_runtime::logging::redact_uri;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Shape of a resolved node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Media {
        kind: MediaKind,
        uri: String,
    },
    Concatenating {
        children: Vec<String>,
        use_lazy_preparation: bool,
    },
    Clipping {
        child: String,
        start_ms: i64,
        end_ms: Option<i64>,
    },
    Looping {
        child: String,
        count: u32,
    },
}

/// Resolved node: its engine construct and its shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceNode {
    pub handle: MediaHandle,
    pub kind: NodeKind,
}

/// Engine-facing description of a playlist splice, returned by the edit
/// methods once the arena has been updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Splice {
    pub playlist: MediaHandle,
    pub index: usize,
    pub handles: Vec<MediaHandle>,
}

#[derive(Debug, Default)]
pub struct SourceTree {
    nodes: HashMap<String, SourceNode>,
}

impl SourceTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&SourceNode> {
        self.nodes.get(id)
    }

    pub fn handle(&self, id: &str) -> Option<MediaHandle> {
        self.nodes.get(id).map(|node| node.handle)
    }

    /// Forget every node. Handles become meaningless to the caller.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Resolve `descriptor`, constructing engine objects for any id not seen
    /// before.
    ///
    /// Either the whole descriptor is cached or none of it is: nesting is
    /// checked before the engine is touched, and nodes added by a build that
    /// fails part way are dropped again.
    pub fn resolve(
        &mut self,
        engine: &mut dyn Engine,
        descriptor: &AudioSourceDescriptor,
    ) -> Result<MediaHandle> {
        self.check_nesting(descriptor, &mut Vec::new())?;
        let mut staged = Vec::new();
        let result = self.build(engine, descriptor, &mut staged);
        if result.is_err() {
            self.rollback(staged);
        }
        result
    }

    /// Reject a descriptor that would contain one of its own ancestors,
    /// either directly or through a node already in the arena.
    fn check_nesting<'a>(
        &self,
        descriptor: &'a AudioSourceDescriptor,
        ancestors: &mut Vec<&'a str>,
    ) -> Result<()> {
        let id = descriptor.id();
        let nested = if self.nodes.contains_key(id) {
            ancestors.iter().any(|ancestor| self.contains(id, ancestor))
        } else {
            ancestors.contains(&id)
        };
        if nested {
            return Err(PlaybackError::decode(format!(
                "source '{}' is nested inside itself",
                id
            )));
        }
        if self.nodes.contains_key(id) {
            return Ok(());
        }

        ancestors.push(id);
        let checked = match descriptor {
            AudioSourceDescriptor::Concatenating { audio_sources, .. } => audio_sources
                .iter()
                .try_for_each(|child| self.check_nesting(child, ancestors)),
            AudioSourceDescriptor::Clipping { audio_source, .. }
            | AudioSourceDescriptor::Looping { audio_source, .. } => {
                self.check_nesting(audio_source, ancestors)
            }
            _ => Ok(()),
        };
        ancestors.pop();
        checked
    }

    fn rollback(&mut self, staged: Vec<String>) {
        debug!(count = staged.len(), "Discarding partially resolved sources");
        for id in staged {
            self.nodes.remove(&id);
        }
    }

    /// Build `descriptor` bottom-up, recording every id it adds in `staged`.
    fn build(
        &mut self,
        engine: &mut dyn Engine,
        descriptor: &AudioSourceDescriptor,
        staged: &mut Vec<String>,
    ) -> Result<MediaHandle> {
        let id = descriptor.id();
        if let Some(node) = self.nodes.get(id) {
            trace!(id, "Reusing cached source");
            return Ok(node.handle);
        }

        let (handle, kind) = match descriptor {
            AudioSourceDescriptor::Progressive { uri, .. }
            | AudioSourceDescriptor::Dash { uri, .. }
            | AudioSourceDescriptor::Hls { uri, .. } => {
                let kind = descriptor
                    .media()
                    .map(|(kind, _)| kind)
                    .unwrap_or(MediaKind::Progressive);
                debug!(id, kind = kind.as_str(), uri = %redact_uri(uri), "Creating media source");
                let handle = engine.create_media(kind, uri)?;
                (
                    handle,
                    NodeKind::Media {
                        kind,
                        uri: uri.clone(),
                    },
                )
            }
            AudioSourceDescriptor::Concatenating {
                audio_sources,
                use_lazy_preparation,
                ..
            } => {
                let mut children = Vec::with_capacity(audio_sources.len());
                let mut handles = Vec::with_capacity(audio_sources.len());
                for child in audio_sources {
                    handles.push(self.build(engine, child, staged)?);
                    children.push(child.id().to_string());
                }
                let handle = engine.create_concatenating(&handles, *use_lazy_preparation)?;
                (
                    handle,
                    NodeKind::Concatenating {
                        children,
                        use_lazy_preparation: *use_lazy_preparation,
                    },
                )
            }
            AudioSourceDescriptor::Clipping {
                audio_source,
                start,
                end,
                ..
            } => {
                let child = self.build(engine, audio_source, staged)?;
                let start_ms = start.unwrap_or(0);
                let handle = engine.create_clipping(child, start_ms, *end)?;
                (
                    handle,
                    NodeKind::Clipping {
                        child: audio_source.id().to_string(),
                        start_ms,
                        end_ms: *end,
                    },
                )
            }
            AudioSourceDescriptor::Looping {
                audio_source,
                count,
                ..
            } => {
                let child = self.build(engine, audio_source, staged)?;
                let handle = engine.create_looping(child, *count)?;
                (
                    handle,
                    NodeKind::Looping {
                        child: audio_source.id().to_string(),
                        count: *count,
                    },
                )
            }
        };

        self.nodes
            .insert(id.to_string(), SourceNode { handle, kind });
        staged.push(id.to_string());
        Ok(handle)
    }

    /// Number of playback slots under `id`. Unknown ids have none.
    pub fn slot_count(&self, id: &str) -> usize {
        match self.nodes.get(id).map(|node| &node.kind) {
            None => 0,
            Some(NodeKind::Media { .. }) => 1,
            Some(NodeKind::Concatenating { children, .. }) => {
                children.iter().map(|child| self.slot_count(child)).sum()
            }
            Some(NodeKind::Clipping { child, .. }) => self.slot_count(child),
            Some(NodeKind::Looping { child, count }) => {
                self.slot_count(child) * (*count as usize)
            }
        }
    }

    /// Whether `needle` is `id` or appears anywhere beneath it.
    pub fn contains(&self, id: &str, needle: &str) -> bool {
        if id == needle {
            return true;
        }
        match self.nodes.get(id).map(|node| &node.kind) {
            Some(NodeKind::Concatenating { children, .. }) => {
                children.iter().any(|child| self.contains(child, needle))
            }
            Some(NodeKind::Clipping { child, .. }) | Some(NodeKind::Looping { child, .. }) => {
                self.contains(child, needle)
            }
            _ => false,
        }
    }

    /// Whether building `source` would reuse `target` or any node above it.
    fn reaches(&self, source: &AudioSourceDescriptor, target: &str) -> bool {
        if self.contains(source.id(), target) {
            return true;
        }
        match source {
            AudioSourceDescriptor::Concatenating { audio_sources, .. } => audio_sources
                .iter()
                .any(|child| self.reaches(child, target)),
            AudioSourceDescriptor::Clipping { audio_source, .. }
            | AudioSourceDescriptor::Looping { audio_source, .. } => {
                self.reaches(audio_source, target)
            }
            _ => false,
        }
    }

    // ========================================================================
    // Playlist edits
    // ========================================================================

    fn concatenating(&self, target: &str) -> Result<(MediaHandle, &Vec<String>)> {
        match self.nodes.get(target) {
            Some(SourceNode {
                handle,
                kind: NodeKind::Concatenating { children, .. },
            }) => Ok((*handle, children)),
            Some(_) => Err(PlaybackError::decode(format!(
                "source '{}' is not a concatenating source",
                target
            ))),
            None => Err(PlaybackError::decode(format!("unknown source '{}'", target))),
        }
    }

    fn children_mut(&mut self, target: &str) -> Result<&mut Vec<String>> {
        match self.nodes.get_mut(target) {
            Some(SourceNode {
                kind: NodeKind::Concatenating { children, .. },
                ..
            }) => Ok(children),
            _ => Err(PlaybackError::decode(format!(
                "source '{}' is not a concatenating source",
                target
            ))),
        }
    }

    /// Insert `sources` at `index` (append when `None`) into the
    /// concatenation `target`.
    pub fn insert(
        &mut self,
        engine: &mut dyn Engine,
        target: &str,
        index: Option<usize>,
        sources: &[AudioSourceDescriptor],
    ) -> Result<Splice> {
        let (playlist, children) = self.concatenating(target)?;
        let index = index.unwrap_or(children.len());
        if index > children.len() {
            return Err(PlaybackError::decode(format!(
                "insert index {} out of range for '{}' with {} children",
                index,
                target,
                children.len()
            )));
        }
        for source in sources {
            if self.reaches(source, target) {
                return Err(PlaybackError::decode(format!(
                    "cannot insert '{}' into its own descendant '{}'",
                    source.id(),
                    target
                )));
            }
            self.check_nesting(source, &mut Vec::new())?;
        }

        let mut staged = Vec::new();
        let mut handles = Vec::with_capacity(sources.len());
        for source in sources {
            match self.build(engine, source, &mut staged) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    self.rollback(staged);
                    return Err(e);
                }
            }
        }

        let children = self.children_mut(target)?;
        for (offset, source) in sources.iter().enumerate() {
            children.insert(index + offset, source.id().to_string());
        }

        Ok(Splice {
            playlist,
            index,
            handles,
        })
    }

    /// Remove children `from..to` of `target`.
    pub fn remove_range(&mut self, target: &str, from: usize, to: usize) -> Result<MediaHandle> {
        let (playlist, children) = self.concatenating(target)?;
        if from > to || to > children.len() {
            return Err(PlaybackError::decode(format!(
                "range {}..{} out of bounds for '{}' with {} children",
                from,
                to,
                target,
                children.len()
            )));
        }
        self.children_mut(target)?.drain(from..to);
        Ok(playlist)
    }

    /// Move the child at `from` so it ends up at `to`.
    pub fn move_child(&mut self, target: &str, from: usize, to: usize) -> Result<MediaHandle> {
        let (playlist, children) = self.concatenating(target)?;
        let len = children.len();
        if from >= len || to >= len {
            return Err(PlaybackError::decode(format!(
                "move {} -> {} out of bounds for '{}' with {} children",
                from, to, target, len
            )));
        }
        let children = self.children_mut(target)?;
        let id = children.remove(from);
        children.insert(to, id);
        Ok(playlist)
    }

    pub fn clear_children(&mut self, target: &str) -> Result<MediaHandle> {
        let (playlist, _) = self.concatenating(target)?;
        self.children_mut(target)?.clear();
        Ok(playlist)
    }

    // ========================================================================
    // Shuffle orders
    // ========================================================================

    /// Install fresh shuffle orders on every concatenation under `root`.
    ///
    /// At each level the child whose slot range holds `current_slot` is pinned
    /// to the front. Returns the number of slots walked.
    pub fn assign_shuffle_orders(
        &self,
        engine: &mut dyn Engine,
        generator: &mut ShuffleGenerator,
        root: &str,
        current_slot: Option<usize>,
    ) -> usize {
        self.assign_from(engine, generator, root, 0, current_slot)
    }

    fn assign_from(
        &self,
        engine: &mut dyn Engine,
        generator: &mut ShuffleGenerator,
        id: &str,
        start: usize,
        current_slot: Option<usize>,
    ) -> usize {
        let Some(node) = self.nodes.get(id) else {
            return start;
        };

        match &node.kind {
            NodeKind::Media { .. } => start + 1,
            NodeKind::Clipping { child, .. } => {
                self.assign_from(engine, generator, child, start, current_slot)
            }
            NodeKind::Looping { child, count } => {
                let mut next = start;
                for _ in 0..*count {
                    next = self.assign_from(engine, generator, child, next, current_slot);
                }
                next
            }
            NodeKind::Concatenating { children, .. } => {
                let mut next = start;
                let mut pinned = None;
                for (i, child) in children.iter().enumerate() {
                    let first = next;
                    next = self.assign_from(engine, generator, child, next, current_slot);
                    if current_slot.is_some_and(|slot| slot >= first && slot < next) {
                        pinned = Some(i);
                    }
                }
                let order = generator.generate(children.len(), pinned);
                trace!(id, ?pinned, order = ?order.indices, "Installing shuffle order");
                engine.set_shuffle_order(node.handle, order);
                next
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::{EditTicket, EngineState, RepeatMode, ShuffleOrder};
    use serde_json::json;

    /// Engine that only mints handles and records shuffle orders.
    #[derive(Default)]
    struct ArenaEngine {
        next: u64,
        created: usize,
        refuse_after: Option<usize>,
        orders: Vec<(MediaHandle, ShuffleOrder)>,
    }

    impl ArenaEngine {
        fn mint(&mut self) -> bridge_traits::Result<MediaHandle> {
            if self.refuse_after == Some(self.created) {
                return Err(bridge_traits::BridgeError::OperationFailed(
                    "out of decoders".into(),
                ));
            }
            self.next += 1;
            self.created += 1;
            Ok(MediaHandle::new(self.next))
        }

        fn order_for(&self, handle: MediaHandle) -> &ShuffleOrder {
            &self
                .orders
                .iter()
                .rev()
                .find(|(h, _)| *h == handle)
                .expect("order installed")
                .1
        }
    }

    impl Engine for ArenaEngine {
        fn create_media(&mut self, _: MediaKind, _: &str) -> bridge_traits::Result<MediaHandle> {
            self.mint()
        }
        fn create_concatenating(
            &mut self,
            _: &[MediaHandle],
            _: bool,
        ) -> bridge_traits::Result<MediaHandle> {
            self.mint()
        }
        fn create_clipping(
            &mut self,
            _: MediaHandle,
            _: i64,
            _: Option<i64>,
        ) -> bridge_traits::Result<MediaHandle> {
            self.mint()
        }
        fn create_looping(&mut self, _: MediaHandle, _: u32) -> bridge_traits::Result<MediaHandle> {
            self.mint()
        }
        fn insert_children(&mut self, _: MediaHandle, _: usize, _: &[MediaHandle], _: EditTicket) {}
        fn remove_range(&mut self, _: MediaHandle, _: usize, _: usize, _: EditTicket) {}
        fn move_child(&mut self, _: MediaHandle, _: usize, _: usize, _: EditTicket) {}
        fn clear(&mut self, _: MediaHandle, _: EditTicket) {}
        fn set_shuffle_order(&mut self, playlist: MediaHandle, order: ShuffleOrder) {
            self.orders.push((playlist, order));
        }
        fn prepare(&mut self, _: MediaHandle) {}
        fn stop(&mut self) {}
        fn release(&mut self) {}
        fn set_play_when_ready(&mut self, _: bool) {}
        fn seek_to(&mut self, _: usize, _: Option<i64>) {}
        fn set_volume(&mut self, _: f32) {}
        fn set_playback_rate(&mut self, _: f32) {}
        fn set_repeat_mode(&mut self, _: RepeatMode) {}
        fn set_shuffle_mode_enabled(&mut self, _: bool) {}
        fn shuffle_mode_enabled(&self) -> bool {
            false
        }
        fn state(&self) -> EngineState {
            EngineState::Idle
        }
        fn current_position_ms(&self) -> i64 {
            0
        }
        fn buffered_position_ms(&self) -> i64 {
            0
        }
        fn duration_ms(&self) -> Option<i64> {
            None
        }
        fn current_window_index(&self) -> usize {
            0
        }
    }

    fn leaf(id: &str) -> serde_json::Value {
        json!({"id": id, "type": "progressive", "uri": format!("https://x/{id}.mp3")})
    }

    fn descriptor(value: serde_json::Value) -> AudioSourceDescriptor {
        AudioSourceDescriptor::from_value(value).unwrap()
    }

    #[test]
    fn test_resolve_is_memoized() {
        let mut engine = ArenaEngine::default();
        let mut tree = SourceTree::new();

        let first = tree.resolve(&mut engine, &descriptor(leaf("a"))).unwrap();
        let second = tree.resolve(&mut engine, &descriptor(leaf("a"))).unwrap();

        assert_eq!(first, second);
        assert_eq!(engine.created, 1);
    }

    #[test]
    fn test_shared_child_built_once() {
        let mut engine = ArenaEngine::default();
        let mut tree = SourceTree::new();
        let root = descriptor(json!({
            "id": "root",
            "type": "concatenating",
            "audioSources": [leaf("a"), {"id": "loop", "type": "looping", "count": 2, "audioSource": leaf("a")}]
        }));

        tree.resolve(&mut engine, &root).unwrap();

        // a, loop, root
        assert_eq!(engine.created, 3);
        assert_eq!(tree.slot_count("root"), 3);
    }

    #[test]
    fn test_slot_counts() {
        let mut engine = ArenaEngine::default();
        let mut tree = SourceTree::new();
        let root = descriptor(json!({
            "id": "root",
            "type": "concatenating",
            "audioSources": [
                leaf("a"),
                {"id": "clip", "type": "clipping", "start": 1000, "audioSource": leaf("b")},
                {"id": "loop", "type": "looping", "count": 3, "audioSource": {
                    "id": "inner", "type": "concatenating", "audioSources": [leaf("c"), leaf("d")]
                }}
            ]
        }));

        tree.resolve(&mut engine, &root).unwrap();

        assert_eq!(tree.slot_count("a"), 1);
        assert_eq!(tree.slot_count("clip"), 1);
        assert_eq!(tree.slot_count("inner"), 2);
        assert_eq!(tree.slot_count("loop"), 6);
        assert_eq!(tree.slot_count("root"), 8);
        assert_eq!(tree.slot_count("missing"), 0);
    }

    #[test]
    fn test_clip_defaults_start_to_zero() {
        let mut engine = ArenaEngine::default();
        let mut tree = SourceTree::new();
        tree.resolve(
            &mut engine,
            &descriptor(json!({"id": "clip", "type": "clipping", "end": 3000, "audioSource": leaf("a")})),
        )
        .unwrap();

        assert_eq!(
            tree.get("clip").unwrap().kind,
            NodeKind::Clipping {
                child: "a".into(),
                start_ms: 0,
                end_ms: Some(3000)
            }
        );
    }

    #[test]
    fn test_self_nesting_rejected() {
        let mut engine = ArenaEngine::default();
        let mut tree = SourceTree::new();
        let looped = descriptor(json!({"id": "x", "type": "looping", "count": 2, "audioSource": leaf("x")}));

        let err = tree.resolve(&mut engine, &looped).unwrap_err();
        assert_eq!(err.code(), "decode");
        assert_eq!(engine.created, 0);
    }

    #[test]
    fn test_rejected_descriptor_leaves_no_nodes() {
        let mut engine = ArenaEngine::default();
        let mut tree = SourceTree::new();
        let bad = descriptor(json!({
            "id": "root", "type": "concatenating",
            "audioSources": [leaf("a"), {"id": "x", "type": "looping", "count": 2, "audioSource": leaf("x")}]
        }));

        assert!(tree.resolve(&mut engine, &bad).is_err());
        assert_eq!(engine.created, 0, "nesting is checked before building");
        assert!(tree.is_empty());

        let good = descriptor(json!({"id": "x", "type": "looping", "count": 3, "audioSource": leaf("y")}));
        tree.resolve(&mut engine, &good).unwrap();
        assert_eq!(
            tree.get("x").unwrap().kind,
            NodeKind::Looping {
                child: "y".into(),
                count: 3
            }
        );
    }

    #[test]
    fn test_cached_node_cannot_close_a_cycle() {
        let mut engine = ArenaEngine::default();
        let mut tree = SourceTree::new();
        tree.resolve(
            &mut engine,
            &descriptor(json!({"id": "inner", "type": "clipping", "audioSource": leaf("outer")})),
        )
        .unwrap();
        let created = engine.created;

        let outer = descriptor(json!({
            "id": "outer", "type": "looping", "count": 2,
            "audioSource": {"id": "inner", "type": "clipping", "audioSource": leaf("z")}
        }));
        assert!(tree.resolve(&mut engine, &outer).is_err());
        assert_eq!(engine.created, created);
    }

    #[test]
    fn test_engine_failure_rolls_back_build() {
        let mut engine = ArenaEngine {
            refuse_after: Some(2),
            ..Default::default()
        };
        let mut tree = SourceTree::new();
        let root = descriptor(json!({
            "id": "root", "type": "concatenating", "audioSources": [leaf("a"), leaf("b"), leaf("c")]
        }));

        let err = tree.resolve(&mut engine, &root).unwrap_err();
        assert_eq!(err.code(), "bridge");
        assert!(tree.is_empty());
    }

    #[test]
    fn test_remove_at_leaves_one_slot() {
        let mut engine = ArenaEngine::default();
        let mut tree = SourceTree::new();
        tree.resolve(
            &mut engine,
            &descriptor(json!({
                "id": "root", "type": "concatenating", "useLazyPreparation": false,
                "audioSources": [leaf("a"), leaf("b")]
            })),
        )
        .unwrap();

        tree.remove_range("root", 0, 1).unwrap();

        assert_eq!(tree.slot_count("root"), 1);
        assert!(tree.get("a").is_some(), "removed nodes stay cached");
    }

    #[test]
    fn test_insert_and_move() {
        let mut engine = ArenaEngine::default();
        let mut tree = SourceTree::new();
        tree.resolve(
            &mut engine,
            &descriptor(json!({"id": "root", "type": "concatenating", "audioSources": [leaf("a")]})),
        )
        .unwrap();

        let splice = tree
            .insert(&mut engine, "root", Some(0), &[descriptor(leaf("b")), descriptor(leaf("c"))])
            .unwrap();
        assert_eq!(splice.index, 0);
        assert_eq!(splice.handles.len(), 2);
        assert_eq!(splice.playlist, tree.handle("root").unwrap());

        tree.move_child("root", 0, 2).unwrap();
        match &tree.get("root").unwrap().kind {
            NodeKind::Concatenating { children, .. } => {
                assert_eq!(children, &vec!["c".to_string(), "a".to_string(), "b".to_string()]);
            }
            other => panic!("unexpected kind {other:?}"),
        }

        let appended = tree.insert(&mut engine, "root", None, &[descriptor(leaf("d"))]).unwrap();
        assert_eq!(appended.index, 3);

        tree.clear_children("root").unwrap();
        assert_eq!(tree.slot_count("root"), 0);
    }

    #[test]
    fn test_edit_validation() {
        let mut engine = ArenaEngine::default();
        let mut tree = SourceTree::new();
        tree.resolve(
            &mut engine,
            &descriptor(json!({"id": "root", "type": "concatenating", "audioSources": [leaf("a")]})),
        )
        .unwrap();
        let created = engine.created;

        assert!(tree.remove_range("a", 0, 1).is_err(), "leaf is not a playlist");
        assert!(tree.remove_range("nope", 0, 1).is_err());
        assert!(tree.remove_range("root", 1, 0).is_err());
        assert!(tree.remove_range("root", 0, 2).is_err());
        assert!(tree.move_child("root", 0, 1).is_err());
        assert!(tree
            .insert(&mut engine, "root", Some(2), &[descriptor(leaf("b"))])
            .is_err());
        assert_eq!(engine.created, created, "failed edits build nothing");
        assert_eq!(tree.slot_count("root"), 1);
    }

    #[test]
    fn test_insert_ancestor_rejected() {
        let mut engine = ArenaEngine::default();
        let mut tree = SourceTree::new();
        tree.resolve(
            &mut engine,
            &descriptor(json!({
                "id": "root", "type": "concatenating",
                "audioSources": [{"id": "inner", "type": "concatenating", "audioSources": []}]
            })),
        )
        .unwrap();

        let root_again = descriptor(json!({"id": "root", "type": "concatenating", "audioSources": []}));
        let err = tree.insert(&mut engine, "inner", None, &[root_again]).unwrap_err();
        assert!(err.to_string().contains("own descendant"));

        let wrapped = descriptor(json!({
            "id": "wrap", "type": "looping", "count": 2,
            "audioSource": {"id": "root", "type": "concatenating", "audioSources": []}
        }));
        assert!(tree.insert(&mut engine, "inner", Some(0), &[wrapped]).is_err());
        assert!(tree.get("wrap").is_none(), "nothing built for a rejected insert");
    }

    #[test]
    fn test_insert_all_is_all_or_nothing() {
        let mut engine = ArenaEngine::default();
        let mut tree = SourceTree::new();
        tree.resolve(
            &mut engine,
            &descriptor(json!({"id": "root", "type": "concatenating", "audioSources": [leaf("a")]})),
        )
        .unwrap();
        let created = engine.created;

        let sources = [
            descriptor(leaf("b")),
            descriptor(json!({"id": "x", "type": "looping", "count": 2, "audioSource": leaf("x")})),
        ];
        assert!(tree.insert(&mut engine, "root", None, &sources).is_err());
        assert_eq!(engine.created, created);
        assert!(tree.get("b").is_none());

        engine.refuse_after = Some(created + 1);
        let sources = [descriptor(leaf("b")), descriptor(leaf("c"))];
        assert!(tree.insert(&mut engine, "root", None, &sources).is_err());
        assert!(tree.get("b").is_none(), "earlier sources are rolled back");
        assert_eq!(tree.slot_count("root"), 1);
    }

    #[test]
    fn test_shuffle_pins_current_child_at_every_level() {
        let mut engine = ArenaEngine::default();
        let mut tree = SourceTree::new();
        // slots: a=0, inner=[b=1, c=2, d=3], e=4
        tree.resolve(
            &mut engine,
            &descriptor(json!({
                "id": "root", "type": "concatenating",
                "audioSources": [
                    leaf("a"),
                    {"id": "inner", "type": "concatenating", "audioSources": [leaf("b"), leaf("c"), leaf("d")]},
                    leaf("e")
                ]
            })),
        )
        .unwrap();
        let mut generator = ShuffleGenerator::new(Some(11));

        for _ in 0..20 {
            let walked = tree.assign_shuffle_orders(&mut engine, &mut generator, "root", Some(2));
            assert_eq!(walked, 5);
            let root = tree.handle("root").unwrap();
            let inner = tree.handle("inner").unwrap();
            assert_eq!(engine.order_for(root).first(), Some(1));
            assert_eq!(engine.order_for(inner).first(), Some(1));
        }
    }

    #[test]
    fn test_shuffle_through_loops() {
        let mut engine = ArenaEngine::default();
        let mut tree = SourceTree::new();
        // loop x2 over [a, b]: slots 0..4, then c = 4
        tree.resolve(
            &mut engine,
            &descriptor(json!({
                "id": "root", "type": "concatenating",
                "audioSources": [
                    {"id": "loop", "type": "looping", "count": 2, "audioSource": {
                        "id": "pair", "type": "concatenating", "audioSources": [leaf("a"), leaf("b")]
                    }},
                    leaf("c")
                ]
            })),
        )
        .unwrap();
        let mut generator = ShuffleGenerator::new(Some(5));

        let walked = tree.assign_shuffle_orders(&mut engine, &mut generator, "root", Some(4));

        assert_eq!(walked, 5);
        assert_eq!(engine.order_for(tree.handle("root").unwrap()).first(), Some(1));
        let pair_orders = engine
            .orders
            .iter()
            .filter(|(h, _)| Some(*h) == tree.handle("pair"))
            .count();
        assert_eq!(pair_orders, 2);
    }

    #[test]
    fn test_shuffle_without_current_index() {
        let mut engine = ArenaEngine::default();
        let mut tree = SourceTree::new();
        tree.resolve(
            &mut engine,
            &descriptor(json!({"id": "root", "type": "concatenating", "audioSources": [leaf("a"), leaf("b")]})),
        )
        .unwrap();
        let mut generator = ShuffleGenerator::new(Some(1));

        tree.assign_shuffle_orders(&mut engine, &mut generator, "root", None);

        assert_eq!(engine.order_for(tree.handle("root").unwrap()).len(), 2);
    }
}
