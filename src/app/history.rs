use crate::app::events::{DirectEvent, EventQueue};
use crate::scene::{NodeId, SceneGraph, Transform};
use std::collections::VecDeque;

pub const DEFAULT_UNDO_DEPTH: usize = 25;

/// Local transforms captured just before an edit.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformGroup {
    pub entries: Vec<(NodeId, Transform)>,
}

impl TransformGroup {
    pub fn capture(scene: &SceneGraph, nodes: &[NodeId]) -> Self {
        let entries = nodes
            .iter()
            .filter_map(|n| scene.transform(*n).map(|t| (*n, t)))
            .collect();
        Self { entries }
    }

    pub fn nodes(&self) -> Vec<NodeId> {
        self.entries.iter().map(|(n, _)| *n).collect()
    }

    fn restore(&self, scene: &mut SceneGraph) {
        for (node, transform) in &self.entries {
            if scene.set_transform(*node, *transform).is_none() {
                log::debug!("skipping restore of removed node {node:?}");
            }
        }
    }
}

/// Bounded undo and redo stacks of transform groups.
#[derive(Debug, Clone)]
pub struct UndoHistory {
    undo: VecDeque<TransformGroup>,
    redo: VecDeque<TransformGroup>,
    depth: usize,
}

impl Default for UndoHistory {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_DEPTH)
    }
}

impl UndoHistory {
    pub fn new(depth: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: VecDeque::new(),
            depth: depth.max(1),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn peek_undo(&self) -> Option<&TransformGroup> {
        self.undo.back()
    }

    pub fn peek_redo(&self) -> Option<&TransformGroup> {
        self.redo.back()
    }

    /// Records the current transforms of `nodes`. A fresh edit (`reset_redo`)
    /// invalidates everything on the redo stack.
    pub fn push_undo(
        &mut self,
        scene: &SceneGraph,
        nodes: &[NodeId],
        reset_redo: bool,
        events: &mut EventQueue,
    ) {
        push_bounded(&mut self.undo, TransformGroup::capture(scene, nodes), self.depth);
        events.send(DirectEvent::PushUndo);
        if reset_redo && !nodes.is_empty() {
            self.redo.clear();
            events.send(DirectEvent::RedoListEmpty);
        }
    }

    pub fn push_redo(&mut self, scene: &SceneGraph, nodes: &[NodeId], events: &mut EventQueue) {
        push_bounded(&mut self.redo, TransformGroup::capture(scene, nodes), self.depth);
        events.send(DirectEvent::PushRedo);
    }

    /// Restores the most recent undo group. Returns the affected nodes.
    pub fn undo(&mut self, scene: &mut SceneGraph, events: &mut EventQueue) -> Option<Vec<NodeId>> {
        let group = self.undo.pop_back()?;
        if self.undo.is_empty() {
            events.send(DirectEvent::UndoListEmpty);
        }
        let nodes = group.nodes();
        self.push_redo(scene, &nodes, events);
        group.restore(scene);
        log::info!("undo: restored {} node(s)", nodes.len());
        events.send(DirectEvent::Undo(nodes.clone()));
        Some(nodes)
    }

    pub fn redo(&mut self, scene: &mut SceneGraph, events: &mut EventQueue) -> Option<Vec<NodeId>> {
        let group = self.redo.pop_back()?;
        if self.redo.is_empty() {
            events.send(DirectEvent::RedoListEmpty);
        }
        let nodes = group.nodes();
        self.push_undo(scene, &nodes, false, events);
        group.restore(scene);
        log::info!("redo: restored {} node(s)", nodes.len());
        events.send(DirectEvent::Redo(nodes.clone()));
        Some(nodes)
    }

    pub fn clear(&mut self, events: &mut EventQueue) {
        self.undo.clear();
        self.redo.clear();
        events.send(DirectEvent::UndoListEmpty);
        events.send(DirectEvent::RedoListEmpty);
    }

    /// Forgets entries for removed nodes and drops groups left empty.
    pub fn sweep_stale(&mut self, scene: &SceneGraph) -> usize {
        let mut dropped = 0;
        for stack in [&mut self.undo, &mut self.redo] {
            for group in stack.iter_mut() {
                let before = group.entries.len();
                group.entries.retain(|(n, _)| scene.contains(*n));
                dropped += before - group.entries.len();
            }
            stack.retain(|g| !g.entries.is_empty());
        }
        if dropped > 0 {
            log::info!("undo history: dropped {dropped} stale entr(ies)");
        }
        dropped
    }
}

fn push_bounded(stack: &mut VecDeque<TransformGroup>, group: TransformGroup, depth: usize) {
    stack.push_back(group);
    while stack.len() > depth {
        stack.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    fn setup() -> (SceneGraph, NodeId, NodeId) {
        let mut scene = SceneGraph::new();
        let a = scene.attach_new_node(scene.root(), "a").unwrap();
        let b = scene.attach_new_node(scene.root(), "b").unwrap();
        scene.set_pos(b, DVec3::new(5.0, 0.0, 0.0));
        (scene, a, b)
    }

    #[test]
    fn undo_then_redo_round_trips() {
        let (mut scene, a, b) = setup();
        let mut history = UndoHistory::default();
        let mut events = EventQueue::new();
        history.push_undo(&scene, &[a, b], true, &mut events);
        scene.set_pos(a, DVec3::new(0.0, 3.0, 0.0));
        scene.set_pos(b, DVec3::new(5.0, 3.0, 0.0));

        assert_eq!(history.undo(&mut scene, &mut events), Some(vec![a, b]));
        assert_eq!(scene.pos(a), Some(DVec3::ZERO));
        assert_eq!(scene.pos(b), Some(DVec3::new(5.0, 0.0, 0.0)));
        assert_eq!(history.undo_len(), 0);
        assert_eq!(history.redo_len(), 1);

        history.redo(&mut scene, &mut events);
        assert_eq!(scene.pos(a), Some(DVec3::new(0.0, 3.0, 0.0)));
        assert_eq!(scene.pos(b), Some(DVec3::new(5.0, 3.0, 0.0)));
        assert_eq!(history.undo_len(), 1);
        assert_eq!(history.redo_len(), 0);
    }

    #[test]
    fn new_edit_clears_redo() {
        let (mut scene, a, _) = setup();
        let mut history = UndoHistory::default();
        let mut events = EventQueue::new();
        history.push_undo(&scene, &[a], true, &mut events);
        history.undo(&mut scene, &mut events);
        assert!(history.can_redo());
        events.drain();
        history.push_undo(&scene, &[a], true, &mut events);
        assert!(!history.can_redo());
        assert_eq!(
            events.drain(),
            vec![DirectEvent::PushUndo, DirectEvent::RedoListEmpty]
        );
    }

    #[test]
    fn stacks_are_bounded() {
        let (scene, a, _) = setup();
        let mut history = UndoHistory::new(3);
        let mut events = EventQueue::new();
        for _ in 0..10 {
            history.push_undo(&scene, &[a], true, &mut events);
        }
        assert_eq!(history.undo_len(), 3);
    }

    #[test]
    fn empty_events_fire_on_last_pop() {
        let (mut scene, a, _) = setup();
        let mut history = UndoHistory::default();
        let mut events = EventQueue::new();
        history.push_undo(&scene, &[a], true, &mut events);
        events.drain();
        history.undo(&mut scene, &mut events);
        let sent = events.drain();
        assert_eq!(sent[0], DirectEvent::UndoListEmpty);
        assert!(sent.contains(&DirectEvent::PushRedo));
        assert!(sent.contains(&DirectEvent::Undo(vec![a])));
        assert!(history.undo(&mut scene, &mut events).is_none());
    }

    #[test]
    fn stale_nodes_are_swept() {
        let (mut scene, a, b) = setup();
        let mut history = UndoHistory::default();
        let mut events = EventQueue::new();
        history.push_undo(&scene, &[a, b], true, &mut events);
        history.push_undo(&scene, &[b], true, &mut events);
        scene.remove_node(b);
        assert_eq!(history.sweep_stale(&scene), 2);
        assert_eq!(history.undo_len(), 1);
        assert_eq!(history.peek_undo().map(|g| g.nodes()), Some(vec![a]));
    }
}
