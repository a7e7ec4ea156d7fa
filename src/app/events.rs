use crate::scene::NodeId;
use std::collections::VecDeque;

/// Notifications the session publishes for hosts and UI panels.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectEvent {
    SelectedNodePath(NodeId),
    DeselectedNodePath(NodeId),
    ManipulateObjectStart,
    ManipulateObjectCleanup(Vec<NodeId>),
    PushUndo,
    PushRedo,
    UndoListEmpty,
    RedoListEmpty,
    Undo(Vec<NodeId>),
    Redo(Vec<NodeId>),
    Reparent {
        node: NodeId,
        old_parent: Option<NodeId>,
        new_parent: NodeId,
        wrt: bool,
    },
    ActiveParent(NodeId),
    Message(String),
}

/// FIFO of pending events, drained by the host once per frame.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: VecDeque<DirectEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&mut self, event: DirectEvent) {
        log::debug!("event: {event:?}");
        self.events.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<DirectEvent> {
        self.events.drain(..).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DirectEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn contains(&self, event: &DirectEvent) -> bool {
        self.events.iter().any(|e| e == event)
    }
}

/// Single status line. A new message replaces the old one and restarts the
/// countdown.
#[derive(Debug, Clone, Default)]
pub struct StatusLine {
    text: Option<String>,
    remaining: f64,
}

impl StatusLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&mut self, text: impl Into<String>, duration: f64, events: &mut EventQueue) {
        let text = text.into();
        log::info!("{text}");
        events.send(DirectEvent::Message(text.clone()));
        self.text = Some(text);
        self.remaining = duration;
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn clear(&mut self) {
        self.text = None;
        self.remaining = 0.0;
    }

    pub fn advance(&mut self, dt: f64) {
        if self.text.is_none() {
            return;
        }
        self.remaining -= dt;
        if self.remaining <= 0.0 {
            self.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DirectEvent, EventQueue, StatusLine};

    #[test]
    fn drain_preserves_order() {
        let mut queue = EventQueue::new();
        queue.send(DirectEvent::PushUndo);
        queue.send(DirectEvent::RedoListEmpty);
        assert!(queue.contains(&DirectEvent::PushUndo));
        assert_eq!(
            queue.drain(),
            vec![DirectEvent::PushUndo, DirectEvent::RedoListEmpty]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn status_line_expires() {
        let mut queue = EventQueue::new();
        let mut status = StatusLine::new();
        status.show("COA Lock On", 3.0, &mut queue);
        assert_eq!(status.text(), Some("COA Lock On"));
        assert!(queue.contains(&DirectEvent::Message("COA Lock On".into())));
        status.advance(2.0);
        assert!(status.text().is_some());
        status.advance(1.5);
        assert_eq!(status.text(), None);
    }
}
