//! The set of selected nodes.
//!
//! Each record keeps the pivot offset chosen at selection time (`coa2dnp`),
//! the node-to-widget offset captured when a manipulation starts
//! (`dnp2widget`), and the node's bounding box.

pub mod bbox;

pub use bbox::BoundingBox;

use crate::app::events::{DirectEvent, EventQueue};
use crate::scene::{NodeId, SceneError, SceneGraph};
use glam::DMat4;
use serde::{Deserialize, Serialize};

/// Where a newly selected node's pivot sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CoaMode {
    #[default]
    Origin,
    CenterOfBbox,
}

#[derive(Debug, Clone)]
pub struct SelectedNode {
    pub node: NodeId,
    pub coa2dnp: DMat4,
    pub dnp2widget: DMat4,
    pub bbox: BoundingBox,
}

impl SelectedNode {
    pub fn new(scene: &mut SceneGraph, node: NodeId, coa_mode: CoaMode) -> Result<Self, SceneError> {
        let bbox = BoundingBox::new(scene, node)?;
        let coa2dnp = match coa_mode {
            CoaMode::Origin => DMat4::IDENTITY,
            CoaMode::CenterOfBbox => DMat4::from_translation(bbox.center),
        };
        Ok(Self {
            node,
            coa2dnp,
            dnp2widget: DMat4::IDENTITY,
            bbox,
        })
    }

    pub fn radius(&self) -> f64 {
        self.bbox.radius
    }

    /// World transform of the pivot.
    pub fn coa_world(&self, scene: &SceneGraph) -> Option<DMat4> {
        Some(scene.world_mat(self.node)? * self.coa2dnp)
    }

    pub fn highlight(&self, scene: &mut SceneGraph) {
        self.bbox.show(scene);
    }

    pub fn dehighlight(&self, scene: &mut SceneGraph) {
        self.bbox.hide(scene);
    }

    pub fn is_highlighted(&self, scene: &SceneGraph) -> bool {
        self.bbox.is_shown(scene)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    Selected(NodeId),
    Deselected(NodeId),
    Ignored,
}

/// Insertion-ordered selection with a pointer to the latest addition.
#[derive(Debug, Clone, Default)]
pub struct SelectedNodes {
    selected: Vec<SelectedNode>,
    last: Option<NodeId>,
    tag_list: Vec<String>,
}

impl SelectedNodes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_tag_list(&mut self, tags: Vec<String>) {
        self.tag_list = tags;
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.get(node).is_some()
    }

    pub fn get(&self, node: NodeId) -> Option<&SelectedNode> {
        self.selected.iter().find(|s| s.node == node)
    }

    pub fn last(&self) -> Option<&SelectedNode> {
        self.get(self.last?)
    }

    pub fn last_mut(&mut self) -> Option<&mut SelectedNode> {
        let last = self.last?;
        self.selected.iter_mut().find(|s| s.node == last)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SelectedNode> {
        self.selected.iter()
    }

    pub fn selected_as_list(&self) -> Vec<NodeId> {
        self.selected.iter().map(|s| s.node).collect()
    }

    /// The node that selecting `node` resolves to: itself, or with `by_tag`
    /// the nearest ancestor carrying one of the selection tags.
    pub fn resolve_target(&self, scene: &SceneGraph, node: NodeId, by_tag: bool) -> NodeId {
        if by_tag {
            for tag in &self.tag_list {
                if let Some(found) = scene.find_net_tag(node, tag) {
                    return found;
                }
            }
        }
        node
    }

    /// Adds `node`. Without `multi` the previous selection is cleared first;
    /// with it, an already selected node is removed instead.
    pub fn select(
        &mut self,
        scene: &mut SceneGraph,
        node: NodeId,
        multi: bool,
        by_tag: bool,
        coa_mode: CoaMode,
        events: &mut EventQueue,
    ) -> SelectOutcome {
        if !scene.contains(node) {
            return SelectOutcome::Ignored;
        }
        let target = self.resolve_target(scene, node, by_tag);
        if multi && self.contains(target) {
            self.deselect(scene, target, events);
            return SelectOutcome::Deselected(target);
        }
        if !multi {
            self.deselect_all(scene, events);
        }
        let record = match SelectedNode::new(scene, target, coa_mode) {
            Ok(record) => record,
            Err(err) => {
                log::warn!("select: {err}");
                return SelectOutcome::Ignored;
            }
        };
        record.highlight(scene);
        self.selected.push(record);
        self.last = Some(target);
        log::info!("selected {}", scene.name(target).unwrap_or("?"));
        events.send(DirectEvent::SelectedNodePath(target));
        SelectOutcome::Selected(target)
    }

    pub fn deselect(&mut self, scene: &mut SceneGraph, node: NodeId, events: &mut EventQueue) -> bool {
        let Some(index) = self.selected.iter().position(|s| s.node == node) else {
            return false;
        };
        let record = self.selected.remove(index);
        record.dehighlight(scene);
        record.bbox.destroy(scene);
        if self.last == Some(node) {
            self.last = self.selected.last().map(|s| s.node);
        }
        events.send(DirectEvent::DeselectedNodePath(node));
        true
    }

    pub fn deselect_all(&mut self, scene: &mut SceneGraph, events: &mut EventQueue) {
        for node in self.selected_as_list() {
            self.deselect(scene, node, events);
        }
        self.last = None;
    }

    pub fn highlight_all(&self, scene: &mut SceneGraph) {
        for record in &self.selected {
            record.highlight(scene);
        }
    }

    pub fn dehighlight_all(&self, scene: &mut SceneGraph) {
        for record in &self.selected {
            record.dehighlight(scene);
        }
    }

    pub fn recompute_bboxes(&mut self, scene: &mut SceneGraph) {
        for record in &mut self.selected {
            record.bbox.recompute(scene);
        }
    }

    /// Captures each node's transform relative to `widget`.
    pub fn get_wrt_all(&mut self, scene: &SceneGraph, widget: NodeId) {
        for record in &mut self.selected {
            if let Some(m) = scene.mat_relative(record.node, widget) {
                record.dnp2widget = m;
            }
        }
    }

    /// Re-applies the captured offsets after the widget moved.
    pub fn move_wrt_widget_all(&self, scene: &mut SceneGraph, widget: NodeId) {
        for record in &self.selected {
            scene.set_mat_relative(record.node, widget, record.dnp2widget);
        }
    }

    pub fn toggle_vis_all(&self, scene: &mut SceneGraph) {
        for record in &self.selected {
            scene.toggle_vis(record.node);
        }
    }

    /// Runs `f` on each selected node, oldest first.
    pub fn for_each_selected(
        &self,
        scene: &mut SceneGraph,
        mut f: impl FnMut(&mut SceneGraph, NodeId),
    ) {
        for record in &self.selected {
            f(scene, record.node);
        }
    }

    /// Deselects and deletes every selected node.
    pub fn remove_all(&mut self, scene: &mut SceneGraph, events: &mut EventQueue) {
        let nodes = self.selected_as_list();
        self.deselect_all(scene, events);
        for node in nodes {
            scene.remove_node(node);
        }
    }

    /// Drops records whose node no longer exists. Returns how many were dropped.
    pub fn sweep_stale(&mut self, scene: &mut SceneGraph, events: &mut EventQueue) -> usize {
        let stale: Vec<NodeId> = self
            .selected
            .iter()
            .filter(|s| !scene.contains(s.node))
            .map(|s| s.node)
            .collect();
        for node in &stale {
            log::info!("dropping stale selection entry {node:?}");
            self.deselect(scene, *node, events);
        }
        stale.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Shape, Transform};
    use glam::DVec3;

    fn scene_with(names: &[&str]) -> (SceneGraph, Vec<NodeId>) {
        let mut scene = SceneGraph::new();
        let nodes = names
            .iter()
            .map(|name| {
                let n = scene.attach_new_node(scene.root(), name).unwrap();
                scene.set_shape(n, Shape::cube(1.0));
                n
            })
            .collect();
        (scene, nodes)
    }

    #[test]
    fn selection_keeps_insertion_order() {
        let (mut scene, nodes) = scene_with(&["a", "b", "c"]);
        let mut selected = SelectedNodes::new();
        let mut events = EventQueue::new();
        for n in &nodes {
            selected.select(&mut scene, *n, true, false, CoaMode::Origin, &mut events);
        }
        assert_eq!(selected.selected_as_list(), nodes);
        assert_eq!(selected.last().map(|s| s.node), Some(nodes[2]));
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn single_select_replaces_previous() {
        let (mut scene, nodes) = scene_with(&["a", "b"]);
        let mut selected = SelectedNodes::new();
        let mut events = EventQueue::new();
        selected.select(&mut scene, nodes[0], false, false, CoaMode::Origin, &mut events);
        selected.select(&mut scene, nodes[1], false, false, CoaMode::Origin, &mut events);
        assert_eq!(selected.selected_as_list(), vec![nodes[1]]);
        assert_eq!(
            events.drain(),
            vec![
                DirectEvent::SelectedNodePath(nodes[0]),
                DirectEvent::DeselectedNodePath(nodes[0]),
                DirectEvent::SelectedNodePath(nodes[1]),
            ]
        );
    }

    #[test]
    fn reselecting_toggles_off() {
        let (mut scene, nodes) = scene_with(&["a", "b"]);
        let mut selected = SelectedNodes::new();
        let mut events = EventQueue::new();
        selected.select(&mut scene, nodes[0], true, false, CoaMode::Origin, &mut events);
        selected.select(&mut scene, nodes[1], true, false, CoaMode::Origin, &mut events);
        let outcome = selected.select(&mut scene, nodes[1], true, false, CoaMode::Origin, &mut events);
        assert_eq!(outcome, SelectOutcome::Deselected(nodes[1]));
        assert_eq!(selected.selected_as_list(), vec![nodes[0]]);
        assert_eq!(selected.last().map(|s| s.node), Some(nodes[0]));

        let outcome = selected.select(&mut scene, nodes[0], false, false, CoaMode::Origin, &mut events);
        assert_eq!(outcome, SelectOutcome::Selected(nodes[0]));
        assert_eq!(selected.selected_as_list(), vec![nodes[0]]);
    }

    #[test]
    fn highlight_tracks_membership() {
        let (mut scene, nodes) = scene_with(&["a"]);
        let mut selected = SelectedNodes::new();
        let mut events = EventQueue::new();
        selected.select(&mut scene, nodes[0], false, false, CoaMode::Origin, &mut events);
        let lines = selected.last().unwrap().bbox.lines();
        assert_eq!(scene.parent(lines), Some(nodes[0]));
        selected.dehighlight_all(&mut scene);
        assert_eq!(scene.parent(lines), Some(scene.hidden_root()));
        selected.highlight_all(&mut scene);
        assert!(selected.last().unwrap().is_highlighted(&scene));
        selected.deselect_all(&mut scene, &mut events);
        assert!(!scene.contains(lines));
        assert!(selected.last().is_none());
    }

    #[test]
    fn select_by_tag_resolves_ancestor() {
        let (mut scene, nodes) = scene_with(&["group"]);
        let child = scene.attach_new_node(nodes[0], "leaf").unwrap();
        scene.set_tag(nodes[0], "OBJRoot", "1");
        let mut selected = SelectedNodes::new();
        selected.set_tag_list(vec!["OBJRoot".into()]);
        let mut events = EventQueue::new();
        let outcome = selected.select(&mut scene, child, false, true, CoaMode::Origin, &mut events);
        assert_eq!(outcome, SelectOutcome::Selected(nodes[0]));
        let outcome = selected.select(&mut scene, child, true, false, CoaMode::Origin, &mut events);
        assert_eq!(outcome, SelectOutcome::Selected(child));
    }

    #[test]
    fn center_mode_offsets_pivot() {
        let mut scene = SceneGraph::new();
        let n = scene.attach_new_node(scene.root(), "n").unwrap();
        scene.set_shape(
            n,
            Shape::Box {
                min: DVec3::new(0.0, 0.0, 0.0),
                max: DVec3::new(2.0, 4.0, 6.0),
            },
        );
        scene.set_pos(n, DVec3::new(10.0, 0.0, 0.0));
        let mut selected = SelectedNodes::new();
        let mut events = EventQueue::new();
        selected.select(&mut scene, n, false, false, CoaMode::CenterOfBbox, &mut events);
        let world = selected.last().unwrap().coa_world(&scene).unwrap();
        assert!((world.w_axis.truncate() - DVec3::new(11.0, 2.0, 3.0)).length() < 1e-12);
    }

    #[test]
    fn wrt_offsets_follow_widget() {
        let (mut scene, nodes) = scene_with(&["a", "b"]);
        scene.set_pos(nodes[1], DVec3::new(5.0, 0.0, 0.0));
        let widget = scene.attach_new_node(scene.root(), "widget").unwrap();
        let mut selected = SelectedNodes::new();
        let mut events = EventQueue::new();
        for n in &nodes {
            selected.select(&mut scene, *n, true, false, CoaMode::Origin, &mut events);
        }
        selected.get_wrt_all(&scene, widget);
        scene.set_transform(
            widget,
            Transform::from_pos_hpr(DVec3::new(0.0, 3.0, 0.0), DVec3::new(90.0, 0.0, 0.0)),
        );
        selected.move_wrt_widget_all(&mut scene, widget);
        assert!((scene.pos(nodes[0]).unwrap() - DVec3::new(0.0, 3.0, 0.0)).length() < 1e-9);
        assert!((scene.pos(nodes[1]).unwrap() - DVec3::new(0.0, 8.0, 0.0)).length() < 1e-9);
    }

    #[test]
    fn stale_entries_are_swept() {
        let (mut scene, nodes) = scene_with(&["a", "b"]);
        let mut selected = SelectedNodes::new();
        let mut events = EventQueue::new();
        for n in &nodes {
            selected.select(&mut scene, *n, true, false, CoaMode::Origin, &mut events);
        }
        scene.remove_node(nodes[1]);
        assert_eq!(selected.sweep_stale(&mut scene, &mut events), 1);
        assert_eq!(selected.selected_as_list(), vec![nodes[0]]);
        assert_eq!(selected.last().map(|s| s.node), Some(nodes[0]));
    }

    #[test]
    fn remove_all_deletes_nodes() {
        let (mut scene, nodes) = scene_with(&["a", "b"]);
        let mut selected = SelectedNodes::new();
        let mut events = EventQueue::new();
        for n in &nodes {
            selected.select(&mut scene, *n, true, false, CoaMode::Origin, &mut events);
        }
        selected.remove_all(&mut scene, &mut events);
        assert!(selected.is_empty());
        assert!(nodes.iter().all(|n| !scene.contains(*n)));
    }

    #[test]
    fn for_each_selected_visits_in_order() {
        let (mut scene, nodes) = scene_with(&["a", "b"]);
        let mut selected = SelectedNodes::new();
        let mut events = EventQueue::new();
        for n in &nodes {
            selected.select(&mut scene, *n, true, false, CoaMode::Origin, &mut events);
        }
        let mut seen = Vec::new();
        selected.for_each_selected(&mut scene, |scene, node| {
            scene.hide(node);
            seen.push(node);
        });
        assert_eq!(seen, nodes);
        assert!(nodes.iter().all(|n| scene.is_hidden(*n)));
    }
}
