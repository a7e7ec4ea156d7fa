//! Arena scene graph.
//!
//! Nodes live in a slot vector and are addressed by generational [`NodeId`]s,
//! so a handle to a removed node is detected instead of aliasing a newer one.
//! Two roots exist: `render`, the visible world, and `hidden`, a detached
//! parking spot for helpers that should not be drawn or picked.

pub mod collide;
pub mod lens;

pub use collide::{CollideMask, CollisionEntry, QuerySolid, Shape};
pub use lens::{Lens, Projection};

use crate::geometry::{hpr_to_quat, quat_to_hpr};
use glam::{DMat4, DQuat, DVec3};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub fn index(self) -> u32 {
        self.index
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SceneError {
    #[error("node {0:?} no longer exists")]
    StaleEntity(NodeId),
    #[error("reparenting {node:?} under {parent:?} would create a cycle")]
    CycleDetected { node: NodeId, parent: NodeId },
    #[error("node {0:?} is a root and cannot be reparented")]
    RootNode(NodeId),
}

/// Translation, rotation and scale of a node relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub pos: DVec3,
    pub quat: DQuat,
    pub scale: DVec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        pos: DVec3::ZERO,
        quat: DQuat::IDENTITY,
        scale: DVec3::ONE,
    };

    pub fn from_pos(pos: DVec3) -> Self {
        Self {
            pos,
            ..Self::IDENTITY
        }
    }

    pub fn from_pos_hpr(pos: DVec3, hpr: DVec3) -> Self {
        Self {
            pos,
            quat: hpr_to_quat(hpr),
            scale: DVec3::ONE,
        }
    }

    pub fn from_mat(m: &DMat4) -> Self {
        let (scale, quat, pos) = m.to_scale_rotation_translation();
        Self {
            pos,
            quat: quat.normalize(),
            scale,
        }
    }

    pub fn to_mat(&self) -> DMat4 {
        DMat4::from_scale_rotation_translation(self.scale, self.quat, self.pos)
    }

    pub fn hpr(&self) -> DVec3 {
        quat_to_hpr(self.quat)
    }
}

/// Polyline wireframe. `segments` index into `vertices`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LineSet {
    pub vertices: Vec<DVec3>,
    pub segments: Vec<(usize, usize)>,
    pub color: [f32; 4],
    pub thickness: f32,
}

impl LineSet {
    pub fn new(color: [f32; 4], thickness: f32) -> Self {
        Self {
            vertices: Vec::new(),
            segments: Vec::new(),
            color,
            thickness,
        }
    }

    /// Appends a connected strip through `points`.
    pub fn add_strip(&mut self, points: &[DVec3]) {
        let base = self.vertices.len();
        self.vertices.extend_from_slice(points);
        for i in 1..points.len() {
            self.segments.push((base + i - 1, base + i));
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    transform: Transform,
    tags: BTreeMap<String, String>,
    hidden: bool,
    color: Option<[f32; 4]>,
    shape: Option<Shape>,
    collider: Option<(Shape, CollideMask)>,
    lines: Option<LineSet>,
    lens: Option<(Lens, u64)>,
}

impl Node {
    fn new(name: &str, parent: Option<NodeId>) -> Self {
        Self {
            name: name.to_string(),
            parent,
            children: Vec::new(),
            transform: Transform::IDENTITY,
            tags: BTreeMap::new(),
            hidden: false,
            color: None,
            shape: None,
            collider: None,
            lines: None,
            lens: None,
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

#[derive(Debug, Clone)]
pub struct SceneGraph {
    slots: Vec<Slot>,
    free: Vec<u32>,
    render: NodeId,
    hidden: NodeId,
    lens_counter: u64,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        let mut scene = Self {
            slots: Vec::new(),
            free: Vec::new(),
            render: NodeId {
                index: 0,
                generation: 0,
            },
            hidden: NodeId {
                index: 0,
                generation: 0,
            },
            lens_counter: 0,
        };
        scene.render = scene.alloc(Node::new("render", None));
        scene.hidden = scene.alloc(Node::new("hidden", None));
        scene
    }

    pub fn root(&self) -> NodeId {
        self.render
    }

    pub fn hidden_root(&self) -> NodeId {
        self.hidden
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId {
                index,
                generation: 0,
            }
        }
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn attach_new_node(&mut self, parent: NodeId, name: &str) -> Result<NodeId, SceneError> {
        if !self.contains(parent) {
            return Err(SceneError::StaleEntity(parent));
        }
        let id = self.alloc(Node::new(name, Some(parent)));
        if let Some(p) = self.node_mut(parent) {
            p.children.push(id);
        }
        Ok(id)
    }

    /// Removes `id` and its whole subtree. Roots cannot be removed.
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        if id == self.render || id == self.hidden || !self.contains(id) {
            return false;
        }
        if let Some(parent) = self.parent(id) {
            if let Some(p) = self.node_mut(parent) {
                p.children.retain(|c| *c != id);
            }
        }
        for node in self.descendants(id) {
            let slot = &mut self.slots[node.index as usize];
            slot.node = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(node.index);
        }
        true
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.node(id).map(|n| n.name.as_str())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// `id` followed by each of its ancestors up to its root.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cursor = self.contains(id).then_some(id);
        while let Some(node) = cursor {
            out.push(node);
            cursor = self.parent(node);
        }
        out
    }

    /// True when `ancestor` is `id` or lies above it.
    pub fn is_same_or_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut cursor = self.contains(id).then_some(id);
        while let Some(node) = cursor {
            if node == ancestor {
                return true;
            }
            cursor = self.parent(node);
        }
        false
    }

    /// `id` and every node below it, parents before children.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.contains(id) {
            return out;
        }
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            out.push(node);
            for child in self.children(node).iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    /// First node named `name` in the subtree under `id`.
    pub fn find(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.descendants(id)
            .into_iter()
            .find(|n| self.name(*n) == Some(name))
    }

    pub fn reparent_to(&mut self, id: NodeId, parent: NodeId) -> Result<(), SceneError> {
        if !self.contains(id) {
            return Err(SceneError::StaleEntity(id));
        }
        if !self.contains(parent) {
            return Err(SceneError::StaleEntity(parent));
        }
        if id == self.render || id == self.hidden {
            return Err(SceneError::RootNode(id));
        }
        if self.is_same_or_ancestor(id, parent) {
            return Err(SceneError::CycleDetected { node: id, parent });
        }
        if let Some(old) = self.parent(id) {
            if let Some(p) = self.node_mut(old) {
                p.children.retain(|c| *c != id);
            }
        }
        if let Some(p) = self.node_mut(parent) {
            p.children.push(id);
        }
        if let Some(n) = self.node_mut(id) {
            n.parent = Some(parent);
        }
        Ok(())
    }

    /// Reparents while keeping the node's world transform.
    pub fn wrt_reparent_to(&mut self, id: NodeId, parent: NodeId) -> Result<(), SceneError> {
        let world = self.world_mat(id).ok_or(SceneError::StaleEntity(id))?;
        self.reparent_to(id, parent)?;
        let parent_world = self.world_mat(parent).ok_or(SceneError::StaleEntity(parent))?;
        self.set_mat(id, parent_world.inverse() * world);
        Ok(())
    }

    // ====================================================================
    // Transforms
    // ====================================================================

    pub fn transform(&self, id: NodeId) -> Option<Transform> {
        self.node(id).map(|n| n.transform)
    }

    pub fn set_transform(&mut self, id: NodeId, transform: Transform) -> Option<()> {
        self.node_mut(id)?.transform = transform;
        Some(())
    }

    pub fn clear_transform(&mut self, id: NodeId) -> Option<()> {
        self.set_transform(id, Transform::IDENTITY)
    }

    pub fn local_mat(&self, id: NodeId) -> Option<DMat4> {
        self.transform(id).map(|t| t.to_mat())
    }

    pub fn set_mat(&mut self, id: NodeId, m: DMat4) -> Option<()> {
        self.set_transform(id, Transform::from_mat(&m))
    }

    /// Net transform from node space to its root's space.
    pub fn world_mat(&self, id: NodeId) -> Option<DMat4> {
        let mut m = self.local_mat(id)?;
        let mut cursor = self.parent(id);
        while let Some(parent) = cursor {
            m = self.local_mat(parent)? * m;
            cursor = self.parent(parent);
        }
        Some(m)
    }

    /// Transform of `id` expressed in `other`'s space.
    pub fn mat_relative(&self, id: NodeId, other: NodeId) -> Option<DMat4> {
        let world = self.world_mat(id)?;
        let other_world = self.world_mat(other)?;
        Some(other_world.inverse() * world)
    }

    /// Sets `id` so that its transform in `other`'s space equals `m`.
    pub fn set_mat_relative(&mut self, id: NodeId, other: NodeId, m: DMat4) -> Option<()> {
        let other_world = self.world_mat(other)?;
        let parent_world = match self.parent(id) {
            Some(parent) => self.world_mat(parent)?,
            None => DMat4::IDENTITY,
        };
        self.set_mat(id, parent_world.inverse() * other_world * m)
    }

    pub fn transform_relative(&self, id: NodeId, other: NodeId) -> Option<Transform> {
        self.mat_relative(id, other).map(|m| Transform::from_mat(&m))
    }

    pub fn set_transform_relative(&mut self, id: NodeId, other: NodeId, t: Transform) -> Option<()> {
        self.set_mat_relative(id, other, t.to_mat())
    }

    fn update_relative(
        &mut self,
        id: NodeId,
        other: NodeId,
        f: impl FnOnce(&mut Transform),
    ) -> Option<()> {
        let mut t = self.transform_relative(id, other)?;
        f(&mut t);
        self.set_transform_relative(id, other, t)
    }

    pub fn pos(&self, id: NodeId) -> Option<DVec3> {
        self.transform(id).map(|t| t.pos)
    }

    pub fn set_pos(&mut self, id: NodeId, pos: DVec3) -> Option<()> {
        self.node_mut(id)?.transform.pos = pos;
        Some(())
    }

    pub fn hpr(&self, id: NodeId) -> Option<DVec3> {
        self.transform(id).map(|t| t.hpr())
    }

    pub fn set_hpr(&mut self, id: NodeId, hpr: DVec3) -> Option<()> {
        self.set_quat(id, hpr_to_quat(hpr))
    }

    pub fn quat(&self, id: NodeId) -> Option<DQuat> {
        self.transform(id).map(|t| t.quat)
    }

    pub fn set_quat(&mut self, id: NodeId, quat: DQuat) -> Option<()> {
        self.node_mut(id)?.transform.quat = quat;
        Some(())
    }

    pub fn scale(&self, id: NodeId) -> Option<DVec3> {
        self.transform(id).map(|t| t.scale)
    }

    pub fn set_scale(&mut self, id: NodeId, scale: DVec3) -> Option<()> {
        self.node_mut(id)?.transform.scale = scale;
        Some(())
    }

    pub fn pos_relative(&self, id: NodeId, other: NodeId) -> Option<DVec3> {
        self.transform_relative(id, other).map(|t| t.pos)
    }

    pub fn set_pos_relative(&mut self, id: NodeId, other: NodeId, pos: DVec3) -> Option<()> {
        self.update_relative(id, other, |t| t.pos = pos)
    }

    pub fn hpr_relative(&self, id: NodeId, other: NodeId) -> Option<DVec3> {
        self.transform_relative(id, other).map(|t| t.hpr())
    }

    pub fn quat_relative(&self, id: NodeId, other: NodeId) -> Option<DQuat> {
        self.transform_relative(id, other).map(|t| t.quat)
    }

    pub fn set_hpr_relative(&mut self, id: NodeId, other: NodeId, hpr: DVec3) -> Option<()> {
        self.set_quat_relative(id, other, hpr_to_quat(hpr))
    }

    pub fn set_quat_relative(&mut self, id: NodeId, other: NodeId, quat: DQuat) -> Option<()> {
        self.update_relative(id, other, |t| t.quat = quat)
    }

    pub fn set_pos_quat_relative(
        &mut self,
        id: NodeId,
        other: NodeId,
        pos: DVec3,
        quat: DQuat,
    ) -> Option<()> {
        self.update_relative(id, other, |t| {
            t.pos = pos;
            t.quat = quat;
        })
    }

    /// Turns `id` so its +Y axis points at the world point `target`, with no
    /// roll.
    pub fn look_at(&mut self, id: NodeId, target: DVec3) -> Option<()> {
        let pos = self.world_mat(id)?.w_axis.truncate();
        let dir = (target - pos).normalize_or_zero();
        if dir == DVec3::ZERO {
            return Some(());
        }
        let heading = (-dir.x).atan2(dir.y).to_degrees();
        let pitch = dir.z.clamp(-1.0, 1.0).asin().to_degrees();
        let render = self.render;
        self.set_hpr_relative(id, render, DVec3::new(heading, pitch, 0.0))
    }

    // ====================================================================
    // Tags, visibility, appearance
    // ====================================================================

    pub fn set_tag(&mut self, id: NodeId, key: &str, value: &str) -> Option<()> {
        self.node_mut(id)?
            .tags
            .insert(key.to_string(), value.to_string());
        Some(())
    }

    pub fn tag(&self, id: NodeId, key: &str) -> Option<&str> {
        self.node(id)?.tags.get(key).map(String::as_str)
    }

    pub fn has_tag(&self, id: NodeId, key: &str) -> bool {
        self.tag(id, key).is_some()
    }

    /// Nearest node at or above `id` carrying `key`.
    pub fn find_net_tag(&self, id: NodeId, key: &str) -> Option<NodeId> {
        self.ancestors(id).into_iter().find(|n| self.has_tag(*n, key))
    }

    pub fn hide(&mut self, id: NodeId) -> Option<()> {
        self.node_mut(id)?.hidden = true;
        Some(())
    }

    pub fn show(&mut self, id: NodeId) -> Option<()> {
        self.node_mut(id)?.hidden = false;
        Some(())
    }

    pub fn toggle_vis(&mut self, id: NodeId) -> Option<()> {
        let node = self.node_mut(id)?;
        node.hidden = !node.hidden;
        Some(())
    }

    pub fn is_hidden(&self, id: NodeId) -> bool {
        self.node(id).map(|n| n.hidden).unwrap_or(true)
    }

    /// Hidden itself, below a hidden ancestor, or parked under the hidden root.
    pub fn is_net_hidden(&self, id: NodeId) -> bool {
        if !self.contains(id) {
            return true;
        }
        self.ancestors(id)
            .into_iter()
            .any(|n| n == self.hidden || self.is_hidden(n))
    }

    pub fn show_all_descendants(&mut self, id: NodeId) {
        for node in self.descendants(id) {
            self.show(node);
        }
    }

    pub fn hide_siblings(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        let siblings: Vec<NodeId> = self
            .children(parent)
            .iter()
            .copied()
            .filter(|c| *c != id)
            .collect();
        for sibling in siblings {
            self.hide(sibling);
        }
    }

    pub fn color(&self, id: NodeId) -> Option<[f32; 4]> {
        self.node(id)?.color
    }

    pub fn set_color(&mut self, id: NodeId, color: [f32; 4]) -> Option<()> {
        self.node_mut(id)?.color = Some(color);
        Some(())
    }

    pub fn clear_color(&mut self, id: NodeId) -> Option<()> {
        self.node_mut(id)?.color = None;
        Some(())
    }

    // ====================================================================
    // Geometry, colliders, lines, lenses
    // ====================================================================

    pub fn shape(&self, id: NodeId) -> Option<Shape> {
        self.node(id)?.shape
    }

    pub fn set_shape(&mut self, id: NodeId, shape: Shape) -> Option<()> {
        self.node_mut(id)?.shape = Some(shape);
        Some(())
    }

    pub fn collider(&self, id: NodeId) -> Option<(Shape, CollideMask)> {
        self.node(id)?.collider
    }

    pub fn set_collider(&mut self, id: NodeId, shape: Shape, into_mask: CollideMask) -> Option<()> {
        self.node_mut(id)?.collider = Some((shape, into_mask));
        Some(())
    }

    pub fn lines(&self, id: NodeId) -> Option<&LineSet> {
        self.node(id)?.lines.as_ref()
    }

    pub fn lines_mut(&mut self, id: NodeId) -> Option<&mut LineSet> {
        self.node_mut(id)?.lines.as_mut()
    }

    pub fn set_lines(&mut self, id: NodeId, lines: LineSet) -> Option<()> {
        self.node_mut(id)?.lines = Some(lines);
        Some(())
    }

    pub fn lens(&self, id: NodeId) -> Option<&Lens> {
        self.node(id)?.lens.as_ref().map(|(lens, _)| lens)
    }

    /// Changes counter of the lens on `id`, bumped on every `set_lens`.
    pub fn lens_revision(&self, id: NodeId) -> Option<u64> {
        self.node(id)?.lens.as_ref().map(|(_, rev)| *rev)
    }

    pub fn set_lens(&mut self, id: NodeId, lens: Lens) -> Option<()> {
        self.lens_counter += 1;
        let revision = self.lens_counter;
        self.node_mut(id)?.lens = Some((lens, revision));
        Some(())
    }

    /// Bounds of the renderable geometry under `id`, expressed in the space
    /// of `id`'s parent (so `id`'s own transform is included).
    pub fn calc_tight_bounds(&self, id: NodeId) -> Option<(DVec3, DVec3)> {
        let mut min = DVec3::splat(f64::INFINITY);
        let mut max = DVec3::splat(f64::NEG_INFINITY);
        let mut found = false;
        let mut stack = vec![(id, self.local_mat(id)?)];
        while let Some((node, m)) = stack.pop() {
            if let Some(shape) = self.shape(node) {
                let (lo, hi) = shape.bounds();
                for i in 0..8 {
                    let corner = DVec3::new(
                        if i & 1 == 0 { lo.x } else { hi.x },
                        if i & 2 == 0 { lo.y } else { hi.y },
                        if i & 4 == 0 { lo.z } else { hi.z },
                    );
                    let p = m.transform_point3(corner);
                    min = min.min(p);
                    max = max.max(p);
                }
                found = true;
            }
            for child in self.children(node) {
                if let Some(local) = self.local_mat(*child) {
                    stack.push((*child, m * local));
                }
            }
        }
        found.then_some((min, max))
    }
}
