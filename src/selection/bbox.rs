use crate::scene::{LineSet, NodeId, SceneError, SceneGraph};
use glam::DVec3;

const BBOX_COLOR: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
const BBOX_THICKNESS: f32 = 0.5;

/// Tight local-space bounds of one node plus a 12-edge wireframe.
///
/// The wireframe is parented to the node while highlighted so it follows
/// the node around, and parked under the hidden root otherwise.
#[derive(Debug, Clone)]
pub struct BoundingBox {
    node: NodeId,
    lines: NodeId,
    pub min: DVec3,
    pub max: DVec3,
    pub center: DVec3,
    pub radius: f64,
}

impl BoundingBox {
    pub fn new(scene: &mut SceneGraph, node: NodeId) -> Result<Self, SceneError> {
        if !scene.contains(node) {
            return Err(SceneError::StaleEntity(node));
        }
        let lines = scene.attach_new_node(scene.hidden_root(), "bboxLines")?;
        let mut set = LineSet::new(BBOX_COLOR, BBOX_THICKNESS);
        let vertices = box_vertices(DVec3::ZERO, DVec3::ZERO);
        set.add_strip(&vertices[0..10]);
        set.add_strip(&vertices[10..12]);
        set.add_strip(&vertices[12..14]);
        set.add_strip(&vertices[14..16]);
        scene.set_lines(lines, set);
        let mut bbox = Self {
            node,
            lines,
            min: DVec3::ZERO,
            max: DVec3::ZERO,
            center: DVec3::ZERO,
            radius: 0.0,
        };
        bbox.recompute(scene);
        Ok(bbox)
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn lines(&self) -> NodeId {
        self.lines
    }

    /// Re-measures the node with its local transform cleared.
    pub fn recompute(&mut self, scene: &mut SceneGraph) -> Option<()> {
        let saved = scene.transform(self.node)?;
        scene.clear_transform(self.node);
        let bounds = scene.calc_tight_bounds(self.node);
        scene.set_transform(self.node, saved);
        let (min, max) = bounds.unwrap_or((DVec3::ZERO, DVec3::ZERO));
        self.min = min;
        self.max = max;
        self.center = (min + max) * 0.5;
        self.radius = (max - min).length();
        self.update_lines(scene)
    }

    fn update_lines(&self, scene: &mut SceneGraph) -> Option<()> {
        let lines = scene.lines_mut(self.lines)?;
        lines.vertices = box_vertices(self.min, self.max).to_vec();
        Some(())
    }

    pub fn show(&self, scene: &mut SceneGraph) {
        if let Err(err) = scene.reparent_to(self.lines, self.node) {
            log::warn!("bbox show: {err}");
        }
    }

    pub fn hide(&self, scene: &mut SceneGraph) {
        let hidden = scene.hidden_root();
        if let Err(err) = scene.reparent_to(self.lines, hidden) {
            log::debug!("bbox hide: {err}");
        }
    }

    pub fn is_shown(&self, scene: &SceneGraph) -> bool {
        scene.parent(self.lines) == Some(self.node)
    }

    /// Removes the wireframe node from the scene.
    pub fn destroy(self, scene: &mut SceneGraph) {
        scene.remove_node(self.lines);
    }
}

/// Vertex order: bottom loop (0-4), top loop (5-9), then the three
/// remaining vertical edges (10-15).
pub fn box_vertices(min: DVec3, max: DVec3) -> [DVec3; 16] {
    [
        DVec3::new(min.x, min.y, min.z),
        DVec3::new(max.x, min.y, min.z),
        DVec3::new(max.x, max.y, min.z),
        DVec3::new(min.x, max.y, min.z),
        DVec3::new(min.x, min.y, min.z),
        DVec3::new(min.x, min.y, max.z),
        DVec3::new(max.x, min.y, max.z),
        DVec3::new(max.x, max.y, max.z),
        DVec3::new(min.x, max.y, max.z),
        DVec3::new(min.x, min.y, max.z),
        DVec3::new(max.x, min.y, min.z),
        DVec3::new(max.x, min.y, max.z),
        DVec3::new(max.x, max.y, min.z),
        DVec3::new(max.x, max.y, max.z),
        DVec3::new(min.x, max.y, min.z),
        DVec3::new(min.x, max.y, max.z),
    ]
}
