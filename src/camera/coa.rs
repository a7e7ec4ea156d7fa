//! Centre of action: the point camera orbits and rolls pivot about, and the
//! marker that shows it.

use crate::scene::{LineSet, NodeId, SceneError, SceneGraph};
use crate::task::{BlendType, Interval, TaskStatus};
use glam::DVec3;

pub const COA_MARKER_NAME: &str = "DirectCameraCOAMarker";

/// Camera-space COA used when nothing better is known.
pub const DEFAULT_COA: DVec3 = DVec3::new(0.0, 100.0, 0.0);

const MARKER_RED: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
const MARKER_SEGMENTS: usize = 24;

/// Distances tried in turn while COA picks keep missing: 10, 100, ... and
/// back to 1 after `len` rungs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistanceLadder {
    count: u32,
    len: u32,
}

impl DistanceLadder {
    pub fn new(len: u32) -> Self {
        Self {
            count: 0,
            len: len.max(1),
        }
    }

    pub fn next(&mut self) -> f64 {
        self.count = (self.count + 1) % self.len;
        10f64.powi(self.count as i32)
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }
}

/// Result of [`compute_coa`]. `miss_distance` is set when the ladder was used.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoaChoice {
    pub point: DVec3,
    pub dist: f64,
    pub miss_distance: Option<f64>,
}

/// Picks the new COA in camera space.
///
/// `current` is the marker's camera-space position and `hit` the nearest
/// pick, if any, as a camera-space point plus its distance from the camera.
pub fn compute_coa(
    locked: bool,
    hit: Option<(DVec3, f64)>,
    current: DVec3,
    near: f64,
    far: f64,
    ladder: &mut DistanceLadder,
) -> CoaChoice {
    let mut miss_distance = None;
    let mut point = if locked {
        ladder.reset();
        current
    } else if let Some((pt, dist)) = hit {
        ladder.reset();
        if dist < 1.1 * near || dist > far {
            current
        } else {
            pt
        }
    } else {
        let dist = ladder.next();
        miss_distance = Some(dist);
        DVec3::new(0.0, dist, 0.0)
    };
    let mut dist = point.length();
    if dist < 1.1 * near {
        point = DEFAULT_COA;
        dist = DEFAULT_COA.length();
    }
    CoaChoice {
        point,
        dist,
        miss_distance,
    }
}

/// Marker scale keeping a constant apparent size at `dist` for a lens with
/// vertical fov `vfov` degrees.
pub fn marker_scale(k: f64, dist: f64, vfov: f64, min: f64, max: f64) -> f64 {
    (k * dist * (vfov / 30.0)).clamp(min, max)
}

/// The COA marker node and its fade-out.
#[derive(Debug, Clone)]
pub struct CoaMarker {
    node: NodeId,
    fade: Option<Interval>,
}

impl CoaMarker {
    pub fn new(scene: &mut SceneGraph, parent: NodeId) -> Result<Self, SceneError> {
        let node = scene.attach_new_node(parent, COA_MARKER_NAME)?;
        scene.set_lines(node, sphere_lines());
        scene.set_color(node, [1.0, 0.0, 0.0, 0.0]);
        scene.set_pos(node, DEFAULT_COA);
        Ok(Self { node, fade: None })
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Sets the uniform scale and restarts the red fade.
    pub fn resize(&mut self, scene: &mut SceneGraph, sf: f64, fade: f64) {
        scene.set_scale(self.node, DVec3::splat(sf));
        scene.set_color(self.node, MARKER_RED);
        self.fade = Some(Interval::new(fade, BlendType::Linear));
    }

    pub fn scale(&self, scene: &SceneGraph) -> f64 {
        scene.scale(self.node).map(|s| s.x).unwrap_or(1.0)
    }

    pub fn is_fading(&self) -> bool {
        self.fade.is_some()
    }

    pub fn step(&mut self, scene: &mut SceneGraph, dt: f64) -> TaskStatus {
        let Some(fade) = self.fade.as_mut() else {
            return TaskStatus::Done;
        };
        let t = fade.step(dt);
        let mut color = MARKER_RED;
        color[3] = (1.0 - t) as f32;
        scene.set_color(self.node, color);
        if fade.is_finished() {
            self.fade = None;
            TaskStatus::Done
        } else {
            TaskStatus::Continue
        }
    }

    pub fn show(&self, scene: &mut SceneGraph) {
        scene.show(self.node);
    }

    pub fn hide(&self, scene: &mut SceneGraph) {
        scene.hide(self.node);
    }

    pub fn toggle_vis(&self, scene: &mut SceneGraph) {
        scene.toggle_vis(self.node);
    }

    pub fn is_hidden(&self, scene: &SceneGraph) -> bool {
        scene.is_hidden(self.node)
    }
}

/// Three unit great circles.
fn sphere_lines() -> LineSet {
    let mut lines = LineSet::new(MARKER_RED, 1.0);
    for plane in 0..3 {
        let points: Vec<DVec3> = (0..=MARKER_SEGMENTS)
            .map(|i| {
                let a = i as f64 / MARKER_SEGMENTS as f64 * std::f64::consts::TAU;
                let (s, c) = a.sin_cos();
                match plane {
                    0 => DVec3::new(c, s, 0.0),
                    1 => DVec3::new(c, 0.0, s),
                    _ => DVec3::new(0.0, c, s),
                }
            })
            .collect();
        lines.add_strip(&points);
    }
    lines
}
