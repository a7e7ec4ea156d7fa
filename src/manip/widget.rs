//! The three-axis object handles shown at the selection's pivot.
//!
//! Layout under the root node:
//!
//! ```text
//! objectHandles
//! └── ohScalingNode
//!     ├── X ── x-post-group ── x-post (collider), x-post-visible (lines)
//!     │    ├── x-ring-group ── ...
//!     │    └── x-disc-group ── ...
//!     ├── Y ...
//!     ├── Z ...
//!     └── guideLines
//! ```
//!
//! Collider nodes carry [`CollideMask::WIDGET`] and are named after the
//! constraint they drive, so a widget pick resolves straight to a
//! [`WidgetPart`].

use crate::geometry::{plane_intersect, Axis, GeometryError};
use crate::scene::{CollideMask, LineSet, NodeId, SceneError, SceneGraph, Shape};
use crate::task::{BlendType, Interval, TaskStatus};
use crate::viewport::DisplayRegionContext;
use glam::DVec3;
use std::fmt;

pub const POST_LENGTH: f64 = 1.5;
pub const POST_RADIUS: f64 = 0.1;
pub const RING_RADIUS: f64 = 1.0;
pub const RING_THICKNESS: f64 = 0.1;
pub const DISC_RADIUS: f64 = 0.6;
const GUIDE_EXTENT: f64 = 500.0;
const RESIZE_DURATION: f64 = 0.5;

pub const COA_MODE_COLOR: [f32; 4] = [0.5, 0.5, 0.5, 0.5];
pub const DISABLED_MODE_COLOR: [f32; 4] = [0.1, 0.1, 0.1, 0.1];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Post,
    Ring,
    Disc,
}

impl HandleKind {
    pub const ALL: [HandleKind; 3] = [HandleKind::Post, HandleKind::Ring, HandleKind::Disc];

    pub fn suffix(self) -> &'static str {
        match self {
            HandleKind::Post => "post",
            HandleKind::Ring => "ring",
            HandleKind::Disc => "disc",
        }
    }

    fn from_suffix(s: &str) -> Option<Self> {
        match s {
            "post" => Some(HandleKind::Post),
            "ring" => Some(HandleKind::Ring),
            "disc" => Some(HandleKind::Disc),
            _ => None,
        }
    }
}

/// One pickable piece of the widget, e.g. `x-post`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WidgetPart {
    pub axis: Axis,
    pub kind: HandleKind,
}

impl WidgetPart {
    pub fn new(axis: Axis, kind: HandleKind) -> Self {
        Self { axis, kind }
    }

    pub fn name(self) -> String {
        format!("{}-{}", self.axis.letter(), self.kind.suffix())
    }

    /// Parses a constraint name such as `"y-ring"`.
    pub fn parse(name: &str) -> Option<Self> {
        let (axis, kind) = name.split_once('-')?;
        let mut letters = axis.chars();
        let axis = Axis::from_letter(letters.next()?)?;
        if letters.next().is_some() {
            return None;
        }
        Some(Self::new(axis, HandleKind::from_suffix(kind)?))
    }

    pub fn all() -> impl Iterator<Item = WidgetPart> {
        Axis::ALL
            .into_iter()
            .flat_map(|axis| HandleKind::ALL.into_iter().map(move |kind| WidgetPart::new(axis, kind)))
    }
}

impl fmt::Display for WidgetPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.axis.letter(), self.kind.suffix())
    }
}

#[derive(Debug, Clone, Copy)]
struct HandleNodes {
    part: WidgetPart,
    group: NodeId,
    collider: NodeId,
    visible: NodeId,
}

#[derive(Debug, Clone, Copy)]
struct ScaleLerp {
    interval: Interval,
    from: f64,
    to: f64,
}

#[derive(Debug, Clone)]
pub struct ObjectHandles {
    root: NodeId,
    scaling_node: NodeId,
    axis_nodes: [NodeId; 3],
    handles: Vec<HandleNodes>,
    guide_lines: NodeId,
    /// Parent used by `show_widget`.
    display_parent: NodeId,
    scaling_factor: f64,
    direct_scaling_factor: f64,
    resize: Option<ScaleLerp>,
}

impl ObjectHandles {
    /// Builds the widget parked under the scene's hidden root. `display_parent`
    /// is where `show_widget` puts it.
    pub fn new(scene: &mut SceneGraph, display_parent: NodeId) -> Result<Self, SceneError> {
        let root = scene.attach_new_node(scene.hidden_root(), "objectHandles")?;
        let scaling_node = scene.attach_new_node(root, "ohScalingNode")?;
        let mut axis_nodes = [scaling_node; 3];
        let mut handles = Vec::with_capacity(9);

        for axis in Axis::ALL {
            let axis_node =
                scene.attach_new_node(scaling_node, &axis.letter().to_ascii_uppercase().to_string())?;
            axis_nodes[axis.index()] = axis_node;
            let color = axis_color(axis);
            for kind in HandleKind::ALL {
                let part = WidgetPart::new(axis, kind);
                let name = part.name();
                let group = scene.attach_new_node(axis_node, &format!("{name}-group"))?;
                let collider = scene.attach_new_node(group, &name)?;
                scene.set_collider(collider, handle_shape(part), CollideMask::WIDGET);
                let visible = scene.attach_new_node(group, &format!("{name}-visible"))?;
                scene.set_lines(visible, handle_lines(part, color));
                handles.push(HandleNodes {
                    part,
                    group,
                    collider,
                    visible,
                });
            }
        }

        let guide_lines = scene.attach_new_node(scaling_node, "guideLines")?;
        for axis in Axis::ALL {
            let guide = scene.attach_new_node(guide_lines, &format!("{}-guide", axis.letter()))?;
            let mut lines = LineSet::new(axis_color(axis), 1.0);
            lines.add_strip(&[axis.unit() * GUIDE_EXTENT, axis.unit() * -GUIDE_EXTENT]);
            scene.set_lines(guide, lines);
        }
        scene.hide(guide_lines);

        Ok(Self {
            root,
            scaling_node,
            axis_nodes,
            handles,
            guide_lines,
            display_parent,
            scaling_factor: 1.0,
            direct_scaling_factor: 1.0,
            resize: None,
        })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn scaling_node(&self) -> NodeId {
        self.scaling_node
    }

    pub fn collider(&self, part: WidgetPart) -> Option<NodeId> {
        self.handle(part).map(|h| h.collider)
    }

    fn handle(&self, part: WidgetPart) -> Option<&HandleNodes> {
        self.handles.iter().find(|h| h.part == part)
    }

    /// The widget part `node` is, if it is one of this widget's colliders.
    pub fn part_of(&self, node: NodeId) -> Option<WidgetPart> {
        self.handles.iter().find(|h| h.collider == node).map(|h| h.part)
    }

    pub fn show_widget(&self, scene: &mut SceneGraph) {
        if let Err(err) = scene.reparent_to(self.root, self.display_parent) {
            log::warn!("show widget: {err}");
        }
    }

    pub fn hide_widget(&self, scene: &mut SceneGraph) {
        let hidden = scene.hidden_root();
        if let Err(err) = scene.reparent_to(self.root, hidden) {
            log::warn!("hide widget: {err}");
        }
    }

    pub fn toggle_widget(&self, scene: &mut SceneGraph) {
        if self.is_shown(scene) {
            self.hide_widget(scene);
        } else {
            self.show_widget(scene);
        }
    }

    pub fn is_shown(&self, scene: &SceneGraph) -> bool {
        scene.parent(self.root) == Some(self.display_parent)
    }

    pub fn enable_handles(&self, scene: &mut SceneGraph, kinds: &[HandleKind]) {
        for handle in self.handles.iter().filter(|h| kinds.contains(&h.part.kind)) {
            let axis_node = self.axis_nodes[handle.part.axis.index()];
            if let Err(err) = scene.reparent_to(handle.group, axis_node) {
                log::warn!("enable {}: {err}", handle.part);
            }
        }
    }

    /// Parks the given handle kinds under the hidden root, out of reach of picks.
    pub fn disable_handles(&self, scene: &mut SceneGraph, kinds: &[HandleKind]) {
        let hidden = scene.hidden_root();
        for handle in self.handles.iter().filter(|h| kinds.contains(&h.part.kind)) {
            if let Err(err) = scene.reparent_to(handle.group, hidden) {
                log::warn!("disable {}: {err}", handle.part);
            }
        }
    }

    pub fn is_enabled(&self, scene: &SceneGraph, part: WidgetPart) -> bool {
        self.handle(part)
            .map(|h| scene.parent(h.group) == Some(self.axis_nodes[part.axis.index()]))
            .unwrap_or(false)
    }

    pub fn show_all_handles(&self, scene: &mut SceneGraph) {
        for handle in &self.handles {
            scene.show(handle.visible);
        }
    }

    pub fn hide_all_handles(&self, scene: &mut SceneGraph) {
        for handle in &self.handles {
            scene.hide(handle.visible);
        }
    }

    pub fn show_handle(&self, scene: &mut SceneGraph, part: WidgetPart) {
        if let Some(handle) = self.handle(part) {
            scene.show(handle.visible);
        }
    }

    pub fn is_handle_visible(&self, scene: &SceneGraph, part: WidgetPart) -> bool {
        self.handle(part)
            .map(|h| !scene.is_hidden(h.visible))
            .unwrap_or(false)
    }

    pub fn show_guides(&self, scene: &mut SceneGraph) {
        scene.show(self.guide_lines);
    }

    pub fn hide_guides(&self, scene: &mut SceneGraph) {
        scene.hide(self.guide_lines);
    }

    pub fn guides_shown(&self, scene: &SceneGraph) -> bool {
        !scene.is_hidden(self.guide_lines)
    }

    pub fn coa_mode_color(&self, scene: &mut SceneGraph) {
        scene.set_color(self.root, COA_MODE_COLOR);
    }

    pub fn disabled_mode_color(&self, scene: &mut SceneGraph) {
        scene.set_color(self.root, DISABLED_MODE_COLOR);
    }

    pub fn manip_mode_color(&self, scene: &mut SceneGraph) {
        scene.clear_color(self.root);
    }

    pub fn scaling_factor(&self) -> f64 {
        self.scaling_factor
    }

    /// Sets the handle size outright, cancelling any running resize.
    pub fn set_scaling_factor(&mut self, scene: &mut SceneGraph, factor: f64) {
        self.resize = None;
        self.scaling_factor = factor;
        self.apply_scale(scene, self.effective_scale());
    }

    /// Extra multiplier applied on top of the scaling factor (the
    /// scale-by-camera hook).
    pub fn set_direct_scaling_factor(&mut self, scene: &mut SceneGraph, factor: f64) {
        self.direct_scaling_factor = factor;
        if self.resize.is_none() {
            self.apply_scale(scene, self.effective_scale());
        }
    }

    fn effective_scale(&self) -> f64 {
        self.scaling_factor * self.direct_scaling_factor
    }

    fn apply_scale(&self, scene: &mut SceneGraph, s: f64) {
        scene.set_scale(self.scaling_node, DVec3::splat(s));
    }

    fn current_scale(&self, scene: &SceneGraph) -> f64 {
        scene.scale(self.scaling_node).map(|s| s.x).unwrap_or(1.0)
    }

    /// Animates the handle size by `factor` over half a second.
    pub fn multiply_scaling_factor_by(&mut self, scene: &SceneGraph, factor: f64) {
        self.scaling_factor *= factor;
        self.start_resize(scene);
    }

    /// Animates the handles to a size that covers a fixed share of the view.
    pub fn grow_to_fit(&mut self, scene: &SceneGraph, dr: &DisplayRegionContext) {
        let Some(pos) = scene.pos_relative(self.root, dr.cam()) else {
            return;
        };
        let min_dim = dr.near_width.min(dr.near_height);
        let depth = if dr.kind().is_orthographic() {
            dr.near
        } else {
            pos.y.abs().max(dr.near)
        };
        let sf = 0.15 * min_dim * (depth / dr.near);
        if sf <= 0.0 || !sf.is_finite() {
            return;
        }
        self.scaling_factor = sf / self.direct_scaling_factor.max(f64::EPSILON);
        self.start_resize(scene);
    }

    fn start_resize(&mut self, scene: &SceneGraph) {
        self.resize = Some(ScaleLerp {
            interval: Interval::new(RESIZE_DURATION, BlendType::EaseInOut),
            from: self.current_scale(scene),
            to: self.effective_scale(),
        });
    }

    pub fn is_resizing(&self) -> bool {
        self.resize.is_some()
    }

    /// Advances a running resize.
    pub fn step(&mut self, scene: &mut SceneGraph, dt: f64) -> TaskStatus {
        let Some(resize) = self.resize.as_mut() else {
            return TaskStatus::Done;
        };
        let t = resize.interval.step(dt);
        let s = resize.from + (resize.to - resize.from) * t;
        let finished = resize.interval.is_finished();
        self.apply_scale(scene, s);
        if finished {
            self.resize = None;
            TaskStatus::Done
        } else {
            TaskStatus::Continue
        }
    }

    /// Mouse ray projected onto `axis` in widget space. The ray is intersected
    /// with whichever of the two planes containing the axis faces it more
    /// directly.
    pub fn axis_intersect_pt(
        &self,
        scene: &SceneGraph,
        camera: NodeId,
        ray: (DVec3, DVec3),
        axis: Axis,
    ) -> Option<DVec3> {
        let (origin, dir) = ray_in(scene, camera, self.root, ray)?;
        let others: Vec<Axis> = Axis::ALL.into_iter().filter(|a| *a != axis).collect();
        let (a, b) = (others[0], others[1]);
        let (first, second) = if dir.dot(a.unit()).abs() > dir.dot(b.unit()).abs() {
            (a, b)
        } else {
            (b, a)
        };
        let hit = plane_intersect(origin, dir, DVec3::ZERO, first.unit())
            .or_else(|_| plane_intersect(origin, dir, DVec3::ZERO, second.unit()))
            .ok()?;
        Some(axis.unit() * hit[axis.index()])
    }

    pub fn widget_intersect_pt(
        &self,
        scene: &SceneGraph,
        camera: NodeId,
        ray: (DVec3, DVec3),
        plane: Axis,
    ) -> Result<DVec3, GeometryError> {
        node_plane_intersect(scene, camera, self.root, ray, plane)
    }
}

/// Mouse ray (camera space) intersected with `node`'s `plane`, result in
/// `node` space.
pub fn node_plane_intersect(
    scene: &SceneGraph,
    camera: NodeId,
    node: NodeId,
    ray: (DVec3, DVec3),
    plane: Axis,
) -> Result<DVec3, GeometryError> {
    let (origin, dir) =
        ray_in(scene, camera, node, ray).ok_or(GeometryError::DegenerateIntersection)?;
    plane_intersect(origin, dir, DVec3::ZERO, plane.unit())
}

fn ray_in(
    scene: &SceneGraph,
    camera: NodeId,
    node: NodeId,
    ray: (DVec3, DVec3),
) -> Option<(DVec3, DVec3)> {
    let cam_to_node = scene.mat_relative(camera, node)?;
    let dir = cam_to_node.transform_vector3(ray.1).normalize_or_zero();
    if dir == DVec3::ZERO {
        return None;
    }
    Some((cam_to_node.transform_point3(ray.0), dir))
}

fn axis_color(axis: Axis) -> [f32; 4] {
    match axis {
        Axis::X => [1.0, 0.0, 0.0, 1.0],
        Axis::Y => [0.0, 1.0, 0.0, 1.0],
        Axis::Z => [0.0, 0.0, 1.0, 1.0],
    }
}

fn handle_shape(part: WidgetPart) -> Shape {
    let n = part.axis.unit();
    match part.kind {
        HandleKind::Post => Shape::Tube {
            a: DVec3::ZERO,
            b: n * POST_LENGTH,
            radius: POST_RADIUS,
        },
        HandleKind::Ring => Shape::Ring {
            center: DVec3::ZERO,
            normal: n,
            radius: RING_RADIUS,
            thickness: RING_THICKNESS,
        },
        HandleKind::Disc => Shape::Disc {
            center: DVec3::ZERO,
            normal: n,
            radius: DISC_RADIUS,
        },
    }
}

/// Unit vectors spanning the plane normal to `axis`, in right-handed order.
fn plane_basis(axis: Axis) -> (DVec3, DVec3) {
    match axis {
        Axis::X => (DVec3::Y, DVec3::Z),
        Axis::Y => (DVec3::Z, DVec3::X),
        Axis::Z => (DVec3::X, DVec3::Y),
    }
}

fn circle(axis: Axis, radius: f64) -> Vec<DVec3> {
    let (u, v) = plane_basis(axis);
    (0..=24)
        .map(|i| {
            let a = (i as f64 * 15.0).to_radians();
            (u * a.cos() + v * a.sin()) * radius
        })
        .collect()
}

fn handle_lines(part: WidgetPart, color: [f32; 4]) -> LineSet {
    let n = part.axis.unit();
    match part.kind {
        HandleKind::Post => {
            let mut lines = LineSet::new(color, 2.0);
            lines.add_strip(&[n * POST_LENGTH, n * -POST_LENGTH]);
            let (u, v) = plane_basis(part.axis);
            let tip = n * POST_LENGTH;
            for (su, sv) in [(1.0, 1.0), (1.0, -1.0), (-1.0, 1.0), (-1.0, -1.0)] {
                lines.add_strip(&[tip, n * 1.3 + u * (0.1 * su) + v * (0.1 * sv)]);
            }
            lines
        }
        HandleKind::Ring => {
            let mut lines = LineSet::new(color, 2.0);
            lines.add_strip(&circle(part.axis, RING_RADIUS));
            lines
        }
        HandleKind::Disc => {
            let [r, g, b, _] = color;
            let mut lines = LineSet::new([r, g, b, 0.2], 1.0);
            lines.add_strip(&circle(part.axis, DISC_RADIUS));
            lines
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Lens;
    use crate::viewport::RegionRect;
    use glam::DVec2;

    fn close(a: DVec3, b: DVec3, eps: f64) -> bool {
        (a - b).abs().max_element() < eps
    }

    fn setup() -> (SceneGraph, ObjectHandles, DisplayRegionContext) {
        let mut scene = SceneGraph::new();
        let cam = scene.attach_new_node(scene.root(), "cam").unwrap();
        scene.set_lens(cam, Lens::perspective(40.0, 30.0, 1.0, 1000.0));
        scene.set_pos(cam, DVec3::new(0.0, -10.0, 0.0));
        let dr = DisplayRegionContext::new(&scene, cam, RegionRect::FULL).unwrap();
        let render = scene.root();
        let widget = ObjectHandles::new(&mut scene, render).unwrap();
        (scene, widget, dr)
    }

    #[test]
    fn part_names_parse() {
        assert_eq!(
            WidgetPart::parse("x-post"),
            Some(WidgetPart::new(Axis::X, HandleKind::Post))
        );
        assert_eq!(
            WidgetPart::parse("z-ring"),
            Some(WidgetPart::new(Axis::Z, HandleKind::Ring))
        );
        assert_eq!(WidgetPart::parse("y-disc-visible"), None);
        assert_eq!(WidgetPart::parse("xy-post"), None);
        assert_eq!(WidgetPart::parse("w-post"), None);
        for part in WidgetPart::all() {
            assert_eq!(WidgetPart::parse(&part.name()), Some(part));
            assert_eq!(part.to_string(), part.name());
        }
    }

    #[test]
    fn colliders_are_named_after_parts() {
        let (scene, widget, _) = setup();
        for part in WidgetPart::all() {
            let collider = widget.collider(part).unwrap();
            assert_eq!(scene.name(collider), Some(part.name().as_str()));
            assert_eq!(widget.part_of(collider), Some(part));
            let (_, mask) = scene.collider(collider).unwrap();
            assert_eq!(mask, CollideMask::WIDGET);
        }
    }

    #[test]
    fn show_hide_widget() {
        let (mut scene, widget, _) = setup();
        assert!(!widget.is_shown(&scene));
        assert!(scene.is_net_hidden(widget.root()));
        widget.show_widget(&mut scene);
        assert!(widget.is_shown(&scene));
        widget.toggle_widget(&mut scene);
        assert!(!widget.is_shown(&scene));
    }

    #[test]
    fn handles_and_guides_toggle() {
        let (mut scene, widget, _) = setup();
        let ring = WidgetPart::new(Axis::Y, HandleKind::Ring);
        widget.hide_all_handles(&mut scene);
        widget.show_handle(&mut scene, ring);
        assert!(widget.is_handle_visible(&scene, ring));
        assert!(!widget.is_handle_visible(&scene, WidgetPart::new(Axis::X, HandleKind::Post)));
        widget.show_all_handles(&mut scene);
        assert!(WidgetPart::all().all(|p| widget.is_handle_visible(&scene, p)));

        assert!(!widget.guides_shown(&scene));
        widget.show_guides(&mut scene);
        assert!(widget.guides_shown(&scene));

        widget.disable_handles(&mut scene, &[HandleKind::Ring]);
        assert!(!widget.is_enabled(&scene, ring));
        assert!(widget.is_enabled(&scene, WidgetPart::new(Axis::Y, HandleKind::Disc)));
        widget.enable_handles(&mut scene, &[HandleKind::Ring]);
        assert!(widget.is_enabled(&scene, ring));
    }

    #[test]
    fn scaling_factor_is_absolute() {
        let (mut scene, mut widget, _) = setup();
        widget.set_scaling_factor(&mut scene, 2.0);
        widget.set_scaling_factor(&mut scene, 3.0);
        assert_eq!(scene.scale(widget.scaling_node()), Some(DVec3::splat(3.0)));
        widget.set_direct_scaling_factor(&mut scene, 0.5);
        assert_eq!(scene.scale(widget.scaling_node()), Some(DVec3::splat(1.5)));
    }

    #[test]
    fn multiply_scaling_factor_animates() {
        let (mut scene, mut widget, _) = setup();
        widget.set_scaling_factor(&mut scene, 2.0);
        widget.multiply_scaling_factor_by(&scene, 2.0);
        assert!(widget.is_resizing());
        assert_eq!(widget.step(&mut scene, 0.25), TaskStatus::Continue);
        let mid = scene.scale(widget.scaling_node()).unwrap().x;
        assert!(mid > 2.0 && mid < 4.0);
        assert_eq!(widget.step(&mut scene, 0.5), TaskStatus::Done);
        assert_eq!(scene.scale(widget.scaling_node()), Some(DVec3::splat(4.0)));
    }

    #[test]
    fn axis_intersect_projects_onto_axis() {
        let (scene, widget, dr) = setup();
        let ray = dr.mouse_ray(DVec2::new(0.2, 0.1));
        let hit = widget.axis_intersect_pt(&scene, dr.cam(), ray, Axis::X).unwrap();
        assert!(hit.x > 0.0);
        assert_eq!(hit.y, 0.0);
        assert_eq!(hit.z, 0.0);
        // Camera at y = -10, near plane 1: x on the near plane scales by 10.
        let expected = dr.near_width * 0.5 * 0.2 * 10.0;
        assert!((hit.x - expected).abs() < 1e-9);
    }

    #[test]
    fn widget_plane_intersect_and_degenerate() {
        let (scene, widget, dr) = setup();
        let ray = dr.mouse_ray(DVec2::new(-0.3, 0.4));
        let hit = widget.widget_intersect_pt(&scene, dr.cam(), ray, Axis::Y).unwrap();
        assert!(hit.y.abs() < 1e-9);
        assert!(hit.x < 0.0 && hit.z > 0.0);

        // Straight down the view axis never meets the widget's x plane.
        let centre = dr.mouse_ray(DVec2::ZERO);
        assert!(close(centre.1.normalize(), DVec3::Y, 1e-12));
        assert_eq!(
            widget.widget_intersect_pt(&scene, dr.cam(), centre, Axis::X),
            Err(GeometryError::DegenerateIntersection)
        );
    }

    #[test]
    fn grow_to_fit_scales_with_distance() {
        let (mut scene, mut widget, dr) = setup();
        widget.grow_to_fit(&scene, &dr);
        widget.step(&mut scene, 1.0);
        let s = scene.scale(widget.scaling_node()).unwrap().x;
        let expected = 0.15 * dr.near_width.min(dr.near_height) * 10.0;
        assert!((s - expected).abs() < 1e-9);
    }
}
