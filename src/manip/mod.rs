//! Direct manipulation of the selection through the object handles.
//!
//! A primary-button press first picks the widget to find the constraint.
//! Releasing before the pivot delay (and without moving) turns the press into
//! a selection click; holding or dragging turns it into a move, which runs one
//! [`ManipOp`] per frame on the widget and carries the selection along through
//! the offsets captured at move start.

pub mod widget;

pub use widget::{HandleKind, ObjectHandles, WidgetPart};

use crate::app::events::DirectEvent;
use crate::app::EditContext;
use crate::geometry::{
    get_crank_angle, get_near_projection_point, get_screen_xy, rel_hpr, wrap_degrees, Axis,
    EPSILON,
};
use crate::pick::SkipFlags;
use crate::scene::{NodeId, SceneError, SceneGraph};
use crate::selection::SelectedNodes;
use crate::task::{BlendType, Interval, TaskStatus, Timer};
use crate::viewport::DisplayRegionContext;
use bitflags::bitflags;
use glam::{DMat4, DVec2, DVec3};

bitflags! {
    /// Per-node manipulation vetoes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EditTypes: u8 {
        const UNMOVABLE = 1;
        const UNSCALABLE = 1 << 1;
        const UNROTATABLE = 1 << 2;
        const UNEDITABLE = Self::UNMOVABLE.bits() | Self::UNSCALABLE.bits() | Self::UNROTATABLE.bits();
    }
}

/// Default tag read for edit types.
pub const EDIT_TYPE_TAG: &str = "EditType";

impl EditTypes {
    /// Parses a tag value, either numeric bits (`"4"`) or flag names
    /// (`"UNMOVABLE | UNROTATABLE"`).
    pub fn from_tag(value: &str) -> Option<Self> {
        if let Ok(bits) = value.trim().parse::<u8>() {
            return Some(Self::from_bits_truncate(bits));
        }
        bitflags::parser::from_str(value).ok()
    }

    /// Union of the edit types tagged on `nodes` under any of `tags`.
    pub fn of_nodes(scene: &SceneGraph, nodes: &[NodeId], tags: &[String]) -> Self {
        let mut edit = EditTypes::empty();
        for node in nodes {
            for tag in tags {
                if let Some(value) = scene.tag(*node, tag) {
                    match EditTypes::from_tag(value) {
                        Some(flags) => edit |= flags,
                        None => log::warn!("ignoring malformed {tag} tag {value:?}"),
                    }
                }
            }
        }
        edit
    }
}

/// What a move does to the widget each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManipOp {
    Translate1D(Axis),
    Translate2D(Axis),
    Rotate1D(Axis),
    Scale1D(Axis),
    Scale3D,
    /// Free move in the camera's XZ plane.
    TranslateCamXZ,
    /// Free move along the camera's Y, keeping the screen X.
    TranslateCamXY,
    Rotate2D,
    RotateAboutViewVector,
}

impl ManipOp {
    /// Picks the operation for a press. `edge` flags whether the press was in
    /// the outer frame along x and y. `None` means the edit types forbid
    /// every candidate.
    pub fn resolve(
        constraint: Option<WidgetPart>,
        edit: EditTypes,
        control: bool,
        shift: bool,
        edge: (bool, bool),
    ) -> Option<Self> {
        let can_move = !edit.contains(EditTypes::UNMOVABLE);
        let can_scale = !edit.contains(EditTypes::UNSCALABLE);
        let can_rotate = !edit.contains(EditTypes::UNROTATABLE);

        if let Some(part) = constraint {
            if control && can_scale {
                return Some(match part.kind {
                    HandleKind::Post => ManipOp::Scale1D(part.axis),
                    HandleKind::Ring | HandleKind::Disc => ManipOp::Scale3D,
                });
            }
            return match part.kind {
                HandleKind::Post if can_move => Some(ManipOp::Translate1D(part.axis)),
                HandleKind::Disc if can_move => Some(ManipOp::Translate2D(part.axis)),
                HandleKind::Ring if can_rotate => Some(ManipOp::Rotate1D(part.axis)),
                _ => None,
            };
        }

        if control && can_scale {
            return Some(ManipOp::Scale3D);
        }
        match edge {
            (true, true) if can_rotate => Some(ManipOp::RotateAboutViewVector),
            (true, _) | (_, true) if can_rotate => Some(ManipOp::Rotate2D),
            _ if can_move => Some(if shift || control {
                ManipOp::TranslateCamXY
            } else {
                ManipOp::TranslateCamXZ
            }),
            _ => None,
        }
    }

    pub fn is_scale(self) -> bool {
        matches!(self, ManipOp::Scale1D(_) | ManipOp::Scale3D)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Idle,
    /// Button held, not yet a click or a move. No timer when Alt was down.
    Pressed { timer: Option<Timer>, start: DVec2 },
    Moving,
    /// The move was refused; the release is swallowed.
    Vetoed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TaskState {
    Translate { prev: Option<DVec3> },
    Rotate1D { top: bool, centre: DVec3, last_angle: f64 },
    Scale { init_mag: f64, init_scale: DVec3 },
    CamXZ,
    CamXY { scale: f64, delta_near_x: f64 },
    /// `dir` is the screen axis motion is constrained to near the frame.
    Rotate2D { dir: Axis },
    RotateView { centre: DVec3, last_angle: f64 },
}

/// Widget slide toward a camera-relative target with the selection stuck
/// to it.
#[derive(Debug, Clone, Copy, PartialEq)]
struct WidgetMove {
    from: DVec3,
    to: DVec3,
    interval: Interval,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ManipTask {
    op: ManipOp,
    state: TaskState,
}

/// Result of a primary-button release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// Click on geometry.
    Select(NodeId),
    /// Click on nothing.
    DeselectAll,
    /// A move finished.
    Manipulated,
    Ignored,
}

#[derive(Debug, Clone)]
pub struct ManipulationControl {
    widget: ObjectHandles,
    manip_ref: NodeId,
    phase: Phase,
    constraint: Option<WidgetPart>,
    hit_pt: DVec3,
    task: Option<ManipTask>,
    widget_move: Option<WidgetMove>,
    following: bool,
    set_coa: bool,
    movable: bool,
    edit_tags: Vec<String>,
    pub optional_skip: SkipFlags,
}

impl ManipulationControl {
    pub fn new(scene: &mut SceneGraph, group: NodeId) -> Result<Self, SceneError> {
        let widget = ObjectHandles::new(scene, group)?;
        let manip_ref = scene.attach_new_node(group, "manipRef")?;
        Ok(Self {
            widget,
            manip_ref,
            phase: Phase::Idle,
            constraint: None,
            hit_pt: DVec3::ZERO,
            task: None,
            widget_move: None,
            following: false,
            set_coa: false,
            movable: true,
            edit_tags: vec![EDIT_TYPE_TAG.to_string()],
            optional_skip: SkipFlags::empty(),
        })
    }

    pub fn widget(&self) -> &ObjectHandles {
        &self.widget
    }

    pub fn widget_mut(&mut self) -> &mut ObjectHandles {
        &mut self.widget
    }

    pub fn constraint(&self) -> Option<WidgetPart> {
        self.constraint
    }

    /// Widget-space point where the press hit the constraint.
    pub fn hit_pt(&self) -> DVec3 {
        self.hit_pt
    }

    pub fn current_op(&self) -> Option<ManipOp> {
        self.task.map(|t| t.op)
    }

    pub fn is_manipulating(&self) -> bool {
        self.task.is_some()
    }

    pub fn is_pressed(&self) -> bool {
        !matches!(self.phase, Phase::Idle)
    }

    pub fn is_moving_widget(&self) -> bool {
        self.widget_move.is_some()
    }

    pub fn is_following(&self) -> bool {
        self.following
    }

    pub fn is_set_coa_mode(&self) -> bool {
        self.set_coa
    }

    pub fn is_movable(&self) -> bool {
        self.movable
    }

    pub fn edit_types(&self, scene: &SceneGraph, selection: &SelectedNodes) -> EditTypes {
        self.edit_types_of(scene, &selection.selected_as_list())
    }

    pub fn edit_types_of(&self, scene: &SceneGraph, nodes: &[NodeId]) -> EditTypes {
        EditTypes::of_nodes(scene, nodes, &self.edit_tags)
    }

    // ====================================================================
    // Press / release
    // ====================================================================

    pub fn press(&mut self, ctx: &mut EditContext) {
        if self.task.is_some() {
            return;
        }
        let ray = ctx.mouse_ray();
        let filter = ctx.pick_filter(Some(self.widget.root()));
        let render = ctx.render();
        let entry = ctx.dr.ray.pick_widget(ctx.scene, render, ray, &filter);
        self.constraint = entry.as_ref().and_then(|e| self.widget.part_of(e.into_node));
        self.hit_pt = entry
            .as_ref()
            .and_then(|e| e.surface_point_in(ctx.scene, self.widget.root()))
            .unwrap_or(DVec3::ZERO);
        if let Some(part) = self.constraint {
            log::debug!("widget press on {part}");
        }
        let timer = (!ctx.input.alt()).then(|| Timer::new(ctx.config.pivot_delay));
        self.phase = Phase::Pressed {
            timer,
            start: ctx.dr.mouse,
        };
    }

    pub fn release(&mut self, ctx: &mut EditContext) -> Release {
        let phase = std::mem::replace(&mut self.phase, Phase::Idle);
        match phase {
            Phase::Pressed { .. } => {
                let mut skip = SkipFlags::DEFAULT | SkipFlags::UNPICKABLE | self.optional_skip;
                if !ctx.input.control() {
                    skip |= SkipFlags::CAMERA;
                }
                match ctx.pick_geom(skip) {
                    Some(entry) => Release::Select(entry.into_node),
                    None => Release::DeselectAll,
                }
            }
            Phase::Moving => {
                self.cleanup(ctx);
                Release::Manipulated
            }
            Phase::Idle | Phase::Vetoed => Release::Ignored,
        }
    }

    fn begin_move(&mut self, ctx: &mut EditContext, start: DVec2) {
        let edit = self.edit_types(ctx.scene, ctx.selection);
        if ctx.selection.is_empty() || edit.contains(EditTypes::UNEDITABLE) {
            self.phase = Phase::Vetoed;
            return;
        }
        let threshold = ctx.config.edge_threshold;
        let edge = (start.x.abs() > threshold, start.y.abs() > threshold);
        let Some(op) = ManipOp::resolve(
            self.constraint,
            edit,
            ctx.input.control(),
            ctx.input.shift(),
            edge,
        ) else {
            log::debug!("move vetoed by edit types {edit:?}");
            self.phase = Phase::Vetoed;
            return;
        };

        self.following = false;
        self.widget_move = None;
        let nodes = ctx.selection.selected_as_list();
        ctx.push_undo(&nodes);
        self.widget.show_guides(ctx.scene);
        self.widget.hide_all_handles(ctx.scene);
        if let Some(part) = self.constraint {
            self.widget.show_handle(ctx.scene, part);
        }
        self.check_widget_on_pivot(ctx, "start");
        ctx.selection.get_wrt_all(ctx.scene, self.widget.root());
        ctx.selection.dehighlight_all(ctx.scene);
        ctx.events.send(DirectEvent::ManipulateObjectStart);
        log::info!("manipulate start: {op:?} on {} node(s)", nodes.len());

        let state = self.init_task(ctx, op, start, edge);
        self.task = Some(ManipTask { op, state });
        self.phase = Phase::Moving;
    }

    fn cleanup(&mut self, ctx: &mut EditContext) {
        if let Some(task) = self.task.take() {
            log::info!("manipulate cleanup after {:?}", task.op);
        }
        self.widget.show_all_handles(ctx.scene);
        self.widget.hide_guides(ctx.scene);
        ctx.selection.highlight_all(ctx.scene);
        self.check_widget_on_pivot(ctx, "cleanup");
        self.following = ctx.selection.last().is_some();
        ctx.events.send(DirectEvent::ManipulateObjectCleanup(
            ctx.selection.selected_as_list(),
        ));
    }

    fn check_widget_on_pivot(&self, ctx: &EditContext, when: &str) {
        if self.set_coa || ctx.config.world_space_manip {
            return;
        }
        let Some(last) = ctx.selection.last() else {
            return;
        };
        let (Some(widget), Some(pivot)) = (
            ctx.scene.world_mat(self.widget.root()),
            last.coa_world(ctx.scene),
        ) else {
            return;
        };
        if !mats_close(&widget, &pivot, 1e-4) {
            log::warn!("widget is off the selection pivot at manipulation {when}");
        }
    }

    // ====================================================================
    // Per-frame
    // ====================================================================

    /// Runs one frame: the select-or-move decision, the active move, the
    /// follow task and widget resizing.
    pub fn step(&mut self, ctx: &mut EditContext, dt: f64) {
        if let Phase::Pressed {
            timer: Some(mut timer),
            start,
        } = self.phase
        {
            let moved = (ctx.dr.mouse - start).abs().max_element() > ctx.config.move_threshold;
            let expired = timer.advance(dt) == TaskStatus::Done;
            if moved || expired {
                self.begin_move(ctx, start);
            } else {
                self.phase = Phase::Pressed {
                    timer: Some(timer),
                    start,
                };
            }
        }

        if let Some(mut task) = self.task.take() {
            self.run_task(ctx, &mut task);
            self.task = Some(task);
        }

        if let Some(mut slide) = self.widget_move.take() {
            let t = slide.interval.step(dt);
            let cam = ctx.camera();
            let root = self.widget.root();
            ctx.scene
                .set_pos_relative(root, cam, slide.from.lerp(slide.to, t));
            ctx.selection.move_wrt_widget_all(ctx.scene, root);
            if slide.interval.is_finished() {
                self.following = ctx.selection.last().is_some();
            } else {
                self.widget_move = Some(slide);
            }
        }

        self.following = self.following && ctx.selection.last().is_some();
        if self.following && self.task.is_none() {
            self.follow_frame(ctx.scene, ctx.selection, ctx.config.world_space_manip);
        }
        if ctx.config.scale_widget_by_cam {
            self.resize_by_cam(ctx);
        }
        self.widget.step(ctx.scene, dt);
    }

    pub fn spawn_follow(&mut self, ctx: &mut EditContext) {
        self.following = ctx.selection.last().is_some()
            && self.task.is_none()
            && self.widget_move.is_none();
        if self.following {
            self.follow_frame(ctx.scene, ctx.selection, ctx.config.world_space_manip);
        }
    }

    pub fn stop_follow(&mut self) {
        self.following = false;
    }

    /// Snaps the widget onto the last selected node's pivot.
    pub fn follow_frame(&self, scene: &mut SceneGraph, selection: &SelectedNodes, world_space: bool) {
        let Some(mut m) = selection.last().and_then(|last| last.coa_world(scene)) else {
            return;
        };
        if world_space {
            m = DMat4::from_translation(m.w_axis.truncate());
        }
        let render = scene.root();
        scene.set_mat_relative(self.widget.root(), render, m);
    }

    fn resize_by_cam(&mut self, ctx: &mut EditContext) {
        let Some(last) = ctx.selection.last() else {
            return;
        };
        let Some(pos) = ctx.scene.pos_relative(last.node, ctx.camera()) else {
            return;
        };
        let sf = 0.075 * pos.length() * ctx.dr.vfov().to_radians().tan();
        if sf > EPSILON {
            self.widget.set_direct_scaling_factor(ctx.scene, sf);
        }
    }

    fn init_task(&self, ctx: &mut EditContext, op: ManipOp, start: DVec2, edge: (bool, bool)) -> TaskState {
        let cam = ctx.camera();
        let root = self.widget.root();
        let start_ray = ctx.dr.mouse_ray(start);
        match op {
            ManipOp::Translate1D(axis) => TaskState::Translate {
                prev: self.widget.axis_intersect_pt(ctx.scene, cam, start_ray, axis),
            },
            ManipOp::Translate2D(axis) => TaskState::Translate {
                prev: self
                    .widget
                    .widget_intersect_pt(ctx.scene, cam, start_ray, axis)
                    .ok(),
            },
            ManipOp::Rotate1D(axis) => {
                let centre = get_screen_xy(ctx.scene, root, ctx.dr).unwrap_or(DVec3::ZERO);
                TaskState::Rotate1D {
                    top: widget_top(ctx.scene, root, cam, axis),
                    centre,
                    last_angle: get_crank_angle(centre, start),
                }
            }
            ManipOp::Scale1D(axis) => {
                let init_scale = ctx.scene.scale(root).unwrap_or(DVec3::ONE);
                ctx.scene.set_scale(root, DVec3::ONE);
                let init_mag = self
                    .widget
                    .axis_intersect_pt(ctx.scene, cam, start_ray, axis)
                    .map(|p| p.length())
                    .unwrap_or(0.0);
                ctx.scene.set_scale(root, init_scale);
                TaskState::Scale {
                    init_mag,
                    init_scale,
                }
            }
            ManipOp::Scale3D => {
                let render = ctx.render();
                let pos = ctx.scene.pos_relative(root, render).unwrap_or(DVec3::ZERO);
                let quat = ctx.scene.quat_relative(cam, render).unwrap_or_default();
                ctx.scene.set_scale(self.manip_ref, DVec3::ONE);
                ctx.scene.set_pos_quat_relative(self.manip_ref, render, pos, quat);
                let init_mag =
                    widget::node_plane_intersect(ctx.scene, cam, self.manip_ref, start_ray, Axis::Y)
                        .map(|p| p.length())
                        .unwrap_or(0.0);
                TaskState::Scale {
                    init_mag,
                    init_scale: ctx.scene.scale(root).unwrap_or(DVec3::ONE),
                }
            }
            ManipOp::TranslateCamXZ => TaskState::CamXZ,
            ManipOp::TranslateCamXY => {
                let w2c = ctx.scene.pos_relative(root, cam).unwrap_or(DVec3::ZERO);
                let near_pt = get_near_projection_point(ctx.scene, root, cam, ctx.dr.near)
                    .unwrap_or(DVec3::ZERO);
                let (origin, dir) = start_ray;
                let start_x = if ctx.dr.kind().is_orthographic() {
                    origin.x
                } else {
                    dir.x
                };
                let widget_x = if ctx.dr.kind().is_orthographic() {
                    w2c.x
                } else {
                    near_pt.x
                };
                TaskState::CamXY {
                    scale: w2c.length(),
                    delta_near_x: widget_x - start_x,
                }
            }
            ManipOp::Rotate2D => TaskState::Rotate2D {
                dir: if edge.0 { Axis::Y } else { Axis::X },
            },
            ManipOp::RotateAboutViewVector => {
                let centre = get_screen_xy(ctx.scene, root, ctx.dr).unwrap_or(DVec3::ZERO);
                TaskState::RotateView {
                    centre,
                    last_angle: get_crank_angle(centre, start),
                }
            }
        }
    }

    fn run_task(&self, ctx: &mut EditContext, task: &mut ManipTask) {
        let cam = ctx.camera();
        let root = self.widget.root();
        let ray = ctx.mouse_ray();
        let mouse = ctx.dr.mouse;
        let delta = ctx.dr.mouse_delta;

        match (task.op, &mut task.state) {
            (ManipOp::Translate1D(axis), TaskState::Translate { prev }) => {
                if let Some(hit) = self.widget.axis_intersect_pt(ctx.scene, cam, ray, axis) {
                    translate_to_hit(ctx.scene, root, prev, hit);
                }
            }
            (ManipOp::Translate2D(axis), TaskState::Translate { prev }) => {
                if let Ok(hit) = self.widget.widget_intersect_pt(ctx.scene, cam, ray, axis) {
                    translate_to_hit(ctx.scene, root, prev, hit);
                }
            }
            (
                ManipOp::Rotate1D(axis),
                TaskState::Rotate1D {
                    top,
                    centre,
                    last_angle,
                },
            ) => {
                let angle = get_crank_angle(*centre, mouse);
                let mut d = wrap_degrees(*last_angle - angle);
                if *top {
                    d = -d;
                }
                let hpr = match axis {
                    Axis::X => DVec3::new(0.0, d, 0.0),
                    Axis::Y => DVec3::new(0.0, 0.0, d),
                    Axis::Z => DVec3::new(d, 0.0, 0.0),
                };
                ctx.scene.set_hpr_relative(root, root, hpr);
                *last_angle = angle;
            }
            (
                ManipOp::Scale1D(axis),
                TaskState::Scale {
                    init_mag,
                    init_scale,
                },
            ) => {
                if *init_mag < EPSILON {
                    return self.after_frame(ctx);
                }
                ctx.scene.set_scale(root, DVec3::ONE);
                let mut scale = *init_scale;
                if let Some(p) = self.widget.axis_intersect_pt(ctx.scene, cam, ray, axis) {
                    scale[axis.index()] = init_scale[axis.index()] * p.length() / *init_mag;
                }
                ctx.scene.set_scale(root, scale);
            }
            (
                ManipOp::Scale3D,
                TaskState::Scale {
                    init_mag,
                    init_scale,
                },
            ) => {
                if *init_mag < EPSILON {
                    return self.after_frame(ctx);
                }
                if let Ok(p) =
                    widget::node_plane_intersect(ctx.scene, cam, self.manip_ref, ray, Axis::Y)
                {
                    ctx.scene.set_scale(root, *init_scale * (p.length() / *init_mag));
                }
            }
            (ManipOp::TranslateCamXZ, TaskState::CamXZ) => {
                if let Some(mut p) = ctx.scene.pos_relative(root, cam) {
                    let k = depth_scale(ctx.dr, p.y);
                    p.x += 0.5 * delta.x * ctx.dr.near_width * k;
                    p.z += 0.5 * delta.y * ctx.dr.near_height * k;
                    ctx.scene.set_pos_relative(root, cam, p);
                }
            }
            (
                ManipOp::TranslateCamXY,
                TaskState::CamXY {
                    scale,
                    delta_near_x,
                },
            ) => {
                if let Some(mut p) = ctx.scene.pos_relative(root, cam) {
                    let dir = if ctx.input.control() {
                        let d = if p.y < 0.0 { -p } else { p };
                        d.normalize_or_zero()
                    } else {
                        DVec3::Y
                    };
                    p += dir * (2.0 * delta.y * *scale);
                    p.x = (ctx.dr.near_vec.x + *delta_near_x) * depth_scale(ctx.dr, p.y);
                    ctx.scene.set_pos_relative(root, cam, p);
                }
            }
            (ManipOp::Rotate2D, TaskState::Rotate2D { dir }) => {
                let edge = ctx.config.edge_threshold;
                let mut d = delta;
                if *dir == Axis::Y && mouse.x.abs() > edge {
                    d.x = 0.0;
                } else if *dir == Axis::X && mouse.y.abs() > edge {
                    d.y = 0.0;
                }
                rel_hpr(ctx.scene, root, cam, DVec3::new(d.x * 360.0, -d.y * 360.0, 0.0));
            }
            (ManipOp::RotateAboutViewVector, TaskState::RotateView { centre, last_angle }) => {
                let angle = get_crank_angle(*centre, mouse);
                let d = wrap_degrees(angle - *last_angle);
                *last_angle = angle;
                rel_hpr(ctx.scene, root, cam, DVec3::new(0.0, 0.0, -d));
            }
            (op, state) => log::warn!("manipulation {op:?} has mismatched state {state:?}"),
        }
        self.after_frame(ctx);
    }

    /// Carries the selection (or, in set-coa mode, the pivot) along with the
    /// widget.
    fn after_frame(&self, ctx: &mut EditContext) {
        let root = self.widget.root();
        if self.set_coa {
            let Some(last) = ctx.selection.last().map(|l| l.node) else {
                return;
            };
            if let Some(m) = ctx.scene.mat_relative(root, last) {
                if let Some(record) = ctx.selection.last_mut() {
                    record.coa2dnp = m;
                }
            }
        } else {
            ctx.selection.move_wrt_widget_all(ctx.scene, root);
        }
    }

    // ====================================================================
    // Commands
    // ====================================================================

    /// Moves the selection so the widget sits on the geometry under the mouse.
    pub fn plant_selected(&mut self, ctx: &mut EditContext) -> bool {
        let skip = SkipFlags::HIDDEN | SkipFlags::BACKFACE | SkipFlags::CAMERA;
        let Some(entry) = ctx.pick_geom(skip) else {
            return false;
        };
        if ctx.selection.last().is_none() {
            return false;
        }
        let nodes = ctx.selection.selected_as_list();
        ctx.push_undo(&nodes);
        let root = self.widget.root();
        ctx.selection.get_wrt_all(ctx.scene, root);
        let cam = ctx.camera();
        ctx.scene.set_pos_relative(root, cam, entry.surface_point);
        ctx.selection.move_wrt_widget_all(ctx.scene, root);
        log::info!("planted {} node(s)", nodes.len());
        ctx.events.send(DirectEvent::ManipulateObjectCleanup(nodes));
        true
    }

    /// Slides the widget, and the selection with it, to `target` in camera
    /// space over `duration` seconds.
    pub fn move_widget_to(&mut self, ctx: &mut EditContext, target: DVec3, duration: f64) {
        if ctx.selection.is_empty() || self.task.is_some() {
            return;
        }
        let root = self.widget.root();
        let cam = ctx.camera();
        let Some(from) = ctx.scene.pos_relative(root, cam) else {
            return;
        };
        ctx.selection.get_wrt_all(ctx.scene, root);
        let nodes = ctx.selection.selected_as_list();
        ctx.push_undo(&nodes);
        self.following = false;
        self.widget_move = Some(WidgetMove {
            from,
            to: target,
            interval: Interval::new(duration, BlendType::EaseInOut),
        });
    }

    /// Stops a widget slide where it is and resumes following.
    pub fn stop_widget_move(&mut self, ctx: &mut EditContext) {
        if self.widget_move.take().is_some() {
            self.spawn_follow(ctx);
        }
    }

    /// Switches between moving the selection and moving its pivot.
    pub fn toggle_set_coa_mode(&mut self, scene: &mut SceneGraph) {
        if self.movable {
            self.set_coa = !self.set_coa;
            self.apply_mode_color(scene);
        } else {
            self.widget.disabled_mode_color(scene);
        }
    }

    pub fn enable_widget_move(&mut self, scene: &mut SceneGraph) {
        self.movable = true;
        self.apply_mode_color(scene);
    }

    pub fn disable_widget_move(&mut self, scene: &mut SceneGraph) {
        self.movable = false;
        self.widget.disabled_mode_color(scene);
    }

    fn apply_mode_color(&self, scene: &mut SceneGraph) {
        if self.set_coa {
            self.widget.coa_mode_color(scene);
        } else {
            self.widget.manip_mode_color(scene);
        }
    }

    pub fn grow_widget_to_fit(&mut self, ctx: &EditContext) {
        self.widget.grow_to_fit(&*ctx.scene, &*ctx.dr);
    }

    /// Grows or shrinks the handles (`2.0` up, `0.5` down).
    pub fn scale_widget(&mut self, scene: &SceneGraph, factor: f64) {
        self.widget.multiply_scaling_factor_by(scene, factor);
    }
}

/// Offsets the widget along its own axes so the previous hit lands on `hit`.
/// The first hit only seeds `prev`.
fn translate_to_hit(scene: &mut SceneGraph, root: NodeId, prev: &mut Option<DVec3>, hit: DVec3) {
    match prev {
        Some(p) => {
            scene.set_pos_relative(root, root, hit - *p);
        }
        None => *prev = Some(hit),
    }
}

/// Whether the camera sees the widget from the negative side of `axis`.
fn widget_top(scene: &SceneGraph, root: NodeId, cam: NodeId, axis: Axis) -> bool {
    let Some(m) = scene.mat_relative(root, cam) else {
        return false;
    };
    let dir = m.w_axis.truncate().normalize_or_zero();
    let widget_axis = m.transform_vector3(axis.unit()).normalize_or_zero();
    dir.dot(widget_axis) < 0.0
}

/// Converts near-plane offsets to offsets at depth `y`.
fn depth_scale(dr: &DisplayRegionContext, y: f64) -> f64 {
    if dr.kind().is_orthographic() {
        1.0
    } else {
        y / dr.near
    }
}

fn mats_close(a: &DMat4, b: &DMat4, eps: f64) -> bool {
    a.to_cols_array()
        .iter()
        .zip(b.to_cols_array().iter())
        .all(|(x, y)| (x - y).abs() < eps)
}
