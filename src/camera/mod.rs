//! Camera controller: mouse fly, view presets and the centre of action.
//!
//! At most one camera task runs at a time. Starting another, or calling
//! [`CameraControl::remove_manipulate_camera_task`], ends the running one
//! where it is and runs its finishing step (reparenting the camera back out
//! of `camManipRef`, resizing the marker).

pub mod coa;

pub use coa::{compute_coa, marker_scale, CoaChoice, CoaMarker, DistanceLadder, DEFAULT_COA};

use crate::app::timing::FrameMark;
use crate::app::EditContext;
use crate::geometry::{
    get_crank_angle, get_screen_xy, hpr_to_quat, plane_intersect, q_slerp, wrap_degrees, Axis,
    EPSILON,
};
use crate::manip::{ManipulationControl, ObjectHandles};
use crate::pick::SkipFlags;
use crate::scene::{CollisionEntry, NodeId, SceneError, SceneGraph};
use crate::task::{BlendType, Interval};
use glam::{DMat4, DQuat, DVec3};

/// Presses shorter than this (or one frame) count as a COA click.
const CLICK_SECONDS: f64 = 0.25;

/// Heading/pitch/roll offsets of the view presets, keyed 1 through 7.
const VIEW_OFFSETS: [DVec3; 7] = [
    DVec3::new(180.0, 0.0, 0.0),
    DVec3::new(0.0, 0.0, 0.0),
    DVec3::new(90.0, 0.0, 0.0),
    DVec3::new(-90.0, 0.0, 0.0),
    DVec3::new(0.0, -90.0, 0.0),
    DVec3::new(0.0, 90.0, 0.0),
    DVec3::new(135.0, -35.264, 0.0),
];

#[derive(Debug, Clone, Copy, PartialEq)]
enum LerpFinish {
    Nothing,
    ResizeMarker,
    /// Move the camera back under `parent` keeping its world transform.
    Reparent { camera: NodeId, parent: NodeId },
}

/// Eased move of `node`, expressed relative to `other`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CameraLerp {
    node: NodeId,
    other: NodeId,
    pos: Option<(DVec3, DVec3)>,
    quat: Option<(DQuat, DQuat)>,
    interval: Interval,
    finish: LerpFinish,
}

impl CameraLerp {
    fn apply(&self, scene: &mut SceneGraph, t: f64) -> Option<()> {
        match (self.pos, self.quat) {
            (Some((p0, p1)), Some((q0, q1))) => {
                scene.set_pos_quat_relative(self.node, self.other, p0.lerp(p1, t), q_slerp(q0, q1, t))
            }
            (Some((p0, p1)), None) => scene.set_pos_relative(self.node, self.other, p0.lerp(p1, t)),
            (None, Some((q0, q1))) => scene.set_quat_relative(self.node, self.other, q_slerp(q0, q1, t)),
            (None, None) => Some(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CameraTask {
    /// XZ translate while Shift is held, heading pan and Y zoom otherwise.
    Fly { zoom_sf: f64 },
    /// Heading/pitch pan while Shift is held, XZ translate otherwise.
    TranslateOrPan,
    /// Trackball about the COA. `constrained` is the screen axis kept when
    /// the mouse is out at the frame.
    Rotate { constrained: Axis },
    Roll { centre: DVec3, last_angle: f64, wrt: DMat4 },
    OrthoZoom,
    OrthoTranslate { depth: f64 },
    Lerp(CameraLerp),
}

#[derive(Debug, Clone)]
pub struct CameraControl {
    marker: CoaMarker,
    coa_marker_ref: NodeId,
    cam_manip_ref: NodeId,
    coa_marker_pos: DVec3,
    locked: bool,
    ladder: DistanceLadder,
    cq_entries: Vec<CollisionEntry>,
    fly_start: Option<FrameMark>,
    ortho_view_roll: f64,
    last_view: u8,
    task: Option<CameraTask>,
}

impl CameraControl {
    pub fn new(scene: &mut SceneGraph, group: NodeId, ladder_len: u32) -> Result<Self, SceneError> {
        let marker = CoaMarker::new(scene, group)?;
        let coa_marker_ref = scene.attach_new_node(group, "coaMarkerRef")?;
        let cam_manip_ref = scene.attach_new_node(group, "camManipRef")?;
        Ok(Self {
            marker,
            coa_marker_ref,
            cam_manip_ref,
            coa_marker_pos: DVec3::ZERO,
            locked: false,
            ladder: DistanceLadder::new(ladder_len),
            cq_entries: Vec::new(),
            fly_start: None,
            ortho_view_roll: 0.0,
            last_view: 0,
            task: None,
        })
    }

    pub fn marker(&self) -> &CoaMarker {
        &self.marker
    }

    pub fn cam_manip_ref(&self) -> NodeId {
        self.cam_manip_ref
    }

    /// World position of the COA marker.
    pub fn coa(&self) -> DVec3 {
        self.coa_marker_pos
    }

    pub fn is_coa_locked(&self) -> bool {
        self.locked
    }

    pub fn has_task(&self) -> bool {
        self.task.is_some()
    }

    pub fn is_animating(&self) -> bool {
        matches!(self.task, Some(CameraTask::Lerp(_)))
    }

    /// Hits recorded by the last COA click, in the order `pick_next_coa`
    /// will visit them.
    pub fn cq_entries(&self) -> &[CollisionEntry] {
        &self.cq_entries
    }

    // ====================================================================
    // COA
    // ====================================================================

    pub fn lock_coa(&mut self, ctx: &mut EditContext) {
        self.locked = true;
        ctx.message("COA Lock On");
    }

    pub fn unlock_coa(&mut self, ctx: &mut EditContext) {
        self.locked = false;
        ctx.message("COA Lock Off");
    }

    pub fn toggle_coa_lock(&mut self, ctx: &mut EditContext) {
        if self.locked {
            self.unlock_coa(ctx);
        } else {
            self.lock_coa(ctx);
        }
    }

    pub fn toggle_marker_vis(&self, scene: &mut SceneGraph) {
        self.marker.toggle_vis(scene);
    }

    /// Sets the COA from a pick result (or its absence).
    pub fn compute_coa(&mut self, ctx: &mut EditContext, hit: Option<&CollisionEntry>) {
        let cam = ctx.camera();
        let current = ctx
            .scene
            .pos_relative(self.marker.node(), cam)
            .unwrap_or(DEFAULT_COA);
        let hit = hit.map(|e| (e.surface_point, e.surface_point.length()));
        let choice = compute_coa(
            self.locked,
            hit,
            current,
            ctx.dr.near,
            ctx.dr.far,
            &mut self.ladder,
        );
        if let Some(dist) = choice.miss_distance {
            ctx.message(format!("COA Distance: {dist}"));
        }
        self.update_coa(ctx, choice.point, Some(choice.dist), None);
    }

    /// Places the marker at `point`, given in `reference` space (the current
    /// camera by default).
    pub fn update_coa(
        &mut self,
        ctx: &mut EditContext,
        point: DVec3,
        dist: Option<f64>,
        reference: Option<NodeId>,
    ) {
        let dist = dist.filter(|d| *d > 0.0).unwrap_or_else(|| point.length());
        let reference = reference.unwrap_or_else(|| ctx.camera());
        let marker = self.marker.node();
        ctx.scene.set_pos_relative(marker, reference, point);
        ctx.scene.set_quat(marker, DQuat::IDENTITY);
        ctx.scene.set_scale(marker, DVec3::ONE);
        self.update_marker_size(ctx, Some(dist));
        let render = ctx.render();
        self.coa_marker_pos = ctx.scene.pos_relative(marker, render).unwrap_or(DVec3::ZERO);
        log::debug!("COA moved to {:?}", self.coa_marker_pos);
    }

    pub fn update_marker_size(&mut self, ctx: &mut EditContext, dist: Option<f64>) {
        let dist = dist.filter(|d| *d > 0.0).unwrap_or_else(|| {
            ctx.scene
                .pos_relative(self.marker.node(), ctx.camera())
                .map(|p| p.length())
                .unwrap_or(0.0)
        });
        let config = ctx.config;
        let sf = marker_scale(
            config.coa_marker_scale,
            dist,
            ctx.dr.vfov(),
            config.coa_marker_min,
            config.coa_marker_max,
        );
        self.marker.resize(ctx.scene, sf, config.coa_fade_duration);
    }

    /// Moves the COA to the next hit of the last click, wrapping around.
    pub fn pick_next_coa(&mut self, ctx: &mut EditContext) {
        let cam = ctx.camera();
        while !self.cq_entries.is_empty() {
            let entry = self.cq_entries.remove(0);
            if ctx.scene.is_same_or_ancestor(cam, entry.into_node) || !ctx.scene.contains(entry.into_node) {
                continue;
            }
            let point = entry.surface_point;
            self.cq_entries.push(entry);
            self.update_coa(ctx, point, None, Some(self.coa_marker_ref));
            return;
        }
    }

    // ====================================================================
    // Mouse fly
    // ====================================================================

    /// Middle-button press: picks the fly mode from where the mouse is.
    pub fn mouse_fly_start(&mut self, ctx: &mut EditContext) {
        self.remove_manipulate_camera_task(ctx);
        let cam = ctx.camera();
        ctx.push_undo(&[cam]);
        self.fly_start = None;

        if ctx.dr.kind().is_orthographic() {
            self.fly_start = Some(ctx.timing.mark());
            self.task = Some(if ctx.input.control() {
                CameraTask::OrthoZoom
            } else {
                let depth = ctx
                    .scene
                    .pos_relative(self.marker.node(), cam)
                    .map(|p| p.y)
                    .filter(|y| *y > EPSILON)
                    .unwrap_or(ctx.dr.near);
                CameraTask::OrthoTranslate { depth }
            });
            return;
        }

        let edge = ctx.config.edge_threshold;
        let mouse = ctx.dr.mouse;
        let (out_x, out_y) = (mouse.x.abs() > edge, mouse.y.abs() > edge);
        if !out_x && !out_y {
            self.marker.hide(ctx.scene);
            self.fly_start = Some(ctx.timing.mark());
            let zoom_sf = ctx
                .scene
                .pos_relative(self.marker.node(), cam)
                .map(|p| p.length())
                .unwrap_or(0.0);
            self.task = Some(CameraTask::Fly { zoom_sf });
        } else if out_x && out_y {
            self.spawn_mouse_roll(ctx);
        } else {
            self.spawn_mouse_rotate(ctx);
        }
    }

    /// Middle-button release. A quick click picks a new COA under the mouse.
    pub fn mouse_fly_stop(&mut self, ctx: &mut EditContext) {
        self.remove_manipulate_camera_task(ctx);
        let clicked = self
            .fly_start
            .take()
            .map(|mark| mark.is_click(&ctx.timing, CLICK_SECONDS))
            .unwrap_or(false);
        if clicked {
            let mut skip = SkipFlags::DEFAULT;
            if !ctx.input.control() {
                skip |= SkipFlags::CAMERA;
            }
            let hit = ctx.pick_geom(skip);
            self.compute_coa(ctx, hit.as_ref());
            let cam = ctx.camera();
            let render = ctx.render();
            if let Some(m) = ctx.scene.world_mat(cam) {
                ctx.scene.set_mat_relative(self.coa_marker_ref, render, m);
            }
            let filter = ctx.pick_filter(None);
            self.cq_entries = ctx.dr.ray.queue.surviving_entries(ctx.scene, skip, &filter);
            // The first entry is already the COA.
            if !self.cq_entries.is_empty() {
                self.cq_entries.rotate_left(1);
            }
        }
        self.marker.show(ctx.scene);
        self.update_marker_size(ctx, None);
    }

    /// Follows the mouse with no button held until the task is removed.
    pub fn spawn_xz_translate_or_hp_pan(&mut self, ctx: &mut EditContext) {
        self.remove_manipulate_camera_task(ctx);
        let cam = ctx.camera();
        ctx.push_undo(&[cam]);
        self.task = Some(CameraTask::TranslateOrPan);
    }

    pub fn is_panning(&self) -> bool {
        matches!(self.task, Some(CameraTask::TranslateOrPan))
    }

    fn xz_translate(&self, ctx: &mut EditContext) {
        let cam = ctx.camera();
        let delta = ctx.dr.mouse_delta;
        let coa_dist = ctx
            .scene
            .pos_relative(self.marker.node(), cam)
            .map(|p| p.length())
            .unwrap_or(0.0);
        let sf = coa_dist / ctx.dr.near;
        let offset = DVec3::new(
            -0.5 * delta.x * ctx.dr.near_width * sf,
            0.0,
            -0.5 * delta.y * ctx.dr.near_height * sf,
        );
        ctx.scene.set_pos_relative(cam, cam, offset);
    }

    fn hp_pan(ctx: &mut EditContext) {
        let cam = ctx.camera();
        let delta = ctx.dr.mouse_delta;
        let hpr = DVec3::new(
            0.5 * delta.x * ctx.dr.fov_h,
            -0.5 * delta.y * ctx.dr.fov_v,
            0.0,
        );
        ctx.scene.set_hpr_relative(cam, cam, hpr);
    }

    fn place_manip_ref_at_coa(&self, ctx: &mut EditContext) {
        let cam = ctx.camera();
        let render = ctx.render();
        let quat = ctx.scene.quat_relative(cam, render).unwrap_or_default();
        ctx.scene
            .set_pos_quat_relative(self.cam_manip_ref, render, self.coa_marker_pos, quat);
    }

    fn spawn_mouse_rotate(&mut self, ctx: &mut EditContext) {
        self.place_manip_ref_at_coa(ctx);
        let constrained = if ctx.dr.mouse.x.abs() > ctx.config.edge_threshold {
            Axis::Y
        } else {
            Axis::X
        };
        self.task = Some(CameraTask::Rotate { constrained });
    }

    fn spawn_mouse_roll(&mut self, ctx: &mut EditContext) {
        self.place_manip_ref_at_coa(ctx);
        let centre = get_screen_xy(ctx.scene, self.marker.node(), ctx.dr).unwrap_or(DVec3::ZERO);
        let wrt = ctx
            .scene
            .mat_relative(ctx.camera(), self.cam_manip_ref)
            .unwrap_or(DMat4::IDENTITY);
        self.task = Some(CameraTask::Roll {
            centre,
            last_angle: get_crank_angle(centre, ctx.dr.mouse),
            wrt,
        });
    }

    // ====================================================================
    // Per-frame
    // ====================================================================

    pub fn step(&mut self, ctx: &mut EditContext, dt: f64) {
        self.marker.step(ctx.scene, dt);
        let Some(mut task) = self.task.take() else {
            return;
        };
        let keep = self.run_task(ctx, &mut task, dt);
        if keep {
            self.task = Some(task);
        }
    }

    fn run_task(&mut self, ctx: &mut EditContext, task: &mut CameraTask, dt: f64) -> bool {
        let cam = ctx.camera();
        let delta = ctx.dr.mouse_delta;
        match task {
            CameraTask::Fly { zoom_sf } => {
                if ctx.input.shift() {
                    self.xz_translate(ctx);
                } else {
                    let dir = if ctx.input.control() {
                        let p = ctx
                            .scene
                            .pos_relative(self.marker.node(), cam)
                            .unwrap_or(DVec3::Y);
                        let p = if p.y < 0.0 { -p } else { p };
                        p.normalize_or_zero()
                    } else {
                        DVec3::Y
                    };
                    let pos = dir * (-delta.y * *zoom_sf);
                    let hpr = DVec3::new(0.5 * delta.x * ctx.dr.fov_h, 0.0, 0.0);
                    ctx.scene
                        .set_pos_quat_relative(cam, cam, pos, hpr_to_quat(hpr));
                }
            }
            CameraTask::TranslateOrPan => {
                if ctx.input.shift() {
                    Self::hp_pan(ctx);
                } else {
                    self.xz_translate(ctx);
                }
            }
            CameraTask::Rotate { constrained } => {
                let edge = ctx.config.edge_threshold;
                let mouse = ctx.dr.mouse;
                let mut d = delta;
                if *constrained == Axis::Y && mouse.x.abs() > edge {
                    d.x = 0.0;
                } else if *constrained == Axis::X && mouse.y.abs() > edge {
                    d.y = 0.0;
                }
                if ctx.input.shift() {
                    let hpr = DVec3::new(d.x * ctx.dr.fov_h, -d.y * ctx.dr.fov_v, 0.0);
                    ctx.scene.set_hpr_relative(cam, cam, hpr);
                    self.place_manip_ref_at_coa(ctx);
                } else {
                    let cmr = self.cam_manip_ref;
                    let Some(wrt) = ctx.scene.mat_relative(cam, cmr) else {
                        return false;
                    };
                    ctx.scene
                        .set_hpr_relative(cmr, cmr, DVec3::new(-d.x * 180.0, d.y * 180.0, 0.0));
                    if ctx.config.lock_roll {
                        let render = ctx.render();
                        if let Some(hpr) = ctx.scene.hpr_relative(cmr, render) {
                            ctx.scene
                                .set_hpr_relative(cmr, render, DVec3::new(hpr.x, hpr.y, 0.0));
                        }
                    }
                    ctx.scene.set_mat_relative(cam, cmr, wrt);
                }
            }
            CameraTask::Roll {
                centre,
                last_angle,
                wrt,
            } => {
                let angle = get_crank_angle(*centre, ctx.dr.mouse);
                let d = wrap_degrees(angle - *last_angle);
                *last_angle = angle;
                let cmr = self.cam_manip_ref;
                ctx.scene.set_hpr_relative(cmr, cmr, DVec3::new(0.0, 0.0, -d));
                ctx.scene.set_mat_relative(cam, cmr, *wrt);
            }
            CameraTask::OrthoZoom => {
                let factor = ctx.dr.ortho_factor() + (delta.x - delta.y) * 0.1;
                let (min, max) = (ctx.config.ortho_factor_min, ctx.config.ortho_factor_max);
                if let Err(err) = ctx.dr.set_ortho_factor(ctx.scene, factor, min, max) {
                    log::warn!("ortho zoom: {err}");
                    return false;
                }
            }
            CameraTask::OrthoTranslate { depth } => {
                let plane = DVec3::new(0.0, *depth, 0.0);
                let (o0, d0) = ctx.dr.mouse_ray(ctx.dr.mouse_last);
                let (o1, d1) = ctx.dr.mouse_ray(ctx.dr.mouse);
                if let (Ok(prev), Ok(now)) = (
                    plane_intersect(o0, d0, plane, DVec3::Y),
                    plane_intersect(o1, d1, plane, DVec3::Y),
                ) {
                    ctx.scene.set_pos_relative(cam, cam, prev - now);
                }
            }
            CameraTask::Lerp(lerp) => {
                let t = lerp.interval.step(dt);
                if lerp.apply(ctx.scene, t).is_none() {
                    log::warn!("camera move lost its node");
                    return false;
                }
                if lerp.interval.is_finished() {
                    self.finish_lerp(ctx, lerp.finish);
                    return false;
                }
            }
        }
        true
    }

    fn finish_lerp(&mut self, ctx: &mut EditContext, finish: LerpFinish) {
        match finish {
            LerpFinish::Nothing => {}
            LerpFinish::ResizeMarker => self.update_marker_size(ctx, None),
            LerpFinish::Reparent { camera, parent } => {
                if let Err(err) = ctx.scene.wrt_reparent_to(camera, parent) {
                    log::warn!("camera reparent failed: {err}");
                    let render = ctx.render();
                    let _ = ctx.scene.wrt_reparent_to(camera, render);
                }
                self.update_marker_size(ctx, None);
            }
        }
    }

    /// Stops the camera task where it is.
    pub fn remove_manipulate_camera_task(&mut self, ctx: &mut EditContext) {
        if let Some(CameraTask::Lerp(lerp)) = self.task.take() {
            self.finish_lerp(ctx, lerp.finish);
        }
    }

    fn spawn_lerp(&mut self, ctx: &mut EditContext, lerp: CameraLerp) {
        self.task = Some(CameraTask::Lerp(lerp));
        // Zero-length moves land immediately.
        if lerp.interval.duration() <= 0.0 {
            self.step_task_only(ctx);
        }
    }

    fn step_task_only(&mut self, ctx: &mut EditContext) {
        if let Some(mut task) = self.task.take() {
            if self.run_task(ctx, &mut task, 0.0) {
                self.task = Some(task);
            }
        }
    }

    /// Parks the camera under `camManipRef` for an orbit-style move and
    /// returns the finishing step that undoes it.
    fn borrow_camera(&self, ctx: &mut EditContext) -> Option<LerpFinish> {
        let cam = ctx.camera();
        let parent = ctx.scene.parent(cam).unwrap_or_else(|| ctx.render());
        if let Err(err) = ctx.scene.wrt_reparent_to(cam, self.cam_manip_ref) {
            log::warn!("cannot move camera under camManipRef: {err}");
            return None;
        }
        Some(LerpFinish::Reparent { camera: cam, parent })
    }

    // ====================================================================
    // Commands
    // ====================================================================

    pub fn home_cam(&mut self, ctx: &mut EditContext) {
        self.remove_manipulate_camera_task(ctx);
        let cam = ctx.camera();
        ctx.push_undo(&[cam]);
        let render = ctx.render();
        if let Err(err) = ctx.scene.reparent_to(cam, render) {
            log::warn!("home: {err}");
        }
        ctx.scene.clear_transform(cam);
        self.update_marker_size(ctx, None);
    }

    /// Levels pitch and roll, keeping the heading.
    pub fn upright_cam(&mut self, ctx: &mut EditContext) {
        self.remove_manipulate_camera_task(ctx);
        let cam = ctx.camera();
        ctx.push_undo(&[cam]);
        let render = ctx.render();
        let (Some(hpr), Some(from)) = (
            ctx.scene.hpr_relative(cam, render),
            ctx.scene.quat_relative(cam, render),
        ) else {
            return;
        };
        let lerp = CameraLerp {
            node: cam,
            other: render,
            pos: None,
            quat: Some((from, hpr_to_quat(DVec3::new(hpr.x, 0.0, 0.0)))),
            interval: Interval::new(ctx.config.cam_move_duration, BlendType::EaseInOut),
            finish: LerpFinish::Nothing,
        };
        self.spawn_lerp(ctx, lerp);
    }

    /// Swings the camera about the COA until its up axis is world up.
    pub fn orbit_upright_cam(&mut self, ctx: &mut EditContext) {
        self.remove_manipulate_camera_task(ctx);
        let cam = ctx.camera();
        ctx.push_undo(&[cam]);
        let render = ctx.render();
        let Some(m) = ctx.scene.mat_relative(cam, render) else {
            return;
        };
        let z = m.transform_vector3(DVec3::Z).normalize_or_zero();
        let orbit = z.dot(DVec3::Z).clamp(-1.0, 1.0).acos().to_degrees();
        if orbit < 0.1 {
            return;
        }
        let axis = z.cross(DVec3::Z).normalize_or_zero();
        let mut heading = axis.dot(DVec3::X).clamp(-1.0, 1.0).acos().to_degrees();
        if axis.y < 0.0 {
            heading = -heading;
        }
        let cmr = self.cam_manip_ref;
        ctx.scene.set_pos_relative(cmr, self.marker.node(), DVec3::ZERO);
        ctx.scene
            .set_hpr_relative(cmr, render, DVec3::new(heading, 0.0, 0.0));
        let Some(finish) = self.borrow_camera(ctx) else {
            return;
        };
        let from = ctx.scene.quat_relative(cmr, render).unwrap_or_default();
        let lerp = CameraLerp {
            node: cmr,
            other: render,
            pos: None,
            quat: Some((from, hpr_to_quat(DVec3::new(heading, orbit, 0.0)))),
            interval: Interval::new(ctx.config.cam_move_duration, BlendType::EaseInOut),
            finish,
        };
        self.spawn_lerp(ctx, lerp);
    }

    /// Slides the camera sideways until the COA is centred, over `t` seconds.
    pub fn center_cam_in(&mut self, ctx: &mut EditContext, t: f64) {
        self.remove_manipulate_camera_task(ctx);
        let cam = ctx.camera();
        ctx.push_undo(&[cam]);
        let Some(marker_to_cam) = ctx.scene.pos_relative(self.marker.node(), cam) else {
            return;
        };
        let delta = marker_to_cam - DVec3::Y * marker_to_cam.length();
        let cmr = self.cam_manip_ref;
        ctx.scene
            .set_pos_quat_relative(cmr, cam, DVec3::ZERO, DQuat::IDENTITY);
        let lerp = CameraLerp {
            node: cam,
            other: cmr,
            pos: Some((DVec3::ZERO, delta)),
            quat: None,
            interval: Interval::new(t, BlendType::EaseInOut),
            finish: LerpFinish::ResizeMarker,
        };
        self.spawn_lerp(ctx, lerp);
    }

    /// Moves the camera to `factor` times its offset to the COA. Negative
    /// factors back away.
    pub fn zoom_cam(&mut self, ctx: &mut EditContext, factor: f64, t: f64) {
        self.remove_manipulate_camera_task(ctx);
        let cam = ctx.camera();
        ctx.push_undo(&[cam]);
        let Some(marker_to_cam) = ctx.scene.pos_relative(self.marker.node(), cam) else {
            return;
        };
        let target = marker_to_cam * factor;
        let cmr = self.cam_manip_ref;
        ctx.scene.set_pos_quat_relative(cmr, cam, target, DQuat::IDENTITY);
        let lerp = CameraLerp {
            node: cam,
            other: cmr,
            pos: Some((-target, DVec3::ZERO)),
            quat: None,
            interval: Interval::new(t, BlendType::EaseInOut),
            finish: LerpFinish::ResizeMarker,
        };
        self.spawn_lerp(ctx, lerp);
    }

    /// View presets: 1..=7 look along the axes or the isometric diagonal at
    /// the current COA distance; 8 repeats the last one rolled another 90°.
    pub fn spawn_move_to_view(&mut self, ctx: &mut EditContext, view: u8) {
        self.remove_manipulate_camera_task(ctx);
        let cam = ctx.camera();
        ctx.push_undo(&[cam]);
        let view = if view == 8 {
            self.ortho_view_roll = (self.ortho_view_roll + 90.0) % 360.0;
            self.last_view
        } else {
            self.ortho_view_roll = 0.0;
            view
        };
        let offset = match view {
            1..=7 => VIEW_OFFSETS[usize::from(view) - 1],
            _ => DVec3::ZERO,
        };
        let cmr = self.cam_manip_ref;
        ctx.scene
            .set_pos_quat_relative(cmr, self.marker.node(), DVec3::ZERO, hpr_to_quat(offset));
        let dist = ctx
            .scene
            .pos_relative(cam, cmr)
            .map(|p| p.length())
            .unwrap_or(0.0);
        ctx.scene.set_pos_relative(cmr, cmr, DVec3::new(0.0, -dist, 0.0));
        self.last_view = view;

        let (Some(from_pos), Some(from_quat)) = (
            ctx.scene.pos_relative(cam, cmr),
            ctx.scene.quat_relative(cam, cmr),
        ) else {
            return;
        };
        let to_quat = hpr_to_quat(DVec3::new(0.0, 0.0, self.ortho_view_roll));
        let lerp = CameraLerp {
            node: cam,
            other: cmr,
            pos: Some((from_pos, DVec3::ZERO)),
            quat: Some((from_quat, to_quat)),
            interval: Interval::new(ctx.config.cam_move_duration, BlendType::EaseInOut),
            finish: LerpFinish::ResizeMarker,
        };
        self.spawn_lerp(ctx, lerp);
    }

    /// Orbits the camera `degrees` of heading about the COA.
    pub fn swing_cam_about_widget(&mut self, ctx: &mut EditContext, degrees: f64, t: f64) {
        self.remove_manipulate_camera_task(ctx);
        let cam = ctx.camera();
        ctx.push_undo(&[cam]);
        let cmr = self.cam_manip_ref;
        ctx.scene.set_pos_relative(cmr, self.marker.node(), DVec3::ZERO);
        ctx.scene.set_quat(cmr, DQuat::IDENTITY);
        let Some(finish) = self.borrow_camera(ctx) else {
            return;
        };
        let parent = ctx.scene.parent(cmr).unwrap_or_else(|| ctx.render());
        let lerp = CameraLerp {
            node: cmr,
            other: parent,
            pos: None,
            quat: Some((DQuat::IDENTITY, hpr_to_quat(DVec3::new(degrees, 0.0, 0.0)))),
            interval: Interval::new(t, BlendType::EaseInOut),
            finish,
        };
        self.spawn_lerp(ctx, lerp);
    }

    /// Dollies the camera so the widget fills about 30% of the view.
    pub fn fit_on_widget(&mut self, ctx: &mut EditContext, widget: &ObjectHandles) {
        self.remove_manipulate_camera_task(ctx);
        if !widget.is_shown(ctx.scene) {
            return;
        }
        let cam = ctx.camera();
        let max_scale = widget_world_scale(ctx.scene, widget);
        let max_dim = ctx.dr.near_width.min(ctx.dr.near_height);
        if max_dim < EPSILON {
            return;
        }
        let cam_y = ctx.dr.near * (2.0 * max_scale) / (0.3 * max_dim);
        let Some(widget_to_cam) = ctx.scene.pos_relative(widget.root(), cam) else {
            return;
        };
        let delta = widget_to_cam - DVec3::Y * cam_y;
        let cmr = self.cam_manip_ref;
        ctx.scene.set_pos_quat_relative(cmr, cam, delta, DQuat::IDENTITY);
        let Some(finish) = self.borrow_camera(ctx) else {
            return;
        };
        let from = ctx.scene.pos(cam).unwrap_or(DVec3::ZERO);
        let lerp = CameraLerp {
            node: cam,
            other: cmr,
            pos: Some((from, DVec3::ZERO)),
            quat: None,
            interval: Interval::new(ctx.config.cam_move_duration, BlendType::EaseInOut),
            finish,
        };
        self.spawn_lerp(ctx, lerp);
    }

    /// Brings the selection in front of the camera so the widget fills about
    /// half the view.
    pub fn move_to_fit(&mut self, ctx: &mut EditContext, manip: &mut ManipulationControl) {
        if ctx.selection.is_empty() {
            return;
        }
        let max_scale = widget_world_scale(ctx.scene, manip.widget());
        let max_dim = ctx.dr.near_width.min(ctx.dr.near_height);
        if max_dim < EPSILON {
            return;
        }
        let cam_y = 2.0 * ctx.dr.near * (1.5 * max_scale) / max_dim;
        let duration = ctx.config.cam_move_duration;
        manip.move_widget_to(ctx, DVec3::Y * cam_y, duration);
    }
}

fn widget_world_scale(scene: &SceneGraph, widget: &ObjectHandles) -> f64 {
    let render = scene.root();
    scene
        .transform_relative(widget.scaling_node(), render)
        .map(|t| t.scale.max_element())
        .unwrap_or(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::context::harness::{Harness, DT};
    use crate::app::input::Modifiers;
    use crate::geometry::quat_to_hpr;
    use crate::scene::{Lens, Shape};

    struct Fixture {
        h: Harness,
        camera: CameraControl,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_harness(Harness::new())
        }

        fn with_harness(mut h: Harness) -> Self {
            let render = h.scene.root();
            let group = h.scene.attach_new_node(render, "DIRECT").unwrap();
            let camera = CameraControl::new(&mut h.scene, group, 7).unwrap();
            Self { h, camera }
        }

        fn split(&mut self) -> (&mut CameraControl, EditContext<'_>) {
            (&mut self.camera, self.h.ctx())
        }

        fn set_coa(&mut self, world: DVec3) {
            let render = self.h.scene.root();
            let (camera, mut ctx) = self.split();
            camera.update_coa(&mut ctx, world, None, Some(render));
        }

        fn run(&mut self, seconds: f64) {
            let frames = (seconds / DT).ceil() as usize;
            for _ in 0..frames {
                self.h.tick();
                let (camera, mut ctx) = self.split();
                camera.step(&mut ctx, DT);
            }
        }

        fn cam_world(&self) -> DMat4 {
            self.h.scene.world_mat(self.h.cam).unwrap()
        }

        fn coa_distance(&self) -> f64 {
            (self.cam_world().w_axis.truncate() - self.camera.coa()).length()
        }
    }

    #[test]
    fn coa_lock_toggle_reports() {
        let mut f = Fixture::new();
        let (camera, mut ctx) = f.split();
        camera.toggle_coa_lock(&mut ctx);
        assert!(f.camera.is_coa_locked());
        assert_eq!(f.h.status.text(), Some("COA Lock On"));
        let (camera, mut ctx) = f.split();
        camera.toggle_coa_lock(&mut ctx);
        assert!(!f.camera.is_coa_locked());
        assert_eq!(f.h.status.text(), Some("COA Lock Off"));
    }

    #[test]
    fn click_on_geometry_sets_coa() {
        let mut f = Fixture::new();
        let render = f.h.scene.root();
        let wall = f.h.scene.attach_new_node(render, "wall").unwrap();
        f.h.scene.set_shape(wall, Shape::cube(1.0));
        f.h.mouse(0.0, 0.0);
        {
            let (camera, mut ctx) = f.split();
            camera.mouse_fly_start(&mut ctx);
        }
        assert!(f.camera.marker().is_hidden(&f.h.scene));
        f.h.tick();
        {
            let (camera, mut ctx) = f.split();
            camera.mouse_fly_stop(&mut ctx);
        }
        assert!((f.camera.coa() - DVec3::new(0.0, -1.0, 0.0)).length() < 1e-9);
        assert!(!f.camera.marker().is_hidden(&f.h.scene));
        assert_eq!(f.h.history.undo_len(), 1);
    }

    #[test]
    fn misses_report_distance() {
        let mut f = Fixture::new();
        f.h.mouse(0.0, 0.0);
        for expected in ["COA Distance: 10", "COA Distance: 100"] {
            let (camera, mut ctx) = f.split();
            camera.mouse_fly_start(&mut ctx);
            camera.mouse_fly_stop(&mut ctx);
            assert_eq!(f.h.status.text(), Some(expected));
        }
        assert!((f.camera.coa() - DVec3::new(0.0, 80.0, 0.0)).length() < 1e-9);
    }

    #[test]
    fn shift_fly_translates_against_the_mouse() {
        let mut f = Fixture::new();
        f.set_coa(DVec3::ZERO);
        f.h.mouse(0.0, 0.0);
        {
            let (camera, mut ctx) = f.split();
            camera.mouse_fly_start(&mut ctx);
        }
        f.h.input.modifiers = Modifiers::SHIFT;
        f.h.mouse(0.1, 0.0);
        f.run(DT);
        let pos = f.h.scene.pos(f.h.cam).unwrap();
        let expected = -0.5 * 0.1 * f.h.dr.near_width * 20.0;
        assert!((pos.x - expected).abs() < 1e-9);
        assert!((pos.y + 20.0).abs() < 1e-9);
    }

    #[test]
    fn shift_pan_turns_without_moving() {
        let mut f = Fixture::new();
        f.set_coa(DVec3::ZERO);
        f.h.mouse(0.0, 0.0);
        {
            let (camera, mut ctx) = f.split();
            camera.spawn_xz_translate_or_hp_pan(&mut ctx);
        }
        assert!(f.camera.is_panning());
        assert_eq!(f.h.history.undo_len(), 1);
        f.h.input.modifiers = Modifiers::SHIFT;
        f.h.mouse(0.1, 0.0);
        f.run(DT);
        let hpr = quat_to_hpr(f.h.scene.quat(f.h.cam).unwrap());
        assert!((hpr.x - 0.5 * 0.1 * f.h.dr.fov_h).abs() < 1e-9);
        assert!(hpr.y.abs() < 1e-9 && hpr.z.abs() < 1e-9);
        let pos = f.h.scene.pos(f.h.cam).unwrap();
        assert!((pos - DVec3::new(0.0, -20.0, 0.0)).length() < 1e-9);
    }

    #[test]
    fn unshifted_pan_slides_in_camera_plane() {
        let mut f = Fixture::new();
        f.set_coa(DVec3::ZERO);
        f.h.mouse(0.0, 0.0);
        {
            let (camera, mut ctx) = f.split();
            camera.spawn_xz_translate_or_hp_pan(&mut ctx);
        }
        f.h.mouse(0.0, 0.2);
        f.run(DT);
        let pos = f.h.scene.pos(f.h.cam).unwrap();
        let expected = -0.5 * 0.2 * f.h.dr.near_height * 20.0;
        assert!((pos.z - expected).abs() < 1e-9);
        assert!(pos.x.abs() < 1e-9 && (pos.y + 20.0).abs() < 1e-9);
        assert!(f.camera.is_panning());

        let (camera, mut ctx) = f.split();
        camera.remove_manipulate_camera_task(&mut ctx);
        assert!(!f.camera.has_task());
    }

    #[test]
    fn home_clears_camera_transform() {
        let mut f = Fixture::new();
        f.h.scene.set_hpr(f.h.cam, DVec3::new(10.0, 20.0, 0.0));
        let (camera, mut ctx) = f.split();
        camera.home_cam(&mut ctx);
        assert_eq!(f.cam_world(), DMat4::IDENTITY);
        assert_eq!(f.h.history.undo_len(), 1);
    }

    #[test]
    fn upright_keeps_heading() {
        let mut f = Fixture::new();
        f.h.scene.set_hpr(f.h.cam, DVec3::new(30.0, 20.0, 10.0));
        {
            let (camera, mut ctx) = f.split();
            camera.upright_cam(&mut ctx);
        }
        assert!(f.camera.is_animating());
        f.run(1.3);
        assert!(!f.camera.has_task());
        let hpr = quat_to_hpr(f.h.scene.quat(f.h.cam).unwrap());
        assert!((hpr - DVec3::new(30.0, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn orbit_upright_levels_about_coa() {
        let mut f = Fixture::new();
        f.set_coa(DVec3::ZERO);
        let render = f.h.scene.root();
        f.h.scene.set_hpr(f.h.cam, DVec3::new(0.0, 0.0, 30.0));
        let before = f.coa_distance();
        {
            let (camera, mut ctx) = f.split();
            camera.orbit_upright_cam(&mut ctx);
        }
        f.run(1.3);
        let up = f.cam_world().transform_vector3(DVec3::Z).normalize();
        assert!((up - DVec3::Z).length() < 1e-6);
        assert!((f.coa_distance() - before).abs() < 1e-6);
        assert_eq!(f.h.scene.parent(f.h.cam), Some(render));
    }

    #[test]
    fn zoom_halves_distance() {
        let mut f = Fixture::new();
        f.set_coa(DVec3::ZERO);
        {
            let (camera, mut ctx) = f.split();
            camera.zoom_cam(&mut ctx, 0.5, 1.2);
        }
        f.run(1.3);
        assert!((f.coa_distance() - 10.0).abs() < 1e-6);
    }

    #[test]
    fn center_now_puts_coa_on_axis() {
        let mut f = Fixture::new();
        f.set_coa(DVec3::new(3.0, 0.0, 4.0));
        {
            let (camera, mut ctx) = f.split();
            camera.center_cam_in(&mut ctx, 0.0);
        }
        assert!(!f.camera.has_task());
        let marker = f.camera.marker().node();
        let p = f.h.scene.pos_relative(marker, f.h.cam).unwrap();
        assert!(p.x.abs() < 1e-9 && p.z.abs() < 1e-9);
        assert!(p.y > 0.0);
    }

    #[test]
    fn top_view_looks_down_from_coa_distance() {
        let mut f = Fixture::new();
        f.set_coa(DVec3::ZERO);
        {
            let (camera, mut ctx) = f.split();
            camera.spawn_move_to_view(&mut ctx, 5);
        }
        f.run(1.3);
        let m = f.cam_world();
        assert!((m.w_axis.truncate() - DVec3::new(0.0, 0.0, 20.0)).length() < 1e-6);
        let forward = m.transform_vector3(DVec3::Y);
        assert!((forward - DVec3::NEG_Z).length() < 1e-6);
    }

    #[test]
    fn swing_orbits_and_cancel_restores_parent() {
        let mut f = Fixture::new();
        f.set_coa(DVec3::ZERO);
        let render = f.h.scene.root();
        {
            let (camera, mut ctx) = f.split();
            camera.swing_cam_about_widget(&mut ctx, 90.0, 1.2);
        }
        assert_ne!(f.h.scene.parent(f.h.cam), Some(render));
        f.run(1.3);
        assert_eq!(f.h.scene.parent(f.h.cam), Some(render));
        let pos = f.cam_world().w_axis.truncate();
        assert!((pos - DVec3::new(20.0, 0.0, 0.0)).length() < 1e-6);

        {
            let (camera, mut ctx) = f.split();
            camera.swing_cam_about_widget(&mut ctx, 90.0, 1.2);
        }
        f.run(0.5);
        {
            let (camera, mut ctx) = f.split();
            camera.remove_manipulate_camera_task(&mut ctx);
        }
        assert!(!f.camera.has_task());
        assert_eq!(f.h.scene.parent(f.h.cam), Some(render));
        assert!((f.coa_distance() - 20.0).abs() < 1e-6);
    }

    #[test]
    fn ortho_translate_drags_one_to_one() {
        let mut f = Fixture::with_harness(Harness::with_lens(Lens::orthographic(
            20.0, 10.0, 1.0, 1000.0,
        )));
        f.set_coa(DVec3::ZERO);
        f.h.mouse(0.0, 0.0);
        {
            let (camera, mut ctx) = f.split();
            camera.mouse_fly_start(&mut ctx);
        }
        f.h.mouse(0.5, 0.0);
        f.run(DT);
        let pos = f.h.scene.pos(f.h.cam).unwrap();
        assert!((pos.x + 0.5 * f.h.dr.near_width * 0.5).abs() < 1e-9);
    }

    #[test]
    fn ortho_zoom_is_clamped() {
        let mut f = Fixture::with_harness(Harness::with_lens(Lens::orthographic(
            20.0, 10.0, 1.0, 1000.0,
        )));
        f.h.input.modifiers = Modifiers::CONTROL;
        f.h.mouse(0.0, 0.0);
        {
            let (camera, mut ctx) = f.split();
            camera.mouse_fly_start(&mut ctx);
        }
        f.h.mouse(-1.0, 1.0);
        f.run(DT);
        assert_eq!(f.h.dr.ortho_factor(), f.h.config.ortho_factor_min);
    }
}
