//! The editing session.
//!
//! [`Session`] owns the scene and every piece of editor state, routes host
//! input to the camera and manipulation controllers, and exposes the editor
//! commands. Hosts call [`Session::handle_input`] as events arrive and
//! [`Session::tick`] once per frame, then drain the outgoing events.

pub mod config;
pub mod context;
pub mod events;
pub mod history;
pub mod input;
pub mod timing;

pub use config::{ConfigError, SessionConfig};
pub use context::EditContext;
pub use events::{DirectEvent, EventQueue, StatusLine};
pub use history::UndoHistory;
pub use input::{InputEvent, InputState, Modifiers, MouseButton};

use crate::camera::CameraControl;
use crate::manip::{EditTypes, HandleKind, ManipulationControl, Release};
use crate::pick::{PickFilter, SelectionSegment, SelectionSphere, SkipFlags};
use crate::scene::{CollisionEntry, NodeId, SceneError, SceneGraph};
use crate::selection::{SelectOutcome, SelectedNodes};
use crate::task::{TaskStatus, Timer};
use crate::viewport::{DisplayRegionContext, DisplayRegionList, RegionRect, ViewportError};
use glam::{DMat4, DVec3};
use timing::FrameTiming;

/// Seconds a flashed node keeps its flash color.
pub const DIRECT_FLASH_DURATION: f64 = 1.5;

const FLASH_COLOR: [f32; 4] = [1.0, 0.0, 0.0, 1.0];

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("scene error: {0}")]
    Scene(#[from] SceneError),
    #[error("viewport error: {0}")]
    Viewport(#[from] ViewportError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy)]
struct Flash {
    node: NodeId,
    done_color: Option<[f32; 4]>,
    timer: Timer,
}

pub struct Session {
    scene: SceneGraph,
    selection: SelectedNodes,
    history: UndoHistory,
    events: EventQueue,
    status: StatusLine,
    regions: DisplayRegionList,
    config: SessionConfig,
    input: InputState,
    timing: FrameTiming,
    group: NodeId,
    /// Camera the COA marker was last sized for.
    marker_cam: NodeId,
    manip: ManipulationControl,
    camera: CameraControl,
    fly_button: Option<MouseButton>,
    active_parent: Option<NodeId>,
    ancestry: Vec<NodeId>,
    ancestry_index: usize,
    flash: Option<Flash>,
}

impl Session {
    /// Starts a session over `scene` with one display region per camera.
    /// Each camera node must carry a lens.
    pub fn new(
        mut scene: SceneGraph,
        cameras: &[(NodeId, RegionRect)],
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let regions = cameras
            .iter()
            .map(|(cam, rect)| DisplayRegionContext::new(&scene, *cam, *rect))
            .collect::<Result<Vec<_>, _>>()?;
        let mut regions = DisplayRegionList::new(regions)?;
        for region in regions.iter_mut() {
            for name in &config.unpickable {
                region.ray.queue.add_unpickable(name);
            }
        }

        let marker_cam = regions.current().cam();
        let render = scene.root();
        let group = scene.attach_new_node(render, "DIRECT")?;
        let manip = ManipulationControl::new(&mut scene, group)?;
        let camera = CameraControl::new(&mut scene, group, config.coa_ladder_len)?;
        let mut selection = SelectedNodes::new();
        selection.set_tag_list(config.selection_tags.clone());
        let history = UndoHistory::new(config.undo_depth);

        log::info!("session started with {} display region(s)", regions.len());
        Ok(Self {
            scene,
            selection,
            history,
            events: EventQueue::new(),
            status: StatusLine::new(),
            regions,
            config,
            input: InputState::default(),
            timing: FrameTiming::new(),
            group,
            marker_cam,
            manip,
            camera,
            fly_button: None,
            active_parent: None,
            ancestry: Vec::new(),
            ancestry_index: 0,
            flash: None,
        })
    }

    /// Single full-window viewport.
    pub fn with_camera(
        scene: SceneGraph,
        camera: NodeId,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        Self::new(scene, &[(camera, RegionRect::FULL)], config)
    }

    fn split(&mut self) -> (EditContext<'_>, &mut ManipulationControl, &mut CameraControl) {
        let ctx = EditContext {
            scene: &mut self.scene,
            selection: &mut self.selection,
            history: &mut self.history,
            events: &mut self.events,
            status: &mut self.status,
            dr: self.regions.current_mut(),
            config: &self.config,
            input: self.input,
            timing: self.timing,
        };
        (ctx, &mut self.manip, &mut self.camera)
    }

    // ====================================================================
    // Accessors
    // ====================================================================

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut SceneGraph {
        &mut self.scene
    }

    pub fn selection(&self) -> &SelectedNodes {
        &self.selection
    }

    pub fn history(&self) -> &UndoHistory {
        &self.history
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn regions(&self) -> &DisplayRegionList {
        &self.regions
    }

    pub fn manipulation(&self) -> &ManipulationControl {
        &self.manip
    }

    pub fn camera_control(&self) -> &CameraControl {
        &self.camera
    }

    /// Camera of the current display region.
    pub fn camera(&self) -> NodeId {
        self.regions.current().cam()
    }

    /// The `DIRECT` group holding the widget, the COA marker and the
    /// camera helpers.
    pub fn direct_group(&self) -> NodeId {
        self.group
    }

    /// World position of the centre of action.
    pub fn coa(&self) -> DVec3 {
        self.camera.coa()
    }

    pub fn widget_transform(&self) -> Option<DMat4> {
        self.scene.world_mat(self.manip.widget().root())
    }

    pub fn active_parent(&self) -> Option<NodeId> {
        self.active_parent
    }

    pub fn status_text(&self) -> Option<&str> {
        self.status.text()
    }

    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<DirectEvent> {
        self.events.drain()
    }

    // ====================================================================
    // Frame and input
    // ====================================================================

    /// Runs one frame of `dt` seconds.
    pub fn tick(&mut self, dt: f64) {
        let dropped = self.selection.sweep_stale(&mut self.scene, &mut self.events)
            + self.history.sweep_stale(&self.scene);
        if dropped > 0 {
            log::debug!("stale sweep dropped {dropped} entr(ies)");
        }
        if self.selection.is_empty() && self.manip.widget().is_shown(&self.scene) {
            self.hide_widget();
        }
        self.regions.context_task(&self.scene);
        self.regions.mouse_update(self.input.mouse);
        self.timing.update(dt);

        let cam = self.regions.current().cam();
        if cam != self.marker_cam {
            self.marker_cam = cam;
            let (mut ctx, _, camera) = self.split();
            camera.update_marker_size(&mut ctx, None);
        }

        let (mut ctx, manip, camera) = self.split();
        manip.step(&mut ctx, dt);
        camera.step(&mut ctx, dt);

        self.status.advance(dt);
        let flash_done = self
            .flash
            .as_mut()
            .is_some_and(|f| f.timer.advance(dt) == TaskStatus::Done);
        if flash_done {
            self.finish_flash();
        }
    }

    pub fn handle_input(&mut self, event: InputEvent) {
        let binding = self.input.handle(&event);
        match event {
            InputEvent::ButtonDown(button) => self.button_down(button),
            InputEvent::ButtonUp(button) => self.button_up(button),
            InputEvent::KeyDown(_) => {
                if let Some(binding) = binding {
                    self.dispatch_key(&binding);
                }
            }
            InputEvent::MouseMove(_) | InputEvent::MouseLeave | InputEvent::KeyUp(_) => {}
        }
    }

    fn camera_button(&self, button: MouseButton) -> bool {
        let alt = self.input.alt();
        match button {
            MouseButton::Middle => !self.config.use_maya_cam_controls || alt,
            MouseButton::Primary => self.config.use_maya_cam_controls && alt,
            MouseButton::Secondary => false,
        }
    }

    fn button_down(&mut self, button: MouseButton) {
        // Presses act on the latest position, not last frame's.
        self.regions.mouse_update(self.input.mouse);
        self.regions.set_captured(true);
        if self.fly_button.is_none() && self.camera_button(button) {
            self.fly_button = Some(button);
            let (mut ctx, _, camera) = self.split();
            camera.mouse_fly_start(&mut ctx);
        } else if button == MouseButton::Primary {
            let (mut ctx, manip, _) = self.split();
            manip.press(&mut ctx);
        }
    }

    fn button_up(&mut self, button: MouseButton) {
        if self.fly_button == Some(button) {
            self.fly_button = None;
            let (mut ctx, _, camera) = self.split();
            camera.mouse_fly_stop(&mut ctx);
        } else if button == MouseButton::Primary && self.manip.is_pressed() {
            let (mut ctx, manip, _) = self.split();
            match manip.release(&mut ctx) {
                Release::Select(node) => {
                    let multi = self.input.shift();
                    self.select_with(node, multi, true, true);
                }
                Release::DeselectAll => self.deselect_all(),
                Release::Manipulated | Release::Ignored => {}
            }
        }
        let any_down = [MouseButton::Primary, MouseButton::Middle, MouseButton::Secondary]
            .into_iter()
            .any(|b| self.input.is_down(b));
        if !any_down {
            self.regions.set_captured(false);
        }
    }

    /// Runs the command bound to a key press. Unknown bindings are ignored.
    pub fn dispatch_key(&mut self, binding: &str) {
        let duration = self.config.cam_move_duration;
        let last = self.selection.last().map(|s| s.node);
        match normalize_binding(binding) {
            "escape" => self.deselect_all(),
            "delete" => self.remove_all_selected(),
            "shift-delete" => self.remove_node_path(None),
            "v" => self.toggle_widget_vis(),
            "shift-l" => self.toggle_coa_lock(),
            "p" => {
                if let Some(node) = last {
                    self.set_active_parent(node);
                }
            }
            "r" => {
                if let Some(node) = last {
                    self.reparent(node, true);
                }
            }
            "shift-r" => {
                if let Some(node) = last {
                    self.reparent(node, false);
                }
            }
            "s" => {
                if let Some(node) = last {
                    self.select(node, false);
                }
            }
            "shift-a" => self.selection.toggle_vis_all(&mut self.scene),
            "[" | "{" => self.undo(),
            "]" | "}" => self.redo(),
            "page_up" => self.up_ancestry(),
            "page_down" => self.down_ancestry(),
            "c" => self.center_cam(0.5),
            "f" => self.fit_on_widget(),
            "h" => self.home_cam(),
            "shift-v" => self.toggle_coa_marker(),
            "m" => self.move_to_fit(),
            "n" => self.pick_next_coa(),
            "u" => self.orbit_upright_cam(),
            "shift-u" => self.upright_cam(),
            "`" => self.cancel_camera_task(),
            "t" => self.toggle_pan_cam(),
            "tab" => self.toggle_set_coa_mode(),
            "i" => {
                self.plant_selected();
            }
            "shift-f" => self.grow_widget_to_fit(),
            "." | ">" => self.scale_widget(2.0),
            "," | "<" => self.scale_widget(0.5),
            "=" | "+" => self.zoom_cam(0.5, duration),
            "-" | "_" => self.zoom_cam(-2.0, duration),
            "9" => self.swing_cam_about_widget(-90.0, duration),
            "0" => self.swing_cam_about_widget(90.0, duration),
            key => match key.parse::<u8>() {
                Ok(view @ 1..=8) => self.move_to_view(view),
                _ => log::trace!("unbound key {key}"),
            },
        }
    }

    // ====================================================================
    // Selection
    // ====================================================================

    /// Selects `node`, walking up to a tagged ancestor when selection tags
    /// are configured.
    pub fn select(&mut self, node: NodeId, multi: bool) {
        self.select_with(node, multi, true, true);
    }

    pub fn select_with(&mut self, node: NodeId, multi: bool, by_tag: bool, reset_ancestry: bool) {
        let coa_mode = self.config.coa_mode;
        let outcome =
            self.selection
                .select(&mut self.scene, node, multi, by_tag, coa_mode, &mut self.events);
        match outcome {
            SelectOutcome::Selected(target) => self.on_selected(target, reset_ancestry),
            SelectOutcome::Deselected(_) => self.after_deselect(),
            SelectOutcome::Ignored => {}
        }
    }

    fn on_selected(&mut self, node: NodeId, reset_ancestry: bool) {
        if reset_ancestry {
            self.ancestry = self.scene.ancestors(node);
            self.ancestry_index = 0;
        }
        self.manip.widget().show_widget(&mut self.scene);
        if self
            .manip
            .edit_types_of(&self.scene, &[node])
            .contains(EditTypes::UNEDITABLE)
        {
            self.manip.disable_widget_move(&mut self.scene);
        } else {
            self.manip.enable_widget_move(&mut self.scene);
        }

        let cam = self.camera();
        let Some(record) = self.selection.last() else {
            return;
        };
        let radius = record.radius();
        let coa = self
            .scene
            .mat_relative(node, cam)
            .map(|m| (m * record.coa2dnp).w_axis.truncate());
        if !self.config.scale_widget_by_cam {
            let factor = if radius > 0.0 { radius } else { 1.0 };
            self.manip.widget_mut().set_scaling_factor(&mut self.scene, factor);
        }

        let (mut ctx, manip, camera) = self.split();
        if let Some(coa) = coa {
            camera.update_coa(&mut ctx, coa, None, None);
        }
        manip.spawn_follow(&mut ctx);
    }

    pub fn deselect(&mut self, node: NodeId) {
        if self.selection.deselect(&mut self.scene, node, &mut self.events) {
            self.after_deselect();
        }
    }

    fn after_deselect(&mut self) {
        self.ancestry.clear();
        if self.selection.is_empty() {
            self.hide_widget();
        } else {
            let (mut ctx, manip, _) = self.split();
            manip.spawn_follow(&mut ctx);
        }
    }

    pub fn deselect_all(&mut self) {
        self.selection.deselect_all(&mut self.scene, &mut self.events);
        self.hide_widget();
    }

    fn hide_widget(&mut self) {
        self.manip.stop_follow();
        self.manip.widget().hide_widget(&mut self.scene);
    }

    pub fn toggle_widget_vis(&mut self) {
        if self.selection.is_empty() {
            return;
        }
        self.manip.widget().toggle_widget(&mut self.scene);
    }

    pub fn toggle_set_coa_mode(&mut self) {
        self.manip.toggle_set_coa_mode(&mut self.scene);
    }

    pub fn plant_selected(&mut self) -> bool {
        let (mut ctx, manip, _) = self.split();
        manip.plant_selected(&mut ctx)
    }

    /// Eases the handles to a fixed share of the viewport at their depth.
    pub fn grow_widget_to_fit(&mut self) {
        let (ctx, manip, _) = self.split();
        manip.grow_widget_to_fit(&ctx);
    }

    pub fn scale_widget(&mut self, factor: f64) {
        self.manip.scale_widget(&self.scene, factor);
    }

    pub fn enable_handles(&mut self, kinds: &[HandleKind]) {
        self.manip.widget().enable_handles(&mut self.scene, kinds);
    }

    /// Takes handle kinds off the widget so presses fall through to free
    /// manipulation.
    pub fn disable_handles(&mut self, kinds: &[HandleKind]) {
        self.manip.widget().disable_handles(&mut self.scene, kinds);
    }

    // ====================================================================
    // Undo / redo
    // ====================================================================

    pub fn push_undo(&mut self, nodes: &[NodeId]) {
        self.history.push_undo(&self.scene, nodes, true, &mut self.events);
    }

    pub fn undo(&mut self) {
        self.restore_history(true);
    }

    pub fn redo(&mut self) {
        self.restore_history(false);
    }

    fn restore_history(&mut self, undo: bool) {
        if self.manip.is_manipulating() {
            return;
        }
        let (mut ctx, manip, camera) = self.split();
        camera.remove_manipulate_camera_task(&mut ctx);
        manip.stop_widget_move(&mut ctx);
        let restored = if undo {
            ctx.history.undo(ctx.scene, ctx.events)
        } else {
            ctx.history.redo(ctx.scene, ctx.events)
        };
        if restored.is_some() {
            ctx.selection.recompute_bboxes(ctx.scene);
            manip.spawn_follow(&mut ctx);
        }
    }

    // ====================================================================
    // Scene utilities
    // ====================================================================

    pub fn set_active_parent(&mut self, node: NodeId) {
        if !self.scene.contains(node) {
            return;
        }
        self.active_parent = Some(node);
        log::info!(
            "active reparent target: {}",
            self.scene.name(node).unwrap_or("?")
        );
        self.events.send(DirectEvent::ActiveParent(node));
    }

    /// Moves `node` under the active parent, keeping its world transform when
    /// `wrt` is set. Returns whether the node moved.
    pub fn reparent(&mut self, node: NodeId, wrt: bool) -> bool {
        let Some(parent) = self.active_parent else {
            return false;
        };
        if !self.scene.contains(node) {
            return false;
        }
        if self.scene.is_same_or_ancestor(node, parent) {
            log::warn!("reparent would create a cycle");
            self.message("Invalid parent");
            return false;
        }
        let old_parent = self.scene.parent(node);
        let result = if wrt {
            self.scene.wrt_reparent_to(node, parent)
        } else {
            self.scene.reparent_to(node, parent)
        };
        if let Err(err) = result {
            log::warn!("reparent failed: {err}");
            self.message("Invalid parent");
            return false;
        }
        self.events.send(DirectEvent::Reparent {
            node,
            old_parent,
            new_parent: parent,
            wrt,
        });
        self.selection.recompute_bboxes(&mut self.scene);
        let (mut ctx, manip, _) = self.split();
        manip.spawn_follow(&mut ctx);
        true
    }

    /// Tints `node` (or the last selected node) for [`DIRECT_FLASH_DURATION`]
    /// seconds.
    pub fn flash(&mut self, node: Option<NodeId>) {
        self.finish_flash();
        let Some(node) = node.or_else(|| self.selection.last().map(|s| s.node)) else {
            return;
        };
        let done_color = self.scene.color(node);
        let color = match done_color {
            Some(c) => [1.0 - c[0], 1.0 - c[1], 1.0 - c[2], 1.0],
            None => FLASH_COLOR,
        };
        if self.scene.set_color(node, color).is_none() {
            return;
        }
        self.flash = Some(Flash {
            node,
            done_color,
            timer: Timer::new(DIRECT_FLASH_DURATION),
        });
    }

    fn finish_flash(&mut self) {
        let Some(flash) = self.flash.take() else {
            return;
        };
        match flash.done_color {
            Some(color) => self.scene.set_color(flash.node, color),
            None => self.scene.clear_color(flash.node),
        };
    }

    pub fn is_flashing(&self) -> bool {
        self.flash.is_some()
    }

    /// Shows `node`'s level and hides its siblings.
    pub fn isolate(&mut self, node: Option<NodeId>) {
        self.finish_flash();
        let Some(node) = node.or_else(|| self.selection.last().map(|s| s.node)) else {
            return;
        };
        if let Some(parent) = self.scene.parent(node) {
            self.scene.show_all_descendants(parent);
        }
        self.scene.hide_siblings(node);
    }

    pub fn toggle_vis(&mut self, node: Option<NodeId>) {
        self.finish_flash();
        if let Some(node) = node.or_else(|| self.selection.last().map(|s| s.node)) {
            self.scene.toggle_vis(node);
        }
    }

    /// Shows `node` (render by default) and everything under it.
    pub fn show_all_descendants(&mut self, node: Option<NodeId>) {
        let node = node.unwrap_or_else(|| self.scene.root());
        self.scene.show_all_descendants(node);
    }

    pub fn remove_node_path(&mut self, node: Option<NodeId>) {
        let Some(node) = node.or_else(|| self.selection.last().map(|s| s.node)) else {
            return;
        };
        if self.selection.contains(node) {
            self.deselect(node);
        }
        self.scene.remove_node(node);
    }

    pub fn remove_all_selected(&mut self) {
        self.selection.remove_all(&mut self.scene, &mut self.events);
        self.hide_widget();
    }

    /// Selects the next ancestor of the node the ancestry walk started from.
    pub fn up_ancestry(&mut self) {
        self.walk_ancestry(self.ancestry_index + 1);
    }

    pub fn down_ancestry(&mut self) {
        if let Some(index) = self.ancestry_index.checked_sub(1) {
            self.walk_ancestry(index);
        }
    }

    fn walk_ancestry(&mut self, index: usize) {
        let Some(&node) = self.ancestry.get(index) else {
            return;
        };
        if node == self.scene.root() || !self.scene.contains(node) {
            return;
        }
        self.ancestry_index = index;
        self.select_with(node, false, false, false);
        self.flash(Some(node));
    }

    pub fn message(&mut self, text: impl Into<String>) {
        self.status
            .show(text, self.config.message_duration, &mut self.events);
    }

    pub fn set_near_far(&mut self, near: f64, far: f64) {
        self.regions.set_near_far(&mut self.scene, near, far);
    }

    pub fn set_fov(&mut self, hfov: f64, vfov: f64) {
        self.regions.set_fov(&mut self.scene, hfov, vfov);
    }

    pub fn add_unpickable(&mut self, name: &str) {
        for region in self.regions.iter_mut() {
            region.ray.queue.add_unpickable(name);
        }
    }

    pub fn remove_unpickable(&mut self, name: &str) {
        for region in self.regions.iter_mut() {
            region.ray.queue.remove_unpickable(name);
        }
    }

    fn geom_filter(&self) -> PickFilter {
        PickFilter {
            camera: self.camera(),
            widget: None,
        }
    }

    /// Nearest geometry hit along any of the world-space segments.
    pub fn pick_segments(&self, segments: &[(DVec3, DVec3)]) -> Option<CollisionEntry> {
        let render = self.scene.root();
        let mut query = SelectionSegment::new(render);
        for (a, b) in segments {
            query.add_segment(*a, *b);
        }
        query.pick_geom(&self.scene, render, SkipFlags::DEFAULT, &self.geom_filter())
    }

    /// Nearest geometry touching any of the world-space spheres.
    pub fn pick_spheres(&self, spheres: &[(DVec3, f64)]) -> Option<CollisionEntry> {
        let render = self.scene.root();
        let mut query = SelectionSphere::new(render);
        for (center, radius) in spheres {
            query.add_sphere(*center, *radius);
        }
        query.pick_geom(&self.scene, render, SkipFlags::DEFAULT, &self.geom_filter())
    }

    // ====================================================================
    // Camera commands
    // ====================================================================

    pub fn home_cam(&mut self) {
        let (mut ctx, _, camera) = self.split();
        camera.home_cam(&mut ctx);
    }

    pub fn upright_cam(&mut self) {
        let (mut ctx, _, camera) = self.split();
        camera.upright_cam(&mut ctx);
    }

    pub fn orbit_upright_cam(&mut self) {
        let (mut ctx, _, camera) = self.split();
        camera.orbit_upright_cam(&mut ctx);
    }

    pub fn center_cam(&mut self, t: f64) {
        let (mut ctx, _, camera) = self.split();
        camera.center_cam_in(&mut ctx, t);
    }

    pub fn zoom_cam(&mut self, factor: f64, t: f64) {
        let (mut ctx, _, camera) = self.split();
        camera.zoom_cam(&mut ctx, factor, t);
    }

    pub fn move_to_view(&mut self, view: u8) {
        let (mut ctx, _, camera) = self.split();
        camera.spawn_move_to_view(&mut ctx, view);
    }

    pub fn swing_cam_about_widget(&mut self, degrees: f64, t: f64) {
        let (mut ctx, _, camera) = self.split();
        camera.swing_cam_about_widget(&mut ctx, degrees, t);
    }

    pub fn fit_on_widget(&mut self) {
        let (mut ctx, manip, camera) = self.split();
        camera.fit_on_widget(&mut ctx, manip.widget());
    }

    pub fn move_to_fit(&mut self) {
        let (mut ctx, manip, camera) = self.split();
        camera.move_to_fit(&mut ctx, manip);
    }

    pub fn pick_next_coa(&mut self) {
        let (mut ctx, _, camera) = self.split();
        camera.pick_next_coa(&mut ctx);
    }

    pub fn toggle_coa_lock(&mut self) {
        let (mut ctx, _, camera) = self.split();
        camera.toggle_coa_lock(&mut ctx);
    }

    pub fn toggle_coa_marker(&mut self) {
        self.camera.toggle_marker_vis(&mut self.scene);
    }

    pub fn cancel_camera_task(&mut self) {
        let (mut ctx, _, camera) = self.split();
        camera.remove_manipulate_camera_task(&mut ctx);
    }

    /// Starts or stops the buttonless camera pan. Shift pans heading and
    /// pitch; otherwise the camera slides in its XZ plane.
    pub fn toggle_pan_cam(&mut self) {
        let (mut ctx, _, camera) = self.split();
        if camera.is_panning() {
            camera.remove_manipulate_camera_task(&mut ctx);
        } else {
            camera.spawn_xz_translate_or_hp_pan(&mut ctx);
        }
    }
}

/// Shifted symbol keys arrive as `shift-{`; they bind the same as `{`.
fn normalize_binding(binding: &str) -> &str {
    match binding {
        "shift-{" => "{",
        "shift-}" => "}",
        "shift-+" => "+",
        "shift-_" => "_",
        "shift->" => ">",
        "shift-<" => "<",
        other => other,
    }
}
