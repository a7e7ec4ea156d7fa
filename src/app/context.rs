use crate::app::config::SessionConfig;
use crate::app::events::{EventQueue, StatusLine};
use crate::app::history::UndoHistory;
use crate::app::input::InputState;
use crate::app::timing::FrameTiming;
use crate::pick::{PickFilter, SkipFlags};
use crate::scene::{CollisionEntry, NodeId, SceneGraph};
use crate::selection::SelectedNodes;
use crate::viewport::DisplayRegionContext;
use glam::DVec3;

/// Mutable view of the session handed to the controllers for one call.
pub struct EditContext<'a> {
    pub scene: &'a mut SceneGraph,
    pub selection: &'a mut SelectedNodes,
    pub history: &'a mut UndoHistory,
    pub events: &'a mut EventQueue,
    pub status: &'a mut StatusLine,
    /// Region under the mouse.
    pub dr: &'a mut DisplayRegionContext,
    pub config: &'a SessionConfig,
    pub input: InputState,
    pub timing: FrameTiming,
}

impl EditContext<'_> {
    pub fn camera(&self) -> NodeId {
        self.dr.cam()
    }

    pub fn render(&self) -> NodeId {
        self.scene.root()
    }

    /// Camera-space ray through the current mouse position.
    pub fn mouse_ray(&self) -> (DVec3, DVec3) {
        self.dr.mouse_ray(self.dr.mouse)
    }

    pub fn pick_filter(&self, widget: Option<NodeId>) -> PickFilter {
        PickFilter {
            camera: self.camera(),
            widget,
        }
    }

    /// Picks renderable geometry under the mouse.
    pub fn pick_geom(&mut self, skip: SkipFlags) -> Option<CollisionEntry> {
        let ray = self.mouse_ray();
        let filter = self.pick_filter(None);
        let render = self.render();
        self.dr.ray.pick_geom(self.scene, render, ray, skip, &filter)
    }

    pub fn push_undo(&mut self, nodes: &[NodeId]) {
        self.history.push_undo(self.scene, nodes, true, self.events);
    }

    pub fn message(&mut self, text: impl Into<String>) {
        self.status
            .show(text, self.config.message_duration, self.events);
    }
}
