//! Stagehand - scene-graph manipulation core.
//!
//! Headless editing session for a Z-up scene graph:
//! - Camera fly, orbit, zoom and view presets around a centre of action
//! - Mouse picking with skip rules and a multi-node selection set
//! - Translate, rotate and scale through a 3D handle widget
//! - Bounded undo/redo of node transforms
//!
//! Hosts feed [`app::InputEvent`]s and frame ticks to an [`app::Session`]
//! and render whatever the scene graph holds.

pub mod app;
pub mod camera;
pub mod geometry;
pub mod manip;
pub mod pick;
pub mod scene;
pub mod selection;
pub mod task;
pub mod viewport;

pub use app::{DirectEvent, InputEvent, MouseButton, Session, SessionConfig, SessionError};
pub use scene::{Lens, NodeId, SceneGraph, Shape};
