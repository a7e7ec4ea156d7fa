//! Stagehand - headless demo session
//!
//! Builds a small scene, then scripts what a user would do in a viewport:
//! - Click a cube to select it
//! - Drag the widget's X post to slide the cube
//! - Undo the move, then orbit to a preset view
//!
//! Pass a JSON config path as the first argument to override the defaults.
//! Set `RUST_LOG=debug` to watch the controllers work.

use glam::{DVec2, DVec3};
use stagehand::{
    DirectEvent, InputEvent, Lens, MouseButton, SceneGraph, Session, SessionConfig, Shape,
};
use std::path::Path;

const DT: f64 = 1.0 / 60.0;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => SessionConfig::load(Path::new(&path))?,
        None => SessionConfig::default(),
    };

    let mut scene = SceneGraph::new();
    let render = scene.root();
    let cam = scene.attach_new_node(render, "camera")?;
    scene.set_lens(cam, Lens::perspective(40.0, 30.0, 1.0, 1000.0));
    scene.set_pos(cam, DVec3::new(0.0, -20.0, 0.0));
    let cube = scene.attach_new_node(render, "cube")?;
    scene.set_shape(cube, Shape::cube(1.0));

    let mut session = Session::with_camera(scene, cam, config)?;
    session.tick(DT);

    // Click the cube.
    click(&mut session, DVec2::ZERO);
    log::info!("selected: {:?}", session.selection().selected_as_list());

    // Drag the X post.
    drag(&mut session, DVec2::new(0.2, 0.0), DVec2::new(0.5, 0.0), 20);
    log::info!("cube after drag: {:?}", session.scene().pos(cube));

    key(&mut session, "[");
    log::info!("cube after undo: {:?}", session.scene().pos(cube));

    key(&mut session, "3");
    for _ in 0..90 {
        session.tick(DT);
    }
    log::info!(
        "camera after view 3: pos {:?} hpr {:?}",
        session.scene().pos_relative(cam, render),
        session.scene().hpr_relative(cam, render)
    );

    for event in session.drain_events() {
        if let DirectEvent::Message(text) = event {
            log::info!("status: {text}");
        } else {
            log::debug!("event: {event:?}");
        }
    }
    Ok(())
}

fn click(session: &mut Session, at: DVec2) {
    session.handle_input(InputEvent::MouseMove(at));
    session.tick(DT);
    session.handle_input(InputEvent::ButtonDown(MouseButton::Primary));
    session.tick(DT);
    session.handle_input(InputEvent::ButtonUp(MouseButton::Primary));
    session.tick(DT);
}

fn drag(session: &mut Session, from: DVec2, to: DVec2, steps: u32) {
    session.handle_input(InputEvent::MouseMove(from));
    session.tick(DT);
    session.handle_input(InputEvent::ButtonDown(MouseButton::Primary));
    for i in 1..=steps {
        let t = f64::from(i) / f64::from(steps);
        session.handle_input(InputEvent::MouseMove(from.lerp(to, t)));
        session.tick(DT);
    }
    session.handle_input(InputEvent::ButtonUp(MouseButton::Primary));
    session.tick(DT);
}

fn key(session: &mut Session, name: &str) {
    session.handle_input(InputEvent::KeyDown(name.to_string()));
    session.handle_input(InputEvent::KeyUp(name.to_string()));
}
