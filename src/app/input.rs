use bitflags::bitflags;
use glam::DVec2;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const SHIFT = 1;
        const CONTROL = 1 << 1;
        const ALT = 1 << 2;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    /// Select and manipulate.
    Primary,
    /// Camera fly.
    Middle,
    Secondary,
}

impl MouseButton {
    fn bit(self) -> u8 {
        match self {
            MouseButton::Primary => 1,
            MouseButton::Middle => 1 << 1,
            MouseButton::Secondary => 1 << 2,
        }
    }
}

/// Host input, already translated out of the windowing system.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// Whole-window NDC, `[-1, 1]` on both axes.
    MouseMove(DVec2),
    MouseLeave,
    ButtonDown(MouseButton),
    ButtonUp(MouseButton),
    /// Key names follow the usual lowercase spelling: `"a"`, `"escape"`,
    /// `"page_up"`, `"shift"`.
    KeyDown(String),
    KeyUp(String),
}

#[derive(Default, Debug, Clone, Copy)]
pub struct InputState {
    pub modifiers: Modifiers,
    pub mouse: Option<DVec2>,
    buttons: u8,
}

impl InputState {
    pub fn is_down(&self, button: MouseButton) -> bool {
        self.buttons & button.bit() != 0
    }

    pub fn shift(&self) -> bool {
        self.modifiers.contains(Modifiers::SHIFT)
    }

    pub fn control(&self) -> bool {
        self.modifiers.contains(Modifiers::CONTROL)
    }

    pub fn alt(&self) -> bool {
        self.modifiers.contains(Modifiers::ALT)
    }

    /// Updates the tracked state. Returns the binding name for a key press,
    /// prefixed with `shift-` when Shift is held, or `None` for events that
    /// are not key presses or are modifiers themselves.
    pub fn handle(&mut self, event: &InputEvent) -> Option<String> {
        match event {
            InputEvent::MouseMove(p) => self.mouse = Some(*p),
            InputEvent::MouseLeave => self.mouse = None,
            InputEvent::ButtonDown(b) => self.buttons |= b.bit(),
            InputEvent::ButtonUp(b) => self.buttons &= !b.bit(),
            InputEvent::KeyDown(key) => {
                if let Some(m) = modifier_for(key) {
                    self.modifiers.insert(m);
                    return None;
                }
                return Some(if self.shift() {
                    format!("shift-{key}")
                } else {
                    key.clone()
                });
            }
            InputEvent::KeyUp(key) => {
                if let Some(m) = modifier_for(key) {
                    self.modifiers.remove(m);
                }
            }
        }
        None
    }
}

fn modifier_for(key: &str) -> Option<Modifiers> {
    match key {
        "shift" => Some(Modifiers::SHIFT),
        "control" => Some(Modifiers::CONTROL),
        "alt" => Some(Modifiers::ALT),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifiers_prefix_bindings() {
        let mut input = InputState::default();
        assert_eq!(input.handle(&InputEvent::KeyDown("l".into())), Some("l".into()));
        assert_eq!(input.handle(&InputEvent::KeyDown("shift".into())), None);
        assert!(input.shift());
        assert_eq!(
            input.handle(&InputEvent::KeyDown("l".into())),
            Some("shift-l".into())
        );
        input.handle(&InputEvent::KeyUp("shift".into()));
        assert!(!input.shift());
    }

    #[test]
    fn buttons_and_mouse_are_tracked() {
        let mut input = InputState::default();
        input.handle(&InputEvent::ButtonDown(MouseButton::Middle));
        assert!(input.is_down(MouseButton::Middle));
        assert!(!input.is_down(MouseButton::Primary));
        input.handle(&InputEvent::ButtonUp(MouseButton::Middle));
        assert!(!input.is_down(MouseButton::Middle));
        input.handle(&InputEvent::MouseMove(DVec2::new(0.5, -0.5)));
        assert_eq!(input.mouse, Some(DVec2::new(0.5, -0.5)));
        input.handle(&InputEvent::MouseLeave);
        assert_eq!(input.mouse, None);
    }
}
