use modelsketch_render::CameraParam;

use crate::action::Action;

/// Keys the viewer reacts to, independent of the windowing backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    PageUp,
    PageDown,
    Plus,
    Minus,
    R,
    F1,
    Other,
}

/// Step sizes for mapping raw input onto actions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputMap {
    /// Radians per arrow key press.
    pub orbit_step: f32,
    /// Radians per pixel of mouse drag.
    pub drag_sensitivity: f32,
    /// Radius factor per wheel line or page key.
    pub zoom_step: f32,
    /// Degrees per +/- press.
    pub fov_step: f32,
}

impl Default for InputMap {
    fn default() -> Self {
        Self {
            orbit_step: 0.05,
            drag_sensitivity: 0.005,
            zoom_step: 1.1,
            fov_step: 1.0,
        }
    }
}

impl InputMap {
    pub fn key(&self, key: Key) -> Action {
        match key {
            Key::ArrowLeft => Action::Orbit {
                d_theta: -self.orbit_step,
                d_phi: 0.0,
            },
            Key::ArrowRight => Action::Orbit {
                d_theta: self.orbit_step,
                d_phi: 0.0,
            },
            Key::ArrowUp => Action::Orbit {
                d_theta: 0.0,
                d_phi: self.orbit_step,
            },
            Key::ArrowDown => Action::Orbit {
                d_theta: 0.0,
                d_phi: -self.orbit_step,
            },
            Key::PageUp => Action::Zoom(1.0 / self.zoom_step),
            Key::PageDown => Action::Zoom(self.zoom_step),
            Key::Plus => Action::Nudge(CameraParam::Fov, self.fov_step),
            Key::Minus => Action::Nudge(CameraParam::Fov, -self.fov_step),
            Key::R => Action::ResetView,
            Key::F1 => Action::ToggleControls,
            Key::Other => Action::Noop,
        }
    }

    /// Dragging right swings the camera left around the target, dragging
    /// down raises it.
    pub fn drag(&self, dx: f32, dy: f32) -> Action {
        if dx == 0.0 && dy == 0.0 {
            return Action::Noop;
        }
        Action::Orbit {
            d_theta: -dx * self.drag_sensitivity,
            d_phi: dy * self.drag_sensitivity,
        }
    }

    /// Positive `lines` scroll away from the user and zoom in.
    pub fn wheel(&self, lines: f32) -> Action {
        if lines == 0.0 || !lines.is_finite() {
            return Action::Noop;
        }
        Action::Zoom(self.zoom_step.powf(-lines))
    }
}

/// Tracks a left-button drag and turns cursor motion into deltas.
#[derive(Debug, Default, Clone, Copy)]
pub struct DragTracker {
    pressed: bool,
    last: Option<(f64, f64)>,
}

impl DragTracker {
    pub fn press(&mut self) {
        self.pressed = true;
    }

    pub fn release(&mut self) {
        self.pressed = false;
    }

    pub fn is_dragging(&self) -> bool {
        self.pressed
    }

    /// Record the cursor position; returns the motion since the last
    /// position while the button is held.
    pub fn moved(&mut self, x: f64, y: f64) -> Option<(f32, f32)> {
        let last = self.last.replace((x, y));
        if !self.pressed {
            return None;
        }
        let (lx, ly) = last?;
        Some(((x - lx) as f32, (y - ly) as f32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Handled, apply};
    use modelsketch_render::ViewState;

    #[test]
    fn page_keys_zoom_in_and_out() {
        let map = InputMap::default();
        let mut view = ViewState::default();
        apply(&map.key(Key::PageDown), &mut view);
        assert!((view.param(CameraParam::Radius) - 3.3).abs() < 1e-5);
        apply(&map.key(Key::PageUp), &mut view);
        assert!((view.param(CameraParam::Radius) - 3.0).abs() < 1e-5);
    }

    #[test]
    fn fov_keys_step_by_one_degree() {
        let map = InputMap::default();
        let mut view = ViewState::default();
        apply(&map.key(Key::Plus), &mut view);
        apply(&map.key(Key::Plus), &mut view);
        apply(&map.key(Key::Minus), &mut view);
        assert_eq!(view.param(CameraParam::Fov), 46.0);
    }

    #[test]
    fn function_keys_map_to_app_actions() {
        let map = InputMap::default();
        assert_eq!(map.key(Key::R), Action::ResetView);
        assert_eq!(map.key(Key::F1), Action::ToggleControls);
        let mut view = ViewState::default();
        assert_eq!(apply(&map.key(Key::Other), &mut view), Handled::Ignored);
    }

    #[test]
    fn wheel_up_zooms_in() {
        let map = InputMap::default();
        match map.wheel(1.0) {
            Action::Zoom(f) => assert!(f < 1.0),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(map.wheel(0.0), Action::Noop);
    }

    #[test]
    fn drag_tracker_reports_deltas_only_while_pressed() {
        let mut drag = DragTracker::default();
        assert_eq!(drag.moved(10.0, 10.0), None);
        drag.press();
        assert_eq!(drag.moved(15.0, 8.0), Some((5.0, -2.0)));
        assert_eq!(drag.moved(15.0, 8.0), Some((0.0, 0.0)));
        drag.release();
        assert_eq!(drag.moved(30.0, 30.0), None);
        assert!(!drag.is_dragging());
    }

    #[test]
    fn drag_orbits_camera() {
        let map = InputMap::default();
        let mut view = ViewState::default();
        apply(&map.drag(-100.0, 40.0), &mut view);
        assert!((view.param(CameraParam::Theta) - 0.5).abs() < 1e-6);
        assert!((view.param(CameraParam::Phi) - 0.2).abs() < 1e-6);
        assert_eq!(map.drag(0.0, 0.0), Action::Noop);
    }
}
