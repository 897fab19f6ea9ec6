use std::path::PathBuf;

use modelsketch_render::{AspectMode, CameraParam, ViewState};
use modelsketch_scene::Shading;

/// A high-level action produced by sliders, keys or the mouse.
///
/// The view and the app consume actions, never raw input events.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Overwrite one parameter (a slider moved).
    SetParam(CameraParam, f32),
    /// Add a delta to one parameter.
    Nudge(CameraParam, f32),
    /// Rotate around the target, in radians.
    Orbit { d_theta: f32, d_phi: f32 },
    /// Multiply the orbit radius.
    Zoom(f32),
    /// Follow the window's aspect ratio or keep a manual one.
    SetAspectMode(AspectMode),
    ResetView,
    ToggleControls,
    LoadModel(PathBuf),
    SetShading(Shading),
    /// Unbound input.
    Noop,
}

/// Who an applied action was meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    /// The view was updated.
    View,
    /// The view is untouched; the app must act (panel, loading, shading).
    App,
    Ignored,
}

/// Apply a view action. Actions outside the view are left to the caller.
pub fn apply(action: &Action, view: &mut ViewState) -> Handled {
    match action {
        Action::SetParam(param, value) => {
            view.set_param(*param, *value);
            Handled::View
        }
        Action::Nudge(param, delta) => {
            view.nudge(*param, *delta);
            Handled::View
        }
        Action::Orbit { d_theta, d_phi } => {
            view.orbit(*d_theta, *d_phi);
            Handled::View
        }
        Action::Zoom(factor) => {
            if !factor.is_finite() || *factor <= 0.0 {
                tracing::debug!(factor, "ignoring zoom");
                return Handled::Ignored;
            }
            view.zoom(*factor);
            Handled::View
        }
        Action::SetAspectMode(mode) => {
            view.set_aspect_mode(*mode);
            Handled::View
        }
        Action::ResetView => {
            view.reset();
            tracing::debug!("view reset");
            Handled::View
        }
        Action::ToggleControls | Action::LoadModel(_) | Action::SetShading(_) => Handled::App,
        Action::Noop => Handled::Ignored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_param_overwrites_and_clamps() {
        let mut view = ViewState::default();
        assert_eq!(apply(&Action::SetParam(CameraParam::Fov, 75.0), &mut view), Handled::View);
        assert_eq!(view.param(CameraParam::Fov), 75.0);
        apply(&Action::SetParam(CameraParam::Near, 100.0), &mut view);
        assert_eq!(view.param(CameraParam::Near), 10.0);
    }

    #[test]
    fn nudge_adds_delta() {
        let mut view = ViewState::default();
        apply(&Action::Nudge(CameraParam::Fov, -5.0), &mut view);
        assert_eq!(view.param(CameraParam::Fov), 40.0);
    }

    #[test]
    fn orbit_and_zoom_move_camera() {
        let mut view = ViewState::default();
        apply(&Action::Orbit { d_theta: 0.5, d_phi: 0.25 }, &mut view);
        assert_eq!(view.param(CameraParam::Theta), 0.5);
        assert_eq!(view.param(CameraParam::Phi), 0.25);
        apply(&Action::Zoom(2.0), &mut view);
        assert_eq!(view.param(CameraParam::Radius), 6.0);
    }

    #[test]
    fn invalid_zoom_is_ignored() {
        let mut view = ViewState::default();
        assert_eq!(apply(&Action::Zoom(0.0), &mut view), Handled::Ignored);
        assert_eq!(apply(&Action::Zoom(f32::NAN), &mut view), Handled::Ignored);
        assert_eq!(view.param(CameraParam::Radius), 3.0);
    }

    #[test]
    fn aspect_mode_switches_back_to_window() {
        let mut view = ViewState::default();
        view.set_window_size(400, 100);
        apply(&Action::SetParam(CameraParam::Aspect, 1.5), &mut view);
        assert_eq!(view.aspect_mode(), AspectMode::Manual);
        apply(&Action::SetAspectMode(AspectMode::Window), &mut view);
        assert_eq!(view.param(CameraParam::Aspect), 4.0);
    }

    #[test]
    fn reset_restores_defaults() {
        let mut view = ViewState::default();
        apply(&Action::SetParam(CameraParam::Radius, 50.0), &mut view);
        apply(&Action::ResetView, &mut view);
        assert_eq!(view.param(CameraParam::Radius), 3.0);
    }

    #[test]
    fn app_actions_leave_view_alone() {
        let mut view = ViewState::default();
        let before = view.view_matrix();
        assert_eq!(apply(&Action::ToggleControls, &mut view), Handled::App);
        assert_eq!(apply(&Action::LoadModel("a.obj".into()), &mut view), Handled::App);
        assert_eq!(apply(&Action::SetShading(Shading::Grey), &mut view), Handled::App);
        assert_eq!(apply(&Action::Noop, &mut view), Handled::Ignored);
        assert_eq!(view.view_matrix(), before);
    }
}
