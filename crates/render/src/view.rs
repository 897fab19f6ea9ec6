use glam::{Mat3, Mat4, Vec3};
use std::f32::consts::PI;
use std::ops::RangeInclusive;

use modelsketch_scene::{CameraConfig, ProjectionConfig};

use crate::camera::{Camera, FixedCamera, OrbitCamera};
use crate::projection::{Projection, ProjectionError};

/// Where the projection's aspect ratio comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectMode {
    /// Follow the surface size.
    Window,
    /// Set explicitly (the aspect slider).
    Manual,
}

/// A single user-adjustable camera parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraParam {
    Near,
    Far,
    Radius,
    Theta,
    Phi,
    Fov,
    Aspect,
}

impl CameraParam {
    pub const ALL: [CameraParam; 7] = [
        CameraParam::Near,
        CameraParam::Far,
        CameraParam::Radius,
        CameraParam::Theta,
        CameraParam::Phi,
        CameraParam::Fov,
        CameraParam::Aspect,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            CameraParam::Near => "zNear",
            CameraParam::Far => "zFar",
            CameraParam::Radius => "radius",
            CameraParam::Theta => "theta",
            CameraParam::Phi => "phi",
            CameraParam::Fov => "fov",
            CameraParam::Aspect => "aspect",
        }
    }

    /// Slider range.
    pub fn range(&self) -> RangeInclusive<f32> {
        match self {
            CameraParam::Near => 0.01..=10.0,
            CameraParam::Far => 1.0..=2000.0,
            CameraParam::Radius => 0.1..=200.0,
            CameraParam::Theta => -PI..=PI,
            CameraParam::Phi => -1.55..=1.55,
            CameraParam::Fov => 1.0..=179.0,
            CameraParam::Aspect => 0.1..=4.0,
        }
    }

    pub fn affects_projection(&self) -> bool {
        matches!(
            self,
            CameraParam::Near | CameraParam::Far | CameraParam::Fov | CameraParam::Aspect
        )
    }
}

/// Per-frame matrices shared by every draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameMatrices {
    pub view: Mat4,
    pub projection: Mat4,
    pub eye: Vec3,
}

impl FrameMatrices {
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Model-view matrix and the normal matrix (inverse transpose of its
    /// upper 3x3) for one model.
    pub fn model(&self, model: Mat4) -> (Mat4, Mat3) {
        let model_view = self.view * model;
        (model_view, normal_matrix(model_view))
    }
}

/// Inverse transpose of the upper 3x3, falling back to identity when singular.
pub fn normal_matrix(m: Mat4) -> Mat3 {
    let m3 = Mat3::from_mat4(m);
    if m3.determinant().abs() < f32::EPSILON {
        return Mat3::IDENTITY;
    }
    m3.inverse().transpose()
}

/// Camera plus projection, as driven by the controls.
///
/// The projection matrix is rebuilt whenever a parameter changes. If the new
/// parameters are invalid (e.g. near beyond far) the last valid matrix stays
/// in use and [`ViewState::projection_error`] reports why.
#[derive(Debug, Clone)]
pub struct ViewState {
    pub camera: Camera,
    projection: Projection,
    aspect_mode: AspectMode,
    window_aspect: f32,
    projection_matrix: Mat4,
    projection_error: Option<ProjectionError>,
    initial: (Camera, Projection, AspectMode),
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(Camera::default(), Projection::default(), AspectMode::Window)
    }
}

impl ViewState {
    pub fn new(camera: Camera, projection: Projection, aspect_mode: AspectMode) -> Self {
        let mut state = Self {
            camera,
            projection,
            aspect_mode,
            window_aspect: projection.aspect,
            // Stands in until the first valid projection is built.
            projection_matrix: Projection::default().matrix().unwrap_or(Mat4::IDENTITY),
            projection_error: None,
            initial: (camera, projection, aspect_mode),
        };
        state.rebuild_projection();
        state
    }

    pub fn from_config(camera: &CameraConfig, projection: &ProjectionConfig) -> Self {
        let camera = match *camera {
            CameraConfig::Orbit {
                radius,
                theta,
                phi,
                target,
            } => {
                let mut orbit = OrbitCamera {
                    target: Vec3::from(target),
                    ..OrbitCamera::default()
                };
                orbit.set_radius(radius);
                orbit.set_theta(theta);
                orbit.set_phi(phi);
                Camera::Orbit(orbit)
            }
            CameraConfig::Fixed { eye, target, up } => Camera::Fixed(FixedCamera {
                eye: Vec3::from(eye),
                target: Vec3::from(target),
                up: Vec3::from(up),
            }),
        };
        let (aspect, mode) = match projection.aspect {
            Some(a) => (a, AspectMode::Manual),
            None => (1.0, AspectMode::Window),
        };
        Self::new(
            camera,
            Projection {
                fov_y_degrees: projection.fov,
                aspect,
                near: projection.near,
                far: projection.far,
            },
            mode,
        )
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn aspect_mode(&self) -> AspectMode {
        self.aspect_mode
    }

    pub fn set_aspect_mode(&mut self, mode: AspectMode) {
        self.aspect_mode = mode;
        if mode == AspectMode::Window {
            self.projection.aspect = self.window_aspect;
            self.rebuild_projection();
        }
    }

    /// Record a new surface size. Only changes the projection in window mode.
    pub fn set_window_size(&mut self, width: u32, height: u32) {
        self.window_aspect = width.max(1) as f32 / height.max(1) as f32;
        if self.aspect_mode == AspectMode::Window {
            self.projection.aspect = self.window_aspect;
            self.rebuild_projection();
        }
    }

    pub fn param(&self, param: CameraParam) -> f32 {
        match param {
            CameraParam::Near => self.projection.near,
            CameraParam::Far => self.projection.far,
            CameraParam::Fov => self.projection.fov_y_degrees,
            CameraParam::Aspect => self.projection.aspect,
            CameraParam::Radius => self.camera.orbit().radius,
            CameraParam::Theta => self.camera.orbit().theta,
            CameraParam::Phi => self.camera.orbit().phi,
        }
    }

    /// Set one parameter, clamped to its slider range. Orbit parameters turn
    /// a fixed camera into an orbit camera. Setting the aspect switches to
    /// manual aspect.
    pub fn set_param(&mut self, param: CameraParam, value: f32) {
        if !value.is_finite() {
            tracing::warn!(param = param.label(), "ignoring non-finite value");
            return;
        }
        let range = param.range();
        let value = value.clamp(*range.start(), *range.end());
        match param {
            CameraParam::Near => self.projection.near = value,
            CameraParam::Far => self.projection.far = value,
            CameraParam::Fov => self.projection.fov_y_degrees = value,
            CameraParam::Aspect => {
                self.aspect_mode = AspectMode::Manual;
                self.projection.aspect = value;
            }
            CameraParam::Radius => self.camera.as_orbit_mut().set_radius(value),
            CameraParam::Theta => self.camera.as_orbit_mut().set_theta(value),
            CameraParam::Phi => self.camera.as_orbit_mut().set_phi(value),
        }
        if param.affects_projection() {
            self.rebuild_projection();
        }
    }

    /// Add `delta` to a parameter.
    pub fn nudge(&mut self, param: CameraParam, delta: f32) {
        self.set_param(param, self.param(param) + delta);
    }

    pub fn orbit(&mut self, d_theta: f32, d_phi: f32) {
        self.camera.as_orbit_mut().orbit(d_theta, d_phi);
    }

    pub fn zoom(&mut self, factor: f32) {
        let range = CameraParam::Radius.range();
        let orbit = self.camera.as_orbit_mut();
        orbit.zoom(factor);
        orbit.radius = orbit.radius.clamp(*range.start(), *range.end());
    }

    /// Restore the camera and projection this state was created with.
    pub fn reset(&mut self) {
        let (camera, projection, mode) = self.initial;
        self.camera = camera;
        self.projection = projection;
        self.aspect_mode = mode;
        if mode == AspectMode::Window {
            self.projection.aspect = self.window_aspect;
        }
        self.rebuild_projection();
    }

    /// OpenGL-convention projection matrix currently in use.
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection_matrix
    }

    pub fn projection_error(&self) -> Option<&ProjectionError> {
        self.projection_error.as_ref()
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.camera.view_matrix()
    }

    /// Matrices for this frame. `zero_to_one` remaps clip depth for wgpu-style APIs.
    pub fn frame(&self, zero_to_one: bool) -> FrameMatrices {
        let projection = if zero_to_one {
            crate::projection::GL_TO_ZERO_TO_ONE * self.projection_matrix
        } else {
            self.projection_matrix
        };
        FrameMatrices {
            view: self.view_matrix(),
            projection,
            eye: self.camera.eye(),
        }
    }

    fn rebuild_projection(&mut self) {
        match self.projection.matrix() {
            Ok(m) => {
                self.projection_matrix = m;
                self.projection_error = None;
            }
            Err(e) => {
                if self.projection_error != Some(e) {
                    tracing::warn!("keeping previous projection: {e}");
                }
                self.projection_error = Some(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::perspective;

    #[test]
    fn invalid_initial_projection_falls_back_to_default_perspective() {
        let projection = Projection {
            near: 0.0,
            ..Projection::default()
        };
        let view = ViewState::new(Camera::default(), projection, AspectMode::Manual);
        assert_eq!(view.projection_error(), Some(&ProjectionError::Near(0.0)));
        assert_eq!(view.projection_matrix(), perspective(45.0, 1.0, 0.1, 100.0).unwrap());
    }

    #[test]
    fn default_state_has_valid_projection() {
        let view = ViewState::default();
        assert!(view.projection_error().is_none());
        assert_eq!(view.projection_matrix(), perspective(45.0, 1.0, 0.1, 100.0).unwrap());
    }

    #[test]
    fn window_size_drives_aspect_in_window_mode() {
        let mut view = ViewState::default();
        view.set_window_size(1600, 800);
        assert_eq!(view.param(CameraParam::Aspect), 2.0);
        view.set_param(CameraParam::Aspect, 1.0);
        assert_eq!(view.aspect_mode(), AspectMode::Manual);
        view.set_window_size(800, 800);
        assert_eq!(view.param(CameraParam::Aspect), 1.0);
        view.set_aspect_mode(AspectMode::Window);
        assert_eq!(view.param(CameraParam::Aspect), 1.0);
    }

    #[test]
    fn near_beyond_far_keeps_last_valid_matrix() {
        let mut view = ViewState::default();
        let before = view.projection_matrix();
        view.set_param(CameraParam::Near, 5.0);
        view.set_param(CameraParam::Far, 2.0);
        assert!(matches!(view.projection_error(), Some(ProjectionError::Far { .. })));
        let after_near = perspective(45.0, 1.0, 5.0, 100.0).unwrap();
        assert_ne!(before, after_near);
        assert_eq!(view.projection_matrix(), after_near);
        view.set_param(CameraParam::Far, 50.0);
        assert!(view.projection_error().is_none());
    }

    #[test]
    fn values_are_clamped_to_slider_range() {
        let mut view = ViewState::default();
        view.set_param(CameraParam::Fov, 500.0);
        assert_eq!(view.param(CameraParam::Fov), 179.0);
        view.set_param(CameraParam::Radius, -3.0);
        assert_eq!(view.param(CameraParam::Radius), 0.1);
        view.set_param(CameraParam::Fov, f32::NAN);
        assert_eq!(view.param(CameraParam::Fov), 179.0);
        view.set_param(CameraParam::Phi, 2.0);
        assert_eq!(view.param(CameraParam::Phi), 1.55);
        view.set_param(CameraParam::Phi, -2.0);
        assert_eq!(view.param(CameraParam::Phi), -1.55);
    }

    #[test]
    fn orbit_params_move_the_eye() {
        let mut view = ViewState::default();
        view.set_param(CameraParam::Theta, std::f32::consts::FRAC_PI_2);
        let eye = view.camera.eye();
        assert!((eye - Vec3::new(3.0, 0.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn fixed_camera_becomes_orbit_on_drag() {
        let camera = CameraConfig::Fixed {
            eye: [0.0, 3.0, 7.0],
            target: [0.0; 3],
            up: [0.0, 1.0, 0.0],
        };
        let mut view = ViewState::from_config(&camera, &ProjectionConfig::default());
        let eye = view.camera.eye();
        view.orbit(0.0, 0.0);
        assert!(matches!(view.camera, Camera::Orbit(_)));
        assert!((view.camera.eye() - eye).length() < 1e-4);
    }

    #[test]
    fn manual_aspect_from_config() {
        let projection = ProjectionConfig {
            aspect: Some(1.0),
            ..ProjectionConfig::default()
        };
        let mut view = ViewState::from_config(&CameraConfig::default(), &projection);
        assert_eq!(view.aspect_mode(), AspectMode::Manual);
        view.set_window_size(1920, 1080);
        assert_eq!(view.param(CameraParam::Aspect), 1.0);
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut view = ViewState::default();
        view.set_window_size(200, 100);
        view.set_param(CameraParam::Fov, 90.0);
        view.orbit(1.0, 0.5);
        view.reset();
        assert_eq!(view.param(CameraParam::Fov), 45.0);
        assert_eq!(view.param(CameraParam::Theta), 0.0);
        assert_eq!(view.param(CameraParam::Aspect), 2.0);
    }

    #[test]
    fn normal_matrix_undoes_non_uniform_scale() {
        let m = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let n = normal_matrix(m);
        assert!((n * Vec3::X - Vec3::new(0.5, 0.0, 0.0)).length() < 1e-6);
        assert_eq!(normal_matrix(Mat4::ZERO), Mat3::IDENTITY);
    }

    #[test]
    fn frame_matrices_combine() {
        let view = ViewState::default();
        let frame = view.frame(false);
        assert_eq!(frame.view_projection(), view.projection_matrix() * view.view_matrix());
        let (mv, _) = frame.model(Mat4::IDENTITY);
        assert_eq!(mv, frame.view);
    }
}
