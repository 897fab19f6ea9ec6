use glam::{Mat4, Vec3};
use std::f32::consts::{FRAC_PI_2, PI, TAU};

/// Pitch is kept this far from the poles so the view never looks along `up`.
pub const PHI_LIMIT: f32 = FRAC_PI_2 - 0.01;
pub const MIN_RADIUS: f32 = 0.01;
pub const MAX_RADIUS: f32 = 10_000.0;

/// Offset from the target for spherical coordinates with Y up.
///
/// `theta` is the yaw around Y measured from +Z toward +X, `phi` the pitch
/// above the XZ plane, both in radians.
pub fn spherical_to_cartesian(radius: f32, theta: f32, phi: f32) -> Vec3 {
    Vec3::new(
        radius * theta.sin() * phi.cos(),
        radius * phi.sin(),
        radius * theta.cos() * phi.cos(),
    )
}

/// Wrap an angle into `(-PI, PI]`.
pub fn wrap_angle(angle: f32) -> f32 {
    if angle > -PI && angle <= PI {
        return angle;
    }
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped == -PI { PI } else { wrapped }
}

/// Camera orbiting a target at a distance, steered by yaw and pitch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitCamera {
    pub radius: f32,
    pub theta: f32,
    pub phi: f32,
    pub target: Vec3,
    pub up: Vec3,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            radius: 3.0,
            theta: 0.0,
            phi: 0.0,
            target: Vec3::ZERO,
            up: Vec3::Y,
        }
    }
}

impl OrbitCamera {
    /// Orbit camera that sees the scene exactly as a camera at `eye` would.
    pub fn from_eye(eye: Vec3, target: Vec3, up: Vec3) -> Self {
        let offset = eye - target;
        let radius = offset.length().max(MIN_RADIUS);
        let phi = (offset.y / radius).clamp(-1.0, 1.0).asin().clamp(-PHI_LIMIT, PHI_LIMIT);
        let theta = offset.x.atan2(offset.z);
        Self {
            radius,
            theta,
            phi,
            target,
            up,
        }
    }

    pub fn eye(&self) -> Vec3 {
        self.target + spherical_to_cartesian(self.radius, self.theta, self.phi)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), self.target, self.up)
    }

    pub fn set_radius(&mut self, radius: f32) {
        self.radius = radius.clamp(MIN_RADIUS, MAX_RADIUS);
    }

    pub fn set_theta(&mut self, theta: f32) {
        self.theta = wrap_angle(theta);
    }

    pub fn set_phi(&mut self, phi: f32) {
        self.phi = phi.clamp(-PHI_LIMIT, PHI_LIMIT);
    }

    /// Rotate around the target by the given yaw and pitch deltas.
    pub fn orbit(&mut self, d_theta: f32, d_phi: f32) {
        self.set_theta(self.theta + d_theta);
        self.set_phi(self.phi + d_phi);
    }

    /// Scale the distance to the target; `factor < 1` moves closer.
    pub fn zoom(&mut self, factor: f32) {
        if factor.is_finite() && factor > 0.0 {
            self.set_radius(self.radius * factor);
        }
    }
}

/// Camera at a fixed eye position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedCamera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
}

impl Default for FixedCamera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 3.0, 7.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
        }
    }
}

impl FixedCamera {
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Camera {
    Orbit(OrbitCamera),
    Fixed(FixedCamera),
}

impl Default for Camera {
    fn default() -> Self {
        Camera::Orbit(OrbitCamera::default())
    }
}

impl Camera {
    pub fn eye(&self) -> Vec3 {
        match self {
            Camera::Orbit(c) => c.eye(),
            Camera::Fixed(c) => c.eye,
        }
    }

    pub fn target(&self) -> Vec3 {
        match self {
            Camera::Orbit(c) => c.target,
            Camera::Fixed(c) => c.target,
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        match self {
            Camera::Orbit(c) => c.view_matrix(),
            Camera::Fixed(c) => c.view_matrix(),
        }
    }

    /// The orbit form of this camera, converting a fixed camera in place
    /// without moving the eye.
    pub fn as_orbit_mut(&mut self) -> &mut OrbitCamera {
        match self {
            Camera::Orbit(orbit) => orbit,
            Camera::Fixed(fixed) => {
                *self = Camera::Orbit(OrbitCamera::from_eye(fixed.eye, fixed.target, fixed.up));
                self.as_orbit_mut()
            }
        }
    }

    /// Orbit parameters, computed on the fly for a fixed camera.
    pub fn orbit(&self) -> OrbitCamera {
        match self {
            Camera::Orbit(c) => *c,
            Camera::Fixed(c) => OrbitCamera::from_eye(c.eye, c.target, c.up),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn near(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn default_orbit_sits_on_positive_z() {
        let cam = OrbitCamera::default();
        assert!(near(cam.eye(), Vec3::new(0.0, 0.0, 3.0)));
    }

    #[test]
    fn spherical_placement_keeps_radius() {
        for (theta, phi) in [(0.3, 0.2), (-2.0, 1.2), (3.0, -0.7)] {
            let p = spherical_to_cartesian(5.0, theta, phi);
            assert!((p.length() - 5.0).abs() < 1e-4);
            assert!((p.y - 5.0 * phi.sin()).abs() < 1e-5);
        }
    }

    #[test]
    fn quarter_turn_moves_to_positive_x() {
        let cam = OrbitCamera {
            theta: FRAC_PI_2,
            ..OrbitCamera::default()
        };
        assert!(near(cam.eye(), Vec3::new(3.0, 0.0, 0.0)));
    }

    #[test]
    fn view_matrix_puts_target_on_negative_z() {
        let cam = OrbitCamera {
            radius: 4.0,
            theta: 1.0,
            phi: 0.5,
            target: Vec3::new(1.0, 2.0, 3.0),
            up: Vec3::Y,
        };
        let t = cam.view_matrix().transform_point3(cam.target);
        assert!(near(t, Vec3::new(0.0, 0.0, -4.0)));
        let e = cam.view_matrix().transform_point3(cam.eye());
        assert!(near(e, Vec3::ZERO));
    }

    #[test]
    fn phi_is_clamped_away_from_poles() {
        let mut cam = OrbitCamera::default();
        cam.orbit(0.0, 10.0);
        assert_eq!(cam.phi, PHI_LIMIT);
        assert!(!cam.view_matrix().is_nan());
        cam.set_phi(-10.0);
        assert_eq!(cam.phi, -PHI_LIMIT);
    }

    #[test]
    fn theta_wraps() {
        assert!((wrap_angle(3.0 * PI / 2.0) + FRAC_PI_2).abs() < 1e-5);
        assert_eq!(wrap_angle(-PI), PI);
        assert!((wrap_angle(0.25) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn zoom_is_multiplicative_and_bounded() {
        let mut cam = OrbitCamera::default();
        cam.zoom(0.5);
        assert!((cam.radius - 1.5).abs() < 1e-6);
        cam.zoom(0.0);
        assert!((cam.radius - 1.5).abs() < 1e-6);
        cam.zoom(1e-9);
        assert_eq!(cam.radius, MIN_RADIUS);
    }

    #[test]
    fn from_eye_round_trips() {
        let eye = Vec3::new(0.0, 3.0, 7.0);
        let orbit = OrbitCamera::from_eye(eye, Vec3::ZERO, Vec3::Y);
        assert!(near(orbit.eye(), eye));
        let fixed = FixedCamera::default();
        assert!(orbit.view_matrix().abs_diff_eq(fixed.view_matrix(), 1e-4));
    }

    #[test]
    fn fixed_camera_converts_in_place() {
        let mut cam = Camera::Fixed(FixedCamera::default());
        let before = cam.view_matrix();
        cam.as_orbit_mut().orbit(0.0, 0.0);
        assert!(matches!(cam, Camera::Orbit(_)));
        assert!(cam.view_matrix().abs_diff_eq(before, 1e-4));
    }

    #[test]
    fn orbit_camera_is_borrowed_directly() {
        let mut cam = Camera::default();
        cam.as_orbit_mut().set_radius(7.0);
        assert!(matches!(cam, Camera::Orbit(orbit) if orbit.radius == 7.0));
    }
}
