//! Renderer-agnostic view math and the renderer interface.
//!
//! # Invariants
//! - Projection matrices use the OpenGL clip convention (depth in [-1, 1]).
//!   GPU backends with a [0, 1] depth range apply [`GL_TO_ZERO_TO_ONE`].
//! - A renderer never mutates the scene or the view.
//! - An invalid parameter set never replaces the last valid projection.

mod camera;
mod projection;
mod renderer;
mod view;

pub use camera::{
    Camera, FixedCamera, MAX_RADIUS, MIN_RADIUS, OrbitCamera, PHI_LIMIT, spherical_to_cartesian,
    wrap_angle,
};
pub use projection::{GL_TO_ZERO_TO_ONE, Projection, ProjectionError, perspective};
pub use renderer::{DebugTextRenderer, Renderer};
pub use view::{AspectMode, CameraParam, FrameMatrices, ViewState, normal_matrix};

pub fn crate_info() -> &'static str {
    "modelsketch-render v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("render"));
    }
}
