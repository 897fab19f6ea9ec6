use glam::{Mat4, Vec4};

/// Perspective parameters. The field of view is vertical and in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub fov_y_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            fov_y_degrees: 45.0,
            aspect: 1.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

/// Parameters a perspective matrix cannot be built from.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ProjectionError {
    #[error("field of view must be in (0, 180) degrees, got {0}")]
    FieldOfView(f32),
    #[error("aspect ratio must be positive, got {0}")]
    Aspect(f32),
    #[error("near plane must be positive, got {0}")]
    Near(f32),
    #[error("far plane ({far}) must lie beyond the near plane ({near})")]
    Far { near: f32, far: f32 },
}

impl Projection {
    pub fn validate(&self) -> Result<(), ProjectionError> {
        let Self {
            fov_y_degrees: fov,
            aspect,
            near,
            far,
        } = *self;
        if !fov.is_finite() || fov <= 0.0 || fov >= 180.0 {
            return Err(ProjectionError::FieldOfView(fov));
        }
        if !aspect.is_finite() || aspect <= 0.0 {
            return Err(ProjectionError::Aspect(aspect));
        }
        if !near.is_finite() || near <= 0.0 {
            return Err(ProjectionError::Near(near));
        }
        if !far.is_finite() || far <= near {
            return Err(ProjectionError::Far { near, far });
        }
        Ok(())
    }

    /// OpenGL-convention matrix (clip depth in `[-1, 1]`).
    pub fn matrix(&self) -> Result<Mat4, ProjectionError> {
        perspective(self.fov_y_degrees, self.aspect, self.near, self.far)
    }

    /// Matrix for APIs with clip depth in `[0, 1]` (wgpu, Vulkan, Metal, D3D).
    pub fn matrix_zero_to_one(&self) -> Result<Mat4, ProjectionError> {
        Ok(GL_TO_ZERO_TO_ONE * self.matrix()?)
    }
}

/// Remaps clip depth from `[-1, 1]` to `[0, 1]`.
#[rustfmt::skip]
pub const GL_TO_ZERO_TO_ONE: Mat4 = Mat4::from_cols(
    Vec4::new(1.0, 0.0, 0.0, 0.0),
    Vec4::new(0.0, 1.0, 0.0, 0.0),
    Vec4::new(0.0, 0.0, 0.5, 0.0),
    Vec4::new(0.0, 0.0, 0.5, 1.0),
);

/// Right-handed perspective matrix with clip depth in `[-1, 1]`.
///
/// `f = 1 / tan(fovy / 2)`; camera-space `z = -near` maps to depth -1 and
/// `z = -far` to +1.
pub fn perspective(fov_y_degrees: f32, aspect: f32, near: f32, far: f32) -> Result<Mat4, ProjectionError> {
    Projection {
        fov_y_degrees,
        aspect,
        near,
        far,
    }
    .validate()?;

    let f = 1.0 / (fov_y_degrees.to_radians() / 2.0).tan();
    let d = far - near;
    Ok(Mat4::from_cols(
        Vec4::new(f / aspect, 0.0, 0.0, 0.0),
        Vec4::new(0.0, f, 0.0, 0.0),
        Vec4::new(0.0, 0.0, -(near + far) / d, -1.0),
        Vec4::new(0.0, 0.0, -2.0 * near * far / d, 0.0),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn close(a: Mat4, b: Mat4) -> bool {
        a.abs_diff_eq(b, 1e-5)
    }

    fn depth(m: Mat4, z: f32) -> f32 {
        let clip = m * Vec4::new(0.0, 0.0, z, 1.0);
        clip.z / clip.w
    }

    #[test]
    fn matches_glam_gl_perspective() {
        let ours = perspective(45.0, 1.5, 0.1, 100.0).unwrap();
        let glam = Mat4::perspective_rh_gl(45f32.to_radians(), 1.5, 0.1, 100.0);
        assert!(close(ours, glam));
    }

    #[test]
    fn ninety_degrees_gives_unit_focal_length() {
        let m = perspective(90.0, 2.0, 1.0, 10.0).unwrap();
        assert!((m.col(1).y - 1.0).abs() < 1e-6);
        assert!((m.col(0).x - 0.5).abs() < 1e-6);
        assert_eq!(m.col(2).w, -1.0);
        assert_eq!(m.col(3).w, 0.0);
    }

    #[test]
    fn near_and_far_map_to_clip_bounds() {
        let m = perspective(60.0, 1.0, 0.5, 50.0).unwrap();
        assert!((depth(m, -0.5) + 1.0).abs() < 1e-5);
        assert!((depth(m, -50.0) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn zero_to_one_remaps_depth() {
        let p = Projection {
            fov_y_degrees: 75.0,
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        };
        let m = p.matrix_zero_to_one().unwrap();
        assert!(depth(m, -0.1).abs() < 1e-4);
        assert!((depth(m, -1000.0) - 1.0).abs() < 1e-3);
        let glam = Mat4::perspective_rh(75f32.to_radians(), 16.0 / 9.0, 0.1, 1000.0);
        assert!(m.abs_diff_eq(glam, 1e-4));
    }

    #[test]
    fn point_on_fov_edge_lands_on_clip_edge() {
        let m = perspective(90.0, 1.0, 0.1, 100.0).unwrap();
        // At distance 1 a 90 degree frustum spans y in [-1, 1].
        let clip = m * Vec3::new(0.0, 1.0, -1.0).extend(1.0);
        assert!((clip.y / clip.w - 1.0).abs() < 1e-5);
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert_eq!(perspective(0.0, 1.0, 0.1, 1.0), Err(ProjectionError::FieldOfView(0.0)));
        assert_eq!(perspective(180.0, 1.0, 0.1, 1.0), Err(ProjectionError::FieldOfView(180.0)));
        assert_eq!(perspective(45.0, 0.0, 0.1, 1.0), Err(ProjectionError::Aspect(0.0)));
        assert_eq!(perspective(45.0, 1.0, 0.0, 1.0), Err(ProjectionError::Near(0.0)));
        assert_eq!(
            perspective(45.0, 1.0, 5.0, 5.0),
            Err(ProjectionError::Far { near: 5.0, far: 5.0 })
        );
        assert!(perspective(f32::NAN, 1.0, 0.1, 1.0).is_err());
    }
}
