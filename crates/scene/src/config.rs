use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use modelsketch_assets::{AssetLoader, ImportOptions, ObjOptions};
use modelsketch_common::{NodeId, Transform};

use crate::SceneError;
use crate::scene::{DirectionalLight, Lighting, ModelSpec, Scene, Shading};

/// Camera placement in a sketch file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraConfig {
    /// Spherical placement around a target; angles in radians.
    Orbit {
        #[serde(default = "default_radius")]
        radius: f32,
        #[serde(default)]
        theta: f32,
        #[serde(default)]
        phi: f32,
        #[serde(default)]
        target: [f32; 3],
    },
    /// Fixed eye looking at a target.
    Fixed {
        eye: [f32; 3],
        #[serde(default)]
        target: [f32; 3],
        #[serde(default = "default_up")]
        up: [f32; 3],
    },
}

impl Default for CameraConfig {
    fn default() -> Self {
        CameraConfig::Orbit {
            radius: default_radius(),
            theta: 0.0,
            phi: 0.0,
            target: [0.0; 3],
        }
    }
}

fn default_radius() -> f32 {
    3.0
}

fn default_up() -> [f32; 3] {
    [0.0, 1.0, 0.0]
}

/// Perspective parameters. `aspect: None` follows the window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub aspect: Option<f32>,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            fov: 45.0,
            near: 0.1,
            far: 100.0,
            aspect: None,
        }
    }
}

impl ProjectionConfig {
    /// Reject parameters no perspective matrix can be built from.
    pub fn validate(&self) -> Result<(), SceneError> {
        let Self { fov, near, far, aspect } = *self;
        if !fov.is_finite() || fov <= 0.0 || fov >= 180.0 {
            return Err(SceneError::Invalid(format!("fov must be in (0, 180) degrees, got {fov}")));
        }
        if !near.is_finite() || near <= 0.0 {
            return Err(SceneError::Invalid(format!("near must be positive, got {near}")));
        }
        if !far.is_finite() || far <= near {
            return Err(SceneError::Invalid(format!("far ({far}) must lie beyond near ({near})")));
        }
        if let Some(aspect) = aspect {
            if !aspect.is_finite() || aspect <= 0.0 {
                return Err(SceneError::Invalid(format!("aspect must be positive, got {aspect}")));
            }
        }
        Ok(())
    }
}

impl CameraConfig {
    /// Reject placements with no well-defined view direction.
    pub fn validate(&self) -> Result<(), SceneError> {
        match *self {
            CameraConfig::Orbit { radius, .. } => {
                if !radius.is_finite() || radius <= 0.0 {
                    return Err(SceneError::Invalid(format!("orbit radius must be positive, got {radius}")));
                }
            }
            CameraConfig::Fixed { eye, target, up } => {
                let forward = Vec3::from(target) - Vec3::from(eye);
                if !forward.is_finite() || forward.length_squared() < 1e-12 {
                    return Err(SceneError::Invalid("fixed camera eye and target coincide".into()));
                }
                let up = Vec3::from(up);
                if !up.is_finite() || forward.normalize().cross(up).length_squared() < 1e-12 {
                    return Err(SceneError::Invalid("fixed camera up is zero or parallel to the view direction".into()));
                }
            }
        }
        Ok(())
    }
}

/// One model entry in a sketch file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub position: [f32; 3],
    /// XYZ Euler angles in degrees.
    #[serde(default)]
    pub rotation: [f32; 3],
    #[serde(default = "default_scale")]
    pub scale: [f32; 3],
    #[serde(default)]
    pub shading: Shading,
    #[serde(default)]
    pub texture: Option<PathBuf>,
    /// Uniform scale applied to OBJ positions while parsing.
    #[serde(default = "default_obj_scale")]
    pub obj_scale: f32,
}

fn default_scale() -> [f32; 3] {
    [1.0; 3]
}

fn default_obj_scale() -> f32 {
    1.0
}

impl ModelConfig {
    pub fn transform(&self) -> Transform {
        Transform::from_euler_degrees(
            Vec3::from(self.position),
            Vec3::from(self.rotation),
            Vec3::from(self.scale),
        )
    }

    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            obj: ObjOptions {
                scale: self.obj_scale,
                ..ObjOptions::default()
            },
            texture: self.texture.clone(),
        }
    }

    pub fn spec(&self) -> ModelSpec {
        ModelSpec {
            path: self.path.clone(),
            name: self.name.clone(),
            transform: self.transform(),
            shading: self.shading,
            options: self.import_options(),
        }
    }
}

/// Colour and intensity of a light; `position` only matters for directional lights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    pub color: [f32; 3],
    pub intensity: f32,
    pub position: [f32; 3],
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            color: [1.0; 3],
            intensity: 1.0,
            position: [0.0, 1.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightsConfig {
    pub ambient: LightConfig,
    pub directional: LightConfig,
}

impl Default for LightsConfig {
    fn default() -> Self {
        let lighting = Lighting::default();
        Self {
            ambient: LightConfig {
                color: lighting.ambient_color,
                intensity: lighting.ambient_intensity,
                position: [0.0; 3],
            },
            directional: LightConfig {
                color: lighting.directional.color,
                intensity: lighting.directional.intensity,
                position: lighting.directional.position.into(),
            },
        }
    }
}

impl LightsConfig {
    pub fn lighting(&self) -> Lighting {
        Lighting {
            ambient_color: self.ambient.color,
            ambient_intensity: self.ambient.intensity,
            directional: DirectionalLight {
                color: self.directional.color,
                intensity: self.directional.intensity,
                position: Vec3::from(self.directional.position),
            },
        }
    }
}

/// A sketch: one scene described in YAML.
///
/// ```yaml
/// camera:
///   fixed: { eye: [0, 3, 7] }
/// projection: { fov: 75, near: 0.1, far: 1000 }
/// models:
///   - path: cube.glb
///     position: [0, -50, -50]
///     shading: normals
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SketchConfig {
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub camera: CameraConfig,
    pub projection: ProjectionConfig,
    pub models: Vec<ModelConfig>,
    pub lights: LightsConfig,
    pub background: [f32; 4],
    pub grid: bool,
}

impl Default for SketchConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            projection: ProjectionConfig::default(),
            models: Vec::new(),
            lights: LightsConfig::default(),
            background: [0.0, 0.0, 0.0, 1.0],
            grid: true,
        }
    }
}

impl SketchConfig {
    pub fn from_yaml(text: &str) -> Result<Self, SceneError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a sketch file. Relative model and texture paths are resolved
    /// against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&text)?;
        if let Some(dir) = path.parent() {
            config.resolve_paths(dir);
        }
        tracing::info!(path = %path.display(), models = config.models.len(), "sketch loaded");
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, SceneError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn resolve_paths(&mut self, base: &Path) {
        for model in &mut self.models {
            if model.path.is_relative() {
                model.path = base.join(&model.path);
            }
            if let Some(tex) = &mut model.texture {
                if tex.is_relative() {
                    *tex = base.join(&*tex);
                }
            }
        }
    }

    fn validate(&self) -> Result<(), SceneError> {
        self.camera.validate()?;
        self.projection.validate()?;
        for (i, model) in self.models.iter().enumerate() {
            if model.path.as_os_str().is_empty() {
                return Err(SceneError::Invalid(format!("model {i} has an empty path")));
            }
            if model.obj_scale.is_nan() || model.obj_scale <= 0.0 {
                return Err(SceneError::Invalid(format!("model {i} obj_scale must be positive")));
            }
        }
        Ok(())
    }

    /// Build a scene with every model queued on `loader`.
    pub fn build_scene(&self, loader: &mut AssetLoader) -> (Scene, Vec<NodeId>) {
        let mut scene = Scene::new();
        scene.lighting = self.lights.lighting();
        scene.background = self.background;
        scene.show_grid = self.grid;
        let ids = self
            .models
            .iter()
            .map(|m| scene.add_model(loader, m.spec()))
            .collect();
        (scene, ids)
    }
}
