//! Scene description: which models are placed where, how they are shaded and
//! lit, and the YAML sketch files that describe a scene.
//!
//! # Invariants
//! - The scene is only mutated on the thread that owns it. Background loads
//!   become visible through [`Scene::apply_loads`].
//! - A node is drawable only once its model is [`NodeState::Ready`].

mod config;
mod scene;

pub use config::{
    CameraConfig, LightConfig, LightsConfig, ModelConfig, ProjectionConfig, SketchConfig,
};
pub use scene::{
    DirectionalLight, Lighting, LoadOutcome, ModelSpec, NodeState, Scene, SceneNode, Shading,
};

/// Errors from scene operations.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sketch YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("asset error: {0}")]
    Asset(#[from] modelsketch_assets::AssetError),
    #[error("invalid sketch: {0}")]
    Invalid(String),
}

pub fn crate_info() -> &'static str {
    "modelsketch-scene v0.1.0"
}
