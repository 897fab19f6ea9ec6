//! wgpu render backend for model sketches.
//!
//! Renders a grid floor and every ready scene node with the node's shading.
//!
//! # Invariants
//! - Renderer never mutates the scene or the view.
//! - A node is drawn only after its model is ready and uploaded.
//! - Projection matrices arrive in OpenGL depth convention and are remapped
//!   to wgpu's [0, 1] depth range here.

mod gpu;
mod shaders;
mod uniforms;

pub use gpu::WgpuRenderer;
