//! Model assets: in-memory mesh types, OBJ and glTF importers, a
//! content-addressed store and a background loader.
//!
//! The renderer consumes models by [`AssetId`], never by raw file paths.

pub mod gltf;
mod loader;
mod mesh;
pub mod obj;
mod store;
pub mod texture;

pub use gltf::GltfError;
pub use loader::{AssetLoader, LoadEvent, Ticket};
pub use mesh::{Bounds, MaterialDesc, Mesh, Model, TextureData};
pub use obj::{ObjError, ObjOptions};
pub use store::{AssetId, AssetStore, ImportOptions, ModelFormat, decode_model, load_file};

/// Errors from asset operations.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("OBJ parse error: {0}")]
    Obj(#[from] ObjError),
    #[error("glTF error: {0}")]
    Gltf(#[from] GltfError),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("unsupported model format: {0}")]
    UnsupportedFormat(String),
    #[error("loader panicked: {0}")]
    Panicked(String),
}

pub fn crate_info() -> &'static str {
    "modelsketch-assets v0.1.0"
}
