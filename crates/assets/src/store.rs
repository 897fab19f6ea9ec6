use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::mesh::Model;
use crate::obj::{self, ObjOptions};
use crate::{AssetError, gltf, texture};

/// Content-addressed asset ID computed from the source bytes and import options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(pub u64);

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Source format of a model file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    Obj,
    Gltf,
    Glb,
}

impl ModelFormat {
    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "obj" => Some(Self::Obj),
            "gltf" => Some(Self::Gltf),
            "glb" => Some(Self::Glb),
            _ => None,
        }
    }
}

/// Options that change the imported model, and therefore the asset ID.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportOptions {
    pub obj: ObjOptions,
    /// Image applied as the base colour texture of every mesh.
    pub texture: Option<PathBuf>,
}

/// Parse model bytes of a known format.
pub fn decode_model(
    bytes: &[u8],
    format: ModelFormat,
    name: &str,
    base_dir: Option<&Path>,
    options: &ImportOptions,
) -> Result<Model, AssetError> {
    let model = match format {
        ModelFormat::Obj => {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| AssetError::UnsupportedFormat(format!("OBJ is not UTF-8: {e}")))?;
            let mut mesh = obj::parse(text, &options.obj)?;
            if mesh.name.is_none() {
                mesh.name = Some(name.to_string());
            }
            Model {
                name: name.to_string(),
                meshes: vec![mesh],
                textures: Vec::new(),
            }
        }
        ModelFormat::Gltf | ModelFormat::Glb => gltf::import_slice(bytes, base_dir, name)?,
    };
    Ok(model)
}

/// Registry of loaded models keyed by content hash.
///
/// Registering the same bytes with the same options twice yields one entry.
#[derive(Debug, Clone, Default)]
pub struct AssetStore {
    models: BTreeMap<AssetId, Arc<Model>>,
}

impl AssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content hash of source bytes under the given options.
    pub fn content_id(bytes: &[u8], options: &ImportOptions, texture: Option<&[u8]>) -> AssetId {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hasher.update(options.obj.scale.to_le_bytes());
        hasher.update([options.obj.generate_normals as u8]);
        if let Some(texture) = texture {
            hasher.update(b"texture");
            hasher.update(texture);
        }
        let result = hasher.finalize();
        let mut out = [0u8; 8];
        out.copy_from_slice(&result[..8]);
        AssetId(u64::from_le_bytes(out))
    }

    /// Read, parse and register a model file.
    pub fn load(&mut self, path: impl AsRef<Path>, options: &ImportOptions) -> Result<AssetId, AssetError> {
        let (id, model) = load_file(path.as_ref(), options)?;
        Ok(self.insert(id, model))
    }

    /// Register an already-parsed model. An existing entry with the same ID is kept.
    pub fn insert(&mut self, id: AssetId, model: Arc<Model>) -> AssetId {
        self.models.entry(id).or_insert(model);
        id
    }

    pub fn get(&self, id: AssetId) -> Option<&Arc<Model>> {
        self.models.get(&id)
    }

    pub fn contains(&self, id: AssetId) -> bool {
        self.models.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (AssetId, &Arc<Model>)> {
        self.models.iter().map(|(id, m)| (*id, m))
    }

    /// Number of registered models.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Read and parse a model file without registering it.
pub fn load_file(path: &Path, options: &ImportOptions) -> Result<(AssetId, Arc<Model>), AssetError> {
    let format = ModelFormat::from_path(path)
        .ok_or_else(|| AssetError::UnsupportedFormat(path.display().to_string()))?;
    let bytes = std::fs::read(path)?;
    let texture_bytes = match &options.texture {
        Some(p) => Some(std::fs::read(p)?),
        None => None,
    };
    let id = AssetStore::content_id(&bytes, options, texture_bytes.as_deref());
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".into());
    let mut model = decode_model(&bytes, format, &name, path.parent(), options)?;
    if let (Some(bytes), Some(tex_path)) = (texture_bytes, &options.texture) {
        let tex_name = tex_path.file_name().map(|n| n.to_string_lossy().into_owned());
        model.override_texture(texture::decode(&bytes, tex_name)?);
    }
    tracing::info!(
        path = %path.display(),
        id = %id,
        meshes = model.meshes.len(),
        vertices = model.vertex_count(),
        triangles = model.triangle_count(),
        "model loaded"
    );
    Ok((id, Arc::new(model)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE: &str = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";

    fn write(dir: &Path, name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(ModelFormat::from_path(Path::new("a/cube.OBJ")), Some(ModelFormat::Obj));
        assert_eq!(ModelFormat::from_path(Path::new("bot.glb")), Some(ModelFormat::Glb));
        assert_eq!(ModelFormat::from_path(Path::new("scene.gltf")), Some(ModelFormat::Gltf));
        assert_eq!(ModelFormat::from_path(Path::new("notes.txt")), None);
    }

    #[test]
    fn load_obj_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "tri.obj", TRIANGLE.as_bytes());
        let mut store = AssetStore::new();
        let id = store.load(&path, &ImportOptions::default()).unwrap();
        let model = store.get(id).unwrap();
        assert_eq!(model.name, "tri");
        assert_eq!(model.triangle_count(), 1);
    }

    #[test]
    fn load_glb_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "tri.glb", &gltf::tests::triangle_glb());
        let mut store = AssetStore::new();
        let id = store.load(&path, &ImportOptions::default()).unwrap();
        assert_eq!(store.get(id).unwrap().meshes.len(), 1);
    }

    #[test]
    fn content_addressed_dedup() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.obj", TRIANGLE.as_bytes());
        let b = write(dir.path(), "b.obj", TRIANGLE.as_bytes());
        let mut store = AssetStore::new();
        let id1 = store.load(&a, &ImportOptions::default()).unwrap();
        let id2 = store.load(&b, &ImportOptions::default()).unwrap();
        assert_eq!(id1, id2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn options_change_the_id() {
        let scaled = ImportOptions {
            obj: ObjOptions {
                scale: 0.1,
                ..ObjOptions::default()
            },
            ..ImportOptions::default()
        };
        let bytes = TRIANGLE.as_bytes();
        let plain = AssetStore::content_id(bytes, &ImportOptions::default(), None);
        assert_ne!(plain, AssetStore::content_id(bytes, &scaled, None));
        assert_ne!(
            plain,
            AssetStore::content_id(bytes, &ImportOptions::default(), Some(b"png"))
        );
    }

    #[test]
    fn texture_override_is_applied() {
        use image::{ImageFormat, Rgba, RgbaImage};

        let dir = tempfile::tempdir().unwrap();
        let obj = write(dir.path(), "tri.obj", TRIANGLE.as_bytes());
        let tex = dir.path().join("wood.png");
        RgbaImage::from_pixel(4, 4, Rgba([200, 100, 50, 255]))
            .save_with_format(&tex, ImageFormat::Png)
            .unwrap();

        let options = ImportOptions {
            texture: Some(tex),
            ..ImportOptions::default()
        };
        let (_, model) = load_file(&obj, &options).unwrap();
        assert_eq!(model.textures.len(), 1);
        let mesh = &model.meshes[0];
        assert_eq!(model.texture_for(mesh).unwrap().width, 4);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "tri.stl", TRIANGLE.as_bytes());
        let err = AssetStore::new()
            .load(&path, &ImportOptions::default())
            .unwrap_err();
        assert!(matches!(err, AssetError::UnsupportedFormat(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = AssetStore::new()
            .load("does/not/exist.obj", &ImportOptions::default())
            .unwrap_err();
        assert!(matches!(err, AssetError::Io(_)));
    }

    #[test]
    fn parse_errors_surface() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "bad.obj", b"v 0 0\n");
        let err = AssetStore::new()
            .load(&path, &ImportOptions::default())
            .unwrap_err();
        assert!(matches!(err, AssetError::Obj(_)));
    }
}
