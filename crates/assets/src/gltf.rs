//! glTF 2.0 import (`.gltf` with external buffers, or binary `.glb`).
//!
//! The default scene's node tree is walked and each node's world transform is
//! baked into its primitives, so the result is a flat list of meshes.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use glam::{Mat4, Quat, Vec3};
use serde::Deserialize;

use crate::mesh::{MaterialDesc, Mesh, Model, TextureData};
use crate::texture;

const GLB_MAGIC: u32 = 0x4654_6C67;
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

const MODE_TRIANGLES: u32 = 4;

const BYTE: u32 = 5120;
const UNSIGNED_BYTE: u32 = 5121;
const SHORT: u32 = 5122;
const UNSIGNED_SHORT: u32 = 5123;
const UNSIGNED_INT: u32 = 5125;
const FLOAT: u32 = 5126;

/// Errors from glTF import.
#[derive(Debug, thiserror::Error)]
pub enum GltfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("glTF JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid GLB container: {0}")]
    InvalidGlb(String),
    #[error("buffer {0} has no data")]
    MissingBuffer(usize),
    #[error("accessor {index}: {reason}")]
    Accessor { index: usize, reason: String },
    #[error("unsupported glTF feature: {0}")]
    Unsupported(String),
    #[error("image decode error: {0}")]
    Image(#[from] image::ImageError),
    #[error("glTF contains no triangle meshes")]
    Empty,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    scene: Option<usize>,
    #[serde(default)]
    scenes: Vec<SceneDef>,
    #[serde(default)]
    nodes: Vec<NodeDef>,
    #[serde(default)]
    meshes: Vec<MeshDef>,
    #[serde(default)]
    accessors: Vec<AccessorDef>,
    #[serde(default)]
    buffer_views: Vec<BufferViewDef>,
    #[serde(default)]
    buffers: Vec<BufferDef>,
    #[serde(default)]
    materials: Vec<MaterialDef>,
    #[serde(default)]
    textures: Vec<TextureDef>,
    #[serde(default)]
    images: Vec<ImageDef>,
}

#[derive(Debug, Default, Deserialize)]
struct SceneDef {
    #[serde(default)]
    nodes: Vec<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct NodeDef {
    name: Option<String>,
    #[serde(default)]
    children: Vec<usize>,
    mesh: Option<usize>,
    matrix: Option<[f32; 16]>,
    translation: Option<[f32; 3]>,
    rotation: Option<[f32; 4]>,
    scale: Option<[f32; 3]>,
}

impl NodeDef {
    fn local_matrix(&self) -> Mat4 {
        if let Some(m) = self.matrix {
            return Mat4::from_cols_array(&m);
        }
        Mat4::from_scale_rotation_translation(
            self.scale.map(Vec3::from).unwrap_or(Vec3::ONE),
            self.rotation.map(Quat::from_array).unwrap_or(Quat::IDENTITY),
            self.translation.map(Vec3::from).unwrap_or(Vec3::ZERO),
        )
    }
}

#[derive(Debug, Deserialize)]
struct MeshDef {
    name: Option<String>,
    primitives: Vec<PrimitiveDef>,
}

#[derive(Debug, Deserialize)]
struct PrimitiveDef {
    attributes: BTreeMap<String, usize>,
    indices: Option<usize>,
    material: Option<usize>,
    mode: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessorDef {
    buffer_view: Option<usize>,
    #[serde(default)]
    byte_offset: usize,
    component_type: u32,
    #[serde(default)]
    normalized: bool,
    count: usize,
    #[serde(rename = "type")]
    kind: String,
    sparse: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BufferViewDef {
    buffer: usize,
    #[serde(default)]
    byte_offset: usize,
    byte_length: usize,
    byte_stride: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BufferDef {
    byte_length: usize,
    uri: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MaterialDef {
    name: Option<String>,
    pbr_metallic_roughness: Option<PbrDef>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PbrDef {
    base_color_factor: Option<[f32; 4]>,
    base_color_texture: Option<TextureRef>,
}

#[derive(Debug, Deserialize)]
struct TextureRef {
    index: usize,
}

#[derive(Debug, Deserialize)]
struct TextureDef {
    source: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageDef {
    name: Option<String>,
    uri: Option<String>,
    buffer_view: Option<usize>,
}

/// Import a `.gltf` or `.glb` file. External buffers and images resolve
/// relative to the file's directory.
pub fn import(path: &Path) -> Result<Model, GltfError> {
    let bytes = std::fs::read(path)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "gltf".into());
    import_slice(&bytes, path.parent(), &name)
}

/// Import glTF from memory. `base_dir` is needed only for external URIs.
pub fn import_slice(bytes: &[u8], base_dir: Option<&Path>, name: &str) -> Result<Model, GltfError> {
    let (json, bin) = if bytes.len() >= 4 && read_u32(bytes, 0) == GLB_MAGIC {
        split_glb(bytes)?
    } else {
        (bytes, None)
    };
    let doc: Document = serde_json::from_slice(json)?;
    let buffers = load_buffers(&doc, bin, base_dir)?;
    Importer {
        doc: &doc,
        buffers,
        base_dir,
        textures: Vec::new(),
        texture_slots: HashMap::new(),
    }
    .run(name)
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Split a GLB container into its JSON chunk and optional BIN chunk.
fn split_glb(bytes: &[u8]) -> Result<(&[u8], Option<&[u8]>), GltfError> {
    if bytes.len() < 12 {
        return Err(GltfError::InvalidGlb("truncated header".into()));
    }
    let version = read_u32(bytes, 4);
    if version != 2 {
        return Err(GltfError::InvalidGlb(format!("unsupported version {version}")));
    }
    let total = (read_u32(bytes, 8) as usize).min(bytes.len());

    let mut json = None;
    let mut bin = None;
    let mut offset = 12;
    while offset + 8 <= total {
        let len = read_u32(bytes, offset) as usize;
        let kind = read_u32(bytes, offset + 4);
        let start = offset + 8;
        let end = start
            .checked_add(len)
            .filter(|&e| e <= total)
            .ok_or_else(|| GltfError::InvalidGlb("chunk exceeds file length".into()))?;
        match kind {
            CHUNK_JSON if json.is_none() => json = Some(&bytes[start..end]),
            CHUNK_BIN if bin.is_none() => bin = Some(&bytes[start..end]),
            _ => {}
        }
        // Chunks are 4-byte aligned.
        offset = end + (4 - len % 4) % 4;
    }
    let json = json.ok_or_else(|| GltfError::InvalidGlb("missing JSON chunk".into()))?;
    Ok((json, bin))
}

fn load_buffers<'a>(
    doc: &Document,
    bin: Option<&'a [u8]>,
    base_dir: Option<&Path>,
) -> Result<Vec<Cow<'a, [u8]>>, GltfError> {
    doc.buffers
        .iter()
        .enumerate()
        .map(|(i, buffer)| {
            let data: Cow<'a, [u8]> = match (&buffer.uri, bin) {
                (None, Some(bin)) if i == 0 => Cow::Borrowed(bin),
                (None, _) => return Err(GltfError::MissingBuffer(i)),
                (Some(uri), _) => Cow::Owned(read_uri(uri, base_dir)?),
            };
            if data.len() < buffer.byte_length {
                return Err(GltfError::InvalidGlb(format!(
                    "buffer {i} holds {} bytes, declared {}",
                    data.len(),
                    buffer.byte_length
                )));
            }
            Ok(data)
        })
        .collect()
}

fn read_uri(uri: &str, base_dir: Option<&Path>) -> Result<Vec<u8>, GltfError> {
    if uri.starts_with("data:") {
        return Err(GltfError::Unsupported("data URIs".into()));
    }
    let path = match base_dir {
        Some(dir) => dir.join(uri),
        None => Path::new(uri).to_path_buf(),
    };
    tracing::debug!(path = %path.display(), "reading external glTF resource");
    Ok(std::fs::read(path)?)
}

fn components(kind: &str) -> Option<usize> {
    Some(match kind {
        "SCALAR" => 1,
        "VEC2" => 2,
        "VEC3" => 3,
        "VEC4" => 4,
        "MAT2" => 4,
        "MAT3" => 9,
        "MAT4" => 16,
        _ => return None,
    })
}

fn component_size(component_type: u32) -> Option<usize> {
    Some(match component_type {
        BYTE | UNSIGNED_BYTE => 1,
        SHORT | UNSIGNED_SHORT => 2,
        UNSIGNED_INT | FLOAT => 4,
        _ => return None,
    })
}

struct Importer<'a> {
    doc: &'a Document,
    buffers: Vec<Cow<'a, [u8]>>,
    base_dir: Option<&'a Path>,
    textures: Vec<TextureData>,
    /// glTF image index -> index into `textures`.
    texture_slots: HashMap<usize, usize>,
}

impl Importer<'_> {
    fn run(mut self, name: &str) -> Result<Model, GltfError> {
        let doc = self.doc;
        let mut meshes = Vec::new();
        for (mesh_index, world) in self.mesh_instances() {
            let Some(def) = doc.meshes.get(mesh_index) else {
                tracing::warn!(mesh = mesh_index, "node references missing mesh");
                continue;
            };
            for (p, primitive) in def.primitives.iter().enumerate() {
                let mode = primitive.mode.unwrap_or(MODE_TRIANGLES);
                if mode != MODE_TRIANGLES {
                    tracing::warn!(mesh = mesh_index, primitive = p, mode, "skipping non-triangle primitive");
                    continue;
                }
                let mut mesh = self.primitive(primitive)?;
                mesh.name = def.name.clone();
                mesh.transform(world);
                meshes.push(mesh);
            }
        }
        if meshes.is_empty() {
            return Err(GltfError::Empty);
        }
        tracing::debug!(name, meshes = meshes.len(), textures = self.textures.len(), "imported glTF");
        Ok(Model {
            name: name.to_string(),
            meshes,
            textures: self.textures,
        })
    }

    /// Mesh indices paired with their node's world matrix.
    fn mesh_instances(&self) -> Vec<(usize, Mat4)> {
        let doc = self.doc;
        if doc.nodes.is_empty() {
            return (0..doc.meshes.len()).map(|m| (m, Mat4::IDENTITY)).collect();
        }
        let roots: Vec<usize> = match doc.scenes.get(doc.scene.unwrap_or(0)) {
            Some(scene) => scene.nodes.clone(),
            None => {
                let mut is_child = vec![false; doc.nodes.len()];
                for node in &doc.nodes {
                    for &c in &node.children {
                        if let Some(flag) = is_child.get_mut(c) {
                            *flag = true;
                        }
                    }
                }
                (0..doc.nodes.len()).filter(|&n| !is_child[n]).collect()
            }
        };

        let mut out = Vec::new();
        let mut visited = vec![false; doc.nodes.len()];
        let mut stack: Vec<(usize, Mat4)> = roots.into_iter().rev().map(|n| (n, Mat4::IDENTITY)).collect();
        while let Some((index, parent)) = stack.pop() {
            let Some(node) = doc.nodes.get(index) else {
                continue;
            };
            if std::mem::replace(&mut visited[index], true) {
                tracing::warn!(node = index, "node visited twice, ignoring cycle");
                continue;
            }
            let world = parent * node.local_matrix();
            if let Some(mesh) = node.mesh {
                tracing::trace!(node = index, name = ?node.name, mesh, "mesh instance");
                out.push((mesh, world));
            }
            stack.extend(node.children.iter().rev().map(|&c| (c, world)));
        }
        out
    }

    fn primitive(&mut self, primitive: &PrimitiveDef) -> Result<Mesh, GltfError> {
        let position = *primitive
            .attributes
            .get("POSITION")
            .ok_or_else(|| GltfError::Unsupported("primitive without POSITION".into()))?;
        let positions = self.read_vectors::<3>(position)?;
        let n = positions.len();

        let normals = match primitive.attributes.get("NORMAL") {
            Some(&a) => self.read_vectors::<3>(a)?,
            None => Vec::new(),
        };
        let uvs = match primitive.attributes.get("TEXCOORD_0") {
            Some(&a) => self.read_vectors::<2>(a)?,
            None => Vec::new(),
        };
        let colors = match primitive.attributes.get("COLOR_0") {
            Some(&a) => self.read_colors(a)?,
            None => Vec::new(),
        };
        let indices = match primitive.indices {
            Some(a) => self.read_indices(a)?,
            None => (0..n as u32).collect(),
        };
        let material = match primitive.material {
            Some(m) => self.material(m)?,
            None => MaterialDesc::default(),
        };

        let mut mesh = Mesh {
            name: None,
            positions,
            normals,
            uvs,
            colors,
            indices,
            material,
        };
        mesh.validate()
            .map_err(|reason| GltfError::Unsupported(format!("malformed primitive: {reason}")))?;
        if !mesh.has_normals() {
            mesh.compute_normals();
        }
        Ok(mesh)
    }

    fn material(&mut self, index: usize) -> Result<MaterialDesc, GltfError> {
        let doc = self.doc;
        let Some(def) = doc.materials.get(index) else {
            tracing::warn!(material = index, "missing material, using default");
            return Ok(MaterialDesc::default());
        };
        let pbr = def.pbr_metallic_roughness.as_ref();
        let base_color = pbr
            .and_then(|p| p.base_color_factor)
            .unwrap_or([1.0, 1.0, 1.0, 1.0]);
        let image = pbr
            .and_then(|p| p.base_color_texture.as_ref())
            .and_then(|t| doc.textures.get(t.index))
            .and_then(|t| t.source);
        let base_color_texture = match image {
            Some(image) => Some(self.texture(image)?),
            None => None,
        };
        Ok(MaterialDesc {
            name: def.name.clone(),
            base_color,
            base_color_texture,
        })
    }

    fn texture(&mut self, image: usize) -> Result<usize, GltfError> {
        if let Some(&slot) = self.texture_slots.get(&image) {
            return Ok(slot);
        }
        let doc = self.doc;
        let def = doc
            .images
            .get(image)
            .ok_or_else(|| GltfError::Unsupported(format!("texture references missing image {image}")))?;
        let decoded = {
            let bytes: Cow<'_, [u8]> = match (&def.uri, def.buffer_view) {
                (_, Some(view)) => Cow::Borrowed(self.view_bytes(view)?),
                (Some(uri), None) => Cow::Owned(read_uri(uri, self.base_dir)?),
                (None, None) => {
                    return Err(GltfError::Unsupported(format!("image {image} has no source")));
                }
            };
            texture::decode(&bytes, def.name.clone())?
        };
        let slot = self.textures.len();
        self.textures.push(decoded);
        self.texture_slots.insert(image, slot);
        Ok(slot)
    }

    fn view_bytes(&self, view: usize) -> Result<&[u8], GltfError> {
        let def = self
            .doc
            .buffer_views
            .get(view)
            .ok_or_else(|| GltfError::Unsupported(format!("missing buffer view {view}")))?;
        let buffer = self
            .buffers
            .get(def.buffer)
            .ok_or(GltfError::MissingBuffer(def.buffer))?;
        def.byte_offset
            .checked_add(def.byte_length)
            .and_then(|end| buffer.get(def.byte_offset..end))
            .ok_or_else(|| GltfError::Unsupported(format!("buffer view {view} out of bounds")))
    }

    /// Read an accessor as flattened f32 components, applying normalisation.
    fn read_floats(&self, index: usize) -> Result<(usize, Vec<f32>), GltfError> {
        let (acc, width, elements) = self.elements(index)?;
        let size = component_size(acc.component_type).unwrap_or(4);
        let mut out = Vec::with_capacity(acc.count.saturating_mul(width));
        for element in elements {
            for c in 0..width {
                let b = &element[c * size..(c + 1) * size];
                let raw = match acc.component_type {
                    FLOAT => f32::from_le_bytes([b[0], b[1], b[2], b[3]]),
                    UNSIGNED_BYTE if acc.normalized => b[0] as f32 / 255.0,
                    UNSIGNED_SHORT if acc.normalized => {
                        u16::from_le_bytes([b[0], b[1]]) as f32 / 65535.0
                    }
                    BYTE if acc.normalized => (b[0] as i8 as f32 / 127.0).max(-1.0),
                    SHORT if acc.normalized => {
                        (i16::from_le_bytes([b[0], b[1]]) as f32 / 32767.0).max(-1.0)
                    }
                    UNSIGNED_BYTE => b[0] as f32,
                    UNSIGNED_SHORT => u16::from_le_bytes([b[0], b[1]]) as f32,
                    BYTE => b[0] as i8 as f32,
                    SHORT => i16::from_le_bytes([b[0], b[1]]) as f32,
                    _ => {
                        return Err(GltfError::Accessor {
                            index,
                            reason: format!("component type {} is not a float type", acc.component_type),
                        });
                    }
                };
                out.push(raw);
            }
        }
        Ok((width, out))
    }

    fn read_vectors<const N: usize>(&self, index: usize) -> Result<Vec<[f32; N]>, GltfError> {
        let (width, flat) = self.read_floats(index)?;
        if width != N {
            return Err(GltfError::Accessor {
                index,
                reason: format!("expected {N} components, found {width}"),
            });
        }
        Ok(flat
            .chunks_exact(N)
            .map(|c| std::array::from_fn(|i| c[i]))
            .collect())
    }

    fn read_colors(&self, index: usize) -> Result<Vec<[f32; 4]>, GltfError> {
        let (width, flat) = self.read_floats(index)?;
        match width {
            3 => Ok(flat.chunks_exact(3).map(|c| [c[0], c[1], c[2], 1.0]).collect()),
            4 => Ok(flat.chunks_exact(4).map(|c| [c[0], c[1], c[2], c[3]]).collect()),
            other => Err(GltfError::Accessor {
                index,
                reason: format!("colour accessor has {other} components"),
            }),
        }
    }

    fn read_indices(&self, index: usize) -> Result<Vec<u32>, GltfError> {
        let (acc, width, elements) = self.elements(index)?;
        if width != 1 {
            return Err(GltfError::Accessor {
                index,
                reason: "index accessor must be SCALAR".into(),
            });
        }
        elements
            .map(|b| match acc.component_type {
                UNSIGNED_BYTE => Ok(b[0] as u32),
                UNSIGNED_SHORT => Ok(u16::from_le_bytes([b[0], b[1]]) as u32),
                UNSIGNED_INT => Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]])),
                other => Err(GltfError::Accessor {
                    index,
                    reason: format!("component type {other} is not an index type"),
                }),
            })
            .collect()
    }

    /// Resolve an accessor into an iterator over its raw element byte slices.
    fn elements(
        &self,
        index: usize,
    ) -> Result<(&AccessorDef, usize, impl Iterator<Item = &[u8]>), GltfError> {
        let err = |reason: String| GltfError::Accessor { index, reason };
        let acc = self
            .doc
            .accessors
            .get(index)
            .ok_or_else(|| err("missing".into()))?;
        if acc.sparse.is_some() {
            return Err(GltfError::Unsupported("sparse accessors".into()));
        }
        let width = components(&acc.kind).ok_or_else(|| err(format!("unknown type {}", acc.kind)))?;
        let size = component_size(acc.component_type)
            .ok_or_else(|| err(format!("unknown component type {}", acc.component_type)))?;
        let element_len = width * size;
        let view_index = acc
            .buffer_view
            .ok_or_else(|| GltfError::Unsupported("accessor without buffer view".into()))?;
        let stride = self
            .doc
            .buffer_views
            .get(view_index)
            .and_then(|v| v.byte_stride)
            .unwrap_or(element_len);
        if stride < element_len {
            return Err(err(format!("byte stride {stride} is shorter than element size {element_len}")));
        }
        let bytes = self.view_bytes(view_index)?;
        if acc.count > 0 {
            let needed = (acc.count - 1)
                .checked_mul(stride)
                .and_then(|n| n.checked_add(acc.byte_offset))
                .and_then(|n| n.checked_add(element_len))
                .ok_or_else(|| err(format!("count {} overflows the buffer view", acc.count)))?;
            if needed > bytes.len() {
                return Err(err(format!(
                    "needs {needed} bytes, buffer view has {}",
                    bytes.len()
                )));
            }
        }
        let base = acc.byte_offset;
        let iter = (0..acc.count).map(move |i| {
            let start = base + i * stride;
            &bytes[start..start + element_len]
        });
        Ok((acc, width, iter))
    }
}
