use glam::{Mat3, Mat4, Vec3};
use serde::Serialize;

/// Material parameters carried by an imported model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialDesc {
    pub name: Option<String>,
    pub base_color: [f32; 4],
    /// Index into [`Model::textures`].
    pub base_color_texture: Option<usize>,
}

impl Default for MaterialDesc {
    fn default() -> Self {
        Self {
            name: None,
            base_color: [0.8, 0.8, 0.8, 1.0],
            base_color_texture: None,
        }
    }
}

/// Decoded RGBA8 texture image.
#[derive(Clone, PartialEq)]
pub struct TextureData {
    pub name: Option<String>,
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl std::fmt::Debug for TextureData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureData")
            .field("name", &self.name)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Indexed triangle mesh with optional attribute streams.
///
/// Optional streams are either empty or exactly as long as `positions`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub name: Option<String>,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub colors: Vec<[f32; 4]>,
    pub indices: Vec<u32>,
    pub material: MaterialDesc,
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Bounds {
    pub fn center(&self) -> Vec3 {
        (Vec3::from(self.min) + Vec3::from(self.max)) * 0.5
    }

    fn union(self, other: Bounds) -> Bounds {
        Bounds {
            min: Vec3::from(self.min).min(Vec3::from(other.min)).into(),
            max: Vec3::from(self.max).max(Vec3::from(other.max)).into(),
        }
    }
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty()
    }

    pub fn has_uvs(&self) -> bool {
        !self.uvs.is_empty()
    }

    pub fn has_colors(&self) -> bool {
        !self.colors.is_empty()
    }

    /// Check the stream-length and index-range invariants.
    pub fn validate(&self) -> Result<(), String> {
        let n = self.positions.len();
        if n == 0 {
            return Err("mesh has no vertices".into());
        }
        for (label, len) in [
            ("normals", self.normals.len()),
            ("uvs", self.uvs.len()),
            ("colors", self.colors.len()),
        ] {
            if len != 0 && len != n {
                return Err(format!("{label} has {len} entries, expected {n}"));
            }
        }
        if self.indices.len() % 3 != 0 {
            return Err(format!(
                "index count {} is not a multiple of 3",
                self.indices.len()
            ));
        }
        if let Some(bad) = self.indices.iter().find(|&&i| i as usize >= n) {
            return Err(format!("index {bad} out of range for {n} vertices"));
        }
        Ok(())
    }

    pub fn bounds(&self) -> Option<Bounds> {
        let mut iter = self.positions.iter().map(|&p| Vec3::from(p));
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
        Some(Bounds {
            min: min.into(),
            max: max.into(),
        })
    }

    /// Fill `normals` with smooth, area-weighted vertex normals.
    pub fn compute_normals(&mut self) {
        let mut acc = vec![Vec3::ZERO; self.positions.len()];
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let pa = Vec3::from(self.positions[a]);
            let pb = Vec3::from(self.positions[b]);
            let pc = Vec3::from(self.positions[c]);
            // Cross product length is twice the area, which gives the weighting.
            let n = (pb - pa).cross(pc - pa);
            acc[a] += n;
            acc[b] += n;
            acc[c] += n;
        }
        self.normals = acc
            .into_iter()
            .map(|n| n.try_normalize().unwrap_or(Vec3::Y).into())
            .collect();
    }

    /// Bake a transform into positions and normals.
    pub fn transform(&mut self, matrix: Mat4) {
        if matrix == Mat4::IDENTITY {
            return;
        }
        for p in &mut self.positions {
            *p = matrix.transform_point3(Vec3::from(*p)).into();
        }
        let normal_matrix = Mat3::from_mat4(matrix).inverse().transpose();
        for n in &mut self.normals {
            *n = (normal_matrix * Vec3::from(*n))
                .try_normalize()
                .unwrap_or(Vec3::Y)
                .into();
        }
        // Mirroring transforms flip the winding.
        if matrix.determinant() < 0.0 {
            for tri in self.indices.chunks_exact_mut(3) {
                tri.swap(1, 2);
            }
        }
    }
}

/// A loaded model: one or more meshes sharing a texture table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    pub name: String,
    pub meshes: Vec<Mesh>,
    pub textures: Vec<TextureData>,
}

impl Model {
    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(Mesh::vertex_count).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(Mesh::triangle_count).sum()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.meshes
            .iter()
            .filter_map(Mesh::bounds)
            .reduce(Bounds::union)
    }

    /// Make `texture` the base colour texture of every mesh.
    pub fn override_texture(&mut self, texture: TextureData) {
        let slot = self.textures.len();
        self.textures.push(texture);
        for mesh in &mut self.meshes {
            mesh.material.base_color_texture = Some(slot);
        }
    }

    /// Texture referenced by a mesh's material, if any.
    pub fn texture_for(&self, mesh: &Mesh) -> Option<&TextureData> {
        mesh.material
            .base_color_texture
            .and_then(|i| self.textures.get(i))
    }
}
