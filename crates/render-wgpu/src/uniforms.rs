use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use modelsketch_assets::{MaterialDesc, Mesh};
use modelsketch_render::{FrameMatrices, normal_matrix};
use modelsketch_scene::{Lighting, Shading};

const GREY: [f32; 4] = [0.6, 0.6, 0.6, 1.0];
const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// Per-frame uniforms, bind group 0.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub(crate) struct Globals {
    pub view_proj: [[f32; 4]; 4],
    /// xyz: direction toward the light, w: intensity.
    pub light_dir: [f32; 4],
    pub light_color: [f32; 4],
    /// Ambient colour premultiplied by its intensity.
    pub ambient: [f32; 4],
}

impl Globals {
    pub fn new(frame: &FrameMatrices, lighting: &Lighting) -> Self {
        let dir = lighting.directional.direction();
        let [r, g, b] = lighting.directional.color;
        let ambient = Vec3::from(lighting.ambient_color) * lighting.ambient_intensity;
        Self {
            view_proj: frame.view_projection().to_cols_array_2d(),
            light_dir: [dir.x, dir.y, dir.z, lighting.directional.intensity],
            light_color: [r, g, b, 1.0],
            ambient: [ambient.x, ambient.y, ambient.z, 1.0],
        }
    }
}

/// Fragment shader branch, matching `mode.x` in the model shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub(crate) enum ShaderMode {
    Grey = 0,
    Normals = 1,
    VertexColor = 2,
    Textured = 3,
    Flat = 4,
}

/// How one mesh is drawn under a node's shading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct MeshShading {
    pub mode: ShaderMode,
    pub base_color: [f32; 4],
    /// Bind the mesh's own texture rather than the white fallback.
    pub use_texture: bool,
}

impl MeshShading {
    pub fn resolve(
        shading: Shading,
        material: &MaterialDesc,
        has_colors: bool,
        has_texture: bool,
    ) -> Self {
        let (mode, base_color, use_texture) = match shading {
            Shading::Grey => (ShaderMode::Grey, GREY, false),
            Shading::Normals => (ShaderMode::Normals, WHITE, false),
            Shading::VertexColor if has_colors => (ShaderMode::VertexColor, WHITE, false),
            Shading::VertexColor => (ShaderMode::Flat, material.base_color, false),
            Shading::Textured => (ShaderMode::Textured, WHITE, has_texture),
            Shading::Material if has_texture => (ShaderMode::Textured, material.base_color, true),
            Shading::Material if has_colors => {
                (ShaderMode::VertexColor, material.base_color, false)
            }
            Shading::Material => (ShaderMode::Flat, material.base_color, false),
        };
        Self {
            mode,
            base_color,
            use_texture,
        }
    }
}

/// Per-draw uniforms, bind group 1 at a dynamic offset.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub(crate) struct ModelUniforms {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 4],
    pub base_color: [f32; 4],
    pub mode: [u32; 4],
}

impl ModelUniforms {
    pub fn new(model: Mat4, shading: &MeshShading) -> Self {
        let normal = Mat4::from_mat3(normal_matrix(model));
        Self {
            model: model.to_cols_array_2d(),
            normal: normal.to_cols_array_2d(),
            base_color: shading.base_color,
            mode: [shading.mode as u32, 0, 0, 0],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub(crate) struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

/// Interleave a mesh's streams. Missing streams get neutral values.
pub(crate) fn vertices(mesh: &Mesh) -> Vec<Vertex> {
    mesh.positions
        .iter()
        .enumerate()
        .map(|(i, &position)| Vertex {
            position,
            normal: mesh.normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]),
            uv: mesh.uvs.get(i).copied().unwrap_or([0.0, 0.0]),
            color: mesh.colors.get(i).copied().unwrap_or(WHITE),
        })
        .collect()
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub(crate) struct GridVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

/// Grid floor line vertices on the XZ plane.
pub(crate) fn grid_mesh(half_extent: i32, spacing: f32) -> Vec<GridVertex> {
    let mut verts = Vec::new();
    let color = [0.4, 0.4, 0.4, 1.0];
    let axis = [0.7, 0.7, 0.7, 1.0];
    let extent = half_extent as f32 * spacing;

    for i in -half_extent..=half_extent {
        let offset = i as f32 * spacing;
        let color = if i == 0 { axis } else { color };
        // Lines along X
        verts.push(GridVertex {
            position: [-extent, 0.0, offset],
            color,
        });
        verts.push(GridVertex {
            position: [extent, 0.0, offset],
            color,
        });
        // Lines along Z
        verts.push(GridVertex {
            position: [offset, 0.0, -extent],
            color,
        });
        verts.push(GridVertex {
            position: [offset, 0.0, extent],
            color,
        });
    }
    verts
}

/// Smallest multiple of `align` that holds `size` bytes.
pub(crate) fn aligned_stride(size: u64, align: u64) -> u64 {
    size.div_ceil(align.max(1)) * align.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelsketch_render::ViewState;

    fn material() -> MaterialDesc {
        MaterialDesc {
            base_color: [1.0, 0.0, 0.0, 1.0],
            ..MaterialDesc::default()
        }
    }

    #[test]
    fn uniform_sizes_match_shader_layout() {
        assert_eq!(std::mem::size_of::<Globals>(), 112);
        assert_eq!(std::mem::size_of::<ModelUniforms>(), 160);
        assert_eq!(std::mem::size_of::<Vertex>(), 48);
    }

    #[test]
    fn material_prefers_texture_then_colors() {
        let m = material();
        let s = MeshShading::resolve(Shading::Material, &m, true, true);
        assert_eq!(s.mode, ShaderMode::Textured);
        assert!(s.use_texture);
        let s = MeshShading::resolve(Shading::Material, &m, true, false);
        assert_eq!(s.mode, ShaderMode::VertexColor);
        let s = MeshShading::resolve(Shading::Material, &m, false, false);
        assert_eq!(s.mode, ShaderMode::Flat);
        assert_eq!(s.base_color, [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn explicit_modes_fall_back() {
        let m = material();
        let s = MeshShading::resolve(Shading::VertexColor, &m, false, false);
        assert_eq!(s.mode, ShaderMode::Flat);
        let s = MeshShading::resolve(Shading::Textured, &m, false, false);
        assert_eq!(s.mode, ShaderMode::Textured);
        assert!(!s.use_texture);
        assert_eq!(s.base_color, WHITE);
        let s = MeshShading::resolve(Shading::Normals, &m, true, true);
        assert_eq!(s.mode, ShaderMode::Normals);
    }

    #[test]
    fn missing_streams_are_filled() {
        let mesh = Mesh {
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]],
            uvs: vec![[0.5, 0.5], [1.0, 1.0]],
            ..Mesh::default()
        };
        let v = vertices(&mesh);
        assert_eq!(v.len(), 2);
        assert_eq!(v[1].uv, [1.0, 1.0]);
        assert_eq!(v[0].normal, [0.0, 1.0, 0.0]);
        assert_eq!(v[0].color, WHITE);
    }

    #[test]
    fn globals_carry_light_and_view_projection() {
        let view = ViewState::default();
        let frame = view.frame(true);
        let g = Globals::new(&frame, &Lighting::default());
        assert_eq!(g.view_proj, frame.view_projection().to_cols_array_2d());
        assert_eq!(g.light_dir[3], 1.0);
        assert!((g.ambient[0] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn model_uniforms_scale_normals_inversely() {
        let shading = MeshShading::resolve(Shading::Grey, &material(), false, false);
        let u = ModelUniforms::new(Mat4::from_scale(Vec3::new(2.0, 2.0, 2.0)), &shading);
        assert!((u.normal[0][0] - 0.5).abs() < 1e-6);
        assert_eq!(u.mode[0], ShaderMode::Grey as u32);
    }

    #[test]
    fn grid_has_four_vertices_per_line_pair() {
        assert_eq!(grid_mesh(2, 1.0).len(), 5 * 4);
    }

    #[test]
    fn stride_rounds_up_to_alignment() {
        assert_eq!(aligned_stride(160, 256), 256);
        assert_eq!(aligned_stride(256, 256), 256);
        assert_eq!(aligned_stride(300, 256), 512);
    }
}
