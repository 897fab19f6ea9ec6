//! Wavefront OBJ parsing.
//!
//! Only geometry statements are read: `v`, `vt`, `vn` and `f`. Positions may
//! carry a trailing RGB triple (the common vertex-colour extension). Faces with
//! more than three corners are triangulated as fans around the first corner.

use std::collections::HashMap;

use crate::mesh::Mesh;

/// Options applied while parsing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjOptions {
    /// Uniform scale applied to every position.
    pub scale: f32,
    /// Compute smooth normals when the file carries none.
    pub generate_normals: bool,
}

impl Default for ObjOptions {
    fn default() -> Self {
        Self {
            scale: 1.0,
            generate_normals: true,
        }
    }
}

/// What went wrong on a given line.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ObjErrorKind {
    #[error("expected {expected} numbers after `{keyword}`, found {found}")]
    MissingComponents {
        keyword: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("invalid number `{0}`")]
    InvalidNumber(String),
    #[error("invalid face corner `{0}`")]
    InvalidCorner(String),
    #[error("face needs at least 3 corners, found {0}")]
    DegenerateFace(usize),
    #[error("{kind} index {index} out of range ({len} defined)")]
    IndexOutOfRange {
        kind: &'static str,
        index: i64,
        len: usize,
    },
}

/// OBJ parse error with its 1-based line number.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ObjError {
    #[error("line {line}: {kind}")]
    Line { line: usize, kind: ObjErrorKind },
    #[error("no faces found")]
    Empty,
}

/// A face corner: indices into the position, uv and normal pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Corner {
    v: usize,
    vt: Option<usize>,
    vn: Option<usize>,
}

#[derive(Default)]
struct Pools {
    positions: Vec<[f32; 3]>,
    colors: Vec<Option<[f32; 3]>>,
    uvs: Vec<[f32; 2]>,
    normals: Vec<[f32; 3]>,
}

/// Parse OBJ text into a single mesh.
pub fn parse(text: &str, options: &ObjOptions) -> Result<Mesh, ObjError> {
    let mut pools = Pools::default();
    let mut faces: Vec<Vec<Corner>> = Vec::new();
    let mut name = None;

    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        let at = |kind| ObjError::Line {
            line: line_no,
            kind,
        };
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let Some(keyword) = parts.next() else {
            continue;
        };
        let rest: Vec<&str> = parts.collect();
        match keyword {
            "v" => {
                let values = parse_floats(&rest, "v", 3).map_err(at)?;
                let s = options.scale;
                pools
                    .positions
                    .push([values[0] * s, values[1] * s, values[2] * s]);
                pools.colors.push(if values.len() >= 6 {
                    Some([values[3], values[4], values[5]])
                } else {
                    None
                });
            }
            "vt" => {
                let values = parse_floats(&rest, "vt", 2).map_err(at)?;
                pools.uvs.push([values[0], values[1]]);
            }
            "vn" => {
                let values = parse_floats(&rest, "vn", 3).map_err(at)?;
                pools.normals.push([values[0], values[1], values[2]]);
            }
            "f" => {
                if rest.len() < 3 {
                    return Err(at(ObjErrorKind::DegenerateFace(rest.len())));
                }
                let corners = rest
                    .iter()
                    .map(|c| parse_corner(c, &pools))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(at)?;
                faces.push(corners);
            }
            "o" | "g" => {
                if name.is_none() && !rest.is_empty() {
                    name = Some(rest.join(" "));
                }
            }
            "s" | "usemtl" | "mtllib" | "l" | "p" => {}
            other => {
                tracing::debug!(line = line_no, keyword = other, "ignoring OBJ statement");
            }
        }
    }

    if faces.is_empty() {
        return Err(ObjError::Empty);
    }

    let mesh = build_mesh(name, &pools, &faces, options);
    tracing::debug!(
        vertices = mesh.vertex_count(),
        triangles = mesh.triangle_count(),
        "parsed OBJ"
    );
    Ok(mesh)
}

fn build_mesh(
    name: Option<String>,
    pools: &Pools,
    faces: &[Vec<Corner>],
    options: &ObjOptions,
) -> Mesh {
    // A stream is kept only if every corner references it; OBJ allows mixing.
    let all_corners = || faces.iter().flatten();
    let with_uvs = all_corners().all(|c| c.vt.is_some());
    let with_normals = all_corners().all(|c| c.vn.is_some());
    let with_colors = pools.colors.iter().all(Option::is_some);

    let mut mesh = Mesh {
        name,
        ..Mesh::default()
    };
    let mut unified: HashMap<Corner, u32> = HashMap::new();

    for face in faces {
        let mut ids = Vec::with_capacity(face.len());
        for corner in face {
            let id = *unified.entry(*corner).or_insert_with(|| {
                let id = mesh.positions.len() as u32;
                mesh.positions.push(pools.positions[corner.v]);
                if with_uvs {
                    if let Some(vt) = corner.vt {
                        mesh.uvs.push(pools.uvs[vt]);
                    }
                }
                if with_normals {
                    if let Some(vn) = corner.vn {
                        mesh.normals.push(pools.normals[vn]);
                    }
                }
                if with_colors {
                    if let Some([r, g, b]) = pools.colors[corner.v] {
                        mesh.colors.push([r, g, b, 1.0]);
                    }
                }
                id
            });
            ids.push(id);
        }
        for k in 1..ids.len() - 1 {
            mesh.indices.extend_from_slice(&[ids[0], ids[k], ids[k + 1]]);
        }
    }

    if mesh.normals.is_empty() && options.generate_normals {
        mesh.compute_normals();
    }
    mesh
}

fn parse_floats(
    parts: &[&str],
    keyword: &'static str,
    expected: usize,
) -> Result<Vec<f32>, ObjErrorKind> {
    if parts.len() < expected {
        return Err(ObjErrorKind::MissingComponents {
            keyword,
            expected,
            found: parts.len(),
        });
    }
    parts
        .iter()
        .map(|p| {
            p.parse::<f32>()
                .map_err(|_| ObjErrorKind::InvalidNumber((*p).to_string()))
        })
        .collect()
}

fn parse_corner(token: &str, pools: &Pools) -> Result<Corner, ObjErrorKind> {
    let mut fields = token.split('/');
    let v = match fields.next() {
        Some(s) if !s.is_empty() => resolve(s, "position", pools.positions.len(), token)?,
        _ => return Err(ObjErrorKind::InvalidCorner(token.to_string())),
    };
    let vt = match fields.next() {
        Some(s) if !s.is_empty() => Some(resolve(s, "texcoord", pools.uvs.len(), token)?),
        _ => None,
    };
    let vn = match fields.next() {
        Some(s) if !s.is_empty() => Some(resolve(s, "normal", pools.normals.len(), token)?),
        _ => None,
    };
    if fields.next().is_some() {
        return Err(ObjErrorKind::InvalidCorner(token.to_string()));
    }
    Ok(Corner { v, vt, vn })
}

/// Resolve a 1-based or negative (relative) OBJ index to a 0-based one.
fn resolve(s: &str, kind: &'static str, len: usize, token: &str) -> Result<usize, ObjErrorKind> {
    let index: i64 = s
        .parse()
        .map_err(|_| ObjErrorKind::InvalidCorner(token.to_string()))?;
    let resolved = if index > 0 {
        index - 1
    } else {
        len as i64 + index
    };
    if index == 0 || resolved < 0 || resolved >= len as i64 {
        return Err(ObjErrorKind::IndexOutOfRange { kind, index, len });
    }
    Ok(resolved as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE: &str = "\
# a single triangle
v 0 0 0
v 1 0 0
v 0 1 0
f 1 2 3
";

    #[test]
    fn parses_plain_triangle() {
        let mesh = parse(TRIANGLE, &ObjOptions::default()).unwrap();
        assert_eq!(mesh.positions.len(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        // normals generated
        assert_eq!(mesh.normals.len(), 3);
        assert!(mesh.uvs.is_empty());
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn scale_applies_to_positions_only() {
        let text = "v 10 20 30\nv 0 0 0\nv 0 10 0\nvn 0 0 5\nf 1//1 2//1 3//1\n";
        let options = ObjOptions {
            scale: 0.1,
            ..ObjOptions::default()
        };
        let mesh = parse(text, &options).unwrap();
        assert_eq!(mesh.positions[0], [1.0, 2.0, 3.0]);
        assert_eq!(mesh.normals[0], [0.0, 0.0, 5.0]);
    }

    #[test]
    fn quad_is_fan_triangulated() {
        let text = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        let mesh = parse(text, &ObjOptions::default()).unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn shared_corners_are_deduplicated() {
        let text = "\
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
f 1/1 2/2 3/3
f 3/3 4/4 1/1
";
        let mesh = parse(text, &ObjOptions::default()).unwrap();
        assert_eq!(mesh.positions.len(), 4);
        assert_eq!(mesh.uvs.len(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 2, 3, 0]);
    }

    #[test]
    fn same_position_with_different_normals_splits() {
        let text = "\
v 0 0 0
v 1 0 0
v 0 1 0
vn 0 0 1
vn 0 0 -1
f 1//1 2//1 3//1
f 1//2 3//2 2//2
";
        let mesh = parse(text, &ObjOptions::default()).unwrap();
        assert_eq!(mesh.positions.len(), 6);
        assert_eq!(mesh.normals[3], [0.0, 0.0, -1.0]);
    }

    #[test]
    fn full_corners_carry_position_uv_and_normal() {
        let text = "\
v 0 0 0
v 1 0 0
v 0 1 0
vt 0 0
vt 1 0
vt 0 1 0
vn 0 0 1
f 1/1/1 2/2/1 3/3/1
";
        let mesh = parse(text, &ObjOptions::default()).unwrap();
        assert_eq!(mesh.positions, vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        assert_eq!(mesh.uvs, vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]);
        assert_eq!(mesh.normals, vec![[0.0, 0.0, 1.0]; 3]);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
    }

    #[test]
    fn negative_indices_are_relative() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let mesh = parse(text, &ObjOptions::default()).unwrap();
        assert_eq!(mesh.positions[2], [0.0, 1.0, 0.0]);
    }

    #[test]
    fn vertex_colors_are_read() {
        let text = "v 0 0 0 1 0 0\nv 1 0 0 0 1 0\nv 0 1 0 0 0 1\nf 1 2 3\n";
        let mesh = parse(text, &ObjOptions::default()).unwrap();
        assert_eq!(mesh.colors[1], [0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn object_name_is_kept() {
        let text = format!("o Suzanne\n{TRIANGLE}");
        let mesh = parse(&text, &ObjOptions::default()).unwrap();
        assert_eq!(mesh.name.as_deref(), Some("Suzanne"));
    }

    #[test]
    fn out_of_range_index_reports_line() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\n\nf 1 2 4\n";
        let err = parse(text, &ObjOptions::default()).unwrap_err();
        assert_eq!(
            err,
            ObjError::Line {
                line: 5,
                kind: ObjErrorKind::IndexOutOfRange {
                    kind: "position",
                    index: 4,
                    len: 3,
                },
            }
        );
    }

    #[test]
    fn bad_number_is_an_error() {
        let err = parse("v 0 zero 0\n", &ObjOptions::default()).unwrap_err();
        assert!(err.to_string().contains("line 1"));
        assert!(err.to_string().contains("zero"));
    }

    #[test]
    fn two_corner_face_is_an_error() {
        let err = parse("v 0 0 0\nv 1 0 0\nf 1 2\n", &ObjOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            ObjError::Line {
                kind: ObjErrorKind::DegenerateFace(2),
                ..
            }
        ));
    }

    #[test]
    fn file_without_faces_is_empty() {
        let err = parse("v 0 0 0\n", &ObjOptions::default()).unwrap_err();
        assert_eq!(err, ObjError::Empty);
    }
}
