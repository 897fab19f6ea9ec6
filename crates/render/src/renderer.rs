use std::fmt::Write;

use modelsketch_scene::{NodeState, Scene};

use crate::view::ViewState;

/// Renderer-agnostic interface. All renderers implement this trait.
///
/// A renderer reads the scene and the view and produces output. It never
/// mutates either; input handling owns the view and the app owns the scene.
pub trait Renderer {
    /// The output type produced by this renderer.
    type Output;

    /// Render one frame of the scene as seen through the view.
    fn render(&mut self, scene: &Scene, view: &ViewState) -> Self::Output;
}

/// Text renderer for the CLI, logs and tests.
///
/// Lists camera parameters, the projection matrix and every node with its
/// load state. Nodes that are still loading or failed are listed but not
/// counted as drawn.
#[derive(Debug, Default)]
pub struct DebugTextRenderer {
    frames: u64,
}

impl DebugTextRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Renderer for DebugTextRenderer {
    type Output = String;

    fn render(&mut self, scene: &Scene, view: &ViewState) -> String {
        self.frames += 1;
        let mut out = String::new();
        let projection = view.projection();
        let eye = view.camera.eye();
        let target = view.camera.target();
        let drawn = scene.ready_nodes().count();

        let _ = writeln!(out, "=== Frame {} ===", self.frames);
        let _ = writeln!(
            out,
            "Camera: eye=({:.2}, {:.2}, {:.2}) target=({:.2}, {:.2}, {:.2})",
            eye.x, eye.y, eye.z, target.x, target.y, target.z
        );
        let _ = writeln!(
            out,
            "Projection: fov={:.1} aspect={:.3} near={} far={}",
            projection.fov_y_degrees, projection.aspect, projection.near, projection.far
        );
        if let Some(err) = view.projection_error() {
            let _ = writeln!(out, "  (invalid: {err}; using previous matrix)");
        }
        let cols = view.projection_matrix().to_cols_array_2d();
        for row in 0..4 {
            let _ = writeln!(
                out,
                "  [{:>9.4} {:>9.4} {:>9.4} {:>9.4}]",
                cols[0][row], cols[1][row], cols[2][row], cols[3][row]
            );
        }
        let _ = writeln!(out, "Nodes: {} ({} drawn)", scene.len(), drawn);

        for (id, node) in scene.nodes() {
            let p = node.transform.position;
            let status = match &node.state {
                NodeState::Loading(_) => "loading".to_string(),
                NodeState::Failed(msg) => format!("failed: {msg}"),
                NodeState::Ready(asset) => match scene.model(*asset) {
                    Some(model) => format!(
                        "{} meshes, {} triangles",
                        model.meshes.len(),
                        model.triangle_count()
                    ),
                    None => "missing asset".to_string(),
                },
            };
            let _ = writeln!(
                out,
                "  [{}] {} pos=({:.2}, {:.2}, {:.2}) shading={} {}",
                id.short(),
                node.name,
                p.x,
                p.y,
                p.z,
                node.shading.label(),
                status
            );
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::CameraParam;
    use glam::Vec3;
    use modelsketch_assets::{AssetId, AssetLoader, Mesh, Model};
    use modelsketch_common::Transform;
    use modelsketch_scene::{ModelSpec, Shading};
    use std::sync::Arc;

    fn triangle_model() -> Arc<Model> {
        Arc::new(Model {
            name: "tri".into(),
            meshes: vec![Mesh {
                positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
                indices: vec![0, 1, 2],
                ..Mesh::default()
            }],
            textures: Vec::new(),
        })
    }

    #[test]
    fn empty_scene() {
        let mut renderer = DebugTextRenderer::new();
        let output = renderer.render(&Scene::new(), &ViewState::default());

        assert!(output.contains("Frame 1"));
        assert!(output.contains("Nodes: 0 (0 drawn)"));
        assert!(output.contains("fov=45.0"));
        assert_eq!(renderer.frames(), 1);
    }

    #[test]
    fn lists_loaded_and_pending_nodes() {
        let mut scene = Scene::new();
        scene.add_loaded(
            "tri",
            AssetId(7),
            triangle_model(),
            Transform::from_position(Vec3::new(1.0, 2.0, 3.0)),
            Shading::Normals,
        );
        let mut loader = AssetLoader::new();
        scene.add_model(&mut loader, ModelSpec::new("/nonexistent/thing.obj"));

        let mut renderer = DebugTextRenderer::new();
        let output = renderer.render(&scene, &ViewState::default());

        assert!(output.contains("Nodes: 2 (1 drawn)"));
        assert!(output.contains("pos=(1.00, 2.00, 3.00)"));
        assert!(output.contains("1 meshes, 1 triangles"));
        assert!(output.contains("loading"));
    }

    #[test]
    fn reports_invalid_projection() {
        let mut view = ViewState::default();
        view.set_param(CameraParam::Near, 8.0);
        view.set_param(CameraParam::Far, 2.0);
        let output = DebugTextRenderer::new().render(&Scene::new(), &view);
        assert!(output.contains("using previous matrix"));
    }
}
