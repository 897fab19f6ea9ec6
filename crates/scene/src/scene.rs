use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use modelsketch_assets::{AssetId, AssetLoader, AssetStore, ImportOptions, LoadEvent, Model, Ticket};
use modelsketch_common::{NodeId, Transform};

/// How a node's meshes are shaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shading {
    /// Flat grey, lit.
    Grey,
    /// Colour from the surface normal, unlit.
    Normals,
    /// Per-vertex colours, lit. Falls back to the material colour.
    VertexColor,
    /// Base colour texture, lit. Falls back to white.
    Textured,
    /// Whatever the model's own material says.
    #[default]
    Material,
}

impl Shading {
    pub const ALL: [Shading; 5] = [
        Shading::Grey,
        Shading::Normals,
        Shading::VertexColor,
        Shading::Textured,
        Shading::Material,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Shading::Grey => "grey",
            Shading::Normals => "normals",
            Shading::VertexColor => "vertex colour",
            Shading::Textured => "textured",
            Shading::Material => "material",
        }
    }
}

impl std::str::FromStr for Shading {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "grey" | "gray" => Ok(Shading::Grey),
            "normals" | "normal" => Ok(Shading::Normals),
            "vertex_color" | "vertex_colour" => Ok(Shading::VertexColor),
            "textured" | "texture" => Ok(Shading::Textured),
            "material" => Ok(Shading::Material),
            other => Err(format!("unknown shading `{other}`")),
        }
    }
}

/// A directional light positioned like a point but shining toward the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub color: [f32; 3],
    pub intensity: f32,
    pub position: Vec3,
}

impl DirectionalLight {
    /// Unit vector pointing from the surface toward the light.
    pub fn direction(&self) -> Vec3 {
        self.position.try_normalize().unwrap_or(Vec3::Y)
    }
}

/// Ambient plus one directional light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lighting {
    pub ambient_color: [f32; 3],
    pub ambient_intensity: f32,
    pub directional: DirectionalLight,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            ambient_color: [1.0, 1.0, 1.0],
            ambient_intensity: 0.3,
            directional: DirectionalLight {
                color: [1.0, 1.0, 1.0],
                intensity: 1.0,
                position: Vec3::new(1.0, 2.0, 3.0),
            },
        }
    }
}

/// Load state of a node's model.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeState {
    Loading(Ticket),
    Ready(AssetId),
    Failed(String),
}

/// A model placed in the scene.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub source: PathBuf,
    pub transform: Transform,
    pub shading: Shading,
    pub state: NodeState,
}

impl SceneNode {
    pub fn asset(&self) -> Option<AssetId> {
        match self.state {
            NodeState::Ready(id) => Some(id),
            _ => None,
        }
    }
}

/// What to load and where to put it.
#[derive(Debug, Clone, Default)]
pub struct ModelSpec {
    pub path: PathBuf,
    pub name: Option<String>,
    pub transform: Transform,
    pub shading: Shading,
    pub options: ImportOptions,
}

impl ModelSpec {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

/// Result of applying one finished load to the scene.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Ready { node: NodeId, asset: AssetId },
    Failed { node: NodeId, message: String },
    /// The node was removed before its load finished.
    Orphaned(Ticket),
}

/// The set of placed models, their assets and the scene lighting.
///
/// Uses BTreeMap so iteration order is stable between frames.
#[derive(Debug, Clone)]
pub struct Scene {
    nodes: BTreeMap<NodeId, SceneNode>,
    store: AssetStore,
    pub lighting: Lighting,
    pub background: [f32; 4],
    pub show_grid: bool,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            nodes: BTreeMap::new(),
            store: AssetStore::new(),
            lighting: Lighting::default(),
            background: [0.0, 0.0, 0.0, 1.0],
            show_grid: true,
        }
    }
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a model and start loading it. The node is not drawn until the
    /// load completes.
    pub fn add_model(&mut self, loader: &mut AssetLoader, spec: ModelSpec) -> NodeId {
        let ticket = loader.request(&spec.path, spec.options.clone());
        let name = spec.name.unwrap_or_else(|| {
            spec.path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "model".into())
        });
        let id = NodeId::new();
        tracing::info!(node = %id.short(), path = %spec.path.display(), "loading model");
        self.nodes.insert(
            id,
            SceneNode {
                name,
                source: spec.path,
                transform: spec.transform,
                shading: spec.shading,
                state: NodeState::Loading(ticket),
            },
        );
        id
    }

    /// Place an already-loaded model.
    pub fn add_loaded(
        &mut self,
        name: impl Into<String>,
        asset: AssetId,
        model: Arc<Model>,
        transform: Transform,
        shading: Shading,
    ) -> NodeId {
        self.store.insert(asset, model);
        let id = NodeId::new();
        self.nodes.insert(
            id,
            SceneNode {
                name: name.into(),
                source: PathBuf::new(),
                transform,
                shading,
                state: NodeState::Ready(asset),
            },
        );
        id
    }

    /// Apply finished background loads. Failures are logged and recorded on
    /// the node; nothing is retried.
    pub fn apply_loads(&mut self, events: Vec<LoadEvent>) -> Vec<LoadOutcome> {
        let mut outcomes = Vec::with_capacity(events.len());
        for event in events {
            let waiting = self
                .nodes
                .iter_mut()
                .find(|(_, n)| n.state == NodeState::Loading(event.ticket));
            let Some((&node_id, node)) = waiting else {
                tracing::debug!(ticket = event.ticket.0, "load finished for removed node");
                outcomes.push(LoadOutcome::Orphaned(event.ticket));
                continue;
            };
            match event.result {
                Ok((asset, model)) => {
                    self.store.insert(asset, model);
                    node.state = NodeState::Ready(asset);
                    outcomes.push(LoadOutcome::Ready {
                        node: node_id,
                        asset,
                    });
                }
                Err(e) => {
                    let message = e.to_string();
                    tracing::error!(path = %event.path.display(), "loading error: {message}");
                    node.state = NodeState::Failed(message.clone());
                    outcomes.push(LoadOutcome::Failed {
                        node: node_id,
                        message,
                    });
                }
            }
        }
        outcomes
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(&id)
    }

    pub fn remove(&mut self, id: NodeId) -> Option<SceneNode> {
        self.nodes.remove(&id)
    }

    pub fn nodes(&self) -> &BTreeMap<NodeId, SceneNode> {
        &self.nodes
    }

    pub fn model(&self, id: AssetId) -> Option<&Arc<Model>> {
        self.store.get(id)
    }

    pub fn store(&self) -> &AssetStore {
        &self.store
    }

    /// Nodes whose model has finished loading, with that model.
    pub fn ready_nodes(&self) -> impl Iterator<Item = (NodeId, &SceneNode, &Arc<Model>)> {
        self.nodes.iter().filter_map(|(id, node)| {
            let model = self.store.get(node.asset()?)?;
            Some((*id, node, model))
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn loading_count(&self) -> usize {
        self.nodes
            .values()
            .filter(|n| matches!(n.state, NodeState::Loading(_)))
            .count()
    }

    /// Override the shading of every node.
    pub fn set_shading_all(&mut self, shading: Shading) {
        for node in self.nodes.values_mut() {
            node.shading = shading;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelsketch_assets::AssetError;

    const TRIANGLE: &str = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";

    fn drain(scene: &mut Scene, loader: &mut AssetLoader) -> Vec<LoadOutcome> {
        let mut outcomes = Vec::new();
        while let Some(event) = loader.wait() {
            outcomes.extend(scene.apply_loads(vec![event]));
        }
        outcomes
    }

    #[test]
    fn node_is_hidden_until_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tri.obj");
        std::fs::write(&path, TRIANGLE).unwrap();

        let mut scene = Scene::new();
        let mut loader = AssetLoader::new();
        let id = scene.add_model(&mut loader, ModelSpec::new(&path));
        assert_eq!(scene.ready_nodes().count(), 0);
        assert_eq!(scene.loading_count(), 1);
        assert_eq!(scene.get(id).unwrap().name, "tri.obj");

        let outcomes = drain(&mut scene, &mut loader);
        assert!(matches!(outcomes[..], [LoadOutcome::Ready { node, .. }] if node == id));
        assert_eq!(scene.ready_nodes().count(), 1);
        assert_eq!(scene.loading_count(), 0);
    }

    #[test]
    fn failed_load_is_recorded_not_drawn() {
        let mut scene = Scene::new();
        let mut loader = AssetLoader::new();
        let id = scene.add_model(&mut loader, ModelSpec::new("nope/cube.glb"));
        let outcomes = drain(&mut scene, &mut loader);
        assert!(matches!(outcomes[..], [LoadOutcome::Failed { .. }]));
        assert!(matches!(scene.get(id).unwrap().state, NodeState::Failed(_)));
        assert_eq!(scene.ready_nodes().count(), 0);
    }

    #[test]
    fn removed_node_orphans_its_load() {
        let mut scene = Scene::new();
        let mut loader = AssetLoader::new();
        let id = scene.add_model(&mut loader, ModelSpec::new("nope/cube.glb"));
        scene.remove(id);
        let outcomes = drain(&mut scene, &mut loader);
        assert!(matches!(outcomes[..], [LoadOutcome::Orphaned(_)]));
        assert!(scene.is_empty());
    }

    #[test]
    fn apply_loads_matches_by_ticket() {
        let mut scene = Scene::new();
        let mut loader = AssetLoader::new();
        let a = scene.add_model(&mut loader, ModelSpec::new("a.obj"));
        let b = scene.add_model(&mut loader, ModelSpec::new("b.obj"));
        let NodeState::Loading(ticket_b) = scene.get(b).unwrap().state.clone() else {
            panic!("b should be loading");
        };
        let event = LoadEvent {
            ticket: ticket_b,
            path: "b.obj".into(),
            result: Err(AssetError::UnsupportedFormat("test".into())),
        };
        scene.apply_loads(vec![event]);
        assert!(matches!(scene.get(a).unwrap().state, NodeState::Loading(_)));
        assert!(matches!(scene.get(b).unwrap().state, NodeState::Failed(_)));
    }

    #[test]
    fn add_loaded_is_immediately_ready() {
        let mut scene = Scene::new();
        let model = Arc::new(Model::default());
        let id = scene.add_loaded("empty", AssetId(7), model, Transform::default(), Shading::Grey);
        assert_eq!(scene.get(id).unwrap().asset(), Some(AssetId(7)));
        assert_eq!(scene.ready_nodes().count(), 1);
    }

    #[test]
    fn shading_parses_loosely() {
        assert_eq!("Vertex-Colour".parse::<Shading>(), Ok(Shading::VertexColor));
        assert_eq!("gray".parse::<Shading>(), Ok(Shading::Grey));
        assert!("phong".parse::<Shading>().is_err());
    }

    #[test]
    fn set_shading_all_overrides() {
        let mut scene = Scene::new();
        let model = Arc::new(Model::default());
        scene.add_loaded("a", AssetId(1), model.clone(), Transform::default(), Shading::Grey);
        scene.add_loaded("b", AssetId(2), model, Transform::default(), Shading::Material);
        scene.set_shading_all(Shading::Normals);
        assert!(scene.nodes().values().all(|n| n.shading == Shading::Normals));
    }

    #[test]
    fn light_direction_is_normalised() {
        let light = Lighting::default().directional;
        assert!((light.direction().length() - 1.0).abs() < 1e-6);
    }
}
