use anyhow::Context;
use clap::{Parser, Subcommand};
use glam::Mat4;
use modelsketch_assets::{AssetId, Bounds, ImportOptions, MaterialDesc, Model, ObjOptions};
use modelsketch_render::{
    AspectMode, Camera, DebugTextRenderer, OrbitCamera, Projection, Renderer, ViewState,
};
use modelsketch_scene::SketchConfig;
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "modelsketch-cli", about = "CLI tool for model sketches")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Load a model and print mesh statistics
    Inspect {
        path: PathBuf,
        /// Uniform scale for OBJ positions
        #[arg(long, default_value_t = 1.0)]
        obj_scale: f32,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print projection and view matrices for an orbit camera
    Matrices {
        /// Vertical field of view in degrees
        #[arg(long, default_value_t = 45.0)]
        fov: f32,
        #[arg(long, default_value_t = 1.0)]
        aspect: f32,
        #[arg(long, default_value_t = 0.1)]
        near: f32,
        #[arg(long, default_value_t = 100.0)]
        far: f32,
        #[arg(long, default_value_t = 3.0)]
        radius: f32,
        /// Yaw in radians
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        theta: f32,
        /// Pitch in radians
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        phi: f32,
    },
    /// Load a sketch and print the text rendering of its scene
    Describe { sketch: PathBuf },
}

#[derive(Serialize)]
struct MeshReport<'a> {
    name: Option<&'a str>,
    vertices: usize,
    triangles: usize,
    normals: bool,
    uvs: bool,
    colors: bool,
    material: &'a MaterialDesc,
}

#[derive(Serialize)]
struct ModelReport<'a> {
    name: &'a str,
    asset: String,
    vertices: usize,
    triangles: usize,
    bounds: Option<Bounds>,
    textures: Vec<[u32; 2]>,
    meshes: Vec<MeshReport<'a>>,
}

impl<'a> ModelReport<'a> {
    fn new(asset: AssetId, model: &'a Model) -> Self {
        Self {
            name: &model.name,
            asset: asset.to_string(),
            vertices: model.vertex_count(),
            triangles: model.triangle_count(),
            bounds: model.bounds(),
            textures: model.textures.iter().map(|t| [t.width, t.height]).collect(),
            meshes: model
                .meshes
                .iter()
                .map(|m| MeshReport {
                    name: m.name.as_deref(),
                    vertices: m.vertex_count(),
                    triangles: m.triangle_count(),
                    normals: m.has_normals(),
                    uvs: m.has_uvs(),
                    colors: m.has_colors(),
                    material: &m.material,
                })
                .collect(),
        }
    }

    fn print(&self) {
        println!("Model: {} ({})", self.name, self.asset);
        println!("Vertices: {}  Triangles: {}", self.vertices, self.triangles);
        if let Some(b) = &self.bounds {
            let c = b.center();
            println!(
                "Bounds: min=({:.3}, {:.3}, {:.3}) max=({:.3}, {:.3}, {:.3}) center=({:.3}, {:.3}, {:.3})",
                b.min[0], b.min[1], b.min[2], b.max[0], b.max[1], b.max[2], c.x, c.y, c.z
            );
        }
        for [w, h] in &self.textures {
            println!("Texture: {w}x{h}");
        }
        for (i, m) in self.meshes.iter().enumerate() {
            let mut attrs = vec!["position"];
            if m.normals {
                attrs.push("normal");
            }
            if m.uvs {
                attrs.push("uv");
            }
            if m.colors {
                attrs.push("color");
            }
            println!(
                "  mesh {i} {}: {} vertices, {} triangles [{}] base_color={:?}",
                m.name.unwrap_or("-"),
                m.vertices,
                m.triangles,
                attrs.join(", "),
                m.material.base_color
            );
        }
    }
}

fn print_matrix(label: &str, m: Mat4) {
    println!("{label}:");
    let cols = m.to_cols_array_2d();
    for row in 0..4 {
        println!(
            "  [{:>10.5} {:>10.5} {:>10.5} {:>10.5}]",
            cols[0][row], cols[1][row], cols[2][row], cols[3][row]
        );
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("modelsketch-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("assets: {}", modelsketch_assets::crate_info());
            println!("scene: {}", modelsketch_scene::crate_info());
            println!("render: {}", modelsketch_render::crate_info());
            println!("input: {}", modelsketch_input::crate_info());
        }
        Commands::Inspect {
            path,
            obj_scale,
            json,
        } => {
            let options = ImportOptions {
                obj: ObjOptions {
                    scale: obj_scale,
                    ..ObjOptions::default()
                },
                texture: None,
            };
            let (asset, model) = modelsketch_assets::load_file(&path, &options)
                .with_context(|| format!("loading {}", path.display()))?;
            let report = ModelReport::new(asset, &model);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                report.print();
            }
        }
        Commands::Matrices {
            fov,
            aspect,
            near,
            far,
            radius,
            theta,
            phi,
        } => {
            let projection = Projection {
                fov_y_degrees: fov,
                aspect,
                near,
                far,
            };
            let matrix = projection.matrix()?;
            let mut orbit = OrbitCamera::default();
            orbit.set_radius(radius);
            orbit.set_theta(theta);
            orbit.set_phi(phi);
            let view = ViewState::new(Camera::Orbit(orbit), projection, AspectMode::Manual);

            let eye = view.camera.eye();
            println!("Eye: ({:.5}, {:.5}, {:.5})", eye.x, eye.y, eye.z);
            print_matrix("Projection", matrix);
            print_matrix("View", view.view_matrix());
            print_matrix("ViewProjection", view.frame(false).view_projection());
        }
        Commands::Describe { sketch } => {
            let config = SketchConfig::load(&sketch)
                .with_context(|| format!("reading sketch {}", sketch.display()))?;
            let mut loader = modelsketch_assets::AssetLoader::new();
            let (mut scene, _) = config.build_scene(&mut loader);
            while let Some(event) = loader.wait() {
                scene.apply_loads(vec![event]);
            }
            tracing::debug!(nodes = scene.len(), ready = scene.ready_nodes().count(), "sketch loaded");
            let mut view = ViewState::from_config(&config.camera, &config.projection);
            if view.aspect_mode() == AspectMode::Window {
                view.set_window_size(1280, 720);
            }
            print!("{}", DebugTextRenderer::new().render(&scene, &view));
        }
    }

    Ok(())
}
