use anyhow::{Context, Result};
use clap::Parser;
use egui::Context as EguiContext;
use modelsketch_assets::{AssetLoader, ImportOptions, ObjOptions};
use modelsketch_common::NodeId;
use modelsketch_input::{Action, DragTracker, Handled, InputMap, Key, apply};
use modelsketch_render::{AspectMode, CameraParam, ViewState};
use modelsketch_render_wgpu::WgpuRenderer;
use modelsketch_scene::{LoadOutcome, ModelSpec, NodeState, Scene, Shading, SketchConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

#[derive(Parser)]
#[command(name = "modelsketch-desktop", about = "Interactive model viewer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Sketch file describing the scene
    #[arg(long)]
    sketch: Option<PathBuf>,

    /// Shading applied to every model (grey, normals, vertex-color, textured, material)
    #[arg(long)]
    shading: Option<Shading>,

    /// Uniform scale for OBJ positions
    #[arg(long, default_value_t = 1.0)]
    obj_scale: f32,

    /// Model files to load (.obj, .gltf, .glb)
    models: Vec<PathBuf>,
}

/// Application state.
struct AppState {
    scene: Scene,
    loader: AssetLoader,
    view: ViewState,
    input: InputMap,
    drag: DragTracker,
    shading: Option<Shading>,
    obj_scale: f32,
    show_controls: bool,
    model_path: String,
    status: Option<String>,
}

impl AppState {
    fn new(cli: &Cli) -> Result<Self> {
        let mut loader = AssetLoader::new();
        let (scene, view) = match &cli.sketch {
            Some(path) => {
                let config = SketchConfig::load(path)
                    .with_context(|| format!("reading sketch {}", path.display()))?;
                let (scene, _) = config.build_scene(&mut loader);
                let view = ViewState::from_config(&config.camera, &config.projection);
                (scene, view)
            }
            None => (Scene::new(), ViewState::default()),
        };

        let mut state = Self {
            scene,
            loader,
            view,
            input: InputMap::default(),
            drag: DragTracker::default(),
            shading: cli.shading,
            obj_scale: cli.obj_scale,
            show_controls: true,
            model_path: String::new(),
            status: None,
        };
        if let Some(shading) = cli.shading {
            state.scene.set_shading_all(shading);
        }
        for path in &cli.models {
            state.load_model(path.clone());
        }
        Ok(state)
    }

    fn load_model(&mut self, path: PathBuf) {
        let spec = ModelSpec {
            shading: self.shading.unwrap_or_default(),
            options: ImportOptions {
                obj: ObjOptions {
                    scale: self.obj_scale,
                    ..ObjOptions::default()
                },
                texture: None,
            },
            ..ModelSpec::new(path)
        };
        self.scene.add_model(&mut self.loader, spec);
    }

    fn handle_action(&mut self, action: Action) {
        if apply(&action, &mut self.view) != Handled::App {
            return;
        }
        match action {
            Action::ToggleControls => self.show_controls = !self.show_controls,
            Action::LoadModel(path) => self.load_model(path),
            Action::SetShading(shading) => {
                self.shading = Some(shading);
                self.scene.set_shading_all(shading);
            }
            _ => {}
        }
    }

    /// Apply finished background loads.
    fn update(&mut self) {
        let events = self.loader.poll();
        if events.is_empty() {
            return;
        }
        for outcome in self.scene.apply_loads(events) {
            match outcome {
                LoadOutcome::Ready { node, .. } => {
                    if let Some(n) = self.scene.get(node) {
                        self.status = Some(format!("loaded {}", n.name));
                    }
                }
                LoadOutcome::Failed { message, .. } => {
                    self.status = Some(format!("loading error: {message}"));
                }
                LoadOutcome::Orphaned(_) => {}
            }
        }
    }

    fn handle_key(&mut self, key: KeyCode) {
        let key = match key {
            KeyCode::ArrowLeft => Key::ArrowLeft,
            KeyCode::ArrowRight => Key::ArrowRight,
            KeyCode::ArrowUp => Key::ArrowUp,
            KeyCode::ArrowDown => Key::ArrowDown,
            KeyCode::PageUp => Key::PageUp,
            KeyCode::PageDown => Key::PageDown,
            KeyCode::Equal | KeyCode::NumpadAdd => Key::Plus,
            KeyCode::Minus | KeyCode::NumpadSubtract => Key::Minus,
            KeyCode::KeyR => Key::R,
            KeyCode::F1 => Key::F1,
            _ => Key::Other,
        };
        self.handle_action(self.input.key(key));
    }

    fn draw_ui(&mut self, ctx: &EguiContext) {
        if !self.show_controls {
            return;
        }

        let mut actions = Vec::new();
        let mut remove: Option<NodeId> = None;

        egui::SidePanel::left("controls")
            .default_width(280.0)
            .show(ctx, |ui| {
                ui.heading("Model Sketch");
                ui.separator();

                for param in CameraParam::ALL {
                    let mut value = self.view.param(param);
                    let slider = egui::Slider::new(&mut value, param.range())
                        .text(param.label())
                        .logarithmic(matches!(param, CameraParam::Far | CameraParam::Radius));
                    if ui.add(slider).changed() {
                        actions.push(Action::SetParam(param, value));
                    }
                }

                let mut follow = self.view.aspect_mode() == AspectMode::Window;
                if ui.checkbox(&mut follow, "aspect follows window").changed() {
                    let mode = if follow {
                        AspectMode::Window
                    } else {
                        AspectMode::Manual
                    };
                    actions.push(Action::SetAspectMode(mode));
                }
                if let Some(err) = self.view.projection_error() {
                    ui.colored_label(egui::Color32::LIGHT_RED, format!("{err}"));
                }
                if ui.button("Reset view (R)").clicked() {
                    actions.push(Action::ResetView);
                }

                ui.separator();
                ui.heading("Models");
                let selected = self.shading.map_or("per model", |s| s.label());
                egui::ComboBox::from_label("shading")
                    .selected_text(selected)
                    .show_ui(ui, |ui| {
                        for shading in Shading::ALL {
                            if ui
                                .selectable_label(self.shading == Some(shading), shading.label())
                                .clicked()
                            {
                                actions.push(Action::SetShading(shading));
                            }
                        }
                    });

                ui.horizontal(|ui| {
                    ui.text_edit_singleline(&mut self.model_path);
                    if ui.button("Load").clicked() && !self.model_path.trim().is_empty() {
                        actions.push(Action::LoadModel(PathBuf::from(self.model_path.trim())));
                    }
                });

                for (id, node) in self.scene.nodes() {
                    ui.horizontal(|ui| {
                        let status = match &node.state {
                            NodeState::Loading(_) => "loading".to_string(),
                            NodeState::Ready(_) => "ready".to_string(),
                            NodeState::Failed(msg) => format!("failed: {msg}"),
                        };
                        ui.label(format!("{} ({status})", node.name));
                        if ui.small_button("x").clicked() {
                            remove = Some(*id);
                        }
                    });
                }
                if let Some(status) = &self.status {
                    ui.small(status);
                }

                ui.separator();
                ui.small("F1: Toggle Panel | LMB drag: Orbit | Wheel/PgUp/PgDn: Zoom | +/-: FOV");
            });

        if let Some(id) = remove {
            if let Some(node) = self.scene.remove(id) {
                tracing::info!(node = %id.short(), name = %node.name, "node removed");
            }
        }
        for action in actions {
            self.handle_action(action);
        }
    }
}

/// Window and GPU resources, created once the event loop is running.
struct Gpu {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    renderer: WgpuRenderer,
    egui_winit: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

impl Gpu {
    fn new(event_loop: &ActiveEventLoop, egui_ctx: &EguiContext) -> Result<Self> {
        let attrs = Window::default_attributes()
            .with_title("Model Sketch")
            .with_inner_size(PhysicalSize::new(1280u32, 720));
        let window = Arc::new(event_loop.create_window(attrs).context("create window")?);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("create surface")?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("no compatible GPU adapter")?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("modelsketch_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .context("create device")?;

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .context("surface reports no formats")?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let renderer =
            WgpuRenderer::new(&device, &queue, surface_format, config.width, config.height);

        let egui_winit = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(&device, surface_format, None, 1, false);

        tracing::info!(
            "GPU initialized with {} backend",
            adapter.get_info().backend.to_str()
        );

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            renderer,
            egui_winit,
            egui_renderer,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.config.width = width.max(1);
        self.config.height = height.max(1);
        self.surface.configure(&self.device, &self.config);
        self.renderer
            .resize(&self.device, self.config.width, self.config.height);
    }
}

struct GpuApp {
    state: AppState,
    gpu: Option<Gpu>,
    egui_ctx: EguiContext,
    error: Option<anyhow::Error>,
}

impl GpuApp {
    fn new(state: AppState) -> Self {
        Self {
            state,
            gpu: None,
            egui_ctx: EguiContext::default(),
            error: None,
        }
    }

    fn redraw(&mut self) {
        self.state.update();

        let Some(gpu) = &mut self.gpu else {
            return;
        };

        let output = match gpu.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu.surface.configure(&gpu.device, &gpu.config);
                return;
            }
            Err(e) => {
                tracing::error!("surface error: {e}");
                return;
            }
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        gpu.renderer.render(
            &gpu.device,
            &gpu.queue,
            &view,
            &self.state.scene,
            &self.state.view,
        );

        let raw_input = gpu.egui_winit.take_egui_input(&gpu.window);
        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            self.state.draw_ui(ctx);
        });

        gpu.egui_winit
            .handle_platform_output(&gpu.window, full_output.platform_output);

        let paint_jobs = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [gpu.config.width, gpu.config.height],
            pixels_per_point: full_output.pixels_per_point,
        };

        for (id, image_delta) in &full_output.textures_delta.set {
            gpu.egui_renderer
                .update_texture(&gpu.device, &gpu.queue, *id, image_delta);
        }
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("egui_encoder"),
            });
        gpu.egui_renderer.update_buffers(
            &gpu.device,
            &gpu.queue,
            &mut encoder,
            &paint_jobs,
            &screen_descriptor,
        );
        {
            let mut pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    ..Default::default()
                })
                .forget_lifetime();
            gpu.egui_renderer
                .render(&mut pass, &paint_jobs, &screen_descriptor);
        }
        gpu.queue.submit(std::iter::once(encoder.finish()));
        for id in &full_output.textures_delta.free {
            gpu.egui_renderer.free_texture(id);
        }

        output.present();
        gpu.window.request_redraw();
    }
}

impl ApplicationHandler for GpuApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gpu.is_some() {
            return;
        }
        match Gpu::new(event_loop, &self.egui_ctx) {
            Ok(gpu) => {
                self.state
                    .view
                    .set_window_size(gpu.config.width, gpu.config.height);
                self.gpu = Some(gpu);
            }
            Err(e) => {
                tracing::error!("failed to initialise graphics: {e:#}");
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        // Releases always end a drag, even over the panel.
        if let WindowEvent::MouseInput {
            state: ElementState::Released,
            button: MouseButton::Left,
            ..
        } = event
        {
            self.state.drag.release();
        }

        if let Some(gpu) = &mut self.gpu {
            let response = gpu.egui_winit.on_window_event(&gpu.window, &event);
            if response.consumed {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Some(gpu) = &mut self.gpu {
                    gpu.resize(new_size.width, new_size.height);
                    self.state
                        .view
                        .set_window_size(gpu.config.width, gpu.config.height);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                self.state.handle_key(key);
            }
            WindowEvent::MouseInput {
                button: MouseButton::Left,
                state: ElementState::Pressed,
                ..
            } => {
                self.state.drag.press();
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let Some((dx, dy)) = self.state.drag.moved(position.x, position.y) {
                    let action = self.state.input.drag(dx, dy);
                    self.state.handle_action(action);
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(p) => (p.y / 40.0) as f32,
                };
                let action = self.state.input.wheel(lines);
                self.state.handle_action(action);
            }
            WindowEvent::RedrawRequested => {
                self.redraw();
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(gpu) = &self.gpu {
            gpu.window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    tracing::info!("modelsketch-desktop starting");

    let state = AppState::new(&cli)?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = GpuApp::new(state);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
