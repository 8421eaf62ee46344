use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use glam::Vec2;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::canvas::{Canvas, LineCanvas};
use crate::config::SynapseOptions;
use crate::error::SynapseError;
use crate::models::{LineVertex, ViewportUniform};
use crate::scheduler::{Clock, SystemClock};
use crate::synapse::{SizeSource, SynapseBg};

const LINES_WGSL: &str = include_str!("./shaders/lines.wgsl");
const INITIAL_VERTEX_CAPACITY: usize = 4096;

/// Sizes the layers from the window, or from the canvas' parent element and the
/// browser viewport on the web.
pub struct WindowSizer {
    window: Arc<Window>,
}

impl WindowSizer {
    pub fn new(window: Arc<Window>) -> Self {
        Self { window }
    }

    #[cfg(target_arch = "wasm32")]
    fn parent_rect(&self) -> Option<web_sys::DomRect> {
        use winit::platform::web::WindowExtWebSys;

        let canvas = self.window.canvas()?;
        Some(canvas.parent_element()?.get_bounding_client_rect())
    }
}

#[cfg(target_arch = "wasm32")]
impl SizeSource for WindowSizer {
    fn container_size(&self) -> Option<Vec2> {
        let rect = self.parent_rect()?;
        Some(Vec2::new(rect.width() as f32, rect.height() as f32))
    }

    fn viewport_size(&self) -> Vec2 {
        let page = web_sys::window().and_then(|w| {
            let width = w.inner_width().ok()?.as_f64()?;
            let height = w.inner_height().ok()?.as_f64()?;
            Some(Vec2::new(width as f32, height as f32))
        });
        page.unwrap_or_else(|| {
            let size = self.window.inner_size().to_logical::<f32>(self.window.scale_factor());
            Vec2::new(size.width, size.height)
        })
    }

    fn container_top(&self) -> f32 {
        self.parent_rect().map_or(0.0, |rect| rect.top() as f32)
    }

    fn apply(&self, top: f32, size: Vec2) {
        use winit::platform::web::WindowExtWebSys;

        if let Some(canvas) = self.window.canvas() {
            if canvas.style().set_property("top", &format!("{top}px")).is_err() {
                log::warn!("Couldn't set canvas top offset.");
            }
        }
        // winit resizes the canvas element; the surface follows on the next Resized event.
        let _ = self
            .window
            .request_inner_size(winit::dpi::LogicalSize::new(size.x, size.y));
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl SizeSource for WindowSizer {
    fn container_size(&self) -> Option<Vec2> {
        None
    }

    fn viewport_size(&self) -> Vec2 {
        let size = self.window.inner_size();
        Vec2::new(size.width as f32, size.height as f32)
    }
}

pub struct State {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub is_surface_configured: bool,
    needs_srgb_output_conversion: bool,

    pub viewport_buffer: wgpu::Buffer,
    pub viewport_bind_group: wgpu::BindGroup,
    pub viewport_uniform: ViewportUniform,

    pub line_render_pipeline: wgpu::RenderPipeline,
    pub line_vertices: Vec<LineVertex>,
    pub line_vertex_buffer: wgpu::Buffer,

    pub synapse: SynapseBg<LineCanvas>,
    pub clock: SystemClock,
    resize_notifier: flume::Sender<()>,
}

impl State {
    pub async fn new(window_arc: Arc<Window>, options: SynapseOptions) -> anyhow::Result<State> {
        let size = window_arc.inner_size();

        let gpu = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::BROWSER_WEBGPU,
            ..Default::default()
        });

        // Surface itself is !Send on WASM due to HtmlCanvasElement
        let surface = gpu
            .create_surface(window_arc.clone())
            .map_err(|e| SynapseError::surface_unavailable(e.to_string()))?;

        let adapter = gpu
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no compatible GPU adapter")?;
        let adapter_info = adapter.get_info();

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to open GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let texture_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("surface reports no texture formats")?;
        let needs_srgb_output_conversion = !texture_format.is_srgb();

        log::info!(
            "Using {} ({:?}, Target Format: {:?}), Needs Shader sRGB Output Conversion: {}",
            adapter_info.name,
            adapter_info.backend,
            texture_format,
            needs_srgb_output_conversion
        );

        // Background widget: keep the page behind visible where the compositor allows it.
        let alpha_mode = surface_caps
            .alpha_modes
            .iter()
            .copied()
            .find(|m| *m == wgpu::CompositeAlphaMode::PreMultiplied)
            .unwrap_or(surface_caps.alpha_modes[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: texture_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps.present_modes[0],
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let clock = SystemClock::new();
        let sizer = WindowSizer::new(window_arc.clone());
        let synapse = SynapseBg::new(
            LineCanvas::new(size.width, size.height),
            LineCanvas::new(size.width, size.height),
            options,
            Box::new(sizer),
            clock.now(),
        );
        let resize_notifier = synapse.resize_notifier();

        let layer_size = synapse.network_layer().canvas().size();
        let viewport_uniform = ViewportUniform::new(
            layer_size.x as u32,
            layer_size.y as u32,
            needs_srgb_output_conversion,
        );

        let viewport_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Viewport Buffer"),
            contents: bytemuck::cast_slice(&[viewport_uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let viewport_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
                label: Some("Viewport Bind Group Layout"),
            });

        let viewport_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &viewport_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: viewport_buffer.as_entire_binding(),
            }],
            label: Some("Viewport Bind Group"),
        });

        let lines_shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Lines Shader"),
            source: wgpu::ShaderSource::Wgsl(LINES_WGSL.into()),
        });

        let render_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Render Pipeline Layout"),
                bind_group_layouts: &[&viewport_bind_group_layout],
                push_constant_ranges: &[],
            });

        // Strokes arrive pre-tessellated, so this is a plain triangle list.
        let line_render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Line Render Pipeline"),
            layout: Some(&render_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &lines_shader_module,
                entry_point: Some("vs_main"),
                buffers: &[LineVertex::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &lines_shader_module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: texture_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });

        let line_vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Line Vertex Buffer"),
            size: (INITIAL_VERTEX_CAPACITY * std::mem::size_of::<LineVertex>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut state = Self {
            surface,
            device,
            queue,
            config,
            is_surface_configured: false,
            needs_srgb_output_conversion,
            viewport_buffer,
            viewport_bind_group,
            viewport_uniform,
            line_render_pipeline,
            line_vertices: Vec::with_capacity(INITIAL_VERTEX_CAPACITY),
            line_vertex_buffer,
            synapse,
            clock,
            resize_notifier,
        };
        state.rebuild_line_vertices();
        Ok(state)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            log::info!("Resize {}, {}", width, height);
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
            self.is_surface_configured = true;

            // The layers pick up the new size on their next advance.
            if self.resize_notifier.send(()).is_err() {
                log::warn!("Resize notification dropped: orchestrator is gone.");
            }
        }
    }

    /// Time until the orchestrator next needs to run, if anything is scheduled.
    pub fn time_until_next_deadline(&self) -> Option<Duration> {
        let now = self.clock.now();
        self.synapse
            .next_deadline()
            .map(|deadline| deadline.saturating_sub(now))
    }

    /// Runs due timers; returns whether anything visible changed.
    pub fn update(&mut self) -> bool {
        self.synapse.advance(self.clock.now());

        let network_dirty = self.synapse.network_layer_mut().canvas_mut().take_dirty();
        let signal_dirty = self.synapse.signal_layer_mut().canvas_mut().take_dirty();
        if !(network_dirty || signal_dirty) {
            return false;
        }

        self.rebuild_line_vertices();
        true
    }

    fn rebuild_line_vertices(&mut self) {
        // Network first so the signal layer composites on top.
        self.line_vertices.clear();
        self.synapse
            .network_layer()
            .canvas()
            .tessellate_into(&mut self.line_vertices);
        self.synapse
            .signal_layer()
            .canvas()
            .tessellate_into(&mut self.line_vertices);

        let layer_size = self.synapse.network_layer().canvas().size();
        let viewport_uniform = ViewportUniform::new(
            layer_size.x as u32,
            layer_size.y as u32,
            self.needs_srgb_output_conversion,
        );
        if viewport_uniform.size != self.viewport_uniform.size {
            self.viewport_uniform = viewport_uniform;
            self.queue.write_buffer(
                &self.viewport_buffer,
                0,
                bytemuck::cast_slice(&[self.viewport_uniform]),
            );
        }

        self.update_gpu_buffers();
    }

    fn update_gpu_buffers(&mut self) {
        let line_data: &[u8] = bytemuck::cast_slice(&self.line_vertices);
        if line_data.is_empty() {
            return;
        }

        if self.line_vertex_buffer.size() < line_data.len() as u64 {
            self.line_vertex_buffer =
                self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Line Vertex Buffer (Resized)"),
                    contents: line_data,
                    usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                });
        } else {
            self.queue.write_buffer(&self.line_vertex_buffer, 0, line_data);
        }
    }

    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        if !self.is_surface_configured {
            return Ok(());
        }

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if !self.line_vertices.is_empty() {
                render_pass.set_bind_group(0, &self.viewport_bind_group, &[]);
                render_pass.set_pipeline(&self.line_render_pipeline);
                render_pass.set_vertex_buffer(0, self.line_vertex_buffer.slice(..));
                render_pass.draw(0..self.line_vertices.len() as u32, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}
