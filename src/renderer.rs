// renderer.rs: wgpu backend: scene meshes, lights, egui overlay and frame readback

use crate::backend::{FrameInput, FrameOutcome, RenderBackend, Viewport};
use crate::error::ViewerError;
use crate::mesh::Vertex;
use crate::scene::{Light, Material, MaterialKind, NodeId, Scene};
use glam::Mat4;
use image::RgbaImage;
use std::collections::BTreeMap;
use std::sync::Arc;
use wgpu::util::DeviceExt;
use winit::window::Window;

const MAX_DIRECTIONAL: usize = 2;
const MAX_POINT: usize = 4;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct GlobalsUniform {
    view_proj: [[f32; 4]; 4],
    eye: [f32; 4],
    ambient: [f32; 4],
    sky: [f32; 4],
    ground: [f32; 4],
    dir_direction: [[f32; 4]; MAX_DIRECTIONAL],
    dir_color: [[f32; 4]; MAX_DIRECTIONAL],
    point_position: [[f32; 4]; MAX_POINT],
    point_color: [[f32; 4]; MAX_POINT],
    counts: [u32; 4],
}

impl GlobalsUniform {
    fn from_lights(lights: &[Light]) -> Self {
        let mut globals = Self::zeroed();
        let scaled = |c: [f32; 3], i: f32| [c[0] * i, c[1] * i, c[2] * i, 1.0];
        for light in lights {
            match *light {
                Light::Ambient { color, intensity } => {
                    let c = scaled(color, intensity);
                    for k in 0..3 {
                        globals.ambient[k] += c[k];
                    }
                }
                Light::Hemisphere { sky, ground, intensity } => {
                    let (s, g) = (scaled(sky, intensity), scaled(ground, intensity));
                    for k in 0..3 {
                        globals.sky[k] += s[k];
                        globals.ground[k] += g[k];
                    }
                }
                Light::Directional { direction, color, intensity } => {
                    let n = globals.counts[0] as usize;
                    if n == MAX_DIRECTIONAL {
                        log::warn!("more than {MAX_DIRECTIONAL} directional lights, extra ignored");
                        continue;
                    }
                    globals.dir_direction[n] = direction.normalize_or_zero().extend(0.0).to_array();
                    globals.dir_color[n] = scaled(color, intensity);
                    globals.counts[0] += 1;
                }
                Light::Point { position, color, intensity, range } => {
                    let n = globals.counts[1] as usize;
                    if n == MAX_POINT {
                        log::warn!("more than {MAX_POINT} point lights, extra ignored");
                        continue;
                    }
                    globals.point_position[n] = position.extend(range.max(0.001)).to_array();
                    globals.point_color[n] = scaled(color, intensity);
                    globals.counts[1] += 1;
                }
            }
        }
        globals
    }

    fn zeroed() -> Self {
        bytemuck::Zeroable::zeroed()
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct NodeUniform {
    model: [[f32; 4]; 4],
    normal_matrix: [[f32; 4]; 4],
    color: [f32; 4],
    params: [f32; 4],
    shadow: [f32; 4],
}

impl NodeUniform {
    fn new(world: Mat4, material: &Material) -> Self {
        let (kind, shadow) = match material.kind {
            MaterialKind::Lit => (0.0, [0.0; 2]),
            MaterialKind::Unlit => (1.0, [0.0; 2]),
            MaterialKind::ShadowCatcher { half_extent } => (2.0, half_extent),
        };
        let [r, g, b] = material.color;
        Self {
            model: world.to_cols_array_2d(),
            normal_matrix: world.inverse().transpose().to_cols_array_2d(),
            color: [r, g, b, material.emissive],
            params: [
                material.uv_repeat[0],
                material.uv_repeat[1],
                material.shininess,
                kind,
            ],
            shadow: [shadow[0], shadow[1], 0.0, 0.0],
        }
    }
}

/// Scales an image down so neither side exceeds `max_dim`.
fn fit_to_limit(img: RgbaImage, max_dim: u32) -> RgbaImage {
    let (w, h) = img.dimensions();
    if w <= max_dim && h <= max_dim {
        return img;
    }
    let scale = max_dim as f32 / w.max(h) as f32;
    let new_w = ((w as f32 * scale) as u32).clamp(1, max_dim);
    let new_h = ((h as f32 * scale) as u32).clamp(1, max_dim);
    log::warn!("texture {w}x{h} exceeds GPU limit {max_dim}, scaled to {new_w}x{new_h}");
    image::imageops::resize(&img, new_w, new_h, image::imageops::FilterType::Lanczos3)
}

fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    (unpadded + align - 1) / align * align
}

fn unpad_rows(data: &[u8], width: u32, height: u32, padded: u32) -> Vec<u8> {
    let unpadded = (width * 4) as usize;
    let mut pixels = Vec::with_capacity(unpadded * height as usize);
    for row in 0..height as usize {
        let start = row * padded as usize;
        pixels.extend_from_slice(&data[start..start + unpadded]);
    }
    pixels
}

/// egui output for one frame, painted on top of the scene.
pub struct Overlay {
    pub primitives: Vec<egui::ClippedPrimitive>,
    pub textures_delta: egui::TexturesDelta,
    pub pixels_per_point: f32,
}

struct GpuNode {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    uniform_buffer: wgpu::Buffer,
    texture: Option<wgpu::Texture>,
    bind_group: wgpu::BindGroup,
    visible: bool,
}

impl GpuNode {
    fn destroy(&self) {
        self.vertex_buffer.destroy();
        self.index_buffer.destroy();
        self.uniform_buffer.destroy();
        if let Some(texture) = &self.texture {
            texture.destroy();
        }
    }
}

pub struct GpuRenderer {
    // keeps the window alive for as long as the surface
    _window: Arc<Window>,
    surface: Option<wgpu::Surface>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pipeline: wgpu::RenderPipeline,

    globals: GlobalsUniform,
    globals_buffer: wgpu::Buffer,
    globals_bind_group: wgpu::BindGroup,
    node_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    white_texture: wgpu::Texture,
    white_view: wgpu::TextureView,
    depth_texture: wgpu::Texture,
    depth_view: wgpu::TextureView,

    nodes: BTreeMap<NodeId, GpuNode>,
    clear_color: wgpu::Color,
    last_frame: Option<FrameInput>,

    egui_renderer: egui_wgpu::Renderer,
    overlay: Option<Overlay>,
    pending_free: Vec<egui::TextureId>,
}

impl GpuRenderer {
    pub async fn new(window: Arc<Window>, viewport: Viewport) -> Result<Self, ViewerError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = unsafe { instance.create_surface(window.as_ref()) }
            .map_err(|e| ViewerError::Context(e.to_string()))?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| ViewerError::Context("no suitable GPU adapter".into()))?;
        log::info!("using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    features: wgpu::Features::empty(),
                    limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                    label: None,
                },
                None,
            )
            .await
            .map_err(|e| ViewerError::Context(e.to_string()))?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| ViewerError::Context("surface reports no formats".into()))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: viewport.width.max(1),
            height: viewport.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let globals = GlobalsUniform::zeroed();
        let globals_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("globals_buffer"),
            contents: bytemuck::cast_slice(&[globals]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("globals_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let globals_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("globals_bind_group"),
            layout: &globals_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
        });

        let node_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("node_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("material_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let white_texture = create_rgba_texture(
            &device,
            &queue,
            &RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255])),
            "white_texture",
        );
        let white_view = white_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let (depth_texture, depth_view) = create_depth(&device, config.width, config.height);

        let shader = device.create_shader_module(wgpu::include_wgsl!("shader.wgsl"));
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scene_pipeline_layout"),
            bind_group_layouts: &[&globals_layout, &node_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("scene_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[Vertex::layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                // planes are seen from both sides (walls, carpet)
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        });

        let egui_renderer = egui_wgpu::Renderer::new(&device, config.format, None, 1);

        Ok(Self {
            _window: window,
            surface: Some(surface),
            device,
            queue,
            config,
            pipeline,
            globals,
            globals_buffer,
            globals_bind_group,
            node_layout,
            sampler,
            white_texture,
            white_view,
            depth_texture,
            depth_view,
            nodes: BTreeMap::new(),
            clear_color: wgpu::Color::BLACK,
            last_frame: None,
            egui_renderer,
            overlay: None,
            pending_free: Vec::new(),
        })
    }

    /// Uploads new egui textures right away; primitives are drawn on the next render.
    pub fn set_overlay(&mut self, overlay: Overlay) {
        for (id, delta) in &overlay.textures_delta.set {
            self.egui_renderer
                .update_texture(&self.device, &self.queue, *id, delta);
        }
        self.pending_free
            .extend(overlay.textures_delta.free.iter().copied());
        self.overlay = Some(overlay);
    }

    fn upload_node(&self, scene: &Scene, id: NodeId) -> Option<GpuNode> {
        let node = scene.node(id)?;
        let (mesh, material) = (node.mesh()?, node.material()?);
        let world = scene.world_transform(id).unwrap_or(Mat4::IDENTITY);
        let label = node.name.as_str();

        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let uniform_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&[NodeUniform::new(world, material)]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let max_dim = self.device.limits().max_texture_dimension_2d;
        let texture = material.texture.as_ref().map(|img| {
            let img = fit_to_limit(img.clone(), max_dim);
            create_rgba_texture(&self.device, &self.queue, &img, label)
        });
        let view = texture
            .as_ref()
            .map(|t| t.create_view(&wgpu::TextureViewDescriptor::default()));

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.node_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(
                        view.as_ref().unwrap_or(&self.white_view),
                    ),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        Some(GpuNode {
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
            uniform_buffer,
            texture,
            bind_group,
            visible: scene.is_visible(id),
        })
    }

    fn clear_nodes(&mut self) {
        for node in self.nodes.values() {
            node.destroy();
        }
        self.nodes.clear();
    }

    fn write_globals(&mut self, frame: &FrameInput) {
        self.globals.view_proj = (frame.projection * frame.view).to_cols_array_2d();
        self.globals.eye = frame.eye.extend(1.0).to_array();
        self.queue
            .write_buffer(&self.globals_buffer, 0, bytemuck::cast_slice(&[self.globals]));
    }

    fn encode_scene(&self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("scene_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.clear_color),
                    store: true,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: true,
                }),
                stencil_ops: None,
            }),
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.globals_bind_group, &[]);
        for node in self.nodes.values().filter(|n| n.visible) {
            pass.set_bind_group(1, &node.bind_group, &[]);
            pass.set_vertex_buffer(0, node.vertex_buffer.slice(..));
            pass.set_index_buffer(node.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..node.index_count, 0, 0..1);
        }
    }

    fn encode_overlay(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
    ) -> Vec<wgpu::CommandBuffer> {
        let Some(overlay) = self.overlay.take() else {
            return Vec::new();
        };
        let screen = egui_wgpu::renderer::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: overlay.pixels_per_point,
        };
        let extra = self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            encoder,
            &overlay.primitives,
            &screen,
        );
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });
            self.egui_renderer
                .render(&mut pass, &overlay.primitives, &screen);
        }
        extra
    }
}

impl RenderBackend for GpuRenderer {
    fn upload_scene(&mut self, scene: &Scene) -> Result<(), ViewerError> {
        self.clear_nodes();
        let [r, g, b] = scene.background;
        self.clear_color = wgpu::Color {
            r: r as f64,
            g: g as f64,
            b: b as f64,
            a: 1.0,
        };
        self.globals = GlobalsUniform::from_lights(&scene.lights);

        for id in scene.mesh_ids() {
            match self.upload_node(scene, id) {
                Some(node) => {
                    self.nodes.insert(id, node);
                }
                None => log::warn!("node {} has no mesh data, skipped", id.index()),
            }
        }
        log::debug!("uploaded {} meshes, {} lights", self.nodes.len(), scene.lights.len());
        Ok(())
    }

    fn update_node_texture(&mut self, scene: &Scene, id: NodeId) -> Result<(), ViewerError> {
        let node = self
            .upload_node(scene, id)
            .ok_or_else(|| ViewerError::Render(format!("node {} is not a mesh", id.index())))?;
        if let Some(old) = self.nodes.insert(id, node) {
            old.destroy();
        }
        Ok(())
    }

    fn remove_nodes(&mut self, ids: &[NodeId]) {
        for id in ids {
            if let Some(node) = self.nodes.remove(id) {
                node.destroy();
            }
        }
    }

    fn resize(&mut self, viewport: Viewport) {
        if viewport.is_empty() {
            return;
        }
        self.config.width = viewport.width;
        self.config.height = viewport.height;
        if let Some(surface) = &self.surface {
            surface.configure(&self.device, &self.config);
        }
        self.depth_texture.destroy();
        let (texture, view) = create_depth(&self.device, viewport.width, viewport.height);
        self.depth_texture = texture;
        self.depth_view = view;
    }

    fn render(&mut self, frame: &FrameInput) -> Result<FrameOutcome, ViewerError> {
        let Some(surface) = &self.surface else {
            return Err(ViewerError::Render("renderer already released".into()));
        };
        let output = match surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("surface lost or outdated, reconfiguring");
                surface.configure(&self.device, &self.config);
                return Ok(FrameOutcome::Skipped);
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("surface timeout, frame skipped");
                return Ok(FrameOutcome::Skipped);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return Err(ViewerError::Context("GPU out of memory".into()));
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.write_globals(frame);
        self.last_frame = Some(*frame);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });
        self.encode_scene(&mut encoder, &view);
        let extra = self.encode_overlay(&mut encoder, &view);

        self.queue
            .submit(extra.into_iter().chain(std::iter::once(encoder.finish())));
        output.present();

        for id in self.pending_free.drain(..) {
            self.egui_renderer.free_texture(&id);
        }
        Ok(FrameOutcome::Presented)
    }

    fn read_pixels(&mut self) -> Option<RgbaImage> {
        let frame = self.last_frame?;
        let bgra = match self.config.format {
            wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb => true,
            wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb => false,
            other => {
                log::warn!("frame readback not supported for {other:?}");
                return None;
            }
        };
        let (width, height) = (self.config.width, self.config.height);
        let extent = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let target = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("screenshot_target"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.config.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = target.create_view(&wgpu::TextureViewDescriptor::default());

        self.write_globals(&frame);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("screenshot_encoder"),
            });
        self.encode_scene(&mut encoder, &view);

        let padded = padded_bytes_per_row(width);
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("screenshot_staging"),
            size: (padded * height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &staging,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            extent,
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |r| {
            let _ = tx.send(r);
        });
        self.device.poll(wgpu::Maintain::Wait);
        if let Err(err) = rx.recv().map_err(|e| e.to_string()).and_then(|r| r.map_err(|e| e.to_string())) {
            log::warn!("screenshot buffer could not be mapped: {err}");
            target.destroy();
            staging.destroy();
            return None;
        }

        let mut pixels = {
            let data = slice.get_mapped_range();
            unpad_rows(&data, width, height, padded)
        };
        staging.unmap();
        staging.destroy();
        target.destroy();

        if bgra {
            for px in pixels.chunks_exact_mut(4) {
                px.swap(0, 2);
            }
        }
        RgbaImage::from_raw(width, height, pixels)
    }

    fn release(&mut self) {
        self.clear_nodes();
        self.overlay = None;
        for id in self.pending_free.drain(..) {
            self.egui_renderer.free_texture(&id);
        }
        self.white_texture.destroy();
        self.depth_texture.destroy();
        self.globals_buffer.destroy();
        self.surface = None;
        self.last_frame = None;
        log::debug!("GPU resources released");
    }
}

fn create_rgba_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    img: &RgbaImage,
    label: &str,
) -> wgpu::Texture {
    let (width, height) = img.dimensions();
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        img.as_raw(),
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        size,
    );
    texture
}

fn create_depth(device: &wgpu::Device, width: u32, height: u32) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_texture"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn lights_are_packed_and_capped() {
        let mut lights = vec![
            Light::Ambient {
                color: [1.0, 1.0, 1.0],
                intensity: 0.25,
            },
            Light::Hemisphere {
                sky: [1.0, 1.0, 1.0],
                ground: [0.5, 0.5, 0.5],
                intensity: 0.5,
            },
        ];
        for i in 0..3 {
            lights.push(Light::Directional {
                direction: Vec3::new(0.0, -2.0, 0.0),
                color: [1.0, 1.0, 1.0],
                intensity: i as f32,
            });
        }
        lights.push(Light::Point {
            position: Vec3::new(1.0, 2.0, 3.0),
            color: [1.0, 0.5, 0.0],
            intensity: 2.0,
            range: 4.0,
        });

        let globals = GlobalsUniform::from_lights(&lights);
        assert_eq!(globals.counts[0], MAX_DIRECTIONAL as u32);
        assert_eq!(globals.counts[1], 1);
        assert_eq!(globals.ambient[0], 0.25);
        assert_eq!(globals.ground[1], 0.25);
        assert_eq!(globals.dir_direction[0], [0.0, -1.0, 0.0, 0.0]);
        assert_eq!(globals.point_position[0], [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(globals.point_color[0], [2.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn node_uniform_encodes_material_kind() {
        let floor = Material::color(0xffffff).kind(MaterialKind::ShadowCatcher {
            half_extent: [1.0, 1.5],
        });
        let uniform = NodeUniform::new(Mat4::IDENTITY, &floor);
        assert_eq!(uniform.params[3], 2.0);
        assert_eq!(uniform.shadow, [1.0, 1.5, 0.0, 0.0]);

        let glass = Material::color(0x000000).kind(MaterialKind::Unlit).repeat(4.0, 2.0);
        let uniform = NodeUniform::new(Mat4::IDENTITY, &glass);
        assert_eq!(uniform.params, [4.0, 2.0, 0.0, 1.0]);
    }

    #[test]
    fn oversized_textures_are_scaled_to_the_limit() {
        let img = RgbaImage::new(400, 100);
        let fitted = fit_to_limit(img, 200);
        assert_eq!(fitted.dimensions(), (200, 50));

        let small = RgbaImage::new(10, 10);
        assert_eq!(fit_to_limit(small, 200).dimensions(), (10, 10));
    }

    #[test]
    fn readback_rows_are_aligned_then_unpadded() {
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(64), 256);
        assert_eq!(padded_bytes_per_row(65), 512);

        let padded = padded_bytes_per_row(2);
        let mut data = vec![0u8; (padded * 2) as usize];
        data[..8].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        data[padded as usize..padded as usize + 8].copy_from_slice(&[9; 8]);
        let pixels = unpad_rows(&data, 2, 2, padded);
        assert_eq!(pixels.len(), 16);
        assert_eq!(&pixels[..8], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(&pixels[8..], &[9; 8]);
    }
}
