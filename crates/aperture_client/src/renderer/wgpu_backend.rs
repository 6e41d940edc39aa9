use std::fmt;
use std::mem;
use std::sync::mpsc;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use rustc_hash::FxHashMap;
use tracing::{debug, info};
use wgpu::util::DeviceExt;

use crate::renderer::backend::RenderBackend;
use crate::renderer::scene::{MeshId, SceneItem, CUBE_MESH, QUAD_MESH};
use crate::renderer::state::{CompareFunction, RenderState, StencilOperation, StencilState};

const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
const DEPTH_STENCIL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;
const UNIFORM_STRIDE: u64 = 256;

/// Maps OpenGL clip depth [-w, w] onto wgpu's [0, w].
const DEPTH_REMAP: Mat4 = Mat4::from_cols_array(&[
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 0.5, 0.0, //
    0.0, 0.0, 0.5, 1.0,
]);

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl MeshVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct DrawUniform {
    view_proj: [[f32; 4]; 4],
    model: [[f32; 4]; 4],
    color: [f32; 4],
}

#[derive(Debug)]
pub enum BackendInitError {
    RequestAdapter(wgpu::RequestAdapterError),
    RequestDevice(wgpu::RequestDeviceError),
}

impl fmt::Display for BackendInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestAdapter(err) => write!(f, "failed to request adapter: {err}"),
            Self::RequestDevice(err) => write!(f, "failed to request device: {err}"),
        }
    }
}

impl std::error::Error for BackendInitError {}

#[derive(Debug)]
pub enum ReadbackError {
    Map(wgpu::BufferAsyncError),
    Poll(wgpu::PollError),
    ChannelClosed,
    Size { width: u32, height: u32 },
}

impl fmt::Display for ReadbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Map(err) => write!(f, "failed to map readback buffer: {err}"),
            Self::Poll(err) => write!(f, "failed to wait for the device: {err}"),
            Self::ChannelClosed => write!(f, "readback callback dropped without a result"),
            Self::Size { width, height } => {
                write!(f, "readback data does not fill a {width}x{height} image")
            }
        }
    }
}

impl std::error::Error for ReadbackError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum PassKind {
    Scene,
    DepthClear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    kind: PassKind,
    state: RenderState,
}

impl PipelineKey {
    fn scene(state: &RenderState) -> Self {
        Self {
            kind: PassKind::Scene,
            state: state.without_reference(),
        }
    }

    fn depth_clear(state: &RenderState) -> Self {
        Self {
            kind: PassKind::DepthClear,
            state: depth_clear_state(state).without_reference(),
        }
    }
}

enum Command {
    State(RenderState),
    ClearDepth,
    Draw { mesh: MeshId, uniform: u32 },
}

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

/// Offscreen wgpu target. Portal passes are recorded as they are issued and
/// encoded into a single render pass by [`WgpuBackend::submit_frame`].
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    width: u32,
    height: u32,
    color_texture: wgpu::Texture,
    color_view: wgpu::TextureView,
    _depth_texture: wgpu::Texture,
    depth_view: wgpu::TextureView,
    scene_shader: wgpu::ShaderModule,
    clear_shader: wgpu::ShaderModule,
    uniform_layout: wgpu::BindGroupLayout,
    scene_pipeline_layout: wgpu::PipelineLayout,
    clear_pipeline_layout: wgpu::PipelineLayout,
    pipelines: FxHashMap<PipelineKey, wgpu::RenderPipeline>,
    meshes: FxHashMap<MeshId, GpuMesh>,
    state: RenderState,
    frame_state: RenderState,
    clear_color: wgpu::Color,
    commands: Vec<Command>,
    uniforms: Vec<DrawUniform>,
}

impl WgpuBackend {
    pub fn new(width: u32, height: u32) -> Result<Self, BackendInitError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(BackendInitError::RequestAdapter)?;
        info!("Using adapter {}", adapter.get_info().name);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Aperture Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .map_err(BackendInitError::RequestDevice)?;

        let width = width.max(1);
        let height = height.max(1);
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let color_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Aperture Color Target"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let color_view = color_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Aperture Depth Stencil Target"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_STENCIL_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let depth_view = depth_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let scene_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Portal Scene Shader"),
            source: wgpu::ShaderSource::Wgsl(
                include_str!(concat!(
                    env!("CARGO_MANIFEST_DIR"),
                    "/../../assets/shaders/portal_scene.wgsl"
                ))
                .into(),
            ),
        });
        let clear_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Depth Clear Shader"),
            source: wgpu::ShaderSource::Wgsl(
                include_str!(concat!(
                    env!("CARGO_MANIFEST_DIR"),
                    "/../../assets/shaders/depth_clear.wgsl"
                ))
                .into(),
            ),
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Draw Uniform Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(mem::size_of::<DrawUniform>() as u64),
                },
                count: None,
            }],
        });
        let scene_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Portal Scene Pipeline Layout"),
            bind_group_layouts: &[&uniform_layout],
            push_constant_ranges: &[],
        });
        let clear_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Depth Clear Pipeline Layout"),
            bind_group_layouts: &[],
            push_constant_ranges: &[],
        });

        let mut backend = Self {
            device,
            queue,
            width,
            height,
            color_texture,
            color_view,
            _depth_texture: depth_texture,
            depth_view,
            scene_shader,
            clear_shader,
            uniform_layout,
            scene_pipeline_layout,
            clear_pipeline_layout,
            pipelines: FxHashMap::default(),
            meshes: FxHashMap::default(),
            state: RenderState::NORMAL,
            frame_state: RenderState::NORMAL,
            clear_color: wgpu::Color::BLACK,
            commands: Vec::new(),
            uniforms: Vec::new(),
        };

        let (vertices, indices) = build_cube_mesh();
        backend.register_mesh(CUBE_MESH, &vertices, &indices);
        let (vertices, indices) = build_quad_mesh();
        backend.register_mesh(QUAD_MESH, &vertices, &indices);
        Ok(backend)
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn register_mesh(&mut self, id: MeshId, vertices: &[MeshVertex], indices: &[u16]) {
        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Scene Mesh Vertex Buffer"),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Scene Mesh Index Buffer"),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        self.meshes.insert(
            id,
            GpuMesh {
                vertex_buffer,
                index_buffer,
                index_count: indices.len() as u32,
            },
        );
    }

    /// Starts recording a frame that clears color to `clear_color`, depth to
    /// the far plane and stencil to zero.
    pub fn begin_frame(&mut self, clear_color: [f64; 4]) {
        self.commands.clear();
        self.uniforms.clear();
        self.state = RenderState::NORMAL;
        self.frame_state = RenderState::NORMAL;
        self.clear_color = wgpu::Color {
            r: clear_color[0],
            g: clear_color[1],
            b: clear_color[2],
            a: clear_color[3],
        };
    }

    /// Encodes and submits everything recorded since [`Self::begin_frame`].
    pub fn submit_frame(&mut self) -> u32 {
        let mut state = self.frame_state;
        let mut keys = Vec::new();
        for command in &self.commands {
            match command {
                Command::State(next) => state = *next,
                Command::ClearDepth => keys.push(PipelineKey::depth_clear(&state)),
                Command::Draw { .. } => keys.push(PipelineKey::scene(&state)),
            }
        }
        for key in keys {
            self.ensure_pipeline(key);
        }

        let uniform_buffer = self.upload_uniforms();
        let uniform_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Draw Uniform Bind Group"),
            layout: &self.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &uniform_buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(mem::size_of::<DrawUniform>() as u64),
                }),
            }],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Portal Frame Encoder"),
            });
        let mut draw_calls = 0;
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Portal Frame Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(0),
                        store: wgpu::StoreOp::Store,
                    }),
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let mut state = self.frame_state;
            let mut bound: Option<PipelineKey> = None;
            for command in &self.commands {
                let key = match command {
                    Command::State(next) => {
                        state = *next;
                        continue;
                    }
                    Command::ClearDepth => PipelineKey::depth_clear(&state),
                    Command::Draw { .. } => PipelineKey::scene(&state),
                };
                if bound != Some(key) {
                    let Some(pipeline) = self.pipelines.get(&key) else {
                        continue;
                    };
                    render_pass.set_pipeline(pipeline);
                    bound = Some(key);
                }
                render_pass.set_stencil_reference(u32::from(state.stencil.reference));

                match command {
                    Command::State(_) => {}
                    Command::ClearDepth => {
                        render_pass.draw(0..3, 0..1);
                    }
                    Command::Draw { mesh, uniform } => {
                        let Some(mesh) = self.meshes.get(mesh) else {
                            debug!("Skipping draw of unregistered mesh {}", mesh.0);
                            continue;
                        };
                        let offset = (u64::from(*uniform) * UNIFORM_STRIDE) as u32;
                        render_pass.set_bind_group(0, &uniform_bind_group, &[offset]);
                        render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                        render_pass.set_index_buffer(
                            mesh.index_buffer.slice(..),
                            wgpu::IndexFormat::Uint16,
                        );
                        render_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
                        draw_calls += 1;
                    }
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        draw_calls
    }

    /// Copies the color target back to the CPU. Waits for the device.
    pub fn read_pixels(&self) -> Result<image::RgbaImage, ReadbackError> {
        let bytes_per_pixel = 4u32;
        let unpadded_bytes_per_row = self.width * bytes_per_pixel;
        let padded_bytes_per_row = unpadded_bytes_per_row
            .div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

        let staging_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Aperture Readback Buffer"),
            size: u64::from(padded_bytes_per_row) * u64::from(self.height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Aperture Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.color_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = staging_buffer.slice(..);
        let (sender, receiver) = mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device
            .poll(wgpu::PollType::Wait)
            .map_err(ReadbackError::Poll)?;
        receiver
            .recv()
            .map_err(|_| ReadbackError::ChannelClosed)?
            .map_err(ReadbackError::Map)?;

        let data = buffer_slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((unpadded_bytes_per_row * self.height) as usize);
        for row in 0..self.height {
            let start = (row * padded_bytes_per_row) as usize;
            let end = start + unpadded_bytes_per_row as usize;
            pixels.extend_from_slice(&data[start..end]);
        }
        drop(data);
        staging_buffer.unmap();

        image::RgbaImage::from_raw(self.width, self.height, pixels).ok_or(ReadbackError::Size {
            width: self.width,
            height: self.height,
        })
    }

    fn upload_uniforms(&self) -> wgpu::Buffer {
        let stride = UNIFORM_STRIDE as usize;
        let mut bytes = vec![0u8; self.uniforms.len().max(1) * stride];
        for (index, uniform) in self.uniforms.iter().enumerate() {
            let start = index * stride;
            bytes[start..start + mem::size_of::<DrawUniform>()]
                .copy_from_slice(bytemuck::bytes_of(uniform));
        }
        self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Draw Uniform Buffer"),
            contents: &bytes,
            usage: wgpu::BufferUsages::UNIFORM,
        })
    }

    fn ensure_pipeline(&mut self, key: PipelineKey) {
        if self.pipelines.contains_key(&key) {
            return;
        }
        let state = key.state;
        let scene_buffers = [MeshVertex::desc()];
        let (label, layout, module, buffers) = match key.kind {
            PassKind::Scene => (
                "Portal Scene Pipeline",
                &self.scene_pipeline_layout,
                &self.scene_shader,
                &scene_buffers[..],
            ),
            PassKind::DepthClear => (
                "Depth Clear Pipeline",
                &self.clear_pipeline_layout,
                &self.clear_shader,
                &scene_buffers[..0],
            ),
        };

        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module,
                entry_point: Some("vs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers,
            },
            fragment: Some(wgpu::FragmentState {
                module,
                entry_point: Some("fs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: COLOR_FORMAT,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: if state.color_write {
                        wgpu::ColorWrites::ALL
                    } else {
                        wgpu::ColorWrites::empty()
                    },
                })],
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
            depth_stencil: Some(depth_stencil_state(&state)),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        debug!("Created {label} for {:?}", state);
        self.pipelines.insert(key, pipeline);
    }
}

impl RenderBackend for WgpuBackend {
    fn state(&self) -> RenderState {
        self.state
    }

    fn apply_state(&mut self, state: &RenderState) {
        self.state = *state;
        self.commands.push(Command::State(*state));
    }

    fn clear_depth(&mut self) {
        self.commands.push(Command::ClearDepth);
    }

    fn render_subset(&mut self, items: &[&SceneItem], view: &Mat4, projection: &Mat4) {
        let view_proj = (DEPTH_REMAP * *projection * *view).to_cols_array_2d();
        for item in items {
            let uniform = self.uniforms.len() as u32;
            self.uniforms.push(DrawUniform {
                view_proj,
                model: item.model.to_cols_array_2d(),
                color: item.color,
            });
            self.commands.push(Command::Draw {
                mesh: item.mesh,
                uniform,
            });
        }
    }
}

/// State of the fullscreen depth reset: far-plane depth written everywhere
/// the current stencil test passes, stencil and color untouched.
fn depth_clear_state(state: &RenderState) -> RenderState {
    RenderState {
        color_write: false,
        depth_write: true,
        depth_test: true,
        depth_compare: CompareFunction::Always,
        stencil: StencilState {
            write_mask: 0,
            ..state.stencil
        },
    }
}

fn depth_stencil_state(state: &RenderState) -> wgpu::DepthStencilState {
    let stencil = if state.stencil.enabled {
        let face = wgpu::StencilFaceState {
            compare: compare_function(state.stencil.compare),
            fail_op: stencil_operation(state.stencil.fail_op),
            depth_fail_op: stencil_operation(state.stencil.depth_fail_op),
            pass_op: stencil_operation(state.stencil.pass_op),
        };
        wgpu::StencilState {
            front: face,
            back: face,
            read_mask: u32::from(state.stencil.read_mask),
            write_mask: u32::from(state.stencil.write_mask),
        }
    } else {
        wgpu::StencilState::default()
    };

    wgpu::DepthStencilState {
        format: DEPTH_STENCIL_FORMAT,
        depth_write_enabled: state.depth_test && state.depth_write,
        depth_compare: if state.depth_test {
            compare_function(state.depth_compare)
        } else {
            wgpu::CompareFunction::Always
        },
        stencil,
        bias: wgpu::DepthBiasState::default(),
    }
}

fn compare_function(compare: CompareFunction) -> wgpu::CompareFunction {
    match compare {
        CompareFunction::Never => wgpu::CompareFunction::Never,
        CompareFunction::Less => wgpu::CompareFunction::Less,
        CompareFunction::Equal => wgpu::CompareFunction::Equal,
        CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
        CompareFunction::Greater => wgpu::CompareFunction::Greater,
        CompareFunction::NotEqual => wgpu::CompareFunction::NotEqual,
        CompareFunction::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
        CompareFunction::Always => wgpu::CompareFunction::Always,
    }
}

fn stencil_operation(op: StencilOperation) -> wgpu::StencilOperation {
    match op {
        StencilOperation::Keep => wgpu::StencilOperation::Keep,
        StencilOperation::Zero => wgpu::StencilOperation::Zero,
        StencilOperation::Replace => wgpu::StencilOperation::Replace,
        StencilOperation::IncrementClamp => wgpu::StencilOperation::IncrementClamp,
        StencilOperation::DecrementClamp => wgpu::StencilOperation::DecrementClamp,
        StencilOperation::Invert => wgpu::StencilOperation::Invert,
    }
}

pub fn build_quad_mesh() -> ([MeshVertex; 4], [u16; 6]) {
    let normal = [0.0, 0.0, 1.0];
    let vertices = [
        MeshVertex {
            position: [-1.0, -1.0, 0.0],
            normal,
        },
        MeshVertex {
            position: [1.0, -1.0, 0.0],
            normal,
        },
        MeshVertex {
            position: [1.0, 1.0, 0.0],
            normal,
        },
        MeshVertex {
            position: [-1.0, 1.0, 0.0],
            normal,
        },
    ];
    (vertices, [0, 1, 2, 0, 2, 3])
}

pub fn build_cube_mesh() -> ([MeshVertex; 24], [u16; 36]) {
    // Per face: normal axis, then two tangent axes chosen so the winding is CCW
    // seen from outside.
    const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];
    const CORNERS: [(f32, f32); 4] = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

    let mut vertices = [MeshVertex {
        position: [0.0; 3],
        normal: [0.0; 3],
    }; 24];
    let mut indices = [0u16; 36];
    for (face, (normal, u, v)) in FACES.iter().enumerate() {
        for (corner, (a, b)) in CORNERS.iter().enumerate() {
            let position = std::array::from_fn(|axis| normal[axis] + u[axis] * a + v[axis] * b);
            vertices[face * 4 + corner] = MeshVertex {
                position,
                normal: *normal,
            };
        }
        let base = (face * 4) as u16;
        indices[face * 6..face * 6 + 6]
            .copy_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    (vertices, indices)
}
