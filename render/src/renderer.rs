//! Renderer context
//!
//! One explicitly constructed object owns every GPU resource the core
//! touches: the geometry arena buffers, the instance stream buffers, the
//! indirect command buffer, the uniform blocks, the offscreen render target
//! and the texture/shader registries. Everything is created at `new` and
//! dropped with the context; no globals, no manual frees.

use anyhow::Result;

use vermilion_common::{INDEX_STRIDE, MeshVertex, VERTEX_STRIDE};

use crate::arena::{ArenaError, Geometry, GeometryArena};
use crate::batch::BatchQueue;
use crate::commands::DrawIndexedIndirect;
use crate::material::{ShaderHandle, TextureHandle};
use crate::pipeline::{self, BindLayouts, ShaderEntry, ShaderKind, ShaderTable};
use crate::texture_slots::{MAX_TEXTURE_SLOTS, TextureSlotAllocator};
use crate::textures::TextureRegistry;
use crate::uniforms::{CameraBlock, DrawBlock, Light, LightsBlock, MAX_LIGHTS};

/// Capacities for the renderer's fixed-size GPU storage.
#[derive(Debug, Clone, Copy)]
pub struct RendererConfig {
    /// Offscreen render target width in pixels
    pub render_width: u32,
    /// Offscreen render target height in pixels
    pub render_height: u32,
    /// Arena capacity in vertices
    pub vertex_capacity: u32,
    /// Arena capacity in indices
    pub index_capacity: u32,
    /// Batch accumulator capacity in submissions
    pub batch_capacity: u32,
    /// Maximum number of distinct geometries (indirect command rows)
    pub max_geometries: u32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            render_width: 1280,
            render_height: 720,
            vertex_capacity: 16384,
            index_capacity: 16384,
            batch_capacity: 16384,
            max_geometries: 1024,
        }
    }
}

/// Offscreen color + depth target the frame renders into.
pub(crate) struct RenderTarget {
    pub color_view: wgpu::TextureView,
    pub depth_view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
    // Kept alive for the views above
    _color_texture: wgpu::Texture,
    _depth_texture: wgpu::Texture,
}

impl RenderTarget {
    fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let color_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Render Target Color"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: pipeline::RENDER_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });

        let depth_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Render Target Depth"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: pipeline::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        Self {
            color_view: color_texture.create_view(&wgpu::TextureViewDescriptor::default()),
            depth_view: depth_texture.create_view(&wgpu::TextureViewDescriptor::default()),
            width,
            height,
            _color_texture: color_texture,
            _depth_texture: depth_texture,
        }
    }
}

/// Instance stream buffers, one per parallel attribute stream
/// (vertex buffer slots 1-7).
pub(crate) struct InstanceBuffers {
    pub model: wgpu::Buffer,
    pub tint: wgpu::Buffer,
    pub texture_slot: wgpu::Buffer,
    pub albedo: wgpu::Buffer,
    pub metallic: wgpu::Buffer,
    pub roughness: wgpu::Buffer,
    pub ao: wgpu::Buffer,
}

impl InstanceBuffers {
    fn new(device: &wgpu::Device, batch_capacity: u64) -> Self {
        let stream = |label: &str, element_size: u64| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: batch_capacity * element_size,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };

        Self {
            model: stream("Instance Models", 64),
            tint: stream("Instance Tints", 4),
            texture_slot: stream("Instance Texture Slots", 4),
            albedo: stream("Instance Albedo", 12),
            metallic: stream("Instance Metallic", 4),
            roughness: stream("Instance Roughness", 4),
            ao: stream("Instance AO", 4),
        }
    }
}

/// All GPU buffers owned by the renderer.
pub(crate) struct GpuBuffers {
    pub arena_vertices: wgpu::Buffer,
    pub arena_indices: wgpu::Buffer,
    pub indirect: wgpu::Buffer,
    pub instances: InstanceBuffers,
    pub camera: wgpu::Buffer,
    pub lights: wgpu::Buffer,
    pub draw: wgpu::Buffer,
}

impl GpuBuffers {
    fn new(device: &wgpu::Device, config: &RendererConfig) -> Self {
        let buffer = |label: &str, size: u64, usage: wgpu::BufferUsages| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: usage | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };

        Self {
            arena_vertices: buffer(
                "Geometry Arena Vertices",
                config.vertex_capacity as u64 * VERTEX_STRIDE as u64,
                wgpu::BufferUsages::VERTEX,
            ),
            arena_indices: buffer(
                "Geometry Arena Indices",
                config.index_capacity as u64 * INDEX_STRIDE as u64,
                wgpu::BufferUsages::INDEX,
            ),
            indirect: buffer(
                "Indirect Draw Commands",
                config.max_geometries as u64
                    * core::mem::size_of::<DrawIndexedIndirect>() as u64,
                wgpu::BufferUsages::INDIRECT,
            ),
            instances: InstanceBuffers::new(device, config.batch_capacity as u64),
            camera: buffer(
                "Camera Block",
                core::mem::size_of::<CameraBlock>() as u64,
                wgpu::BufferUsages::UNIFORM,
            ),
            lights: buffer(
                "Lights Block",
                core::mem::size_of::<LightsBlock>() as u64,
                wgpu::BufferUsages::UNIFORM,
            ),
            draw: buffer(
                "Draw Block",
                core::mem::size_of::<DrawBlock>() as u64,
                wgpu::BufferUsages::UNIFORM,
            ),
        }
    }
}

/// The batched geometry renderer.
///
/// Call sequence per frame: `begin`, any number of `submit`s, `end`.
/// Single-threaded and synchronous: when `end` returns, every pending draw
/// has been submitted to the device queue.
pub struct Renderer {
    pub(crate) device: wgpu::Device,
    pub(crate) queue: wgpu::Queue,
    pub(crate) config: RendererConfig,
    pub(crate) target: RenderTarget,
    pub(crate) buffers: GpuBuffers,
    pub(crate) layouts: BindLayouts,
    pub(crate) frame_bind_group: wgpu::BindGroup,
    pub(crate) draw_bind_group: wgpu::BindGroup,
    pub(crate) shaders: ShaderTable,
    pub(crate) textures: TextureRegistry,
    pub(crate) slots: TextureSlotAllocator,
    pub(crate) arena: GeometryArena,
    pub(crate) batch: BatchQueue,
    pub(crate) lights: Vec<Light>,
    pub(crate) in_frame: bool,
}

impl Renderer {
    /// Create the renderer and all its GPU resources.
    ///
    /// The device must have been requested with
    /// `wgpu::Features::MULTI_DRAW_INDIRECT_COUNT`.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, config: RendererConfig) -> Result<Self> {
        anyhow::ensure!(
            device.features().contains(wgpu::Features::MULTI_DRAW_INDIRECT_COUNT),
            "device is missing MULTI_DRAW_INDIRECT_COUNT, required for batched drawing"
        );

        let target = RenderTarget::new(&device, config.render_width, config.render_height);
        let buffers = GpuBuffers::new(&device, &config);
        let layouts = BindLayouts::new(&device);
        let textures = TextureRegistry::new(&device, &queue);

        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Bind Group"),
            layout: &layouts.frame,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffers.camera.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: buffers.lights.as_entire_binding(),
                },
            ],
        });

        let draw_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Draw Bind Group"),
            layout: &layouts.draw,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffers.draw.as_entire_binding(),
            }],
        });

        tracing::info!(
            "Renderer initialized: {}x{} target, {} vertex / {} index arena, batch {} ({} geometries max)",
            config.render_width,
            config.render_height,
            config.vertex_capacity,
            config.index_capacity,
            config.batch_capacity,
            config.max_geometries,
        );

        Ok(Self {
            device,
            queue,
            config,
            target,
            buffers,
            layouts,
            frame_bind_group,
            draw_bind_group,
            shaders: ShaderTable::new(),
            textures,
            slots: TextureSlotAllocator::new(MAX_TEXTURE_SLOTS),
            arena: GeometryArena::new(
                config.vertex_capacity,
                config.index_capacity,
                config.max_geometries,
            ),
            batch: BatchQueue::new(config.batch_capacity as usize, config.max_geometries as usize),
            lights: Vec::with_capacity(MAX_LIGHTS),
            in_frame: false,
        })
    }

    /// Build a pipeline for `module` against the renderer's layouts and
    /// register it. Materials reference the returned handle.
    pub fn register_shader(
        &mut self,
        module: &wgpu::ShaderModule,
        kind: ShaderKind,
    ) -> ShaderHandle {
        let pipeline = pipeline::create_pipeline(&self.device, module, kind, &self.layouts);
        self.shaders.register(ShaderEntry { pipeline, kind })
    }

    /// Register an externally loaded texture view.
    pub fn register_texture(&mut self, view: wgpu::TextureView) -> TextureHandle {
        self.textures.register(view)
    }

    /// The built-in 1x1 white texture, bound for untextured draws.
    pub fn white_texture(&self) -> TextureHandle {
        self.textures.white()
    }

    /// Copy a mesh into the geometry arena.
    ///
    /// Fails without touching arena state when the vertex range, index range
    /// or geometry table would overflow; callers log and skip the asset.
    pub fn add_geometry(
        &mut self,
        vertices: &[MeshVertex],
        indices: &[u32],
    ) -> Result<Geometry, ArenaError> {
        let geometry = self
            .arena
            .reserve(vertices.len() as u32, indices.len() as u32)?;

        self.queue.write_buffer(
            &self.buffers.arena_vertices,
            geometry.first_vertex as u64 * VERTEX_STRIDE as u64,
            bytemuck::cast_slice(vertices),
        );
        self.queue.write_buffer(
            &self.buffers.arena_indices,
            geometry.first_index as u64 * INDEX_STRIDE as u64,
            bytemuck::cast_slice(indices),
        );
        self.batch.commands.push_row();

        tracing::debug!(
            "Added geometry {}: {} vertices at {}, {} indices at {}",
            geometry.id,
            geometry.vertex_count,
            geometry.first_vertex,
            geometry.index_count,
            geometry.first_index,
        );

        Ok(geometry)
    }

    /// Replace the active lights. At most [`MAX_LIGHTS`] are kept; the
    /// uploaded arrays are zero-padded to that size.
    pub fn set_lights(&mut self, lights: &[Light]) {
        if lights.len() > MAX_LIGHTS {
            tracing::warn!(
                "{} lights supplied, keeping the first {}",
                lights.len(),
                MAX_LIGHTS
            );
        }
        self.lights.clear();
        self.lights
            .extend_from_slice(&lights[..lights.len().min(MAX_LIGHTS)]);
    }

    /// Color view of the rendered frame, consumed by later pipeline stages.
    pub fn color_view(&self) -> &wgpu::TextureView {
        &self.target.color_view
    }

    pub fn render_target_dimensions(&self) -> (u32, u32) {
        (self.target.width, self.target.height)
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn geometry_count(&self) -> u32 {
        self.arena.geometry_count()
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}
