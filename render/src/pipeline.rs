//! Shader pipeline management
//!
//! Builds render pipelines against the renderer's fixed bind group layouts
//! and vertex buffer layouts. Shader *source* handling lives outside the
//! core: callers compile a `wgpu::ShaderModule` and register it here, and
//! get back the handle that materials reference.

use vermilion_common::VERTEX_STRIDE;

use crate::material::ShaderHandle;
use crate::texture_slots::MAX_TEXTURE_SLOTS;

/// Color format of the offscreen render target
pub(crate) const RENDER_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Depth/stencil format of the offscreen render target
pub(crate) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

/// Which draw path a registered shader serves.
///
/// Batched pipelines consume the instanced attribute streams; immediate
/// pipelines read the per-draw uniform block instead. Dispatch is a single
/// match on this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderKind {
    Batched,
    Immediate,
}

/// Registered shader: compiled pipeline plus its path tag.
pub(crate) struct ShaderEntry {
    pub pipeline: wgpu::RenderPipeline,
    pub kind: ShaderKind,
}

/// Dense table of registered shaders, indexed by handle.
#[derive(Default)]
pub(crate) struct ShaderTable {
    entries: Vec<ShaderEntry>,
}

impl ShaderTable {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn register(&mut self, entry: ShaderEntry) -> ShaderHandle {
        let handle = ShaderHandle(self.entries.len() as u32);
        tracing::debug!("Registered {:?} shader as {:?}", entry.kind, handle);
        self.entries.push(entry);
        handle
    }

    pub fn get(&self, handle: ShaderHandle) -> Option<&ShaderEntry> {
        self.entries.get(handle.0 as usize)
    }
}

/// The three bind group layouts every pipeline is built against:
/// group 0 = per-frame uniforms, group 1 = texture slots, group 2 = per-draw
/// uniforms (immediate path only).
pub(crate) struct BindLayouts {
    pub frame: wgpu::BindGroupLayout,
    pub textures: wgpu::BindGroupLayout,
    pub draw: wgpu::BindGroupLayout,
}

impl BindLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            frame: create_frame_bind_group_layout(device),
            textures: create_texture_bind_group_layout(device),
            draw: create_draw_bind_group_layout(device),
        }
    }
}

// =============================================================================
// Vertex buffer layouts
// =============================================================================
//
// Buffer slot assignment (matches Renderer's set_vertex_buffer calls):
//   0: mesh vertices          (per vertex)
//   1: model matrices         (per instance)
//   2: packed tints           (per instance)
//   3: texture slot indices   (per instance)
//   4: albedo                 (per instance)
//   5: metallic               (per instance)
//   6: roughness              (per instance)
//   7: ambient occlusion      (per instance)

const MESH_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

const MODEL_ATTRIBUTES: [wgpu::VertexAttribute; 4] =
    wgpu::vertex_attr_array![3 => Float32x4, 4 => Float32x4, 5 => Float32x4, 6 => Float32x4];

const TINT_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![7 => Unorm8x4];

const TEXTURE_SLOT_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![8 => Uint32];

const ALBEDO_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![9 => Float32x3];

const METALLIC_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![10 => Float32];

const ROUGHNESS_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![11 => Float32];

const AO_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![12 => Float32];

fn mesh_vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: VERTEX_STRIDE as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &MESH_ATTRIBUTES,
    }
}

fn instance_layout(
    array_stride: u64,
    attributes: &'static [wgpu::VertexAttribute],
) -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes,
    }
}

fn batched_vertex_layouts() -> [wgpu::VertexBufferLayout<'static>; 8] {
    [
        mesh_vertex_layout(),
        instance_layout(64, &MODEL_ATTRIBUTES),
        instance_layout(4, &TINT_ATTRIBUTES),
        instance_layout(4, &TEXTURE_SLOT_ATTRIBUTES),
        instance_layout(12, &ALBEDO_ATTRIBUTES),
        instance_layout(4, &METALLIC_ATTRIBUTES),
        instance_layout(4, &ROUGHNESS_ATTRIBUTES),
        instance_layout(4, &AO_ATTRIBUTES),
    ]
}

// =============================================================================
// Bind group layouts
// =============================================================================

/// Group 0: camera block (binding 0) and lights block (binding 1).
fn create_frame_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let uniform = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    };

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Frame Bind Group Layout"),
        entries: &[uniform(0), uniform(1)],
    })
}

/// Group 1: one texture binding per hardware slot plus the shared sampler.
fn create_texture_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let mut entries = Vec::with_capacity(MAX_TEXTURE_SLOTS + 1);
    for slot in 0..MAX_TEXTURE_SLOTS as u32 {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: slot,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
    }
    entries.push(wgpu::BindGroupLayoutEntry {
        binding: MAX_TEXTURE_SLOTS as u32,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    });

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Texture Slot Bind Group Layout"),
        entries: &entries,
    })
}

/// Group 2: per-draw uniform block for the immediate path.
fn create_draw_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Draw Bind Group Layout"),
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
    })
}

// =============================================================================
// Pipeline creation
// =============================================================================

/// Create a render pipeline for a registered shader module.
pub(crate) fn create_pipeline(
    device: &wgpu::Device,
    module: &wgpu::ShaderModule,
    kind: ShaderKind,
    layouts: &BindLayouts,
) -> wgpu::RenderPipeline {
    let (label, group_layouts): (_, Vec<&wgpu::BindGroupLayout>) = match kind {
        ShaderKind::Batched => (
            "Batched Pipeline",
            vec![&layouts.frame, &layouts.textures],
        ),
        ShaderKind::Immediate => (
            "Immediate Pipeline",
            vec![&layouts.frame, &layouts.textures, &layouts.draw],
        ),
    };

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &group_layouts,
        push_constant_ranges: &[],
    });

    let batched_buffers = batched_vertex_layouts();
    let immediate_buffers = [mesh_vertex_layout()];
    let buffers: &[wgpu::VertexBufferLayout] = match kind {
        ShaderKind::Batched => &batched_buffers,
        ShaderKind::Immediate => &immediate_buffers,
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs"),
            buffers,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some("fs"),
            targets: &[Some(wgpu::ColorTargetState {
                format: RENDER_FORMAT,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: Some(wgpu::Face::Back),
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
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
        cache: None,
    })
}
