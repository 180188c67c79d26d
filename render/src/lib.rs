//! Vermilion batched geometry renderer
//!
//! Accumulates per-frame draw requests, packs them into shared GPU-resident
//! buffers, and issues a minimal number of indirect multi-draw calls.
//!
//! # Architecture
//!
//! - [`GeometryArena`]: append-only vertex/index storage with stable
//!   `(first_vertex, first_index, counts, id)` handles
//! - [`TextureSlotAllocator`]: fixed ring mapping texture identities to
//!   hardware binding slots
//! - [`DrawCommandTable`]: one indirect draw record per geometry id
//! - [`BatchQueue`]: pending submissions plus the parallel per-instance
//!   attribute streams, sorted and walked into sub-batches on flush
//! - [`Renderer`]: the context object owning every GPU resource, driven
//!   with `begin` / `submit` / `end` once per frame
//!
//! Batched materials flow through the accumulator and come out as indirect
//! multi-draws; non-batched materials take the immediate path (one indexed
//! draw with per-draw uniforms).

mod arena;
mod batch;
mod commands;
mod frame;
mod material;
mod pipeline;
mod renderer;
mod texture_slots;
mod textures;
mod uniforms;

pub use arena::{ArenaError, Geometry, GeometryArena};
pub use batch::{BatchEntry, BatchQueue, InstanceStreams, SubBatch};
pub use commands::{DrawCommandTable, DrawIndexedIndirect};
pub use material::{
    FLAG_BATCHED, FLAG_TEXTURE, FLAG_TINT, Material, MaterialScalars, ShaderHandle, TextureHandle,
};
pub use pipeline::ShaderKind;
pub use renderer::{Renderer, RendererConfig};
pub use texture_slots::{MAX_TEXTURE_SLOTS, SlotAssignment, TextureSlotAllocator};
pub use uniforms::{Light, MAX_LIGHTS, SceneUniforms};

// Re-export the mesh vertex type alongside the API that consumes it
pub use vermilion_common::MeshVertex;
