//! Shared CPU-side data definitions for the Vermilion renderer
//!
//! Provides the mesh vertex type stored in the geometry arena and the
//! color packing helpers used by the instance tint stream. Kept free of
//! any GPU dependency so tools and tests can use it directly.

use bytemuck::{Pod, Zeroable};
use glam::Vec4;

// ============================================================================
// Mesh Vertex
// ============================================================================

/// One arena vertex: position, normal, texture coordinates.
///
/// Layout matches the GPU vertex buffer byte-for-byte (32-byte stride).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// Vertex stride in bytes
pub const VERTEX_STRIDE: u32 = core::mem::size_of::<MeshVertex>() as u32;

/// Index stride in bytes (u32 indices)
pub const INDEX_STRIDE: u32 = core::mem::size_of::<u32>() as u32;

impl MeshVertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

// ============================================================================
// Color Packing
// ============================================================================

/// Convert f32 to unsigned normalized 8-bit integer (unorm8)
///
/// Maps f32 range [0.0, 1.0] to u8 range [0, 255].
#[inline]
pub fn f32_to_unorm8(value: f32) -> u8 {
    let clamped = value.clamp(0.0, 1.0);
    (clamped * 255.0) as u8
}

/// Pack an RGBA color into a single u32, r in the low byte.
///
/// This is the wire format of the instance tint stream (Unorm8x4 attribute).
#[inline]
pub fn pack_color_rgba(color: Vec4) -> u32 {
    let r = f32_to_unorm8(color.x) as u32;
    let g = f32_to_unorm8(color.y) as u32;
    let b = f32_to_unorm8(color.z) as u32;
    let a = f32_to_unorm8(color.w) as u32;

    r | (g << 8) | (b << 16) | (a << 24)
}

/// Unpack a u32 RGBA color back to f32 components.
#[inline]
pub fn unpack_color_rgba(packed: u32) -> Vec4 {
    Vec4::new(
        (packed & 0xFF) as f32 / 255.0,
        ((packed >> 8) & 0xFF) as f32 / 255.0,
        ((packed >> 16) & 0xFF) as f32 / 255.0,
        ((packed >> 24) & 0xFF) as f32 / 255.0,
    )
}
