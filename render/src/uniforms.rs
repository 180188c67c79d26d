//! Uniform block layouts
//!
//! CPU-side mirrors of the shader uniform blocks: the per-frame camera
//! block, the fixed-size light arrays, and the per-draw block used by the
//! immediate path. All blocks are `#[repr(C)]` Pod structs uploaded with
//! `queue.write_buffer`.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

/// Maximum number of active lights the shaders receive.
///
/// The light arrays are always uploaded at this size, zero-padded when fewer
/// lights are set.
pub const MAX_LIGHTS: usize = 4;

/// Scene-wide uniforms supplied to `begin()` each frame.
///
/// A total struct rather than a keyed map: a missing projection or view is
/// unrepresentable, which is the `begin()` contract.
#[derive(Debug, Clone, Copy)]
pub struct SceneUniforms {
    pub projection: Mat4,
    pub view: Mat4,
    pub view_position: Vec3,
}

/// One scene light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub position: Vec3,
    pub color: Vec3,
}

/// Camera uniform block (group 0, binding 0).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CameraBlock {
    pub projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub view_position: [f32; 4],
}

impl CameraBlock {
    pub fn from_scene(scene: &SceneUniforms) -> Self {
        Self {
            projection: scene.projection.to_cols_array_2d(),
            view: scene.view.to_cols_array_2d(),
            view_position: scene.view_position.extend(1.0).to_array(),
        }
    }
}

/// Lights uniform block (group 0, binding 1). Fixed-size arrays, vec4
/// elements for std140-compatible stride.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct LightsBlock {
    pub positions: [[f32; 4]; MAX_LIGHTS],
    pub colors: [[f32; 4]; MAX_LIGHTS],
}

impl LightsBlock {
    /// Pack up to [`MAX_LIGHTS`] lights, zero-padding the remainder.
    pub fn from_lights(lights: &[Light]) -> Self {
        let mut block = Self::zeroed();
        for (i, light) in lights.iter().take(MAX_LIGHTS).enumerate() {
            block.positions[i] = light.position.extend(1.0).to_array();
            block.colors[i] = light.color.extend(1.0).to_array();
        }
        block
    }
}

/// Per-draw uniform block for the immediate path (group 2, binding 0).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct DrawBlock {
    pub model: [[f32; 4]; 4],
    pub tint: [f32; 4],
    pub texture_slot: u32,
    pub _pad: [u32; 3],
}

impl DrawBlock {
    pub fn new(model: Mat4, tint: Vec4, texture_slot: u32) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            tint: tint.to_array(),
            texture_slot,
            _pad: [0; 3],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_sizes() {
        assert_eq!(core::mem::size_of::<CameraBlock>(), 144);
        assert_eq!(core::mem::size_of::<LightsBlock>(), 128);
        assert_eq!(core::mem::size_of::<DrawBlock>(), 96);
    }

    #[test]
    fn test_lights_zero_padded() {
        let lights = [Light {
            position: Vec3::new(1.0, 2.0, 3.0),
            color: Vec3::new(0.5, 0.5, 0.5),
        }];
        let block = LightsBlock::from_lights(&lights);

        assert_eq!(block.positions[0], [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(block.colors[0], [0.5, 0.5, 0.5, 1.0]);
        for i in 1..MAX_LIGHTS {
            assert_eq!(block.positions[i], [0.0; 4]);
            assert_eq!(block.colors[i], [0.0; 4]);
        }
    }

    #[test]
    fn test_lights_truncated_at_max() {
        let light = Light {
            position: Vec3::ONE,
            color: Vec3::ONE,
        };
        let block = LightsBlock::from_lights(&[light; 6]);
        assert_eq!(block.positions[MAX_LIGHTS - 1], [1.0, 1.0, 1.0, 1.0]);
    }
}
