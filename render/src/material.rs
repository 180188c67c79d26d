//! Materials and resource handles
//!
//! A material pairs a shader with optional texture/tint state plus the flag
//! bitset that routes submissions through the batch accumulator or the
//! immediate path.

use glam::{Vec3, Vec4};

/// Handle to a registered shader pipeline
///
/// Ordering is meaningful: the flush engine sorts batch entries by shader
/// handle to group state changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShaderHandle(pub u32);

/// Handle to a registered texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

impl TextureHandle {
    /// Invalid/null texture handle
    pub const INVALID: TextureHandle = TextureHandle(0);
}

/// Material flag: submissions go through the batch accumulator
pub const FLAG_BATCHED: u32 = 1 << 0;
/// Material flag: material carries a texture
pub const FLAG_TEXTURE: u32 = 1 << 1;
/// Material flag: material carries a flat tint
pub const FLAG_TINT: u32 = 1 << 2;

/// Shader reference, optional texture, optional flat tint, and routing flags.
///
/// Shared by many draw submissions. Immutable after construction except for
/// texture swaps via [`Material::set_texture`].
#[derive(Debug, Clone)]
pub struct Material {
    shader: ShaderHandle,
    texture: Option<TextureHandle>,
    tint: Vec4,
    flags: u32,
}

impl Material {
    /// Create a material with no texture and no tint.
    pub fn new(shader: ShaderHandle, batched: bool) -> Self {
        Self {
            shader,
            texture: None,
            tint: Vec4::ZERO,
            flags: if batched { FLAG_BATCHED } else { 0 },
        }
    }

    /// Attach a texture (sets `FLAG_TEXTURE`).
    pub fn with_texture(mut self, texture: TextureHandle) -> Self {
        self.texture = Some(texture);
        self.flags |= FLAG_TEXTURE;
        self
    }

    /// Attach a flat tint (sets `FLAG_TINT`).
    pub fn with_tint(mut self, tint: Vec4) -> Self {
        self.tint = tint;
        self.flags |= FLAG_TINT;
        self
    }

    /// Swap the texture. The only mutation allowed after construction.
    pub fn set_texture(&mut self, texture: TextureHandle) {
        self.texture = Some(texture);
        self.flags |= FLAG_TEXTURE;
    }

    pub fn shader(&self) -> ShaderHandle {
        self.shader
    }

    pub fn texture(&self) -> Option<TextureHandle> {
        self.texture
    }

    pub fn tint(&self) -> Vec4 {
        self.tint
    }

    pub fn is_flag_set(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    pub fn is_batched(&self) -> bool {
        self.is_flag_set(FLAG_BATCHED)
    }
}

/// Per-instance material scalars fed to the shading model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialScalars {
    pub albedo: Vec3,
    pub metallic: f32,
    pub roughness: f32,
    pub ao: f32,
}

impl Default for MaterialScalars {
    fn default() -> Self {
        Self {
            albedo: Vec3::ONE,
            metallic: 0.0,
            roughness: 1.0,
            ao: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_from_construction() {
        let plain = Material::new(ShaderHandle(0), true);
        assert!(plain.is_batched());
        assert!(!plain.is_flag_set(FLAG_TEXTURE));
        assert!(!plain.is_flag_set(FLAG_TINT));

        let textured = Material::new(ShaderHandle(0), false)
            .with_texture(TextureHandle(3))
            .with_tint(Vec4::ONE);
        assert!(!textured.is_batched());
        assert!(textured.is_flag_set(FLAG_TEXTURE));
        assert!(textured.is_flag_set(FLAG_TINT));
        assert_eq!(textured.texture(), Some(TextureHandle(3)));
    }

    #[test]
    fn test_texture_swap() {
        let mut material = Material::new(ShaderHandle(1), true);
        assert_eq!(material.texture(), None);

        material.set_texture(TextureHandle(7));
        assert_eq!(material.texture(), Some(TextureHandle(7)));
        assert!(material.is_flag_set(FLAG_TEXTURE));
    }
}
