//! Texture registry
//!
//! Owns the views materials reference by handle, the built-in 1x1 white
//! fallback for untextured draws, and the cache of texture bind groups that
//! realize the slot table on the device: one bind group per distinct
//! slot-table content, reused across frames.

use hashbrown::HashMap;
use wgpu::util::DeviceExt;

use crate::material::TextureHandle;
use crate::texture_slots::{MAX_TEXTURE_SLOTS, TextureSlotAllocator};

pub(crate) struct TextureRegistry {
    views: HashMap<u32, wgpu::TextureView>,
    next_id: u32,
    white: TextureHandle,
    sampler: wgpu::Sampler,
    bind_groups: HashMap<[TextureHandle; MAX_TEXTURE_SLOTS], wgpu::BindGroup>,
}

impl TextureRegistry {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Texture Slot Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let mut registry = Self {
            views: HashMap::new(),
            next_id: 1, // 0 is reserved for INVALID
            white: TextureHandle::INVALID,
            sampler,
            bind_groups: HashMap::new(),
        };

        // 1x1 white texture for untextured draws
        let white = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("White Fallback Texture"),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &[255u8, 255, 255, 255],
        );
        registry.white = registry.register(white.create_view(&wgpu::TextureViewDescriptor::default()));

        registry
    }

    /// Register an externally created texture view and hand back its handle.
    pub fn register(&mut self, view: wgpu::TextureView) -> TextureHandle {
        let handle = TextureHandle(self.next_id);
        self.next_id += 1;
        self.views.insert(handle.0, view);
        tracing::debug!("Registered texture {:?}", handle);
        handle
    }

    /// The built-in white fallback texture.
    pub fn white(&self) -> TextureHandle {
        self.white
    }

    pub fn view_or_white(&self, handle: TextureHandle) -> &wgpu::TextureView {
        self.views
            .get(&handle.0)
            .unwrap_or_else(|| &self.views[&self.white.0])
    }

    /// Bind group realizing the slot table's current contents.
    ///
    /// Unoccupied slots bind the white fallback. Cached by table content, so
    /// recurring working sets reuse their descriptor sets across frames.
    pub fn slot_bind_group(
        &mut self,
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        slots: &TextureSlotAllocator,
    ) -> &wgpu::BindGroup {
        let mut key = [self.white; MAX_TEXTURE_SLOTS];
        for (slot, texture) in slots.bindings() {
            key[slot as usize] = texture;
        }

        if self.bind_groups.contains_key(&key) {
            return &self.bind_groups[&key];
        }

        tracing::debug!("Creating texture bind group for slot table {:?}", key);

        let mut entries: Vec<wgpu::BindGroupEntry> = key
            .iter()
            .enumerate()
            .map(|(slot, handle)| wgpu::BindGroupEntry {
                binding: slot as u32,
                resource: wgpu::BindingResource::TextureView(self.view_or_white(*handle)),
            })
            .collect();
        entries.push(wgpu::BindGroupEntry {
            binding: MAX_TEXTURE_SLOTS as u32,
            resource: wgpu::BindingResource::Sampler(&self.sampler),
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Texture Slot Bind Group"),
            layout,
            entries: &entries,
        });

        self.bind_groups.insert(key, bind_group);
        &self.bind_groups[&key]
    }
}
