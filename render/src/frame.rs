//! Frame orchestration
//!
//! `begin` uploads the scene uniforms and clears the target, `submit` routes
//! each draw request to the batch accumulator or the immediate path, and
//! `end`/`flush` drive the flush engine. Every sub-batch emission is encoded
//! and submitted on the spot: the instance buffers are rewritten from offset
//! zero per sub-batch, which is only sound because the previous sub-batch's
//! commands are already on the queue by then.

use glam::Mat4;

use crate::arena::Geometry;
use crate::batch::BatchEntry;
use crate::material::{Material, MaterialScalars};
use crate::pipeline::ShaderKind;
use crate::renderer::Renderer;
use crate::uniforms::{CameraBlock, DrawBlock, LightsBlock, SceneUniforms};

impl Renderer {
    /// Open the frame: upload the camera block and clear the render target.
    pub fn begin(&mut self, scene: &SceneUniforms) {
        debug_assert!(!self.in_frame, "begin called twice without end");
        self.in_frame = true;

        self.queue.write_buffer(
            &self.buffers.camera,
            0,
            bytemuck::bytes_of(&CameraBlock::from_scene(scene)),
        );

        // Color, depth and stencil start fresh here; every draw pass within
        // the frame loads.
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Clear Encoder"),
            });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Clear Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.target.depth_view,
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
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Submit one draw request.
    ///
    /// Batched materials are queued (flushing first if the accumulator is at
    /// capacity); non-batched materials draw immediately.
    pub fn submit(
        &mut self,
        geometry: &Geometry,
        material: &Material,
        model: Mat4,
        scalars: MaterialScalars,
    ) {
        if !self.in_frame {
            tracing::warn!("submit called outside begin/end");
        }

        if material.is_batched() {
            if self.batch.is_full() {
                self.flush();
            }
            self.batch.push(BatchEntry {
                geometry: *geometry,
                shader: material.shader(),
                texture: material.texture(),
                tint: material.tint(),
                model,
                scalars,
            });
        } else {
            self.draw_immediate(geometry, material, model);
        }
    }

    /// Close the frame, issuing all pending batched draws.
    pub fn end(&mut self) {
        self.flush();
        self.in_frame = false;
    }

    /// Sort, walk and issue everything in the batch accumulator.
    pub fn flush(&mut self) {
        if self.batch.is_empty() {
            return;
        }

        let Renderer {
            device,
            queue,
            target,
            buffers,
            layouts,
            frame_bind_group,
            shaders,
            textures,
            slots,
            batch,
            lights,
            ..
        } = self;

        let fallback = textures.white();
        let lights_block = LightsBlock::from_lights(lights);

        batch.flush(slots, fallback, |sub, slots, table, streams| {
            let Some(entry) = shaders.get(sub.shader) else {
                tracing::warn!("sub-batch references unregistered shader {:?}", sub.shader);
                return;
            };
            if entry.kind != ShaderKind::Batched {
                tracing::warn!(
                    "batched material references {:?} shader {:?}",
                    entry.kind,
                    sub.shader
                );
                return;
            }

            let n = sub.instance_count as usize;
            let instances = &buffers.instances;
            queue.write_buffer(&instances.model, 0, bytemuck::cast_slice(&streams.model[..n]));
            queue.write_buffer(&instances.tint, 0, bytemuck::cast_slice(&streams.tint[..n]));
            queue.write_buffer(
                &instances.texture_slot,
                0,
                bytemuck::cast_slice(&streams.texture_slot[..n]),
            );
            queue.write_buffer(&instances.albedo, 0, bytemuck::cast_slice(&streams.albedo[..n]));
            queue.write_buffer(
                &instances.metallic,
                0,
                bytemuck::cast_slice(&streams.metallic[..n]),
            );
            queue.write_buffer(
                &instances.roughness,
                0,
                bytemuck::cast_slice(&streams.roughness[..n]),
            );
            queue.write_buffer(&instances.ao, 0, bytemuck::cast_slice(&streams.ao[..n]));
            queue.write_buffer(&buffers.lights, 0, bytemuck::bytes_of(&lights_block));
            queue.write_buffer(&buffers.indirect, 0, bytemuck::cast_slice(table.rows()));

            let texture_bind_group = textures.slot_bind_group(device, &layouts.textures, slots);

            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Sub-Batch Encoder"),
            });
            {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Sub-Batch Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &target.color_view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                        depth_slice: None,
                    })],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: &target.depth_view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        }),
                    }),
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });

                pass.set_pipeline(&entry.pipeline);
                pass.set_bind_group(0, &*frame_bind_group, &[]);
                pass.set_bind_group(1, texture_bind_group, &[]);
                pass.set_vertex_buffer(0, buffers.arena_vertices.slice(..));
                pass.set_vertex_buffer(1, instances.model.slice(..));
                pass.set_vertex_buffer(2, instances.tint.slice(..));
                pass.set_vertex_buffer(3, instances.texture_slot.slice(..));
                pass.set_vertex_buffer(4, instances.albedo.slice(..));
                pass.set_vertex_buffer(5, instances.metallic.slice(..));
                pass.set_vertex_buffer(6, instances.roughness.slice(..));
                pass.set_vertex_buffer(7, instances.ao.slice(..));
                pass.set_index_buffer(buffers.arena_indices.slice(..), wgpu::IndexFormat::Uint32);

                // Rows with a zero instance count are iterated by the device
                // and draw nothing. Accepted overhead.
                pass.multi_draw_indexed_indirect(&buffers.indirect, 0, table.len() as u32);
            }
            queue.submit(std::iter::once(encoder.finish()));
        });
    }

    /// Immediate path: one non-instanced indexed draw with per-draw uniforms.
    fn draw_immediate(&mut self, geometry: &Geometry, material: &Material, model: Mat4) {
        let Some(entry) = self.shaders.get(material.shader()) else {
            tracing::warn!("draw references unregistered shader {:?}", material.shader());
            return;
        };
        let pipeline = match entry.kind {
            ShaderKind::Immediate => &entry.pipeline,
            ShaderKind::Batched => {
                tracing::warn!(
                    "non-batched material references batched shader {:?}",
                    material.shader()
                );
                return;
            }
        };

        // An immediate draw is its own flush boundary; a full ring can be
        // cleared here without invalidating unissued work.
        if self.slots.is_full() {
            self.slots.clear();
        }
        let texture = material.texture().unwrap_or(self.textures.white());
        let assignment = self.slots.get_slot(texture);

        self.queue.write_buffer(
            &self.buffers.draw,
            0,
            bytemuck::bytes_of(&DrawBlock::new(model, material.tint(), assignment.slot)),
        );

        let texture_bind_group =
            self.textures
                .slot_bind_group(&self.device, &self.layouts.textures, &self.slots);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Immediate Draw Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Immediate Draw Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.target.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    }),
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &self.frame_bind_group, &[]);
            pass.set_bind_group(1, texture_bind_group, &[]);
            pass.set_bind_group(2, &self.draw_bind_group, &[]);
            pass.set_vertex_buffer(0, self.buffers.arena_vertices.slice(..));
            pass.set_index_buffer(
                self.buffers.arena_indices.slice(..),
                wgpu::IndexFormat::Uint32,
            );

            let first = geometry.first_index;
            pass.draw_indexed(
                first..first + geometry.index_count,
                geometry.first_vertex as i32,
                0..1,
            );
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}
