//! Batch accumulator and flush engine
//!
//! Pending submissions are queued per frame, then sorted and walked to
//! populate the draw command table and the per-instance attribute streams.
//! The walk emits one sub-batch per shader group, splitting early whenever
//! the texture slot ring runs out. Emission itself goes through a sink
//! closure so the walk stays a plain CPU algorithm: the renderer's sink
//! uploads and draws, tests record.

use glam::{Mat4, Vec4};

use vermilion_common::pack_color_rgba;

use crate::arena::Geometry;
use crate::commands::DrawCommandTable;
use crate::material::{MaterialScalars, ShaderHandle, TextureHandle};
use crate::texture_slots::TextureSlotAllocator;

/// One pending submission, captured by value at `submit` time.
///
/// Lifetime is a single accumulation cycle: entries are consumed by the next
/// flush.
#[derive(Debug, Clone, Copy)]
pub struct BatchEntry {
    pub geometry: Geometry,
    pub shader: ShaderHandle,
    pub texture: Option<TextureHandle>,
    pub tint: Vec4,
    pub model: Mat4,
    pub scalars: MaterialScalars,
}

/// Parallel per-instance attribute streams.
///
/// Pushed in lockstep during the flush walk and cleared after every
/// sub-batch emission, so stream index `i` is instance `i` of the sub-batch
/// being built. The device indexes instance attributes by absolute instance
/// number, which makes this correspondence load-bearing.
#[derive(Debug, Default)]
pub struct InstanceStreams {
    pub model: Vec<[[f32; 4]; 4]>,
    pub tint: Vec<u32>,
    pub texture_slot: Vec<u32>,
    pub albedo: Vec<[f32; 3]>,
    pub metallic: Vec<f32>,
    pub roughness: Vec<f32>,
    pub ao: Vec<f32>,
}

impl InstanceStreams {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            model: Vec::with_capacity(capacity),
            tint: Vec::with_capacity(capacity),
            texture_slot: Vec::with_capacity(capacity),
            albedo: Vec::with_capacity(capacity),
            metallic: Vec::with_capacity(capacity),
            roughness: Vec::with_capacity(capacity),
            ao: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, model: Mat4, tint: u32, texture_slot: u32, scalars: &MaterialScalars) {
        self.model.push(model.to_cols_array_2d());
        self.tint.push(tint);
        self.texture_slot.push(texture_slot);
        self.albedo.push(scalars.albedo.to_array());
        self.metallic.push(scalars.metallic);
        self.roughness.push(scalars.roughness);
        self.ao.push(scalars.ao);
    }

    pub fn len(&self) -> usize {
        self.model.len()
    }

    pub fn is_empty(&self) -> bool {
        self.model.is_empty()
    }

    pub fn clear(&mut self) {
        self.model.clear();
        self.tint.clear();
        self.texture_slot.clear();
        self.albedo.clear();
        self.metallic.clear();
        self.roughness.clear();
        self.ao.clear();
    }
}

/// One emitted sub-batch: bind `shader`, then issue the indirect multi-draw
/// for `instance_count` instances described by the command table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubBatch {
    pub shader: ShaderHandle,
    pub instance_count: u32,
}

/// Queue of pending submissions plus the streams and command table the
/// flush walk populates.
#[derive(Debug)]
pub struct BatchQueue {
    capacity: usize,
    entries: Vec<BatchEntry>,
    pub streams: InstanceStreams,
    pub commands: DrawCommandTable,
}

impl BatchQueue {
    pub fn new(capacity: usize, max_geometries: usize) -> Self {
        Self {
            capacity,
            entries: Vec::with_capacity(capacity),
            streams: InstanceStreams::with_capacity(capacity),
            commands: DrawCommandTable::new(max_geometries),
        }
    }

    /// Queue is at capacity; the caller flushes before enqueueing more.
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, entry: BatchEntry) {
        debug_assert!(
            self.entries.len() < self.capacity,
            "batch accumulator overflow; flush before enqueueing"
        );
        self.entries.push(entry);
    }

    /// Sort, walk and emit the queued entries, leaving the queue empty.
    ///
    /// The walk:
    /// 1. stable-sorts by `(shader, geometry id)` — submission order is the
    ///    tie-break, preserving FIFO draw order within a group;
    /// 2. records `first_instance` and the geometry range on the first entry
    ///    seen for each geometry, counts instances on every entry;
    /// 3. pushes the entry's attributes onto the streams in walk order;
    /// 4. emits a sub-batch at every shader boundary, and whenever the slot
    ///    ring is full before an entry's texture can resolve — the ring is
    ///    cleared only after that emission, so no slot is rebound under an
    ///    unissued draw.
    ///
    /// After each emission the touched command rows are zeroed and the
    /// streams restart from zero; `emit` sees the table and streams exactly
    /// as the device must consume them.
    pub fn flush<F>(&mut self, slots: &mut TextureSlotAllocator, fallback: TextureHandle, mut emit: F)
    where
        F: FnMut(SubBatch, &TextureSlotAllocator, &DrawCommandTable, &InstanceStreams),
    {
        if self.entries.is_empty() {
            return;
        }

        self.entries.sort_by_key(|e| (e.shader, e.geometry.id));

        let entries = std::mem::take(&mut self.entries);
        let mut running: u32 = 0;
        let mut current_shader = entries[0].shader;

        for entry in &entries {
            if entry.shader != current_shader {
                if running > 0 {
                    emit(
                        SubBatch {
                            shader: current_shader,
                            instance_count: running,
                        },
                        slots,
                        &self.commands,
                        &self.streams,
                    );
                    self.commands.reset_counts();
                    self.streams.clear();
                    running = 0;
                }
                current_shader = entry.shader;
            }

            // A full ring is a hard flush boundary: everything accumulated
            // so far goes out before this entry binds anything.
            if slots.is_full() {
                if running > 0 {
                    emit(
                        SubBatch {
                            shader: current_shader,
                            instance_count: running,
                        },
                        slots,
                        &self.commands,
                        &self.streams,
                    );
                    self.commands.reset_counts();
                    self.streams.clear();
                    running = 0;
                }
                slots.clear();
            }

            let row = self.commands.row_mut(entry.geometry.id);
            if row.instance_count == 0 {
                row.index_count = entry.geometry.index_count;
                row.first_index = entry.geometry.first_index;
                row.base_vertex = entry.geometry.first_vertex;
                row.first_instance = running;
            }
            row.instance_count += 1;
            running += 1;

            let assignment = slots.get_slot(entry.texture.unwrap_or(fallback));
            self.streams.push(
                entry.model,
                pack_color_rgba(entry.tint),
                assignment.slot,
                &entry.scalars,
            );
        }

        if running > 0 {
            emit(
                SubBatch {
                    shader: current_shader,
                    instance_count: running,
                },
                slots,
                &self.commands,
                &self.streams,
            );
        }
        self.commands.reset_counts();
        self.streams.clear();

        // Keep the queue allocation for the next cycle.
        self.entries = entries;
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::DrawIndexedIndirect;

    fn geometry(id: u32) -> Geometry {
        Geometry {
            id,
            first_vertex: id * 100,
            first_index: id * 300,
            vertex_count: 100,
            index_count: 300,
        }
    }

    fn entry(geometry_id: u32, shader: u32) -> BatchEntry {
        BatchEntry {
            geometry: geometry(geometry_id),
            shader: ShaderHandle(shader),
            texture: None,
            tint: Vec4::ONE,
            model: Mat4::IDENTITY,
            scalars: MaterialScalars::default(),
        }
    }

    struct Recorded {
        sub: SubBatch,
        rows: Vec<DrawIndexedIndirect>,
        tints: Vec<u32>,
    }

    fn run_flush(
        queue: &mut BatchQueue,
        slots: &mut TextureSlotAllocator,
    ) -> Vec<Recorded> {
        let mut emitted = Vec::new();
        queue.flush(slots, TextureHandle::INVALID, |sub, _, table, streams| {
            emitted.push(Recorded {
                sub,
                rows: table.rows().to_vec(),
                tints: streams.tint.clone(),
            });
        });
        emitted
    }

    fn queue_for(geometries: usize) -> BatchQueue {
        let mut queue = BatchQueue::new(64, geometries);
        for _ in 0..geometries {
            queue.commands.push_row();
        }
        queue
    }

    #[test]
    fn test_single_submission_round_trip() {
        let mut queue = queue_for(1);
        let mut slots = TextureSlotAllocator::new(4);

        queue.push(entry(0, 0));
        let emitted = run_flush(&mut queue, &mut slots);

        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].sub.instance_count, 1);
        assert_eq!(emitted[0].rows[0].instance_count, 1);
        assert_eq!(emitted[0].rows[0].first_instance, 0);
        assert_eq!(emitted[0].rows[0].index_count, 300);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_instances_grouped_by_geometry() {
        let mut queue = queue_for(2);
        let mut slots = TextureSlotAllocator::new(4);

        // Interleaved submission; the sort makes G0's instances contiguous.
        queue.push(entry(0, 0));
        queue.push(entry(1, 0));
        queue.push(entry(0, 0));

        let emitted = run_flush(&mut queue, &mut slots);
        assert_eq!(emitted.len(), 1);

        let rows = &emitted[0].rows;
        assert_eq!(rows[0].instance_count, 2);
        assert_eq!(rows[0].first_instance, 0);
        assert_eq!(rows[1].instance_count, 1);
        assert_eq!(rows[1].first_instance, 2);
        assert_eq!(emitted[0].sub.instance_count, 3);
    }

    #[test]
    fn test_geometry_range_copied_once() {
        let mut queue = queue_for(2);
        let mut slots = TextureSlotAllocator::new(4);

        queue.push(entry(1, 0));
        let emitted = run_flush(&mut queue, &mut slots);

        let row = emitted[0].rows[1];
        assert_eq!(row.first_index, 300);
        assert_eq!(row.base_vertex, 100);
        assert_eq!(row.index_count, 300);
    }

    #[test]
    fn test_shader_boundary_splits_sub_batches() {
        let mut queue = queue_for(2);
        let mut slots = TextureSlotAllocator::new(4);

        // Submitted against shader 1 first; the sort brings shader 0 ahead.
        queue.push(entry(0, 1));
        queue.push(entry(1, 0));
        queue.push(entry(0, 1));

        let emitted = run_flush(&mut queue, &mut slots);

        assert_eq!(emitted.len(), 2);
        assert_eq!(emitted[0].sub.shader, ShaderHandle(0));
        assert_eq!(emitted[0].sub.instance_count, 1);
        assert_eq!(emitted[1].sub.shader, ShaderHandle(1));
        assert_eq!(emitted[1].sub.instance_count, 2);

        // The second sub-batch restarts instance numbering at zero.
        assert_eq!(emitted[1].rows[0].first_instance, 0);
        assert_eq!(emitted[1].rows[0].instance_count, 2);
    }

    #[test]
    fn test_stable_sort_preserves_submission_order() {
        let mut queue = queue_for(1);
        let mut slots = TextureSlotAllocator::new(4);

        // Same shader and geometry: tints must come out in submission order.
        for i in 0..4u32 {
            let mut e = entry(0, 0);
            e.tint = Vec4::new(i as f32 / 255.0, 0.0, 0.0, 0.0);
            queue.push(e);
        }

        let emitted = run_flush(&mut queue, &mut slots);
        assert_eq!(emitted[0].tints, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_flush_leaves_table_and_streams_clean() {
        let mut queue = queue_for(2);
        let mut slots = TextureSlotAllocator::new(4);

        queue.push(entry(0, 0));
        queue.push(entry(1, 0));
        run_flush(&mut queue, &mut slots);

        assert!(queue.streams.is_empty());
        for row in queue.commands.rows() {
            assert_eq!(row.instance_count, 0);
            assert_eq!(row.first_instance, 0);
        }
    }

    #[test]
    fn test_empty_flush_emits_nothing() {
        let mut queue = queue_for(1);
        let mut slots = TextureSlotAllocator::new(4);
        let emitted = run_flush(&mut queue, &mut slots);
        assert!(emitted.is_empty());
    }

    #[test]
    fn test_capacity_gate() {
        let mut queue = BatchQueue::new(2, 1);
        queue.commands.push_row();
        queue.push(entry(0, 0));
        assert!(!queue.is_full());
        queue.push(entry(0, 0));
        assert!(queue.is_full());
    }
}
