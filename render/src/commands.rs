//! Indirect draw command table
//!
//! One indexed indirect draw record per arena geometry, indexed by the
//! geometry's id. Instance counts are rebuilt by every flush; the geometry
//! range fields are copied in on first use within a pass.

use bytemuck::{Pod, Zeroable};

/// Arguments of one indexed indirect draw, byte-compatible with the 20-byte
/// record the device consumes from the indirect buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawIndexedIndirect {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub base_vertex: u32,
    pub first_instance: u32,
}

/// Dense table of indirect draw records, one row per geometry id.
#[derive(Debug)]
pub struct DrawCommandTable {
    rows: Vec<DrawIndexedIndirect>,
}

impl DrawCommandTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
        }
    }

    /// Append a zeroed row. Called once per `add_geometry`.
    pub fn push_row(&mut self) {
        self.rows.push(DrawIndexedIndirect::zeroed());
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[DrawIndexedIndirect] {
        &self.rows
    }

    pub fn row(&self, id: u32) -> &DrawIndexedIndirect {
        &self.rows[id as usize]
    }

    pub fn row_mut(&mut self, id: u32) -> &mut DrawIndexedIndirect {
        &mut self.rows[id as usize]
    }

    /// Zero `instance_count` and `first_instance` on every row.
    ///
    /// `instance_count == 0` is the gate the flush walk uses to detect the
    /// first entry for a geometry, so this runs after every sub-batch
    /// emission and at the end of a flush.
    pub fn reset_counts(&mut self) {
        for row in &mut self.rows {
            row.instance_count = 0;
            row.first_instance = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_is_device_sized() {
        assert_eq!(core::mem::size_of::<DrawIndexedIndirect>(), 20);
    }

    #[test]
    fn test_push_row_is_zeroed() {
        let mut table = DrawCommandTable::new(4);
        table.push_row();
        table.push_row();

        assert_eq!(table.len(), 2);
        assert_eq!(*table.row(1), DrawIndexedIndirect::zeroed());
    }

    #[test]
    fn test_reset_counts_keeps_geometry_range() {
        let mut table = DrawCommandTable::new(1);
        table.push_row();
        *table.row_mut(0) = DrawIndexedIndirect {
            index_count: 36,
            instance_count: 5,
            first_index: 100,
            base_vertex: 40,
            first_instance: 7,
        };

        table.reset_counts();

        let row = table.row(0);
        assert_eq!(row.instance_count, 0);
        assert_eq!(row.first_instance, 0);
        // Range fields are rewritten on first use; stale values are inert
        // while instance_count is zero.
        assert_eq!(row.index_count, 36);
        assert_eq!(row.first_index, 100);
        assert_eq!(row.base_vertex, 40);
    }
}
