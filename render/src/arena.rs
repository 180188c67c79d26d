//! Geometry arena
//!
//! Append-only reservation of vertex/index ranges in the shared GPU mesh
//! buffers. Handles are stable for the scene's lifetime; there is no
//! deletion or compaction. The arena itself is pure bookkeeping — the
//! renderer pairs a successful reservation with the actual buffer writes.

use thiserror::Error;

/// Handle to a mesh stored in the geometry arena.
///
/// `id` is a dense index assigned in creation order and doubles as the row
/// index into the draw command table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Geometry {
    pub id: u32,
    pub first_vertex: u32,
    pub first_index: u32,
    pub vertex_count: u32,
    pub index_count: u32,
}

/// Reservation failure. The arena is left untouched in every case.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ArenaError {
    #[error("vertex capacity exceeded: {requested} vertices requested, {remaining} remaining")]
    VertexCapacity { requested: u32, remaining: u32 },

    #[error("index capacity exceeded: {requested} indices requested, {remaining} remaining")]
    IndexCapacity { requested: u32, remaining: u32 },

    #[error("geometry table is full ({capacity} meshes)")]
    TableFull { capacity: u32 },

    #[error("geometry has no vertices or no indices")]
    Empty,
}

/// Write cursors and capacities for the shared mesh buffers.
#[derive(Debug)]
pub struct GeometryArena {
    vertex_capacity: u32,
    index_capacity: u32,
    max_geometries: u32,
    next_vertex: u32,
    next_index: u32,
    count: u32,
}

impl GeometryArena {
    pub fn new(vertex_capacity: u32, index_capacity: u32, max_geometries: u32) -> Self {
        Self {
            vertex_capacity,
            index_capacity,
            max_geometries,
            next_vertex: 0,
            next_index: 0,
            count: 0,
        }
    }

    /// Reserve a vertex/index range and hand out the next geometry handle.
    ///
    /// All capacity checks happen before any cursor moves, so a failed
    /// reservation performs no partial mutation.
    pub fn reserve(&mut self, vertex_count: u32, index_count: u32) -> Result<Geometry, ArenaError> {
        if vertex_count == 0 || index_count == 0 {
            return Err(ArenaError::Empty);
        }
        if self.count == self.max_geometries {
            return Err(ArenaError::TableFull {
                capacity: self.max_geometries,
            });
        }

        let vertex_remaining = self.vertex_capacity - self.next_vertex;
        if vertex_count > vertex_remaining {
            return Err(ArenaError::VertexCapacity {
                requested: vertex_count,
                remaining: vertex_remaining,
            });
        }

        let index_remaining = self.index_capacity - self.next_index;
        if index_count > index_remaining {
            return Err(ArenaError::IndexCapacity {
                requested: index_count,
                remaining: index_remaining,
            });
        }

        let geometry = Geometry {
            id: self.count,
            first_vertex: self.next_vertex,
            first_index: self.next_index,
            vertex_count,
            index_count,
        };

        self.next_vertex += vertex_count;
        self.next_index += index_count;
        self.count += 1;

        Ok(geometry)
    }

    /// Vertices reserved so far
    pub fn used_vertices(&self) -> u32 {
        self.next_vertex
    }

    /// Indices reserved so far
    pub fn used_indices(&self) -> u32 {
        self.next_index
    }

    /// Number of geometries created
    pub fn geometry_count(&self) -> u32 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_dense_and_disjoint() {
        let mut arena = GeometryArena::new(100, 200, 16);

        let a = arena.reserve(10, 30).unwrap();
        let b = arena.reserve(20, 60).unwrap();
        let c = arena.reserve(5, 9).unwrap();

        assert_eq!((a.id, b.id, c.id), (0, 1, 2));

        // Each handle's range starts where the previous one ended.
        assert_eq!(a.first_vertex, 0);
        assert_eq!(b.first_vertex, a.first_vertex + a.vertex_count);
        assert_eq!(c.first_vertex, b.first_vertex + b.vertex_count);
        assert_eq!(a.first_index, 0);
        assert_eq!(b.first_index, a.first_index + a.index_count);
        assert_eq!(c.first_index, b.first_index + b.index_count);
    }

    #[test]
    fn test_capacity_rejection_leaves_cursors_unchanged() {
        let mut arena = GeometryArena::new(32, 64, 16);
        arena.reserve(30, 10).unwrap();

        let err = arena.reserve(3, 1).unwrap_err();
        assert_eq!(
            err,
            ArenaError::VertexCapacity {
                requested: 3,
                remaining: 2
            }
        );
        assert_eq!(arena.used_vertices(), 30);
        assert_eq!(arena.used_indices(), 10);
        assert_eq!(arena.geometry_count(), 1);

        let err = arena.reserve(1, 55).unwrap_err();
        assert_eq!(
            err,
            ArenaError::IndexCapacity {
                requested: 55,
                remaining: 54
            }
        );
        assert_eq!(arena.used_vertices(), 30);
        assert_eq!(arena.used_indices(), 10);

        // Exactly filling the remainder still succeeds.
        arena.reserve(2, 54).unwrap();
        assert_eq!(arena.used_vertices(), 32);
        assert_eq!(arena.used_indices(), 64);
    }

    #[test]
    fn test_geometry_table_capacity() {
        let mut arena = GeometryArena::new(1000, 1000, 2);
        arena.reserve(1, 3).unwrap();
        arena.reserve(1, 3).unwrap();

        let err = arena.reserve(1, 3).unwrap_err();
        assert_eq!(err, ArenaError::TableFull { capacity: 2 });
        assert_eq!(arena.geometry_count(), 2);
    }

    #[test]
    fn test_empty_submission_rejected() {
        let mut arena = GeometryArena::new(10, 10, 4);
        assert_eq!(arena.reserve(0, 3), Err(ArenaError::Empty));
        assert_eq!(arena.reserve(3, 0), Err(ArenaError::Empty));
        assert_eq!(arena.geometry_count(), 0);
    }
}
