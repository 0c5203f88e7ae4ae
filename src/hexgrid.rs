//! Hexagonal planting lattice: neighbor arithmetic and per-block lookups.
//!
//! Oil palm is planted on a six-neighbor, row-offset triangular grid (the
//! "mata lima" pattern). Which six coordinates are adjacent depends on the
//! parity of the row; a square 4- or 8-neighbor rule does not describe this
//! geometry and would mis-count adjacency along every other row.

use std::collections::HashMap;

/// The 6 lattice neighbors of `(row, position)`.
///
/// Pure coordinate arithmetic: no bounds are applied, negative or zero
/// coordinates are returned as-is. Whether a neighbor actually exists is a
/// lookup against the [`NeighborIndex`], not a property of the geometry.
///
/// Odd rows shift their diagonal neighbors one position left; even rows one
/// position right. The relation is symmetric across parities.
#[inline]
pub fn hex_neighbors(row: i32, position: i32) -> [(i32, i32); 6] {
    if row % 2 != 0 {
        [
            (row - 1, position - 1),
            (row - 1, position),
            (row, position - 1),
            (row, position + 1),
            (row + 1, position - 1),
            (row + 1, position),
        ]
    } else {
        [
            (row - 1, position),
            (row - 1, position + 1),
            (row, position - 1),
            (row, position + 1),
            (row + 1, position),
            (row + 1, position + 1),
        ]
    }
}

/// Per-block map from `(row, position)` to the index of the owning reading.
///
/// Built once from the raw coordinates and shared read-only by the whole
/// threshold sweep and the final classification. It reflects coordinates
/// only, never classification state, so lookups cannot depend on the order
/// in which trees were classified.
#[derive(Debug, Clone)]
pub struct NeighborIndex {
    by_block: HashMap<String, HashMap<(i32, i32), usize>>,
}

impl NeighborIndex {
    /// Build the index from `(block_id, row, position)` triples. The index
    /// stored for each coordinate is the triple's position in the input
    /// sequence. `(row, position)` is unique within a block; a duplicate
    /// coordinate replaces the earlier entry.
    pub fn build<'a, I>(coords: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, i32, i32)>,
    {
        let mut by_block: HashMap<String, HashMap<(i32, i32), usize>> = HashMap::new();
        for (i, (block, row, position)) in coords.into_iter().enumerate() {
            by_block
                .entry(block.to_string())
                .or_default()
                .insert((row, position), i);
        }
        Self { by_block }
    }

    /// Index of the reading planted at `(row, position)` in `block`, if any.
    #[inline]
    pub fn get(&self, block: &str, row: i32, position: i32) -> Option<usize> {
        self.by_block
            .get(block)
            .and_then(|m| m.get(&(row, position)).copied())
    }

    /// Indices of the existing lattice neighbors of `(row, position)` in
    /// `block`. Yields at most 6 readings; edge trees simply have fewer.
    pub fn neighbors_of<'s>(
        &'s self,
        block: &str,
        row: i32,
        position: i32,
    ) -> impl Iterator<Item = usize> + 's {
        let block_map = self.by_block.get(block);
        hex_neighbors(row, position)
            .into_iter()
            .filter_map(move |(r, p)| block_map.and_then(|m| m.get(&(r, p)).copied()))
    }

    /// Number of distinct blocks in the index.
    pub fn block_count(&self) -> usize {
        self.by_block.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
