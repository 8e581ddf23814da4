//! Compressed cell storage.
//!
//! A [`CellArray`] stores a ragged list of cells as an `offsets` array of
//! length `num_cells + 1` and a flat `connectivity` array of point ids:
//! cell `c` is `connectivity[offsets[c]..offsets[c + 1]]`. The same layout is
//! used for extracted edges, where every cell has exactly two points.

use serde::Serialize;

use crate::mesh_error::MeshError;

/// CSR-style cell connectivity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CellArray {
    offsets: Vec<usize>,
    connectivity: Vec<u32>,
}

impl Default for CellArray {
    fn default() -> Self {
        Self::new()
    }
}

impl CellArray {
    /// An empty cell array.
    pub fn new() -> Self {
        Self {
            offsets: vec![0],
            connectivity: Vec::new(),
        }
    }

    /// Build from raw CSR parts, checking that offsets are well formed.
    pub fn from_parts(offsets: Vec<usize>, connectivity: Vec<u32>) -> Result<Self, MeshError> {
        match offsets.first() {
            None => {
                return Err(MeshError::InvalidCellOffsets(
                    "offsets must contain at least one entry".into(),
                ));
            }
            Some(&first) if first != 0 => {
                return Err(MeshError::InvalidCellOffsets(format!(
                    "offsets must start at 0, found {first}"
                )));
            }
            _ => {}
        }
        if let Some(i) = offsets.windows(2).position(|w| w[0] > w[1]) {
            return Err(MeshError::InvalidCellOffsets(format!(
                "offsets decrease at cell {i}: {} > {}",
                offsets[i],
                offsets[i + 1]
            )));
        }
        let last = offsets[offsets.len() - 1];
        if last != connectivity.len() {
            return Err(MeshError::InvalidCellOffsets(format!(
                "last offset {last} != connectivity length {}",
                connectivity.len()
            )));
        }
        Ok(Self {
            offsets,
            connectivity,
        })
    }

    /// Build from a list of cells.
    pub fn from_cells<I, C>(cells: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u32]>,
    {
        let mut out = Self::new();
        for c in cells {
            out.push(c.as_ref());
        }
        out
    }

    /// Append one cell.
    pub fn push(&mut self, pts: &[u32]) {
        self.connectivity.extend_from_slice(pts);
        self.offsets.push(self.connectivity.len());
    }

    /// Number of cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Point ids of cell `c`.
    #[inline]
    pub fn cell(&self, c: usize) -> &[u32] {
        &self.connectivity[self.offsets[c]..self.offsets[c + 1]]
    }

    #[inline]
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    #[inline]
    pub fn connectivity(&self) -> &[u32] {
        &self.connectivity
    }

    /// Take the raw `(offsets, connectivity)` arrays.
    pub fn into_parts(self) -> (Vec<usize>, Vec<u32>) {
        (self.offsets, self.connectivity)
    }

    /// Iterate cells in id order.
    pub fn iter(&self) -> impl Iterator<Item = &[u32]> + '_ {
        self.offsets
            .windows(2)
            .map(move |w| &self.connectivity[w[0]..w[1]])
    }
}
