//! Build point-to-point adjacency ("stencils") in CSR form.
//!
//! Provides [`AdjacencyCsr`], where `neighbors[offsets[p]..offsets[p + 1]]`
//! lists the points joined to `p` by one edge. Construction is two parallel
//! passes over the edge list separated by a prefix sum: count the degree of
//! each endpoint, then scatter each endpoint into the other's row through a
//! per-point atomic write cursor. Rows are disjoint once `offsets` is fixed.
//!
//! Determinism:
//! - Row contents (as multisets) never depend on scheduling.
//! - With `sort_neighbors` (default) row order is deterministic as well.
//! - Duplicates are kept unless `dedup_neighbors` is set; an arithmetic-mean
//!   consumer does not need a simple graph.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::algs::extract_edges::{UniqueEdgeSet, harvest_edges};
use crate::algs::parallel::{
    exclusive_scan, for_each_index, for_each_row_mut, indices_where, map_collect,
};
use crate::data::mesh::CellSource;
use crate::mesh_error::MeshError;
use crate::topology::cell_array::CellArray;

/// Options for building adjacency.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdjacencyOpts {
    /// Sort each neighbor row ascending.
    pub sort_neighbors: bool,
    /// Remove repeated neighbors (implies sorting).
    pub dedup_neighbors: bool,
    /// Cells per worker chunk when harvesting from cells.
    pub grain: usize,
}

impl Default for AdjacencyOpts {
    fn default() -> Self {
        Self {
            sort_neighbors: true,
            dedup_neighbors: false,
            grain: 1024,
        }
    }
}

/// CSR point adjacency.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdjacencyCsr {
    offsets: Vec<usize>,
    neighbors: Vec<u32>,
}

impl AdjacencyCsr {
    /// Build from undirected point pairs. Self-loops `(p, p)` are ignored.
    pub fn from_edges(
        num_points: usize,
        edges: &[(u32, u32)],
        opts: AdjacencyOpts,
    ) -> Result<Self, MeshError> {
        build(num_points, edges.len(), |e| edges[e], opts)
    }

    /// Build from deduplicated edges; the result is symmetric.
    pub fn from_unique_edges(
        num_points: usize,
        edges: &UniqueEdgeSet,
        opts: AdjacencyOpts,
    ) -> Result<Self, MeshError> {
        let unique = edges.edges();
        build(num_points, unique.len(), |e| (unique[e].v0, unique[e].v1), opts)
    }

    /// Build directly from cell connectivity.
    ///
    /// Edges shared by several cells appear once per cell unless
    /// `dedup_neighbors` is set.
    pub fn from_cells<M>(mesh: &M, opts: AdjacencyOpts) -> Result<Self, MeshError>
    where
        M: CellSource + ?Sized,
    {
        let batches = harvest_edges(mesh, opts.grain)?;
        let offsets = exclusive_scan(&batches.iter().map(Vec::len).collect::<Vec<_>>());
        let at = |e: usize| {
            let b = offsets.partition_point(|&o| o <= e) - 1;
            let edge = batches[b][e - offsets[b]];
            (edge.v0, edge.v1)
        };
        build(mesh.num_points(), offsets[batches.len()], at, opts)
    }

    /// Wrap a caller-supplied stencil after validating it.
    pub fn from_parts(
        num_points: usize,
        offsets: Vec<usize>,
        neighbors: Vec<u32>,
    ) -> Result<Self, MeshError> {
        let (offsets, neighbors) = CellArray::from_parts(offsets, neighbors)?.into_parts();
        if offsets.len() != num_points + 1 {
            return Err(MeshError::StencilSizeMismatch {
                expected: num_points,
                found: offsets.len() - 1,
            });
        }
        let bad = indices_where(neighbors.len(), |i| neighbors[i] as usize >= num_points);
        if let Some(&i) = bad.first() {
            let point = offsets.partition_point(|&o| o <= i) - 1;
            return Err(MeshError::StencilNeighborOutOfRange {
                point,
                neighbor: neighbors[i],
                num_points,
            });
        }
        Ok(Self { offsets, neighbors })
    }

    /// Number of points covered.
    #[inline]
    pub fn num_points(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Neighbor slice of point `p`.
    #[inline]
    pub fn neighbors(&self, p: usize) -> &[u32] {
        &self.neighbors[self.offsets[p]..self.offsets[p + 1]]
    }

    #[inline]
    pub fn degree(&self, p: usize) -> usize {
        self.offsets[p + 1] - self.offsets[p]
    }

    #[inline]
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    #[inline]
    pub fn neighbor_array(&self) -> &[u32] {
        &self.neighbors
    }

    /// True when every `p -> q` entry has a matching `q -> p` entry
    /// (with multiplicity).
    pub fn is_symmetric(&self) -> bool {
        let mut forward = Vec::with_capacity(self.neighbors.len());
        let mut backward = Vec::with_capacity(self.neighbors.len());
        for p in 0..self.num_points() {
            for &q in self.neighbors(p) {
                forward.push((p as u32, q));
                backward.push((q, p as u32));
            }
        }
        forward.sort_unstable();
        backward.sort_unstable();
        forward == backward
    }
}

fn build<E>(
    num_points: usize,
    num_edges: usize,
    edge: E,
    opts: AdjacencyOpts,
) -> Result<AdjacencyCsr, MeshError>
where
    E: Fn(usize) -> (u32, u32) + Sync + Send,
{
    let bad = indices_where(num_edges, |e| {
        let (a, b) = edge(e);
        a as usize >= num_points || b as usize >= num_points
    });
    if let Some(&e) = bad.first() {
        let (a, b) = edge(e);
        return Err(MeshError::StencilNeighborOutOfRange {
            point: a.min(b) as usize,
            neighbor: a.max(b),
            num_points,
        });
    }

    // 1) degree counts
    let degree: Vec<AtomicUsize> = (0..num_points).map(|_| AtomicUsize::new(0)).collect();
    for_each_index(num_edges, |e| {
        let (a, b) = edge(e);
        if a != b {
            degree[a as usize].fetch_add(1, Ordering::Relaxed);
            degree[b as usize].fetch_add(1, Ordering::Relaxed);
        }
    });
    let counts: Vec<usize> = degree.into_iter().map(AtomicUsize::into_inner).collect();

    // 2) prefix sums
    let offsets = exclusive_scan(&counts);
    let total = offsets[num_points];

    // 3) scatter through per-point cursors
    let cursor: Vec<AtomicUsize> = offsets[..num_points]
        .iter()
        .map(|&o| AtomicUsize::new(o))
        .collect();
    let slots: Vec<AtomicU32> = (0..total).map(|_| AtomicU32::new(0)).collect();
    for_each_index(num_edges, |e| {
        let (a, b) = edge(e);
        if a != b {
            let i = cursor[a as usize].fetch_add(1, Ordering::Relaxed);
            slots[i].store(b, Ordering::Relaxed);
            let j = cursor[b as usize].fetch_add(1, Ordering::Relaxed);
            slots[j].store(a, Ordering::Relaxed);
        }
    });
    let mut neighbors: Vec<u32> = slots.into_iter().map(AtomicU32::into_inner).collect();

    if opts.sort_neighbors || opts.dedup_neighbors {
        for_each_row_mut(&offsets, &mut neighbors, |_, row| row.sort_unstable());
    }

    let csr = if opts.dedup_neighbors {
        let row = |p: usize| &neighbors[offsets[p]..offsets[p + 1]];
        let lens = map_collect(num_points, |p| row(p).iter().dedup().count());
        let new_offsets = exclusive_scan(&lens);
        let mut compact = vec![0u32; new_offsets[num_points]];
        for_each_row_mut(&new_offsets, &mut compact, |p, dst| {
            for (d, &q) in dst.iter_mut().zip(row(p).iter().dedup()) {
                *d = q;
            }
        });
        AdjacencyCsr {
            offsets: new_offsets,
            neighbors: compact,
        }
    } else {
        AdjacencyCsr { offsets, neighbors }
    };

    log::debug!(
        "adjacency: {} points, {} edges -> {} neighbor entries",
        num_points,
        num_edges,
        csr.neighbors.len()
    );
    Ok(csr)
}
