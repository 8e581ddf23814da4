//! Unique edge extraction with deterministic cell attribution.
//!
//! Extraction runs in two phases separated by a full join:
//!
//! 1. **Harvest**: cells are walked in parallel ranges; every worker appends
//!    one [`Edge`] per topological cell edge (tagged with the producing cell
//!    id) to its own [`EdgeBatch`].
//! 2. **Deduplicate**: batches are concatenated, sorted by canonical key
//!    `(min(v0, v1), max(v0, v1))`, and each run of equal keys becomes one
//!    [`UniqueEdge`]. Its `representative_origin` is the smallest cell id in
//!    the run.
//!
//! Batch order and the order of equal keys after sorting are unspecified;
//! the output depends only on the mesh, never on scheduling or worker count.

use std::collections::BTreeMap;

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use static_assertions::assert_eq_size;

use crate::algs::parallel::{
    ReduceFunctor, exclusive_scan, for_each_row_mut, indices_where, map_collect, parallel_for,
    sort_unstable_by_key,
};
use crate::data::mesh::{AttributeArray, CellSource, Mesh};
use crate::mesh_error::MeshError;
use crate::topology::cell_array::CellArray;

/// One occurrence of a topological edge, produced by cell `origin`.
///
/// Endpoints are stored canonically (`v0 < v1`).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize)]
pub struct Edge {
    pub v0: u32,
    pub v1: u32,
    pub origin: u32,
}

assert_eq_size!(Edge, [u32; 3]);

impl Edge {
    /// Build an edge from endpoints in either order.
    #[inline]
    pub fn new(a: u32, b: u32, origin: u32) -> Self {
        debug_assert_ne!(a, b, "edges must join distinct points");
        let (v0, v1) = if a < b { (a, b) } else { (b, a) };
        Self { v0, v1, origin }
    }

    /// Canonical sort key.
    #[inline]
    pub fn key(&self) -> (u32, u32) {
        (self.v0, self.v1)
    }
}

/// Worker-local edge buffer filled during harvesting.
pub type EdgeBatch = Vec<Edge>;

/// One distinct topological edge with its attributed cell.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize)]
pub struct UniqueEdge {
    pub v0: u32,
    pub v1: u32,
    pub representative_origin: u32,
}

assert_eq_size!(UniqueEdge, [u32; 3]);

/// All edge occurrences, sorted by canonical key.
///
/// Every duplicate of a topological edge lies in one contiguous run.
#[derive(Clone, Debug, Default)]
pub struct CanonicalEdgeTable {
    edges: Vec<Edge>,
}

impl CanonicalEdgeTable {
    /// Concatenate worker batches and sort them by canonical key.
    pub fn from_batches(batches: Vec<EdgeBatch>) -> Self {
        let lens: Vec<usize> = batches.iter().map(Vec::len).collect();
        let offsets = exclusive_scan(&lens);
        let mut edges = vec![Edge::zeroed(); offsets[lens.len()]];
        for_each_row_mut(&offsets, &mut edges, |b, dst| {
            dst.copy_from_slice(&batches[b]);
        });
        sort_unstable_by_key(&mut edges, Edge::key);
        Self { edges }
    }

    #[inline]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// One record per distinct topological edge, in canonical key order.
#[derive(Clone, Debug, Default)]
pub struct UniqueEdgeSet {
    table: CanonicalEdgeTable,
    run_offsets: Vec<usize>,
    unique: Vec<UniqueEdge>,
}

impl UniqueEdgeSet {
    /// Number of distinct edges.
    #[inline]
    pub fn len(&self) -> usize {
        self.unique.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.unique.is_empty()
    }

    /// Unique edges sorted by `(v0, v1)`.
    #[inline]
    pub fn edges(&self) -> &[UniqueEdge] {
        &self.unique
    }

    /// The sorted occurrence table the set was built from.
    #[inline]
    pub fn table(&self) -> &CanonicalEdgeTable {
        &self.table
    }

    /// Run boundaries into [`table`](Self::table); length `len() + 1`.
    #[inline]
    pub fn run_offsets(&self) -> &[usize] {
        &self.run_offsets
    }

    /// Cell attributed to unique edge `i`.
    #[inline]
    pub fn representative_origin(&self, i: usize) -> u32 {
        self.unique[i].representative_origin
    }

    /// Every cell that produced unique edge `i` (one entry per occurrence).
    pub fn origins(&self, i: usize) -> impl Iterator<Item = u32> + '_ {
        self.table.edges[self.run_offsets[i]..self.run_offsets[i + 1]]
            .iter()
            .map(|e| e.origin)
    }

    /// Number of occurrences of unique edge `i`.
    #[inline]
    pub fn multiplicity(&self, i: usize) -> usize {
        self.run_offsets[i + 1] - self.run_offsets[i]
    }

    /// Index of the edge joining `a` and `b`, in either order.
    pub fn find(&self, a: u32, b: u32) -> Option<usize> {
        let key = if a < b { (a, b) } else { (b, a) };
        self.unique
            .binary_search_by_key(&key, |e| (e.v0, e.v1))
            .ok()
    }

    /// Endpoint pairs of all unique edges.
    pub fn pairs(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.unique.iter().map(|e| (e.v0, e.v1))
    }
}

struct EdgeHarvester<'a, M: ?Sized> {
    mesh: &'a M,
}

#[derive(Default)]
struct HarvestLocal {
    edges: EdgeBatch,
    error: Option<MeshError>,
}

impl<M> ReduceFunctor for EdgeHarvester<'_, M>
where
    M: CellSource + ?Sized,
{
    type Local = HarvestLocal;
    type Output = Result<Vec<EdgeBatch>, MeshError>;

    fn initialize(&self) -> HarvestLocal {
        HarvestLocal {
            edges: Vec::with_capacity(2048),
            error: None,
        }
    }

    fn execute(&self, begin: usize, end: usize, local: &mut HarvestLocal) {
        for c in begin..end {
            if let Err(e) = self.mesh.validate_cell(c) {
                keep_first_cell_error(&mut local.error, e);
                continue;
            }
            // once this worker has failed only smaller failing cells matter
            if local.error.is_some() {
                continue;
            }
            let origin = c as u32;
            let pts = self.mesh.cell_points(c);
            let cell_type = self.mesh.cell_type(c);
            let edges = &mut local.edges;
            edges.reserve(cell_type.edge_count_hint(pts.len()));
            cell_type.for_each_edge(pts, |a, b| edges.push(Edge::new(a, b, origin)));
        }
    }

    fn reduce(&self, locals: Vec<HarvestLocal>) -> Self::Output {
        let mut error = None;
        let mut batches = Vec::with_capacity(locals.len());
        for local in locals {
            if let Some(e) = local.error {
                keep_first_cell_error(&mut error, e);
            }
            batches.push(local.edges);
        }
        match error {
            Some(e) => Err(e),
            None => Ok(batches),
        }
    }
}

fn keep_first_cell_error(slot: &mut Option<MeshError>, e: MeshError) {
    let replace = match slot {
        None => true,
        Some(prev) => e.cell().unwrap_or(usize::MAX) < prev.cell().unwrap_or(usize::MAX),
    };
    if replace {
        *slot = Some(e);
    }
}

/// Harvest every cell edge into worker-local batches.
///
/// `grain` is the number of cells handed to a worker at a time. Invalid
/// cells are reported after all workers finish; when several cells are
/// invalid the one with the smallest id is reported.
pub fn harvest_edges<M>(mesh: &M, grain: usize) -> Result<Vec<EdgeBatch>, MeshError>
where
    M: CellSource + ?Sized,
{
    if mesh.num_cells() > u32::MAX as usize {
        return Err(MeshError::InvalidConfig(format!(
            "{} cells exceed the u32 cell id range",
            mesh.num_cells()
        )));
    }
    parallel_for(mesh.num_cells(), grain, &EdgeHarvester { mesh })
}

/// Merge worker batches into the set of unique edges.
///
/// The result, including each edge's representative origin, depends only on
/// the multiset of input edges.
pub fn deduplicate(batches: Vec<EdgeBatch>) -> UniqueEdgeSet {
    let table = CanonicalEdgeTable::from_batches(batches);
    let edges = table.edges();
    let n = edges.len();

    let mut run_offsets = indices_where(n, |i| i == 0 || edges[i].key() != edges[i - 1].key());
    run_offsets.push(n);

    let unique = map_collect(run_offsets.len() - 1, |r| {
        let run = &edges[run_offsets[r]..run_offsets[r + 1]];
        let origin = run.iter().map(|e| e.origin).fold(u32::MAX, u32::min);
        UniqueEdge {
            v0: run[0].v0,
            v1: run[0].v1,
            representative_origin: origin,
        }
    });

    UniqueEdgeSet {
        table,
        run_offsets,
        unique,
    }
}

/// Harvest and deduplicate in one call.
pub fn unique_edges<M>(mesh: &M, grain: usize) -> Result<UniqueEdgeSet, MeshError>
where
    M: CellSource + ?Sized,
{
    let batches = harvest_edges(mesh, grain)?;
    let set = deduplicate(batches);
    log::debug!(
        "unique_edges: {} cells -> {} edge occurrences -> {} unique edges",
        mesh.num_cells(),
        set.table().len(),
        set.len()
    );
    Ok(set)
}

/// Options for [`extract_edges`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeExtractionOpts {
    /// Cells handed to a worker at a time.
    pub grain: usize,
    /// Keep every input point (and its id) instead of only edge endpoints.
    pub use_all_points: bool,
    /// Copy cell attributes onto edges from their representative cell.
    pub pass_cell_data: bool,
    /// Copy point attributes onto the output points.
    pub pass_point_data: bool,
}

impl Default for EdgeExtractionOpts {
    fn default() -> Self {
        Self {
            grain: 1024,
            use_all_points: false,
            pass_cell_data: true,
            pass_point_data: true,
        }
    }
}

/// Result of [`extract_edges`].
#[derive(Clone, Debug)]
pub struct ExtractedEdges {
    /// Output point positions.
    pub points: Vec<[f64; 3]>,
    /// Original id of every output point.
    pub point_ids: Vec<u32>,
    /// One two-point line per unique edge, in output point ids.
    pub lines: CellArray,
    /// Point attributes for the output points.
    pub point_data: BTreeMap<String, AttributeArray>,
    /// Cell attributes per line, copied from the representative cell.
    pub cell_data: BTreeMap<String, AttributeArray>,
    /// Unique edges in original point ids.
    pub unique: UniqueEdgeSet,
}

/// Extract the unique edges of `mesh` as lines.
pub fn extract_edges(mesh: &Mesh, opts: &EdgeExtractionOpts) -> Result<ExtractedEdges, MeshError> {
    if opts.grain == 0 {
        return Err(MeshError::InvalidConfig("grain must be positive".into()));
    }
    let unique = unique_edges(mesh, opts.grain)?;

    let num_points = mesh.num_points();
    let (point_ids, new_id): (Vec<u32>, Vec<u32>) = if opts.use_all_points {
        let ids: Vec<u32> = (0..num_points as u32).collect();
        (ids.clone(), ids)
    } else {
        let mut used = vec![false; num_points];
        for (a, b) in unique.pairs() {
            used[a as usize] = true;
            used[b as usize] = true;
        }
        let mut new_id = vec![u32::MAX; num_points];
        let mut ids = Vec::new();
        for (p, _) in used.iter().enumerate().filter(|(_, u)| **u) {
            new_id[p] = ids.len() as u32;
            ids.push(p as u32);
        }
        (ids, new_id)
    };

    let points: Vec<[f64; 3]> = point_ids
        .iter()
        .map(|&p| mesh.points()[p as usize])
        .collect();

    let mut connectivity = Vec::with_capacity(2 * unique.len());
    for (a, b) in unique.pairs() {
        connectivity.push(new_id[a as usize]);
        connectivity.push(new_id[b as usize]);
    }
    let offsets: Vec<usize> = (0..=unique.len()).map(|i| 2 * i).collect();
    let lines = CellArray::from_parts(offsets, connectivity)?;

    let mut point_data = BTreeMap::new();
    if opts.pass_point_data {
        for (name, array) in mesh.point_data() {
            point_data.insert(
                name.clone(),
                array.gather(point_ids.iter().map(|&p| p as usize)),
            );
        }
    }

    let mut cell_data = BTreeMap::new();
    if opts.pass_cell_data {
        for (name, array) in mesh.cell_data() {
            cell_data.insert(
                name.clone(),
                array.gather(
                    unique
                        .edges()
                        .iter()
                        .map(|e| e.representative_origin as usize),
                ),
            );
        }
    }

    log::debug!(
        "extract_edges: {} lines over {} of {} points",
        lines.len(),
        points.len(),
        num_points
    );

    Ok(ExtractedEdges {
        points,
        point_ids,
        lines,
        point_data,
        cell_data,
        unique,
    })
}
