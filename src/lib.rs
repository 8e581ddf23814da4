#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-stencil
//!
//! mesh-stencil extracts the unique edges of an unstructured mesh, turns them
//! into point-to-point neighbor stencils, and uses those stencils to relax
//! point positions under movement constraints. Every stage is a fork-join
//! pass over cells, edges or points.
//!
//! ## Features
//! - Edge extraction from mixed cell kinds (lines, polygons, strips, 3D cells)
//!   with duplicate merging and smallest-cell attribution
//! - CSR point adjacency from unique edges, raw pairs or cell connectivity
//! - Double-buffered Laplacian-style relaxation with distance, box and
//!   per-point radius constraints and a convergence report
//! - Optional Rayon parallelism (`rayon` feature, on by default)
//!
//! ## Determinism
//!
//! Edge sets, representative cells, stencils (with sorted rows) and relaxed
//! positions do not depend on the number of worker threads. Where input is
//! invalid, the error reported is the one for the smallest offending cell.
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! mesh-stencil = "0.3"
//! # Sequential build:
//! # default-features = false
//! ```
//!
//! ```
//! use mesh_stencil::prelude::*;
//!
//! let points = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]];
//! let cells = CellArray::from_cells([[0u32, 1, 2], [1, 3, 2]]);
//! let mesh = Mesh::uniform(points, cells, CellType::Triangle).unwrap();
//!
//! let edges = unique_edges(&mesh, 1024).unwrap();
//! assert_eq!(edges.len(), 5);
//!
//! let stencil = AdjacencyCsr::from_unique_edges(4, &edges, AdjacencyOpts::default()).unwrap();
//! assert_eq!(stencil.neighbors(1), &[0, 2, 3]);
//!
//! let out = smooth_mesh(&mesh, &RelaxationConfig::default()).unwrap();
//! assert_eq!(out.points.len(), 4);
//! ```

pub mod algs;
pub mod data;
pub mod geometry;
pub mod mesh_error;
pub mod topology;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::adjacency::{AdjacencyCsr, AdjacencyOpts};
    pub use crate::algs::extract_edges::{
        EdgeExtractionOpts, ExtractedEdges, UniqueEdgeSet, extract_edges, unique_edges,
    };
    pub use crate::algs::relax::{
        ConstraintSpec, ConvergenceReport, RelaxOutput, RelaxState, Relaxation,
        RelaxationConfig, smooth_mesh,
    };
    pub use crate::data::mesh::{AttributeArray, CellSource, Mesh};
    pub use crate::mesh_error::MeshError;
    pub use crate::topology::cell_array::CellArray;
    pub use crate::topology::cell_type::CellType;
}
