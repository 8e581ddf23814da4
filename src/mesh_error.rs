//! MeshError: Unified error type for mesh-stencil public APIs
//!
//! Every fallible operation in this crate returns `Result<_, MeshError>`.
//! Configuration problems are reported before any parallel work starts;
//! problems discovered inside parallel workers are collected and reported
//! once, after all workers have joined.

use thiserror::Error;

use crate::topology::cell_type::CellType;

/// Unified error type for mesh-stencil operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MeshError {
    /// A cell references a point id that does not exist in the mesh.
    #[error("cell {cell} references point {point}, but the mesh has {num_points} points")]
    PointIndexOutOfRange {
        cell: usize,
        point: u32,
        num_points: usize,
    },
    /// A fixed-arity cell (triangle, tetrahedron, ...) has the wrong point count.
    #[error("cell {cell} of type {cell_type:?} expects {expected} points, found {found}")]
    CellArityMismatch {
        cell: usize,
        cell_type: CellType,
        expected: usize,
        found: usize,
    },
    /// The number of cell-type tags differs from the number of cells.
    #[error("cell array holds {cells} cells but {types} cell types were given")]
    CellTypeCountMismatch { cells: usize, types: usize },
    /// CSR offsets of a cell array are malformed.
    #[error("invalid cell offsets: {0}")]
    InvalidCellOffsets(String),
    /// A named attribute array does not match the entity count it is attached to.
    #[error("attribute `{name}` holds {found} tuples, expected {expected}")]
    AttributeLengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    /// A named attribute array was requested but is not present.
    #[error("attribute `{0}` not found")]
    MissingAttribute(String),
    /// A relaxation or extraction parameter is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Constraint parameters are invalid (negative radius, empty box, ...).
    #[error("invalid constraint: {0}")]
    InvalidConstraint(String),
    /// A stencil was built for a different number of points.
    #[error("stencil covers {found} points, expected {expected}")]
    StencilSizeMismatch { expected: usize, found: usize },
    /// A stencil references a neighbor outside the point range.
    #[error("stencil of point {point} references neighbor {neighbor} (>= {num_points})")]
    StencilNeighborOutOfRange {
        point: usize,
        neighbor: u32,
        num_points: usize,
    },
    /// A point position has a NaN or infinite coordinate.
    #[error("point {point} has a non-finite coordinate")]
    NonFinitePosition { point: usize },
    /// Building a dedicated worker pool failed.
    #[error("thread pool error: {0}")]
    ThreadPool(String),
}

impl MeshError {
    /// Cell id carried by errors that originate in a specific cell.
    ///
    /// Used to pick one deterministic report when several workers fail.
    pub fn cell(&self) -> Option<usize> {
        match self {
            MeshError::PointIndexOutOfRange { cell, .. }
            | MeshError::CellArityMismatch { cell, .. } => Some(*cell),
            _ => None,
        }
    }
}
