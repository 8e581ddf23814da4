//! Re-export public algorithms.

pub mod adjacency;
pub mod extract_edges;
pub mod parallel;
pub mod relax;

pub use adjacency::{AdjacencyCsr, AdjacencyOpts};
pub use extract_edges::{extract_edges, unique_edges};
pub use relax::{Relaxation, smooth_mesh};
