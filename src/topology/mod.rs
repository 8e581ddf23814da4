//! Cell kinds and CSR cell connectivity.
//!
//! [`CellType`] knows how each kind of cell decomposes into edges;
//! [`CellArray`] stores the ordered point ids of every cell.

pub mod cell_array;
pub mod cell_type;

pub use cell_array::CellArray;
pub use cell_type::CellType;
