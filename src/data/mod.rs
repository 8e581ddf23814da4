//! Data module: mesh container and attribute arrays

pub mod mesh;

pub use mesh::{AttributeArray, CellSource, Mesh};
