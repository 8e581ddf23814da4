//! Unstructured mesh container and the read-only [`CellSource`] view.
//!
//! A [`Mesh`] owns point positions, a [`CellArray`] with one [`CellType`]
//! tag per cell, and named point/cell attribute arrays. Algorithms in
//! [`crate::algs`] only borrow it, through [`CellSource`], so any other
//! mesh representation can be plugged in by implementing that trait.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::mesh_error::MeshError;
use crate::topology::cell_array::CellArray;
use crate::topology::cell_type::CellType;

/// Read-only access to a mesh's points and cells.
///
/// Implementors must be shareable across worker threads.
pub trait CellSource: Sync {
    /// Number of points.
    fn num_points(&self) -> usize;
    /// Position of point `id`.
    fn point(&self, id: usize) -> [f64; 3];
    /// Number of cells.
    fn num_cells(&self) -> usize;
    /// Kind of cell `c`.
    fn cell_type(&self, c: usize) -> CellType;
    /// Ordered point ids of cell `c`.
    fn cell_points(&self, c: usize) -> &[u32];

    /// Check cell `c` against the point range, then its kind's arity.
    ///
    /// Cells with fewer than two points carry no edges and are accepted
    /// whatever their kind.
    fn validate_cell(&self, c: usize) -> Result<(), MeshError> {
        let pts = self.cell_points(c);
        let num_points = self.num_points();
        if let Some(&point) = pts.iter().find(|&&p| p as usize >= num_points) {
            return Err(MeshError::PointIndexOutOfRange {
                cell: c,
                point,
                num_points,
            });
        }
        if pts.len() < 2 {
            return Ok(());
        }
        let cell_type = self.cell_type(c);
        if let Some(expected) = cell_type.fixed_point_count() {
            if pts.len() != expected {
                return Err(MeshError::CellArityMismatch {
                    cell: c,
                    cell_type,
                    expected,
                    found: pts.len(),
                });
            }
        }
        Ok(())
    }
}

/// Tuple-structured attribute array (`components` values per entity).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AttributeArray {
    components: usize,
    values: Vec<f64>,
}

impl AttributeArray {
    /// Wrap `values` as tuples of `components` entries.
    pub fn new(components: usize, values: Vec<f64>) -> Result<Self, MeshError> {
        if components == 0 {
            return Err(MeshError::InvalidConfig(
                "attribute arrays need at least one component".into(),
            ));
        }
        if values.len() % components != 0 {
            return Err(MeshError::InvalidConfig(format!(
                "{} values do not split into tuples of {components}",
                values.len()
            )));
        }
        Ok(Self { components, values })
    }

    /// One value per entity.
    pub fn scalars(values: Vec<f64>) -> Self {
        Self {
            components: 1,
            values,
        }
    }

    /// Three values per entity.
    pub fn vectors(values: &[[f64; 3]]) -> Self {
        Self {
            components: 3,
            values: values.iter().flatten().copied().collect(),
        }
    }

    #[inline]
    pub fn components(&self) -> usize {
        self.components
    }

    #[inline]
    pub fn num_tuples(&self) -> usize {
        self.values.len() / self.components
    }

    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Tuple of entity `i`.
    #[inline]
    pub fn tuple(&self, i: usize) -> &[f64] {
        &self.values[i * self.components..(i + 1) * self.components]
    }

    /// New array holding the tuples of `ids`, in that order.
    pub fn gather<I>(&self, ids: I) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        let mut values = Vec::new();
        for i in ids {
            values.extend_from_slice(self.tuple(i));
        }
        Self {
            components: self.components,
            values,
        }
    }
}

/// Unstructured mesh: points, typed cells and attached attribute arrays.
#[derive(Clone, Debug)]
pub struct Mesh {
    points: Vec<[f64; 3]>,
    cells: CellArray,
    cell_types: Vec<CellType>,
    point_data: BTreeMap<String, AttributeArray>,
    cell_data: BTreeMap<String, AttributeArray>,
}

impl Mesh {
    /// Build a mesh, validating cell types and connectivity.
    pub fn new(
        points: Vec<[f64; 3]>,
        cells: CellArray,
        cell_types: Vec<CellType>,
    ) -> Result<Self, MeshError> {
        if cells.len() != cell_types.len() {
            return Err(MeshError::CellTypeCountMismatch {
                cells: cells.len(),
                types: cell_types.len(),
            });
        }
        let mesh = Self {
            points,
            cells,
            cell_types,
            point_data: BTreeMap::new(),
            cell_data: BTreeMap::new(),
        };
        for c in 0..mesh.cells.len() {
            mesh.validate_cell(c)?;
        }
        Ok(mesh)
    }

    /// Build a mesh whose cells all share one kind.
    pub fn uniform(
        points: Vec<[f64; 3]>,
        cells: CellArray,
        cell_type: CellType,
    ) -> Result<Self, MeshError> {
        let types = vec![cell_type; cells.len()];
        Self::new(points, cells, types)
    }

    /// Same topology and attributes with new point positions.
    pub fn with_positions(&self, points: Vec<[f64; 3]>) -> Result<Self, MeshError> {
        if points.len() != self.points.len() {
            return Err(MeshError::AttributeLengthMismatch {
                name: "points".into(),
                expected: self.points.len(),
                found: points.len(),
            });
        }
        Ok(Self {
            points,
            ..self.clone()
        })
    }

    #[inline]
    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    #[inline]
    pub fn cells(&self) -> &CellArray {
        &self.cells
    }

    /// Attach a point attribute; it must hold one tuple per point.
    pub fn insert_point_data(
        &mut self,
        name: impl Into<String>,
        array: AttributeArray,
    ) -> Result<(), MeshError> {
        let name = name.into();
        check_len(&name, self.points.len(), &array)?;
        self.point_data.insert(name, array);
        Ok(())
    }

    /// Attach a cell attribute; it must hold one tuple per cell.
    pub fn insert_cell_data(
        &mut self,
        name: impl Into<String>,
        array: AttributeArray,
    ) -> Result<(), MeshError> {
        let name = name.into();
        check_len(&name, self.cells.len(), &array)?;
        self.cell_data.insert(name, array);
        Ok(())
    }

    pub fn point_data(&self) -> &BTreeMap<String, AttributeArray> {
        &self.point_data
    }

    pub fn cell_data(&self) -> &BTreeMap<String, AttributeArray> {
        &self.cell_data
    }

    /// Named point attribute, or [`MeshError::MissingAttribute`].
    pub fn point_array(&self, name: &str) -> Result<&AttributeArray, MeshError> {
        self.point_data
            .get(name)
            .ok_or_else(|| MeshError::MissingAttribute(name.to_string()))
    }
}

fn check_len(name: &str, expected: usize, array: &AttributeArray) -> Result<(), MeshError> {
    if array.num_tuples() != expected {
        return Err(MeshError::AttributeLengthMismatch {
            name: name.to_string(),
            expected,
            found: array.num_tuples(),
        });
    }
    Ok(())
}

impl CellSource for Mesh {
    #[inline]
    fn num_points(&self) -> usize {
        self.points.len()
    }

    #[inline]
    fn point(&self, id: usize) -> [f64; 3] {
        self.points[id]
    }

    #[inline]
    fn num_cells(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    fn cell_type(&self, c: usize) -> CellType {
        self.cell_types[c]
    }

    #[inline]
    fn cell_points(&self, c: usize) -> &[u32] {
        self.cells.cell(c)
    }
}
