//! Cell type metadata and per-kind edge rules.
//!
//! Each kind knows how to enumerate its topological edges from an ordered
//! point list. Fixed-arity kinds use the usual local vertex ordering
//! (bottom face first for hexahedra and wedges, apex last for pyramids).

use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Common cell types for mesh elements.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum CellType {
    /// 0D vertex.
    #[default]
    Vertex,
    /// Set of unconnected vertices.
    PolyVertex,
    /// 1D segment.
    Line,
    /// Open chain of segments.
    PolyLine,
    /// 2D simplex (triangle).
    Triangle,
    /// Strip of triangles sharing consecutive point pairs.
    TriangleStrip,
    /// 2D tensor-product cell (quad).
    Quadrilateral,
    /// Closed 2D polygon with any number of vertices.
    Polygon,
    /// 3D simplex (tet).
    Tetrahedron,
    /// 3D tensor-product cell (hex).
    Hexahedron,
    /// 3D wedge/prism.
    Wedge,
    /// 3D pyramid.
    Pyramid,
}

const TETRA_EDGES: [[usize; 2]; 6] = [[0, 1], [1, 2], [2, 0], [0, 3], [1, 3], [2, 3]];

const HEXA_EDGES: [[usize; 2]; 12] = [
    [0, 1],
    [1, 2],
    [3, 2],
    [0, 3],
    [4, 5],
    [5, 6],
    [7, 6],
    [4, 7],
    [0, 4],
    [1, 5],
    [3, 7],
    [2, 6],
];

const WEDGE_EDGES: [[usize; 2]; 9] = [
    [0, 1],
    [1, 2],
    [2, 0],
    [3, 4],
    [4, 5],
    [5, 3],
    [0, 3],
    [1, 4],
    [2, 5],
];

const PYRAMID_EDGES: [[usize; 2]; 8] = [
    [0, 1],
    [1, 2],
    [2, 3],
    [3, 0],
    [0, 4],
    [1, 4],
    [2, 4],
    [3, 4],
];

impl CellType {
    /// Returns the topological dimension of the cell.
    pub fn dimension(self) -> u8 {
        match self {
            CellType::Vertex | CellType::PolyVertex => 0,
            CellType::Line | CellType::PolyLine => 1,
            CellType::Triangle
            | CellType::TriangleStrip
            | CellType::Quadrilateral
            | CellType::Polygon => 2,
            CellType::Tetrahedron | CellType::Hexahedron | CellType::Wedge | CellType::Pyramid => 3,
        }
    }

    /// Number of points a cell of this kind must have, if fixed.
    pub fn fixed_point_count(self) -> Option<usize> {
        match self {
            CellType::Vertex => Some(1),
            CellType::Line => Some(2),
            CellType::Triangle => Some(3),
            CellType::Quadrilateral => Some(4),
            CellType::Tetrahedron => Some(4),
            CellType::Hexahedron => Some(8),
            CellType::Wedge => Some(6),
            CellType::Pyramid => Some(5),
            CellType::PolyVertex
            | CellType::PolyLine
            | CellType::TriangleStrip
            | CellType::Polygon => None,
        }
    }

    /// Upper bound on the number of edges produced for `n` points.
    pub fn edge_count_hint(self, n: usize) -> usize {
        if n < 2 {
            return 0;
        }
        match self {
            CellType::Vertex | CellType::PolyVertex => 0,
            CellType::Line | CellType::PolyLine => n.saturating_sub(1),
            CellType::Triangle | CellType::Quadrilateral | CellType::Polygon => {
                if n == 2 { 1 } else { n }
            }
            CellType::TriangleStrip => n.saturating_sub(1) + n.saturating_sub(2),
            CellType::Tetrahedron => TETRA_EDGES.len(),
            CellType::Hexahedron => HEXA_EDGES.len(),
            CellType::Wedge => WEDGE_EDGES.len(),
            CellType::Pyramid => PYRAMID_EDGES.len(),
        }
    }

    /// Calls `f(a, b)` once per topological edge of a cell with the given points.
    ///
    /// Cells with fewer than two points produce nothing. Pairs whose
    /// endpoints coincide (repeated point ids) are skipped. Callers are
    /// expected to have checked [`fixed_point_count`](Self::fixed_point_count);
    /// a short fixed-arity cell yields only the edges whose local indices
    /// exist.
    pub fn for_each_edge<F>(self, pts: &[u32], mut f: F)
    where
        F: FnMut(u32, u32),
    {
        if pts.len() < 2 {
            return;
        }
        let mut emit = |a: u32, b: u32| {
            if a != b {
                f(a, b)
            }
        };
        match self {
            CellType::Vertex | CellType::PolyVertex => {}
            CellType::Line | CellType::PolyLine => {
                for (&a, &b) in pts.iter().tuple_windows() {
                    emit(a, b);
                }
            }
            CellType::Triangle | CellType::Quadrilateral | CellType::Polygon => {
                if pts.len() == 2 {
                    emit(pts[0], pts[1]);
                } else {
                    for (&a, &b) in pts.iter().circular_tuple_windows() {
                        emit(a, b);
                    }
                }
            }
            CellType::TriangleStrip => {
                for (&a, &b) in pts.iter().tuple_windows() {
                    emit(a, b);
                }
                for (&a, _, &c) in pts.iter().tuple_windows() {
                    emit(a, c);
                }
            }
            CellType::Tetrahedron => table_edges(&TETRA_EDGES, pts, emit),
            CellType::Hexahedron => table_edges(&HEXA_EDGES, pts, emit),
            CellType::Wedge => table_edges(&WEDGE_EDGES, pts, emit),
            CellType::Pyramid => table_edges(&PYRAMID_EDGES, pts, emit),
        }
    }
}

fn table_edges<F>(table: &[[usize; 2]], pts: &[u32], mut emit: F)
where
    F: FnMut(u32, u32),
{
    for &[i, j] in table {
        if let (Some(&a), Some(&b)) = (pts.get(i), pts.get(j)) {
            emit(a, b);
        }
    }
}
