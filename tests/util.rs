#![allow(dead_code)]
use std::collections::{BTreeMap, HashMap};

use mesh_stencil::prelude::*;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Unit cube with point `x + 2y + 4z`, faces split into triangles.
///
/// Each quad `[a, b, c, d]` becomes `(a, b, c)` and `(a, c, d)`.
pub fn triangulated_cube() -> Mesh {
    let points: Vec<[f64; 3]> = (0..8)
        .map(|i| [(i & 1) as f64, ((i >> 1) & 1) as f64, ((i >> 2) & 1) as f64])
        .collect();
    let quads: [[u32; 4]; 6] = [
        [0, 2, 3, 1],
        [4, 5, 7, 6],
        [0, 1, 5, 4],
        [2, 6, 7, 3],
        [0, 4, 6, 2],
        [1, 3, 7, 5],
    ];
    let mut cells = CellArray::new();
    for [a, b, c, d] in quads {
        cells.push(&[a, b, c]);
        cells.push(&[a, c, d]);
    }
    Mesh::uniform(points, cells, CellType::Triangle).unwrap()
}

/// Regular icosahedron (12 points, 20 triangles, 30 edges).
pub fn icosahedron() -> Mesh {
    let phi = (1.0 + 5f64.sqrt()) / 2.0;
    let mut points = Vec::new();
    for s1 in [-1.0, 1.0] {
        for s2 in [-1.0, 1.0] {
            points.push([0.0, s1, s2 * phi]);
            points.push([s1, s2 * phi, 0.0]);
            points.push([s2 * phi, 0.0, s1]);
        }
    }
    // faces are the triples at mutual distance 2
    let is_edge = |a: usize, b: usize| {
        let d: f64 = (0..3).map(|k| (points[a][k] - points[b][k]).powi(2)).sum();
        (d - 4.0).abs() < 1e-9
    };
    let mut cells = CellArray::new();
    for i in 0..12 {
        for j in i + 1..12 {
            for k in j + 1..12 {
                if is_edge(i, j) && is_edge(j, k) && is_edge(i, k) {
                    cells.push(&[i as u32, j as u32, k as u32]);
                }
            }
        }
    }
    Mesh::uniform(points, cells, CellType::Triangle).unwrap()
}

/// Surface of the cube `[0, n]^3` with `n x n` quads per face, shared
/// points merged. With `triangulate` every quad is split in two.
///
/// `V = 6n^2 + 2`; `E = 12n^2` for quads, `18n^2` for triangles.
pub fn cube_sphere(n: i64, triangulate: bool) -> Mesh {
    let mut ids: HashMap<[i64; 3], u32> = HashMap::new();
    let mut points = Vec::new();
    let mut id = |p: [i64; 3]| {
        *ids.entry(p).or_insert_with(|| {
            points.push([p[0] as f64, p[1] as f64, p[2] as f64]);
            (points.len() - 1) as u32
        })
    };
    let mut cells = CellArray::new();
    let mut types = Vec::new();
    for axis in 0..3 {
        let (u, v) = ((axis + 1) % 3, (axis + 2) % 3);
        for side in [0, n] {
            for i in 0..n {
                for j in 0..n {
                    let at = |di: i64, dj: i64| {
                        let mut p = [0i64; 3];
                        p[axis] = side;
                        p[u] = i + di;
                        p[v] = j + dj;
                        p
                    };
                    let q = [id(at(0, 0)), id(at(1, 0)), id(at(1, 1)), id(at(0, 1))];
                    if triangulate {
                        cells.push(&[q[0], q[1], q[2]]);
                        cells.push(&[q[0], q[2], q[3]]);
                        types.extend([CellType::Triangle; 2]);
                    } else {
                        cells.push(&q);
                        types.push(CellType::Quadrilateral);
                    }
                }
            }
        }
    }
    Mesh::new(points, cells, types).unwrap()
}

/// `n x n` points in the z = 0 plane with `(n-1)^2` quads; point `i + n j`
/// sits at `(i, j, 0)`.
pub fn grid(n: u32) -> Mesh {
    let points = (0..n * n)
        .map(|p| [(p % n) as f64, (p / n) as f64, 0.0])
        .collect();
    let mut cells = CellArray::new();
    for j in 0..n - 1 {
        for i in 0..n - 1 {
            let p = i + n * j;
            cells.push(&[p, p + 1, p + 1 + n, p + n]);
        }
    }
    Mesh::uniform(points, cells, CellType::Quadrilateral).unwrap()
}

/// Whether point `p` of [`grid`] lies on the boundary.
pub fn on_grid_boundary(n: u32, p: usize) -> bool {
    let (i, j) = (p as u32 % n, p as u32 / n);
    i == 0 || j == 0 || i == n - 1 || j == n - 1
}

/// Same cells in a shuffled order (cell data is not carried over).
pub fn shuffled(mesh: &Mesh, seed: u64) -> Mesh {
    let mut order: Vec<usize> = (0..mesh.num_cells()).collect();
    order.shuffle(&mut SmallRng::seed_from_u64(seed));
    let mut cells = CellArray::new();
    let mut types = Vec::new();
    for c in order {
        cells.push(mesh.cell_points(c));
        types.push(mesh.cell_type(c));
    }
    Mesh::new(mesh.points().to_vec(), cells, types).unwrap()
}

/// Copy of `mesh` with every coordinate moved by up to `amp`.
pub fn jittered(mesh: &Mesh, amp: f64, seed: u64) -> Mesh {
    let mut rng = SmallRng::seed_from_u64(seed);
    let points = mesh
        .points()
        .iter()
        .map(|p| p.map(|x| x + rng.gen_range(-amp..=amp)))
        .collect();
    mesh.with_positions(points).unwrap()
}

/// Brute-force unique edges and their smallest producing cell.
pub fn reference_edges<M: CellSource>(mesh: &M) -> BTreeMap<(u32, u32), u32> {
    let mut out = BTreeMap::new();
    for c in 0..mesh.num_cells() {
        mesh.cell_type(c).for_each_edge(mesh.cell_points(c), |a, b| {
            let key = (a.min(b), a.max(b));
            let e = out.entry(key).or_insert(c as u32);
            *e = (*e).min(c as u32);
        });
    }
    out
}

pub fn dist(a: [f64; 3], b: [f64; 3]) -> f64 {
    (0..3).map(|k| (a[k] - b[k]).powi(2)).sum::<f64>().sqrt()
}
