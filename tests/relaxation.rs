mod util;

use std::sync::atomic::AtomicBool;

use mesh_stencil::prelude::*;
use util::*;

fn edge_stencil(mesh: &Mesh) -> AdjacencyCsr {
    let set = unique_edges(mesh, 4).unwrap();
    AdjacencyCsr::from_unique_edges(mesh.num_points(), &set, AdjacencyOpts::default()).unwrap()
}

/// 5x5 grid, boundary pinned through a per-point radius, centre lifted.
fn lifted_grid() -> Mesh {
    let n = 5;
    let grid = grid(n);
    let mut pts = grid.points().to_vec();
    pts[12][2] = 0.1;
    let mut mesh = grid.with_positions(pts).unwrap();
    let radius = (0..mesh.num_points())
        .map(|p| if on_grid_boundary(n, p) { 0.0 } else { 10.0 })
        .collect();
    mesh.insert_point_data("radius", AttributeArray::scalars(radius))
        .unwrap();
    mesh
}

#[test]
fn pinned_grid_converges_monotonically() {
    let mesh = lifted_grid();
    let stencil = edge_stencil(&mesh);
    let cfg = RelaxationConfig {
        relax_factor: 1.0,
        max_iterations: 200,
        convergence_threshold: 1e-9,
        constraint: ConstraintSpec::PerPointArray("radius".into()),
        ..Default::default()
    };
    let mut relax = Relaxation::for_mesh(&mesh, &stencil, &cfg).unwrap();

    let mut history = Vec::new();
    while !relax.step().is_terminal() {
        history.push(relax.max_displacement());
    }
    history.push(relax.max_displacement());

    let report = relax.report();
    assert!(report.converged, "{report:?}");
    assert_eq!(report.state, RelaxState::Converged);
    assert!(report.final_max_displacement <= 1e-9);
    assert_eq!(report.iterations_run, history.len());
    assert!(history.len() > 1);
    for w in history.windows(2) {
        assert!(w[1] <= w[0] * (1.0 + 1e-12) + 1e-15, "{history:?}");
    }

    let out = relax.finish();
    for (p, (x, x0)) in out.points.iter().zip(mesh.points()).enumerate() {
        // in-plane coordinates are already at the neighbor mean
        assert_eq!(x[0], x0[0]);
        assert_eq!(x[1], x0[1]);
        if on_grid_boundary(5, p) {
            assert_eq!(x, x0);
        }
        assert!(x[2].abs() < 1e-6);
    }
}

#[test]
fn damped_relaxation_is_monotone() {
    let mesh = lifted_grid();
    let stencil = edge_stencil(&mesh);
    let cfg = RelaxationConfig {
        relax_factor: 0.5,
        max_iterations: 300,
        convergence_threshold: 1e-9,
        constraint: ConstraintSpec::PerPointArray("radius".into()),
        ..Default::default()
    };
    let mut relax = Relaxation::for_mesh(&mesh, &stencil, &cfg).unwrap();

    let mut history = Vec::new();
    while !relax.step().is_terminal() {
        history.push(relax.max_displacement());
    }
    history.push(relax.max_displacement());

    let report = relax.report();
    assert!(report.converged, "{report:?}");
    assert!(history.len() > 2);
    for w in history.windows(2) {
        assert!(w[1] <= w[0] * (1.0 + 1e-12) + 1e-15, "{history:?}");
    }
    let out = relax.finish();
    assert!(out.points.iter().all(|x| x[2].abs() < 1e-6));
}

#[test]
fn pinned_grid_settles_within_fifty_iterations() {
    let mesh = lifted_grid();
    let cfg = RelaxationConfig {
        relax_factor: 1.0,
        max_iterations: 50,
        convergence_threshold: 9e-7,
        constraint: ConstraintSpec::PerPointArray("radius".into()),
        ..Default::default()
    };
    let out = smooth_mesh(&mesh, &cfg).unwrap();
    assert!(out.report.converged, "{:?}", out.report);
    assert!(out.report.final_max_displacement < 1e-6);
    assert!(out.report.iterations_run <= 50);
}

#[test]
fn distance_constraint_clamps_exactly() {
    let r = 0.5;
    let points = vec![[0.0, 0.0, 0.0], [3.0 * r, 0.0, 0.0], [r, 0.0, 0.0]];
    let stencil = AdjacencyCsr::from_edges(3, &[(0, 1), (0, 2)], AdjacencyOpts::default()).unwrap();
    let cfg = RelaxationConfig {
        relax_factor: 1.0,
        max_iterations: 1,
        constraint: ConstraintSpec::Distance(r),
        ..Default::default()
    };
    let mut relax = Relaxation::new(&points, &stencil, &cfg).unwrap();
    relax.run();
    // neighbor mean is (2r, 0, 0); the move is cut back onto the sphere
    assert_eq!(relax.positions()[0], [r, 0.0, 0.0]);
}

#[test]
fn constraints_hold_on_noisy_surface() {
    let mesh = jittered(&cube_sphere(6, true), 0.3, 11);
    let n = mesh.num_points();
    let stencil = edge_stencil(&mesh);
    let base = RelaxationConfig {
        relax_factor: 0.7,
        max_iterations: 40,
        emit_displacement_scalars: true,
        ..Default::default()
    };

    let cfg = RelaxationConfig {
        constraint: ConstraintSpec::Distance(0.05),
        ..base.clone()
    };
    let out = smooth_mesh(&mesh, &cfg).unwrap();
    for (p, d) in out.displacement_scalars.unwrap().iter().enumerate() {
        assert!(*d <= 0.05 * (1.0 + 1e-12), "point {p} moved {d}");
    }

    let dims = [0.1, 0.02, 0.3];
    let cfg = RelaxationConfig {
        constraint: ConstraintSpec::Box(dims),
        ..base.clone()
    };
    let out = smooth_mesh(&mesh, &cfg).unwrap();
    for (x, x0) in out.points.iter().zip(mesh.points()) {
        for k in 0..3 {
            assert!((x[k] - x0[k]).abs() <= dims[k] / 2.0 + 1e-12);
        }
    }

    let mut with_radius = mesh.clone();
    let radius: Vec<f64> = (0..n).map(|p| (p % 4) as f64 * 0.01).collect();
    with_radius
        .insert_point_data("r", AttributeArray::scalars(radius.clone()))
        .unwrap();
    let cfg = RelaxationConfig {
        constraint: ConstraintSpec::PerPointArray("r".into()),
        ..base
    };
    let out = smooth_mesh_with(&with_radius, &stencil, &cfg);
    for (p, (x, x0)) in out.points.iter().zip(mesh.points()).enumerate() {
        let d = dist(*x, *x0);
        assert!(d <= radius[p] * (1.0 + 1e-12) + 1e-15, "point {p} moved {d}");
        if radius[p] == 0.0 {
            assert_eq!(x, x0);
        }
    }
}

fn smooth_mesh_with(mesh: &Mesh, stencil: &AdjacencyCsr, cfg: &RelaxationConfig) -> RelaxOutput {
    mesh_stencil::algs::relax::smooth_mesh_with_stencil(mesh, stencil, cfg).unwrap()
}

#[test]
fn isolated_points_stay_put() {
    let mut points: Vec<[f64; 3]> = triangulated_cube().points().to_vec();
    points.push([5.0, 5.0, 5.0]);
    let cells = triangulated_cube().cells().clone();
    let mesh = Mesh::uniform(points, cells, CellType::Triangle).unwrap();
    let cfg = RelaxationConfig {
        relax_factor: 0.5,
        max_iterations: 10,
        constraint: ConstraintSpec::None,
        ..Default::default()
    };
    let out = smooth_mesh(&mesh, &cfg).unwrap();
    assert_eq!(out.points[8], [5.0, 5.0, 5.0]);
    assert_eq!(out.report.state, RelaxState::Exhausted);
    assert_eq!(out.report.iterations_run, 10);
}

#[test]
fn abort_stops_between_iterations() {
    let mesh = lifted_grid();
    let stencil = edge_stencil(&mesh);
    let mut relax = Relaxation::for_mesh(&mesh, &stencil, &RelaxationConfig::default()).unwrap();
    relax.step();
    let after_one = relax.positions().to_vec();
    let report = relax.run_with_abort(&AtomicBool::new(true));
    assert_eq!(report.state, RelaxState::Aborted);
    assert_eq!(report.iterations_run, 1);
    assert_eq!(relax.positions(), &after_one[..]);
    // terminal states are sticky
    assert_eq!(relax.step(), RelaxState::Aborted);
}

#[test]
fn configuration_errors() {
    let mesh = lifted_grid();
    let bad = |constraint| {
        smooth_mesh(
            &mesh,
            &RelaxationConfig {
                constraint,
                ..Default::default()
            },
        )
        .unwrap_err()
    };
    assert!(matches!(
        bad(ConstraintSpec::Distance(-1.0)),
        MeshError::InvalidConstraint(_)
    ));
    assert!(matches!(
        bad(ConstraintSpec::Box([1.0, -1.0, 1.0])),
        MeshError::InvalidConstraint(_)
    ));
    assert_eq!(
        bad(ConstraintSpec::PerPointArray("nope".into())),
        MeshError::MissingAttribute("nope".into())
    );

    let mut negative = mesh.clone();
    let mut r = vec![1.0; mesh.num_points()];
    r[3] = -0.5;
    negative
        .insert_point_data("radius", AttributeArray::scalars(r))
        .unwrap();
    let cfg = RelaxationConfig {
        constraint: ConstraintSpec::PerPointArray("radius".into()),
        ..Default::default()
    };
    assert!(matches!(
        smooth_mesh(&negative, &cfg),
        Err(MeshError::InvalidConstraint(_))
    ));
}

#[test]
fn config_and_report_serialize() {
    let cfg = RelaxationConfig::default();
    let json = serde_json::to_string(&cfg).unwrap();
    let back: RelaxationConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, cfg);

    let partial: RelaxationConfig =
        serde_json::from_str(r#"{"relax_factor": 0.5, "constraint": {"Box": [1.0, 2.0, 3.0]}}"#)
            .unwrap();
    assert_eq!(partial.relax_factor, 0.5);
    assert_eq!(partial.constraint, ConstraintSpec::Box([1.0, 2.0, 3.0]));
    assert_eq!(partial.max_iterations, 50);

    let none: RelaxationConfig = serde_json::from_str(r#"{"constraint": "None"}"#).unwrap();
    assert_eq!(none.constraint, ConstraintSpec::None);

    let mesh = lifted_grid();
    let out = smooth_mesh(
        &mesh,
        &RelaxationConfig {
            max_iterations: 3,
            ..Default::default()
        },
    )
    .unwrap();
    let value = serde_json::to_value(out.report).unwrap();
    assert_eq!(value["state"], "Exhausted");
    assert_eq!(value["iterations_run"], 3);
    assert_eq!(value["converged"], false);
}
