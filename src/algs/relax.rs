//! Constrained, double-buffered stencil relaxation of point positions.
//!
//! Each iteration moves every point toward the arithmetic mean of its
//! stencil neighbors:
//!
//! ```text
//! x = current[p] + relax_factor * (mean(current[q] for q in stencil(p)) - current[p])
//! ```
//!
//! then clamps `x` against the point's *original* position with the active
//! [`ConstraintSpec`]. Neighbor positions are read from one buffer while new
//! positions are written to the other; the buffers swap roles after every
//! iteration. Points with an empty stencil or a zero constraint amplitude
//! keep their original position.
//!
//! [`Relaxation`] is a small state machine: `Idle -> Iterating ->
//! {Converged | Exhausted | Aborted}`. All terminal states are successful
//! outcomes; the [`ConvergenceReport`] tells them apart.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::algs::adjacency::{AdjacencyCsr, AdjacencyOpts};
use crate::algs::extract_edges::unique_edges;
use crate::algs::parallel::{for_each_mut_reduce, map_collect};
use crate::data::mesh::{AttributeArray, CellSource, Mesh};
use crate::geometry::{BoundingBox, add, dist2, scale, sub};
use crate::mesh_error::MeshError;

/// How far a point may move from its original position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ConstraintSpec {
    /// Unconstrained.
    None,
    /// Stay within this radius of the original position.
    Distance(f64),
    /// Stay inside a box of these full side lengths centered on the original position.
    Box([f64; 3]),
    /// Per-point radius read from the named one-component point attribute.
    /// A radius of zero pins the point.
    PerPointArray(String),
}

/// Relaxation parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaxationConfig {
    /// Fraction of the way toward the neighbor mean moved per iteration (> 0).
    pub relax_factor: f64,
    /// Iteration budget.
    pub max_iterations: usize,
    /// Stop once the largest per-iteration move is at most this distance.
    pub convergence_threshold: f64,
    pub constraint: ConstraintSpec,
    /// Produce per-point displacement magnitudes.
    pub emit_displacement_scalars: bool,
    /// Produce per-point displacement vectors.
    pub emit_displacement_vectors: bool,
}

impl Default for RelaxationConfig {
    fn default() -> Self {
        Self {
            relax_factor: 0.01,
            max_iterations: 50,
            convergence_threshold: 0.0,
            constraint: ConstraintSpec::Distance(0.001),
            emit_displacement_scalars: false,
            emit_displacement_vectors: false,
        }
    }
}

impl RelaxationConfig {
    /// Check every parameter that does not depend on mesh data.
    pub fn validate(&self) -> Result<(), MeshError> {
        if !(self.relax_factor.is_finite() && self.relax_factor > 0.0) {
            return Err(MeshError::InvalidConfig(format!(
                "relax_factor must be positive and finite, got {}",
                self.relax_factor
            )));
        }
        if !(self.convergence_threshold >= 0.0) {
            return Err(MeshError::InvalidConfig(format!(
                "convergence_threshold must be non-negative, got {}",
                self.convergence_threshold
            )));
        }
        match &self.constraint {
            ConstraintSpec::None | ConstraintSpec::PerPointArray(_) => {}
            ConstraintSpec::Distance(r) => {
                if !(*r >= 0.0) {
                    return Err(MeshError::InvalidConstraint(format!(
                        "distance must be non-negative, got {r}"
                    )));
                }
            }
            ConstraintSpec::Box(dims) => {
                if !dims.iter().all(|d| d.is_finite() && *d > 0.0) {
                    return Err(MeshError::InvalidConstraint(format!(
                        "box dimensions must be positive, got {dims:?}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Constraint resolved against concrete point data.
#[derive(Clone, Copy, Debug)]
enum Constraint<'a> {
    None,
    Distance(f64),
    Box([f64; 3]),
    PerPoint(&'a [f64]),
}

impl Constraint<'_> {
    fn resolve<'a>(
        constraint: &ConstraintSpec,
        num_points: usize,
        point_data: Option<&'a BTreeMap<String, AttributeArray>>,
    ) -> Result<Constraint<'a>, MeshError> {
        Ok(match constraint {
            ConstraintSpec::None => Constraint::None,
            ConstraintSpec::Distance(r) => Constraint::Distance(*r),
            ConstraintSpec::Box(dims) => Constraint::Box(*dims),
            ConstraintSpec::PerPointArray(name) => {
                let array = point_data
                    .and_then(|d| d.get(name))
                    .ok_or_else(|| MeshError::MissingAttribute(name.clone()))?;
                if array.components() != 1 {
                    return Err(MeshError::InvalidConstraint(format!(
                        "constraint array `{name}` has {} components, expected 1",
                        array.components()
                    )));
                }
                if array.num_tuples() != num_points {
                    return Err(MeshError::AttributeLengthMismatch {
                        name: name.clone(),
                        expected: num_points,
                        found: array.num_tuples(),
                    });
                }
                let invalid = array.values().iter().enumerate().find(|(_, r)| !(**r >= 0.0));
                if let Some((p, r)) = invalid {
                    return Err(MeshError::InvalidConstraint(format!(
                        "constraint array `{name}` has invalid radius {r} at point {p}"
                    )));
                }
                Constraint::PerPoint(array.values())
            }
        })
    }

    /// Zero means the point is pinned.
    #[inline]
    fn amplitude(&self, p: usize) -> f64 {
        match self {
            Constraint::None | Constraint::Box(_) => f64::INFINITY,
            Constraint::Distance(r) => *r,
            Constraint::PerPoint(radii) => radii[p],
        }
    }

    #[inline]
    fn apply(&self, p: usize, origin: [f64; 3], x: [f64; 3]) -> [f64; 3] {
        match self {
            Constraint::None => x,
            Constraint::Distance(r) => clamp_to_sphere(origin, x, *r),
            Constraint::PerPoint(radii) => clamp_to_sphere(origin, x, radii[p]),
            Constraint::Box(dims) => {
                BoundingBox::centered(origin, *dims).clip_segment_from_inside(origin, x)
            }
        }
    }
}

/// `f64::max` that keeps NaN, so a blown-up step can never look converged.
#[inline]
fn max_or_nan(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.max(b)
    }
}

#[inline]
fn clamp_to_sphere(origin: [f64; 3], x: [f64; 3], r: f64) -> [f64; 3] {
    let d2 = dist2(x, origin);
    if d2 > r * r {
        let d = sub(x, origin);
        add(origin, scale(d, r / d2.sqrt()))
    } else {
        x
    }
}

/// Lifecycle of a [`Relaxation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelaxState {
    /// Buffers initialized, no iteration run yet.
    Idle,
    /// At least one iteration ran and neither budget nor threshold was hit.
    Iterating,
    /// The last iteration moved no point further than the threshold.
    Converged,
    /// The iteration budget was used up first.
    Exhausted,
    /// The caller's abort flag was seen between iterations.
    Aborted,
}

impl RelaxState {
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RelaxState::Converged | RelaxState::Exhausted | RelaxState::Aborted
        )
    }
}

/// Summary of a relaxation run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceReport {
    /// Largest point move of the last iteration (0 if none ran).
    pub final_max_displacement: f64,
    pub iterations_run: usize,
    pub converged: bool,
    pub state: RelaxState,
}

/// Final positions plus optional companion arrays.
#[derive(Clone, Debug)]
pub struct RelaxOutput {
    pub points: Vec<[f64; 3]>,
    /// `|final - original|` per point.
    pub displacement_scalars: Option<Vec<f64>>,
    /// `final - original` per point.
    pub displacement_vectors: Option<Vec<[f64; 3]>>,
    pub report: ConvergenceReport,
}

/// Iterative relaxation over a fixed stencil.
#[derive(Debug)]
pub struct Relaxation<'a> {
    input: &'a [[f64; 3]],
    stencil: &'a AdjacencyCsr,
    constraint: Constraint<'a>,
    config: RelaxationConfig,
    current: Vec<[f64; 3]>,
    scratch: Vec<[f64; 3]>,
    state: RelaxState,
    iterations: usize,
    max_displacement: f64,
}

impl<'a> Relaxation<'a> {
    /// Set up a relaxation of `points` without point attributes.
    ///
    /// A [`ConstraintSpec::PerPointArray`] constraint needs point data; use
    /// [`with_point_data`](Self::with_point_data) or [`for_mesh`](Self::for_mesh).
    pub fn new(
        points: &'a [[f64; 3]],
        stencil: &'a AdjacencyCsr,
        config: &RelaxationConfig,
    ) -> Result<Self, MeshError> {
        Self::setup(points, stencil, config, None)
    }

    /// Set up a relaxation resolving per-point constraints from `point_data`.
    pub fn with_point_data(
        points: &'a [[f64; 3]],
        stencil: &'a AdjacencyCsr,
        config: &RelaxationConfig,
        point_data: &'a BTreeMap<String, AttributeArray>,
    ) -> Result<Self, MeshError> {
        Self::setup(points, stencil, config, Some(point_data))
    }

    /// Set up a relaxation of a mesh's points.
    pub fn for_mesh(
        mesh: &'a Mesh,
        stencil: &'a AdjacencyCsr,
        config: &RelaxationConfig,
    ) -> Result<Self, MeshError> {
        Self::setup(mesh.points(), stencil, config, Some(mesh.point_data()))
    }

    fn setup(
        points: &'a [[f64; 3]],
        stencil: &'a AdjacencyCsr,
        config: &RelaxationConfig,
        point_data: Option<&'a BTreeMap<String, AttributeArray>>,
    ) -> Result<Self, MeshError> {
        config.validate()?;
        if stencil.num_points() != points.len() {
            return Err(MeshError::StencilSizeMismatch {
                expected: points.len(),
                found: stencil.num_points(),
            });
        }
        if let Some(point) = points.iter().position(|x| !x.iter().all(|c| c.is_finite())) {
            return Err(MeshError::NonFinitePosition { point });
        }
        let constraint = Constraint::resolve(&config.constraint, points.len(), point_data)?;
        Ok(Self {
            input: points,
            stencil,
            constraint,
            config: config.clone(),
            current: points.to_vec(),
            scratch: points.to_vec(),
            state: RelaxState::Idle,
            iterations: 0,
            max_displacement: 0.0,
        })
    }

    #[inline]
    pub fn state(&self) -> RelaxState {
        self.state
    }

    #[inline]
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Largest point move of the most recent iteration.
    #[inline]
    pub fn max_displacement(&self) -> f64 {
        self.max_displacement
    }

    /// Positions after the most recent iteration.
    #[inline]
    pub fn positions(&self) -> &[[f64; 3]] {
        &self.current
    }

    /// Run one iteration (if not terminal) and return the new state.
    pub fn step(&mut self) -> RelaxState {
        if self.state.is_terminal() {
            return self.state;
        }
        if self.iterations >= self.config.max_iterations {
            self.state = RelaxState::Exhausted;
            return self.state;
        }

        let input = self.input;
        let stencil = self.stencil;
        let constraint = &self.constraint;
        let factor = self.config.relax_factor;
        let current = &self.current;

        let max2 = for_each_mut_reduce(
            &mut self.scratch,
            0.0f64,
            |p, out| {
                let nbrs = stencil.neighbors(p);
                if nbrs.is_empty() || constraint.amplitude(p) == 0.0 {
                    *out = input[p];
                    return dist2(input[p], current[p]);
                }
                let mut sum = [0.0f64; 3];
                for &q in nbrs {
                    sum = add(sum, current[q as usize]);
                }
                let avg = scale(sum, 1.0 / nbrs.len() as f64);
                let here = current[p];
                let x = add(here, scale(sub(avg, here), factor));
                let x = constraint.apply(p, input[p], x);
                *out = x;
                dist2(x, here)
            },
            max_or_nan,
        );

        std::mem::swap(&mut self.current, &mut self.scratch);
        self.iterations += 1;
        self.max_displacement = max2.sqrt();
        log::trace!(
            "relax: iteration {} max displacement {:e}",
            self.iterations,
            self.max_displacement
        );

        self.state = if self.max_displacement <= self.config.convergence_threshold {
            RelaxState::Converged
        } else if self.iterations >= self.config.max_iterations {
            RelaxState::Exhausted
        } else {
            RelaxState::Iterating
        };
        if self.state.is_terminal() {
            self.log_termination();
        }
        self.state
    }

    /// Iterate until converged or out of budget.
    pub fn run(&mut self) -> ConvergenceReport {
        while !self.step().is_terminal() {}
        self.report()
    }

    /// Like [`run`](Self::run), checking `abort` before every iteration.
    pub fn run_with_abort(&mut self, abort: &AtomicBool) -> ConvergenceReport {
        while !self.state.is_terminal() {
            if abort.load(Ordering::Relaxed) {
                self.state = RelaxState::Aborted;
                self.log_termination();
                break;
            }
            self.step();
        }
        self.report()
    }

    pub fn report(&self) -> ConvergenceReport {
        ConvergenceReport {
            final_max_displacement: self.max_displacement,
            iterations_run: self.iterations,
            converged: self.state == RelaxState::Converged,
            state: self.state,
        }
    }

    /// Consume the run, producing final positions and companion arrays.
    pub fn finish(self) -> RelaxOutput {
        let report = self.report();
        let input = self.input;
        let points = self.current;
        let vectors = || map_collect(points.len(), |p| sub(points[p], input[p]));
        let displacement_scalars = self
            .config
            .emit_displacement_scalars
            .then(|| map_collect(points.len(), |p| dist2(points[p], input[p]).sqrt()));
        let displacement_vectors = self.config.emit_displacement_vectors.then(vectors);
        RelaxOutput {
            points,
            displacement_scalars,
            displacement_vectors,
            report,
        }
    }

    fn log_termination(&self) {
        match self.state {
            RelaxState::Exhausted => log::info!(
                "relax: budget of {} iterations exhausted, max displacement {:e} > {:e}",
                self.iterations,
                self.max_displacement,
                self.config.convergence_threshold
            ),
            state => log::debug!(
                "relax: {:?} after {} iterations, max displacement {:e}",
                state,
                self.iterations,
                self.max_displacement
            ),
        }
    }
}

/// Relax `mesh`'s points over the stencil of its unique edges.
pub fn smooth_mesh(mesh: &Mesh, config: &RelaxationConfig) -> Result<RelaxOutput, MeshError> {
    config.validate()?;
    let edges = unique_edges(mesh, AdjacencyOpts::default().grain)?;
    let stencil =
        AdjacencyCsr::from_unique_edges(mesh.num_points(), &edges, AdjacencyOpts::default())?;
    smooth_mesh_with_stencil(mesh, &stencil, config)
}

/// Relax `mesh`'s points over a caller-supplied stencil.
pub fn smooth_mesh_with_stencil(
    mesh: &Mesh,
    stencil: &AdjacencyCsr,
    config: &RelaxationConfig,
) -> Result<RelaxOutput, MeshError> {
    let mut relax = Relaxation::for_mesh(mesh, stencil, config)?;
    relax.run();
    Ok(relax.finish())
}
