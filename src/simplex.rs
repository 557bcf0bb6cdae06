//! The revised simplex method with pivot-path tracking.

use log::debug;
use ndarray::Array1;

use crate::error::{Error, Result};
use crate::geometry::index_combinations;
use crate::lp::LinearProgram;

/// Entering-variable selection rule.
///
/// Only Bland's rule is guaranteed to terminate on degenerate problems; the
/// other rules can cycle and are offered for their typical (not worst-case)
/// speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PivotRule {
    /// Smallest index among columns with negative reduced cost. Combined
    /// with the smallest-basic-index ratio tie break this never revisits a
    /// basis (anti-cycling).
    #[default]
    Bland,
    /// Most negative reduced cost. Not cycle-safe.
    Dantzig,
    /// Largest actual objective increase per pivot. Not cycle-safe.
    GreatestAscent,
}

/// Parameters for a [`simplex`] run.
#[derive(Debug, Clone)]
pub struct SimplexOptions {
    pub pivot_rule: PivotRule,
    /// A starting point; must be a vertex of the feasible region.
    pub initial_solution: Option<Array1<f64>>,
    /// Cap on the number of pivots. Reaching it stops the run early without
    /// failing; check [`SimplexResult::optimal`].
    pub iteration_limit: Option<usize>,
    /// Primal feasibility tolerance for all sign and zero comparisons.
    pub feas_tol: f64,
}

impl Default for SimplexOptions {
    fn default() -> Self {
        Self {
            pivot_rule: PivotRule::Bland,
            initial_solution: None,
            iteration_limit: None,
            feas_tol: 1e-7,
        }
    }
}

/// One basis visited by simplex.
#[derive(Debug, Clone, PartialEq)]
pub struct PathEntry {
    /// Full solution vector (structural and slack variables).
    pub x: Array1<f64>,
    /// Basis indices in sorted order.
    pub basis: Vec<usize>,
    /// Objective value at this basis.
    pub obj: f64,
}

/// Outcome of a [`simplex`] run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimplexResult {
    /// Final solution vector.
    pub x: Array1<f64>,
    /// Final basis.
    pub basis: Vec<usize>,
    /// Final objective value.
    pub obj: f64,
    /// Every basis visited, from the initial feasible basis to the last.
    pub path: Vec<PathEntry>,
    /// False only when the iteration cap stopped the run before optimality.
    pub optimal: bool,
}

/// Solve `max c^T x  s.t.  Ax <= b, x >= 0` and record the full pivot path.
///
/// The initial basis is the all-slack basis, so a negative entry in `b`
/// makes the origin infeasible and the run fails with [`Error::Infeasible`]
/// unless a feasible vertex is supplied via
/// [`SimplexOptions::initial_solution`]. No positive entry in an improving
/// column means the objective grows along a feasible ray and the run fails
/// with [`Error::Unbounded`].
pub fn simplex(lp: &LinearProgram, opts: &SimplexOptions) -> Result<SimplexResult> {
    if lp.is_equality() {
        return Err(Error::InvalidInput(
            "simplex requires inequality standard form".to_string(),
        ));
    }
    if !(opts.feas_tol > 0.0) {
        return Err(Error::InvalidInput(
            "feasibility tolerance must be positive".to_string(),
        ));
    }
    let n = lp.n();
    let m = lp.m();
    let total = n + m;
    let width = total + 2;
    let tol = opts.feas_tol;

    let basis = match &opts.initial_solution {
        Some(x0) => basis_of_vertex(lp, x0, tol)?,
        None => {
            if lp.b().iter().any(|&bi| bi < -tol) {
                return Err(Error::Infeasible);
            }
            (n..total).collect()
        }
    };

    let mut t = lp.tableau(&basis)?;
    // Row i+1 of a fresh tableau holds the i-th basis index in sorted order.
    let mut row_vars = basis;
    row_vars.sort_unstable();
    if (1..=m).any(|r| t[[r, width - 1]] < -tol) {
        return Err(Error::Infeasible);
    }

    let mut path: Vec<PathEntry> = Vec::new();
    let mut pivots = 0usize;
    let optimal = loop {
        path.push(snapshot(&t, &row_vars, total));

        let improving: Vec<usize> = (0..total).filter(|&j| t[[0, j + 1]] < -tol).collect();
        if improving.is_empty() {
            break true;
        }
        if opts.iteration_limit.is_some_and(|limit| pivots >= limit) {
            break false;
        }

        let entering = match opts.pivot_rule {
            PivotRule::Bland => improving[0],
            PivotRule::Dantzig => {
                let mut best = improving[0];
                for &j in &improving[1..] {
                    if t[[0, j + 1]] < t[[0, best + 1]] {
                        best = j;
                    }
                }
                best
            }
            PivotRule::GreatestAscent => {
                let mut best = None;
                for &j in &improving {
                    let row = ratio_test(&t, &row_vars, j, tol).ok_or(Error::Unbounded)?;
                    let step = t[[row, width - 1]] / t[[row, j + 1]];
                    let gain = -t[[0, j + 1]] * step;
                    if best.is_none_or(|(g, _)| gain > g) {
                        best = Some((gain, j));
                    }
                }
                // `improving` is non-empty here.
                best.map(|(_, j)| j).ok_or(Error::Unbounded)?
            }
        };

        let leaving_row =
            ratio_test(&t, &row_vars, entering, tol).ok_or(Error::Unbounded)?;
        debug!(
            "pivot {}: x{} enters, x{} leaves",
            pivots + 1,
            entering,
            row_vars[leaving_row - 1]
        );
        pivot(&mut t, leaving_row, entering + 1);
        row_vars[leaving_row - 1] = entering;
        pivots += 1;
    };

    // The path always holds at least the initial basis.
    let last = &path[path.len() - 1];
    let (x, basis, obj) = (last.x.clone(), last.basis.clone(), last.obj);
    Ok(SimplexResult {
        x,
        basis,
        obj,
        path,
        optimal,
    })
}

/// Minimum-ratio test for the entering column. Ties are broken by the
/// smallest basic-variable index, which keeps Bland's rule cycle-free and is
/// degeneracy-safe for the other rules. `None` means no constraint row bounds
/// the entering variable.
fn ratio_test(
    t: &ndarray::Array2<f64>,
    row_vars: &[usize],
    entering: usize,
    tol: f64,
) -> Option<usize> {
    let m = t.nrows() - 1;
    let width = t.ncols();
    let col = entering + 1;
    let mut best: Option<(f64, usize)> = None;
    for r in 1..=m {
        let coef = t[[r, col]];
        if coef <= tol {
            continue;
        }
        let ratio = t[[r, width - 1]] / coef;
        best = match best {
            None => Some((ratio, r)),
            Some((best_ratio, best_row)) => {
                if ratio < best_ratio - tol {
                    Some((ratio, r))
                } else if (ratio - best_ratio).abs() <= tol
                    && row_vars[r - 1] < row_vars[best_row - 1]
                {
                    Some((ratio, r))
                } else {
                    Some((best_ratio, best_row))
                }
            }
        };
    }
    best.map(|(_, r)| r)
}

/// Gauss-Jordan update: make `col` a unit column with its one in `row`.
fn pivot(t: &mut ndarray::Array2<f64>, row: usize, col: usize) {
    let rows = t.nrows();
    let width = t.ncols();
    let scale = t[[row, col]];
    for j in 0..width {
        t[[row, j]] /= scale;
    }
    for r in 0..rows {
        if r == row {
            continue;
        }
        let factor = t[[r, col]];
        if factor == 0.0 {
            continue;
        }
        for j in 0..width {
            t[[r, j]] -= factor * t[[row, j]];
        }
        t[[r, col]] = 0.0;
    }
    t[[row, col]] = 1.0;
}

fn snapshot(t: &ndarray::Array2<f64>, row_vars: &[usize], total: usize) -> PathEntry {
    let width = t.ncols();
    let mut x = Array1::zeros(total);
    for (i, &var) in row_vars.iter().enumerate() {
        x[var] = t[[i + 1, width - 1]];
    }
    let mut basis = row_vars.to_vec();
    basis.sort_unstable();
    PathEntry {
        x,
        basis,
        obj: t[[0, width - 1]],
    }
}

/// The basis induced by a supplied starting point, which must be a vertex of
/// the feasible region.
fn basis_of_vertex(lp: &LinearProgram, x0: &Array1<f64>, tol: f64) -> Result<Vec<usize>> {
    let n = lp.n();
    let m = lp.m();
    let total = n + m;
    if x0.len() != n {
        return Err(Error::InvalidInput(format!(
            "initial solution has {} entries but the LP has {} variables",
            x0.len(),
            n
        )));
    }

    let slack = lp.b() - &lp.a().dot(x0);
    let mut x = Array1::zeros(total);
    x.slice_mut(ndarray::s![..n]).assign(x0);
    x.slice_mut(ndarray::s![n..]).assign(&slack);
    if x.iter().any(|&v| v < -tol) {
        return Err(Error::InvalidInput(
            "initial solution is not feasible".to_string(),
        ));
    }

    let nonzero: Vec<usize> = (0..total).filter(|&j| x[j].abs() > tol).collect();
    if nonzero.len() > m {
        return Err(Error::InvalidInput(
            "initial solution is not a vertex of the feasible region".to_string(),
        ));
    }
    let zero: Vec<usize> = (0..total).filter(|&j| x[j].abs() <= tol).collect();

    // Fill the basis with zero-valued variables until some invertible
    // completion is found; degenerate vertices admit several.
    for fill in index_combinations(zero.len(), m - nonzero.len()) {
        let mut candidate = nonzero.clone();
        candidate.extend(fill.iter().map(|&k| zero[k]));
        if lp.tableau(&candidate).is_ok() {
            return Ok(candidate);
        }
    }
    Err(Error::InvalidInput(
        "initial solution is not a vertex of the feasible region".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr1, arr2};

    fn box_lp() -> LinearProgram {
        // max x + y  s.t.  x <= 1, y <= 1
        LinearProgram::new(
            arr2(&[[1.0, 0.0], [0.0, 1.0]]),
            arr1(&[1.0, 1.0]),
            arr1(&[1.0, 1.0]),
        )
        .unwrap()
    }

    #[test]
    fn solves_a_small_lp_to_optimality() {
        // max 2x + y  s.t.  x + y <= 2, x <= 1
        let lp = LinearProgram::new(
            arr2(&[[1.0, 1.0], [1.0, 0.0]]),
            arr1(&[2.0, 1.0]),
            arr1(&[2.0, 1.0]),
        )
        .unwrap();
        let sol = simplex(&lp, &SimplexOptions::default()).unwrap();
        assert!(sol.optimal);
        assert_abs_diff_eq!(sol.obj, 3.0, epsilon = 1e-7);
        assert_abs_diff_eq!(sol.x[0], 1.0, epsilon = 1e-7);
        assert_abs_diff_eq!(sol.x[1], 1.0, epsilon = 1e-7);
    }

    #[test]
    fn path_runs_from_slack_basis_to_optimum() {
        let lp = box_lp();
        let sol = simplex(&lp, &SimplexOptions::default()).unwrap();
        assert!(sol.path.len() >= 2);
        assert_eq!(sol.path[0].basis, vec![2, 3]);
        assert_abs_diff_eq!(sol.path[0].obj, 0.0, epsilon = 1e-12);
        assert_eq!(sol.path.last().unwrap().basis, sol.basis);
        assert_abs_diff_eq!(sol.obj, 2.0, epsilon = 1e-7);
    }

    #[test]
    fn negative_rhs_at_the_origin_is_infeasible() {
        let lp = LinearProgram::new(arr2(&[[1.0, 1.0]]), arr1(&[-1.0]), arr1(&[1.0, 1.0]))
            .unwrap();
        assert_eq!(
            simplex(&lp, &SimplexOptions::default()),
            Err(Error::Infeasible)
        );
    }

    #[test]
    fn unbounded_ray_is_detected() {
        // max x + y  s.t.  x - y <= 1: the objective grows along (1, 1).
        let lp = LinearProgram::new(arr2(&[[1.0, -1.0]]), arr1(&[1.0]), arr1(&[1.0, 1.0]))
            .unwrap();
        assert_eq!(
            simplex(&lp, &SimplexOptions::default()),
            Err(Error::Unbounded)
        );
    }

    #[test]
    fn iteration_cap_stops_early_without_failing() {
        let lp = box_lp();
        let opts = SimplexOptions {
            iteration_limit: Some(1),
            ..Default::default()
        };
        let sol = simplex(&lp, &opts).unwrap();
        assert!(!sol.optimal);
        assert_eq!(sol.path.len(), 2);
    }

    #[test]
    fn supplied_vertex_becomes_the_initial_basis() {
        let lp = box_lp();
        let opts = SimplexOptions {
            initial_solution: Some(arr1(&[1.0, 0.0])),
            ..Default::default()
        };
        let sol = simplex(&lp, &opts).unwrap();
        assert_abs_diff_eq!(sol.path[0].x[0], 1.0, epsilon = 1e-10);
        assert_abs_diff_eq!(sol.path[0].x[1], 0.0, epsilon = 1e-10);
        assert!(sol.optimal);
        assert_abs_diff_eq!(sol.obj, 2.0, epsilon = 1e-7);
    }

    #[test]
    fn interior_starting_point_is_rejected() {
        let lp = box_lp();
        let opts = SimplexOptions {
            initial_solution: Some(arr1(&[0.5, 0.5])),
            ..Default::default()
        };
        assert!(matches!(simplex(&lp, &opts), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn infeasible_starting_point_is_rejected() {
        let lp = box_lp();
        let opts = SimplexOptions {
            initial_solution: Some(arr1(&[2.0, 0.0])),
            ..Default::default()
        };
        assert!(matches!(simplex(&lp, &opts), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn optimum_dominates_every_vertex() {
        let lp = LinearProgram::new(
            arr2(&[[1.0, 2.0], [4.0, 2.0]]),
            arr1(&[4.0, 12.0]),
            arr1(&[1.0, 1.0]),
        )
        .unwrap();
        let sol = simplex(&lp, &SimplexOptions::default()).unwrap();
        for v in lp.vertices().unwrap() {
            assert!(lp.c().dot(&v) <= sol.obj + 1e-7);
        }
    }

    #[test]
    fn bland_terminates_on_beales_cycling_lp() {
        // Beale's example: degenerate pivots can cycle under the classic
        // most-negative rule. Bland's rule must terminate at 1/20.
        let lp = LinearProgram::new(
            arr2(&[
                [0.25, -60.0, -0.04, 9.0],
                [0.5, -90.0, -0.02, 3.0],
                [0.0, 0.0, 1.0, 0.0],
            ]),
            arr1(&[0.0, 0.0, 1.0]),
            arr1(&[0.75, -150.0, 0.02, -6.0]),
        )
        .unwrap();
        let sol = simplex(&lp, &SimplexOptions::default()).unwrap();
        assert!(sol.optimal);
        assert_abs_diff_eq!(sol.obj, 0.05, epsilon = 1e-7);
        // Anti-cycling: no basis is ever revisited.
        for (i, entry) in sol.path.iter().enumerate() {
            for later in &sol.path[i + 1..] {
                assert_ne!(entry.basis, later.basis);
            }
        }
    }

    #[test]
    fn repeated_runs_take_identical_paths() {
        let lp = LinearProgram::new(
            arr2(&[[1.0, 2.0], [4.0, 2.0]]),
            arr1(&[4.0, 12.0]),
            arr1(&[3.0, 1.0]),
        )
        .unwrap();
        let first = simplex(&lp, &SimplexOptions::default()).unwrap();
        let second = simplex(&lp, &SimplexOptions::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn dantzig_and_greatest_ascent_reach_the_same_optimum() {
        let lp = LinearProgram::new(
            arr2(&[[1.0, 2.0], [4.0, 2.0]]),
            arr1(&[4.0, 12.0]),
            arr1(&[1.0, 1.0]),
        )
        .unwrap();
        for rule in [PivotRule::Dantzig, PivotRule::GreatestAscent] {
            let opts = SimplexOptions {
                pivot_rule: rule,
                ..Default::default()
            };
            let sol = simplex(&lp, &opts).unwrap();
            assert!(sol.optimal);
            assert_abs_diff_eq!(sol.obj, 10.0 / 3.0, epsilon = 1e-7);
        }
    }

    #[test]
    fn equality_form_lps_are_rejected() {
        let lp = LinearProgram::new_equality(
            arr2(&[[1.0, 1.0]]),
            arr1(&[1.0]),
            arr1(&[1.0, 1.0]),
        )
        .unwrap();
        assert!(matches!(
            simplex(&lp, &SimplexOptions::default()),
            Err(Error::InvalidInput(_))
        ));
    }
}
