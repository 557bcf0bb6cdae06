//! Linear program description and tableau construction.

use ndarray::{concatenate, Array1, Array2, Axis};

use crate::error::{Error, Result};
use crate::geometry;

/// Tolerance used for feasibility and zero tests during enumeration.
const TOL: f64 = 1e-7;

/// An immutable linear program `max c^T x  s.t.  Ax <= b, x >= 0`.
///
/// With the equality flag set, the constraints are read as `Ax = b` instead
/// and no slack variables are implied. Dimensions are validated on
/// construction: `A` is m by n, `b` has m entries, `c` has n entries, and
/// `m, n >= 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearProgram {
    a: Array2<f64>,
    b: Array1<f64>,
    c: Array1<f64>,
    equality: bool,
}

/// A vertex of the feasible region together with every basis that maps to it.
///
/// Degenerate vertices keep the full one-to-many relation between the point
/// and its bases rather than collapsing to a single representative.
#[derive(Debug, Clone)]
pub struct BasicFeasibleSolution {
    /// Full solution vector over structural and slack variables.
    pub x: Array1<f64>,
    /// Every basis whose basic solution is this vertex.
    pub bases: Vec<Vec<usize>>,
    /// Objective value at this vertex.
    pub obj: f64,
}

impl LinearProgram {
    fn validated(a: Array2<f64>, b: Array1<f64>, c: Array1<f64>, equality: bool) -> Result<Self> {
        let (m, n) = (a.nrows(), a.ncols());
        if m == 0 || n == 0 {
            return Err(Error::InvalidInput(
                "A must have at least one row and one column".to_string(),
            ));
        }
        if b.len() != m {
            return Err(Error::InvalidInput(format!(
                "A has {} rows but b has {} entries",
                m,
                b.len()
            )));
        }
        if c.len() != n {
            return Err(Error::InvalidInput(format!(
                "A has {} columns but c has {} entries",
                n,
                c.len()
            )));
        }
        Ok(Self { a, b, c, equality })
    }

    /// An LP in inequality standard form: `max c^T x  s.t.  Ax <= b, x >= 0`.
    pub fn new(a: Array2<f64>, b: Array1<f64>, c: Array1<f64>) -> Result<Self> {
        Self::validated(a, b, c, false)
    }

    /// An LP in equality standard form: `max c^T x  s.t.  Ax = b, x >= 0`.
    pub fn new_equality(a: Array2<f64>, b: Array1<f64>, c: Array1<f64>) -> Result<Self> {
        Self::validated(a, b, c, true)
    }

    /// Number of structural variables.
    pub fn n(&self) -> usize {
        self.a.ncols()
    }

    /// Number of constraints.
    pub fn m(&self) -> usize {
        self.a.nrows()
    }

    pub fn a(&self) -> &Array2<f64> {
        &self.a
    }

    pub fn b(&self) -> &Array1<f64> {
        &self.b
    }

    pub fn c(&self) -> &Array1<f64> {
        &self.c
    }

    pub fn is_equality(&self) -> bool {
        self.equality
    }

    /// Total number of variables in the equality representation:
    /// structural plus slack for inequality LPs.
    pub fn num_vars(&self) -> usize {
        if self.equality {
            self.n()
        } else {
            self.n() + self.m()
        }
    }

    /// The equality-standard-form coefficients `(A_e, b, c_e)`.
    ///
    /// For an inequality LP this appends one slack variable per constraint:
    /// `A_e = [A | I]` and `c_e = [c; 0]`. Equality LPs are returned as-is.
    pub fn equality_form(&self) -> (Array2<f64>, Array1<f64>, Array1<f64>) {
        if self.equality {
            return (self.a.clone(), self.b.clone(), self.c.clone());
        }
        let m = self.m();
        let eye = Array2::eye(m);
        let a_e = concatenate(Axis(1), &[self.a.view(), eye.view()])
            .unwrap_or_else(|_| unreachable!("row counts match by construction"));
        let mut c_e = Array1::zeros(self.n() + m);
        c_e.slice_mut(ndarray::s![..self.n()]).assign(&self.c);
        (a_e, self.b.clone(), c_e)
    }

    /// A copy of this LP with one additional inequality constraint
    /// `row . x <= rhs` appended.
    pub fn with_constraint(&self, row: Array1<f64>, rhs: f64) -> Result<Self> {
        if self.equality {
            return Err(Error::InvalidInput(
                "constraints can only be appended in inequality form".to_string(),
            ));
        }
        if row.len() != self.n() {
            return Err(Error::InvalidInput(format!(
                "constraint row has {} entries but the LP has {} variables",
                row.len(),
                self.n()
            )));
        }
        let row_mat = row.insert_axis(Axis(0));
        let a = concatenate(Axis(0), &[self.a.view(), row_mat.view()])
            .unwrap_or_else(|_| unreachable!("column counts match by construction"));
        let mut b = self.b.to_vec();
        b.push(rhs);
        Self::new(a, Array1::from(b), self.c.clone())
    }

    /// The canonical-form tableau for the given basis.
    ///
    /// The result is (m+1) by (N+2) where N is [`Self::num_vars`]: column 0
    /// is the z column, columns `1..=N` hold the variables, and the last
    /// column is the right-hand side. Row 0 carries the reduced costs and the
    /// objective value; row `i+1` corresponds to the i-th basis index in
    /// sorted order. Built by Gauss-Jordan elimination with partial pivoting,
    /// so the same LP and basis always yield an identical matrix.
    pub fn tableau(&self, basis: &[usize]) -> Result<Array2<f64>> {
        let sorted = self.check_basis(basis)?;
        let (a_e, b, c_e) = self.equality_form();
        let m = self.m();
        let total = self.num_vars();
        let width = total + 2;

        let mut t = Array2::zeros((m + 1, width));
        t[[0, 0]] = 1.0;
        for j in 0..total {
            t[[0, j + 1]] = -c_e[j];
        }
        for i in 0..m {
            for j in 0..total {
                t[[i + 1, j + 1]] = a_e[[i, j]];
            }
            t[[i + 1, width - 1]] = b[i];
        }

        // Pivot each basis column into its row.
        for (i, &var) in sorted.iter().enumerate() {
            let col = var + 1;
            let row = i + 1;
            let pivot_row = (row..=m)
                .max_by(|&r, &s| {
                    t[[r, col]]
                        .abs()
                        .partial_cmp(&t[[s, col]].abs())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .unwrap_or(row);
            if t[[pivot_row, col]].abs() < 1e-12 {
                return Err(Error::InvalidInput(format!(
                    "basis {:?} does not identify an invertible submatrix",
                    sorted
                )));
            }
            if pivot_row != row {
                for j in 0..width {
                    let tmp = t[[row, j]];
                    t[[row, j]] = t[[pivot_row, j]];
                    t[[pivot_row, j]] = tmp;
                }
            }
            let scale = t[[row, col]];
            for j in 0..width {
                t[[row, j]] /= scale;
            }
            for r in 0..=m {
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
        Ok(t)
    }

    fn check_basis(&self, basis: &[usize]) -> Result<Vec<usize>> {
        let m = self.m();
        let total = self.num_vars();
        if basis.len() != m {
            return Err(Error::InvalidInput(format!(
                "basis has {} indices but the LP has {} constraints",
                basis.len(),
                m
            )));
        }
        let mut sorted = basis.to_vec();
        sorted.sort_unstable();
        if sorted.windows(2).any(|w| w[0] == w[1]) || sorted.iter().any(|&v| v >= total) {
            return Err(Error::InvalidInput(format!(
                "basis {:?} must be {} distinct indices below {}",
                basis, m, total
            )));
        }
        Ok(sorted)
    }

    /// Every basic feasible solution of this LP.
    ///
    /// Enumerates all size-m column subsets of the equality representation,
    /// solves the square basic systems, and keeps the primal-feasible ones.
    /// Bases landing on the same point are grouped under one vertex.
    pub fn basic_feasible_solutions(&self) -> Vec<BasicFeasibleSolution> {
        let (a_e, b, c_e) = self.equality_form();
        let m = self.m();
        let total = self.num_vars();

        let mut out: Vec<BasicFeasibleSolution> = Vec::new();
        for basis in geometry::index_combinations(total, m) {
            let a_b = a_e.select(Axis(1), &basis);
            let x_b = match geometry::solve_square(&a_b, &b) {
                Some(x) => x,
                None => continue,
            };
            if x_b.iter().any(|&v| v < -TOL) {
                continue;
            }
            let mut x = Array1::zeros(total);
            for (i, &var) in basis.iter().enumerate() {
                x[var] = x_b[i];
            }
            match out.iter_mut().find(|bfs| close(&bfs.x, &x)) {
                Some(bfs) => bfs.bases.push(basis),
                None => {
                    let obj = c_e.dot(&x);
                    out.push(BasicFeasibleSolution {
                        x,
                        bases: vec![basis],
                        obj,
                    });
                }
            }
        }
        out
    }

    /// Extreme points of the feasible region `{Ax <= b, x >= 0}`.
    ///
    /// Only available for 2 and 3 variable inequality LPs; this is the
    /// geometric counterpart of [`Self::basic_feasible_solutions`].
    pub fn vertices(&self) -> Result<Vec<Array1<f64>>> {
        if self.equality {
            return Err(Error::InvalidInput(
                "vertices require inequality standard form".to_string(),
            ));
        }
        let n = self.n();
        let neg_eye = -Array2::<f64>::eye(n);
        let a = concatenate(Axis(0), &[self.a.view(), neg_eye.view()])
            .unwrap_or_else(|_| unreachable!("column counts match by construction"));
        let b = concatenate(
            Axis(0),
            &[self.b.view(), Array1::<f64>::zeros(n).view()],
        )
        .unwrap_or_else(|_| unreachable!("one-dimensional concatenation"));
        geometry::polytope_vertices(&a, &b)
    }
}

fn close(a: &Array1<f64>, b: &Array1<f64>) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 1e-6)
}
