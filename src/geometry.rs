//! Computational geometry over half-space systems `Ax <= b`.
//!
//! All public entry points operate on polytopes in 2 or 3 dimensions. The
//! algorithms are combinatorial and exact up to a fixed tolerance, sized for
//! small pedagogical systems rather than large instances.

use ndarray::{Array1, Array2, Axis};

use crate::error::{Error, Result};

/// Tolerance for feasibility and tightness comparisons.
const TOL: f64 = 1e-7;

/// Tolerance under which two points are collapsed to one vertex.
const DUP_TOL: f64 = 1e-6;

/// All k-element index subsets of `0..n` in lexicographic order.
pub(crate) fn index_combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
    if k > n {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut current: Vec<usize> = (0..k).collect();
    loop {
        out.push(current.clone());
        // Advance the rightmost index that can still move.
        let mut i = k;
        loop {
            if i == 0 {
                return out;
            }
            i -= 1;
            if current[i] != i + n - k {
                break;
            }
            if i == 0 {
                return out;
            }
        }
        current[i] += 1;
        for j in i + 1..k {
            current[j] = current[j - 1] + 1;
        }
    }
}

/// Solve the square system `Ax = b` by Gaussian elimination with partial
/// pivoting. Returns `None` when the system is singular (no unique solution).
pub(crate) fn solve_square(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    debug_assert_eq!(n, a.ncols());
    debug_assert_eq!(n, b.len());

    let mut m = a.clone();
    let mut rhs = b.clone();
    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&r, &s| {
                m[[r, col]]
                    .abs()
                    .partial_cmp(&m[[s, col]].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })?;
        if m[[pivot_row, col]].abs() < 1e-12 {
            return None;
        }
        if pivot_row != col {
            for j in 0..n {
                let tmp = m[[col, j]];
                m[[col, j]] = m[[pivot_row, j]];
                m[[pivot_row, j]] = tmp;
            }
            rhs.swap(col, pivot_row);
        }
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = m[[row, col]] / m[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for j in col..n {
                m[[row, j]] -= factor * m[[col, j]];
            }
            rhs[row] -= factor * rhs[col];
        }
    }
    let mut x = Array1::zeros(n);
    for i in 0..n {
        x[i] = rhs[i] / m[[i, i]];
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}

fn points_close(a: &Array1<f64>, b: &Array1<f64>) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < DUP_TOL)
}

fn check_system(a: &Array2<f64>, b: &Array1<f64>) -> Result<()> {
    if a.nrows() != b.len() {
        return Err(Error::InvalidInput(format!(
            "A has {} rows but b has {} entries",
            a.nrows(),
            b.len()
        )));
    }
    if a.nrows() == 0 {
        return Err(Error::InvalidInput("empty half-space system".to_string()));
    }
    Ok(())
}

fn check_dimension(n: usize) -> Result<()> {
    if n != 2 && n != 3 {
        return Err(Error::InvalidInput(format!(
            "only 2 and 3 dimensional polytopes are supported, got {}",
            n
        )));
    }
    Ok(())
}

/// Vertex enumeration without the dimensionality guard. Every size-n subset
/// of constraints is intersected; singular subsets and infeasible
/// intersections are dropped, and coincident points (degenerate bases)
/// collapse to a single vertex.
pub(crate) fn enumerate_vertices(a: &Array2<f64>, b: &Array1<f64>) -> Vec<Array1<f64>> {
    let m = a.nrows();
    let n = a.ncols();
    let mut vertices: Vec<Array1<f64>> = Vec::new();
    for subset in index_combinations(m, n) {
        let sub_a = a.select(Axis(0), &subset);
        let sub_b = b.select(Axis(0), &subset);
        let x = match solve_square(&sub_a, &sub_b) {
            Some(x) => x,
            None => continue,
        };
        let ax = a.dot(&x);
        if ax.iter().zip(b.iter()).any(|(&lhs, &rhs)| lhs > rhs + TOL) {
            continue;
        }
        if !vertices.iter().any(|v| points_close(v, &x)) {
            vertices.push(x);
        }
    }
    vertices
}

/// Extreme points of the polytope `{x : Ax <= b}`.
///
/// Non-negativity is not implied; callers wanting `x >= 0` must append the
/// corresponding rows. Returns an unordered set of distinct points.
pub fn polytope_vertices(a: &Array2<f64>, b: &Array1<f64>) -> Result<Vec<Array1<f64>>> {
    check_dimension(a.ncols())?;
    check_system(a, b)?;
    Ok(enumerate_vertices(a, b))
}

/// Coordinate cap for the lifted polytope in [`interior_point`]. Regions
/// with a free direction have no vertices, so the search is confined to a
/// box this large around the origin.
const INTERIOR_BOX: f64 = 1e6;

/// A point strictly inside `{x : Ax <= b}`.
///
/// Maximizes the minimum slack across all constraints: the lifted system
/// `{(x, d) : Ax + 1d <= b, 0 <= d <= 1, |x_j| <= INTERIOR_BOX}` is
/// enumerated and the vertex with the largest `d` is taken. Any `d > 0`
/// witnesses a strict interior point; the `d <= 1` cap and the box rows keep
/// the lifted polytope bounded, so vertices exist whenever the region is
/// non-empty.
pub fn interior_point(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    check_dimension(a.ncols())?;
    check_system(a, b)?;
    let m = a.nrows();
    let n = a.ncols();

    let rows = m + 2 + 2 * n;
    let mut lifted_a = Array2::zeros((rows, n + 1));
    let mut lifted_b = Array1::zeros(rows);
    for i in 0..m {
        for j in 0..n {
            lifted_a[[i, j]] = a[[i, j]];
        }
        lifted_a[[i, n]] = 1.0;
        lifted_b[i] = b[i];
    }
    lifted_a[[m, n]] = -1.0;
    lifted_a[[m + 1, n]] = 1.0;
    lifted_b[m + 1] = 1.0;
    for j in 0..n {
        let up = m + 2 + 2 * j;
        lifted_a[[up, j]] = 1.0;
        lifted_b[up] = INTERIOR_BOX;
        lifted_a[[up + 1, j]] = -1.0;
        lifted_b[up + 1] = INTERIOR_BOX;
    }

    let candidates = enumerate_vertices(&lifted_a, &lifted_b);
    let best = candidates
        .into_iter()
        .max_by(|p, q| p[n].partial_cmp(&q[n]).unwrap_or(std::cmp::Ordering::Equal));
    match best {
        Some(v) if v[n] > TOL => Ok(v.slice(ndarray::s![..n]).to_owned()),
        _ => Err(Error::NoInteriorPoint),
    }
}

fn centroid(points: &[Array1<f64>]) -> Array1<f64> {
    let n = points[0].len();
    let mut c = Array1::zeros(n);
    for p in points {
        c += p;
    }
    c / points.len() as f64
}

fn cross(u: &Array1<f64>, v: &Array1<f64>) -> Array1<f64> {
    Array1::from(vec![
        u[1] * v[2] - u[2] * v[1],
        u[2] * v[0] - u[0] * v[2],
        u[0] * v[1] - u[1] * v[0],
    ])
}

fn norm(v: &Array1<f64>) -> f64 {
    v.dot(v).sqrt()
}

/// Order coplanar points angularly around their centroid so that consecutive
/// points trace a simple (non-self-intersecting) polygon boundary.
///
/// Vertex enumeration returns points in no guaranteed order; this puts them
/// in drawing order. Collinear point sets are ordered along their line.
pub fn order_points(points: &[Array1<f64>]) -> Result<Vec<Array1<f64>>> {
    if let Some(first) = points.first() {
        let n = first.len();
        check_dimension(n)?;
        if points.iter().any(|p| p.len() != n) {
            return Err(Error::InvalidInput(
                "points must share one dimension".to_string(),
            ));
        }
    }
    if points.len() < 3 {
        return Ok(points.to_vec());
    }
    let n = points[0].len();
    let c = centroid(points);

    let mut keyed: Vec<(f64, Array1<f64>)> = if n == 2 {
        points
            .iter()
            .map(|p| ((p[1] - c[1]).atan2(p[0] - c[0]), p.clone()))
            .collect()
    } else {
        // Build an orthonormal basis (u, w) of the points' plane.
        let d0 = points[0].clone() - &c;
        let d1 = points
            .iter()
            .map(|p| p - &c)
            .find(|d| norm(&cross(&d0, d)) > 1e-9);
        match d1 {
            None => {
                // Collinear: order along the line through the centroid.
                points
                    .iter()
                    .map(|p| ((p - &c).dot(&d0), p.clone()))
                    .collect()
            }
            Some(d1) => {
                let normal = cross(&d0, &d1);
                let u = &d0 / norm(&d0);
                let w_raw = cross(&normal, &u);
                let w = &w_raw / norm(&w_raw);
                points
                    .iter()
                    .map(|p| {
                        let d = p - &c;
                        (d.dot(&w).atan2(d.dot(&u)), p.clone())
                    })
                    .collect()
            }
        }
    };
    keyed.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    Ok(keyed.into_iter().map(|(_, p)| p).collect())
}

/// Facets of the polytope `{x : Ax <= b}` as ordered vertex rings.
///
/// Returns one ring per constraint row: the given vertices tight for that
/// row, in drawing order. Rows supporting no vertex yield an empty ring.
pub fn polytope_facets(
    a: &Array2<f64>,
    b: &Array1<f64>,
    vertices: &[Array1<f64>],
) -> Result<Vec<Vec<Array1<f64>>>> {
    check_dimension(a.ncols())?;
    check_system(a, b)?;
    let mut facets = Vec::with_capacity(a.nrows());
    for i in 0..a.nrows() {
        let row = a.row(i);
        let tight: Vec<Array1<f64>> = vertices
            .iter()
            .filter(|v| (row.dot(*v) - b[i]).abs() < TOL)
            .cloned()
            .collect();
        facets.push(order_points(&tight)?);
    }
    Ok(facets)
}

/// Ordered boundary points of the cross-section of the hyperplane
/// `normal . x = v` with the polytope `{x : Ax <= b}`.
///
/// In 2-d the cross-section is a segment (up to two points); in 3-d it is a
/// convex polygon returned in drawing order. An empty result means the
/// hyperplane misses the polytope.
pub fn intersection(
    normal: &Array1<f64>,
    v: f64,
    a: &Array2<f64>,
    b: &Array1<f64>,
) -> Result<Vec<Array1<f64>>> {
    check_dimension(a.ncols())?;
    check_system(a, b)?;
    if normal.len() != a.ncols() {
        return Err(Error::InvalidInput(format!(
            "hyperplane normal has dimension {} but polytope has dimension {}",
            normal.len(),
            a.ncols()
        )));
    }
    let m = a.nrows();
    let n = a.ncols();

    // The hyperplane as a pair of opposing half-spaces.
    let mut aug_a = Array2::zeros((m + 2, n));
    let mut aug_b = Array1::zeros(m + 2);
    for i in 0..m {
        for j in 0..n {
            aug_a[[i, j]] = a[[i, j]];
        }
        aug_b[i] = b[i];
    }
    for j in 0..n {
        aug_a[[m, j]] = normal[j];
        aug_a[[m + 1, j]] = -normal[j];
    }
    aug_b[m] = v;
    aug_b[m + 1] = -v;

    order_points(&enumerate_vertices(&aug_a, &aug_b))
}
