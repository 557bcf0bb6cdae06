//! Branch and bound over integer-constrained linear programs.
//!
//! [`branch_and_bound_iteration`] is the single-step contract: one
//! relaxation-solve-and-branch (or fathom) action that hands control back to
//! the caller. [`BranchAndBound`] is the depth-first driver built on top of
//! it, keeping the node tree in an arena so external tooling can annotate
//! nodes by id.

use log::debug;
use ndarray::Array1;

use crate::error::{Error, Result};
use crate::lp::LinearProgram;
use crate::simplex::{simplex, SimplexOptions};

/// Tolerances for a branch and bound run.
#[derive(Debug, Clone)]
pub struct BnbOptions {
    /// Primal feasibility tolerance for the LP relaxations.
    pub feas_tol: f64,
    /// A component within this distance of an integer counts as integral.
    pub int_feas_tol: f64,
}

impl Default for BnbOptions {
    fn default() -> Self {
        Self {
            feas_tol: 1e-7,
            int_feas_tol: 1e-7,
        }
    }
}

/// Outcome of one branch and bound step.
#[derive(Debug, Clone)]
pub struct BnbIteration {
    /// True when the node was pruned: infeasible, dominated by the current
    /// bound, or integral.
    pub fathomed: bool,
    /// Best integer-feasible structural solution found so far.
    pub incumbent: Option<Array1<f64>>,
    /// Objective value of the incumbent; children must beat it.
    pub best_bound: Option<f64>,
    /// Child with `x_i <= floor(v)` appended, when branching occurred.
    pub left: Option<LinearProgram>,
    /// Child with `x_i >= ceil(v)` appended, when branching occurred.
    pub right: Option<LinearProgram>,
}

/// Perform exactly one branch and bound action on `lp`.
///
/// Solves the LP relaxation, then fathoms (on infeasibility, bound
/// domination, or integrality) or branches on a fractional variable. The
/// branching variable is the first fractional one unless `branch_var` names
/// another; supplying a non-fractional index is an error, which is the hook
/// for manual stepping. An unbounded relaxation propagates as
/// [`Error::Unbounded`].
pub fn branch_and_bound_iteration(
    lp: &LinearProgram,
    incumbent: Option<&Array1<f64>>,
    best_bound: Option<f64>,
    branch_var: Option<usize>,
    opts: &BnbOptions,
) -> Result<BnbIteration> {
    let unchanged = |fathomed: bool| BnbIteration {
        fathomed,
        incumbent: incumbent.cloned(),
        best_bound,
        left: None,
        right: None,
    };

    let simplex_opts = SimplexOptions {
        feas_tol: opts.feas_tol,
        ..Default::default()
    };
    let sol = match simplex(lp, &simplex_opts) {
        Ok(sol) => sol,
        Err(Error::Infeasible) => {
            debug!("relaxation infeasible, fathoming");
            return Ok(unchanged(true));
        }
        Err(e) => return Err(e),
    };

    if let Some(bound) = best_bound {
        if sol.obj <= bound {
            debug!("relaxation value {} within bound {}, fathoming", sol.obj, bound);
            return Ok(unchanged(true));
        }
    }

    let x = sol.x.slice(ndarray::s![..lp.n()]).to_owned();
    let fractional: Vec<usize> = (0..lp.n())
        .filter(|&i| (x[i] - x[i].round()).abs() > opts.int_feas_tol)
        .collect();

    if fractional.is_empty() {
        debug!("integral solution with value {}, new incumbent", sol.obj);
        return Ok(BnbIteration {
            fathomed: true,
            incumbent: Some(x),
            best_bound: Some(sol.obj),
            left: None,
            right: None,
        });
    }

    let var = match branch_var {
        Some(i) => {
            if !fractional.contains(&i) {
                return Err(Error::InvalidInput(format!(
                    "variable {} is not fractional in the relaxation solution",
                    i
                )));
            }
            i
        }
        None => fractional[0],
    };
    let value = x[var];
    let floor = value.floor();
    debug!("branching on x{} = {}", var, value);

    let mut row = Array1::zeros(lp.n());
    row[var] = 1.0;
    let left = lp.with_constraint(row.clone(), floor)?;
    let right = lp.with_constraint(-row, -(floor + 1.0))?;

    Ok(BnbIteration {
        fathomed: false,
        incumbent: incumbent.cloned(),
        best_bound,
        left: Some(left),
        right: Some(right),
    })
}

pub type NodeId = usize;

/// Lifecycle of a node in the branch and bound tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Unexplored,
    Fathomed,
    Branched,
}

/// One node of the tree: an LP plus its tree links.
#[derive(Debug, Clone)]
pub struct Node {
    pub lp: LinearProgram,
    pub parent: Option<NodeId>,
    pub children: Option<(NodeId, NodeId)>,
    pub status: NodeStatus,
}

/// What one driver step did.
#[derive(Debug, Clone, Copy)]
pub struct Step {
    /// The node that was explored.
    pub node: NodeId,
    pub fathomed: bool,
    /// Ids of the left and right children created by branching.
    pub children: Option<(NodeId, NodeId)>,
}

/// Best integer-feasible solution of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct BnbSolution {
    pub x: Array1<f64>,
    pub obj: f64,
}

/// Depth-first branch and bound driver.
///
/// Nodes live in an arena indexed by [`NodeId`]; the root LP is node 0.
/// The frontier is a stack and the left child is explored first. Between
/// steps the incumbent, bound, frontier, and any node are inspectable, which
/// is what manual stepping builds on.
#[derive(Debug, Clone)]
pub struct BranchAndBound {
    nodes: Vec<Node>,
    frontier: Vec<NodeId>,
    incumbent: Option<Array1<f64>>,
    best_bound: Option<f64>,
    opts: BnbOptions,
}

impl BranchAndBound {
    pub fn new(lp: LinearProgram, opts: BnbOptions) -> Self {
        let root = Node {
            lp,
            parent: None,
            children: None,
            status: NodeStatus::Unexplored,
        };
        Self {
            nodes: vec![root],
            frontier: vec![0],
            incumbent: None,
            best_bound: None,
            opts,
        }
    }

    pub fn incumbent(&self) -> Option<&Array1<f64>> {
        self.incumbent.as_ref()
    }

    pub fn best_bound(&self) -> Option<f64> {
        self.best_bound
    }

    /// Unexplored node ids in stack order; the last entry is explored next.
    pub fn frontier(&self) -> &[NodeId] {
        &self.frontier
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_done(&self) -> bool {
        self.frontier.is_empty()
    }

    /// Explore the next frontier node. Returns `None` once the frontier is
    /// empty. `branch_var` overrides the first-fractional branching policy
    /// for this step only; naming a non-fractional variable is an error and
    /// leaves the frontier untouched.
    pub fn step(&mut self, branch_var: Option<usize>) -> Result<Option<Step>> {
        let id = match self.frontier.last() {
            Some(&id) => id,
            None => return Ok(None),
        };
        let iteration = branch_and_bound_iteration(
            &self.nodes[id].lp,
            self.incumbent.as_ref(),
            self.best_bound,
            branch_var,
            &self.opts,
        )?;
        self.frontier.pop();
        self.incumbent = iteration.incumbent;
        self.best_bound = iteration.best_bound;

        match (iteration.left, iteration.right) {
            (Some(left), Some(right)) => {
                let left_id = self.nodes.len();
                let right_id = left_id + 1;
                self.nodes.push(Node {
                    lp: left,
                    parent: Some(id),
                    children: None,
                    status: NodeStatus::Unexplored,
                });
                self.nodes.push(Node {
                    lp: right,
                    parent: Some(id),
                    children: None,
                    status: NodeStatus::Unexplored,
                });
                self.nodes[id].status = NodeStatus::Branched;
                self.nodes[id].children = Some((left_id, right_id));
                // Left child on top of the stack.
                self.frontier.push(right_id);
                self.frontier.push(left_id);
                Ok(Some(Step {
                    node: id,
                    fathomed: false,
                    children: Some((left_id, right_id)),
                }))
            }
            _ => {
                self.nodes[id].status = NodeStatus::Fathomed;
                Ok(Some(Step {
                    node: id,
                    fathomed: true,
                    children: None,
                }))
            }
        }
    }

    /// Run to completion and return the incumbent.
    ///
    /// [`Error::Infeasible`] when no integer-feasible point exists.
    pub fn solve(&mut self) -> Result<BnbSolution> {
        while self.step(None)?.is_some() {}
        match (&self.incumbent, self.best_bound) {
            (Some(x), Some(obj)) => Ok(BnbSolution { x: x.clone(), obj }),
            _ => Err(Error::Infeasible),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr1, arr2};

    /// max x + y  s.t.  x + 2y <= 4, 4x + 2y <= 12, x,y >= 0 integer.
    /// Relaxation optimum (8/3, 2/3); integral optimum has value 3.
    fn knapsackish() -> LinearProgram {
        LinearProgram::new(
            arr2(&[[1.0, 2.0], [4.0, 2.0]]),
            arr1(&[4.0, 12.0]),
            arr1(&[1.0, 1.0]),
        )
        .unwrap()
    }

    #[test]
    fn fractional_relaxation_branches_on_first_fractional_variable() {
        let lp = knapsackish();
        let it =
            branch_and_bound_iteration(&lp, None, None, None, &BnbOptions::default()).unwrap();
        assert!(!it.fathomed);
        assert!(it.incumbent.is_none());
        let left = it.left.unwrap();
        let right = it.right.unwrap();
        // x = 8/3 branches into x <= 2 and x >= 3.
        assert_eq!(left.m(), 3);
        assert_eq!(left.a()[[2, 0]], 1.0);
        assert_eq!(left.b()[2], 2.0);
        assert_eq!(right.a()[[2, 0]], -1.0);
        assert_eq!(right.b()[2], -3.0);
    }

    #[test]
    fn dominated_node_is_fathomed_by_bound() {
        let lp = knapsackish();
        let incumbent = arr1(&[0.0, 0.0]);
        let it = branch_and_bound_iteration(
            &lp,
            Some(&incumbent),
            Some(10.0),
            None,
            &BnbOptions::default(),
        )
        .unwrap();
        assert!(it.fathomed);
        assert_eq!(it.best_bound, Some(10.0));
        assert!(it.left.is_none() && it.right.is_none());
    }

    #[test]
    fn infeasible_node_is_fathomed() {
        let lp = LinearProgram::new(
            arr2(&[[1.0, 1.0]]),
            arr1(&[-1.0]),
            arr1(&[1.0, 1.0]),
        )
        .unwrap();
        let it =
            branch_and_bound_iteration(&lp, None, Some(2.0), None, &BnbOptions::default())
                .unwrap();
        assert!(it.fathomed);
        assert_eq!(it.best_bound, Some(2.0));
    }

    #[test]
    fn integral_relaxation_becomes_the_incumbent() {
        // Optimum of the relaxation is already integral at (1, 1).
        let lp = LinearProgram::new(
            arr2(&[[1.0, 0.0], [0.0, 1.0]]),
            arr1(&[1.0, 1.0]),
            arr1(&[1.0, 1.0]),
        )
        .unwrap();
        let it =
            branch_and_bound_iteration(&lp, None, None, None, &BnbOptions::default()).unwrap();
        assert!(it.fathomed);
        let x = it.incumbent.unwrap();
        assert_abs_diff_eq!(x[0], 1.0, epsilon = 1e-7);
        assert_abs_diff_eq!(x[1], 1.0, epsilon = 1e-7);
        assert_eq!(it.best_bound, Some(2.0));
    }

    #[test]
    fn manual_branch_variable_must_be_fractional() {
        let lp = knapsackish();
        // Both variables are fractional at (8/3, 2/3); branching on y works.
        let it = branch_and_bound_iteration(&lp, None, None, Some(1), &BnbOptions::default())
            .unwrap();
        let left = it.left.unwrap();
        assert_eq!(left.a()[[2, 1]], 1.0);
        assert_eq!(left.b()[2], 0.0);
        // An out-of-range or integral variable is an input error.
        assert!(matches!(
            branch_and_bound_iteration(&lp, None, None, Some(7), &BnbOptions::default()),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn driver_finds_the_integral_optimum() {
        let mut bnb = BranchAndBound::new(knapsackish(), BnbOptions::default());
        let sol = bnb.solve().unwrap();
        assert_abs_diff_eq!(sol.obj, 3.0, epsilon = 1e-7);
        for v in sol.x.iter() {
            assert!((v - v.round()).abs() < 1e-7);
        }
        // Integer feasibility against the original constraints.
        assert!(sol.x[0] + 2.0 * sol.x[1] <= 4.0 + 1e-7);
        assert!(4.0 * sol.x[0] + 2.0 * sol.x[1] <= 12.0 + 1e-7);
        assert!(bnb.is_done());
    }

    #[test]
    fn driver_explores_the_left_child_first() {
        let mut bnb = BranchAndBound::new(knapsackish(), BnbOptions::default());
        let step = bnb.step(None).unwrap().unwrap();
        assert!(!step.fathomed);
        let (left_id, right_id) = step.children.unwrap();
        assert_eq!(bnb.frontier(), &[right_id, left_id]);
        assert_eq!(bnb.node(0).unwrap().status, NodeStatus::Branched);
        assert_eq!(bnb.node(left_id).unwrap().parent, Some(0));

        let step = bnb.step(None).unwrap().unwrap();
        assert_eq!(step.node, left_id);
    }

    #[test]
    fn driver_reports_infeasible_when_no_incumbent_exists() {
        let lp = LinearProgram::new(
            arr2(&[[1.0, 1.0]]),
            arr1(&[-1.0]),
            arr1(&[1.0, 1.0]),
        )
        .unwrap();
        let mut bnb = BranchAndBound::new(lp, BnbOptions::default());
        assert_eq!(bnb.solve(), Err(Error::Infeasible));
    }

    #[test]
    fn failed_manual_step_leaves_the_frontier_intact() {
        let mut bnb = BranchAndBound::new(knapsackish(), BnbOptions::default());
        assert!(bnb.step(Some(9)).is_err());
        assert_eq!(bnb.frontier(), &[0]);
        assert!(bnb.solve().is_ok());
    }

    #[test]
    fn stepping_matches_solve() {
        let mut stepped = BranchAndBound::new(knapsackish(), BnbOptions::default());
        while stepped.step(None).unwrap().is_some() {}
        let mut solved = BranchAndBound::new(knapsackish(), BnbOptions::default());
        let sol = solved.solve().unwrap();
        assert_abs_diff_eq!(stepped.best_bound().unwrap(), sol.obj, epsilon = 1e-12);
    }
}
