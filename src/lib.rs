pub mod bnb;
pub mod error;
pub mod geometry;
pub mod lp;
pub mod simplex;

pub use error::{Error, Result};

pub use lp::{BasicFeasibleSolution, LinearProgram};

pub use simplex::{simplex, PathEntry, PivotRule, SimplexOptions, SimplexResult};

pub use bnb::{
    branch_and_bound_iteration, BnbIteration, BnbOptions, BnbSolution, BranchAndBound, Node,
    NodeId, NodeStatus, Step,
};

pub use geometry::{
    interior_point, intersection, order_points, polytope_facets, polytope_vertices,
};
