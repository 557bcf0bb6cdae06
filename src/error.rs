use thiserror::Error;

/// Failures surfaced by the solver and geometry engines.
///
/// These are mathematical facts about a problem instance, not transient
/// faults: callers should not retry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The linear program has no feasible point at the required basis.
    #[error("linear program is infeasible")]
    Infeasible,
    /// The objective can be improved without bound along a feasible ray.
    #[error("linear program is unbounded")]
    Unbounded,
    /// The feasible region is empty or has an empty interior.
    #[error("polytope has no interior point")]
    NoInteriorPoint,
    /// Malformed input: dimension mismatch, wrong standard form,
    /// unsupported dimensionality, or an invalid basis.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, Error>;
