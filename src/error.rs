//! Crate-level error types.
//!
//! Three failure kinds cross the library boundary:
//!
//! - [`Error::Infeasible`]: a solver could not satisfy its hard
//!   constraints; carries the offending constraint subset so the driver
//!   can report what blocked the solve.
//! - [`Error::DataIntegrity`]: the workbook or survey violates a
//!   structural invariant (duplicate resident name, unknown rotation
//!   code). These fail fast — the pipeline never runs on bad input.
//! - [`Error::Io`]: file-level failure while reading or writing.
//!
//! Soft constraints are never reported here; solvers drop them
//! internally (and log the relaxation) before any hard constraint is
//! touched.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for the schedule builder.
#[derive(Debug, Error)]
pub enum Error {
    /// A solver exhausted its search without satisfying hard constraints.
    #[error("infeasible: {phase}: {detail}")]
    Infeasible {
        /// Phase that failed (e.g. "r2-track-match", "night-float").
        phase: &'static str,
        /// Human-readable description of the blocking constraints.
        detail: String,
        /// The minimal offending subset, as (resident, constraint) pairs.
        blocking: Vec<(String, String)>,
    },

    /// Input data violates a structural invariant.
    #[error("data integrity: {0}")]
    DataIntegrity(String),

    /// A write targeted a cell locked by an earlier phase.
    #[error("locked cell: {resident} week {week} already written by {owner}")]
    LockedCell {
        resident: String,
        week: usize,
        owner: &'static str,
    },

    /// File-level I/O failure.
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    /// Workbook parse failure.
    #[error("workbook: {0}")]
    Workbook(String),
}

impl Error {
    /// Creates an infeasibility error for a solver phase.
    pub fn infeasible(
        phase: &'static str,
        detail: impl Into<String>,
        blocking: Vec<(String, String)>,
    ) -> Self {
        Self::Infeasible {
            phase,
            detail: detail.into(),
            blocking,
        }
    }

    /// Creates a data-integrity error.
    pub fn data(msg: impl Into<String>) -> Self {
        Self::DataIntegrity(msg.into())
    }
}
