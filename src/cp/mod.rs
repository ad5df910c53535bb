//! Constraint-programming assignment formulation and solver.
//!
//! The pipeline's matching problems (R2 track assignment, AIRP session
//! assignment) are small generalized assignment instances: every row
//! (resident) takes exactly one column (track or session), columns have
//! capacities, some pairs are forbidden outright, and the objective is
//! a linear cost with soft components folded into the coefficients.
//!
//! [`AssignmentModel`] is the declarative model; [`AssignmentSolver`]
//! solves it exactly by depth-first branch-and-bound. Instances are at
//! most ~16×16, so exact search is
//! cheap, and the deterministic exploration order doubles as the
//! tie-break rule: rows are branched in the order the caller added them
//! (residents sorted by name upstream), columns in (cost, index) order,
//! and only strictly better solutions replace the incumbent.

mod assignment;

pub use assignment::{AssignmentModel, AssignmentSolution, AssignmentSolver};
