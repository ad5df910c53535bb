//! Schedule build phases.
//!
//! The pipeline mutates the shared grid in fixed order; each phase's
//! postcondition is the next phase's precondition, and the grid's lock
//! layer rejects writes into cells an earlier phase owns.
//!
//! 1. [`r1`]: trivial track bijection, `Msamp` placeholders left behind
//! 2. [`r2`]: CP track matching on preference ranks
//! 3. [`r3`]: AIRP → LC → graduation-requirement placement
//! 4. [`r4`]: fixed commitments → deficiency fill → capacity fill
//! 5. [`night_float`]: layered NF overlay with spacing
//! 6. [`sampler`]: post-NF rewrite of `Msamp` cells
//!
//! Validation (the seventh stage) lives in [`crate::validation`].

pub mod night_float;
pub mod r1;
pub mod r2;
pub mod r3;
pub mod r4;
pub mod sampler;
