//! Residency rotation schedule builder.
//!
//! Constructs a full academic-year rotation schedule for a radiology
//! residency program: ~60 residents across four classes, assigned
//! weekly over a 13-block, 52-week horizon from a persisted workbook
//! and a preference survey.
//!
//! # Modules
//!
//! - **`models`**: domain types — `Resident`, `RotationCode`,
//!   `ScheduleGrid`, `BlockCalendar`, `RequirementTable`,
//!   `StaffingEnvelope`, `NfRules`
//! - **`tracks`**: junior-track derivation from base sequences
//! - **`cp`**: the assignment model and exact solver behind the R2
//!   matcher and AIRP placement
//! - **`phases`**: the six build phases, run in fixed order
//! - **`validation`**: staffing, graduation, hospital-exclusivity, and
//!   NF-rule checks over the finished grid
//! - **`io`**: workbook reader, survey parser, and schedule writer
//! - **`pipeline`**: the sequential driver with human-review gates
//!
//! # Architecture
//!
//! The schedule grid is the single mutable resource. Phases mutate it
//! in sequence under advisory locks (a phase may not rewrite cells an
//! earlier phase wrote), the validator proves the result against the
//! institutional rules, and the writer persists a copy — the input
//! workbook is never modified.

pub mod cp;
pub mod error;
pub mod io;
pub mod models;
pub mod phases;
pub mod pipeline;
pub mod tracks;
pub mod validation;

pub use error::{Error, Result};
pub use pipeline::{build_schedule, GateDecision, PipelineConfig, PipelineOutcome};
