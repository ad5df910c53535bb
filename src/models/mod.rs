//! Scheduling domain models.
//!
//! Core data types for the residency rotation schedule: residents and
//! their preference records, the rotation catalog with hospital-system
//! and section mappings, the block calendar, the shared schedule grid
//! with its phase-lock layer, graduation requirement tables, the
//! staffing envelope, and the night-float rule set.
//!
//! # Invariants held at this layer
//!
//! - A grid cell holds at most one rotation code; cross-phase
//!   overwrites are rejected ([`ScheduleGrid`]).
//! - Hospital systems collapse `P`-prefix rotations into UCSF
//!   ([`hospital_system`]).
//! - Graduation credit rules are per-pathway data, including the
//!   NucMed 4:1 substitution that NRDR forbids ([`RequirementTable`]).

pub mod calendar;
mod grid;
mod nf_rules;
mod requirements;
mod resident;
mod rotation;
mod staffing;

pub use calendar::{Block, BlockCalendar, BLOCKS, WEEKS, WEEKS_PER_BLOCK};
pub use grid::{Phase, ScheduleGrid, MSAMP};
pub use nf_rules::{NfKind, NfRules};
pub use requirements::{
    AppliesTo, Requirement, RequirementTable, NM_PARTIAL_CODES, NM_PARTIAL_RATIO,
};
pub use resident::{
    AirpPrefs, FsePrefs, Pathways, Resident, SamplerPrefs, SectionPrefs, TrackPrefs,
};
pub use rotation::{
    hospital_system, is_night_float, qualifying_codes, section_of, HospitalSystem, RotationCatalog,
    RotationCode, Section,
};
pub use staffing::{StaffingBound, StaffingEnvelope};
