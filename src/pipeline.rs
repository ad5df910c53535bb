//! The sequential build pipeline.
//!
//! Phases run in fixed order with exclusive write access enforced by
//! the grid's lock layer; each phase's postcondition is the next
//! phase's precondition. Execution is strictly single-threaded: solver
//! calls are synchronous and no state is shared across concurrent
//! agents. The only interruption points are the human-review gates
//! between the senior builders and the NF overlay, at which the caller
//! may abort and discard the in-memory grid.

use tracing::{info, warn};

use crate::error::Result;
use crate::models::{
    BlockCalendar, NfRules, RequirementTable, Resident, RotationCatalog, ScheduleGrid,
    StaffingEnvelope,
};
use crate::phases::night_float::{assign_night_float, NfConfig, NfOutcome};
use crate::phases::r1::assign_r1_tracks;
use crate::phases::r2::{assign_r2_tracks, rank_matrix, R2MatchConfig, R2MatchResult};
use crate::phases::r3::{build_r3_schedules, R3Config, R3Outcome};
use crate::phases::r4::{build_r4_schedules, R4Outcome};
use crate::phases::sampler::resolve_samplers;
use crate::tracks::TrackSet;
use crate::validation::{validate, ValidationReport};

/// Decision returned from a review gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Proceed to the next phase.
    Continue,
    /// Stop the pipeline; the caller discards the grid.
    Abort,
}

/// A review gate callback: (phase name, review summary) → decision.
pub type ReviewGate<'a> = dyn FnMut(&str, &str) -> GateDecision + 'a;

/// Build configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// CORE exam block (externally configured per year; never guessed).
    pub core_block: usize,
    /// R2 matching options (pathway track masks, rank cap).
    pub r2: R2MatchConfig,
    /// NF rule set.
    pub nf_rules: NfRules,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            core_block: 8,
            r2: R2MatchConfig::default(),
            nf_rules: NfRules::default(),
        }
    }
}

/// Everything the build produced.
pub struct PipelineOutcome {
    pub grid: ScheduleGrid,
    pub r2_result: Option<R2MatchResult>,
    pub r3_outcome: Option<R3Outcome>,
    pub r4_outcome: Option<R4Outcome>,
    pub nf_outcome: Option<NfOutcome>,
    pub report: Option<ValidationReport>,
    /// Phase name at which a gate aborted, if any.
    pub aborted_at: Option<&'static str>,
}

/// Runs the full pipeline over a populated cohort.
///
/// `gate` is consulted after the R3 build (with the staffing heatmap),
/// after the R4 build, and after the NF overlay; `None` runs straight
/// through.
#[allow(clippy::too_many_arguments)]
pub fn build_schedule(
    residents: &[Resident],
    r1_tracks: &TrackSet,
    r2_tracks: &TrackSet,
    calendar: &BlockCalendar,
    requirements: &RequirementTable,
    envelope: &StaffingEnvelope,
    catalog: &RotationCatalog,
    config: &PipelineConfig,
    mut gate: Option<&mut ReviewGate<'_>>,
) -> Result<PipelineOutcome> {
    let names: Vec<String> = residents.iter().map(|r| r.name.clone()).collect();
    let mut grid = ScheduleGrid::new(&names)?;

    let by_year = |year: u8| -> Vec<&Resident> {
        residents.iter().filter(|r| r.r_year == year).collect()
    };
    let r1s = by_year(1);
    let r2s = by_year(2);
    let r3s = by_year(3);
    let r4s = by_year(4);
    info!(
        r1 = r1s.len(),
        r2 = r2s.len(),
        r3 = r3s.len(),
        r4 = r4s.len(),
        "cohort loaded"
    );

    let mut outcome = PipelineOutcome {
        grid: ScheduleGrid::new(&names)?,
        r2_result: None,
        r3_outcome: None,
        r4_outcome: None,
        nf_outcome: None,
        report: None,
        aborted_at: None,
    };

    // Phase 1: R1 bijection.
    assign_r1_tracks(&r1s, r1_tracks, &mut grid)?;

    // Phase 2: R2 matcher.
    if !r2s.is_empty() && !r2_tracks.is_empty() {
        info!("\n{}", rank_matrix(&r2s, r2_tracks.len()));
        outcome.r2_result = Some(assign_r2_tracks(&r2s, r2_tracks, &mut grid, &config.r2)?);
    }

    // Phase 3: R3 builder, then the first review gate.
    let r3_config = R3Config {
        core_block: config.core_block,
        holiday_weeks: calendar.holiday_weeks(),
        ..R3Config::default()
    };
    let r3_outcome =
        build_r3_schedules(&r3s, &mut grid, requirements, envelope, catalog, &r3_config)?;
    let heatmap = r3_outcome.heatmap.render();
    outcome.r3_outcome = Some(r3_outcome);
    if check_gate(&mut gate, "r3-builder", &heatmap) == GateDecision::Abort {
        outcome.aborted_at = Some("r3-builder");
        outcome.grid = grid;
        return Ok(outcome);
    }

    // Phase 4: R4 builder, second gate.
    let r4_outcome = build_r4_schedules(&r4s, &mut grid, requirements, envelope, catalog)?;
    let summary = format!("{} R4 schedules built", r4_outcome.placed.len());
    outcome.r4_outcome = Some(r4_outcome);
    if check_gate(&mut gate, "r4-builder", &summary) == GateDecision::Abort {
        outcome.aborted_at = Some("r4-builder");
        outcome.grid = grid;
        return Ok(outcome);
    }

    // Phase 5: NF overlay, third gate.
    let nf_config = NfConfig {
        rules: config.nf_rules.clone(),
        core_block: config.core_block,
        locked: Vec::new(),
    };
    let nf_residents: Vec<&Resident> = residents.iter().collect();
    let nf_outcome = assign_night_float(&nf_residents, &mut grid, &nf_config)?;
    let summary = format!(
        "{} NF weeks placed, {} relaxation(s)",
        nf_outcome.assignments.values().map(Vec::len).sum::<usize>(),
        nf_outcome.relaxations.len()
    );
    outcome.nf_outcome = Some(nf_outcome);
    if check_gate(&mut gate, "night-float", &summary) == GateDecision::Abort {
        outcome.aborted_at = Some("night-float");
        outcome.grid = grid;
        return Ok(outcome);
    }

    // Phase 6: sampler resolution.
    resolve_samplers(&r1s, &mut grid)?;

    // Phase 7: validation.
    let report = validate(residents, &grid, requirements, envelope, &config.nf_rules);
    if !report.ok() {
        warn!(
            errors = report.at(crate::validation::Severity::Error).count(),
            "validation found errors"
        );
    }
    outcome.report = Some(report);
    outcome.grid = grid;
    Ok(outcome)
}

fn check_gate(
    gate: &mut Option<&mut ReviewGate<'_>>,
    phase: &str,
    summary: &str,
) -> GateDecision {
    match gate {
        Some(g) => g(phase, summary),
        None => GateDecision::Continue,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Pathways, TrackPrefs, MSAMP};
    use crate::tracks::{BaseSequence, BiweekCodes};

    fn track_set(codes: &[&str], n: usize) -> TrackSet {
        let base = BaseSequence {
            positions: codes.iter().map(|c| BiweekCodes::uniform(*c)).collect(),
        };
        TrackSet::derive(&base, n)
    }

    fn cohort() -> Vec<Resident> {
        let mut residents = Vec::new();

        residents.push(Resident::new("Irons, Ida", 1));
        residents.push(Resident::new("Jack, Jo", 1));

        for name in ["Kim, Kay", "Lee, Lou"] {
            let mut r = Resident::new(name, 2);
            r.track_prefs = Some(TrackPrefs {
                rankings: [(1, 1), (2, 2)].into_iter().collect(),
            });
            residents.push(r);
        }

        residents.push(Resident::new("Moss, May", 3));
        residents.push(Resident::new("Nash, Ned", 3));

        let mut r4 = Resident::new("Owen, Oz", 4).with_history("Mnuc", 16.0);
        r4.pathways = Pathways::NONE;
        residents.push(r4);
        residents.push(Resident::new("Pike, Pat", 4).with_history("Mnuc", 16.0));

        residents
    }

    fn run(gate: Option<&mut ReviewGate<'_>>) -> PipelineOutcome {
        let residents = cohort();
        let r1_tracks = track_set(&[MSAMP, "Mai"], 2);
        let r2_tracks = track_set(&["Mb", "Mus"], 2);
        let calendar = BlockCalendar::for_year(2024);

        build_schedule(
            &residents,
            &r1_tracks,
            &r2_tracks,
            &calendar,
            &RequirementTable::standard(),
            &StaffingEnvelope::new(),
            &RotationCatalog::new(),
            &PipelineConfig::default(),
            gate,
        )
        .unwrap()
    }

    #[test]
    fn test_full_pipeline_completes() {
        let outcome = run(None);
        assert!(outcome.aborted_at.is_none());
        assert!(outcome.report.is_some());

        // Every R1 Msamp placeholder was resolved.
        for name in ["Irons, Ida", "Jack, Jo"] {
            for w in 0..crate::models::WEEKS {
                assert_ne!(outcome.grid.base(name, w), Some(MSAMP));
            }
        }

        // NF counts honored for the exact-count cohorts.
        let nf = outcome.nf_outcome.as_ref().unwrap();
        assert_eq!(nf.assignments["Kim, Kay"].len(), 2);
        assert_eq!(nf.assignments["Owen, Oz"].len(), 2);
    }

    #[test]
    fn test_gate_abort_stops_pipeline() {
        let mut gate = |phase: &str, _summary: &str| {
            if phase == "r3-builder" {
                GateDecision::Abort
            } else {
                GateDecision::Continue
            }
        };
        let outcome = run(Some(&mut gate));
        assert_eq!(outcome.aborted_at, Some("r3-builder"));
        assert!(outcome.r4_outcome.is_none());
        assert!(outcome.report.is_none());
    }

    #[test]
    fn test_gate_sees_heatmap() {
        let mut saw_heatmap = false;
        let mut gate = |phase: &str, summary: &str| {
            if phase == "r3-builder" {
                saw_heatmap = !summary.is_empty();
            }
            GateDecision::Continue
        };
        run(Some(&mut gate));
        assert!(saw_heatmap);
    }
}
