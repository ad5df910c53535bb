//! Phase 3: R3 schedule building.
//!
//! Four strictly ordered sub-steps, each locking cells the next must
//! respect:
//!
//! 1. **AIRP**: CP assignment of R3s to session blocks (capacity-bound,
//!    rankings as the objective, least-loaded fallback for residents
//!    who ranked nothing).
//! 2. **LC**: every rising R3 spends the last full block before the
//!    CORE exam in the learning center.
//! 3. **Requirement placement**: a greedy best-first filler driven by
//!    `urgency(resident, rotation)` — remaining deficit magnitude,
//!    block pressure (how many classmates need the same rotation), and
//!    preference weight — under hospital exclusivity and the Zir
//!    policy rules.
//! 4. **Anchors**: blocks still empty are carried forward as
//!    unassigned markers (none occur in practice; they are logged).

use std::collections::HashMap;

use tracing::{info, warn};

use crate::cp::{AssignmentModel, AssignmentSolver};
use crate::error::Result;
use crate::models::{
    hospital_system, BlockCalendar, HospitalSystem, Phase, Resident, RequirementTable,
    RotationCatalog, ScheduleGrid, StaffingEnvelope,
};

/// Preference weight per top/bottom rank step, in urgency points.
/// Small against deficit magnitude (weeks × 3) so graduation dominates.
const PREF_WEIGHT: f64 = 2.0;
/// Urgency points per deficit week.
const DEFICIT_WEIGHT: f64 = 3.0;
/// Maximum residents per AIRP session.
const MAX_PER_SESSION: usize = 4;

/// An AIRP session: an id as ranked in the survey, and the block it locks.
#[derive(Debug, Clone)]
pub struct AirpSession {
    pub id: String,
    pub block: usize,
    pub label: String,
}

/// The session table for the target year (externally dated).
pub fn default_airp_sessions() -> Vec<AirpSession> {
    vec![
        AirpSession { id: "2".into(), block: 2, label: "Aug Virtual".into() },
        AirpSession { id: "3+4".into(), block: 3, label: "Sep In-Person".into() },
        AirpSession { id: "4+5".into(), block: 4, label: "Oct Virtual".into() },
        AirpSession { id: "9".into(), block: 9, label: "Feb Virtual".into() },
        AirpSession { id: "10".into(), block: 10, label: "Mar Virtual".into() },
    ]
}

/// R3 build configuration.
#[derive(Debug, Clone)]
pub struct R3Config {
    /// Block of the CORE exam; LC lands in the block before it.
    pub core_block: usize,
    /// AIRP session table.
    pub sessions: Vec<AirpSession>,
    /// Logical weeks overlapping Christmas/New Year (from the calendar).
    pub holiday_weeks: Vec<usize>,
}

impl Default for R3Config {
    fn default() -> Self {
        Self {
            core_block: 8,
            sessions: default_airp_sessions(),
            holiday_weeks: Vec::new(),
        }
    }
}

/// Per-resident build metadata returned for the review gate.
#[derive(Debug, Clone, Default)]
pub struct R3Outcome {
    /// Resident name → AIRP session id.
    pub airp: HashMap<String, String>,
    /// Resident name → (block → rotation) placements.
    pub placed: HashMap<String, HashMap<usize, String>>,
    /// Residents with leftover unassigned blocks (anchors).
    pub anchors: HashMap<String, Vec<usize>>,
    /// Per-week staffing occupancy vs envelope minima, for review.
    pub heatmap: StaffingHeatmap,
}

/// Builds all R3 schedules.
pub fn build_r3_schedules(
    residents: &[&Resident],
    grid: &mut ScheduleGrid,
    requirements: &RequirementTable,
    envelope: &StaffingEnvelope,
    catalog: &RotationCatalog,
    config: &R3Config,
) -> Result<R3Outcome> {
    grid.begin_phase(Phase::R3Builder);

    let mut r3s: Vec<&&Resident> = residents.iter().collect();
    r3s.sort_by(|a, b| a.name.cmp(&b.name));

    let mut outcome = R3Outcome::default();

    outcome.airp = assign_airp(&r3s, grid, &config.sessions)?;
    assign_learning_center(&r3s, grid, config.core_block)?;

    let pressure = block_pressure(&r3s, requirements);
    for res in &r3s {
        let placed = fill_requirements(res, grid, requirements, catalog, config, &pressure)?;
        outcome.placed.insert(res.name.clone(), placed);
    }

    // Anchors: unfilled blocks carry forward as unassigned markers.
    for res in &r3s {
        let free = grid.free_blocks(&res.name);
        if !free.is_empty() {
            warn!(resident = %res.name, blocks = ?free, "R3 anchor blocks left unassigned");
            outcome.anchors.insert(res.name.clone(), free);
        }
    }

    outcome.heatmap = StaffingHeatmap::compute(grid, envelope);
    info!(count = r3s.len(), "built R3 schedules");
    Ok(outcome)
}

/// Sub-step 1: AIRP session assignment.
///
/// Solved as a capacitated assignment: cost = rank − 1, unranked
/// sessions cost one step past the worst rank so ranked residents are
/// served first and everyone else spreads across the least-loaded
/// sessions.
fn assign_airp(
    r3s: &[&&Resident],
    grid: &mut ScheduleGrid,
    sessions: &[AirpSession],
) -> Result<HashMap<String, String>> {
    if sessions.is_empty() || r3s.is_empty() {
        return Ok(HashMap::new());
    }

    let worst = sessions.len() as i64;
    let mut model = AssignmentModel::new(
        r3s.iter().map(|r| r.name.clone()).collect(),
        sessions.iter().map(|s| s.id.clone()).collect(),
    );
    model.set_uniform_capacity(MAX_PER_SESSION);

    for (i, res) in r3s.iter().enumerate() {
        for (j, session) in sessions.iter().enumerate() {
            let cost = res
                .airp_prefs
                .as_ref()
                .and_then(|p| p.rankings.get(&session.id))
                .map(|&rank| rank as i64 - 1)
                .unwrap_or(worst);
            model.set_cost(i, j, cost);
        }
    }

    let solution = AssignmentSolver::new().solve(&model)?;

    let mut out = HashMap::new();
    for (i, res) in r3s.iter().enumerate() {
        let session = &sessions[solution.columns[i]];
        grid.assign_block(&res.name, session.block, "AIRP")?;
        out.insert(res.name.clone(), session.id.clone());
    }
    Ok(out)
}

/// Sub-step 2: LC in the last full block before the CORE exam.
fn assign_learning_center(
    r3s: &[&&Resident],
    grid: &mut ScheduleGrid,
    core_block: usize,
) -> Result<()> {
    let lc_block = core_block - 1;
    for res in r3s {
        grid.assign_block(&res.name, lc_block, "LC")?;
    }
    Ok(())
}

/// How many R3s need each rotation (the urgency block-pressure term).
fn block_pressure(r3s: &[&&Resident], requirements: &RequirementTable) -> HashMap<String, usize> {
    let mut pressure: HashMap<String, usize> = HashMap::new();
    for res in r3s {
        for code in needed_rotations(res, requirements).keys() {
            *pressure.entry(code.clone()).or_default() += 1;
        }
    }
    pressure
}

/// Rotations a resident needs this year, with block counts.
///
/// Merges the recs-tab recommended blocks, deficient sections, the NRDR
/// Mnuc sextet, and pathway year-end goals (T32/ESIR/ESNR finish NucMed
/// and breast).
fn needed_rotations(res: &Resident, requirements: &RequirementTable) -> HashMap<String, f64> {
    let mut needed: HashMap<String, f64> = HashMap::new();

    for (code, blocks) in &res.recommended_blocks {
        needed.insert(code.clone(), blocks.max(1.0));
    }
    for code in &res.deficient_sections {
        needed.entry(code.clone()).or_insert(1.0);
    }

    if res.pathways.nrdr {
        let have = needed.get("Mnuc").copied().unwrap_or(0.0);
        needed.insert("Mnuc".to_string(), have.max(6.0));
    }

    if res.pathways.t32 || res.pathways.esir || res.pathways.esnr {
        // Finish NucMed/breast by year's end where a deficit remains.
        let empty = HashMap::new();
        for req in requirements.applicable(res.pathways) {
            let deficit_blocks = (req.deficit(res, &empty) / 4.0).ceil();
            if deficit_blocks <= 0.0 {
                continue;
            }
            match req.label.as_str() {
                "Nuclear Medicine" | "Nuclear Medicine (NRDR)" => {
                    let have = needed.get("Mnuc").copied().unwrap_or(0.0);
                    needed.insert("Mnuc".to_string(), have.max(deficit_blocks));
                }
                "Breast Imaging" => {
                    let have = needed.get("Pcbi").copied().unwrap_or(0.0);
                    needed.insert("Pcbi".to_string(), have.max(deficit_blocks));
                }
                _ => {}
            }
        }
    }

    needed
}

/// Sub-step 3: requirement placement for one resident.
fn fill_requirements(
    res: &Resident,
    grid: &mut ScheduleGrid,
    requirements: &RequirementTable,
    catalog: &RotationCatalog,
    config: &R3Config,
    pressure: &HashMap<String, usize>,
) -> Result<HashMap<usize, String>> {
    let lc_block = config.core_block - 1;
    let holiday_blocks: Vec<usize> = config
        .holiday_weeks
        .iter()
        .map(|&w| BlockCalendar::block_of_week(w))
        .collect();

    // Expand needs into an urgency-ordered worklist.
    let needed = needed_rotations(res, requirements);
    let mut worklist: Vec<(String, f64)> = needed
        .iter()
        .map(|(code, &blocks)| {
            let urgency = DEFICIT_WEIGHT * blocks * 4.0
                + pressure.get(code).copied().unwrap_or(0) as f64
                + PREF_WEIGHT
                    * res
                        .section_prefs
                        .as_ref()
                        .map(|p| p.score(code) as f64)
                        .unwrap_or(0.0);
            (code.clone(), urgency)
        })
        .collect();
    // Best-first; name order on ties keeps the fill deterministic.
    worklist.sort_by(|a, b| b.1.partial_cmp(&a.1).expect("urgency is finite").then(a.0.cmp(&b.0)));

    let mut queue: Vec<String> = Vec::new();
    for (code, _) in &worklist {
        let blocks = needed[code].round().max(1.0) as usize;
        for _ in 0..blocks {
            queue.push(code.clone());
        }
    }

    let mut placed = HashMap::new();
    for code in queue {
        if !catalog.allows(&code, res.r_year) {
            warn!(resident = %res.name, rotation = %code, "rotation not eligible for this year");
            continue;
        }
        let mut candidate_blocks = grid.free_blocks(&res.name);

        if code == "Zir" {
            // Policy: no Zir before LC.
            candidate_blocks.retain(|&b| b > lc_block);
            // No holiday Zir for residents who had IR over Christmas.
            if res.ir_over_christmas {
                candidate_blocks.retain(|b| !holiday_blocks.contains(b));
            }
            // Defer toward a preferred block while one is still open.
            if !res.zir_blocks.is_empty() {
                let preferred: Vec<usize> = candidate_blocks
                    .iter()
                    .copied()
                    .filter(|b| res.zir_blocks.contains(b))
                    .collect();
                if !preferred.is_empty() {
                    candidate_blocks = preferred;
                }
            }
        }

        let Some(&block) = candidate_blocks
            .iter()
            .find(|&&b| !hospital_conflict(grid, &res.name, b, &code))
        else {
            warn!(resident = %res.name, rotation = %code, "no feasible block for rotation");
            continue;
        };

        grid.assign_block(&res.name, block, &code)?;
        placed.insert(block, code);
    }

    Ok(placed)
}

/// Whether placing `code` into `block` would put the resident on two
/// payroll systems in the same block.
pub(crate) fn hospital_conflict(
    grid: &ScheduleGrid,
    name: &str,
    block: usize,
    code: &str,
) -> bool {
    let target = hospital_system(code);
    if target == HospitalSystem::Other {
        return false;
    }
    grid.block_codes(name, block).iter().any(|existing| {
        let system = hospital_system(existing);
        system != HospitalSystem::Other && system != target
    })
}

/// Per-week occupancy against the envelope minima.
#[derive(Debug, Clone, Default)]
pub struct StaffingHeatmap {
    /// (bound label, per-week counts, minimum).
    pub rows: Vec<(String, Vec<usize>, u32)>,
}

impl StaffingHeatmap {
    /// Computes occupancy for every envelope bound.
    pub fn compute(grid: &ScheduleGrid, envelope: &StaffingEnvelope) -> Self {
        let rows = envelope
            .bounds
            .iter()
            .map(|bound| {
                let codes = bound.code_refs();
                let counts = envelope
                    .weeks()
                    .map(|w| grid.staffing_count(w, &codes))
                    .collect();
                (bound.label.clone(), counts, bound.min)
            })
            .collect();
        Self { rows }
    }

    /// Renders a compact text heatmap: one row per bound, `.` where the
    /// minimum is met and the shortfall digit where it is not.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (label, counts, min) in &self.rows {
            out.push_str(&format!("{label:<24}"));
            for &c in counts {
                if c >= *min as usize {
                    out.push('.');
                } else {
                    let short = (*min as usize - c).min(9);
                    out.push(char::from_digit(short as u32, 10).unwrap_or('#'));
                }
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AirpPrefs;

    fn grid_for(residents: &[&Resident]) -> ScheduleGrid {
        let names: Vec<String> = residents.iter().map(|r| r.name.clone()).collect();
        ScheduleGrid::new(&names).unwrap()
    }

    fn r3(name: &str) -> Resident {
        Resident::new(name, 3)
    }

    fn build(
        residents: &[&Resident],
        config: &R3Config,
    ) -> (ScheduleGrid, R3Outcome) {
        let mut grid = grid_for(residents);
        let outcome = build_r3_schedules(
            residents,
            &mut grid,
            &RequirementTable::standard(),
            &StaffingEnvelope::standard(),
            &RotationCatalog::new(),
            config,
        )
        .unwrap();
        (grid, outcome)
    }

    #[test]
    fn test_lc_lands_before_core() {
        let a = r3("Adams, A");
        let (grid, _) = build(&[&a], &R3Config::default());
        // CORE block 8 → LC in block 7 (weeks 24-27).
        for w in BlockCalendar::weeks_of_block(7) {
            assert_eq!(grid.base("Adams, A", w), Some("LC"));
        }
    }

    #[test]
    fn test_airp_honors_rankings_within_capacity() {
        let mut a = r3("Adams, A");
        a.airp_prefs = Some(AirpPrefs {
            rankings: [("9".to_string(), 1), ("2".to_string(), 2)].into_iter().collect(),
            group_requests: vec![],
        });
        let b = r3("Baker, B");

        let (grid, outcome) = build(&[&a, &b], &R3Config::default());
        assert_eq!(outcome.airp["Adams, A"], "9");
        // Session "9" locks block 9.
        for w in BlockCalendar::weeks_of_block(9) {
            assert_eq!(grid.base("Adams, A", w), Some("AIRP"));
        }
        // The unranked resident still got some session.
        assert!(outcome.airp.contains_key("Baker, B"));
    }

    #[test]
    fn test_airp_capacity_spills_over() {
        // Five residents all ranking session "2" first; capacity is 4.
        let mut residents = Vec::new();
        for i in 0..5 {
            let mut r = r3(&format!("R{i}, X"));
            r.airp_prefs = Some(AirpPrefs {
                rankings: [("2".to_string(), 1), ("9".to_string(), 2)].into_iter().collect(),
                group_requests: vec![],
            });
            residents.push(r);
        }
        let refs: Vec<&Resident> = residents.iter().collect();
        let (_, outcome) = build(&refs, &R3Config::default());

        let in_two = outcome.airp.values().filter(|s| s.as_str() == "2").count();
        assert_eq!(in_two, 4);
        assert_eq!(outcome.airp.values().filter(|s| s.as_str() == "9").count(), 1);
    }

    #[test]
    fn test_nrdr_accrues_mnuc_sextet() {
        let mut a = r3("Adams, A");
        a.pathways.nrdr = true;
        let (grid, _) = build(&[&a], &R3Config::default());
        assert!(grid.code_weeks("Adams, A", "Mnuc") >= 24, "six Mnuc blocks expected");
    }

    #[test]
    fn test_zir_never_precedes_lc() {
        let mut a = r3("Adams, A");
        a.recommended_blocks.insert("Zir".to_string(), 1.0);
        let (grid, _) = build(&[&a], &R3Config::default());

        let zir_weeks: Vec<usize> = (0..52)
            .filter(|&w| grid.base("Adams, A", w) == Some("Zir"))
            .collect();
        assert!(!zir_weeks.is_empty());
        // LC is block 7; every Zir week must be in block 8 or later.
        for w in zir_weeks {
            assert!(BlockCalendar::block_of_week(w) > 7);
        }
    }

    #[test]
    fn test_zir_skips_holidays_for_flagged_resident() {
        let mut a = r3("Adams, A");
        a.recommended_blocks.insert("Zir".to_string(), 1.0);
        a.ir_over_christmas = true;

        let mut config = R3Config::default();
        // Pretend the holiday window is block 9 (weeks 32-35).
        config.holiday_weeks = vec![32, 33];

        let (grid, _) = build(&[&a], &config);
        for w in BlockCalendar::weeks_of_block(9) {
            assert_ne!(grid.base("Adams, A", w), Some("Zir"));
        }
    }

    #[test]
    fn test_hospital_conflict_guard() {
        let a = r3("Adams, A");
        let mut grid = grid_for(&[&a]);
        grid.begin_phase(Phase::R3Builder);
        // Mb (UCSF) occupies half of block 2.
        grid.assign("Adams, A", 4, "Mb").unwrap();
        grid.assign("Adams, A", 5, "Mb").unwrap();

        assert!(hospital_conflict(&grid, "Adams, A", 2, "Sir"));
        assert!(!hospital_conflict(&grid, "Adams, A", 2, "Mai"));
        assert!(!hospital_conflict(&grid, "Adams, A", 2, "AIRP"));
    }

    #[test]
    fn test_heatmap_marks_shortfall() {
        let a = r3("Adams, A");
        let grid = grid_for(&[&a]);
        let envelope = StaffingEnvelope::new()
            .with_bound(crate::models::StaffingBound::at_least("Peds", &["Peds"], 1));
        let heatmap = StaffingHeatmap::compute(&grid, &envelope);
        let rendered = heatmap.render();
        // Nobody staffs Peds: every week shows a shortfall of 1.
        assert!(rendered.contains('1'));
        assert!(!rendered.contains('.'));
    }
}
