//! Phase 5: night-float overlay solver.
//!
//! Runs after the base schedule is locked and overlays `Mnf`/`Snf2`
//! weeks without touching base cells. Placement works through seven
//! prioritized layers, each constraining the ones after it:
//!
//! 1. LC/CORE blocks admit only R2 `Mnf` and R4 `Snf2`.
//! 2. Post-CORE blocks admit R2/R3 `Mnf` and R3 `Snf2`.
//! 3. Block 1 admits only R3 `Mnf` (longer shifts ease R2 integration).
//! 4. AIRP blocks avoid the R3s attending that AIRP.
//! 5. The general pass fills remaining demand.
//! 6. T32 residents are held until last as the flexibility reserve.
//! 7. A spacing post-check proves the ≥ 4-week gap per resident.
//!
//! # Search
//!
//! Residents are solved one at a time in a deterministic order (exact
//! count cohorts first, T32 last, names ascending within a group) by
//! depth-first search over candidate weeks, scored by source-set reward
//! minus per-week congestion so assignments spread across the year.
//! Three strictness levels implement the infeasibility policy: first
//! candidates are limited to preferred-source weeks, then the source
//! set becomes reward-only, then the pull preference is ignored
//! entirely. Only after all three fail is hard infeasibility reported
//! with the blocking residents named.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::models::{
    BlockCalendar, NfKind, NfRules, Resident, ScheduleGrid, WEEKS,
};

/// Congestion penalty per NF assignment already in a week.
const CONGESTION_PENALTY: i64 = 3;
/// Reward for pulling from a preferred source rotation.
const SOURCE_REWARD: i64 = 10;
/// Penalty for pulling from any other staffed rotation.
const OFF_SOURCE_PENALTY: i64 = 5;

/// NF solve configuration.
#[derive(Debug, Clone)]
pub struct NfConfig {
    /// Institutional rules (counts, spacing, pull preferences).
    pub rules: NfRules,
    /// Block of the CORE exam; the block before it holds LC.
    pub core_block: usize,
    /// Pre-pinned assignments that the solver must honor.
    pub locked: Vec<(String, usize, NfKind)>,
}

impl Default for NfConfig {
    fn default() -> Self {
        Self {
            rules: NfRules::default(),
            core_block: 8,
            locked: Vec::new(),
        }
    }
}

/// NF solve outcome.
#[derive(Debug, Clone, Default)]
pub struct NfOutcome {
    /// Resident name → chosen (week, kind) list, sorted by week.
    pub assignments: HashMap<String, Vec<(usize, NfKind)>>,
    /// Relaxations taken, for the driver's log.
    pub relaxations: Vec<String>,
}

/// Solves the NF overlay and writes it onto the grid.
pub fn assign_night_float(
    residents: &[&Resident],
    grid: &mut ScheduleGrid,
    config: &NfConfig,
) -> Result<NfOutcome> {
    let mut outcome = NfOutcome::default();
    let mut week_load = vec![0usize; WEEKS];

    // Honor pre-pinned assignments before anything else.
    let mut locked_by_name: HashMap<&str, Vec<(usize, NfKind)>> = HashMap::new();
    for (name, week, kind) in &config.locked {
        locked_by_name.entry(name.as_str()).or_default().push((*week, *kind));
        week_load[*week] += 1;
    }

    // Layer 3 seeding: block 1 belongs to R3 Mnf. Pin the first
    // available R3 into week 0 unless a lock already covers block 1.
    let block1_locked = config
        .locked
        .iter()
        .any(|(_, w, _)| BlockCalendar::block_of_week(*w) == 1);
    if !block1_locked {
        let seed = residents
            .iter()
            .filter(|r| r.r_year == 3 && !r.pathways.t32 && !r.no_call(0))
            .min_by(|a, b| a.name.cmp(&b.name));
        if let Some(res) = seed {
            locked_by_name.entry(res.name.as_str()).or_default().push((0, NfKind::Mnf));
            week_load[0] += 1;
        }
    }

    // Solve order: exact-count cohorts first (R2, R4), then R3s;
    // T32 residents of any year go last (layer 6).
    let mut order: Vec<&&Resident> = residents
        .iter()
        .filter(|r| matches!(r.r_year, 2..=4))
        .collect();
    order.sort_by_key(|r| {
        let cohort = match (r.pathways.t32, r.r_year) {
            (true, _) => 3,
            (false, 2) => 0,
            (false, 4) => 1,
            (false, _) => 2,
        };
        (cohort, r.name.clone())
    });

    let mut blocking: Vec<(String, String)> = Vec::new();

    for res in &order {
        let locked = locked_by_name.remove(res.name.as_str()).unwrap_or_default();
        match solve_resident(res, grid, config, &week_load, &locked, &mut outcome.relaxations) {
            Some(chosen) => {
                // Locked weeks were counted into week_load at
                // registration; only the new picks add load here.
                for &(week, _) in &chosen {
                    week_load[week] += 1;
                }
                let mut all = chosen;
                all.extend(locked);
                all.sort();
                for &(week, kind) in &all {
                    grid.assign_nf(&res.name, week, kind.code())?;
                }
                outcome.assignments.insert(res.name.clone(), all);
            }
            None => {
                blocking.push((
                    res.name.clone(),
                    format!(
                        "cannot place {} NF week(s) with spacing {} and no-call set",
                        demand_of(res, &config.rules).saturating_sub(locked.len()),
                        config.rules.min_spacing_weeks
                    ),
                ));
            }
        }
    }

    if !blocking.is_empty() {
        return Err(Error::infeasible(
            "night-float",
            "hard NF constraints unsatisfiable",
            blocking,
        ));
    }

    // Layer 7: spacing post-check over everything that was written.
    spacing_post_check(&outcome.assignments, &config.rules)?;

    info!(
        residents = outcome.assignments.len(),
        weeks = outcome.assignments.values().map(Vec::len).sum::<usize>(),
        "night float placed"
    );
    Ok(outcome)
}

/// Total NF weeks a resident owes.
fn demand_of(res: &Resident, rules: &NfRules) -> usize {
    match res.r_year {
        2 => rules.r2_mnf_weeks,
        3 => rules.r3_min_nf,
        4 => rules.r4_snf2_weeks,
        _ => 0,
    }
}

/// Shift kind a cohort takes in the general pass.
fn kind_of(r_year: u8) -> NfKind {
    match r_year {
        2 => NfKind::Mnf,
        // R3s cover the flexible middle; Mnf is the default shift and
        // Snf2 appears via layer eligibility when Mnf is barred.
        3 => NfKind::Mnf,
        _ => NfKind::Snf2,
    }
}

/// Layer eligibility for (year, kind) in a week.
fn layer_allows(week: usize, r_year: u8, kind: NfKind, core_block: usize) -> bool {
    let block = BlockCalendar::block_of_week(week);
    let lc_block = core_block - 1;

    if block == 1 {
        // Layer 3: block 1 is R3 Mnf only.
        return r_year == 3 && kind == NfKind::Mnf;
    }
    if block == lc_block || block == core_block {
        // Layer 1: LC/CORE admit R2 Mnf and R4 Snf2.
        return matches!(
            (r_year, kind),
            (2, NfKind::Mnf) | (4, NfKind::Snf2)
        );
    }
    if block > core_block {
        // Layer 2: post-CORE admits R2/R3 Mnf and R3 Snf2.
        return matches!(
            (r_year, kind),
            (2, NfKind::Mnf) | (3, NfKind::Mnf) | (3, NfKind::Snf2)
        );
    }
    true
}

/// Candidate strictness levels for the relaxation ladder.
#[derive(Clone, Copy, PartialEq)]
enum Strictness {
    SourceOnly,
    SourceRewarded,
    Unweighted,
}

/// Solves one resident's NF weeks; `None` when every strictness level
/// fails.
fn solve_resident(
    res: &Resident,
    grid: &ScheduleGrid,
    config: &NfConfig,
    week_load: &[usize],
    locked: &[(usize, NfKind)],
    relaxations: &mut Vec<String>,
) -> Option<Vec<(usize, NfKind)>> {
    let rules = &config.rules;
    let demand = demand_of(res, rules).saturating_sub(locked.len());
    if demand == 0 {
        return Some(Vec::new());
    }
    let kind = kind_of(res.r_year);

    for strictness in [
        Strictness::SourceOnly,
        Strictness::SourceRewarded,
        Strictness::Unweighted,
    ] {
        let mut candidates: Vec<(i64, usize, NfKind)> = Vec::new();
        for week in 0..WEEKS {
            let kind = if layer_allows(week, res.r_year, kind, config.core_block) {
                kind
            } else if res.r_year == 3
                && layer_allows(week, 3, NfKind::Snf2, config.core_block)
            {
                // R3s may switch to Snf2 where a layer bars Mnf.
                NfKind::Snf2
            } else {
                continue;
            };
            if !rules.eligible(res.r_year, kind) {
                continue;
            }
            if res.no_call(week) {
                continue;
            }
            // Layer 4 + lock collisions: never overlay an AIRP or LC week.
            let base = grid.base(&res.name, week);
            if matches!(base, Some("AIRP") | Some("LC")) {
                continue;
            }
            let preferred = base.is_some_and(|code| rules.preferred_source(code));
            if strictness == Strictness::SourceOnly && !preferred {
                continue;
            }

            let mut score = -(week_load[week] as i64) * CONGESTION_PENALTY;
            if strictness != Strictness::Unweighted {
                if preferred {
                    score += SOURCE_REWARD;
                } else if base.is_some() {
                    score -= OFF_SOURCE_PENALTY;
                }
            }
            candidates.push((score, week, kind));
        }

        // Best score first, earliest week on ties.
        candidates.sort_by_key(|&(score, week, _)| (-score, week));

        let mut chosen: Vec<(usize, NfKind)> = Vec::new();
        if pick_weeks(&candidates, locked, rules, demand, 0, &mut chosen) {
            if strictness != Strictness::SourceOnly {
                let note = match strictness {
                    Strictness::SourceRewarded => {
                        format!("{}: relaxed source-only pull to reward", res.name)
                    }
                    _ => format!("{}: dropped pull preference entirely", res.name),
                };
                warn!("{note}");
                relaxations.push(note);
            }
            return Some(chosen);
        }
    }

    None
}

/// DFS over candidate weeks honoring the spacing rule against both the
/// already-chosen and the locked weeks.
fn pick_weeks(
    candidates: &[(i64, usize, NfKind)],
    locked: &[(usize, NfKind)],
    rules: &NfRules,
    demand: usize,
    from: usize,
    chosen: &mut Vec<(usize, NfKind)>,
) -> bool {
    if chosen.len() == demand {
        return true;
    }
    for i in from..candidates.len() {
        let (_, week, kind) = candidates[i];
        let clashes = chosen
            .iter()
            .map(|&(w, _)| w)
            .chain(locked.iter().map(|&(w, _)| w))
            .any(|w| rules.too_close(w, week));
        if clashes {
            continue;
        }
        chosen.push((week, kind));
        if pick_weeks(candidates, locked, rules, demand, i + 1, chosen) {
            return true;
        }
        chosen.pop();
    }
    false
}

/// Layer 7: every pair of NF weeks per resident is ≥ the spacing apart.
fn spacing_post_check(
    assignments: &HashMap<String, Vec<(usize, NfKind)>>,
    rules: &NfRules,
) -> Result<()> {
    let mut blocking = Vec::new();
    for (name, weeks) in assignments {
        for (i, &(w1, _)) in weeks.iter().enumerate() {
            for &(w2, _) in &weeks[i + 1..] {
                if rules.too_close(w1, w2) {
                    blocking.push((
                        name.clone(),
                        format!("NF weeks {w1} and {w2} closer than {}", rules.min_spacing_weeks),
                    ));
                }
            }
        }
    }
    if blocking.is_empty() {
        Ok(())
    } else {
        Err(Error::infeasible(
            "night-float",
            "spacing post-check failed",
            blocking,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Phase;

    fn grid_for(residents: &[&Resident]) -> ScheduleGrid {
        let names: Vec<String> = residents.iter().map(|r| r.name.clone()).collect();
        ScheduleGrid::new(&names).unwrap()
    }

    fn fill_base(grid: &mut ScheduleGrid, name: &str, code: &str) {
        grid.begin_phase(Phase::R3Builder);
        for w in 0..WEEKS {
            grid.assign(name, w, code).unwrap();
        }
    }

    #[test]
    fn test_r2_gets_exactly_two_mnf() {
        let a = Resident::new("Adams, A", 2);
        let r3 = Resident::new("Baker, B", 3);
        let residents = [&a, &r3];
        let mut grid = grid_for(&residents);
        fill_base(&mut grid, "Adams, A", "Mnuc");
        fill_base(&mut grid, "Baker, B", "Mnuc");

        let outcome =
            assign_night_float(&residents, &mut grid, &NfConfig::default()).unwrap();
        let weeks = &outcome.assignments["Adams, A"];
        assert_eq!(weeks.len(), 2);
        assert!(weeks.iter().all(|&(_, k)| k == NfKind::Mnf));
    }

    #[test]
    fn test_r4_gets_exactly_two_snf2() {
        let a = Resident::new("Adams, A", 4);
        let r3 = Resident::new("Baker, B", 3);
        let residents = [&a, &r3];
        let mut grid = grid_for(&residents);
        fill_base(&mut grid, "Adams, A", "Mb");
        fill_base(&mut grid, "Baker, B", "Mb");

        let outcome =
            assign_night_float(&residents, &mut grid, &NfConfig::default()).unwrap();
        let weeks = &outcome.assignments["Adams, A"];
        assert_eq!(weeks.len(), 2);
        assert!(weeks.iter().all(|&(_, k)| k == NfKind::Snf2));
        // R4 Snf2 never lands in block 1 or post-CORE.
        for &(w, _) in weeks {
            let block = BlockCalendar::block_of_week(w);
            assert!(block > 1 && block <= 8);
        }
    }

    #[test]
    fn test_spacing_respected_around_pin() {
        // Scenario: an R3 pinned to Mnf in week 5 must not receive
        // another NF week within weeks 2-8.
        let a = Resident::new("Adams, A", 3);
        let residents = [&a];
        let mut grid = grid_for(&residents);
        fill_base(&mut grid, "Adams, A", "Mnuc");

        let config = NfConfig {
            locked: vec![("Adams, A".to_string(), 5, NfKind::Mnf)],
            ..Default::default()
        };
        let outcome = assign_night_float(&residents, &mut grid, &config).unwrap();
        let weeks = &outcome.assignments["Adams, A"];

        assert!(weeks.iter().any(|&(w, _)| w == 5), "pin must be honored");
        for &(w, _) in weeks {
            if w != 5 {
                assert!(w.abs_diff(5) >= 4, "week {w} too close to pinned week 5");
            }
        }
    }

    #[test]
    fn test_no_call_weeks_honored() {
        let mut a = Resident::new("Adams, A", 2);
        // Forbid everything except two well-spaced weeks.
        a.no_call_weeks = (0..WEEKS).filter(|&w| w != 10 && w != 20).collect();
        let r3 = Resident::new("Baker, B", 3);
        let residents = [&a, &r3];
        let mut grid = grid_for(&residents);
        fill_base(&mut grid, "Adams, A", "Mnuc");
        fill_base(&mut grid, "Baker, B", "Mnuc");

        let outcome =
            assign_night_float(&residents, &mut grid, &NfConfig::default()).unwrap();
        let mut weeks: Vec<usize> =
            outcome.assignments["Adams, A"].iter().map(|&(w, _)| w).collect();
        weeks.sort();
        assert_eq!(weeks, vec![10, 20]);
    }

    #[test]
    fn test_impossible_no_call_is_hard_infeasible() {
        let mut a = Resident::new("Adams, A", 2);
        a.no_call_weeks = (0..WEEKS).collect();
        let residents = [&a];
        let mut grid = grid_for(&residents);
        fill_base(&mut grid, "Adams, A", "Mnuc");

        let err =
            assign_night_float(&residents, &mut grid, &NfConfig::default()).unwrap_err();
        match err {
            Error::Infeasible { blocking, .. } => {
                assert!(blocking.iter().any(|(n, _)| n == "Adams, A"));
            }
            other => panic!("expected infeasible, got {other:?}"),
        }
    }

    #[test]
    fn test_block_one_seeds_an_r3() {
        let r3a = Resident::new("Adams, A", 3);
        let r3b = Resident::new("Baker, B", 3);
        let residents = [&r3a, &r3b];
        let mut grid = grid_for(&residents);
        fill_base(&mut grid, "Adams, A", "Mnuc");
        fill_base(&mut grid, "Baker, B", "Mnuc");

        let outcome =
            assign_night_float(&residents, &mut grid, &NfConfig::default()).unwrap();
        // The name-first R3 carries the block-1 Mnf.
        assert!(outcome.assignments["Adams, A"]
            .iter()
            .any(|&(w, k)| w == 0 && k == NfKind::Mnf));
    }

    #[test]
    fn test_source_relaxation_is_logged() {
        // Base rotation outside the pull set forces at least the
        // reward-level relaxation for this R2.
        let a = Resident::new("Adams, A", 2);
        let r3 = Resident::new("Baker, B", 3);
        let residents = [&a, &r3];
        let mut grid = grid_for(&residents);
        fill_base(&mut grid, "Adams, A", "Zir");
        fill_base(&mut grid, "Baker, B", "Zir");

        let outcome =
            assign_night_float(&residents, &mut grid, &NfConfig::default()).unwrap();
        assert_eq!(outcome.assignments["Adams, A"].len(), 2);
        assert!(outcome
            .relaxations
            .iter()
            .any(|r| r.contains("Adams, A")));
    }

    #[test]
    fn test_airp_weeks_avoided() {
        let a = Resident::new("Adams, A", 3);
        let residents = [&a];
        let mut grid = grid_for(&residents);
        grid.begin_phase(Phase::R3Builder);
        for w in 0..WEEKS {
            let code = if BlockCalendar::block_of_week(w) == 2 { "AIRP" } else { "Mnuc" };
            grid.assign("Adams, A", w, code).unwrap();
        }

        let outcome =
            assign_night_float(&residents, &mut grid, &NfConfig::default()).unwrap();
        for &(w, _) in &outcome.assignments["Adams, A"] {
            assert_ne!(BlockCalendar::block_of_week(w), 2, "NF inside own AIRP block");
        }
    }
}
