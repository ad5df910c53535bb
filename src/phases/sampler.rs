//! Phase 6: sampler resolution.
//!
//! After night float is placed, every R1 `Msamp` cell is rewritten.
//! A sampler block's four weeks become `Pcbi` (one week), `Mucic` or
//! `Mir` (one week, by the resident's sampler ranking), and `Mnuc`
//! (two weeks). The order across the four weeks is chosen so the
//! sampler is on a service exactly when an upper-level from that
//! rotation is pulled onto NF — the sampler covers the gap the pull
//! created.
//!
//! # Ordering search
//!
//! All twelve distinct arrangements of the bundle are scored by how
//! many weeks land on an NF-pulled rotation, with a secondary bonus for
//! keeping the two `Mnuc` weeks adjacent; enumeration order breaks the
//! remaining ties deterministically.

use std::collections::{HashMap, HashSet};

use tracing::info;

use crate::error::Result;
use crate::models::{Phase, Resident, ScheduleGrid, MSAMP, WEEKS};

/// Resolves every R1 sampler block. Returns name → (week → code).
pub fn resolve_samplers(
    residents: &[&Resident],
    grid: &mut ScheduleGrid,
) -> Result<HashMap<String, HashMap<usize, String>>> {
    grid.begin_phase(Phase::Sampler);

    // Which rotations lost an upper-level to NF, per week.
    let pulled = pulled_rotations(grid);

    let mut out = HashMap::new();
    for res in residents {
        let weeks: Vec<usize> = (0..WEEKS)
            .filter(|&w| grid.base(&res.name, w) == Some(MSAMP))
            .collect();
        if weeks.is_empty() {
            continue;
        }

        let alt = mucic_or_mir(res);
        let mut replaced = HashMap::new();

        for chunk in contiguous_runs(&weeks) {
            let bundle = best_arrangement(&chunk, alt, &pulled);
            for (&week, code) in chunk.iter().zip(bundle.iter()) {
                grid.rewrite(&res.name, week, MSAMP, code)?;
                replaced.insert(week, code.to_string());
            }
            // Runs longer than a block (merged samplers) fall back to
            // Mnuc for the surplus weeks.
            for &week in chunk.iter().skip(bundle.len()) {
                grid.rewrite(&res.name, week, MSAMP, "Mnuc")?;
                replaced.insert(week, "Mnuc".to_string());
            }
        }

        out.insert(res.name.clone(), replaced);
    }

    info!(
        residents = out.len(),
        weeks = out.values().map(HashMap::len).sum::<usize>(),
        "samplers resolved"
    );
    Ok(out)
}

/// Base rotations whose resident is on NF, per week.
fn pulled_rotations(grid: &ScheduleGrid) -> Vec<HashSet<String>> {
    let mut pulled = vec![HashSet::new(); WEEKS];
    for name in grid.names().to_vec() {
        for (week, _) in grid.nf_weeks(&name) {
            if let Some(base) = grid.base(&name, week) {
                pulled[week].insert(base.to_string());
            }
        }
    }
    pulled
}

/// Chooses Mucic vs Mir from the sampler rankings (Mucic by default).
fn mucic_or_mir(res: &Resident) -> &'static str {
    let Some(prefs) = &res.sampler_prefs else {
        return "Mucic";
    };
    let rank = |code: &str| prefs.rankings.get(code).copied().unwrap_or(u32::MAX);
    if rank("Mir") < rank("Mucic") {
        "Mir"
    } else {
        "Mucic"
    }
}

/// Splits sorted week indices into contiguous runs.
fn contiguous_runs(weeks: &[usize]) -> Vec<Vec<usize>> {
    let mut runs: Vec<Vec<usize>> = Vec::new();
    for &w in weeks {
        match runs.last_mut() {
            Some(run) if *run.last().expect("runs are non-empty") + 1 == w => run.push(w),
            _ => runs.push(vec![w]),
        }
    }
    runs
}

/// Picks the best arrangement of [Pcbi, alt, Mnuc, Mnuc] over a run.
///
/// Score = 10 × (weeks covering an NF pull) + 1 if the Mnuc pair is
/// adjacent; the first maximum in enumeration order wins.
fn best_arrangement(
    weeks: &[usize],
    alt: &'static str,
    pulled: &[HashSet<String>],
) -> Vec<&'static str> {
    let len = weeks.len().min(4);
    if len < 4 {
        // Short runs (clipped blocks): lead with Pcbi and alt, pad Mnuc.
        return ["Pcbi", alt, "Mnuc", "Mnuc"][..len].to_vec();
    }

    let mut best: Option<(i64, Vec<&'static str>)> = None;
    for pcbi_pos in 0..4 {
        for alt_pos in 0..4 {
            if alt_pos == pcbi_pos {
                continue;
            }
            let mut arrangement = ["Mnuc"; 4];
            arrangement[pcbi_pos] = "Pcbi";
            arrangement[alt_pos] = alt;

            let coverage = weeks
                .iter()
                .take(4)
                .zip(arrangement.iter())
                .filter(|(&w, &code)| pulled[w].contains(code))
                .count() as i64;
            let mnuc_positions: Vec<usize> =
                (0..4).filter(|&i| arrangement[i] == "Mnuc").collect();
            let adjacent = (mnuc_positions[1] - mnuc_positions[0] == 1) as i64;

            let score = coverage * 10 + adjacent;
            if best.as_ref().is_none_or(|(b, _)| score > *b) {
                best = Some((score, arrangement.to_vec()));
            }
        }
    }

    best.expect("at least one arrangement exists").1
}
