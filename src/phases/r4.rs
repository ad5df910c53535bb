//! Phase 4: R4 schedule building.
//!
//! Three strictly ordered sub-steps:
//!
//! 1. **Fixed commitments**: research/CEP months (capped at two unless
//!    supplementary funding is flagged; T32 residents are ineligible),
//!    contiguous FSE blocks (breast FSE is exactly six; half the cohort
//!    takes FSE in each half of the year, split deterministically by
//!    name), the NRDR `Mnuc` sextet plus its adjunct blocks, the ESIR
//!    `Mir` octet, and the ESNR contiguous six-block neuro window with
//!    at most one `Smr`.
//! 2. **Deficiency fill**: graduation arithmetic. Breast deficits take
//!    `Pcbi`; NucMed deficits take `Mnuc` directly, or a 4:1 substitute
//!    block ({Mai, Mch, Peds, Mx} → one Mnuc-equivalent week) when the
//!    remaining deficit is under a full block. The substitution never
//!    applies under NRDR.
//! 3. **Capacity fill**: one `Mx` block for every R4 who is neither T32
//!    nor dual-pathway, with unused quota redistributed to harsh-R2
//!    residents; a second `Peds` block for single-block histories; MSK
//!    top-up below three total blocks; remaining cells fill toward the
//!    staffing envelope, least-satisfied group first.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::error::Result;
use crate::models::{
    Phase, RequirementTable, Resident, RotationCatalog, ScheduleGrid, StaffingEnvelope, BLOCKS,
};

use super::r3::hospital_conflict;

/// Research/CEP month cap without supplementary funding.
const RESEARCH_CAP: u32 = 2;
/// Block placement order for research months (middle of year, clear of
/// the LC/RSNA windows).
const RESEARCH_ORDER: [usize; 8] = [3, 4, 8, 9, 10, 11, 2, 12];
/// Rotation pool for envelope-driven fill.
const FILL_POOL: [&str; 6] = ["Mai", "Mch", "Mus", "Mucic", "Mb", "Ser"];

/// Per-resident R4 build metadata.
#[derive(Debug, Clone, Default)]
pub struct R4Outcome {
    /// Resident name → (block → rotation) for all three sub-steps.
    pub placed: HashMap<String, HashMap<usize, String>>,
}

/// Builds all R4 schedules.
pub fn build_r4_schedules(
    residents: &[&Resident],
    grid: &mut ScheduleGrid,
    requirements: &RequirementTable,
    envelope: &StaffingEnvelope,
    catalog: &RotationCatalog,
) -> Result<R4Outcome> {
    grid.begin_phase(Phase::R4Builder);

    let mut r4s: Vec<&&Resident> = residents.iter().collect();
    r4s.sort_by(|a, b| a.name.cmp(&b.name));

    // Deterministic FSE cohort split: first half of the name-sorted
    // class takes FSE in the first half of the year.
    let fse_first_half: Vec<&str> = r4s
        .iter()
        .take(r4s.len() / 2)
        .map(|r| r.name.as_str())
        .collect();

    let mut outcome = R4Outcome::default();
    let mut mx_unused = 0usize;

    for res in &r4s {
        let mut placed = HashMap::new();
        let early_fse = fse_first_half.contains(&res.name.as_str());
        place_fixed_commitments(res, grid, early_fse, &mut placed)?;
        fill_deficiencies(res, grid, requirements, &mut placed)?;
        fill_capacity(res, grid, &mut placed, &mut mx_unused)?;
        outcome.placed.insert(res.name.clone(), placed);
    }

    // Redistribute unplaced Mx quota to residents flagged as having had
    // a harsh R2 year.
    if mx_unused > 0 {
        for res in &r4s {
            if mx_unused == 0 {
                break;
            }
            if !res.harsh_r2_year {
                continue;
            }
            if let Some(block) = first_feasible_block(grid, &res.name, "Mx") {
                grid.assign_block(&res.name, block, "Mx")?;
                outcome
                    .placed
                    .get_mut(&res.name)
                    .expect("resident was built above")
                    .insert(block, "Mx".to_string());
                mx_unused -= 1;
            }
        }
    }

    // Envelope fill runs last so it sees every cohort placement.
    for res in &r4s {
        let placed = outcome
            .placed
            .get_mut(&res.name)
            .expect("resident was built above");
        fill_envelope(res, grid, envelope, catalog, placed)?;
    }

    info!(count = r4s.len(), "built R4 schedules");
    Ok(outcome)
}

/// First block with no assignment and no hospital conflict for `code`.
fn first_feasible_block(grid: &ScheduleGrid, name: &str, code: &str) -> Option<usize> {
    grid.free_blocks(name)
        .into_iter()
        .find(|&b| !hospital_conflict(grid, name, b, code))
}

/// A run of `len` contiguous free blocks, preferring the given half of
/// the year; falls back to anywhere in the year.
fn contiguous_free_run(
    grid: &ScheduleGrid,
    name: &str,
    len: usize,
    prefer_first_half: Option<bool>,
) -> Option<Vec<usize>> {
    let free = grid.free_blocks(name);
    let runs = |range: std::ops::RangeInclusive<usize>| -> Option<Vec<usize>> {
        let mut run: Vec<usize> = Vec::new();
        for b in range {
            if free.contains(&b) {
                run.push(b);
                if run.len() == len {
                    return Some(run);
                }
            } else {
                run.clear();
            }
        }
        None
    };

    match prefer_first_half {
        Some(true) => runs(1..=6).or_else(|| runs(1..=BLOCKS)),
        Some(false) => runs(7..=BLOCKS).or_else(|| runs(1..=BLOCKS)),
        None => runs(1..=BLOCKS),
    }
}

/// Sub-step 1: research/CEP, FSE, and pathway commitments.
fn place_fixed_commitments(
    res: &Resident,
    grid: &mut ScheduleGrid,
    early_fse: bool,
    placed: &mut HashMap<usize, String>,
) -> Result<()> {
    // Research/CEP months.
    let mut requested = res.research_months + res.cep_months;
    if requested > 0 && res.pathways.t32 {
        warn!(resident = %res.name, "T32 resident requested research months; ineligible");
        requested = 0;
    }
    if requested > RESEARCH_CAP && !res.supplementary_funding {
        warn!(
            resident = %res.name,
            requested,
            "research months over cap without supplementary funding"
        );
        requested = RESEARCH_CAP;
    }
    let mut research_placed = 0u32;
    for &block in &RESEARCH_ORDER {
        if research_placed >= requested {
            break;
        }
        if grid.block_occupied(&res.name, block) {
            continue;
        }
        let code = if research_placed < res.research_months.min(requested) {
            "Res"
        } else {
            "CEP"
        };
        grid.assign_block(&res.name, block, code)?;
        placed.insert(block, code.to_string());
        research_placed += 1;
    }

    // NRDR: six blocks of Mnuc plus one block of each adjunct rotation
    // not already completed historically.
    if res.pathways.nrdr {
        let mut mnuc = 0;
        while mnuc < 6 {
            let Some(block) = first_feasible_block(grid, &res.name, "Mnuc") else {
                warn!(resident = %res.name, "ran out of blocks for NRDR Mnuc sextet");
                break;
            };
            grid.assign_block(&res.name, block, "Mnuc")?;
            placed.insert(block, "Mnuc".to_string());
            mnuc += 1;
        }
        for code in RequirementTable::nrdr_adjunct_codes() {
            if res.history_weeks(code) >= 4.0 {
                continue; // already completed
            }
            if let Some(block) = first_feasible_block(grid, &res.name, code) {
                grid.assign_block(&res.name, block, code)?;
                placed.insert(block, code.to_string());
            }
        }
    }

    // ESIR: eight blocks of Mir in R4.
    if res.pathways.esir {
        for _ in 0..8 {
            let Some(block) = first_feasible_block(grid, &res.name, "Mir") else {
                warn!(resident = %res.name, "ran out of blocks for ESIR Mir octet");
                break;
            };
            grid.assign_block(&res.name, block, "Mir")?;
            placed.insert(block, "Mir".to_string());
        }
    }

    // ESNR: six contiguous neuro blocks, at most one Smr.
    if res.pathways.esnr {
        if let Some(run) = contiguous_free_run(grid, &res.name, 6, None) {
            for (i, &block) in run.iter().enumerate() {
                let code = if i == 0 { "Smr" } else { "Zai" };
                grid.assign_block(&res.name, block, code)?;
                placed.insert(block, code.to_string());
            }
        } else {
            warn!(resident = %res.name, "no contiguous window for ESNR neuro blocks");
        }
    }

    // FSE: contiguous; breast FSE is exactly six blocks.
    if let Some(fse) = &res.fse_prefs {
        if let Some(specialty) = fse.specialties.first() {
            let len = if specialty.to_lowercase().contains("breast") {
                6
            } else {
                2
            };
            let code: String = format!("FSE-{}", specialty.chars().take(3).collect::<String>());
            if let Some(run) = contiguous_free_run(grid, &res.name, len, Some(early_fse)) {
                for &block in &run {
                    grid.assign_block(&res.name, block, &code)?;
                    placed.insert(block, code.clone());
                }
            } else {
                warn!(resident = %res.name, %specialty, "no contiguous window for FSE");
            }
        }
    }

    Ok(())
}

/// Sub-step 2: graduation-deficiency fill.
fn fill_deficiencies(
    res: &Resident,
    grid: &mut ScheduleGrid,
    requirements: &RequirementTable,
    placed: &mut HashMap<usize, String>,
) -> Result<()> {
    for req in requirements.applicable(res.pathways) {
        match req.label.as_str() {
            "Breast Imaging" => {
                while req.deficit(res, &current_weeks(grid, res)) > 0.0 {
                    let Some(block) = first_feasible_block(grid, &res.name, "Pcbi") else {
                        break;
                    };
                    grid.assign_block(&res.name, block, "Pcbi")?;
                    placed.insert(block, "Pcbi".to_string());
                }
            }
            "Nuclear Medicine" => {
                // Whole blocks of Mnuc while a block's worth remains;
                // a small residual deficit takes 4:1 substitute blocks.
                loop {
                    let deficit = req.deficit(res, &current_weeks(grid, res));
                    if deficit <= 0.0 {
                        break;
                    }
                    let code = if deficit >= 4.0 {
                        "Mnuc"
                    } else {
                        // One substitute block credits one week.
                        substitute_block_code(grid, res)
                    };
                    let Some(block) = first_feasible_block(grid, &res.name, code) else {
                        warn!(resident = %res.name, "no block left for NucMed deficit");
                        break;
                    };
                    grid.assign_block(&res.name, block, code)?;
                    placed.insert(block, code.to_string());
                }
            }
            // NRDR NucMed was committed in sub-step 1; ESIR/ESNR blocks
            // likewise. Anything still short surfaces in validation.
            _ => {}
        }
    }
    Ok(())
}

/// Picks the 4:1 substitute rotation with the least current exposure.
fn substitute_block_code(grid: &ScheduleGrid, res: &Resident) -> &'static str {
    use crate::models::NM_PARTIAL_CODES;
    NM_PARTIAL_CODES
        .iter()
        .min_by_key(|code| {
            (
                grid.code_weeks(&res.name, code) + res.history_weeks(code) as usize,
                *code,
            )
        })
        .copied()
        .expect("substitute pool is non-empty")
}

/// Current-year base weeks per rotation code (NF excluded by reading
/// base cells only).
fn current_weeks(grid: &ScheduleGrid, res: &Resident) -> HashMap<String, f64> {
    let mut out: HashMap<String, f64> = HashMap::new();
    for w in 0..crate::models::WEEKS {
        if let Some(code) = grid.base(&res.name, w) {
            *out.entry(code.to_string()).or_default() += 1.0;
        }
    }
    out
}

/// Sub-step 3a: Mx, Peds, and MSK capacity adjustments.
fn fill_capacity(
    res: &Resident,
    grid: &mut ScheduleGrid,
    placed: &mut HashMap<usize, String>,
    mx_unused: &mut usize,
) -> Result<()> {
    // One Mx block unless T32 or dual-pathway.
    if !res.pathways.t32 && !res.pathways.dual() {
        if let Some(block) = first_feasible_block(grid, &res.name, "Mx") {
            grid.assign_block(&res.name, block, "Mx")?;
            placed.insert(block, "Mx".to_string());
        } else {
            *mx_unused += 1;
        }
    } else {
        *mx_unused += 1;
    }

    // A second Peds block when only one was completed.
    let peds_weeks = res.history_weeks("Peds") + grid.code_weeks(&res.name, "Peds") as f64;
    if peds_weeks > 0.0 && peds_weeks < 8.0 {
        if let Some(block) = first_feasible_block(grid, &res.name, "Peds") {
            grid.assign_block(&res.name, block, "Peds")?;
            placed.insert(block, "Peds".to_string());
        }
    }

    // MSK top-up below three total blocks across the trio.
    let msk_codes = ["Vb", "Mb", "Ser"];
    let mut msk_weeks = res.history_weeks_in(&msk_codes)
        + grid.code_weeks_in(&res.name, &msk_codes) as f64;
    while msk_weeks < 12.0 {
        let code = if grid.code_weeks(&res.name, "Mb") + (res.history_weeks("Mb") as usize)
            <= grid.code_weeks(&res.name, "Ser") + (res.history_weeks("Ser") as usize)
        {
            "Mb"
        } else {
            "Ser"
        };
        let Some(block) = first_feasible_block(grid, &res.name, code) else {
            break;
        };
        grid.assign_block(&res.name, block, code)?;
        placed.insert(block, code.to_string());
        msk_weeks += 4.0;
    }

    Ok(())
}

/// Sub-step 3b: fill remaining blocks toward the staffing envelope,
/// least-satisfied group first.
fn fill_envelope(
    res: &Resident,
    grid: &mut ScheduleGrid,
    envelope: &StaffingEnvelope,
    catalog: &RotationCatalog,
    placed: &mut HashMap<usize, String>,
) -> Result<()> {
    for block in grid.free_blocks(&res.name) {
        // Score each candidate code by the worst per-week shortfall of
        // the envelope group it belongs to, across this block.
        let weeks: Vec<usize> = crate::models::BlockCalendar::weeks_of_block(block).collect();
        let mut best: Option<(i64, usize, &str)> = None;

        for (pool_idx, code) in FILL_POOL.iter().enumerate() {
            if !catalog.allows(code, res.r_year) {
                continue;
            }
            if hospital_conflict(grid, &res.name, block, code) {
                continue;
            }
            let mut shortfall: Option<i64> = None;
            for bound in envelope.bounds.iter().filter(|b| b.codes.iter().any(|c| c == code)) {
                let codes = bound.code_refs();
                for &w in &weeks {
                    let gap = bound.min as i64 - grid.staffing_count(w, &codes) as i64;
                    shortfall = Some(shortfall.map_or(gap, |s| s.max(gap)));
                }
            }
            let shortfall = shortfall.unwrap_or(0);

            // Larger shortfall wins; pool order breaks ties.
            let candidate = (-shortfall, pool_idx, *code);
            if best.is_none_or(|b| candidate < b) {
                best = Some(candidate);
            }
        }

        if let Some((_, _, code)) = best {
            grid.assign_block(&res.name, block, code)?;
            placed.insert(block, code.to_string());
        }
    }
    Ok(())
}
