//! Graduation check: cumulative section weeks vs the requirement table.
//!
//! Credits historical weeks plus current-year *base* cells — night
//! float is excluded by construction because the NF overlay never
//! touches base cells. Seniors are always checked; T32 juniors are
//! checked too since their pathway compresses later clinical time.

use std::collections::HashMap;

use crate::models::{RequirementTable, Resident, ScheduleGrid, WEEKS};

use super::{Finding, Severity};

/// Checks graduation arithmetic for every senior (and T32 juniors).
pub fn check(
    residents: &[Resident],
    grid: &ScheduleGrid,
    requirements: &RequirementTable,
) -> Vec<Finding> {
    let mut findings = Vec::new();

    for res in residents {
        let graduating = res.r_year == 4;
        if !graduating && !(res.pathways.t32 && res.r_year >= 2) {
            continue;
        }

        let current = current_weeks(grid, &res.name);

        for req in requirements.applicable(res.pathways) {
            let credited = req.credited_weeks(res, &current);
            let deficit = req.required_weeks - credited;
            if deficit <= 0.0 {
                continue;
            }
            let severity = if graduating {
                Severity::Error
            } else {
                // Juniors still have years to close the gap.
                Severity::Warning
            };
            findings.push(Finding {
                check: "graduation",
                severity,
                message: format!(
                    "{}: {} — {credited:.1}/{:.0} weeks (deficit {deficit:.1})",
                    res.name, req.label, req.required_weeks
                ),
                offenders: vec![(res.name.clone(), 0)],
            });
        }

        // ESNR: at most one Smr block inside the neuro window.
        if res.pathways.esnr && graduating {
            let smr_weeks = current.get("Smr").copied().unwrap_or(0.0);
            if smr_weeks > 4.0 {
                findings.push(Finding {
                    check: "graduation",
                    severity: Severity::Error,
                    message: format!(
                        "{}: ESNR neuro window holds {smr_weeks:.0} Smr weeks, maximum 4",
                        res.name
                    ),
                    offenders: vec![(res.name.clone(), 0)],
                });
            }
        }
    }

    findings
}

/// Current-year base weeks per rotation code.
fn current_weeks(grid: &ScheduleGrid, name: &str) -> HashMap<String, f64> {
    let mut out: HashMap<String, f64> = HashMap::new();
    for w in 0..WEEKS {
        if let Some(code) = grid.base(name, w) {
            *out.entry(code.to_string()).or_default() += 1.0;
        }
    }
    out
}
