//! Hospital-exclusivity check.
//!
//! No resident may sit on two payroll systems in the same block: the
//! multiset of non-Other hospital systems across a resident's four
//! block cells must collapse to at most one. One finding per offending
//! (resident, block).

use std::collections::BTreeMap;

use crate::models::{
    hospital_system, BlockCalendar, HospitalSystem, Resident, ScheduleGrid, BLOCKS,
};

use super::{Finding, Severity};

/// Checks every (resident, block) for mixed payroll systems.
pub fn check(residents: &[Resident], grid: &ScheduleGrid) -> Vec<Finding> {
    let mut findings = Vec::new();

    for res in residents {
        for block in 1..=BLOCKS {
            let mut seen: BTreeMap<HospitalSystem, Vec<(usize, String)>> = BTreeMap::new();
            for w in BlockCalendar::weeks_of_block(block) {
                let Some(code) = grid.base(&res.name, w) else {
                    continue;
                };
                let system = hospital_system(code);
                if system != HospitalSystem::Other {
                    seen.entry(system).or_default().push((w, code.to_string()));
                }
            }
            if seen.len() > 1 {
                let codes: Vec<String> =
                    seen.values().flatten().map(|(_, c)| c.clone()).collect();
                let offenders: Vec<(String, usize)> = seen
                    .values()
                    .flatten()
                    .map(|(w, _)| (res.name.clone(), *w))
                    .collect();
                findings.push(Finding {
                    check: "hospital",
                    severity: Severity::Error,
                    message: format!(
                        "{}: block {block} mixes payroll systems ({})",
                        res.name,
                        codes.join(", ")
                    ),
                    offenders,
                });
            }
        }
    }

    findings
}
