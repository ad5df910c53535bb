//! Staffing check: per-week head counts against the envelope.
//!
//! Under-staffing is an error; over-staffing is a warning (maximums in
//! the workbook are advisory and depend on class size).

use crate::models::{BlockCalendar, ScheduleGrid, StaffingEnvelope};

use super::{Finding, Severity};

/// Checks every envelope bound for every week.
pub fn check(grid: &ScheduleGrid, envelope: &StaffingEnvelope) -> Vec<Finding> {
    let mut findings = Vec::new();

    for bound in &envelope.bounds {
        let codes = bound.code_refs();
        for week in envelope.weeks() {
            let count = grid.staffing_count(week, &codes);
            let block = BlockCalendar::block_of_week(week);

            if count < bound.min as usize {
                findings.push(Finding {
                    check: "staffing",
                    severity: Severity::Error,
                    message: format!(
                        "{}: {count} assigned in week {week} (block {block}), minimum {}",
                        bound.label, bound.min
                    ),
                    offenders: Vec::new(),
                });
            } else if bound.max != u32::MAX && count > bound.max as usize {
                findings.push(Finding {
                    check: "staffing",
                    severity: Severity::Warning,
                    message: format!(
                        "{}: {count} assigned in week {week} (block {block}), maximum {}",
                        bound.label, bound.max
                    ),
                    offenders: Vec::new(),
                });
            }
        }
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Phase, StaffingBound};

    fn grid_with(names: &[&str]) -> ScheduleGrid {
        let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        ScheduleGrid::new(&names).unwrap()
    }

    #[test]
    fn test_understaffed_week_is_error() {
        let mut grid = grid_with(&["A, A"]);
        grid.begin_phase(Phase::R3Builder);
        // Staff Mai only in week 0; the other 51 weeks are short.
        grid.assign("A, A", 0, "Mai").unwrap();

        let envelope =
            StaffingEnvelope::new().with_bound(StaffingBound::at_least("AI", &["Mai"], 1));
        let findings = check(&grid, &envelope);

        assert_eq!(findings.len(), 51);
        assert!(findings.iter().all(|f| f.severity == Severity::Error));
    }

    #[test]
    fn test_overstaffed_week_is_warning() {
        let mut grid = grid_with(&["A, A", "B, B"]);
        grid.begin_phase(Phase::R3Builder);
        grid.assign("A, A", 0, "Mai").unwrap();
        grid.assign("B, B", 0, "Mai").unwrap();

        let envelope = StaffingEnvelope::new()
            .with_bound(StaffingBound::at_least("AI", &["Mai"], 0).with_max(1));
        let findings = check(&grid, &envelope);

        let week0: Vec<_> = findings
            .iter()
            .filter(|f| f.message.contains("week 0"))
            .collect();
        assert_eq!(week0.len(), 1);
        assert_eq!(week0[0].severity, Severity::Warning);
    }

    #[test]
    fn test_satisfied_envelope_is_quiet() {
        let mut grid = grid_with(&["A, A"]);
        grid.begin_phase(Phase::R3Builder);
        for w in 0..52 {
            grid.assign("A, A", w, "Mai").unwrap();
        }
        let envelope =
            StaffingEnvelope::new().with_bound(StaffingBound::at_least("AI", &["Mai"], 1));
        assert!(check(&grid, &envelope).is_empty());
    }
}
