//! Night-float rule check: per-kind counts, spacing, and no-call.

use crate::models::{NfKind, NfRules, Resident, ScheduleGrid};

use super::{Finding, Severity};

/// Checks every resident's NF overlay against the rules.
pub fn check(residents: &[Resident], grid: &ScheduleGrid, rules: &NfRules) -> Vec<Finding> {
    let mut findings = Vec::new();

    for res in residents {
        let weeks = grid.nf_weeks(&res.name);
        let mnf = weeks
            .iter()
            .filter(|(_, c)| c.as_str() == NfKind::Mnf.code())
            .count();
        let snf2 = weeks
            .iter()
            .filter(|(_, c)| c.as_str() == NfKind::Snf2.code())
            .count();

        // Count rules per cohort.
        match res.r_year {
            2 => {
                if mnf != rules.r2_mnf_weeks {
                    findings.push(count_error(
                        res,
                        &weeks,
                        format!("R2 has {mnf} Mnf weeks, expected {}", rules.r2_mnf_weeks),
                    ));
                }
                if snf2 > 0 {
                    findings.push(count_error(res, &weeks, "R2 assigned Snf2".to_string()));
                }
            }
            3 => {
                if mnf + snf2 > rules.r3_max_nf {
                    findings.push(count_error(
                        res,
                        &weeks,
                        format!(
                            "R3 has {} NF weeks, maximum {}",
                            mnf + snf2,
                            rules.r3_max_nf
                        ),
                    ));
                }
            }
            4 => {
                if snf2 != rules.r4_snf2_weeks {
                    findings.push(count_error(
                        res,
                        &weeks,
                        format!(
                            "R4 has {snf2} Snf2 weeks, expected {}",
                            rules.r4_snf2_weeks
                        ),
                    ));
                }
                if mnf > 0 {
                    findings.push(count_error(res, &weeks, "R4 assigned Mnf".to_string()));
                }
            }
            _ => {
                if !weeks.is_empty() {
                    findings.push(count_error(
                        res,
                        &weeks,
                        format!("R{} assigned NF", res.r_year),
                    ));
                }
            }
        }

        // Spacing.
        for (i, (w1, _)) in weeks.iter().enumerate() {
            for (w2, _) in &weeks[i + 1..] {
                if rules.too_close(*w1, *w2) {
                    findings.push(
                        Finding::error(
                            "night-float",
                            format!(
                                "{}: NF weeks {w1} and {w2} closer than {} weeks",
                                res.name, rules.min_spacing_weeks
                            ),
                        )
                        .with_offenders(vec![
                            (res.name.clone(), *w1),
                            (res.name.clone(), *w2),
                        ]),
                    );
                }
            }
        }

        // No-call adherence.
        for (w, code) in &weeks {
            if res.no_call(*w) {
                findings.push(
                    Finding::error(
                        "night-float",
                        format!("{}: {code} assigned in no-call week {w}", res.name),
                    )
                    .with_offenders(vec![(res.name.clone(), *w)]),
                );
            }
        }
    }

    findings
}

fn count_error(res: &Resident, weeks: &[(usize, String)], message: String) -> Finding {
    Finding {
        check: "night-float",
        severity: Severity::Error,
        message: format!("{}: {message}", res.name),
        offenders: weeks.iter().map(|(w, _)| (res.name.clone(), *w)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_for(residents: &[&Resident]) -> ScheduleGrid {
        let names: Vec<String> = residents.iter().map(|r| r.name.clone()).collect();
        ScheduleGrid::new(&names).unwrap()
    }

    #[test]
    fn test_correct_counts_pass() {
        let r2 = Resident::new("Adams, A", 2);
        let r4 = Resident::new("Baker, B", 4);
        let mut grid = grid_for(&[&r2, &r4]);
        grid.assign_nf("Adams, A", 4, "Mnf").unwrap();
        grid.assign_nf("Adams, A", 10, "Mnf").unwrap();
        grid.assign_nf("Baker, B", 6, "Snf2").unwrap();
        grid.assign_nf("Baker, B", 12, "Snf2").unwrap();

        let findings = check(&[r2, r4], &grid, &NfRules::default());
        assert!(findings.is_empty(), "unexpected: {findings:?}");
    }

    #[test]
    fn test_r2_count_mismatch() {
        let r2 = Resident::new("Adams, A", 2);
        let mut grid = grid_for(&[&r2]);
        grid.assign_nf("Adams, A", 4, "Mnf").unwrap();

        let findings = check(&[r2], &grid, &NfRules::default());
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("expected 2"));
    }

    #[test]
    fn test_spacing_violation_flagged() {
        let r4 = Resident::new("Baker, B", 4);
        let mut grid = grid_for(&[&r4]);
        grid.assign_nf("Baker, B", 6, "Snf2").unwrap();
        grid.assign_nf("Baker, B", 8, "Snf2").unwrap();

        let findings = check(&[r4], &grid, &NfRules::default());
        assert!(findings
            .iter()
            .any(|f| f.message.contains("closer than 4")));
    }

    #[test]
    fn test_no_call_violation_flagged() {
        let mut r2 = Resident::new("Adams, A", 2);
        r2.no_call_weeks = vec![10];
        let mut grid = grid_for(&[&r2]);
        grid.assign_nf("Adams, A", 10, "Mnf").unwrap();
        grid.assign_nf("Adams, A", 20, "Mnf").unwrap();

        let findings = check(&[r2], &grid, &NfRules::default());
        assert!(findings
            .iter()
            .any(|f| f.message.contains("no-call week 10")));
    }

    #[test]
    fn test_r3_within_limit_passes() {
        let r3 = Resident::new("Clark, C", 3);
        let mut grid = grid_for(&[&r3]);
        grid.assign_nf("Clark, C", 0, "Mnf").unwrap();
        grid.assign_nf("Clark, C", 10, "Snf2").unwrap();
        grid.assign_nf("Clark, C", 20, "Mnf").unwrap();

        assert!(check(&[r3], &grid, &NfRules::default()).is_empty());
    }

    #[test]
    fn test_r3_over_limit_flagged() {
        let r3 = Resident::new("Clark, C", 3);
        let mut grid = grid_for(&[&r3]);
        for w in [0, 10, 20, 30] {
            grid.assign_nf("Clark, C", w, "Mnf").unwrap();
        }
        let findings = check(&[r3], &grid, &NfRules::default());
        assert!(findings.iter().any(|f| f.message.contains("maximum 3")));
    }
}
