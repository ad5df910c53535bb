//! Schedule validation.
//!
//! Four independent checks prove the finished grid against the
//! institutional rules:
//!
//! - [`staffing`]: per-week head counts vs the envelope
//! - [`graduation`]: cumulative section weeks vs the requirement table
//!   (NF weeks excluded, 4:1 NucMed substitution only outside NRDR)
//! - [`hospital`]: one payroll system per resident per block
//! - [`night_float`]: NF counts, spacing, and no-call adherence
//!
//! Each check accumulates every finding it can see rather than stopping
//! at the first; the aggregate report is `ok` exactly when no finding
//! carries error severity.

pub mod graduation;
pub mod hospital;
pub mod night_float;
pub mod staffing;

use serde::Serialize;

use crate::models::{NfRules, RequirementTable, Resident, ScheduleGrid, StaffingEnvelope};

/// Finding severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    /// Informational; never blocks the build.
    Info,
    /// Should be reviewed; does not block.
    Warning,
    /// The schedule violates a hard rule.
    Error,
}

/// A single validation finding.
#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    /// Which check produced this finding.
    pub check: &'static str,
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// Offending (resident, week) pairs; week is 0-based. Findings
    /// without a week component use week 0 placeholders sparingly and
    /// say so in the message.
    pub offenders: Vec<(String, usize)>,
}

impl Finding {
    /// Creates an error-severity finding.
    pub fn error(check: &'static str, message: impl Into<String>) -> Self {
        Self {
            check,
            severity: Severity::Error,
            message: message.into(),
            offenders: Vec::new(),
        }
    }

    /// Creates a warning-severity finding.
    pub fn warning(check: &'static str, message: impl Into<String>) -> Self {
        Self {
            check,
            severity: Severity::Warning,
            message: message.into(),
            offenders: Vec::new(),
        }
    }

    /// Attaches offending (resident, week) pairs.
    pub fn with_offenders(mut self, offenders: Vec<(String, usize)>) -> Self {
        self.offenders = offenders;
        self
    }
}

/// The aggregate validation report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub findings: Vec<Finding>,
}

impl ValidationReport {
    /// Whether no error-severity finding exists.
    pub fn ok(&self) -> bool {
        self.findings.iter().all(|f| f.severity != Severity::Error)
    }

    /// Findings at a given severity.
    pub fn at(&self, severity: Severity) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.severity == severity)
    }

    /// Findings from one check.
    pub fn from_check<'a>(&'a self, check: &'a str) -> impl Iterator<Item = &'a Finding> + 'a {
        self.findings.iter().filter(move |f| f.check == check)
    }

    /// Renders the report as review-ready text.
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        lines.push("== schedule validation ==".to_string());
        if self.findings.is_empty() {
            lines.push("no findings".to_string());
        }
        for f in &self.findings {
            let sev = match f.severity {
                Severity::Info => "info",
                Severity::Warning => "warn",
                Severity::Error => "ERROR",
            };
            let mut line = format!("[{sev}] {}: {}", f.check, f.message);
            if !f.offenders.is_empty() {
                let pairs: Vec<String> = f
                    .offenders
                    .iter()
                    .map(|(n, w)| format!("{n}@w{w}"))
                    .collect();
                line.push_str(&format!(" ({})", pairs.join(", ")));
            }
            lines.push(line);
        }
        lines.push(format!(
            "== {} finding(s), status: {} ==",
            self.findings.len(),
            if self.ok() { "ok" } else { "errors present" }
        ));
        lines.join("\n")
    }
}

/// Runs all four checks over a finished grid.
pub fn validate(
    residents: &[Resident],
    grid: &ScheduleGrid,
    requirements: &RequirementTable,
    envelope: &StaffingEnvelope,
    nf_rules: &NfRules,
) -> ValidationReport {
    let mut report = ValidationReport::default();
    report.findings.extend(staffing::check(grid, envelope));
    report
        .findings
        .extend(graduation::check(residents, grid, requirements));
    report.findings.extend(hospital::check(residents, grid));
    report
        .findings
        .extend(night_float::check(residents, grid, nf_rules));
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_ok_logic() {
        let mut report = ValidationReport::default();
        assert!(report.ok());

        report.findings.push(Finding::warning("staffing", "low"));
        assert!(report.ok());

        report.findings.push(Finding::error("hospital", "conflict"));
        assert!(!report.ok());
        assert_eq!(report.at(Severity::Error).count(), 1);
    }

    #[test]
    fn test_render_mentions_offenders() {
        let mut report = ValidationReport::default();
        report.findings.push(
            Finding::error("nf", "spacing violated")
                .with_offenders(vec![("Doe, Jane".to_string(), 5)]),
        );
        let text = report.render();
        assert!(text.contains("Doe, Jane@w5"));
        assert!(text.contains("errors present"));
    }
}
