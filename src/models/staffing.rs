//! Staffing envelope: per-week head-count bounds per rotation group.
//!
//! Sourced from the envelope region of the `Base Schedule` tab (rows
//! 101-151) and treated as external configuration by the core. A bound
//! groups one or more rotation codes under a label (e.g. "ZSFG Total"
//! spans every ZSFG code) with a weekly minimum and maximum.

use serde::{Deserialize, Serialize};

use super::calendar::WEEKS;

/// Head-count bounds for one rotation group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffingBound {
    /// Group label as it appears in the workbook.
    pub label: String,
    /// Rotation codes counted toward this group.
    pub codes: Vec<String>,
    /// Minimum residents per week.
    pub min: u32,
    /// Maximum residents per week.
    pub max: u32,
}

impl StaffingBound {
    /// Creates a bound with an unconstrained maximum.
    pub fn at_least(label: &str, codes: &[&str], min: u32) -> Self {
        Self {
            label: label.to_string(),
            codes: codes.iter().map(|s| s.to_string()).collect(),
            min,
            max: u32::MAX,
        }
    }

    /// Sets the maximum.
    pub fn with_max(mut self, max: u32) -> Self {
        self.max = max;
        self
    }

    /// Code list as `&str` slices for grid queries.
    pub fn code_refs(&self) -> Vec<&str> {
        self.codes.iter().map(String::as_str).collect()
    }
}

/// The full envelope: bounds applying uniformly to all 52 weeks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaffingEnvelope {
    pub bounds: Vec<StaffingBound>,
}

impl StaffingEnvelope {
    /// Creates an empty envelope.
    pub fn new() -> Self {
        Self::default()
    }

    /// The institutional default bounds, used when the workbook's
    /// envelope region is absent or blank.
    pub fn standard() -> Self {
        let bounds = vec![
            StaffingBound::at_least("Moffitt AI", &["Mai"], 3),
            StaffingBound::at_least("Moffitt US", &["Mus"], 2),
            StaffingBound::at_least("Moffitt Cardiothoracic", &["Mch", "Mch2"], 2),
            StaffingBound::at_least("Peds", &["Peds"], 1),
            StaffingBound::at_least("Moffitt Bone", &["Mb"], 1),
            StaffingBound::at_least("Moffitt Nucs", &["Mnuc", "Mnct"], 2),
            StaffingBound::at_least("PCMB Breast", &["Pcbi"], 1),
            StaffingBound::at_least(
                "ZSFG Total",
                &[
                    "Ser", "Smr", "Sbi", "Sir", "Sus", "Sai", "Snct", "Sch", "Sch2", "Sx",
                ],
                8,
            ),
            StaffingBound::at_least("VA MSK/Nucs", &["Vnuc", "Vb"], 1),
            StaffingBound::at_least("IR Total", &["Mir", "Zir", "Sir", "Vir"], 1),
            StaffingBound::at_least("Mucic", &["Mucic"], 1),
        ];
        Self { bounds }
    }

    /// Adds a bound.
    pub fn with_bound(mut self, bound: StaffingBound) -> Self {
        self.bounds.push(bound);
        self
    }

    /// Weeks covered by the envelope (the full grid).
    pub fn weeks(&self) -> std::ops::Range<usize> {
        0..WEEKS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_envelope_groups() {
        let env = StaffingEnvelope::standard();
        let zsfg = env.bounds.iter().find(|b| b.label == "ZSFG Total").unwrap();
        assert!(zsfg.codes.iter().any(|c| c == "Sir"));
        assert_eq!(zsfg.min, 8);
        assert_eq!(zsfg.max, u32::MAX);
    }

    #[test]
    fn test_bound_builder() {
        let b = StaffingBound::at_least("IR", &["Mir", "Zir"], 1).with_max(4);
        assert_eq!(b.min, 1);
        assert_eq!(b.max, 4);
        assert_eq!(b.code_refs(), vec!["Mir", "Zir"]);
    }
}
