//! Graduation requirement tables and credit rules.
//!
//! Requirements are data, not branches: each entry names its qualifying
//! rotation set, a week target, optional partial-credit ratios, and the
//! pathway predicate it applies to. The NucMed 4:1 substitution
//! ({Mai, Mch, Peds, Mx} → Mnuc-equivalent at 0.25) is attached to the
//! non-NRDR entry only; under NRDR the substitution is forbidden and
//! the target jumps to 48 weeks.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::resident::{Pathways, Resident};

/// Rotations granting partial NucMed credit, and the ratio.
pub const NM_PARTIAL_CODES: [&str; 4] = ["Mai", "Mch", "Peds", "Mx"];
/// One week of Mnuc-equivalent per four partial-credit weeks.
pub const NM_PARTIAL_RATIO: f64 = 0.25;

/// Pathway predicate for a requirement entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppliesTo {
    /// Every graduating resident.
    All,
    /// Residents with the NRDR flag.
    Nrdr,
    /// Residents without the NRDR flag.
    NonNrdr,
    /// Residents with the ESIR flag.
    Esir,
    /// Residents with the ESNR flag.
    Esnr,
}

impl AppliesTo {
    /// Whether a pathway set matches this predicate.
    pub fn matches(self, p: Pathways) -> bool {
        match self {
            AppliesTo::All => true,
            AppliesTo::Nrdr => p.nrdr,
            AppliesTo::NonNrdr => !p.nrdr,
            AppliesTo::Esir => p.esir,
            AppliesTo::Esnr => p.esnr,
        }
    }
}

/// A single graduation requirement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Requirement {
    /// Label used in findings (e.g. "Nuclear Medicine (NRDR)").
    pub label: String,
    /// Minimum credited weeks.
    pub required_weeks: f64,
    /// Rotation codes crediting at full weight.
    pub qualifying: Vec<String>,
    /// Rotation codes crediting at a partial ratio.
    pub partial_credit: HashMap<String, f64>,
    /// Which residents the entry binds.
    pub applies_to: AppliesTo,
}

impl Requirement {
    fn new(label: &str, weeks: f64, qualifying: &[&str], applies_to: AppliesTo) -> Self {
        Self {
            label: label.to_string(),
            required_weeks: weeks,
            qualifying: qualifying.iter().map(|s| s.to_string()).collect(),
            partial_credit: HashMap::new(),
            applies_to,
        }
    }

    fn with_partial(mut self, codes: &[&str], ratio: f64) -> Self {
        for c in codes {
            self.partial_credit.insert(c.to_string(), ratio);
        }
        self
    }

    /// Credited weeks for a resident given current-year weeks per code.
    ///
    /// Historical and current weeks both count; NF weeks are excluded
    /// upstream (the caller tallies base cells only).
    pub fn credited_weeks(&self, resident: &Resident, current: &HashMap<String, f64>) -> f64 {
        let mut total = 0.0;
        for code in &self.qualifying {
            total += resident.history_weeks(code) + current.get(code).copied().unwrap_or(0.0);
        }
        for (code, ratio) in &self.partial_credit {
            total +=
                (resident.history_weeks(code) + current.get(code).copied().unwrap_or(0.0)) * ratio;
        }
        total
    }

    /// Remaining deficit in weeks (zero when satisfied).
    pub fn deficit(&self, resident: &Resident, current: &HashMap<String, f64>) -> f64 {
        (self.required_weeks - self.credited_weeks(resident, current)).max(0.0)
    }
}

/// The full graduation requirement table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequirementTable {
    pub entries: Vec<Requirement>,
}

impl Default for RequirementTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl RequirementTable {
    /// The institutional requirement table.
    pub fn standard() -> Self {
        let entries = vec![
            Requirement::new(
                "Breast Imaging",
                12.0,
                &["Pcbi", "Mb", "Sbi", "Vb"],
                AppliesTo::All,
            ),
            Requirement::new(
                "Nuclear Medicine",
                16.0,
                &["Mnuc", "Vnuc", "Snct", "Mnct"],
                AppliesTo::NonNrdr,
            )
            .with_partial(&NM_PARTIAL_CODES, NM_PARTIAL_RATIO),
            // NRDR: 48 weeks, substitution forbidden.
            Requirement::new(
                "Nuclear Medicine (NRDR)",
                48.0,
                &["Mnuc", "Vnuc", "Snct", "Mnct"],
                AppliesTo::Nrdr,
            ),
            Requirement::new(
                "ESIR Interventional",
                12.0,
                &["Mir", "Zir", "Sir", "Vir"],
                AppliesTo::Esir,
            ),
            // 6 blocks of neuro in R4; the max-one-Smr rule is checked
            // separately by the validator.
            Requirement::new("ESNR Neuroradiology", 24.0, &["Zai", "Smr"], AppliesTo::Esnr),
        ];
        Self { entries }
    }

    /// Entries binding a pathway set.
    pub fn applicable(&self, pathways: Pathways) -> impl Iterator<Item = &Requirement> {
        self.entries
            .iter()
            .filter(move |r| r.applies_to.matches(pathways))
    }

    /// NRDR additionally owes one block each of these rotations.
    pub fn nrdr_adjunct_codes() -> [&'static str; 4] {
        ["Mai", "Mch", "Mb", "Mucic"]
    }
}
