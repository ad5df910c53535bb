//! Night-float rule set.
//!
//! Per-year weekly counts and shift kinds: R2s take exactly two `Mnf`
//! weeks (their `Snf`/`Sx` weeks are already embedded in the track),
//! R3s take at most three weeks across {`Mnf`, `Snf2`} and at least
//! one, R4s take exactly two `Snf2` weeks. Any two NF weeks for the
//! same resident must be at least four weeks apart.

use serde::{Deserialize, Serialize};

/// Night-float shift kinds placed by the overlay solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NfKind {
    Mnf,
    Snf2,
}

impl NfKind {
    /// Rotation code written into the NF tab.
    pub fn code(self) -> &'static str {
        match self {
            NfKind::Mnf => "Mnf",
            NfKind::Snf2 => "Snf2",
        }
    }
}

/// The institutional NF rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NfRules {
    /// Exact Mnf weeks per R2.
    pub r2_mnf_weeks: usize,
    /// Maximum total NF weeks per R3 (Mnf + Snf2).
    pub r3_max_nf: usize,
    /// Minimum total NF weeks per R3.
    pub r3_min_nf: usize,
    /// Exact Snf2 weeks per R4.
    pub r4_snf2_weeks: usize,
    /// Minimum spacing between two NF weeks for one resident.
    pub min_spacing_weeks: usize,
    /// Base rotations NF prefers to pull from (objective reward,
    /// never a hard constraint).
    pub preferred_pull: Vec<String>,
}

impl Default for NfRules {
    fn default() -> Self {
        Self {
            r2_mnf_weeks: 2,
            r3_max_nf: 3,
            r3_min_nf: 1,
            r4_snf2_weeks: 2,
            min_spacing_weeks: 4,
            preferred_pull: ["Pcmb", "Mb", "Mucic", "Peds", "Mnuc"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl NfRules {
    /// Whether a radiology year may take a shift kind at all.
    pub fn eligible(&self, r_year: u8, kind: NfKind) -> bool {
        match kind {
            NfKind::Mnf => matches!(r_year, 2 | 3),
            NfKind::Snf2 => matches!(r_year, 3 | 4),
        }
    }

    /// Whether a base rotation is in the preferred pull set.
    pub fn preferred_source(&self, code: &str) -> bool {
        self.preferred_pull.iter().any(|c| c == code)
    }

    /// Whether two NF weeks violate the spacing minimum.
    pub fn too_close(&self, w1: usize, w2: usize) -> bool {
        w1.abs_diff(w2) < self.min_spacing_weeks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eligibility_by_year() {
        let rules = NfRules::default();
        assert!(rules.eligible(2, NfKind::Mnf));
        assert!(!rules.eligible(2, NfKind::Snf2));
        assert!(rules.eligible(3, NfKind::Mnf));
        assert!(rules.eligible(3, NfKind::Snf2));
        assert!(!rules.eligible(4, NfKind::Mnf));
        assert!(rules.eligible(4, NfKind::Snf2));
        assert!(!rules.eligible(1, NfKind::Mnf));
    }

    #[test]
    fn test_spacing() {
        let rules = NfRules::default();
        assert!(rules.too_close(5, 8)); // gap 3 < 4
        assert!(!rules.too_close(5, 9)); // gap 4 ok
        assert!(rules.too_close(8, 5));
    }

    #[test]
    fn test_preferred_sources() {
        let rules = NfRules::default();
        assert!(rules.preferred_source("Mnuc"));
        assert!(rules.preferred_source("Pcmb"));
        assert!(!rules.preferred_source("Zir"));
    }
}
