//! Resident model with pathway flags, preferences, and history.
//!
//! A resident is populated once from the workbook roster, the survey
//! responses, and the authoritative `R3-4 Recs` pathway overrides, then
//! treated as immutable by the phases (the grid carries all mutable
//! schedule state).
//!
//! # PGY semantics
//! `r_year` is the *target-year* radiology year (1-4), not the
//! prior-year level. Every consumer in this crate reads the target-year
//! value; the workbook reader owns the column-B/increment translation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::Section;

/// Subspecialty pathway flags. Not mutually exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pathways {
    pub esir: bool,
    pub esnr: bool,
    pub t32: bool,
    pub nrdr: bool,
}

impl Pathways {
    /// No pathway commitments.
    pub const NONE: Pathways = Pathways {
        esir: false,
        esnr: false,
        t32: false,
        nrdr: false,
    };

    /// Number of active pathway flags.
    pub fn count(&self) -> usize {
        [self.esir, self.esnr, self.t32, self.nrdr]
            .iter()
            .filter(|&&f| f)
            .count()
    }

    /// Whether the resident pursues two or more pathways.
    #[inline]
    pub fn dual(&self) -> bool {
        self.count() >= 2
    }

    /// Merges another flag set in (union). The recs tab is authoritative,
    /// so the merge order is survey first, recs second.
    pub fn merge(&mut self, other: Pathways) {
        self.esir |= other.esir;
        self.esnr |= other.esnr;
        self.t32 |= other.t32;
        self.nrdr |= other.nrdr;
    }
}

/// R1 sampler rotation rankings (rotation code → rank, 1 = top).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SamplerPrefs {
    pub rankings: HashMap<String, u32>,
}

/// R2 track rankings (track number → rank, 1 = top).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackPrefs {
    pub rankings: HashMap<usize, u32>,
}

/// R3/R4 section preferences as signed scores per rotation code.
///
/// TOP 1/2/3 map to +3/+2/+1, BOTTOM 1/2/3 to -3/-2/-1.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionPrefs {
    pub scores: HashMap<String, i32>,
}

impl SectionPrefs {
    /// Preference score for a rotation code (0 when unranked).
    pub fn score(&self, code: &str) -> i32 {
        self.scores.get(code).copied().unwrap_or(0)
    }
}

/// R3 AIRP session rankings plus groupmate requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AirpPrefs {
    /// Session id (e.g. "2", "3+4") → rank, 1 = top.
    pub rankings: HashMap<String, u32>,
    /// Names of desired groupmates (advisory, surfaced for review).
    pub group_requests: Vec<String>,
}

/// R4 focused subspecialty experience request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FsePrefs {
    /// Requested specialties in order (e.g. "Breast", "Chest").
    pub specialties: Vec<String>,
    /// "Contiguous" or "Interrupted" organization request.
    pub organization: String,
}

/// A resident with all scheduling-relevant data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resident {
    /// Canonical identity key, "Last, First" as in the roster.
    pub name: String,
    pub first_name: String,
    pub last_name: String,
    /// Target-year radiology year (1-4).
    pub r_year: u8,
    /// Pathway flag set (survey-advisory, recs-authoritative).
    pub pathways: Pathways,

    /// Historical weeks per rotation code across prior years.
    pub history: HashMap<String, f64>,

    // Preferences (absent sub-records mean "no response").
    pub sampler_prefs: Option<SamplerPrefs>,
    pub track_prefs: Option<TrackPrefs>,
    pub section_prefs: Option<SectionPrefs>,
    pub airp_prefs: Option<AirpPrefs>,
    pub fse_prefs: Option<FsePrefs>,
    /// Blocks the resident prefers for Zir.
    pub zir_blocks: Vec<usize>,
    /// Week indices (0-based) where NF must not be assigned.
    pub no_call_weeks: Vec<usize>,

    // R4 commitments.
    pub research_months: u32,
    pub cep_months: u32,
    /// Supplementary funding lifts the 2-month research cap.
    pub supplementary_funding: bool,

    // Deficit analysis from the recs tab.
    /// Recommended blocks per rotation code.
    pub recommended_blocks: HashMap<String, f64>,
    /// Sections flagged deficient by the recs tab.
    pub deficient_sections: Vec<String>,

    // Reviewer annotations.
    /// Had IR over Christmas/New Year the prior year (blocks holiday Zir).
    pub ir_over_christmas: bool,
    /// Reviewer-provided indicator for extra Mx redistribution.
    pub harsh_r2_year: bool,

    // Carried, logged, not scheduled.
    pub vacation_dates: Vec<String>,
    pub academic_dates: Vec<String>,
    pub leave_info: String,
}

impl Resident {
    /// Creates a resident from the roster name and target radiology year.
    pub fn new(name: impl Into<String>, r_year: u8) -> Self {
        let name = name.into();
        let (last, first) = match name.split_once(',') {
            Some((l, f)) => (l.trim().to_string(), f.trim().to_string()),
            None => (name.clone(), String::new()),
        };
        Self {
            name,
            first_name: first,
            last_name: last,
            r_year,
            pathways: Pathways::NONE,
            history: HashMap::new(),
            sampler_prefs: None,
            track_prefs: None,
            section_prefs: None,
            airp_prefs: None,
            fse_prefs: None,
            zir_blocks: Vec::new(),
            no_call_weeks: Vec::new(),
            research_months: 0,
            cep_months: 0,
            supplementary_funding: false,
            recommended_blocks: HashMap::new(),
            deficient_sections: Vec::new(),
            ir_over_christmas: false,
            harsh_r2_year: false,
            vacation_dates: Vec::new(),
            academic_dates: Vec::new(),
            leave_info: String::new(),
        }
    }

    /// Sets the pathway flags.
    pub fn with_pathways(mut self, pathways: Pathways) -> Self {
        self.pathways = pathways;
        self
    }

    /// Adds historical weeks for a rotation code.
    pub fn with_history(mut self, code: impl Into<String>, weeks: f64) -> Self {
        self.history.insert(code.into(), weeks);
        self
    }

    /// Historical weeks for a rotation code.
    pub fn history_weeks(&self, code: &str) -> f64 {
        self.history.get(code).copied().unwrap_or(0.0)
    }

    /// Historical weeks summed over a qualifying code set.
    pub fn history_weeks_in(&self, codes: &[&str]) -> f64 {
        codes.iter().map(|c| self.history_weeks(c)).sum()
    }

    /// Historical weeks credited to a section.
    pub fn history_weeks_for_section(&self, section: Section) -> f64 {
        self.history_weeks_in(super::qualifying_codes(section))
    }

    /// Whether the resident's NF preference forbids the given week.
    #[inline]
    pub fn no_call(&self, week: usize) -> bool {
        self.no_call_weeks.contains(&week)
    }
}
