//! Rotation catalog: codes, sections, and hospital systems.
//!
//! A rotation code is a short symbolic identifier (`Mnuc`, `Sbi`,
//! `Pcbi`, ...) read from the workbook's `Key` tab. Each code maps to a
//! clinical section (for graduation accounting) and a hospital system
//! (for the block-exclusivity invariant).
//!
//! # Hospital systems
//! The exclusivity constraint is about payroll. UCSF covers both
//! Moffitt/Mission Bay and Parnassus/China Basin, so `P`-prefix codes
//! collapse to UCSF rather than forming their own system. Only
//! UCSF vs ZSFG vs VA are truly distinct; anything else is `Other`
//! and never conflicts.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A payroll-distinct hospital system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HospitalSystem {
    /// UCSF (Moffitt/Mission Bay and Parnassus/China Basin).
    Ucsf,
    /// Zuckerberg San Francisco General.
    Zsfg,
    /// Veterans Affairs.
    Va,
    /// Non-clinical or system-neutral (never conflicts).
    Other,
}

/// Clinical section used for graduation accounting and deficit analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Section {
    NucMed,
    Breast,
    Neuro,
    Abdominal,
    Ultrasound,
    Chest,
    Msk,
    Peds,
    Ir,
    Admin,
}

/// A rotation code from the `Key` tab.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationCode {
    /// Short symbolic identifier (e.g. "Mnuc").
    pub code: String,
    /// Human-readable label from the workbook.
    pub label: String,
    /// Clinical section, if the code credits one.
    pub section: Option<Section>,
    /// Radiology years (1-4) that may take this rotation.
    pub eligible_years: Vec<u8>,
    /// Whether this code participates in night-float accounting.
    pub night_float: bool,
}

impl RotationCode {
    /// Creates a rotation code with no eligibility.
    pub fn new(code: impl Into<String>) -> Self {
        let code = code.into();
        let section = section_of(&code);
        let night_float = is_night_float(&code);
        Self {
            code,
            label: String::new(),
            section,
            eligible_years: Vec::new(),
            night_float,
        }
    }

    /// Sets the human-readable label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Marks the given radiology years as eligible.
    pub fn with_years(mut self, years: &[u8]) -> Self {
        self.eligible_years = years.to_vec();
        self
    }

    /// Whether the given radiology year may take this rotation.
    #[inline]
    pub fn eligible(&self, r_year: u8) -> bool {
        self.eligible_years.contains(&r_year)
    }

    /// Hospital system for this code.
    #[inline]
    pub fn hospital_system(&self) -> HospitalSystem {
        hospital_system(&self.code)
    }
}

/// Catalog of all rotation codes, keyed by code string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RotationCatalog {
    codes: HashMap<String, RotationCode>,
}

impl RotationCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a rotation code.
    pub fn insert(&mut self, code: RotationCode) {
        self.codes.insert(code.code.clone(), code);
    }

    /// Looks up a code.
    pub fn get(&self, code: &str) -> Option<&RotationCode> {
        self.codes.get(code)
    }

    /// Whether the catalog knows this code.
    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains_key(code)
    }

    /// Whether a radiology year may take a rotation.
    ///
    /// Unknown codes and Key rows without eligibility markers are
    /// permitted — the catalog restricts only what it explicitly
    /// marks, so administrative codes (`AIRP`, `LC`, `Res`) pass.
    pub fn allows(&self, code: &str, r_year: u8) -> bool {
        self.get(code)
            .map_or(true, |rc| rc.eligible_years.is_empty() || rc.eligible(r_year))
    }

    /// Number of catalogued codes.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Hospital system for a rotation code string.
///
/// Encoded as a lookup on the leading letter plus explicit special
/// cases, per the payroll mapping: `P`-prefix codes (Parnassus/China
/// Basin) are UCSF, `S` codes are ZSFG, and `Peds` sits at UCSF despite
/// its spelling.
pub fn hospital_system(code: &str) -> HospitalSystem {
    if code.is_empty() {
        return HospitalSystem::Other;
    }
    // Peds would otherwise read as a P-prefix lookup on "Peds"; it is a
    // UCSF rotation either way, but keep it explicit.
    if code == "Peds" {
        return HospitalSystem::Ucsf;
    }
    match code.as_bytes()[0] {
        b'M' | b'P' => HospitalSystem::Ucsf,
        b'S' | b'Z' => HospitalSystem::Zsfg,
        b'V' => HospitalSystem::Va,
        _ => HospitalSystem::Other,
    }
}

/// Whether a code is a night-float shift.
pub fn is_night_float(code: &str) -> bool {
    matches!(code, "Snf" | "Snf2" | "Mnf" | "Sx")
}

/// Section credited by a rotation code, if any.
pub fn section_of(code: &str) -> Option<Section> {
    let s = match code {
        "Mnuc" | "Vnuc" | "Snct" | "Mnct" => Section::NucMed,
        "Pcbi" | "Sbi" | "Vb" => Section::Breast,
        "Zai" | "Smr" => Section::Neuro,
        "Mai" | "Sai" => Section::Abdominal,
        "Mus" | "Sus" => Section::Ultrasound,
        "Mch" | "Mch2" | "Sch" => Section::Chest,
        // Mb credits both Breast and MSK in graduation arithmetic; the
        // requirement tables list it under both. Its primary section
        // here is MSK.
        "Mb" | "Ser" | "Mucic" => Section::Msk,
        "Peds" => Section::Peds,
        "Mir" | "Zir" | "Sir" | "Vir" => Section::Ir,
        "Mx" | "Mc" => Section::Admin,
        _ => return None,
    };
    Some(s)
}

/// Rotation codes crediting a given section (graduation qualifying sets).
pub fn qualifying_codes(section: Section) -> &'static [&'static str] {
    match section {
        Section::NucMed => &["Mnuc", "Vnuc", "Snct", "Mnct"],
        Section::Breast => &["Pcbi", "Mb", "Sbi", "Vb"],
        Section::Neuro => &["Zai", "Smr"],
        Section::Abdominal => &["Mai", "Sai"],
        Section::Ultrasound => &["Mus", "Sus"],
        Section::Chest => &["Mch", "Mch2", "Sch"],
        Section::Msk => &["Vb", "Mb", "Ser"],
        Section::Peds => &["Peds"],
        Section::Ir => &["Mir", "Zir", "Sir", "Vir"],
        Section::Admin => &["Mx", "Mc"],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_p_prefix_collapses_to_ucsf() {
        assert_eq!(hospital_system("Pcbi"), HospitalSystem::Ucsf);
        assert_eq!(hospital_system("Pcmb"), HospitalSystem::Ucsf);
        assert_eq!(hospital_system("Mai"), HospitalSystem::Ucsf);
    }

    #[test]
    fn test_peds_is_ucsf() {
        assert_eq!(hospital_system("Peds"), HospitalSystem::Ucsf);
    }

    #[test]
    fn test_zsfg_and_va() {
        assert_eq!(hospital_system("Sir"), HospitalSystem::Zsfg);
        assert_eq!(hospital_system("Zir"), HospitalSystem::Zsfg);
        assert_eq!(hospital_system("Vnuc"), HospitalSystem::Va);
    }

    #[test]
    fn test_unknown_is_other() {
        assert_eq!(hospital_system(""), HospitalSystem::Other);
        assert_eq!(hospital_system("AIRP"), HospitalSystem::Other);
        assert_eq!(hospital_system("LC"), HospitalSystem::Other);
        assert_eq!(hospital_system("Res"), HospitalSystem::Other);
    }

    #[test]
    fn test_night_float_codes() {
        assert!(is_night_float("Mnf"));
        assert!(is_night_float("Snf2"));
        assert!(is_night_float("Sx"));
        assert!(!is_night_float("Mnuc"));
    }

    #[test]
    fn test_sections() {
        assert_eq!(section_of("Mnuc"), Some(Section::NucMed));
        assert_eq!(section_of("Mb"), Some(Section::Msk));
        assert_eq!(section_of("Zir"), Some(Section::Ir));
        assert_eq!(section_of("AIRP"), None);
    }

    #[test]
    fn test_msk_trio() {
        let msk = qualifying_codes(Section::Msk);
        assert!(msk.contains(&"Vb"));
        assert!(msk.contains(&"Mb"));
        assert!(msk.contains(&"Ser"));
    }

    #[test]
    fn test_catalog_eligibility() {
        let mut catalog = RotationCatalog::new();
        catalog.insert(RotationCode::new("Mnuc").with_years(&[2, 3, 4]));
        catalog.insert(RotationCode::new("Msamp").with_years(&[1]));

        assert!(catalog.get("Mnuc").unwrap().eligible(3));
        assert!(!catalog.get("Mnuc").unwrap().eligible(1));
        assert!(catalog.get("Msamp").unwrap().eligible(1));
        assert!(!catalog.contains("Qqq"));
    }

    #[test]
    fn test_allows_is_permissive_for_unknown_codes() {
        let mut catalog = RotationCatalog::new();
        catalog.insert(RotationCode::new("Zir").with_years(&[3, 4]));
        catalog.insert(RotationCode::new("Mc"));

        assert!(!catalog.allows("Zir", 1));
        assert!(catalog.allows("Zir", 3));
        // No markers on the Key row → unrestricted.
        assert!(catalog.allows("Mc", 1));
        // Unknown administrative codes pass.
        assert!(catalog.allows("AIRP", 3));
    }
}
