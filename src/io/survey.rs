//! Preference-survey parser.
//!
//! Maps the cleaned survey workbook (one sheet per class, header row
//! first) onto resident preference records. Rows are matched to the
//! roster by name in several formats ("First Last", "Last, First", or
//! a bare last-name containment fallback). Missing or unparseable
//! cells are logged and skipped — survey noise is never fatal.

use std::collections::HashMap;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Datelike, Duration, Weekday};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{
    AirpPrefs, BlockCalendar, FsePrefs, Pathways, Resident, SamplerPrefs, SectionPrefs, TrackPrefs,
};

/// Rotation columns ranked by R1s for the sampler bundle.
const R1_SAMPLER_COLS: [&str; 5] = ["Nir", "Mir", "Msk", "Mnuc", "Mucic"];
/// Rotation columns carrying TOP/BOTTOM scores in the R3 sheet.
const R3_SECTION_COLS: [&str; 13] = [
    "Mnuc", "Mucic", "Mai", "Mus", "Peds", "Mch", "Mb", "Sbi", "Smr", "Ser", "Vnuc", "Pcbi", "Zir",
];

/// The survey workbook, read into per-sheet keyed rows.
pub struct Survey {
    sheets: HashMap<String, Vec<HashMap<String, String>>>,
}

impl Survey {
    /// Opens and reads the survey file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut wb =
            open_workbook_auto(path.as_ref()).map_err(|e| Error::Workbook(e.to_string()))?;

        let mut sheets = HashMap::new();
        for name in wb.sheet_names().to_owned() {
            let range = wb
                .worksheet_range(&name)
                .map_err(|e| Error::Workbook(format!("{name}: {e}")))?;
            let mut rows = range.rows();
            let Some(header) = rows.next() else {
                sheets.insert(name, Vec::new());
                continue;
            };
            let headers: Vec<String> = header.iter().map(cell_str).collect();

            let keyed = rows
                .filter(|row| row.iter().any(|c| !matches!(c, Data::Empty)))
                .map(|row| {
                    headers
                        .iter()
                        .zip(row.iter())
                        .filter(|(h, _)| !h.is_empty())
                        .map(|(h, c)| (h.clone(), cell_str(c)))
                        .collect()
                })
                .collect();
            sheets.insert(name, keyed);
        }

        Ok(Self { sheets })
    }

    /// Parses every class sheet onto the roster. Runs before the recs
    /// tab so the authoritative pathway flags override these.
    pub fn apply(&self, residents: &mut [Resident], calendar: &BlockCalendar) {
        self.apply_r1(residents);
        self.apply_r2(residents);
        self.apply_r3(residents);
        self.apply_r4(residents);
        self.apply_no_call(residents, calendar);
    }

    fn rows(&self, sheet: &str) -> &[HashMap<String, String>] {
        self.sheets.get(sheet).map(Vec::as_slice).unwrap_or(&[])
    }

    fn apply_r1(&self, residents: &mut [Resident]) {
        for row in self.rows("R1 Rotations") {
            let Some(res) = find_resident(residents, row, 1) else {
                continue;
            };
            let mut rankings = HashMap::new();
            for code in R1_SAMPLER_COLS {
                if let Some(rank) = row.get(code).and_then(|v| parse_rank(v)) {
                    rankings.insert(code.to_string(), rank);
                }
            }
            res.sampler_prefs = Some(SamplerPrefs { rankings });
            copy_annotations(res, row);
        }
    }

    fn apply_r2(&self, residents: &mut [Resident]) {
        for row in self.rows("R2 Rotations") {
            let Some(res) = find_resident(residents, row, 2) else {
                continue;
            };

            // "Track Rank" carries the comma-separated track order.
            let mut rankings = HashMap::new();
            if let Some(raw) = row.get("Track Rank") {
                for (position, token) in raw.split(',').map(str::trim).enumerate() {
                    match token.parse::<usize>() {
                        Ok(track) => {
                            rankings.insert(track, position as u32 + 1);
                        }
                        Err(_) if !token.is_empty() => {
                            warn!(resident = %res.name, %token, "unparseable track rank token");
                        }
                        Err(_) => {}
                    }
                }
            }
            res.track_prefs = Some(TrackPrefs { rankings });

            if let Some(raw) = row.get("Specialty Pathway Interest") {
                res.pathways.merge(parse_pathway_interest(raw));
            }
            copy_annotations(res, row);
        }
    }

    fn apply_r3(&self, residents: &mut [Resident]) {
        for row in self.rows("R3 Rotations") {
            let Some(res) = find_resident(residents, row, 3) else {
                continue;
            };

            // TOP 1..3 → +3..+1, BOTTOM 1..3 → -3..-1.
            let mut scores = HashMap::new();
            for code in R3_SECTION_COLS {
                let Some(raw) = row.get(code).filter(|v| !v.is_empty()) else {
                    continue;
                };
                let lower = raw.to_lowercase();
                let Some(rank) = parse_rank(raw) else {
                    continue;
                };
                if lower.contains("top") || raw.starts_with('#') {
                    scores.insert(code.to_string(), 4 - rank as i32);
                } else if lower.contains("bottom") {
                    scores.insert(code.to_string(), -(4 - rank as i32));
                }
            }
            res.section_prefs = Some(SectionPrefs { scores });

            // Zir block preferences: comma-separated block numbers.
            if let Some(raw) = row.get("Zir block pref") {
                res.zir_blocks = raw
                    .split(',')
                    .filter_map(|t| t.trim().parse().ok())
                    .collect();
            }

            // AIRP session rankings: comma-separated session ids in
            // preference order.
            let mut airp = AirpPrefs::default();
            if let Some(raw) = row.get("AIRP block rank") {
                for (position, token) in raw
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .enumerate()
                {
                    airp.rankings.insert(token.to_string(), position as u32 + 1);
                }
            }
            if let Some(raw) = row.get("AIRP group") {
                airp.group_requests = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            res.airp_prefs = Some(airp);

            if let Some(raw) = row.get("Specialty Pathway Interest") {
                res.pathways.merge(parse_pathway_interest(raw));
            }
            copy_annotations(res, row);
        }
    }

    fn apply_r4(&self, residents: &mut [Resident]) {
        for row in self.rows("R4 Rotations") {
            let Some(res) = find_resident(residents, row, 4) else {
                continue;
            };

            let specialties: Vec<String> = row
                .get("FSE")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            if !specialties.is_empty() {
                res.fse_prefs = Some(FsePrefs {
                    specialties,
                    organization: row
                        .get("Distribution Pref")
                        .or_else(|| row.get("FSE/Rotation Pref"))
                        .cloned()
                        .unwrap_or_default(),
                });
            }

            res.research_months = row
                .get("Research Months")
                .and_then(|v| parse_count(v))
                .unwrap_or(0);
            res.cep_months = row.get("CEP Months").and_then(|v| parse_count(v)).unwrap_or(0);
            res.supplementary_funding = row
                .get("Supplementary Funding")
                .is_some_and(|v| super::is_marked(v));

            // Explicit pathway columns (advisory; recs tab overrides).
            let flags = Pathways {
                t32: row.get("T32").is_some_and(|v| super::is_marked(v)),
                esir: row.get("ESIR").is_some_and(|v| super::is_marked(v)),
                esnr: row.get("ESNR").is_some_and(|v| super::is_marked(v)),
                nrdr: row.get("NRDR").is_some_and(|v| super::is_marked(v)),
            };
            res.pathways.merge(flags);
            copy_annotations(res, row);
        }
    }

    /// `No Call Pref`: comma-separated `MM/DD` dates per resident,
    /// inclusive of the Monday following a no-call weekend.
    fn apply_no_call(&self, residents: &mut [Resident], calendar: &BlockCalendar) {
        for row in self.rows("No Call Pref") {
            let Some(res) = find_resident_any_year(residents, row) else {
                continue;
            };
            let Some(raw) = row.get("NO NF ASSIGNMENTS").filter(|v| !v.is_empty()) else {
                continue;
            };
            // Some exports prefix the list with "Name:".
            let list = raw.split_once(':').map(|(_, l)| l).unwrap_or(raw);

            let mut weeks = Vec::new();
            for token in list.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                let Some((m, d)) = parse_month_day(token) else {
                    warn!(resident = %res.name, %token, "unparseable no-call date");
                    continue;
                };
                let Some(date) = calendar.resolve_month_day(m, d) else {
                    warn!(resident = %res.name, %token, "no-call date outside calendar");
                    continue;
                };
                if let Some(w) = calendar.week_of_date(date) {
                    weeks.push(w);
                }
                // A no-call weekend protects the following Monday too.
                if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                    let days_to_monday =
                        (8 - date.weekday().num_days_from_sunday() as i64) % 7;
                    let monday = date + Duration::days(days_to_monday.max(1));
                    if let Some(w) = calendar.week_of_date(monday) {
                        weeks.push(w);
                    }
                }
            }
            weeks.sort_unstable();
            weeks.dedup();
            debug!(resident = %res.name, ?weeks, "no-call weeks");
            res.no_call_weeks = weeks;
        }
    }
}

fn cell_str(c: &Data) -> String {
    match c {
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => {
            if (f.floor() - f).abs() < f64::EPSILON {
                format!("{}", *f as i64)
            } else {
                format!("{f}")
            }
        }
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(d) => d.to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Empty | Data::Error(_) => String::new(),
    }
}

/// Parses "#3", "3", "TOP 2" style rank cells.
fn parse_rank(v: &str) -> Option<u32> {
    let cleaned: String = v.chars().filter(|c| c.is_ascii_digit()).collect();
    cleaned.parse().ok()
}

fn parse_count(v: &str) -> Option<u32> {
    v.trim().parse().ok().or_else(|| parse_rank(v))
}

/// Parses an `MM/DD` token.
fn parse_month_day(token: &str) -> Option<(u32, u32)> {
    let (m, d) = token.split_once('/')?;
    Some((m.trim().parse().ok()?, d.trim().parse().ok()?))
}

/// "ESIR, T32" style free-text pathway interest.
fn parse_pathway_interest(raw: &str) -> Pathways {
    let upper = raw.to_uppercase();
    Pathways {
        esir: upper.contains("ESIR"),
        esnr: upper.contains("ESNR"),
        t32: upper.contains("T32"),
        nrdr: upper.contains("NRDR") || upper.contains("NR/DR") || upper.contains("NR-DR"),
    }
}

/// Name from a survey row, trying the common column layouts.
fn row_name(row: &HashMap<String, String>) -> String {
    for key in ["Full Name", "Name"] {
        if let Some(v) = row.get(key).filter(|v| !v.is_empty()) {
            return v.clone();
        }
    }
    let first = row.get("First Name").cloned().unwrap_or_default();
    let last = row.get("Last Name").cloned().unwrap_or_default();
    format!("{first} {last}").trim().to_string()
}

fn matches_resident(res: &Resident, name: &str) -> bool {
    if res.name == name {
        return true;
    }
    let first_last = format!("{} {}", res.first_name, res.last_name);
    if first_last == name {
        return true;
    }
    !res.last_name.is_empty() && name.contains(res.last_name.as_str())
}

fn find_resident<'a>(
    residents: &'a mut [Resident],
    row: &HashMap<String, String>,
    r_year: u8,
) -> Option<&'a mut Resident> {
    let name = row_name(row);
    if name.is_empty() {
        return None;
    }
    let found = residents
        .iter_mut()
        .filter(|r| r.r_year == r_year)
        .find(|r| matches_resident(r, &name));
    if found.is_none() {
        warn!(%name, r_year, "survey row matches no roster resident");
    }
    found
}

fn find_resident_any_year<'a>(
    residents: &'a mut [Resident],
    row: &HashMap<String, String>,
) -> Option<&'a mut Resident> {
    let name = row_name(row);
    if name.is_empty() {
        return None;
    }
    residents.iter_mut().find(|r| matches_resident(r, &name))
}

/// Vacation / academic / leave cells are carried for the reviewer.
fn copy_annotations(res: &mut Resident, row: &HashMap<String, String>) {
    if let Some(v) = row.get("Vac").filter(|v| !v.is_empty()) {
        res.vacation_dates.push(v.clone());
    }
    if let Some(v) = row.get("Acad").filter(|v| !v.is_empty()) {
        res.academic_dates.push(v.clone());
    }
    if let Some(v) = row.get("Leave").filter(|v| !v.is_empty()) {
        res.leave_info = v.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rank_variants() {
        assert_eq!(parse_rank("#3"), Some(3));
        assert_eq!(parse_rank("3"), Some(3));
        assert_eq!(parse_rank("TOP 2"), Some(2));
        assert_eq!(parse_rank(""), None);
        assert_eq!(parse_rank("n/a"), None);
    }

    #[test]
    fn test_parse_month_day() {
        assert_eq!(parse_month_day("12/25"), Some((12, 25)));
        assert_eq!(parse_month_day(" 1/5 "), Some((1, 5)));
        assert_eq!(parse_month_day("christmas"), None);
    }

    #[test]
    fn test_pathway_interest_parsing() {
        let p = parse_pathway_interest("ESIR, maybe T32");
        assert!(p.esir && p.t32);
        assert!(!p.nrdr && !p.esnr);

        let p = parse_pathway_interest("NR/DR pathway");
        assert!(p.nrdr);
    }

    #[test]
    fn test_name_matching_formats() {
        let res = Resident::new("Curie, Marie", 3);
        assert!(matches_resident(&res, "Curie, Marie"));
        assert!(matches_resident(&res, "Marie Curie"));
        assert!(matches_resident(&res, "Dr. Marie Curie"));
        assert!(!matches_resident(&res, "Pierre Dupont"));
    }

    #[test]
    fn test_weekend_no_call_extends_to_monday() {
        // 2024-2025 year; Saturday Dec 14 2024 is week containing it,
        // and the following Monday lands in the next week.
        let calendar = BlockCalendar::for_year(2024);
        let mut res = Resident::new("Curie, Marie", 2);
        let mut residents = vec![res.clone()];

        let mut row = HashMap::new();
        row.insert("Name".to_string(), "Curie, Marie".to_string());
        row.insert("NO NF ASSIGNMENTS".to_string(), "12/14".to_string());

        let survey = Survey {
            sheets: [("No Call Pref".to_string(), vec![row])].into_iter().collect(),
        };
        survey.apply_no_call(&mut residents, &calendar);
        res = residents.pop().unwrap();

        let sat = calendar
            .week_of_date(chrono::NaiveDate::from_ymd_opt(2024, 12, 14).unwrap())
            .unwrap();
        let mon = calendar
            .week_of_date(chrono::NaiveDate::from_ymd_opt(2024, 12, 16).unwrap())
            .unwrap();
        assert!(res.no_call_weeks.contains(&sat));
        assert!(res.no_call_weeks.contains(&mon));
    }
}
