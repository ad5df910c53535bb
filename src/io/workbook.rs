//! Workbook reader.
//!
//! Loads the macro-enabled scheduling workbook through `calamine` and
//! exposes each consumed tab as domain types. Formula cells are never
//! trusted: the track grids are recomputed from their base sequences by
//! [`crate::tracks`], and only the `Overview` year cell, the roster,
//! the rotation key, the recs tab, and the staffing envelope region are
//! read as values.
//!
//! The `Historical` tab ships in two known layouts; the header row
//! decides which one applies:
//!
//! - Layout A: `A` = prior-year PGY, `B` = future PGY, `C` = resident
//! - Layout B: `A` = prior-year PGY, `B` = resident, `C..F` = pathway
//!   markers, history from `G`
//!
//! The core always works with the *target-year* level; layout B derives
//! it by incrementing the prior-year value.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{Pathways, Resident, RotationCatalog, RotationCode, StaffingBound, StaffingEnvelope};
use crate::tracks::{BaseSequence, BiweekCodes};

use super::{is_marked, normalize};

/// Converts a calamine cell to a trimmed string.
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

fn cell_f64(c: &Data) -> f64 {
    match c {
        Data::Float(f) => *f,
        Data::Int(i) => *i as f64,
        Data::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// The scheduling workbook, loaded sheet-by-sheet into string rows.
pub struct Workbook {
    path: PathBuf,
    sheets: HashMap<String, Vec<Vec<String>>>,
    raw: HashMap<String, Vec<Vec<Data>>>,
}

impl Workbook {
    /// Opens and fully reads a workbook.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut wb = open_workbook_auto(&path).map_err(|e| Error::Workbook(e.to_string()))?;

        let mut sheets = HashMap::new();
        let mut raw = HashMap::new();
        for name in wb.sheet_names().to_owned() {
            let range = wb
                .worksheet_range(&name)
                .map_err(|e| Error::Workbook(format!("{name}: {e}")))?;
            let rows: Vec<Vec<Data>> = range.rows().map(|r| r.to_vec()).collect();
            sheets.insert(
                name.clone(),
                rows.iter()
                    .map(|r| r.iter().map(cell_str).collect())
                    .collect(),
            );
            raw.insert(name, rows);
        }

        Ok(Self { path, sheets, raw })
    }

    /// Source path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sheet(&self, name: &str) -> Result<&Vec<Vec<String>>> {
        self.sheets
            .get(name)
            .ok_or_else(|| Error::data(format!("workbook tab missing: {name}")))
    }

    fn has_sheet(&self, name: &str) -> bool {
        self.sheets.contains_key(name)
    }

    /// Target academic year from the `Overview` tab (cell B5, falling
    /// back to B6 for older workbook versions).
    pub fn academic_year(&self) -> Result<i32> {
        let rows = self
            .raw
            .get("Overview")
            .ok_or_else(|| Error::data("workbook tab missing: Overview"))?;
        for row_idx in [4usize, 5] {
            if let Some(cell) = rows.get(row_idx).and_then(|r| r.get(1)) {
                let v = cell_f64(cell) as i32;
                if (2000..2100).contains(&v) {
                    return Ok(v);
                }
            }
        }
        Err(Error::data("Overview target-year cell is not set"))
    }

    /// Rotation catalog from the `Key` tab.
    pub fn rotation_catalog(&self) -> Result<RotationCatalog> {
        let rows = self.sheet("Key")?;
        let mut catalog = RotationCatalog::new();

        for row in rows.iter().skip(1) {
            let Some(code) = row.first().filter(|c| !c.is_empty()) else {
                continue;
            };
            let label = row.get(2).cloned().unwrap_or_default();
            let mut years = Vec::new();
            for (i, year) in (3..7).zip(1u8..) {
                if row.get(i).is_some_and(|c| is_marked(c)) {
                    years.push(year);
                }
            }
            catalog.insert(RotationCode::new(code).with_label(label).with_years(&years));
        }

        if catalog.is_empty() {
            return Err(Error::data("Key tab yielded no rotation codes"));
        }
        Ok(catalog)
    }

    /// Roster plus per-resident history from the `Historical` tab.
    pub fn roster(&self) -> Result<Vec<Resident>> {
        let rows = self.sheet("Historical")?;
        let layout = HistoricalLayout::detect(rows);
        debug!(?layout, "detected Historical layout");

        let mut residents: Vec<Resident> = Vec::new();
        for row in rows.iter().skip(2) {
            let name = row.get(layout.name_col).cloned().unwrap_or_default();
            let pgy_cell = row.get(layout.pgy_col).cloned().unwrap_or_default();
            if name.is_empty() || pgy_cell.is_empty() {
                continue;
            }
            let Ok(pgy) = pgy_cell.parse::<i32>() else {
                warn!(%name, %pgy_cell, "unparseable PGY cell; row skipped");
                continue;
            };
            // Column B is the target-year PGY in layout A; layout B
            // carries the prior-year level and increments.
            let target_pgy = if layout.has_future_pgy { pgy } else { pgy + 1 };
            let r_year = target_pgy - 1;
            if !(1..=4).contains(&r_year) {
                continue; // interns and graduates
            }

            if residents.iter().any(|r| r.name == name) {
                return Err(Error::data(format!("duplicate resident name: {name}")));
            }

            let mut res = Resident::new(name, r_year as u8);

            if let Some(cols) = &layout.pathway_cols {
                res.pathways = Pathways {
                    esnr: row.get(cols[0]).is_some_and(|c| is_marked(c)),
                    esir: row.get(cols[1]).is_some_and(|c| is_marked(c)),
                    t32: row.get(cols[2]).is_some_and(|c| is_marked(c)),
                    nrdr: row.get(cols[3]).is_some_and(|c| is_marked(c)),
                };
            }

            // Weekly history cells: each non-empty cell is one week of
            // the named rotation.
            for cell in row.iter().skip(layout.history_col) {
                if !cell.is_empty() && cell != "0" {
                    *res.history.entry(cell.clone()).or_default() += 1.0;
                }
            }

            residents.push(res);
        }

        if residents.is_empty() {
            return Err(Error::data("Historical tab yielded no residents"));
        }
        Ok(residents)
    }

    /// Track base sequence from a tracks tab (`R1 Tracks`/`R2 Tracks`)
    /// plus the track count from its header labels.
    pub fn track_base(&self, tab: &str) -> Result<(BaseSequence, usize)> {
        let rows = self.sheet(tab)?;

        // Header row 6 labels the track columns "1A", "1B", "2A", ...
        let mut track_count = 0usize;
        if let Some(header) = rows.get(5) {
            for cell in header.iter().skip(6) {
                if cell.is_empty() {
                    continue;
                }
                let (num, suffix) = cell.split_at(cell.len().saturating_sub(1));
                if matches!(suffix, "A" | "B") {
                    if let Ok(n) = num.parse::<usize>() {
                        track_count = track_count.max(n);
                        continue;
                    }
                }
                if cell.parse::<usize>().is_err() {
                    break; // first non-track header ends the region
                }
            }
        }

        // Base sequence: position / biweek / code in columns A-C, rows 7+.
        let mut positions: HashMap<usize, (String, String)> = HashMap::new();
        for row in rows.iter().skip(6) {
            let (Some(pos), Some(biweek), Some(code)) = (row.first(), row.get(1), row.get(2))
            else {
                continue;
            };
            let Ok(pos) = pos.parse::<usize>() else { continue };
            if code.is_empty() {
                continue;
            }
            let entry = positions.entry(pos).or_default();
            match biweek.as_str() {
                "A" => entry.0 = code.clone(),
                "B" => entry.1 = code.clone(),
                _ => {}
            }
        }

        let len = positions.keys().copied().max().unwrap_or(0);
        let mut base = BaseSequence::default();
        for pos in 1..=len {
            let (a, b) = positions.remove(&pos).unwrap_or_default();
            let b = if b.is_empty() { a.clone() } else { b };
            base.positions.push(BiweekCodes::split(a, b));
        }

        if base.is_empty() {
            return Err(Error::data(format!("{tab}: no base sequence found")));
        }
        Ok((base, track_count))
    }

    /// Applies the authoritative `R3-4 Recs` tab: pathway flags
    /// (overriding the survey) plus recommended blocks and deficient
    /// sections.
    pub fn apply_r34_recs(&self, residents: &mut [Resident]) -> Result<()> {
        let rows = self.sheet("R3-4 Recs")?;

        // Columns I.. hold per-rotation recommended block counts.
        let rec_cols: [(usize, &str); 14] = [
            (8, "Vnuc"),
            (9, "Smr"),
            (10, "Ser"),
            (11, "Sbi"),
            (12, "Mnuc"),
            (13, "Pcbi"),
            (14, "Mch"),
            (15, "Mai"),
            (16, "Mus"),
            (17, "Mb"),
            (18, "Mucic"),
            (19, "Peds"),
            (20, "Zir"),
            (21, "Mir"),
        ];

        for row in rows.iter().skip(2) {
            let Some(name) = row.get(1).filter(|n| !n.is_empty()) else {
                continue;
            };
            let Some(res) = residents.iter_mut().find(|r| &r.name == name) else {
                warn!(%name, "R3-4 Recs row matches no roster resident");
                continue;
            };

            // Authoritative override: merge after the survey values.
            res.pathways.merge(Pathways {
                esnr: row.get(2).is_some_and(|c| is_marked(c)),
                esir: row.get(3).is_some_and(|c| is_marked(c)),
                t32: row.get(4).is_some_and(|c| is_marked(c)),
                nrdr: row.get(5).is_some_and(|c| is_marked(c)),
            });

            if let Some(cell) = row.get(7).filter(|c| !c.is_empty()) {
                res.deficient_sections = cell
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }

            for (col, code) in rec_cols {
                if let Some(cell) = row.get(col).filter(|c| !c.is_empty()) {
                    let blocks: f64 = cell.parse().unwrap_or(0.0);
                    if blocks > 0.0 {
                        res.recommended_blocks.insert(code.to_string(), blocks);
                    }
                }
            }
        }

        Ok(())
    }

    /// Staffing envelope from the `Base Schedule` envelope region
    /// (rows 101-151: label, comma-separated codes, weekly minimum).
    ///
    /// Falls back to the institutional defaults when the region is
    /// blank.
    pub fn staffing_envelope(&self) -> StaffingEnvelope {
        let Ok(rows) = self.sheet("Base Schedule") else {
            return StaffingEnvelope::standard();
        };

        let mut envelope = StaffingEnvelope::new();
        for row in rows.iter().skip(100).take(51) {
            let Some(label) = row.first().filter(|c| !c.is_empty()) else {
                continue;
            };
            let Some(codes) = row.get(1).filter(|c| !c.is_empty()) else {
                continue;
            };
            let min = row
                .get(2)
                .and_then(|c| c.parse::<u32>().ok())
                .unwrap_or(0);
            let codes: Vec<&str> = codes.split(',').map(str::trim).collect();
            envelope = envelope.with_bound(StaffingBound::at_least(label, &codes, min));
        }

        if envelope.bounds.is_empty() {
            debug!("Base Schedule envelope region blank; using defaults");
            StaffingEnvelope::standard()
        } else {
            envelope
        }
    }

    /// Base-schedule cell values for the `validate` command: resident
    /// rows 6-65, weekly codes from column D onward.
    pub fn base_schedule_cells(&self) -> Result<Vec<(String, Vec<Option<String>>)>> {
        let rows = self.sheet("Base Schedule")?;
        let mut out = Vec::new();
        for row in rows.iter().skip(5).take(60) {
            let Some(name) = row.get(1).filter(|c| !c.is_empty()) else {
                continue;
            };
            let cells = (3..3 + crate::models::WEEKS)
                .map(|i| row.get(i).filter(|c| !c.is_empty()).cloned())
                .collect();
            out.push((name.clone(), cells));
        }
        Ok(out)
    }

    /// Night-float cell values for the `validate` command: resident
    /// rows 6 onward, weekly codes from column F onward. Only the NF
    /// shift codes are returned; formula residue is ignored.
    pub fn night_float_cells(&self) -> Result<Vec<(String, Vec<(usize, String)>)>> {
        let rows = self.sheet("Night Float")?;
        let mut out = Vec::new();
        for row in rows.iter().skip(5) {
            let Some(name) = row.get(1).filter(|c| !c.is_empty()) else {
                continue;
            };
            let weeks: Vec<(usize, String)> = (0..crate::models::WEEKS)
                .filter_map(|w| {
                    row.get(5 + w)
                        .filter(|c| matches!(c.as_str(), "Mnf" | "Snf" | "Snf2" | "Sx"))
                        .map(|c| (w, c.clone()))
                })
                .collect();
            if !weeks.is_empty() {
                out.push((name.clone(), weeks));
            }
        }
        Ok(out)
    }

    /// Verifies every code in the residents' history and recs against
    /// the catalog (fail-fast data integrity).
    pub fn verify_codes(&self, residents: &[Resident], catalog: &RotationCatalog) -> Result<()> {
        // Non-clinical codes that appear in history without a Key row.
        const ADMIN_CODES: [&str; 6] = ["AIRP", "LC", "Res", "CEP", "Msamp", "Vac"];

        for res in residents {
            for code in res.history.keys().chain(res.recommended_blocks.keys()) {
                // History cells may carry free-text annotations; only
                // plausible rotation codes are enforced.
                if code.len() <= 6
                    && code.chars().all(|c| c.is_ascii_alphanumeric())
                    && !catalog.contains(code)
                    && !ADMIN_CODES.contains(&code.as_str())
                    && normalize(code).parse::<u32>().is_err()
                {
                    return Err(Error::data(format!(
                        "unknown rotation code '{code}' in data for {}",
                        res.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Detected `Historical` tab layout.
#[derive(Debug)]
struct HistoricalLayout {
    has_future_pgy: bool,
    pgy_col: usize,
    name_col: usize,
    history_col: usize,
    pathway_cols: Option<[usize; 4]>,
}

impl HistoricalLayout {
    fn detect(rows: &[Vec<String>]) -> Self {
        let header = rows.get(1);
        let has_future = header
            .and_then(|r| r.get(1))
            .is_some_and(|c| normalize(c).contains("future"));

        if has_future {
            Self {
                has_future_pgy: true,
                pgy_col: 1,
                name_col: 2,
                history_col: 3,
                pathway_cols: None,
            }
        } else {
            Self {
                has_future_pgy: false,
                pgy_col: 0,
                name_col: 1,
                history_col: 6,
                pathway_cols: Some([2, 3, 4, 5]),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_detection() {
        let layout_a = vec![
            vec![],
            vec!["PGY".to_string(), "Future PGY".to_string(), "Resident".to_string()],
        ];
        let a = HistoricalLayout::detect(&layout_a);
        assert!(a.has_future_pgy);
        assert_eq!(a.pgy_col, 1);
        assert_eq!(a.name_col, 2);

        let layout_b = vec![
            vec![],
            vec!["PGY".to_string(), "Resident".to_string(), "ESNR".to_string()],
        ];
        let b = HistoricalLayout::detect(&layout_b);
        assert!(!b.has_future_pgy);
        assert_eq!(b.name_col, 1);
        assert_eq!(b.pathway_cols, Some([2, 3, 4, 5]));
    }

    #[test]
    fn test_cell_str_floats_render_as_integers() {
        assert_eq!(cell_str(&Data::Float(3.0)), "3");
        assert_eq!(cell_str(&Data::Float(3.5)), "3.5");
        assert_eq!(cell_str(&Data::String("  Mnuc ".to_string())), "Mnuc");
        assert_eq!(cell_str(&Data::Empty), "");
    }
}
