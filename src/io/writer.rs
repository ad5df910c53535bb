//! Schedule writer.
//!
//! The input workbook is never modified: the writer copies it
//! byte-for-byte to the output path (macros and untouched formulas
//! survive trivially) and emits the two computed grids — the base
//! schedule and the NF overlay — as aligned sidecar tables the workbook
//! ingests. The NF overlay is additionally cached as JSON so a
//! "reset NF" pass can restore the formula cells it replaced.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::models::{ScheduleGrid, WEEKS};

/// Cached NF overlay, persisted beside the output workbook.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct NfCache {
    /// Resident name → (week → NF code).
    pub cells: BTreeMap<String, BTreeMap<usize, String>>,
}

/// Writes the finished schedule.
pub struct ScheduleWriter {
    output: PathBuf,
}

impl ScheduleWriter {
    /// Copies the source workbook to the output path.
    ///
    /// Refuses to target the input file itself: builds always write a
    /// copy.
    pub fn create(source: &Path, output: Option<&Path>) -> Result<Self> {
        let output = match output {
            Some(p) => p.to_path_buf(),
            None => {
                let stem = source
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("schedule");
                let ext = source.extension().and_then(|e| e.to_str()).unwrap_or("xlsm");
                source.with_file_name(format!("{stem}_output.{ext}"))
            }
        };
        if output == source {
            return Err(Error::data(
                "output path equals input path; the input is never overwritten",
            ));
        }
        fs::copy(source, &output)?;
        Ok(Self { output })
    }

    /// Output workbook path.
    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// Writes the base schedule sidecar: one row per resident, the 52
    /// weekly rotation codes in workbook column order (D-BC).
    pub fn write_base_schedule(&self, grid: &ScheduleGrid) -> Result<PathBuf> {
        let path = self.sidecar("base_schedule.csv");
        let mut lines = Vec::with_capacity(grid.names().len() + 1);

        let header: Vec<String> = std::iter::once("Resident".to_string())
            .chain((1..=WEEKS).map(|w| format!("W{w}")))
            .collect();
        lines.push(header.join(","));

        for name in grid.names() {
            let mut fields = vec![csv_escape(name)];
            for week in 0..WEEKS {
                fields.push(grid.base(name, week).unwrap_or("").to_string());
            }
            lines.push(fields.join(","));
        }

        fs::write(&path, lines.join("\n") + "\n")?;
        info!(path = %path.display(), "base schedule written");
        Ok(path)
    }

    /// Writes the NF overlay sidecar and its reset cache.
    pub fn write_night_float(&self, grid: &ScheduleGrid) -> Result<PathBuf> {
        let path = self.sidecar("night_float.csv");
        let mut cache = NfCache::default();
        let mut lines = Vec::new();
        lines.push("Resident,Week,Code".to_string());

        for name in grid.names() {
            for (week, code) in grid.nf_weeks(name) {
                lines.push(format!("{},{},{}", csv_escape(name), week + 1, code));
                cache
                    .cells
                    .entry(name.clone())
                    .or_default()
                    .insert(week, code);
            }
        }

        fs::write(&path, lines.join("\n") + "\n")?;

        let cache_path = self.sidecar("night_float_cache.json");
        fs::write(
            &cache_path,
            serde_json::to_string_pretty(&cache).expect("cache serializes"),
        )?;
        info!(path = %path.display(), "night float written");
        Ok(path)
    }

    fn sidecar(&self, suffix: &str) -> PathBuf {
        let stem = self
            .output
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("schedule");
        self.output.with_file_name(format!("{stem}_{suffix}"))
    }
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Phase;

    fn sample_grid() -> ScheduleGrid {
        let names = vec!["Doe, Jane".to_string()];
        let mut grid = ScheduleGrid::new(&names).unwrap();
        grid.begin_phase(Phase::R3Builder);
        grid.assign("Doe, Jane", 0, "Mnuc").unwrap();
        grid.assign_nf("Doe, Jane", 4, "Mnf").unwrap();
        grid
    }

    #[test]
    fn test_input_is_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.xlsm");
        fs::write(&source, b"workbook-bytes").unwrap();

        assert!(ScheduleWriter::create(&source, Some(&source)).is_err());
    }

    #[test]
    fn test_copy_preserves_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.xlsm");
        fs::write(&source, b"macro-laden-bytes").unwrap();

        let writer = ScheduleWriter::create(&source, None).unwrap();
        let copied = fs::read(writer.output_path()).unwrap();
        assert_eq!(copied, b"macro-laden-bytes");
        assert!(writer
            .output_path()
            .to_string_lossy()
            .contains("in_output"));
    }

    #[test]
    fn test_sidecars_written() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.xlsm");
        fs::write(&source, b"x").unwrap();
        let out = dir.path().join("out.xlsm");

        let writer = ScheduleWriter::create(&source, Some(&out)).unwrap();
        let grid = sample_grid();

        let base = writer.write_base_schedule(&grid).unwrap();
        let content = fs::read_to_string(base).unwrap();
        assert!(content.starts_with("Resident,W1,"));
        assert!(content.contains("\"Doe, Jane\",Mnuc"));

        let nf = writer.write_night_float(&grid).unwrap();
        let content = fs::read_to_string(nf).unwrap();
        assert!(content.contains("\"Doe, Jane\",5,Mnf"));

        // The reset cache round-trips.
        let cache: NfCache = serde_json::from_str(
            &fs::read_to_string(dir.path().join("out_night_float_cache.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(cache.cells["Doe, Jane"][&4], "Mnf");
    }
}
