//! The shared schedule grid.
//!
//! A dense (resident × 52 weeks) matrix of rotation cells plus a
//! night-float overlay. The grid is the single mutable resource of the
//! pipeline: each phase announces itself with [`ScheduleGrid::begin_phase`]
//! and may only write cells that no earlier phase has written. Violations
//! are rejected at the grid boundary rather than asserted at call sites.
//!
//! The NF overlay is kept separate from base cells so graduation
//! accounting can exclude NF weeks and so a "reset NF" pass can restore
//! the base schedule untouched.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::calendar::{BlockCalendar, WEEKS};
use crate::error::{Error, Result};

/// Placeholder code for R1 sampler cells, resolved after NF placement.
pub const MSAMP: &str = "Msamp";

/// Pipeline phases, in execution order. Lock owners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    R1Tracks,
    R2Tracks,
    R3Builder,
    R4Builder,
    NightFloat,
    Sampler,
}

impl Phase {
    /// Short name used in lock-violation errors and logs.
    pub fn name(self) -> &'static str {
        match self {
            Phase::R1Tracks => "r1-tracks",
            Phase::R2Tracks => "r2-tracks",
            Phase::R3Builder => "r3-builder",
            Phase::R4Builder => "r4-builder",
            Phase::NightFloat => "night-float",
            Phase::Sampler => "sampler",
        }
    }
}

/// A written base cell: rotation code plus the phase that wrote it.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Cell {
    code: String,
    owner: Phase,
}

/// The master schedule grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleGrid {
    /// Resident names in roster order (row index = position here).
    names: Vec<String>,
    index: HashMap<String, usize>,
    /// Base cells, `rows[resident][week]`.
    rows: Vec<Vec<Option<Cell>>>,
    /// Night-float overlay, (row, week) → NF code.
    nf: HashMap<(usize, usize), String>,
    /// Phase currently holding write access.
    current: Option<Phase>,
}

impl ScheduleGrid {
    /// Creates an empty grid for the given roster.
    ///
    /// Duplicate names are a data-integrity failure: the name is the
    /// identity key for every downstream consumer.
    pub fn new(names: &[String]) -> Result<Self> {
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(Error::data(format!("duplicate resident name: {name}")));
            }
        }
        Ok(Self {
            names: names.to_vec(),
            index,
            rows: vec![vec![None; WEEKS]; names.len()],
            nf: HashMap::new(),
            current: None,
        })
    }

    /// Declares the phase that owns subsequent writes.
    pub fn begin_phase(&mut self, phase: Phase) {
        self.current = Some(phase);
    }

    /// Resident names in roster order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    fn row_of(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| Error::data(format!("unknown resident: {name}")))
    }

    /// Writes a base cell. Fails if the cell was written by an earlier
    /// phase, or if no phase is active.
    pub fn assign(&mut self, name: &str, week: usize, code: &str) -> Result<()> {
        let phase = self
            .current
            .ok_or_else(|| Error::data("no active phase for grid write"))?;
        let row = self.row_of(name)?;
        if week >= WEEKS {
            return Err(Error::data(format!("week {week} out of range")));
        }
        if let Some(cell) = &self.rows[row][week] {
            if cell.owner != phase {
                return Err(Error::LockedCell {
                    resident: name.to_string(),
                    week,
                    owner: cell.owner.name(),
                });
            }
        }
        self.rows[row][week] = Some(Cell {
            code: code.to_string(),
            owner: phase,
        });
        Ok(())
    }

    /// Writes a rotation code across every week of a block.
    pub fn assign_block(&mut self, name: &str, block: usize, code: &str) -> Result<()> {
        for week in BlockCalendar::weeks_of_block(block) {
            self.assign(name, week, code)?;
        }
        Ok(())
    }

    /// Rewrites a cell whose current content matches `expected`.
    ///
    /// This is the sampler's path: `Msamp` placeholders written by the
    /// R1 phase are replaced late, and only those.
    pub fn rewrite(&mut self, name: &str, week: usize, expected: &str, code: &str) -> Result<()> {
        let phase = self
            .current
            .ok_or_else(|| Error::data("no active phase for grid write"))?;
        let row = self.row_of(name)?;
        match &self.rows[row][week] {
            Some(cell) if cell.code == expected => {
                self.rows[row][week] = Some(Cell {
                    code: code.to_string(),
                    owner: phase,
                });
                Ok(())
            }
            Some(cell) => Err(Error::data(format!(
                "rewrite of {name} week {week}: expected {expected}, found {}",
                cell.code
            ))),
            None => Err(Error::data(format!(
                "rewrite of {name} week {week}: cell is empty"
            ))),
        }
    }

    /// Writes a night-float overlay cell.
    pub fn assign_nf(&mut self, name: &str, week: usize, code: &str) -> Result<()> {
        let row = self.row_of(name)?;
        if week >= WEEKS {
            return Err(Error::data(format!("week {week} out of range")));
        }
        self.nf.insert((row, week), code.to_string());
        Ok(())
    }

    /// Clears the entire NF overlay (the "reset NF" operation).
    pub fn reset_nf(&mut self) {
        self.nf.clear();
    }

    /// Base cell content (ignores NF overlay).
    pub fn base(&self, name: &str, week: usize) -> Option<&str> {
        let row = *self.index.get(name)?;
        self.rows[row][week].as_ref().map(|c| c.code.as_str())
    }

    /// Effective cell content: NF overlay wins over base.
    pub fn effective(&self, name: &str, week: usize) -> Option<&str> {
        let row = *self.index.get(name)?;
        if let Some(code) = self.nf.get(&(row, week)) {
            return Some(code.as_str());
        }
        self.rows[row][week].as_ref().map(|c| c.code.as_str())
    }

    /// NF overlay cell, if any.
    pub fn nf_code(&self, name: &str, week: usize) -> Option<&str> {
        let row = *self.index.get(name)?;
        self.nf.get(&(row, week)).map(String::as_str)
    }

    /// All NF assignments for a resident, sorted by week.
    pub fn nf_weeks(&self, name: &str) -> Vec<(usize, String)> {
        let Some(&row) = self.index.get(name) else {
            return Vec::new();
        };
        let mut out: Vec<(usize, String)> = self
            .nf
            .iter()
            .filter(|((r, _), _)| *r == row)
            .map(|((_, w), code)| (*w, code.clone()))
            .collect();
        out.sort();
        out
    }

    /// Whether any week of a block is written for a resident.
    pub fn block_occupied(&self, name: &str, block: usize) -> bool {
        BlockCalendar::weeks_of_block(block).any(|w| self.base(name, w).is_some())
    }

    /// Blocks with no written cell for a resident, ascending.
    pub fn free_blocks(&self, name: &str) -> Vec<usize> {
        (1..=super::calendar::BLOCKS)
            .filter(|&b| !self.block_occupied(name, b))
            .collect()
    }

    /// Base codes across a block for a resident (empty cells skipped).
    pub fn block_codes(&self, name: &str, block: usize) -> Vec<String> {
        BlockCalendar::weeks_of_block(block)
            .filter_map(|w| self.base(name, w).map(str::to_string))
            .collect()
    }

    /// Effective (resident, code) pairs for one week.
    pub fn week_assignments(&self, week: usize) -> Vec<(String, String)> {
        self.names
            .iter()
            .filter_map(|name| {
                self.effective(name, week)
                    .map(|code| (name.clone(), code.to_string()))
            })
            .collect()
    }

    /// Residents whose effective assignment in `week` is in `codes`.
    pub fn staffing_count(&self, week: usize, codes: &[&str]) -> usize {
        self.names
            .iter()
            .filter(|name| {
                self.effective(name, week)
                    .is_some_and(|code| codes.contains(&code))
            })
            .count()
    }

    /// Base weeks per rotation code for a resident.
    pub fn code_weeks(&self, name: &str, code: &str) -> usize {
        (0..WEEKS)
            .filter(|&w| self.base(name, w) == Some(code))
            .count()
    }

    /// Base weeks summed over a code set for a resident.
    pub fn code_weeks_in(&self, name: &str, codes: &[&str]) -> usize {
        codes.iter().map(|c| self.code_weeks(name, c)).sum()
    }

    /// Unassigned base weeks for a resident.
    pub fn unassigned_weeks(&self, name: &str) -> Vec<usize> {
        (0..WEEKS)
            .filter(|&w| self.base(name, w).is_none())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_for(names: &[&str]) -> ScheduleGrid {
        let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        ScheduleGrid::new(&names).unwrap()
    }

    #[test]
    fn test_duplicate_roster_name_rejected() {
        let names = vec!["A, B".to_string(), "A, B".to_string()];
        assert!(matches!(
            ScheduleGrid::new(&names),
            Err(Error::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_assign_requires_active_phase() {
        let mut g = grid_for(&["Doe, Jane"]);
        assert!(g.assign("Doe, Jane", 0, "Mnuc").is_err());
        g.begin_phase(Phase::R3Builder);
        assert!(g.assign("Doe, Jane", 0, "Mnuc").is_ok());
        assert_eq!(g.base("Doe, Jane", 0), Some("Mnuc"));
    }

    #[test]
    fn test_cross_phase_lock() {
        let mut g = grid_for(&["Doe, Jane"]);
        g.begin_phase(Phase::R3Builder);
        g.assign("Doe, Jane", 4, "AIRP").unwrap();

        // Same phase may revise its own cells.
        g.assign("Doe, Jane", 4, "LC").unwrap();

        // A later phase may not.
        g.begin_phase(Phase::NightFloat);
        let err = g.assign("Doe, Jane", 4, "Mnf").unwrap_err();
        assert!(matches!(err, Error::LockedCell { week: 4, .. }));
    }

    #[test]
    fn test_rewrite_only_expected_content() {
        let mut g = grid_for(&["Doe, Jane"]);
        g.begin_phase(Phase::R1Tracks);
        g.assign("Doe, Jane", 8, MSAMP).unwrap();
        g.assign("Doe, Jane", 9, "Mb").unwrap();

        g.begin_phase(Phase::Sampler);
        g.rewrite("Doe, Jane", 8, MSAMP, "Pcbi").unwrap();
        assert_eq!(g.base("Doe, Jane", 8), Some("Pcbi"));

        assert!(g.rewrite("Doe, Jane", 9, MSAMP, "Pcbi").is_err());
        assert!(g.rewrite("Doe, Jane", 10, MSAMP, "Pcbi").is_err());
    }

    #[test]
    fn test_nf_overlay_wins_but_base_preserved() {
        let mut g = grid_for(&["Doe, Jane"]);
        g.begin_phase(Phase::R3Builder);
        g.assign("Doe, Jane", 10, "Mnuc").unwrap();
        g.assign_nf("Doe, Jane", 10, "Mnf").unwrap();

        assert_eq!(g.effective("Doe, Jane", 10), Some("Mnf"));
        assert_eq!(g.base("Doe, Jane", 10), Some("Mnuc"));

        g.reset_nf();
        assert_eq!(g.effective("Doe, Jane", 10), Some("Mnuc"));
    }

    #[test]
    fn test_block_helpers() {
        let mut g = grid_for(&["Doe, Jane"]);
        g.begin_phase(Phase::R4Builder);
        g.assign_block("Doe, Jane", 2, "Pcbi").unwrap();

        assert!(g.block_occupied("Doe, Jane", 2));
        assert!(!g.block_occupied("Doe, Jane", 3));
        assert_eq!(g.code_weeks("Doe, Jane", "Pcbi"), 4);

        let free = g.free_blocks("Doe, Jane");
        assert!(!free.contains(&2));
        assert_eq!(free.len(), 12);
    }

    #[test]
    fn test_staffing_count() {
        let mut g = grid_for(&["A, A", "B, B", "C, C"]);
        g.begin_phase(Phase::R3Builder);
        g.assign("A, A", 0, "Mai").unwrap();
        g.assign("B, B", 0, "Mai").unwrap();
        g.assign("C, C", 0, "Mus").unwrap();

        assert_eq!(g.staffing_count(0, &["Mai"]), 2);
        assert_eq!(g.staffing_count(0, &["Mai", "Mus"]), 3);
        // NF pulls the resident out of the base count.
        g.assign_nf("A, A", 0, "Mnf").unwrap();
        assert_eq!(g.staffing_count(0, &["Mai"]), 1);
    }
}
