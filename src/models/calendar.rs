//! Academic-year block calendar.
//!
//! The 52-week schedule grid is partitioned into 13 blocks. Week
//! boundaries are Sundays anchored at the night-float start date, which
//! depends on the day-of-week of July 1:
//!
//! | DOW of July 1 | NF start              | Block 1 |
//! |---------------|-----------------------|---------|
//! | Mon           | last Sunday in June   | 4 wk    |
//! | Tue / Wed     | last Sunday in June   | < 4 wk  |
//! | Thu / Fri     | first Sunday in July  | > 4 wk  |
//! | Sat / Sun     | first Sunday in July  | 4 wk    |
//!
//! Block 1 runs from July 1 to the fourth Sunday after NF start, blocks
//! 2-12 are exactly four weeks, and block 13 runs to June 30 of the
//! following year (truncated or extended by the calendar's slack).
//!
//! Grid phases use *logical* weeks (0-51, four per block); the calendar
//! maps logical weeks to dates for no-call conversion and the holiday
//! window checks.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Number of logical weeks in the schedule grid.
pub const WEEKS: usize = 52;
/// Number of blocks in the academic year.
pub const BLOCKS: usize = 13;
/// Logical weeks per block.
pub const WEEKS_PER_BLOCK: usize = 4;

/// A scheduling block with its calendar span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block number, 1-13.
    pub number: usize,
    /// First calendar day of the block.
    pub start: NaiveDate,
    /// Last calendar day of the block (inclusive).
    pub end: NaiveDate,
}

impl Block {
    /// Calendar length in days.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// The academic-year calendar: NF anchor plus 13 dated blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockCalendar {
    /// Academic year start (the year containing July 1).
    pub year: i32,
    /// Night-float anchor Sunday; logical week w starts here + 7w days.
    pub nf_start: NaiveDate,
    /// The 13 dated blocks.
    pub blocks: Vec<Block>,
}

impl BlockCalendar {
    /// Computes the calendar for the academic year starting July 1 of `year`.
    pub fn for_year(year: i32) -> Self {
        let july1 = NaiveDate::from_ymd_opt(year, 7, 1).expect("valid date");
        let nf_start = nf_start_for(july1);
        let june30_next = NaiveDate::from_ymd_opt(year + 1, 6, 30).expect("valid date");

        let mut blocks = Vec::with_capacity(BLOCKS);

        // Block 1: July 1 through the fourth Sunday boundary after NF start.
        let block2_start = nf_start + Duration::days(28);
        blocks.push(Block {
            number: 1,
            start: july1,
            end: block2_start - Duration::days(1),
        });

        // Blocks 2-12: exact four-week spans.
        let mut start = block2_start;
        for number in 2..BLOCKS {
            let end = start + Duration::days(27);
            blocks.push(Block { number, start, end });
            start = end + Duration::days(1);
        }

        // Block 13: whatever remains to June 30.
        blocks.push(Block {
            number: BLOCKS,
            start,
            end: june30_next,
        });

        Self {
            year,
            nf_start,
            blocks,
        }
    }

    /// Block containing the given logical week (0-based).
    #[inline]
    pub fn block_of_week(week: usize) -> usize {
        week / WEEKS_PER_BLOCK + 1
    }

    /// Logical weeks (0-based) of a block (1-based).
    #[inline]
    pub fn weeks_of_block(block: usize) -> std::ops::Range<usize> {
        let start = (block - 1) * WEEKS_PER_BLOCK;
        start..start + WEEKS_PER_BLOCK
    }

    /// Start date of a logical week.
    pub fn week_start(&self, week: usize) -> NaiveDate {
        self.nf_start + Duration::days(7 * week as i64)
    }

    /// Logical week containing a date, if it falls inside the year.
    pub fn week_of_date(&self, date: NaiveDate) -> Option<usize> {
        let days = (date - self.nf_start).num_days();
        if days < 0 {
            return None;
        }
        let week = (days / 7) as usize;
        (week < WEEKS).then_some(week)
    }

    /// Resolves an `MM/DD` string against the academic year.
    ///
    /// Months July-December belong to the start year, January-June to
    /// the following year.
    pub fn resolve_month_day(&self, month: u32, day: u32) -> Option<NaiveDate> {
        let year = if month >= 7 { self.year } else { self.year + 1 };
        NaiveDate::from_ymd_opt(year, month, day)
    }

    /// Logical weeks overlapping the Christmas / New Year window
    /// (Dec 25 through Jan 1).
    pub fn holiday_weeks(&self) -> Vec<usize> {
        let mut weeks = Vec::new();
        let christmas = NaiveDate::from_ymd_opt(self.year, 12, 25).expect("valid date");
        let new_year = NaiveDate::from_ymd_opt(self.year + 1, 1, 1).expect("valid date");
        let mut d = christmas;
        while d <= new_year {
            if let Some(w) = self.week_of_date(d) {
                if !weeks.contains(&w) {
                    weeks.push(w);
                }
            }
            d += Duration::days(1);
        }
        weeks
    }
}

/// NF anchor Sunday for an academic year starting at `july1`.
fn nf_start_for(july1: NaiveDate) -> NaiveDate {
    match july1.weekday() {
        // Mon/Tue/Wed: back up to the last Sunday in June.
        Weekday::Mon => july1 - Duration::days(1),
        Weekday::Tue => july1 - Duration::days(2),
        Weekday::Wed => july1 - Duration::days(3),
        // Thu/Fri/Sat: forward to the first Sunday in July.
        Weekday::Thu => july1 + Duration::days(3),
        Weekday::Fri => july1 + Duration::days(2),
        Weekday::Sat => july1 + Duration::days(1),
        Weekday::Sun => july1,
    }
}
