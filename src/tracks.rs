//! Junior-year track derivation.
//!
//! A track is a 52-week rotation sequence derived from a short base
//! sequence of biweekly codes. The workbook's track grids are formula
//! cells, so they are recomputed here rather than read as values.
//!
//! # Algorithm
//!
//! For a base sequence of length `L` and track index `t ∈ [1, N]`, the
//! rotation at block `b ∈ [1, 13]` is the base entry at position
//! `((t − 1) + (b − 1) · 2) mod L`. The stride of 2 is the biweekly
//! cycling: each base position carries an A code (weeks 1-2 of the
//! block) and a B code (weeks 3-4), which differ only where the base
//! sequence specifies a biweekly split.
//!
//! The derivation is pure; [`TrackSet::derive`] computes every track
//! once and callers reuse the cached result.

use serde::{Deserialize, Serialize};

use crate::models::{BlockCalendar, BLOCKS};

/// A/B biweek codes for one base-sequence position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiweekCodes {
    /// Rotation for weeks 1-2 of the block.
    pub a: String,
    /// Rotation for weeks 3-4 of the block.
    pub b: String,
}

impl BiweekCodes {
    /// A position with the same code in both biweeks.
    pub fn uniform(code: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            a: code.clone(),
            b: code,
        }
    }

    /// A position with a biweekly split.
    pub fn split(a: impl Into<String>, b: impl Into<String>) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
        }
    }
}

/// The base rotation sequence a class's tracks are derived from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BaseSequence {
    pub positions: Vec<BiweekCodes>,
}

impl BaseSequence {
    /// Sequence length `L`.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether the sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Base-sequence position (0-based) for a track at a block.
///
/// `track` and `block` are 1-based, matching the workbook labels.
#[inline]
pub fn rotation_position(track: usize, block: usize, seq_len: usize) -> usize {
    ((track - 1) + (block - 1) * 2) % seq_len
}

/// A derived track: 13 blocks of biweek codes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackTemplate {
    /// Track number, 1-based.
    pub number: usize,
    /// Biweek codes per block (index 0 = block 1).
    pub blocks: Vec<BiweekCodes>,
}

impl TrackTemplate {
    /// Expands the track to (week, code) pairs across the 52-week grid.
    pub fn weekly(&self) -> Vec<(usize, String)> {
        let mut out = Vec::with_capacity(52);
        for (i, codes) in self.blocks.iter().enumerate() {
            let weeks: Vec<usize> = BlockCalendar::weeks_of_block(i + 1).collect();
            out.push((weeks[0], codes.a.clone()));
            out.push((weeks[1], codes.a.clone()));
            out.push((weeks[2], codes.b.clone()));
            out.push((weeks[3], codes.b.clone()));
        }
        out
    }
}

/// Structural warnings from a derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackWarning {
    /// `L < N`: at least two residents will share a schedule.
    DuplicateTracks { seq_len: usize, class_size: usize },
    /// `L > N`: some base rotations are unreachable this year.
    MissedRotations { seq_len: usize, class_size: usize },
}

/// A derived, cached set of tracks for one class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackSet {
    pub tracks: Vec<TrackTemplate>,
    pub warnings: Vec<TrackWarning>,
}

impl TrackSet {
    /// Derives `class_size` tracks from a base sequence.
    pub fn derive(base: &BaseSequence, class_size: usize) -> Self {
        let seq_len = base.len();
        let mut warnings = Vec::new();

        if seq_len == 0 || class_size == 0 {
            return Self {
                tracks: Vec::new(),
                warnings,
            };
        }

        if seq_len < class_size {
            warnings.push(TrackWarning::DuplicateTracks {
                seq_len,
                class_size,
            });
        } else if seq_len > class_size {
            warnings.push(TrackWarning::MissedRotations {
                seq_len,
                class_size,
            });
        }

        let tracks = (1..=class_size)
            .map(|t| TrackTemplate {
                number: t,
                blocks: (1..=BLOCKS)
                    .map(|b| base.positions[rotation_position(t, b, seq_len)].clone())
                    .collect(),
            })
            .collect();

        Self { tracks, warnings }
    }

    /// Number of derived tracks.
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Whether no tracks were derived.
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(codes: &[&str]) -> BaseSequence {
        BaseSequence {
            positions: codes.iter().map(|c| BiweekCodes::uniform(*c)).collect(),
        }
    }

    #[test]
    fn test_formula_round_trip() {
        // For any L >= N and any track, the derived block sequence must
        // match the stride-2 formula exactly.
        let seq = base(&["A", "B", "C", "D", "E", "F", "G"]);
        let set = TrackSet::derive(&seq, 7);
        for track in &set.tracks {
            for b in 1..=BLOCKS {
                let expect = rotation_position(track.number, b, seq.len());
                assert_eq!(
                    track.blocks[b - 1].a,
                    seq.positions[expect].a,
                    "track {} block {b}",
                    track.number
                );
            }
        }
    }

    #[test]
    fn test_equal_length_gives_unique_cyclic_tracks() {
        let seq = base(&["A", "B", "C", "D", "E"]);
        let set = TrackSet::derive(&seq, 5);
        assert!(set.warnings.is_empty());

        // Block-1 rotations enumerate the sequence: each track starts
        // one position later.
        let starts: Vec<&str> = set
            .tracks
            .iter()
            .map(|t| t.blocks[0].a.as_str())
            .collect();
        assert_eq!(starts, vec!["A", "B", "C", "D", "E"]);
    }

    #[test]
    fn test_short_sequence_warns_duplicates() {
        let seq = base(&["A", "B", "C"]);
        let set = TrackSet::derive(&seq, 5);
        assert!(matches!(
            set.warnings.as_slice(),
            [TrackWarning::DuplicateTracks {
                seq_len: 3,
                class_size: 5
            }]
        ));
        // Tracks 1 and 4 coincide (offset 3 ≡ 0 mod 3).
        assert_eq!(set.tracks[0].blocks, set.tracks[3].blocks);
    }

    #[test]
    fn test_long_sequence_warns_missed() {
        let seq = base(&["A", "B", "C", "D", "E", "F", "G", "H", "I"]);
        let set = TrackSet::derive(&seq, 4);
        assert!(matches!(
            set.warnings.as_slice(),
            [TrackWarning::MissedRotations { .. }]
        ));
    }

    #[test]
    fn test_biweek_split_lands_in_back_half() {
        let seq = BaseSequence {
            positions: vec![BiweekCodes::split("Snf", "Sx"), BiweekCodes::uniform("Mai")],
        };
        let set = TrackSet::derive(&seq, 2);
        let weekly = set.tracks[0].weekly();
        // Block 1: weeks 0-1 = A code, weeks 2-3 = B code.
        assert_eq!(weekly[0], (0, "Snf".to_string()));
        assert_eq!(weekly[1], (1, "Snf".to_string()));
        assert_eq!(weekly[2], (2, "Sx".to_string()));
        assert_eq!(weekly[3], (3, "Sx".to_string()));
        assert_eq!(weekly.len(), 52);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(TrackSet::derive(&BaseSequence::default(), 5).is_empty());
        assert!(TrackSet::derive(&base(&["A"]), 0).is_empty());
    }
}
