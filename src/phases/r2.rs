//! Phase 2: R2 track matching.
//!
//! A CP assignment over rising R2s and R2 tracks. Hard constraints:
//! one track per resident, bounded residents per track, and pathway
//! masks (an ESIR resident may only take an ESIR-compatible track).
//! The objective is the summed rank penalty (rank 1 = 0, rank N = N−1)
//! minus a small discount for tracks that cover sections where the
//! resident sits in the bottom historical quartile of the class. The
//! discount weight is far below one rank step, so preference order
//! always dominates.
//!
//! Residents are fed to the solver in name order, which is also the
//! deterministic tie-break among equal-cost optima.

use std::collections::{HashMap, HashSet};

use tracing::info;

use crate::cp::{AssignmentModel, AssignmentSolver};
use crate::error::Result;
use crate::models::{section_of, Phase, Resident, ScheduleGrid, Section};
use crate::tracks::TrackSet;

/// One rank step in solver cost units; deficit discounts stay below it.
const RANK_SCALE: i64 = 100;
/// Discount per covered deficit section.
const DEFICIT_DISCOUNT: i64 = 8;

/// Matching configuration.
#[derive(Debug, Clone, Default)]
pub struct R2MatchConfig {
    /// Track numbers an ESIR resident may take. Empty = no mask.
    pub esir_tracks: Vec<usize>,
    /// Optional hard cap on the worst allowed rank.
    pub max_rank: Option<u32>,
}

/// Matching outcome.
#[derive(Debug, Clone)]
pub struct R2MatchResult {
    /// Resident name → track number.
    pub assignments: HashMap<String, usize>,
    /// Resident name → achieved rank.
    pub ranks: HashMap<String, u32>,
    /// Σ (rank − 1) over the cohort.
    pub total_rank_penalty: i64,
}

/// Solves the R2 track match and writes the winners' weekly schedules.
pub fn assign_r2_tracks(
    residents: &[&Resident],
    tracks: &TrackSet,
    grid: &mut ScheduleGrid,
    config: &R2MatchConfig,
) -> Result<R2MatchResult> {
    grid.begin_phase(Phase::R2Tracks);

    let mut r2s: Vec<&&Resident> = residents.iter().collect();
    r2s.sort_by(|a, b| a.name.cmp(&b.name));

    let num_tracks = tracks.len();
    let worst_rank = num_tracks as u32;

    let mut model = AssignmentModel::new(
        r2s.iter().map(|r| r.name.clone()).collect(),
        tracks.tracks.iter().map(|t| t.number.to_string()).collect(),
    );
    // If classes outgrow the track list, tracks absorb the overflow.
    let max_per_track = r2s.len().div_ceil(num_tracks.max(1)).max(1);
    model.set_uniform_capacity(max_per_track);

    let deficits = deficit_sections(&r2s);
    let coverage: Vec<HashSet<Section>> = tracks.tracks.iter().map(track_sections).collect();

    for (i, res) in r2s.iter().enumerate() {
        let covered_deficits = |t: usize| -> i64 {
            deficits
                .get(&res.name)
                .map(|d| d.intersection(&coverage[t]).count() as i64)
                .unwrap_or(0)
        };

        for (t, track) in tracks.tracks.iter().enumerate() {
            let rank = rank_of(res, track.number, worst_rank);

            if res.pathways.esir
                && !config.esir_tracks.is_empty()
                && !config.esir_tracks.contains(&track.number)
            {
                model.forbid(i, t);
                continue;
            }
            if config.max_rank.is_some_and(|m| rank > m) {
                model.forbid(i, t);
                continue;
            }

            let cost = (rank as i64 - 1) * RANK_SCALE - DEFICIT_DISCOUNT * covered_deficits(t);
            model.set_cost(i, t, cost);
        }
    }

    let solution = AssignmentSolver::new().solve(&model)?;

    let mut result = R2MatchResult {
        assignments: HashMap::new(),
        ranks: HashMap::new(),
        total_rank_penalty: 0,
    };

    for (i, res) in r2s.iter().enumerate() {
        let track = &tracks.tracks[solution.columns[i]];
        let rank = rank_of(res, track.number, worst_rank);
        result.assignments.insert(res.name.clone(), track.number);
        result.ranks.insert(res.name.clone(), rank);
        result.total_rank_penalty += rank as i64 - 1;

        for (week, code) in track.weekly() {
            grid.assign(&res.name, week, &code)?;
        }
    }

    info!(
        count = result.assignments.len(),
        penalty = result.total_rank_penalty,
        "matched R2 tracks"
    );
    Ok(result)
}

/// Rank a resident gave a track; unranked tracks count as worst.
fn rank_of(res: &Resident, track_number: usize, worst: u32) -> u32 {
    res.track_prefs
        .as_ref()
        .and_then(|p| p.rankings.get(&track_number))
        .copied()
        .unwrap_or(worst)
}

/// Sections a track's rotations credit.
fn track_sections(track: &crate::tracks::TrackTemplate) -> HashSet<Section> {
    track
        .blocks
        .iter()
        .flat_map(|c| [c.a.as_str(), c.b.as_str()])
        .filter_map(section_of)
        .collect()
}

/// Sections where each resident is below the class's 25th percentile of
/// historical weeks.
fn deficit_sections(r2s: &[&&Resident]) -> HashMap<String, HashSet<Section>> {
    const SECTIONS: [Section; 10] = [
        Section::NucMed,
        Section::Breast,
        Section::Neuro,
        Section::Abdominal,
        Section::Ultrasound,
        Section::Chest,
        Section::Msk,
        Section::Peds,
        Section::Ir,
        Section::Admin,
    ];

    let mut out: HashMap<String, HashSet<Section>> = HashMap::new();
    if r2s.len() < 2 {
        return out;
    }

    for section in SECTIONS {
        let mut weeks: Vec<f64> = r2s
            .iter()
            .map(|r| r.history_weeks_for_section(section))
            .collect();
        weeks.sort_by(|a, b| a.partial_cmp(b).expect("week counts are finite"));
        let q1 = weeks[weeks.len() / 4];

        for res in r2s {
            if res.history_weeks_for_section(section) < q1 {
                out.entry(res.name.clone()).or_default().insert(section);
            }
        }
    }
    out
}

/// Renders the rank-distribution matrix: how many residents put each
/// track at each rank. Printed before solving so reviewers can sanity
/// check the preference spread.
pub fn rank_matrix(residents: &[&Resident], num_tracks: usize) -> String {
    let mut lines = Vec::new();
    let header: String = format!("{:<10}", "Track")
        + &(1..=num_tracks)
            .map(|i| format!("{:<8}", format!("Rank {i}")))
            .collect::<String>();
    lines.push(header.clone());
    lines.push("-".repeat(header.len()));

    for track in 1..=num_tracks {
        let mut row = format!("{:<10}", format!("Track {track}"));
        for rank in 1..=num_tracks as u32 {
            let count = residents
                .iter()
                .filter(|r| {
                    r.track_prefs
                        .as_ref()
                        .is_some_and(|p| p.rankings.get(&track) == Some(&rank))
                })
                .count();
            row.push_str(&format!("{count:<8}"));
        }
        lines.push(row);
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrackPrefs;
    use crate::tracks::{BaseSequence, BiweekCodes};

    fn tracks(codes: &[&str], n: usize) -> TrackSet {
        let base = BaseSequence {
            positions: codes.iter().map(|c| BiweekCodes::uniform(*c)).collect(),
        };
        TrackSet::derive(&base, n)
    }

    fn r2(name: &str, rankings: &[(usize, u32)]) -> Resident {
        let mut r = Resident::new(name, 2);
        r.track_prefs = Some(TrackPrefs {
            rankings: rankings.iter().copied().collect(),
        });
        r
    }

    fn grid_for(residents: &[&Resident]) -> ScheduleGrid {
        let names: Vec<String> = residents.iter().map(|r| r.name.clone()).collect();
        ScheduleGrid::new(&names).unwrap()
    }

    #[test]
    fn test_identical_rankings_break_ties_by_name() {
        // Three R2s, three tracks, everyone ranks track 1 first. The
        // total penalty is forced to 0+1+2 and the name-order resident
        // takes the shared favorite.
        let a = r2("Adams, A", &[(1, 1), (2, 2), (3, 3)]);
        let b = r2("Baker, B", &[(1, 1), (2, 2), (3, 3)]);
        let c = r2("Clark, C", &[(1, 1), (2, 2), (3, 3)]);
        let residents = [&a, &b, &c];
        let set = tracks(&["Mai", "Mus", "Mch"], 3);
        let mut grid = grid_for(&residents);

        let result =
            assign_r2_tracks(&residents, &set, &mut grid, &R2MatchConfig::default()).unwrap();

        assert_eq!(result.total_rank_penalty, 3);
        assert_eq!(result.assignments["Adams, A"], 1);
        assert_eq!(result.assignments["Baker, B"], 2);
        assert_eq!(result.assignments["Clark, C"], 3);
    }

    #[test]
    fn test_matcher_is_idempotent() {
        let a = r2("Adams, A", &[(1, 2), (2, 1), (3, 3)]);
        let b = r2("Baker, B", &[(1, 1), (2, 3), (3, 2)]);
        let c = r2("Clark, C", &[(1, 1), (2, 2), (3, 3)]);
        let residents = [&a, &b, &c];
        let set = tracks(&["Mai", "Mus", "Mch"], 3);

        let run = || {
            let mut grid = grid_for(&residents);
            assign_r2_tracks(&residents, &set, &mut grid, &R2MatchConfig::default())
                .unwrap()
                .assignments
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_esir_mask_is_hard() {
        let mut a = r2("Adams, A", &[(1, 1), (2, 2)]);
        a.pathways.esir = true;
        let b = r2("Baker, B", &[(1, 1), (2, 2)]);
        let residents = [&a, &b];
        let set = tracks(&["Mai", "Mus"], 2);
        let mut grid = grid_for(&residents);

        let config = R2MatchConfig {
            esir_tracks: vec![2],
            ..Default::default()
        };
        let result = assign_r2_tracks(&residents, &set, &mut grid, &config).unwrap();

        // Adams ranks track 1 first but must take the ESIR track.
        assert_eq!(result.assignments["Adams, A"], 2);
        assert_eq!(result.assignments["Baker, B"], 1);
    }

    #[test]
    fn test_unranked_tracks_count_as_worst() {
        let a = r2("Adams, A", &[(2, 1)]);
        let b = r2("Baker, B", &[(1, 1), (2, 2)]);
        let residents = [&a, &b];
        let set = tracks(&["Mai", "Mus"], 2);
        let mut grid = grid_for(&residents);

        let result =
            assign_r2_tracks(&residents, &set, &mut grid, &R2MatchConfig::default()).unwrap();
        assert_eq!(result.assignments["Adams, A"], 2);
        assert_eq!(result.assignments["Baker, B"], 1);
        assert_eq!(result.total_rank_penalty, 0);
    }

    #[test]
    fn test_rank_matrix_counts() {
        let a = r2("Adams, A", &[(1, 1), (2, 2)]);
        let b = r2("Baker, B", &[(1, 1), (2, 2)]);
        let rendered = rank_matrix(&[&a, &b], 2);
        // Track 1 was ranked first by both residents.
        let track1_line = rendered.lines().nth(2).unwrap();
        assert!(track1_line.starts_with("Track 1"));
        assert!(track1_line.contains('2'));
    }
}
