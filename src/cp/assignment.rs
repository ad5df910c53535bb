//! Exact solver for capacitated assignment with forbidden pairs.
//!
//! # Algorithm
//!
//! Depth-first branch-and-bound over rows. The lower bound for a
//! partial assignment is its accumulated cost plus, for every unplaced
//! row, the cheapest feasible column cost ignoring capacities — an
//! admissible relaxation, so pruning never discards an optimum. A new
//! incumbent must be strictly better than the old one, which makes the
//! first optimum found in exploration order the one returned.
//!
//! # Complexity
//! O(c^r) worst case with heavy pruning; instances here are ≤ 16 rows.

use crate::error::{Error, Result};

/// A capacitated assignment instance.
///
/// Rows take exactly one column each; column `j` admits at most
/// `capacity[j]` rows; `forbidden` pairs are excluded from the search.
#[derive(Debug, Clone)]
pub struct AssignmentModel {
    /// Label per row, used in infeasibility reports (resident names).
    pub row_labels: Vec<String>,
    /// Label per column (track numbers, session ids).
    pub col_labels: Vec<String>,
    cost: Vec<Vec<i64>>,
    forbidden: Vec<Vec<bool>>,
    capacity: Vec<usize>,
}

impl AssignmentModel {
    /// Creates a model with unit column capacities and zero costs.
    pub fn new(row_labels: Vec<String>, col_labels: Vec<String>) -> Self {
        let rows = row_labels.len();
        let cols = col_labels.len();
        Self {
            row_labels,
            col_labels,
            cost: vec![vec![0; cols]; rows],
            forbidden: vec![vec![false; cols]; rows],
            capacity: vec![1; cols],
        }
    }

    /// Sets the cost of assigning row `r` to column `c`.
    pub fn set_cost(&mut self, r: usize, c: usize, cost: i64) {
        self.cost[r][c] = cost;
    }

    /// Forbids the (row, column) pair (hard constraint).
    pub fn forbid(&mut self, r: usize, c: usize) {
        self.forbidden[r][c] = true;
    }

    /// Sets the capacity of column `c`.
    pub fn set_capacity(&mut self, c: usize, capacity: usize) {
        self.capacity[c] = capacity;
    }

    /// Sets every column's capacity.
    pub fn set_uniform_capacity(&mut self, capacity: usize) {
        self.capacity.iter_mut().for_each(|c| *c = capacity);
    }

    fn rows(&self) -> usize {
        self.row_labels.len()
    }

    fn cols(&self) -> usize {
        self.col_labels.len()
    }

    /// Feasible columns of a row, cheapest first, index ascending on ties.
    fn ordered_columns(&self, r: usize) -> Vec<usize> {
        let mut cols: Vec<usize> = (0..self.cols()).filter(|&c| !self.forbidden[r][c]).collect();
        cols.sort_by_key(|&c| (self.cost[r][c], c));
        cols
    }

    /// Cheapest feasible cost per row (capacity-relaxed bound term).
    fn min_costs(&self) -> Result<Vec<i64>> {
        let mut blocking = Vec::new();
        let mut mins = Vec::with_capacity(self.rows());
        for r in 0..self.rows() {
            match (0..self.cols())
                .filter(|&c| !self.forbidden[r][c])
                .map(|c| self.cost[r][c])
                .min()
            {
                Some(m) => mins.push(m),
                None => blocking.push((
                    self.row_labels[r].clone(),
                    "every column is forbidden for this row".to_string(),
                )),
            }
        }
        if blocking.is_empty() {
            Ok(mins)
        } else {
            Err(Error::infeasible(
                "assignment",
                "rows with no admissible column",
                blocking,
            ))
        }
    }
}

/// A solved assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentSolution {
    /// Column chosen for each row.
    pub columns: Vec<usize>,
    /// Total objective value.
    pub total_cost: i64,
}

/// Depth-first branch-and-bound solver for [`AssignmentModel`].
#[derive(Debug, Clone, Default)]
pub struct AssignmentSolver;

impl AssignmentSolver {
    /// Creates a solver.
    pub fn new() -> Self {
        Self
    }

    /// Solves the model to optimality.
    ///
    /// Returns [`Error::Infeasible`] naming the blocking rows when no
    /// complete assignment exists.
    pub fn solve(&self, model: &AssignmentModel) -> Result<AssignmentSolution> {
        if model.rows() == 0 {
            return Ok(AssignmentSolution {
                columns: Vec::new(),
                total_cost: 0,
            });
        }
        if model.capacity.iter().sum::<usize>() < model.rows() {
            return Err(Error::infeasible(
                "assignment",
                format!(
                    "total column capacity {} below row count {}",
                    model.capacity.iter().sum::<usize>(),
                    model.rows()
                ),
                vec![],
            ));
        }

        let min_costs = model.min_costs()?;
        // Suffix sums of per-row minima for the bound at each depth.
        let mut suffix_min = vec![0i64; model.rows() + 1];
        for r in (0..model.rows()).rev() {
            suffix_min[r] = suffix_min[r + 1] + min_costs[r];
        }

        let mut search = Search {
            model,
            suffix_min: &suffix_min,
            used: vec![0; model.cols()],
            chosen: vec![usize::MAX; model.rows()],
            best: None,
        };
        search.descend(0, 0);

        search.best.ok_or_else(|| {
            // Every branch died on capacity: report the tightest columns.
            let blocking = model
                .col_labels
                .iter()
                .zip(&model.capacity)
                .map(|(label, cap)| (label.clone(), format!("capacity {cap} exhausted")))
                .collect();
            Error::infeasible(
                "assignment",
                "no assignment satisfies the column capacities",
                blocking,
            )
        })
    }
}

struct Search<'a> {
    model: &'a AssignmentModel,
    suffix_min: &'a [i64],
    used: Vec<usize>,
    chosen: Vec<usize>,
    best: Option<AssignmentSolution>,
}

impl Search<'_> {
    fn descend(&mut self, row: usize, cost_so_far: i64) {
        if row == self.model.rows() {
            let better = self
                .best
                .as_ref()
                .is_none_or(|b| cost_so_far < b.total_cost);
            if better {
                self.best = Some(AssignmentSolution {
                    columns: self.chosen.clone(),
                    total_cost: cost_so_far,
                });
            }
            return;
        }

        // Admissible bound: remaining rows cannot beat their minima.
        if let Some(best) = &self.best {
            if cost_so_far + self.suffix_min[row] >= best.total_cost {
                return;
            }
        }

        for c in self.model.ordered_columns(row) {
            if self.used[c] >= self.model.capacity[c] {
                continue;
            }
            self.used[c] += 1;
            self.chosen[row] = c;
            self.descend(row + 1, cost_so_far + self.model.cost[row][c]);
            self.chosen[row] = usize::MAX;
            self.used[c] -= 1;
        }
    }
}
