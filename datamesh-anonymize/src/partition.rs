//! Mondrian partitioning over a shared arena of table row indices.
//!
//! Partitions are contiguous ranges of the arena. Each round carves the
//! pending ranges into disjoint mutable slices, decides every split (in
//! parallel when asked), then queues the accepted halves for the next round.
//! A split only reorders rows inside its own range, so siblings never touch
//! each other's rows.

use std::cmp::Ordering;
use std::ops::Range;

use rayon::prelude::*;
use tracing::debug;

use crate::table::{min_max, QiColumn, QiTable};

/// Extent of one QI column inside a partition.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Bound {
    Numeric { min: f64, max: f64 },
    /// Distinct category codes present, ascending.
    Categorical(Vec<usize>),
}

impl Bound {
    fn width(&self) -> f64 {
        match self {
            Bound::Numeric { min, max } => max - min,
            Bound::Categorical(codes) => codes.len() as f64,
        }
    }

    fn splittable(&self) -> bool {
        match self {
            Bound::Numeric { min, max } => max > min,
            Bound::Categorical(codes) => codes.len() > 1,
        }
    }
}

/// A partition no dimension could split any further.
#[derive(Clone, Debug)]
pub(crate) struct Terminal {
    pub(crate) range: Range<usize>,
    pub(crate) bounds: Vec<Bound>,
}

enum Step {
    Terminal(Vec<Bound>),
    Split { low_len: usize },
}

pub(crate) struct Partitioner<'t> {
    table: &'t QiTable,
    k: usize,
    global_widths: Vec<f64>,
}

impl<'t> Partitioner<'t> {
    pub(crate) fn new(table: &'t QiTable, k: usize) -> Self {
        let global_widths = table.columns.iter().map(QiColumn::global_width).collect();
        Self {
            table,
            k,
            global_widths,
        }
    }

    /// Returns the arena (table row indices, grouped by partition) and the
    /// terminal partitions in arena order.
    pub(crate) fn run(&self, parallel: bool) -> (Vec<usize>, Vec<Terminal>) {
        let total = self.table.len();
        let mut arena: Vec<usize> = (0..total).collect();
        let mut terminals = Vec::new();
        let mut pending = if total == 0 { Vec::new() } else { vec![0..total] };
        let mut round = 0usize;

        while !pending.is_empty() {
            let chunks = carve(&mut arena, &pending);
            let steps: Vec<Step> = if parallel {
                chunks.into_par_iter().map(|rows| self.step(rows)).collect()
            } else {
                chunks.into_iter().map(|rows| self.step(rows)).collect()
            };

            let mut next = Vec::with_capacity(pending.len() * 2);
            for (range, step) in pending.into_iter().zip(steps) {
                match step {
                    Step::Terminal(bounds) => terminals.push(Terminal { range, bounds }),
                    Step::Split { low_len } => {
                        let mid = range.start + low_len;
                        next.push(range.start..mid);
                        next.push(mid..range.end);
                    }
                }
            }
            debug!(round, splits = next.len() / 2, terminals = terminals.len(), "partition round");
            pending = next;
            round += 1;
        }

        terminals.sort_by_key(|terminal| terminal.range.start);
        (arena, terminals)
    }

    /// Splits `rows` in place along the widest acceptable dimension, or
    /// reports it as terminal.
    fn step(&self, rows: &mut [usize]) -> Step {
        let bounds = self.bounds(rows);
        if rows.len() < self.k.saturating_mul(2) {
            return Step::Terminal(bounds);
        }

        for dim in self.dimension_order(&bounds) {
            let column = &self.table.columns[dim];
            let is_low = split_rule(column, &bounds[dim], rows);
            let low = rows.iter().filter(|&&row| is_low(row)).count();
            if low >= self.k && rows.len() - low >= self.k {
                stable_partition(rows, is_low);
                return Step::Split { low_len: low };
            }
        }
        Step::Terminal(bounds)
    }

    fn bounds(&self, rows: &[usize]) -> Vec<Bound> {
        self.table
            .columns
            .iter()
            .map(|column| match column {
                QiColumn::Numeric(values) => {
                    let (min, max) = min_max(rows.iter().map(|&row| values[row]));
                    Bound::Numeric { min, max }
                }
                QiColumn::Categorical { codes, .. } => {
                    let mut present: Vec<usize> = rows.iter().map(|&row| codes[row]).collect();
                    present.sort_unstable();
                    present.dedup();
                    Bound::Categorical(present)
                }
            })
            .collect()
    }

    /// Splittable dimensions by descending normalized spread; declaration
    /// order breaks ties.
    fn dimension_order(&self, bounds: &[Bound]) -> Vec<usize> {
        let mut spreads: Vec<(usize, f64)> = bounds
            .iter()
            .enumerate()
            .filter(|(dim, bound)| bound.splittable() && self.global_widths[*dim] > 0.0)
            .map(|(dim, bound)| (dim, bound.width() / self.global_widths[dim]))
            .collect();
        spreads.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        spreads.into_iter().map(|(dim, _)| dim).collect()
    }
}

/// Lower-median predicate: numeric values split at position ⌊(n−1)/2⌋ of
/// the sorted values, categories at the same rank of the sorted distinct codes.
fn split_rule<'c>(
    column: &'c QiColumn,
    bound: &Bound,
    rows: &[usize],
) -> Box<dyn Fn(usize) -> bool + 'c> {
    match (column, bound) {
        (QiColumn::Numeric(values), _) => {
            let mut sorted: Vec<f64> = rows.iter().map(|&row| values[row]).collect();
            sorted.sort_by(f64::total_cmp);
            let split = sorted[(sorted.len() - 1) / 2];
            Box::new(move |row| values[row].total_cmp(&split) != Ordering::Greater)
        }
        (QiColumn::Categorical { codes, .. }, Bound::Categorical(present)) => {
            let split = present[(present.len() - 1) / 2];
            Box::new(move |row| codes[row] <= split)
        }
        (QiColumn::Categorical { .. }, Bound::Numeric { .. }) => Box::new(|_| false),
    }
}

fn stable_partition(rows: &mut [usize], is_low: impl Fn(usize) -> bool) {
    let (low, high): (Vec<usize>, Vec<usize>) = rows.iter().partition(|&&row| is_low(row));
    rows[..low.len()].copy_from_slice(&low);
    rows[low.len()..].copy_from_slice(&high);
}

/// Splits the arena into one mutable slice per range. `ranges` must be
/// sorted and disjoint.
fn carve<'a>(arena: &'a mut [usize], ranges: &[Range<usize>]) -> Vec<&'a mut [usize]> {
    let mut chunks = Vec::with_capacity(ranges.len());
    let mut rest = arena;
    let mut offset = 0;
    for range in ranges {
        let (_, tail) = std::mem::take(&mut rest).split_at_mut(range.start - offset);
        let (chunk, tail) = tail.split_at_mut(range.len());
        chunks.push(chunk);
        rest = tail;
        offset = range.end;
    }
    chunks
}
