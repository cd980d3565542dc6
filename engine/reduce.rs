//! # Per-Entity Reduction
//!
//! One entity's dense row goes through three steps:
//!
//! 1. The leading `skip` slots are dropped and the rest is cut into complete
//!    groups of `width` contiguous slots. A trailing partial group is discarded.
//! 2. Each group yields its first-positive indicator: the first strictly positive
//!    value read left to right, or zero if there is none.
//! 3. The indicators are counted into a fixed histogram and the bin with the
//!    largest weighted score wins. Ties go to the lowest bin.

use crate::config::{ConfigError, SlotLayout};
use crate::grid::{GridError, ObservationGrid};
use ndarray::{Array1, ArrayView1, s};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReduceError {
    #[error(transparent)]
    Layout(#[from] ConfigError),
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("Dense row holds {found} values but the layout has {expected} slots.")]
    RowLength { expected: usize, found: usize },
    #[error("A histogram needs at least one bin.")]
    NoBins,
}

/// How a histogram bin is scored before taking the maximum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Weighting {
    /// `bin × count(bin)`.
    #[default]
    BinValue,
    /// Sum of the group indices whose indicator landed in the bin.
    RowIndex,
}

impl Weighting {
    pub fn describe(self) -> &'static str {
        match self {
            Self::BinValue => "bin value × count",
            Self::RowIndex => "sum of group indices",
        }
    }
}

impl fmt::Display for Weighting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// First strictly positive value of `group`, or zero.
pub fn first_positive(group: ArrayView1<'_, f64>) -> f64 {
    group.iter().copied().find(|&v| v > 0.0).unwrap_or(0.0)
}

fn check_row(dense: ArrayView1<'_, f64>, layout: &SlotLayout) -> Result<(), ReduceError> {
    layout.validate()?;
    if dense.len() != layout.slots {
        return Err(ReduceError::RowLength {
            expected: layout.slots,
            found: dense.len(),
        });
    }
    Ok(())
}

// Callers guarantee a valid layout and `dense.len() == layout.slots`.
fn indicators_of(dense: ArrayView1<'_, f64>, layout: &SlotLayout) -> Array1<f64> {
    dense
        .slice(s![layout.skip..])
        .exact_chunks(layout.width)
        .into_iter()
        .map(first_positive)
        .collect()
}

/// Indicators for every complete group of a dense row, one per group.
pub fn group_indicators(
    dense: ArrayView1<'_, f64>,
    layout: &SlotLayout,
) -> Result<Array1<f64>, ReduceError> {
    check_row(dense, layout)?;
    Ok(indicators_of(dense, layout))
}

/// Histogram bin for an indicator value: its integer part, clamped to the last bin.
pub fn bin_for(value: f64, bins: usize) -> usize {
    if value.is_nan() || value < 1.0 {
        return 0;
    }
    (value.floor() as usize).min(bins.saturating_sub(1))
}

/// Counts of indicator values per bin, along with the group indices that fed each bin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorHistogram {
    counts: Vec<u64>,
    group_index_sums: Vec<u64>,
}

impl IndicatorHistogram {
    pub fn from_indicators(
        indicators: ArrayView1<'_, f64>,
        bins: usize,
    ) -> Result<Self, ReduceError> {
        if bins == 0 {
            return Err(ReduceError::NoBins);
        }
        let mut counts = vec![0u64; bins];
        let mut group_index_sums = vec![0u64; bins];
        for (group, &value) in indicators.iter().enumerate() {
            let bin = bin_for(value, bins);
            counts[bin] += 1;
            group_index_sums[bin] += group as u64;
        }
        Ok(Self {
            counts,
            group_index_sums,
        })
    }

    pub fn bins(&self) -> usize {
        self.counts.len()
    }

    /// Zero for bins past the end.
    pub fn count(&self, bin: usize) -> u64 {
        self.counts.get(bin).copied().unwrap_or(0)
    }

    pub fn score(&self, bin: usize, weighting: Weighting) -> u64 {
        match weighting {
            Weighting::BinValue => bin as u64 * self.count(bin),
            Weighting::RowIndex => self.group_index_sums.get(bin).copied().unwrap_or(0),
        }
    }

    /// Bin with the highest score; the first one wins a tie.
    pub fn weighted_argmax(&self, weighting: Weighting) -> usize {
        let mut best_bin = 0;
        let mut best_score = self.score(0, weighting);
        for bin in 1..self.bins() {
            let score = self.score(bin, weighting);
            if score > best_score {
                best_bin = bin;
                best_score = score;
            }
        }
        best_bin
    }
}

fn reduce_checked_row(
    dense: ArrayView1<'_, f64>,
    layout: &SlotLayout,
    weighting: Weighting,
) -> Result<usize, ReduceError> {
    let indicators = indicators_of(dense, layout);
    let histogram = IndicatorHistogram::from_indicators(indicators.view(), layout.bins)?;
    Ok(histogram.weighted_argmax(weighting))
}

/// Runs the whole reduction on one dense row.
pub fn reduce_row(
    dense: ArrayView1<'_, f64>,
    layout: &SlotLayout,
    weighting: Weighting,
) -> Result<usize, ReduceError> {
    check_row(dense, layout)?;
    reduce_checked_row(dense, layout, weighting)
}

/// Reduces entities of a grid one after another, reusing a single scratch row.
///
/// The layout is validated once on construction and must match the grid's slot count.
pub struct EntityReducer<'a> {
    grid: &'a ObservationGrid,
    layout: SlotLayout,
    weighting: Weighting,
    scratch: Array1<f64>,
}

impl<'a> EntityReducer<'a> {
    pub fn new(
        grid: &'a ObservationGrid,
        layout: SlotLayout,
        weighting: Weighting,
    ) -> Result<Self, ReduceError> {
        layout.validate()?;
        if grid.slot_count() != layout.slots {
            return Err(ReduceError::RowLength {
                expected: layout.slots,
                found: grid.slot_count(),
            });
        }
        Ok(Self {
            grid,
            layout,
            weighting,
            scratch: Array1::zeros(grid.slot_count()),
        })
    }

    /// Result for the zero-based `entity`.
    pub fn reduce(&mut self, entity: usize) -> Result<usize, ReduceError> {
        self.grid.fill_dense(entity, &mut self.scratch)?;
        reduce_checked_row(self.scratch.view(), &self.layout, self.weighting)
    }
}
