// ========================================================================================
//
//                            THE SINGLE-PASS PIPELINE
//
// ========================================================================================
//
// load -> grid -> reduce every entity in ascending id order -> write.
//
// Nothing touches the output path until every entity has been reduced, so a failed
// run never leaves a partial result file behind.

use crate::config::{ConfigError, SlotLayout};
use crate::data::{DataError, load_observations};
use crate::grid::{GridError, ObservationGrid};
use crate::output::{OutputError, write_results};
use crate::progress::{RunProgressObserver, RunStage};
use crate::reduce::{EntityReducer, ReduceError, Weighting};
use std::path::PathBuf;
use thiserror::Error;

/// Number of entities to reduce before reporting progress.
pub const PROGRESS_UPDATE_BATCH_SIZE: usize = 1024;

pub const DEFAULT_INPUT_PATH: &str = "train.csv";
pub const DEFAULT_OUTPUT_PATH: &str = "dummy_benchmark.csv";

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Reduce(#[from] ReduceError),
    #[error(transparent)]
    Output(#[from] OutputError),
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    pub layout: SlotLayout,
    pub weighting: Weighting,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_INPUT_PATH),
            output: PathBuf::from(DEFAULT_OUTPUT_PATH),
            layout: SlotLayout::default(),
            weighting: Weighting::default(),
        }
    }
}

/// What a completed run read and produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub rows_read: usize,
    pub rows_skipped: usize,
    pub stored_cells: usize,
    pub populated_entities: usize,
    /// `result_counts[b]` is the number of entities whose result is `b`.
    pub result_counts: Vec<usize>,
}

impl RunSummary {
    pub fn entities(&self) -> usize {
        self.result_counts.iter().sum()
    }
}

/// Reduces every entity of `grid` in ascending order.
pub fn reduce_all(
    grid: &ObservationGrid,
    layout: &SlotLayout,
    weighting: Weighting,
    progress: &mut dyn RunProgressObserver,
) -> Result<Vec<usize>, ReduceError> {
    let total = grid.entity_count();
    let mut reducer = EntityReducer::new(grid, *layout, weighting)?;
    let mut results = Vec::with_capacity(total);

    progress.on_stage_start(RunStage::Reduction, total);
    for entity in 0..total {
        results.push(reducer.reduce(entity)?);
        let processed = entity + 1;
        if processed % PROGRESS_UPDATE_BATCH_SIZE == 0 {
            progress.on_stage_advance(RunStage::Reduction, processed);
        }
    }
    progress.on_stage_advance(RunStage::Reduction, total);
    progress.on_stage_finish(RunStage::Reduction);

    Ok(results)
}

fn histogram_of(results: &[usize], bins: usize) -> Vec<usize> {
    let mut counts = vec![0usize; bins];
    for &result in results {
        if let Some(count) = counts.get_mut(result) {
            *count += 1;
        }
    }
    counts
}

/// Executes a full run: load, reduce, write.
pub fn run(
    options: &RunOptions,
    progress: &mut dyn RunProgressObserver,
) -> Result<RunSummary, PipelineError> {
    let layout = options.layout;
    layout.validate()?;
    log::info!(
        "Layout: {} entities x {} slots, skip {}, groups of {} ({} groups, {} trailing slots dropped), {} bins",
        layout.entities,
        layout.slots,
        layout.skip,
        layout.width,
        layout.rows(),
        layout.trailing_slots(),
        layout.bins
    );
    log::info!("Weighting: {}", options.weighting);

    let table = load_observations(&options.input, &layout)?;
    let grid = ObservationGrid::from_observations(&table.observations, &layout)?;
    log::info!(
        "Built grid with {} stored cells across {} populated entities",
        grid.stored_cells(),
        grid.populated_entities()
    );

    let results = reduce_all(&grid, &layout, options.weighting, progress)?;

    progress.on_stage_start(RunStage::Writing, results.len());
    write_results(&options.output, &results)?;
    progress.on_stage_finish(RunStage::Writing);

    Ok(RunSummary {
        rows_read: table.rows_read,
        rows_skipped: table.rows_skipped,
        stored_cells: grid.stored_cells(),
        populated_entities: grid.populated_entities(),
        result_counts: histogram_of(&results, layout.bins),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Observation;
    use crate::progress::NoopRunProgress;

    #[derive(Default)]
    struct RecordingProgress {
        events: Vec<(RunStage, &'static str, usize)>,
    }

    impl RunProgressObserver for RecordingProgress {
        fn on_stage_start(&mut self, stage: RunStage, total_entities: usize) {
            self.events.push((stage, "start", total_entities));
        }
        fn on_stage_advance(&mut self, stage: RunStage, processed_entities: usize) {
            self.events.push((stage, "advance", processed_entities));
        }
        fn on_stage_finish(&mut self, stage: RunStage) {
            self.events.push((stage, "finish", 0));
        }
    }

    #[test]
    fn reduce_all_covers_every_entity_in_order() {
        let layout = SlotLayout {
            entities: 4,
            ..SlotLayout::default()
        };
        let observations = [
            Observation {
                entity: 1,
                slot: 4,
                value: 3.0,
            },
            Observation {
                entity: 1,
                slot: 11,
                value: 9.0,
            },
            Observation {
                entity: 3,
                slot: 18,
                value: 5.0,
            },
        ];
        let grid = ObservationGrid::from_observations(&observations, &layout).unwrap();
        let results =
            reduce_all(&grid, &layout, Weighting::BinValue, &mut NoopRunProgress).unwrap();
        assert_eq!(results, vec![0, 9, 0, 5]);
    }

    #[test]
    fn progress_is_reported_in_batches_and_at_the_end() {
        let layout = SlotLayout {
            entities: PROGRESS_UPDATE_BATCH_SIZE * 2 + 5,
            ..SlotLayout::default()
        };
        let grid = ObservationGrid::from_observations(&[], &layout).unwrap();
        let mut progress = RecordingProgress::default();
        let results = reduce_all(&grid, &layout, Weighting::BinValue, &mut progress).unwrap();
        assert_eq!(results.len(), layout.entities);
        assert_eq!(
            progress.events,
            vec![
                (RunStage::Reduction, "start", layout.entities),
                (RunStage::Reduction, "advance", PROGRESS_UPDATE_BATCH_SIZE),
                (RunStage::Reduction, "advance", PROGRESS_UPDATE_BATCH_SIZE * 2),
                (RunStage::Reduction, "advance", layout.entities),
                (RunStage::Reduction, "finish", 0),
            ]
        );
    }

    #[test]
    fn summary_counts_results_per_bin() {
        assert_eq!(histogram_of(&[0, 9, 0, 16], 17)[0], 2);
        let summary = RunSummary {
            rows_read: 2,
            rows_skipped: 0,
            stored_cells: 2,
            populated_entities: 1,
            result_counts: histogram_of(&[0, 9, 0], 17),
        };
        assert_eq!(summary.entities(), 3);
        assert_eq!(summary.result_counts[9], 1);
    }

    #[test]
    fn invalid_layout_fails_before_reading_input() {
        let options = RunOptions {
            input: PathBuf::from("does-not-exist.csv"),
            layout: SlotLayout {
                width: 0,
                ..SlotLayout::default()
            },
            ..RunOptions::default()
        };
        let err = run(&options, &mut NoopRunProgress).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)), "got {err:?}");
    }

    #[test]
    fn reduce_all_rejects_a_grid_built_for_another_layout() {
        let grid = ObservationGrid::from_observations(&[], &SlotLayout::default()).unwrap();
        let narrower = SlotLayout {
            slots: 40,
            ..SlotLayout::default()
        };
        let err = reduce_all(&grid, &narrower, Weighting::BinValue, &mut NoopRunProgress)
            .unwrap_err();
        assert!(matches!(err, ReduceError::RowLength { expected: 40, found: 62 }));
        let err = PipelineError::from(err);
        assert!(matches!(err, PipelineError::Reduce(_)));
    }
}
