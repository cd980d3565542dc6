use std::fmt;

/// Stages reported while a run is in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RunStage {
    Reduction,
    Writing,
}

impl RunStage {
    pub fn describe(self) -> &'static str {
        match self {
            Self::Reduction => "per-entity reduction",
            Self::Writing => "result serialization",
        }
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Observer for reporting incremental progress over entities.
pub trait RunProgressObserver {
    fn on_stage_start(&mut self, stage: RunStage, total_entities: usize) {
        let _ = (stage, total_entities);
    }
    fn on_stage_advance(&mut self, stage: RunStage, processed_entities: usize) {
        let _ = (stage, processed_entities);
    }
    fn on_stage_finish(&mut self, stage: RunStage) {
        let _ = stage;
    }
}

#[derive(Default)]
pub struct NoopRunProgress;

impl RunProgressObserver for NoopRunProgress {}
