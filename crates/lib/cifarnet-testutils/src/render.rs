use cifarnet_models::ai::render::{EpochSummary, TrainingProgress, TrainingRenderer};

/// Keeps everything it is given so tests can inspect the run afterwards.
#[derive(Default, Debug)]
pub struct RecordingRenderer {
    pub batches: Vec<TrainingProgress>,
    pub epochs: Vec<EpochSummary>,
}

impl TrainingRenderer for RecordingRenderer {
    fn render_batch(&mut self, progress: &TrainingProgress) {
        self.batches.push(*progress);
    }

    fn render_epoch(&mut self, summary: &EpochSummary) {
        self.epochs.push(*summary);
    }
}
