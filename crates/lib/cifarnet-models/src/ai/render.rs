/// Where the trainer is after finishing a batch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrainingProgress {
    /// 1-based epoch.
    pub epoch: usize,
    pub num_epochs: usize,
    /// 1-based batch within the epoch.
    pub batch: usize,
    pub num_batches: usize,
    pub samples: usize,
    pub loss: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EpochSummary {
    pub epoch: usize,
    pub num_epochs: usize,
    pub batches: usize,
    pub samples: usize,
    pub mean_loss: f32,
}

/// Receives training progress. Implementations decide what, if anything, reaches the user.
pub trait TrainingRenderer {
    fn render_batch(&mut self, progress: &TrainingProgress);

    fn render_epoch(&mut self, summary: &EpochSummary);
}
