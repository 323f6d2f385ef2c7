use thiserror::Error;

/// Every failure in the pipeline is fatal. Nothing retries or skips a batch, so callers only
/// propagate these upwards until the run aborts.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("shape mismatch in {stage}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        stage: &'static str,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("label {label} is outside the valid class range [0, {num_classes})")]
    LabelOutOfRange { label: i64, num_classes: usize },

    #[error("loss is not finite ({value})")]
    NumericInstability { value: f32 },

    #[error("{0} has no samples")]
    EmptyDataset(&'static str),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn shape_mismatch(stage: &'static str, expected: &[usize], found: &[usize]) -> Self {
        PipelineError::ShapeMismatch {
            stage,
            expected: expected.to_vec(),
            found: found.to_vec(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
