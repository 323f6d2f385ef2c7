use std::path::PathBuf;

use serde::Deserialize;

use cifarnet_core::error::{PipelineError, Result};
use cifarnet_models::ai::trainer::TrainerSettings;
use cifarnet_models::data::cifar::DEFAULT_DATASET;
use cifarnet_output::logger::LogSettings;

pub const DEFAULT_REPORT_EVERY: usize = 100;

#[derive(Deserialize, Debug, Clone)]
pub struct DataSettings {
    #[serde(default = "default_dataset")]
    pub dataset: String,
    pub train_limit: Option<usize>,
    pub test_limit: Option<usize>,
}

fn default_dataset() -> String {
    DEFAULT_DATASET.to_string()
}

/// One network to train and evaluate.
#[derive(Deserialize, Debug, Clone)]
pub struct RunSettings {
    #[serde(flatten)]
    pub trainer_settings: TrainerSettings,
    pub report_every: Option<usize>,
}

impl RunSettings {
    pub fn report_every(&self) -> usize {
        self.report_every.unwrap_or(DEFAULT_REPORT_EVERY)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct BaseConfig {
    pub(crate) log_settings: LogSettings,
    pub(crate) data_settings: DataSettings,
    pub(crate) runs: Vec<RunSettings>,
}

impl BaseConfig {
    fn validate(self) -> Result<Self> {
        if self.runs.is_empty() {
            return Err(PipelineError::Config("no runs configured".to_string()));
        }
        for run in &self.runs {
            if run.trainer_settings.batch_size == Some(0) {
                return Err(PipelineError::Config(format!(
                    "batch size of the {} run must be positive",
                    run.trainer_settings.network
                )));
            }
            if run.report_every == Some(0) {
                return Err(PipelineError::Config(format!(
                    "report interval of the {} run must be positive",
                    run.trainer_settings.network
                )));
            }
        }
        Ok(self)
    }
}

pub struct BaseConfigReader {
    file_path: PathBuf,
}

impl BaseConfigReader {
    pub fn new(file_name: &str) -> Self {
        let file_path = PathBuf::from(file_name);
        Self { file_path }
    }

    pub(crate) fn parse(&self) -> Result<BaseConfig> {
        let parsing_result = std::fs::read_to_string(&self.file_path)?;
        parse_config(&parsing_result)
    }
}

pub(crate) fn parse_config(content: &str) -> Result<BaseConfig> {
    let config: BaseConfig =
        toml::from_str(content).map_err(|e| PipelineError::Config(e.to_string()))?;
    config.validate()
}
