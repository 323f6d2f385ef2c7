use burn::config::Config;
use burn::module::AutodiffModule;
use burn::optim::Optimizer;
use burn::tensor::backend::AutodiffBackend;
use log::{debug, info, warn};
use serde::Deserialize;
use typed_builder::TypedBuilder;

use cifarnet_core::error::{self, PipelineError};
use cifarnet_core::model::{Model, ModelSettings};

use crate::ai::loss::{finite_loss, ClassificationLoss};
use crate::ai::network::{Classifier, Mode, NetworkKind};
use crate::ai::optim::{OptimizerConfig, ParamUpdater};
use crate::ai::render::{EpochSummary, TrainingProgress, TrainingRenderer};
use crate::data::cifar::{CifarBatch, CifarItem};
use crate::data::provider::BatchProvider;

#[derive(Debug, Clone, Deserialize)]
pub struct TrainerSettings {
    pub network: NetworkKind,
    pub num_epochs: Option<usize>,
    pub batch_size: Option<usize>,
    pub seed: Option<u64>,
    pub learning_rate: Option<f64>,
    pub weight_decay: Option<f32>,
}

impl ModelSettings for TrainerSettings {}

#[derive(Config, Debug)]
pub struct TrainingConfig {
    pub optimizer: OptimizerConfig,
    #[config(default = 10)]
    pub num_epochs: usize,
    #[config(default = 128)]
    pub batch_size: usize,
    #[config(default = 42)]
    pub seed: u64,
}

impl Model for TrainingConfig {
    type Settings = TrainerSettings;

    fn with_settings(settings: &Self::Settings) -> Self {
        let mut optimizer = OptimizerConfig::new();
        if let Some(learning_rate) = settings.learning_rate {
            optimizer.learning_rate = learning_rate;
        }
        optimizer.weight_decay = settings
            .weight_decay
            .or_else(|| settings.network.default_weight_decay());

        let mut train_config = TrainingConfig::new(optimizer);
        if let Some(num_epochs) = settings.num_epochs {
            train_config.num_epochs = num_epochs;
        }
        if let Some(batch_size) = settings.batch_size {
            train_config.batch_size = batch_size;
        }
        if let Some(seed) = settings.seed {
            train_config.seed = seed;
        }
        train_config
    }
}

/// Position of a training run: 1-based epoch, batches finished in the current epoch, and the
/// number of optimizer updates applied overall.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TrainingState {
    pub epoch: usize,
    pub batch: usize,
    pub steps: u64,
}

/// Drives forward pass, loss, backward pass and parameter update for every batch of every
/// epoch, strictly in that order. The first error aborts the run.
#[derive(TypedBuilder)]
pub struct Trainer<B: AutodiffBackend, M, O, R> {
    optim: ParamUpdater<B, M, O>,
    loss: ClassificationLoss<B>,
    num_epochs: usize,
    renderer: R,
    #[builder(default)]
    state: TrainingState,
}

impl<B, M, O, R> Trainer<B, M, O, R>
where
    B: AutodiffBackend,
    M: Classifier<B> + AutodiffModule<B>,
    O: Optimizer<M, B>,
    R: TrainingRenderer,
{
    pub fn state(&self) -> TrainingState {
        self.state
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// One batch: `(parameters, optimizer state, batch) -> (parameters, optimizer state)`.
    /// Returns the updated model and the batch loss.
    pub fn step(&mut self, model: M, batch: CifarBatch<B>) -> error::Result<(M, f32)> {
        let output =
            model.forward_classification(batch.images, batch.targets, &self.loss, Mode::Training)?;
        let loss = finite_loss(&output.loss)?;

        let grads = output.loss.backward();
        let model = self.optim.update(model, grads);
        self.state.steps += 1;
        Ok((model, loss))
    }

    /// One full pass over the training batches.
    pub fn run_epoch(
        &mut self,
        mut model: M,
        provider: &mut BatchProvider<CifarItem, CifarBatch<B>>,
    ) -> error::Result<(M, EpochSummary)> {
        let num_batches = provider.num_batches();
        self.state.batch = 0;
        let mut loss_sum = 0.0f64;
        let mut samples = 0;

        for batch in provider.iter() {
            let batch = batch?;
            let batch_len = batch.len();
            let (updated, loss) = self.step(model, batch)?;
            model = updated;

            self.state.batch += 1;
            loss_sum += loss as f64 * batch_len as f64;
            samples += batch_len;
            self.renderer.render_batch(&TrainingProgress {
                epoch: self.state.epoch,
                num_epochs: self.num_epochs,
                batch: self.state.batch,
                num_batches,
                samples,
                loss,
            });
        }

        if samples == 0 {
            return Err(PipelineError::EmptyDataset("training set"));
        }
        let summary = EpochSummary {
            epoch: self.state.epoch,
            num_epochs: self.num_epochs,
            batches: self.state.batch,
            samples,
            mean_loss: (loss_sum / samples as f64) as f32,
        };
        Ok((model, summary))
    }

    /// Runs every configured epoch. There is no early stopping and no checkpointing.
    pub fn fit(
        &mut self,
        mut model: M,
        provider: &mut BatchProvider<CifarItem, CifarBatch<B>>,
    ) -> error::Result<M> {
        let architecture = M::architecture();
        info!(
            "Training {} network for {} epochs on {} samples, learning rate {}",
            architecture.name(),
            self.num_epochs,
            provider.num_items(),
            self.optim.learning_rate()
        );
        if !provider.is_shuffled() {
            warn!("Training batches are not shuffled between epochs");
        }
        debug!("{}", architecture);

        for epoch in 1..=self.num_epochs {
            self.state.epoch = epoch;
            let (updated, summary) = self.run_epoch(model, provider)?;
            model = updated;
            info!(
                "Epoch {}/{} finished, mean loss {:.4}",
                epoch, self.num_epochs, summary.mean_loss
            );
            self.renderer.render_epoch(&summary);
        }
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(network: NetworkKind, weight_decay: Option<f32>) -> TrainerSettings {
        TrainerSettings {
            network,
            num_epochs: None,
            batch_size: Some(64),
            seed: None,
            learning_rate: None,
            weight_decay,
        }
    }

    #[test]
    fn deep_run_is_regularized_by_default() {
        let config = TrainingConfig::with_settings(&settings(NetworkKind::Deep, None));
        assert_eq!(config.optimizer.weight_decay, Some(1.0e-3));
        assert_eq!(config.num_epochs, 10);
        assert_eq!(config.batch_size, 64);
        assert_eq!(config.seed, 42);
    }

    #[test]
    fn shallow_run_has_no_default_decay() {
        let config = TrainingConfig::with_settings(&settings(NetworkKind::Shallow, None));
        assert_eq!(config.optimizer.weight_decay, None);
        assert!((config.optimizer.learning_rate - 3.0e-4).abs() < 1e-12);
    }

    #[test]
    fn configured_decay_wins_over_the_default() {
        let config = TrainingConfig::with_settings(&settings(NetworkKind::Deep, Some(0.0)));
        assert_eq!(config.optimizer.weight_decay, Some(0.0));
    }
}
