use burn::prelude::Backend;
use burn::tensor::{ElementConversion, Int, Tensor};
use log::info;

use cifarnet_core::error::{PipelineError, Result};

use crate::ai::loss::check_labels;
use crate::ai::network::{Classifier, Mode};
use crate::data::cifar::{CifarBatch, CifarItem};
use crate::data::provider::BatchProvider;

/// Correct and total counts of one evaluation pass.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Metrics {
    pub correct: usize,
    pub total: usize,
}

impl Metrics {
    pub fn reset(&mut self) {
        *self = Metrics::default();
    }

    /// Counts samples whose highest score lands on the target class.
    pub fn accumulate<B: Backend>(&mut self, scores: Tensor<B, 2>, targets: Tensor<B, 1, Int>) {
        let [batch_size, _] = scores.dims();
        let predicted = scores.argmax(1).reshape([batch_size]);
        let correct = predicted
            .equal(targets)
            .int()
            .sum()
            .into_scalar()
            .elem::<i64>();
        self.correct += correct as usize;
        self.total += batch_size;
    }

    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.correct as f64 / self.total as f64
    }

    /// Accuracy in whole percent, rounded down.
    pub fn percentage(&self) -> usize {
        if self.total == 0 {
            return 0;
        }
        100 * self.correct / self.total
    }
}

/// Runs a frozen model over every test batch once and reports its accuracy.
#[derive(Clone, Debug)]
pub struct Evaluator {
    num_classes: usize,
    metrics: Metrics,
}

impl Evaluator {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            metrics: Metrics::default(),
        }
    }

    pub fn run<B, M>(
        &mut self,
        model: &M,
        provider: &mut BatchProvider<CifarItem, CifarBatch<B>>,
    ) -> Result<Metrics>
    where
        B: Backend,
        M: Classifier<B>,
    {
        self.metrics.reset();
        for batch in provider.iter() {
            let batch = batch?;
            check_labels(&batch.targets, self.num_classes)?;
            let scores = model.try_forward(batch.images, Mode::Inference)?;
            self.metrics.accumulate(scores, batch.targets);
        }

        if self.metrics.total == 0 {
            return Err(PipelineError::EmptyDataset("test set"));
        }
        info!(
            "Evaluated {} network: {} of {} correct",
            M::architecture().name(),
            self.metrics.correct,
            self.metrics.total
        );
        Ok(self.metrics)
    }
}
