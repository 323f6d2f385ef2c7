use burn::nn::loss::{CrossEntropyLoss, CrossEntropyLossConfig};
use burn::prelude::Backend;
use burn::tensor::{ElementConversion, Int, Tensor};

use cifarnet_core::error::{PipelineError, Result};

/// Categorical cross-entropy over raw class scores. The softmax is folded into a log-softmax by
/// the framework, so large scores do not overflow.
#[derive(Debug, Clone)]
pub struct ClassificationLoss<B: Backend> {
    inner: CrossEntropyLoss<B>,
    num_classes: usize,
}

impl<B: Backend> ClassificationLoss<B> {
    pub fn new(num_classes: usize, device: &B::Device) -> Self {
        Self {
            inner: CrossEntropyLossConfig::new().init(device),
            num_classes,
        }
    }

    /// `scores` is `[batch, classes]`, `targets` is `[batch]`. Returns the mean loss.
    pub fn forward(
        &self,
        scores: Tensor<B, 2>,
        targets: Tensor<B, 1, Int>,
    ) -> Result<Tensor<B, 1>> {
        let [batch_size, classes] = scores.dims();
        if classes != self.num_classes {
            return Err(PipelineError::shape_mismatch(
                "loss",
                &[batch_size, self.num_classes],
                &[batch_size, classes],
            ));
        }
        let [num_targets] = targets.dims();
        if num_targets != batch_size {
            return Err(PipelineError::shape_mismatch("loss", &[batch_size], &[num_targets]));
        }
        check_labels(&targets, self.num_classes)?;

        Ok(self.inner.forward(scores, targets))
    }
}

/// Fails when any label falls outside `[0, num_classes)`.
pub fn check_labels<B: Backend>(targets: &Tensor<B, 1, Int>, num_classes: usize) -> Result<()> {
    if targets.dims()[0] == 0 {
        return Ok(());
    }
    let lowest = targets.clone().min().into_scalar().elem::<i64>();
    if lowest < 0 {
        return Err(PipelineError::LabelOutOfRange {
            label: lowest,
            num_classes,
        });
    }
    let highest = targets.clone().max().into_scalar().elem::<i64>();
    if highest >= num_classes as i64 {
        return Err(PipelineError::LabelOutOfRange {
            label: highest,
            num_classes,
        });
    }
    Ok(())
}

/// Pulls the scalar loss off the device and fails on NaN or infinity.
pub fn finite_loss<B: Backend>(loss: &Tensor<B, 1>) -> Result<f32> {
    let value = loss.clone().into_scalar().elem::<f32>();
    if !value.is_finite() {
        return Err(PipelineError::NumericInstability { value });
    }
    Ok(value)
}
