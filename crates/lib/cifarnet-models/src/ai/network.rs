use std::fmt::{Display, Formatter};

use burn::module::Module;
use burn::prelude::Backend;
use burn::tensor::{Int, Tensor};
use burn::train::ClassificationOutput;
use serde::Deserialize;

use cifarnet_core::error::{PipelineError, Result};

use crate::ai::layers::Architecture;
use crate::ai::loss::ClassificationLoss;

/// Selects where normalization layers take their statistics from. It is passed on every forward
/// call and never stored in a model.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
    Training,
    Inference,
}

/// The network variants that can be trained.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum NetworkKind {
    Shallow,
    Deep,
}

impl NetworkKind {
    pub fn architecture(&self) -> Architecture {
        match self {
            NetworkKind::Shallow => Architecture::shallow(),
            NetworkKind::Deep => Architecture::deep(),
        }
    }

    /// L2 penalty used when a run does not set one. Only the normalized network is regularized.
    pub fn default_weight_decay(&self) -> Option<f32> {
        match self {
            NetworkKind::Shallow => None,
            NetworkKind::Deep => Some(1.0e-3),
        }
    }
}

impl Display for NetworkKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkKind::Shallow => write!(f, "shallow"),
            NetworkKind::Deep => write!(f, "deep"),
        }
    }
}

/// Maps a batch of images to per-class scores.
pub trait Classifier<B: Backend>: Module<B> {
    /// The layer sequence this network implements.
    fn architecture() -> Architecture;

    /// `[batch, 3, 32, 32]` images to `[batch, classes]` scores, without any shape checks.
    fn forward(&self, images: Tensor<B, 4>, mode: Mode) -> Tensor<B, 2>;

    /// Same as [`Classifier::forward`], but rejects inputs that do not match the architecture
    /// before they reach the tensor engine.
    fn try_forward(&self, images: Tensor<B, 4>, mode: Mode) -> Result<Tensor<B, 2>> {
        let architecture = Self::architecture();
        let [batch_size, channels, height, width] = images.dims();
        let expected = architecture.input_shape();
        if [channels, height, width] != expected {
            return Err(PipelineError::shape_mismatch(
                architecture.name(),
                &[batch_size, expected[0], expected[1], expected[2]],
                &[batch_size, channels, height, width],
            ));
        }
        if batch_size == 0 {
            return Err(PipelineError::EmptyDataset("batch"));
        }

        let scores = self.forward(images, mode);
        let num_classes = architecture.num_classes()?;
        if scores.dims() != [batch_size, num_classes] {
            return Err(PipelineError::shape_mismatch(
                architecture.name(),
                &[batch_size, num_classes],
                &scores.dims(),
            ));
        }
        Ok(scores)
    }

    /// Forward pass followed by the loss against `targets`.
    fn forward_classification(
        &self,
        images: Tensor<B, 4>,
        targets: Tensor<B, 1, Int>,
        loss: &ClassificationLoss<B>,
        mode: Mode,
    ) -> Result<ClassificationOutput<B>> {
        let output = self.try_forward(images, mode)?;
        let loss = loss.forward(output.clone(), targets.clone())?;
        Ok(ClassificationOutput::new(loss, output, targets))
    }
}
