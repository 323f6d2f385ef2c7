use std::marker::PhantomData;

use burn::config::Config;
use burn::module::AutodiffModule;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;
use log::debug;

/// Adam with bias-corrected moment estimates and optional L2 weight decay. The decay term is added
/// to the gradient before the moments are updated.
#[derive(Config, Debug)]
pub struct OptimizerConfig {
    #[config(default = 3.0e-4)]
    pub learning_rate: f64,
    pub weight_decay: Option<f32>,
    #[config(default = 0.9)]
    pub beta_1: f32,
    #[config(default = 0.999)]
    pub beta_2: f32,
    #[config(default = 1.0e-8)]
    pub epsilon: f32,
}

impl OptimizerConfig {
    pub fn adam(&self) -> AdamConfig {
        AdamConfig::new()
            .with_beta_1(self.beta_1)
            .with_beta_2(self.beta_2)
            .with_epsilon(self.epsilon)
            .with_weight_decay(
                self.weight_decay
                    .map(|penalty| WeightDecayConfig::new(penalty as _)),
            )
    }

    pub fn init<B, M>(&self) -> ParamUpdater<B, M, impl Optimizer<M, B>>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
    {
        debug!(
            "Adam with learning rate {} and weight decay {:?}",
            self.learning_rate, self.weight_decay
        );
        ParamUpdater {
            optim: self.adam().init::<B, M>(),
            learning_rate: self.learning_rate,
            updates: 0,
            _backend: PhantomData,
        }
    }
}

/// Owns the optimizer and its per-parameter state for the lifetime of a training run.
///
/// Gradients are taken by value, so the gradients of one batch are consumed by exactly one
/// update and can never leak into the next.
pub struct ParamUpdater<B, M, O> {
    optim: O,
    learning_rate: f64,
    updates: u64,
    _backend: PhantomData<fn() -> (B, M)>,
}

impl<B, M, O> ParamUpdater<B, M, O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    pub fn update(&mut self, model: M, grads: B::Gradients) -> M {
        let grads = GradientsParams::from_grads(grads, &model);
        self.updates += 1;
        self.optim.step(self.learning_rate, model, grads)
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Number of updates applied so far.
    pub fn updates(&self) -> u64 {
        self.updates
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::{Autodiff, NdArray};
    use burn::tensor::{Distribution, Tensor};

    use crate::ai::network::{Classifier, Mode};
    use crate::ai::shallow::{ShallowNet, ShallowNetConfig};

    use super::*;

    type TestBackend = Autodiff<NdArray<f32>>;

    type Gradients = <TestBackend as AutodiffBackend>::Gradients;

    fn zero_gradients(model: &ShallowNet<TestBackend>) -> Gradients {
        let device = Default::default();
        let images = Tensor::random([2, 3, 32, 32], Distribution::Default, &device);
        model
            .forward(images, Mode::Training)
            .sum()
            .mul_scalar(0.0)
            .backward()
    }

    fn weights(model: &ShallowNet<TestBackend>) -> Vec<f32> {
        let mut values = model.conv1.weight.val().into_data().to_vec::<f32>().unwrap();
        values.extend(model.fc.weight.val().into_data().to_vec::<f32>().unwrap());
        values
    }

    #[test]
    fn zero_gradient_without_decay_changes_nothing() {
        let device = Default::default();
        let model = ShallowNetConfig::new().init::<TestBackend>(&device).unwrap();
        let mut optim = OptimizerConfig::new().init::<TestBackend, ShallowNet<TestBackend>>();

        let before = weights(&model);
        let grads = zero_gradients(&model);
        let model = optim.update(model, grads);

        assert_eq!(weights(&model), before);
        assert_eq!(optim.updates(), 1);
    }

    #[test]
    fn zero_gradient_with_decay_shrinks_weights() {
        let device = Default::default();
        let model = ShallowNetConfig::new().init::<TestBackend>(&device).unwrap();
        let mut optim = OptimizerConfig::new()
            .with_weight_decay(Some(0.001))
            .init::<TestBackend, ShallowNet<TestBackend>>();

        let before: f32 = weights(&model).iter().map(|w| w.abs()).sum();
        let grads = zero_gradients(&model);
        let model = optim.update(model, grads);
        let after: f32 = weights(&model).iter().map(|w| w.abs()).sum();

        assert!(after < before);
    }
}
