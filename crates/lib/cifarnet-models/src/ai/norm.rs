use burn::config::Config;
use burn::module::{Module, Param, RunningState};
use burn::prelude::Backend;
use burn::tensor::Tensor;

use crate::ai::network::Mode;

#[derive(Config, Debug)]
pub struct ChannelNormConfig {
    pub channels: usize,
    #[config(default = 1e-5)]
    pub epsilon: f64,
    #[config(default = 0.1)]
    pub momentum: f64,
}

impl ChannelNormConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ChannelNorm<B> {
        ChannelNorm {
            gamma: Param::from_tensor(Tensor::ones([self.channels], device)),
            beta: Param::from_tensor(Tensor::zeros([self.channels], device)),
            running_mean: RunningState::new(Tensor::zeros([self.channels], device)),
            running_var: RunningState::new(Tensor::ones([self.channels], device)),
            momentum: self.momentum,
            epsilon: self.epsilon,
        }
    }
}

/// Per-channel normalization over `[batch, channels, height, width]` inputs.
///
/// The statistics source is chosen by the caller on every call: [`Mode::Training`] normalizes
/// with the batch statistics and folds them into the running estimates, [`Mode::Inference`]
/// normalizes with the running estimates and leaves them untouched.
#[derive(Module, Debug)]
pub struct ChannelNorm<B: Backend> {
    pub gamma: Param<Tensor<B, 1>>,
    pub beta: Param<Tensor<B, 1>>,
    pub running_mean: RunningState<Tensor<B, 1>>,
    pub running_var: RunningState<Tensor<B, 1>>,
    momentum: f64,
    epsilon: f64,
}

impl<B: Backend> ChannelNorm<B> {
    pub fn forward(&self, input: Tensor<B, 4>, mode: Mode) -> Tensor<B, 4> {
        match mode {
            Mode::Training => self.forward_train(input),
            Mode::Inference => self.forward_inference(input),
        }
    }

    fn forward_inference(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let device = input.device();
        let channels = input.dims()[1];
        let mean = self.running_mean.value_sync().to_device(&device);
        let var = self.running_var.value_sync().to_device(&device);

        self.normalize(
            input,
            mean.reshape([1, channels, 1, 1]),
            var.reshape([1, channels, 1, 1]),
        )
    }

    fn forward_train(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let [batch_size, channels, height, width] = input.dims();
        let flatten_size = batch_size * height * width;

        let flat = input
            .clone()
            .swap_dims(0, 1)
            .reshape([channels, flatten_size]);
        let mean = flat.clone().mean_dim(1);
        let var = flat.sub(mean.clone()).powf_scalar(2.0).mean_dim(1);

        self.track(
            mean.clone().detach().reshape([channels]),
            var.clone().detach().reshape([channels]),
            flatten_size,
        );

        self.normalize(
            input,
            mean.reshape([1, channels, 1, 1]),
            var.reshape([1, channels, 1, 1]),
        )
    }

    /// Folds batch statistics into the running estimates. The running variance is unbiased.
    fn track(&self, mean: Tensor<B, 1>, var: Tensor<B, 1>, samples: usize) {
        let device = mean.device();
        let correction = if samples > 1 {
            samples as f64 / (samples - 1) as f64
        } else {
            1.0
        };

        let running_mean = self.running_mean.value_sync().to_device(&device);
        let running_var = self.running_var.value_sync().to_device(&device);

        let running_mean = running_mean
            .mul_scalar(1.0 - self.momentum)
            .add(mean.mul_scalar(self.momentum));
        let running_var = running_var
            .mul_scalar(1.0 - self.momentum)
            .add(var.mul_scalar(self.momentum * correction));

        self.running_mean.update(running_mean.detach());
        self.running_var.update(running_var.detach());
    }

    fn normalize(
        &self,
        input: Tensor<B, 4>,
        mean: Tensor<B, 4>,
        var: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let channels = input.dims()[1];
        let std = var.add_scalar(self.epsilon).sqrt();
        let gamma = self.gamma.val().reshape([1, channels, 1, 1]);
        let beta = self.beta.val().reshape([1, channels, 1, 1]);

        input.sub(mean).div(std).mul(gamma).add(beta)
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    use super::*;

    type TestBackend = NdArray<f32>;

    fn sample_input(device: &<TestBackend as Backend>::Device) -> Tensor<TestBackend, 4> {
        Tensor::random([8, 4, 5, 5], Distribution::Normal(3.0, 2.0), device)
    }

    #[test]
    fn training_mode_standardizes_each_channel() {
        let device = Default::default();
        let norm = ChannelNormConfig::new(4).init::<TestBackend>(&device);
        let output = norm.forward(sample_input(&device), Mode::Training);

        let per_channel = output.swap_dims(0, 1).reshape([4, 8 * 5 * 5]);
        let means = per_channel.clone().mean_dim(1).into_data().to_vec::<f32>().unwrap();
        let vars = per_channel.var_bias(1).into_data().to_vec::<f32>().unwrap();
        for (mean, var) in means.into_iter().zip(vars) {
            assert!(mean.abs() < 1e-4, "mean {}", mean);
            assert!((var - 1.0).abs() < 1e-2, "var {}", var);
        }
    }

    #[test]
    fn training_mode_moves_running_statistics() {
        let device = Default::default();
        let norm = ChannelNormConfig::new(4).init::<TestBackend>(&device);
        norm.forward(sample_input(&device), Mode::Training);

        let running_mean = norm
            .running_mean
            .value_sync()
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        assert!(running_mean.iter().all(|m| *m > 0.1));
    }

    #[test]
    fn inference_right_after_training_sees_the_update() {
        let device = Default::default();
        let norm = ChannelNormConfig::new(4).init::<TestBackend>(&device);
        let input = sample_input(&device);
        norm.forward(input.clone(), Mode::Training);

        let mean = norm.running_mean.value_sync().reshape([1, 4, 1, 1]);
        let var = norm.running_var.value_sync().reshape([1, 4, 1, 1]);
        let expected = input.clone().sub(mean).div(var.add_scalar(1e-5).sqrt());

        let output = norm.forward(input, Mode::Inference);
        let diff = output.sub(expected).abs().max().into_scalar();
        assert!(diff < 1e-4, "diff {}", diff);
    }

    #[test]
    fn inference_mode_leaves_running_statistics_alone() {
        let device = Default::default();
        let norm = ChannelNormConfig::new(4).init::<TestBackend>(&device);
        let input = sample_input(&device);
        let output = norm.forward(input.clone(), Mode::Inference);

        let running_mean = norm
            .running_mean
            .value_sync()
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        assert!(running_mean.iter().all(|m| *m == 0.0));

        // Fresh statistics are zero mean and unit variance, so only epsilon separates them.
        let expected = input.div_scalar((1.0 + 1e-5f64).sqrt());
        let diff = output.sub(expected).abs().max().into_scalar();
        assert!(diff < 1e-5);
    }
}
