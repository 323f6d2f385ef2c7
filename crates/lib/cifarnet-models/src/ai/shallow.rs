use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{Linear, LinearConfig, PaddingConfig2d, Relu};
use burn::prelude::Backend;
use burn::tensor::Tensor;
use log::debug;

use cifarnet_core::error;

use crate::ai::layers::Architecture;
use crate::ai::network::{Classifier, Mode};

#[derive(Config, Debug)]
pub struct ShallowNetConfig {
    #[config(default = 10)]
    num_classes: usize,
}

impl ShallowNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> error::Result<ShallowNet<B>> {
        let architecture = ShallowNet::<B>::architecture();
        architecture.output_shape()?;
        debug!("Building {}", architecture);

        let conv1 = Conv2dConfig::new([3, 32], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let conv2 = Conv2dConfig::new([32, 64], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();
        let fc = LinearConfig::new(64 * 8 * 8, self.num_classes).init(device);

        Ok(ShallowNet {
            activation: Relu::new(),
            pool,
            conv1,
            conv2,
            fc,
        })
    }
}

/// conv(3->32) -> relu -> pool -> conv(32->64) -> relu -> pool -> linear(4096->10)
#[derive(Module, Debug)]
pub struct ShallowNet<B: Backend> {
    activation: Relu,
    pool: MaxPool2d,
    pub(crate) conv1: Conv2d<B>,
    pub(crate) conv2: Conv2d<B>,
    pub(crate) fc: Linear<B>,
}

impl<B: Backend> Classifier<B> for ShallowNet<B> {
    fn architecture() -> Architecture {
        Architecture::shallow()
    }

    fn forward(&self, images: Tensor<B, 4>, _mode: Mode) -> Tensor<B, 2> {
        let x = self.conv1.forward(images);
        let x = self.activation.forward(x);
        let x = self.pool.forward(x);

        let x = self.conv2.forward(x);
        let x = self.activation.forward(x);
        let x = self.pool.forward(x);

        let x: Tensor<B, 2> = x.flatten(1, 3);
        self.fc.forward(x)
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    use cifarnet_core::error::PipelineError;

    use super::*;

    type TestBackend = NdArray<f32>;

    #[test]
    fn scores_have_one_row_per_sample() {
        let device = Default::default();
        let model = ShallowNetConfig::new().init::<TestBackend>(&device).unwrap();
        for batch_size in [1, 3, 8] {
            let images = Tensor::random([batch_size, 3, 32, 32], Distribution::Default, &device);
            let scores = model.try_forward(images, Mode::Inference).unwrap();
            assert_eq!(scores.dims(), [batch_size, 10]);
        }
    }

    #[test]
    fn mode_does_not_change_scores() {
        let device = Default::default();
        let model = ShallowNetConfig::new().init::<TestBackend>(&device).unwrap();
        let images =
            Tensor::<TestBackend, 4>::random([2, 3, 32, 32], Distribution::Default, &device);
        let train = model.forward(images.clone(), Mode::Training);
        let infer = model.forward(images, Mode::Inference);
        let diff = train.sub(infer).abs().max().into_scalar();
        assert_eq!(diff, 0.0);
    }

    #[test]
    fn grayscale_input_is_rejected() {
        let device = Default::default();
        let model = ShallowNetConfig::new().init::<TestBackend>(&device).unwrap();
        let images = Tensor::zeros([4, 1, 28, 28], &device);
        let err = model.try_forward(images, Mode::Inference).unwrap_err();
        assert!(matches!(err, PipelineError::ShapeMismatch { stage: "shallow", .. }));
    }
}
