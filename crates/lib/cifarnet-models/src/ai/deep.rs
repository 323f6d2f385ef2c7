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
use crate::ai::norm::{ChannelNorm, ChannelNormConfig};

/// conv -> pool -> relu -> norm
#[derive(Module, Debug)]
pub struct ConvStage<B: Backend> {
    conv: Conv2d<B>,
    pool: MaxPool2d,
    activation: Relu,
    pub(crate) norm: ChannelNorm<B>,
}

impl<B: Backend> ConvStage<B> {
    pub fn new(channels: [usize; 2], device: &B::Device) -> Self {
        let conv = Conv2dConfig::new(channels, [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let norm = ChannelNormConfig::new(channels[1]).init(device);

        Self {
            conv,
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            activation: Relu::new(),
            norm,
        }
    }

    pub fn forward(&self, input: Tensor<B, 4>, mode: Mode) -> Tensor<B, 4> {
        let x = self.conv.forward(input);
        let x = self.pool.forward(x);
        let x = self.activation.forward(x);

        self.norm.forward(x, mode)
    }
}

#[derive(Config, Debug)]
pub struct DeepNetConfig {
    #[config(default = 10)]
    num_classes: usize,
}

impl DeepNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> error::Result<DeepNet<B>> {
        let architecture = DeepNet::<B>::architecture();
        architecture.output_shape()?;
        debug!("Building {}", architecture);

        Ok(DeepNet {
            stage1: ConvStage::new([3, 32], device),
            stage2: ConvStage::new([32, 64], device),
            stage3: ConvStage::new([64, 128], device),
            fc1: LinearConfig::new(128 * 4 * 4, 1024).init(device),
            fc2: LinearConfig::new(1024, 2048).init(device),
            fc3: LinearConfig::new(2048, self.num_classes).init(device),
            activation: Relu::new(),
        })
    }
}

/// Three normalized conv stages and a three layer classifier head.
#[derive(Module, Debug)]
pub struct DeepNet<B: Backend> {
    pub(crate) stage1: ConvStage<B>,
    pub(crate) stage2: ConvStage<B>,
    pub(crate) stage3: ConvStage<B>,
    fc1: Linear<B>,
    fc2: Linear<B>,
    fc3: Linear<B>,
    activation: Relu,
}

impl<B: Backend> Classifier<B> for DeepNet<B> {
    fn architecture() -> Architecture {
        Architecture::deep()
    }

    fn forward(&self, images: Tensor<B, 4>, mode: Mode) -> Tensor<B, 2> {
        let x = self.stage1.forward(images, mode); // [batch_size, 32, 16, 16]
        let x = self.stage2.forward(x, mode); // [batch_size, 64, 8, 8]
        let x = self.stage3.forward(x, mode); // [batch_size, 128, 4, 4]

        let x: Tensor<B, 2> = x.flatten(1, 3);

        let x = self.fc1.forward(x);
        let x = self.activation.forward(x);
        let x = self.fc2.forward(x);
        let x = self.activation.forward(x);

        self.fc3.forward(x)
    }
}
