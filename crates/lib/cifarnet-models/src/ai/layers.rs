use std::fmt::{Display, Formatter};

use cifarnet_core::error::{PipelineError, Result};

use crate::data::cifar::{CHANNELS, HEIGHT, NUM_CLASSES, WIDTH};

/// Declarative description of a single layer. Shapes are per sample, the batch dimension is
/// never part of a layer's contract.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LayerSpec {
    Conv {
        in_channels: usize,
        out_channels: usize,
        kernel: usize,
        padding: usize,
        stride: usize,
    },
    MaxPool {
        factor: usize,
    },
    Relu,
    BatchNorm {
        channels: usize,
    },
    Flatten,
    Linear {
        in_features: usize,
        out_features: usize,
    },
}

impl LayerSpec {
    pub(crate) fn conv3x3(in_channels: usize, out_channels: usize) -> Self {
        LayerSpec::Conv {
            in_channels,
            out_channels,
            kernel: 3,
            padding: 1,
            stride: 1,
        }
    }

    /// Shape produced by this layer for a sample of shape `input`.
    pub fn output_shape(&self, input: &[usize]) -> Result<Vec<usize>> {
        match *self {
            LayerSpec::Conv {
                in_channels,
                out_channels,
                kernel,
                padding,
                stride,
            } => {
                if kernel == 0 || stride == 0 {
                    return Err(PipelineError::Config(format!(
                        "conv needs a positive kernel and stride, found k={} s={}",
                        kernel, stride
                    )));
                }
                let [channels, height, width] = image_dims(input, "conv")?;
                if channels != in_channels {
                    return Err(PipelineError::shape_mismatch(
                        "conv",
                        &[in_channels, height, width],
                        input,
                    ));
                }
                let out = |size: usize| -> Result<usize> {
                    (size + 2 * padding)
                        .checked_sub(kernel)
                        .map(|span| span / stride + 1)
                        .ok_or_else(|| PipelineError::shape_mismatch("conv", &[kernel], input))
                };
                Ok(vec![out_channels, out(height)?, out(width)?])
            }
            LayerSpec::MaxPool { factor } => {
                if factor == 0 {
                    return Err(PipelineError::Config(
                        "pooling factor must be positive".to_string(),
                    ));
                }
                let [channels, height, width] = image_dims(input, "pool")?;
                if height < factor || width < factor {
                    return Err(PipelineError::shape_mismatch("pool", &[factor, factor], input));
                }
                Ok(vec![channels, height / factor, width / factor])
            }
            LayerSpec::Relu => Ok(input.to_vec()),
            LayerSpec::BatchNorm { channels } => {
                let [found, _, _] = image_dims(input, "batch norm")?;
                if found != channels {
                    return Err(PipelineError::shape_mismatch("batch norm", &[channels], input));
                }
                Ok(input.to_vec())
            }
            LayerSpec::Flatten => Ok(vec![input.iter().product()]),
            LayerSpec::Linear {
                in_features,
                out_features,
            } => {
                if input != [in_features] {
                    return Err(PipelineError::shape_mismatch("linear", &[in_features], input));
                }
                Ok(vec![out_features])
            }
        }
    }
}

fn image_dims(input: &[usize], stage: &'static str) -> Result<[usize; 3]> {
    match input {
        [channels, height, width] => Ok([*channels, *height, *width]),
        _ => Err(PipelineError::shape_mismatch(stage, &[0, 0, 0], input)),
    }
}

impl Display for LayerSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LayerSpec::Conv {
                in_channels,
                out_channels,
                kernel,
                padding,
                stride,
            } => write!(
                f,
                "Conv({}->{}, k={}, p={}, s={})",
                in_channels, out_channels, kernel, padding, stride
            ),
            LayerSpec::MaxPool { factor } => write!(f, "MaxPool({})", factor),
            LayerSpec::Relu => write!(f, "ReLU"),
            LayerSpec::BatchNorm { channels } => write!(f, "BatchNorm({})", channels),
            LayerSpec::Flatten => write!(f, "Flatten"),
            LayerSpec::Linear {
                in_features,
                out_features,
            } => write!(f, "Linear({}->{})", in_features, out_features),
        }
    }
}

/// An immutable, ordered list of layers together with the sample shape it expects.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Architecture {
    name: &'static str,
    input_shape: [usize; 3],
    layers: Vec<LayerSpec>,
}

impl Architecture {
    pub fn new(name: &'static str, input_shape: [usize; 3], layers: Vec<LayerSpec>) -> Self {
        Self {
            name,
            input_shape,
            layers,
        }
    }

    /// Two conv/relu/pool stages followed by a single projection.
    pub fn shallow() -> Self {
        let layers = vec![
            LayerSpec::conv3x3(CHANNELS, 32),
            LayerSpec::Relu,
            LayerSpec::MaxPool { factor: 2 },
            LayerSpec::conv3x3(32, 64),
            LayerSpec::Relu,
            LayerSpec::MaxPool { factor: 2 },
            LayerSpec::Flatten,
            LayerSpec::Linear {
                in_features: 64 * 8 * 8,
                out_features: NUM_CLASSES,
            },
        ];
        Self::new("shallow", [CHANNELS, HEIGHT, WIDTH], layers)
    }

    /// Three conv/pool/relu/norm stages followed by a three layer classifier head.
    pub fn deep() -> Self {
        let mut layers = Vec::new();
        for [in_channels, out_channels] in [[CHANNELS, 32], [32, 64], [64, 128]] {
            layers.push(LayerSpec::conv3x3(in_channels, out_channels));
            layers.push(LayerSpec::MaxPool { factor: 2 });
            layers.push(LayerSpec::Relu);
            layers.push(LayerSpec::BatchNorm {
                channels: out_channels,
            });
        }
        layers.extend([
            LayerSpec::Flatten,
            LayerSpec::Linear {
                in_features: 128 * 4 * 4,
                out_features: 1024,
            },
            LayerSpec::Relu,
            LayerSpec::Linear {
                in_features: 1024,
                out_features: 2048,
            },
            LayerSpec::Relu,
            LayerSpec::Linear {
                in_features: 2048,
                out_features: NUM_CLASSES,
            },
        ]);
        Self::new("deep", [CHANNELS, HEIGHT, WIDTH], layers)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn input_shape(&self) -> [usize; 3] {
        self.input_shape
    }

    /// Walks the layers and returns the per-sample output shape.
    pub fn output_shape(&self) -> Result<Vec<usize>> {
        self.layers
            .iter()
            .try_fold(self.input_shape.to_vec(), |shape, layer| layer.output_shape(&shape))
    }

    /// Number of scores produced per sample, provided the layers end in a flat vector.
    pub fn num_classes(&self) -> Result<usize> {
        match self.output_shape()?.as_slice() {
            [classes] => Ok(*classes),
            other => Err(PipelineError::shape_mismatch(self.name, &[NUM_CLASSES], other)),
        }
    }
}

impl Display for Architecture {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:?}", self.name, self.input_shape)?;
        for layer in &self.layers {
            write!(f, " -> {}", layer)?;
        }
        Ok(())
    }
}
