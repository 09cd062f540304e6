//! # Convolution Blocks
//!
//! Convolution stacks shared by the encoders, the decoders and the
//! multi-task adapter.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d, Relu,
    },
    prelude::*,
};

/// Configuration for the `DoubleConv` module.
#[derive(Config, Debug)]
pub struct DoubleConvConfig {
    in_channels: usize,
    out_channels: usize,
}

impl DoubleConvConfig {
    /// Initializes a `DoubleConv` module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> DoubleConv<B> {
        let conv1 = Conv2dConfig::new([self.in_channels, self.out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(false)
            .init(device);
        let bn1 = BatchNormConfig::new(self.out_channels).init(device);

        let conv2 = Conv2dConfig::new([self.out_channels, self.out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(false)
            .init(device);
        let bn2 = BatchNormConfig::new(self.out_channels).init(device);

        DoubleConv {
            conv1,
            bn1,
            conv2,
            bn2,
            relu: Relu::new(),
        }
    }
}

/// (conv 3x3 => BN => ReLU) * 2, resolution preserving.
#[derive(Module, Debug)]
pub struct DoubleConv<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B, 2>,
    conv2: Conv2d<B>,
    bn2: BatchNorm<B, 2>,
    relu: Relu,
}

impl<B: Backend> DoubleConv<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.relu.forward(self.bn1.forward(self.conv1.forward(x)));
        self.relu.forward(self.bn2.forward(self.conv2.forward(x)))
    }
}

/// Configuration for the `EncoderConv` module.
#[derive(Config, Debug)]
pub struct EncoderConvConfig {
    in_channels: usize,
    out_channels: usize,
}

impl EncoderConvConfig {
    /// Initializes an `EncoderConv` module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> EncoderConv<B> {
        EncoderConv {
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            conv: DoubleConvConfig::new(self.in_channels, self.out_channels).init(device),
        }
    }
}

/// Downsampling stage: max-pool by 2 followed by a `DoubleConv`.
///
/// Halves the spatial resolution and maps `in_channels` to `out_channels`.
#[derive(Module, Debug)]
pub struct EncoderConv<B: Backend> {
    pool: MaxPool2d,
    conv: DoubleConv<B>,
}

impl<B: Backend> EncoderConv<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.conv.forward(self.pool.forward(x))
    }
}

/// Configuration for the `ConvRelu` module.
#[derive(Config, Debug)]
pub struct ConvReluConfig {
    in_channels: usize,
    out_channels: usize,
}

impl ConvReluConfig {
    /// Initializes a `ConvRelu` module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> ConvRelu<B> {
        ConvRelu {
            conv: Conv2dConfig::new([self.in_channels, self.out_channels], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device),
            relu: Relu::new(),
        }
    }
}

/// A 3x3 convolution followed by ReLU.
#[derive(Module, Debug)]
pub struct ConvRelu<B: Backend> {
    conv: Conv2d<B>,
    relu: Relu,
}

impl<B: Backend> ConvRelu<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.relu.forward(self.conv.forward(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_encoder_conv_halves_resolution() {
        let device = Default::default();
        let block = EncoderConvConfig::new(16, 32).init::<TestBackend>(&device);

        let x = Tensor::<TestBackend, 4>::random(
            [2, 16, 32, 32],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );

        assert_eq!(block.forward(x).dims(), [2, 32, 16, 16]);
    }

    #[test]
    fn test_double_conv_keeps_resolution() {
        let device = Default::default();
        let block = DoubleConvConfig::new(5, 16).init::<TestBackend>(&device);

        let x = Tensor::<TestBackend, 4>::zeros([1, 5, 20, 20], &device);

        assert_eq!(block.forward(x).dims(), [1, 16, 20, 20]);
    }
}
