//! # Decoder Blocks
//!
//! Upsampling stages of the U-Net style decoders.

use burn::{
    nn::conv::{ConvTranspose2d, ConvTranspose2dConfig},
    prelude::*,
    tensor::{
        module::interpolate,
        ops::{InterpolateMode, InterpolateOptions},
    },
};

use super::{ConvRelu, ConvReluConfig, DoubleConv, DoubleConvConfig};

/// Configuration for the `UpBlock` module.
#[derive(Config, Debug)]
pub struct UpBlockConfig {
    /// Channels of the coarser input.
    in_channels: usize,
    /// Channels of the skip connection.
    skip_channels: usize,
    out_channels: usize,
    /// Learn the upsampling with a transposed convolution instead of bilinear interpolation.
    #[config(default = "false")]
    transposed: bool,
}

impl UpBlockConfig {
    /// Initializes an `UpBlock` module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> UpBlock<B> {
        let up = self.transposed.then(|| {
            ConvTranspose2dConfig::new([self.in_channels, self.in_channels], [2, 2])
                .with_stride([2, 2])
                .init(device)
        });

        UpBlock {
            up,
            conv: DoubleConvConfig::new(self.in_channels + self.skip_channels, self.out_channels)
                .init(device),
        }
    }
}

/// Upsample, concatenate the skip connection, then `DoubleConv`.
#[derive(Module, Debug)]
pub struct UpBlock<B: Backend> {
    up: Option<ConvTranspose2d<B>>,
    conv: DoubleConv<B>,
}

impl<B: Backend> UpBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>, skip: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, _, h, w] = skip.dims();
        let x = match &self.up {
            Some(up) => up.forward(x),
            None => interpolate(
                x,
                [h, w],
                InterpolateOptions::new(InterpolateMode::Bilinear),
            ),
        };

        self.conv.forward(Tensor::cat(vec![skip, x], 1))
    }
}

/// Configuration for the `DecoderBlock` module.
#[derive(Config, Debug)]
pub struct DecoderBlockConfig {
    in_channels: usize,
    middle_channels: usize,
    out_channels: usize,
}

impl DecoderBlockConfig {
    /// Initializes a `DecoderBlock` module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> DecoderBlock<B> {
        DecoderBlock {
            conv1: ConvReluConfig::new(self.in_channels, self.middle_channels).init(device),
            conv2: ConvReluConfig::new(self.middle_channels, self.out_channels).init(device),
        }
    }
}

/// Bilinear x2 upsampling followed by two `ConvRelu`.
#[derive(Module, Debug)]
pub struct DecoderBlock<B: Backend> {
    conv1: ConvRelu<B>,
    conv2: ConvRelu<B>,
}

impl<B: Backend> DecoderBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, _, h, w] = x.dims();
        let x = interpolate(
            x,
            [h * 2, w * 2],
            InterpolateOptions::new(InterpolateMode::Bilinear),
        );
        self.conv2.forward(self.conv1.forward(x))
    }
}
