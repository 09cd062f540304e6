//! ResNet encoder for the residual segmentation network.
//!
//! Built from basic blocks in the ResNet-18 layout. The stem accepts
//! an arbitrary number of input channels so multispectral imagery can be fed
//! without a projection layer.

use burn::nn::{
    conv::{Conv2d, Conv2dConfig},
    pool::{MaxPool2d, MaxPool2dConfig},
    BatchNorm, BatchNormConfig, Initializer, PaddingConfig2d, Relu,
};
use burn::prelude::*;
use core::f64::consts::SQRT_2;

mod blocks;
pub use blocks::*;

const RESNET18_BLOCKS: [usize; 4] = [2, 2, 2, 2];

/// Output channels of the five encoder stages.
pub const RESNET_STAGE_CHANNELS: [usize; 5] = [64, 64, 128, 256, 512];

/// ResNet configuration.
#[derive(Config, Debug)]
pub struct ResNetConfig {
    /// Number of basic blocks per residual layer.
    pub blocks: [usize; 4],
    /// Channels of the input image.
    #[config(default = "3")]
    pub in_channels: usize,
}

impl ResNetConfig {
    /// ResNet-18 layout.
    pub fn resnet18(in_channels: usize) -> Self {
        Self::new(RESNET18_BLOCKS).with_in_channels(in_channels)
    }

    /// Initialize the encoder.
    pub fn init<B: Backend>(&self, device: &B::Device) -> ResNetEncoder<B> {
        let [c0, c1, c2, c3, c4] = RESNET_STAGE_CHANNELS;

        ResNetEncoder {
            stem: Stem::new(self.in_channels, c0, device),
            layer1: LayerBlock::new(self.blocks[0], c0, c1, 1, device),
            layer2: LayerBlock::new(self.blocks[1], c1, c2, 2, device),
            layer3: LayerBlock::new(self.blocks[2], c2, c3, 2, device),
            layer4: LayerBlock::new(self.blocks[3], c3, c4, 2, device),
        }
    }
}

/// ResNet encoder returning the five stage outputs.
///
/// Derived from torchvision.models.resnet.ResNet without the classifier.
#[derive(Module, Debug)]
pub struct ResNetEncoder<B: Backend> {
    pub stem: Stem<B>,
    pub layer1: LayerBlock<B>,
    pub layer2: LayerBlock<B>,
    pub layer3: LayerBlock<B>,
    pub layer4: LayerBlock<B>,
}

impl<B: Backend> ResNetEncoder<B> {
    /// Returns `[stem, layer1, layer2, layer3, layer4]` at strides 4, 4, 8, 16, 32.
    pub fn forward(&self, input: Tensor<B, 4>) -> [Tensor<B, 4>; 5] {
        let conv1 = self.stem.forward(input);
        let conv2 = self.layer1.forward(conv1.clone());
        let conv3 = self.layer2.forward(conv2.clone());
        let conv4 = self.layer3.forward(conv3.clone());
        let conv5 = self.layer4.forward(conv4.clone());

        [conv1, conv2, conv3, conv4, conv5]
    }
}

/// conv1 + bn1 + relu + maxpool
#[derive(Module, Debug)]
pub struct Stem<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B, 2>,
    relu: Relu,
    maxpool: MaxPool2d,
}

impl<B: Backend> Stem<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = self.conv1.forward(input);
        let out = self.bn1.forward(out);
        let out = self.relu.forward(out);
        self.maxpool.forward(out)
    }

    pub fn new(in_channels: usize, out_channels: usize, device: &Device<B>) -> Self {
        let initializer = Initializer::KaimingNormal {
            gain: SQRT_2,
            fan_out_only: true,
        };

        // 7x7 conv, stride=2, padding=3
        let conv1 = Conv2dConfig::new([in_channels, out_channels], [7, 7])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(3, 3))
            .with_bias(false)
            .with_initializer(initializer)
            .init(device);

        let bn1 = BatchNormConfig::new(out_channels).init(device);

        // 3x3 maxpool, stride=2, padding=1
        let maxpool = MaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init();

        Self {
            conv1,
            bn1,
            relu: Relu::new(),
            maxpool,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_resnet_config() {
        let config = ResNetConfig::resnet18(5);
        assert_eq!(config.blocks, [2, 2, 2, 2]);
        assert_eq!(config.in_channels, 5);
    }

    #[test]
    fn test_resnet18_forward_multispectral() {
        let device = Default::default();
        let model = ResNetConfig::resnet18(5).init::<TestBackend>(&device);

        let input = Tensor::<TestBackend, 4>::random(
            [1, 5, 128, 128],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        let output = model.forward(input);

        assert_eq!(output[0].dims(), [1, 64, 32, 32]); // 128/4
        assert_eq!(output[1].dims(), [1, 64, 32, 32]);
        assert_eq!(output[2].dims(), [1, 128, 16, 16]);
        assert_eq!(output[3].dims(), [1, 256, 8, 8]);
        assert_eq!(output[4].dims(), [1, 512, 4, 4]); // 128/32
    }
}
