//! # ResUNet
//!
//! U-Net decoder on a ResNet-18 encoder with 32 base decoder filters. At a
//! 256x256 input the bottleneck (last residual stage) is `512 x 8 x 8` and
//! the pre-head feature map `32 x 256 x 256`. Input sides must be multiples
//! of 64, the encoder stride times the center pooling.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig,
    },
    prelude::*,
};
use resnet::{ResNetConfig, ResNetEncoder, RESNET_STAGE_CHANNELS};

use super::base::{check_input_stride, BaseNetwork, BaseOutput, NetworkInput};
use super::modules::{ConvRelu, ConvReluConfig, DecoderBlock, DecoderBlockConfig};
use crate::config::Architecture;
use crate::error::GeoMtlResult;

/// Total downsampling of the encoder plus the center pooling.
pub const RESUNET_INPUT_STRIDE: usize = 64;

/// Configuration for the `ResUNet` model.
#[derive(Config, Debug)]
pub struct ResUNetConfig {
    n_channels: usize,
    n_classes: usize,
    #[config(default = "32")]
    num_filters: usize,
    /// Dropout applied to the pre-head features before the segmentation convolution.
    #[config(default = "0.2")]
    dropout_2d: f64,
}

impl ResUNetConfig {
    /// Initializes a `ResUNet` model.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> ResUNet<B> {
        let nf = self.num_filters;
        let [_, c2, c3, c4, c5] = RESNET_STAGE_CHANNELS;
        let block = |in_channels, middle_channels, out_channels| {
            DecoderBlockConfig::new(in_channels, middle_channels, out_channels).init(device)
        };

        ResUNet {
            encoder: ResNetConfig::resnet18(self.n_channels).init(device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            center: block(c5, nf * 16, nf * 8),
            dec5: block(c5 + nf * 8, nf * 16, nf * 8),
            dec4: block(c4 + nf * 8, nf * 16, nf * 8),
            dec3: block(c3 + nf * 8, nf * 8, nf * 2),
            dec2: block(c2 + nf * 2, nf * 4, nf * 4),
            dec1: block(nf * 4, nf * 4, nf),
            dec0: ConvReluConfig::new(nf, nf).init(device),
            dropout: DropoutConfig::new(self.dropout_2d).init(),
            head: Conv2dConfig::new([nf, self.n_classes], [1, 1]).init(device),
        }
    }
}

/// The ResUNet model.
#[derive(Module, Debug)]
pub struct ResUNet<B: Backend> {
    encoder: ResNetEncoder<B>,
    pool: MaxPool2d,
    center: DecoderBlock<B>,
    dec5: DecoderBlock<B>,
    dec4: DecoderBlock<B>,
    dec3: DecoderBlock<B>,
    dec2: DecoderBlock<B>,
    dec1: DecoderBlock<B>,
    dec0: ConvRelu<B>,
    dropout: Dropout,
    head: Conv2d<B>,
}

impl<B: Backend> BaseNetwork<B> for ResUNet<B> {
    fn architecture(&self) -> Architecture {
        Architecture::ResUnet18
    }

    fn forward(&self, input: NetworkInput<B>) -> GeoMtlResult<BaseOutput<B>> {
        check_input_stride(&input.images, RESUNET_INPUT_STRIDE)?;

        let [conv1, conv2, conv3, conv4, conv5] = self.encoder.forward(input.images);

        let center = self.center.forward(self.pool.forward(conv5.clone()));
        let dec5 = self
            .dec5
            .forward(Tensor::cat(vec![center, conv5.clone()], 1));
        let dec4 = self.dec4.forward(Tensor::cat(vec![dec5, conv4], 1));
        let dec3 = self.dec3.forward(Tensor::cat(vec![dec4, conv3], 1));
        let dec2 = self
            .dec2
            .forward(Tensor::cat(vec![dec3, conv2.clone()], 1));
        let dec1 = self.dec1.forward(dec2);
        let dec0 = self.dec0.forward(dec1);

        let segmentation = self.head.forward(self.dropout.forward(dec0.clone()));

        Ok(BaseOutput {
            early: [conv1, conv2],
            bottleneck: conv5,
            pre_head: dec0,
            segmentation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArchitectureFamily;
    use crate::error::GeoMtlError;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_resunet_output_shapes() {
        let device = Default::default();
        let model = ResUNetConfig::new(5, 13).init::<TestBackend>(&device);
        let images = Tensor::<TestBackend, 4>::random(
            [1, 5, 128, 128],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );

        let output = model.forward(images.into()).unwrap();

        assert_eq!(output.early[0].dims(), [1, 64, 32, 32]);
        assert_eq!(output.early[1].dims(), [1, 64, 32, 32]);
        assert_eq!(output.bottleneck.dims(), [1, 512, 4, 4]);
        assert_eq!(output.pre_head.dims(), [1, 32, 128, 128]);
        assert_eq!(output.segmentation.dims(), [1, 13, 128, 128]);
        assert_eq!(model.family(), ArchitectureFamily::Residual);
        assert_eq!(model.name(), "ResUNet");
    }

    #[test]
    fn test_resunet_rejects_side_off_stride() {
        let device = Default::default();
        let model = ResUNetConfig::new(5, 13).init::<TestBackend>(&device);
        let images = Tensor::<TestBackend, 4>::zeros([1, 5, 200, 200], &device);

        match model.forward(images.into()) {
            Err(GeoMtlError::ShapeMismatch {
                tensor,
                expected,
                actual,
            }) => {
                assert_eq!(tensor, "input image side");
                assert_eq!(expected, 192);
                assert_eq!(actual, 200);
            }
            other => panic!("Expected ShapeMismatch error, got {other:?}"),
        }
    }
}
