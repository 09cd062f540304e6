//! # U-Net
//!
//! Five-level U-Net with 16 base filters. At a 256x256 input the bottleneck
//! is `256 x 16 x 16` and the pre-head feature map `16 x 256 x 256`, the
//! shapes the multi-task head dimensions are tabulated for.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        Dropout, DropoutConfig,
    },
    prelude::*,
};

use super::base::{check_input_stride, BaseNetwork, BaseOutput, NetworkInput};
use super::modules::{
    DoubleConv, DoubleConvConfig, EncoderConv, EncoderConvConfig, UpBlock, UpBlockConfig,
};
use crate::config::Architecture;
use crate::error::GeoMtlResult;

/// Configuration for the `UNet` model.
#[derive(Config, Debug)]
pub struct UNetConfig {
    n_channels: usize,
    n_classes: usize,
    /// Dropout applied to the bottleneck.
    #[config(default = "0.0")]
    drop_out: f64,
    #[config(default = "16")]
    base_filters: usize,
    /// Learned transposed-convolution upsampling (the FDMUNet variant).
    #[config(default = "false")]
    transposed: bool,
}

impl UNetConfig {
    /// Channels of the bottleneck feature map.
    pub const fn bottleneck_channels(&self) -> usize {
        self.base_filters * 16
    }

    /// Initializes a `UNet` model.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> UNet<B> {
        let f = self.base_filters;
        let up = |in_channels, skip_channels| {
            UpBlockConfig::new(in_channels, skip_channels, skip_channels)
                .with_transposed(self.transposed)
                .init(device)
        };

        UNet {
            inc: DoubleConvConfig::new(self.n_channels, f).init(device),
            down1: EncoderConvConfig::new(f, f * 2).init(device),
            down2: EncoderConvConfig::new(f * 2, f * 4).init(device),
            down3: EncoderConvConfig::new(f * 4, f * 8).init(device),
            down4: EncoderConvConfig::new(f * 8, f * 16).init(device),
            dropout: DropoutConfig::new(self.drop_out).init(),
            up1: up(f * 16, f * 8),
            up2: up(f * 8, f * 4),
            up3: up(f * 4, f * 2),
            up4: up(f * 2, f),
            outc: Conv2dConfig::new([f, self.n_classes], [1, 1]).init(device),
            transposed: self.transposed,
        }
    }
}

/// The U-Net model.
#[derive(Module, Debug)]
pub struct UNet<B: Backend> {
    inc: DoubleConv<B>,
    down1: EncoderConv<B>,
    down2: EncoderConv<B>,
    down3: EncoderConv<B>,
    down4: EncoderConv<B>,
    dropout: Dropout,
    up1: UpBlock<B>,
    up2: UpBlock<B>,
    up3: UpBlock<B>,
    up4: UpBlock<B>,
    outc: Conv2d<B>,
    transposed: bool,
}

impl<B: Backend> UNet<B> {
    /// Side multiple the input must have. Transposed upsampling cannot recover
    /// the sizes lost to floor pooling; bilinear upsampling resizes to each skip.
    pub const fn input_stride(&self) -> usize {
        if self.transposed {
            16
        } else {
            1
        }
    }

    /// Rejects inputs the decoder cannot bring back to full resolution.
    ///
    /// # Errors
    ///
    /// Returns `GeoMtlError::ShapeMismatch` for a side off the input stride.
    pub fn check_input(&self, images: &Tensor<B, 4>) -> GeoMtlResult<()> {
        check_input_stride(images, self.input_stride())
    }

    /// Encoder pass returning the five scales, deepest last.
    pub fn encode(&self, x: Tensor<B, 4>) -> [Tensor<B, 4>; 5] {
        let x1 = self.inc.forward(x);
        let x2 = self.down1.forward(x1.clone());
        let x3 = self.down2.forward(x2.clone());
        let x4 = self.down3.forward(x3.clone());
        let x5 = self.dropout.forward(self.down4.forward(x4.clone()));

        [x1, x2, x3, x4, x5]
    }

    /// Decoder pass from the (possibly fused) bottleneck to the pre-head features.
    pub fn decode(&self, skips: [Tensor<B, 4>; 4], bottleneck: Tensor<B, 4>) -> Tensor<B, 4> {
        let [x1, x2, x3, x4] = skips;
        let x = self.up1.forward(bottleneck, x4);
        let x = self.up2.forward(x, x3);
        let x = self.up3.forward(x, x2);
        self.up4.forward(x, x1)
    }

    /// 1x1 segmentation convolution.
    pub fn segment(&self, pre_head: Tensor<B, 4>) -> Tensor<B, 4> {
        self.outc.forward(pre_head)
    }

    /// Decodes and assembles the five named outputs.
    pub(crate) fn finish(
        &self,
        skips: [Tensor<B, 4>; 4],
        bottleneck: Tensor<B, 4>,
    ) -> BaseOutput<B> {
        let early = [skips[0].clone(), skips[1].clone()];
        let pre_head = self.decode(skips, bottleneck.clone());
        let segmentation = self.segment(pre_head.clone());

        BaseOutput {
            early,
            bottleneck,
            pre_head,
            segmentation,
        }
    }
}

impl<B: Backend> BaseNetwork<B> for UNet<B> {
    fn architecture(&self) -> Architecture {
        if self.transposed {
            Architecture::KeepItSimple
        } else {
            Architecture::Unet
        }
    }

    fn forward(&self, input: NetworkInput<B>) -> GeoMtlResult<BaseOutput<B>> {
        self.check_input(&input.images)?;

        let [x1, x2, x3, x4, x5] = self.encode(input.images);
        Ok(self.finish([x1, x2, x3, x4], x5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeoMtlError;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_unet_output_shapes() {
        let device = Default::default();
        let model = UNetConfig::new(5, 13).init::<TestBackend>(&device);
        let images = Tensor::<TestBackend, 4>::random(
            [1, 5, 256, 256],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );

        let output = model.forward(images.into()).unwrap();

        assert_eq!(output.early[0].dims(), [1, 16, 256, 256]);
        assert_eq!(output.early[1].dims(), [1, 32, 128, 128]);
        assert_eq!(output.bottleneck.dims(), [1, 256, 16, 16]);
        assert_eq!(output.pre_head.dims(), [1, 16, 256, 256]);
        assert_eq!(output.segmentation.dims(), [1, 13, 256, 256]);
        assert_eq!(model.name(), "UNet");
    }

    #[test]
    fn test_fdm_unet_variant() {
        let device = Default::default();
        let model = UNetConfig::new(3, 2)
            .with_transposed(true)
            .init::<TestBackend>(&device);
        let images = Tensor::<TestBackend, 4>::zeros([2, 3, 64, 64], &device);

        let output = model.forward(images.into()).unwrap();

        assert_eq!(output.bottleneck.dims(), [2, 256, 4, 4]);
        assert_eq!(output.segmentation.dims(), [2, 2, 64, 64]);
        assert_eq!(model.architecture(), Architecture::KeepItSimple);
        assert_eq!(model.name(), "FDMUNet");
    }

    #[test]
    fn test_bilinear_unet_accepts_any_side() {
        let device = Default::default();
        let model = UNetConfig::new(3, 2).init::<TestBackend>(&device);
        let images = Tensor::<TestBackend, 4>::zeros([1, 3, 200, 200], &device);

        let output = model.forward(images.into()).unwrap();

        assert_eq!(output.bottleneck.dims(), [1, 256, 12, 12]);
        assert_eq!(output.segmentation.dims(), [1, 2, 200, 200]);
    }

    #[test]
    fn test_fdm_unet_rejects_side_off_stride() {
        let device = Default::default();
        let model = UNetConfig::new(3, 2)
            .with_transposed(true)
            .init::<TestBackend>(&device);
        let images = Tensor::<TestBackend, 4>::zeros([1, 3, 200, 200], &device);

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
