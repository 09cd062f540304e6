//! # Geo-Aware U-Nets
//!
//! U-Nets whose bottleneck is conditioned on the geo side-input. `GeoUNet`
//! adds the broadcast geo embedding to the bottleneck; `ConcatGeoUNet`
//! concatenates it and projects back with a 1x1 convolution. Both keep the
//! bottleneck at its U-Net width so the multi-task heads see the same shapes.

use burn::{
    nn::conv::{Conv2d, Conv2dConfig},
    prelude::*,
};

use super::base::{BaseNetwork, BaseOutput, NetworkInput};
use super::modules::{GeoEncoder, GeoEncoderConfig};
use super::unet::{UNet, UNetConfig};
use crate::config::Architecture;
use crate::error::{GeoMtlError, GeoMtlResult};

/// Configuration for the `GeoUNet` model.
#[derive(Config, Debug)]
pub struct GeoUNetConfig {
    unet: UNetConfig,
    /// Output width must equal the U-Net bottleneck channels.
    geo: GeoEncoderConfig,
    /// Fuse by concatenation (ConcatGeoUNet) instead of addition (GeoUNet).
    #[config(default = "false")]
    concat: bool,
}

impl GeoUNetConfig {
    /// Initializes a `GeoUNet` model.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> GeoUNet<B> {
        let channels = self.unet.bottleneck_channels();
        let fuse = self.concat.then(|| {
            Conv2dConfig::new([channels * 2, channels], [1, 1]).init(device)
        });

        GeoUNet {
            unet: self.unet.init(device),
            geo_encoder: self.geo.init(device),
            fuse,
        }
    }
}

/// U-Net with a geo-conditioned bottleneck.
#[derive(Module, Debug)]
pub struct GeoUNet<B: Backend> {
    unet: UNet<B>,
    geo_encoder: GeoEncoder<B>,
    fuse: Option<Conv2d<B>>,
}

impl<B: Backend> GeoUNet<B> {
    fn condition(&self, bottleneck: Tensor<B, 4>, embedding: Tensor<B, 2>) -> Tensor<B, 4> {
        let [n, c, h, w] = bottleneck.dims();
        let embedding = embedding
            .reshape([n, c, 1, 1])
            .repeat_dim(2, h)
            .repeat_dim(3, w);

        match &self.fuse {
            Some(fuse) => fuse.forward(Tensor::cat(vec![bottleneck, embedding], 1)),
            None => bottleneck + embedding,
        }
    }
}

impl<B: Backend> BaseNetwork<B> for GeoUNet<B> {
    fn architecture(&self) -> Architecture {
        if self.fuse.is_some() {
            Architecture::ConcatGeoUnet
        } else {
            Architecture::GeoUnet
        }
    }

    fn forward(&self, input: NetworkInput<B>) -> GeoMtlResult<BaseOutput<B>> {
        let geo = input.geo.as_ref().ok_or(GeoMtlError::MissingGeoInput {
            architecture: self.name(),
        })?;

        self.unet.check_input(&input.images)?;

        let [batch_size, ..] = input.images.dims();
        let embedding = self.geo_encoder.forward(geo)?;
        let [geo_batch, _] = embedding.dims();
        if geo_batch != batch_size {
            return Err(GeoMtlError::ShapeMismatch {
                tensor: "geo side-input batch",
                expected: batch_size,
                actual: geo_batch,
            });
        }

        let [x1, x2, x3, x4, x5] = self.unet.encode(input.images);
        let x5 = self.condition(x5, embedding);

        Ok(self.unet.finish([x1, x2, x3, x4], x5))
    }
}
