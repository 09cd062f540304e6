//! # Geo Side-Input Encoder
//!
//! Assembles the enabled parts of `GeoFeatures` into one vector and embeds it
//! to the bottleneck width of the geo-aware networks.

use core::f64::consts::PI;

use burn::{
    nn::{Linear, LinearConfig, Relu},
    prelude::*,
};

use crate::config::{GeoFlags, GeoInfoConfig};
use crate::error::{GeoMtlError, GeoMtlResult};
use crate::models::base::GeoFeatures;

/// Configuration for the `GeoEncoder` module.
#[derive(Config, Debug)]
pub struct GeoEncoderConfig {
    #[config(default = "false")]
    use_coords: bool,
    /// Octaves of the sinusoidal coordinate encoding; 0 feeds raw coordinates.
    #[config(default = "0")]
    pos_enc_frequencies: usize,
    #[config(default = "false")]
    use_time: bool,
    #[config(default = "false")]
    use_domains: bool,
    #[config(default = "false")]
    use_label_distr: bool,
    /// Width of the assembled geo vector.
    input_dim: usize,
    #[config(default = "64")]
    hidden_channels: usize,
    out_channels: usize,
}

impl GeoEncoderConfig {
    /// Derives the encoder layout from the side-input switches.
    pub fn from_geo_info(
        info: &GeoInfoConfig,
        flags: &GeoFlags,
        num_classes: usize,
        out_channels: usize,
    ) -> Self {
        let pos_enc_frequencies = if flags.use_coords_pos_enc {
            info.pos_enc_frequencies
        } else {
            0
        };

        Self::new(info.feature_width(flags, num_classes), out_channels)
            .with_use_coords(flags.uses_coords())
            .with_pos_enc_frequencies(pos_enc_frequencies)
            .with_use_time(flags.use_time)
            .with_use_domains(flags.use_domains)
            .with_use_label_distr(flags.use_label_distr)
            .with_hidden_channels(info.hidden_channels)
    }

    /// Initializes a `GeoEncoder` module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> GeoEncoder<B> {
        GeoEncoder {
            fc1: LinearConfig::new(self.input_dim, self.hidden_channels).init(device),
            fc2: LinearConfig::new(self.hidden_channels, self.out_channels).init(device),
            relu: Relu::new(),
            use_coords: self.use_coords,
            pos_enc_frequencies: self.pos_enc_frequencies,
            use_time: self.use_time,
            use_domains: self.use_domains,
            use_label_distr: self.use_label_distr,
            input_dim: self.input_dim,
        }
    }
}

/// Two-layer MLP over the assembled geo vector.
#[derive(Module, Debug)]
pub struct GeoEncoder<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
    relu: Relu,
    use_coords: bool,
    pos_enc_frequencies: usize,
    use_time: bool,
    use_domains: bool,
    use_label_distr: bool,
    input_dim: usize,
}

impl<B: Backend> GeoEncoder<B> {
    /// Embeds the side-input to `[batch_size, out_channels]`.
    ///
    /// # Errors
    ///
    /// Returns `GeoMtlError::ShapeMismatch` when the assembled vector width
    /// differs from the one the encoder was built for.
    pub fn forward(&self, geo: &GeoFeatures<B>) -> GeoMtlResult<Tensor<B, 2>> {
        let x = self.assemble(geo)?;
        Ok(self.fc2.forward(self.relu.forward(self.fc1.forward(x))))
    }

    /// Concatenates the enabled side-inputs in a fixed order:
    /// coordinates, time, domain, label distribution.
    pub fn assemble(&self, geo: &GeoFeatures<B>) -> GeoMtlResult<Tensor<B, 2>> {
        let mut parts = Vec::with_capacity(4);

        if self.use_coords {
            if self.pos_enc_frequencies > 0 {
                parts.push(positional_encoding(
                    geo.coords.clone(),
                    self.pos_enc_frequencies,
                ));
            } else {
                parts.push(geo.coords.clone());
            }
        }
        if self.use_time {
            parts.push(geo.time.clone());
        }
        if self.use_domains {
            parts.push(geo.domain.clone());
        }
        if self.use_label_distr {
            parts.push(geo.label_distr.clone());
        }

        let actual = parts.iter().map(|part| part.dims()[1]).sum::<usize>();
        if actual != self.input_dim || parts.is_empty() {
            return Err(GeoMtlError::ShapeMismatch {
                tensor: "geo side-input",
                expected: self.input_dim,
                actual,
            });
        }

        Ok(Tensor::cat(parts, 1))
    }
}

/// Sinusoidal encoding `[sin(2^k * pi * x), cos(2^k * pi * x)]` for `k < frequencies`.
///
/// `[batch_size, d]` becomes `[batch_size, 2 * d * frequencies]`.
pub fn positional_encoding<B: Backend>(x: Tensor<B, 2>, frequencies: usize) -> Tensor<B, 2> {
    let encoded = (0..frequencies)
        .flat_map(|k| {
            let scaled = x.clone().mul_scalar(PI * 2f64.powi(k as i32));
            [scaled.clone().sin(), scaled.cos()]
        })
        .collect::<Vec<_>>();

    Tensor::cat(encoded, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn geo_features(batch: usize, domains: usize, classes: usize) -> GeoFeatures<TestBackend> {
        let device = Default::default();
        GeoFeatures {
            coords: Tensor::zeros([batch, 2], &device),
            time: Tensor::zeros([batch, 2], &device),
            domain: Tensor::zeros([batch, domains], &device),
            label_distr: Tensor::zeros([batch, classes], &device),
        }
    }

    #[test]
    fn test_positional_encoding_width_and_values() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 2>::zeros([2, 2], &device);

        let encoded = positional_encoding(x, 3);
        assert_eq!(encoded.dims(), [2, 12]);

        // sin(0) = 0 and cos(0) = 1, laid out per octave as [sin, sin, cos, cos]
        let expected = [0.0f32, 0.0, 1.0, 1.0].repeat(6);
        let values = encoded.into_data().to_vec::<f32>().unwrap();
        for (value, expected) in values.iter().zip(expected) {
            assert!((value - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_positional_encoding_many_octaves() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 2>::zeros([1, 2], &device);

        let encoded = positional_encoding(x, 40);
        assert_eq!(encoded.dims(), [1, 160]);

        // the last octave still encodes zero as [sin, sin, cos, cos] = [0, 0, 1, 1]
        let values = encoded.into_data().to_vec::<f32>().unwrap();
        assert!(values[156..158].iter().all(|value| value.abs() < 1e-6));
        assert!(values[158..].iter().all(|value| (value - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_geo_encoder_assembles_enabled_parts() {
        let device = Default::default();
        let info = GeoInfoConfig::new().with_num_domains(3);
        let flags = GeoFlags {
            use_time: true,
            use_domains: true,
            use_coords_pos_enc: true,
            ..GeoFlags::default()
        };

        let config = GeoEncoderConfig::from_geo_info(&info, &flags, 5, 8);
        // 2 coords * 2 * 4 octaves + 2 time + 3 domains
        assert_eq!(config.input_dim, 21);

        let encoder = config.init::<TestBackend>(&device);
        let embedding = encoder.forward(&geo_features(2, 3, 5)).unwrap();
        assert_eq!(embedding.dims(), [2, 8]);
    }

    #[test]
    fn test_geo_encoder_rejects_wrong_width() {
        let device = Default::default();
        let info = GeoInfoConfig::new().with_num_domains(3);
        let flags = GeoFlags {
            use_domains: true,
            ..GeoFlags::default()
        };
        let encoder = GeoEncoderConfig::from_geo_info(&info, &flags, 5, 8).init::<TestBackend>(&device);

        match encoder.forward(&geo_features(2, 4, 5)) {
            Err(GeoMtlError::ShapeMismatch {
                expected, actual, ..
            }) => {
                assert_eq!(expected, 3);
                assert_eq!(actual, 4);
            }
            other => panic!("Expected ShapeMismatch, got {other:?}"),
        }
    }
}
