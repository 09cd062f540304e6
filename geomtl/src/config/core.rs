//! Core configuration structures.
//!
//! `ModelParams` mirrors the parameter mapping read from experiment files,
//! with identifiers kept as plain strings. `ModelConfig` is its validated,
//! typed counterpart and the only form the dispatcher works with.

use burn::prelude::*;

use super::enums::{Architecture, Strategy};
use crate::error::{GeoMtlError, GeoMtlResult};

/// Raw model parameters as found in an experiment configuration file.
#[derive(Config, Debug)]
pub struct ModelParams {
    /// Architecture identifier (`unet`, `keepitsimple`, `concat_geounet`, `geounet`, `resunet18`).
    #[config(default = "String::from(\"unet\")")]
    pub model_name: String,
    /// Composition strategy (`none` or `multitask_strategy`).
    #[config(default = "String::from(\"none\")")]
    pub constraint_name: String,
    /// Add the time regression head to the multi-task network.
    #[config(default = "false")]
    pub mt_time: bool,
    /// Max-pool the selected feature map before the coordinate head.
    #[config(default = "true")]
    pub pooling: bool,
    /// Attach the coordinate head to the bottleneck instead of the pre-head features.
    #[config(default = "true")]
    pub after_encoder: bool,
    /// Channels of the input imagery.
    #[config(default = "5")]
    pub num_channels: usize,
    /// Segmentation classes.
    #[config(default = "13")]
    pub num_classes: usize,
    /// Dropout rate of the base network.
    #[config(default = "0.0")]
    pub dropout: f64,
    /// Geo-aware networks: feed acquisition time.
    #[config(default = "false")]
    pub use_time: bool,
    /// Geo-aware networks: feed raw coordinates.
    #[config(default = "false")]
    pub use_geo: bool,
    /// Geo-aware networks: feed the one-hot acquisition domain.
    #[config(default = "false")]
    pub use_domains: bool,
    /// Geo-aware networks: feed sinusoidally encoded coordinates.
    #[config(default = "false")]
    pub use_coords_pos_enc: bool,
    /// Geo-aware networks: feed the per-image label distribution.
    #[config(default = "false")]
    pub use_label_distr: bool,
}

/// Flags driving the multi-task composer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultiTaskFlags {
    /// Build the time regression head.
    pub use_time: bool,
    /// Max-pool the selected feature map.
    pub pooling: bool,
    /// Attach to the bottleneck rather than the pre-head features.
    pub after_encoder: bool,
}

/// Side-input switches of the geo-aware architectures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GeoFlags {
    pub use_time: bool,
    pub use_geo: bool,
    pub use_domains: bool,
    pub use_coords_pos_enc: bool,
    pub use_label_distr: bool,
}

impl GeoFlags {
    /// Whether at least one side-input is switched on.
    #[must_use]
    pub const fn any(&self) -> bool {
        self.use_time
            || self.use_geo
            || self.use_domains
            || self.use_coords_pos_enc
            || self.use_label_distr
    }

    /// Coordinates are fed either raw or encoded.
    #[must_use]
    pub const fn uses_coords(&self) -> bool {
        self.use_geo || self.use_coords_pos_enc
    }
}

/// Largest accepted number of coordinate encoding octaves.
pub const MAX_POS_ENC_FREQUENCIES: usize = 16;

/// Description of the geo side-input shared by the geo-aware architectures.
#[derive(Config, Debug)]
pub struct GeoInfoConfig {
    /// Number of acquisition domains in the one-hot domain vector.
    #[config(default = "0")]
    pub num_domains: usize,
    /// Octaves of the sinusoidal coordinate encoding.
    #[config(default = "4")]
    pub pos_enc_frequencies: usize,
    /// Hidden width of the geo embedding MLP.
    #[config(default = "64")]
    pub hidden_channels: usize,
}

impl GeoInfoConfig {
    /// Width of the assembled geo vector for the given switches.
    #[must_use]
    pub const fn feature_width(&self, flags: &GeoFlags, num_classes: usize) -> usize {
        let mut width = 0;
        if flags.use_coords_pos_enc {
            // sin and cos per coordinate per octave
            width += 2 * 2 * self.pos_enc_frequencies;
        } else if flags.use_geo {
            width += 2;
        }
        if flags.use_time {
            width += 2;
        }
        if flags.use_domains {
            width += self.num_domains;
        }
        if flags.use_label_distr {
            width += num_classes;
        }
        width
    }
}

/// Validated, typed model configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub architecture: Architecture,
    pub strategy: Strategy,
    pub multitask: MultiTaskFlags,
    pub num_channels: usize,
    pub num_classes: usize,
    pub dropout: f64,
    pub geo: GeoFlags,
}

impl ModelConfig {
    /// A configuration for `architecture` with the default parameters.
    #[must_use]
    pub fn new(architecture: Architecture) -> Self {
        let params = ModelParams::new();
        Self {
            architecture,
            strategy: Strategy::None,
            multitask: MultiTaskFlags {
                use_time: params.mt_time,
                pooling: params.pooling,
                after_encoder: params.after_encoder,
            },
            num_channels: params.num_channels,
            num_classes: params.num_classes,
            dropout: params.dropout,
            geo: GeoFlags::default(),
        }
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    #[must_use]
    pub fn with_multitask(mut self, flags: MultiTaskFlags) -> Self {
        self.multitask = flags;
        self
    }

    #[must_use]
    pub fn with_geo(mut self, flags: GeoFlags) -> Self {
        self.geo = flags;
        self
    }

    #[must_use]
    pub fn with_num_channels(mut self, num_channels: usize) -> Self {
        self.num_channels = num_channels;
        self
    }

    #[must_use]
    pub fn with_num_classes(mut self, num_classes: usize) -> Self {
        self.num_classes = num_classes;
        self
    }

    #[must_use]
    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    /// Validate the configuration against the geo side-input description.
    ///
    /// # Errors
    ///
    /// Returns `Err(GeoMtlError::InvalidConfiguration)` if any rule is violated.
    pub fn validate(&self, geo_info: &GeoInfoConfig) -> GeoMtlResult<()> {
        if self.num_channels == 0 {
            return Err(GeoMtlError::InvalidConfiguration {
                reason: "num_channels must be positive".to_string(),
            });
        }

        if self.num_classes == 0 {
            return Err(GeoMtlError::InvalidConfiguration {
                reason: "num_classes must be positive".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.dropout) {
            return Err(GeoMtlError::InvalidConfiguration {
                reason: format!("dropout must be in [0, 1], got {}", self.dropout),
            });
        }

        if self.architecture.is_geo_aware() {
            if !self.geo.any() {
                return Err(GeoMtlError::InvalidConfiguration {
                    reason: format!(
                        "{} needs at least one geo side-input enabled",
                        self.architecture.name()
                    ),
                });
            }

            if self.geo.use_domains && geo_info.num_domains == 0 {
                return Err(GeoMtlError::InvalidConfiguration {
                    reason: "use_domains requires num_domains > 0".to_string(),
                });
            }

            if self.geo.use_coords_pos_enc && geo_info.pos_enc_frequencies == 0 {
                return Err(GeoMtlError::InvalidConfiguration {
                    reason: "use_coords_pos_enc requires pos_enc_frequencies > 0".to_string(),
                });
            }

            if self.geo.use_coords_pos_enc
                && geo_info.pos_enc_frequencies > MAX_POS_ENC_FREQUENCIES
            {
                return Err(GeoMtlError::InvalidConfiguration {
                    reason: format!(
                        "pos_enc_frequencies must be at most {MAX_POS_ENC_FREQUENCIES}, got {}",
                        geo_info.pos_enc_frequencies
                    ),
                });
            }
        }

        Ok(())
    }
}

impl TryFrom<&ModelParams> for ModelConfig {
    type Error = GeoMtlError;

    fn try_from(params: &ModelParams) -> Result<Self, Self::Error> {
        Ok(Self {
            architecture: params.model_name.parse()?,
            strategy: params.constraint_name.parse()?,
            multitask: MultiTaskFlags {
                use_time: params.mt_time,
                pooling: params.pooling,
                after_encoder: params.after_encoder,
            },
            num_channels: params.num_channels,
            num_classes: params.num_classes,
            dropout: params.dropout,
            geo: GeoFlags {
                use_time: params.use_time,
                use_geo: params.use_geo,
                use_domains: params.use_domains,
                use_coords_pos_enc: params.use_coords_pos_enc,
                use_label_distr: params.use_label_distr,
            },
        })
    }
}
