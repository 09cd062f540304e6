//! Enumeration types used by the model configuration.

use core::{fmt, str::FromStr};

use crate::error::GeoMtlError;

/// Identifier of a base architecture.
///
/// The closed set of networks the dispatcher can build. Parsing an identifier
/// that is not listed here is a configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture {
    /// Plain U-Net.
    Unet,
    /// U-Net with learned upsampling ("keep it simple").
    KeepItSimple,
    /// U-Net whose bottleneck is concatenated with a geo embedding.
    ConcatGeoUnet,
    /// U-Net whose bottleneck is shifted by a geo embedding.
    GeoUnet,
    /// U-Net decoder on a ResNet-18 encoder.
    ResUnet18,
}

impl Architecture {
    /// Every registered architecture, in registry order.
    pub const ALL: [Self; 5] = [
        Self::Unet,
        Self::KeepItSimple,
        Self::ConcatGeoUnet,
        Self::GeoUnet,
        Self::ResUnet18,
    ];

    /// The configuration identifier (`model_name`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unet => "unet",
            Self::KeepItSimple => "keepitsimple",
            Self::ConcatGeoUnet => "concat_geounet",
            Self::GeoUnet => "geounet",
            Self::ResUnet18 => "resunet18",
        }
    }

    /// Display name reported when the network is built.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Unet => "UNet",
            Self::KeepItSimple => "FDMUNet",
            Self::ConcatGeoUnet => "ConcatGeoUNet",
            Self::GeoUnet => "GeoUNet",
            Self::ResUnet18 => "ResUNet",
        }
    }

    /// The family that decides the head input dimensions.
    #[must_use]
    pub const fn family(self) -> ArchitectureFamily {
        match self {
            Self::ResUnet18 => ArchitectureFamily::Residual,
            _ => ArchitectureFamily::Standard,
        }
    }

    /// Whether the network consumes geo side-input.
    #[must_use]
    pub const fn is_geo_aware(self) -> bool {
        matches!(self, Self::ConcatGeoUnet | Self::GeoUnet)
    }
}

impl FromStr for Architecture {
    type Err = GeoMtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|architecture| architecture.as_str() == s)
            .ok_or_else(|| GeoMtlError::UnsupportedArchitecture {
                architecture: s.to_string(),
            })
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Architecture family as seen by the head dimension table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchitectureFamily {
    /// Residual-backbone networks (ResUNet).
    Residual,
    /// Every other encoder-decoder.
    Standard,
}

impl ArchitectureFamily {
    /// Channels of the pre-head feature map.
    #[must_use]
    pub const fn pre_head_channels(self) -> usize {
        match self {
            Self::Residual => 32,
            Self::Standard => 16,
        }
    }
}

/// How the base network is composed before being returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Strategy {
    /// Return the base network as is.
    #[default]
    None,
    /// Wrap the base network with the coordinate (and time) regression heads.
    MultiTask,
}

impl FromStr for Strategy {
    type Err = GeoMtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "none" => Ok(Self::None),
            "multitask" | "multitask_strategy" => Ok(Self::MultiTask),
            other => Err(GeoMtlError::InvalidConfiguration {
                reason: format!("Unknown composition strategy: {other}"),
            }),
        }
    }
}
