//! # Architecture Dispatcher
//!
//! Maps a configured architecture identifier to a base network and, for the
//! multi-task strategy, wraps it with the regression heads. Validation and
//! identifier parsing happen before any parameter is allocated, so a failed
//! dispatch never leaves a partially built network behind.

use burn::prelude::*;

use super::base::{BaseNetwork, BaseOutput, NetworkInput};
use super::geo_unet::{GeoUNet, GeoUNetConfig};
use super::modules::GeoEncoderConfig;
use super::multitask::{MultiTaskNet, MultiTaskNetConfig, MultiTaskOutput};
use super::resunet::{ResUNet, ResUNetConfig};
use super::unet::{UNet, UNetConfig};
use crate::config::{Architecture, GeoInfoConfig, ModelConfig, ModelParams, Strategy};
use crate::error::GeoMtlResult;

/// Any registered base network.
#[derive(Module, Debug)]
pub enum BaseNetworkEnum<B: Backend> {
    /// UNet and FDMUNet.
    UNet(UNet<B>),
    /// GeoUNet and ConcatGeoUNet.
    GeoUNet(GeoUNet<B>),
    /// ResUNet.
    ResUNet(ResUNet<B>),
}

impl<B: Backend> BaseNetwork<B> for BaseNetworkEnum<B> {
    fn architecture(&self) -> Architecture {
        match self {
            Self::UNet(model) => model.architecture(),
            Self::GeoUNet(model) => model.architecture(),
            Self::ResUNet(model) => model.architecture(),
        }
    }

    fn forward(&self, input: NetworkInput<B>) -> GeoMtlResult<BaseOutput<B>> {
        match self {
            Self::UNet(model) => model.forward(input),
            Self::GeoUNet(model) => model.forward(input),
            Self::ResUNet(model) => model.forward(input),
        }
    }
}

/// Constructs the base network registered for `config.architecture`.
///
/// # Errors
///
/// Returns `GeoMtlError::InvalidConfiguration` if the configuration fails validation.
pub fn build_base_network<B: Backend>(
    config: &ModelConfig,
    geo_info: &GeoInfoConfig,
    device: &Device<B>,
) -> GeoMtlResult<BaseNetworkEnum<B>> {
    config.validate(geo_info)?;

    let unet =
        UNetConfig::new(config.num_channels, config.num_classes).with_drop_out(config.dropout);
    let geo_unet = |concat| {
        let geo = GeoEncoderConfig::from_geo_info(
            geo_info,
            &config.geo,
            config.num_classes,
            unet.bottleneck_channels(),
        );
        GeoUNetConfig::new(unet.clone(), geo)
            .with_concat(concat)
            .init(device)
    };

    let network = match config.architecture {
        Architecture::Unet => BaseNetworkEnum::UNet(unet.init(device)),
        Architecture::KeepItSimple => {
            BaseNetworkEnum::UNet(unet.clone().with_transposed(true).init(device))
        }
        Architecture::ConcatGeoUnet => BaseNetworkEnum::GeoUNet(geo_unet(true)),
        Architecture::GeoUnet => BaseNetworkEnum::GeoUNet(geo_unet(false)),
        Architecture::ResUnet18 => BaseNetworkEnum::ResUNet(
            ResUNetConfig::new(config.num_channels, config.num_classes).init(device),
        ),
    };

    Ok(network)
}

/// A dispatched network: a bare base network or a multi-task composition.
#[derive(Module, Debug)]
pub enum Network<B: Backend> {
    Base(BaseNetworkEnum<B>),
    MultiTask(MultiTaskNet<B>),
}

/// Output of `Network::forward`.
#[derive(Debug, Clone)]
pub enum NetworkOutput<B: Backend> {
    Base(BaseOutput<B>),
    MultiTask(MultiTaskOutput<B>),
}

impl<B: Backend> NetworkOutput<B> {
    /// Segmentation logits of either variant.
    pub const fn segmentation(&self) -> &Tensor<B, 4> {
        match self {
            Self::Base(output) => &output.segmentation,
            Self::MultiTask(output) => output.segmentation(),
        }
    }
}

impl<B: Backend> Network<B> {
    /// Display name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Base(model) => model.name(),
            Self::MultiTask(model) => model.name(),
        }
    }

    /// Identity of the base architecture.
    pub fn architecture(&self) -> Architecture {
        match self {
            Self::Base(model) => model.architecture(),
            Self::MultiTask(model) => model.base().architecture(),
        }
    }

    /// # Errors
    ///
    /// Propagates base network and head errors.
    pub fn forward(&self, input: NetworkInput<B>) -> GeoMtlResult<NetworkOutput<B>> {
        match self {
            Self::Base(model) => model.forward(input).map(NetworkOutput::Base),
            Self::MultiTask(model) => model.forward(input).map(NetworkOutput::MultiTask),
        }
    }
}

/// Builds the network described by a typed configuration.
///
/// # Errors
///
/// Returns a configuration error if validation fails.
pub fn build_network<B: Backend>(
    config: &ModelConfig,
    geo_info: &GeoInfoConfig,
    device: &Device<B>,
) -> GeoMtlResult<Network<B>> {
    let base = build_base_network(config, geo_info, device)?;

    let network = match config.strategy {
        Strategy::None => Network::Base(base),
        Strategy::MultiTask => {
            Network::MultiTask(MultiTaskNetConfig::from(config.multitask).init(base, device))
        }
    };

    tracing::info!(
        model = network.name(),
        architecture = %config.architecture,
        "model selected",
    );

    Ok(network)
}

/// Builds the network described by raw model parameters.
///
/// # Errors
///
/// Returns `GeoMtlError::UnsupportedArchitecture` for an unknown `model_name`
/// and `GeoMtlError::InvalidConfiguration` for any other rejected parameter.
pub fn choose_model<B: Backend>(
    params: &ModelParams,
    geo_info: &GeoInfoConfig,
    device: &Device<B>,
) -> GeoMtlResult<Network<B>> {
    let config = ModelConfig::try_from(params)?;
    build_network(&config, geo_info, device)
}
