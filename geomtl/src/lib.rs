//! # geomtl
//!
//! Segmentation networks for aerial imagery with auxiliary geolocation and
//! acquisition-time regression heads, built with the Burn deep learning
//! framework.
//!
//! ## Modules
//!
//! - `config`: raw experiment parameters and the typed model configuration.
//! - `error`: the crate error type.
//! - `models`: base architectures, the head dimension resolver, the
//!   multi-task composer and the architecture dispatcher.
//! - `backend`: compile-time backend selection for the binary.
//!
//! ## Key Components
//!
//! - `choose_model`: builds a `Network` from `ModelParams`.
//! - `MultiTaskNet`: a base network composed with regression heads.
//! - `resolve_head_input`: the head input dimension table.

pub mod backend;
mod config;
mod error;
mod models;

#[doc(inline)]
pub use config::{
    Architecture, ArchitectureFamily, GeoFlags, GeoInfoConfig, ModelConfig, ModelParams,
    MultiTaskFlags, Strategy, MAX_POS_ENC_FREQUENCIES,
};
#[doc(inline)]
pub use error::{GeoMtlError, GeoMtlResult};
#[doc(inline)]
pub use models::{
    base::{BaseNetwork, BaseOutput, GeoFeatures, NetworkInput},
    dimensions::{
        resolve_head_input, AdapterPlan, FeatureSource, HeadInput, ADAPTED_DIM,
        ASSUMED_INPUT_SIZE, POOL_WINDOW,
    },
    dispatch::{
        build_base_network, build_network, choose_model, BaseNetworkEnum, Network, NetworkOutput,
    },
    geo_unet::{GeoUNet, GeoUNetConfig},
    modules::{GeoEncoder, GeoEncoderConfig, RegressionHead, RegressionHeadConfig},
    multitask::{HeadPlan, MultiTaskNet, MultiTaskNetConfig, MultiTaskOutput},
    resunet::{ResUNet, ResUNetConfig},
    unet::{UNet, UNetConfig},
};
