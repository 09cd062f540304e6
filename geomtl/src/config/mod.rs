//! Configuration module.
//!
//! - `core`: the raw parameter mapping, the typed model configuration and the
//!   geo side-input description
//! - `enums`: architecture identifiers, families and composition strategies

pub mod core;
pub mod enums;

pub use core::{
    GeoFlags, GeoInfoConfig, ModelConfig, ModelParams, MultiTaskFlags, MAX_POS_ENC_FREQUENCIES,
};
pub use enums::{Architecture, ArchitectureFamily, Strategy};
