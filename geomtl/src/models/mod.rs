//! # Model Architectures
//!
//! - `base`: the five-output contract every base network fulfils
//! - `unet`, `geo_unet`, `resunet`: the base architectures
//! - `dimensions`: head input sizes per architecture family and attachment point
//! - `multitask`: the composer adding coordinate and time regression heads
//! - `dispatch`: architecture registry and model selection
//! - `modules`: shared building blocks

pub mod base;
pub mod dimensions;
pub mod dispatch;
pub mod geo_unet;
pub mod modules;
pub mod multitask;
pub mod resunet;
pub mod unet;
