//! # Base Network Contract
//!
//! Every base architecture produces the same five named outputs so the
//! multi-task composer can attach its heads without knowing the concrete
//! network.

use burn::prelude::*;

use crate::config::{Architecture, ArchitectureFamily};
use crate::error::{GeoMtlError, GeoMtlResult};

/// Per-sample geo side-input for the geo-aware architectures.
#[derive(Debug, Clone)]
pub struct GeoFeatures<B: Backend> {
    /// Normalized coordinates, `[batch_size, 2]`.
    pub coords: Tensor<B, 2>,
    /// Encoded acquisition time, `[batch_size, 2]`.
    pub time: Tensor<B, 2>,
    /// One-hot acquisition domain, `[batch_size, num_domains]`.
    pub domain: Tensor<B, 2>,
    /// Per-image class distribution, `[batch_size, num_classes]`.
    pub label_distr: Tensor<B, 2>,
}

/// Input of a forward pass.
#[derive(Debug, Clone)]
pub struct NetworkInput<B: Backend> {
    /// Imagery, `[batch_size, channels, height, width]`.
    pub images: Tensor<B, 4>,
    /// Side-input, required by geo-aware architectures only.
    pub geo: Option<GeoFeatures<B>>,
}

impl<B: Backend> NetworkInput<B> {
    pub const fn new(images: Tensor<B, 4>) -> Self {
        Self { images, geo: None }
    }

    #[must_use]
    pub fn with_geo(mut self, geo: GeoFeatures<B>) -> Self {
        self.geo = Some(geo);
        self
    }
}

impl<B: Backend> From<Tensor<B, 4>> for NetworkInput<B> {
    fn from(images: Tensor<B, 4>) -> Self {
        Self::new(images)
    }
}

/// The five outputs of a base network.
#[derive(Debug, Clone)]
pub struct BaseOutput<B: Backend> {
    /// The two highest-resolution encoder feature maps.
    pub early: [Tensor<B, 4>; 2],
    /// Deepest encoder feature map.
    pub bottleneck: Tensor<B, 4>,
    /// Last decoder feature map, right before the segmentation convolution.
    pub pre_head: Tensor<B, 4>,
    /// Segmentation logits, `[batch_size, num_classes, height, width]`.
    pub segmentation: Tensor<B, 4>,
}

/// Capability shared by every base architecture.
pub trait BaseNetwork<B: Backend> {
    /// Identity of the network.
    fn architecture(&self) -> Architecture;

    /// Runs the encoder-decoder.
    ///
    /// # Errors
    ///
    /// Returns an error when required side-input is missing or malformed.
    fn forward(&self, input: NetworkInput<B>) -> GeoMtlResult<BaseOutput<B>>;

    /// Display name.
    fn name(&self) -> &'static str {
        self.architecture().name()
    }

    /// Family used to size the auxiliary heads.
    fn family(&self) -> ArchitectureFamily {
        self.architecture().family()
    }
}

/// Checks that both spatial sides of `images` are positive multiples of `stride`.
///
/// # Errors
///
/// Returns `GeoMtlError::ShapeMismatch` naming the closest accepted side.
pub(crate) fn check_input_stride<B: Backend>(
    images: &Tensor<B, 4>,
    stride: usize,
) -> GeoMtlResult<()> {
    let [_, _, height, width] = images.dims();

    for side in [height, width] {
        if side == 0 || side % stride != 0 {
            return Err(GeoMtlError::ShapeMismatch {
                tensor: "input image side",
                expected: (side / stride).max(1) * stride,
                actual: side,
            });
        }
    }

    Ok(())
}
