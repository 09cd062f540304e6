//! # Multi-Task Network
//!
//! Wraps a base network with a coordinate regression head and, optionally, a
//! time regression head. The coordinate head is sized by the dimension
//! resolver at construction; every forward call checks that the selected
//! feature map flattens to exactly that size.

use burn::{
    nn::pool::{MaxPool2d, MaxPool2dConfig},
    prelude::*,
};

use super::base::{BaseNetwork, BaseOutput, NetworkInput};
use super::dimensions::{
    resolve_head_input, AdapterPlan, FeatureSource, HeadInput, ADAPTED_DIM, POOL_WINDOW,
};
use super::dispatch::BaseNetworkEnum;
use super::modules::{EncoderConv, EncoderConvConfig, RegressionHead, RegressionHeadConfig};
use crate::config::{ArchitectureFamily, MultiTaskFlags};
use crate::error::{GeoMtlError, GeoMtlResult};

/// Hidden widths and output width of the coordinate head.
pub const COORDS_HEAD_LAYERS: ([usize; 2], usize) = ([1024, 256], 256);

/// Hidden widths and output width of the time head.
pub const TIME_HEAD_LAYERS: ([usize; 2], usize) = ([512, 128], 4);

/// Configuration for the `MultiTaskNet` model.
#[derive(Config, Debug)]
pub struct MultiTaskNetConfig {
    /// Build the time regression head.
    #[config(default = "false")]
    pub use_time: bool,
    /// Max-pool the selected feature map before the coordinate head.
    #[config(default = "true")]
    pub pooling: bool,
    /// Attach the coordinate head to the bottleneck instead of the pre-head features.
    #[config(default = "true")]
    pub after_encoder: bool,
}

/// Everything the composer allocates, resolved before any parameter exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadPlan {
    /// Coordinate head input.
    pub coords: HeadInput,
    /// Adapter. Built for the adapted coordinate source and, beyond that,
    /// whenever the time head is enabled, since the time head always reads
    /// the adapted pre-head features.
    pub adapter: Option<AdapterPlan>,
    /// Time head input, when enabled.
    pub time_input_dim: Option<usize>,
}

impl From<MultiTaskFlags> for MultiTaskNetConfig {
    fn from(flags: MultiTaskFlags) -> Self {
        Self::new()
            .with_use_time(flags.use_time)
            .with_pooling(flags.pooling)
            .with_after_encoder(flags.after_encoder)
    }
}

impl MultiTaskNetConfig {
    /// Resolves the head layout for a base network of the given family.
    pub const fn plan(&self, family: ArchitectureFamily) -> HeadPlan {
        let coords = resolve_head_input(family, self.after_encoder, self.pooling);

        let adapter = match coords.adapter {
            Some(plan) => Some(plan),
            // the time head always reads the adapted pre-head features
            None if self.use_time => Some(AdapterPlan::for_family(family)),
            None => None,
        };

        HeadPlan {
            coords,
            adapter,
            time_input_dim: if self.use_time {
                Some(ADAPTED_DIM)
            } else {
                None
            },
        }
    }

    /// Initializes a `MultiTaskNet` around `base`.
    pub fn init<B: Backend>(&self, base: BaseNetworkEnum<B>, device: &Device<B>) -> MultiTaskNet<B> {
        let plan = self.plan(base.family());

        tracing::debug!(
            base = base.name(),
            coords_input_dim = plan.coords.dim,
            source = ?plan.coords.source,
            adapter = plan.adapter.is_some(),
            time_input_dim = ?plan.time_input_dim,
            "resolved multi-task heads",
        );

        let pool = self.pooling.then(|| {
            MaxPool2dConfig::new([POOL_WINDOW, POOL_WINDOW])
                .with_strides([POOL_WINDOW, POOL_WINDOW])
                .init()
        });

        let adapter = plan.adapter.map(|adapter| {
            let [mid, out] = adapter.stage_channels;
            Adapter {
                stage1: EncoderConvConfig::new(adapter.in_channels, mid).init(device),
                stage2: EncoderConvConfig::new(mid, out).init(device),
            }
        });

        let (hidden, output) = COORDS_HEAD_LAYERS;
        let coords_head = RegressionHeadConfig::new(plan.coords.dim, hidden, output).init(device);

        let time_head = plan.time_input_dim.map(|input_dim| {
            let (hidden, output) = TIME_HEAD_LAYERS;
            RegressionHeadConfig::new(input_dim, hidden, output).init(device)
        });

        MultiTaskNet {
            base,
            pool,
            adapter,
            coords_head,
            time_head,
            after_encoder: self.after_encoder,
        }
    }
}

/// Two `EncoderConv` stages taking the pre-head features to `64 x H/4 x W/4`.
#[derive(Module, Debug)]
pub struct Adapter<B: Backend> {
    stage1: EncoderConv<B>,
    stage2: EncoderConv<B>,
}

impl<B: Backend> Adapter<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.stage2.forward(self.stage1.forward(x))
    }
}

/// Outputs of the multi-task network; the variant is fixed at construction.
#[derive(Debug, Clone)]
pub enum MultiTaskOutput<B: Backend> {
    /// Segmentation logits and coordinates.
    Geo(Tensor<B, 4>, Tensor<B, 2>),
    /// Segmentation logits, coordinates and time.
    GeoTime(Tensor<B, 4>, Tensor<B, 2>, Tensor<B, 2>),
}

impl<B: Backend> MultiTaskOutput<B> {
    /// Number of returned tensors: 2 or 3.
    pub const fn len(&self) -> usize {
        match self {
            Self::Geo(..) => 2,
            Self::GeoTime(..) => 3,
        }
    }

    pub const fn is_empty(&self) -> bool {
        false
    }

    pub const fn segmentation(&self) -> &Tensor<B, 4> {
        match self {
            Self::Geo(segmentation, _) | Self::GeoTime(segmentation, _, _) => segmentation,
        }
    }

    /// `[batch_size, 256]`
    pub const fn coords(&self) -> &Tensor<B, 2> {
        match self {
            Self::Geo(_, coords) | Self::GeoTime(_, coords, _) => coords,
        }
    }

    /// `[batch_size, 4]`, present only when the time head is enabled.
    pub const fn time(&self) -> Option<&Tensor<B, 2>> {
        match self {
            Self::Geo(..) => None,
            Self::GeoTime(_, _, time) => Some(time),
        }
    }
}

/// A base network composed with regression heads.
#[derive(Module, Debug)]
pub struct MultiTaskNet<B: Backend> {
    base: BaseNetworkEnum<B>,
    pool: Option<MaxPool2d>,
    adapter: Option<Adapter<B>>,
    coords_head: RegressionHead<B>,
    time_head: Option<RegressionHead<B>>,
    after_encoder: bool,
}

impl<B: Backend> MultiTaskNet<B> {
    /// Display name.
    pub const fn name(&self) -> &'static str {
        if self.time_head.is_some() {
            "GeoTimeMultiTaskNet"
        } else {
            "GeoMultiTaskNet"
        }
    }

    /// The wrapped base network.
    pub const fn base(&self) -> &BaseNetworkEnum<B> {
        &self.base
    }

    /// Feature map consumed by the coordinate head.
    pub const fn source(&self) -> FeatureSource {
        match (self.pool.is_some(), self.after_encoder) {
            (true, true) => FeatureSource::PooledBottleneck,
            (true, false) => FeatureSource::PooledPreHead,
            (false, true) => FeatureSource::Bottleneck,
            (false, false) => FeatureSource::AdaptedPreHead,
        }
    }

    /// Flattened input size of the coordinate head.
    pub const fn coords_input_dim(&self) -> usize {
        self.coords_head.input_dim()
    }

    /// Flattened input size of the time head, if any.
    pub fn time_input_dim(&self) -> Option<usize> {
        self.time_head.as_ref().map(RegressionHead::input_dim)
    }

    /// Whether the downsampling adapter was built.
    pub const fn has_adapter(&self) -> bool {
        self.adapter.is_some()
    }

    /// Runs the base network and the regression heads.
    ///
    /// # Errors
    ///
    /// Returns `GeoMtlError::ShapeMismatch` when a selected feature map does
    /// not flatten to the size its head was built for, and propagates errors
    /// of the base network.
    pub fn forward(&self, input: NetworkInput<B>) -> GeoMtlResult<MultiTaskOutput<B>> {
        let BaseOutput {
            bottleneck,
            pre_head,
            segmentation,
            ..
        } = self.base.forward(input)?;

        let adapted = self
            .adapter
            .as_ref()
            .map(|adapter| adapter.forward(pre_head.clone()));

        let features = match (&self.pool, self.after_encoder) {
            (Some(pool), true) => pool.forward(bottleneck),
            (Some(pool), false) => pool.forward(pre_head),
            (None, true) => bottleneck,
            (None, false) => adapted
                .clone()
                .ok_or_else(|| missing_adapter("coordinate head"))?,
        };

        let coords = self.coords_head.forward(flatten_checked(
            features,
            self.coords_head.input_dim(),
            "coordinate head",
        )?);

        match &self.time_head {
            None => Ok(MultiTaskOutput::Geo(segmentation, coords)),
            Some(time_head) => {
                let adapted = adapted.ok_or_else(|| missing_adapter("time head"))?;
                let time = time_head.forward(flatten_checked(
                    adapted,
                    time_head.input_dim(),
                    "time head",
                )?);
                Ok(MultiTaskOutput::GeoTime(segmentation, coords, time))
            }
        }
    }
}

fn missing_adapter(head: &str) -> GeoMtlError {
    GeoMtlError::InvalidConfiguration {
        reason: format!("{head} reads adapted features but no adapter was built"),
    }
}

/// Flattens `[N, C, H, W]` to `[N, C * H * W]` after checking the feature count.
fn flatten_checked<B: Backend>(
    x: Tensor<B, 4>,
    expected: usize,
    tensor: &'static str,
) -> GeoMtlResult<Tensor<B, 2>> {
    let [batch_size, channels, height, width] = x.dims();
    let actual = channels * height * width;

    if actual != expected {
        return Err(GeoMtlError::ShapeMismatch {
            tensor,
            expected,
            actual,
        });
    }

    Ok(x.reshape([batch_size, actual]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resunet::ResUNetConfig;
    use crate::models::unet::UNetConfig;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn unet(device: &Device<TestBackend>) -> BaseNetworkEnum<TestBackend> {
        BaseNetworkEnum::UNet(UNetConfig::new(5, 13).init(device))
    }

    fn resunet(device: &Device<TestBackend>) -> BaseNetworkEnum<TestBackend> {
        BaseNetworkEnum::ResUNet(ResUNetConfig::new(5, 13).init(device))
    }

    fn images(size: usize) -> NetworkInput<TestBackend> {
        let device = Default::default();
        NetworkInput::new(Tensor::random(
            [1, 5, size, size],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        ))
    }

    fn config(use_time: bool, pooling: bool, after_encoder: bool) -> MultiTaskNetConfig {
        MultiTaskNetConfig::new()
            .with_use_time(use_time)
            .with_pooling(pooling)
            .with_after_encoder(after_encoder)
    }

    #[test]
    fn test_plan_adapter_without_pooling_before_encoder_output() {
        let plan = config(false, false, false).plan(ArchitectureFamily::Standard);

        assert_eq!(plan.coords.dim, 262_144);
        assert_eq!(plan.coords.source, FeatureSource::AdaptedPreHead);
        assert_eq!(plan.adapter.map(|adapter| adapter.in_channels), Some(16));
        assert_eq!(plan.time_input_dim, None);
    }

    #[test]
    fn test_plan_time_head_input_is_fixed() {
        for family in [ArchitectureFamily::Residual, ArchitectureFamily::Standard] {
            for pooling in [true, false] {
                for after_encoder in [true, false] {
                    let plan = config(true, pooling, after_encoder).plan(family);
                    assert_eq!(plan.time_input_dim, Some(64 * 64 * 64));
                    assert_eq!(
                        plan.adapter.map(|adapter| adapter.in_channels),
                        Some(family.pre_head_channels())
                    );
                }
            }
        }
    }

    #[test]
    fn test_plan_without_time_builds_adapter_only_when_required() {
        for family in [ArchitectureFamily::Residual, ArchitectureFamily::Standard] {
            assert!(config(false, true, true).plan(family).adapter.is_none());
            assert!(config(false, false, true).plan(family).adapter.is_none());
            assert!(config(false, true, false).plan(family).adapter.is_none());
            assert!(config(false, false, false).plan(family).adapter.is_some());
        }
    }

    #[test]
    fn test_residual_pooled_bottleneck() {
        let device = Default::default();
        let model = config(false, true, true).init(resunet(&device), &device);

        assert_eq!(model.coords_input_dim(), 512);
        assert!(!model.has_adapter());
        assert_eq!(model.name(), "GeoMultiTaskNet");

        let output = model.forward(images(256)).unwrap();

        assert_eq!(output.len(), 2);
        assert_eq!(output.segmentation().dims(), [1, 13, 256, 256]);
        assert_eq!(output.coords().dims(), [1, 256]);
        assert!(output.time().is_none());
    }

    #[test]
    fn test_residual_raw_bottleneck() {
        let device = Default::default();
        let model = config(false, false, true).init(resunet(&device), &device);

        assert_eq!(model.coords_input_dim(), 32768);
        assert_eq!(model.source(), FeatureSource::Bottleneck);

        let output = model.forward(images(256)).unwrap();
        assert_eq!(output.coords().dims(), [1, 256]);
    }

    #[test]
    fn test_standard_pooled_pre_head() {
        let device = Default::default();
        let model = config(false, true, false).init(unet(&device), &device);

        assert_eq!(model.coords_input_dim(), 16384);
        assert_eq!(model.source(), FeatureSource::PooledPreHead);

        let output = model.forward(images(256)).unwrap();
        assert_eq!(output.len(), 2);
        assert_eq!(output.coords().dims(), [1, 256]);
    }

    #[test]
    fn test_time_head_returns_four_values() {
        let device = Default::default();
        let model = config(true, true, true).init(unet(&device), &device);

        assert_eq!(model.name(), "GeoTimeMultiTaskNet");
        assert_eq!(model.time_input_dim(), Some(262_144));
        assert!(model.has_adapter());

        let output = model.forward(images(256)).unwrap();

        assert_eq!(output.len(), 3);
        assert_eq!(output.coords().dims(), [1, 256]);
        assert_eq!(output.time().map(Tensor::dims), Some([1, 4]));
    }

    #[test]
    fn test_unexpected_resolution_is_a_shape_mismatch() {
        let device = Default::default();
        let model = config(false, true, true).init(unet(&device), &device);

        // 128x128 input: bottleneck 256 x 8 x 8, pooled to 256 x 1 x 1
        match model.forward(images(128)) {
            Err(GeoMtlError::ShapeMismatch {
                tensor,
                expected,
                actual,
            }) => {
                assert_eq!(tensor, "coordinate head");
                assert_eq!(expected, 1024);
                assert_eq!(actual, 256);
            }
            other => panic!("Expected ShapeMismatch error, got {other:?}"),
        }
    }

    #[test]
    fn test_residual_pooled_pre_head() {
        let device = Default::default();
        let model = config(false, true, false).init(resunet(&device), &device);

        assert_eq!(model.coords_input_dim(), 32 * 32 * 32);
        assert_eq!(model.source(), FeatureSource::PooledPreHead);

        let output = model.forward(images(256)).unwrap();
        assert_eq!(output.len(), 2);
        assert_eq!(output.segmentation().dims(), [1, 13, 256, 256]);
        assert_eq!(output.coords().dims(), [1, 256]);
    }

    #[test]
    fn test_time_head_on_pooled_pre_head() {
        let device = Default::default();
        let model = config(true, true, false).init(unet(&device), &device);

        assert_eq!(model.source(), FeatureSource::PooledPreHead);
        assert_eq!(model.coords_input_dim(), 16384);
        assert!(model.has_adapter());

        let output = model.forward(images(256)).unwrap();

        assert_eq!(output.len(), 3);
        assert_eq!(output.coords().dims(), [1, 256]);
        assert_eq!(output.time().map(Tensor::dims), Some([1, 4]));
    }

    #[test]
    fn test_time_head_returns_four_values_for_every_source() {
        let device = Default::default();

        for (pooling, after_encoder) in [(true, true), (false, true), (true, false)] {
            let model = config(true, pooling, after_encoder).init(resunet(&device), &device);
            let output = model.forward(images(256)).unwrap();

            assert_eq!(output.len(), 3);
            assert_eq!(output.time().map(Tensor::dims), Some([1, 4]));
        }
    }

    #[test]
    fn test_adapter_output_fills_adapted_dim() {
        let device = Default::default();

        for family in [ArchitectureFamily::Residual, ArchitectureFamily::Standard] {
            let plan = AdapterPlan::for_family(family);
            let [mid, out] = plan.stage_channels;
            let adapter = Adapter {
                stage1: EncoderConvConfig::new(plan.in_channels, mid).init(&device),
                stage2: EncoderConvConfig::new(mid, out).init(&device),
            };
            let pre_head =
                Tensor::<TestBackend, 4>::zeros([2, plan.in_channels, 256, 256], &device);

            let adapted = adapter.forward(pre_head);
            assert_eq!(adapted.dims(), [2, 64, 64, 64]);

            let flattened = flatten_checked(adapted, ADAPTED_DIM, "time head").unwrap();
            assert_eq!(flattened.dims(), [2, ADAPTED_DIM]);
        }
    }

    #[test]
    fn test_side_off_stride_is_a_shape_mismatch() {
        let device = Default::default();
        let fdm_unet =
            BaseNetworkEnum::UNet(UNetConfig::new(5, 13).with_transposed(true).init(&device));

        for base in [resunet(&device), fdm_unet] {
            let model = config(false, true, true).init(base, &device);

            match model.forward(images(200)) {
                Err(GeoMtlError::ShapeMismatch { tensor, actual, .. }) => {
                    assert_eq!(tensor, "input image side");
                    assert_eq!(actual, 200);
                }
                other => panic!("Expected ShapeMismatch error, got {other:?}"),
            }
        }
    }

    #[test]
    #[ignore = "allocates more than 1 GiB of head parameters"]
    fn test_shared_adapter_forward() {
        let device = Default::default();
        let model = config(true, false, false).init(unet(&device), &device);

        assert_eq!(model.source(), FeatureSource::AdaptedPreHead);
        assert_eq!(model.time_input_dim(), Some(262_144));

        let output = model.forward(images(256)).unwrap();
        assert_eq!(output.coords().dims(), [1, 256]);
        assert_eq!(output.time().map(Tensor::dims), Some([1, 4]));
    }

    #[test]
    #[ignore = "allocates more than 1 GiB of head parameters"]
    fn test_adapted_pre_head_forward() {
        let device = Default::default();
        let model = config(false, false, false).init(unet(&device), &device);

        assert!(model.has_adapter());
        assert_eq!(model.coords_input_dim(), 262_144);

        let output = model.forward(images(256)).unwrap();
        assert_eq!(output.coords().dims(), [1, 256]);
    }
}
