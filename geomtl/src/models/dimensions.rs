//! # Head Input Dimensions
//!
//! Resolves the flattened feature count feeding the coordinate head from the
//! architecture family and the attachment flags.
//!
//! The table is tied to a 256x256 input. It is not derived from observed
//! tensor shapes: any other input resolution is caught at the first forward
//! call by the composer's shape check.
//!
//! | after_encoder | pooling | residual | standard |
//! |---|---|---|---|
//! | true | false | 32768 | 65536 |
//! | true | true | 512 | 1024 |
//! | false | false | 262144 (adapter) | 262144 (adapter) |
//! | false | true | 32768 | 16384 |

use crate::config::ArchitectureFamily;

/// Input resolution the table is tabulated for.
pub const ASSUMED_INPUT_SIZE: [usize; 2] = [256, 256];

/// Window and stride of the max-pool applied when pooling is enabled.
pub const POOL_WINDOW: usize = 8;

/// Output channels of the two adapter stages.
pub const ADAPTER_CHANNELS: [usize; 2] = [32, 64];

/// Flattened adapter output (`64 x 64 x 64`), also the time head input.
pub const ADAPTED_DIM: usize = 64 * 64 * 64;

/// Which base-network output the coordinate head consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureSource {
    /// Max-pooled bottleneck.
    PooledBottleneck,
    /// Max-pooled pre-head features.
    PooledPreHead,
    /// Raw bottleneck.
    Bottleneck,
    /// Pre-head features passed through the two-stage adapter.
    AdaptedPreHead,
}

/// Channel plan of the two-stage downsampling adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterPlan {
    /// Raw pre-head channels of the family.
    pub in_channels: usize,
    /// Output channels of the first and second stage.
    pub stage_channels: [usize; 2],
}

impl AdapterPlan {
    /// Adapter for the pre-head features of `family`.
    #[must_use]
    pub const fn for_family(family: ArchitectureFamily) -> Self {
        Self {
            in_channels: family.pre_head_channels(),
            stage_channels: ADAPTER_CHANNELS,
        }
    }
}

/// Resolved coordinate head input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadInput {
    /// Flattened feature count.
    pub dim: usize,
    /// Tensor selected at call time.
    pub source: FeatureSource,
    /// Present only when the source is `AdaptedPreHead`.
    pub adapter: Option<AdapterPlan>,
}

/// Resolves the coordinate head input for the given family and flags.
#[must_use]
pub const fn resolve_head_input(
    family: ArchitectureFamily,
    after_encoder: bool,
    pooling: bool,
) -> HeadInput {
    use ArchitectureFamily::{Residual, Standard};

    let (dim, source) = match (after_encoder, pooling, family) {
        (true, false, Residual) => (32768, FeatureSource::Bottleneck),
        (true, false, Standard) => (65536, FeatureSource::Bottleneck),
        (true, true, Residual) => (512, FeatureSource::PooledBottleneck),
        (true, true, Standard) => (1024, FeatureSource::PooledBottleneck),
        (false, false, _) => (ADAPTED_DIM, FeatureSource::AdaptedPreHead),
        (false, true, Residual) => (32 * 32 * 32, FeatureSource::PooledPreHead),
        (false, true, Standard) => (16 * 32 * 32, FeatureSource::PooledPreHead),
    };

    let adapter = match source {
        FeatureSource::AdaptedPreHead => Some(AdapterPlan::for_family(family)),
        _ => None,
    };

    HeadInput {
        dim,
        source,
        adapter,
    }
}
