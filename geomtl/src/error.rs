use thiserror::Error;

/// The error type for `geomtl` operations.
///
/// Configuration errors surface while a network is being assembled; shape and
/// side-input errors surface on the first forward call that violates the
/// network's declared dimensions.
#[derive(Error, Debug)]
pub enum GeoMtlError {
    /// The configured architecture identifier is not in the registry.
    #[error("Unsupported architecture: {architecture}")]
    UnsupportedArchitecture {
        /// The identifier as it appeared in the configuration.
        architecture: String,
    },

    /// The configuration is logically inconsistent or out of range.
    #[error("Invalid model configuration: {reason}")]
    InvalidConfiguration {
        /// Why the configuration was rejected.
        reason: String,
    },

    /// A flattened tensor does not match the input size its consumer was built for.
    #[error("Shape mismatch for {tensor}: expected {expected} features, got {actual}")]
    ShapeMismatch {
        /// The consumer whose input was malformed.
        tensor: &'static str,
        /// The feature count declared at construction.
        expected: usize,
        /// The feature count observed at call time.
        actual: usize,
    },

    /// A geo-aware network was called without its side-input.
    #[error("{architecture} requires geo side-input but none was provided")]
    MissingGeoInput {
        /// Display name of the network.
        architecture: &'static str,
    },
}

impl GeoMtlError {
    /// Returns `true` for errors raised while assembling a network.
    #[must_use]
    pub const fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedArchitecture { .. } | Self::InvalidConfiguration { .. }
        )
    }
}

/// A specialized `Result` type for `geomtl` operations.
pub type GeoMtlResult<T> = Result<T, GeoMtlError>;
