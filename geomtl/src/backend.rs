//! Compile-time backend selection for the `geomtl` binary.
//!
//! `ndarray` is the default CPU backend; enabling `wgpu` switches to the GPU.

use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(feature = "wgpu")] {
        pub type SelectedBackend = burn::backend::Wgpu;
        pub type SelectedDevice = burn::backend::wgpu::WgpuDevice;

        /// Human-readable backend name for logs.
        pub const BACKEND_NAME: &str = "wgpu";
    } else {
        pub type SelectedBackend = burn::backend::NdArray;
        pub type SelectedDevice = burn::backend::ndarray::NdArrayDevice;

        /// Human-readable backend name for logs.
        pub const BACKEND_NAME: &str = "ndarray";
    }
}

/// Default device of [`SelectedBackend`].
pub fn create_device() -> SelectedDevice {
    SelectedDevice::default()
}

#[cfg(all(test, not(feature = "wgpu")))]
mod tests {
    use super::*;
    use burn::prelude::*;

    #[test]
    fn test_default_backend_is_ndarray() {
        assert_eq!(BACKEND_NAME, "ndarray");

        let zeros = Tensor::<SelectedBackend, 2>::zeros([2, 3], &create_device());
        assert_eq!(zeros.dims(), [2, 3]);
    }
}
