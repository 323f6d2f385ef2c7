pub mod data;
pub mod render;

use burn::backend::ndarray::NdArrayDevice;
use burn::backend::{Autodiff, NdArray};

pub type TestBackend = NdArray<f32>;
pub type TestAutodiffBackend = Autodiff<TestBackend>;

pub fn test_device() -> NdArrayDevice {
    NdArrayDevice::Cpu
}

/// Routes `log` output through the test harness. Safe to call from every test.
pub fn init_test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
