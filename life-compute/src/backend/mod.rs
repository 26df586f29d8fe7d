//! # Compute Backends
//!
//! Implementations of the ComputeBackend trait for CPU and GPU.

mod cpu;
mod gpu;

pub use cpu::{CpuBackend, KernelArgs, NativeKernel};
pub use gpu::GpuBackend;
pub(crate) use gpu::adapter_score;
