//! # Life Compute
//!
//! Compute backends and the simulation engine.
//!
//! This crate provides two backends behind `ComputeBackend`:
//! - **CPU**: single-threaded reference, runs native twins of the WGSL kernels
//! - **GPU**: wgpu, runs the WGSL kernels on the best adapter found
//!
//! ## Backend Selection
//!
//! `compute.backend` in the config (or `LIFE_BACKEND`):
//! - `cpu` - Force CPU backend
//! - `gpu` - Force GPU backend
//! - `auto` (default) - GPU if an adapter exists, otherwise CPU

pub mod backend;
pub mod compiler;
pub mod context;
pub mod engine;
pub mod shaders;

pub use backend::{CpuBackend, GpuBackend, KernelArgs, NativeKernel};
pub use compiler::{CompiledProgram, KernelCompiler, KernelSignature, KernelSource};
pub use context::SimulationContext;
pub use engine::{SimulationEngine, TickReport};

use life_core::config::{ComputeBackendType, LifeConfig};
use life_core::error::LifeResult;
use life_core::traits::ComputeBackend;

use backend::adapter_score;

/// Create the appropriate compute backend based on configuration
pub fn create_backend(config: &LifeConfig) -> LifeResult<Box<dyn ComputeBackend>> {
    match config.compute.backend {
        ComputeBackendType::Auto => match GpuBackend::new(config) {
            Ok(gpu) => {
                tracing::info!("Using GPU backend (wgpu)");
                Ok(Box::new(gpu))
            }
            Err(e) => {
                tracing::warn!("GPU not available ({}), falling back to CPU", e);
                Ok(Box::new(CpuBackend::new()))
            }
        },
        ComputeBackendType::Cpu => {
            tracing::info!("Using CPU backend (reference)");
            Ok(Box::new(CpuBackend::new()))
        }
        ComputeBackendType::Gpu => {
            tracing::info!("Using GPU backend (wgpu)");
            Ok(Box::new(GpuBackend::new(config)?))
        }
    }
}

/// Check if GPU is available on this system
pub fn gpu_available() -> bool {
    !enumerate_adapters().is_empty()
}

/// Get information about available compute devices
pub fn device_info() -> Vec<DeviceInfo> {
    enumerate_adapters()
        .into_iter()
        .map(|adapter| DeviceInfo::from(adapter.get_info()))
        .collect()
}

/// The adapter `GpuBackend::new` would pick
pub fn preferred_device(prefer_discrete: bool) -> Option<DeviceInfo> {
    enumerate_adapters()
        .into_iter()
        .map(|adapter| adapter.get_info())
        .max_by_key(|info| adapter_score(info.device_type, prefer_discrete))
        .map(DeviceInfo::from)
}

fn enumerate_adapters() -> Vec<wgpu::Adapter> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
    pollster::block_on(instance.enumerate_adapters(wgpu::Backends::all()))
}

/// Information about a compute device
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub vendor: String,
    pub device_type: String,
    pub backend: String,
}

impl From<wgpu::AdapterInfo> for DeviceInfo {
    fn from(info: wgpu::AdapterInfo) -> Self {
        Self {
            name: info.name,
            vendor: info.vendor.to_string(),
            device_type: format!("{:?}", info.device_type),
            backend: format!("{:?}", info.backend),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_cpu_backend() {
        let mut config = LifeConfig::default();
        config.compute.backend = ComputeBackendType::Cpu;
        assert_eq!(create_backend(&config).unwrap().name(), "CPU");
    }

    #[test]
    fn test_auto_always_yields_a_backend() {
        let config = LifeConfig::default();
        let backend = create_backend(&config).unwrap();
        assert!(matches!(backend.name(), "CPU" | "GPU"));
    }

    #[test]
    fn test_device_info_matches_availability() {
        assert_eq!(gpu_available(), !device_info().is_empty());
        assert_eq!(gpu_available(), preferred_device(true).is_some());
    }
}
