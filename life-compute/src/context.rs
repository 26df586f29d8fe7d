//! # Simulation Context
//!
//! The compute backend plus the compiled kernel program, created once at
//! startup and passed by reference to whatever dispatches work.

use life_core::config::LifeConfig;
use life_core::error::LifeResult;
use life_core::kernel::Kernel;
use life_core::traits::{ComputeBackend, ProgramId};

use crate::compiler::KernelSource;
use crate::create_backend;

/// Backend and compiled program
pub struct SimulationContext {
    backend: Box<dyn ComputeBackend>,
    program: ProgramId,
}

impl SimulationContext {
    /// Compile `source` on `backend`
    pub fn new(mut backend: Box<dyn ComputeBackend>, source: &KernelSource) -> LifeResult<Self> {
        let text = source.load()?;
        let program = backend.compile_program(&text)?;
        tracing::info!("Compiled {} for the {} backend", source, backend.name());
        Ok(Self { backend, program })
    }

    /// Backend and kernel source as configured
    pub fn from_config(config: &LifeConfig) -> LifeResult<Self> {
        let backend = create_backend(config)?;
        Self::new(backend, &KernelSource::from_config(&config.kernels))
    }

    /// Resolve an entry point of the compiled program
    pub fn kernel(&mut self, entry_point: &str) -> LifeResult<Kernel> {
        let id = self.backend.create_kernel(self.program, entry_point)?;
        Ok(Kernel::new(id, entry_point))
    }

    pub fn program(&self) -> ProgramId {
        self.program
    }

    pub fn backend(&self) -> &dyn ComputeBackend {
        &*self.backend
    }

    pub fn backend_mut(&mut self) -> &mut dyn ComputeBackend {
        &mut *self.backend
    }
}
