//! # Traits - Abstractions at the Component Seams
//!
//! - `ComputeBackend`: program/kernel/buffer execution model (CPU or GPU)
//! - `CellSource`: anything the viewport can sample cells from

use crate::buffer::Access;
use crate::error::LifeResult;
use crate::kernel::{KernelArg, WorkSize};

/// Handle to a compiled program owned by a backend
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProgramId(pub usize);

/// Handle to a kernel (entry point + bound arguments) owned by a backend
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KernelId(pub usize);

/// Handle to device-resident memory owned by a backend
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DeviceBufferId(pub usize);

/// Compute backend trait - abstraction over CPU/GPU
///
/// The seam is byte-oriented so the trait stays object safe; the typed
/// layer is [`crate::buffer::Buffer`] and [`crate::kernel::Kernel`].
///
/// Every call is synchronous: when it returns, the transfer or dispatch
/// has completed and its results are visible.
pub trait ComputeBackend: Send {
    /// Compile kernel source. The error carries the compiler log.
    fn compile_program(&mut self, source: &str) -> LifeResult<ProgramId>;

    /// Resolve a named entry point from a compiled program
    fn create_kernel(&mut self, program: ProgramId, entry_point: &str) -> LifeResult<KernelId>;

    /// Allocate zeroed device memory
    fn create_buffer(&mut self, byte_len: usize, access: Access) -> LifeResult<DeviceBufferId>;

    /// Free device memory. Kernels still bound to it fail at dispatch.
    fn release_buffer(&mut self, buffer: DeviceBufferId) -> LifeResult<()>;

    /// Whole-buffer host → device copy
    fn write_buffer(&mut self, buffer: DeviceBufferId, data: &[u8]) -> LifeResult<()>;

    /// Whole-buffer device → host copy
    fn read_buffer(&mut self, buffer: DeviceBufferId, out: &mut [u8]) -> LifeResult<()>;

    /// Bind argument `index`; rebinding replaces the previous binding
    fn set_arg(&mut self, kernel: KernelId, index: u32, arg: KernelArg) -> LifeResult<()>;

    /// Run the kernel once per work-item and block until the device is done
    fn execute(
        &mut self,
        kernel: KernelId,
        global: WorkSize,
        local: Option<WorkSize>,
    ) -> LifeResult<()>;

    /// Get statistics about transfers and dispatches so far
    fn stats(&self) -> BackendStats;

    /// Name of this backend (for logging)
    fn name(&self) -> &'static str;
}

/// Statistics from the compute backend
#[derive(Clone, Debug, Default)]
pub struct BackendStats {
    /// Kernel dispatches completed
    pub dispatches: u64,

    /// Bytes copied host → device
    pub bytes_uploaded: u64,

    /// Bytes copied device → host
    pub bytes_downloaded: u64,

    /// Wall time of the last dispatch (microseconds)
    pub last_dispatch_us: u64,

    /// Device memory currently allocated
    pub device_bytes: u64,
}

/// A readable cell field (grid, engine state, ...)
pub trait CellSource {
    /// 1 if cell `(x, y)` is alive, else 0. Coordinates must be in range.
    fn get_bit(&self, x: u32, y: u32) -> u32;

    /// Width in cells
    fn width(&self) -> u32;

    /// Height in cells
    fn height(&self) -> u32;
}
