//! # CPU Backend
//!
//! Single-threaded reference implementation of the compute model.
//!
//! Programs go through the same WGSL front-end as on the GPU, so compile
//! errors and argument checks behave identically. Execution then runs a
//! native Rust twin registered under the entry point's name, once per
//! work-item in x-fastest order.
//!
//! Device memory is a `Vec<u32>` per buffer; byte sizes must be a whole
//! number of words.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use life_core::buffer::Access;
use life_core::error::{LifeError, LifeResult};
use life_core::kernel::{KernelArg, Scalar, WorkSize};
use life_core::traits::{BackendStats, ComputeBackend, DeviceBufferId, KernelId, ProgramId};

use crate::compiler::{CompiledProgram, KernelCompiler, KernelSignature};
use crate::shaders::{native, EMPTY_CELLS, PROCESS_CELLS, SWAP_CELLS};

/// One work-item of a native kernel
pub type NativeKernel = fn(&mut KernelArgs, [u32; 3]) -> LifeResult<()>;

enum ArgSlot {
    Unbound,
    Words(Vec<u32>),
    Scalar(Scalar),
}

/// Arguments of a running dispatch, by binding index
pub struct KernelArgs {
    slots: Vec<ArgSlot>,
}

impl KernelArgs {
    fn slot(&self, index: u32) -> LifeResult<&ArgSlot> {
        self.slots
            .get(index as usize)
            .ok_or_else(|| LifeError::argument(format!("no argument at index {}", index)))
    }

    /// Buffer argument, read access
    pub fn words(&self, index: u32) -> LifeResult<&[u32]> {
        match self.slot(index)? {
            ArgSlot::Words(words) => Ok(words),
            _ => Err(LifeError::argument(format!("argument {} is not a buffer", index))),
        }
    }

    /// Buffer argument, write access
    pub fn words_mut(&mut self, index: u32) -> LifeResult<&mut [u32]> {
        match self.slots.get_mut(index as usize) {
            Some(ArgSlot::Words(words)) => Ok(words),
            _ => Err(LifeError::argument(format!("argument {} is not a buffer", index))),
        }
    }

    /// Scalar argument
    pub fn scalar(&self, index: u32) -> LifeResult<Scalar> {
        match self.slot(index)? {
            ArgSlot::Scalar(value) => Ok(*value),
            _ => Err(LifeError::argument(format!("argument {} is not a scalar", index))),
        }
    }

    /// Two distinct buffer arguments at once: `write` mutably, `read` shared
    pub fn split_mut(&mut self, write: u32, read: u32) -> LifeResult<(&mut [u32], &[u32])> {
        let (w, r) = (write as usize, read as usize);
        if w == r || w >= self.slots.len() || r >= self.slots.len() {
            return Err(LifeError::argument(format!(
                "cannot split arguments {} and {}",
                write, read
            )));
        }
        let (write_slot, read_slot) = if w < r {
            let (head, tail) = self.slots.split_at_mut(r);
            (&mut head[w], &tail[0])
        } else {
            let (head, tail) = self.slots.split_at_mut(w);
            (&mut tail[0], &head[r])
        };
        match (write_slot, read_slot) {
            (ArgSlot::Words(dst), ArgSlot::Words(src)) => Ok((dst.as_mut_slice(), src.as_slice())),
            _ => Err(LifeError::argument(format!(
                "arguments {} and {} must both be buffers",
                write, read
            ))),
        }
    }
}

struct CpuBuffer {
    words: Vec<u32>,
    access: Access,
}

struct CpuKernel {
    signature: KernelSignature,
    native: NativeKernel,
    args: BTreeMap<u32, KernelArg>,
}

/// CPU compute backend
pub struct CpuBackend {
    /// Front-end shared with the GPU backend
    compiler: KernelCompiler,

    /// Native twins by entry point name
    registry: HashMap<String, NativeKernel>,

    programs: Vec<CompiledProgram>,
    kernels: Vec<CpuKernel>,

    /// Indexed by `DeviceBufferId`; `None` once released
    buffers: Vec<Option<CpuBuffer>>,

    /// Statistics
    stats: BackendStats,
}

impl CpuBackend {
    /// Create a CPU backend with the Game of Life kernels registered
    pub fn new() -> Self {
        let mut backend = Self::empty();
        backend.register_kernel(EMPTY_CELLS, native::empty_cells);
        backend.register_kernel(PROCESS_CELLS, native::process_cells);
        backend.register_kernel(SWAP_CELLS, native::swap_cells);
        backend
    }

    /// Create a CPU backend with no native kernels
    pub fn empty() -> Self {
        Self {
            compiler: KernelCompiler::new(),
            registry: HashMap::new(),
            programs: Vec::new(),
            kernels: Vec::new(),
            buffers: Vec::new(),
            stats: BackendStats::default(),
        }
    }

    /// Provide the native implementation of a WGSL entry point
    pub fn register_kernel(&mut self, entry_point: &str, kernel: NativeKernel) {
        self.registry.insert(entry_point.to_string(), kernel);
    }

    fn buffer(&self, id: DeviceBufferId) -> LifeResult<&CpuBuffer> {
        self.buffers
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or_else(|| LifeError::argument(format!("device buffer {} does not exist", id.0)))
    }

    fn buffer_mut(&mut self, id: DeviceBufferId) -> LifeResult<&mut CpuBuffer> {
        self.buffers
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| LifeError::argument(format!("device buffer {} does not exist", id.0)))
    }

    fn kernel(&self, id: KernelId) -> LifeResult<&CpuKernel> {
        self.kernels
            .get(id.0)
            .ok_or_else(|| LifeError::KernelNotFound(format!("kernel handle {}", id.0)))
    }

    /// Move the bound buffers out of device memory into argument slots
    fn take_args(&mut self, kernel: KernelId) -> LifeResult<(KernelArgs, Vec<(u32, DeviceBufferId)>)> {
        let cpu_kernel = self.kernel(kernel)?;
        let args = cpu_kernel.args.clone();
        cpu_kernel
            .signature
            .check_all_bound(|index| args.contains_key(&index))?;

        let mut seen: Vec<DeviceBufferId> = Vec::new();
        for arg in args.values() {
            if let KernelArg::Buffer(id) = arg {
                self.buffer(*id)?;
                if seen.contains(id) {
                    return Err(LifeError::argument(format!(
                        "device buffer {} is bound to more than one argument",
                        id.0
                    )));
                }
                seen.push(*id);
            }
        }

        let len = args.keys().next_back().map_or(0, |&last| last as usize + 1);
        let mut slots: Vec<ArgSlot> = (0..len).map(|_| ArgSlot::Unbound).collect();
        let mut taken = Vec::new();
        for (&index, arg) in &args {
            slots[index as usize] = match *arg {
                KernelArg::Scalar(value) => ArgSlot::Scalar(value),
                KernelArg::Buffer(id) => {
                    taken.push((index, id));
                    ArgSlot::Words(std::mem::take(&mut self.buffer_mut(id)?.words))
                }
            };
        }
        Ok((KernelArgs { slots }, taken))
    }

    /// Return buffers moved out by `take_args`
    fn restore_args(&mut self, mut args: KernelArgs, taken: Vec<(u32, DeviceBufferId)>) {
        for (index, id) in taken {
            let slot = std::mem::replace(&mut args.slots[index as usize], ArgSlot::Unbound);
            if let (ArgSlot::Words(words), Ok(buffer)) = (slot, self.buffer_mut(id)) {
                buffer.words = words;
            }
        }
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn extent_u32(extent: usize) -> LifeResult<u32> {
    u32::try_from(extent)
        .map_err(|_| LifeError::InvalidWorkSize(format!("extent {} exceeds u32", extent)))
}

impl ComputeBackend for CpuBackend {
    fn compile_program(&mut self, source: &str) -> LifeResult<ProgramId> {
        let program = self.compiler.compile(source)?;
        self.programs.push(program);
        Ok(ProgramId(self.programs.len() - 1))
    }

    fn create_kernel(&mut self, program: ProgramId, entry_point: &str) -> LifeResult<KernelId> {
        let compiled = self
            .programs
            .get(program.0)
            .ok_or_else(|| LifeError::argument(format!("program {} does not exist", program.0)))?;
        let signature = compiled.signature(entry_point)?.clone();
        let native = *self.registry.get(entry_point).ok_or_else(|| {
            LifeError::KernelNotFound(format!("{} has no native implementation", entry_point))
        })?;

        self.kernels.push(CpuKernel {
            signature,
            native,
            args: BTreeMap::new(),
        });
        Ok(KernelId(self.kernels.len() - 1))
    }

    fn create_buffer(&mut self, byte_len: usize, access: Access) -> LifeResult<DeviceBufferId> {
        if byte_len % 4 != 0 {
            return Err(LifeError::argument(format!(
                "device buffers hold whole 32-bit words, got {} bytes",
                byte_len
            )));
        }
        self.buffers.push(Some(CpuBuffer {
            words: vec![0; byte_len / 4],
            access,
        }));
        self.stats.device_bytes += byte_len as u64;
        Ok(DeviceBufferId(self.buffers.len() - 1))
    }

    fn release_buffer(&mut self, buffer: DeviceBufferId) -> LifeResult<()> {
        let released = self
            .buffers
            .get_mut(buffer.0)
            .and_then(Option::take)
            .ok_or_else(|| LifeError::argument(format!("device buffer {} does not exist", buffer.0)))?;
        self.stats.device_bytes -= (released.words.len() * 4) as u64;
        Ok(())
    }

    fn write_buffer(&mut self, buffer: DeviceBufferId, data: &[u8]) -> LifeResult<()> {
        let target = self.buffer_mut(buffer)?;
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut target.words);
        if bytes.len() != data.len() {
            return Err(LifeError::BufferSize {
                expected: bytes.len(),
                actual: data.len(),
            });
        }
        bytes.copy_from_slice(data);
        self.stats.bytes_uploaded += data.len() as u64;
        Ok(())
    }

    fn read_buffer(&mut self, buffer: DeviceBufferId, out: &mut [u8]) -> LifeResult<()> {
        let source = self.buffer(buffer)?;
        let bytes: &[u8] = bytemuck::cast_slice(&source.words);
        if bytes.len() != out.len() {
            return Err(LifeError::BufferSize {
                expected: bytes.len(),
                actual: out.len(),
            });
        }
        out.copy_from_slice(bytes);
        self.stats.bytes_downloaded += out.len() as u64;
        Ok(())
    }

    fn set_arg(&mut self, kernel: KernelId, index: u32, arg: KernelArg) -> LifeResult<()> {
        match arg {
            KernelArg::Buffer(id) => {
                let access = self.buffer(id)?.access;
                self.kernel(kernel)?.signature.check_buffer_binding(index, access)?;
            }
            KernelArg::Scalar(_) => {
                self.kernel(kernel)?.signature.check_scalar_binding(index)?;
            }
        }
        if let Some(cpu_kernel) = self.kernels.get_mut(kernel.0) {
            cpu_kernel.args.insert(index, arg);
        }
        Ok(())
    }

    fn execute(
        &mut self,
        kernel: KernelId,
        global: WorkSize,
        local: Option<WorkSize>,
    ) -> LifeResult<()> {
        global.validate()?;
        if let Some(local) = &local {
            global.validate_local(local)?;
        }
        let [gx, gy, gz] = global.dims();
        let (gx, gy, gz) = (extent_u32(gx)?, extent_u32(gy)?, extent_u32(gz)?);

        let native = self.kernel(kernel)?.native;
        let (mut args, taken) = self.take_args(kernel)?;

        let start = Instant::now();
        let mut result = Ok(());
        'dispatch: for z in 0..gz {
            for y in 0..gy {
                for x in 0..gx {
                    result = native(&mut args, [x, y, z]);
                    if result.is_err() {
                        break 'dispatch;
                    }
                }
            }
        }
        self.restore_args(args, taken);
        result?;

        self.stats.dispatches += 1;
        self.stats.last_dispatch_us = start.elapsed().as_micros() as u64;
        Ok(())
    }

    fn stats(&self) -> BackendStats {
        self.stats.clone()
    }

    fn name(&self) -> &'static str {
        "CPU"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shaders::LIFE_SHADER;
    use life_core::buffer::{Buffer, BufferConfig};
    use life_core::kernel::Kernel;

    fn life_kernel(backend: &mut CpuBackend, entry: &str) -> Kernel {
        let program = backend.compile_program(LIFE_SHADER).unwrap();
        Kernel::new(backend.create_kernel(program, entry).unwrap(), entry)
    }

    #[test]
    fn test_cpu_backend_creation() {
        let backend = CpuBackend::new();
        assert_eq!(backend.name(), "CPU");
        assert_eq!(backend.stats().dispatches, 0);
    }

    #[test]
    fn test_empty_zeroes_words() {
        let mut backend = CpuBackend::new();
        let kernel = life_kernel(&mut backend, EMPTY_CELLS);
        let mut dst = Buffer::from_host(&mut backend, vec![u32::MAX; 6], BufferConfig::default()).unwrap();

        kernel.set_buffer(&mut backend, 0, &dst).unwrap();
        kernel.execute(&mut backend, 6usize).unwrap();
        dst.copy_from_device(&mut backend).unwrap();
        assert_eq!(dst.host().unwrap(), &[0; 6]);
        assert_eq!(backend.stats().dispatches, 1);
    }

    #[test]
    fn test_swap_copies_dst_into_src() {
        let mut backend = CpuBackend::new();
        let kernel = life_kernel(&mut backend, SWAP_CELLS);
        let dst = Buffer::from_host(&mut backend, vec![1u32, 2, 3], BufferConfig::default()).unwrap();
        let mut src = Buffer::<u32>::with_len(&mut backend, 3, BufferConfig::default()).unwrap();

        kernel.set_buffer(&mut backend, 0, &dst).unwrap();
        kernel.set_buffer(&mut backend, 1, &src).unwrap();
        kernel.execute(&mut backend, 3usize).unwrap();
        src.copy_from_device(&mut backend).unwrap();
        assert_eq!(src.host().unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn test_copy_from_device_is_idempotent() {
        let mut backend = CpuBackend::new();
        let mut buffer = Buffer::from_host(&mut backend, vec![5u32, 6, 7], BufferConfig::default()).unwrap();
        buffer.copy_from_device(&mut backend).unwrap();
        let first = buffer.host().unwrap().to_vec();
        buffer.copy_from_device(&mut backend).unwrap();
        assert_eq!(buffer.host().unwrap(), first.as_slice());
        assert_eq!(first, vec![5, 6, 7]);
    }

    #[test]
    fn test_residency_errors() {
        let mut backend = CpuBackend::new();

        let mut host_only = Buffer::from_host(&mut backend, vec![1u32; 4], BufferConfig::host_only()).unwrap();
        assert!(matches!(
            host_only.copy_from_device(&mut backend),
            Err(LifeError::Residency(_))
        ));
        assert!(matches!(
            host_only.copy_to_device(&mut backend),
            Err(LifeError::Residency(_))
        ));

        let mut device_only =
            Buffer::<u32>::with_len(&mut backend, 4, BufferConfig::device_only(Access::ReadWrite)).unwrap();
        assert!(matches!(device_only.host(), Err(LifeError::Residency(_))));
        assert!(matches!(device_only.get(0), Err(LifeError::Residency(_))));
        assert!(matches!(
            device_only.copy_from_device(&mut backend),
            Err(LifeError::Residency(_))
        ));
        assert!(matches!(
            Buffer::from_host(&mut backend, vec![0u32], BufferConfig::device_only(Access::ReadOnly)),
            Err(LifeError::Residency(_))
        ));
    }

    #[test]
    fn test_whole_buffer_transfers_only() {
        let mut backend = CpuBackend::new();
        let id = backend.create_buffer(16, Access::ReadWrite).unwrap();
        assert!(matches!(
            backend.write_buffer(id, &[0u8; 8]),
            Err(LifeError::BufferSize { expected: 16, actual: 8 })
        ));
        let mut out = [0u8; 20];
        assert!(backend.read_buffer(id, &mut out).is_err());
        assert!(backend.create_buffer(6, Access::ReadWrite).is_err());
    }

    #[test]
    fn test_unbound_argument_fails_dispatch() {
        let mut backend = CpuBackend::new();
        let kernel = life_kernel(&mut backend, SWAP_CELLS);
        let dst = Buffer::<u32>::with_len(&mut backend, 2, BufferConfig::default()).unwrap();
        kernel.set_buffer(&mut backend, 0, &dst).unwrap();
        assert!(matches!(
            kernel.execute(&mut backend, 2usize),
            Err(LifeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_argument_checks() {
        let mut backend = CpuBackend::new();
        let kernel = life_kernel(&mut backend, PROCESS_CELLS);
        let read_only =
            Buffer::<u32>::with_len(&mut backend, 2, BufferConfig::device_only(Access::ReadOnly)).unwrap();

        // dst is written
        assert!(kernel.set_buffer(&mut backend, 0, &read_only).is_err());
        // src is only read
        assert!(kernel.set_buffer(&mut backend, 1, &read_only).is_ok());
        // uniform takes a scalar
        assert!(kernel.set_buffer(&mut backend, 2, &read_only).is_err());
        assert!(kernel.set_scalar(&mut backend, 2, 1u32).is_ok());
        assert!(kernel.set_scalar(&mut backend, 7, 1u32).is_err());
    }

    #[test]
    fn test_aliased_buffer_rejected() {
        let mut backend = CpuBackend::new();
        let kernel = life_kernel(&mut backend, SWAP_CELLS);
        let words = Buffer::<u32>::with_len(&mut backend, 2, BufferConfig::default()).unwrap();
        kernel.set_buffer(&mut backend, 0, &words).unwrap();
        kernel.set_buffer(&mut backend, 1, &words).unwrap();
        assert!(matches!(
            kernel.execute(&mut backend, 2usize),
            Err(LifeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_rebinding_replaces_argument() {
        let mut backend = CpuBackend::new();
        let kernel = life_kernel(&mut backend, EMPTY_CELLS);
        let mut first = Buffer::from_host(&mut backend, vec![9u32; 2], BufferConfig::default()).unwrap();
        let mut second = Buffer::from_host(&mut backend, vec![9u32; 2], BufferConfig::default()).unwrap();

        kernel.set_buffer(&mut backend, 0, &first).unwrap();
        kernel.set_buffer(&mut backend, 0, &second).unwrap();
        kernel.execute(&mut backend, 2usize).unwrap();

        first.copy_from_device(&mut backend).unwrap();
        second.copy_from_device(&mut backend).unwrap();
        assert_eq!(first.host().unwrap(), &[9, 9]);
        assert_eq!(second.host().unwrap(), &[0, 0]);
    }

    #[test]
    fn test_released_buffer_fails_dispatch() {
        let mut backend = CpuBackend::new();
        let kernel = life_kernel(&mut backend, EMPTY_CELLS);
        let dst = Buffer::<u32>::with_len(&mut backend, 2, BufferConfig::default()).unwrap();
        kernel.set_buffer(&mut backend, 0, &dst).unwrap();
        assert_eq!(backend.stats().device_bytes, 8);

        let host = dst.release(&mut backend).unwrap();
        assert_eq!(host, Some(vec![0, 0]));
        assert_eq!(backend.stats().device_bytes, 0);
        assert!(kernel.execute(&mut backend, 2usize).is_err());
    }

    #[test]
    fn test_missing_native_twin() {
        let mut backend = CpuBackend::empty();
        let program = backend.compile_program(LIFE_SHADER).unwrap();
        assert!(matches!(
            backend.create_kernel(program, EMPTY_CELLS),
            Err(LifeError::KernelNotFound(_))
        ));
        assert!(matches!(
            backend.create_kernel(program, "no_such_entry"),
            Err(LifeError::KernelNotFound(_))
        ));
    }

    #[test]
    fn test_work_size_checks() {
        let mut backend = CpuBackend::new();
        let kernel = life_kernel(&mut backend, EMPTY_CELLS);
        let dst = Buffer::<u32>::with_len(&mut backend, 8, BufferConfig::default()).unwrap();
        kernel.set_buffer(&mut backend, 0, &dst).unwrap();

        assert!(matches!(
            kernel.execute(&mut backend, 0usize),
            Err(LifeError::InvalidWorkSize(_))
        ));
        assert!(kernel.execute_local(&mut backend, 8usize, 4usize).is_ok());
        assert!(matches!(
            kernel.execute_local(&mut backend, 8usize, 3usize),
            Err(LifeError::InvalidWorkSize(_))
        ));
    }

    #[test]
    fn test_custom_registered_kernel() {
        fn double(args: &mut KernelArgs, id: [u32; 3]) -> LifeResult<()> {
            let words = args.words_mut(0)?;
            words[id[0] as usize] *= 2;
            Ok(())
        }

        let source = r#"
            @group(0) @binding(0) var<storage, read_write> data: array<u32>;

            @compute @workgroup_size(1)
            fn double(@builtin(global_invocation_id) id: vec3<u32>) {
                data[id.x] = data[id.x] * 2u;
            }
        "#;

        let mut backend = CpuBackend::empty();
        backend.register_kernel("double", double);
        let program = backend.compile_program(source).unwrap();
        let kernel = Kernel::new(backend.create_kernel(program, "double").unwrap(), "double");
        let mut data = Buffer::from_host(&mut backend, vec![1u32, 2, 3], BufferConfig::default()).unwrap();
        kernel.set_buffer(&mut backend, 0, &data).unwrap();
        kernel.execute(&mut backend, 3usize).unwrap();
        data.copy_from_device(&mut backend).unwrap();
        assert_eq!(data.host().unwrap(), &[2, 4, 6]);
    }
}
