//! # GPU Backend
//!
//! Production adapter over wgpu 28.
//!
//! - Program = naga-validated WGSL turned into a shader module
//! - Kernel = one compute pipeline (auto layout) per entry point
//! - Device buffer = a storage buffer plus a `MAP_READ` staging buffer
//! - Scalar argument = a 16-byte uniform buffer owned by the kernel
//!
//! Every transfer and dispatch submits and then waits for the device.
//!
//! A 1-D dispatch needing more workgroups than the device allows along one
//! axis is folded into rows of workgroups. Such kernels index with
//! `id.x + id.y * num_workgroups.x * workgroup_size.x` and guard the range.

use std::collections::BTreeMap;
use std::time::Instant;

use wgpu::util::DeviceExt;

use life_core::buffer::Access;
use life_core::config::LifeConfig;
use life_core::error::{LifeError, LifeResult};
use life_core::kernel::{KernelArg, WorkSize};
use life_core::traits::{BackendStats, ComputeBackend, DeviceBufferId, KernelId, ProgramId};

use crate::compiler::{CompiledProgram, KernelCompiler, KernelSignature};

/// Uniform buffers are padded to this size
const UNIFORM_SIZE: u64 = 16;

struct GpuProgram {
    module: wgpu::ShaderModule,
    compiled: CompiledProgram,
}

enum GpuArg {
    Buffer(DeviceBufferId),
    Scalar(wgpu::Buffer),
}

struct GpuKernel {
    signature: KernelSignature,
    pipeline: wgpu::ComputePipeline,
    args: BTreeMap<u32, GpuArg>,
}

struct GpuBuffer {
    storage: wgpu::Buffer,
    staging: wgpu::Buffer,
    byte_len: usize,
    access: Access,
}

/// GPU compute backend using wgpu
pub struct GpuBackend {
    /// wgpu device
    device: wgpu::Device,
    /// Command queue
    queue: wgpu::Queue,
    /// Selected adapter
    adapter_info: wgpu::AdapterInfo,
    /// WGSL front-end
    compiler: KernelCompiler,

    programs: Vec<GpuProgram>,
    kernels: Vec<GpuKernel>,
    /// Indexed by `DeviceBufferId`; `None` once released
    buffers: Vec<Option<GpuBuffer>>,

    /// Statistics
    stats: BackendStats,
}

/// Rank an adapter; higher wins
pub(crate) fn adapter_score(device_type: wgpu::DeviceType, prefer_discrete: bool) -> u32 {
    match (device_type, prefer_discrete) {
        (wgpu::DeviceType::DiscreteGpu, true) => 10,
        (wgpu::DeviceType::IntegratedGpu, true) => 5,
        (wgpu::DeviceType::DiscreteGpu, false) => 5,
        (wgpu::DeviceType::IntegratedGpu, false) => 10,
        (wgpu::DeviceType::VirtualGpu, _) => 2,
        (wgpu::DeviceType::Cpu, _) => 1,
        (wgpu::DeviceType::Other, _) => 0,
    }
}

/// Spread `groups` workgroups over x and y once x would exceed `limit`
pub(crate) fn fold_workgroups(groups: usize, limit: usize) -> [usize; 3] {
    if groups <= limit || limit == 0 {
        return [groups, 1, 1];
    }
    [limit, groups.div_ceil(limit), 1]
}

impl GpuBackend {
    /// Create a new GPU backend on the best available adapter
    pub fn new(config: &LifeConfig) -> LifeResult<Self> {
        // Initialize wgpu
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        // Enumerate every adapter and keep the best ranked one
        let adapters = pollster::block_on(instance.enumerate_adapters(wgpu::Backends::all()));
        let prefer_discrete = config.compute.prefer_discrete;
        let adapter = adapters
            .into_iter()
            .max_by_key(|a| adapter_score(a.get_info().device_type, prefer_discrete))
            .ok_or_else(|| LifeError::NoDevice("no GPU adapter found".to_string()))?;

        // Log adapter info
        let info = adapter.get_info();
        tracing::info!(
            "GPU: {} ({:?}, {:?})",
            info.name,
            info.device_type,
            info.backend
        );

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Life GPU"),
                required_features: wgpu::Features::empty(),
                required_limits: adapter.limits(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: Default::default(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
            },
        ))
        .map_err(|e| LifeError::NoDevice(format!("failed to open {}: {}", info.name, e)))?;

        Ok(Self {
            device,
            queue,
            adapter_info: info,
            compiler: KernelCompiler::new(),
            programs: Vec::new(),
            kernels: Vec::new(),
            buffers: Vec::new(),
            stats: BackendStats::default(),
        })
    }

    /// Adapter this backend runs on
    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    fn buffer(&self, id: DeviceBufferId) -> LifeResult<&GpuBuffer> {
        self.buffers
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or_else(|| LifeError::argument(format!("device buffer {} does not exist", id.0)))
    }

    fn kernel(&self, id: KernelId) -> LifeResult<&GpuKernel> {
        self.kernels
            .get(id.0)
            .ok_or_else(|| LifeError::KernelNotFound(format!("kernel handle {}", id.0)))
    }

    /// Block until all submitted work has finished
    fn wait(&self) -> LifeResult<()> {
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: None, // Wait for most recent submission
                timeout: None,          // Wait indefinitely
            })
            .map_err(|e| LifeError::gpu(format!("device poll failed: {}", e)))?;
        Ok(())
    }

    /// Workgroup counts covering `global`, checked against `local` and the device limits
    fn workgroups(
        &self,
        signature: &KernelSignature,
        global: &WorkSize,
        local: Option<&WorkSize>,
    ) -> LifeResult<[u32; 3]> {
        let declared = signature.workgroup_size.map(|d| d as usize);
        if let Some(local) = local {
            if local.dims() != declared {
                return Err(LifeError::InvalidWorkSize(format!(
                    "local size {:?} differs from {}'s @workgroup_size {:?}",
                    local.dims(),
                    signature.name,
                    declared
                )));
            }
        }

        let limit = self.device.limits().max_compute_workgroups_per_dimension as usize;
        let mut groups = [0usize; 3];
        for (axis, g) in groups.iter_mut().enumerate() {
            *g = global.dims()[axis].div_ceil(declared[axis].max(1));
        }
        if global.rank() == 1 && declared[1] == 1 && declared[2] == 1 {
            groups = fold_workgroups(groups[0], limit);
        }

        let mut counts = [1u32; 3];
        for (axis, count) in counts.iter_mut().enumerate() {
            let groups = groups[axis];
            if groups > limit {
                return Err(LifeError::InvalidWorkSize(format!(
                    "{} workgroups along axis {} exceeds the device limit of {}",
                    groups, axis, limit
                )));
            }
            *count = groups as u32;
        }
        Ok(counts)
    }

    fn bind_group(&self, kernel: &GpuKernel) -> LifeResult<Option<wgpu::BindGroup>> {
        if kernel.signature.params.is_empty() {
            return Ok(None);
        }
        let mut seen: Vec<DeviceBufferId> = Vec::new();
        let mut entries = Vec::with_capacity(kernel.signature.params.len());
        for &binding in kernel.signature.params.keys() {
            let arg = kernel.args.get(&binding).ok_or_else(|| {
                LifeError::argument(format!("argument {} of {} is not bound", binding, kernel.signature.name))
            })?;
            let resource = match arg {
                GpuArg::Buffer(id) => {
                    if seen.contains(id) {
                        return Err(LifeError::argument(format!(
                            "device buffer {} is bound to more than one argument",
                            id.0
                        )));
                    }
                    seen.push(*id);
                    self.buffer(*id)?.storage.as_entire_binding()
                }
                GpuArg::Scalar(uniform) => uniform.as_entire_binding(),
            };
            entries.push(wgpu::BindGroupEntry { binding, resource });
        }

        let layout = kernel.pipeline.get_bind_group_layout(0);
        Ok(Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(kernel.signature.name.as_str()),
            layout: &layout,
            entries: &entries,
        })))
    }
}

impl ComputeBackend for GpuBackend {
    fn compile_program(&mut self, source: &str) -> LifeResult<ProgramId> {
        // Invalid source never reaches the device
        let compiled = self.compiler.compile(source)?;
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Life Kernels"),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });

        self.programs.push(GpuProgram { module, compiled });
        Ok(ProgramId(self.programs.len() - 1))
    }

    fn create_kernel(&mut self, program: ProgramId, entry_point: &str) -> LifeResult<KernelId> {
        let program = self
            .programs
            .get(program.0)
            .ok_or_else(|| LifeError::argument(format!("program {} does not exist", program.0)))?;
        let signature = program.compiled.signature(entry_point)?.clone();

        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(entry_point),
                layout: None,
                module: &program.module,
                entry_point: Some(entry_point),
                compilation_options: Default::default(),
                cache: None,
            });

        tracing::debug!("GPU: pipeline for {} created", entry_point);
        self.kernels.push(GpuKernel {
            signature,
            pipeline,
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
        // wgpu rejects zero-sized storage bindings
        let size = byte_len.max(4) as u64;

        let storage = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Life Storage"),
            size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Life Staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        self.buffers.push(Some(GpuBuffer {
            storage,
            staging,
            byte_len,
            access,
        }));
        self.stats.device_bytes += byte_len as u64;
        tracing::debug!("GPU: allocated {} bytes ({:?})", byte_len, access);
        Ok(DeviceBufferId(self.buffers.len() - 1))
    }

    fn release_buffer(&mut self, buffer: DeviceBufferId) -> LifeResult<()> {
        let released = self
            .buffers
            .get_mut(buffer.0)
            .and_then(Option::take)
            .ok_or_else(|| LifeError::argument(format!("device buffer {} does not exist", buffer.0)))?;
        released.storage.destroy();
        released.staging.destroy();
        self.stats.device_bytes -= released.byte_len as u64;
        Ok(())
    }

    fn write_buffer(&mut self, buffer: DeviceBufferId, data: &[u8]) -> LifeResult<()> {
        let target = self.buffer(buffer)?;
        if data.len() != target.byte_len {
            return Err(LifeError::BufferSize {
                expected: target.byte_len,
                actual: data.len(),
            });
        }
        if data.is_empty() {
            return Ok(());
        }

        self.queue.write_buffer(&target.storage, 0, data);
        self.queue.submit(std::iter::empty());
        self.wait()?;
        self.stats.bytes_uploaded += data.len() as u64;
        Ok(())
    }

    fn read_buffer(&mut self, buffer: DeviceBufferId, out: &mut [u8]) -> LifeResult<()> {
        let source = self.buffer(buffer)?;
        if out.len() != source.byte_len {
            return Err(LifeError::BufferSize {
                expected: source.byte_len,
                actual: out.len(),
            });
        }
        if out.is_empty() {
            return Ok(());
        }
        let size = source.byte_len as u64;

        // Copy from GPU to staging
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Download Encoder"),
            });
        encoder.copy_buffer_to_buffer(&source.storage, 0, &source.staging, 0, size);
        self.queue.submit(Some(encoder.finish()));

        // Map staging buffer and read
        let buffer_slice = source.staging.slice(..size);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.wait()?;

        rx.recv()
            .map_err(|e| LifeError::gpu(format!("Failed to receive map result: {}", e)))?
            .map_err(|e| LifeError::gpu(format!("Failed to map buffer: {:?}", e)))?;

        {
            let data = buffer_slice.get_mapped_range();
            out.copy_from_slice(&data);
        }

        source.staging.unmap();
        self.stats.bytes_downloaded += size;
        Ok(())
    }

    fn set_arg(&mut self, kernel: KernelId, index: u32, arg: KernelArg) -> LifeResult<()> {
        let signature = &self.kernel(kernel)?.signature;
        let gpu_arg = match arg {
            KernelArg::Buffer(id) => {
                signature.check_buffer_binding(index, self.buffer(id)?.access)?;
                GpuArg::Buffer(id)
            }
            KernelArg::Scalar(value) => {
                signature.check_scalar_binding(index)?;
                let mut contents = [0u32; (UNIFORM_SIZE / 4) as usize];
                contents[0] = value.bits();
                GpuArg::Scalar(self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Life Scalar"),
                    contents: bytemuck::cast_slice(&contents),
                    usage: wgpu::BufferUsages::UNIFORM,
                }))
            }
        };

        if let Some(gpu_kernel) = self.kernels.get_mut(kernel.0) {
            gpu_kernel.args.insert(index, gpu_arg);
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

        let gpu_kernel = self.kernel(kernel)?;
        let [x, y, z] = self.workgroups(&gpu_kernel.signature, &global, local.as_ref())?;
        let bind_group = self.bind_group(gpu_kernel)?;

        let start = Instant::now();
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Dispatch Encoder"),
            });

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(gpu_kernel.signature.name.as_str()),
                timestamp_writes: None,
            });
            pass.set_pipeline(&gpu_kernel.pipeline);
            if let Some(bind_group) = &bind_group {
                pass.set_bind_group(0, bind_group, &[]);
            }
            pass.dispatch_workgroups(x, y, z);
        }

        self.queue.submit(Some(encoder.finish()));
        self.wait()?;

        self.stats.dispatches += 1;
        self.stats.last_dispatch_us = start.elapsed().as_micros() as u64;
        Ok(())
    }

    fn stats(&self) -> BackendStats {
        self.stats.clone()
    }

    fn name(&self) -> &'static str {
        "GPU"
    }
}
