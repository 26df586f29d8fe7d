//! # Buffer - Host Array with an Optional Device Mirror
//!
//! Residency and access intent are fixed at construction. Transfers are
//! explicit and whole-buffer; calling one without the matching residency
//! is a [`LifeError::Residency`].

use bytemuck::Pod;
use serde::{Deserialize, Serialize};

use crate::error::{LifeError, LifeResult};
use crate::traits::{ComputeBackend, DeviceBufferId};

/// What kernels may do with a device buffer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Access {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl Access {
    /// Can a kernel read through a parameter bound to this buffer?
    pub fn kernel_reads(self) -> bool {
        !matches!(self, Access::WriteOnly)
    }

    /// Can a kernel write through a parameter bound to this buffer?
    pub fn kernel_writes(self) -> bool {
        !matches!(self, Access::ReadOnly)
    }
}

/// Residency/access configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferConfig {
    pub host_resident: bool,
    pub device_resident: bool,
    pub access: Access,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            host_resident: true,
            device_resident: true,
            access: Access::ReadWrite,
        }
    }
}

impl BufferConfig {
    /// Device-only scratch memory
    pub fn device_only(access: Access) -> Self {
        Self {
            host_resident: false,
            device_resident: true,
            access,
        }
    }

    /// Host-only array (never mirrored)
    pub fn host_only() -> Self {
        Self {
            host_resident: true,
            device_resident: false,
            access: Access::ReadWrite,
        }
    }

    fn validate(&self) -> LifeResult<()> {
        if !self.host_resident && !self.device_resident {
            return Err(LifeError::residency(
                "buffer must be resident on the host, the device, or both",
            ));
        }
        Ok(())
    }
}

/// Typed buffer of plain-old-data elements
#[derive(Debug)]
pub struct Buffer<T: Pod> {
    config: BufferConfig,
    len: usize,
    host: Option<Vec<T>>,
    device: Option<DeviceBufferId>,
}

impl<T: Pod> Buffer<T> {
    /// Allocate `len` zeroed elements with the given residency
    pub fn with_len(
        backend: &mut dyn ComputeBackend,
        len: usize,
        config: BufferConfig,
    ) -> LifeResult<Self> {
        config.validate()?;
        let host = config.host_resident.then(|| vec![T::zeroed(); len]);
        Self::materialize(backend, len, host, config)
    }

    /// Adopt an existing host array. Requires host residency.
    pub fn from_host(
        backend: &mut dyn ComputeBackend,
        data: Vec<T>,
        config: BufferConfig,
    ) -> LifeResult<Self> {
        config.validate()?;
        if !config.host_resident {
            return Err(LifeError::residency(
                "cannot adopt a host array into a device-only buffer",
            ));
        }
        let len = data.len();
        Self::materialize(backend, len, Some(data), config)
    }

    fn materialize(
        backend: &mut dyn ComputeBackend,
        len: usize,
        host: Option<Vec<T>>,
        config: BufferConfig,
    ) -> LifeResult<Self> {
        let device = if config.device_resident {
            let byte_len = len * std::mem::size_of::<T>();
            Some(backend.create_buffer(byte_len, config.access)?)
        } else {
            None
        };

        let buffer = Self {
            config,
            len,
            host,
            device,
        };
        if buffer.host.is_some() && buffer.device.is_some() {
            buffer.copy_to_device(backend)?;
        }
        Ok(buffer)
    }

    /// Host → device, whole buffer, blocking
    pub fn copy_to_device(&self, backend: &mut dyn ComputeBackend) -> LifeResult<()> {
        let device = self.device_id()?;
        let host = self
            .host
            .as_deref()
            .ok_or_else(|| LifeError::residency("copy to device from a buffer without host storage"))?;
        backend.write_buffer(device, bytemuck::cast_slice(host))
    }

    /// Device → host, whole buffer, blocking
    pub fn copy_from_device(&mut self, backend: &mut dyn ComputeBackend) -> LifeResult<()> {
        let device = self.device_id()?;
        let host = self
            .host
            .as_deref_mut()
            .ok_or_else(|| LifeError::residency("copy from device into a buffer without host storage"))?;
        backend.read_buffer(device, bytemuck::cast_slice_mut(host))
    }

    /// Device handle, for argument binding
    pub fn device_id(&self) -> LifeResult<DeviceBufferId> {
        self.device
            .ok_or_else(|| LifeError::residency("buffer has no device-resident storage"))
    }

    pub fn host(&self) -> LifeResult<&[T]> {
        self.host
            .as_deref()
            .ok_or_else(|| LifeError::residency("buffer has no host-resident storage"))
    }

    pub fn host_mut(&mut self) -> LifeResult<&mut [T]> {
        self.host
            .as_deref_mut()
            .ok_or_else(|| LifeError::residency("buffer has no host-resident storage"))
    }

    /// Host element read
    pub fn get(&self, index: usize) -> LifeResult<T> {
        let len = self.len;
        self.host()?
            .get(index)
            .copied()
            .ok_or_else(|| LifeError::argument(format!("index {index} out of range (len {len})")))
    }

    /// Host element write
    pub fn set(&mut self, index: usize, value: T) -> LifeResult<()> {
        let len = self.len;
        let slot = self
            .host_mut()?
            .get_mut(index)
            .ok_or_else(|| LifeError::argument(format!("index {index} out of range (len {len})")))?;
        *slot = value;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn config(&self) -> BufferConfig {
        self.config
    }

    /// Free the device mirror. Host storage, if any, is returned.
    pub fn release(self, backend: &mut dyn ComputeBackend) -> LifeResult<Option<Vec<T>>> {
        if let Some(device) = self.device {
            backend.release_buffer(device)?;
        }
        Ok(self.host)
    }
}
