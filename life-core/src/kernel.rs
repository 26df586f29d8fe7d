//! # Kernel - Entry Point Handle, Arguments and Work Sizes

use bytemuck::Pod;

use crate::buffer::Buffer;
use crate::error::{LifeError, LifeResult};
use crate::traits::{ComputeBackend, DeviceBufferId, KernelId};

/// Scalar kernel argument (copied by value at bind time)
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scalar {
    U32(u32),
    I32(i32),
    F32(f32),
}

impl Scalar {
    /// Little-endian bytes as the device sees them
    pub fn to_bytes(self) -> [u8; 4] {
        match self {
            Scalar::U32(v) => v.to_le_bytes(),
            Scalar::I32(v) => v.to_le_bytes(),
            Scalar::F32(v) => v.to_le_bytes(),
        }
    }

    /// Raw 32-bit pattern
    pub fn bits(self) -> u32 {
        u32::from_le_bytes(self.to_bytes())
    }
}

impl From<u32> for Scalar {
    fn from(v: u32) -> Self {
        Scalar::U32(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::I32(v)
    }
}

impl From<f32> for Scalar {
    fn from(v: f32) -> Self {
        Scalar::F32(v)
    }
}

/// A bound kernel argument
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum KernelArg {
    /// Value copied at bind time
    Scalar(Scalar),
    /// Reference to device memory; binding copies nothing
    Buffer(DeviceBufferId),
}

/// 1- to 3-dimensional index space
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkSize {
    dims: [usize; 3],
    rank: usize,
}

impl WorkSize {
    pub fn one(x: usize) -> Self {
        Self { dims: [x, 1, 1], rank: 1 }
    }

    pub fn two(x: usize, y: usize) -> Self {
        Self { dims: [x, y, 1], rank: 2 }
    }

    pub fn three(x: usize, y: usize, z: usize) -> Self {
        Self { dims: [x, y, z], rank: 3 }
    }

    /// Build from a slice of 1 to 3 extents
    pub fn from_slice(extents: &[usize]) -> LifeResult<Self> {
        match *extents {
            [x] => Ok(Self::one(x)),
            [x, y] => Ok(Self::two(x, y)),
            [x, y, z] => Ok(Self::three(x, y, z)),
            _ => Err(LifeError::InvalidWorkSize(format!(
                "expected 1 to 3 dimensions, got {}",
                extents.len()
            ))),
        }
    }

    /// Extents padded to three dimensions with 1
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Total work-items
    pub fn items(&self) -> usize {
        self.dims.iter().product()
    }

    /// Every extent must be at least 1
    pub fn validate(&self) -> LifeResult<()> {
        if self.dims.iter().any(|&d| d == 0) {
            return Err(LifeError::InvalidWorkSize(format!(
                "zero extent in {:?}",
                &self.dims[..self.rank]
            )));
        }
        Ok(())
    }

    /// Check a local size against this global size
    pub fn validate_local(&self, local: &WorkSize) -> LifeResult<()> {
        self.validate()?;
        local.validate()?;
        if local.rank != self.rank {
            return Err(LifeError::InvalidWorkSize(format!(
                "local size has {} dimensions, global has {}",
                local.rank, self.rank
            )));
        }
        for (g, l) in self.dims.iter().zip(local.dims.iter()) {
            if g % l != 0 {
                return Err(LifeError::InvalidWorkSize(format!(
                    "local size {:?} does not divide global size {:?}",
                    &local.dims[..local.rank],
                    &self.dims[..self.rank]
                )));
            }
        }
        Ok(())
    }
}

impl From<usize> for WorkSize {
    fn from(x: usize) -> Self {
        Self::one(x)
    }
}

impl From<[usize; 2]> for WorkSize {
    fn from([x, y]: [usize; 2]) -> Self {
        Self::two(x, y)
    }
}

impl From<[usize; 3]> for WorkSize {
    fn from([x, y, z]: [usize; 3]) -> Self {
        Self::three(x, y, z)
    }
}

/// A named entry point resolved from a compiled program
#[derive(Clone, Debug)]
pub struct Kernel {
    id: KernelId,
    name: String,
}

impl Kernel {
    pub fn new(id: KernelId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    pub fn id(&self) -> KernelId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bind a buffer by reference
    pub fn set_buffer<T: Pod>(
        &self,
        backend: &mut dyn ComputeBackend,
        index: u32,
        buffer: &Buffer<T>,
    ) -> LifeResult<()> {
        backend.set_arg(self.id, index, KernelArg::Buffer(buffer.device_id()?))
    }

    /// Bind a scalar by value
    pub fn set_scalar(
        &self,
        backend: &mut dyn ComputeBackend,
        index: u32,
        value: impl Into<Scalar>,
    ) -> LifeResult<()> {
        backend.set_arg(self.id, index, KernelArg::Scalar(value.into()))
    }

    /// Dispatch over `global` work-items and wait for completion
    pub fn execute(
        &self,
        backend: &mut dyn ComputeBackend,
        global: impl Into<WorkSize>,
    ) -> LifeResult<()> {
        backend.execute(self.id, global.into(), None)
    }

    /// Dispatch with an explicit local (workgroup) size
    pub fn execute_local(
        &self,
        backend: &mut dyn ComputeBackend,
        global: impl Into<WorkSize>,
        local: impl Into<WorkSize>,
    ) -> LifeResult<()> {
        backend.execute(self.id, global.into(), Some(local.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_size_padding() {
        assert_eq!(WorkSize::one(8).dims(), [8, 1, 1]);
        assert_eq!(WorkSize::two(64, 3).dims(), [64, 3, 1]);
        assert_eq!(WorkSize::from([4usize, 5, 6]).items(), 120);
    }

    #[test]
    fn test_from_slice_rank() {
        assert_eq!(WorkSize::from_slice(&[3, 4]).unwrap().rank(), 2);
        assert!(WorkSize::from_slice(&[]).is_err());
        assert!(WorkSize::from_slice(&[1, 2, 3, 4]).is_err());
    }

    #[test]
    fn test_zero_extent_rejected() {
        assert!(WorkSize::two(0, 4).validate().is_err());
        assert!(WorkSize::two(1, 4).validate().is_ok());
    }

    #[test]
    fn test_local_must_divide_global() {
        let global = WorkSize::two(64, 6);
        assert!(global.validate_local(&WorkSize::two(8, 2)).is_ok());
        assert!(global.validate_local(&WorkSize::two(8, 4)).is_err());
        assert!(global.validate_local(&WorkSize::one(8)).is_err());
    }

    #[test]
    fn test_scalar_bits() {
        assert_eq!(Scalar::from(7u32).bits(), 7);
        assert_eq!(Scalar::from(-1i32).bits(), u32::MAX);
        assert_eq!(Scalar::from(1.0f32).bits(), 1.0f32.to_bits());
    }
}
