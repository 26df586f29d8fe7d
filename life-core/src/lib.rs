//! # Life Core
//!
//! Core types and traits for the Game of Life simulator.
//!
//! This crate provides the building blocks the compute crate and the
//! viewer share:
//! - **BitGrid**: bit-packed cell field, 32 cells per word
//! - **Pattern**: RLE loader that seeds a grid
//! - **Buffer / Kernel**: typed buffers with explicit residency, kernel handles
//! - **ComputeBackend**: the program/kernel/buffer execution model
//! - **Viewport**: panned window into the grid
//!
//! ## Memory Layout
//!
//! Grids are flat `u32` words so they can be handed to a device buffer
//! through `bytemuck` without conversion.

pub mod buffer;
pub mod config;
pub mod error;
pub mod grid;
pub mod kernel;
pub mod pattern;
pub mod traits;
pub mod viewport;

// Re-export main types at crate root
pub use buffer::{Access, Buffer, BufferConfig};
pub use config::{ComputeBackendType, LifeConfig};
pub use error::{LifeError, LifeResult};
pub use grid::BitGrid;
pub use kernel::{Kernel, KernelArg, Scalar, WorkSize};
pub use pattern::Pattern;
pub use traits::*;
pub use viewport::Viewport;

/// Cells per grid word
pub const WORD_BITS: u32 = 32;
