//! Kernel sources for the simulator
//!
//! - `LIFE_SHADER`: WGSL for both backends (parsed and validated everywhere,
//!   executed by the GPU)
//! - `native`: Rust twins of the WGSL entry points, executed by the CPU backend

pub mod native;

/// Shipped kernels; identical to `kernels/life.wgsl`
pub const LIFE_SHADER: &str = include_str!("../../kernels/life.wgsl");

/// Zeroes `dst` (binding 0), one word per work-item
pub const EMPTY_CELLS: &str = "empty_cells";

/// Writes the next generation of `src` (binding 1) into `dst` (binding 0)
pub const PROCESS_CELLS: &str = "process_cells";

/// Copies `dst` (binding 0) into `src` (binding 1)
pub const SWAP_CELLS: &str = "swap_cells";

/// Argument indices shared by the three entry points
pub const DST_BINDING: u32 = 0;
pub const SRC_BINDING: u32 = 1;
pub const WIDTH_WORDS_BINDING: u32 = 2;
