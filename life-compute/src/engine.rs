//! # Simulation Engine
//!
//! Owns the `dst`/`src` buffer pair and runs one generation per step in
//! three ordered phases:
//!
//! 1. **Clear**: `empty_cells` zeroes `dst`, one word per work-item
//! 2. **Process**: `process_cells` writes the next generation of `src`
//!    into `dst`, one work-item per cell of the padded width
//! 3. **Swap**: `swap_cells` copies `dst` back into `src`
//!
//! Each phase uploads the buffers it touches before the dispatch and
//! downloads them after, even when the data is already in place. `src`
//! and `dst` keep their identities for the whole run; "swap" is a copy.

use std::time::{Duration, Instant};

use life_core::buffer::{Buffer, BufferConfig};
use life_core::error::LifeResult;
use life_core::grid::{read_bit, BitGrid};
use life_core::kernel::Kernel;
use life_core::traits::CellSource;
use life_core::WORD_BITS;

use crate::context::SimulationContext;
use crate::shaders::{
    DST_BINDING, EMPTY_CELLS, PROCESS_CELLS, SRC_BINDING, SWAP_CELLS, WIDTH_WORDS_BINDING,
};

/// Outcome of one tick
#[derive(Clone, Copy, Debug)]
pub struct TickReport {
    /// Generations completed so far
    pub generation: u64,
    /// Wall time of the step
    pub elapsed: Duration,
}

/// Double-buffered Game of Life on a compute backend
pub struct SimulationEngine {
    width_words: u32,
    height: u32,
    /// Write target
    dst: Buffer<u32>,
    /// Current generation
    src: Buffer<u32>,
    empty: Kernel,
    process: Kernel,
    swap: Kernel,
    generation: u64,
}

impl SimulationEngine {
    /// Upload `grid` into both buffers and bind the kernels
    pub fn new(ctx: &mut SimulationContext, grid: BitGrid) -> LifeResult<Self> {
        let empty = ctx.kernel(EMPTY_CELLS)?;
        let process = ctx.kernel(PROCESS_CELLS)?;
        let swap = ctx.kernel(SWAP_CELLS)?;

        let width_words = grid.width_words();
        let height = grid.height();
        let words = grid.into_words();

        let backend = ctx.backend_mut();
        let dst = Buffer::from_host(backend, words.clone(), BufferConfig::default())?;
        let src = Buffer::from_host(backend, words, BufferConfig::default())?;

        empty.set_buffer(backend, DST_BINDING, &dst)?;
        process.set_buffer(backend, DST_BINDING, &dst)?;
        process.set_buffer(backend, SRC_BINDING, &src)?;
        process.set_scalar(backend, WIDTH_WORDS_BINDING, width_words)?;
        swap.set_buffer(backend, DST_BINDING, &dst)?;
        swap.set_buffer(backend, SRC_BINDING, &src)?;

        tracing::info!(
            "Engine ready: {}x{} cells ({} words per row) on {}",
            width_words * WORD_BITS,
            height,
            width_words,
            backend.name()
        );

        Ok(Self {
            width_words,
            height,
            dst,
            src,
            empty,
            process,
            swap,
            generation: 0,
        })
    }

    /// Advance one generation
    pub fn step(&mut self, ctx: &mut SimulationContext) -> LifeResult<()> {
        let backend = ctx.backend_mut();
        let words = self.width_words as usize * self.height as usize;
        let cells = [
            self.width_words as usize * WORD_BITS as usize,
            self.height as usize,
        ];

        // Clear
        self.dst.copy_to_device(backend)?;
        self.empty.execute(backend, words)?;
        self.dst.copy_from_device(backend)?;

        // Process
        self.dst.copy_to_device(backend)?;
        self.src.copy_to_device(backend)?;
        self.process.execute(backend, cells)?;
        self.dst.copy_from_device(backend)?;
        self.src.copy_from_device(backend)?;

        // Swap
        self.dst.copy_to_device(backend)?;
        self.src.copy_to_device(backend)?;
        self.swap.execute(backend, words)?;
        self.src.copy_from_device(backend)?;
        self.dst.copy_from_device(backend)?;

        self.generation += 1;
        tracing::debug!("generation {}: clear, process, swap done", self.generation);
        Ok(())
    }

    /// One timed step
    pub fn tick(&mut self, ctx: &mut SimulationContext) -> LifeResult<TickReport> {
        let start = Instant::now();
        self.step(ctx)?;
        let report = TickReport {
            generation: self.generation,
            elapsed: start.elapsed(),
        };
        tracing::info!(
            "generation {}: {} ms",
            report.generation,
            report.elapsed.as_millis()
        );
        Ok(report)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn width_words(&self) -> u32 {
        self.width_words
    }

    /// Copy of the current generation
    pub fn snapshot(&self) -> LifeResult<BitGrid> {
        BitGrid::from_words(self.width_words, self.height, self.src.host()?.to_vec())
    }

    /// Free both device buffers
    pub fn release(self, ctx: &mut SimulationContext) -> LifeResult<()> {
        let backend = ctx.backend_mut();
        self.dst.release(backend)?;
        self.src.release(backend)?;
        Ok(())
    }
}

impl CellSource for SimulationEngine {
    fn get_bit(&self, x: u32, y: u32) -> u32 {
        self.src
            .host()
            .map(|words| read_bit(words, self.width_words, x, y))
            .unwrap_or(0)
    }

    fn width(&self) -> u32 {
        self.width_words * WORD_BITS
    }

    fn height(&self) -> u32 {
        self.height
    }
}
