//! # BitGrid - Bit-Packed Cell Field
//!
//! One bit per cell, 32 cells per word, rows stored back to back.
//! Cell `(x, y)` lives in word `y * width_words + (x >> 5)`, bit `x & 31`.
//!
//! Bit access is unchecked: callers keep `x < width_words * 32` and
//! `y < height`. Debug builds assert it.

use crate::error::{LifeError, LifeResult};
use crate::traits::CellSource;
use crate::WORD_BITS;

/// Number of 32-bit words needed for a row of `width` cells
pub fn words_for_width(width: u32) -> u32 {
    width.div_ceil(WORD_BITS)
}

/// Word index holding cell `(x, y)`
#[inline]
pub fn word_index(width_words: u32, x: u32, y: u32) -> usize {
    y as usize * width_words as usize + (x >> 5) as usize
}

/// Read one cell from a raw word slice laid out like a [`BitGrid`]
#[inline]
pub fn read_bit(words: &[u32], width_words: u32, x: u32, y: u32) -> u32 {
    (words[word_index(width_words, x, y)] >> (x & 31)) & 1
}

/// Bit-packed W×H boolean field
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitGrid {
    width_words: u32,
    height: u32,
    words: Vec<u32>,
}

impl BitGrid {
    /// Create an all-dead grid wide enough for `width` cells
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_words(words_for_width(width), height)
    }

    /// Create an all-dead grid from a width already expressed in words
    pub fn with_words(width_words: u32, height: u32) -> Self {
        Self {
            width_words,
            height,
            words: vec![0; width_words as usize * height as usize],
        }
    }

    /// Adopt an existing word vector
    pub fn from_words(width_words: u32, height: u32, words: Vec<u32>) -> LifeResult<Self> {
        let expected = width_words as usize * height as usize;
        if words.len() != expected {
            return Err(LifeError::BufferSize {
                expected: expected * std::mem::size_of::<u32>(),
                actual: words.len() * std::mem::size_of::<u32>(),
            });
        }
        Ok(Self {
            width_words,
            height,
            words,
        })
    }

    /// Set cell `(x, y)` alive. Idempotent.
    #[inline]
    pub fn set_bit(&mut self, x: u32, y: u32) {
        debug_assert!(x < self.width() && y < self.height, "cell ({x}, {y}) out of range");
        self.words[word_index(self.width_words, x, y)] |= 1 << (x & 31);
    }

    /// 1 if cell `(x, y)` is alive, else 0
    #[inline]
    pub fn get_bit(&self, x: u32, y: u32) -> u32 {
        debug_assert!(x < self.width() && y < self.height, "cell ({x}, {y}) out of range");
        read_bit(&self.words, self.width_words, x, y)
    }

    /// Zero every word
    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    pub fn width_words(&self) -> u32 {
        self.width_words
    }

    /// Width in cells (padded to a whole number of words)
    pub fn width(&self) -> u32 {
        self.width_words * WORD_BITS
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn into_words(self) -> Vec<u32> {
        self.words
    }

    /// Number of live cells
    pub fn population(&self) -> u64 {
        self.words.iter().map(|w| w.count_ones() as u64).sum()
    }

    /// Coordinates of every live cell, row-major
    pub fn live_cells(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let ww = self.width_words as usize;
        self.words
            .iter()
            .enumerate()
            .filter(|(_, w)| **w != 0)
            .flat_map(move |(i, &word)| {
                let y = (i / ww) as u32;
                let base = ((i % ww) as u32) * WORD_BITS;
                (0..WORD_BITS)
                    .filter(move |bit| (word >> bit) & 1 == 1)
                    .map(move |bit| (base + bit, y))
            })
    }
}

impl CellSource for BitGrid {
    fn get_bit(&self, x: u32, y: u32) -> u32 {
        BitGrid::get_bit(self, x, y)
    }

    fn width(&self) -> u32 {
        BitGrid::width(self)
    }

    fn height(&self) -> u32 {
        self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_words_rounds_up() {
        for (width, words) in [(1, 1), (31, 1), (32, 1), (33, 2), (100, 4), (512, 16)] {
            assert_eq!(words_for_width(width), words, "width {}", width);
        }
    }

    #[test]
    fn test_word_count_matches_dimensions() {
        for (w, h) in [(3, 3), (33, 7), (95, 11), (1000, 2)] {
            let grid = BitGrid::new(w, h);
            assert_eq!(grid.width_words(), w.div_ceil(32));
            assert_eq!(grid.words().len(), (grid.width_words() * h) as usize);
        }
    }

    #[test]
    fn test_set_then_get() {
        let mut grid = BitGrid::new(70, 5);
        assert_eq!(grid.get_bit(65, 3), 0);
        grid.set_bit(65, 3);
        assert_eq!(grid.get_bit(65, 3), 1);
        assert_eq!(grid.get_bit(64, 3), 0);
        assert_eq!(grid.get_bit(65, 2), 0);
    }

    #[test]
    fn test_set_bit_is_idempotent() {
        let mut grid = BitGrid::new(40, 4);
        grid.set_bit(31, 1);
        let once = grid.clone();
        grid.set_bit(31, 1);
        assert_eq!(grid, once);
        assert_eq!(grid.population(), 1);
    }

    #[test]
    fn test_bit_addressing_layout() {
        let mut grid = BitGrid::new(64, 3);
        grid.set_bit(33, 2);
        // row 2, second word, bit 1
        assert_eq!(grid.words()[2 * 2 + 1], 1 << 1);
    }

    #[test]
    fn test_live_cells_row_major() {
        let mut grid = BitGrid::new(64, 3);
        grid.set_bit(40, 0);
        grid.set_bit(2, 1);
        grid.set_bit(0, 2);
        let cells: Vec<_> = grid.live_cells().collect();
        assert_eq!(cells, vec![(40, 0), (2, 1), (0, 2)]);
    }

    #[test]
    fn test_from_words_rejects_wrong_length() {
        assert!(BitGrid::from_words(2, 3, vec![0; 5]).is_err());
        assert!(BitGrid::from_words(2, 3, vec![0; 6]).is_ok());
    }
}
