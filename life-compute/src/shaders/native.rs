//! Native twins of the WGSL entry points
//!
//! Each function runs one work-item, exactly like its WGSL counterpart
//! including the index-range guard.

use life_core::error::LifeResult;
use life_core::grid::{read_bit, word_index};
use life_core::WORD_BITS;

use super::{DST_BINDING, SRC_BINDING, WIDTH_WORDS_BINDING};
use crate::backend::KernelArgs;

/// `empty_cells`: zero one word of dst
pub fn empty_cells(args: &mut KernelArgs, id: [u32; 3]) -> LifeResult<()> {
    let dst = args.words_mut(DST_BINDING)?;
    if let Some(word) = dst.get_mut(id[0] as usize) {
        *word = 0;
    }
    Ok(())
}

/// `process_cells`: apply B3/S23 at cell `(id.x, id.y)`
pub fn process_cells(args: &mut KernelArgs, id: [u32; 3]) -> LifeResult<()> {
    let width_words = args.scalar(WIDTH_WORDS_BINDING)?.bits();
    let (dst, src) = args.split_mut(DST_BINDING, SRC_BINDING)?;
    if width_words == 0 {
        return Ok(());
    }
    let width = width_words as i64 * WORD_BITS as i64;
    let height = (src.len() / width_words as usize) as i64;
    let (x, y) = (id[0] as i64, id[1] as i64);
    if x >= width || y >= height {
        return Ok(());
    }

    let cell = |cx: i64, cy: i64| -> u32 {
        if cx < 0 || cy < 0 || cx >= width || cy >= height {
            0
        } else {
            read_bit(src, width_words, cx as u32, cy as u32)
        }
    };

    let mut n = 0;
    for dy in -1..=1 {
        for dx in -1..=1 {
            if dx != 0 || dy != 0 {
                n += cell(x + dx, y + dy);
            }
        }
    }

    if (cell(x, y) == 1 && n == 2) || n == 3 {
        let (x, y) = (x as u32, y as u32);
        dst[word_index(width_words, x, y)] |= 1 << (x & 31);
    }
    Ok(())
}

/// `swap_cells`: copy one word from dst into src
pub fn swap_cells(args: &mut KernelArgs, id: [u32; 3]) -> LifeResult<()> {
    let (src, dst) = args.split_mut(SRC_BINDING, DST_BINDING)?;
    let i = id[0] as usize;
    if i < src.len() {
        src[i] = dst.get(i).copied().unwrap_or(0);
    }
    Ok(())
}
