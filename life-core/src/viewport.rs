//! # Viewport - Panned Window into the Grid
//!
//! Pointer drags move the offset. While the button is held the offset
//! follows the pointer from the anchor taken on press, clamped per axis
//! to `[0, grid_extent - view_extent]`.

use crate::traits::CellSource;

#[derive(Clone, Copy, Debug)]
struct DragAnchor {
    pointer: (i64, i64),
    offset: (u32, u32),
}

/// Visible sub-rectangle of the grid
#[derive(Clone, Debug)]
pub struct Viewport {
    view_width: u32,
    view_height: u32,
    grid_width: u32,
    grid_height: u32,
    offset: (u32, u32),
    drag: Option<DragAnchor>,
}

impl Viewport {
    /// Viewport at offset (0, 0). `grid_width` is the padded bit width.
    pub fn new(view_width: u32, view_height: u32, grid_width: u32, grid_height: u32) -> Self {
        Self {
            view_width,
            view_height,
            grid_width,
            grid_height,
            offset: (0, 0),
            drag: None,
        }
    }

    /// Feed one pointer sample
    pub fn pan(&mut self, pointer_x: i32, pointer_y: i32, pressed: bool) {
        let pointer = (pointer_x as i64, pointer_y as i64);
        match (pressed, self.drag) {
            (false, _) => self.drag = None,
            (true, None) => {
                self.drag = Some(DragAnchor {
                    pointer,
                    offset: self.offset,
                });
            }
            (true, Some(anchor)) => {
                let x = anchor.offset.0 as i64 - (pointer.0 - anchor.pointer.0);
                let y = anchor.offset.1 as i64 - (pointer.1 - anchor.pointer.1);
                self.offset = (
                    clamp_axis(x, self.grid_width, self.view_width),
                    clamp_axis(y, self.grid_height, self.view_height),
                );
            }
        }
    }

    /// Resize the window; the offset is re-clamped
    pub fn set_view_size(&mut self, view_width: u32, view_height: u32) {
        self.view_width = view_width;
        self.view_height = view_height;
        self.offset = (
            clamp_axis(self.offset.0 as i64, self.grid_width, view_width),
            clamp_axis(self.offset.1 as i64, self.grid_height, view_height),
        );
    }

    pub fn offset(&self) -> (u32, u32) {
        self.offset
    }

    pub fn view_size(&self) -> (u32, u32) {
        (self.view_width, self.view_height)
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Cell at view position `(vx, vy)`; 0 past the grid edge
    pub fn sample<S: CellSource + ?Sized>(&self, source: &S, vx: u32, vy: u32) -> u32 {
        let x = self.offset.0 as u64 + vx as u64;
        let y = self.offset.1 as u64 + vy as u64;
        if x >= source.width() as u64 || y >= source.height() as u64 {
            return 0;
        }
        source.get_bit(x as u32, y as u32)
    }

    /// Live cells inside the window
    pub fn visible_population<S: CellSource + ?Sized>(&self, source: &S) -> u64 {
        let mut count = 0u64;
        for vy in 0..self.view_height {
            for vx in 0..self.view_width {
                count += self.sample(source, vx, vy) as u64;
            }
        }
        count
    }
}

fn clamp_axis(value: i64, grid_extent: u32, view_extent: u32) -> u32 {
    let max = grid_extent.saturating_sub(view_extent) as i64;
    value.clamp(0, max) as u32
}
