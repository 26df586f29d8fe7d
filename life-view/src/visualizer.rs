//! Terminal rendering of the visible window
//!
//! Each character cell covers one column and two grid rows, drawn with
//! upper/lower half blocks.

use std::time::Duration;

use life_core::traits::CellSource;
use life_core::viewport::Viewport;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

/// Header rows (bordered, one line of text)
const HEADER_HEIGHT: u16 = 3;

/// Glyph for a column of two cells
pub fn half_block(top: u32, bottom: u32) -> char {
    match (top != 0, bottom != 0) {
        (true, true) => '█',
        (true, false) => '▀',
        (false, true) => '▄',
        (false, false) => ' ',
    }
}

/// Viewport extent (cells) that fits a terminal of `cols` x `rows`
pub fn grid_view_size(cols: u16, rows: u16) -> (u32, u32) {
    let inner_cols = cols.saturating_sub(2) as u32;
    let inner_rows = rows.saturating_sub(HEADER_HEIGHT + 2) as u32;
    (inner_cols, inner_rows * 2)
}

/// Render `rows` lines of `cols` glyphs from the viewport
pub fn render_rows<S: CellSource + ?Sized>(
    source: &S,
    viewport: &Viewport,
    cols: u32,
    rows: u32,
) -> Vec<String> {
    (0..rows)
        .map(|row| {
            (0..cols)
                .map(|col| {
                    let top = viewport.sample(source, col, row * 2);
                    let bottom = viewport.sample(source, col, row * 2 + 1);
                    half_block(top, bottom)
                })
                .collect()
        })
        .collect()
}

/// Header and grid panes
pub struct LifeVisualizer {
    backend: String,
    generation: u64,
    last_step: Duration,
    finished: bool,
}

impl LifeVisualizer {
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            generation: 0,
            last_step: Duration::ZERO,
            finished: false,
        }
    }

    pub fn record_tick(&mut self, generation: u64, elapsed: Duration) {
        self.generation = generation;
        self.last_step = elapsed;
    }

    /// Generation cap reached; the last frame stays on screen
    pub fn mark_finished(&mut self) {
        self.finished = true;
    }

    pub fn draw<S: CellSource + ?Sized>(&self, frame: &mut Frame, source: &S, viewport: &Viewport) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(HEADER_HEIGHT), Constraint::Min(0)])
            .split(frame.area());

        self.draw_header(frame, chunks[0], viewport);
        self.draw_grid(frame, chunks[1], source, viewport);
    }

    fn draw_header(&self, frame: &mut Frame, area: Rect, viewport: &Viewport) {
        let (x, y) = viewport.offset();
        let state = if self.finished { "done" } else { "running" };

        let line = Line::from(vec![
            Span::styled(
                format!(" gen {} ", self.generation),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
            Span::raw("│ "),
            Span::styled(self.backend.clone(), Style::default().fg(Color::Cyan)),
            Span::raw(format!(" │ step {:.2} ms", self.last_step.as_secs_f64() * 1000.0)),
            Span::raw(format!(" │ offset ({}, {})", x, y)),
            Span::styled(format!(" │ {}", state), Style::default().fg(Color::DarkGray)),
            Span::styled("  drag to pan, q to quit", Style::default().fg(Color::DarkGray)),
        ]);

        let header = Paragraph::new(line).block(Block::default().borders(Borders::ALL).title(" Life "));
        frame.render_widget(header, area);
    }

    fn draw_grid<S: CellSource + ?Sized>(
        &self,
        frame: &mut Frame,
        area: Rect,
        source: &S,
        viewport: &Viewport,
    ) {
        let cols = area.width.saturating_sub(2) as u32;
        let rows = area.height.saturating_sub(2) as u32;

        let lines: Vec<Line> = render_rows(source, viewport, cols, rows)
            .into_iter()
            .map(|row| Line::from(Span::styled(row, Style::default().fg(Color::Green))))
            .collect();

        let grid = Paragraph::new(lines).block(Block::default().borders(Borders::ALL));
        frame.render_widget(grid, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use life_core::grid::BitGrid;

    #[test]
    fn test_half_block_glyphs() {
        assert_eq!(half_block(1, 1), '█');
        assert_eq!(half_block(1, 0), '▀');
        assert_eq!(half_block(0, 1), '▄');
        assert_eq!(half_block(0, 0), ' ');
    }

    #[test]
    fn test_grid_view_size() {
        assert_eq!(grid_view_size(80, 24), (78, 38));
        assert_eq!(grid_view_size(1, 2), (0, 0));
    }

    #[test]
    fn test_render_rows_pairs_grid_rows() {
        let mut grid = BitGrid::new(32, 4);
        grid.set_bit(0, 0);
        grid.set_bit(1, 1);
        grid.set_bit(2, 0);
        grid.set_bit(2, 1);
        grid.set_bit(3, 3);

        let viewport = Viewport::new(4, 4, grid.width(), grid.height());
        let rows = render_rows(&grid, &viewport, 4, 2);
        assert_eq!(rows, vec!["▀▄█ ".to_string(), "   ▄".to_string()]);
    }

    #[test]
    fn test_render_past_grid_edge_is_blank() {
        let mut grid = BitGrid::new(32, 2);
        grid.set_bit(31, 1);

        let viewport = Viewport::new(40, 4, grid.width(), grid.height());
        let rows = render_rows(&grid, &viewport, 34, 2);
        assert_eq!(rows[0].chars().nth(31), Some('▄'));
        assert_eq!(rows[0].chars().nth(33), Some(' '));
        assert!(rows[1].chars().all(|c| c == ' '));
    }
}
