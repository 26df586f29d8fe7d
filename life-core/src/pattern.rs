//! # Pattern - Run-Length Encoded Pattern Loader
//!
//! Reads the Golly-style RLE format:
//!
//! ```text
//! #N Glider
//! x = 3, y = 3, rule = B3/S23
//! bo$2bo$3o!
//! ```
//!
//! `#` lines are comments, the first other line is the header, and the
//! rest is a stream of `<count><tag>` runs: `o` live, `b` dead, `$` row
//! break. A missing count means 1. `!` ends the pattern.

use std::path::Path;

use crate::error::{LifeError, LifeResult};
use crate::grid::BitGrid;

/// A loaded pattern: declared size, rule text, and the seeded grid
#[derive(Clone, Debug)]
pub struct Pattern {
    width: u32,
    height: u32,
    rule: Option<String>,
    grid: BitGrid,
}

struct Header {
    width: u32,
    height: u32,
    rule: Option<String>,
}

/// Cursor state while scanning body runs
struct Cursor {
    x: u32,
    y: u32,
    count: Option<u32>,
}

impl Cursor {
    fn take_count(&mut self) -> u32 {
        self.count.take().unwrap_or(1).max(1)
    }
}

impl Pattern {
    /// Parse RLE text
    pub fn parse(text: &str) -> LifeResult<Self> {
        let mut pattern: Option<Pattern> = None;
        let mut cursor = Cursor {
            x: 0,
            y: 0,
            count: None,
        };
        let mut last_line = 0;

        'lines: for (index, raw) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            last_line = line_no;

            if line.starts_with('x') {
                if pattern.is_some() {
                    return Err(LifeError::malformed(line_no, "duplicate header"));
                }
                let header = parse_header(line, line_no)?;
                pattern = Some(Pattern {
                    width: header.width,
                    height: header.height,
                    rule: header.rule,
                    grid: BitGrid::new(header.width, header.height),
                });
                continue;
            }

            let Some(current) = pattern.as_mut() else {
                return Err(LifeError::malformed(line_no, "pattern data before the header"));
            };

            for c in line.chars() {
                match c {
                    '0'..='9' => {
                        let digit = c as u32 - '0' as u32;
                        let count = cursor
                            .count
                            .unwrap_or(0)
                            .checked_mul(10)
                            .and_then(|n| n.checked_add(digit))
                            .ok_or_else(|| LifeError::malformed(line_no, "run count overflows"))?;
                        cursor.count = Some(count);
                    }
                    'b' => {
                        let n = cursor.take_count();
                        cursor.x = cursor.x.saturating_add(n);
                    }
                    'o' => {
                        let n = cursor.take_count();
                        current.place_run(&cursor, n, line_no)?;
                        cursor.x = cursor.x.saturating_add(n);
                    }
                    '$' => {
                        let n = cursor.take_count();
                        cursor.y = cursor.y.saturating_add(n);
                        cursor.x = 0;
                    }
                    '!' => {
                        if cursor.count.is_some() {
                            return Err(LifeError::malformed(line_no, "run count without a tag"));
                        }
                        break 'lines;
                    }
                    c if c.is_whitespace() => {}
                    other => {
                        return Err(LifeError::malformed(
                            line_no,
                            format!("unexpected character '{}'", other),
                        ));
                    }
                }
            }
        }

        if cursor.count.is_some() {
            return Err(LifeError::malformed(last_line, "run count without a tag"));
        }

        pattern.ok_or_else(|| LifeError::malformed(last_line.max(1), "missing 'x = .., y = ..' header"))
    }

    /// Read and parse an RLE file
    pub fn load(path: impl AsRef<Path>) -> LifeResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| LifeError::PatternFile {
            path: path.to_path_buf(),
            source,
        })?;
        let pattern = Self::parse(&text)?;
        tracing::info!(
            "Loaded {} ({}x{}, {} live cells)",
            path.display(),
            pattern.width,
            pattern.height,
            pattern.grid.population()
        );
        Ok(pattern)
    }

    fn place_run(&mut self, cursor: &Cursor, n: u32, line_no: usize) -> LifeResult<()> {
        let end = cursor.x as u64 + n as u64;
        if cursor.y >= self.height || end > self.width as u64 {
            return Err(LifeError::malformed(
                line_no,
                format!(
                    "live cells at x = {}..{}, y = {} outside the declared {}x{}",
                    cursor.x, end, cursor.y, self.width, self.height
                ),
            ));
        }
        for x in cursor.x..cursor.x + n {
            self.grid.set_bit(x, cursor.y);
        }
        Ok(())
    }

    /// Declared width in cells
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Declared height in cells
    pub fn height(&self) -> u32 {
        self.height
    }

    /// `rule = ...` header value, verbatim
    pub fn rule(&self) -> Option<&str> {
        self.rule.as_deref()
    }

    pub fn grid(&self) -> &BitGrid {
        &self.grid
    }

    pub fn into_grid(self) -> BitGrid {
        self.grid
    }

    /// Live cell coordinates, row-major
    pub fn live_cells(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.grid.live_cells()
    }
}

fn parse_header(line: &str, line_no: usize) -> LifeResult<Header> {
    let mut width = None;
    let mut height = None;
    let (fields, rule) = split_rule(line);
    let rule = rule.map(str::to_string);

    for part in fields.split(',').filter(|p| !p.trim().is_empty()) {
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| LifeError::malformed(line_no, format!("header field '{}' has no '='", part.trim())))?;
        let value = value.trim();
        match key.trim() {
            "x" => width = Some(parse_extent(value, "x", line_no)?),
            "y" => height = Some(parse_extent(value, "y", line_no)?),
            _ => {}
        }
    }

    let width = width.ok_or_else(|| LifeError::malformed(line_no, "header is missing 'x'"))?;
    let height = height.ok_or_else(|| LifeError::malformed(line_no, "header is missing 'y'"))?;

    if let Some(rule) = &rule {
        if !is_conway_rule(rule) {
            tracing::warn!("Rule '{}' is not B3/S23; the kernels always run Conway's rule", rule);
        }
    }

    Ok(Header {
        width,
        height,
        rule,
    })
}

/// Split off `rule = ...`, which runs to the end of the line and may itself
/// contain commas (`B3/S23:T100,80`)
fn split_rule(line: &str) -> (&str, Option<&str>) {
    let starts = std::iter::once(0).chain(line.match_indices(',').map(|(i, _)| i + 1));
    for start in starts {
        if let Some((key, value)) = line[start..].split_once('=') {
            if key.trim() == "rule" {
                return (&line[..start], Some(value.trim()));
            }
        }
    }
    (line, None)
}

fn parse_extent(value: &str, key: &str, line_no: usize) -> LifeResult<u32> {
    let extent: u32 = value
        .parse()
        .map_err(|_| LifeError::malformed(line_no, format!("'{}' is not a valid {} size", value, key)))?;
    if extent == 0 {
        return Err(LifeError::malformed(line_no, format!("{} size must be positive", key)));
    }
    Ok(extent)
}

fn is_conway_rule(rule: &str) -> bool {
    let normalized: String = rule
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();
    normalized == "B3/S23" || normalized == "23/3"
}

#[cfg(test)]
mod tests {
    use super::*;

    const GLIDER: &str = "#N Glider\nx = 3, y = 3, rule = B3/S23\nbo$2bo$3o!\n";

    #[test]
    fn test_glider() {
        let pattern = Pattern::parse(GLIDER).unwrap();
        assert_eq!((pattern.width(), pattern.height()), (3, 3));
        assert_eq!(pattern.rule(), Some("B3/S23"));
        let cells: Vec<_> = pattern.live_cells().collect();
        assert_eq!(cells, vec![(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)]);
    }

    #[test]
    fn test_header_allocates_padded_words() {
        let pattern = Pattern::parse("x = 33, y = 4\n").unwrap();
        assert_eq!(pattern.grid().width_words(), 2);
        assert_eq!(pattern.grid().words().len(), 8);
    }

    #[test]
    fn test_multi_row_break_and_counts() {
        let pattern = Pattern::parse("x = 12, y = 5\n2b3o2$10bo!").unwrap();
        let cells: Vec<_> = pattern.live_cells().collect();
        assert_eq!(cells, vec![(2, 0), (3, 0), (4, 0), (10, 2)]);
    }

    #[test]
    fn test_runs_span_lines_and_terminator_optional() {
        let pattern = Pattern::parse("x = 4, y = 2\n2o\n$o\n").unwrap();
        let cells: Vec<_> = pattern.live_cells().collect();
        assert_eq!(cells, vec![(0, 0), (1, 0), (0, 1)]);
    }

    #[test]
    fn test_text_after_terminator_ignored() {
        let pattern = Pattern::parse("x = 2, y = 1\no!\nthis is not rle").unwrap();
        assert_eq!(pattern.grid().population(), 1);
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let pattern = Pattern::parse("#C one\n\n#C two\nx = 2, y = 2\n#C three\no$bo!").unwrap();
        assert_eq!(pattern.grid().population(), 2);
    }

    #[test]
    fn test_body_before_header_fails() {
        let err = Pattern::parse("bo$2bo$3o!\nx = 3, y = 3").unwrap_err();
        assert!(matches!(err, LifeError::MalformedPattern { line: 1, .. }));
    }

    #[test]
    fn test_missing_header_fails() {
        assert!(matches!(
            Pattern::parse("#C only a comment\n"),
            Err(LifeError::MalformedPattern { .. })
        ));
    }

    #[test]
    fn test_live_cell_outside_bounds_fails() {
        let err = Pattern::parse("x = 3, y = 3\n4o!").unwrap_err();
        assert!(matches!(err, LifeError::MalformedPattern { line: 2, .. }));

        let err = Pattern::parse("x = 3, y = 2\no2$o!").unwrap_err();
        assert!(matches!(err, LifeError::MalformedPattern { .. }));
    }

    #[test]
    fn test_dead_run_past_width_is_harmless() {
        let pattern = Pattern::parse("x = 3, y = 2\n5b$o!").unwrap();
        assert_eq!(pattern.live_cells().collect::<Vec<_>>(), vec![(0, 1)]);
    }

    #[test]
    fn test_bad_header_values() {
        assert!(Pattern::parse("x = three, y = 3\n").is_err());
        assert!(Pattern::parse("x = 3\n").is_err());
        assert!(Pattern::parse("x = 0, y = 3\n").is_err());
        assert!(Pattern::parse("x = 3, y = 3\nx = 3, y = 3\n").is_err());
    }

    #[test]
    fn test_unexpected_character_fails() {
        assert!(Pattern::parse("x = 3, y = 3\n2A!").is_err());
    }

    #[test]
    fn test_dangling_count_fails() {
        assert!(Pattern::parse("x = 3, y = 3\no3").is_err());
        assert!(Pattern::parse("x = 3, y = 3\no3!").is_err());
    }

    #[test]
    fn test_other_rules_still_load() {
        let pattern = Pattern::parse("x = 2, y = 1, rule = B36/S23\n2o!").unwrap();
        assert_eq!(pattern.rule(), Some("B36/S23"));
        assert!(is_conway_rule("b3/s23"));
        assert!(is_conway_rule("23/3"));
        assert!(!is_conway_rule("B36/S23"));
    }

    #[test]
    fn test_bounded_grid_rule_with_comma() {
        let pattern = Pattern::parse("x = 3, y = 3, rule = B3/S23:T100,80\nbo$2bo$3o!").unwrap();
        assert_eq!((pattern.width(), pattern.height()), (3, 3));
        assert_eq!(pattern.rule(), Some("B3/S23:T100,80"));
        assert_eq!(pattern.grid().population(), 5);

        // rule first, extents after it belong to the rule text
        let pattern = Pattern::parse("rule = B3/S23, x = 1, y = 1\no!");
        assert!(pattern.is_err());

        let pattern = Pattern::parse("x=2,y=1,rule=b3/s23\n2o!").unwrap();
        assert_eq!(pattern.rule(), Some("b3/s23"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Pattern::load("/nonexistent/pattern.rle").unwrap_err();
        assert!(matches!(err, LifeError::PatternFile { .. }));
    }
}
