//! Styled cells and screen lines.

/// A color carried by an SGR sequence. Absence of a color on a
/// [`Style`] means the terminal default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    /// 3/4-bit indexed color, 0-7 (`SGR 30-37` / `40-47`).
    Indexed(u8),
    /// 8-bit palette color (`SGR 38;5;N` / `48;5;N`).
    Palette(u8),
    /// 24-bit truecolor (`SGR 38;2;R;G;B` / `48;2;R;G;B`).
    Rgb { r: u8, g: u8, b: u8 },
}

/// Text attributes in effect when a cell is written.
///
/// A snapshot of the current style is copied onto each cell at write
/// time; SGR sequences mutate the terminal's current style incrementally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Style {
    pub bold: bool,
    pub dim: bool,
    pub italic: bool,
    pub underline: bool,
    pub blink: bool,
    pub reverse: bool,
    pub hidden: bool,
    pub strikethrough: bool,
    pub fg: Option<Color>,
    pub bg: Option<Color>,
}

/// One written screen cell. Unwritten columns are `None` in their line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub style: Style,
}

/// A screen row: a fixed-width run of optional cells plus a flattened
/// text cache.
///
/// Mutators do not touch the cache; callers batch their cell writes and
/// then call [`Line::rebuild_text`] once. The cache flattens unwritten
/// cells to spaces and stops at the last written column.
#[derive(Debug, Clone)]
pub struct Line {
    cells: Vec<Option<Cell>>,
    text: String,
}

impl Line {
    pub fn new(cols: usize) -> Self {
        Self {
            cells: vec![None; cols],
            text: String::new(),
        }
    }

    /// Flattened text, valid as of the last `rebuild_text` call.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cell(&self, x: usize) -> Option<&Cell> {
        self.cells.get(x).and_then(|c| c.as_ref())
    }

    pub fn set_cell(&mut self, x: usize, cell: Cell) {
        if let Some(slot) = self.cells.get_mut(x) {
            *slot = Some(cell);
        }
    }

    /// Clear cells in `[from, to]`, both clamped to the line width.
    pub fn clear_range(&mut self, from: usize, to: usize) {
        let end = to.min(self.cells.len().saturating_sub(1));
        for x in from..=end {
            if let Some(slot) = self.cells.get_mut(x) {
                *slot = None;
            }
        }
    }

    pub fn clear_all(&mut self) {
        for slot in &mut self.cells {
            *slot = None;
        }
        self.text.clear();
    }

    /// Rebuild the flattened text cache from the cells.
    pub fn rebuild_text(&mut self) {
        let last = match self.cells.iter().rposition(|c| c.is_some()) {
            Some(last) => last,
            None => {
                self.text.clear();
                return;
            }
        };
        self.text.clear();
        for slot in &self.cells[..=last] {
            self.text.push(slot.as_ref().map_or(' ', |cell| cell.ch));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_line_flattens_to_empty_text() {
        let mut line = Line::new(10);
        line.rebuild_text();
        assert_eq!(line.text(), "");
    }

    #[test]
    fn text_stops_at_last_written_cell() {
        let mut line = Line::new(10);
        line.set_cell(
            2,
            Cell {
                ch: 'x',
                style: Style::default(),
            },
        );
        line.rebuild_text();
        assert_eq!(line.text(), "  x");
    }

    #[test]
    fn clear_range_blanks_cells() {
        let mut line = Line::new(5);
        for x in 0..5 {
            line.set_cell(
                x,
                Cell {
                    ch: 'a',
                    style: Style::default(),
                },
            );
        }
        line.clear_range(1, 3);
        line.rebuild_text();
        assert_eq!(line.text(), "a   a");
    }

    #[test]
    fn set_cell_out_of_bounds_is_ignored() {
        let mut line = Line::new(3);
        line.set_cell(
            7,
            Cell {
                ch: 'x',
                style: Style::default(),
            },
        );
        line.rebuild_text();
        assert_eq!(line.text(), "");
    }
}
