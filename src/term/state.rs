//! The virtual screen: styled cell buffers, cursor, and terminal modes.

use crate::term::cell::{Cell, Line, Style};
use crate::term::parser::SgrAttr;

const TAB_STOP: usize = 8;

/// Terminal mode flags toggled by escape sequences.
#[derive(Debug, Clone, Copy)]
pub struct Modes {
    pub application_keypad: bool,
    pub origin_mode: bool,
    pub autowrap: bool,
    pub insert_mode: bool,
    pub cursor_visible: bool,
    pub alternate_screen: bool,
    pub bracketed_paste: bool,
    pub mouse_tracking: bool,
}

impl Default for Modes {
    fn default() -> Self {
        Self {
            application_keypad: false,
            origin_mode: false,
            autowrap: true,
            insert_mode: false,
            cursor_visible: true,
            alternate_screen: false,
            bracketed_paste: false,
            mouse_tracking: false,
        }
    }
}

/// Cursor position and visibility in a [`Screen`] snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorSnapshot {
    pub x: usize,
    pub y: usize,
    pub visible: bool,
}

/// Immutable snapshot of the active buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    pub lines: Vec<String>,
    pub cursor: CursorSnapshot,
    pub title: String,
}

/// The full virtual terminal: main and alternate buffers, cursor,
/// scroll region, current style, and mode flags.
///
/// Invariant: after any write or movement operation the cursor lies in
/// `[0, cols) × [0, rows)`. Overflow either wraps and scrolls (autowrap)
/// or clamps at the edge.
#[derive(Debug)]
pub struct TerminalState {
    cols: usize,
    rows: usize,
    cursor_x: usize,
    cursor_y: usize,
    saved_cursor: (usize, usize),
    scroll_top: usize,
    scroll_bottom: usize,
    current_style: Style,
    modes: Modes,
    main: Vec<Line>,
    alternate: Vec<Line>,
    title: String,
}

impl TerminalState {
    pub fn new(cols: usize, rows: usize) -> Self {
        let cols = cols.max(1);
        let rows = rows.max(1);
        Self {
            cols,
            rows,
            cursor_x: 0,
            cursor_y: 0,
            saved_cursor: (0, 0),
            scroll_top: 0,
            scroll_bottom: rows - 1,
            current_style: Style::default(),
            modes: Modes::default(),
            main: blank_buffer(cols, rows),
            alternate: blank_buffer(cols, rows),
            title: String::new(),
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cursor(&self) -> (usize, usize) {
        (self.cursor_x, self.cursor_y)
    }

    pub fn modes(&self) -> &Modes {
        &self.modes
    }

    pub fn current_style(&self) -> Style {
        self.current_style
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    pub fn set_autowrap(&mut self, enabled: bool) {
        self.modes.autowrap = enabled;
    }

    pub fn set_cursor_visible(&mut self, visible: bool) {
        self.modes.cursor_visible = visible;
    }

    pub fn set_mouse_tracking(&mut self, enabled: bool) {
        self.modes.mouse_tracking = enabled;
    }

    pub fn set_bracketed_paste(&mut self, enabled: bool) {
        self.modes.bracketed_paste = enabled;
    }

    pub fn set_application_keypad(&mut self, enabled: bool) {
        self.modes.application_keypad = enabled;
    }

    pub fn set_origin_mode(&mut self, enabled: bool) {
        self.modes.origin_mode = enabled;
    }

    pub fn set_insert_mode(&mut self, enabled: bool) {
        self.modes.insert_mode = enabled;
    }

    fn buffer(&self) -> &Vec<Line> {
        if self.modes.alternate_screen {
            &self.alternate
        } else {
            &self.main
        }
    }

    fn buffer_mut(&mut self) -> &mut Vec<Line> {
        if self.modes.alternate_screen {
            &mut self.alternate
        } else {
            &mut self.main
        }
    }

    pub fn line(&self, y: usize) -> Option<&Line> {
        self.buffer().get(y)
    }

    /// Write a run of characters at the cursor, tagging each cell with a
    /// snapshot of the current style.
    ///
    /// With autowrap, filling the last column wraps to column 0 of the
    /// next row and scrolls at the bottom; without it, the cursor clamps
    /// at the last column and later characters overwrite it.
    pub fn write_text(&mut self, text: &str) {
        let cols = self.cols;
        let style = self.current_style;
        for ch in text.chars() {
            let (x, y) = (self.cursor_x, self.cursor_y);
            if let Some(line) = self.buffer_mut().get_mut(y) {
                line.set_cell(x, Cell { ch, style });
            }
            if self.cursor_x + 1 < cols {
                self.cursor_x += 1;
            } else if self.modes.autowrap {
                self.rebuild_line(self.cursor_y);
                self.cursor_x = 0;
                if self.cursor_y + 1 < self.rows {
                    self.cursor_y += 1;
                } else {
                    self.scroll_up(1);
                }
            } else {
                self.cursor_x = cols - 1;
            }
        }
        self.rebuild_line(self.cursor_y);
    }

    fn rebuild_line(&mut self, y: usize) {
        if let Some(line) = self.buffer_mut().get_mut(y) {
            line.rebuild_text();
        }
    }

    pub fn linefeed(&mut self) {
        if self.cursor_y + 1 < self.rows {
            self.cursor_y += 1;
        } else {
            self.scroll_up(1);
        }
    }

    pub fn carriage_return(&mut self) {
        self.cursor_x = 0;
    }

    pub fn backspace(&mut self) {
        self.cursor_x = self.cursor_x.saturating_sub(1);
    }

    pub fn tab(&mut self) {
        let next = (self.cursor_x / TAB_STOP + 1) * TAB_STOP;
        self.cursor_x = next.min(self.cols - 1);
    }

    pub fn move_up(&mut self, count: usize) {
        self.cursor_y = self.cursor_y.saturating_sub(count);
    }

    pub fn move_down(&mut self, count: usize) {
        self.cursor_y = (self.cursor_y + count).min(self.rows - 1);
    }

    pub fn move_forward(&mut self, count: usize) {
        self.cursor_x = (self.cursor_x + count).min(self.cols - 1);
    }

    pub fn move_back(&mut self, count: usize) {
        self.cursor_x = self.cursor_x.saturating_sub(count);
    }

    /// Move to an absolute position carried 1-based by CUP/HVP.
    pub fn set_position(&mut self, row: u16, col: u16) {
        self.cursor_y = usize::from(row.max(1) - 1).min(self.rows - 1);
        self.cursor_x = usize::from(col.max(1) - 1).min(self.cols - 1);
    }

    /// Move to an absolute 1-based column on the current row.
    pub fn set_column(&mut self, col: u16) {
        self.cursor_x = usize::from(col.max(1) - 1).min(self.cols - 1);
    }

    pub fn save_cursor(&mut self) {
        self.saved_cursor = (self.cursor_x, self.cursor_y);
    }

    pub fn restore_cursor(&mut self) {
        let (x, y) = self.saved_cursor;
        self.cursor_x = x.min(self.cols - 1);
        self.cursor_y = y.min(self.rows - 1);
    }

    /// `ESC M`: move up one row, scrolling the region down at the top.
    pub fn reverse_index(&mut self) {
        if self.cursor_y == self.scroll_top {
            self.scroll_down(1);
        } else {
            self.cursor_y = self.cursor_y.saturating_sub(1);
        }
    }

    /// Scroll the region up: drop lines at the top, blank lines appear
    /// at the bottom.
    pub fn scroll_up(&mut self, count: usize) {
        let cols = self.cols;
        let (top, bottom) = (self.scroll_top, self.scroll_bottom);
        let buffer = self.buffer_mut();
        for _ in 0..count.min(bottom - top + 1) {
            buffer.remove(top);
            buffer.insert(bottom, Line::new(cols));
        }
    }

    /// Scroll the region down: blank lines appear at the top.
    pub fn scroll_down(&mut self, count: usize) {
        let cols = self.cols;
        let (top, bottom) = (self.scroll_top, self.scroll_bottom);
        let buffer = self.buffer_mut();
        for _ in 0..count.min(bottom - top + 1) {
            buffer.remove(bottom);
            buffer.insert(top, Line::new(cols));
        }
    }

    /// `CSI Ps J`: 0 = cursor to end, 1 = start to cursor, 2 = all.
    pub fn erase_display(&mut self, mode: u8) {
        let (x, y) = (self.cursor_x, self.cursor_y);
        let (cols, rows) = (self.cols, self.rows);
        let buffer = self.buffer_mut();
        match mode {
            0 => {
                for (row, line) in buffer.iter_mut().enumerate().skip(y) {
                    if row == y {
                        line.clear_range(x, cols - 1);
                        line.rebuild_text();
                    } else {
                        line.clear_all();
                    }
                }
            }
            1 => {
                for (row, line) in buffer.iter_mut().enumerate().take(y + 1) {
                    if row == y {
                        line.clear_range(0, x);
                        line.rebuild_text();
                    } else {
                        line.clear_all();
                    }
                }
            }
            _ => {
                for line in buffer.iter_mut().take(rows) {
                    line.clear_all();
                }
            }
        }
    }

    /// `CSI Ps K`: 0 = cursor to end, 1 = start to cursor, 2 = all.
    pub fn erase_line(&mut self, mode: u8) {
        let (x, cols) = (self.cursor_x, self.cols);
        let y = self.cursor_y;
        if let Some(line) = self.buffer_mut().get_mut(y) {
            match mode {
                0 => line.clear_range(x, cols - 1),
                1 => line.clear_range(0, x),
                _ => line.clear_all(),
            }
            line.rebuild_text();
        }
    }

    /// Enter the alternate screen (private mode 1049): saves the cursor
    /// and homes it on a blank alternate buffer.
    pub fn enter_alternate_screen(&mut self) {
        if self.modes.alternate_screen {
            return;
        }
        self.saved_cursor = (self.cursor_x, self.cursor_y);
        self.modes.alternate_screen = true;
        self.alternate = blank_buffer(self.cols, self.rows);
        self.cursor_x = 0;
        self.cursor_y = 0;
    }

    /// Leave the alternate screen, restoring the saved cursor on the
    /// untouched main buffer.
    pub fn leave_alternate_screen(&mut self) {
        if !self.modes.alternate_screen {
            return;
        }
        self.modes.alternate_screen = false;
        let (x, y) = self.saved_cursor;
        self.cursor_x = x.min(self.cols - 1);
        self.cursor_y = y.min(self.rows - 1);
    }

    pub fn apply_sgr(&mut self, attrs: &[SgrAttr]) {
        for attr in attrs {
            match attr {
                SgrAttr::Reset => self.current_style = Style::default(),
                SgrAttr::Bold => self.current_style.bold = true,
                SgrAttr::Dim => self.current_style.dim = true,
                SgrAttr::Italic => self.current_style.italic = true,
                SgrAttr::Underline => self.current_style.underline = true,
                SgrAttr::Blink => self.current_style.blink = true,
                SgrAttr::Reverse => self.current_style.reverse = true,
                SgrAttr::Hidden => self.current_style.hidden = true,
                SgrAttr::Strikethrough => self.current_style.strikethrough = true,
                SgrAttr::Fg(color) => self.current_style.fg = Some(*color),
                SgrAttr::Bg(color) => self.current_style.bg = Some(*color),
                SgrAttr::DefaultFg => self.current_style.fg = None,
                SgrAttr::DefaultBg => self.current_style.bg = None,
            }
        }
    }

    /// Snapshot the active buffer as flattened text lines.
    pub fn screen(&self) -> Screen {
        Screen {
            lines: self.buffer().iter().map(|l| l.text().to_string()).collect(),
            cursor: CursorSnapshot {
                x: self.cursor_x,
                y: self.cursor_y,
                visible: self.modes.cursor_visible,
            },
            title: self.title.clone(),
        }
    }
}

fn blank_buffer(cols: usize, rows: usize) -> Vec<Line> {
    (0..rows).map(|_| Line::new(cols)).collect()
}
