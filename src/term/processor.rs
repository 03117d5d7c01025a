//! Applies parser events to the virtual screen.

use crate::term::parser::{AnsiParser, CsiAction, ParserEvent};
use crate::term::state::{Screen, TerminalState};

/// Private (DEC) mode numbers handled by the screen model.
const MODE_ORIGIN: u16 = 6;
const MODE_AUTOWRAP: u16 = 7;
const MODE_CURSOR_VISIBLE: u16 = 25;
const MODE_MOUSE_TRACKING: u16 = 1000;
const MODE_ALTERNATE_SCREEN: u16 = 1049;
const MODE_BRACKETED_PASTE: u16 = 2004;

/// ANSI insert mode (`CSI 4 h`).
const MODE_INSERT: u16 = 4;

/// A screen-mutation notification, one per mutation class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    Text,
    Cursor,
    Erase,
    Style,
    Mode,
    Title(String),
    Resize { cols: u16, rows: u16 },
    Reset,
}

/// Owns a parser and a [`TerminalState`]; `process` feeds raw decoded
/// text through the parser and mutates the screen accordingly.
#[derive(Debug)]
pub struct OutputProcessor {
    cols: u16,
    rows: u16,
    parser: AnsiParser,
    state: TerminalState,
}

impl OutputProcessor {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            cols,
            rows,
            parser: AnsiParser::new(),
            state: TerminalState::new(usize::from(cols), usize::from(rows)),
        }
    }

    /// Parse a chunk of decoded text and apply every event, returning
    /// the mutation notifications in order.
    pub fn process(&mut self, data: &str) -> Vec<Update> {
        let events = self.parser.parse(data);
        let mut updates = Vec::new();
        for event in events {
            self.apply(event, &mut updates);
        }
        updates
    }

    pub fn screen(&self) -> Screen {
        self.state.screen()
    }

    pub fn state(&self) -> &TerminalState {
        &self.state
    }

    /// Discard the buffers and rebuild blank state at the new size.
    /// Existing content is not reflowed.
    pub fn resize(&mut self, cols: u16, rows: u16) -> Update {
        self.cols = cols;
        self.rows = rows;
        self.state = TerminalState::new(usize::from(cols), usize::from(rows));
        Update::Resize { cols, rows }
    }

    pub fn reset(&mut self) {
        self.state = TerminalState::new(usize::from(self.cols), usize::from(self.rows));
        self.parser.reset();
    }

    fn apply(&mut self, event: ParserEvent, updates: &mut Vec<Update>) {
        match event {
            ParserEvent::Text(text) => {
                self.state.write_text(&text);
                updates.push(Update::Text);
            }
            ParserEvent::Linefeed => {
                self.state.linefeed();
                updates.push(Update::Cursor);
            }
            ParserEvent::CarriageReturn => {
                self.state.carriage_return();
                updates.push(Update::Cursor);
            }
            ParserEvent::Backspace => {
                self.state.backspace();
                updates.push(Update::Cursor);
            }
            ParserEvent::Tab => {
                self.state.tab();
                updates.push(Update::Cursor);
            }
            ParserEvent::Bell => {}
            ParserEvent::Sequence(action) => self.apply_sequence(action, updates),
            ParserEvent::Title(title) => {
                self.state.set_title(&title);
                updates.push(Update::Title(title));
            }
            ParserEvent::TabTitle(_) => {}
            ParserEvent::Hyperlink { .. } => {}
            ParserEvent::SaveCursor => {
                self.state.save_cursor();
            }
            ParserEvent::RestoreCursor => {
                self.state.restore_cursor();
                updates.push(Update::Cursor);
            }
            ParserEvent::Index => {
                self.state.linefeed();
                updates.push(Update::Cursor);
            }
            ParserEvent::ReverseIndex => {
                self.state.reverse_index();
                updates.push(Update::Cursor);
            }
            ParserEvent::NextLine => {
                self.state.carriage_return();
                self.state.linefeed();
                updates.push(Update::Cursor);
            }
            ParserEvent::Reset => {
                self.reset();
                updates.push(Update::Reset);
            }
            ParserEvent::ApplicationKeypad(enabled) => {
                self.state.set_application_keypad(enabled);
                updates.push(Update::Mode);
            }
        }
    }

    fn apply_sequence(&mut self, action: CsiAction, updates: &mut Vec<Update>) {
        match action {
            CsiAction::CursorUp(n) => {
                self.state.move_up(usize::from(n));
                updates.push(Update::Cursor);
            }
            CsiAction::CursorDown(n) => {
                self.state.move_down(usize::from(n));
                updates.push(Update::Cursor);
            }
            CsiAction::CursorForward(n) => {
                self.state.move_forward(usize::from(n));
                updates.push(Update::Cursor);
            }
            CsiAction::CursorBack(n) => {
                self.state.move_back(usize::from(n));
                updates.push(Update::Cursor);
            }
            CsiAction::CursorPosition { row, col } => {
                self.state.set_position(row, col);
                updates.push(Update::Cursor);
            }
            CsiAction::CursorColumn(col) => {
                self.state.set_column(col);
                updates.push(Update::Cursor);
            }
            CsiAction::EraseDisplay(mode) => {
                self.state.erase_display(mode);
                updates.push(Update::Erase);
            }
            CsiAction::EraseLine(mode) => {
                self.state.erase_line(mode);
                updates.push(Update::Erase);
            }
            CsiAction::Style(attrs) => {
                self.state.apply_sgr(&attrs);
                updates.push(Update::Style);
            }
            CsiAction::SetMode { private, params } => {
                self.apply_mode(private, &params, true, updates);
            }
            CsiAction::ResetMode { private, params } => {
                self.apply_mode(private, &params, false, updates);
            }
            CsiAction::ScrollUp(n) => {
                self.state.scroll_up(usize::from(n));
                updates.push(Update::Erase);
            }
            CsiAction::ScrollDown(n) => {
                self.state.scroll_down(usize::from(n));
                updates.push(Update::Erase);
            }
        }
    }

    fn apply_mode(&mut self, private: bool, params: &[u16], enable: bool, updates: &mut Vec<Update>) {
        if private {
            match params.first().copied().unwrap_or(0) {
                MODE_ALTERNATE_SCREEN => {
                    if enable {
                        self.state.enter_alternate_screen();
                    } else {
                        self.state.leave_alternate_screen();
                    }
                }
                MODE_CURSOR_VISIBLE => self.state.set_cursor_visible(enable),
                MODE_MOUSE_TRACKING => self.state.set_mouse_tracking(enable),
                MODE_BRACKETED_PASTE => self.state.set_bracketed_paste(enable),
                MODE_AUTOWRAP => self.state.set_autowrap(enable),
                MODE_ORIGIN => self.state.set_origin_mode(enable),
                other => {
                    tracing::trace!(mode = other, enable, "unhandled private mode");
                }
            }
        } else if params.first().copied().unwrap_or(0) == MODE_INSERT {
            self.state.set_insert_mode(enable);
        }
        updates.push(Update::Mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::cell::Color;

    #[test]
    fn plain_text_lands_on_screen() {
        let mut processor = OutputProcessor::new(20, 4);
        let updates = processor.process("hi there");
        assert_eq!(updates, vec![Update::Text]);
        assert_eq!(processor.screen().lines[0], "hi there");
    }

    #[test]
    fn carriage_return_linefeed_moves_to_next_line() {
        let mut processor = OutputProcessor::new(20, 4);
        processor.process("one\r\ntwo");
        let screen = processor.screen();
        assert_eq!(screen.lines[0], "one");
        assert_eq!(screen.lines[1], "two");
        assert_eq!((screen.cursor.x, screen.cursor.y), (3, 1));
    }

    #[test]
    fn carriage_return_overwrites_line_start() {
        let mut processor = OutputProcessor::new(20, 4);
        processor.process("12345\rab");
        assert_eq!(processor.screen().lines[0], "ab345");
    }

    #[test]
    fn cursor_position_sequence_moves_cursor() {
        let mut processor = OutputProcessor::new(20, 10);
        processor.process("\x1b[5;10Hx");
        let screen = processor.screen();
        assert_eq!(screen.lines[4], "         x");
    }

    #[test]
    fn truecolor_styles_single_cell_and_reset_clears() {
        let mut processor = OutputProcessor::new(20, 4);
        processor.process("\x1b[38;2;255;0;0mx\x1b[0my");
        let line = processor.state().line(0).unwrap();
        assert_eq!(
            line.cell(0).unwrap().style.fg,
            Some(Color::Rgb { r: 255, g: 0, b: 0 })
        );
        assert_eq!(line.cell(1).unwrap().style.fg, None);
    }

    #[test]
    fn erase_line_from_cursor_sequence() {
        let mut processor = OutputProcessor::new(20, 4);
        processor.process("abcdef\x1b[3G\x1b[K");
        assert_eq!(processor.screen().lines[0], "ab");
    }

    #[test]
    fn clear_screen_and_home() {
        let mut processor = OutputProcessor::new(20, 4);
        processor.process("content\x1b[2J\x1b[H");
        let screen = processor.screen();
        assert!(screen.lines.iter().all(|l| l.is_empty()));
        assert_eq!((screen.cursor.x, screen.cursor.y), (0, 0));
    }

    #[test]
    fn alternate_screen_round_trip() {
        let mut processor = OutputProcessor::new(20, 4);
        processor.process("main line");
        processor.process("\x1b[?1049h");
        processor.process("full screen app");
        assert_eq!(processor.screen().lines[0], "full screen app");
        processor.process("\x1b[?1049l");
        let screen = processor.screen();
        assert_eq!(screen.lines[0], "main line");
        assert_eq!((screen.cursor.x, screen.cursor.y), (9, 0));
    }

    #[test]
    fn cursor_visibility_mode() {
        let mut processor = OutputProcessor::new(20, 4);
        processor.process("\x1b[?25l");
        assert!(!processor.screen().cursor.visible);
        processor.process("\x1b[?25h");
        assert!(processor.screen().cursor.visible);
    }

    #[test]
    fn bracketed_paste_and_mouse_flags_have_no_buffer_effect() {
        let mut processor = OutputProcessor::new(20, 4);
        processor.process("text");
        let before = processor.screen().lines.clone();
        processor.process("\x1b[?2004h\x1b[?1000h");
        assert_eq!(processor.screen().lines, before);
        assert!(processor.state().modes().bracketed_paste);
        assert!(processor.state().modes().mouse_tracking);
    }

    #[test]
    fn title_sequence_updates_screen_title() {
        let mut processor = OutputProcessor::new(20, 4);
        let updates = processor.process("\x1b]2;session\x07");
        assert_eq!(updates, vec![Update::Title("session".to_string())]);
        assert_eq!(processor.screen().title, "session");
    }

    #[test]
    fn resize_discards_content() {
        let mut processor = OutputProcessor::new(20, 4);
        processor.process("text");
        let update = processor.resize(10, 2);
        assert_eq!(update, Update::Resize { cols: 10, rows: 2 });
        let screen = processor.screen();
        assert_eq!(screen.lines.len(), 2);
        assert!(screen.lines.iter().all(|l| l.is_empty()));
    }

    #[test]
    fn full_reset_sequence_clears_everything() {
        let mut processor = OutputProcessor::new(20, 4);
        processor.process("text\x1b]2;t\x07");
        let updates = processor.process("\x1bc");
        assert!(updates.contains(&Update::Reset));
        let screen = processor.screen();
        assert!(screen.lines.iter().all(|l| l.is_empty()));
        assert!(screen.title.is_empty());
    }

    #[test]
    fn backspace_clamps_at_column_zero() {
        let mut processor = OutputProcessor::new(20, 4);
        processor.process("\x08\x08a");
        assert_eq!(processor.screen().lines[0], "a");
    }
}
