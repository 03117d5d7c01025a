//! Stateless ANSI/VT100 control-sequence builders.
//!
//! The encode-side mirror of the parser: every builder here produces
//! bytes the parser decodes back to the same parameters.

pub const ESC: &str = "\x1b";
pub const CSI: &str = "\x1b[";

/// Cursor control.
pub mod cursor {
    use super::CSI;

    /// Absolute position, 1-based row and column.
    pub fn move_to(row: u16, col: u16) -> String {
        format!("{CSI}{row};{col}H")
    }

    pub fn up(n: u16) -> String {
        format!("{CSI}{n}A")
    }

    pub fn down(n: u16) -> String {
        format!("{CSI}{n}B")
    }

    pub fn right(n: u16) -> String {
        format!("{CSI}{n}C")
    }

    pub fn left(n: u16) -> String {
        format!("{CSI}{n}D")
    }

    pub fn save() -> String {
        format!("{}7", super::ESC)
    }

    pub fn restore() -> String {
        format!("{}8", super::ESC)
    }

    pub fn show() -> String {
        format!("{CSI}?25h")
    }

    pub fn hide() -> String {
        format!("{CSI}?25l")
    }

    pub fn home() -> String {
        format!("{CSI}H")
    }

    pub fn next_line(n: u16) -> String {
        format!("{CSI}{n}E")
    }

    pub fn prev_line(n: u16) -> String {
        format!("{CSI}{n}F")
    }

    /// Absolute 1-based column on the current row.
    pub fn column(n: u16) -> String {
        format!("{CSI}{n}G")
    }
}

/// Screen and line erase, scrolling.
pub mod screen {
    use super::CSI;

    /// Clear the whole screen and home the cursor.
    pub fn clear() -> String {
        format!("{CSI}2J{CSI}H")
    }

    pub fn clear_from_cursor() -> String {
        format!("{CSI}0J")
    }

    pub fn clear_to_cursor() -> String {
        format!("{CSI}1J")
    }

    pub fn clear_line() -> String {
        format!("{CSI}2K")
    }

    pub fn clear_line_from_cursor() -> String {
        format!("{CSI}0K")
    }

    pub fn clear_line_to_cursor() -> String {
        format!("{CSI}1K")
    }

    pub fn scroll_up(n: u16) -> String {
        format!("{CSI}{n}S")
    }

    pub fn scroll_down(n: u16) -> String {
        format!("{CSI}{n}T")
    }

    /// 1-based inclusive scroll region.
    pub fn set_scroll_region(top: u16, bottom: u16) -> String {
        format!("{CSI}{top};{bottom}r")
    }

    pub fn reset_scroll_region() -> String {
        format!("{CSI}r")
    }
}

/// Text styling (SGR).
pub mod style {
    use super::CSI;

    pub fn reset() -> String {
        format!("{CSI}0m")
    }

    pub fn bold() -> String {
        format!("{CSI}1m")
    }

    pub fn dim() -> String {
        format!("{CSI}2m")
    }

    pub fn italic() -> String {
        format!("{CSI}3m")
    }

    pub fn underline() -> String {
        format!("{CSI}4m")
    }

    pub fn blink() -> String {
        format!("{CSI}5m")
    }

    pub fn reverse() -> String {
        format!("{CSI}7m")
    }

    pub fn hidden() -> String {
        format!("{CSI}8m")
    }

    pub fn strikethrough() -> String {
        format!("{CSI}9m")
    }

    /// 3/4-bit foreground, `code` 0-7.
    pub fn fg(code: u8) -> String {
        format!("{CSI}{}m", 30 + u16::from(code))
    }

    /// 3/4-bit background, `code` 0-7.
    pub fn bg(code: u8) -> String {
        format!("{CSI}{}m", 40 + u16::from(code))
    }

    pub fn fg256(n: u8) -> String {
        format!("{CSI}38;5;{n}m")
    }

    pub fn bg256(n: u8) -> String {
        format!("{CSI}48;5;{n}m")
    }

    pub fn fg_rgb(r: u8, g: u8, b: u8) -> String {
        format!("{CSI}38;2;{r};{g};{b}m")
    }

    pub fn bg_rgb(r: u8, g: u8, b: u8) -> String {
        format!("{CSI}48;2;{r};{g};{b}m")
    }

    pub fn default_fg() -> String {
        format!("{CSI}39m")
    }

    pub fn default_bg() -> String {
        format!("{CSI}49m")
    }
}

/// Terminal mode toggles.
pub mod mode {
    use super::{CSI, ESC};

    pub fn alternate_screen() -> String {
        format!("{CSI}?1049h")
    }

    pub fn normal_screen() -> String {
        format!("{CSI}?1049l")
    }

    pub fn mouse_tracking() -> String {
        format!("{CSI}?1000h")
    }

    pub fn no_mouse_tracking() -> String {
        format!("{CSI}?1000l")
    }

    pub fn autowrap() -> String {
        format!("{CSI}?7h")
    }

    pub fn no_autowrap() -> String {
        format!("{CSI}?7l")
    }

    pub fn bracketed_paste() -> String {
        format!("{CSI}?2004h")
    }

    pub fn no_bracketed_paste() -> String {
        format!("{CSI}?2004l")
    }

    pub fn application_keypad() -> String {
        format!("{ESC}=")
    }

    pub fn normal_keypad() -> String {
        format!("{ESC}>")
    }
}

pub fn bell() -> &'static str {
    "\x07"
}

/// Window/tab title (OSC, BEL-terminated).
pub mod title {
    use super::ESC;

    pub fn set(text: &str) -> String {
        format!("{ESC}]0;{text}\x07")
    }

    pub fn window(text: &str) -> String {
        format!("{ESC}]2;{text}\x07")
    }

    pub fn tab(text: &str) -> String {
        format!("{ESC}]1;{text}\x07")
    }
}

/// OSC 8 hyperlinks.
pub mod hyperlink {
    use super::ESC;

    pub fn start(url: &str, id: &str) -> String {
        if id.is_empty() {
            format!("{ESC}]8;;{url}\x07")
        } else {
            format!("{ESC}]8;id={id};{url}\x07")
        }
    }

    pub fn end() -> String {
        format!("{ESC}]8;;\x07")
    }
}

/// Join a series of sequences into one write.
pub fn compose(parts: &[&str]) -> String {
    parts.concat()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_builders() {
        assert_eq!(cursor::move_to(5, 10), "\x1b[5;10H");
        assert_eq!(cursor::up(3), "\x1b[3A");
        assert_eq!(cursor::save(), "\x1b7");
        assert_eq!(cursor::hide(), "\x1b[?25l");
    }

    #[test]
    fn style_builders() {
        assert_eq!(style::fg(1), "\x1b[31m");
        assert_eq!(style::bg(7), "\x1b[47m");
        assert_eq!(style::fg256(208), "\x1b[38;5;208m");
        assert_eq!(style::bg_rgb(1, 2, 3), "\x1b[48;2;1;2;3m");
    }

    #[test]
    fn mode_builders() {
        assert_eq!(mode::alternate_screen(), "\x1b[?1049h");
        assert_eq!(mode::application_keypad(), "\x1b=");
    }

    #[test]
    fn title_and_hyperlink_builders() {
        assert_eq!(title::window("hi"), "\x1b]2;hi\x07");
        assert_eq!(
            hyperlink::start("https://example.com", "a1"),
            "\x1b]8;id=a1;https://example.com\x07"
        );
        assert_eq!(hyperlink::start("https://example.com", ""), "\x1b]8;;https://example.com\x07");
    }

    #[test]
    fn compose_concatenates() {
        let seq = compose(&[&cursor::home(), &screen::clear_line(), "x"]);
        assert_eq!(seq, "\x1b[H\x1b[2Kx");
    }
}
