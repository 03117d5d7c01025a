//! Streaming ANSI/VT100 escape-sequence parser.
//!
//! A hand-written state machine over decoded text. Feeding text yields
//! discrete [`ParserEvent`]s: literal runs, C0 controls, parsed CSI
//! sequences, and OSC title/hyperlink commands. Escape-sequence state is
//! carried across `parse` calls, so arbitrary chunking of the input is
//! safe; pending literal text is flushed at the end of each call.
//!
//! Malformed sequences reset the machine to the normal state without
//! emitting an event, and unknown CSI final bytes consume their bytes
//! silently. Both are intentional: a terminal must keep rendering past
//! output it does not understand.

use crate::term::cell::Color;

/// Parser states. SOS/PM/APC introducers are recognized but collapse to
/// `Normal` (their payloads are discarded).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    Normal,
    Escape,
    Csi,
    Osc,
    Dcs,
}

/// One decoded SGR attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SgrAttr {
    Reset,
    Bold,
    Dim,
    Italic,
    Underline,
    Blink,
    Reverse,
    Hidden,
    Strikethrough,
    Fg(Color),
    Bg(Color),
    DefaultFg,
    DefaultBg,
}

/// A parsed CSI sequence, dispatched on its final byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CsiAction {
    /// `CSI Ps A`
    CursorUp(u16),
    /// `CSI Ps B`
    CursorDown(u16),
    /// `CSI Ps C`
    CursorForward(u16),
    /// `CSI Ps D`
    CursorBack(u16),
    /// `CSI Pr ; Pc H` or `f`. Row and column as carried (1-based).
    CursorPosition { row: u16, col: u16 },
    /// `CSI Ps G` (1-based column).
    CursorColumn(u16),
    /// `CSI Ps J`, mode 0/1/2.
    EraseDisplay(u8),
    /// `CSI Ps K`, mode 0/1/2.
    EraseLine(u8),
    /// `CSI ... m`
    Style(Vec<SgrAttr>),
    /// `CSI ? ... h` / `CSI ... h`
    SetMode { private: bool, params: Vec<u16> },
    /// `CSI ? ... l` / `CSI ... l`
    ResetMode { private: bool, params: Vec<u16> },
    /// `CSI Ps S`
    ScrollUp(u16),
    /// `CSI Ps T`
    ScrollDown(u16),
}

/// Events emitted by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParserEvent {
    Text(String),
    Bell,
    Backspace,
    Tab,
    Linefeed,
    CarriageReturn,
    Sequence(CsiAction),
    /// OSC 0 / OSC 2.
    Title(String),
    /// OSC 1.
    TabTitle(String),
    /// OSC 8.
    Hyperlink { id: String, url: String },
    /// `ESC 7` / `ESC 8`.
    SaveCursor,
    RestoreCursor,
    /// `ESC D`
    Index,
    /// `ESC M`
    ReverseIndex,
    /// `ESC E`
    NextLine,
    /// `ESC c`
    Reset,
    /// `ESC =` (true) / `ESC >` (false).
    ApplicationKeypad(bool),
}

#[derive(Debug)]
pub struct AnsiParser {
    state: ParserState,
    text: String,
    osc: String,
    params: Vec<u16>,
    current_param: String,
    intermediates: String,
}

impl Default for AnsiParser {
    fn default() -> Self {
        Self::new()
    }
}

impl AnsiParser {
    pub fn new() -> Self {
        Self {
            state: ParserState::Normal,
            text: String::new(),
            osc: String::new(),
            params: Vec::new(),
            current_param: String::new(),
            intermediates: String::new(),
        }
    }

    pub fn reset(&mut self) {
        self.state = ParserState::Normal;
        self.text.clear();
        self.osc.clear();
        self.clear_sequence();
    }

    /// Feed a chunk of decoded text, returning the events it produced.
    ///
    /// Escape-sequence state persists across calls; a pending literal
    /// run is flushed at the end of each call so the screen stays live
    /// even when output arrives without a trailing control character.
    pub fn parse(&mut self, data: &str) -> Vec<ParserEvent> {
        let mut out = Vec::new();
        for ch in data.chars() {
            match self.state {
                ParserState::Normal => self.advance_normal(ch, &mut out),
                ParserState::Escape => self.advance_escape(ch, &mut out),
                ParserState::Csi => self.advance_csi(ch, &mut out),
                ParserState::Osc => self.advance_osc(ch, &mut out),
                ParserState::Dcs => self.advance_dcs(ch),
            }
        }
        self.flush_text(&mut out);
        out
    }

    fn advance_normal(&mut self, ch: char, out: &mut Vec<ParserEvent>) {
        match ch {
            '\x1b' => {
                self.flush_text(out);
                self.state = ParserState::Escape;
            }
            '\x07' => {
                self.flush_text(out);
                out.push(ParserEvent::Bell);
            }
            '\x08' => {
                self.flush_text(out);
                out.push(ParserEvent::Backspace);
            }
            '\t' => {
                self.flush_text(out);
                out.push(ParserEvent::Tab);
            }
            '\n' => {
                self.flush_text(out);
                out.push(ParserEvent::Linefeed);
            }
            '\r' => {
                self.flush_text(out);
                out.push(ParserEvent::CarriageReturn);
            }
            c if (c as u32) < 0x20 => {
                // Other C0 controls are consumed without an event.
                self.flush_text(out);
            }
            c => self.text.push(c),
        }
    }

    fn advance_escape(&mut self, ch: char, out: &mut Vec<ParserEvent>) {
        match ch {
            '[' => {
                self.state = ParserState::Csi;
                self.clear_sequence();
            }
            ']' => {
                self.state = ParserState::Osc;
                self.osc.clear();
            }
            'P' => {
                self.state = ParserState::Dcs;
            }
            'D' => {
                out.push(ParserEvent::Index);
                self.state = ParserState::Normal;
            }
            'M' => {
                out.push(ParserEvent::ReverseIndex);
                self.state = ParserState::Normal;
            }
            'E' => {
                out.push(ParserEvent::NextLine);
                self.state = ParserState::Normal;
            }
            'c' => {
                out.push(ParserEvent::Reset);
                self.state = ParserState::Normal;
            }
            '7' => {
                out.push(ParserEvent::SaveCursor);
                self.state = ParserState::Normal;
            }
            '8' => {
                out.push(ParserEvent::RestoreCursor);
                self.state = ParserState::Normal;
            }
            '=' => {
                out.push(ParserEvent::ApplicationKeypad(true));
                self.state = ParserState::Normal;
            }
            '>' => {
                out.push(ParserEvent::ApplicationKeypad(false));
                self.state = ParserState::Normal;
            }
            _ => {
                // Unrecognized introducer: discard and resume.
                self.state = ParserState::Normal;
            }
        }
    }

    fn advance_csi(&mut self, ch: char, out: &mut Vec<ParserEvent>) {
        let code = ch as u32;
        match code {
            0x30..=0x3B => {
                if ch == ';' {
                    self.commit_param();
                } else {
                    self.current_param.push(ch);
                }
            }
            // Private-parameter markers ('<', '=', '>', '?').
            0x3C..=0x3F => self.intermediates.push(ch),
            0x20..=0x2F => self.intermediates.push(ch),
            0x40..=0x7E => {
                if !self.current_param.is_empty() {
                    self.commit_param();
                }
                if let Some(action) = self.dispatch_csi(ch) {
                    out.push(ParserEvent::Sequence(action));
                }
                self.state = ParserState::Normal;
            }
            _ => {
                // Malformed: reset without emitting.
                self.state = ParserState::Normal;
            }
        }
    }

    fn advance_osc(&mut self, ch: char, out: &mut Vec<ParserEvent>) {
        match ch {
            '\x07' => {
                if let Some(event) = dispatch_osc(&self.osc) {
                    out.push(event);
                }
                self.osc.clear();
                self.state = ParserState::Normal;
            }
            // Simplified ST handling: an ESC aborts the command.
            '\x1b' => {
                self.osc.clear();
                self.state = ParserState::Normal;
            }
            c => self.osc.push(c),
        }
    }

    fn advance_dcs(&mut self, ch: char) {
        // DCS payloads are consumed and discarded.
        if ch == '\x1b' {
            self.state = ParserState::Normal;
        }
    }

    fn commit_param(&mut self) {
        let value = self
            .current_param
            .parse::<u32>()
            .map(|v| v.min(u32::from(u16::MAX)) as u16)
            .unwrap_or(0);
        self.params.push(value);
        self.current_param.clear();
    }

    fn clear_sequence(&mut self) {
        self.params.clear();
        self.current_param.clear();
        self.intermediates.clear();
    }

    fn flush_text(&mut self, out: &mut Vec<ParserEvent>) {
        if !self.text.is_empty() {
            out.push(ParserEvent::Text(std::mem::take(&mut self.text)));
        }
    }

    fn dispatch_csi(&self, final_char: char) -> Option<CsiAction> {
        let count = |idx: usize| self.params.get(idx).copied().filter(|&v| v > 0).unwrap_or(1);
        let private = self.intermediates.contains('?');
        match final_char {
            'A' => Some(CsiAction::CursorUp(count(0))),
            'B' => Some(CsiAction::CursorDown(count(0))),
            'C' => Some(CsiAction::CursorForward(count(0))),
            'D' => Some(CsiAction::CursorBack(count(0))),
            'H' | 'f' => Some(CsiAction::CursorPosition {
                row: count(0),
                col: count(1),
            }),
            'G' => Some(CsiAction::CursorColumn(count(0))),
            'J' => Some(CsiAction::EraseDisplay(
                self.params.first().copied().unwrap_or(0).min(2) as u8,
            )),
            'K' => Some(CsiAction::EraseLine(
                self.params.first().copied().unwrap_or(0).min(2) as u8,
            )),
            'm' => Some(CsiAction::Style(decode_sgr(&self.params))),
            'h' => Some(CsiAction::SetMode {
                private,
                params: self.params.clone(),
            }),
            'l' => Some(CsiAction::ResetMode {
                private,
                params: self.params.clone(),
            }),
            'S' => Some(CsiAction::ScrollUp(count(0))),
            'T' => Some(CsiAction::ScrollDown(count(0))),
            _ => None,
        }
    }
}

/// Decode SGR parameters, including the compound `38`/`48` extended
/// color forms (`5;N` and `2;R;G;B`). A trailing incomplete extended
/// color drops the compound rather than erroring.
fn decode_sgr(params: &[u16]) -> Vec<SgrAttr> {
    let mut attrs = Vec::new();
    if params.is_empty() {
        attrs.push(SgrAttr::Reset);
        return attrs;
    }
    let mut i = 0;
    while i < params.len() {
        let param = params[i];
        match param {
            0 => attrs.push(SgrAttr::Reset),
            1 => attrs.push(SgrAttr::Bold),
            2 => attrs.push(SgrAttr::Dim),
            3 => attrs.push(SgrAttr::Italic),
            4 => attrs.push(SgrAttr::Underline),
            5 => attrs.push(SgrAttr::Blink),
            7 => attrs.push(SgrAttr::Reverse),
            8 => attrs.push(SgrAttr::Hidden),
            9 => attrs.push(SgrAttr::Strikethrough),
            30..=37 => attrs.push(SgrAttr::Fg(Color::Indexed((param - 30) as u8))),
            39 => attrs.push(SgrAttr::DefaultFg),
            40..=47 => attrs.push(SgrAttr::Bg(Color::Indexed((param - 40) as u8))),
            49 => attrs.push(SgrAttr::DefaultBg),
            38 | 48 => {
                let (color, consumed) = decode_extended_color(&params[i + 1..]);
                if let Some(color) = color {
                    if param == 38 {
                        attrs.push(SgrAttr::Fg(color));
                    } else {
                        attrs.push(SgrAttr::Bg(color));
                    }
                }
                i += consumed;
            }
            _ => {}
        }
        i += 1;
    }
    attrs
}

/// Decode the tail of a `38`/`48` compound. Returns the color (if the
/// components are all present) and how many parameters were consumed.
fn decode_extended_color(rest: &[u16]) -> (Option<Color>, usize) {
    match rest.first() {
        Some(5) => match rest.get(1) {
            Some(&n) => (Some(Color::Palette(n.min(255) as u8)), 2),
            None => (None, rest.len()),
        },
        Some(2) => {
            if rest.len() >= 4 {
                (
                    Some(Color::Rgb {
                        r: rest[1].min(255) as u8,
                        g: rest[2].min(255) as u8,
                        b: rest[3].min(255) as u8,
                    }),
                    4,
                )
            } else {
                (None, rest.len())
            }
        }
        _ => (None, 0),
    }
}

fn dispatch_osc(payload: &str) -> Option<ParserEvent> {
    let (command, rest) = match payload.split_once(';') {
        Some((command, rest)) => (command, rest),
        None => (payload, ""),
    };
    match command.parse::<u32>().ok()? {
        0 | 2 => Some(ParserEvent::Title(rest.to_string())),
        1 => Some(ParserEvent::TabTitle(rest.to_string())),
        8 => {
            let (params, url) = rest.split_once(';')?;
            let id = params.strip_prefix("id=").unwrap_or(params).to_string();
            Some(ParserEvent::Hyperlink {
                id,
                url: url.to_string(),
            })
        }
        _ => None,
    }
}
