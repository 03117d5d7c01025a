//! Encodes logical input events into the byte sequences a terminal
//! program expects on its stdin.

/// Target platform for newline and EOF conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Unix,
    Windows,
}

impl Platform {
    /// The platform this binary was compiled for.
    pub fn host() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }

    pub fn newline(self) -> &'static str {
        match self {
            Platform::Windows => "\r\n",
            Platform::Unix => "\n",
        }
    }

    /// The end-of-input byte for one-shot stdin (Ctrl+D / Ctrl+Z).
    pub fn eof_marker(self) -> &'static str {
        match self {
            Platform::Windows => "\x1a",
            Platform::Unix => "\x04",
        }
    }
}

/// A mouse press/release with 0-based cell coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    pub button: u8,
    pub x: u16,
    pub y: u16,
    pub pressed: bool,
    /// Use the SGR extended protocol instead of X10.
    pub sgr: bool,
}

/// A logical input to encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Text(String),
    /// A named special key, e.g. `"UP"`, `"F5"`, `"Ctrl+C"`, `"Alt+x"`.
    Key(String),
    Paste(String),
    Mouse(MouseEvent),
}

/// Encoder configured for a platform and the current terminal modes.
#[derive(Debug, Clone)]
pub struct InputEncoder {
    platform: Platform,
    application_mode: bool,
    mouse_tracking: bool,
    bracketed_paste: bool,
}

impl Default for InputEncoder {
    fn default() -> Self {
        Self::new(Platform::host())
    }
}

impl InputEncoder {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            application_mode: false,
            mouse_tracking: false,
            bracketed_paste: false,
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn set_application_mode(&mut self, enabled: bool) {
        self.application_mode = enabled;
    }

    pub fn set_mouse_tracking(&mut self, enabled: bool) {
        self.mouse_tracking = enabled;
    }

    pub fn set_bracketed_paste(&mut self, enabled: bool) {
        self.bracketed_paste = enabled;
    }

    /// Encode an event into the bytes to write to the child's stdin.
    ///
    /// Text, key, and paste encodings are ASCII-safe strings; mouse
    /// reports are raw bytes because X10 coordinate offsets can exceed
    /// the ASCII range and must not be re-encoded as UTF-8.
    pub fn encode(&self, event: &InputEvent) -> Vec<u8> {
        match event {
            InputEvent::Text(text) => self.encode_text(text).into_bytes(),
            InputEvent::Key(name) => self.encode_key(name).into_bytes(),
            InputEvent::Paste(text) => self.encode_paste(text).into_bytes(),
            InputEvent::Mouse(mouse) => self.encode_mouse(*mouse),
        }
    }

    /// Literal text: newlines are rewritten to the platform convention.
    pub fn encode_text(&self, text: &str) -> String {
        match self.platform {
            Platform::Windows => text.replace('\n', "\r\n"),
            Platform::Unix => text.to_string(),
        }
    }

    /// Named special keys and Ctrl/Alt chords. Unrecognized names pass
    /// through unchanged.
    pub fn encode_key(&self, name: &str) -> String {
        if let Some(seq) = arrow_key(name, self.application_mode) {
            return seq.to_string();
        }
        if let Some(seq) = special_key(name) {
            return seq.to_string();
        }
        if let Some(rest) = name.strip_prefix("Ctrl+") {
            if let Some(seq) = ctrl_key(rest) {
                return seq;
            }
        }
        if let Some(rest) = name.strip_prefix("Alt+") {
            return format!("\x1b{rest}");
        }
        name.to_string()
    }

    /// Paste, wrapped in bracketed-paste markers when the mode is on.
    pub fn encode_paste(&self, text: &str) -> String {
        if self.bracketed_paste {
            format!("\x1b[200~{text}\x1b[201~")
        } else {
            self.encode_text(text)
        }
    }

    /// Mouse reports; empty when tracking is disabled.
    pub fn encode_mouse(&self, event: MouseEvent) -> Vec<u8> {
        if !self.mouse_tracking {
            return Vec::new();
        }
        if event.sgr {
            sgr_mouse(event).into_bytes()
        } else {
            x10_mouse(event)
        }
    }

    pub fn newline(&self) -> &'static str {
        self.platform.newline()
    }
}

fn special_key(name: &str) -> Option<&'static str> {
    let seq = match name {
        "ENTER" | "CR" => "\r",
        "LF" => "\n",
        "TAB" => "\t",
        "BACKSPACE" | "BS" => "\x08",
        "ESC" | "ESCAPE" => "\x1b",
        "DEL" => "\x7f",
        "F1" => "\x1bOP",
        "F2" => "\x1bOQ",
        "F3" => "\x1bOR",
        "F4" => "\x1bOS",
        "F5" => "\x1b[15~",
        "F6" => "\x1b[17~",
        "F7" => "\x1b[18~",
        "F8" => "\x1b[19~",
        "F9" => "\x1b[20~",
        "F10" => "\x1b[21~",
        "F11" => "\x1b[23~",
        "F12" => "\x1b[24~",
        "INSERT" => "\x1b[2~",
        "DELETE" => "\x1b[3~",
        "HOME" => "\x1b[1~",
        "END" => "\x1b[4~",
        "PAGE_UP" => "\x1b[5~",
        "PAGE_DOWN" => "\x1b[6~",
        _ => return None,
    };
    Some(seq)
}

fn arrow_key(name: &str, application_mode: bool) -> Option<&'static str> {
    let seq = match (name, application_mode) {
        ("UP", false) => "\x1b[A",
        ("DOWN", false) => "\x1b[B",
        ("RIGHT", false) => "\x1b[C",
        ("LEFT", false) => "\x1b[D",
        ("UP", true) => "\x1bOA",
        ("DOWN", true) => "\x1bOB",
        ("RIGHT", true) => "\x1bOC",
        ("LEFT", true) => "\x1bOD",
        _ => return None,
    };
    Some(seq)
}

/// `Ctrl+<letter>` maps through the C0 range: `upper(letter) - 64`,
/// valid for code points 64-95 (`@` through `_`).
fn ctrl_key(ch: &str) -> Option<String> {
    let ch = ch.chars().next()?;
    let upper = ch.to_ascii_uppercase() as u32;
    if (64..=95).contains(&upper) {
        char::from_u32(upper - 64).map(|c| c.to_string())
    } else {
        None
    }
}

/// X10 protocol: `ESC [ M` plus three offset bytes. Coordinates are
/// converted to 1-based and clamped to the protocol's 223 limit.
fn x10_mouse(event: MouseEvent) -> Vec<u8> {
    let code = if event.pressed {
        event.button
    } else {
        event.button.saturating_add(3)
    };
    let x = event.x.saturating_add(1).clamp(1, 223) as u8;
    let y = event.y.saturating_add(1).clamp(1, 223) as u8;
    let mut out = b"\x1b[M".to_vec();
    out.push(32u8.saturating_add(code));
    out.push(32 + x);
    out.push(32 + y);
    out
}

/// SGR protocol: `ESC [ < b ; x ; y M` (press) or `m` (release).
fn sgr_mouse(event: MouseEvent) -> String {
    let action = if event.pressed { 'M' } else { 'm' };
    format!(
        "\x1b[<{};{};{}{}",
        event.button,
        event.x + 1,
        event.y + 1,
        action
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_text_keeps_newlines() {
        let encoder = InputEncoder::new(Platform::Unix);
        assert_eq!(encoder.encode_text("a\nb"), "a\nb");
    }

    #[test]
    fn windows_text_rewrites_newlines() {
        let encoder = InputEncoder::new(Platform::Windows);
        assert_eq!(encoder.encode_text("a\nb"), "a\r\nb");
    }

    #[test]
    fn arrows_switch_with_application_mode() {
        let mut encoder = InputEncoder::new(Platform::Unix);
        assert_eq!(encoder.encode_key("UP"), "\x1b[A");
        encoder.set_application_mode(true);
        assert_eq!(encoder.encode_key("UP"), "\x1bOA");
        assert_eq!(encoder.encode_key("LEFT"), "\x1bOD");
    }

    #[test]
    fn function_and_edit_keys() {
        let encoder = InputEncoder::new(Platform::Unix);
        assert_eq!(encoder.encode_key("F1"), "\x1bOP");
        assert_eq!(encoder.encode_key("F12"), "\x1b[24~");
        assert_eq!(encoder.encode_key("PAGE_DOWN"), "\x1b[6~");
        assert_eq!(encoder.encode_key("HOME"), "\x1b[1~");
    }

    #[test]
    fn ctrl_chords_map_through_c0() {
        let encoder = InputEncoder::new(Platform::Unix);
        assert_eq!(encoder.encode_key("Ctrl+C"), "\x03");
        assert_eq!(encoder.encode_key("Ctrl+d"), "\x04");
        assert_eq!(encoder.encode_key("Ctrl+["), "\x1b");
        // '1' is outside the mappable range: passes through.
        assert_eq!(encoder.encode_key("Ctrl+1"), "Ctrl+1");
    }

    #[test]
    fn alt_prefixes_escape() {
        let encoder = InputEncoder::new(Platform::Unix);
        assert_eq!(encoder.encode_key("Alt+x"), "\x1bx");
    }

    #[test]
    fn unknown_key_passes_through() {
        let encoder = InputEncoder::new(Platform::Unix);
        assert_eq!(encoder.encode_key("a"), "a");
    }

    #[test]
    fn paste_brackets_only_when_enabled() {
        let mut encoder = InputEncoder::new(Platform::Unix);
        assert_eq!(encoder.encode_paste("data"), "data");
        encoder.set_bracketed_paste(true);
        assert_eq!(encoder.encode_paste("data"), "\x1b[200~data\x1b[201~");
    }

    #[test]
    fn mouse_is_silent_without_tracking() {
        let encoder = InputEncoder::new(Platform::Unix);
        let event = MouseEvent {
            button: 0,
            x: 5,
            y: 5,
            pressed: true,
            sgr: false,
        };
        assert!(encoder.encode_mouse(event).is_empty());
    }

    #[test]
    fn x10_mouse_encodes_offset_bytes() {
        let mut encoder = InputEncoder::new(Platform::Unix);
        encoder.set_mouse_tracking(true);
        let event = MouseEvent {
            button: 0,
            x: 0,
            y: 0,
            pressed: true,
            sgr: false,
        };
        assert_eq!(encoder.encode_mouse(event), b"\x1b[M\x20\x21\x21");
        let release = MouseEvent {
            pressed: false,
            ..event
        };
        assert_eq!(encoder.encode_mouse(release), b"\x1b[M\x23\x21\x21");
    }

    #[test]
    fn x10_mouse_clamps_coordinates() {
        let mut encoder = InputEncoder::new(Platform::Unix);
        encoder.set_mouse_tracking(true);
        let event = MouseEvent {
            button: 0,
            x: 5000,
            y: 5000,
            pressed: true,
            sgr: false,
        };
        let bytes = encoder.encode_mouse(event);
        assert_eq!(bytes[bytes.len() - 2], 32 + 223);
        assert_eq!(bytes[bytes.len() - 1], 32 + 223);
    }

    #[test]
    fn sgr_mouse_press_and_release() {
        let mut encoder = InputEncoder::new(Platform::Unix);
        encoder.set_mouse_tracking(true);
        let event = MouseEvent {
            button: 0,
            x: 9,
            y: 4,
            pressed: true,
            sgr: true,
        };
        assert_eq!(encoder.encode_mouse(event), b"\x1b[<0;10;5M");
        let release = MouseEvent {
            pressed: false,
            ..event
        };
        assert_eq!(encoder.encode_mouse(release), b"\x1b[<0;10;5m");
    }

    #[test]
    fn event_dispatch_covers_all_variants() {
        let mut encoder = InputEncoder::new(Platform::Unix);
        encoder.set_bracketed_paste(true);
        assert_eq!(encoder.encode(&InputEvent::Text("hi".into())), b"hi");
        assert_eq!(encoder.encode(&InputEvent::Key("TAB".into())), b"\t");
        assert_eq!(
            encoder.encode(&InputEvent::Paste("p".into())),
            b"\x1b[200~p\x1b[201~"
        );
    }
}
