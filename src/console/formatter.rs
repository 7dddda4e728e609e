//! Console output formatter
//!
//! Splits a raw log line into styled segments by interpreting ANSI SGR
//! sequences. Stateless between calls: every line starts from the default
//! style.

use serde::Serialize;
use vte::{Params, Parser, Perform};

/// 16-color ANSI palette. Slots 0-7 are the base colors, 8-15 the bright ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnsiColor {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    BrightBlack,
    BrightRed,
    BrightGreen,
    BrightYellow,
    BrightBlue,
    BrightMagenta,
    BrightCyan,
    BrightWhite,
}

impl AnsiColor {
    const PALETTE: [AnsiColor; 16] = [
        Self::Black,
        Self::Red,
        Self::Green,
        Self::Yellow,
        Self::Blue,
        Self::Magenta,
        Self::Cyan,
        Self::White,
        Self::BrightBlack,
        Self::BrightRed,
        Self::BrightGreen,
        Self::BrightYellow,
        Self::BrightBlue,
        Self::BrightMagenta,
        Self::BrightCyan,
        Self::BrightWhite,
    ];

    /// Palette slot 0-15
    pub fn from_index(index: u16) -> Option<Self> {
        Self::PALETTE.get(index as usize).copied()
    }

    pub fn index(&self) -> u16 {
        *self as u16
    }
}

/// Text attributes in effect for a segment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Style {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub foreground: Option<AnsiColor>,
    pub background: Option<AnsiColor>,
}

impl Style {
    pub fn is_plain(&self) -> bool {
        *self == Style::default()
    }
}

/// Run of text sharing one style
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub text: String,
    pub style: Style,
}

/// Apply SGR codes in order. Unknown codes are ignored.
pub fn apply_sgr(style: &mut Style, codes: &[u16]) {
    if codes.is_empty() {
        *style = Style::default();
        return;
    }

    for &code in codes {
        match code {
            0 => *style = Style::default(),
            1 => style.bold = true,
            3 => style.italic = true,
            4 => style.underline = true,
            30..=37 => style.foreground = AnsiColor::from_index(code - 30),
            90..=97 => style.foreground = AnsiColor::from_index(code - 82),
            40..=47 => style.background = AnsiColor::from_index(code - 40),
            100..=107 => style.background = AnsiColor::from_index(code - 92),
            _ => {}
        }
    }
}

/// Parse one line into styled segments
pub fn format(line: &str) -> Vec<Segment> {
    let mut parser = Parser::new();
    let mut performer = SegmentBuilder::default();
    parser.advance(&mut performer, line.as_bytes());
    performer.finish()
}

#[derive(Default)]
struct SegmentBuilder {
    style: Style,
    text: String,
    segments: Vec<Segment>,
}

impl SegmentBuilder {
    fn flush(&mut self) {
        if self.text.is_empty() {
            return;
        }
        self.segments.push(Segment {
            text: std::mem::take(&mut self.text),
            style: self.style,
        });
    }

    fn finish(mut self) -> Vec<Segment> {
        self.flush();
        self.segments
    }
}

impl Perform for SegmentBuilder {
    fn print(&mut self, c: char) {
        self.text.push(c);
    }

    fn execute(&mut self, byte: u8) {
        // Control characters stay part of the text
        self.text.push(byte as char);
    }

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], ignore: bool, action: char) {
        self.flush();
        // Private-marker forms like `ESC[>4;2m` are not SGR
        if action != 'm' || !intermediates.is_empty() || ignore {
            return;
        }
        // Colon sub-parameters are not used by the basic palette
        let codes: Vec<u16> = params
            .iter()
            .map(|sub| sub.first().copied().unwrap_or(0))
            .collect();
        apply_sgr(&mut self.style, &codes);
    }
}
