//! Streaming ANSI tokenizer: splits a byte stream into text and escape
//! segments across arbitrary chunk boundaries.
//!
//! The tokenizer never interprets escape sequences; it only brackets them so
//! the redaction stream can scan text while passing escapes through verbatim.
//!
//! # Invariants
//! - Concatenating every emitted segment (including `flush`) reproduces the
//!   input byte-for-byte.
//! - An `Escape` segment is a complete, well-formed sequence, except the sole
//!   segment `flush` may emit for a partial sequence at teardown.
//! - A `Text` segment never contains an ESC byte.

const ESC: u8 = 0x1b;
const BEL: u8 = 0x07;

/// A classified run of bytes from the tokenizer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    /// Printable payload, eligible for secret scanning.
    Text(Vec<u8>),
    /// A complete ANSI escape sequence, passed through unmodified.
    Escape(Vec<u8>),
}

impl Segment {
    /// Raw bytes of the segment regardless of kind.
    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::Text(b) | Self::Escape(b) => b,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Text,
    EscStart,
    Csi,
    Osc,
    Dcs,
    Sos,
    Pm,
    Apc,
}

impl State {
    fn is_string(self) -> bool {
        matches!(
            self,
            Self::Osc | Self::Dcs | Self::Sos | Self::Pm | Self::Apc
        )
    }
}

/// Incremental ANSI escape splitter.
///
/// Feed arbitrary chunks through [`Tokenizer::push`]; any in-progress escape
/// sequence is retained internally until its terminator arrives (possibly in
/// a later chunk). [`Tokenizer::flush`] drains partial state at teardown.
#[derive(Debug)]
pub struct Tokenizer {
    state: State,
    esc_buf: Vec<u8>,
    // Inside a string sequence, set after an embedded ESC: the next byte is
    // checked for `\` (the ST terminator).
    esc_in_string: bool,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self {
            state: State::Text,
            esc_buf: Vec::new(),
            esc_in_string: false,
        }
    }
}

impl Tokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Processes a chunk and returns the completed segments.
    pub fn push(&mut self, data: &[u8]) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut text = Vec::new();

        for &b in data {
            match self.state {
                State::Text => {
                    if b == ESC {
                        if !text.is_empty() {
                            segments.push(Segment::Text(std::mem::take(&mut text)));
                        }
                        self.esc_buf.push(b);
                        self.state = State::EscStart;
                    } else {
                        text.push(b);
                    }
                }
                State::EscStart => {
                    self.esc_buf.push(b);
                    self.state = match b {
                        b'[' => State::Csi,
                        b']' => State::Osc,
                        b'P' => State::Dcs,
                        b'X' => State::Sos,
                        b'^' => State::Pm,
                        b'_' => State::Apc,
                        _ => {
                            self.complete_escape(&mut segments);
                            continue;
                        }
                    };
                }
                State::Csi => {
                    self.esc_buf.push(b);
                    if (0x40..=0x7e).contains(&b) {
                        self.complete_escape(&mut segments);
                    }
                }
                state if state.is_string() => {
                    self.esc_buf.push(b);
                    if state == State::Osc && b == BEL {
                        self.complete_escape(&mut segments);
                        continue;
                    }
                    if self.esc_in_string {
                        if b == b'\\' {
                            self.complete_escape(&mut segments);
                            continue;
                        }
                        self.esc_in_string = false;
                        continue;
                    }
                    if b == ESC {
                        self.esc_in_string = true;
                    }
                }
                _ => unreachable!("tokenizer state covered above"),
            }
        }

        if self.state == State::Text && !text.is_empty() {
            segments.push(Segment::Text(text));
        }
        segments
    }

    /// Emits any pending partial escape as a final segment.
    ///
    /// Intended for teardown only; after `flush` the tokenizer is back in the
    /// text state.
    pub fn flush(&mut self) -> Vec<Segment> {
        if self.state == State::Text {
            return Vec::new();
        }
        let seg = Segment::Escape(std::mem::take(&mut self.esc_buf));
        self.state = State::Text;
        self.esc_in_string = false;
        vec![seg]
    }

    fn complete_escape(&mut self, segments: &mut Vec<Segment>) {
        if !self.esc_buf.is_empty() {
            segments.push(Segment::Escape(std::mem::take(&mut self.esc_buf)));
        }
        self.state = State::Text;
        self.esc_in_string = false;
    }
}
