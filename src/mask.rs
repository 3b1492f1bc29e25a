//! Masking engine: rewrites matched spans into style-specific renderings.
//!
//! Replacements never contain the original bytes. The `block` style and the
//! hex-random rendering preserve span length (code points for `block`, bytes
//! for hex-random); `glow`, `morse`, placeholders, and stable-hash tokens may
//! change length.

use hmac::{Hmac, Mac};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::Sha256;

use crate::config::Config;
use crate::detect::Match;
use crate::types::{Action, MaskStyle, SecretType};

type HmacSha256 = Hmac<Sha256>;

const DEFAULT_PLACEHOLDER_TEMPLATE: &str = "\u{27e6}REDACTED:{type}\u{27e7}";
const DEFAULT_BLOCK_CHAR: &str = "\u{2588}";
const DEFAULT_MORSE_MESSAGE: &str = "SECRETTY";

/// Fixed truecolor gradient for the glow style.
const GLOW_PALETTE: [(u8, u8, u8); 9] = [
    (45, 212, 191),
    (34, 211, 238),
    (56, 189, 248),
    (96, 165, 250),
    (129, 140, 248),
    (167, 139, 250),
    (192, 132, 252),
    (244, 114, 182),
    (251, 113, 133),
];

/// Applies redaction actions to matched spans.
///
/// Holds per-session state: the 32-byte salt for stable-hash tokens and the
/// previous glow parameters for the rotate-by-one fallback.
pub struct Masker {
    default_action: Action,
    placeholder_template: String,
    style: MaskStyle,
    block_char: String,
    hex_uppercase: bool,
    stable_hash_enabled: bool,
    stable_hash_tag_len: usize,
    morse_pattern: String,
    salt: [u8; 32],
    rng: StdRng,
    last_glow: Option<(usize, usize)>,
}

impl Masker {
    pub fn new(cfg: &Config) -> Self {
        let mut rng = StdRng::from_entropy();
        let mut salt = [0u8; 32];
        rng.fill(&mut salt);
        let block_char = if cfg.masking.block_char.is_empty() {
            DEFAULT_BLOCK_CHAR.to_string()
        } else {
            cfg.masking.block_char.clone()
        };
        let template = if cfg.redaction.placeholder_template.is_empty() {
            DEFAULT_PLACEHOLDER_TEMPLATE.to_string()
        } else {
            cfg.redaction.placeholder_template.clone()
        };
        Self {
            default_action: cfg.redaction.default_action,
            placeholder_template: template,
            style: cfg.masking.style,
            block_char,
            hex_uppercase: cfg.masking.hex_random_same_length.uppercase,
            stable_hash_enabled: cfg.masking.stable_hash_token.enabled,
            stable_hash_tag_len: cfg.masking.stable_hash_token.tag_len,
            morse_pattern: morse_pattern(&cfg.masking.morse_message),
            salt,
            rng,
            last_glow: None,
        }
    }

    /// Replaces each match span of `text` and returns the redacted bytes.
    ///
    /// Matches must be ordered by `start` and non-overlapping; spans out of
    /// bounds are skipped defensively rather than panicking.
    pub fn apply(&mut self, text: &[u8], matches: &[Match]) -> Vec<u8> {
        if matches.is_empty() {
            return text.to_vec();
        }
        let mut out = Vec::with_capacity(text.len());
        let mut cursor = 0;
        for m in matches {
            if m.start < cursor || m.end > text.len() || m.end <= m.start {
                continue;
            }
            out.extend_from_slice(&text[cursor..m.start]);
            let replacement = self.replacement(&text[m.start..m.end], m);
            out.extend_from_slice(&replacement);
            cursor = m.end;
        }
        out.extend_from_slice(&text[cursor..]);
        out
    }

    fn replacement(&mut self, original: &[u8], m: &Match) -> Vec<u8> {
        match m.action.unwrap_or(self.default_action) {
            Action::Mask => self.mask(original, m),
            Action::Placeholder => self.placeholder(m),
        }
    }

    fn mask(&mut self, original: &[u8], m: &Match) -> Vec<u8> {
        if self.stable_hash_enabled {
            return self.stable_hash_token(m);
        }
        match self.style {
            MaskStyle::Glow => {
                let (start, band) = self.glow_params(original);
                mask_glow(original, &self.block_char, start, band)
            }
            MaskStyle::Morse => mask_morse(original, &self.morse_pattern),
            MaskStyle::Block => {
                if m.secret_type == SecretType::EvmPrivateKey || looks_hex(original) {
                    self.hex_random_same_length(original)
                } else {
                    mask_block(original, &self.block_char)
                }
            }
        }
    }

    fn placeholder(&self, m: &Match) -> Vec<u8> {
        let repl = self
            .placeholder_template
            .replace("{type}", m.secret_type.as_str())
            .replace("{id:02d}", &format!("{:02}", m.id))
            .replace("{id}", &m.id.to_string());
        repl.into_bytes()
    }

    /// `⟦MASK:{type}:{tag}⟧` where the tag is keyed by the per-session salt,
    /// so identical rules render identically within a session but never
    /// across sessions.
    fn stable_hash_token(&self, m: &Match) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.salt).expect("hmac accepts any key length");
        mac.update(m.rule_name.as_bytes());
        mac.update(b"|");
        mac.update(m.secret_type.as_str().as_bytes());
        let mut tag = hex_encode(&mac.finalize().into_bytes());
        if self.stable_hash_tag_len > 0 && self.stable_hash_tag_len < tag.len() {
            tag.truncate(self.stable_hash_tag_len);
        }
        format!("\u{27e6}MASK:{}:{}\u{27e7}", m.secret_type.as_str(), tag).into_bytes()
    }

    /// Same-length hex rewrite: the optional `0x`/`0X` prefix is preserved
    /// byte-for-byte, every other byte becomes a fresh random nibble.
    fn hex_random_same_length(&mut self, original: &[u8]) -> Vec<u8> {
        let digits: &[u8; 16] = if self.hex_uppercase {
            b"0123456789ABCDEF"
        } else {
            b"0123456789abcdef"
        };
        let prefix_len = if original.len() >= 2
            && original[0] == b'0'
            && (original[1] == b'x' || original[1] == b'X')
        {
            2
        } else {
            0
        };
        let mut out = Vec::with_capacity(original.len());
        out.extend_from_slice(&original[..prefix_len]);
        for _ in prefix_len..original.len() {
            out.push(digits[self.rng.gen_range(0..16)]);
        }
        out
    }

    /// Glow parameters derived from the span content so repeated prints of
    /// the same secret render identically; the rotate-by-one fallback keeps
    /// adjacent masks visually distinct.
    fn glow_params(&mut self, original: &[u8]) -> (usize, usize) {
        let sum = fnv1a32(original);
        let mut idx = (sum as usize) % GLOW_PALETTE.len();
        let band = ((sum >> 8) as usize % 4) + 2;
        if self.last_glow == Some((idx, band)) {
            idx = (idx + 1) % GLOW_PALETTE.len();
        }
        self.last_glow = Some((idx, band));
        (idx, band)
    }
}

fn mask_block(original: &[u8], block_char: &str) -> Vec<u8> {
    let count = code_points(original);
    block_char.repeat(count).into_bytes()
}

fn mask_glow(original: &[u8], block_char: &str, start: usize, band: usize) -> Vec<u8> {
    let count = code_points(original);
    if count == 0 {
        return Vec::new();
    }
    let block = if block_char.is_empty() {
        DEFAULT_BLOCK_CHAR
    } else {
        block_char
    };
    let band = band.max(1);
    let mut out = Vec::new();
    for i in 0..count {
        let (r, g, b) = GLOW_PALETTE[(start + i / band) % GLOW_PALETTE.len()];
        out.extend_from_slice(format!("\x1b[38;2;{r};{g};{b}m").as_bytes());
        out.extend_from_slice(block.as_bytes());
    }
    out.extend_from_slice(b"\x1b[0m");
    out
}

/// Repeats the morse pattern until it covers the span, then truncates to the
/// original byte length.
fn mask_morse(original: &[u8], pattern: &str) -> Vec<u8> {
    if original.is_empty() {
        return Vec::new();
    }
    let pattern = if pattern.is_empty() {
        "... --- ..."
    } else {
        pattern
    };
    let mut out = String::from(pattern);
    while out.len() < original.len() {
        out.push(' ');
        out.push_str(pattern);
    }
    out.truncate(original.len());
    out.into_bytes()
}

/// Encodes `message` as a morse pattern: `.`/`-` codes, spaces between
/// characters, `/` between words. Unknown characters are skipped.
fn morse_pattern(message: &str) -> String {
    let msg = message.trim().to_ascii_uppercase();
    let msg = if msg.is_empty() {
        DEFAULT_MORSE_MESSAGE.to_string()
    } else {
        msg
    };
    let mut parts: Vec<&str> = Vec::new();
    for ch in msg.chars() {
        if ch == ' ' {
            parts.push("/");
            continue;
        }
        if let Some(code) = morse_code(ch) {
            parts.push(code);
        }
    }
    parts.join(" ")
}

fn morse_code(ch: char) -> Option<&'static str> {
    Some(match ch {
        'A' => ".-",
        'B' => "-...",
        'C' => "-.-.",
        'D' => "-..",
        'E' => ".",
        'F' => "..-.",
        'G' => "--.",
        'H' => "....",
        'I' => "..",
        'J' => ".---",
        'K' => "-.-",
        'L' => ".-..",
        'M' => "--",
        'N' => "-.",
        'O' => "---",
        'P' => ".--.",
        'Q' => "--.-",
        'R' => ".-.",
        'S' => "...",
        'T' => "-",
        'U' => "..-",
        'V' => "...-",
        'W' => ".--",
        'X' => "-..-",
        'Y' => "-.--",
        'Z' => "--..",
        '0' => "-----",
        '1' => ".----",
        '2' => "..---",
        '3' => "...--",
        '4' => "....-",
        '5' => ".....",
        '6' => "-....",
        '7' => "--...",
        '8' => "---..",
        '9' => "----.",
        _ => return None,
    })
}

/// Optional `0x`/`0X` prefix with a non-empty all-hex remainder.
fn looks_hex(bytes: &[u8]) -> bool {
    let body = match bytes {
        [b'0', b'x' | b'X', rest @ ..] => rest,
        other => other,
    };
    !body.is_empty() && body.iter().all(u8::is_ascii_hexdigit)
}

/// Unicode code points in `bytes`; invalid sequences count per replacement
/// rules of lossy decoding.
fn code_points(bytes: &[u8]) -> usize {
    String::from_utf8_lossy(bytes).chars().count()
}

fn fnv1a32(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for &b in bytes {
        hash ^= u32::from(b);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}
