//! Screen-time secret redaction for terminal sessions.
//!
//! SecreTTY runs a child process (interactive shell or single command) under
//! a pseudo-terminal and passes all of its output through a redaction
//! pipeline before it reaches the user's screen, so private keys, API
//! tokens, and passwords never render during demos, screen-shares, and
//! recordings. It is a visual safety layer, not a sandbox: stdin is
//! forwarded unmodified and a compromised child is out of scope.
//!
//! Pipeline (single output chunk):
//! 1) ANSI tokenizing: split the byte stream into text and escape segments.
//! 2) Rolling window: retain enough text that secrets split across reads
//!    are still seen whole.
//! 3) Detection: regex rules plus typed validators with context scoring and
//!    overlap resolution.
//! 4) Masking: per-style span rewriting (block, glow, morse, placeholder,
//!    stable hash token).
//!
//! Around the pipeline sit the PTY supervisor (signals, resize, raw mode,
//! terminfo fallback), the bounded TTL+LRU cache of originals, and the
//! per-session Unix-socket IPC endpoint that lets sibling processes copy a
//! redacted secret to the clipboard without re-rendering it.

pub mod allowlist;
pub mod ansi;
pub mod cache;
pub mod clipboard;
pub mod config;
pub mod detect;
pub mod ipc;
pub mod mask;
pub mod pty;
pub mod stream;
pub mod types;

pub use cache::{Cache, SecretRecord};
pub use config::{default_config, Config};
pub use detect::{Engine, Match};
pub use mask::Masker;
pub use stream::RedactStream;
pub use types::{Action, MaskStyle, Mode, SecretType, Severity};
