//! Fuzz target for the streaming ANSI tokenizer.
//!
//! Checks the round-trip invariant under arbitrary input and arbitrary
//! chunking: concatenating every emitted segment (plus flush) reproduces the
//! input byte-for-byte, and no text segment ever contains an ESC byte.
//!
//! # Input Format
//!
//! The first byte selects a chunk size (0 means "everything at once"); the
//! rest is the byte stream to tokenize.
//!
//! # Running
//!
//! ```bash
//! cargo +nightly fuzz run fuzz_ansi_tokenizer
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;

use secretty::ansi::{Segment, Tokenizer};

fuzz_target!(|data: &[u8]| {
    let Some((&chunk_hint, stream)) = data.split_first() else {
        return;
    };
    let chunk_size = if chunk_hint == 0 {
        stream.len().max(1)
    } else {
        chunk_hint as usize
    };

    let mut tokenizer = Tokenizer::new();
    let mut reassembled = Vec::with_capacity(stream.len());
    for chunk in stream.chunks(chunk_size) {
        for seg in tokenizer.push(chunk) {
            if let Segment::Text(text) = &seg {
                assert!(!text.contains(&0x1b), "ESC leaked into a text segment");
            }
            reassembled.extend_from_slice(seg.bytes());
        }
    }
    for seg in tokenizer.flush() {
        reassembled.extend_from_slice(seg.bytes());
    }
    assert_eq!(reassembled, stream, "tokenizer round-trip mismatch");
});
