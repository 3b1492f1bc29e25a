//! Property-based invariants for the tokenizer, the detection engine, and
//! the streaming redactor.
//!
//! Run with: `cargo test --test property`

mod chunking;
mod detection;
mod tokenizer_roundtrip;
