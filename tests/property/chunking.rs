//! Chunking equivalence: splitting the byte stream across `write` calls
//! never changes what the sink observes, as long as the rolling window is at
//! least as large as the longest matchable span.
//!
//! The deterministic mask styles (block asterisks, placeholder) are used so
//! outputs are byte-comparable.

use std::io::Write;

use proptest::prelude::*;

use secretty::config::{default_config, Config};
use secretty::detect::Engine;
use secretty::stream::RedactStream;
use secretty::types::{Action, MaskStyle};

fn deterministic_config(window: usize) -> Config {
    let mut cfg = default_config();
    cfg.masking.style = MaskStyle::Block;
    cfg.masking.block_char = "*".to_string();
    cfg.masking.stable_hash_token.enabled = false;
    cfg.redaction.status_line.enabled = false;
    cfg.redaction.rolling_window_bytes = window;
    cfg.overrides.copy_without_render.enabled = false;
    cfg.rulesets.auth_tokens.enabled = true;
    cfg.rulesets.passwords.enabled = true;
    // Random hex rewriting is the one non-deterministic mask; route the
    // typed detector through placeholders instead.
    for det in &mut cfg.typed_detectors {
        det.action = Some(Action::Placeholder);
    }
    for rule in &mut cfg.rules {
        if rule.name == "env_private_key" {
            rule.action = Some(Action::Placeholder);
        }
    }
    cfg
}

fn redact_chunked(cfg: &Config, bytes: &[u8], cuts: &[usize]) -> Vec<u8> {
    let engine = Engine::new(cfg).expect("rules compile");
    let mut stream = RedactStream::new(Vec::new(), cfg, engine, None);
    let mut prev = 0;
    for &cut in cuts {
        stream.write_all(&bytes[prev..cut]).expect("write");
        prev = cut;
    }
    stream.write_all(&bytes[prev..]).expect("write");
    stream.flush().expect("flush");
    stream.into_inner()
}

/// Atoms are self-terminated or short enough that no matchable span can
/// approach the rolling window used below.
fn payload() -> impl Strategy<Value = Vec<u8>> {
    let atom = prop_oneof![
        4 => "[ -~]{0,20}\n?".prop_map(String::into_bytes),
        2 => Just(b"Bearer abcdefghij0123456789.tokenpayload more\n".to_vec()),
        2 => Just(b"password = hunter2-long\n".to_vec()),
        1 => Just(format!("PRIVATE_KEY=0x{}\n", "a".repeat(64)).into_bytes()),
        1 => Just("caf\u{e9} \u{2588}\u{2588}\n".as_bytes().to_vec()),
        1 => Just(b"\x1b[32m".to_vec()),
        1 => Just(b"\x1b[0m".to_vec()),
    ];
    proptest::collection::vec(atom, 0..6).prop_map(|parts| parts.concat())
}

fn cuts_for(len: usize) -> impl Strategy<Value = Vec<usize>> {
    proptest::collection::vec(0..=len.max(1), 0..6).prop_map(move |mut cuts| {
        cuts.retain(|&c| c > 0 && c < len);
        cuts.sort_unstable();
        cuts.dedup();
        cuts
    })
}

proptest! {
    #[test]
    fn chunked_output_equals_single_write(
        (bytes, cuts) in payload().prop_flat_map(|b| {
            let len = b.len();
            (Just(b), cuts_for(len))
        })
    ) {
        // Window larger than the longest matchable span in the corpus.
        let cfg = deterministic_config(256);
        let whole = redact_chunked(&cfg, &bytes, &[]);
        let split = redact_chunked(&cfg, &bytes, &cuts);
        prop_assert_eq!(whole, split);
    }

    #[test]
    fn redacted_output_never_contains_a_known_secret(cut in 1..80usize) {
        let key = "f".repeat(64);
        let input = format!("PRIVATE_KEY=0x{key}\n");
        let cfg = deterministic_config(128);
        let cut = cut.min(input.len() - 1);
        let out = redact_chunked(&cfg, input.as_bytes(), &[cut]);
        let text = String::from_utf8(out).unwrap();
        prop_assert!(!text.contains(&key));
    }
}
