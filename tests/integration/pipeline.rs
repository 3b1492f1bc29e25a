//! End-to-end redaction scenarios through the public stream API.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use secretty::cache::Cache;
use secretty::config::{default_config, Config};
use secretty::detect::Engine;
use secretty::stream::RedactStream;
use secretty::types::{MaskStyle, Mode};

const KEY64_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

fn scenario_config() -> Config {
    let mut cfg = default_config();
    cfg.masking.style = MaskStyle::Block;
    cfg.masking.block_char = "*".to_string();
    cfg.masking.stable_hash_token.enabled = false;
    cfg.redaction.placeholder_template = "<REDACTED:{type}>".to_string();
    cfg.redaction.rolling_window_bytes = 32768;
    cfg.redaction.status_line.enabled = false;
    cfg.overrides.copy_without_render.enabled = false;
    cfg.rulesets.web3.enabled = true;
    cfg.rulesets.api_keys.enabled = true;
    cfg.rulesets.auth_tokens.enabled = true;
    cfg
}

fn redact(cfg: &Config, writes: &[&[u8]]) -> Vec<u8> {
    let engine = Engine::new(cfg).expect("rules compile");
    let mut stream = RedactStream::new(Vec::new(), cfg, engine, None);
    for chunk in writes {
        stream.write_all(chunk).expect("write");
    }
    stream.flush().expect("flush");
    stream.into_inner()
}

#[test]
fn evm_private_key_in_env_assignment_form() {
    let cfg = scenario_config();
    let input = format!("PRIVATE_KEY=0x{KEY64_A}\n");
    let out = String::from_utf8(redact(&cfg, &[input.as_bytes()])).unwrap();

    assert!(out.starts_with("PRIVATE_KEY=0x"));
    assert!(out.ends_with('\n'));
    let digits = &out["PRIVATE_KEY=0x".len()..out.len() - 1];
    assert_eq!(digits.len(), 64);
    assert!(digits.bytes().all(|b| b.is_ascii_hexdigit()));
    assert!(digits.bytes().all(|b| !b.is_ascii_uppercase()));
    // No 64-byte window of the output reproduces the original digits.
    assert!(!out.contains(KEY64_A));
}

#[test]
fn bearer_token_masks_one_star_per_byte() {
    let cfg = scenario_config();
    let token = "abc.def.ghi0123456789ABCDEFGHIJKL";
    let input = format!("Authorization: Bearer {token}\n");
    let out = String::from_utf8(redact(&cfg, &[input.as_bytes()])).unwrap();
    assert_eq!(
        out,
        format!("Authorization: Bearer {}\n", "*".repeat(token.len()))
    );
}

#[test]
fn ansi_colored_secret_keeps_csi_bytes() {
    let cfg = scenario_config();
    let hex = "b".repeat(64);
    let input = format!("\x1b[31m0x{hex}\x1b[0m");
    let out = String::from_utf8(redact(&cfg, &[input.as_bytes()])).unwrap();

    assert!(out.starts_with("\x1b[31m0x"));
    assert!(out.ends_with("\x1b[0m"));
    assert_eq!(out.len(), input.len());
    assert!(!out.contains(&hex));
    let digits = &out["\x1b[31m0x".len()..out.len() - "\x1b[0m".len()];
    assert!(digits.bytes().all(|b| b.is_ascii_hexdigit()));
}

#[test]
fn chunked_write_equals_single_write_shape() {
    let mut cfg = scenario_config();
    cfg.redaction.rolling_window_bytes = 64;
    let part1 = format!("PRIVATE_KEY=0x{}", "c".repeat(30));
    let part2 = format!("{}\n", "c".repeat(34));
    let out = String::from_utf8(redact(&cfg, &[part1.as_bytes(), part2.as_bytes()])).unwrap();

    assert!(out.starts_with("PRIVATE_KEY=0x"));
    assert!(out.ends_with('\n'));
    assert!(!out.contains(&"c".repeat(64)));
    let digits = &out["PRIVATE_KEY=0x".len()..out.len() - 1];
    assert_eq!(digits.len(), 64);
    assert!(digits.bytes().all(|b| b.is_ascii_hexdigit()));
}

#[test]
fn status_line_follows_payload_newline() {
    let mut cfg = scenario_config();
    cfg.mode = Mode::Demo;
    cfg.redaction.status_line.enabled = true;
    cfg.redaction.status_line.rate_limit_ms = 0;
    cfg.redaction.include_event_id = true;
    let input = format!("PRIVATE_KEY=0x{KEY64_A}\n");
    let out = String::from_utf8(redact(&cfg, &[input.as_bytes()])).unwrap();
    let mut lines = out.lines();
    let payload = lines.next().expect("payload line");
    assert!(payload.starts_with("PRIVATE_KEY=0x"));
    assert_eq!(lines.next(), Some("secretty: redacted EVM_PK#1"));
}

#[test]
fn placeholder_action_renders_template() {
    let mut cfg = scenario_config();
    cfg.redaction.include_event_id = true;
    for rule in &mut cfg.rules {
        rule.action = Some(secretty::Action::Placeholder);
    }
    for det in &mut cfg.typed_detectors {
        det.action = Some(secretty::Action::Placeholder);
    }
    let input = format!("PRIVATE_KEY=0x{KEY64_A}\n");
    let out = String::from_utf8(redact(&cfg, &[input.as_bytes()])).unwrap();
    assert_eq!(out, "PRIVATE_KEY=<REDACTED:EVM_PK>\n");
}

#[test]
fn masking_placeholder_output_is_idempotent() {
    let mut cfg = scenario_config();
    for rule in &mut cfg.rules {
        rule.action = Some(secretty::Action::Placeholder);
    }
    for det in &mut cfg.typed_detectors {
        det.action = Some(secretty::Action::Placeholder);
    }
    let input = format!("PRIVATE_KEY=0x{KEY64_A}\n");
    let first = redact(&cfg, &[input.as_bytes()]);
    let second = redact(&cfg, &[&first]);
    assert_eq!(first, second);
}

#[test]
fn secret_cached_during_session_is_retrievable() {
    let mut cfg = scenario_config();
    cfg.mode = Mode::Demo;
    cfg.overrides.copy_without_render.enabled = true;
    let cache = Arc::new(Cache::new(8, Duration::from_secs(60)));
    let engine = Engine::new(&cfg).unwrap();
    let mut stream = RedactStream::new(Vec::new(), &cfg, engine, Some(Arc::clone(&cache)));
    let input = format!("PRIVATE_KEY=0x{KEY64_A}\n");
    stream.write_all(input.as_bytes()).unwrap();
    stream.flush().unwrap();

    let rec = cache.get_last().expect("secret cached");
    assert_eq!(rec.label, "PRIVATE_KEY");
    assert_eq!(rec.original, format!("0x{KEY64_A}").into_bytes());
}

#[test]
fn strict_mode_with_disable_copy_never_snapshots() {
    let mut cfg = scenario_config();
    cfg.mode = Mode::Strict;
    cfg.strict.disable_copy_original = true;
    cfg.overrides.copy_without_render.enabled = true;
    let cache = Arc::new(Cache::new(8, Duration::from_secs(60)));
    let engine = Engine::new(&cfg).unwrap();
    let mut stream = RedactStream::new(Vec::new(), &cfg, engine, Some(Arc::clone(&cache)));
    let input = format!("PRIVATE_KEY=0x{KEY64_A}\n");
    stream.write_all(input.as_bytes()).unwrap();
    stream.flush().unwrap();
    assert!(cache.list().is_empty());
}
