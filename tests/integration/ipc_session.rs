//! Full session loop: redaction stream populates the cache, a sibling
//! client retrieves the original over the Unix socket.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use secretty::cache::Cache;
use secretty::config::default_config;
use secretty::detect::Engine;
use secretty::ipc::{self, CopyFn, Server};
use secretty::stream::RedactStream;
use secretty::types::{MaskStyle, Mode};

const KEY64: &str = "dddddddddddddddddddddddddddddddddddddddddddddddddddddddddddddddd";

#[test]
fn copy_last_round_trip_through_socket() {
    let mut cfg = default_config();
    cfg.mode = Mode::Demo;
    cfg.masking.style = MaskStyle::Block;
    cfg.masking.block_char = "*".to_string();
    cfg.redaction.status_line.enabled = false;
    cfg.overrides.copy_without_render.enabled = true;

    let cache = Arc::new(Cache::new(8, Duration::from_secs(60)));
    let engine = Engine::new(&cfg).expect("rules compile");
    let mut stream = RedactStream::new(Vec::new(), &cfg, engine, Some(Arc::clone(&cache)));
    let input = format!("PRIVATE_KEY=0x{KEY64}\n");
    stream.write_all(input.as_bytes()).unwrap();
    stream.flush().unwrap();

    let copied: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&copied);
    let copy_fn: CopyFn = Arc::new(move |bytes| {
        *sink.lock().unwrap() = bytes.to_vec();
        Ok(())
    });
    let socket_path = ipc::temp_socket_path().expect("socket path");
    let server = Server::start(&socket_path, Arc::clone(&cache), copy_fn).expect("server");

    let resp = ipc::copy_last(&socket_path).expect("copy-last");
    assert_eq!(resp.id, 1);
    assert_eq!(resp.secret_type, "EVM_PK");
    assert_eq!(resp.label, "PRIVATE_KEY");
    assert_eq!(
        *copied.lock().unwrap(),
        format!("0x{KEY64}").into_bytes()
    );

    // The same record is addressable by id, and the listing carries
    // metadata only.
    let by_id = ipc::copy_by_id(&socket_path, 1).expect("copy-id");
    assert_eq!(by_id.id, 1);
    let records = ipc::list_secrets(&socket_path).expect("list");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].label, "PRIVATE_KEY");

    drop(server);
    assert!(!socket_path.exists());
}

#[test]
fn expired_entries_are_not_copyable() {
    let cache = Arc::new(Cache::new(8, Duration::from_millis(1)));
    cache.put(secretty::SecretRecord {
        id: 1,
        secret_type: secretty::SecretType::ApiKey,
        rule_name: "stripe_key".to_string(),
        label: String::new(),
        original: b"sk_live_0123456789abcdef".to_vec(),
        created_at: std::time::UNIX_EPOCH,
        expires_at: std::time::UNIX_EPOCH,
    });
    std::thread::sleep(Duration::from_millis(10));

    let copy_fn: CopyFn = Arc::new(|_| Ok(()));
    let socket_path = ipc::temp_socket_path().unwrap();
    let server = Server::start(&socket_path, cache, copy_fn).unwrap();
    let err = ipc::copy_last(&socket_path).unwrap_err();
    assert!(matches!(err, ipc::IpcError::Remote(ref msg) if msg == "no secrets cached"));
    drop(server);
}
