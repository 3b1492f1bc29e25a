//! PTY supervisor sessions against real child processes.
//!
//! The supervisor installs process-global signal handlers, so these tests
//! serialize on a mutex instead of relying on the harness scheduling.

use std::io::{self, Write};
use std::process::Command;
use std::sync::{Arc, Mutex, OnceLock};

use secretty::config::default_config;
use secretty::detect::Engine;
use secretty::pty::{self, PtyOptions};
use secretty::stream::RedactStream;
use secretty::types::{MaskStyle, Mode};

fn session_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// Write half of a shared buffer, so the supervisor can own the sink while
/// the test still reads what was written.
#[derive(Clone)]
struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl SharedSink {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(Vec::new())))
    }

    fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn quiet_options() -> PtyOptions {
    PtyOptions {
        raw_mode: false,
        drain_window: std::time::Duration::ZERO,
    }
}

#[test]
fn child_output_reaches_the_sink() {
    let _guard = session_lock().lock().unwrap();
    let sink = SharedSink::new();
    let mut command = Command::new("/bin/echo");
    command.arg("hello-from-pty");
    let code = pty::run_command(command, sink.clone(), quiet_options()).expect("session runs");
    assert_eq!(code, 0);
    let out = String::from_utf8_lossy(&sink.contents()).into_owned();
    assert!(out.contains("hello-from-pty"), "missing output: {out:?}");
}

#[test]
fn child_exit_code_is_propagated() {
    let _guard = session_lock().lock().unwrap();
    let mut command = Command::new("/bin/sh");
    command.args(["-c", "exit 7"]);
    let code = pty::run_command(command, SharedSink::new(), quiet_options()).expect("session runs");
    assert_eq!(code, 7);
}

#[test]
fn signal_death_is_encoded_as_128_plus_signo() {
    let _guard = session_lock().lock().unwrap();
    let mut command = Command::new("/bin/sh");
    command.args(["-c", "kill -9 $$"]);
    let code = pty::run_command(command, SharedSink::new(), quiet_options()).expect("session runs");
    assert_eq!(code, 128 + 9);
}

#[test]
fn spawn_failure_surfaces_as_an_error() {
    let _guard = session_lock().lock().unwrap();
    let command = Command::new("/nonexistent/definitely-not-a-binary");
    let err = pty::run_command(command, SharedSink::new(), quiet_options());
    assert!(err.is_err());
}

#[test]
fn secrets_printed_by_the_child_never_reach_the_sink() {
    let _guard = session_lock().lock().unwrap();
    let key = "e".repeat(64);
    let mut cfg = default_config();
    cfg.mode = Mode::Demo;
    cfg.masking.style = MaskStyle::Block;
    cfg.masking.block_char = "*".to_string();
    cfg.redaction.status_line.enabled = false;
    cfg.overrides.copy_without_render.enabled = false;

    let sink = SharedSink::new();
    let engine = Engine::new(&cfg).expect("rules compile");
    let stream = RedactStream::new(sink.clone(), &cfg, engine, None);

    let mut command = Command::new("/bin/sh");
    command.args(["-c", &format!("echo PRIVATE_KEY=0x{key}")]);
    let code = pty::run_command(command, stream, quiet_options()).expect("session runs");
    assert_eq!(code, 0);

    let out = String::from_utf8_lossy(&sink.contents()).into_owned();
    assert!(out.contains("PRIVATE_KEY=0x"), "missing prefix: {out:?}");
    assert!(!out.contains(&key), "secret leaked: {out:?}");
}
