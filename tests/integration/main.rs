//! Integration tests for the redaction pipeline, IPC endpoint, and PTY
//! supervisor.
//!
//! Run with: `cargo test --test integration`

mod ipc_session;
mod pipeline;
mod pty_session;
