//! Local IPC endpoint for copy-without-render.
//!
//! A per-session Unix stream socket (mode 0600) speaks a newline-delimited
//! JSON protocol: one request object, one response object, then the
//! connection closes. Original secret bytes never appear on the wire; the
//! server hands them to the injected copy callback, which pushes them to the
//! system clipboard.
//!
//! # Concurrency
//! The accept loop runs on its own thread; each accepted connection gets a
//! short-lived handler thread with a 2-second deadline in both directions.

use std::fmt;
use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::Cache;

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(2);

/// Longest socket path we accept; `sun_path` is 104-108 bytes depending on
/// the platform, so stay comfortably below.
const MAX_SOCKET_PATH: usize = 100;

/// Callback that pushes bytes to the system clipboard.
pub type CopyFn = Arc<dyn Fn(&[u8]) -> Result<(), String> + Send + Sync>;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Request {
    op: String,
    #[serde(default)]
    id: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "type")]
    pub secret_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<RecordInfo>>,
}

/// Cache entry metadata as it appears on the wire: no original bytes, epoch
/// timestamps in seconds.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RecordInfo {
    pub id: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rule_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty", rename = "type")]
    pub secret_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub created_at: u64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub expires_at: u64,
}

fn is_zero(v: &u64) -> bool {
    *v == 0
}

/// Client-side failure.
#[derive(Debug)]
pub enum IpcError {
    Io(io::Error),
    Protocol(serde_json::Error),
    /// The server answered `ok: false`.
    Remote(String),
    /// The server does not know the requested operation.
    Unsupported,
}

impl fmt::Display for IpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "ipc: {err}"),
            Self::Protocol(err) => write!(f, "ipc protocol: {err}"),
            Self::Remote(msg) => f.write_str(msg),
            Self::Unsupported => write!(f, "unsupported operation"),
        }
    }
}

impl std::error::Error for IpcError {}

impl From<io::Error> for IpcError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// Successful copy acknowledgement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CopyResponse {
    pub id: u64,
    pub rule_name: String,
    pub secret_type: String,
    pub label: String,
}

/// Serving endpoint for one session. Closing unbinds the socket exactly once.
pub struct Server {
    path: PathBuf,
    stop: Arc<AtomicBool>,
    accept_thread: Option<JoinHandle<()>>,
}

impl Server {
    /// Binds `path` (mode 0600) and starts the accept loop.
    pub fn start(path: &Path, cache: Arc<Cache>, copy_fn: CopyFn) -> io::Result<Self> {
        let listener = UnixListener::bind(path)?;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        let stop = Arc::new(AtomicBool::new(false));
        let accept_thread = {
            let stop = Arc::clone(&stop);
            std::thread::Builder::new()
                .name("secretty-ipc".to_string())
                .spawn(move || accept_loop(&listener, &stop, &cache, &copy_fn))?
        };
        debug!(path = %path.display(), "ipc listening");
        Ok(Self {
            path: path.to_path_buf(),
            stop,
            accept_thread: Some(accept_thread),
        })
    }

    /// Stops the accept loop and unlinks the socket file.
    pub fn close(&mut self) {
        let Some(handle) = self.accept_thread.take() else {
            return;
        };
        self.stop.store(true, Ordering::SeqCst);
        // Wake the blocking accept with a throwaway connection.
        let _ = UnixStream::connect(&self.path);
        let _ = handle.join();
        let _ = fs::remove_file(&self.path);
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.close();
    }
}

fn accept_loop(listener: &UnixListener, stop: &AtomicBool, cache: &Arc<Cache>, copy_fn: &CopyFn) {
    loop {
        match listener.accept() {
            Ok((conn, _)) => {
                if stop.load(Ordering::SeqCst) {
                    return;
                }
                let cache = Arc::clone(cache);
                let copy_fn = Arc::clone(copy_fn);
                let _ = std::thread::Builder::new()
                    .name("secretty-ipc-conn".to_string())
                    .spawn(move || {
                        if let Err(err) = handle_connection(conn, &cache, &copy_fn) {
                            debug!(error = %err, "ipc connection failed");
                        }
                    });
            }
            Err(_) if stop.load(Ordering::SeqCst) => return,
            Err(err) => {
                debug!(error = %err, "ipc accept failed");
            }
        }
    }
}

fn handle_connection(conn: UnixStream, cache: &Cache, copy_fn: &CopyFn) -> io::Result<()> {
    conn.set_read_timeout(Some(CONNECTION_TIMEOUT))?;
    conn.set_write_timeout(Some(CONNECTION_TIMEOUT))?;
    let mut reader = BufReader::new(conn.try_clone()?);
    let mut line = String::new();
    reader.read_line(&mut line)?;

    let response = match serde_json::from_str::<Request>(&line) {
        Err(_) => error_response("invalid request"),
        Ok(req) => dispatch(&req, cache, copy_fn),
    };
    write_response(conn, &response)
}

fn dispatch(req: &Request, cache: &Cache, copy_fn: &CopyFn) -> Response {
    match req.op.as_str() {
        "copy-last" => match cache.get_last() {
            None => error_response("no secrets cached"),
            Some(rec) => copy_record(&rec, copy_fn),
        },
        "copy-id" => {
            if req.id == 0 {
                return error_response("missing id");
            }
            match cache.get(req.id) {
                None => error_response("secret not found"),
                Some(rec) => copy_record(&rec, copy_fn),
            }
        }
        "list" => Response {
            ok: true,
            records: Some(cache.list().iter().map(record_info).collect()),
            ..Response::default()
        },
        _ => error_response("unknown operation"),
    }
}

fn copy_record(rec: &crate::cache::SecretRecord, copy_fn: &CopyFn) -> Response {
    if let Err(msg) = copy_fn(&rec.original) {
        return error_response(&msg);
    }
    Response {
        ok: true,
        id: rec.id,
        rule_name: non_empty(&rec.rule_name),
        secret_type: Some(rec.secret_type.as_str().to_string()),
        label: non_empty(&rec.label),
        ..Response::default()
    }
}

fn record_info(rec: &crate::cache::SecretRecord) -> RecordInfo {
    RecordInfo {
        id: rec.id,
        rule_name: rec.rule_name.clone(),
        secret_type: rec.secret_type.as_str().to_string(),
        label: rec.label.clone(),
        created_at: epoch_seconds(rec.created_at),
        expires_at: epoch_seconds(rec.expires_at),
    }
}

fn epoch_seconds(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

fn error_response(msg: &str) -> Response {
    Response {
        ok: false,
        error: Some(msg.to_string()),
        ..Response::default()
    }
}

fn write_response(mut conn: UnixStream, response: &Response) -> io::Result<()> {
    let mut payload = serde_json::to_vec(response)?;
    payload.push(b'\n');
    conn.write_all(&payload)
}

/// Allocates a unique socket path under the temp dir, falling back to `/tmp`
/// when the result would exceed the `sun_path` limit.
pub fn temp_socket_path() -> io::Result<PathBuf> {
    let mut dir = std::env::temp_dir();
    if dir.as_os_str().len() > 60 {
        dir = PathBuf::from("/tmp");
    }
    let mut rng = rand::thread_rng();
    for _ in 0..5 {
        let name = format!("secretty-{}-{:08x}.sock", std::process::id(), rng.next_u32());
        let path = dir.join(&name);
        if path.as_os_str().len() >= MAX_SOCKET_PATH {
            if dir != Path::new("/tmp") {
                dir = PathBuf::from("/tmp");
                continue;
            }
            return Err(io::Error::other("socket path too long"));
        }
        if !path.exists() {
            return Ok(path);
        }
    }
    Err(io::Error::other("unable to allocate socket path"))
}

/// Asks the session server to copy its most recent secret.
pub fn copy_last(socket_path: &Path) -> Result<CopyResponse, IpcError> {
    let response = round_trip(socket_path, &Request {
        op: "copy-last".to_string(),
        id: 0,
    })?;
    into_copy_response(response)
}

/// Asks the session server to copy the secret with `id`.
pub fn copy_by_id(socket_path: &Path, id: u64) -> Result<CopyResponse, IpcError> {
    let response = round_trip(socket_path, &Request {
        op: "copy-id".to_string(),
        id,
    })?;
    into_copy_response(response)
}

/// Lists cached secrets (metadata only), most recent first.
pub fn list_secrets(socket_path: &Path) -> Result<Vec<RecordInfo>, IpcError> {
    let response = round_trip(socket_path, &Request {
        op: "list".to_string(),
        id: 0,
    })?;
    if !response.ok {
        return Err(remote_error(response));
    }
    Ok(response.records.unwrap_or_default())
}

fn round_trip(socket_path: &Path, req: &Request) -> Result<Response, IpcError> {
    let mut conn = UnixStream::connect(socket_path)?;
    conn.set_read_timeout(Some(CONNECTION_TIMEOUT))?;
    conn.set_write_timeout(Some(CONNECTION_TIMEOUT))?;
    let mut payload = serde_json::to_vec(req).map_err(IpcError::Protocol)?;
    payload.push(b'\n');
    conn.write_all(&payload)?;

    let mut reader = BufReader::new(conn);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    serde_json::from_str(&line).map_err(IpcError::Protocol)
}

fn into_copy_response(response: Response) -> Result<CopyResponse, IpcError> {
    if !response.ok {
        return Err(remote_error(response));
    }
    Ok(CopyResponse {
        id: response.id,
        rule_name: response.rule_name.unwrap_or_default(),
        secret_type: response.secret_type.unwrap_or_default(),
        label: response.label.unwrap_or_default(),
    })
}

fn remote_error(response: Response) -> IpcError {
    match response.error.as_deref() {
        Some("unknown operation") => IpcError::Unsupported,
        Some(msg) => IpcError::Remote(msg.to_string()),
        None => IpcError::Remote("request failed".to_string()),
    }
}
