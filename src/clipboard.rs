//! Clipboard backend invocation.
//!
//! The IPC server hands secret bytes to one of the well-known clipboard
//! commands over stdin; nothing is ever passed on an argv line. Backend
//! `auto` picks a candidate from the session type (Wayland before X11).

use std::fmt;
use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

const COPY_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    Auto,
    Pbcopy,
    WlCopy,
    Xclip,
    Xsel,
    None,
}

impl Backend {
    pub fn parse(name: &str) -> Result<Self, ClipboardError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "pbcopy" => Ok(Self::Pbcopy),
            "wl-copy" => Ok(Self::WlCopy),
            "xclip" => Ok(Self::Xclip),
            "xsel" => Ok(Self::Xsel),
            "none" => Ok(Self::None),
            other => Err(ClipboardError::UnsupportedBackend(other.to_string())),
        }
    }

    fn command(self) -> Option<(&'static str, &'static [&'static str])> {
        match self {
            Self::Pbcopy => Some(("pbcopy", &[])),
            Self::WlCopy => Some(("wl-copy", &[])),
            Self::Xclip => Some(("xclip", &["-selection", "clipboard"])),
            Self::Xsel => Some(("xsel", &["--clipboard", "--input"])),
            Self::Auto | Self::None => None,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Auto => "auto",
            Self::Pbcopy => "pbcopy",
            Self::WlCopy => "wl-copy",
            Self::Xclip => "xclip",
            Self::Xsel => "xsel",
            Self::None => "none",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum ClipboardError {
    UnsupportedBackend(String),
    Disabled,
    NoBackendAvailable(String),
    Io(&'static str, io::Error),
    Timeout(&'static str),
    CommandFailed(&'static str),
}

impl fmt::Display for ClipboardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedBackend(name) => write!(f, "unsupported clipboard backend: {name:?}"),
            Self::Disabled => write!(f, "clipboard disabled"),
            Self::NoBackendAvailable(hint) => {
                write!(f, "no clipboard backend found; install one of: {hint}")
            }
            Self::Io(cmd, err) => write!(f, "{cmd}: {err}"),
            Self::Timeout(cmd) => write!(f, "{cmd}: timed out"),
            Self::CommandFailed(cmd) => write!(f, "{cmd}: exited with failure"),
        }
    }
}

impl std::error::Error for ClipboardError {}

/// Writes `data` to the system clipboard using the requested backend.
pub fn copy_bytes(backend: Backend, data: &[u8]) -> Result<(), ClipboardError> {
    let resolved = resolve(backend)?;
    if resolved == Backend::None {
        return Err(ClipboardError::Disabled);
    }
    let (cmd, args) = resolved
        .command()
        .expect("resolved backend maps to a command");
    run_copy_command(cmd, args, data)
}

/// Resolves `auto` into a concrete installed backend.
pub fn resolve(backend: Backend) -> Result<Backend, ClipboardError> {
    if backend != Backend::Auto {
        return Ok(backend);
    }
    let candidates = auto_candidates();
    if candidates.is_empty() {
        return Err(ClipboardError::NoBackendAvailable(
            "wl-copy, xclip, xsel (missing display server)".to_string(),
        ));
    }
    for candidate in &candidates {
        let (cmd, _) = candidate.command().expect("candidates are concrete");
        if command_exists(cmd) {
            return Ok(*candidate);
        }
    }
    let names: Vec<String> = candidates.iter().map(Backend::to_string).collect();
    Err(ClipboardError::NoBackendAvailable(names.join(", ")))
}

#[cfg(target_os = "macos")]
fn auto_candidates() -> Vec<Backend> {
    vec![Backend::Pbcopy]
}

#[cfg(not(target_os = "macos"))]
fn auto_candidates() -> Vec<Backend> {
    let mut candidates = Vec::new();
    if is_wayland() {
        candidates.push(Backend::WlCopy);
    }
    if is_x11() {
        candidates.push(Backend::Xclip);
        candidates.push(Backend::Xsel);
    }
    candidates
}

#[cfg(not(target_os = "macos"))]
fn is_wayland() -> bool {
    env_nonempty("WAYLAND_DISPLAY")
        || std::env::var("XDG_SESSION_TYPE").is_ok_and(|v| v.eq_ignore_ascii_case("wayland"))
}

#[cfg(not(target_os = "macos"))]
fn is_x11() -> bool {
    env_nonempty("DISPLAY")
}

#[cfg(not(target_os = "macos"))]
fn env_nonempty(key: &str) -> bool {
    std::env::var(key).is_ok_and(|v| !v.is_empty())
}

fn command_exists(cmd: &str) -> bool {
    let Some(path_var) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&path_var).any(|dir| dir.join(cmd).is_file())
}

fn run_copy_command(
    cmd: &'static str,
    args: &[&str],
    data: &[u8],
) -> Result<(), ClipboardError> {
    let mut child = Command::new(cmd)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|err| ClipboardError::Io(cmd, err))?;

    {
        let mut stdin = child.stdin.take().expect("stdin is piped");
        stdin
            .write_all(data)
            .map_err(|err| ClipboardError::Io(cmd, err))?;
    }

    let deadline = Instant::now() + COPY_TIMEOUT;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                if status.success() {
                    return Ok(());
                }
                return Err(ClipboardError::CommandFailed(cmd));
            }
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ClipboardError::Timeout(cmd));
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            Err(err) => return Err(ClipboardError::Io(cmd, err)),
        }
    }
}
