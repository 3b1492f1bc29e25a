//! PTY session supervisor: spawns the child under a fresh pseudo-terminal,
//! mirrors host terminal state, forwards signals and resizes, and shuttles
//! bytes between the host and the child.
//!
//! # Steady state
//! Three actors run in parallel until the child exits:
//! - input mover: host stdin → PTY master, through the startup response
//!   filter for the first `drain_window`;
//! - output mover: PTY master → the supplied sink (normally the redaction
//!   stream) → host stdout;
//! - signal watcher: SIGWINCH propagates the host window size; SIGINT /
//!   SIGQUIT / SIGTSTP become control bytes on the master so the child's
//!   line discipline interprets them; anything else is forwarded to the
//!   child directly.
//!
//! # Shutdown
//! Child exit is the ordinary trigger: signal handlers are uninstalled, the
//! master is closed, the output mover is drained, and the host terminal is
//! restored exactly once (RAII). Signal-death is encoded as `128 + signo`.
//!
//! # Invariants
//! - Best-effort steps (foreground pgrp, tcflush, resize propagation) log
//!   and continue; they never fail the session.
//! - The slave descriptor is closed in the parent right after spawn.

pub mod response_filter;
pub mod signals;
pub mod term;

use std::ffi::CStr;
use std::fs::File;
use std::io::{self, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel as chan;
use tracing::{debug, warn};

use self::response_filter::{ResponseFilter, DEFAULT_DRAIN_WINDOW};
use self::signals::SignalWatcher;

const TERM_FALLBACK: &str = "xterm-256color";

const CTRL_C: u8 = 0x03;
const CTRL_BACKSLASH: u8 = 0x1c;
const CTRL_Z: u8 = 0x1a;

/// Supervisor behavior knobs.
pub struct PtyOptions {
    /// Switch the host terminal to raw mode (with signals re-enabled) while
    /// the session runs.
    pub raw_mode: bool,
    /// Startup window during which terminal query responses on stdin are
    /// swallowed.
    pub drain_window: Duration,
}

impl Default for PtyOptions {
    fn default() -> Self {
        Self {
            raw_mode: true,
            drain_window: DEFAULT_DRAIN_WINDOW,
        }
    }
}

/// Runs `command` under a newly allocated PTY, proxying I/O through `output`
/// until the child exits. Returns the child's exit code (`128 + signo` for
/// signal death).
pub fn run_command<W>(mut command: Command, output: W, opts: PtyOptions) -> io::Result<i32>
where
    W: Write + Send + 'static,
{
    let stdin_fd = libc::STDIN_FILENO;
    let is_tty = term::is_tty(stdin_fd);
    debug!(stdin_is_tty = is_tty, "starting pty session");

    ensure_term_fallback(&mut command);

    let host_termios = if is_tty {
        term::get_termios(stdin_fd).ok()
    } else {
        None
    };
    let _raw_guard = if opts.raw_mode && is_tty {
        term::RawModeGuard::enable(stdin_fd)?
    } else {
        None
    };

    let (master, slave) = open_pty()?;
    if let Some(termios) = &host_termios {
        term::set_termios(slave.as_raw_fd(), termios)?;
    }
    if is_tty {
        if let Ok(ws) = term::window_size(stdin_fd) {
            term::set_window_size(master.as_raw_fd(), &ws)?;
        }
    }

    command
        .stdin(Stdio::from(slave.try_clone()?))
        .stdout(Stdio::from(slave.try_clone()?))
        .stderr(Stdio::from(slave.try_clone()?));
    unsafe {
        command.pre_exec(move || {
            if libc::setsid() < 0 {
                return Err(io::Error::last_os_error());
            }
            if is_tty && libc::ioctl(0, libc::TIOCSCTTY as _, 0) < 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }
    let mut child = command.spawn()?;
    let child_pid = child.id() as libc::pid_t;

    if is_tty {
        let pgid = unsafe { libc::getpgid(child_pid) };
        if pgid < 0 {
            debug!(error = %io::Error::last_os_error(), "getpgid failed");
        } else if let Err(err) = term::set_foreground_pgrp(slave.as_raw_fd(), pgid) {
            debug!(error = %err, "set foreground pgrp failed");
        }
        if let Err(err) = term::flush_input(slave.as_raw_fd()) {
            debug!(error = %err, "tcflush failed");
        }
    }
    drop(slave);

    let watcher = Arc::new(SignalWatcher::install(&[
        libc::SIGWINCH,
        libc::SIGINT,
        libc::SIGTERM,
        libc::SIGQUIT,
        libc::SIGTSTP,
    ])?);
    let signal_thread = {
        let watcher = Arc::clone(&watcher);
        let master = master.try_clone()?;
        thread::spawn(move || signal_loop(&watcher, &master, child_pid, is_tty))
    };

    // Detached: a blocking stdin read cannot be interrupted portably, so the
    // input mover is left to die with the process.
    {
        let master = master.try_clone()?;
        let drain_window = opts.drain_window;
        thread::Builder::new()
            .name("secretty-input".to_string())
            .spawn(move || input_loop(master, drain_window))?;
    }

    let (done_tx, done_rx) = chan::bounded::<io::Result<()>>(1);
    let output_thread = {
        let master = File::from(master.try_clone()?);
        thread::Builder::new()
            .name("secretty-output".to_string())
            .spawn(move || {
                let _ = done_tx.send(output_loop(master, output));
            })?
    };

    let status = child.wait()?;

    watcher.shutdown();
    let _ = signal_thread.join();
    drop(master);
    match done_rx.recv_timeout(Duration::from_secs(5)) {
        Ok(Err(err)) => warn!(error = %err, "output sink failed"),
        Ok(Ok(())) => {}
        Err(_) => warn!("output mover did not drain in time"),
    }
    let _ = output_thread.join();

    Ok(exit_code(status))
}

fn signal_loop(watcher: &SignalWatcher, master: &OwnedFd, child_pid: libc::pid_t, resize: bool) {
    while let Some(signo) = watcher.recv() {
        match signo {
            libc::SIGWINCH => {
                if resize {
                    propagate_winsize(libc::STDIN_FILENO, master.as_raw_fd());
                }
            }
            libc::SIGINT | libc::SIGQUIT | libc::SIGTSTP => {
                let byte = match signo {
                    libc::SIGINT => CTRL_C,
                    libc::SIGQUIT => CTRL_BACKSLASH,
                    _ => CTRL_Z,
                };
                // Best-effort: the child's line discipline turns the control
                // byte into the signal it expects.
                unsafe {
                    libc::write(
                        master.as_raw_fd(),
                        &byte as *const u8 as *const libc::c_void,
                        1,
                    );
                }
            }
            other => {
                unsafe { libc::kill(child_pid, other) };
            }
        }
    }
}

fn propagate_winsize(from_fd: RawFd, to_fd: RawFd) {
    match term::window_size(from_fd) {
        Ok(ws) => {
            if let Err(err) = term::set_window_size(to_fd, &ws) {
                debug!(error = %err, "winsize propagation failed");
            }
        }
        Err(err) => debug!(error = %err, "winsize unavailable"),
    }
}

fn output_loop<W: Write>(mut master: File, mut output: W) -> io::Result<()> {
    let mut buf = [0u8; 8192];
    loop {
        match master.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => output.write_all(&buf[..n])?,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            // EIO here is the ordinary end of a PTY session: every slave
            // descriptor is gone because the child exited.
            Err(_) => break,
        }
    }
    output.flush()
}

fn input_loop(master: OwnedFd, drain_window: Duration) {
    let mut master = File::from(master);
    let mut filter = ResponseFilter::new(drain_window);
    let mut stdin = io::stdin().lock();
    let mut buf = [0u8; 4096];
    loop {
        match stdin.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                let outgoing = if filter.active() {
                    let mut filtered = filter.filter(&buf[..n]);
                    if !filter.active() {
                        filtered.extend(filter.take_pending());
                    }
                    filtered
                } else {
                    let mut pending = filter.take_pending();
                    pending.extend_from_slice(&buf[..n]);
                    pending
                };
                if !outgoing.is_empty() && master.write_all(&outgoing).is_err() {
                    break;
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                debug!(error = %err, "stdin read failed");
                break;
            }
        }
    }
    let pending = filter.take_pending();
    if !pending.is_empty() {
        let _ = master.write_all(&pending);
    }
}

/// Allocates a PTY pair via `posix_openpt`.
fn open_pty() -> io::Result<(OwnedFd, File)> {
    let master_fd = unsafe { libc::posix_openpt(libc::O_RDWR | libc::O_NOCTTY) };
    if master_fd < 0 {
        return Err(io::Error::last_os_error());
    }
    let master = unsafe { OwnedFd::from_raw_fd(master_fd) };
    if unsafe { libc::grantpt(master.as_raw_fd()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    if unsafe { libc::unlockpt(master.as_raw_fd()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    let path = pts_path(master.as_raw_fd())?;
    let slave = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NOCTTY)
        .open(&path)?;
    Ok((master, slave))
}

#[cfg(target_os = "linux")]
fn pts_path(master_fd: RawFd) -> io::Result<PathBuf> {
    let mut name = [0 as libc::c_char; 128];
    if unsafe { libc::ptsname_r(master_fd, name.as_mut_ptr(), name.len()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    let cstr = unsafe { CStr::from_ptr(name.as_ptr()) };
    Ok(PathBuf::from(cstr.to_string_lossy().into_owned()))
}

#[cfg(not(target_os = "linux"))]
fn pts_path(master_fd: RawFd) -> io::Result<PathBuf> {
    // ptsname is not thread-safe, but PTY allocation happens once, before
    // any supervisor threads are spawned.
    let name = unsafe { libc::ptsname(master_fd) };
    if name.is_null() {
        return Err(io::Error::last_os_error());
    }
    let cstr = unsafe { CStr::from_ptr(name) };
    Ok(PathBuf::from(cstr.to_string_lossy().into_owned()))
}

/// Makes sure the child sees a usable `TERM`.
///
/// `SECRETTY_TERM` forces a value; otherwise a `TERM` with no terminfo entry
/// under any standard directory is replaced with `xterm-256color`.
fn ensure_term_fallback(command: &mut Command) {
    if let Ok(forced) = std::env::var("SECRETTY_TERM") {
        if !forced.is_empty() {
            debug!(term = %forced, "term override");
            command.env("TERM", forced);
            return;
        }
    }
    let term = std::env::var("TERM").unwrap_or_default();
    if term.is_empty() || terminfo_exists(&term) || term == TERM_FALLBACK {
        return;
    }
    debug!(term = %term, fallback = TERM_FALLBACK, "term fallback");
    command.env("TERM", TERM_FALLBACK);
}

fn terminfo_exists(term: &str) -> bool {
    let Some(first) = term.chars().next() else {
        return false;
    };
    let first = first.to_string();
    terminfo_dirs()
        .iter()
        .any(|dir| dir.join(&first).join(term).exists())
}

fn terminfo_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(terminfo) = std::env::var("TERMINFO") {
        if !terminfo.is_empty() {
            dirs.push(PathBuf::from(terminfo));
        }
    }
    if let Ok(list) = std::env::var("TERMINFO_DIRS") {
        for part in list.split(':') {
            if part.is_empty() {
                // An empty entry means the compiled-in default.
                dirs.push(PathBuf::from("/usr/share/terminfo"));
            } else {
                dirs.push(PathBuf::from(part));
            }
        }
    }
    if let Ok(home) = std::env::var("HOME") {
        dirs.push(Path::new(&home).join(".terminfo"));
    }
    for fixed in [
        "/lib/terminfo",
        "/usr/lib/terminfo",
        "/etc/terminfo",
        "/usr/share/terminfo",
        "/usr/local/share/terminfo",
        "/opt/homebrew/share/terminfo",
    ] {
        dirs.push(PathBuf::from(fixed));
    }
    dirs
}

fn exit_code(status: std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    if let Some(signo) = status.signal() {
        return 128 + signo;
    }
    1
}
