//! Self-pipe signal watcher.
//!
//! Handlers write the signal number into a non-blocking pipe; a watcher
//! thread drains the read end and dispatches. This keeps the async-signal
//! context down to a single `write` and gives the supervisor a plain
//! blocking-read loop to service signals on.
//!
//! Only one watcher may be installed per process at a time.

use std::io;
use std::os::unix::io::{FromRawFd, OwnedFd, RawFd};
use std::sync::atomic::{AtomicI32, Ordering};

/// Write end of the active self-pipe; -1 when no watcher is installed.
static PIPE_WRITE_FD: AtomicI32 = AtomicI32::new(-1);

extern "C" fn forward_to_pipe(signo: libc::c_int) {
    let fd = PIPE_WRITE_FD.load(Ordering::Relaxed);
    if fd >= 0 {
        let byte = signo as u8;
        // Best-effort: a full pipe drops the signal, matching kernel
        // coalescing semantics for pending signals.
        unsafe {
            libc::write(fd, &byte as *const u8 as *const libc::c_void, 1);
        }
    }
}

/// Installed signal watcher; uninstalls handlers and closes the pipe on drop.
pub struct SignalWatcher {
    read_fd: OwnedFd,
    signals: Vec<libc::c_int>,
}

impl SignalWatcher {
    /// Installs handlers for `signals` and returns the watcher.
    pub fn install(signals: &[libc::c_int]) -> io::Result<Self> {
        let mut fds = [0 as libc::c_int; 2];
        if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        let (read_fd, write_fd) = (fds[0], fds[1]);
        set_cloexec(read_fd)?;
        set_cloexec(write_fd)?;
        set_nonblocking(write_fd)?;
        PIPE_WRITE_FD.store(write_fd, Ordering::SeqCst);

        for &signo in signals {
            let mut action: libc::sigaction = unsafe { std::mem::zeroed() };
            action.sa_sigaction = forward_to_pipe as usize;
            action.sa_flags = libc::SA_RESTART;
            unsafe {
                libc::sigemptyset(&mut action.sa_mask);
                if libc::sigaction(signo, &action, std::ptr::null_mut()) != 0 {
                    let err = io::Error::last_os_error();
                    PIPE_WRITE_FD.store(-1, Ordering::SeqCst);
                    libc::close(read_fd);
                    libc::close(write_fd);
                    return Err(err);
                }
            }
        }

        Ok(Self {
            read_fd: unsafe { OwnedFd::from_raw_fd(read_fd) },
            signals: signals.to_vec(),
        })
    }

    /// Blocks until a signal arrives; `None` once the watcher is shut down.
    pub fn recv(&self) -> Option<libc::c_int> {
        let mut byte = 0u8;
        loop {
            let n = unsafe {
                libc::read(
                    raw(&self.read_fd),
                    &mut byte as *mut u8 as *mut libc::c_void,
                    1,
                )
            };
            match n {
                1 => return Some(libc::c_int::from(byte)),
                0 => return None,
                _ => {
                    let err = io::Error::last_os_error();
                    if err.kind() == io::ErrorKind::Interrupted {
                        continue;
                    }
                    return None;
                }
            }
        }
    }

    /// Restores default dispositions and closes the write end, unblocking
    /// any thread parked in [`SignalWatcher::recv`].
    pub fn shutdown(&self) {
        for &signo in &self.signals {
            let mut action: libc::sigaction = unsafe { std::mem::zeroed() };
            action.sa_sigaction = libc::SIG_DFL;
            unsafe {
                libc::sigemptyset(&mut action.sa_mask);
                libc::sigaction(signo, &action, std::ptr::null_mut());
            }
        }
        let write_fd = PIPE_WRITE_FD.swap(-1, Ordering::SeqCst);
        if write_fd >= 0 {
            unsafe { libc::close(write_fd) };
        }
    }
}

impl Drop for SignalWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn raw(fd: &OwnedFd) -> RawFd {
    use std::os::unix::io::AsRawFd;
    fd.as_raw_fd()
}

fn set_cloexec(fd: RawFd) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags < 0 || unsafe { libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 || unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
