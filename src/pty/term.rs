//! Thin termios/winsize wrappers over libc.
//!
//! Everything here operates on raw file descriptors and returns
//! `io::Result`, converting the C convention (-1 + errno) at one place.

use std::io;
use std::mem::MaybeUninit;
use std::os::unix::io::RawFd;

/// Whether `fd` refers to a terminal.
pub fn is_tty(fd: RawFd) -> bool {
    unsafe { libc::isatty(fd) == 1 }
}

/// Non-destructive snapshot of the terminal settings of `fd`.
pub fn get_termios(fd: RawFd) -> io::Result<libc::termios> {
    let mut termios = MaybeUninit::<libc::termios>::uninit();
    if unsafe { libc::tcgetattr(fd, termios.as_mut_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(unsafe { termios.assume_init() })
}

/// Applies `termios` to `fd` immediately.
pub fn set_termios(fd: RawFd, termios: &libc::termios) -> io::Result<()> {
    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, termios) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Current window size of the terminal at `fd`.
pub fn window_size(fd: RawFd) -> io::Result<libc::winsize> {
    let mut ws = MaybeUninit::<libc::winsize>::uninit();
    if unsafe { libc::ioctl(fd, libc::TIOCGWINSZ as _, ws.as_mut_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(unsafe { ws.assume_init() })
}

/// Sets the window size of the terminal at `fd`.
pub fn set_window_size(fd: RawFd, ws: &libc::winsize) -> io::Result<()> {
    if unsafe { libc::ioctl(fd, libc::TIOCSWINSZ as _, ws) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Discards unread input pending on `fd`.
pub fn flush_input(fd: RawFd) -> io::Result<()> {
    if unsafe { libc::tcflush(fd, libc::TCIFLUSH) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Makes the foreground process group of the terminal at `fd` be `pgid`.
pub fn set_foreground_pgrp(fd: RawFd, pgid: libc::pid_t) -> io::Result<()> {
    if unsafe { libc::tcsetpgrp(fd, pgid) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Raw-mode guard: restores the saved terminal settings exactly once on drop.
pub struct RawModeGuard {
    fd: RawFd,
    saved: libc::termios,
}

impl RawModeGuard {
    /// Switches `fd` to raw mode with signal generation re-enabled, so
    /// Ctrl-C / Ctrl-\ / Ctrl-Z still raise SIGINT / SIGQUIT / SIGTSTP at
    /// the wrapping process.
    ///
    /// Returns `None` when `fd` is not a terminal.
    pub fn enable(fd: RawFd) -> io::Result<Option<Self>> {
        if !is_tty(fd) {
            return Ok(None);
        }
        let saved = get_termios(fd)?;
        let mut raw = saved;
        unsafe { libc::cfmakeraw(&mut raw) };
        raw.c_lflag |= libc::ISIG;
        set_termios(fd, &raw)?;
        Ok(Some(Self { fd, saved }))
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = set_termios(self.fd, &self.saved);
    }
}
