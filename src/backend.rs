//! Platform access to the terminal: mode switching and single-byte reads.

use std::io;
use std::ops::{Deref, DerefMut};
use std::time::Duration;

use crate::error::Result;

/// What a single read attempt produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Byte(u8),
    /// A special key reported as a console scan code; see [`crate::tables::ScanCodeTable`].
    ScanCode(u16),
    /// The bounded wait elapsed without input.
    Idle,
    /// End of input; no more bytes will arrive.
    Closed,
}

/// How far the terminal leaves canonical mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RawModeKind {
    /// No line buffering and no echo, but signal keys (Ctrl-C, Ctrl-Z) still act.
    #[default]
    Cbreak,
    /// Everything delivered as bytes, including signal keys.
    Raw,
}

pub trait TerminalBackend: Send {
    /// Terminal settings captured before switching to raw mode.
    type Mode: Send;

    fn enter_raw_mode(&mut self, kind: RawModeKind) -> Result<Self::Mode>;

    fn restore_mode(&mut self, mode: &Self::Mode) -> Result<()>;

    fn read_byte(&mut self) -> io::Result<ReadOutcome>;

    /// Map a platform scan code to a key name, for backends that report them.
    fn translate_scan_code(&self, _scan_code: u16) -> Option<&'static str> {
        None
    }
}

impl<B: TerminalBackend + ?Sized> TerminalBackend for &mut B {
    type Mode = B::Mode;

    fn enter_raw_mode(&mut self, kind: RawModeKind) -> Result<B::Mode> {
        (**self).enter_raw_mode(kind)
    }

    fn restore_mode(&mut self, mode: &B::Mode) -> Result<()> {
        (**self).restore_mode(mode)
    }

    fn read_byte(&mut self) -> io::Result<ReadOutcome> {
        (**self).read_byte()
    }

    fn translate_scan_code(&self, scan_code: u16) -> Option<&'static str> {
        (**self).translate_scan_code(scan_code)
    }
}

/// Keeps the terminal in raw mode and restores the captured mode when dropped,
/// whichever way the owner exits.
pub struct RawModeGuard<B: TerminalBackend> {
    backend: B,
    mode: Option<B::Mode>,
}

impl<B: TerminalBackend> RawModeGuard<B> {
    pub fn new(mut backend: B, kind: RawModeKind) -> Result<Self> {
        let mode = backend.enter_raw_mode(kind)?;
        tracing::debug!(target: "raw_mode", ?kind, "entered raw mode");
        Ok(Self {
            backend,
            mode: Some(mode),
        })
    }

    /// Whether the captured mode is still waiting to be restored.
    pub fn is_raw(&self) -> bool {
        self.mode.is_some()
    }

    /// Restore now and report the outcome instead of logging it on drop.
    /// Later calls, and the drop, are no-ops.
    pub fn restore(&mut self) -> Result<()> {
        match self.mode.take() {
            Some(mode) => {
                let result = self.backend.restore_mode(&mode);
                tracing::debug!(target: "raw_mode", ok = result.is_ok(), "restored terminal mode");
                result
            }
            None => Ok(()),
        }
    }
}

impl<B: TerminalBackend> Deref for RawModeGuard<B> {
    type Target = B;

    fn deref(&self) -> &B {
        &self.backend
    }
}

impl<B: TerminalBackend> DerefMut for RawModeGuard<B> {
    fn deref_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

impl<B: TerminalBackend> Drop for RawModeGuard<B> {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            tracing::error!(target: "raw_mode", "Failed to restore terminal mode: {}", e);
        }
    }
}

#[cfg(unix)]
pub use self::unix::TtyBackend;

#[cfg(unix)]
mod unix {
    use std::io;
    use std::os::fd::{AsRawFd, BorrowedFd};
    use std::time::Duration;

    use nix::errno::Errno;
    use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
    use nix::sys::termios::{self, LocalFlags, SetArg, SpecialCharacterIndices, Termios};

    use super::{RawModeKind, ReadOutcome, TerminalBackend};
    use crate::error::{to_io, Error, Result};

    /// Standard input of a Unix terminal, switched with termios.
    #[derive(Debug)]
    pub struct TtyBackend {
        fd: libc::c_int,
        wake_interval: Option<Duration>,
    }

    impl TtyBackend {
        /// Attach to standard input. With `wake_interval` set, each read waits at
        /// most that long so the caller can notice shutdown without a key press.
        pub fn stdin(wake_interval: Option<Duration>) -> Result<Self> {
            let fd = io::stdin().as_raw_fd();
            if unsafe { libc::isatty(fd) } != 1 {
                return Err(Error::NotATty);
            }
            Ok(Self { fd, wake_interval })
        }

        fn borrowed_fd(&self) -> BorrowedFd<'_> {
            // stdin stays open for the life of the process.
            unsafe { BorrowedFd::borrow_raw(self.fd) }
        }

        fn wait_readable(&self, timeout: Duration) -> io::Result<bool> {
            let millis = timeout.as_millis().min(i32::MAX as u128) as i32;
            let poll_timeout = PollTimeout::try_from(millis).unwrap_or(PollTimeout::MAX);
            let mut fds = [PollFd::new(self.borrowed_fd(), PollFlags::POLLIN)];
            loop {
                match poll(&mut fds, poll_timeout) {
                    Ok(0) => return Ok(false),
                    Ok(_) => return Ok(true),
                    Err(Errno::EINTR) => {
                        tracing::warn!(
                            target: "raw_byte_reader",
                            fd = self.fd,
                            timeout_ms = millis,
                            "poll interrupted, retrying"
                        );
                    }
                    Err(errno) => return Err(to_io(errno)),
                }
            }
        }
    }

    impl TerminalBackend for TtyBackend {
        type Mode = Termios;

        fn enter_raw_mode(&mut self, kind: RawModeKind) -> Result<Termios> {
            let fd = self.borrowed_fd();
            let orig = termios::tcgetattr(fd).map_err(|e| Error::RawMode(to_io(e)))?;
            let mut raw = orig.clone();
            match kind {
                RawModeKind::Cbreak => {
                    raw.local_flags.remove(LocalFlags::ECHO | LocalFlags::ICANON);
                    raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
                    raw.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
                }
                RawModeKind::Raw => termios::cfmakeraw(&mut raw),
            }
            termios::tcsetattr(fd, SetArg::TCSANOW, &raw)
                .map_err(|e| Error::RawMode(to_io(e)))?;
            Ok(orig)
        }

        fn restore_mode(&mut self, mode: &Termios) -> Result<()> {
            termios::tcsetattr(self.borrowed_fd(), SetArg::TCSADRAIN, mode)
                .map_err(|e| Error::Restore(to_io(e)))
        }

        fn read_byte(&mut self) -> io::Result<ReadOutcome> {
            if let Some(interval) = self.wake_interval {
                if !self.wait_readable(interval)? {
                    return Ok(ReadOutcome::Idle);
                }
            }

            let mut byte = 0u8;
            loop {
                let n = unsafe { libc::read(self.fd, (&mut byte as *mut u8).cast(), 1) };
                match n {
                    1 => return Ok(ReadOutcome::Byte(byte)),
                    0 => return Ok(ReadOutcome::Closed),
                    _ => {
                        let err = io::Error::last_os_error();
                        match err.kind() {
                            io::ErrorKind::Interrupted => continue,
                            io::ErrorKind::WouldBlock => return Ok(ReadOutcome::Idle),
                            _ => return Err(err),
                        }
                    }
                }
            }
        }
    }
}

#[cfg(windows)]
pub use self::console::ConsoleBackend;

#[cfg(windows)]
mod console {
    use std::collections::VecDeque;
    use std::io;
    use std::thread;
    use std::time::{Duration, Instant};

    use crossterm::terminal;

    use super::{RawModeKind, ReadOutcome, TerminalBackend};
    use crate::error::{Error, Result};
    use crate::tables::ScanCodeTable;

    // Console input from the C runtime: wide characters, with special keys
    // announced by a 0 or 224 unit followed by their code.
    extern "C" {
        fn _getwch() -> u16;
        fn _kbhit() -> i32;
    }

    const SCAN_CODE_PREFIXES: [u16; 2] = [0, 224];
    const KBHIT_POLL: Duration = Duration::from_millis(1);

    fn key_waiting() -> bool {
        unsafe { _kbhit() != 0 }
    }

    fn next_unit() -> u16 {
        unsafe { _getwch() }
    }

    /// Windows console input, switched with crossterm and read through the C runtime.
    #[derive(Debug)]
    pub struct ConsoleBackend {
        scan_codes: ScanCodeTable,
        wake_interval: Option<Duration>,
        /// UTF-8 bytes of the last character not yet handed out.
        pending: VecDeque<u8>,
    }

    impl ConsoleBackend {
        pub fn new(wake_interval: Option<Duration>) -> Self {
            Self {
                scan_codes: ScanCodeTable::windows_console(),
                wake_interval,
                pending: VecDeque::new(),
            }
        }

        fn wait_readable(&self, timeout: Duration) -> bool {
            let deadline = Instant::now() + timeout;
            while !key_waiting() {
                if Instant::now() >= deadline {
                    return false;
                }
                thread::sleep(KBHIT_POLL);
            }
            true
        }
    }

    impl TerminalBackend for ConsoleBackend {
        /// Whether raw mode was already on before the session.
        type Mode = bool;

        fn enter_raw_mode(&mut self, _kind: RawModeKind) -> Result<bool> {
            let was_raw = terminal::is_raw_mode_enabled().map_err(Error::RawMode)?;
            terminal::enable_raw_mode().map_err(Error::RawMode)?;
            Ok(was_raw)
        }

        fn restore_mode(&mut self, was_raw: &bool) -> Result<()> {
            if *was_raw {
                return Ok(());
            }
            terminal::disable_raw_mode().map_err(Error::Restore)
        }

        fn read_byte(&mut self) -> io::Result<ReadOutcome> {
            if let Some(byte) = self.pending.pop_front() {
                return Ok(ReadOutcome::Byte(byte));
            }
            if let Some(interval) = self.wake_interval {
                if !self.wait_readable(interval) {
                    return Ok(ReadOutcome::Idle);
                }
            }

            let unit = next_unit();
            if SCAN_CODE_PREFIXES.contains(&unit) {
                let code = next_unit();
                return Ok(match (u8::try_from(unit), u8::try_from(code)) {
                    (Ok(prefix), Ok(code)) => {
                        ReadOutcome::ScanCode(ScanCodeTable::encode(prefix, code))
                    }
                    _ => ReadOutcome::Idle,
                });
            }

            let mut units = vec![unit];
            if (0xD800..0xDC00).contains(&unit) {
                units.push(next_unit());
            }
            let ch = char::decode_utf16(units)
                .next()
                .and_then(|decoded| decoded.ok())
                .unwrap_or(char::REPLACEMENT_CHARACTER);
            let mut buf = [0u8; 4];
            self.pending.extend(ch.encode_utf8(&mut buf).bytes());
            Ok(self
                .pending
                .pop_front()
                .map_or(ReadOutcome::Idle, ReadOutcome::Byte))
        }

        fn translate_scan_code(&self, scan_code: u16) -> Option<&'static str> {
            self.scan_codes.get(scan_code)
        }
    }
}

/// The backend for the platform this crate was built for, reading standard input.
#[cfg(unix)]
pub fn default_backend(wake_interval: Option<Duration>) -> Result<TtyBackend> {
    TtyBackend::stdin(wake_interval)
}

#[cfg(windows)]
pub fn default_backend(wake_interval: Option<Duration>) -> Result<ConsoleBackend> {
    Ok(ConsoleBackend::new(wake_interval))
}

/// Placeholder backend for platforms without terminal support; it cannot be constructed.
#[cfg(not(any(unix, windows)))]
#[derive(Debug)]
pub enum UnsupportedBackend {}

#[cfg(not(any(unix, windows)))]
impl TerminalBackend for UnsupportedBackend {
    type Mode = ();

    fn enter_raw_mode(&mut self, _kind: RawModeKind) -> Result<()> {
        match *self {}
    }

    fn restore_mode(&mut self, _mode: &()) -> Result<()> {
        match *self {}
    }

    fn read_byte(&mut self) -> io::Result<ReadOutcome> {
        match *self {}
    }
}

#[cfg(not(any(unix, windows)))]
pub fn default_backend(_wake_interval: Option<Duration>) -> Result<UnsupportedBackend> {
    Err(crate::error::Error::UnsupportedPlatform)
}
