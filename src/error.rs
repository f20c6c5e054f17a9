use std::io;

/// Failures that can stop a listening session from starting or end it early.
///
/// Decoding never produces an error: unrecognized input degrades to a bare
/// `ESC` or literal-character event instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("raw keyboard input is not supported on this platform")]
    UnsupportedPlatform,

    #[error("unsupported terminal type {0:?}")]
    UnsupportedTerminal(String),

    #[error("standard input is not a terminal")]
    NotATty,

    #[error("failed to switch the terminal into raw mode")]
    RawMode(#[source] io::Error),

    #[error("failed to restore the terminal mode")]
    Restore(#[source] io::Error),

    #[error("failed to read from the terminal")]
    Read(#[source] io::Error),

    #[error("failed to spawn a listener thread")]
    Spawn(#[source] io::Error),

    #[error("the {0} thread panicked")]
    ThreadPanicked(&'static str),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(unix)]
pub(crate) fn to_io(err: nix::Error) -> io::Error {
    err.into()
}
