//! The error taxonomy returned by every façade operation.

use std::io;

/// Errors produced by the filesystem core.
///
/// Each variant corresponds to one of the error codes named by the on-disk
/// format's design: callers translate these into whatever the host (FUSE,
/// a test harness, ...) needs, but the core itself never retries or
/// reinterprets an error once raised.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The underlying block driver failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// A bitmap (inode or data) has no free entries left.
    #[error("no space left on device")]
    NoSpace,
    /// `mkdir`/`mknod` targeted a name that already exists in the parent.
    #[error("{0:?} already exists")]
    Exists(String),
    /// `lookup` could not resolve the final path component.
    #[error("{0:?} not found")]
    NotFound(String),
    /// An intermediate path component resolved to a regular file.
    #[error("{0:?} is not a directory")]
    NotDir(String),
    /// A regular-file operation was attempted against a directory.
    #[error("{0:?} is a directory")]
    IsDir(String),
    /// A directory removal was attempted against a non-empty directory.
    #[error("{0:?} is not empty")]
    NotEmpty(String),
    /// Malformed arguments, e.g. a path that is not absolute.
    #[error("invalid argument: {0}")]
    Inval(String),
    /// Reserved for host-level permission checks; the core never raises it itself.
    #[error("access denied")]
    Access,
    /// The requested operation is not implemented by this filesystem.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}

/// Shorthand for a `Result` returning a core [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
