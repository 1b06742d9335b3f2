//! Errors reported by the filesystem operations.

use std::fmt;
use std::process::exit;

/// An error returned by a filesystem operation.
///
/// Each variant maps to one standard errno value, reported negative at the
/// mount boundary.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Error {
    /// A path component is absent.
    NotFound,
    /// A non-final path component, or an operation requiring a directory,
    /// found a regular file.
    NotDirectory,
    /// A file-only operation targeted a directory.
    IsDirectory,
    /// A create-like operation found the destination already present.
    Exists,
    /// The directory still holds valid entries.
    NotEmpty,
    /// No free inode, data block or directory slot.
    NoSpace,
    /// Bad mode, overlong name, cross-directory rename, non-zero truncate
    /// length or a write past the end of file.
    InvalidArgument,
}

impl Error {
    /// Returns the negative errno value for the mount boundary.
    pub fn errno(self) -> i32 {
        let errno = match self {
            Self::NotFound => libc::ENOENT,
            Self::NotDirectory => libc::ENOTDIR,
            Self::IsDirectory => libc::EISDIR,
            Self::Exists => libc::EEXIST,
            Self::NotEmpty => libc::ENOTEMPTY,
            Self::NoSpace => libc::ENOSPC,
            Self::InvalidArgument => libc::EINVAL,
        };
        -errno
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::NotFound => "no such file or directory",
            Self::NotDirectory => "not a directory",
            Self::IsDirectory => "is a directory",
            Self::Exists => "file exists",
            Self::NotEmpty => "directory not empty",
            Self::NoSpace => "no space left on device",
            Self::InvalidArgument => "invalid argument",
        };
        write!(fmt, "{msg}")
    }
}

impl std::error::Error for Error {}

/// Reports an unrecoverable device error to stderr, then exits.
///
/// Metadata updates are whole-block writes with no rollback, so a failed
/// device access must not be survived.
pub(crate) fn fatal<M: fmt::Display>(msg: M) -> ! {
    eprintln!("nanofs: fatal: {msg}");
    exit(1);
}
