//! Error types returned by every operation on [`crate::FileSystem`].

use core::fmt;

/// Represents all the ways an operation on a [`crate::FileSystem`] can fail.
///
/// Generic over the underlying block device's own error type, the same way
/// the FAT reader this crate grew out of parameterizes its `Error<E>` over
/// the block device it wraps.
#[derive(Debug)]
pub enum Error<E>
where
    E: fmt::Debug,
{
    /// No volume is currently mounted.
    NotMounted,
    /// A volume is already mounted; call `unmount` first.
    AlreadyMounted,
    /// The block device could not be opened.
    BadDisk(E),
    /// The signature on block 0 does not read `ECS150FS`.
    BadFormat,
    /// The superblock's reported block count disagrees with the device.
    BadSize,
    /// The operation can't proceed while handles are still open.
    Busy,
    /// The supplied filename is empty or too long.
    BadName,
    /// A file with that name already exists.
    Exists,
    /// The root directory has no free slots.
    Full,
    /// No file with that name exists.
    NotFound,
    /// The open-file table has no free handles.
    NoFd,
    /// The handle is out of range or not currently open.
    BadFd,
    /// The requested offset is past the end of the file.
    BadOffset,
    /// The caller's buffer is unusable (e.g. zero capacity where data is expected).
    BadBuf,
    /// The FAT has no free blocks left to extend a chain.
    ///
    /// Never returned from `write` directly. See [`Error`] docs on partial
    /// writes. Kept as a variant so the allocator has a way to signal it
    /// internally.
    NoSpace,
    /// The block device returned an error while reading or writing a block.
    IoError(E),
}

impl<E> fmt::Display for Error<E>
where
    E: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotMounted => write!(f, "no volume is mounted"),
            Error::AlreadyMounted => write!(f, "a volume is already mounted"),
            Error::BadDisk(e) => write!(f, "could not open block device: {:?}", e),
            Error::BadFormat => write!(f, "bad signature: not an ECS150FS volume"),
            Error::BadSize => write!(f, "superblock block count does not match the device"),
            Error::Busy => write!(f, "operation not permitted while handles are open"),
            Error::BadName => write!(f, "invalid file name"),
            Error::Exists => write!(f, "file already exists"),
            Error::Full => write!(f, "root directory is full"),
            Error::NotFound => write!(f, "no such file"),
            Error::NoFd => write!(f, "too many open files"),
            Error::BadFd => write!(f, "invalid file descriptor"),
            Error::BadOffset => write!(f, "offset past end of file"),
            Error::BadBuf => write!(f, "invalid buffer"),
            Error::NoSpace => write!(f, "no free blocks left on volume"),
            Error::IoError(e) => write!(f, "block device I/O error: {:?}", e),
        }
    }
}

impl<E> std::error::Error for Error<E> where E: fmt::Debug {}

/// Emits the "diagnostic written to standard error naming the operation"
/// required by the error-handling policy, via the `log` facade so a host
/// application controls whether/where it actually surfaces.
pub(crate) fn diagnose<E: fmt::Debug>(op: &str, err: &Error<E>) {
    log::warn!("{op}: {err}");
}
