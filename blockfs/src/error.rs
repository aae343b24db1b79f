//! Error kinds returned by the filesystem core.
//!
//! One variant per failure mode, no hierarchy: every fallible core operation returns
//! `FsResult<T>` and fails fast on the first error encountered.

use std::error;
use std::fmt;

/// A filesystem-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
	/// The device adapter failed to acquire its resources.
	DiskInit,
	/// The device adapter failed to read.
	DiskRead,
	/// The device adapter failed to write.
	DiskWrite,
	/// The device adapter failed to finalize.
	DiskClose,
	/// No free cluster is available, or the inode pool cannot grow.
	Full,
	/// A path component expected to be a directory is not one.
	NotADirectory,
	/// An operation expected a regular file (e.g. a link source).
	NotAFile,
	/// The path, or an entry along it, does not exist.
	NotExists,
	/// The target of a `link` already exists.
	AlreadyExists,
	/// The path is malformed: no leading `/`, a forbidden `.`/`..` final segment, or a
	/// trailing `/` on a file path.
	WrongPath,
	/// The path exceeds [`crate::MAX_PATH`].
	PathTooLong,
	/// A path segment exceeds [`crate::MAX_NAME`].
	NameTooLong,
	/// The caller-provided listing buffer is too small to hold the result.
	BufferTooSmall,
	/// The operation was attempted on a handle that has already been closed.
	FileClosed,
	/// A read was attempted at or past the end of a file, or a seek target fell outside
	/// `[0, size]`.
	Eof,
	/// The cluster allocation table led a chain walk onto a reserved tag
	/// (free or inode-cluster) in the middle of a chain: invariant 1 has been violated.
	Corrupt,
}

impl fmt::Display for FsError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let msg = match self {
			Self::DiskInit => "an error occurred while initializing the disk",
			Self::DiskRead => "an error occurred while reading from the disk",
			Self::DiskWrite => "an error occurred while writing to the disk",
			Self::DiskClose => "an error occurred while closing the disk",
			Self::Full => "file system is full",
			Self::NotADirectory => "not a directory",
			Self::NotAFile => "not a file",
			Self::NotExists => "does not exist",
			Self::AlreadyExists => "already exists",
			Self::WrongPath => "wrong path specified",
			Self::PathTooLong => "path is too long",
			Self::NameTooLong => "name is too long",
			Self::BufferTooSmall => "buffer is too small to hold the result",
			Self::FileClosed => "file is closed",
			Self::Eof => "end of file",
			Self::Corrupt => "on-disk structure is corrupt",
		};
		f.write_str(msg)
	}
}

impl error::Error for FsError {}

/// The result type returned by every fallible core operation.
pub type FsResult<T> = Result<T, FsError>;
