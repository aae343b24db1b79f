//! The block device adapter (§4.1): the only thing that ever touches real storage.
//!
//! The core never depends on which backend is plugged in; it is generic over
//! [`BlockDevice`]. Two backends ship with the crate: [`FileDevice`], which treats a host
//! file or block device node as the backing image, and [`MemDevice`], an in-memory
//! backend used throughout the test suite.

use crate::error::FsError;
use crate::error::FsResult;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;
use std::path::Path;

/// A logical byte array the filesystem core reads and writes at arbitrary offsets.
///
/// Implementors must treat `offset + buf.len() <= size_bytes` as a precondition; partial
/// reads or writes are errors, never silently truncated.
pub trait BlockDevice {
	/// Reads `buf.len()` bytes starting at `offset`.
	fn read(&mut self, offset: u64, buf: &mut [u8]) -> FsResult<()>;

	/// Writes `buf.len()` bytes starting at `offset`.
	fn write(&mut self, offset: u64, buf: &[u8]) -> FsResult<()>;

	/// Finalizes the device, releasing any resources it holds.
	fn close(&mut self) -> FsResult<()>;
}

/// A device backed by a host file: either a plain disk-image file, or a raw block
/// device node (e.g. `/dev/sdb`) opened directly.
pub struct FileDevice {
	file: File,
}

impl FileDevice {
	/// Creates a new backing file at `path`, truncating it if it already exists.
	///
	/// This is the "init" step of the injected device capability (§6) for the
	/// create-a-fresh-image path; format writes the full image afterwards.
	pub fn create(path: &Path) -> FsResult<Self> {
		let file = OpenOptions::new()
			.read(true)
			.write(true)
			.create(true)
			.truncate(true)
			.open(path)
			.map_err(|_| FsError::DiskInit)?;
		Ok(Self { file })
	}

	/// Opens an existing backing file at `path`.
	pub fn open(path: &Path) -> FsResult<Self> {
		let file = OpenOptions::new()
			.read(true)
			.write(true)
			.open(path)
			.map_err(|_| FsError::DiskInit)?;
		Ok(Self { file })
	}
}

impl BlockDevice for FileDevice {
	fn read(&mut self, offset: u64, buf: &mut [u8]) -> FsResult<()> {
		self.file
			.seek(SeekFrom::Start(offset))
			.map_err(|_| FsError::DiskRead)?;
		self.file.read_exact(buf).map_err(|_| FsError::DiskRead)
	}

	fn write(&mut self, offset: u64, buf: &[u8]) -> FsResult<()> {
		self.file
			.seek(SeekFrom::Start(offset))
			.map_err(|_| FsError::DiskWrite)?;
		self.file.write_all(buf).map_err(|_| FsError::DiskWrite)
	}

	fn close(&mut self) -> FsResult<()> {
		self.file.flush().map_err(|_| FsError::DiskClose)
	}
}

/// An in-memory device backed by a `Vec<u8>`, used by the test suite so it never has to
/// touch the real filesystem.
pub struct MemDevice {
	data: Vec<u8>,
}

impl MemDevice {
	/// Creates a zero-filled device of `size_bytes` bytes.
	pub fn new(size_bytes: usize) -> Self {
		Self {
			data: vec![0; size_bytes],
		}
	}
}

impl BlockDevice for MemDevice {
	fn read(&mut self, offset: u64, buf: &mut [u8]) -> FsResult<()> {
		let start = offset as usize;
		let end = start.checked_add(buf.len()).ok_or(FsError::DiskRead)?;
		let src = self.data.get(start..end).ok_or(FsError::DiskRead)?;
		buf.copy_from_slice(src);
		Ok(())
	}

	fn write(&mut self, offset: u64, buf: &[u8]) -> FsResult<()> {
		let start = offset as usize;
		let end = start.checked_add(buf.len()).ok_or(FsError::DiskWrite)?;
		let dst = self.data.get_mut(start..end).ok_or(FsError::DiskWrite)?;
		dst.copy_from_slice(buf);
		Ok(())
	}

	fn close(&mut self) -> FsResult<()> {
		Ok(())
	}
}
