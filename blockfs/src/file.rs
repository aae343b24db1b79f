//! The file I/O state machine (§4.6): open/read/write/seek/discard/close over a
//! cluster chain, each step a small number of direct sub-sector device operations.
//!
//! A handle caches its inode's `size` and `first_cluster` in RAM for its whole
//! lifetime; the on-disk inode is only brought up to date in [`Filesystem::close`]
//! (§9, Open Question 2). A file always owns at least one cluster from creation
//! onward, so `first_cluster` never reverts to a sentinel once a handle is open.

use crate::device::BlockDevice;
use crate::error::FsError;
use crate::error::FsResult;
use crate::fs::Filesystem;
use crate::layout::SECTOR_SIZE;
use crate::time::Clock;

/// How [`Filesystem::open`] should treat a missing or pre-existing target.
///
/// Exactly the two independent bits the public API exposes: `CREATE` (bit 0) and
/// `APPEND` (bit 1). There is no separate truncate bit — `create` on a file that
/// already exists truncates it in place, keeping its first cluster.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenFlags {
	/// Create the file if missing; truncate it in place if it already exists.
	pub create: bool,
	/// Position the handle at end-of-file on open.
	pub append: bool,
}

impl OpenFlags {
	/// Open for reading an existing file; fails with [`FsError::NotExists`] if absent.
	pub fn read() -> Self {
		Self::default()
	}

	/// Create the file if missing; truncate it to empty (keeping its first cluster)
	/// if it already exists.
	pub fn create() -> Self {
		Self {
			create: true,
			..Self::default()
		}
	}

	/// Open for appending, creating the file if missing. Does not truncate an
	/// existing file.
	pub fn append() -> Self {
		Self {
			append: true,
			..Self::default()
		}
	}

	/// Create if missing (truncating if not), positioned for appending.
	pub fn create_append() -> Self {
		Self {
			create: true,
			append: true,
		}
	}
}

/// Where a [`Filesystem::seek`] measures its offset from.
///
/// `End` is a legacy quirk kept on purpose (§9): a positive `count` moves the
/// cursor *backwards* from the end (`pos = size - count`), not forwards past it.
#[derive(Debug, Clone, Copy)]
pub enum SeekMode {
	Begin(u64),
	Current(i64),
	End(u64),
}

/// A handle to an open file: a cursor over one inode's cluster chain, with the
/// inode's `size`/`first_cluster` cached for the handle's lifetime.
#[derive(Debug)]
pub struct FileHandle {
	inode_id: u32,
	position: u64,
	size: u32,
	first_cluster: u32,
	dirty: bool,
	closed: bool,
}

impl FileHandle {
	/// The current read/write cursor.
	pub fn position(&self) -> u64 {
		self.position
	}

	/// The handle's cached view of the file's length; authoritative until `close`.
	pub fn size(&self) -> u32 {
		self.size
	}

	/// Whether [`Filesystem::close`] has already consumed this handle.
	pub fn is_closed(&self) -> bool {
		self.closed
	}
}

impl<D: BlockDevice, C: Clock> Filesystem<D, C> {
	/// Opens the file at `path`, applying `flags` (`fs_file_open`).
	pub fn open(&mut self, path: &str, flags: OpenFlags) -> FsResult<FileHandle> {
		let (parent_id, name) = self.resolve_parent(path)?;
		let parent_inode = self.read_inode(parent_id)?;
		if !parent_inode.is_dir() {
			return Err(FsError::NotADirectory);
		}

		let id = match self.lookup_in_dir(parent_id, &name)? {
			Some(id) => {
				let inode = self.read_inode(id)?;
				if !inode.is_file() {
					return Err(FsError::NotAFile);
				}
				if flags.create {
					self.truncate_file(id)?;
				}
				id
			}
			None => {
				if !flags.create {
					return Err(FsError::NotExists);
				}
				self.create_file(parent_id, &name)?
			}
		};

		let inode = self.read_inode(id)?;
		let position = if flags.append { inode.size as u64 } else { 0 };
		Ok(FileHandle {
			inode_id: id,
			position,
			size: inode.size,
			first_cluster: inode.first_cluster,
			dirty: false,
			closed: false,
		})
	}

	/// Frees every cluster after the first and resets the on-disk size to zero. The
	/// first cluster is always kept — a file never drops to zero clusters (§4.6).
	pub(crate) fn truncate_file(&mut self, id: u32) -> FsResult<()> {
		let mut inode = self.read_inode(id)?;
		self.truncate_chain_after(inode.first_cluster)?;
		inode.size = 0;
		self.write_inode(id, &inode)
	}

	fn read_bytes(&mut self, first_cluster: u32, start: u64, buf: &mut [u8]) -> FsResult<()> {
		let mut pos = start;
		let mut written = 0;
		while written < buf.len() {
			let cluster_idx = (pos / SECTOR_SIZE as u64) as u32;
			let in_cluster = (pos % SECTOR_SIZE as u64) as usize;
			let cluster = self.chain_nth(first_cluster, cluster_idx)?;
			let chunk = (SECTOR_SIZE - in_cluster).min(buf.len() - written);
			let offset = self.cluster_offset(cluster) + in_cluster as u64;
			self.device.read(offset, &mut buf[written..written + chunk])?;
			written += chunk;
			pos += chunk as u64;
		}
		Ok(())
	}

	fn write_bytes(&mut self, first_cluster: u32, start: u64, data: &[u8]) -> FsResult<()> {
		let mut pos = start;
		let mut consumed = 0;
		while consumed < data.len() {
			let cluster_idx = (pos / SECTOR_SIZE as u64) as u32;
			let in_cluster = (pos % SECTOR_SIZE as u64) as usize;
			let cluster = self.chain_nth(first_cluster, cluster_idx)?;
			let chunk = (SECTOR_SIZE - in_cluster).min(data.len() - consumed);
			let offset = self.cluster_offset(cluster) + in_cluster as u64;
			self.device.write(offset, &data[consumed..consumed + chunk])?;
			consumed += chunk;
			pos += chunk as u64;
		}
		Ok(())
	}

	/// Reads up to `buf.len()` bytes at the handle's current position, returning the
	/// number of bytes actually read. `Eof` if the cursor is already at end-of-file.
	pub fn read(&mut self, handle: &mut FileHandle, buf: &mut [u8]) -> FsResult<usize> {
		if handle.closed {
			return Err(FsError::FileClosed);
		}
		if buf.is_empty() {
			return Ok(0);
		}
		if handle.position >= handle.size as u64 {
			return Err(FsError::Eof);
		}
		let available = handle.size as u64 - handle.position;
		let to_read = buf.len().min(available as usize);
		self.read_bytes(handle.first_cluster, handle.position, &mut buf[..to_read])?;
		handle.position += to_read as u64;
		Ok(to_read)
	}

	/// Writes `data` at the handle's current position, extending the chain as needed,
	/// and advances the cursor past what was written (`fs_file_write`).
	pub fn write(&mut self, handle: &mut FileHandle, data: &[u8]) -> FsResult<usize> {
		if handle.closed {
			return Err(FsError::FileClosed);
		}
		if data.is_empty() {
			return Ok(0);
		}

		let start = handle.position;
		let end = start + data.len() as u64;
		let have_clusters = (((handle.size as u64) + SECTOR_SIZE as u64 - 1) / SECTOR_SIZE as u64).max(1) as u32;
		let needed_clusters = ((end + SECTOR_SIZE as u64 - 1) / SECTOR_SIZE as u64).max(1) as u32;
		if needed_clusters > have_clusters {
			let mut tail = self.chain_nth(handle.first_cluster, have_clusters - 1)?;
			for _ in have_clusters..needed_clusters {
				tail = self.extend_chain(tail)?;
			}
		}

		self.write_bytes(handle.first_cluster, start, data)?;
		if end > handle.size as u64 {
			handle.size = end as u32;
		}
		handle.position = end;
		handle.dirty = true;
		Ok(data.len())
	}

	/// Moves the handle's cursor (`fs_file_seek`). `Eof` if the target falls outside
	/// `[0, size]`. `End` measures backwards from the end of the file: `End(count)`
	/// seeks to `size - count`, a legacy quirk kept on purpose (§9).
	pub fn seek(&mut self, handle: &mut FileHandle, mode: SeekMode) -> FsResult<u64> {
		if handle.closed {
			return Err(FsError::FileClosed);
		}
		let size = handle.size as i64;
		let target = match mode {
			SeekMode::Begin(n) => n as i64,
			SeekMode::Current(delta) => handle.position as i64 + delta,
			SeekMode::End(count) => size - count as i64,
		};
		if target < 0 || target > size {
			return Err(FsError::Eof);
		}
		handle.position = target as u64;
		Ok(handle.position)
	}

	/// Truncates the file to the handle's current position, freeing every cluster past
	/// it, but never the first cluster (`fs_file_discard`).
	pub fn discard(&mut self, handle: &mut FileHandle) -> FsResult<()> {
		if handle.closed {
			return Err(FsError::FileClosed);
		}
		let pos = handle.position;
		if (pos as u32) < handle.size {
			let keep_clusters = ((pos + SECTOR_SIZE as u64 - 1) / SECTOR_SIZE as u64).max(1) as u32;
			let tail = self.chain_nth(handle.first_cluster, keep_clusters - 1)?;
			self.truncate_chain_after(tail)?;
		}
		handle.size = pos as u32;
		handle.dirty = true;
		Ok(())
	}

	/// Closes a handle, writing its cached `size`/`first_cluster`/`mtime` back to the
	/// on-disk inode if anything changed since it was opened.
	pub fn close(&mut self, mut handle: FileHandle) -> FsResult<()> {
		if handle.dirty {
			let mut inode = self.read_inode(handle.inode_id)?;
			inode.size = handle.size;
			inode.first_cluster = handle.first_cluster;
			inode.mtime = self.clock.now();
			self.write_inode(handle.inode_id, &inode)?;
		}
		handle.closed = true;
		Ok(())
	}
}
