//! The directory layer (§4.5): chained clusters of fixed-width name/inode references,
//! plus path resolution built on top of them.
//!
//! Directory-entry slots are read and written one at a time through direct sub-sector
//! I/O, the same discipline used for CAT entries and inode slots (§4.3/§4.4); the shared
//! scratch buffer is reserved for whole-cluster work (zeroing a freshly allocated
//! cluster, the CAT-sector scans in `cat.rs`/`inode.rs`). Recursive directory walks
//! (`free_dir_tree`, `node_size`) never touch either: each stack frame reads its cluster
//! into a buffer of its own, per §9.

use crate::device::BlockDevice;
use crate::error::FsError;
use crate::error::FsResult;
use crate::fs::Filesystem;
use crate::layout::CatEntry;
use crate::layout::DirEntry;
use crate::layout::Inode;
use crate::layout::NodeKind;
use crate::layout::CAT_INVALID;
use crate::layout::DIRENT_SIZE;
use crate::layout::DIR_SLOTS_PER_CLUSTER;
use crate::layout::MAX_NAME;
use crate::layout::MAX_PATH;
use crate::layout::SECTOR_SIZE;
use crate::time::Clock;

/// Metadata returned by [`Filesystem::entry_info`].
#[derive(Debug, Clone, Copy)]
pub struct EntryInfo {
	pub kind: NodeKind,
	pub size: u32,
	pub links_count: u16,
	pub mtime: u32,
}

/// One row of a [`Filesystem::list`] result.
#[derive(Debug, Clone)]
pub struct DirListEntry {
	pub name: String,
	pub kind: NodeKind,
	pub inode_id: u32,
}

impl<D: BlockDevice, C: Clock> Filesystem<D, C> {
	fn dir_slot_offset(&self, cluster: u32, slot: u8) -> u64 {
		self.cluster_offset(cluster) + slot as u64 * DIRENT_SIZE as u64
	}

	fn read_dir_slot(&mut self, cluster: u32, slot: u8) -> FsResult<DirEntry> {
		let mut buf = [0u8; DIRENT_SIZE];
		self.device.read(self.dir_slot_offset(cluster, slot), &mut buf)?;
		Ok(DirEntry::decode(&buf))
	}

	fn write_dir_slot(&mut self, cluster: u32, slot: u8, entry: &DirEntry) -> FsResult<()> {
		self.device.write(self.dir_slot_offset(cluster, slot), &entry.encode())
	}

	/// Splits and validates a path (§4.5): must start with `/`, fit in [`MAX_PATH`], have
	/// no empty interior segment, no segment over [`MAX_NAME`], and not end in `.`/`..`.
	/// A single trailing `/` is tolerated and dropped.
	fn split_path(path: &str) -> FsResult<Vec<&[u8]>> {
		let bytes = path.as_bytes();
		if bytes.len() > MAX_PATH {
			return Err(FsError::PathTooLong);
		}
		if bytes.first() != Some(&b'/') {
			return Err(FsError::WrongPath);
		}
		let mut body = &bytes[1..];
		if body.len() > 1 && body.last() == Some(&b'/') {
			body = &body[..body.len() - 1];
		}
		if body.is_empty() {
			return Ok(Vec::new());
		}
		let mut segments = Vec::new();
		for segment in body.split(|&b| b == b'/') {
			if segment.is_empty() {
				return Err(FsError::WrongPath);
			}
			if segment.len() > MAX_NAME {
				return Err(FsError::NameTooLong);
			}
			segments.push(segment);
		}
		if matches!(segments.last(), Some(&b".") | Some(&b"..")) {
			return Err(FsError::WrongPath);
		}
		Ok(segments)
	}

	/// Looks up `name` directly inside the directory identified by `dir_id`.
	pub(crate) fn lookup_in_dir(&mut self, dir_id: u32, name: &[u8]) -> FsResult<Option<u32>> {
		let dir_inode = self.read_inode(dir_id)?;
		if !dir_inode.is_dir() {
			return Err(FsError::NotADirectory);
		}
		let mut cluster = dir_inode.first_cluster;
		loop {
			for slot in 0..DIR_SLOTS_PER_CLUSTER as u8 {
				let entry = self.read_dir_slot(cluster, slot)?;
				if !entry.is_empty() && entry.name_str() == name {
					return Ok(Some(entry.inode_id));
				}
			}
			match self.read_cat_entry(cluster)? {
				CatEntry::Eoc => return Ok(None),
				CatEntry::Link(next) => cluster = next,
				_ => return Err(FsError::Corrupt),
			}
		}
	}

	/// Resolves an absolute path to the inode id it names.
	pub(crate) fn resolve(&mut self, path: &str) -> FsResult<u32> {
		let segments = Self::split_path(path)?;
		let mut current = self.superblock.root_node;
		for segment in segments {
			current = self.lookup_in_dir(current, segment)?.ok_or(FsError::NotExists)?;
		}
		Ok(current)
	}

	/// Resolves the parent directory and final component name of a path, without
	/// requiring the final component itself to exist.
	pub(crate) fn resolve_parent(&mut self, path: &str) -> FsResult<(u32, Vec<u8>)> {
		let mut segments = Self::split_path(path)?;
		let name = segments.pop().ok_or(FsError::WrongPath)?.to_vec();
		let mut current = self.superblock.root_node;
		for segment in segments {
			current = self.lookup_in_dir(current, segment)?.ok_or(FsError::NotExists)?;
		}
		Ok((current, name))
	}

	/// Inserts `(name, new_id)` into the first empty slot of `dir_id`'s chain, extending
	/// the chain with a freshly zeroed cluster if every existing slot is occupied.
	pub(crate) fn add_entry(&mut self, dir_id: u32, name: &[u8], new_id: u32) -> FsResult<()> {
		let dir_inode = self.read_inode(dir_id)?;
		let mut cluster = dir_inode.first_cluster;
		loop {
			for slot in 0..DIR_SLOTS_PER_CLUSTER as u8 {
				let entry = self.read_dir_slot(cluster, slot)?;
				if entry.is_empty() {
					return self.write_dir_slot(cluster, slot, &DirEntry::named(name, new_id));
				}
			}
			match self.read_cat_entry(cluster)? {
				CatEntry::Eoc => {
					let new_cluster = self.extend_chain(cluster)?;
					self.buffer = [0u8; SECTOR_SIZE];
					self.write_cluster(new_cluster)?;
					let mut dir_inode = self.read_inode(dir_id)?;
					dir_inode.size += SECTOR_SIZE as u32;
					self.write_inode(dir_id, &dir_inode)?;
					return self.write_dir_slot(new_cluster, 0, &DirEntry::named(name, new_id));
				}
				CatEntry::Link(next) => cluster = next,
				_ => return Err(FsError::Corrupt),
			}
		}
	}

	/// Clears the slot naming `name` inside `dir_id`. Leaves a hole; directory clusters
	/// are never compacted (§4.5).
	pub(crate) fn remove_entry(&mut self, dir_id: u32, name: &[u8]) -> FsResult<()> {
		let dir_inode = self.read_inode(dir_id)?;
		let mut cluster = dir_inode.first_cluster;
		loop {
			for slot in 0..DIR_SLOTS_PER_CLUSTER as u8 {
				let entry = self.read_dir_slot(cluster, slot)?;
				if !entry.is_empty() && entry.name_str() == name {
					return self.write_dir_slot(cluster, slot, &DirEntry::empty());
				}
			}
			match self.read_cat_entry(cluster)? {
				CatEntry::Eoc => return Err(FsError::NotExists),
				CatEntry::Link(next) => cluster = next,
				_ => return Err(FsError::Corrupt),
			}
		}
	}

	/// Creates a new, empty directory cluster holding only `.` and `..`.
	pub(crate) fn init_dir_cluster(&mut self, self_id: u32, parent_id: u32) -> FsResult<u32> {
		let cluster = self.find_free_cluster()?;
		self.write_cat_entry(cluster, CatEntry::Eoc)?;
		self.buffer = [0u8; SECTOR_SIZE];
		self.write_cluster(cluster)?;
		self.write_dir_slot(cluster, 0, &DirEntry::named(b".", self_id))?;
		self.write_dir_slot(cluster, 1, &DirEntry::named(b"..", parent_id))?;
		Ok(cluster)
	}

	/// Creates one inode for `segment` inside the directory `parent_id`, formats its
	/// first cluster with `.`/`..`, links it in, and bumps the parent's link count.
	fn create_dir_child(&mut self, parent_id: u32, segment: &[u8]) -> FsResult<u32> {
		let mtime = self.clock.now();
		let placeholder = Inode::new(NodeKind::Dir, CAT_INVALID, mtime);
		let new_id = self.alloc_inode(&placeholder)?;
		let cluster = self.init_dir_cluster(new_id, parent_id)?;

		let mut new_inode = self.read_inode(new_id)?;
		new_inode.first_cluster = cluster;
		new_inode.size = SECTOR_SIZE as u32;
		new_inode.links_count = 2;
		self.write_inode(new_id, &new_inode)?;

		self.add_entry(parent_id, segment, new_id)?;
		let mut parent_inode = self.read_inode(parent_id)?;
		parent_inode.links_count += 1;
		self.write_inode(parent_id, &parent_inode)?;
		Ok(new_id)
	}

	/// Creates a directory at `path`, creating any missing intermediate components along
	/// the way (§4.5). Components that already exist are traversed unchanged, so
	/// re-creating an existing path is idempotent; a path component occupied by a file
	/// fails with `NotADirectory`, and a final component occupied by a file fails with
	/// `AlreadyExists`.
	pub fn mkdir(&mut self, path: &str) -> FsResult<()> {
		let segments = Self::split_path(path)?;
		if segments.is_empty() {
			return Err(FsError::WrongPath);
		}
		let mut current = self.superblock.root_node;
		for segment in segments {
			let current_inode = self.read_inode(current)?;
			if !current_inode.is_dir() {
				return Err(FsError::NotADirectory);
			}
			current = match self.lookup_in_dir(current, segment)? {
				Some(id) => id,
				None => self.create_dir_child(current, segment)?,
			};
		}
		if !self.read_inode(current)?.is_dir() {
			return Err(FsError::AlreadyExists);
		}
		Ok(())
	}

	/// Adds a second name for an existing file (§4.5). Directories cannot be hard-linked.
	pub fn link(&mut self, existing_path: &str, new_path: &str) -> FsResult<()> {
		let target_id = self.resolve(existing_path)?;
		let target_inode = self.read_inode(target_id)?;
		if !target_inode.is_file() {
			return Err(FsError::NotAFile);
		}

		let (parent_id, name) = self.resolve_parent(new_path)?;
		let parent_inode = self.read_inode(parent_id)?;
		if !parent_inode.is_dir() {
			return Err(FsError::NotADirectory);
		}
		if self.lookup_in_dir(parent_id, &name)?.is_some() {
			return Err(FsError::AlreadyExists);
		}

		self.add_entry(parent_id, &name, target_id)?;
		let mut target_inode = target_inode;
		target_inode.links_count += 1;
		self.write_inode(target_id, &target_inode)
	}

	/// Unlinks a file inode: drops its link count, freeing its chain and slot once the
	/// last name referencing it is gone.
	pub(crate) fn unlink_leaf(&mut self, inode_id: u32) -> FsResult<()> {
		let mut inode = self.read_inode(inode_id)?;
		if inode.links_count > 1 {
			inode.links_count -= 1;
			return self.write_inode(inode_id, &inode);
		}
		self.free_chain(inode.first_cluster)?;
		self.free_inode(inode_id)
	}

	/// Frees a directory's own cluster chain and every descendant, recursively. Each
	/// recursion level reads its directory cluster into a buffer local to that stack
	/// frame, never the shared scratch buffer (§9).
	fn free_dir_tree(&mut self, dir_id: u32) -> FsResult<()> {
		let inode = self.read_inode(dir_id)?;
		let mut buf = [0u8; SECTOR_SIZE];
		let mut cluster = inode.first_cluster;
		loop {
			self.read_cluster_into(cluster, &mut buf)?;
			for slot in 0..DIR_SLOTS_PER_CLUSTER {
				let off = slot * DIRENT_SIZE;
				let raw: [u8; DIRENT_SIZE] = buf[off..off + DIRENT_SIZE].try_into().unwrap();
				let entry = DirEntry::decode(&raw);
				if entry.is_empty() {
					continue;
				}
				let name = entry.name_str();
				if name == b"." || name == b".." {
					continue;
				}
				let child_inode = self.read_inode(entry.inode_id)?;
				if child_inode.is_dir() {
					self.free_dir_tree(entry.inode_id)?;
				} else {
					self.unlink_leaf(entry.inode_id)?;
				}
			}
			match self.read_cat_entry(cluster)? {
				CatEntry::Eoc => break,
				CatEntry::Link(next) => cluster = next,
				_ => return Err(FsError::Corrupt),
			}
		}
		self.free_chain(inode.first_cluster)?;
		self.free_inode(dir_id)
	}

	/// Removes the file or directory at `path`. Directories are removed recursively,
	/// along with everything inside them (§4.5, §4.8).
	pub fn remove(&mut self, path: &str) -> FsResult<()> {
		let (parent_id, name) = self.resolve_parent(path)?;
		let parent_inode = self.read_inode(parent_id)?;
		if !parent_inode.is_dir() {
			return Err(FsError::NotADirectory);
		}
		let target_id = self.lookup_in_dir(parent_id, &name)?.ok_or(FsError::NotExists)?;
		let target_inode = self.read_inode(target_id)?;

		self.remove_entry(parent_id, &name)?;
		if target_inode.is_dir() {
			self.free_dir_tree(target_id)?;
			let mut parent_inode = self.read_inode(parent_id)?;
			parent_inode.links_count -= 1;
			self.write_inode(parent_id, &parent_inode)?;
		} else {
			self.unlink_leaf(target_id)?;
		}
		Ok(())
	}

	/// Lists the direct children of the directory at `path` (§4.5, `fs_dir_list`).
	pub fn list(&mut self, path: &str) -> FsResult<Vec<DirListEntry>> {
		let dir_id = self.resolve(path)?;
		let dir_inode = self.read_inode(dir_id)?;
		if !dir_inode.is_dir() {
			return Err(FsError::NotADirectory);
		}
		let mut out = Vec::new();
		let mut cluster = dir_inode.first_cluster;
		loop {
			for slot in 0..DIR_SLOTS_PER_CLUSTER as u8 {
				let entry = self.read_dir_slot(cluster, slot)?;
				if entry.is_empty() {
					continue;
				}
				let child = self.read_inode(entry.inode_id)?;
				out.push(DirListEntry {
					name: String::from_utf8_lossy(entry.name_str()).into_owned(),
					kind: child.kind,
					inode_id: entry.inode_id,
				});
			}
			match self.read_cat_entry(cluster)? {
				CatEntry::Eoc => return Ok(out),
				CatEntry::Link(next) => cluster = next,
				_ => return Err(FsError::Corrupt),
			}
		}
	}

	/// Counts the direct children of the directory at `path` (`fs_dir_entries_count`).
	pub fn entries_count(&mut self, path: &str) -> FsResult<u32> {
		Ok(self.list(path)?.len() as u32)
	}

	/// Returns metadata for the file or directory at `path` (`fs_entry_info`).
	pub fn entry_info(&mut self, path: &str) -> FsResult<EntryInfo> {
		let id = self.resolve(path)?;
		let inode = self.read_inode(id)?;
		Ok(EntryInfo {
			kind: inode.kind,
			size: inode.size,
			links_count: inode.links_count,
			mtime: inode.mtime,
		})
	}

	fn node_size(&mut self, id: u32) -> FsResult<u64> {
		let inode = self.read_inode(id)?;
		if inode.is_file() {
			return Ok(inode.size as u64);
		}
		let mut total = 0u64;
		let mut buf = [0u8; SECTOR_SIZE];
		let mut cluster = inode.first_cluster;
		loop {
			self.read_cluster_into(cluster, &mut buf)?;
			for slot in 0..DIR_SLOTS_PER_CLUSTER {
				let off = slot * DIRENT_SIZE;
				let raw: [u8; DIRENT_SIZE] = buf[off..off + DIRENT_SIZE].try_into().unwrap();
				let entry = DirEntry::decode(&raw);
				if entry.is_empty() {
					continue;
				}
				let name = entry.name_str();
				if name == b"." || name == b".." {
					continue;
				}
				total += self.node_size(entry.inode_id)?;
			}
			match self.read_cat_entry(cluster)? {
				CatEntry::Eoc => break,
				CatEntry::Link(next) => cluster = next,
				_ => return Err(FsError::Corrupt),
			}
		}
		Ok(total)
	}

	/// Returns the total size in bytes of the file or directory subtree at `path`
	/// (`fs_size`): a file's own size, or the recursive sum of every entry other than
	/// `.`/`..` inside a directory (the directory's own chain size is not counted).
	pub fn size(&mut self, path: &str) -> FsResult<u64> {
		let id = self.resolve(path)?;
		self.node_size(id)
	}

	/// Creates an empty file inode named by `(parent_id, name)` and links it in. A file
	/// always owns at least one cluster, allocated here, even while empty (§4.6) — there
	/// is no "no cluster yet" state for a file the way there transiently is for an
	/// in-construction directory inode.
	pub(crate) fn create_file(&mut self, parent_id: u32, name: &[u8]) -> FsResult<u32> {
		let cluster = self.find_free_cluster()?;
		self.write_cat_entry(cluster, CatEntry::Eoc)?;
		let mtime = self.clock.now();
		let mut inode = Inode::new(NodeKind::File, cluster, mtime);
		inode.links_count = 1;
		let id = self.alloc_inode(&inode)?;
		self.add_entry(parent_id, name, id)?;
		Ok(id)
	}
}
