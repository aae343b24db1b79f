//! The inode pool (§4.4): fixed-size file/directory descriptors packed eight to a
//! cluster, the cluster itself tagged in the CAT with how many of its slots are in use.

use crate::device::BlockDevice;
use crate::error::FsError;
use crate::error::FsResult;
use crate::fs::Filesystem;
use crate::layout::inode_id;
use crate::layout::split_inode_id;
use crate::layout::CatEntry;
use crate::layout::Inode;
use crate::layout::INODES_PER_CLUSTER;
use crate::layout::INODE_SIZE;
use crate::layout::SECTOR_SIZE;
use crate::time::Clock;

impl<D: BlockDevice, C: Clock> Filesystem<D, C> {
	fn inode_slot_offset(&self, cluster: u32, slot: u8) -> u64 {
		self.cluster_offset(cluster) + slot as u64 * INODE_SIZE as u64
	}

	/// Reads the inode identified by `id` via direct sub-sector I/O.
	pub(crate) fn read_inode(&mut self, id: u32) -> FsResult<Inode> {
		let (cluster, slot) = split_inode_id(id);
		let mut buf = [0u8; INODE_SIZE];
		self.device.read(self.inode_slot_offset(cluster, slot), &mut buf)?;
		Ok(Inode::decode(&buf))
	}

	/// Writes `inode` into the slot identified by `id` via direct sub-sector I/O.
	pub(crate) fn write_inode(&mut self, id: u32, inode: &Inode) -> FsResult<()> {
		let (cluster, slot) = split_inode_id(id);
		self.device.write(self.inode_slot_offset(cluster, slot), &inode.encode())
	}

	/// Finds an inode cluster with a free slot, scanning the CAT with the same
	/// sector-caching discipline as [`Filesystem::find_free_cluster`].
	fn find_inode_cluster_with_room(&mut self) -> FsResult<Option<u32>> {
		let entries_per_sector = (SECTOR_SIZE / 4) as u32;
		let mut cached_sector = u32::MAX;
		for cluster in 0..self.superblock.clusters_count {
			let sector = cluster / entries_per_sector;
			if sector != cached_sector {
				let offset = (self.superblock.table_start as u64 + sector as u64) * SECTOR_SIZE as u64;
				self.device.read(offset, &mut self.buffer)?;
				cached_sector = sector;
			}
			let idx = (cluster % entries_per_sector) as usize * 4;
			let raw = u32::from_le_bytes(self.buffer[idx..idx + 4].try_into().unwrap());
			if let CatEntry::InodeCluster(pop) = crate::layout::decode_cat_entry(raw) {
				if (pop as usize) < INODES_PER_CLUSTER {
					return Ok(Some(cluster));
				}
			}
		}
		Ok(None)
	}

	/// Finds the first free (not-in-use) slot in an inode cluster.
	fn find_free_slot(&mut self, cluster: u32) -> FsResult<u8> {
		for slot in 0..INODES_PER_CLUSTER as u8 {
			let mut buf = [0u8; INODE_SIZE];
			self.device.read(self.inode_slot_offset(cluster, slot), &mut buf)?;
			if !Inode::decode(&buf).in_use {
				return Ok(slot);
			}
		}
		Err(FsError::Corrupt)
	}

	/// Allocates a slot for `inode`, writes it, and returns its inode id (§4.4).
	///
	/// Reuses a slot in an existing inode cluster that has room before allocating a new
	/// inode cluster, so the pool only grows when every existing inode cluster is full.
	pub(crate) fn alloc_inode(&mut self, inode: &Inode) -> FsResult<u32> {
		if let Some(cluster) = self.find_inode_cluster_with_room()? {
			let slot = self.find_free_slot(cluster)?;
			let pop = match self.read_cat_entry(cluster)? {
				CatEntry::InodeCluster(pop) => pop,
				_ => return Err(FsError::Corrupt),
			};
			self.write_cat_entry(cluster, CatEntry::InodeCluster(pop + 1))?;
			let id = inode_id(cluster, slot);
			self.write_inode(id, inode)?;
			return Ok(id);
		}

		let cluster = self.find_free_cluster()?;
		self.buffer = [0u8; SECTOR_SIZE];
		self.write_cluster(cluster)?;
		self.write_cat_entry(cluster, CatEntry::InodeCluster(1))?;
		let id = inode_id(cluster, 0);
		self.write_inode(id, inode)?;
		Ok(id)
	}

	/// Clears the slot identified by `id` and drops the inode cluster's population count,
	/// freeing the cluster itself once its last slot empties out.
	pub(crate) fn free_inode(&mut self, id: u32) -> FsResult<()> {
		let (cluster, _) = split_inode_id(id);
		let empty = Inode {
			in_use: false,
			kind: crate::layout::NodeKind::File,
			links_count: 0,
			size: 0,
			first_cluster: 0,
			mtime: 0,
		};
		self.write_inode(id, &empty)?;
		match self.read_cat_entry(cluster)? {
			CatEntry::InodeCluster(pop) if pop > 0 => {
				if pop == 1 {
					self.write_cat_entry(cluster, CatEntry::Free)
				} else {
					self.write_cat_entry(cluster, CatEntry::InodeCluster(pop - 1))
				}
			}
			_ => Err(FsError::Corrupt),
		}
	}
}
