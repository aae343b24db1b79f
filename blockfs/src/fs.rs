//! Filesystem lifecycle (§4.7): formatting a fresh image, mounting an existing one, and
//! the aggregate `info()` query.

use crate::device::BlockDevice;
use crate::error::FsError;
use crate::error::FsResult;
use crate::layout::decode_cat_entry;
use crate::layout::CatEntry;
use crate::layout::Inode;
use crate::layout::NodeKind;
use crate::layout::Superblock;
use crate::layout::CAT_INVALID;
use crate::layout::INODES_PER_CLUSTER;
use crate::layout::SECTOR_SIZE;
use crate::layout::SUPERBLOCK_SIZE;
use crate::time::Clock;
use crate::time::SystemClock;
use utils::util::ceil_division;

/// The mounted filesystem: an injected [`BlockDevice`] and [`Clock`], the superblock
/// read off (or written to) byte 0, and the single scratch sector non-recursive
/// operations share (§4.2, §9).
pub struct Filesystem<D: BlockDevice, C: Clock = SystemClock> {
	pub(crate) device: D,
	pub(crate) clock: C,
	pub(crate) superblock: Superblock,
	pub(crate) buffer: [u8; SECTOR_SIZE],
}

/// Aggregate statistics returned by [`Filesystem::info`] (`fs_info`).
#[derive(Debug, Clone, Copy)]
pub struct Info {
	pub sectors: u32,
	pub clusters: u32,
	pub table_sectors: u32,
	pub free_clusters: u32,
	pub node_clusters: u32,
	pub data_clusters: u32,
	pub nodes: u32,
	pub allocated_nodes: u32,
	pub files_size: u64,
	pub dir_structures_size: u64,
	pub nodes_size: u64,
	pub used_space: u64,
	pub free_space: u64,
	pub total_size: u64,
	pub usable_space: u64,
}

impl<D: BlockDevice> Filesystem<D, SystemClock> {
	/// Formats `device` as a fresh, empty filesystem of `size_bytes`, using the host
	/// system clock to stamp the root directory.
	pub fn format(device: D, size_bytes: u64) -> FsResult<Self> {
		Self::format_with_clock(device, size_bytes, SystemClock)
	}

	/// Mounts an existing filesystem image, using the host system clock.
	pub fn mount(device: D) -> FsResult<Self> {
		Self::mount_with_clock(device, SystemClock)
	}
}

impl<D: BlockDevice, C: Clock> Filesystem<D, C> {
	/// Formats `device` as a fresh, empty filesystem of `size_bytes` (§4.7).
	///
	/// Sectors: `sectors = size_bytes / S`. CAT size: `table_count = ceil(sectors*4 / S)`.
	/// The rest of the image, minus the superblock sector, is cluster space:
	/// `clusters_count = sectors - 1 - table_count`.
	pub fn format_with_clock(mut device: D, size_bytes: u64, clock: C) -> FsResult<Self> {
		let sectors_count = (size_bytes / SECTOR_SIZE as u64) as u32;
		let table_count = ceil_division(sectors_count as u64 * 4, SECTOR_SIZE as u64) as u32;
		if sectors_count < 2 + table_count {
			return Err(FsError::Full);
		}
		let clusters_count = sectors_count - 1 - table_count;
		let table_start = 1;
		let clusters_start = table_start + table_count;

		let zero = [0u8; SECTOR_SIZE];
		for sector in 0..sectors_count as u64 {
			device.write(sector * SECTOR_SIZE as u64, &zero)?;
		}
		let tail = size_bytes % SECTOR_SIZE as u64;
		if tail > 0 {
			device.write(sectors_count as u64 * SECTOR_SIZE as u64, &zero[..tail as usize])?;
		}

		let superblock = Superblock {
			sectors_count,
			root_node: 0,
			table_start,
			table_count,
			clusters_start,
			clusters_count,
		};
		let mut fs = Self {
			device,
			clock,
			superblock,
			buffer: [0u8; SECTOR_SIZE],
		};

		let root_id = fs.alloc_inode(&Inode::new(NodeKind::Dir, CAT_INVALID, fs.clock.now()))?;
		let root_cluster = fs.init_dir_cluster(root_id, root_id)?;
		let mut root_inode = fs.read_inode(root_id)?;
		root_inode.first_cluster = root_cluster;
		root_inode.size = SECTOR_SIZE as u32;
		root_inode.links_count = 2;
		fs.write_inode(root_id, &root_inode)?;

		fs.superblock.root_node = root_id;
		fs.device.write(0, &fs.superblock.encode())?;
		Ok(fs)
	}

	/// Mounts an existing filesystem image, reading its superblock from byte 0.
	pub fn mount_with_clock(mut device: D, clock: C) -> FsResult<Self> {
		let mut buf = [0u8; SUPERBLOCK_SIZE];
		device.read(0, &mut buf)?;
		let superblock = Superblock::decode(&buf);
		Ok(Self {
			device,
			clock,
			superblock,
			buffer: [0u8; SECTOR_SIZE],
		})
	}

	/// Releases the underlying device. Nothing is buffered, so there is nothing to flush
	/// beyond what the device adapter itself does on close.
	pub fn unmount(mut self) -> FsResult<()> {
		self.device.close()
	}

	/// Reclaims the underlying device without closing it, e.g. to hand it to a fresh
	/// `mount_with_clock` call.
	pub fn into_device(self) -> D {
		self.device
	}

	/// Computes aggregate usage statistics by scanning the whole CAT once, reading the
	/// contents of every inode cluster along the way (§4.7).
	pub fn info(&mut self) -> FsResult<Info> {
		let entries_per_sector = (SECTOR_SIZE / 4) as u32;
		let mut cached_sector = u32::MAX;
		let mut free_clusters = 0u32;
		let mut node_clusters = 0u32;
		let mut data_clusters = 0u32;
		let mut nodes = 0u32;
		let mut files_size = 0u64;
		let mut dir_structures_size = 0u64;

		let mut cluster = 0u32;
		while cluster < self.superblock.clusters_count {
			let sector = cluster / entries_per_sector;
			if sector != cached_sector {
				let offset = (self.superblock.table_start as u64 + sector as u64) * SECTOR_SIZE as u64;
				self.device.read(offset, &mut self.buffer)?;
				cached_sector = sector;
			}
			let idx = (cluster % entries_per_sector) as usize * 4;
			let raw = u32::from_le_bytes(self.buffer[idx..idx + 4].try_into().unwrap());
			match decode_cat_entry(raw) {
				CatEntry::Free => free_clusters += 1,
				CatEntry::Eoc | CatEntry::Link(_) => data_clusters += 1,
				CatEntry::InodeCluster(pop) => {
					node_clusters += 1;
					nodes += pop as u32;
					self.read_cluster(cluster)?;
					for slot in 0..INODES_PER_CLUSTER {
						let off = slot * crate::layout::INODE_SIZE;
						let raw: [u8; crate::layout::INODE_SIZE] =
							self.buffer[off..off + crate::layout::INODE_SIZE].try_into().unwrap();
						let inode = Inode::decode(&raw);
						if !inode.in_use {
							continue;
						}
						match inode.kind {
							NodeKind::File => files_size += inode.size as u64,
							NodeKind::Dir => dir_structures_size += inode.size as u64,
						}
					}
					// the inode-cluster read above clobbered the cached CAT sector
					cached_sector = u32::MAX;
				}
			}
			cluster += 1;
		}

		let allocated_nodes = node_clusters * INODES_PER_CLUSTER as u32;
		let nodes_size = node_clusters as u64 * SECTOR_SIZE as u64;
		let total_size = self.superblock.sectors_count as u64 * SECTOR_SIZE as u64;
		let usable_space = self.superblock.clusters_count as u64 * SECTOR_SIZE as u64;
		let free_space = free_clusters as u64 * SECTOR_SIZE as u64;
		let used_space = usable_space - free_space;

		Ok(Info {
			sectors: self.superblock.sectors_count,
			clusters: self.superblock.clusters_count,
			table_sectors: self.superblock.table_count,
			free_clusters,
			node_clusters,
			data_clusters,
			nodes,
			allocated_nodes,
			files_size,
			dir_structures_size,
			nodes_size,
			used_space,
			free_space,
			total_size,
			usable_space,
		})
	}
}
