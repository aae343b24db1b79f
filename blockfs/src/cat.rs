//! Cluster Allocation Table operations (§4.3): the central index structure, maintained
//! one 32-bit entry per data cluster.

use crate::device::BlockDevice;
use crate::error::FsError;
use crate::error::FsResult;
use crate::fs::Filesystem;
use crate::layout::decode_cat_entry;
use crate::layout::encode_cat_entry;
use crate::layout::CatEntry;
use crate::layout::SECTOR_SIZE;
use crate::time::Clock;

impl<D: BlockDevice, C: Clock> Filesystem<D, C> {
	/// Byte offset of cluster `cluster` in the cluster region.
	pub(crate) fn cluster_offset(&self, cluster: u32) -> u64 {
		(self.superblock.clusters_start as u64 + cluster as u64) * SECTOR_SIZE as u64
	}

	/// Byte offset of the CAT entry for `cluster`.
	fn cat_entry_offset(&self, cluster: u32) -> u64 {
		self.superblock.table_start as u64 * SECTOR_SIZE as u64 + cluster as u64 * 4
	}

	/// Reads one whole cluster into the shared scratch buffer.
	pub(crate) fn read_cluster(&mut self, cluster: u32) -> FsResult<()> {
		let offset = self.cluster_offset(cluster);
		self.device.read(offset, &mut self.buffer)
	}

	/// Writes the shared scratch buffer back to one whole cluster.
	pub(crate) fn write_cluster(&mut self, cluster: u32) -> FsResult<()> {
		let offset = self.cluster_offset(cluster);
		self.device.write(offset, &self.buffer)
	}

	/// Reads one whole cluster into a caller-supplied buffer, bypassing the shared
	/// scratch buffer. Used exclusively by the recursive directory walks (§9), which must
	/// not disturb a buffer a caller further up the stack still relies on.
	pub(crate) fn read_cluster_into(&mut self, cluster: u32, buf: &mut [u8; SECTOR_SIZE]) -> FsResult<()> {
		let offset = self.cluster_offset(cluster);
		self.device.read(offset, buf)
	}

	/// Reads a CAT sector into the shared scratch buffer.
	fn read_cat_sector(&mut self, sector: u32) -> FsResult<()> {
		let offset = (self.superblock.table_start as u64 + sector as u64) * SECTOR_SIZE as u64;
		self.device.read(offset, &mut self.buffer)
	}

	/// Reads a single CAT entry via direct sub-sector I/O (§4.3).
	pub(crate) fn read_cat_entry(&mut self, cluster: u32) -> FsResult<CatEntry> {
		let mut raw = [0u8; 4];
		self.device.read(self.cat_entry_offset(cluster), &mut raw)?;
		Ok(decode_cat_entry(u32::from_le_bytes(raw)))
	}

	/// Writes a single CAT entry via direct sub-sector I/O (§4.3).
	pub(crate) fn write_cat_entry(&mut self, cluster: u32, entry: CatEntry) -> FsResult<()> {
		let raw = encode_cat_entry(entry).to_le_bytes();
		self.device.write(self.cat_entry_offset(cluster), &raw)
	}

	/// Linear first-fit scan for a free cluster, caching the CAT sector currently under
	/// the scan so that crossing within one sector costs no extra read.
	pub(crate) fn find_free_cluster(&mut self) -> FsResult<u32> {
		let entries_per_sector = (SECTOR_SIZE / 4) as u32;
		let mut cached_sector = u32::MAX;
		for cluster in 0..self.superblock.clusters_count {
			let sector = cluster / entries_per_sector;
			if sector != cached_sector {
				self.read_cat_sector(sector)?;
				cached_sector = sector;
			}
			let idx = (cluster % entries_per_sector) as usize * 4;
			let raw = u32::from_le_bytes(self.buffer[idx..idx + 4].try_into().unwrap());
			if decode_cat_entry(raw) == CatEntry::Free {
				return Ok(cluster);
			}
		}
		Err(FsError::Full)
	}

	/// Allocates a free cluster, links it after `tail` (whose CAT entry must currently be
	/// `Eoc`), and marks the new cluster as the chain's new end.
	pub(crate) fn extend_chain(&mut self, tail: u32) -> FsResult<u32> {
		let next = self.find_free_cluster()?;
		self.write_cat_entry(next, CatEntry::Eoc)?;
		self.write_cat_entry(tail, CatEntry::Link(next))?;
		Ok(next)
	}

	/// Walks a chain from `first`, freeing every cluster along the way. A no-op when
	/// `first` is [`crate::layout::CAT_INVALID`], the marker an inode uses for "no
	/// cluster allocated yet".
	pub(crate) fn free_chain(&mut self, first: u32) -> FsResult<()> {
		if first == crate::layout::CAT_INVALID {
			return Ok(());
		}
		let mut cur = first;
		loop {
			let entry = self.read_cat_entry(cur)?;
			self.write_cat_entry(cur, CatEntry::Free)?;
			match entry {
				CatEntry::Eoc => return Ok(()),
				CatEntry::Link(next) => cur = next,
				_ => return Err(FsError::Corrupt),
			}
		}
	}

	/// Walks `hops` links forward from `first`, returning the cluster reached.
	/// `Eof` if the chain ends before `hops` is exhausted.
	pub(crate) fn chain_nth(&mut self, first: u32, hops: u32) -> FsResult<u32> {
		let mut cur = first;
		for _ in 0..hops {
			match self.read_cat_entry(cur)? {
				CatEntry::Link(next) => cur = next,
				CatEntry::Eoc => return Err(FsError::Eof),
				_ => return Err(FsError::Corrupt),
			}
		}
		Ok(cur)
	}

	/// Frees every cluster in a chain starting *after* `from` (inclusive), relinking `from`
	/// itself to end-of-chain. Used by truncation and `file_discard`.
	pub(crate) fn truncate_chain_after(&mut self, from: u32) -> FsResult<()> {
		let next = self.read_cat_entry(from)?;
		self.write_cat_entry(from, CatEntry::Eoc)?;
		match next {
			CatEntry::Eoc => Ok(()),
			CatEntry::Link(next) => self.free_chain(next),
			_ => Err(FsError::Corrupt),
		}
	}
}
