//! End-to-end scenarios over an in-memory device, exercising format geometry, directory
//! nesting, file I/O, hard links, and recursive removal together (§8).

use blockfs::device::MemDevice;
use blockfs::time::FixedClock;
use blockfs::Filesystem;
use blockfs::OpenFlags;
use blockfs::SeekMode;
use blockfs::SECTOR_SIZE;

fn fresh(size_bytes: usize) -> Filesystem<MemDevice, FixedClock> {
	let device = MemDevice::new(size_bytes);
	Filesystem::format_with_clock(device, size_bytes as u64, FixedClock(1_000)).unwrap()
}

#[test]
fn format_geometry_matches_reference_layout() {
	let mut fs = fresh(16384);
	let info = fs.info().unwrap();
	assert_eq!(info.sectors, 128);
	assert_eq!(info.table_sectors, 4);
	assert_eq!(info.clusters, 123);
	// the root directory occupies exactly one inode slot and one data cluster
	assert_eq!(info.nodes, 1);
	assert_eq!(info.node_clusters, 1);
	assert_eq!(info.data_clusters, 1);
	assert_eq!(info.free_clusters, info.clusters - 1);
}

#[test]
fn mkdir_nests_and_tracks_link_counts() {
	let mut fs = fresh(16384);
	fs.mkdir("/a").unwrap();
	fs.mkdir("/a/b").unwrap();
	fs.mkdir("/a/b/c").unwrap();

	let root_info = fs.entry_info("/").unwrap();
	// '.' + parent entry + one child subdirectory's '..'
	assert_eq!(root_info.links_count, 3);

	let a_info = fs.entry_info("/a").unwrap();
	assert_eq!(a_info.links_count, 3);

	let c_info = fs.entry_info("/a/b/c").unwrap();
	assert_eq!(c_info.links_count, 2);

	let listing = fs.list("/a").unwrap();
	assert_eq!(listing.len(), 1);
	assert_eq!(listing[0].name, "b");
}

#[test]
fn paths_without_a_leading_slash_are_rejected() {
	let mut fs = fresh(16384);
	assert_eq!(fs.mkdir("a/b").unwrap_err(), blockfs::FsError::WrongPath);
	assert_eq!(fs.remove("/").unwrap_err(), blockfs::FsError::WrongPath);
}

#[test]
fn mkdir_is_idempotent_and_creates_missing_parents() {
	let mut fs = fresh(16384);
	fs.mkdir("/a").unwrap();
	// re-creating an existing directory path is a no-op, not an error
	fs.mkdir("/a").unwrap();
	// missing intermediate components are created along the way (mkdir -p)
	fs.mkdir("/missing/a/b").unwrap();
	assert!(fs.entry_info("/missing").unwrap().kind.is_dir());
	assert!(fs.entry_info("/missing/a").unwrap().kind.is_dir());
	assert!(fs.entry_info("/missing/a/b").unwrap().kind.is_dir());

	let mut handle = fs.open("/a/file", OpenFlags::create()).unwrap();
	fs.close(handle).unwrap();
	handle = fs.open("/a/file", OpenFlags::read()).unwrap();
	fs.close(handle).unwrap();
	assert_eq!(fs.mkdir("/a/file").unwrap_err(), blockfs::FsError::AlreadyExists);
}

#[test]
fn write_reopen_and_read_round_trips_across_clusters() {
	let mut fs = fresh(16384);
	let payload = vec![0x5Au8; 555];

	let mut handle = fs.open("/data", OpenFlags::create()).unwrap();
	let written = fs.write(&mut handle, &payload).unwrap();
	assert_eq!(written, payload.len());
	fs.close(handle).unwrap();

	let info = fs.entry_info("/data").unwrap();
	assert_eq!(info.size as usize, payload.len());
	let expected_clusters = (payload.len() + SECTOR_SIZE - 1) / SECTOR_SIZE;
	assert_eq!(expected_clusters, 5);

	let mut handle = fs.open("/data", OpenFlags::read()).unwrap();
	let mut buf = vec![0u8; payload.len()];
	let read = fs.read(&mut handle, &mut buf).unwrap();
	assert_eq!(read, payload.len());
	assert_eq!(buf, payload);
	assert_eq!(
		fs.read(&mut handle, &mut [0u8; 1]).unwrap_err(),
		blockfs::FsError::Eof
	);
	fs.close(handle).unwrap();
}

#[test]
fn create_truncate_then_append_interplay() {
	let mut fs = fresh(16384);

	let mut handle = fs.open("/log", OpenFlags::create()).unwrap();
	fs.write(&mut handle, b"first-version-of-the-file").unwrap();
	fs.close(handle).unwrap();

	let mut handle = fs.open("/log", OpenFlags::create()).unwrap();
	assert_eq!(fs.entry_info("/log").unwrap().size, 0);
	fs.write(&mut handle, b"short").unwrap();
	fs.close(handle).unwrap();

	let mut handle = fs.open("/log", OpenFlags::append()).unwrap();
	assert_eq!(handle.position(), 5);
	fs.write(&mut handle, b"-appended").unwrap();
	fs.close(handle).unwrap();

	let mut handle = fs.open("/log", OpenFlags::read()).unwrap();
	let mut buf = Vec::new();
	buf.resize(fs.entry_info("/log").unwrap().size as usize, 0);
	fs.read(&mut handle, &mut buf).unwrap();
	assert_eq!(&buf, b"short-appended");
	fs.close(handle).unwrap();
}

#[test]
fn hard_link_survives_removal_of_the_original_name() {
	let mut fs = fresh(16384);
	let mut handle = fs.open("/orig", OpenFlags::create()).unwrap();
	fs.write(&mut handle, b"payload").unwrap();
	fs.close(handle).unwrap();

	fs.link("/orig", "/alias").unwrap();
	assert_eq!(fs.entry_info("/orig").unwrap().links_count, 2);

	fs.remove("/orig").unwrap();
	assert_eq!(fs.entry_info("/alias").unwrap().links_count, 1);
	let mut handle = fs.open("/alias", OpenFlags::read()).unwrap();
	let mut buf = [0u8; 7];
	fs.read(&mut handle, &mut buf).unwrap();
	assert_eq!(&buf, b"payload");
	fs.close(handle).unwrap();

	let before = fs.info().unwrap().free_clusters;
	fs.remove("/alias").unwrap();
	let after = fs.info().unwrap().free_clusters;
	assert_eq!(after, before + 1);
	assert_eq!(fs.entry_info("/alias").unwrap_err(), blockfs::FsError::NotExists);
}

#[test]
fn seek_discard_then_eof_on_read() {
	let mut fs = fresh(16384);
	let payload = vec![0x11u8; SECTOR_SIZE * 3];
	let mut handle = fs.open("/blob", OpenFlags::create()).unwrap();
	fs.write(&mut handle, &payload).unwrap();

	fs.seek(&mut handle, SeekMode::Begin(200)).unwrap();
	fs.discard(&mut handle).unwrap();
	fs.close(handle).unwrap();

	assert_eq!(fs.entry_info("/blob").unwrap().size, 200);

	let mut handle = fs.open("/blob", OpenFlags::read()).unwrap();
	// `End` seeks backwards from the end: `End(0)` lands exactly on size.
	assert_eq!(fs.seek(&mut handle, SeekMode::End(0)).unwrap(), 200);
	fs.seek(&mut handle, SeekMode::Begin(200)).unwrap();
	let mut buf = [0u8; 1];
	assert_eq!(
		fs.read(&mut handle, &mut buf).unwrap_err(),
		blockfs::FsError::Eof
	);
	assert_eq!(
		fs.seek(&mut handle, SeekMode::Begin(201)).unwrap_err(),
		blockfs::FsError::Eof
	);
	fs.close(handle).unwrap();
}

#[test]
fn recursive_remove_frees_every_descendant_cluster() {
	let mut fs = fresh(16384);
	fs.mkdir("/tree").unwrap();
	fs.mkdir("/tree/a").unwrap();
	fs.mkdir("/tree/b").unwrap();
	let mut handle = fs.open("/tree/a/file", OpenFlags::create()).unwrap();
	fs.write(&mut handle, &vec![1u8; SECTOR_SIZE * 2]).unwrap();
	fs.close(handle).unwrap();

	let before = fs.info().unwrap().free_clusters;
	fs.remove("/tree").unwrap();
	let after = fs.info().unwrap().free_clusters;
	assert!(after > before);
	assert_eq!(fs.entry_info("/tree").unwrap_err(), blockfs::FsError::NotExists);
}

#[test]
fn recursive_size_sums_directory_subtree() {
	let mut fs = fresh(16384);
	fs.mkdir("/dir").unwrap();
	let mut handle = fs.open("/dir/f1", OpenFlags::create()).unwrap();
	fs.write(&mut handle, &vec![0u8; 10]).unwrap();
	fs.close(handle).unwrap();
	let mut handle = fs.open("/dir/f2", OpenFlags::create()).unwrap();
	fs.write(&mut handle, &vec![0u8; 20]).unwrap();
	fs.close(handle).unwrap();

	let total = fs.size("/dir").unwrap();
	assert_eq!(total, 10 + 20);
}

#[test]
fn mount_reads_back_a_formatted_image() {
	let device = MemDevice::new(16384);
	let mut fs = Filesystem::format_with_clock(device, 16384, FixedClock(42)).unwrap();
	fs.mkdir("/persisted").unwrap();
	let device = fs.into_device();

	let mut remounted = Filesystem::mount_with_clock(device, FixedClock(42)).unwrap();
	let listing = remounted.list("/").unwrap();
	assert_eq!(listing.len(), 1);
	assert_eq!(listing[0].name, "persisted");
}
