//! `blockfs-shell <image-file> [size-in-bytes]`
//!
//! Mounts `<image-file>` if it already exists; otherwise formats a fresh image there,
//! `size-in-bytes` large (1 MiB by default), and mounts that.

mod shell;

use blockfs::device::FileDevice;
use blockfs::Filesystem;
use std::path::Path;
use std::path::PathBuf;

const DEFAULT_IMAGE_SIZE: u64 = 1024 * 1024;

fn main() {
	let (bin, mut args) = utils::args();

	let image_path = match args.next() {
		Some(path) => PathBuf::from(path),
		None => utils::error(&bin, "usage: blockfs-shell <image-file> [size-in-bytes]"),
	};
	let size_bytes = match args.next() {
		Some(arg) => arg
			.to_str()
			.and_then(|s| s.parse().ok())
			.unwrap_or_else(|| utils::error(&bin, "size must be a byte count")),
		None => DEFAULT_IMAGE_SIZE,
	};

	let fs = if Path::new(&image_path).exists() {
		let device = FileDevice::open(&image_path).unwrap_or_else(|e| utils::error(&bin, e));
		Filesystem::mount(device).unwrap_or_else(|e| utils::error(&bin, e))
	} else {
		let device = FileDevice::create(&image_path).unwrap_or_else(|e| utils::error(&bin, e));
		Filesystem::format(device, size_bytes).unwrap_or_else(|e| utils::error(&bin, e))
	};

	shell::Shell::new(fs).run();
}
