//! The interactive command loop: a thin line-oriented front end over [`blockfs`]'s
//! public API, modeled on the reference FAT-node shell's command set (cp, mv, mkdir,
//! touch, ln, rm, import, export, edit, cat, ls, cd, pwd, exp, trunc, fsinfo).

use blockfs::device::FileDevice;
use blockfs::time::SystemClock;
use blockfs::DirListEntry;
use blockfs::Filesystem;
use blockfs::FsError;
use blockfs::OpenFlags;
use blockfs::SeekMode;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use utils::util::ByteSize;

/// Joins `cwd` and an argument the way the original shell's `absolute_path` did: a
/// leading `/` in `input` makes it absolute already, otherwise it's appended to `cwd`
/// verbatim. `.`/`..` segments are left in place; the core resolves them through the
/// literal `.`/`..` entries every directory carries.
fn absolute_path(cwd: &str, input: &str) -> String {
	if input.starts_with('/') {
		input.to_string()
	} else if cwd == "/" {
		format!("/{input}")
	} else {
		format!("{cwd}/{input}")
	}
}

pub struct Shell {
	fs: Filesystem<FileDevice, SystemClock>,
	cwd: String,
}

impl Shell {
	pub fn new(fs: Filesystem<FileDevice, SystemClock>) -> Self {
		Self {
			fs,
			cwd: String::from("/"),
		}
	}

	/// Runs the read-eval-print loop until `exit` or end-of-input.
	pub fn run(mut self) {
		loop {
			let line = match utils::prompt::prompt(Some(&format!("{}> ", self.cwd)), false) {
				Some(line) => line,
				None => break,
			};
			let args: Vec<&str> = line.split_whitespace().collect();
			let Some(&cmd) = args.first() else {
				continue;
			};
			if cmd == "exit" {
				break;
			}
			if let Err(err) = self.dispatch(cmd, &args[1..]) {
				eprintln!("error: {err}");
			}
		}
		if let Err(err) = self.fs.unmount() {
			eprintln!("error unmounting: {err}");
		}
	}

	fn dispatch(&mut self, cmd: &str, args: &[&str]) -> Result<(), FsError> {
		match cmd {
			"ls" => self.cmd_ls(args),
			"cd" => self.cmd_cd(args),
			"pwd" => {
				println!("{}", self.cwd);
				Ok(())
			}
			"mkdir" => self.cmd_mkdir(args),
			"touch" => self.cmd_touch(args),
			"ln" => self.cmd_ln(args),
			"rm" => self.cmd_rm(args),
			"cp" => self.cmd_cp(args),
			"mv" => self.cmd_mv(args),
			"cat" => self.cmd_cat(args),
			"import" => self.cmd_import(args),
			"export" => self.cmd_export(args),
			"edit" => self.cmd_edit(args),
			"trunc" => self.cmd_trunc(args),
			"exp" => self.cmd_exp(args),
			"fsinfo" => self.cmd_fsinfo(),
			"help" => {
				print_help();
				Ok(())
			}
			_ => {
				eprintln!("unknown command: {cmd}");
				Ok(())
			}
		}
	}

	fn cmd_ls(&mut self, args: &[&str]) -> Result<(), FsError> {
		let path = absolute_path(&self.cwd, args.first().copied().unwrap_or("."));
		let mut entries: Vec<DirListEntry> = self.fs.list(&path)?;
		entries.sort_by(|a, b| a.name.cmp(&b.name));
		for entry in entries {
			if entry.kind.is_dir() {
				println!("{}/", entry.name);
			} else {
				println!("{}", entry.name);
			}
		}
		Ok(())
	}

	fn cmd_cd(&mut self, args: &[&str]) -> Result<(), FsError> {
		let Some(target) = args.first() else {
			return Ok(());
		};
		let path = absolute_path(&self.cwd, target);
		let info = self.fs.entry_info(&path)?;
		if !info.kind.is_dir() {
			return Err(FsError::NotADirectory);
		}
		self.cwd = path;
		Ok(())
	}

	fn cmd_mkdir(&mut self, args: &[&str]) -> Result<(), FsError> {
		let Some(target) = args.first() else {
			return Ok(());
		};
		self.fs.mkdir(&absolute_path(&self.cwd, target))
	}

	fn cmd_touch(&mut self, args: &[&str]) -> Result<(), FsError> {
		let Some(target) = args.first() else {
			return Ok(());
		};
		let handle = self.fs.open(&absolute_path(&self.cwd, target), OpenFlags::create())?;
		self.fs.close(handle)
	}

	fn cmd_ln(&mut self, args: &[&str]) -> Result<(), FsError> {
		let (Some(existing), Some(new)) = (args.first(), args.get(1)) else {
			eprintln!("usage: ln <existing> <new>");
			return Ok(());
		};
		self.fs.link(
			&absolute_path(&self.cwd, existing),
			&absolute_path(&self.cwd, new),
		)
	}

	fn cmd_rm(&mut self, args: &[&str]) -> Result<(), FsError> {
		let Some(target) = args.first() else {
			return Ok(());
		};
		self.fs.remove(&absolute_path(&self.cwd, target))
	}

	fn read_whole_file(&mut self, path: &str) -> Result<Vec<u8>, FsError> {
		let info = self.fs.entry_info(path)?;
		let mut buf = vec![0u8; info.size as usize];
		let mut handle = self.fs.open(path, OpenFlags::read())?;
		let mut total = 0;
		while total < buf.len() {
			total += self.fs.read(&mut handle, &mut buf[total..])?;
		}
		self.fs.close(handle)?;
		Ok(buf)
	}

	fn write_whole_file(&mut self, path: &str, data: &[u8]) -> Result<(), FsError> {
		let mut handle = self.fs.open(path, OpenFlags::create())?;
		self.fs.write(&mut handle, data)?;
		self.fs.close(handle)
	}

	fn cmd_cp(&mut self, args: &[&str]) -> Result<(), FsError> {
		let (Some(src), Some(dst)) = (args.first(), args.get(1)) else {
			eprintln!("usage: cp <src> <dst>");
			return Ok(());
		};
		let data = self.read_whole_file(&absolute_path(&self.cwd, src))?;
		self.write_whole_file(&absolute_path(&self.cwd, dst), &data)
	}

	fn cmd_mv(&mut self, args: &[&str]) -> Result<(), FsError> {
		let (Some(src), Some(dst)) = (args.first(), args.get(1)) else {
			eprintln!("usage: mv <src> <dst>");
			return Ok(());
		};
		let src = absolute_path(&self.cwd, src);
		let dst = absolute_path(&self.cwd, dst);
		self.fs.link(&src, &dst)?;
		self.fs.remove(&src)
	}

	fn cmd_cat(&mut self, args: &[&str]) -> Result<(), FsError> {
		let Some(target) = args.first() else {
			return Ok(());
		};
		let data = self.read_whole_file(&absolute_path(&self.cwd, target))?;
		print!("{}", String::from_utf8_lossy(&data));
		Ok(())
	}

	fn cmd_import(&mut self, args: &[&str]) -> Result<(), FsError> {
		let (Some(host_path), Some(fs_path)) = (args.first(), args.get(1)) else {
			eprintln!("usage: import <host-path> <fs-path>");
			return Ok(());
		};
		let data = fs::read(host_path).map_err(|_| FsError::DiskRead)?;
		self.write_whole_file(&absolute_path(&self.cwd, fs_path), &data)
	}

	fn cmd_export(&mut self, args: &[&str]) -> Result<(), FsError> {
		let (Some(fs_path), Some(host_path)) = (args.first(), args.get(1)) else {
			eprintln!("usage: export <fs-path> <host-path>");
			return Ok(());
		};
		let data = self.read_whole_file(&absolute_path(&self.cwd, fs_path))?;
		fs::write(host_path, data).map_err(|_| FsError::DiskWrite)
	}

	fn cmd_edit(&mut self, args: &[&str]) -> Result<(), FsError> {
		let Some(target) = args.first() else {
			return Ok(());
		};
		let path = absolute_path(&self.cwd, target);
		let data = match self.fs.entry_info(&path) {
			Ok(_) => self.read_whole_file(&path)?,
			Err(FsError::NotExists) => Vec::new(),
			Err(err) => return Err(err),
		};

		let tmp = PathBuf::from(format!("/tmp/blockfs-edit-{}", std::process::id()));
		fs::write(&tmp, &data).map_err(|_| FsError::DiskWrite)?;
		let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
		let status = Command::new(editor).arg(&tmp).status();
		let edited = fs::read(&tmp).unwrap_or(data);
		let _ = fs::remove_file(&tmp);
		if status.map(|s| s.success()).unwrap_or(false) {
			self.write_whole_file(&path, &edited)?;
		}
		Ok(())
	}

	/// Seeks `count` bytes back from the end of the file and discards everything past
	/// that point.
	fn cmd_trunc(&mut self, args: &[&str]) -> Result<(), FsError> {
		let (Some(target), Some(count_arg)) = (args.first(), args.get(1)) else {
			eprintln!("usage: trunc <path> <count>");
			return Ok(());
		};
		let count: u64 = match count_arg.parse() {
			Ok(n) => n,
			Err(_) => {
				eprintln!("invalid count: {count_arg}");
				return Ok(());
			}
		};
		let path = absolute_path(&self.cwd, target);
		let mut handle = self.fs.open(&path, OpenFlags::read())?;
		self.fs.seek(&mut handle, SeekMode::End(count))?;
		self.fs.discard(&mut handle)?;
		self.fs.close(handle)
	}

	/// Appends `count` filler bytes (`0xFF`) to the end of the file.
	fn cmd_exp(&mut self, args: &[&str]) -> Result<(), FsError> {
		let (Some(target), Some(count_arg)) = (args.first(), args.get(1)) else {
			eprintln!("usage: exp <path> <count>");
			return Ok(());
		};
		let count: usize = match count_arg.parse() {
			Ok(n) => n,
			Err(_) => {
				eprintln!("invalid count: {count_arg}");
				return Ok(());
			}
		};
		let path = absolute_path(&self.cwd, target);
		let mut handle = self.fs.open(&path, OpenFlags::append())?;
		let filler = vec![0xFFu8; count];
		self.fs.write(&mut handle, &filler)?;
		self.fs.close(handle)
	}

	fn cmd_fsinfo(&mut self) -> Result<(), FsError> {
		let info = self.fs.info()?;
		println!("sectors:              {}", info.sectors);
		println!("clusters:             {}", info.clusters);
		println!("table sectors:        {}", info.table_sectors);
		println!("free clusters:        {}", info.free_clusters);
		println!("node clusters:        {}", info.node_clusters);
		println!("data clusters:        {}", info.data_clusters);
		println!("nodes in use:         {}", info.nodes);
		println!("nodes allocated:      {}", info.allocated_nodes);
		println!("files size:           {}", ByteSize(info.files_size));
		println!("dir structures size:  {}", ByteSize(info.dir_structures_size));
		println!("nodes size:           {}", ByteSize(info.nodes_size));
		println!("used space:           {}", ByteSize(info.used_space));
		println!("free space:           {}", ByteSize(info.free_space));
		println!("total size:           {}", ByteSize(info.total_size));
		println!("usable space:         {}", ByteSize(info.usable_space));
		Ok(())
	}
}

fn print_help() {
	println!("commands: ls cd pwd mkdir touch ln rm cp mv cat import export edit trunc exp fsinfo help exit");
}
