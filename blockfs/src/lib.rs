//! A self-contained block filesystem core: a FAT-style Cluster Allocation Table, an
//! inode pool packed into tagged clusters, and a chained-cluster directory layer, all
//! built over an injected [`BlockDevice`] and [`Clock`] so the core never depends on
//! what's really backing storage or time (§1, §6).
//!
//! Crash consistency, fsck, sparse files, symlinks, permissions, extended attributes,
//! caching beyond one scratch sector, and concurrent access are all out of scope (§1).

mod cat;
mod dir;
mod file;
mod fs;
mod inode;
pub mod layout;

pub mod device;
pub mod time;

pub use dir::DirListEntry;
pub use dir::EntryInfo;
pub use error::FsError;
pub use error::FsResult;
pub use file::FileHandle;
pub use file::OpenFlags;
pub use file::SeekMode;
pub use fs::Filesystem;
pub use fs::Info;
pub use layout::MAX_NAME;
pub use layout::MAX_PATH;
pub use layout::SECTOR_SIZE;

mod error;
