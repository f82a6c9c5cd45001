//! On-disk layout manager and in-memory object cache for the `newfs`
//! educational block filesystem.
//!
//! A [`Filesystem`] owns the whole of a mounted volume: the block I/O
//! adapter, the superblock, both allocation bitmaps, and the dentry/inode
//! cache. Hosts (a FUSE binary, a test harness) drive it through the
//! operations in [`ops`]; nothing in this crate talks to the kernel or to
//! a real device directly, that is [`driver::BlockDriver`]'s job.

mod arena;
mod bitmap;
mod cache;
mod dentry;
mod driver;
mod error;
mod fs;
mod inode;
mod io;
mod layout;
mod ops;
mod path;

pub use dentry::FileType;
pub use driver::{BlockDriver, MemDriver, SizeRequest};
pub use error::{Error, Result};
pub use fs::Filesystem;
pub use layout::{device_capacity, DATA_BLKS, DATA_PER_FILE, INODE_BLKS, MAGIC, MAX_NAME_LEN};
pub use ops::Stat;
