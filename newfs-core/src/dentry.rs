//! Directory entries: the name-to-inode bindings packed linearly into a
//! directory inode's data blocks.

use crate::layout::MAX_NAME_LEN;
use std::mem::size_of;
use std::slice;

/// A file's type: the filesystem only knows about two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Dir,
    Reg,
}

impl FileType {
    fn to_disk(self) -> u32 {
        match self {
            FileType::Dir => 1,
            FileType::Reg => 0,
        }
    }

    fn from_disk(v: u32) -> Self {
        if v == 1 {
            FileType::Dir
        } else {
            FileType::Reg
        }
    }
}

/// Opaque handle into the dentry arena. Replaces the original's raw
/// `brother`/`parent` pointers (see the design notes on cyclic ownership).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DentryId(pub(crate) u32);

/// In-memory directory entry.
///
/// Unlike the original, there is no `brother` pointer: sibling order is
/// tracked by the owning inode's `children: Vec<DentryId>`, and there is no
/// raw pointer back to the parent: it is carried as a `DentryId` instead.
#[derive(Debug, Clone)]
pub struct Dentry {
    pub name: String,
    pub ino: u32,
    pub ftype: FileType,
    pub parent: Option<DentryId>,
}

/// The dentry's on-disk layout: a 128-byte name, a `u32` ino, and a `u32`
/// file-type tag, packed with no padding (§6.3).
#[repr(C, packed)]
struct RawDentry {
    name: [u8; MAX_NAME_LEN],
    ino: u32,
    ftype: u32,
}

/// On-disk dentry size in bytes.
pub const DENTRY_DISK_SIZE: usize = size_of::<RawDentry>();

/// Serializes `dentry` into its fixed 136-byte on-disk form through a raw
/// byte view of [`RawDentry`].
pub fn dentry_to_bytes(dentry: &Dentry) -> [u8; DENTRY_DISK_SIZE] {
    let mut name = [0u8; MAX_NAME_LEN];
    let name_bytes = dentry.name.as_bytes();
    let n = name_bytes.len().min(MAX_NAME_LEN);
    name[..n].copy_from_slice(&name_bytes[..n]);
    let raw = RawDentry {
        name,
        ino: dentry.ino,
        ftype: dentry.ftype.to_disk(),
    };
    let mut buf = [0u8; DENTRY_DISK_SIZE];
    let slice = unsafe { slice::from_raw_parts(&raw as *const _ as *const u8, DENTRY_DISK_SIZE) };
    buf.copy_from_slice(slice);
    buf
}

/// Parsed form of an on-disk dentry, before it is attached to a parent and
/// turned into an in-memory [`Dentry`].
pub struct DiskDentry {
    pub name: String,
    pub ino: u32,
    pub ftype: FileType,
}

/// Parses a dentry's fixed on-disk form through a raw byte view of
/// [`RawDentry`]. The name field is zero-padded but not NUL-terminated if it
/// fills all 128 bytes (§6.3); trailing zero bytes are trimmed either way.
pub fn dentry_from_bytes(bytes: &[u8]) -> DiskDentry {
    let mut raw: RawDentry = unsafe { std::mem::zeroed() };
    let slice = unsafe { slice::from_raw_parts_mut(&mut raw as *mut _ as *mut u8, DENTRY_DISK_SIZE) };
    slice.copy_from_slice(&bytes[..DENTRY_DISK_SIZE]);
    let end = raw.name.iter().position(|&b| b == 0).unwrap_or(MAX_NAME_LEN);
    let name = String::from_utf8_lossy(&raw.name[..end]).into_owned();
    DiskDentry {
        name,
        ino: raw.ino,
        ftype: FileType::from_disk(raw.ftype),
    }
}
