//! On-disk and in-memory inode representations.

use crate::dentry::{DentryId, FileType};
use crate::layout::DATA_PER_FILE;
use std::mem::size_of;
use std::slice;

/// The inode's on-disk layout: `ino`, `size`, `link`, `ftype`, six block
/// pointers, `dir_cnt`, packed with no padding (§6.3).
#[repr(C, packed)]
struct RawInode {
    ino: u32,
    size: u32,
    link: u32,
    ftype: u32,
    block_pointers: [i32; DATA_PER_FILE],
    dir_cnt: u32,
}

/// On-disk inode size in bytes.
pub const INODE_DISK_SIZE: usize = size_of::<RawInode>();

/// The sentinel stored on disk for an unallocated block pointer.
const UNALLOCATED: i32 = -1;

/// Parsed on-disk inode fields, before they are wired into an in-memory
/// [`Inode`] with its owning dentry and (for directories) child list.
pub struct DiskInode {
    pub ino: u32,
    pub size: u32,
    pub link: u32,
    pub ftype: FileType,
    pub block_pointers: [Option<u32>; DATA_PER_FILE],
    pub dir_cnt: u32,
}

/// Serializes an in-memory [`Inode`] into its fixed on-disk form through a
/// raw byte view of [`RawInode`].
pub fn inode_to_bytes(inode: &Inode, ftype: FileType) -> [u8; INODE_DISK_SIZE] {
    let raw = RawInode {
        ino: inode.ino,
        size: inode.size,
        link: inode.link,
        ftype: match ftype {
            FileType::Dir => 1,
            FileType::Reg => 0,
        },
        block_pointers: inode.block_pointers.map(|p| p.map(|v| v as i32).unwrap_or(UNALLOCATED)),
        dir_cnt: inode.dir_cnt,
    };
    let mut buf = [0u8; INODE_DISK_SIZE];
    let slice = unsafe { slice::from_raw_parts(&raw as *const _ as *const u8, INODE_DISK_SIZE) };
    buf.copy_from_slice(slice);
    buf
}

/// Parses an on-disk inode's fixed form through a raw byte view of
/// [`RawInode`].
pub fn inode_from_bytes(bytes: &[u8]) -> DiskInode {
    let mut raw: RawInode = unsafe { std::mem::zeroed() };
    let slice = unsafe { slice::from_raw_parts_mut(&mut raw as *mut _ as *mut u8, INODE_DISK_SIZE) };
    slice.copy_from_slice(&bytes[..INODE_DISK_SIZE]);
    DiskInode {
        ino: raw.ino,
        size: raw.size,
        link: raw.link,
        ftype: if raw.ftype == 1 { FileType::Dir } else { FileType::Reg },
        block_pointers: raw.block_pointers.map(|v| if v < 0 { None } else { Some(v as u32) }),
        dir_cnt: raw.dir_cnt,
    }
}

/// In-memory inode.
///
/// The original carries a raw `dentry` back-pointer and a `dentrys` linked
/// list; here the owning dentry and children are tracked as arena handles
/// (see [`crate::dentry::DentryId`]) so the dentry/inode cycle never exists
/// as an actual Rust reference cycle.
#[derive(Debug, Clone)]
pub struct Inode {
    pub ino: u32,
    pub size: u32,
    pub link: u32,
    pub dentry: DentryId,
    pub block_pointers: [Option<u32>; DATA_PER_FILE],
    /// `DIR` only: children in head-insertion order (most recently
    /// inserted first), mirroring the original's singly-linked list built
    /// by prepending at `alloc_dentry`.
    pub children: Vec<DentryId>,
    pub dir_cnt: u32,
    /// `REG` only: one lazily-populated buffer per block pointer.
    pub data: [Option<Vec<u8>>; DATA_PER_FILE],
    /// Set while `read_inode` is re-inserting children read off disk, so
    /// that `alloc_dentry`'s data-block allocation path is suppressed (see
    /// the hydration invariant in §4.4).
    pub(crate) hydrating: bool,
}

impl Inode {
    /// A freshly allocated inode: `size = 0`, no block pointers, no
    /// children.
    pub fn new(ino: u32, dentry: DentryId) -> Self {
        Self {
            ino,
            size: 0,
            link: 1,
            dentry,
            block_pointers: [None; DATA_PER_FILE],
            children: Vec::new(),
            dir_cnt: 0,
            data: [None, None, None, None, None, None],
            hydrating: false,
        }
    }
}
