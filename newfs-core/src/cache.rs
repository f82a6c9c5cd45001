//! The in-memory object cache: the dentry arena and the inode slab,
//! plus the root handle that is always resident while mounted.

use crate::arena::Arena;
use crate::dentry::{Dentry, DentryId, FileType};
use crate::inode::Inode;
use crate::layout::ROOT_INO;

/// Owns every resident dentry and inode. Inodes are indexed directly by
/// `ino` (a `Vec<Option<Inode>>` sized to `max_ino`); dentries live in an
/// [`Arena`] since there can be more live dentries than inodes (an
/// unhydrated child has a dentry but no resolved inode yet).
pub struct Cache {
    pub dentries: Arena<Dentry>,
    pub inodes: Vec<Option<Inode>>,
    pub root: DentryId,
}

impl Cache {
    /// Creates a cache with just the root dentry present (unhydrated: its
    /// inode is not yet in `inodes`).
    pub fn new(max_ino: u32) -> Self {
        let mut dentries = Arena::new();
        let root = dentries.insert(Dentry {
            name: "/".to_string(),
            ino: ROOT_INO,
            ftype: FileType::Dir,
            parent: None,
        });
        Self {
            dentries,
            inodes: (0..max_ino).map(|_| None).collect(),
            root,
        }
    }

    /// Whether the inode for `ino` has been hydrated from disk yet.
    pub fn is_hydrated(&self, ino: u32) -> bool {
        self.inodes.get(ino as usize).map(Option::is_some).unwrap_or(false)
    }
}
