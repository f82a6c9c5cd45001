//! Path resolution (§4.5).

use crate::dentry::{DentryId, FileType};
use crate::driver::BlockDriver;
use crate::error::Result;
use crate::fs::Filesystem;

/// The outcome of resolving a path to a dentry.
pub(crate) struct LookupResult {
    /// The resolved dentry on a hit; the last dentry successfully reached
    /// on a miss (the would-be parent, or the file that blocked descent).
    pub dentry: DentryId,
    pub is_found: bool,
    pub is_root: bool,
}

impl<D: BlockDriver> Filesystem<D> {
    /// Resolves an absolute path component by component, starting at root.
    ///
    /// Matches are full-length name equality — the original this was ported
    /// from compared only as many bytes as the needle's length, so `"foo"`
    /// spuriously matched a sibling named `"foobar"`; that bug is not
    /// reproduced here.
    pub(crate) fn lookup(&mut self, path: &str) -> Result<LookupResult> {
        if !path.starts_with('/') {
            return Err(crate::error::Error::Inval(format!(
                "{path:?} is not an absolute path"
            )));
        }
        let root = self.cache.root;
        if path == "/" {
            self.ensure_hydrated(root)?;
            return Ok(LookupResult {
                dentry: root,
                is_found: true,
                is_root: true,
            });
        }

        let components: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let total = components.len();
        let mut cursor = root;

        for (lvl, name) in components.iter().enumerate() {
            self.ensure_hydrated(cursor)?;
            let cursor_ino = self.cache.dentries.get(cursor).ino;
            let cursor_ftype = self.cache.dentries.get(cursor).ftype;

            if cursor_ftype == FileType::Reg {
                // A regular file blocks any further descent.
                return Ok(LookupResult {
                    dentry: cursor,
                    is_found: false,
                    is_root: false,
                });
            }

            let hit = {
                let inode = self.cache.inodes[cursor_ino as usize]
                    .as_ref()
                    .expect("directory hydrated above but inode missing");
                inode
                    .children
                    .iter()
                    .copied()
                    .find(|&id| self.cache.dentries.get(id).name == *name)
            };

            match hit {
                None => {
                    return Ok(LookupResult {
                        dentry: cursor,
                        is_found: false,
                        is_root: false,
                    });
                }
                Some(child) => {
                    if lvl == total - 1 {
                        self.ensure_hydrated(child)?;
                        return Ok(LookupResult {
                            dentry: child,
                            is_found: true,
                            is_root: false,
                        });
                    }
                    cursor = child;
                }
            }
        }
        unreachable!("component loop always returns on its last iteration")
    }
}
