//! The file-operation façade (§4.6): `mkdir`, `mknod`, `readdir`, `read`,
//! `write`, `unlink`. Each resolves its path with [`crate::path`] and then
//! drives the cache/bitmap primitives in [`crate::fs`].

use crate::dentry::{Dentry, DentryId, FileType};
use crate::driver::BlockDriver;
use crate::error::{Error, Result};
use crate::fs::Filesystem;
use crate::layout::{DATA_PER_FILE, MAX_NAME_LEN};

/// Splits an absolute path into its parent directory and final component.
fn split_path(path: &str) -> Result<(String, String)> {
    if !path.starts_with('/') || path == "/" {
        return Err(Error::Inval(format!("{path:?} has no parent")));
    }
    let trimmed = path.trim_end_matches('/');
    let slash = trimmed.rfind('/').expect("absolute path always has a slash");
    let parent = if slash == 0 {
        "/".to_string()
    } else {
        trimmed[..slash].to_string()
    };
    let name = trimmed[slash + 1..].to_string();
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(Error::Inval(format!("invalid filename in {path:?}")));
    }
    Ok((parent, name))
}

/// The attributes a host needs to answer a `getattr`/`lookup` request: not
/// part of the on-disk format itself, just what [`Filesystem::stat`] reads
/// back out of the resolved inode.
#[derive(Debug, Clone, Copy)]
pub struct Stat {
    pub ino: u32,
    pub ftype: FileType,
    pub size: u32,
    pub link: u32,
}

impl<D: BlockDriver> Filesystem<D> {
    /// Resolves `path` and reports its inode number, type, size and link
    /// count. Used by hosts (the FUSE binary) to answer `getattr`/`lookup`;
    /// the core's own façade operations never need it.
    pub fn stat(&mut self, path: &str) -> Result<Stat> {
        let res = self.lookup(path)?;
        if !res.is_found {
            return Err(self.miss_error(path, res.dentry));
        }
        let ino = self.cache.dentries.get(res.dentry).ino;
        let ftype = self.cache.dentries.get(res.dentry).ftype;
        let inode = self.cache.inodes[ino as usize]
            .as_ref()
            .expect("resolved dentry is always hydrated");
        Ok(Stat {
            ino,
            ftype,
            size: inode.size,
            link: inode.link,
        })
    }

    /// The error to raise when path resolution stops short of its target:
    /// `NotDir` if a regular file blocked descent, `NotFound` otherwise.
    fn miss_error(&self, path: &str, miss: DentryId) -> Error {
        if self.cache.dentries.get(miss).ftype == FileType::Reg {
            Error::NotDir(path.to_string())
        } else {
            Error::NotFound(path.to_string())
        }
    }

    fn create_entry(&mut self, path: &str, ftype: FileType) -> Result<()> {
        let (parent_path, name) = split_path(path)?;
        let res = self.lookup(&parent_path)?;
        if !res.is_found {
            return Err(self.miss_error(&parent_path, res.dentry));
        }
        let parent_id = res.dentry;
        let parent_ino = self.cache.dentries.get(parent_id).ino;
        if self.cache.dentries.get(parent_id).ftype != FileType::Dir {
            return Err(Error::NotDir(parent_path));
        }

        let exists = {
            let inode = self.cache.inodes[parent_ino as usize]
                .as_ref()
                .expect("resolved directory is always hydrated");
            inode
                .children
                .iter()
                .any(|&id| self.cache.dentries.get(id).name == name)
        };
        if exists {
            return Err(Error::Exists(path.to_string()));
        }

        let child = self.cache.dentries.insert(Dentry {
            name,
            ino: 0,
            ftype,
            parent: Some(parent_id),
        });
        self.alloc_inode(child, ftype)?;
        self.alloc_dentry(parent_ino, child)?;
        Ok(())
    }

    /// Creates an empty directory at `path`. The parent must already exist.
    pub fn mkdir(&mut self, path: &str) -> Result<()> {
        self.create_entry(path, FileType::Dir)
    }

    /// Creates an empty regular file at `path`. The parent must already
    /// exist.
    pub fn mknod(&mut self, path: &str) -> Result<()> {
        self.create_entry(path, FileType::Reg)
    }

    /// Returns the name and type of the `idx`-th child of the directory at
    /// `path`, or `None` past the end.
    pub fn readdir(&mut self, path: &str, idx: usize) -> Result<Option<(String, FileType)>> {
        let res = self.lookup(path)?;
        if !res.is_found {
            return Err(self.miss_error(path, res.dentry));
        }
        if self.cache.dentries.get(res.dentry).ftype != FileType::Dir {
            return Err(Error::NotDir(path.to_string()));
        }
        let ino = self.cache.dentries.get(res.dentry).ino;
        let inode = self.cache.inodes[ino as usize]
            .as_ref()
            .expect("resolved directory is always hydrated");
        Ok(inode.children.get(idx).map(|&id| {
            let child = self.cache.dentries.get(id);
            (child.name.clone(), child.ftype)
        }))
    }

    /// Reads up to `len` bytes starting at `offset` from the regular file
    /// at `path`. Short reads past EOF are clamped, never padded.
    pub fn read(&mut self, path: &str, offset: u64, len: u64) -> Result<Vec<u8>> {
        let res = self.lookup(path)?;
        if !res.is_found {
            return Err(self.miss_error(path, res.dentry));
        }
        if self.cache.dentries.get(res.dentry).ftype != FileType::Reg {
            return Err(Error::IsDir(path.to_string()));
        }
        let ino = self.cache.dentries.get(res.dentry).ino;
        let block_size = self.io.block_size();
        let inode = self.cache.inodes[ino as usize]
            .as_ref()
            .expect("resolved file is always hydrated");

        let end = (offset + len).min(inode.size as u64);
        if offset >= end {
            return Ok(Vec::new());
        }
        let mut out = Vec::with_capacity((end - offset) as usize);
        let mut pos = offset;
        while pos < end {
            let blk = (pos / block_size) as usize;
            let blk_off = (pos % block_size) as usize;
            let take = ((end - pos).min(block_size - blk_off as u64)) as usize;
            match &inode.data[blk] {
                Some(buf) => out.extend_from_slice(&buf[blk_off..blk_off + take]),
                None => out.extend(std::iter::repeat(0u8).take(take)),
            }
            pos += take as u64;
        }
        Ok(out)
    }

    /// Writes `bytes` at `offset` into the regular file at `path`,
    /// allocating data blocks lazily. Fails with [`Error::NoSpace`] if the
    /// write would exceed the file's fixed six-block capacity.
    pub fn write(&mut self, path: &str, offset: u64, bytes: &[u8]) -> Result<u64> {
        let res = self.lookup(path)?;
        if !res.is_found {
            return Err(self.miss_error(path, res.dentry));
        }
        if self.cache.dentries.get(res.dentry).ftype != FileType::Reg {
            return Err(Error::IsDir(path.to_string()));
        }
        let ino = self.cache.dentries.get(res.dentry).ino;
        let block_size = self.io.block_size();
        let end = offset + bytes.len() as u64;
        if end > block_size * DATA_PER_FILE as u64 {
            return Err(Error::NoSpace);
        }

        let mut pos = offset;
        let mut written = 0usize;
        while pos < end {
            let blk = (pos / block_size) as usize;
            let blk_off = (pos % block_size) as usize;
            let take = ((end - pos).min(block_size - blk_off as u64)) as usize;

            let needs_alloc = self.cache.inodes[ino as usize]
                .as_ref()
                .unwrap()
                .block_pointers[blk]
                .is_none();
            if needs_alloc {
                self.alloc_data_blk(ino, blk)?;
            }
            let inode = self.cache.inodes[ino as usize].as_mut().unwrap();
            let buf = inode.data[blk].get_or_insert_with(|| vec![0u8; block_size as usize]);
            buf[blk_off..blk_off + take].copy_from_slice(&bytes[written..written + take]);

            pos += take as u64;
            written += take;
        }

        let inode = self.cache.inodes[ino as usize].as_mut().unwrap();
        inode.size = inode.size.max(end as u32);
        Ok(written as u64)
    }

    /// Removes the file or empty directory at `path`.
    pub fn unlink(&mut self, path: &str) -> Result<()> {
        let res = self.lookup(path)?;
        if !res.is_found {
            return Err(self.miss_error(path, res.dentry));
        }
        if res.is_root {
            return Err(Error::Inval("cannot unlink the root directory".to_string()));
        }
        let target = res.dentry;
        let target_ino = self.cache.dentries.get(target).ino;
        let parent = self
            .cache
            .dentries
            .get(target)
            .parent
            .expect("non-root dentry always has a parent");
        let parent_ino = self.cache.dentries.get(parent).ino;

        if self.cache.dentries.get(target).ftype == FileType::Dir {
            let has_children = !self.cache.inodes[target_ino as usize]
                .as_ref()
                .expect("resolved directory is always hydrated")
                .children
                .is_empty();
            if has_children {
                return Err(Error::NotEmpty(path.to_string()));
            }
        }

        self.drop_inode(target_ino)?;
        self.drop_dentry(parent_ino, target);
        Ok(())
    }
}
