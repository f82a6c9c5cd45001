//! Ties the block I/O adapter, superblock, bitmaps and object cache
//! together: mount, unmount, and the inode/dentry cache operations that
//! back the façade in [`crate::ops`].

use crate::bitmap::Bitmap;
use crate::cache::Cache;
use crate::dentry::{dentry_from_bytes, dentry_to_bytes, Dentry, DentryId, FileType, DENTRY_DISK_SIZE};
use crate::driver::BlockDriver;
use crate::error::{Error, Result};
use crate::inode::{inode_from_bytes, inode_to_bytes, Inode, INODE_DISK_SIZE};
use crate::io::BlockIo;
use crate::layout::{SuperBlock, DATA_PER_FILE, MAGIC, ROOT_INO};

/// A mounted filesystem: the live superblock, both bitmaps, the object
/// cache, and the block I/O adapter they are all read and written through.
pub struct Filesystem<D: BlockDriver> {
    pub(crate) io: BlockIo<D>,
    pub(crate) sb: SuperBlock,
    pub(crate) inode_bitmap: Bitmap,
    pub(crate) data_bitmap: Bitmap,
    pub(crate) cache: Cache,
    mounted: bool,
}

impl<D: BlockDriver> Filesystem<D> {
    /// Mounts the filesystem described by `driver`, formatting it first if
    /// the magic number does not match (§4.2).
    pub fn mount(driver: D) -> Result<Self> {
        let mut io = BlockIo::new(driver)?;
        let block_size = io.block_size();

        let sb_bytes = io.read(0, SuperBlock::DISK_SIZE as u64)?;
        let on_disk = SuperBlock::from_bytes(&sb_bytes)?;
        let (sb, is_init) = if on_disk.magic != MAGIC {
            log::info!("magic mismatch, formatting fresh filesystem");
            (SuperBlock::format(), true)
        } else {
            (on_disk, false)
        };

        let inode_bitmap_bytes = io.read(
            sb.inode_bitmap.offset as u64 * block_size,
            sb.inode_bitmap.blocks as u64 * block_size,
        )?;
        let data_bitmap_bytes = io.read(
            sb.data_bitmap.offset as u64 * block_size,
            sb.data_bitmap.blocks as u64 * block_size,
        )?;

        let max_ino = sb.max_ino;
        let max_data = sb.max_data;
        let mut fs = Self {
            io,
            sb,
            inode_bitmap: Bitmap::new(inode_bitmap_bytes, max_ino),
            data_bitmap: Bitmap::new(data_bitmap_bytes, max_data),
            cache: Cache::new(max_ino),
            mounted: true,
        };

        if is_init {
            let root = fs.cache.root;
            let root_ino = fs.alloc_inode(root, FileType::Dir)?;
            fs.sync_inode(root_ino)?;
        }
        let root = fs.cache.root;
        fs.read_inode(root, ROOT_INO)?;

        log::info!(
            "mounted: max_ino={max_ino} max_data={max_data} block_size={block_size}"
        );
        Ok(fs)
    }

    /// Recursively writes back every resident inode starting at root,
    /// persists the superblock and both bitmaps, and closes the driver.
    /// A no-op if not mounted.
    pub fn unmount(&mut self) -> Result<()> {
        if !self.mounted {
            return Ok(());
        }
        self.sync_inode(ROOT_INO)?;

        let sb_bytes = self.sb.to_bytes();
        self.io.write(0, &sb_bytes)?;

        let block_size = self.io.block_size();
        let inode_bitmap_bytes = self.inode_bitmap.bytes().to_vec();
        self.io.write(
            self.sb.inode_bitmap.offset as u64 * block_size,
            &inode_bitmap_bytes,
        )?;
        let data_bitmap_bytes = self.data_bitmap.bytes().to_vec();
        self.io.write(
            self.sb.data_bitmap.offset as u64 * block_size,
            &data_bitmap_bytes,
        )?;

        self.io.close()?;
        self.mounted = false;
        log::info!("unmounted cleanly");
        Ok(())
    }

    /// The filesystem's logical block size, for hosts that need to report
    /// it (e.g. `st_blksize` in a FUSE `getattr` reply).
    pub fn block_size(&self) -> u64 {
        self.io.block_size()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Consumes a filesystem that has already been unmounted, handing back
    /// the underlying driver so the same backing store can be remounted or
    /// inspected directly.
    pub fn into_driver(self) -> D {
        self.io.into_driver()
    }

    /// The maximum number of inodes this volume can hold.
    pub fn max_ino(&self) -> u32 {
        self.sb.max_ino
    }

    /// Count of currently allocated inode-bitmap bits. Exposed for test
    /// assertions on bitmap accounting; not used by the façade itself.
    pub fn inode_bitmap_allocated(&self) -> u32 {
        self.inode_bitmap.count_allocated()
    }

    /// Count of currently allocated data-bitmap bits. Exposed for test
    /// assertions on bitmap accounting; not used by the façade itself.
    pub fn data_bitmap_allocated(&self) -> u32 {
        self.data_bitmap.count_allocated()
    }

    pub(crate) fn dentries_per_block(&self) -> u32 {
        (self.io.block_size() / DENTRY_DISK_SIZE as u64) as u32
    }

    /// Hydrates `id` from disk if its inode is not already resident.
    pub(crate) fn ensure_hydrated(&mut self, id: DentryId) -> Result<()> {
        let ino = self.cache.dentries.get(id).ino;
        if !self.cache.is_hydrated(ino) {
            self.read_inode(id, ino)?;
        }
        Ok(())
    }

    /// Allocates a fresh inode, bitmap bit and all, and cross-links it to
    /// `dentry` (§4.4).
    pub(crate) fn alloc_inode(&mut self, dentry: DentryId, ftype: FileType) -> Result<u32> {
        let ino = self.inode_bitmap.allocate()?;
        let mut inode = Inode::new(ino, dentry);
        if ftype == FileType::Reg {
            let block_size = self.io.block_size() as usize;
            for buf in inode.data.iter_mut() {
                *buf = Some(vec![0u8; block_size]);
            }
        }
        self.cache.inodes[ino as usize] = Some(inode);
        self.cache.dentries.get_mut(dentry).ino = ino;
        Ok(ino)
    }

    /// Head-inserts `child` into `parent_ino`'s children list, allocating a
    /// fresh data block when the new dentry is the first in one — unless
    /// `parent_ino`'s inode is mid-hydration, in which case the block
    /// pointer is already authoritative from disk (§4.4 invariant).
    ///
    /// A directory's entries live in the same six block pointers a regular
    /// file's data does, so a directory tops out at `DATA_PER_FILE * dpb`
    /// children; past that this returns `Error::NoSpace` rather than
    /// indexing off the end of `block_pointers`.
    pub(crate) fn alloc_dentry(&mut self, parent_ino: u32, child: DentryId) -> Result<()> {
        let dpb = self.dentries_per_block();
        let (dir_cnt, hydrating) = {
            let parent = self.cache.inodes[parent_ino as usize]
                .as_ref()
                .expect("alloc_dentry on a non-resident parent inode");
            (parent.dir_cnt, parent.hydrating)
        };
        let next_cnt = dir_cnt + 1;
        let needs_new_block = !hydrating && next_cnt % dpb == 1;
        if needs_new_block && (next_cnt / dpb) as usize >= DATA_PER_FILE {
            return Err(Error::NoSpace);
        }
        let parent = self.cache.inodes[parent_ino as usize].as_mut().unwrap();
        parent.children.insert(0, child);
        parent.dir_cnt = next_cnt;
        if needs_new_block {
            let cur_blk = (next_cnt / dpb) as usize;
            let dno = self.data_bitmap.allocate()?;
            self.cache.inodes[parent_ino as usize]
                .as_mut()
                .unwrap()
                .block_pointers[cur_blk] = Some(dno);
        }
        Ok(())
    }

    /// Allocates a data block for the `blk_no`-th block pointer of a
    /// regular file, used by lazy write-time allocation (§4.6).
    pub(crate) fn alloc_data_blk(&mut self, ino: u32, blk_no: usize) -> Result<u32> {
        if blk_no >= DATA_PER_FILE {
            return Err(Error::NoSpace);
        }
        let dno = self.data_bitmap.allocate()?;
        let block_size = self.io.block_size() as usize;
        let inode = self.cache.inodes[ino as usize].as_mut().unwrap();
        inode.block_pointers[blk_no] = Some(dno);
        if inode.data[blk_no].is_none() {
            inode.data[blk_no] = Some(vec![0u8; block_size]);
        }
        Ok(dno)
    }

    /// Reads inode `ino` off disk into the cache, hydrating its children
    /// (DIR) or data buffers (REG) as well.
    pub(crate) fn read_inode(&mut self, dentry: DentryId, ino: u32) -> Result<()> {
        let block_size = self.io.block_size();
        let off = self.sb.ino_offset(block_size, ino, INODE_DISK_SIZE as u64);
        let bytes = self.io.read(off, INODE_DISK_SIZE as u64)?;
        let disk = inode_from_bytes(&bytes);

        let mut inode = Inode::new(ino, dentry);
        inode.size = disk.size;
        inode.link = disk.link;
        inode.block_pointers = disk.block_pointers;
        self.cache.inodes[ino as usize] = Some(inode);

        let ftype = self.cache.dentries.get(dentry).ftype;
        match ftype {
            FileType::Dir => {
                self.cache.inodes[ino as usize].as_mut().unwrap().hydrating = true;
                let dpb = self.dentries_per_block() as u64;
                let mut remaining = disk.dir_cnt;
                'blocks: for dno in disk.block_pointers.iter().flatten().copied() {
                    let mut cursor = self.sb.data_offset(block_size, dno);
                    for _ in 0..dpb {
                        if remaining == 0 {
                            break 'blocks;
                        }
                        let raw = self.io.read(cursor, DENTRY_DISK_SIZE as u64)?;
                        let dd = dentry_from_bytes(&raw);
                        let child = self.cache.dentries.insert(Dentry {
                            name: dd.name,
                            ino: dd.ino,
                            ftype: dd.ftype,
                            parent: Some(dentry),
                        });
                        self.alloc_dentry(ino, child)?;
                        cursor += DENTRY_DISK_SIZE as u64;
                        remaining -= 1;
                    }
                }
                self.cache.inodes[ino as usize].as_mut().unwrap().hydrating = false;
            }
            FileType::Reg => {
                let mut data: [Option<Vec<u8>>; DATA_PER_FILE] =
                    [None, None, None, None, None, None];
                for (i, slot) in data.iter_mut().enumerate() {
                    *slot = Some(match disk.block_pointers[i] {
                        Some(dno) => {
                            let off = self.sb.data_offset(block_size, dno);
                            self.io.read(off, block_size)?
                        }
                        None => vec![0u8; block_size as usize],
                    });
                }
                self.cache.inodes[ino as usize].as_mut().unwrap().data = data;
            }
        }
        Ok(())
    }

    /// Recursively, destructively writes `ino` and (if DIR) its children
    /// back to disk, freeing each object's in-memory state as it goes
    /// (§4.4). Intended to run exactly once per mount, at unmount.
    pub(crate) fn sync_inode(&mut self, ino: u32) -> Result<()> {
        let block_size = self.io.block_size();
        let inode = self.cache.inodes[ino as usize]
            .take()
            .expect("sync_inode on a non-resident inode");
        let ftype = self.cache.dentries.get(inode.dentry).ftype;

        let bytes = inode_to_bytes(&inode, ftype);
        let off = self.sb.ino_offset(block_size, ino, INODE_DISK_SIZE as u64);
        self.io.write(off, &bytes)?;

        match ftype {
            FileType::Dir => {
                let dpb = self.dentries_per_block() as usize;
                let mut children = inode.children.into_iter();
                for dno in inode.block_pointers.iter().flatten().copied() {
                    let mut cursor = self.sb.data_offset(block_size, dno);
                    for _ in 0..dpb {
                        let child = match children.next() {
                            Some(c) => c,
                            None => break,
                        };
                        let child_dentry = self.cache.dentries.get(child).clone();
                        let raw = dentry_to_bytes(&child_dentry);
                        self.io.write(cursor, &raw)?;
                        if self.cache.is_hydrated(child_dentry.ino) {
                            self.sync_inode(child_dentry.ino)?;
                        }
                        self.cache.dentries.remove(child);
                        cursor += DENTRY_DISK_SIZE as u64;
                    }
                }
            }
            FileType::Reg => {
                let mut data = inode.data;
                for (i, ptr) in inode.block_pointers.iter().enumerate() {
                    if let Some(dno) = ptr {
                        if let Some(buf) = data[i].take() {
                            let off = self.sb.data_offset(block_size, *dno);
                            self.io.write(off, &buf)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Unlinks `child` from `parent_ino`'s children list and frees its
    /// dentry. Does not touch the inode; call [`Self::drop_inode`] first.
    pub(crate) fn drop_dentry(&mut self, parent_ino: u32, child: DentryId) {
        let parent = self.cache.inodes[parent_ino as usize].as_mut().unwrap();
        parent.children.retain(|&id| id != child);
        parent.dir_cnt -= 1;
        self.cache.dentries.remove(child);
    }

    /// Recursively frees `ino` and (for DIR) its already-hydrated children,
    /// clearing the relevant bitmap bits. Children that were never
    /// hydrated are left untouched, matching the shallow-recursion limit
    /// of the source this was ported from (§9).
    pub(crate) fn drop_inode(&mut self, ino: u32) -> Result<()> {
        let inode = match self.cache.inodes[ino as usize].take() {
            Some(inode) => inode,
            None => return Ok(()),
        };
        let ftype = self.cache.dentries.get(inode.dentry).ftype;
        match ftype {
            FileType::Dir => {
                for child in inode.children {
                    let child_ino = self.cache.dentries.get(child).ino;
                    self.drop_inode(child_ino)?;
                    self.cache.dentries.remove(child);
                }
            }
            FileType::Reg => {
                for ptr in inode.block_pointers.iter().flatten() {
                    self.data_bitmap.free(*ptr);
                }
            }
        }
        self.inode_bitmap.free(ino);
        Ok(())
    }
}
