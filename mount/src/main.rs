//! `newfs-mount`: a FUSE host that serves a `newfs` filesystem.
//!
//! This binary owns none of the on-disk logic; it only translates kernel
//! FUSE requests into the path-oriented calls in `newfs_core::ops` and
//! maps inode numbers back and forth, since the FUSE ABI wants small stable
//! integers and the core only speaks paths.

use clap::Parser;
use fuser::{
    FileAttr, FileType as FuseFileType, Filesystem as FuseFilesystem, MountOption, ReplyAttr,
    ReplyCreate, ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyWrite,
    Request,
};
use newfs_core::{Error, FileType, Filesystem, Stat};
use newfs_utils::FileDriver;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::exit;
use std::time::Duration;

const TTL: Duration = Duration::from_secs(1);

/// Command line arguments.
#[derive(Parser)]
#[command(name = "newfs-mount", about = "Mount a newfs filesystem via FUSE")]
struct Args {
    /// Path to the formatted device or backing file.
    device: PathBuf,
    /// Directory to attach the FUSE session to.
    mountpoint: PathBuf,
    /// Enable verbose (debug-level) logging.
    #[arg(short, long)]
    verbose: bool,
}

fn errno(err: &Error) -> i32 {
    match err {
        Error::Io(_) => libc::EIO,
        Error::NoSpace => libc::ENOSPC,
        Error::Exists(_) => libc::EEXIST,
        Error::NotFound(_) => libc::ENOENT,
        Error::NotDir(_) => libc::ENOTDIR,
        Error::IsDir(_) => libc::EISDIR,
        Error::NotEmpty(_) => libc::ENOTEMPTY,
        Error::Inval(_) => libc::EINVAL,
        Error::Access => libc::EACCES,
        Error::Unsupported(_) => libc::ENOSYS,
    }
}

/// Maps FUSE's small stable inode numbers to the absolute paths the core
/// actually understands. Root is always ino 1, per the FUSE ABI.
struct Host {
    fs: Filesystem<FileDriver>,
    paths: HashMap<u64, String>,
    next_ino: u64,
}

impl Host {
    fn new(fs: Filesystem<FileDriver>) -> Self {
        let mut paths = HashMap::new();
        paths.insert(fuser::FUSE_ROOT_ID, "/".to_string());
        Self {
            fs,
            paths,
            next_ino: fuser::FUSE_ROOT_ID + 1,
        }
    }

    fn path_of(&self, ino: u64) -> Option<String> {
        self.paths.get(&ino).cloned()
    }

    fn child_path(parent: &str, name: &str) -> String {
        if parent == "/" {
            format!("/{name}")
        } else {
            format!("{parent}/{name}")
        }
    }

    /// Returns the existing ino for `path`, assigning a fresh one if this
    /// is the first time it has been seen.
    fn intern(&mut self, path: String) -> u64 {
        if let Some((&ino, _)) = self.paths.iter().find(|(_, p)| **p == path) {
            return ino;
        }
        let ino = self.next_ino;
        self.next_ino += 1;
        self.paths.insert(ino, path);
        ino
    }

    fn attr(&self, ino: u64, stat: Stat) -> FileAttr {
        let kind = match stat.ftype {
            FileType::Dir => FuseFileType::Directory,
            FileType::Reg => FuseFileType::RegularFile,
        };
        let perm = match stat.ftype {
            FileType::Dir => 0o755,
            FileType::Reg => 0o644,
        };
        let block_size = self.fs.block_size();
        FileAttr {
            ino,
            size: stat.size as u64,
            blocks: (stat.size as u64).div_ceil(block_size),
            atime: std::time::UNIX_EPOCH,
            mtime: std::time::UNIX_EPOCH,
            ctime: std::time::UNIX_EPOCH,
            crtime: std::time::UNIX_EPOCH,
            kind,
            perm,
            nlink: stat.link.max(1),
            uid: 0,
            gid: 0,
            rdev: 0,
            blksize: block_size as u32,
            flags: 0,
        }
    }
}

impl FuseFilesystem for Host {
    fn destroy(&mut self) {
        if let Err(e) = self.fs.unmount() {
            log::error!("unmount failed: {e}");
        }
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        log::trace!("lookup(parent={parent}, name={name:?})");
        let Some(parent_path) = self.path_of(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let name = name.to_string_lossy().into_owned();
        let path = Host::child_path(&parent_path, &name);
        match self.fs.stat(&path) {
            Ok(stat) => {
                let ino = self.intern(path);
                reply.entry(&TTL, &self.attr(ino, stat), 0);
            }
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.fs.stat(&path) {
            Ok(stat) => reply.attr(&TTL, &self.attr(ino, stat)),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let mut idx = offset.max(0) as usize;
        loop {
            match self.fs.readdir(&path, idx) {
                Ok(Some((name, ftype))) => {
                    let child_path = Host::child_path(&path, &name);
                    let child_ino = self.intern(child_path);
                    let kind = match ftype {
                        FileType::Dir => FuseFileType::Directory,
                        FileType::Reg => FuseFileType::RegularFile,
                    };
                    if reply.add(child_ino, (idx + 1) as i64, kind, &name) {
                        break;
                    }
                    idx += 1;
                }
                Ok(None) => break,
                Err(e) => {
                    reply.error(errno(&e));
                    return;
                }
            }
        }
        reply.ok();
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let Some(parent_path) = self.path_of(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let path = Host::child_path(&parent_path, &name.to_string_lossy());
        if let Err(e) = self.fs.mkdir(&path) {
            reply.error(errno(&e));
            return;
        }
        match self.fs.stat(&path) {
            Ok(stat) => {
                let ino = self.intern(path);
                reply.entry(&TTL, &self.attr(ino, stat), 0);
            }
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let Some(parent_path) = self.path_of(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let path = Host::child_path(&parent_path, &name.to_string_lossy());
        if let Err(e) = self.fs.mknod(&path) {
            reply.error(errno(&e));
            return;
        }
        match self.fs.stat(&path) {
            Ok(stat) => {
                let ino = self.intern(path);
                reply.created(&TTL, &self.attr(ino, stat), 0, 0, 0);
            }
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn open(&mut self, _req: &Request<'_>, _ino: u64, _flags: i32, reply: ReplyOpen) {
        reply.opened(0, 0);
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.fs.read(&path, offset.max(0) as u64, size as u64) {
            Ok(bytes) => reply.data(&bytes),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.fs.write(&path, offset.max(0) as u64, data) {
            Ok(written) => reply.written(written as u32),
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(parent_path) = self.path_of(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        let path = Host::child_path(&parent_path, &name.to_string_lossy());
        match self.fs.unlink(&path) {
            Ok(()) => {
                self.paths.retain(|_, p| *p != path);
                reply.ok();
            }
            Err(e) => reply.error(errno(&e)),
        }
    }

    fn rmdir(&mut self, req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        self.unlink(req, parent, name, reply);
    }
}

fn main() {
    let args = Args::parse();
    let level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new().filter_level(level).parse_default_env().init();

    let bin = "newfs-mount";
    let driver = FileDriver::open(&args.device, false).unwrap_or_else(|e| {
        eprintln!("{bin}: {}: {}", args.device.display(), e);
        exit(1);
    });

    let fs = Filesystem::mount(driver).unwrap_or_else(|e| {
        newfs_utils::print_error(bin, &e);
        exit(1);
    });

    let options = vec![MountOption::FSName("newfs".to_string())];
    log::info!(
        "mounting {} at {}",
        args.device.display(),
        args.mountpoint.display()
    );
    if let Err(e) = fuser::mount2(Host::new(fs), &args.mountpoint, &options) {
        eprintln!("{bin}: {e}");
        exit(1);
    }
}
