//! A concrete [`BlockDriver`] over a regular file or block device, plus the
//! small host-facing helpers shared by the `newfs-mkfs` and `newfs-mount`
//! binaries.

use newfs_core::{BlockDriver, SizeRequest};
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;
use std::os::fd::AsRawFd;
use std::path::Path;
use std::path::PathBuf;

/// Drives I/O against a real file or block device, backing the logical
/// block layer in `newfs-core` with whatever native I/O unit the device
/// reports (falling back to 512 bytes for a plain file).
pub struct FileDriver {
    file: File,
    path: PathBuf,
    io_unit: u64,
    size: u64,
}

impl FileDriver {
    /// Opens `path` for reading and writing, creating it (empty) if `create`
    /// is set and nothing exists there yet.
    pub fn open(path: &Path, create: bool) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(create)
            .open(path)?;

        let io_unit = native_io_unit(&file)?;
        let size = current_size(path, &file)?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
            io_unit,
            size,
        })
    }

    /// The filesystem's native I/O unit, as reported by `fstat`.
    pub fn io_unit(&self) -> u64 {
        self.io_unit
    }

    /// Grows the backing store to exactly `len` bytes. Used by `newfs-mkfs`
    /// to size a freshly created regular file before formatting it; a no-op
    /// if `len` is already the current size.
    pub fn ensure_size(&mut self, len: u64) -> io::Result<()> {
        if len != self.size {
            self.file.set_len(len)?;
            self.size = len;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The backing store's current size: sector count from `utils::disk` for a
/// block or char device, plain file length otherwise.
fn current_size(path: &Path, file: &File) -> io::Result<u64> {
    match utils::disk::get_disk_size(path) {
        Ok(sectors) if sectors > 0 => Ok(sectors * 512),
        _ => Ok(file.metadata()?.len()),
    }
}

/// Reads the device's native I/O unit (`st_blksize`), falling back to 512
/// bytes if the stat call fails.
fn native_io_unit(file: &File) -> io::Result<u64> {
    let mut stat: libc::stat = unsafe { std::mem::zeroed() };
    let ret = unsafe { libc::fstat(file.as_raw_fd(), &mut stat) };
    if ret < 0 {
        return Ok(512);
    }
    Ok(stat.st_blksize.max(512) as u64)
}

impl BlockDriver for FileDriver {
    fn seek(&mut self, offset: u64) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.file.read_exact(buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        self.file.write_all(buf)
    }

    fn ioctl_size(&mut self, req: SizeRequest) -> io::Result<u64> {
        match req {
            SizeRequest::DeviceSize => Ok(self.size),
            SizeRequest::DeviceIoSize => Ok(self.io_unit),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Prints `{bin}: error: {err}` to stderr, the shape every newfs binary
/// uses to report a core [`newfs_core::Error`].
pub fn print_error(bin: &str, err: &newfs_core::Error) {
    eprintln!("{bin}: error: {err}");
}
