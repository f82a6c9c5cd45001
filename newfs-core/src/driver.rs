//! The block driver abstraction consumed by the I/O adapter.
//!
//! This is deliberately thin: the core never opens a device itself, never
//! interprets `ioctl` selectors beyond the two it needs, and never retries a
//! failed call. A concrete driver (backed by a real block device or a
//! regular file) lives outside this crate; see `newfs-utils` for the one
//! shipped alongside this workspace, and [`MemDriver`] below for the one
//! used by this crate's own tests.

use std::io;

/// Selector for [`BlockDriver::ioctl_size`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeRequest {
    /// `REQ_DEVICE_SIZE`: total size of the device in bytes.
    DeviceSize,
    /// `REQ_DEVICE_IO_SZ`: the device's native I/O unit size, in bytes.
    DeviceIoSize,
}

/// The four primitives the core requires from a block device driver.
///
/// Implementations are expected to be synchronous: every call blocks the
/// calling thread until it completes, matching the single-threaded
/// scheduling model of the core (there is no internal suspension anywhere
/// above this layer).
pub trait BlockDriver {
    /// Seeks the device to `offset`, in bytes from the start.
    fn seek(&mut self, offset: u64) -> io::Result<()>;

    /// Reads exactly `buf.len()` bytes at the current position. `buf.len()`
    /// is always a multiple of the driver's native I/O unit size.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<()>;

    /// Writes exactly `buf.len()` bytes at the current position. `buf.len()`
    /// is always a multiple of the driver's native I/O unit size.
    fn write(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Services an `ioctl` size request.
    fn ioctl_size(&mut self, req: SizeRequest) -> io::Result<u64>;

    /// Closes the device. Called exactly once, at the end of `unmount`.
    fn close(&mut self) -> io::Result<()>;
}

/// An in-memory [`BlockDriver`] used by this crate's unit and integration
/// tests, so they never touch the real filesystem.
pub struct MemDriver {
    data: Vec<u8>,
    pos: usize,
    io_unit: u64,
}

impl MemDriver {
    /// Creates a new in-memory device of `len` bytes, all zeroed, with the
    /// given native I/O unit size.
    pub fn new(len: usize, io_unit: u64) -> Self {
        Self {
            data: vec![0; len],
            pos: 0,
            io_unit,
        }
    }

    /// Returns the raw backing bytes, e.g. to hash a region for the
    /// idempotent-remount test property.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
}

impl BlockDriver for MemDriver {
    fn seek(&mut self, offset: u64) -> io::Result<()> {
        self.pos = offset as usize;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let end = self.pos + buf.len();
        if end > self.data.len() {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "read past end of device"));
        }
        buf.copy_from_slice(&self.data[self.pos..end]);
        self.pos = end;
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        let end = self.pos + buf.len();
        if end > self.data.len() {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "write past end of device"));
        }
        self.data[self.pos..end].copy_from_slice(buf);
        self.pos = end;
        Ok(())
    }

    fn ioctl_size(&mut self, req: SizeRequest) -> io::Result<u64> {
        match req {
            SizeRequest::DeviceSize => Ok(self.data.len() as u64),
            SizeRequest::DeviceIoSize => Ok(self.io_unit),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}
