//! Translates arbitrary `(offset, length)` byte ranges into aligned,
//! native-I/O-unit device accesses.

use crate::driver::BlockDriver;
use crate::error::{Error, Result};

fn round_down(value: u64, round: u64) -> u64 {
    value - (value % round)
}

fn round_up(value: u64, round: u64) -> u64 {
    if value % round == 0 {
        value
    } else {
        round_down(value, round) + round
    }
}

/// Stitches arbitrary-offset, arbitrary-length accesses out of a driver that
/// only reads/writes whole native I/O units.
pub struct BlockIo<D: BlockDriver> {
    driver: D,
    io_unit: u64,
    block_size: u64,
}

impl<D: BlockDriver> BlockIo<D> {
    /// Wraps `driver`, querying it for its native I/O unit size and
    /// deriving the filesystem's logical block size (`2 × io_unit`).
    pub fn new(mut driver: D) -> Result<Self> {
        let io_unit = driver.ioctl_size(crate::driver::SizeRequest::DeviceIoSize)?;
        Ok(Self {
            driver,
            io_unit,
            block_size: io_unit * 2,
        })
    }

    /// The filesystem's logical block size, `2 × driver.io_unit`.
    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// The total size of the backing device, in bytes.
    pub fn device_size(&mut self) -> Result<u64> {
        Ok(self.driver.ioctl_size(crate::driver::SizeRequest::DeviceSize)?)
    }

    /// Reads `len` bytes at `offset`, neither of which need be aligned to
    /// the block size.
    pub fn read(&mut self, offset: u64, len: u64) -> Result<Vec<u8>> {
        let aligned_off = round_down(offset, self.block_size);
        let bias = offset - aligned_off;
        let aligned_len = round_up(len + bias, self.block_size);

        let mut scratch = vec![0u8; aligned_len as usize];
        self.driver.seek(aligned_off).map_err(Error::Io)?;
        for chunk in scratch.chunks_mut(self.io_unit as usize) {
            self.driver.read(chunk).map_err(Error::Io)?;
        }

        let start = bias as usize;
        let end = start + len as usize;
        Ok(scratch[start..end].to_vec())
    }

    /// Writes `bytes` at `offset`, neither of which need be aligned to the
    /// block size. Implemented as read-modify-write on the aligned range.
    pub fn write(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        let len = bytes.len() as u64;
        let aligned_off = round_down(offset, self.block_size);
        let bias = offset - aligned_off;
        let aligned_len = round_up(len + bias, self.block_size);

        let mut scratch = vec![0u8; aligned_len as usize];
        self.driver.seek(aligned_off).map_err(Error::Io)?;
        for chunk in scratch.chunks_mut(self.io_unit as usize) {
            self.driver.read(chunk).map_err(Error::Io)?;
        }

        let start = bias as usize;
        scratch[start..start + bytes.len()].copy_from_slice(bytes);

        self.driver.seek(aligned_off).map_err(Error::Io)?;
        for chunk in scratch.chunks(self.io_unit as usize) {
            self.driver.write(chunk).map_err(Error::Io)?;
        }
        Ok(())
    }

    /// Closes the underlying driver. Called once, at the end of `unmount`.
    pub fn close(&mut self) -> Result<()> {
        Ok(self.driver.close()?)
    }

    /// Consumes the adapter and hands back the driver it wrapped. Mainly
    /// useful to remount the same backing store, or to inspect it directly
    /// in tests.
    pub fn into_driver(self) -> D {
        self.driver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::MemDriver;

    #[test]
    fn aligned_round_trip() {
        let mut io = BlockIo::new(MemDriver::new(4096, 512)).unwrap();
        assert_eq!(io.block_size(), 1024);
        io.write(0, b"hello").unwrap();
        assert_eq!(io.read(0, 5).unwrap(), b"hello");
    }

    #[test]
    fn unaligned_write_does_not_disturb_neighbors() {
        let mut io = BlockIo::new(MemDriver::new(4096, 512)).unwrap();
        let block_size = io.block_size();
        io.write(0, &[0xAAu8; 1]).unwrap();
        io.write(block_size - 1, &[0xBBu8; 1]).unwrap();

        io.write(1, b"xyz").unwrap();
        assert_eq!(io.read(1, 3).unwrap(), b"xyz");
        assert_eq!(io.read(0, 1).unwrap(), vec![0xAA]);
        assert_eq!(io.read(4, 1).unwrap(), vec![0u8]);
        assert_eq!(io.read(block_size - 1, 1).unwrap(), vec![0xBB]);
    }
}
