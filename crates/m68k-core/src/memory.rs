//! Guest memory region: a fixed-size, big-endian, byte-addressable buffer.
//!
//! All multi-byte values are stored big-endian regardless of host byte
//! order, matching what a 68000 bus would carry. Every access is
//! bounds-checked; an out-of-range or misaligned access is reported as a
//! [`BusError`], never forwarded to host memory.

use thiserror::Error;

/// Bus-level access failures visible to the CPU and the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum BusError {
    /// The access touched an address outside the guest region.
    #[error("access at {addr:#010x} is outside the {len:#x}-byte guest region")]
    OutOfRange {
        /// First address of the offending access.
        addr: u32,
        /// Total size of the guest region in bytes.
        len: u32,
    },
    /// A word or long access used an odd address (68000 address-error rule).
    #[error("word-sized access at odd address {addr:#010x}")]
    Misaligned {
        /// Address of the offending access.
        addr: u32,
    },
}

/// Owned, contiguous guest address space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    bytes: Box<[u8]>,
}

impl Memory {
    /// Allocates a zeroed guest region of `len` bytes.
    #[must_use]
    pub fn new(len: u32) -> Self {
        Self {
            bytes: vec![0; len as usize].into_boxed_slice(),
        }
    }

    /// Total size of the region in bytes.
    #[must_use]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u32 {
        self.bytes.len() as u32
    }

    fn check(&self, addr: u32, size: u32) -> Result<usize, BusError> {
        let len = self.len();
        if addr.checked_add(size).is_some_and(|end| end <= len) {
            Ok(addr as usize)
        } else {
            Err(BusError::OutOfRange { addr, len })
        }
    }

    fn check_aligned(&self, addr: u32, size: u32) -> Result<usize, BusError> {
        if addr & 1 != 0 {
            return Err(BusError::Misaligned { addr });
        }
        self.check(addr, size)
    }

    /// Reads one byte.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::OutOfRange`] when `addr` is outside the region.
    pub fn read_u8(&self, addr: u32) -> Result<u8, BusError> {
        let i = self.check(addr, 1)?;
        Ok(self.bytes[i])
    }

    /// Reads a big-endian word. `addr` must be even.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Misaligned`] for odd addresses and
    /// [`BusError::OutOfRange`] when the word crosses the region end.
    pub fn read_u16(&self, addr: u32) -> Result<u16, BusError> {
        let i = self.check_aligned(addr, 2)?;
        Ok(u16::from_be_bytes([self.bytes[i], self.bytes[i + 1]]))
    }

    /// Reads a big-endian longword. `addr` must be even.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Misaligned`] for odd addresses and
    /// [`BusError::OutOfRange`] when the longword crosses the region end.
    pub fn read_u32(&self, addr: u32) -> Result<u32, BusError> {
        let i = self.check_aligned(addr, 4)?;
        Ok(u32::from_be_bytes([
            self.bytes[i],
            self.bytes[i + 1],
            self.bytes[i + 2],
            self.bytes[i + 3],
        ]))
    }

    /// Writes one byte.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::OutOfRange`] when `addr` is outside the region.
    pub fn write_u8(&mut self, addr: u32, value: u8) -> Result<(), BusError> {
        let i = self.check(addr, 1)?;
        self.bytes[i] = value;
        Ok(())
    }

    /// Writes a big-endian word. `addr` must be even.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Misaligned`] for odd addresses and
    /// [`BusError::OutOfRange`] when the word crosses the region end.
    pub fn write_u16(&mut self, addr: u32, value: u16) -> Result<(), BusError> {
        let i = self.check_aligned(addr, 2)?;
        self.bytes[i..i + 2].copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    /// Writes a big-endian longword. `addr` must be even.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Misaligned`] for odd addresses and
    /// [`BusError::OutOfRange`] when the longword crosses the region end.
    pub fn write_u32(&mut self, addr: u32, value: u32) -> Result<(), BusError> {
        let i = self.check_aligned(addr, 4)?;
        self.bytes[i..i + 4].copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    /// Borrows `len` bytes starting at `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::OutOfRange`] when the range leaves the region.
    pub fn bytes(&self, addr: u32, len: u32) -> Result<&[u8], BusError> {
        let i = self.check(addr, len)?;
        Ok(&self.bytes[i..i + len as usize])
    }

    /// Mutably borrows `len` bytes starting at `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::OutOfRange`] when the range leaves the region.
    pub fn bytes_mut(&mut self, addr: u32, len: u32) -> Result<&mut [u8], BusError> {
        let i = self.check(addr, len)?;
        Ok(&mut self.bytes[i..i + len as usize])
    }

    /// Fills `len` bytes starting at `addr` with `value`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::OutOfRange`] when the range leaves the region.
    pub fn fill(&mut self, addr: u32, len: u32, value: u8) -> Result<(), BusError> {
        self.bytes_mut(addr, len)?.fill(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{BusError, Memory};

    #[test]
    fn values_round_trip_big_endian() {
        let mut mem = Memory::new(16);
        mem.write_u32(0, 0x1234_5678).unwrap();
        assert_eq!(mem.read_u8(0), Ok(0x12));
        assert_eq!(mem.read_u8(3), Ok(0x78));
        assert_eq!(mem.read_u16(0), Ok(0x1234));
        assert_eq!(mem.read_u16(2), Ok(0x5678));
        assert_eq!(mem.read_u32(0), Ok(0x1234_5678));
    }

    #[test]
    fn out_of_range_access_faults_instead_of_touching_host_memory() {
        let mut mem = Memory::new(8);
        assert_eq!(
            mem.read_u8(8),
            Err(BusError::OutOfRange { addr: 8, len: 8 })
        );
        assert_eq!(
            mem.read_u32(6),
            Err(BusError::OutOfRange { addr: 6, len: 8 })
        );
        assert_eq!(
            mem.write_u16(u32::MAX - 1, 0),
            Err(BusError::OutOfRange {
                addr: u32::MAX - 1,
                len: 8
            })
        );
    }

    #[test]
    fn odd_word_access_is_an_address_error() {
        let mem = Memory::new(8);
        assert_eq!(mem.read_u16(1), Err(BusError::Misaligned { addr: 1 }));
        assert_eq!(mem.read_u32(3), Err(BusError::Misaligned { addr: 3 }));
        assert_eq!(mem.read_u8(1), Ok(0));
    }

    #[test]
    fn fill_patterns_the_requested_window_only() {
        let mut mem = Memory::new(8);
        mem.fill(2, 4, 0xFF).unwrap();
        assert_eq!(mem.bytes(0, 8).unwrap(), &[0, 0, 0xFF, 0xFF, 0xFF, 0xFF, 0, 0]);
    }
}
