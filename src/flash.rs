//! Raw flash access used by the configuration store.
//!
//! The store only needs three blocking primitives: erase a sector, read and
//! write. All of them take 4-byte aligned addresses and lengths; see
//! [`align_up`].
//!
//! With the `std` feature a [`RamFlash`] is available to run the store on the
//! host.

use crate::consts::FLASH_ALIGNMENT;

/// Blocking, non-reentrant access to raw flash.
///
/// Implementations must never be called from interrupt context.
pub trait Flash {
    /// Error reported by the underlying driver.
    type Error: core::fmt::Debug;

    /// Size of the erase unit, in bytes.
    const SECTOR_SIZE: u32;

    /// Erases sector number `sector` (address `sector * SECTOR_SIZE`), setting every byte to `0xFF`.
    fn erase_sector(&mut self, sector: u32) -> Result<(), Self::Error>;

    /// Fills `buf` from `addr`. Both are 4-byte aligned.
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Programs `data` at `addr`. Both are 4-byte aligned.
    fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), Self::Error>;
}

/// Rounds `n` up to the next multiple of 4.
pub const fn align_up(n: usize) -> usize {
    n.div_ceil(FLASH_ALIGNMENT) * FLASH_ALIGNMENT
}

#[cfg(feature = "std")]
pub use ram::{RamFlash, RamFlashError};

#[cfg(feature = "std")]
mod ram {
    use super::Flash;
    use crate::consts::{FLASH_ALIGNMENT, FLASH_SECTOR_SIZE};

    /// Failure injected into, or detected by, a [`RamFlash`].
    #[derive(PartialEq, Eq, Clone, Copy, Debug, thiserror::Error)]
    pub enum RamFlashError {
        /// Address or length not 4-byte aligned.
        #[error("unaligned access at {addr:#x} ({len} bytes)")]
        Unaligned {
            /// Requested address.
            addr: u32,
            /// Requested length.
            len: usize,
        },
        /// Access outside of the simulated region.
        #[error("access at {addr:#x} ({len} bytes) is out of bounds")]
        OutOfBounds {
            /// Requested address.
            addr: u32,
            /// Requested length.
            len: usize,
        },
        /// Simulated transient failure.
        #[error("injected failure")]
        Injected,
    }

    /// In-memory flash region starting at `base`.
    ///
    /// Rejects unaligned accesses the way SPI flash drivers do, and can be told to fail the
    /// next few operations to exercise retry handling.
    #[derive(Debug, Clone)]
    pub struct RamFlash {
        base: u32,
        mem: Vec<u8>,
        fail_next: usize,
        fail_at: Option<u32>,
        /// Number of erase, read and write calls made so far, failed ones included.
        pub operations: usize,
    }

    impl RamFlash {
        /// Creates an erased region of `sectors` sectors at `base`.
        pub fn new(base: u32, sectors: usize) -> Self {
            Self {
                base,
                mem: vec![0xff; sectors * FLASH_SECTOR_SIZE as usize],
                fail_next: 0,
                fail_at: None,
                operations: 0,
            }
        }

        /// Makes the next `count` operations fail with [`RamFlashError::Injected`].
        pub fn fail_next(&mut self, count: usize) {
            self.fail_next = count;
        }

        /// Makes every operation starting at `addr` fail with [`RamFlashError::Injected`].
        pub fn fail_at(&mut self, addr: Option<u32>) {
            self.fail_at = addr;
        }

        /// Raw view of the region.
        pub fn contents(&self) -> &[u8] {
            &self.mem
        }

        /// Mutable raw view of the region, for corrupting images in tests.
        pub fn contents_mut(&mut self) -> &mut [u8] {
            &mut self.mem
        }

        fn range(
            &mut self,
            addr: u32,
            len: usize,
        ) -> Result<core::ops::Range<usize>, RamFlashError> {
            self.operations += 1;
            if self.fail_next > 0 {
                self.fail_next -= 1;
                return Err(RamFlashError::Injected);
            }
            if self.fail_at == Some(addr) {
                return Err(RamFlashError::Injected);
            }
            if addr as usize % FLASH_ALIGNMENT != 0 || len % FLASH_ALIGNMENT != 0 {
                return Err(RamFlashError::Unaligned { addr, len });
            }
            let start = addr
                .checked_sub(self.base)
                .ok_or(RamFlashError::OutOfBounds { addr, len })? as usize;
            let end = start + len;
            if end > self.mem.len() {
                return Err(RamFlashError::OutOfBounds { addr, len });
            }
            Ok(start..end)
        }
    }

    impl Flash for RamFlash {
        type Error = RamFlashError;

        const SECTOR_SIZE: u32 = FLASH_SECTOR_SIZE;

        fn erase_sector(&mut self, sector: u32) -> Result<(), Self::Error> {
            let range = self.range(sector * Self::SECTOR_SIZE, Self::SECTOR_SIZE as usize)?;
            self.mem[range].fill(0xff);
            Ok(())
        }

        fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
            let range = self.range(addr, buf.len())?;
            buf.copy_from_slice(&self.mem[range]);
            Ok(())
        }

        fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), Self::Error> {
            let range = self.range(addr, data.len())?;
            // NOR flash can only clear bits.
            for (cell, byte) in self.mem[range].iter_mut().zip(data) {
                *cell &= *byte;
            }
            Ok(())
        }
    }
}
