//! Memory-mapped register region overlay.
//!
//! Every HandyARM register block is a small window of device memory at a
//! fixed physical address. [`Region`] is the one primitive the register
//! layer is built on: a base pointer plus a span, with every access
//! performed as a single volatile load or store at a fixed byte offset.
//! Volatile accesses are never elided and keep program order relative to
//! each other, which is what the host-side device relies on.
//!
//! A region can overlay real device memory (via [`Region::from_base_addr`])
//! or a plain byte buffer, which is how the driver layer is unit-tested
//! without hardware:
//!
//! ```
//! use handyarm_guest::mmio::Region;
//!
//! #[repr(align(8))]
//! struct Backing([u8; 16]);
//!
//! let mut backing = Backing([0; 16]);
//! let mut region = Region::from_slice(&mut backing.0).unwrap();
//! region.write_u32(0x04, 0xA5A5_5A5A);
//! assert_eq!(region.read_u32(0x04), 0xA5A5_5A5A);
//! ```
//!
//! Overlays borrow their backing region and cannot outlive it:
//!
//! ```compile_fail
//! use handyarm_guest::mmio::Region;
//!
//! let region = {
//!     let mut backing = [0u8; 16];
//!     Region::from_slice(&mut backing).unwrap()
//! }; // backing dropped here
//! let _ = region.read_u32(0);
//! ```

use core::marker::PhantomData;
use core::mem::align_of;

use crate::config::{MapError, MapResult};

/// A borrowed window of register memory.
///
/// The lifetime `'m` ties the overlay to its backing storage. Hardware
/// overlays use `'static`; test overlays borrow an in-memory buffer.
#[derive(Debug)]
pub struct Region<'m> {
    base: *mut u8,
    span: usize,
    _backing: PhantomData<&'m mut [u8]>,
}

// SAFETY: Region is the sole handle to its window (construction either
// consumes an exclusive borrow of the backing buffer, or the from_base_addr
// caller promises exclusivity). Moving that handle to another execution
// context moves the whole window with it; there is no thread affinity.
unsafe impl Send for Region<'_> {}

impl<'m> Region<'m> {
    /// Overlay a fixed device address.
    ///
    /// # Safety
    /// `addr..addr + span` must be a mapped register window, valid for the
    /// lifetime `'m`, accessed through no other `Region` at the same time.
    /// On hardware the window must be mapped as device memory (not normal
    /// cacheable memory) so that volatile accesses reach the host.
    pub unsafe fn from_base_addr(addr: usize, span: usize) -> Region<'m> {
        Region {
            base: addr as *mut u8,
            span,
            _backing: PhantomData,
        }
    }

    /// Overlay a caller-provided byte buffer (a register window test
    /// double).
    ///
    /// The buffer must be aligned for the widest register access, since
    /// register fields are read and written at their natural width.
    pub fn from_slice(backing: &'m mut [u8]) -> MapResult<Region<'m>> {
        if (backing.as_ptr() as usize) % align_of::<usize>() != 0 {
            return Err(MapError::Misaligned);
        }
        Ok(Region {
            base: backing.as_mut_ptr(),
            span: backing.len(),
            _backing: PhantomData,
        })
    }

    /// Size of the window in bytes.
    pub const fn span(&self) -> usize {
        self.span
    }

    #[inline(always)]
    fn check(&self, offset: usize, width: usize) {
        debug_assert!(
            offset % width == 0 && offset + width <= self.span,
            "register access outside window"
        );
    }

    /// Single volatile 32-bit load at `offset`.
    #[inline]
    pub fn read_u32(&self, offset: usize) -> u32 {
        self.check(offset, 4);
        unsafe { (self.base.add(offset) as *const u32).read_volatile() }
    }

    /// Single volatile 32-bit store at `offset`.
    #[inline]
    pub fn write_u32(&mut self, offset: usize, value: u32) {
        self.check(offset, 4);
        unsafe { (self.base.add(offset) as *mut u32).write_volatile(value) }
    }

    /// Single volatile pointer-width load at `offset`.
    #[inline]
    pub fn read_usize(&self, offset: usize) -> usize {
        self.check(offset, core::mem::size_of::<usize>());
        unsafe { (self.base.add(offset) as *const usize).read_volatile() }
    }

    /// Single volatile pointer-width store at `offset`.
    #[inline]
    pub fn write_usize(&mut self, offset: usize, value: usize) {
        self.check(offset, core::mem::size_of::<usize>());
        unsafe { (self.base.add(offset) as *mut usize).write_volatile(value) }
    }

    /// Single volatile byte load at `offset`.
    #[inline]
    pub fn read_u8(&self, offset: usize) -> u8 {
        self.check(offset, 1);
        unsafe { self.base.add(offset).read_volatile() }
    }

    /// Single volatile byte store at `offset`.
    #[inline]
    pub fn write_u8(&mut self, offset: usize, value: u8) {
        self.check(offset, 1);
        unsafe { self.base.add(offset).write_volatile(value) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(align(8))]
    struct Backing<const N: usize>([u8; N]);

    #[test]
    fn test_word_access_roundtrip() {
        let mut backing = Backing([0u8; 32]);
        let mut region = Region::from_slice(&mut backing.0).unwrap();
        region.write_u32(0x00, 0xDEAD_BEEF);
        region.write_u32(0x1C, 1);
        assert_eq!(region.read_u32(0x00), 0xDEAD_BEEF);
        assert_eq!(region.read_u32(0x1C), 1);
        assert_eq!(region.read_u32(0x04), 0);
    }

    #[test]
    fn test_byte_access() {
        let mut backing = Backing([0u8; 8]);
        let mut region = Region::from_slice(&mut backing.0).unwrap();
        region.write_u8(3, 0x7F);
        assert_eq!(region.read_u8(3), 0x7F);
        assert_eq!(region.read_u8(2), 0);
    }

    #[test]
    fn test_pointer_width_access() {
        let mut backing = Backing([0u8; 16]);
        let mut region = Region::from_slice(&mut backing.0).unwrap();
        region.write_usize(0, 0x1234);
        assert_eq!(region.read_usize(0), 0x1234);
    }

    #[test]
    fn test_from_slice_rejects_misaligned() {
        let mut backing = Backing([0u8; 16]);
        // Skew the window by one byte so it cannot hold word registers.
        let skewed = &mut backing.0[1..];
        assert_eq!(Region::from_slice(skewed).unwrap_err(), MapError::Misaligned);
    }

    #[test]
    fn test_span_reported() {
        let mut backing = Backing([0u8; 24]);
        let region = Region::from_slice(&mut backing.0).unwrap();
        assert_eq!(region.span(), 24);
    }
}
