//! Register map definitions for the three HandyARM register blocks.
//!
//! Pure layout: byte-exact field offsets plus typed volatile accessors.
//! No protocol logic lives here; the console and flash drivers implement
//! the command semantics on top of these maps.
//!
//! # Block layouts
//!
//! | Block     | Field          | Offset              | Width   |
//! |-----------|----------------|---------------------|---------|
//! | Transmit  | `start_addr`   | 0x00                | pointer |
//! | Transmit  | `length`       | pointer width       | u32     |
//! | Receive   | `start_offset` | 0x00                | u32     |
//! | Receive   | `end_offset`   | 0x04                | u32     |
//! | Receive   | `length`       | 0x08                | u32     |
//! | Receive   | `buffer`       | 0x100               | bytes   |
//! | Flash     | `control`      | 0x00                | u32     |
//! | Flash     | `offset`       | 0x04                | u32     |
//! | Flash     | `value`        | 0x08 (write-only)   | u32     |
//! | Flash     | `erase_page`   | 0x20 (write-only)   | u32     |
//!
//! All blocks are packed; the receive buffer sits at 0x100 regardless of
//! what precedes it, and the flash block pads 0x0C..0x20.

use crate::mmio::Region;

/// Transmit block field offsets.
pub mod tx {
    /// `start_addr` register offset (pointer-width field).
    pub const START_ADDR_OFFSET: usize = 0x00;

    /// `length` register offset. The block is packed, so the 32-bit
    /// length sits directly after the pointer-width address field.
    pub const LENGTH_OFFSET: usize = core::mem::size_of::<usize>();

    /// Total window size in bytes.
    pub const SPAN: usize = LENGTH_OFFSET + 4;
}

/// Receive block field offsets.
pub mod rx {
    /// `start_offset` register offset (consumer index, guest-written).
    pub const START_OFFSET_OFFSET: usize = 0x00;

    /// `end_offset` register offset (producer index, host-written).
    pub const END_OFFSET_OFFSET: usize = 0x04;

    /// `length` register offset (buffer capacity in bytes).
    pub const LENGTH_OFFSET: usize = 0x08;

    /// Start of the data buffer within the window.
    pub const BUFFER_OFFSET: usize = 0x100;

    /// Window size for a receive block with `capacity` buffer bytes.
    pub const fn span(capacity: usize) -> usize {
        BUFFER_OFFSET + capacity
    }
}

/// Flash programmer block field offsets.
pub mod fp {
    /// `control` register offset.
    pub const CONTROL_OFFSET: usize = 0x00;

    /// `offset` register offset (target offset into flash).
    pub const OFFSET_OFFSET: usize = 0x04;

    /// `value` register offset (write-only; the store is the trigger).
    pub const VALUE_OFFSET: usize = 0x08;

    /// `erase_page` register offset (write-only; the store is the trigger).
    pub const ERASE_PAGE_OFFSET: usize = 0x20;

    /// Total window size in bytes.
    pub const SPAN: usize = ERASE_PAGE_OFFSET + 4;
}

/// Transmit register block overlay (guest-writable).
///
/// The region must span at least [`tx::SPAN`] bytes.
pub struct TransmitRegs<'m> {
    region: Region<'m>,
}

impl<'m> TransmitRegs<'m> {
    pub const fn new(region: Region<'m>) -> Self {
        Self { region }
    }

    /// Store the source buffer address. Must precede the length store.
    #[inline]
    pub fn set_start_addr(&mut self, addr: *const u8) {
        self.region.write_usize(tx::START_ADDR_OFFSET, addr as usize);
    }

    /// Store the transfer length. This store triggers the transfer; the
    /// host completes the copy before the store returns.
    #[inline]
    pub fn set_length(&mut self, length: u32) {
        self.region.write_u32(tx::LENGTH_OFFSET, length);
    }
}

/// Receive register block overlay (host-written ring, guest consumer).
///
/// The region must span [`rx::BUFFER_OFFSET`] plus the buffer capacity
/// the host reports in the `length` register.
pub struct ReceiveRegs<'m> {
    region: Region<'m>,
}

impl<'m> ReceiveRegs<'m> {
    pub const fn new(region: Region<'m>) -> Self {
        Self { region }
    }

    /// Current consumer offset.
    #[inline]
    pub fn start_offset(&self) -> u32 {
        self.region.read_u32(rx::START_OFFSET_OFFSET)
    }

    /// Advance the consumer offset. Observable by the host producer.
    #[inline]
    pub fn set_start_offset(&mut self, offset: u32) {
        self.region.write_u32(rx::START_OFFSET_OFFSET, offset);
    }

    /// Current producer offset. Only the host writes this field.
    #[inline]
    pub fn end_offset(&self) -> u32 {
        self.region.read_u32(rx::END_OFFSET_OFFSET)
    }

    /// Buffer capacity in bytes, as reported by the host.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.region.read_u32(rx::LENGTH_OFFSET)
    }

    /// Load one byte from the data buffer.
    #[inline]
    pub fn data_byte(&self, index: usize) -> u8 {
        self.region.read_u8(rx::BUFFER_OFFSET + index)
    }
}

/// Flash programmer register block overlay (guest-writable).
///
/// The region must span at least [`fp::SPAN`] bytes.
pub struct FlashRegs<'m> {
    region: Region<'m>,
}

impl<'m> FlashRegs<'m> {
    pub const fn new(region: Region<'m>) -> Self {
        Self { region }
    }

    #[inline]
    pub fn set_control(&mut self, value: u32) {
        self.region.write_u32(fp::CONTROL_OFFSET, value);
    }

    /// Store the target offset. Must precede the value store.
    #[inline]
    pub fn set_offset(&mut self, offset: u32) {
        self.region.write_u32(fp::OFFSET_OFFSET, offset);
    }

    /// Store the value to program. The store is the commit trigger.
    #[inline]
    pub fn set_value(&mut self, value: u32) {
        self.region.write_u32(fp::VALUE_OFFSET, value);
    }

    /// Store a page number. The store triggers the erase.
    #[inline]
    pub fn set_erase_page(&mut self, page: u32) {
        self.region.write_u32(fp::ERASE_PAGE_OFFSET, page);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmio::Region;

    #[repr(align(8))]
    struct Backing<const N: usize>([u8; N]);

    #[test]
    fn test_transmit_field_offsets() {
        // length sits directly after the packed pointer field.
        assert_eq!(tx::LENGTH_OFFSET, core::mem::size_of::<usize>());
        assert_eq!(tx::SPAN, tx::LENGTH_OFFSET + 4);

        let mut backing = Backing([0u8; tx::SPAN]);
        let mut regs = TransmitRegs::new(Region::from_slice(&mut backing.0).unwrap());
        regs.set_start_addr(0x2000 as *const u8);
        regs.set_length(17);
        drop(regs);
        assert_eq!(
            usize::from_ne_bytes(backing.0[..tx::LENGTH_OFFSET].try_into().unwrap()),
            0x2000
        );
        assert_eq!(
            u32::from_ne_bytes(backing.0[tx::LENGTH_OFFSET..tx::SPAN].try_into().unwrap()),
            17
        );
    }

    #[test]
    fn test_receive_buffer_starts_at_0x100() {
        let mut backing = Backing([0u8; rx::span(8)]);
        backing.0[rx::BUFFER_OFFSET] = b'A';
        backing.0[rx::BUFFER_OFFSET + 7] = b'Z';
        let regs = ReceiveRegs::new(Region::from_slice(&mut backing.0).unwrap());
        assert_eq!(regs.data_byte(0), b'A');
        assert_eq!(regs.data_byte(7), b'Z');
    }

    #[test]
    fn test_receive_index_fields() {
        let mut backing = Backing([0u8; rx::span(8)]);
        let mut regs = ReceiveRegs::new(Region::from_slice(&mut backing.0).unwrap());
        assert_eq!(regs.start_offset(), 0);
        assert_eq!(regs.end_offset(), 0);
        regs.set_start_offset(5);
        assert_eq!(regs.start_offset(), 5);
        drop(regs);
        assert_eq!(u32::from_ne_bytes(backing.0[0..4].try_into().unwrap()), 5);
    }

    #[test]
    fn test_flash_field_offsets() {
        let mut backing = Backing([0u8; fp::SPAN]);
        let mut regs = FlashRegs::new(Region::from_slice(&mut backing.0).unwrap());
        regs.set_control(0b11);
        regs.set_offset(0x40);
        regs.set_value(0xCAFE_F00D);
        regs.set_erase_page(9);
        drop(regs);
        let word = |o: usize| u32::from_ne_bytes(backing.0[o..o + 4].try_into().unwrap());
        assert_eq!(word(0x00), 0b11);
        assert_eq!(word(0x04), 0x40);
        assert_eq!(word(0x08), 0xCAFE_F00D);
        assert_eq!(word(0x20), 9);
        // Padding between value and erase_page stays untouched.
        assert!(backing.0[0x0C..0x20].iter().all(|&b| b == 0));
    }
}
