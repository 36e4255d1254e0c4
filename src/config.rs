//! Device memory map and configuration.
//!
//! This module centralizes the physical addresses of the HandyARM register
//! blocks, eliminating magic numbers in driver code. Addresses are part of
//! the wire contract with the host and must match its mapping exactly.
//!
//! # Memory map (default host mapping)
//!
//! | Block               | Base address | Window                  |
//! |---------------------|--------------|-------------------------|
//! | Console transmit    | 0xE000_0000  | start_addr, length      |
//! | Console receive     | 0xE000_1000  | offsets + 0x100 buffer  |
//! | Flash programmer    | 0xE100_0000  | 0x24 bytes of registers |
//!
//! Rather than baking these into the drivers, a [`DeviceMap`] holds the
//! validated base addresses and hands out driver instances. That keeps the
//! addresses in one place and lets tests build the same drivers over
//! in-memory register doubles instead.

use crate::console::Console;
use crate::flash::FlashProgrammer;
use crate::mmio::Region;
use crate::regs::{self, FlashRegs, ReceiveRegs, TransmitRegs};

/// Console transmit block base address (guest-to-host channel).
pub const TRANSMIT_BASE: usize = 0xE000_0000;

/// Console receive block base address (host-to-guest channel).
pub const RECEIVE_BASE: usize = 0xE000_1000;

/// Flash programmer block base address.
pub const FLASH_PROG_BASE: usize = 0xE100_0000;

/// Receive buffer capacity of the default host mapping, sized so the
/// receive window ends exactly at the next 4 KiB boundary.
pub const RECEIVE_CAPACITY: usize = 0xF00;

/// Errors detected while validating a device mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapError {
    /// A block base address was zero.
    ZeroAddress,
    /// A block base address (or test backing buffer) is not aligned for
    /// its widest register field.
    Misaligned,
    /// Two register windows overlap.
    Overlapping,
    /// A register window wraps past the end of the address space.
    AddressOverflow,
}

impl MapError {
    /// Human-readable description of the error.
    pub const fn description(self) -> &'static str {
        match self {
            MapError::ZeroAddress => "register block base address is zero",
            MapError::Misaligned => "register block is not word aligned",
            MapError::Overlapping => "register windows overlap",
            MapError::AddressOverflow => "register window wraps the address space",
        }
    }
}

/// Result type for mapping validation.
pub type MapResult<T> = Result<T, MapError>;

/// Validated base addresses for the three HandyARM register blocks.
///
/// Construct once at startup and hand out driver instances from it:
///
/// ```no_run
/// use handyarm_guest::config::DeviceMap;
///
/// let map = DeviceMap::DEFAULT;
/// // SAFETY: the host maps the blocks at the default addresses, and this
/// // is the only place drivers are constructed.
/// let mut console = unsafe { map.console() };
/// let mut flash = unsafe { map.flash_programmer() };
/// flash.init();
/// console.write(b"hello host\n");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceMap {
    transmit_base: usize,
    receive_base: usize,
    flash_base: usize,
    receive_capacity: usize,
}

impl DeviceMap {
    /// The mapping the stock HandyARM host uses.
    pub const DEFAULT: DeviceMap = DeviceMap {
        transmit_base: TRANSMIT_BASE,
        receive_base: RECEIVE_BASE,
        flash_base: FLASH_PROG_BASE,
        receive_capacity: RECEIVE_CAPACITY,
    };

    /// Build a mapping from explicit addresses, validating alignment and
    /// that no two register windows overlap.
    ///
    /// `receive_capacity` is the host's receive buffer size in bytes; it
    /// determines the receive window span (`0x100 + capacity`).
    pub fn new(
        transmit_base: usize,
        receive_base: usize,
        flash_base: usize,
        receive_capacity: usize,
    ) -> MapResult<DeviceMap> {
        let windows = [
            (transmit_base, regs::tx::SPAN, align_for_transmit()),
            (receive_base, regs::rx::span(receive_capacity), 4),
            (flash_base, regs::fp::SPAN, 4),
        ];

        for &(base, span, align) in &windows {
            if base == 0 {
                return Err(MapError::ZeroAddress);
            }
            if base % align != 0 {
                return Err(MapError::Misaligned);
            }
            if base.checked_add(span).is_none() {
                return Err(MapError::AddressOverflow);
            }
        }
        for (i, &(a_base, a_span, _)) in windows.iter().enumerate() {
            for &(b_base, b_span, _) in &windows[i + 1..] {
                if a_base < b_base + b_span && b_base < a_base + a_span {
                    return Err(MapError::Overlapping);
                }
            }
        }

        Ok(DeviceMap {
            transmit_base,
            receive_base,
            flash_base,
            receive_capacity,
        })
    }

    pub const fn transmit_base(&self) -> usize {
        self.transmit_base
    }

    pub const fn receive_base(&self) -> usize {
        self.receive_base
    }

    pub const fn flash_base(&self) -> usize {
        self.flash_base
    }

    pub const fn receive_capacity(&self) -> usize {
        self.receive_capacity
    }

    /// Construct the console driver over this mapping.
    ///
    /// # Safety
    /// The transmit and receive blocks must actually be mapped at the
    /// recorded addresses, and at most one console may overlay them at any
    /// given time.
    pub unsafe fn console(&self) -> Console<'static> {
        let tx = TransmitRegs::new(Region::from_base_addr(self.transmit_base, regs::tx::SPAN));
        let rx = ReceiveRegs::new(Region::from_base_addr(
            self.receive_base,
            regs::rx::span(self.receive_capacity),
        ));
        Console::new(tx, rx)
    }

    /// Construct the flash programmer driver over this mapping.
    ///
    /// # Safety
    /// The flash programmer block must actually be mapped at the recorded
    /// address, and at most one programmer may overlay it at any given
    /// time.
    pub unsafe fn flash_programmer(&self) -> FlashProgrammer<'static> {
        FlashProgrammer::new(FlashRegs::new(Region::from_base_addr(
            self.flash_base,
            regs::fp::SPAN,
        )))
    }
}

/// The transmit block's first field is pointer-width, so its base needs
/// pointer alignment.
const fn align_for_transmit() -> usize {
    core::mem::align_of::<usize>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_map_validates() {
        let map = DeviceMap::new(
            TRANSMIT_BASE,
            RECEIVE_BASE,
            FLASH_PROG_BASE,
            RECEIVE_CAPACITY,
        )
        .unwrap();
        assert_eq!(map, DeviceMap::DEFAULT);
    }

    #[test]
    fn test_zero_base_rejected() {
        let err = DeviceMap::new(0, RECEIVE_BASE, FLASH_PROG_BASE, 64).unwrap_err();
        assert_eq!(err, MapError::ZeroAddress);
    }

    #[test]
    fn test_misaligned_base_rejected() {
        let err = DeviceMap::new(TRANSMIT_BASE, RECEIVE_BASE + 2, FLASH_PROG_BASE, 64).unwrap_err();
        assert_eq!(err, MapError::Misaligned);
    }

    #[test]
    fn test_overlapping_windows_rejected() {
        // Receive window (0x100 + capacity) runs into the flash block.
        let err = DeviceMap::new(0x1000_0000, 0x2000_0000, 0x2000_0100, 0x200).unwrap_err();
        assert_eq!(err, MapError::Overlapping);
    }

    #[test]
    fn test_window_wrap_rejected() {
        let err = DeviceMap::new(usize::MAX - 7, RECEIVE_BASE, FLASH_PROG_BASE, 64).unwrap_err();
        assert_eq!(err, MapError::AddressOverflow);
    }

    #[test]
    fn test_error_descriptions() {
        assert!(!MapError::ZeroAddress.description().is_empty());
        assert!(!MapError::Overlapping.description().is_empty());
    }
}
