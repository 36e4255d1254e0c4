//! Simulated HandyARM host devices for driver tests.
//!
//! The drivers only ever touch register memory, so they can be exercised
//! on the host against plain in-memory register windows. What plain
//! memory cannot do is react to stores the way the device does: copy a
//! transmit buffer when `length` is written, or program a flash word when
//! `value` is written. These doubles close that gap with explicit service
//! calls: the test performs a driver operation, then asks the double to
//! apply the side effect the real host performs at store time.
//!
//! ```text
//! prog.write_word(0x40, value);   // guest stores offset, then value
//! dev.service_program();          // host applies the pending commit
//! assert_eq!(dev.read_word(0x40), value);
//! ```
//!
//! Like the real device, the doubles panic on protocol violations
//! (unaligned or out-of-range offsets) rather than reporting them; the
//! register contract has no error channel.

use core::cell::UnsafeCell;

use crate::console::Console;
use crate::flash::{Control, ERASED_WORD, PAGE_SIZE};
use crate::mmio::Region;
use crate::regs::{self, FlashRegs, ReceiveRegs, TransmitRegs};

/// Register window backing storage, aligned for pointer-width fields.
///
/// `UnsafeCell` lets the host side mutate the window while a driver
/// overlay holds a shared borrow; both sides go through raw pointers, and
/// the tests are single-threaded, so accesses never actually race.
#[repr(align(8))]
struct Window<const N: usize>(UnsafeCell<[u8; N]>);

impl<const N: usize> Window<N> {
    const fn new() -> Self {
        Self(UnsafeCell::new([0; N]))
    }

    fn region(&self) -> Region<'_> {
        // SAFETY: the window owns N bytes for as long as `self` lives.
        unsafe { Region::from_base_addr(self.0.get() as usize, N) }
    }
}

/// Receive ring capacity of the simulated console host.
pub const RX_CAPACITY: usize = 64;

const RX_SPAN: usize = regs::rx::span(RX_CAPACITY);
const TX_SPAN: usize = regs::tx::SPAN;

/// In-memory double of the console host: transmit sink plus receive
/// producer.
pub struct ConsoleHost {
    tx: Window<{ TX_SPAN }>,
    rx: Window<{ RX_SPAN }>,
}

impl ConsoleHost {
    pub fn new() -> Self {
        let host = Self {
            tx: Window::new(),
            rx: Window::new(),
        };
        host.rx
            .region()
            .write_u32(regs::rx::LENGTH_OFFSET, RX_CAPACITY as u32);
        host
    }

    /// Build the guest console driver over this host's register windows.
    ///
    /// Build at most one per host; the driver assumes it is the only
    /// consumer.
    pub fn console(&self) -> Console<'_> {
        Console::new(
            TransmitRegs::new(self.tx.region()),
            ReceiveRegs::new(self.rx.region()),
        )
    }

    /// Producer side: deposit bytes into the receive ring and advance
    /// `end_offset`. Stops when the ring is full (one slot is kept free
    /// so full and empty stay distinguishable); returns the count
    /// actually deposited.
    pub fn feed(&self, data: &[u8]) -> usize {
        let mut ring = self.rx.region();
        let start = ring.read_u32(regs::rx::START_OFFSET_OFFSET) as usize;
        let mut end = ring.read_u32(regs::rx::END_OFFSET_OFFSET) as usize;

        let mut fed = 0;
        for &byte in data {
            let next = (end + 1) % RX_CAPACITY;
            if next == start {
                break;
            }
            ring.write_u8(regs::rx::BUFFER_OFFSET + end, byte);
            end = next;
            fed += 1;
        }
        ring.write_u32(regs::rx::END_OFFSET_OFFSET, end as u32);
        fed
    }

    /// Bytes deposited but not yet consumed.
    pub fn pending(&self) -> usize {
        let ring = self.rx.region();
        let start = ring.read_u32(regs::rx::START_OFFSET_OFFSET) as usize;
        let end = ring.read_u32(regs::rx::END_OFFSET_OFFSET) as usize;
        (end + RX_CAPACITY - start) % RX_CAPACITY
    }

    /// Current consumer offset, as the producer observes it.
    pub fn start_offset(&self) -> u32 {
        self.rx.region().read_u32(regs::rx::START_OFFSET_OFFSET)
    }

    /// Length of the most recent transmit, in bytes (0 if none since the
    /// last harvest).
    pub fn last_transmit_len(&self) -> usize {
        self.tx.region().read_u32(regs::tx::LENGTH_OFFSET) as usize
    }

    /// Harvest the buffer described by the transmit registers and clear
    /// the pending length.
    ///
    /// The real host copies at the moment `length` is stored; a passive
    /// window cannot, so this reads the guest buffer after the fact.
    ///
    /// # Safety
    /// The buffer the guest transmitted must still be alive (the
    /// registers hold a raw address into guest memory).
    pub unsafe fn take_transmitted(&self) -> heapless::Vec<u8, 256> {
        let mut window = self.tx.region();
        let addr = window.read_usize(regs::tx::START_ADDR_OFFSET);
        let len = window.read_u32(regs::tx::LENGTH_OFFSET) as usize;
        assert!(len <= 256, "transmit larger than harvest buffer");

        let mut out = heapless::Vec::new();
        for i in 0..len {
            let _ = out.push(core::ptr::read((addr as *const u8).add(i)));
        }
        window.write_u32(regs::tx::LENGTH_OFFSET, 0);
        out
    }
}

impl Default for ConsoleHost {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory double of the host's flash device: `WORDS` 32-bit words,
/// erased to all ones, programmed with NAND semantics (stores can only
/// clear bits).
pub struct FlashDevice<const WORDS: usize> {
    regs: Window<{ regs::fp::SPAN }>,
    mem: UnsafeCell<[u32; WORDS]>,
}

impl<const WORDS: usize> FlashDevice<WORDS> {
    pub fn new() -> Self {
        Self {
            regs: Window::new(),
            mem: UnsafeCell::new([ERASED_WORD; WORDS]),
        }
    }

    /// Build the guest flash programmer driver over this device's
    /// register window. Build at most one per device.
    pub fn programmer(&self) -> crate::flash::FlashProgrammer<'_> {
        crate::flash::FlashProgrammer::new(FlashRegs::new(self.regs.region()))
    }

    /// Device capacity in bytes.
    pub const fn size_bytes(&self) -> usize {
        WORDS * 4
    }

    /// Apply a pending word commit: AND the value register into flash at
    /// the offset register, honoring write-enable and auto-increment.
    ///
    /// Returns whether the commit was accepted (`false` means the value
    /// was silently discarded because write-enable is clear).
    pub fn service_program(&self) -> bool {
        let mut window = self.regs.region();
        let control = window.read_u32(regs::fp::CONTROL_OFFSET);
        if control & Control::WRITE_ENABLE.bits() == 0 {
            return false;
        }

        let offset = window.read_u32(regs::fp::OFFSET_OFFSET) as usize;
        assert!(offset % 4 == 0, "flash program at unaligned offset {offset:#x}");
        assert!(offset + 4 <= WORDS * 4, "flash program out of bounds at {offset:#x}");

        let value = window.read_u32(regs::fp::VALUE_OFFSET);
        // SAFETY: single-threaded test double; no overlapping access.
        unsafe {
            let mem = &mut *self.mem.get();
            mem[offset / 4] &= value;
        }

        if control & Control::AUTO_INCREMENT.bits() != 0 {
            window.write_u32(regs::fp::OFFSET_OFFSET, (offset + 4) as u32);
        }
        true
    }

    /// Apply a pending page erase: fill the addressed page with all ones.
    /// Not gated by write-enable.
    pub fn service_erase(&self) {
        let window = self.regs.region();
        let page = window.read_u32(regs::fp::ERASE_PAGE_OFFSET) as usize;
        let page_words = PAGE_SIZE as usize / 4;
        let start = page * page_words;
        assert!(start + page_words <= WORDS, "flash erase of page {page} out of bounds");

        // SAFETY: single-threaded test double; no overlapping access.
        unsafe {
            let mem = &mut *self.mem.get();
            for word in &mut mem[start..start + page_words] {
                *word = ERASED_WORD;
            }
        }
    }

    /// External verification path: read a flash word back.
    pub fn read_word(&self, offset: u32) -> u32 {
        let offset = offset as usize;
        assert!(offset % 4 == 0, "flash read at unaligned offset {offset:#x}");
        assert!(offset + 4 <= WORDS * 4, "flash read out of bounds at {offset:#x}");
        // SAFETY: single-threaded test double; no overlapping access.
        unsafe { (*self.mem.get())[offset / 4] }
    }

    /// Current contents of the offset register (auto-increment is
    /// observable here).
    pub fn offset_reg(&self) -> u32 {
        self.regs.region().read_u32(regs::fp::OFFSET_OFFSET)
    }
}

impl<const WORDS: usize> Default for FlashDevice<WORDS> {
    fn default() -> Self {
        Self::new()
    }
}
