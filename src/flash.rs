//! Flash programmer driver.
//!
//! The programmer exposes a tiny command interface: a control register
//! gating writes, an offset/value pair where the value store commits a
//! word, and a write-only page-erase register. Flash has NAND semantics:
//! programming can only clear bits, so a word should be erased (all ones)
//! before it is rewritten.
//!
//! The register protocol has no status channel. A value store issued while
//! write-disabled is silently discarded by the host; callers that care
//! must verify through an external read path, the way the flash region is
//! mapped back into the address space for read-back.

use bitflags::bitflags;
use core::sync::atomic::{compiler_fence, Ordering};

use crate::regs::FlashRegs;

/// Page size of the host's flash device, in bytes.
pub const PAGE_SIZE: u32 = 4096;

/// Value of every word in an erased page.
pub const ERASED_WORD: u32 = 0xFFFF_FFFF;

/// Page number containing `offset`.
pub const fn page_of(offset: u32) -> u32 {
    offset / PAGE_SIZE
}

/// Byte offset of the first word of `page`.
pub const fn page_base(page: u32) -> u32 {
    page * PAGE_SIZE
}

bitflags! {
    /// Flash programmer control register bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Control: u32 {
        /// Value stores program flash only while this is set.
        const WRITE_ENABLE = 1 << 0;
        /// Host advances the offset register by one word per commit.
        const AUTO_INCREMENT = 1 << 1;
    }
}

/// Driver for the flash programmer register block.
///
/// The block is write-only from the guest side, so the driver keeps a
/// shadow of the last control value it stored. The shadow is only valid
/// once [`FlashProgrammer::init`] has run; call it before anything else.
pub struct FlashProgrammer<'m> {
    regs: FlashRegs<'m>,
    control: Control,
}

impl<'m> FlashProgrammer<'m> {
    pub const fn new(regs: FlashRegs<'m>) -> Self {
        Self {
            regs,
            control: Control::empty(),
        }
    }

    /// Store `value` to the control register and update the shadow.
    fn set_control(&mut self, value: Control) {
        self.regs.set_control(value.bits());
        self.control = value;
    }

    /// Put the programmer into the known disabled state (`control = 0`).
    pub fn init(&mut self) {
        self.set_control(Control::empty());
    }

    /// Enable programming. Also enables auto-increment so consecutive
    /// value stores walk forward a word at a time. Idempotent.
    pub fn enable_write(&mut self) {
        self.set_control(Control::WRITE_ENABLE | Control::AUTO_INCREMENT);
    }

    /// Disable programming. Idempotent.
    pub fn disable_write(&mut self) {
        self.set_control(Control::empty());
    }

    /// Whether the last control store left programming enabled.
    pub fn is_write_enabled(&self) -> bool {
        self.control.contains(Control::WRITE_ENABLE)
    }

    /// Erase `page` back to all ones. Immediate and synchronous.
    ///
    /// The erase trigger is not gated by the write-enable bit in this
    /// register contract; the store is issued as-is without touching
    /// `control`. Hosts that do gate erase need [`enable_write`] called
    /// first.
    ///
    /// [`enable_write`]: FlashProgrammer::enable_write
    pub fn erase_page(&mut self, page: u32) {
        self.regs.set_erase_page(page);
    }

    /// Program one word at `offset` (a byte offset, word aligned).
    ///
    /// Stores the offset, then the value; the value store is the commit
    /// trigger. While write-disabled the host discards the value, which
    /// is unobservable from this side.
    pub fn write_word(&mut self, offset: u32, value: u32) {
        self.regs.set_offset(offset);
        // The offset store must retire before the trigger store.
        compiler_fence(Ordering::SeqCst);
        self.regs.set_value(value);
    }

    /// Program consecutive words starting at `offset`, one value store
    /// per word, relying on the host's auto-increment to advance the
    /// offset register. Requires the auto-increment mode that
    /// [`enable_write`] switches on.
    ///
    /// [`enable_write`]: FlashProgrammer::enable_write
    pub fn write_words(&mut self, offset: u32, words: &[u32]) {
        if words.is_empty() {
            return;
        }
        self.regs.set_offset(offset);
        compiler_fence(Ordering::SeqCst);
        for &word in words {
            self.regs.set_value(word);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::FlashDevice;
    use std::boxed::Box;

    // Two pages is enough for everything but the absolute-offset scenario.
    type SmallFlash = FlashDevice<2048>;

    #[test]
    fn test_control_bits_match_contract() {
        assert_eq!(Control::WRITE_ENABLE.bits(), 1 << 0);
        assert_eq!(Control::AUTO_INCREMENT.bits(), 1 << 1);
    }

    #[test]
    fn test_page_helpers() {
        assert_eq!(page_of(0), 0);
        assert_eq!(page_of(PAGE_SIZE - 4), 0);
        assert_eq!(page_of(PAGE_SIZE), 1);
        assert_eq!(page_of(0x10000), 16);
        assert_eq!(page_base(16), 0x10000);
    }

    #[test]
    fn test_fresh_device_reads_erased() {
        let dev = SmallFlash::new();
        assert_eq!(dev.read_word(0), ERASED_WORD);
        assert_eq!(dev.read_word(PAGE_SIZE), ERASED_WORD);
    }

    #[test]
    fn test_write_disabled_is_discarded() {
        let dev = SmallFlash::new();
        let mut prog = dev.programmer();
        prog.init();
        assert!(!prog.is_write_enabled());

        prog.write_word(0x10, 0x1234_5678);
        assert!(!dev.service_program());
        assert_eq!(dev.read_word(0x10), ERASED_WORD);
    }

    #[test]
    fn test_write_enabled_programs_word() {
        let dev = SmallFlash::new();
        let mut prog = dev.programmer();
        prog.init();
        prog.enable_write();
        assert!(prog.is_write_enabled());

        prog.write_word(0x40, 0xCAFE_F00D);
        assert!(dev.service_program());
        assert_eq!(dev.read_word(0x40), 0xCAFE_F00D);
    }

    #[test]
    fn test_nand_program_only_clears_bits() {
        let dev = SmallFlash::new();
        let mut prog = dev.programmer();
        prog.init();
        prog.enable_write();

        prog.write_word(0x00, 0xFFFF_0000);
        assert!(dev.service_program());
        // Second program cannot flip cleared bits back to one.
        prog.write_word(0x00, 0x0F0F_FFFF);
        assert!(dev.service_program());
        assert_eq!(dev.read_word(0x00), 0x0F0F_0000);
    }

    #[test]
    fn test_auto_increment_advances_offset_register() {
        let dev = SmallFlash::new();
        let mut prog = dev.programmer();
        prog.init();
        prog.enable_write();

        prog.write_word(0x20, 1);
        assert!(dev.service_program());
        assert_eq!(dev.offset_reg(), 0x24);
    }

    #[test]
    fn test_write_words_streams_through_value_register() {
        let dev = SmallFlash::new();
        let mut prog = dev.programmer();
        prog.init();
        prog.enable_write();

        // The register double is passive, so only the last streamed word
        // is pending; commit it and check the stream's register state.
        prog.write_words(0x80, &[0xAAAA_AAAA, 0x5555_5555]);
        assert!(dev.service_program());
        assert_eq!(dev.read_word(0x80), 0x5555_5555);
        assert_eq!(dev.offset_reg(), 0x84);
    }

    #[test]
    fn test_erase_page_restores_ones() {
        let dev = SmallFlash::new();
        let mut prog = dev.programmer();
        prog.init();
        prog.enable_write();

        prog.write_word(PAGE_SIZE + 8, 0);
        assert!(dev.service_program());
        assert_eq!(dev.read_word(PAGE_SIZE + 8), 0);

        prog.erase_page(1);
        dev.service_erase();
        assert_eq!(dev.read_word(PAGE_SIZE + 8), ERASED_WORD);
        // Page 0 untouched.
        assert_eq!(dev.read_word(0), ERASED_WORD);
    }

    #[test]
    fn test_erase_not_gated_by_write_enable() {
        let dev = SmallFlash::new();
        let mut prog = dev.programmer();
        prog.init();
        prog.enable_write();
        prog.write_word(4, 0);
        assert!(dev.service_program());

        prog.disable_write();
        prog.erase_page(0);
        dev.service_erase();
        assert_eq!(dev.read_word(4), ERASED_WORD);
    }

    #[test]
    fn test_program_verify_roundtrip_scenario() {
        // init; enable_write; write_word(0x10000, 0xDEADBEEF);
        // disable_write; then external read-back observes the value.
        let dev = Box::new(FlashDevice::<0x4400>::new());
        let mut prog = dev.programmer();
        prog.init();
        prog.enable_write();
        prog.write_word(0x10000, 0xDEAD_BEEF);
        assert!(dev.service_program());
        prog.disable_write();
        assert_eq!(dev.read_word(0x10000), 0xDEAD_BEEF);
    }

    #[test]
    fn test_pattern_spanning_page_boundary() {
        let dev = SmallFlash::new();
        let mut prog = dev.programmer();
        prog.init();
        prog.enable_write();

        // Representative offsets straddling the page 0 / page 1 boundary.
        for (i, offset) in (PAGE_SIZE - 8..PAGE_SIZE + 8).step_by(4).enumerate() {
            prog.write_word(offset, 0xDEAD_BEEF + i as u32);
            assert!(dev.service_program());
        }
        for (i, offset) in (PAGE_SIZE - 8..PAGE_SIZE + 8).step_by(4).enumerate() {
            assert_eq!(dev.read_word(offset), 0xDEAD_BEEF + i as u32);
        }
    }
}
