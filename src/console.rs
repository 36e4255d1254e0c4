//! Console driver for the HandyARM block-I/O channel pair.
//!
//! The console is two independent, unidirectional channels:
//!
//! - **Transmit** (guest to host): the guest stores a buffer address and
//!   then a length; the length store triggers the transfer, and the host
//!   completes the copy before that store returns. Zero-copy from the
//!   guest's point of view, and the buffer is free for reuse the instant
//!   [`Console::write`] returns.
//! - **Receive** (host to guest): a ring buffer with a producer/consumer
//!   offset pair. The host deposits bytes and advances `end_offset`; the
//!   guest consumes bytes and advances `start_offset`. Data is available
//!   exactly while the offsets differ.
//!
//! Neither direction can report host-side failure; the register protocol
//! has no status register. See the crate docs for the concurrency rules
//! (single guest context per driver instance; the [`crate::global`] module
//! wraps a console for multi-context use).

use core::fmt;
use core::sync::atomic::{compiler_fence, Ordering};

use crate::regs::{ReceiveRegs, TransmitRegs};

/// Byte-stream driver over the transmit and receive register blocks.
pub struct Console<'m> {
    tx: TransmitRegs<'m>,
    rx: ReceiveRegs<'m>,
}

impl<'m> Console<'m> {
    pub const fn new(tx: TransmitRegs<'m>, rx: ReceiveRegs<'m>) -> Self {
        Self { tx, rx }
    }

    /// Drain available bytes from the receive ring into `buf`.
    ///
    /// Copies one byte per iteration until either `buf` is full or the
    /// consumer offset catches up with the producer offset. Returns the
    /// number of bytes copied, which may be zero. Never blocks; callers
    /// needing blocking behavior must poll.
    ///
    /// The consumer offset is advanced by one, modulo the ring capacity,
    /// after every byte, so producer-side progress is visible to the host
    /// per byte rather than per call. `end_offset` is re-read on every
    /// iteration, so bytes the host deposits during the call are picked up
    /// too. The driver never reads past `end_offset`.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let capacity = self.rx.capacity() as usize;
        if capacity == 0 || buf.is_empty() {
            return 0;
        }

        let mut start = self.rx.start_offset() as usize % capacity;
        let mut count = 0;
        while count < buf.len() {
            let end = self.rx.end_offset() as usize;
            if start == end {
                break;
            }
            buf[count] = self.rx.data_byte(start);
            start = (start + 1) % capacity;
            self.rx.set_start_offset(start as u32);
            count += 1;
        }
        count
    }

    /// Hand `buf` to the transmit channel.
    ///
    /// Stores the buffer address, then the length; the length store is the
    /// trigger and the host finishes the copy synchronously. Always
    /// returns `buf.len()`; the protocol has no way to report failure.
    /// `buf` may be reused or freed as soon as this returns.
    pub fn write(&mut self, buf: &[u8]) -> usize {
        if buf.is_empty() {
            return 0;
        }
        self.tx.set_start_addr(buf.as_ptr());
        // The address store must retire before the trigger store.
        compiler_fence(Ordering::SeqCst);
        self.tx.set_length(buf.len() as u32);
        buf.len()
    }
}

/// Chunk size for [`ConsoleWriter`]. One transfer per flush.
const WRITE_CHUNK: usize = 128;

/// `core::fmt::Write` adapter over a [`Console`].
///
/// Formatted output lands in a fixed-capacity buffer and is flushed as a
/// whole chunk on newline, when the buffer fills, or on drop, so a log
/// line costs one transfer instead of one per formatting fragment.
pub struct ConsoleWriter<'c, 'm> {
    console: &'c mut Console<'m>,
    buf: heapless::Vec<u8, WRITE_CHUNK>,
}

impl<'c, 'm> ConsoleWriter<'c, 'm> {
    pub fn new(console: &'c mut Console<'m>) -> Self {
        Self {
            console,
            buf: heapless::Vec::new(),
        }
    }

    /// Push any buffered bytes through the transmit channel.
    pub fn flush(&mut self) {
        if !self.buf.is_empty() {
            self.console.write(&self.buf);
            self.buf.clear();
        }
    }
}

impl fmt::Write for ConsoleWriter<'_, '_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for &b in s.as_bytes() {
            if self.buf.push(b).is_err() {
                self.flush();
                // Buffer is empty now; a single byte always fits.
                let _ = self.buf.push(b);
            }
            if b == b'\n' {
                self.flush();
            }
        }
        Ok(())
    }
}

impl Drop for ConsoleWriter<'_, '_> {
    fn drop(&mut self) {
        self.flush();
    }
}
