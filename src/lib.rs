//! Guest-side drivers for the HandyARM virtual peripherals.
//!
//! A HandyARM host maps three small register blocks into the guest's
//! physical address space: a console transmit channel (block output), a
//! console receive channel (block input, a producer/consumer ring), and a
//! flash programmer. This crate implements the guest half of those
//! register contracts:
//!
//! - [`regs`]: byte-exact register map overlays, no behavior;
//! - [`console`]: non-blocking byte-stream `read`/`write` over the
//!   transmit and receive blocks;
//! - [`flash`]: page erase and word programming over the flash block;
//! - [`config`]: the validated device memory map drivers are built from;
//! - [`global`]: a critical-section-guarded shared console plus
//!   [`print_console!`]/[`println_console!`] macros.
//!
//! Every register access is a single volatile load or store at a fixed
//! offset ([`mmio`]), so the overlays work equally over real device
//! memory and over in-memory windows, which is how the whole driver layer
//! is unit-tested without hardware ([`sim`]).
//!
//! # Concurrency
//!
//! Driver operations are synchronous and never suspend. The receive ring
//! is shared with the host producer under a single-writer-per-field
//! discipline: the guest only writes `start_offset`, the host only writes
//! `end_offset` and the data bytes. Each driver instance assumes a single
//! guest execution context; for multi-context printing use [`global`],
//! which serializes calls with `critical-section`.

#![no_std]

#[cfg(test)]
extern crate std;

pub mod config;
pub mod console;
pub mod flash;
pub mod global;
pub mod mmio;
pub mod regs;

#[cfg(any(test, feature = "host-test"))]
pub mod sim;
