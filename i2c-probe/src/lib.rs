#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]
//! # i2c-probe
//! A no-std register transport and device locator for I2C EEPROMs.
//!
//! [`Bus`] wraps any [`I2c`](embedded_hal::i2c::I2c) implementation and exposes single-byte
//! register transactions through the [`RegisterBus`] trait (and [`RegisterBusAsync`] for
//! `embedded-hal-async` buses). [`AddressScan`] and [`locate`] discover the one EEPROM-like
//! device on the bus, probing only the address ranges that are safe to read.

mod address;
mod error;
mod locate;
mod locate_async;
mod traits;
mod traits_async;
mod transport;

pub use address::{AddressSet, BusAddress, ParseAddressError};
pub use error::{BusError, LocateError};
pub use locate::{AddressScan, locate};
pub use locate_async::{AddressScanAsync, locate_async};
pub use traits::RegisterBus;
pub use traits_async::RegisterBusAsync;
pub use transport::Bus;

/// Results of bus transactions.
pub type BusResult<T, E> = Result<T, BusError<E>>;

/// Lowest address of the discoverable 7-bit range (0-2 are reserved for other bus formats).
pub const SCAN_FIRST: u8 = 3;

/// Highest address of the discoverable 7-bit range (120-127 are reserved and 10-bit addresses).
pub const SCAN_LAST: u8 = 119;

/// Address ranges that may be probed with a read during discovery.
///
/// Same as `i2cdetect`: these ranges hold EEPROMs and similar read-safe parts. Everything else
/// may be a write-sensitive device and is never touched by a scan.
pub const SAFE_PROBE_RANGES: [core::ops::Range<u8>; 2] = [0x30..0x38, 0x50..0x60];
