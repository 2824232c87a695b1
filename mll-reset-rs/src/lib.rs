#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]
//! # mll-reset
//! Zeroes the aging timer kept in the EEPROM of a display, over I2C.
//!
//! The [`TimerReset`] sequencer reads a diagnostic snapshot of the EEPROM, asks a
//! [`Confirm`] capability whether to proceed, writes zero over the [`TIMER_WINDOW`] (retrying
//! each register once) and verifies the result byte by byte.
//!
//! [`RunContext`] ties one invocation together: it optionally asserts a [`SwitchGate`] and
//! power-cycles the display through a [`PowerCycler`] before the bus is used, locates the
//! EEPROM with [`i2c_probe::locate`], runs the sequencer, and always releases the gate.

mod error;
mod power;
mod run;
mod sequencer;
mod sequencer_async;
mod snapshot;

pub use error::{PowerCycleError, ResetError, RunError, SwitchError};
pub use i2c_probe::{AddressSet, Bus, BusAddress, BusError, LocateError, RegisterBus};
pub use power::{
    Clock, MIN_SETTLE_MS, PowerCycle, PowerCycler, PowerSequenceState, PowerState, SwitchGate,
};
pub use run::{Resolve, RunContext, RunOutcome};
pub use sequencer::{Confirm, ResetOutcome, ResetReport, ResetState, TimerReset, WriteOutcome};
pub use snapshot::{RegisterWindow, Snapshot, TimerBytes, is_zeroed};

/// Number of registers in the [`DIAGNOSTIC_WINDOW`].
pub const DIAGNOSTIC_LEN: usize = 10;

/// Number of registers in the [`TIMER_WINDOW`].
pub const TIMER_LEN: usize = 6;

/// Registers read before anything is written, offsets `0..10`.
pub const DIAGNOSTIC_WINDOW: RegisterWindow = RegisterWindow::new(0, DIAGNOSTIC_LEN as u8);

/// Registers holding the timer, offsets `1..7`.
pub const TIMER_WINDOW: RegisterWindow = RegisterWindow::new(1, 1 + TIMER_LEN as u8);

/// Default EEPROM write cycle time, in milliseconds.
pub const DEFAULT_WRITE_CYCLE_MS: u32 = 10;
