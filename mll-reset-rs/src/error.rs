use crate::{PowerState, Snapshot, TimerBytes};
use core::fmt;
use i2c_probe::{BusError, LocateError};

/// Failure of the timer reset sequence.
#[derive(Debug)]
pub enum ResetError<E> {
    /// A read failed, while taking the snapshot or while verifying.
    ///
    /// `snapshot` is `None` if the diagnostic window could not be read completely, in which case
    /// nothing was written.
    Read {
        /// Register that failed.
        offset: u8,
        /// The diagnostic snapshot, if it was complete.
        snapshot: Option<Snapshot>,
        /// Underlying bus error.
        error: BusError<E>,
    },
    /// Writing zero to a register failed twice. No later register was written.
    WriteFailure {
        /// Register that failed.
        offset: u8,
        /// The diagnostic snapshot taken before the first write.
        snapshot: Snapshot,
        /// Error of the retry.
        error: BusError<E>,
    },
    /// Every write was acknowledged, but the timer window does not read back as zero.
    VerificationFailure {
        /// The timer window as read back.
        readback: TimerBytes,
        /// The diagnostic snapshot taken before the first write.
        snapshot: Snapshot,
    },
}

impl<E> ResetError<E> {
    /// The diagnostic snapshot taken before writing, if one was taken.
    pub fn snapshot(&self) -> Option<&Snapshot> {
        match self {
            Self::Read { snapshot, .. } => snapshot.as_ref(),
            Self::WriteFailure { snapshot, .. } | Self::VerificationFailure { snapshot, .. } => {
                Some(snapshot)
            }
        }
    }
}

impl<E: fmt::Debug> fmt::Display for ResetError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { offset, error, .. } => write!(f, "reading register {offset}: {error}"),
            Self::WriteFailure { offset, error, .. } => {
                write!(f, "writing register {offset} failed twice: {error}")
            }
            Self::VerificationFailure { readback, .. } => {
                write!(f, "timer window reads back as {readback:?} after writing")
            }
        }
    }
}

impl<E: fmt::Debug> core::error::Error for ResetError<E> {}

/// Failure of the power switch gate.
#[derive(Debug)]
pub enum SwitchError<E> {
    /// The control line could not be driven.
    Pin(E),
    /// The control line does not read back as asserted.
    ControlMode,
}

impl<E> From<E> for SwitchError<E> {
    fn from(value: E) -> Self {
        Self::Pin(value)
    }
}

impl<E: fmt::Debug> fmt::Display for SwitchError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pin(e) => write!(f, "switch line error: {e:?}"),
            Self::ControlMode => f.write_str("switch line is not in the expected output mode"),
        }
    }
}

impl<E: fmt::Debug> core::error::Error for SwitchError<E> {}

/// Failure of the device power-cycle.
#[derive(Debug)]
pub enum PowerCycleError<E> {
    /// The control channel failed.
    Channel(E),
    /// The device did not reach the state within the timeout.
    Timeout {
        /// State the device was expected to reach.
        waiting_for: PowerState,
    },
}

impl<E> From<E> for PowerCycleError<E> {
    fn from(value: E) -> Self {
        Self::Channel(value)
    }
}

impl<E: fmt::Debug> fmt::Display for PowerCycleError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channel(e) => write!(f, "power control error: {e:?}"),
            Self::Timeout { waiting_for } => {
                write!(f, "timed out waiting for the device to power {waiting_for}")
            }
        }
    }
}

impl<E: fmt::Debug> core::error::Error for PowerCycleError<E> {}

/// Failure of a whole run.
///
/// `E` is the bus error, `P` the switch line error and `C` the power-cycle channel error.
#[derive(Debug)]
pub enum RunError<E, P, C> {
    /// The power switch could not be asserted or released.
    Switch(SwitchError<P>),
    /// The device could not be power-cycled.
    PowerCycle(PowerCycleError<C>),
    /// The EEPROM could not be located.
    Locate(LocateError<E>),
    /// The reset sequence failed.
    Reset(ResetError<E>),
}

impl<E, P, C> From<SwitchError<P>> for RunError<E, P, C> {
    fn from(value: SwitchError<P>) -> Self {
        Self::Switch(value)
    }
}

impl<E, P, C> From<PowerCycleError<C>> for RunError<E, P, C> {
    fn from(value: PowerCycleError<C>) -> Self {
        Self::PowerCycle(value)
    }
}

impl<E, P, C> From<LocateError<E>> for RunError<E, P, C> {
    fn from(value: LocateError<E>) -> Self {
        Self::Locate(value)
    }
}

impl<E, P, C> From<ResetError<E>> for RunError<E, P, C> {
    fn from(value: ResetError<E>) -> Self {
        Self::Reset(value)
    }
}

impl<E: fmt::Debug, P: fmt::Debug, C: fmt::Debug> fmt::Display for RunError<E, P, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Switch(e) => fmt::Display::fmt(e, f),
            Self::PowerCycle(e) => fmt::Display::fmt(e, f),
            Self::Locate(e) => fmt::Display::fmt(e, f),
            Self::Reset(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl<E: fmt::Debug, P: fmt::Debug, C: fmt::Debug> core::error::Error for RunError<E, P, C> {}
