use crate::AddressSet;
use core::fmt;
use embedded_hal::i2c::{Error, ErrorKind, NoAcknowledgeSource};

/// Failure of a single bus transaction.
#[derive(Debug)]
pub enum BusError<E> {
    /// No device acknowledged the transaction.
    ///
    /// Expected while scanning; an address that does not acknowledge is vacant.
    NoAcknowledge(NoAcknowledgeSource),
    /// Any other transport malfunction.
    Bus(E),
}

impl<E: Error> From<E> for BusError<E> {
    fn from(value: E) -> Self {
        match value.kind() {
            ErrorKind::NoAcknowledge(source) => Self::NoAcknowledge(source),
            _ => Self::Bus(value),
        }
    }
}

impl<E> BusError<E> {
    /// Whether the error is a missing acknowledge.
    pub fn is_no_acknowledge(&self) -> bool {
        matches!(self, Self::NoAcknowledge(_))
    }
}

impl<E: fmt::Debug> fmt::Display for BusError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAcknowledge(source) => write!(f, "no acknowledge ({source})"),
            Self::Bus(e) => write!(f, "bus error: {e:?}"),
        }
    }
}

impl<E: fmt::Debug> core::error::Error for BusError<E> {}

/// Failure to resolve the address of the target device.
#[derive(Debug)]
pub enum LocateError<E> {
    /// A probe failed for a reason other than a missing acknowledge.
    Bus(E),
    /// No address in the probed ranges acknowledged.
    DeviceNotFound,
    /// More than one address acknowledged; carries every responding address.
    AmbiguousDevice(AddressSet),
}

impl<E: fmt::Debug> fmt::Display for LocateError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "bus error while scanning: {e:?}"),
            Self::DeviceNotFound => f.write_str("no device found on the bus"),
            Self::AmbiguousDevice(set) => write!(f, "multiple devices found: {set}"),
        }
    }
}

impl<E: fmt::Debug> core::error::Error for LocateError<E> {}
