use crate::{BusAddress, BusResult};

/// Single-byte transactions against a register-addressed device.
///
/// Implementations are thin: no retries, no delays. A device that does not answer is reported
/// as [`BusError::NoAcknowledge`](crate::BusError::NoAcknowledge).
pub trait RegisterBus {
    /// The error type of the underlying transport.
    type Error;

    /// Reads a single byte from `addr` without setting a register pointer.
    ///
    /// Used to detect whether a device is present.
    fn probe(&mut self, addr: BusAddress) -> BusResult<u8, Self::Error>;

    /// Reads the register at `offset` of the device at `addr`.
    fn read_register(&mut self, addr: BusAddress, offset: u8) -> BusResult<u8, Self::Error>;

    /// Writes `value` to the register at `offset` of the device at `addr`.
    fn write_register(
        &mut self,
        addr: BusAddress,
        offset: u8,
        value: u8,
    ) -> BusResult<(), Self::Error>;
}

impl<T: RegisterBus + ?Sized> RegisterBus for &mut T {
    type Error = T::Error;

    fn probe(&mut self, addr: BusAddress) -> BusResult<u8, Self::Error> {
        (**self).probe(addr)
    }

    fn read_register(&mut self, addr: BusAddress, offset: u8) -> BusResult<u8, Self::Error> {
        (**self).read_register(addr, offset)
    }

    fn write_register(
        &mut self,
        addr: BusAddress,
        offset: u8,
        value: u8,
    ) -> BusResult<(), Self::Error> {
        (**self).write_register(addr, offset, value)
    }
}
