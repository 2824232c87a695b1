#![allow(async_fn_in_trait)]
use crate::{BusAddress, BusResult};

/// Single-byte transactions against a register-addressed device, asynchronously.
///
/// See [`RegisterBus`](crate::RegisterBus) for the semantics of each call.
pub trait RegisterBusAsync {
    /// The error type of the underlying transport.
    type Error;

    /// Reads a single byte from `addr` without setting a register pointer.
    async fn probe(&mut self, addr: BusAddress) -> BusResult<u8, Self::Error>;

    /// Reads the register at `offset` of the device at `addr`.
    async fn read_register(&mut self, addr: BusAddress, offset: u8)
    -> BusResult<u8, Self::Error>;

    /// Writes `value` to the register at `offset` of the device at `addr`.
    async fn write_register(
        &mut self,
        addr: BusAddress,
        offset: u8,
        value: u8,
    ) -> BusResult<(), Self::Error>;
}
