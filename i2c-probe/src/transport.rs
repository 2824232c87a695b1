use crate::{BusAddress, BusError, BusResult, RegisterBus, RegisterBusAsync};
use embedded_hal::i2c::{Error, I2c, SevenBitAddress};

/// A register transport over an I2C bus.
///
/// Takes ownership of the bus (implementing [`I2c`](embedded_hal::i2c::I2c) or
/// [`embedded_hal_async::i2c::I2c`]) for the duration of a run. The bus is released when this
/// value is dropped, or handed back with [`Bus::release`].
#[derive(Debug)]
pub struct Bus<I> {
    pub(crate) i2c: I,
}

impl<I> Bus<I> {
    /// Wraps an open I2C bus.
    pub fn new(i2c: I) -> Self {
        Bus { i2c }
    }

    /// Gives the underlying bus back.
    pub fn release(self) -> I {
        self.i2c
    }
}

impl<I: I2c<SevenBitAddress>> RegisterBus for Bus<I> {
    type Error = I::Error;

    fn probe(&mut self, addr: BusAddress) -> BusResult<u8, I::Error> {
        let mut val = [0; 1];
        self.i2c.read(addr.get(), &mut val)?;
        Ok(val[0])
    }

    fn read_register(&mut self, addr: BusAddress, offset: u8) -> BusResult<u8, I::Error> {
        let mut val = [0; 1];
        self.i2c.write_read(addr.get(), &[offset], &mut val)?;
        log::trace!("read {addr}[{offset}] = {}", val[0]);
        Ok(val[0])
    }

    fn write_register(
        &mut self,
        addr: BusAddress,
        offset: u8,
        value: u8,
    ) -> BusResult<(), I::Error> {
        self.i2c.write(addr.get(), &[offset, value])?;
        log::trace!("wrote {addr}[{offset}] = {value}");
        Ok(())
    }
}

impl<I> RegisterBusAsync for Bus<I>
where
    I: embedded_hal_async::i2c::I2c<SevenBitAddress>,
    I::Error: Error,
{
    type Error = I::Error;

    async fn probe(&mut self, addr: BusAddress) -> BusResult<u8, I::Error> {
        let mut val = [0; 1];
        self.i2c
            .read(addr.get(), &mut val)
            .await
            .map_err(BusError::from)?;
        Ok(val[0])
    }

    async fn read_register(&mut self, addr: BusAddress, offset: u8) -> BusResult<u8, I::Error> {
        let mut val = [0; 1];
        self.i2c
            .write_read(addr.get(), &[offset], &mut val)
            .await
            .map_err(BusError::from)?;
        Ok(val[0])
    }

    async fn write_register(
        &mut self,
        addr: BusAddress,
        offset: u8,
        value: u8,
    ) -> BusResult<(), I::Error> {
        self.i2c
            .write(addr.get(), &[offset, value])
            .await
            .map_err(BusError::from)?;
        Ok(())
    }
}
