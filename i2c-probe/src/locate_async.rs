use crate::{
    AddressSet, BusAddress, BusError, LocateError, RegisterBusAsync,
    locate::{AddressScan, classify},
};

/// An incremental asynchronous scan of the safe probe ranges.
///
/// Same walk as [`AddressScan`], driven by a [`RegisterBusAsync`].
pub struct AddressScanAsync<'a, T> {
    inner: AddressScan<'a, T>,
}

impl<T> core::fmt::Debug for AddressScanAsync<'_, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AddressScanAsync")
            .field("found", &self.inner.found())
            .finish()
    }
}

impl<'a, T> AddressScanAsync<'a, T> {
    /// Creates a new scan over `bus`.
    pub fn new(bus: &'a mut T) -> Self {
        Self {
            inner: AddressScan::new(bus),
        }
    }

    /// Addresses that acknowledged so far.
    pub fn found(&self) -> AddressSet {
        self.inner.found()
    }
}

impl<T: RegisterBusAsync> AddressScanAsync<'_, T> {
    /// Probes until the next responding address, `Ok(None)` once exhausted.
    pub async fn next(&mut self) -> Result<Option<BusAddress>, LocateError<T::Error>> {
        while let Some(addr) = self.inner.advance() {
            match self.inner.bus_mut().probe(addr).await {
                Ok(_) => {
                    self.inner.record(addr);
                    return Ok(Some(addr));
                }
                Err(BusError::NoAcknowledge(_)) => continue,
                Err(BusError::Bus(e)) => return Err(LocateError::Bus(e)),
            }
        }
        Ok(None)
    }

    /// Runs the scan to completion and returns every responding address.
    pub async fn collect(mut self) -> Result<AddressSet, LocateError<T::Error>> {
        while self.next().await?.is_some() {}
        Ok(self.found())
    }
}

/// Resolves the address of the target device asynchronously. See [`locate`](crate::locate).
pub async fn locate_async<T: RegisterBusAsync>(
    bus: &mut T,
    override_addr: Option<BusAddress>,
) -> Result<BusAddress, LocateError<T::Error>> {
    if let Some(addr) = override_addr {
        return Ok(addr);
    }
    classify(AddressScanAsync::new(bus).collect().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bus, SAFE_PROBE_RANGES};
    use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
    use futures::executor::block_on;

    #[test]
    fn async_scan_matches_sync_walk() {
        let expectations: Vec<_> = SAFE_PROBE_RANGES
            .iter()
            .flat_map(|r| r.clone())
            .map(|a| {
                let t = I2cTransaction::read(a, vec![0]);
                if a == 0x37 || a == 0x51 {
                    t
                } else {
                    t.with_error(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address))
                }
            })
            .collect();
        let mut i2c = I2cMock::new(&expectations);
        let mut bus = Bus::new(i2c.clone());
        match block_on(locate_async(&mut bus, None)) {
            Err(LocateError::AmbiguousDevice(set)) => {
                let got: Vec<u8> = set.iter().map(u8::from).collect();
                assert_eq!(got, vec![0x37, 0x51]);
            }
            other => panic!("unexpected {other:?}"),
        }
        i2c.done();
    }

    #[test]
    fn async_override_skips_the_scan() {
        let mut i2c = I2cMock::new(&[]);
        let mut bus = Bus::new(i2c.clone());
        let addr = BusAddress::new(0x50);
        assert_eq!(block_on(locate_async(&mut bus, addr)).unwrap(), addr.unwrap());
        i2c.done();
    }
}
