use crate::{AddressSet, BusAddress, BusError, LocateError, RegisterBus, SAFE_PROBE_RANGES};

/// An incremental scan of the safe probe ranges.
///
/// Each call to [`next`](AddressScan::next) probes addresses in ascending order until one
/// acknowledges. Addresses outside [`SAFE_PROBE_RANGES`] are never read.
pub struct AddressScan<'a, T> {
    bus: &'a mut T,
    range: usize,
    cursor: u8,
    found: AddressSet,
}

impl<'a, T> AddressScan<'a, T> {
    /// Creates a new scan over `bus`.
    pub fn new(bus: &'a mut T) -> Self {
        Self {
            bus,
            range: 0,
            cursor: SAFE_PROBE_RANGES[0].start,
            found: AddressSet::new(),
        }
    }

    /// Addresses that acknowledged so far.
    pub fn found(&self) -> AddressSet {
        self.found
    }

    /// The next address to probe, advancing the cursor past it.
    pub(crate) fn advance(&mut self) -> Option<BusAddress> {
        loop {
            let range = SAFE_PROBE_RANGES.get(self.range)?;
            if self.cursor < range.start {
                self.cursor = range.start;
            }
            if self.cursor < range.end {
                let addr = self.cursor;
                self.cursor += 1;
                return BusAddress::new(addr);
            }
            self.range += 1;
        }
    }

    pub(crate) fn bus_mut(&mut self) -> &mut T {
        self.bus
    }

    pub(crate) fn record(&mut self, addr: BusAddress) {
        log::debug!("Transaction was ACK'd, found a device at {addr}");
        self.found.insert(addr);
    }
}

impl<T: RegisterBus> AddressScan<'_, T> {
    /// Probes until the next responding address.
    ///
    /// Returns `Ok(None)` once both ranges are exhausted. A missing acknowledge marks an address
    /// vacant; any other bus error ends the scan.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<BusAddress>, LocateError<T::Error>> {
        while let Some(addr) = self.advance() {
            match self.bus.probe(addr) {
                Ok(_) => {
                    self.record(addr);
                    return Ok(Some(addr));
                }
                Err(BusError::NoAcknowledge(_)) => continue,
                Err(BusError::Bus(e)) => return Err(LocateError::Bus(e)),
            }
        }
        Ok(None)
    }

    /// Runs the scan to completion and returns every responding address.
    pub fn collect(mut self) -> Result<AddressSet, LocateError<T::Error>> {
        while self.next()?.is_some() {}
        Ok(self.found)
    }
}

/// Resolves the address of the target device.
///
/// An `override_addr` is returned as is, without touching the bus. Otherwise the safe ranges
/// are scanned and exactly one device must answer.
pub fn locate<T: RegisterBus>(
    bus: &mut T,
    override_addr: Option<BusAddress>,
) -> Result<BusAddress, LocateError<T::Error>> {
    if let Some(addr) = override_addr {
        return Ok(addr);
    }
    classify(AddressScan::new(bus).collect()?)
}

pub(crate) fn classify<E>(found: AddressSet) -> Result<BusAddress, LocateError<E>> {
    match (found.len(), found.first()) {
        (1, Some(addr)) => Ok(addr),
        (0, _) => Err(LocateError::DeviceNotFound),
        _ => Err(LocateError::AmbiguousDevice(found)),
    }
}
