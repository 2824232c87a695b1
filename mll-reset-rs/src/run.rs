use crate::{
    Clock, Confirm, DEFAULT_WRITE_CYCLE_MS, PowerCycle, PowerCycler, ResetOutcome, RunError,
    Snapshot, SwitchGate, TimerReset,
};
use embedded_hal::{delay::DelayNs, digital::StatefulOutputPin};
use i2c_probe::{AddressSet, BusAddress, LocateError, RegisterBus, locate};

/// Picks the address to use when several devices answered the scan.
///
/// Implemented for every `FnMut(AddressSet) -> Option<BusAddress>`. Returning `None` aborts the
/// run with [`LocateError::AmbiguousDevice`].
pub trait Resolve {
    /// The address to retry with, if any.
    fn resolve(&mut self, candidates: AddressSet) -> Option<BusAddress>;
}

impl<F: FnMut(AddressSet) -> Option<BusAddress>> Resolve for F {
    fn resolve(&mut self, candidates: AddressSet) -> Option<BusAddress> {
        self(candidates)
    }
}

/// How a run ended, short of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The timer of the EEPROM at `address` was zeroed and verified.
    Reset(crate::ResetReport),
    /// The confirmation was refused; nothing was written.
    Declined {
        /// Address of the EEPROM.
        address: BusAddress,
        /// The diagnostic window that was shown.
        snapshot: Snapshot,
    },
}

/// Everything one invocation needs, threaded through locating, resetting and power sequencing.
///
/// The optional [`SwitchGate`] is asserted before the bus is used and released on every exit
/// path of [`run`](RunContext::run). The optional [`PowerCycler`] runs after the gate and
/// before the bus is used.
pub struct RunContext<P, C, D, K = ()> {
    override_addr: Option<BusAddress>,
    address: Option<BusAddress>,
    write_cycle_ms: u32,
    readback: bool,
    switch: Option<SwitchGate<P, D>>,
    cycler: Option<PowerCycler<C, D, K>>,
}

impl<P, C, D, K> Default for RunContext<P, C, D, K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, C, D, K> RunContext<P, C, D, K> {
    /// A context that scans for the device, without power sequencing.
    pub fn new() -> Self {
        Self {
            override_addr: None,
            address: None,
            write_cycle_ms: DEFAULT_WRITE_CYCLE_MS,
            readback: false,
            switch: None,
            cycler: None,
        }
    }

    /// Use `address` instead of scanning.
    pub fn with_address(mut self, address: Option<BusAddress>) -> Self {
        self.override_addr = address;
        self
    }

    /// Assert `gate` around the run.
    pub fn with_switch(mut self, gate: SwitchGate<P, D>) -> Self {
        self.switch = Some(gate);
        self
    }

    /// Power-cycle the device with `cycler` before the bus is used.
    pub fn with_power_cycle(mut self, cycler: PowerCycler<C, D, K>) -> Self {
        self.cycler = Some(cycler);
        self
    }

    /// Set the EEPROM write cycle time, in milliseconds.
    pub fn with_write_cycle_ms(mut self, write_cycle_ms: u32) -> Self {
        self.write_cycle_ms = write_cycle_ms;
        self
    }

    /// Read the diagnostic window again after a verified reset, before the gate is released.
    ///
    /// The result lands in [`ResetReport::after`](crate::ResetReport::after). A failed read
    /// leaves it empty and does not fail the run.
    pub fn with_readback(mut self, readback: bool) -> Self {
        self.readback = readback;
        self
    }

    /// The address resolved by the last run, if it got that far.
    pub fn address(&self) -> Option<BusAddress> {
        self.address
    }

    /// State of the switch gate, if one is configured.
    pub fn switch(&self) -> Option<&SwitchGate<P, D>> {
        self.switch.as_ref()
    }

    /// Gives the switch gate and power-cycler back.
    pub fn release(self) -> (Option<SwitchGate<P, D>>, Option<PowerCycler<C, D, K>>) {
        (self.switch, self.cycler)
    }
}

impl<P, C, D, K> RunContext<P, C, D, K>
where
    P: StatefulOutputPin,
    C: PowerCycle,
    D: DelayNs,
    K: Clock,
{
    /// Runs one reset: power sequencing, locating the EEPROM, then the [`TimerReset`]
    /// sequence.
    ///
    /// The switch gate is disabled before returning, whatever the outcome. An error of the run
    /// takes precedence over an error while disabling the gate.
    pub fn run<B, W, F, R>(
        &mut self,
        bus: &mut B,
        delay: &mut W,
        confirm: F,
        resolve: R,
    ) -> Result<RunOutcome, RunError<B::Error, P::Error, C::Error>>
    where
        B: RegisterBus,
        W: DelayNs,
        F: Confirm,
        R: Resolve,
    {
        self.address = None;
        let res = self.sequence(bus, delay, confirm, resolve);
        let cleanup = match self.switch.as_mut() {
            Some(gate) => gate.disable(),
            None => Ok(()),
        };
        match (res, cleanup) {
            (Err(e), Err(_)) => {
                log::error!("power switch could not be released after a failed run");
                Err(e)
            }
            (res, cleanup) => {
                cleanup?;
                res
            }
        }
    }

    fn sequence<B, W, F, R>(
        &mut self,
        bus: &mut B,
        delay: &mut W,
        confirm: F,
        mut resolve: R,
    ) -> Result<RunOutcome, RunError<B::Error, P::Error, C::Error>>
    where
        B: RegisterBus,
        W: DelayNs,
        F: Confirm,
        R: Resolve,
    {
        if let Some(gate) = self.switch.as_mut() {
            gate.enable()?;
        }
        if let Some(cycler) = self.cycler.as_mut() {
            cycler.cycle()?;
        }
        let address = match locate(bus, self.override_addr) {
            Err(LocateError::AmbiguousDevice(candidates)) => match resolve.resolve(candidates) {
                Some(choice) => locate(bus, Some(choice))?,
                None => return Err(LocateError::AmbiguousDevice(candidates).into()),
            },
            res => res?,
        };
        self.address = Some(address);
        log::info!("using device at {address}");
        let mut reset = TimerReset::new(address).with_write_cycle_ms(self.write_cycle_ms);
        match reset.run(bus, delay, confirm)? {
            ResetOutcome::Reset(mut report) => {
                if self.readback {
                    match reset.read_diagnostic(bus) {
                        Ok(after) => report.after = Some(after),
                        Err(_) => log::warn!("could not read {address} back after the reset"),
                    }
                }
                Ok(RunOutcome::Reset(report))
            }
            ResetOutcome::Declined(snapshot) => Ok(RunOutcome::Declined { address, snapshot }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::power::tests::{FakeDisplay, FakePin};
    use crate::sequencer::tests::{DIAG, read_diagnostic, read_timer, write_zero};
    use crate::{PowerCycleError, PowerSequenceState, ResetError, SwitchError};
    use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
    use embedded_hal_mock::eh1::{
        delay::NoopDelay,
        i2c::{Mock as I2cMock, Transaction as I2cTransaction},
    };
    use i2c_probe::{Bus, BusResult, SAFE_PROBE_RANGES};
    use std::{cell::Cell, rc::Rc};

    type Context = RunContext<FakePin, FakeDisplay, NoopDelay>;

    fn scan(present: &[u8]) -> Vec<I2cTransaction> {
        SAFE_PROBE_RANGES
            .iter()
            .flat_map(|r| r.clone())
            .map(|a| {
                let t = I2cTransaction::read(a, vec![0]);
                if present.contains(&a) {
                    t
                } else {
                    t.with_error(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address))
                }
            })
            .collect()
    }

    fn full_reset() -> Vec<I2cTransaction> {
        let mut expectations = read_diagnostic(DIAG);
        expectations.extend((1..7).map(write_zero));
        expectations.extend(read_timer([0; 6]));
        expectations
    }

    /// Fails the test if the bus is used while the switch line is low.
    struct GatedBus<B> {
        bus: B,
        line: Rc<Cell<bool>>,
    }

    impl<B: RegisterBus> GatedBus<B> {
        fn check(&self) {
            assert!(self.line.get(), "bus used while the switch is released");
        }
    }

    impl<B: RegisterBus> RegisterBus for GatedBus<B> {
        type Error = B::Error;

        fn probe(&mut self, addr: BusAddress) -> BusResult<u8, B::Error> {
            self.check();
            self.bus.probe(addr)
        }

        fn read_register(&mut self, addr: BusAddress, offset: u8) -> BusResult<u8, B::Error> {
            self.check();
            self.bus.read_register(addr, offset)
        }

        fn write_register(
            &mut self,
            addr: BusAddress,
            offset: u8,
            value: u8,
        ) -> BusResult<(), B::Error> {
            self.check();
            self.bus.write_register(addr, offset, value)
        }
    }

    fn no_choice(_: AddressSet) -> Option<BusAddress> {
        None
    }

    fn yes(_: &Snapshot) -> bool {
        true
    }

    #[test]
    fn scans_resets_and_releases_the_switch() {
        let mut expectations = scan(&[0x50]);
        expectations.extend(full_reset());
        let mut i2c = I2cMock::new(&expectations);
        let mut bus = Bus::new(i2c.clone());
        let mut ctx = Context::new()
            .with_switch(SwitchGate::new(FakePin::default(), NoopDelay::new()))
            .with_power_cycle(PowerCycler::new(FakeDisplay::responsive(), NoopDelay::new()));
        let outcome = ctx
            .run(&mut bus, &mut NoopDelay::new(), yes, no_choice)
            .unwrap();
        assert!(matches!(outcome, RunOutcome::Reset(r) if r.address.get() == 0x50));
        assert_eq!(ctx.address(), BusAddress::new(0x50));
        let (gate, cycler) = ctx.release();
        let gate = gate.unwrap();
        assert_eq!(gate.state(), PowerSequenceState::Disabled);
        assert_eq!(gate.release().driven, vec![true, false]);
        assert_eq!(cycler.unwrap().release().calls, vec!["off", "on"]);
        i2c.done();
    }

    #[test]
    fn switch_is_released_after_a_hard_failure() {
        let mut expectations = read_diagnostic(DIAG);
        expectations.push(write_zero(1).with_error(ErrorKind::Other));
        expectations.push(write_zero(1).with_error(ErrorKind::Other));
        let mut i2c = I2cMock::new(&expectations);
        let mut bus = Bus::new(i2c.clone());
        let mut ctx = Context::new()
            .with_address(BusAddress::new(0x50))
            .with_switch(SwitchGate::new(FakePin::default(), NoopDelay::new()));
        let err = ctx
            .run(&mut bus, &mut NoopDelay::new(), yes, no_choice)
            .unwrap_err();
        match err {
            RunError::Reset(e @ ResetError::WriteFailure { .. }) => {
                assert_eq!(e.snapshot(), Some(&Snapshot(DIAG)));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            ctx.switch().map(|g| g.state()),
            Some(PowerSequenceState::Disabled)
        );
        i2c.done();
    }

    #[test]
    fn control_mode_error_keeps_the_bus_untouched() {
        let mut i2c = I2cMock::new(&[]);
        let mut bus = Bus::new(i2c.clone());
        let pin = FakePin {
            stuck_low: true,
            ..Default::default()
        };
        let mut ctx = Context::new().with_switch(SwitchGate::new(pin, NoopDelay::new()));
        let err = ctx
            .run(&mut bus, &mut NoopDelay::new(), yes, no_choice)
            .unwrap_err();
        assert!(matches!(err, RunError::Switch(SwitchError::ControlMode)));
        assert_eq!(ctx.address(), None);
        i2c.done();
    }

    #[test]
    fn power_cycle_timeout_keeps_the_bus_untouched() {
        let mut i2c = I2cMock::new(&[]);
        let mut bus = Bus::new(i2c.clone());
        let display = FakeDisplay {
            on: true,
            ..Default::default()
        };
        let mut ctx = Context::new()
            .with_switch(SwitchGate::new(FakePin::default(), NoopDelay::new()))
            .with_power_cycle(PowerCycler::new(display, NoopDelay::new()).with_timeout_ms(100));
        let err = ctx
            .run(&mut bus, &mut NoopDelay::new(), yes, no_choice)
            .unwrap_err();
        assert!(matches!(
            err,
            RunError::PowerCycle(PowerCycleError::Timeout { .. })
        ));
        assert_eq!(
            ctx.switch().map(|g| g.state()),
            Some(PowerSequenceState::Disabled)
        );
        i2c.done();
    }

    #[test]
    fn ambiguous_scan_without_a_choice_aborts() {
        let expectations = scan(&[0x50, 0x54]);
        let mut i2c = I2cMock::new(&expectations);
        let mut bus = Bus::new(i2c.clone());
        let mut ctx = Context::new();
        let err = ctx
            .run(&mut bus, &mut NoopDelay::new(), yes, no_choice)
            .unwrap_err();
        match err {
            RunError::Locate(LocateError::AmbiguousDevice(set)) => assert_eq!(set.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
        i2c.done();
    }

    #[test]
    fn ambiguous_scan_resolved_by_the_caller() {
        let mut expectations = scan(&[0x50, 0x54]);
        expectations.extend(full_reset());
        let mut i2c = I2cMock::new(&expectations);
        let mut bus = Bus::new(i2c.clone());
        let mut ctx = Context::new();
        let outcome = ctx
            .run(&mut bus, &mut NoopDelay::new(), yes, |set: AddressSet| set.first())
            .unwrap();
        assert!(matches!(outcome, RunOutcome::Reset(_)));
        i2c.done();
    }

    #[test]
    fn nothing_found_is_reported() {
        let expectations = scan(&[]);
        let mut i2c = I2cMock::new(&expectations);
        let mut bus = Bus::new(i2c.clone());
        let err = Context::new()
            .run(&mut bus, &mut NoopDelay::new(), yes, no_choice)
            .unwrap_err();
        assert!(matches!(err, RunError::Locate(LocateError::DeviceNotFound)));
        i2c.done();
    }

    #[test]
    fn readback_happens_while_the_switch_is_held() {
        let after = [17, 0, 0, 0, 0, 0, 0, 0, 255, 8];
        let mut expectations = full_reset();
        expectations.extend(read_diagnostic(after));
        let mut i2c = I2cMock::new(&expectations);
        let pin = FakePin::default();
        let mut bus = GatedBus {
            bus: Bus::new(i2c.clone()),
            line: pin.line.clone(),
        };
        let mut ctx = Context::new()
            .with_address(BusAddress::new(0x50))
            .with_readback(true)
            .with_switch(SwitchGate::new(pin, NoopDelay::new()));
        let outcome = ctx
            .run(&mut bus, &mut NoopDelay::new(), yes, no_choice)
            .unwrap();
        match outcome {
            RunOutcome::Reset(report) => {
                assert_eq!(report.snapshot, Snapshot(DIAG));
                assert_eq!(report.after, Some(Snapshot(after)));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!bus.line.get());
        i2c.done();
    }

    #[test]
    fn failed_readback_keeps_the_reset_successful() {
        let mut expectations = full_reset();
        expectations.extend(read_diagnostic(DIAG).into_iter().take(3));
        expectations.push(
            I2cTransaction::write_read(0x50, vec![3], vec![0]).with_error(ErrorKind::Other),
        );
        let mut i2c = I2cMock::new(&expectations);
        let mut bus = Bus::new(i2c.clone());
        let mut ctx = Context::new()
            .with_address(BusAddress::new(0x50))
            .with_readback(true)
            .with_switch(SwitchGate::new(FakePin::default(), NoopDelay::new()));
        let outcome = ctx
            .run(&mut bus, &mut NoopDelay::new(), yes, no_choice)
            .unwrap();
        assert!(matches!(outcome, RunOutcome::Reset(r) if r.after.is_none()));
        assert_eq!(
            ctx.switch().map(|g| g.state()),
            Some(PowerSequenceState::Disabled)
        );
        i2c.done();
    }

    #[test]
    fn no_readback_unless_asked() {
        let expectations = full_reset();
        let mut i2c = I2cMock::new(&expectations);
        let mut bus = Bus::new(i2c.clone());
        let outcome = Context::new()
            .with_address(BusAddress::new(0x50))
            .run(&mut bus, &mut NoopDelay::new(), yes, no_choice)
            .unwrap();
        assert!(matches!(outcome, RunOutcome::Reset(r) if r.after.is_none()));
        i2c.done();
    }
}
