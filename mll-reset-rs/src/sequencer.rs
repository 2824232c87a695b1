use crate::{
    DEFAULT_WRITE_CYCLE_MS, DIAGNOSTIC_WINDOW, ResetError, Snapshot, TIMER_LEN, TIMER_WINDOW,
    TimerBytes, is_zeroed,
};
use embedded_hal::delay::DelayNs;
use i2c_probe::{BusAddress, RegisterBus};

/// Where a [`TimerReset`] stands.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ResetState {
    /// Nothing done yet.
    #[default]
    Idle,
    /// Reading the diagnostic window.
    Reading,
    /// Waiting for the [`Confirm`] decision.
    AwaitingConfirmation,
    /// Writing zero over the timer window.
    Writing,
    /// Reading the timer window back.
    Verifying,
    /// The timer reads back as zero.
    Success,
    /// Confirmation was refused, nothing was written.
    Declined,
    /// The sequence stopped on an error.
    HardFailure,
}

/// Result of writing one register of the timer window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Acknowledged on the first attempt.
    Written,
    /// Acknowledged on the retry.
    Retried,
    /// Both attempts failed.
    Failed,
}

/// Report of a successful reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetReport {
    /// Address of the EEPROM.
    pub address: BusAddress,
    /// The diagnostic window before writing.
    pub snapshot: Snapshot,
    /// One outcome per timer register, in offset order.
    pub outcomes: [WriteOutcome; TIMER_LEN],
    /// The diagnostic window read back after verifying, when the run asked for it.
    pub after: Option<Snapshot>,
}

impl ResetReport {
    /// Number of writes that needed the retry.
    pub fn retries(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|&&o| o == WriteOutcome::Retried)
            .count()
    }
}

/// How a sequence ended, short of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    /// The timer was zeroed and verified.
    Reset(ResetReport),
    /// The confirmation was refused after reading the snapshot.
    Declined(Snapshot),
}

/// Decides whether to write, given the diagnostic snapshot.
///
/// Implemented for every `FnMut(&Snapshot) -> bool`.
pub trait Confirm {
    /// `true` to go on and zero the timer.
    fn confirm(&mut self, snapshot: &Snapshot) -> bool;
}

impl<F: FnMut(&Snapshot) -> bool> Confirm for F {
    fn confirm(&mut self, snapshot: &Snapshot) -> bool {
        self(snapshot)
    }
}

/// The read, confirm, write, verify sequence for one EEPROM.
#[derive(Debug)]
pub struct TimerReset {
    pub(crate) address: BusAddress,
    pub(crate) write_cycle_ms: u32,
    pub(crate) state: ResetState,
    pub(crate) outcomes: [Option<WriteOutcome>; TIMER_LEN],
}

impl TimerReset {
    /// Creates a sequence for the EEPROM at `address`.
    pub fn new(address: BusAddress) -> Self {
        Self {
            address,
            write_cycle_ms: DEFAULT_WRITE_CYCLE_MS,
            state: ResetState::Idle,
            outcomes: [None; TIMER_LEN],
        }
    }

    /// Set the time to wait after each acknowledged write, in milliseconds.
    pub fn with_write_cycle_ms(mut self, write_cycle_ms: u32) -> Self {
        self.write_cycle_ms = write_cycle_ms;
        self
    }

    /// Current state.
    pub fn state(&self) -> ResetState {
        self.state
    }

    /// Outcome of each timer register written so far, in offset order.
    pub fn outcomes(&self) -> &[Option<WriteOutcome>; TIMER_LEN] {
        &self.outcomes
    }

    pub(crate) fn fail<E>(&mut self, error: ResetError<E>) -> ResetError<E> {
        self.state = ResetState::HardFailure;
        error
    }

    pub(crate) fn report(&self, snapshot: Snapshot) -> ResetReport {
        let mut outcomes = [WriteOutcome::Written; TIMER_LEN];
        for (o, r) in outcomes.iter_mut().zip(self.outcomes.iter()) {
            *o = r.unwrap_or(WriteOutcome::Failed);
        }
        ResetReport {
            address: self.address,
            snapshot,
            outcomes,
            after: None,
        }
    }

    pub(crate) fn check_readback<E>(
        &mut self,
        readback: TimerBytes,
        snapshot: Snapshot,
    ) -> Result<(), ResetError<E>> {
        if is_zeroed(&readback) {
            Ok(())
        } else {
            Err(self.fail(ResetError::VerificationFailure { readback, snapshot }))
        }
    }
}

impl TimerReset {
    /// Runs the whole sequence.
    ///
    /// Reads the diagnostic window, hands it to `confirm`, zeroes the timer window and checks
    /// that it reads back as zero.
    pub fn run<B: RegisterBus, D: DelayNs, F: Confirm>(
        &mut self,
        bus: &mut B,
        delay: &mut D,
        mut confirm: F,
    ) -> Result<ResetOutcome, ResetError<B::Error>> {
        let snapshot = self.read_diagnostic(bus)?;
        self.state = ResetState::AwaitingConfirmation;
        if !confirm.confirm(&snapshot) {
            self.state = ResetState::Declined;
            return Ok(ResetOutcome::Declined(snapshot));
        }
        self.zero_timer(bus, delay, snapshot)?;
        self.verify(bus, snapshot)?;
        Ok(ResetOutcome::Reset(self.report(snapshot)))
    }

    /// Reads every register of the diagnostic window, in order.
    pub fn read_diagnostic<B: RegisterBus>(
        &mut self,
        bus: &mut B,
    ) -> Result<Snapshot, ResetError<B::Error>> {
        self.state = ResetState::Reading;
        let mut snapshot = Snapshot::default();
        for (b, offset) in snapshot.0.iter_mut().zip(DIAGNOSTIC_WINDOW.offsets()) {
            *b = bus.read_register(self.address, offset).map_err(|error| {
                self.fail(ResetError::Read {
                    offset,
                    snapshot: None,
                    error,
                })
            })?;
        }
        log::debug!("diagnostic window of {}: {snapshot}", self.address);
        Ok(snapshot)
    }

    /// Writes zero to every timer register in ascending order.
    ///
    /// A failed write is retried once, right away. If the retry fails too, no further register
    /// is written.
    pub fn zero_timer<B: RegisterBus, D: DelayNs>(
        &mut self,
        bus: &mut B,
        delay: &mut D,
        snapshot: Snapshot,
    ) -> Result<(), ResetError<B::Error>> {
        self.state = ResetState::Writing;
        self.outcomes = [None; TIMER_LEN];
        for (i, offset) in TIMER_WINDOW.offsets().enumerate() {
            let outcome = match bus.write_register(self.address, offset, 0) {
                Ok(()) => WriteOutcome::Written,
                Err(_) => {
                    log::warn!("failed writing {}[{offset}], trying again", self.address);
                    match bus.write_register(self.address, offset, 0) {
                        Ok(()) => WriteOutcome::Retried,
                        Err(error) => {
                            self.outcomes[i] = Some(WriteOutcome::Failed);
                            return Err(self.fail(ResetError::WriteFailure {
                                offset,
                                snapshot,
                                error,
                            }));
                        }
                    }
                }
            };
            self.outcomes[i] = Some(outcome);
            delay.delay_ms(self.write_cycle_ms);
        }
        Ok(())
    }

    /// Reads the timer window back and requires every byte to be zero.
    pub fn verify<B: RegisterBus>(
        &mut self,
        bus: &mut B,
        snapshot: Snapshot,
    ) -> Result<(), ResetError<B::Error>> {
        self.state = ResetState::Verifying;
        let mut readback: TimerBytes = [0; TIMER_LEN];
        for (b, offset) in readback.iter_mut().zip(TIMER_WINDOW.offsets()) {
            *b = bus.read_register(self.address, offset).map_err(|error| {
                self.fail(ResetError::Read {
                    offset,
                    snapshot: Some(snapshot),
                    error,
                })
            })?;
        }
        self.check_readback(readback, snapshot)?;
        self.state = ResetState::Success;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::{
        delay::NoopDelay,
        i2c::{Mock as I2cMock, Transaction as I2cTransaction},
    };
    use i2c_probe::{Bus, BusError};
    use rand::Rng;

    pub(crate) const DEV: u8 = 0x50;

    pub(crate) fn dev() -> BusAddress {
        BusAddress::new(DEV).unwrap()
    }

    pub(crate) fn read_diagnostic(values: [u8; 10]) -> Vec<I2cTransaction> {
        (0..10)
            .map(|o| I2cTransaction::write_read(DEV, vec![o], vec![values[o as usize]]))
            .collect()
    }

    pub(crate) fn write_zero(offset: u8) -> I2cTransaction {
        I2cTransaction::write(DEV, vec![offset, 0])
    }

    pub(crate) fn read_timer(values: [u8; 6]) -> Vec<I2cTransaction> {
        (1..7)
            .map(|o| I2cTransaction::write_read(DEV, vec![o], vec![values[o as usize - 1]]))
            .collect()
    }

    pub(crate) const DIAG: [u8; 10] = [17, 3, 0, 12, 9, 1, 44, 0, 255, 8];

    #[test]
    fn zeroes_and_verifies() {
        let mut expectations = read_diagnostic(DIAG);
        expectations.extend((1..7).map(write_zero));
        expectations.extend(read_timer([0; 6]));
        let mut i2c = I2cMock::new(&expectations);
        let mut bus = Bus::new(i2c.clone());
        let mut reset = TimerReset::new(dev());
        let outcome = reset.run(&mut bus, &mut NoopDelay::new(), |_: &Snapshot| true);
        match outcome.unwrap() {
            ResetOutcome::Reset(report) => {
                assert_eq!(report.snapshot, Snapshot(DIAG));
                assert_eq!(report.outcomes, [WriteOutcome::Written; 6]);
                assert_eq!(report.retries(), 0);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(reset.state(), ResetState::Success);
        i2c.done();
    }

    #[test]
    fn single_transient_failure_is_retried() {
        for failing in 1..7u8 {
            let mut expectations = read_diagnostic(DIAG);
            for o in 1..7 {
                if o == failing {
                    expectations.push(write_zero(o).with_error(ErrorKind::Other));
                }
                expectations.push(write_zero(o));
            }
            expectations.extend(read_timer([0; 6]));
            let mut i2c = I2cMock::new(&expectations);
            let mut bus = Bus::new(i2c.clone());
            let mut reset = TimerReset::new(dev());
            let report = match reset.run(&mut bus, &mut NoopDelay::new(), |_: &Snapshot| true) {
                Ok(ResetOutcome::Reset(report)) => report,
                other => panic!("unexpected {other:?}"),
            };
            assert_eq!(report.retries(), 1);
            assert_eq!(
                report.outcomes[failing as usize - 1],
                WriteOutcome::Retried
            );
            i2c.done();
        }
    }

    #[test]
    fn second_failure_stops_writing() {
        let mut expectations = read_diagnostic(DIAG);
        expectations.push(write_zero(1));
        expectations.push(write_zero(2));
        expectations.push(write_zero(3).with_error(ErrorKind::Other));
        expectations.push(write_zero(3).with_error(ErrorKind::Bus));
        let mut i2c = I2cMock::new(&expectations);
        let mut bus = Bus::new(i2c.clone());
        let mut reset = TimerReset::new(dev());
        match reset.run(&mut bus, &mut NoopDelay::new(), |_: &Snapshot| true) {
            Err(ResetError::WriteFailure {
                offset,
                snapshot,
                error,
            }) => {
                assert_eq!(offset, 3);
                assert_eq!(snapshot, Snapshot(DIAG));
                assert!(matches!(error, BusError::Bus(ErrorKind::Bus)));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(reset.state(), ResetState::HardFailure);
        assert_eq!(
            reset.outcomes(),
            &[
                Some(WriteOutcome::Written),
                Some(WriteOutcome::Written),
                Some(WriteOutcome::Failed),
                None,
                None,
                None
            ]
        );
        i2c.done();
    }

    #[test]
    fn nonzero_readback_is_a_verification_failure() {
        let mut expectations = read_diagnostic(DIAG);
        expectations.extend((1..7).map(write_zero));
        expectations.extend(read_timer([0, 0, 0, 0, 1, 0]));
        let mut i2c = I2cMock::new(&expectations);
        let mut bus = Bus::new(i2c.clone());
        let mut reset = TimerReset::new(dev());
        match reset.run(&mut bus, &mut NoopDelay::new(), |_: &Snapshot| true) {
            Err(ResetError::VerificationFailure { readback, snapshot }) => {
                assert_eq!(readback, [0, 0, 0, 0, 1, 0]);
                assert_eq!(snapshot, Snapshot(DIAG));
            }
            other => panic!("unexpected {other:?}"),
        }
        i2c.done();
    }

    #[test]
    fn declining_writes_nothing() {
        let expectations = read_diagnostic(DIAG);
        let mut i2c = I2cMock::new(&expectations);
        let mut bus = Bus::new(i2c.clone());
        let mut reset = TimerReset::new(dev());
        let mut seen = None;
        let outcome = reset
            .run(&mut bus, &mut NoopDelay::new(), |s: &Snapshot| {
                seen = Some(*s);
                false
            })
            .unwrap();
        assert_eq!(outcome, ResetOutcome::Declined(Snapshot(DIAG)));
        assert_eq!(seen, Some(Snapshot(DIAG)));
        assert_eq!(reset.state(), ResetState::Declined);
        i2c.done();
    }

    #[test]
    fn unreadable_snapshot_writes_nothing() {
        let mut expectations = read_diagnostic(DIAG);
        expectations.truncate(4);
        expectations.push(
            I2cTransaction::write_read(DEV, vec![4], vec![0]).with_error(ErrorKind::Other),
        );
        let mut i2c = I2cMock::new(&expectations);
        let mut bus = Bus::new(i2c.clone());
        let mut reset = TimerReset::new(dev());
        let err = reset
            .run(&mut bus, &mut NoopDelay::new(), |_: &Snapshot| true)
            .unwrap_err();
        assert!(matches!(err, ResetError::Read { offset: 4, snapshot: None, .. }));
        assert!(err.snapshot().is_none());
        i2c.done();
    }

    #[test]
    fn timer_reads_back_zero_whatever_the_diagnostic_content() {
        let mut rng = rand::rng();
        for _ in 0..8 {
            let mut diag = [0u8; 10];
            rng.fill(&mut diag[..]);
            let mut expectations = read_diagnostic(diag);
            expectations.extend((1..7).map(write_zero));
            expectations.extend(read_timer([0; 6]));
            let mut i2c = I2cMock::new(&expectations);
            let mut bus = Bus::new(i2c.clone());
            let mut reset = TimerReset::new(dev()).with_write_cycle_ms(0);
            let outcome = reset.run(&mut bus, &mut NoopDelay::new(), |_: &Snapshot| true);
            assert!(matches!(outcome, Ok(ResetOutcome::Reset(_))));
            i2c.done();
        }
    }
}
