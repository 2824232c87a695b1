use crate::{PowerCycleError, SwitchError};
use core::fmt;
use embedded_hal::{delay::DelayNs, digital::StatefulOutputPin};

/// Minimum time the switch line is held before the bus is used, in milliseconds.
pub const MIN_SETTLE_MS: u32 = 10;

/// State of the power switch gate.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PowerSequenceState {
    /// Line deasserted. Initial and final state of every run.
    #[default]
    Disabled,
    /// Line driven, waiting for it to settle.
    Enabling,
    /// Line asserted and verified.
    Enabled,
}

/// A control line that must be asserted before the bus is addressable.
///
/// Takes ownership of an output pin (implementing [`StatefulOutputPin`]) and a timer object
/// implementing [`DelayNs`].
pub struct SwitchGate<P, D> {
    pin: P,
    delay: D,
    settle_ms: u32,
    state: PowerSequenceState,
}

impl<P, D> SwitchGate<P, D> {
    /// Creates a gate over `pin`, initially disabled.
    pub fn new(pin: P, delay: D) -> Self {
        Self {
            pin,
            delay,
            settle_ms: MIN_SETTLE_MS,
            state: PowerSequenceState::Disabled,
        }
    }

    /// Set the settle delay applied after asserting the line.
    ///
    /// Values below [`MIN_SETTLE_MS`] are raised to it.
    pub fn with_settle_ms(mut self, settle_ms: u32) -> Self {
        self.settle_ms = settle_ms.max(MIN_SETTLE_MS);
        self
    }

    /// Current state.
    pub fn state(&self) -> PowerSequenceState {
        self.state
    }

    /// Gives the control line back.
    pub fn release(self) -> P {
        self.pin
    }
}

impl<P: StatefulOutputPin, D: DelayNs> SwitchGate<P, D> {
    /// Asserts the line, waits for it to settle and checks that it reads back as asserted.
    ///
    /// On [`SwitchError::ControlMode`] the line is deasserted again before returning.
    pub fn enable(&mut self) -> Result<(), SwitchError<P::Error>> {
        if self.state == PowerSequenceState::Enabled {
            return Ok(());
        }
        self.state = PowerSequenceState::Enabling;
        self.pin.set_high()?;
        self.delay.delay_ms(self.settle_ms);
        if !self.pin.is_set_high()? {
            self.disable()?;
            return Err(SwitchError::ControlMode);
        }
        self.state = PowerSequenceState::Enabled;
        log::debug!("power switch enabled");
        Ok(())
    }

    /// Deasserts the line. Does nothing if the gate was never enabled.
    pub fn disable(&mut self) -> Result<(), SwitchError<P::Error>> {
        if self.state == PowerSequenceState::Disabled {
            return Ok(());
        }
        self.pin.set_low()?;
        self.state = PowerSequenceState::Disabled;
        log::debug!("power switch disabled");
        Ok(())
    }
}

/// Power state of the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    /// Standby or off.
    Off,
    /// On.
    On,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Off => "off",
            Self::On => "on",
        })
    }
}

/// An out-of-band channel that switches the display on and off.
pub trait PowerCycle {
    /// The error type of the channel.
    type Error;

    /// Requests the device to power off. May return before the device is off.
    fn power_off(&mut self) -> Result<(), Self::Error>;

    /// Requests the device to power on. May return before the device is on.
    fn power_on(&mut self) -> Result<(), Self::Error>;

    /// Whether the device currently reports being on, or `None` if it did not answer.
    fn is_on(&mut self) -> Result<Option<bool>, Self::Error>;
}

/// A monotonic millisecond clock bounding the power-cycle waits.
///
/// The unit clock `()` always reads zero, in which case only the poll sleeps are counted.
pub trait Clock {
    /// Milliseconds since an arbitrary fixed point.
    fn now_ms(&mut self) -> u64;
}

impl Clock for () {
    fn now_ms(&mut self) -> u64 {
        0
    }
}

/// Drives a [`PowerCycle`] channel through off and back on, with bounded waits.
pub struct PowerCycler<C, D, K = ()> {
    channel: C,
    delay: D,
    clock: K,
    poll_ms: u32,
    timeout_ms: u32,
}

impl<C, D> PowerCycler<C, D> {
    /// Creates a cycler with a 500 ms poll interval and a 30 s timeout per transition.
    pub fn new(channel: C, delay: D) -> Self {
        Self {
            channel,
            delay,
            clock: (),
            poll_ms: 500,
            timeout_ms: 30_000,
        }
    }
}

impl<C, D, K> PowerCycler<C, D, K> {
    /// Measure the waits with `clock` as well as by the poll sleeps, so that time spent
    /// querying the channel counts against the timeout.
    pub fn with_clock<K2: Clock>(self, clock: K2) -> PowerCycler<C, D, K2> {
        PowerCycler {
            channel: self.channel,
            delay: self.delay,
            clock,
            poll_ms: self.poll_ms,
            timeout_ms: self.timeout_ms,
        }
    }

    /// Set the interval between two state polls, in milliseconds (at least 1).
    pub fn with_poll_ms(mut self, poll_ms: u32) -> Self {
        self.poll_ms = poll_ms.max(1);
        self
    }

    /// Set how long to wait for each transition, in milliseconds.
    pub fn with_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Gives the channel back.
    pub fn release(self) -> C {
        self.channel
    }
}

impl<C: PowerCycle, D: DelayNs, K: Clock> PowerCycler<C, D, K> {
    /// Powers the device off, waits until it reports off, powers it on and waits until it
    /// reports on.
    ///
    /// If anything fails after the device was asked to power off, it is asked to power on
    /// again before the error is returned.
    pub fn cycle(&mut self) -> Result<(), PowerCycleError<C::Error>> {
        self.channel.power_off()?;
        let res = self.finish_cycle();
        if res.is_err() && self.channel.power_on().is_err() {
            log::warn!("could not power the device back on");
        }
        res
    }

    fn finish_cycle(&mut self) -> Result<(), PowerCycleError<C::Error>> {
        self.wait_for(PowerState::Off)?;
        self.channel.power_on()?;
        self.wait_for(PowerState::On)
    }

    /// Polls until the device reports `target`.
    ///
    /// A poll without an answer counts as the state not being reached yet. The timeout is
    /// checked against the larger of the clock and the summed poll sleeps.
    pub fn wait_for(&mut self, target: PowerState) -> Result<(), PowerCycleError<C::Error>> {
        let start = self.clock.now_ms();
        let mut slept = 0u64;
        loop {
            let reply = self.channel.is_on()?;
            let elapsed = self.clock.now_ms().saturating_sub(start).max(slept);
            match reply {
                Some(on) if on == (target == PowerState::On) => {
                    log::debug!("device is {target} after {elapsed} ms");
                    return Ok(());
                }
                Some(_) => {}
                None => log::debug!("no power status from the device"),
            }
            if elapsed >= u64::from(self.timeout_ms) {
                return Err(PowerCycleError::Timeout {
                    waiting_for: target,
                });
            }
            self.delay.delay_ms(self.poll_ms);
            slept += u64::from(self.poll_ms);
        }
    }
}
