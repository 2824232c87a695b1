use crate::{
    Confirm, DIAGNOSTIC_WINDOW, ResetError, ResetOutcome, ResetState, Snapshot, TIMER_LEN,
    TIMER_WINDOW, TimerBytes, TimerReset, WriteOutcome,
};
use embedded_hal_async::delay::DelayNs;
use i2c_probe::RegisterBusAsync;

impl TimerReset {
    /// Runs the whole sequence on an asynchronous bus. See [`run`](TimerReset::run).
    pub async fn async_run<B: RegisterBusAsync, D: DelayNs, F: Confirm>(
        &mut self,
        bus: &mut B,
        delay: &mut D,
        mut confirm: F,
    ) -> Result<ResetOutcome, ResetError<B::Error>> {
        let snapshot = self.async_read_diagnostic(bus).await?;
        self.state = ResetState::AwaitingConfirmation;
        if !confirm.confirm(&snapshot) {
            self.state = ResetState::Declined;
            return Ok(ResetOutcome::Declined(snapshot));
        }
        self.async_zero_timer(bus, delay, snapshot).await?;
        self.async_verify(bus, snapshot).await?;
        Ok(ResetOutcome::Reset(self.report(snapshot)))
    }

    /// Reads every register of the diagnostic window, in order.
    pub async fn async_read_diagnostic<B: RegisterBusAsync>(
        &mut self,
        bus: &mut B,
    ) -> Result<Snapshot, ResetError<B::Error>> {
        self.state = ResetState::Reading;
        let mut snapshot = Snapshot::default();
        for (b, offset) in snapshot.0.iter_mut().zip(DIAGNOSTIC_WINDOW.offsets()) {
            match bus.read_register(self.address, offset).await {
                Ok(v) => *b = v,
                Err(error) => {
                    return Err(self.fail(ResetError::Read {
                        offset,
                        snapshot: None,
                        error,
                    }));
                }
            }
        }
        Ok(snapshot)
    }

    /// Writes zero to every timer register, retrying each once. See
    /// [`zero_timer`](TimerReset::zero_timer).
    pub async fn async_zero_timer<B: RegisterBusAsync, D: DelayNs>(
        &mut self,
        bus: &mut B,
        delay: &mut D,
        snapshot: Snapshot,
    ) -> Result<(), ResetError<B::Error>> {
        self.state = ResetState::Writing;
        self.outcomes = [None; TIMER_LEN];
        for (i, offset) in TIMER_WINDOW.offsets().enumerate() {
            let outcome = if bus.write_register(self.address, offset, 0).await.is_ok() {
                WriteOutcome::Written
            } else {
                log::warn!("failed writing {}[{offset}], trying again", self.address);
                if let Err(error) = bus.write_register(self.address, offset, 0).await {
                    self.outcomes[i] = Some(WriteOutcome::Failed);
                    return Err(self.fail(ResetError::WriteFailure {
                        offset,
                        snapshot,
                        error,
                    }));
                }
                WriteOutcome::Retried
            };
            self.outcomes[i] = Some(outcome);
            delay.delay_ms(self.write_cycle_ms).await;
        }
        Ok(())
    }

    /// Reads the timer window back and requires every byte to be zero.
    pub async fn async_verify<B: RegisterBusAsync>(
        &mut self,
        bus: &mut B,
        snapshot: Snapshot,
    ) -> Result<(), ResetError<B::Error>> {
        self.state = ResetState::Verifying;
        let mut readback: TimerBytes = [0; TIMER_LEN];
        for (b, offset) in readback.iter_mut().zip(TIMER_WINDOW.offsets()) {
            match bus.read_register(self.address, offset).await {
                Ok(v) => *b = v,
                Err(error) => {
                    return Err(self.fail(ResetError::Read {
                        offset,
                        snapshot: Some(snapshot),
                        error,
                    }));
                }
            }
        }
        self.check_readback(readback, snapshot)?;
        self.state = ResetState::Success;
        Ok(())
    }
}
