//! The power switch line, driven through the GPIO character device.

use embedded_hal::digital::{self, ErrorType, OutputPin, StatefulOutputPin};
use linux_embedded_hal::gpio_cdev::{Chip, LineDirection, LineHandle, LineRequestFlags, errors};
use std::path::Path;

/// GPIO errors.
#[derive(Debug)]
pub struct GpioError(pub errors::Error);

impl digital::Error for GpioError {
    fn kind(&self) -> digital::ErrorKind {
        digital::ErrorKind::Other
    }
}

impl From<errors::Error> for GpioError {
    fn from(value: errors::Error) -> Self {
        Self(value)
    }
}

/// A GPIO line requested as output, initially low.
pub struct GpioSwitch {
    handle: LineHandle,
}

impl GpioSwitch {
    /// Requests line `line` of the chip at `chip`.
    pub fn open(chip: &Path, line: u32) -> Result<Self, GpioError> {
        let handle = Chip::new(chip)?
            .get_line(line)?
            .request(LineRequestFlags::OUTPUT, 0, "mll-reset")?;
        Ok(Self { handle })
    }

    fn is_output(&self) -> Result<bool, GpioError> {
        Ok(self.handle.line().info()?.direction() == LineDirection::Out)
    }
}

impl ErrorType for GpioSwitch {
    type Error = GpioError;
}

impl OutputPin for GpioSwitch {
    fn set_low(&mut self) -> Result<(), GpioError> {
        Ok(self.handle.set_value(0)?)
    }

    fn set_high(&mut self) -> Result<(), GpioError> {
        Ok(self.handle.set_value(1)?)
    }
}

/// Reads the line back; a line that is no longer an output never reads as set.
impl StatefulOutputPin for GpioSwitch {
    fn is_set_high(&mut self) -> Result<bool, GpioError> {
        Ok(self.is_output()? && self.handle.get_value()? == 1)
    }

    fn is_set_low(&mut self) -> Result<bool, GpioError> {
        Ok(self.is_output()? && self.handle.get_value()? == 0)
    }
}
