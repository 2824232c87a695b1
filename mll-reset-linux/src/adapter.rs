//! The Linux I2C adapter, as seen by the register transport.

use embedded_hal::i2c::{self, ErrorKind, I2c, NoAcknowledgeSource, Operation, SevenBitAddress};
use linux_embedded_hal::{I2CError, I2cdev, i2cdev::linux::LinuxI2CError};
use std::{fs::OpenOptions, io, os::fd::AsRawFd, path::Path};

/// `I2C_TIMEOUT` ioctl from `linux/i2c-dev.h`, in units of 10 ms.
const I2C_TIMEOUT: libc::c_ulong = 0x0702;

/// An open `/dev/i2c-N` character device.
pub struct Adapter {
    dev: I2cdev,
}

impl Adapter {
    /// Opens the adapter at `path`, bounding every transaction by `timeout_ms`.
    pub fn open(path: &Path, timeout_ms: u32) -> io::Result<Self> {
        if let Err(e) = set_timeout(path, timeout_ms) {
            log::warn!("could not set the I2C timeout of {}: {e}", path.display());
        }
        let dev = I2cdev::new(path).map_err(|e| io::Error::other(e.to_string()))?;
        Ok(Self { dev })
    }
}

fn set_timeout(path: &Path, timeout_ms: u32) -> io::Result<()> {
    let file = OpenOptions::new().read(true).write(true).open(path)?;
    let ticks = timeout_ms.div_ceil(10).max(1) as libc::c_ulong;
    // SAFETY: I2C_TIMEOUT takes its argument by value, the descriptor is open.
    let ret = unsafe { libc::ioctl(file.as_raw_fd(), I2C_TIMEOUT as _, ticks) };
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Error of the Linux adapter.
///
/// Several bus drivers (i2c-bcm2835 among them) report a missing acknowledge as `EREMOTEIO`
/// rather than `ENXIO`; both are classified as [`ErrorKind::NoAcknowledge`].
#[derive(Debug)]
pub struct AdapterError(pub I2CError);

impl AdapterError {
    fn errno(&self) -> Option<i32> {
        match self.0.inner() {
            LinuxI2CError::Errno(e) => Some(*e),
            LinuxI2CError::Io(e) => e.raw_os_error(),
        }
    }
}

impl i2c::Error for AdapterError {
    fn kind(&self) -> ErrorKind {
        match i2c::Error::kind(&self.0) {
            ErrorKind::Other if self.errno() == Some(libc::EREMOTEIO) => {
                ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown)
            }
            kind => kind,
        }
    }
}

impl i2c::ErrorType for Adapter {
    type Error = AdapterError;
}

impl I2c<SevenBitAddress> for Adapter {
    fn read(&mut self, address: u8, read: &mut [u8]) -> Result<(), Self::Error> {
        self.dev.read(address, read).map_err(AdapterError)
    }

    fn write(&mut self, address: u8, write: &[u8]) -> Result<(), Self::Error> {
        self.dev.write(address, write).map_err(AdapterError)
    }

    fn write_read(
        &mut self,
        address: u8,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.dev.write_read(address, write, read).map_err(AdapterError)
    }

    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.dev.transaction(address, operations).map_err(AdapterError)
    }
}
