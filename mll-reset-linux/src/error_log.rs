//! Appends failed resets to a local log, with the data needed to restore the EEPROM by hand.

use chrono::{DateTime, SecondsFormat, TimeZone};
use i2c_probe::BusAddress;
use mll_reset::{RunError, Snapshot};
use std::{fs::OpenOptions, io::Write, path::Path};

/// One line of the error log.
pub fn record<Tz: TimeZone>(at: &DateTime<Tz>, address: BusAddress, snapshot: &Snapshot) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{}: Error writing to device at {address}. Diagnostic snapshot: {snapshot}\n",
        at.to_rfc3339_opts(SecondsFormat::Secs, false)
    )
}

/// Appends a record for `address` to the log at `path`, creating it if needed.
pub fn append(path: &Path, address: BusAddress, snapshot: &Snapshot) -> std::io::Result<()> {
    let line = record(&chrono::Local::now(), address, snapshot);
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())
}

/// Records a failed run at `path` if it got far enough to read the diagnostic window.
///
/// Returns whether a record was written. Nothing is written for failures before the snapshot
/// was complete, since the EEPROM was not touched.
pub fn record_failure<E, P, C>(
    error: &RunError<E, P, C>,
    address: Option<BusAddress>,
    path: &Path,
) -> std::io::Result<bool> {
    let (RunError::Reset(e), Some(address)) = (error, address) else {
        return Ok(false);
    };
    let Some(snapshot) = e.snapshot() else {
        return Ok(false);
    };
    append(path, address, snapshot)?;
    Ok(true)
}
