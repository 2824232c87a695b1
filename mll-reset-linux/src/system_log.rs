//! Routes the `log` macros to the system log, for unattended runs.

use log::LevelFilter;
use syslog::{BasicLogger, Facility, Formatter3164};

/// Records are tagged `mll-reset[pid]` in the user facility.
fn formatter() -> Formatter3164 {
    Formatter3164 {
        facility: Facility::LOG_USER,
        hostname: None,
        process: "mll-reset".into(),
        pid: std::process::id(),
    }
}

/// Connects to the local syslog socket and installs it as the global logger.
pub fn init(level: LevelFilter) -> anyhow::Result<()> {
    let logger = syslog::unix(formatter())?;
    log::set_boxed_logger(Box::new(BasicLogger::new(logger)))?;
    log::set_max_level(level);
    Ok(())
}
