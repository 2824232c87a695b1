//! Display power control over HDMI-CEC, through `cec-ctl` from v4l-utils.

use mll_reset::PowerCycle;
use std::{
    io,
    path::PathBuf,
    process::{Child, Command, Output, Stdio},
    thread,
    time::{Duration, Instant},
};

/// Logical address of the TV on the CEC bus.
const TV: &str = "0";

/// Interval between two checks of a running `cec-ctl`.
const CHILD_POLL: Duration = Duration::from_millis(10);

/// Switches the display through the CEC adapter at `device`, as a playback device.
///
/// Each `cec-ctl` invocation is killed once it has run for `timeout`.
pub struct CecPowerCycle {
    device: PathBuf,
    timeout: Duration,
}

impl CecPowerCycle {
    /// Registers as a playback device on the CEC adapter at `device`.
    pub fn open(device: PathBuf, timeout: Duration) -> io::Result<Self> {
        let cec = Self { device, timeout };
        cec.cec_ctl(&["--playback"])?;
        Ok(cec)
    }

    fn cec_ctl(&self, args: &[&str]) -> io::Result<String> {
        let child = Command::new("cec-ctl")
            .arg("-d")
            .arg(&self.device)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        let output = wait_bounded(child, self.timeout)?;
        if !output.status.success() {
            return Err(io::Error::other(format!(
                "cec-ctl {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl PowerCycle for CecPowerCycle {
    type Error = io::Error;

    fn power_off(&mut self) -> io::Result<()> {
        self.cec_ctl(&["--to", TV, "--standby"]).map(drop)
    }

    fn power_on(&mut self) -> io::Result<()> {
        self.cec_ctl(&["--to", TV, "--image-view-on"]).map(drop)
    }

    /// A reply without a power status, or a query that timed out, is reported as `None`.
    fn is_on(&mut self) -> io::Result<Option<bool>> {
        match self.cec_ctl(&["--to", TV, "--give-device-power-status"]) {
            Ok(out) => Ok(parse_power_status(&out)),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                log::debug!("{e}");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// Waits for `child` to exit, killing it once `timeout` has passed.
///
/// The output is small enough to stay in the pipe buffers until the child exits.
fn wait_bounded(mut child: Child, timeout: Duration) -> io::Result<Output> {
    let deadline = Instant::now() + timeout;
    while child.try_wait()?.is_none() {
        if Instant::now() >= deadline {
            child.kill()?;
            child.wait()?;
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("cec-ctl still running after {} ms", timeout.as_millis()),
            ));
        }
        thread::sleep(CHILD_POLL);
    }
    child.wait_with_output()
}

/// Finds the `pwr-state:` field of a `REPORT_POWER_STATUS` reply.
///
/// Only `on` counts as on; `standby` and both transition states count as off.
fn parse_power_status(out: &str) -> Option<bool> {
    out.lines()
        .find_map(|l| l.trim().strip_prefix("pwr-state:"))
        .map(|state| state.trim_start().starts_with("on"))
}
