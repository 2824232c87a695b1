mod adapter;
mod cec;
mod clock;
mod error_log;
mod gpio;
mod prompt;
mod system_log;

use adapter::Adapter;
use anyhow::{Context, bail};
use cec::CecPowerCycle;
use clap::Parser;
use clock::MonotonicClock;
use gpio::GpioSwitch;
use i2c_probe::{Bus, BusAddress, LocateError};
use linux_embedded_hal::Delay;
use mll_reset::{DEFAULT_WRITE_CYCLE_MS, PowerCycler, RunContext, RunError, RunOutcome, SwitchGate};
use prompt::Prompt;
use std::{path::PathBuf, process::ExitCode, time::Duration};

/// Zeroes the aging timer in the EEPROM of a plasma display over I2C.
///
/// Run without -s first to check that the data read looks sane.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Run without prompts, reporting to the system log
    #[arg(short, long)]
    silent: bool,
    /// Assert the power switch line around the run
    #[arg(short = 't', long = "switch")]
    switch: bool,
    /// Power-cycle the display over HDMI-CEC before the reset
    #[arg(short = 'c', long)]
    power_cycle: bool,
    /// EEPROM address (decimal or 0x-prefixed hex); skips the scan
    address: Option<BusAddress>,
    /// Path to I2C bus (e.g., /dev/i2c-1)
    #[arg(short, long, default_value = "/dev/i2c-1")]
    path: PathBuf,
    /// GPIO chip of the power switch line
    #[arg(long, default_value = "/dev/gpiochip0")]
    gpio_chip: PathBuf,
    /// Offset of the power switch line on the GPIO chip
    #[arg(long, default_value_t = 17)]
    gpio_line: u32,
    /// Time to hold the switch line before using the bus, in milliseconds
    #[arg(long, default_value_t = 10)]
    settle_ms: u32,
    /// CEC adapter used to power-cycle the display
    #[arg(long, default_value = "/dev/cec0")]
    cec_device: PathBuf,
    /// How long to wait for the display to power off or on, in milliseconds
    #[arg(long, default_value_t = 30_000)]
    power_timeout_ms: u32,
    /// Time after which a single cec-ctl call is abandoned, in milliseconds
    #[arg(long, default_value_t = 5000)]
    cec_timeout_ms: u64,
    /// Timeout of a single I2C transaction, in milliseconds
    #[arg(long, default_value_t = 1000)]
    bus_timeout_ms: u32,
    /// Time to wait after each EEPROM write, in milliseconds
    #[arg(long, default_value_t = DEFAULT_WRITE_CYCLE_MS)]
    write_cycle_ms: u32,
    /// File receiving the diagnostic snapshot when a reset fails
    #[arg(long, default_value = "mll_reset_error.log")]
    error_log: PathBuf,
}

type LinuxRun = RunContext<GpioSwitch, CecPowerCycle, Delay, MonotonicClock>;

fn main() -> ExitCode {
    let args = Args::parse();
    // Initialize the logger
    if args.silent {
        if let Err(e) = system_log::init(log::LevelFilter::Info) {
            eprintln!("Failed to initialize syslog: {e}");
        }
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn context(args: &Args) -> anyhow::Result<LinuxRun> {
    let mut ctx = LinuxRun::new()
        .with_address(args.address)
        .with_write_cycle_ms(args.write_cycle_ms)
        .with_readback(!args.silent);
    if args.switch {
        let pin = GpioSwitch::open(&args.gpio_chip, args.gpio_line).map_err(|e| {
            anyhow::anyhow!(
                "Failed to request line {} of {}: {:?}",
                args.gpio_line,
                args.gpio_chip.display(),
                e.0
            )
        })?;
        ctx = ctx.with_switch(SwitchGate::new(pin, Delay).with_settle_ms(args.settle_ms));
    }
    if args.power_cycle {
        let timeout = Duration::from_millis(args.cec_timeout_ms);
        let cec = CecPowerCycle::open(args.cec_device.clone(), timeout)
            .with_context(|| format!("Failed to open {}", args.cec_device.display()))?;
        ctx = ctx.with_power_cycle(
            PowerCycler::new(cec, Delay)
                .with_clock(MonotonicClock::new())
                .with_timeout_ms(args.power_timeout_ms),
        );
    }
    Ok(ctx)
}

fn run(args: &Args) -> anyhow::Result<()> {
    log::info!("Attempting MLL reset");
    let interactive = !args.silent;
    if interactive {
        println!("MLL reset: zeroes the panel aging timer in the display EEPROM.");
    }
    let adapter = Adapter::open(&args.path, args.bus_timeout_ms)
        .with_context(|| format!("Failed to open I2C bus {}", args.path.display()))?;
    let mut bus = Bus::new(adapter);
    let mut ctx = context(args)?;
    let outcome = ctx.run(
        &mut bus,
        &mut Delay,
        Prompt::new(interactive),
        Prompt::new(interactive),
    );
    match outcome {
        Ok(RunOutcome::Reset(report)) => {
            log::info!("Successful MLL reset of device at {}", report.address);
            if report.retries() > 0 {
                log::warn!("{} write(s) needed a retry", report.retries());
            }
            if let Some(after) = report.after {
                println!("It worked! EEPROM data now: {after}");
            }
            Ok(())
        }
        Ok(RunOutcome::Declined { address, .. }) => {
            log::warn!("Reset of device at {address} declined, nothing was written");
            Ok(())
        }
        Err(RunError::Locate(LocateError::DeviceNotFound)) => {
            bail!("No i2c device found when scanning. No writing was attempted.")
        }
        Err(RunError::Locate(LocateError::AmbiguousDevice(found))) => {
            bail!(
                "Multiple i2c devices found when scanning ({found}). \
                 No writing was attempted; pass the address explicitly."
            )
        }
        Err(e) => {
            let saved = error_log::record_failure(&e, ctx.address(), &args.error_log)
                .with_context(|| {
                    format!(
                        "Failed attempted MLL reset ({e}); could not save the data read \
                         before writing to {}",
                        args.error_log.display()
                    )
                })?;
            if saved {
                bail!(
                    "Failed attempted MLL reset: {e}. Saved the data read before writing as {}",
                    args.error_log.display()
                )
            }
            bail!("Failed attempted MLL reset: {e}")
        }
    }
}
