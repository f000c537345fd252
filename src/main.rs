//! Hall-effect keyboard to virtual gamepad mapper
//!
//! Command-line entry point.

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use hallpad::config::HallConfig;
use hallpad::keys::named_keys;
use hallpad::stress;

#[derive(Parser)]
#[command(name = "hallpad")]
#[command(about = "Map Hall-effect keyboard key travel to a virtual gamepad")]
struct Cli {
    /// Config file path (default: ~/.config/hallpad/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Connect to the keyboard and drive the virtual gamepad until Ctrl+C
    Run(RunArgs),
    /// Measure processing throughput with synthetic samples
    Bench {
        /// Number of samples to process
        #[arg(short, long, default_value_t = stress::DEFAULT_ITERATIONS)]
        iterations: u32,
    },
    /// List key names accepted in mappings
    Keys,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args)]
struct RunArgs {
    /// HID device path (e.g. /dev/hidraw3)
    #[arg(long, conflicts_with_all = ["vid", "scan"])]
    path: Option<String>,

    /// USB vendor id (hex accepted, e.g. 0x41e4)
    #[arg(long, value_parser = parse_u16, requires = "pid")]
    vid: Option<u16>,

    /// USB product id
    #[arg(long, value_parser = parse_u16, requires = "vid")]
    pid: Option<u16>,

    /// HID interface number
    #[arg(long)]
    interface: Option<i32>,

    /// Probe all HID interfaces for analog reports (hold a key while scanning)
    #[arg(long, conflicts_with = "vid")]
    scan: bool,
}

fn parse_u16(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid id \"{}\": {}", s, e))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config_path = cli.config.unwrap_or_else(HallConfig::default_path);

    match cli.command {
        Command::Run(args) => {
            info!("Loading config from {:?}", config_path);
            let config = HallConfig::load(&config_path)?;
            run::run(config, args).await
        }
        Command::Bench { iterations } => {
            let config = HallConfig::load(&config_path)?;
            bench(&config, iterations)
        }
        Command::Keys => {
            list_keys();
            Ok(())
        }
        Command::Init { force } => init(&config_path, force),
    }
}

fn bench(config: &HallConfig, iterations: u32) -> Result<()> {
    let profile = config.profile()?;
    info!(
        "Running {} iterations (curve {}, deadzone {}, max pressure {})",
        iterations,
        profile.curve.name(),
        profile.deadzone,
        profile.max_pressure
    );
    let report = stress::run(&profile, iterations);
    println!("{}", report);
    Ok(())
}

fn list_keys() {
    for (code, name) in named_keys() {
        println!("0x{:02X}  {:>3}  {}", code, code, name);
    }
}

fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    HallConfig::default().save(path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

#[cfg(feature = "hid")]
mod run {
    use super::RunArgs;
    use anyhow::{anyhow, Result};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tracing::{debug, info, warn};

    use hallpad::config::HallConfig;
    use hallpad::device::{
        detect_analog_interface, DeviceSelector, HidDeviceHandle, DEFAULT_PID, DEFAULT_VID,
    };
    use hallpad::gamepad::VirtualGamepad;
    use hallpad::profile::Shared;
    use hallpad::session::{Session, SessionEvent};

    /// Pick the interface from the command line, a scan, the config, or the default ids
    fn resolve_selector(config: &HallConfig, args: &RunArgs) -> Result<DeviceSelector> {
        if let Some(path) = &args.path {
            return Ok(DeviceSelector::Path(path.clone()));
        }
        if let (Some(vid), Some(pid)) = (args.vid, args.pid) {
            return Ok(DeviceSelector::Interface {
                vid,
                pid,
                interface: args.interface,
            });
        }
        if args.scan {
            info!("Scanning HID interfaces, hold any analog key...");
            return detect_analog_interface()?
                .ok_or_else(|| anyhow!("No interface is sending analog reports"));
        }
        Ok(config
            .device_selector()
            .unwrap_or(DeviceSelector::Interface {
                vid: DEFAULT_VID,
                pid: DEFAULT_PID,
                interface: args.interface,
            }))
    }

    pub async fn run(config: HallConfig, args: RunArgs) -> Result<()> {
        let selector = resolve_selector(&config, &args)?;

        let profile = Shared::new(config.profile()?);
        let mapping = Shared::new(config.mapping_table()?);
        if mapping.load().is_empty() {
            warn!("No key mappings configured; the gamepad will stay idle");
        } else {
            info!("Loaded {} key mappings", mapping.load().len());
        }

        // Create virtual gamepad
        let mut gamepad = VirtualGamepad::new(&config.device_name)?;
        info!("Created virtual gamepad: {}", config.device_name);
        if let Some(path) = gamepad.device_path() {
            info!("Device path: {}", path.display());
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut session =
            Session::new(gamepad, profile, mapping, config.session.clone()).with_events(tx);
        session.connect(|| HidDeviceHandle::open(&selector))?;

        info!("Entering main loop. Press Ctrl+C to exit.");
        let mut status = tokio::time::interval(Duration::from_secs(5));
        let mut lost = None;

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, releasing gamepad");
                    break;
                }
                event = rx.recv() => match event {
                    Some(SessionEvent::ConnectionLost { reason }) => {
                        lost = Some(reason);
                        break;
                    }
                    Some(event) => debug!("Session event: {:?}", event),
                    None => break,
                },
                _ = status.tick() => {
                    let stats = session.stats();
                    debug!(
                        "packets={} analog={} boot={} unrecognized={} read_errors={} frames={} active={}",
                        stats.packets,
                        stats.analog_samples,
                        stats.boot_reports,
                        stats.unrecognized,
                        stats.read_errors,
                        stats.frames_published,
                        session.active_key_count()
                    );
                }
            }
        }

        session.disconnect();
        outcome(lost)
    }

    /// Exit status of a run: losing the keyboard is an error, Ctrl+C is not
    fn outcome(lost: Option<String>) -> Result<()> {
        match lost {
            Some(reason) => Err(anyhow!("Keyboard connection lost: {}", reason)),
            None => Ok(()),
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_connection_loss_is_an_error() {
            assert!(outcome(None).is_ok());
            let err = outcome(Some("Device disconnected".into())).unwrap_err();
            assert_eq!(
                err.to_string(),
                "Keyboard connection lost: Device disconnected"
            );
        }
    }
}

#[cfg(not(feature = "hid"))]
mod run {
    use super::RunArgs;
    use anyhow::{bail, Result};
    use hallpad::config::HallConfig;

    pub async fn run(_config: HallConfig, _args: RunArgs) -> Result<()> {
        bail!("hallpad was built without the `hid` feature")
    }
}
