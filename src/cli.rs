//! Command-line plumbing shared by the binaries

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Args;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::{BitDepth, ConfigOption, DataRate, FifoMode, FullScale, PowerMode, Setting};
use crate::device::{IntPin, InterruptRoute};
use crate::error::Result;
use crate::gpio::{Edge, EdgeSource, Pull};
use crate::registers;
use crate::sim::SimulatedMma8451;
use crate::transport::RegisterBus;

macro_rules! setting_parser {
    ($name:ident, $option:ident, $ty:ty) => {
        fn $name(text: &str) -> std::result::Result<$ty, String> {
            match Setting::parse(ConfigOption::$option, text) {
                Ok(Setting::$option(value)) => Ok(value),
                Ok(other) => Err(format!("unexpected value {}", other)),
                Err(e) => Err(e.to_string()),
            }
        }
    };
}

setting_parser!(parse_bits, BitDepth, BitDepth);
setting_parser!(parse_range, FullScale, FullScale);
setting_parser!(parse_rate, DataRate, DataRate);
setting_parser!(parse_power_mode, PowerMode, PowerMode);
setting_parser!(parse_fifo_mode, FifoMode, FifoMode);

fn parse_watermark(text: &str) -> std::result::Result<u8, String> {
    match text.trim().parse::<u8>() {
        Ok(n) if n >= 1 && n as usize <= registers::FIFO_DEPTH => Ok(n),
        _ => Err(format!("watermark must be 1-{}", registers::FIFO_DEPTH)),
    }
}

fn parse_address(text: &str) -> std::result::Result<u8, String> {
    let text = text.trim();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => text.parse::<u8>(),
    };
    match parsed {
        Ok(addr) if addr < 0x80 => Ok(addr),
        _ => Err(format!("invalid 7-bit I2C address: {}", text)),
    }
}

/// Device and logging options common to every binary
#[derive(Args, Debug, Clone)]
pub struct DeviceArgs {
    /// Run against the simulated sensor instead of hardware
    #[arg(long)]
    pub simulate: bool,

    /// I2C bus number (/dev/i2c-N)
    #[arg(long, default_value_t = 1)]
    pub i2c_bus: u8,

    /// 7-bit I2C address of the sensor
    #[arg(long, default_value = "0x1D", value_parser = parse_address)]
    pub address: u8,

    /// Host GPIO the sensor interrupt pin is wired to
    #[arg(long, default_value_t = 17)]
    pub gpio_pin: u8,

    /// Sensor interrupt output for the FIFO interrupt (1 or 2)
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(1..=2))]
    pub int_pin: u8,

    /// Full-scale range: 2g, 4g or 8g
    #[arg(short, long, default_value = "2g", value_parser = parse_range)]
    pub range: FullScale,

    /// Output data rate in Hz: 800, 400, 200, 100, 50, 12.5, 6.25, 1.56
    #[arg(long, default_value = "800", value_parser = parse_rate)]
    pub rate: DataRate,

    /// Sample precision: 14 or 8 (fast read)
    #[arg(long, default_value = "14", value_parser = parse_bits)]
    pub bits: BitDepth,

    /// Oversampling mode: normal, lnlp, hr, lp
    #[arg(long, default_value = "normal", value_parser = parse_power_mode)]
    pub power_mode: PowerMode,

    /// Enable the reduced-noise mode (limits range to 4g)
    #[arg(long)]
    pub low_noise: bool,

    /// FIFO mode while armed: fill, circular or trigger
    #[arg(long, default_value = "fill", value_parser = parse_fifo_mode)]
    pub fifo_mode: FifoMode,

    /// FIFO watermark in samples (1-32)
    #[arg(short, long, default_value = "16", value_parser = parse_watermark)]
    pub watermark: u8,

    /// Log level: trace, debug, info, warn, error
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl DeviceArgs {
    /// Option values to pass to `configure`
    pub fn settings(&self) -> Vec<Setting> {
        vec![
            Setting::BitDepth(self.bits),
            Setting::FullScale(self.range),
            Setting::DataRate(self.rate),
            Setting::PowerMode(self.power_mode),
            Setting::LowNoise(self.low_noise),
            Setting::FifoMode(self.fifo_mode),
        ]
    }

    pub fn route(&self) -> InterruptRoute {
        InterruptRoute {
            gpio_pin: self.gpio_pin,
            edge: Edge::Falling,
            pull: Pull::Up,
            int_pin: if self.int_pin == 1 {
                IntPin::Int1
            } else {
                IntPin::Int2
            },
        }
    }

    pub fn log_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

/// Install the global fmt subscriber
pub fn init_logging(level: Level) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Work to run once a backend has been chosen
pub trait BackendRun {
    type Output;

    fn run<B, G>(self, bus: B, edges: G) -> Self::Output
    where
        B: RegisterBus + 'static,
        G: EdgeSource;
}

/// Build the backend `args` selects and hand it to `runner`
///
/// `--simulate` runs the simulated sensor with a motion generator; otherwise
/// the `rppal` I2C and GPIO backends are used, which needs the `rpi` feature.
pub fn dispatch<R: BackendRun>(args: &DeviceArgs, runner: R) -> Result<R::Output> {
    if args.simulate {
        info!("using simulated MMA8451Q");
        let sim = SimulatedMma8451::new();
        let stop = Arc::new(AtomicBool::new(false));
        let motion = sim.spawn_motion(Arc::clone(&stop));

        let output = runner.run(sim.bus(), sim.edges());

        stop.store(true, Ordering::Relaxed);
        let _ = motion.join();
        return Ok(output);
    }
    hardware(args, runner)
}

#[cfg(feature = "rpi")]
fn hardware<R: BackendRun>(args: &DeviceArgs, runner: R) -> Result<R::Output> {
    use crate::rpi::{RppalGpio, RppalI2c};

    info!(
        "using /dev/i2c-{} address 0x{:02X}, GPIO {}",
        args.i2c_bus, args.address, args.gpio_pin
    );
    let bus = RppalI2c::new(args.i2c_bus, args.address);
    let edges = RppalGpio::new()?;
    Ok(runner.run(bus, edges))
}

#[cfg(not(feature = "rpi"))]
fn hardware<R: BackendRun>(_args: &DeviceArgs, _runner: R) -> Result<R::Output> {
    Err(crate::error::TransportError::Bus(
        "built without the `rpi` feature; rebuild with --features rpi or pass --simulate".into(),
    )
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        device: DeviceArgs,
    }

    #[test]
    fn test_defaults() {
        let cli = TestCli::parse_from(["test"]);
        let args = cli.device;
        assert_eq!(args.address, registers::DEVICE_ADDRESS);
        assert_eq!(args.rate, DataRate::Hz800);
        assert_eq!(args.fifo_mode, FifoMode::Fill);
        assert_eq!(args.watermark, 16);
        assert_eq!(args.route(), InterruptRoute::default());
        assert_eq!(args.log_level(), Level::INFO);
    }

    #[test]
    fn test_parses_device_options() {
        let cli = TestCli::parse_from([
            "test", "--address", "0x1c", "--range", "8g", "--rate", "12.5", "--bits", "8",
            "--int-pin", "1", "--watermark", "32", "--power-mode", "hr",
        ]);
        let args = cli.device;
        assert_eq!(args.address, registers::ALT_DEVICE_ADDRESS);
        assert_eq!(args.range, FullScale::G8);
        assert_eq!(args.rate, DataRate::Hz12_5);
        assert_eq!(args.bits, BitDepth::Bits8);
        assert_eq!(args.route().int_pin, IntPin::Int1);
        assert!(args.settings().contains(&Setting::PowerMode(PowerMode::HighResolution)));
    }

    #[test]
    fn test_rejects_bad_values() {
        for bad in [
            vec!["test", "--range", "16g"],
            vec!["test", "--watermark", "0"],
            vec!["test", "--watermark", "33"],
            vec!["test", "--address", "0x80"],
            vec!["test", "--int-pin", "3"],
        ] {
            assert!(TestCli::try_parse_from(bad).is_err());
        }
    }

    struct CountBlocks;

    impl BackendRun for CountBlocks {
        type Output = bool;

        fn run<B, G>(self, bus: B, edges: G) -> bool
        where
            B: RegisterBus + 'static,
            G: EdgeSource,
        {
            use crate::device::Mma8451;
            use crate::signal::InterruptSignal;
            use std::time::Duration;

            let (tx, rx) = crossbeam_channel::bounded(16);
            let mut device = Mma8451::new(bus, edges, Arc::new(InterruptSignal::new()), tx);
            device.open().unwrap();
            device.reset().unwrap();
            device.arm(8, InterruptRoute::default()).unwrap();
            let got = rx.recv_timeout(Duration::from_secs(5)).is_ok();
            // Nobody drains the queue from here on
            drop(rx);
            let _ = device.close();
            got
        }
    }

    #[test]
    fn test_dispatch_simulated() {
        let cli = TestCli::parse_from(["test", "--simulate"]);
        assert!(dispatch(&cli.device, CountBlocks).unwrap());
    }
}
