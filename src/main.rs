//! MMA8451 reader - interrupt-driven FIFO acquisition with a live console view
//!
//! Arms the FIFO watermark interrupt, streams decoded batches and redraws the
//! most recent sample after every batch.
//!
//! Usage:
//!   mma8451-reader --simulate
//!   mma8451-reader --range 4g --rate 400 --watermark 20 --gpio-pin 17

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use mma8451_acquisition::batcher::BatchPolicy;
use mma8451_acquisition::cli::{dispatch, init_logging, BackendRun, DeviceArgs};
use mma8451_acquisition::gpio::EdgeSource;
use mma8451_acquisition::transport::RegisterBus;
use mma8451_acquisition::{
    create_bar, Acquisition, Mma8451Error, NextBatch, PipelineOptions, RateMeter, Sample,
};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "mma8451-reader")]
#[command(about = "Stream MMA8451 FIFO data to the console", long_about = None)]
struct Args {
    #[command(flatten)]
    device: DeviceArgs,

    /// Seconds of samples per batch
    #[arg(short, long, default_value_t = 0.25)]
    interval: f64,
}

struct LiveView {
    args: Args,
    running: Arc<AtomicBool>,
}

impl LiveView {
    fn draw(&self, sample: &Sample, meter: &RateMeter, overflows: u64, interrupts: u64) -> io::Result<()> {
        let full_scale = self.args.device.range.g() as f32;
        let mut out = io::stdout().lock();

        // Move cursor to top without clearing (reduces flicker)
        write!(out, "\x1B[H")?;
        writeln!(out, "MMA8451 Reader - Live Data                                      ")?;
        writeln!(out, "==========================                                      ")?;
        writeln!(
            out,
            "Time: {:.2}s | Samples: {} | Rate: {:.1} Hz | Interrupts: {} | Overflows: {}      ",
            meter.elapsed().as_secs_f64(),
            meter.total(),
            meter.rate(),
            interrupts,
            overflows
        )?;
        writeln!(out)?;
        writeln!(
            out,
            "ACCELEROMETER (g)                    -{0}g ◄─────────┼─────────► +{0}g",
            full_scale
        )?;
        writeln!(out, "  X: {:7.3}g  [{}]", sample.x, create_bar(sample.x, full_scale, 40))?;
        writeln!(out, "  Y: {:7.3}g  [{}]", sample.y, create_bar(sample.y, full_scale, 40))?;
        writeln!(out, "  Z: {:7.3}g  [{}]", sample.z, create_bar(sample.z, full_scale, 40))?;
        writeln!(out, "  |a|: {:6.3}g", sample.magnitude())?;
        writeln!(out)?;
        writeln!(out, "Press Ctrl+C to exit                                           ")?;
        out.flush()
    }
}

impl BackendRun for LiveView {
    type Output = Result<(), Mma8451Error>;

    fn run<B, G>(self, bus: B, edges: G) -> Self::Output
    where
        B: RegisterBus + 'static,
        G: EdgeSource,
    {
        let device_args = &self.args.device;
        let options = PipelineOptions {
            policy: BatchPolicy::from_interval(
                device_args.rate,
                Duration::from_secs_f64(self.args.interval.max(0.01)),
            ),
            ..PipelineOptions::default()
        };

        let (mut acquisition, batches) = Acquisition::new(bus, edges, options);
        let device = acquisition.device_mut();
        device.open()?;
        device.reset()?;
        device.configure(&device_args.settings())?;
        device.arm(device_args.watermark, device_args.route())?;
        info!(config = %device.config(), watermark = device_args.watermark, "streaming");

        // Clear screen once at start
        print!("\x1B[2J\x1B[H");
        let _ = io::stdout().flush();

        let mut meter = RateMeter::new();
        let mut overflows = 0u64;
        let outcome = loop {
            if !self.running.load(Ordering::SeqCst) {
                break Ok(());
            }
            match batches.next_batch_timeout(Duration::from_millis(200)) {
                NextBatch::Batch(batch) => {
                    meter.add(batch.len());
                    overflows += batch.overflows as u64;
                    if let Some(sample) = batch.last() {
                        let interrupts = acquisition.device().stats().interrupts;
                        let _ = self.draw(sample, &meter, overflows, interrupts);
                    }
                }
                NextBatch::Timeout => {}
                NextBatch::EndOfStream => break Ok(()),
            }
            if let Err(e) = acquisition.device_mut().check_session() {
                break Err(e);
            }
        };

        let closed = acquisition.close();
        let remaining: usize = batches.map(|b| b.len()).sum();
        meter.add(remaining);
        let summary = acquisition.join()?;

        println!();
        println!("Stopped after {:.2}s", meter.elapsed().as_secs_f64());
        println!("Samples decoded: {}", summary.samples);
        println!("Blocks: {} | Batches: {}", summary.blocks, summary.batches);
        println!("FIFO overflows: {}", summary.overflows);
        println!("Average rate: {:.1} Hz", meter.rate());

        outcome?;
        closed
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.device.log_level())?;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let device_args = args.device.clone();
    let view = LiveView { args, running };
    match dispatch(&device_args, view) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) | Err(e) => {
            error!("acquisition failed: {}", e);
            match e {
                Mma8451Error::UnrecognizedDevice { .. } | Mma8451Error::Transport(_) => {
                    eprintln!("Please check:");
                    eprintln!("  1. MMA8451 is wired to the I2C bus (SDA/SCL, 3.3V, GND)");
                    eprintln!("  2. The address matches SA0 (0x1D high, 0x1C low)");
                    eprintln!("  3. The interrupt pin is wired to --gpio-pin");
                }
                _ => {}
            }
            Err(Box::new(e))
        }
    }
}
