//! MMA8451 Data Collector
//!
//! Streams FIFO batches from the sensor and appends them to an HDF5 file.
//!
//! Usage:
//!   collector --output data.h5 --rate 800 --watermark 16 --duration 60
//!   collector --simulate --output sim.h5 --duration 5

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use mma8451_acquisition::batcher::BatchPolicy;
use mma8451_acquisition::cli::{dispatch, init_logging, BackendRun, DeviceArgs};
use mma8451_acquisition::gpio::EdgeSource;
use mma8451_acquisition::transport::RegisterBus;
use mma8451_acquisition::{
    Acquisition, Batch, Hdf5Writer, Metadata, Mma8451Error, NextBatch, PipelineOptions,
};
use tracing::{error, info, warn};

const FLUSH_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(name = "collector")]
#[command(about = "Collect MMA8451 FIFO data to an HDF5 file", long_about = None)]
struct Args {
    #[command(flatten)]
    device: DeviceArgs,

    /// Output HDF5 file path
    #[arg(short, long, default_value = "accel_data.h5")]
    output: PathBuf,

    /// Duration in seconds (optional, runs until Ctrl+C if omitted)
    #[arg(short, long)]
    duration: Option<u64>,

    /// Seconds of samples per written batch
    #[arg(short, long, default_value_t = 1.0)]
    interval: f64,
}

struct Collect {
    args: Args,
    running: Arc<AtomicBool>,
}

/// Totals printed when collection ends
struct Report {
    samples: usize,
    overflows: u64,
    elapsed: Duration,
}

impl Collect {
    fn write(writer: &mut Hdf5Writer, batch: &Batch, last_flush: &mut Instant) -> Result<(), Mma8451Error> {
        if batch.overflows > 0 {
            warn!(
                sequence = batch.sequence,
                overflows = batch.overflows,
                "FIFO overflowed, samples were lost"
            );
        }
        writer.append_batch(batch)?;

        // Periodic flush
        if last_flush.elapsed() >= FLUSH_INTERVAL {
            writer.flush()?;
            *last_flush = Instant::now();
        }
        Ok(())
    }
}

impl BackendRun for Collect {
    type Output = Result<Report, Mma8451Error>;

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
        let started_at = acquisition.started_at();
        let device = acquisition.device_mut();
        device.open()?;
        device.reset()?;
        device.configure(&device_args.settings())?;

        let metadata = Metadata::new(device.config(), options.units, started_at);
        info!(path = %self.args.output.display(), "creating HDF5 file");
        let mut writer = Hdf5Writer::create(&self.args.output, &metadata)?;

        acquisition
            .device_mut()
            .arm(device_args.watermark, device_args.route())?;
        info!("collecting, press Ctrl+C to stop");

        let collection_start = Instant::now();
        let end_time = self.args.duration.map(|d| collection_start + Duration::from_secs(d));
        let mut last_flush = Instant::now();
        let mut overflows = 0u64;

        let outcome = loop {
            if !self.running.load(Ordering::SeqCst) {
                break Ok(());
            }
            if end_time.map_or(false, |end| Instant::now() >= end) {
                break Ok(());
            }
            match batches.next_batch_timeout(Duration::from_millis(200)) {
                NextBatch::Batch(batch) => {
                    overflows += batch.overflows as u64;
                    if let Err(e) = Self::write(&mut writer, &batch, &mut last_flush) {
                        break Err(e);
                    }
                }
                NextBatch::Timeout => {}
                NextBatch::EndOfStream => break Ok(()),
            }
            if let Err(e) = acquisition.device_mut().check_session() {
                break Err(e);
            }
        };

        // Write whatever the decoder still holds
        let closed = acquisition.close();
        let mut written = outcome;
        for batch in batches {
            overflows += batch.overflows as u64;
            if written.is_ok() {
                written = Self::write(&mut writer, &batch, &mut last_flush);
            }
        }
        let summary = acquisition.join()?;
        info!(
            blocks = summary.blocks,
            batches = summary.batches,
            "decoder finished"
        );

        if let Err(e) = writer.flush() {
            error!("failed to flush: {}", e);
        }
        written?;
        closed?;

        Ok(Report {
            samples: writer.sample_count(),
            overflows,
            elapsed: collection_start.elapsed(),
        })
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.device.log_level())?;

    println!("MMA8451 Data Collector");
    println!("======================");
    println!(
        "Range: {} | Rate: {} Hz | Watermark: {}",
        args.device.range.label(),
        args.device.rate.label(),
        args.device.watermark
    );
    println!("Output file: {}", args.output.display());
    if let Some(duration) = args.duration {
        println!("Duration: {} seconds", duration);
    } else {
        println!("Duration: continuous (Ctrl+C to stop)");
    }
    println!();

    // Setup Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        println!("\nReceived Ctrl+C, stopping collection...");
        r.store(false, Ordering::SeqCst);
    })?;

    let device_args = args.device.clone();
    let output = args.output.clone();
    let report = dispatch(&device_args, Collect { args, running })??;

    let secs = report.elapsed.as_secs_f64();
    println!("\nCollection complete!");
    println!("Total samples: {}", report.samples);
    println!("FIFO overflows: {}", report.overflows);
    println!("Elapsed time: {:.2} seconds", secs);
    if secs > 0.0 {
        println!("Actual sample rate: {:.1} Hz", report.samples as f64 / secs);
    }
    println!("File: {}", output.display());

    Ok(())
}
