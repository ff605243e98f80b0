//! FIFO Watermark Sweep - raw blocks at different watermark levels
//!
//! Arms the simulated MMA8451Q at several watermarks and prints the size of
//! each drained block together with the bridge counters. Works without
//! hardware.
//!
//! Usage:
//!   cargo run --example fifo_watermark

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mma8451_acquisition::cli::init_logging;
use mma8451_acquisition::config::{DataRate, Setting};
use mma8451_acquisition::decoder::{Decoder, Units};
use mma8451_acquisition::device::{InterruptRoute, Mma8451};
use mma8451_acquisition::signal::InterruptSignal;
use mma8451_acquisition::SimulatedMma8451;
use tracing::Level;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(Level::WARN)?;

    println!("MMA8451 FIFO Watermark Sweep (simulated)");
    println!("========================================\n");

    let sim = SimulatedMma8451::new();
    let _motion = sim.spawn_motion(Arc::new(AtomicBool::new(false)));

    let (tx, rx) = crossbeam_channel::bounded(64);
    let mut device = Mma8451::new(sim.bus(), sim.edges(), Arc::new(InterruptSignal::new()), tx);
    device.open()?;
    device.reset()?;
    device.configure(&[Setting::DataRate(DataRate::Hz400)])?;

    let decoder = Decoder::new(Units::G, Instant::now());

    for watermark in [4u8, 16, 32] {
        let before = device.stats();
        device.arm(watermark, InterruptRoute::default())?;

        let start = Instant::now();
        let mut blocks = 0;
        while start.elapsed() < Duration::from_millis(500) {
            let Ok(block) = rx.recv_timeout(Duration::from_millis(100)) else {
                continue;
            };
            let samples = decoder.decode(&block);
            if blocks < 3 {
                if let Some(last) = samples.last() {
                    println!(
                        "  block {:3}: {:2} samples, {:3} bytes, last z = {:.3}g{}",
                        block.sequence,
                        samples.len(),
                        block.bytes.len(),
                        last.z,
                        if block.overflowed { " (overflow)" } else { "" }
                    );
                }
            }
            blocks += 1;
        }
        device.disarm()?;
        // Blocks drained while disarming
        blocks += rx.try_iter().count();

        let after = device.stats();
        println!(
            "watermark {:2}: {} blocks, {} interrupts, {} samples, {} overflows\n",
            watermark,
            blocks,
            after.interrupts - before.interrupts,
            after.samples - before.samples,
            after.overflows - before.overflows
        );
    }

    device.close()?;
    Ok(())
}
