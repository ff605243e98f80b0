//! End-to-end acquisition pipeline
//!
//! Wires a controller, its bridge worker and the decoder worker together:
//!
//! ```text
//! GPIO edge -> InterruptSignal -> bridge worker -> raw block queue -> decoder -> BatchStream
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use crossbeam_channel::bounded;

use crate::batcher::{spawn_decoder, BatchPolicy, BatchStream, DecoderHandle, DecoderOptions, DecoderSummary};
use crate::decoder::Units;
use crate::device::{ControllerSettings, Mma8451};
use crate::error::Result;
use crate::gpio::EdgeSource;
use crate::signal::InterruptSignal;
use crate::transport::RegisterBus;

/// Queue sizes, batching and timing for an [`Acquisition`]
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    /// Raw blocks buffered between the bridge and the decoder
    pub queue_capacity: usize,
    pub policy: BatchPolicy,
    pub units: Units,
    /// Decoder wait between age-bound checks
    pub poll_interval: Duration,
    /// Finished batches buffered for the sink
    pub sink_capacity: usize,
    pub controller: ControllerSettings,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        let decoder = DecoderOptions::default();
        Self {
            queue_capacity: 64,
            policy: decoder.policy,
            units: decoder.units,
            poll_interval: decoder.poll_interval,
            sink_capacity: decoder.sink_capacity,
            controller: ControllerSettings::default(),
        }
    }
}

/// A controller plus its decoder worker
///
/// Shutdown order: [`close`](Self::close) the device, drain the
/// [`BatchStream`] to its end, then [`join`](Self::join) for the totals.
///
/// # Example
/// ```no_run
/// use std::sync::atomic::AtomicBool;
/// use std::sync::Arc;
/// use mma8451_acquisition::device::InterruptRoute;
/// use mma8451_acquisition::pipeline::{Acquisition, PipelineOptions};
/// use mma8451_acquisition::sim::SimulatedMma8451;
///
/// let sim = SimulatedMma8451::new();
/// let motion = sim.spawn_motion(Arc::new(AtomicBool::new(false)));
///
/// let (mut acquisition, batches) =
///     Acquisition::new(sim.bus(), sim.edges(), PipelineOptions::default());
/// let device = acquisition.device_mut();
/// device.open()?;
/// device.reset()?;
/// device.arm(16, InterruptRoute::default())?;
///
/// for batch in batches.take(3) {
///     println!("{} samples", batch.len());
/// }
/// acquisition.close()?;
/// # Ok::<(), mma8451_acquisition::Mma8451Error>(())
/// ```
pub struct Acquisition<B: RegisterBus + 'static, G: EdgeSource> {
    device: Mma8451<B, G>,
    decoder: DecoderHandle,
    started_at: DateTime<Local>,
    epoch: Instant,
}

impl<B: RegisterBus + 'static, G: EdgeSource> Acquisition<B, G> {
    pub fn new(bus: B, edges: G, options: PipelineOptions) -> (Self, BatchStream) {
        let epoch = Instant::now();
        let (tx, rx) = bounded(options.queue_capacity.max(1));
        let device = Mma8451::with_settings(
            bus,
            edges,
            Arc::new(InterruptSignal::new()),
            tx,
            options.controller,
        );
        let (decoder, stream) = spawn_decoder(
            rx,
            DecoderOptions {
                policy: options.policy,
                units: options.units,
                poll_interval: options.poll_interval,
                sink_capacity: options.sink_capacity,
            },
            epoch,
        );

        let acquisition = Self {
            device,
            decoder,
            started_at: Local::now(),
            epoch,
        };
        (acquisition, stream)
    }

    pub fn device(&self) -> &Mma8451<B, G> {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut Mma8451<B, G> {
        &mut self.device
    }

    /// Wall-clock time sample timestamps are relative to
    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.epoch.elapsed()
    }

    /// Disarm and release the device; the batch stream ends after the
    /// remaining blocks are decoded
    pub fn close(&mut self) -> Result<()> {
        self.device.close()
    }

    /// Close the device and wait for the decoder
    ///
    /// The [`BatchStream`] must be drained or dropped, otherwise the decoder
    /// can block on a full sink.
    pub fn join(mut self) -> Result<DecoderSummary> {
        let closed = self.device.close();
        let Self { device, decoder, .. } = self;
        drop(device);
        let summary = decoder.join()?;
        closed?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batcher::Batch;
    use crate::config::{BitDepth, FullScale, Setting};
    use crate::device::{DeviceState, InterruptRoute};
    use crate::sim::SimulatedMma8451;
    use std::thread;

    fn options(target: usize) -> PipelineOptions {
        PipelineOptions {
            queue_capacity: 4,
            policy: BatchPolicy::new(target, None),
            units: Units::G,
            poll_interval: Duration::from_millis(5),
            sink_capacity: 256,
            controller: ControllerSettings {
                wait_timeout: Duration::from_millis(10),
                reset_settle: Duration::ZERO,
            },
        }
    }

    #[test]
    fn test_no_block_lost_across_disarm_and_close() {
        let sim = SimulatedMma8451::new();
        let (mut acquisition, stream) = Acquisition::new(sim.bus(), sim.edges(), options(10));

        let device = acquisition.device_mut();
        device.open().unwrap();
        device.reset().unwrap();
        device
            .configure(&[Setting::FullScale(FullScale::G2), Setting::BitDepth(BitDepth::Bits14)])
            .unwrap();
        device.arm(8, InterruptRoute::default()).unwrap();

        let mut pushed = 0;
        for i in 0..500 {
            if sim.push_sample([0.0, 0.0, 1.0]) {
                pushed += 1;
            }
            if i % 16 == 0 {
                thread::sleep(Duration::from_millis(1));
            }
        }

        acquisition.device_mut().disarm().unwrap();
        let bridged = acquisition.device().stats().samples;
        acquisition.close().unwrap();
        assert_eq!(acquisition.device().state(), DeviceState::Closed);

        let batches: Vec<Batch> = stream.collect();
        let decoded: usize = batches.iter().map(|b| b.len()).sum();
        let summary = acquisition.join().unwrap();

        assert_eq!(summary.samples, bridged);
        assert_eq!(decoded as u64, bridged);
        // Fill mode may drop samples during overflow; everything accepted arrives
        assert_eq!(bridged, pushed);
        assert!(batches.iter().all(|b| b.samples.iter().all(|s| (s.z - 1.0).abs() < 1e-3)));
    }

    #[test]
    fn test_batches_are_chronological() {
        let sim = SimulatedMma8451::new();
        let (mut acquisition, stream) = Acquisition::new(sim.bus(), sim.edges(), options(5));

        let device = acquisition.device_mut();
        device.open().unwrap();
        device.reset().unwrap();
        device.arm(4, InterruptRoute::default()).unwrap();

        for i in 0..20 {
            sim.push_counts([i, 0, 0]);
        }
        acquisition.close().unwrap();

        let xs: Vec<f32> = stream.flat_map(|b| b.samples).map(|s| s.x).collect();
        let expected: Vec<f32> = (0..20).map(|i| i as f32 / 4096.0).collect();
        assert_eq!(xs, expected);
        acquisition.join().unwrap();
    }

    #[test]
    fn test_disarm_returns_while_stream_unread() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let sim = SimulatedMma8451::new();
        let stop_motion = Arc::new(AtomicBool::new(false));
        let motion = sim.spawn_motion(Arc::clone(&stop_motion));

        let options = PipelineOptions {
            queue_capacity: 4,
            policy: BatchPolicy::new(10, None),
            sink_capacity: 2,
            controller: ControllerSettings {
                wait_timeout: Duration::from_millis(50),
                reset_settle: Duration::ZERO,
            },
            ..PipelineOptions::default()
        };
        let (mut acquisition, stream) = Acquisition::new(sim.bus(), sim.edges(), options);
        let device = acquisition.device_mut();
        device.open().unwrap();
        device.reset().unwrap();
        device.arm(16, InterruptRoute::default()).unwrap();

        // Enough time at 800 Hz to fill the sink and the raw block queue
        thread::sleep(Duration::from_millis(500));
        assert!(acquisition.device().stats().blocks > 6);

        let (done_tx, done_rx) = bounded(1);
        thread::spawn(move || {
            let disarmed = acquisition.device_mut().disarm();
            let _ = done_tx.send((disarmed.is_ok(), acquisition));
        });
        let (disarmed, mut acquisition) = done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("disarm blocked behind the unread batch stream");
        assert!(disarmed);
        assert_eq!(acquisition.device().state(), DeviceState::Standby);

        stop_motion.store(true, Ordering::Relaxed);
        motion.join().unwrap();

        let bridged = acquisition.device().stats().samples;
        acquisition.close().unwrap();
        let decoded: usize = stream.map(|b| b.len()).sum();
        assert_eq!(decoded as u64, bridged);
        acquisition.join().unwrap();
    }

    #[test]
    fn test_stream_ends_without_arming() {
        let sim = SimulatedMma8451::new();
        let (acquisition, stream) = Acquisition::new(sim.bus(), sim.edges(), options(5));
        let summary = acquisition.join().unwrap();
        assert_eq!(summary, DecoderSummary::default());
        assert_eq!(stream.count(), 0);
    }
}
