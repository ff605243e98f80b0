//! MMA8451Q device controller
//!
//! Owns the register transport and the configuration snapshot, and drives the
//! device through its lifecycle:
//!
//! ```text
//! Uninitialized --open--> Identified --reset--> Standby <--arm/disarm--> Armed
//!                                                  \                      /
//!                                                   `------close--------'--> Closed
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::Sender;
use tracing::{debug, info, warn};

use crate::bridge::{BridgeCounters, BridgeStats, BridgeWorker, RawBlock};
use crate::config::{ConfigOption, Configuration, FifoMode, Setting};
use crate::error::{Mma8451Error, Result};
use crate::gpio::{Edge, EdgeSource, EdgeSubscription, Pull};
use crate::registers::{
    self, CTRL_REG1, CTRL_REG2, CTRL_REG3, CTRL_REG4, CTRL_REG5, F_SETUP, F_STATUS, WHO_AM_I,
};
use crate::signal::InterruptSignal;
use crate::transport::{RegisterBus, Transport};

/// Controller lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Uninitialized,
    /// WHO_AM_I verified, register contents unknown
    Identified,
    /// Reset and in standby; configuration allowed
    Standby,
    /// Sampling with the bridge worker running
    Armed,
    Closed,
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeviceState::Uninitialized => "uninitialized",
            DeviceState::Identified => "identified",
            DeviceState::Standby => "in standby",
            DeviceState::Armed => "armed",
            DeviceState::Closed => "closed",
        })
    }
}

/// Sensor interrupt output carrying the FIFO interrupt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntPin {
    Int1,
    #[default]
    Int2,
}

/// Wiring of the FIFO interrupt to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterruptRoute {
    /// Host GPIO input the sensor pin is wired to
    pub gpio_pin: u8,
    pub edge: Edge,
    pub pull: Pull,
    pub int_pin: IntPin,
}

impl Default for InterruptRoute {
    fn default() -> Self {
        Self {
            gpio_pin: 17,
            edge: Edge::Falling,
            pull: Pull::Up,
            int_pin: IntPin::Int2,
        }
    }
}

/// Timing knobs for the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Bridge worker wait granularity; bounds how long a stop request goes unseen
    pub wait_timeout: Duration,
    /// Delay after a software reset before the next register access
    pub reset_settle: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_secs(1),
            reset_settle: Duration::from_millis(10),
        }
    }
}

struct Session {
    stop: Arc<AtomicBool>,
    worker: JoinHandle<Result<()>>,
    subscription: EdgeSubscription,
    route: InterruptRoute,
}

/// MMA8451Q controller
///
/// The interrupt signal and the raw block queue are created by the caller and
/// handed in, so the consumer side can be wired up independently.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use mma8451_acquisition::config::{FullScale, Setting};
/// use mma8451_acquisition::device::{InterruptRoute, Mma8451};
/// use mma8451_acquisition::signal::InterruptSignal;
/// use mma8451_acquisition::sim::SimulatedMma8451;
///
/// let sim = SimulatedMma8451::new();
/// let (tx, rx) = crossbeam_channel::bounded(64);
/// let mut device = Mma8451::new(sim.bus(), sim.edges(), Arc::new(InterruptSignal::new()), tx);
///
/// device.open()?;
/// device.reset()?;
/// device.configure(&[Setting::FullScale(FullScale::G4)])?;
/// device.arm(16, InterruptRoute::default())?;
/// let block = rx.recv().unwrap();
/// device.close()?;
/// # Ok::<(), mma8451_acquisition::Mma8451Error>(())
/// ```
pub struct Mma8451<B: RegisterBus + 'static, G: EdgeSource> {
    transport: Arc<Transport<B>>,
    edges: G,
    signal: Arc<InterruptSignal>,
    queue: Option<Sender<RawBlock>>,
    config: Configuration,
    state: DeviceState,
    settings: ControllerSettings,
    session: Option<Session>,
    stats: Arc<BridgeStats>,
}

impl<B: RegisterBus + 'static, G: EdgeSource> Mma8451<B, G> {
    pub fn new(bus: B, edges: G, signal: Arc<InterruptSignal>, queue: Sender<RawBlock>) -> Self {
        Self::with_settings(bus, edges, signal, queue, ControllerSettings::default())
    }

    pub fn with_settings(
        bus: B,
        edges: G,
        signal: Arc<InterruptSignal>,
        queue: Sender<RawBlock>,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            transport: Arc::new(Transport::new(bus)),
            edges,
            signal,
            queue: Some(queue),
            config: Configuration::default(),
            state: DeviceState::Uninitialized,
            settings,
            session: None,
            stats: Arc::new(BridgeStats::default()),
        }
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// Option values last written to the device
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn stats(&self) -> BridgeCounters {
        self.stats.snapshot()
    }

    /// Route of the running session, if armed
    pub fn route(&self) -> Option<InterruptRoute> {
        self.session.as_ref().map(|s| s.route)
    }

    fn require(&self, operation: &'static str, allowed: &[DeviceState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Mma8451Error::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn transition(&mut self, state: DeviceState) {
        debug!("state {} -> {}", self.state, state);
        self.state = state;
    }

    /// Acquire the bus and verify the device identity
    pub fn open(&mut self) -> Result<()> {
        self.require("open", &[DeviceState::Uninitialized])?;

        self.transport.open()?;
        let who_am_i = match self.transport.read_register(WHO_AM_I::REG) {
            Ok(value) => value,
            Err(e) => {
                let _ = self.transport.close();
                return Err(e.into());
            }
        };
        if who_am_i != registers::DEVICE_ID {
            let _ = self.transport.close();
            return Err(Mma8451Error::UnrecognizedDevice {
                expected: registers::DEVICE_ID,
                actual: who_am_i,
            });
        }

        info!("MMA8451Q identified (WHO_AM_I 0x{:02X})", who_am_i);
        self.transition(DeviceState::Identified);
        Ok(())
    }

    /// Software reset; all registers return to their defaults
    pub fn reset(&mut self) -> Result<()> {
        self.require("reset", &[DeviceState::Identified, DeviceState::Standby])?;

        self.transport.set_flag(CTRL_REG2::RST)?;
        thread::sleep(self.settings.reset_settle);
        self.config = Configuration::default();

        info!("device reset");
        self.transition(DeviceState::Standby);
        Ok(())
    }

    /// Apply option values, in order
    ///
    /// Every value is validated before the first register access. The device
    /// is put in standby, then each option's whole field is cleared and the
    /// new value set in one read-modify-write. The snapshot is updated after
    /// each successful write, so on a transport error it reflects exactly the
    /// options that reached the device.
    pub fn configure(&mut self, settings: &[Setting]) -> Result<()> {
        self.require("configure", &[DeviceState::Standby])?;

        let plan = settings
            .iter()
            .map(|setting| {
                let set = Configuration::describe_set(setting)?;
                let clear = Configuration::describe_clear(setting.option());
                Ok((*setting, clear.mask, set))
            })
            .collect::<Result<Vec<_>>>()?;

        self.transport.clear_flag(CTRL_REG1::ACTIVE)?;
        for (setting, clear, set) in plan {
            self.transport.modify(set.register, clear, set.mask)?;
            self.config.update(setting);
            debug!("{} = {}", setting.option(), setting);
        }
        Ok(())
    }

    /// Enable the FIFO watermark interrupt and start sampling
    ///
    /// `watermark` is the FIFO fill level (1..=32 samples) that raises the
    /// interrupt. The configured FIFO mode is used; `Disabled` becomes `Fill`.
    /// Everything is set up in standby and the ACTIVE bit is set last.
    pub fn arm(&mut self, watermark: u8, route: InterruptRoute) -> Result<()> {
        self.require("arm", &[DeviceState::Standby])?;
        if watermark == 0 || watermark as usize > registers::FIFO_DEPTH {
            return Err(Mma8451Error::invalid_value(
                ConfigOption::Watermark.name(),
                watermark,
            ));
        }
        let Some(queue) = self.queue.clone() else {
            return Err(Mma8451Error::QueueClosed);
        };

        let mode = match self.config.fifo_mode() {
            FifoMode::Disabled => FifoMode::Fill,
            other => other,
        };

        match self.start_session(watermark, mode, route, queue) {
            Ok(session) => {
                self.session = Some(session);
                info!(
                    "armed: {} FIFO, watermark {}, {}, GPIO {} {} edge",
                    mode.label(),
                    watermark,
                    self.config.data_rate().label(),
                    route.gpio_pin,
                    route.edge
                );
                self.transition(DeviceState::Armed);
                Ok(())
            }
            Err(e) => {
                let _ = self.transport.clear_flag(CTRL_REG1::ACTIVE);
                Err(e)
            }
        }
    }

    fn start_session(
        &mut self,
        watermark: u8,
        mode: FifoMode,
        route: InterruptRoute,
        queue: Sender<RawBlock>,
    ) -> Result<Session> {
        let t = &self.transport;
        t.clear_flag(CTRL_REG1::ACTIVE)?;

        // F_SETUP may only change while the FIFO is disabled
        t.clear_flag(F_SETUP::F_MODE)?;
        t.modify(F_SETUP::REG, F_SETUP::F_WMRK.mask(), watermark)?;
        self.config.update(Setting::Watermark(watermark));
        t.modify(F_SETUP::REG, F_SETUP::F_MODE.mask(), mode.bits())?;
        self.config.update(Setting::FifoMode(mode));

        t.set_flag(CTRL_REG4::INT_EN_FIFO)?;
        match route.int_pin {
            IntPin::Int1 => t.set_flag(CTRL_REG5::INT_CFG_FIFO)?,
            IntPin::Int2 => t.clear_flag(CTRL_REG5::INT_CFG_FIFO)?,
        }
        match route.edge {
            Edge::Rising => t.set_flag(CTRL_REG3::IPOL)?,
            Edge::Falling | Edge::Both => t.clear_flag(CTRL_REG3::IPOL)?,
        }

        self.signal.reset();
        let signal = Arc::clone(&self.signal);
        let subscription = self.edges.subscribe(
            route.gpio_pin,
            route.edge,
            route.pull,
            Box::new(move || signal.release()),
        )?;

        // Clear anything latched from a previous session
        t.read_register(F_STATUS::REG)?;

        let stop = Arc::new(AtomicBool::new(false));
        let worker = BridgeWorker::new(
            Arc::clone(t),
            Arc::clone(&self.signal),
            queue,
            Arc::clone(&stop),
            Arc::clone(&self.stats),
            self.config.scale(),
            self.config.data_rate().period(),
            self.settings.wait_timeout,
        )
        .spawn();

        if let Err(e) = t.set_flag(CTRL_REG1::ACTIVE) {
            stop.store(true, Ordering::Release);
            self.signal.release();
            let _ = worker.join();
            return Err(e.into());
        }

        Ok(Session {
            stop,
            worker,
            subscription,
            route,
        })
    }

    /// Stop sampling and join the bridge worker
    ///
    /// Samples left in the FIFO are drained once more before the worker
    /// exits. Returns the worker's error if it died during the session.
    pub fn disarm(&mut self) -> Result<()> {
        self.require("disarm", &[DeviceState::Armed])?;
        let Some(session) = self.session.take() else {
            self.transition(DeviceState::Standby);
            return Ok(());
        };

        let standby = self.transport.clear_flag(CTRL_REG1::ACTIVE);
        let worker = Self::stop_session(&self.signal, session);

        info!("disarmed");
        self.transition(DeviceState::Standby);
        standby?;
        worker
    }

    fn stop_session(signal: &InterruptSignal, session: Session) -> Result<()> {
        let Session {
            stop,
            worker,
            mut subscription,
            ..
        } = session;

        stop.store(true, Ordering::Release);
        signal.release();
        let result = worker.join().unwrap_or(Err(Mma8451Error::WorkerPanicked));
        subscription.revoke();
        result
    }

    /// Surface the error of a bridge worker that exited on its own
    ///
    /// A dead worker is joined and the controller returns to standby; the
    /// error is reported once.
    pub fn check_session(&mut self) -> Result<()> {
        let finished = self
            .session
            .as_ref()
            .map_or(false, |s| s.worker.is_finished());
        if !finished {
            return Ok(());
        }
        let Some(session) = self.session.take() else {
            return Ok(());
        };

        warn!("bridge worker exited, leaving armed state");
        let _ = self.transport.clear_flag(CTRL_REG1::ACTIVE);
        let result = Self::stop_session(&self.signal, session);
        self.transition(DeviceState::Standby);
        result
    }

    /// Disarm if needed and release the bus. Idempotent.
    ///
    /// Drops the controller's end of the raw block queue, so the decoder sees
    /// end of stream once it has consumed everything already queued.
    pub fn close(&mut self) -> Result<()> {
        if self.state == DeviceState::Closed {
            return Ok(());
        }

        let disarmed = if self.state == DeviceState::Armed {
            self.disarm()
        } else {
            Ok(())
        };
        let released = self.transport.close();

        self.queue = None;
        info!("closed");
        self.transition(DeviceState::Closed);
        disarmed?;
        released?;
        Ok(())
    }
}

impl<B: RegisterBus + 'static, G: EdgeSource> Drop for Mma8451<B, G> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BitDepth, DataRate, FullScale, PowerMode};
    use crate::error::TransportError;
    use crate::gpio::EdgeCallback;
    use crate::sim::SimulatedMma8451;
    use crate::transport::mock::{MockBus, Op};
    use crossbeam_channel::{bounded, Receiver};
    use std::time::Instant;

    /// Edge source that never fires
    struct NoEdges;

    impl EdgeSource for NoEdges {
        fn subscribe(
            &mut self,
            pin: u8,
            _edge: Edge,
            _pull: Pull,
            _callback: EdgeCallback,
        ) -> std::result::Result<EdgeSubscription, TransportError> {
            Ok(EdgeSubscription::new(pin, || {}))
        }
    }

    fn fast() -> ControllerSettings {
        ControllerSettings {
            wait_timeout: Duration::from_millis(10),
            reset_settle: Duration::ZERO,
        }
    }

    fn mock_device() -> (MockBus, Mma8451<MockBus, NoEdges>, Receiver<RawBlock>) {
        let bus = MockBus::new().with_register(0x0D, registers::DEVICE_ID);
        let (tx, rx) = bounded(16);
        let device = Mma8451::with_settings(
            bus.clone(),
            NoEdges,
            Arc::new(InterruptSignal::new()),
            tx,
            fast(),
        );
        (bus, device, rx)
    }

    fn sim_device(
        sim: &SimulatedMma8451,
    ) -> (Mma8451<crate::sim::SimBus, crate::sim::SimEdges>, Receiver<RawBlock>) {
        let (tx, rx) = bounded(64);
        let device = Mma8451::with_settings(
            sim.bus(),
            sim.edges(),
            Arc::new(InterruptSignal::new()),
            tx,
            fast(),
        );
        (device, rx)
    }

    #[test]
    fn test_open_checks_identity() {
        let bus = MockBus::new().with_register(0x0D, 0x2A);
        let (tx, _rx) = bounded(1);
        let mut device = Mma8451::new(bus, NoEdges, Arc::new(InterruptSignal::new()), tx);

        let err = device.open().unwrap_err();
        assert!(matches!(
            err,
            Mma8451Error::UnrecognizedDevice {
                expected: 0x1A,
                actual: 0x2A
            }
        ));
        assert_eq!(device.state(), DeviceState::Uninitialized);
    }

    #[test]
    fn test_open_rejects_foreign_part_on_sim() {
        let sim = SimulatedMma8451::new();
        sim.set_who_am_i(0x4A);
        let (mut device, _rx) = sim_device(&sim);

        let err = device.open().unwrap_err();
        assert!(matches!(
            err,
            Mma8451Error::UnrecognizedDevice {
                expected: 0x1A,
                actual: 0x4A
            }
        ));
        assert_eq!(device.state(), DeviceState::Uninitialized);
        assert!(matches!(
            device.reset(),
            Err(Mma8451Error::InvalidState { .. })
        ));

        // Bus was released; a retry with the right part succeeds
        sim.set_who_am_i(registers::DEVICE_ID);
        device.open().unwrap();
        assert_eq!(device.state(), DeviceState::Identified);
    }

    #[test]
    fn test_lifecycle_transitions() {
        let (_bus, mut device, _rx) = mock_device();
        assert_eq!(device.state(), DeviceState::Uninitialized);
        device.open().unwrap();
        assert_eq!(device.state(), DeviceState::Identified);
        device.reset().unwrap();
        assert_eq!(device.state(), DeviceState::Standby);
        device.arm(16, InterruptRoute::default()).unwrap();
        assert_eq!(device.state(), DeviceState::Armed);
        device.disarm().unwrap();
        assert_eq!(device.state(), DeviceState::Standby);
        device.close().unwrap();
        assert_eq!(device.state(), DeviceState::Closed);
        device.close().unwrap();
    }

    #[test]
    fn test_arm_before_open_or_reset_is_rejected() {
        let (_bus, mut device, _rx) = mock_device();
        assert!(matches!(
            device.arm(16, InterruptRoute::default()),
            Err(Mma8451Error::InvalidState {
                operation: "arm",
                state: DeviceState::Uninitialized
            })
        ));

        device.open().unwrap();
        assert!(matches!(
            device.arm(16, InterruptRoute::default()),
            Err(Mma8451Error::InvalidState {
                state: DeviceState::Identified,
                ..
            })
        ));
    }

    #[test]
    fn test_configure_while_armed_is_rejected() {
        let (_bus, mut device, _rx) = mock_device();
        device.open().unwrap();
        device.reset().unwrap();
        device.arm(8, InterruptRoute::default()).unwrap();

        let err = device
            .configure(&[Setting::FullScale(FullScale::G8)])
            .unwrap_err();
        assert!(matches!(
            err,
            Mma8451Error::InvalidState {
                operation: "configure",
                state: DeviceState::Armed
            }
        ));
        assert_eq!(device.config().full_scale(), FullScale::G2);
    }

    #[test]
    fn test_configure_clears_field_before_setting() {
        let (bus, mut device, _rx) = mock_device();
        device.open().unwrap();
        device.reset().unwrap();

        device
            .configure(&[Setting::DataRate(DataRate::Hz1_56)])
            .unwrap();
        assert_eq!(bus.register(0x2A) & 0x38, 0x38);

        device
            .configure(&[Setting::DataRate(DataRate::Hz100), Setting::LowNoise(true)])
            .unwrap();
        assert_eq!(bus.register(0x2A), 0x18 | 0x04);
        assert_eq!(device.config().data_rate(), DataRate::Hz100);
        assert!(device.config().low_noise());
    }

    #[test]
    fn test_configure_validates_before_io() {
        let (bus, mut device, _rx) = mock_device();
        device.open().unwrap();
        device.reset().unwrap();
        let before = bus.ops().len();

        let err = device
            .configure(&[
                Setting::FullScale(FullScale::G4),
                Setting::Watermark(40),
            ])
            .unwrap_err();
        assert!(matches!(err, Mma8451Error::InvalidValue { .. }));
        assert_eq!(bus.ops().len(), before);
        assert_eq!(device.config().full_scale(), FullScale::G2);
    }

    #[test]
    fn test_configure_snapshot_tracks_successful_writes() {
        let (bus, mut device, _rx) = mock_device();
        device.open().unwrap();
        device.reset().unwrap();

        // ACTIVE already clear (read only), first option (read + write), then fail
        bus.fail_after(3);
        let err = device
            .configure(&[
                Setting::FullScale(FullScale::G8),
                Setting::PowerMode(PowerMode::HighResolution),
            ])
            .unwrap_err();
        assert!(matches!(err, Mma8451Error::Transport(_)));
        assert_eq!(device.config().full_scale(), FullScale::G8);
        assert_eq!(device.config().power_mode(), PowerMode::Normal);
    }

    #[test]
    fn test_arm_rejects_bad_watermark() {
        let (_bus, mut device, _rx) = mock_device();
        device.open().unwrap();
        device.reset().unwrap();
        for watermark in [0, 33] {
            assert!(matches!(
                device.arm(watermark, InterruptRoute::default()),
                Err(Mma8451Error::InvalidValue { .. })
            ));
        }
        assert_eq!(device.state(), DeviceState::Standby);
    }

    #[test]
    fn test_arm_register_sequence() {
        let (bus, mut device, _rx) = mock_device();
        device.open().unwrap();
        device.reset().unwrap();
        let route = InterruptRoute {
            int_pin: IntPin::Int1,
            edge: Edge::Rising,
            ..InterruptRoute::default()
        };
        device.arm(20, route).unwrap();

        assert_eq!(bus.register(0x09), 0x80 | 20);
        assert_eq!(bus.register(0x2D) & 0x40, 0x40);
        assert_eq!(bus.register(0x2E) & 0x40, 0x40);
        assert_eq!(bus.register(0x2C) & 0x02, 0x02);
        assert_eq!(device.config().fifo_mode(), FifoMode::Fill);
        assert_eq!(device.config().watermark(), 20);

        // ACTIVE is the final write
        let last_write = bus
            .ops()
            .into_iter()
            .filter(|op| matches!(op, Op::Write(..)))
            .last();
        assert_eq!(last_write, Some(Op::Write(0x2A, 0x01)));
        device.close().unwrap();
    }

    #[test]
    fn test_arm_keeps_configured_fifo_mode() {
        let (bus, mut device, _rx) = mock_device();
        device.open().unwrap();
        device.reset().unwrap();
        device
            .configure(&[Setting::FifoMode(FifoMode::Circular)])
            .unwrap();
        device.arm(16, InterruptRoute::default()).unwrap();
        assert_eq!(bus.register(0x09), 0x40 | 16);
        // INT2 routing, active low
        assert_eq!(bus.register(0x2E) & 0x40, 0);
        assert_eq!(bus.register(0x2C) & 0x02, 0);
    }

    #[test]
    fn test_worker_death_detected() {
        let (bus, mut device, _rx) = mock_device();
        device.open().unwrap();
        device.reset().unwrap();
        device.arm(16, InterruptRoute::default()).unwrap();

        bus.fail_after(0);
        device.signal.release();

        let deadline = Instant::now() + Duration::from_secs(5);
        while device.session.as_ref().map_or(false, |s| !s.worker.is_finished()) {
            assert!(Instant::now() < deadline);
            thread::sleep(Duration::from_millis(1));
        }

        assert!(matches!(
            device.check_session(),
            Err(Mma8451Error::Transport(TransportError::Bus(_)))
        ));
        assert_eq!(device.state(), DeviceState::Standby);
        assert!(device.check_session().is_ok());
    }

    #[test]
    fn test_close_releases_queue_sender() {
        let (_bus, mut device, rx) = mock_device();
        device.open().unwrap();
        device.close().unwrap();
        assert!(matches!(
            rx.recv_timeout(Duration::from_millis(100)),
            Err(crossbeam_channel::RecvTimeoutError::Disconnected)
        ));
    }

    #[test]
    fn test_simulated_acquisition_delivers_blocks() {
        let sim = SimulatedMma8451::new();
        let (mut device, rx) = sim_device(&sim);
        device.open().unwrap();
        device.reset().unwrap();
        device
            .configure(&[
                Setting::BitDepth(BitDepth::Bits14),
                Setting::FullScale(FullScale::G2),
            ])
            .unwrap();
        device.arm(4, InterruptRoute::default()).unwrap();

        for i in 0..10 {
            sim.push_counts([i, -i, 4096]);
        }
        device.disarm().unwrap();
        device.close().unwrap();

        let blocks: Vec<RawBlock> = rx.try_iter().collect();
        let total: usize = blocks.iter().map(|b| b.sample_count()).sum();
        assert_eq!(total, 10);
        assert_eq!(device.stats().samples, 10);
        for (i, block) in blocks.iter().enumerate() {
            assert_eq!(block.sequence, i as u64);
        }
    }

    #[test]
    fn test_reset_restores_default_snapshot() {
        let sim = SimulatedMma8451::new();
        let (mut device, _rx) = sim_device(&sim);
        device.open().unwrap();
        device.reset().unwrap();
        device
            .configure(&[Setting::FullScale(FullScale::G8)])
            .unwrap();
        assert_eq!(sim.register(0x0E), 0x02);

        device.reset().unwrap();
        assert_eq!(device.config().full_scale(), FullScale::G2);
        assert_eq!(sim.register(0x0E), 0x00);
    }
}
