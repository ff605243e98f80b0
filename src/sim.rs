//! Simulated MMA8451Q
//!
//! A register-file model of the sensor for tests and for running the binaries
//! without hardware. It models what the acquisition path depends on:
//!
//! - WHO_AM_I, software reset and the reset register values
//! - standby-only writes (only ACTIVE, F_SETUP and RST are accepted while active)
//! - the 32-sample FIFO in fill, circular and trigger modes, F_STATUS count,
//!   watermark and overflow flags
//! - burst reads from OUT_X_MSB draining the FIFO, 6 bytes per sample or 3 in
//!   fast-read mode
//! - the FIFO interrupt line: asserted when the watermark is reached or the
//!   FIFO overflows, released by reading F_STATUS, with polarity from
//!   CTRL_REG3.IPOL
//!
//! Samples are always stored at 14-bit resolution; fast-read output is the
//! upper eight bits.
//!
//! ```
//! use mma8451_acquisition::sim::SimulatedMma8451;
//!
//! let sim = SimulatedMma8451::new();
//! assert_eq!(sim.register(0x0D), 0x1A);
//! assert!(!sim.is_active());
//! ```

use std::collections::VecDeque;
use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::trace;

use crate::config::{BitDepth, DataRate, FullScale, Scale};
use crate::decoder::encode_axis;
use crate::error::TransportError;
use crate::gpio::{Edge, EdgeCallback, EdgeSource, EdgeSubscription, Pull};
use crate::registers::{
    self, CTRL_REG1, CTRL_REG2, CTRL_REG3, CTRL_REG4, F_SETUP, F_STATUS, OUT_X_MSB, PL_BF_ZCOMP,
    PL_CFG, P_L_THS_REG, SYSMOD, WHO_AM_I, XYZ_DATA_CFG,
};
use crate::transport::RegisterBus;

struct SimState {
    registers: [u8; 256],
    who_am_i: u8,
    fifo: VecDeque<[i16; 3]>,
    overflowed: bool,
    asserted: bool,
    open: bool,
    fail_after: Option<usize>,
}

impl SimState {
    fn new() -> Self {
        let mut state = Self {
            registers: [0; 256],
            who_am_i: registers::DEVICE_ID,
            fifo: VecDeque::with_capacity(registers::FIFO_DEPTH),
            overflowed: false,
            asserted: false,
            open: false,
            fail_after: None,
        };
        state.reset();
        state
    }

    fn reset(&mut self) {
        self.registers = [0; 256];
        self.registers[PL_CFG::REG.addr() as usize] = 0x80;
        self.registers[PL_BF_ZCOMP::REG.addr() as usize] = 0x44;
        self.registers[P_L_THS_REG::REG.addr() as usize] = 0x84;
        self.fifo.clear();
        self.overflowed = false;
        self.asserted = false;
    }

    fn reg(&self, register: registers::Register) -> u8 {
        self.registers[register.addr() as usize]
    }

    fn active(&self) -> bool {
        CTRL_REG1::ACTIVE.is_set(self.reg(CTRL_REG1::REG))
    }

    fn fifo_enabled(&self) -> bool {
        F_SETUP::F_MODE.is_set(self.reg(F_SETUP::REG))
    }

    fn watermark(&self) -> usize {
        F_SETUP::F_WMRK.extract(self.reg(F_SETUP::REG)) as usize
    }

    fn scale(&self) -> Scale {
        let bit_depth = if CTRL_REG1::F_READ.is_set(self.reg(CTRL_REG1::REG)) {
            BitDepth::Bits8
        } else {
            BitDepth::Bits14
        };
        let full_scale = match XYZ_DATA_CFG::FS.extract(self.reg(XYZ_DATA_CFG::REG)) {
            0 => FullScale::G2,
            1 => FullScale::G4,
            _ => FullScale::G8,
        };
        Scale::new(bit_depth, full_scale)
    }

    fn data_rate(&self) -> DataRate {
        let index = (CTRL_REG1::DR.extract(self.reg(CTRL_REG1::REG)) >> 3) as usize;
        DataRate::ALL[index]
    }

    fn status(&self) -> u8 {
        let mut status = self.fifo.len().min(registers::FIFO_DEPTH) as u8;
        if self.overflowed {
            status |= F_STATUS::F_OVF.mask();
        }
        let watermark = self.watermark();
        if watermark > 0 && self.fifo.len() >= watermark {
            status |= F_STATUS::F_WMRK_FLAG.mask();
        }
        status
    }

    fn interrupt_condition(&self) -> bool {
        let watermark = self.watermark();
        self.fifo_enabled()
            && CTRL_REG4::INT_EN_FIFO.is_set(self.reg(CTRL_REG4::REG))
            && (self.overflowed || (watermark > 0 && self.fifo.len() >= watermark))
    }

    /// Pin level; IPOL=1 means active high
    fn pin_high(&self) -> bool {
        self.asserted == CTRL_REG3::IPOL.is_set(self.reg(CTRL_REG3::REG))
    }

    fn set_asserted(&mut self, asserted: bool) -> Option<Edge> {
        if self.asserted == asserted {
            return None;
        }
        self.asserted = asserted;
        Some(if self.pin_high() {
            Edge::Rising
        } else {
            Edge::Falling
        })
    }

    fn check(&mut self) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        match self.fail_after {
            Some(0) => Err(TransportError::Bus("simulated NACK".into())),
            Some(ref mut n) => {
                *n -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn push(&mut self, counts: [i16; 3]) -> (bool, Option<Edge>) {
        if !self.active() {
            return (false, None);
        }

        for (axis, value) in counts.iter().enumerate() {
            let [msb, lsb] = encode_axis(*value, BitDepth::Bits14);
            let base = OUT_X_MSB::REG.addr() as usize + axis * 2;
            self.registers[base] = msb;
            self.registers[base + 1] = lsb;
        }

        let mut accepted = true;
        if self.fifo_enabled() {
            if self.fifo.len() < registers::FIFO_DEPTH {
                self.fifo.push_back(counts);
            } else {
                self.overflowed = true;
                if F_SETUP::F_MODE.extract(self.reg(F_SETUP::REG)) == F_SETUP::F_MODE_FILL.mask() {
                    accepted = false;
                } else {
                    self.fifo.pop_front();
                    self.fifo.push_back(counts);
                }
            }
        }

        let edge = if self.interrupt_condition() {
            self.set_asserted(true)
        } else {
            None
        };
        (accepted, edge)
    }

    fn read(&mut self, addr: u8) -> (u8, Option<Edge>) {
        if addr == F_STATUS::REG.addr() && self.fifo_enabled() {
            let status = self.status();
            return (status, self.set_asserted(false));
        }

        let value = if addr == WHO_AM_I::REG.addr() {
            self.who_am_i
        } else if addr == SYSMOD::REG.addr() {
            if self.active() {
                SYSMOD::SYSMOD_WAKE.mask()
            } else {
                0
            }
        } else {
            self.registers[addr as usize]
        };
        (value, None)
    }

    fn read_block(&mut self, addr: u8, buf: &mut [u8]) {
        if addr != OUT_X_MSB::REG.addr() || !self.fifo_enabled() {
            for (i, byte) in buf.iter_mut().enumerate() {
                *byte = self.registers[addr.wrapping_add(i as u8) as usize];
            }
            return;
        }

        let depth = self.scale().bit_depth;
        let stride = depth.bytes_per_sample();
        buf.fill(0);
        for chunk in buf.chunks_exact_mut(stride) {
            let Some(sample) = self.fifo.pop_front() else {
                break;
            };
            self.overflowed = false;
            match depth {
                BitDepth::Bits14 => {
                    for (axis, value) in sample.iter().enumerate() {
                        let [msb, lsb] = encode_axis(*value, depth);
                        chunk[axis * 2] = msb;
                        chunk[axis * 2 + 1] = lsb;
                    }
                }
                BitDepth::Bits8 => {
                    for (axis, value) in sample.iter().enumerate() {
                        chunk[axis] = (*value >> 6) as u8;
                    }
                }
            }
        }
    }

    fn write(&mut self, addr: u8, value: u8) {
        if addr == CTRL_REG2::REG.addr() && CTRL_REG2::RST.is_set(value) {
            self.reset();
            return;
        }

        let Some(register) = registers::by_addr(addr).filter(|r| r.is_writable()) else {
            trace!(addr, "write to read-only or unknown register ignored");
            return;
        };
        let value = value & register.legal_bits();

        if self.active() {
            if register == CTRL_REG1::REG {
                let active = CTRL_REG1::ACTIVE.mask();
                self.registers[addr as usize] = (self.reg(CTRL_REG1::REG) & !active) | (value & active);
                return;
            }
            if register != F_SETUP::REG {
                trace!(register = register.name(), "write ignored while active");
                return;
            }
        }

        self.registers[addr as usize] = value;
        if register == F_SETUP::REG && !self.fifo_enabled() {
            self.fifo.clear();
            self.overflowed = false;
        }
    }
}

struct Listener {
    id: u64,
    edge: Edge,
    callback: EdgeCallback,
}

struct Inner {
    state: Mutex<SimState>,
    listeners: Mutex<Vec<Listener>>,
    next_listener: AtomicU64,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<Listener>> {
        self.listeners.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Called without the state lock held
    fn fire(&self, edge: Option<Edge>) {
        let Some(edge) = edge else {
            return;
        };
        for listener in self.listeners().iter_mut() {
            if listener.edge == Edge::Both || listener.edge == edge {
                (listener.callback)();
            }
        }
    }
}

/// Shared handle to one simulated sensor
#[derive(Clone)]
pub struct SimulatedMma8451 {
    inner: Arc<Inner>,
}

impl Default for SimulatedMma8451 {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedMma8451 {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(SimState::new()),
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(0),
            }),
        }
    }

    /// Register bus attached to this sensor
    pub fn bus(&self) -> SimBus {
        SimBus { sim: self.clone() }
    }

    /// Edge source wired to this sensor's FIFO interrupt line
    ///
    /// The GPIO pin number is accepted as given.
    pub fn edges(&self) -> SimEdges {
        SimEdges { sim: self.clone() }
    }

    /// Pretend to be a different part
    pub fn set_who_am_i(&self, value: u8) {
        self.inner.state().who_am_i = value;
    }

    /// Fail every bus transaction after `count` more have succeeded
    pub fn inject_failures(&self, count: usize) {
        self.inner.state().fail_after = Some(count);
    }

    pub fn clear_failures(&self) {
        self.inner.state().fail_after = None;
    }

    /// Raw register contents, without read side effects
    pub fn register(&self, addr: u8) -> u8 {
        let state = self.inner.state();
        if addr == WHO_AM_I::REG.addr() {
            state.who_am_i
        } else {
            state.registers[addr as usize]
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.state().active()
    }

    pub fn fifo_len(&self) -> usize {
        self.inner.state().fifo.len()
    }

    pub fn data_rate(&self) -> DataRate {
        self.inner.state().data_rate()
    }

    /// Feed one sample as 14-bit counts
    ///
    /// Returns `false` if the device is in standby or a full FIFO in fill mode
    /// dropped the sample.
    pub fn push_counts(&self, counts: [i16; 3]) -> bool {
        let (accepted, edge) = self.inner.state().push(counts);
        self.inner.fire(edge);
        accepted
    }

    /// Feed one sample in g, quantized at the configured range
    pub fn push_sample(&self, g: [f32; 3]) -> bool {
        let full_scale = self.inner.state().scale().full_scale;
        let scale = Scale::new(BitDepth::Bits14, full_scale);
        self.push_counts(g.map(|axis| scale.to_counts(axis)))
    }

    /// Generate motion at the configured data rate until `stop` is set
    ///
    /// Produces about 1 g on Z with small vibrations on every axis.
    pub fn spawn_motion(&self, stop: Arc<AtomicBool>) -> JoinHandle<()> {
        let sim = self.clone();
        thread::spawn(move || {
            let mut next = Instant::now();
            let mut n: u64 = 0;
            while !stop.load(Ordering::Relaxed) {
                let now = Instant::now();
                if !sim.is_active() {
                    next = now;
                    thread::sleep(Duration::from_millis(5));
                    continue;
                }

                let period = sim.data_rate().period();
                while next <= now {
                    let t = n as f64 * period.as_secs_f64();
                    sim.push_sample([
                        (0.05 * (TAU * 5.0 * t).sin()) as f32,
                        (0.02 * (TAU * 3.0 * t).cos()) as f32,
                        (1.0 + 0.01 * (TAU * 50.0 * t).sin()) as f32,
                    ]);
                    n += 1;
                    next += period;
                }
                thread::sleep(Duration::from_millis(2));
            }
        })
    }
}

/// [`RegisterBus`] backed by a [`SimulatedMma8451`]
pub struct SimBus {
    sim: SimulatedMma8451,
}

impl RegisterBus for SimBus {
    fn open(&mut self) -> Result<(), TransportError> {
        self.sim.inner.state().open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.sim.inner.state().open = false;
        Ok(())
    }

    fn read_byte(&mut self, addr: u8) -> Result<u8, TransportError> {
        let (value, edge) = {
            let mut state = self.sim.inner.state();
            state.check()?;
            state.read(addr)
        };
        self.sim.inner.fire(edge);
        Ok(value)
    }

    fn write_byte(&mut self, addr: u8, value: u8) -> Result<(), TransportError> {
        let mut state = self.sim.inner.state();
        state.check()?;
        state.write(addr, value);
        Ok(())
    }

    fn read_block(&mut self, addr: u8, buf: &mut [u8]) -> Result<(), TransportError> {
        let mut state = self.sim.inner.state();
        state.check()?;
        state.read_block(addr, buf);
        Ok(())
    }
}

/// [`EdgeSource`] driven by a [`SimulatedMma8451`] interrupt line
pub struct SimEdges {
    sim: SimulatedMma8451,
}

impl EdgeSource for SimEdges {
    fn subscribe(
        &mut self,
        pin: u8,
        edge: Edge,
        _pull: Pull,
        callback: EdgeCallback,
    ) -> Result<EdgeSubscription, TransportError> {
        let inner = Arc::clone(&self.sim.inner);
        let id = inner.next_listener.fetch_add(1, Ordering::Relaxed);
        inner.listeners().push(Listener { id, edge, callback });
        trace!(pin, %edge, "edge subscription added");

        Ok(EdgeSubscription::new(pin, move || {
            inner.listeners().retain(|l| l.id != id);
        }))
    }
}
