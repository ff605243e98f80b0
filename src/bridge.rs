//! Interrupt-to-queue bridge
//!
//! The edge callback only releases an [`InterruptSignal`]. One worker thread
//! per armed session waits on that signal, reads the FIFO status, drains the
//! reported samples in a single burst read and pushes the bytes onto a bounded
//! queue for the decoder.
//!
//! A full queue blocks the worker, which delays the next FIFO drain. Under
//! sustained downstream slowness the hardware FIFO can therefore overflow;
//! that shows up as `overflowed` blocks and in [`BridgeCounters::overflows`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{SendTimeoutError, Sender};
use tracing::{debug, error, warn};

use crate::config::Scale;
use crate::error::{Mma8451Error, Result};
use crate::registers::{FIFO_DEPTH, F_STATUS, OUT_X_MSB};
use crate::signal::InterruptSignal;
use crate::transport::{RegisterBus, Transport};

/// Bytes from one FIFO drain, oldest sample first
#[derive(Debug, Clone)]
pub struct RawBlock {
    /// Drain number within the session, starting at 0
    pub sequence: u64,
    pub bytes: Vec<u8>,
    /// Precision and range in effect when the block was captured
    pub scale: Scale,
    pub sample_period: Duration,
    pub captured_at: Instant,
    /// The FIFO had overflowed before this drain
    pub overflowed: bool,
}

impl RawBlock {
    pub fn sample_count(&self) -> usize {
        self.bytes.len() / self.scale.bytes_per_sample()
    }
}

/// Decoded F_STATUS byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FifoStatus(pub u8);

impl FifoStatus {
    pub fn overflowed(self) -> bool {
        F_STATUS::F_OVF.is_set(self.0)
    }

    pub fn watermark_reached(self) -> bool {
        F_STATUS::F_WMRK_FLAG.is_set(self.0)
    }

    pub fn count(self) -> usize {
        F_STATUS::F_CNT.extract(self.0) as usize
    }

    /// Samples to read: the whole FIFO after an overflow, since the count
    /// field is unreliable then
    pub fn samples_to_drain(self) -> usize {
        if self.overflowed() {
            FIFO_DEPTH
        } else {
            self.count().min(FIFO_DEPTH)
        }
    }
}

/// Live bridge counters, shared with the controller
#[derive(Debug, Default)]
pub struct BridgeStats {
    interrupts: AtomicU64,
    blocks: AtomicU64,
    samples: AtomicU64,
    overflows: AtomicU64,
    spurious_wakes: AtomicU64,
}

/// Point-in-time copy of [`BridgeStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeCounters {
    pub interrupts: u64,
    pub blocks: u64,
    pub samples: u64,
    pub overflows: u64,
    pub spurious_wakes: u64,
}

impl BridgeStats {
    pub fn snapshot(&self) -> BridgeCounters {
        BridgeCounters {
            interrupts: self.interrupts.load(Ordering::Relaxed),
            blocks: self.blocks.load(Ordering::Relaxed),
            samples: self.samples.load(Ordering::Relaxed),
            overflows: self.overflows.load(Ordering::Relaxed),
            spurious_wakes: self.spurious_wakes.load(Ordering::Relaxed),
        }
    }
}

/// Single-session FIFO drain worker
pub struct BridgeWorker<B: RegisterBus> {
    transport: Arc<Transport<B>>,
    signal: Arc<InterruptSignal>,
    queue: Sender<RawBlock>,
    stop: Arc<AtomicBool>,
    stats: Arc<BridgeStats>,
    scale: Scale,
    sample_period: Duration,
    wait_timeout: Duration,
    sequence: u64,
}

impl<B: RegisterBus + 'static> BridgeWorker<B> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transport: Arc<Transport<B>>,
        signal: Arc<InterruptSignal>,
        queue: Sender<RawBlock>,
        stop: Arc<AtomicBool>,
        stats: Arc<BridgeStats>,
        scale: Scale,
        sample_period: Duration,
        wait_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            signal,
            queue,
            stop,
            stats,
            scale,
            sample_period,
            wait_timeout,
            sequence: 0,
        }
    }

    /// Run on a dedicated thread until stopped or a fatal error occurs
    pub fn spawn(self) -> JoinHandle<Result<()>> {
        thread::spawn(move || {
            let result = self.run();
            if let Err(e) = &result {
                error!("bridge worker stopped: {}", e);
            }
            result
        })
    }

    pub fn run(mut self) -> Result<()> {
        debug!("bridge worker started");
        loop {
            let woke = self.signal.acquire_timeout(self.wait_timeout);

            if self.stop.load(Ordering::Acquire) {
                // Samples below the watermark never raise another interrupt
                if let Some(block) = self.drain()? {
                    self.push(block)?;
                }
                debug!("bridge worker stopped");
                return Ok(());
            }

            if !woke {
                continue;
            }
            self.stats.interrupts.fetch_add(1, Ordering::Relaxed);

            let Some(block) = self.drain()? else {
                continue;
            };
            self.push(block)?;
            self.acknowledge()?;
        }
    }

    /// Read F_STATUS and burst-read whatever it reports
    ///
    /// Returns `None` when the FIFO is empty.
    pub fn drain(&mut self) -> Result<Option<RawBlock>> {
        let status = FifoStatus(self.transport.read_register(F_STATUS::REG)?);

        if status.overflowed() {
            self.stats.overflows.fetch_add(1, Ordering::Relaxed);
            warn!(status = status.0, "FIFO overflow, draining all {} slots", FIFO_DEPTH);
        }

        let count = status.samples_to_drain();
        if count == 0 {
            self.stats.spurious_wakes.fetch_add(1, Ordering::Relaxed);
            debug!("spurious wake, FIFO empty");
            return Ok(None);
        }

        let bytes = self
            .transport
            .block_read(OUT_X_MSB::REG, count * self.scale.bytes_per_sample())?;

        let block = RawBlock {
            sequence: self.sequence,
            bytes,
            scale: self.scale,
            sample_period: self.sample_period,
            captured_at: Instant::now(),
            overflowed: status.overflowed(),
        };
        self.sequence += 1;
        Ok(Some(block))
    }

    /// Re-read F_STATUS so the device releases its interrupt line
    pub fn acknowledge(&self) -> Result<()> {
        self.transport.read_register(F_STATUS::REG)?;
        Ok(())
    }

    fn push(&self, mut block: RawBlock) -> Result<()> {
        let samples = block.sample_count() as u64;
        let mut warned = false;
        loop {
            match self.queue.send_timeout(block, self.wait_timeout) {
                Ok(()) => break,
                Err(SendTimeoutError::Timeout(returned)) => {
                    if !warned {
                        warn!("raw block queue full, FIFO drain delayed");
                        warned = true;
                    }
                    block = returned;
                }
                Err(SendTimeoutError::Disconnected(_)) => return Err(Mma8451Error::QueueClosed),
            }
        }
        self.stats.blocks.fetch_add(1, Ordering::Relaxed);
        self.stats.samples.fetch_add(samples, Ordering::Relaxed);
        Ok(())
    }
}
