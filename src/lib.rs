//! Interrupt-driven FIFO acquisition for the MMA8451Q accelerometer
//!
//! The MMA8451Q buffers up to 32 samples in an on-chip FIFO and raises an
//! interrupt line once a watermark is reached. This library configures the
//! sensor over I2C, waits on that interrupt and drains the FIFO in bulk,
//! then decodes the raw blocks into timestamped acceleration batches on a
//! separate worker.
//!
//! ```text
//! GPIO edge -> InterruptSignal -> bridge worker -> raw block queue -> decoder -> BatchStream
//! ```
//!
//! # Quick Start
//!
//! ## Streaming batches
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use std::sync::Arc;
//! use mma8451_acquisition::config::{DataRate, FullScale, Setting};
//! use mma8451_acquisition::device::InterruptRoute;
//! use mma8451_acquisition::{Acquisition, PipelineOptions, SimulatedMma8451};
//!
//! let sim = SimulatedMma8451::new();
//! let _motion = sim.spawn_motion(Arc::new(AtomicBool::new(false)));
//!
//! let (mut acquisition, batches) =
//!     Acquisition::new(sim.bus(), sim.edges(), PipelineOptions::default());
//! let device = acquisition.device_mut();
//! device.open()?;
//! device.reset()?;
//! device.configure(&[
//!     Setting::FullScale(FullScale::G4),
//!     Setting::DataRate(DataRate::Hz400),
//! ])?;
//! device.arm(16, InterruptRoute::default())?;
//!
//! for batch in batches.take(5) {
//!     if let Some(last) = batch.last() {
//!         println!("{} samples, last |a| = {:.3}g", batch.len(), last.magnitude());
//!     }
//! }
//! acquisition.close()?;
//! # Ok::<(), mma8451_acquisition::Mma8451Error>(())
//! ```
//!
//! ## Hardware
//! With the `rpi` feature, [`rpi::RppalI2c`] and [`rpi::RppalGpio`] take the
//! place of the simulator's bus and edge source.

pub mod batcher;
pub mod bridge;
pub mod cli;
pub mod common;
pub mod config;
pub mod decoder;
pub mod device;
pub mod error;
pub mod gpio;
pub mod pipeline;
pub mod registers;
pub mod signal;
pub mod sim;
pub mod transport;

#[cfg(feature = "rpi")]
pub mod rpi;

#[cfg(feature = "hdf5")]
pub mod hdf5_format;

// Re-export public API
pub use batcher::{Batch, BatchPolicy, BatchStream, DecoderSummary, NextBatch};
pub use common::{create_bar, RateMeter};
pub use config::{Configuration, Setting};
pub use decoder::{Sample, Units};
pub use device::{DeviceState, InterruptRoute, Mma8451};
pub use error::{Mma8451Error, Result, TransportError};
pub use pipeline::{Acquisition, PipelineOptions};
pub use sim::SimulatedMma8451;

#[cfg(feature = "hdf5")]
pub use hdf5_format::{Hdf5Reader, Hdf5Writer, Metadata};
