//! Error types for the MMA8451 acquisition pipeline

use thiserror::Error;

use crate::device::DeviceState;

/// Bus-level failure reported by a register transport or an edge source
///
/// The adapter never retries; whoever owns the session decides whether the
/// failure is fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// I2C transfer failed (NACK, arbitration loss, timeout)
    #[error("I2C bus error: {0}")]
    Bus(String),

    /// Block transfer returned fewer bytes than requested
    #[error("Data transfer error: expected {expected} bytes, transferred {actual}")]
    Transfer { expected: usize, actual: usize },

    /// Bus was never opened or has already been released
    #[error("Bus is not open")]
    NotOpen,

    /// GPIO setup or edge subscription failed
    #[error("GPIO error: {0}")]
    Gpio(String),
}

/// Error type for MMA8451 operations
#[derive(Error, Debug)]
pub enum Mma8451Error {
    /// Bus or GPIO failure
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// WHO_AM_I did not match the MMA8451Q identity
    #[error("Unrecognized device: expected WHO_AM_I 0x{expected:02X}, got 0x{actual:02X}")]
    UnrecognizedDevice { expected: u8, actual: u8 },

    /// Caller requested a value the option does not support
    #[error("Invalid value for {option}: {value}")]
    InvalidValue { option: &'static str, value: String },

    /// Operation is not legal in the current controller state
    #[error("Cannot {operation} while device is {state}")]
    InvalidState {
        operation: &'static str,
        state: DeviceState,
    },

    /// Consumer side of the raw block queue is gone
    #[error("Raw block queue closed")]
    QueueClosed,

    /// A background worker panicked instead of returning
    #[error("Acquisition worker panicked")]
    WorkerPanicked,

    /// HDF5 storage failure
    #[cfg(feature = "hdf5")]
    #[error("HDF5 error: {0}")]
    Storage(String),
}

impl Mma8451Error {
    pub(crate) fn invalid_value(option: &'static str, value: impl ToString) -> Self {
        Mma8451Error::InvalidValue {
            option,
            value: value.to_string(),
        }
    }
}

/// Result type for MMA8451 operations
pub type Result<T> = std::result::Result<T, Mma8451Error>;
