//! Register transport: serialized register access over a physical bus

use std::sync::{Mutex, MutexGuard};

use tracing::trace;

use crate::error::TransportError;
use crate::registers::{Flag, Register};

/// Physical register-addressed bus capability
///
/// Implementations talk to one device at a fixed address. They do not need to
/// be thread safe themselves; [`Transport`] serializes every call.
pub trait RegisterBus: Send {
    /// Acquire the bus. Called once before any register access.
    fn open(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Release the bus
    fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn read_byte(&mut self, addr: u8) -> Result<u8, TransportError>;

    fn write_byte(&mut self, addr: u8, value: u8) -> Result<(), TransportError>;

    /// One burst read of `buf.len()` bytes starting at `addr`
    fn read_block(&mut self, addr: u8, buf: &mut [u8]) -> Result<(), TransportError>;
}

impl<B: RegisterBus + ?Sized> RegisterBus for Box<B> {
    fn open(&mut self) -> Result<(), TransportError> {
        (**self).open()
    }

    fn close(&mut self) -> Result<(), TransportError> {
        (**self).close()
    }

    fn read_byte(&mut self, addr: u8) -> Result<u8, TransportError> {
        (**self).read_byte(addr)
    }

    fn write_byte(&mut self, addr: u8, value: u8) -> Result<(), TransportError> {
        (**self).write_byte(addr, value)
    }

    fn read_block(&mut self, addr: u8, buf: &mut [u8]) -> Result<(), TransportError> {
        (**self).read_block(addr, buf)
    }
}

/// Register access serialized behind one lock
///
/// Read-modify-write sequences hold the lock across both transfers, so the
/// bridge worker and the controller thread never interleave on a register.
pub struct Transport<B: RegisterBus> {
    bus: Mutex<B>,
}

impl<B: RegisterBus> Transport<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus: Mutex::new(bus),
        }
    }

    fn lock(&self) -> MutexGuard<'_, B> {
        // A panic while holding the lock leaves no partial register state behind
        self.bus.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn open(&self) -> Result<(), TransportError> {
        self.lock().open()
    }

    pub fn close(&self) -> Result<(), TransportError> {
        self.lock().close()
    }

    pub fn read_register(&self, register: Register) -> Result<u8, TransportError> {
        let value = self.lock().read_byte(register.addr())?;
        trace!(register = register.name(), value, "read");
        Ok(value)
    }

    pub fn write_register(&self, register: Register, value: u8) -> Result<(), TransportError> {
        self.lock().write_byte(register.addr(), value)?;
        trace!(register = register.name(), value, "write");
        Ok(())
    }

    /// Burst read of `length` bytes starting at `start`
    ///
    /// The device auto-increments its register pointer through the output
    /// registers, so one transfer returns consecutive samples.
    pub fn block_read(&self, start: Register, length: usize) -> Result<Vec<u8>, TransportError> {
        let mut buf = vec![0u8; length];
        if length > 0 {
            self.lock().read_block(start.addr(), &mut buf)?;
        }
        trace!(register = start.name(), length, "block read");
        Ok(buf)
    }

    /// Read-modify-write: clear `clear`, then set `set`, under one lock
    ///
    /// Returns the value written.
    pub fn modify(&self, register: Register, clear: u8, set: u8) -> Result<u8, TransportError> {
        let mut bus = self.lock();
        let old = bus.read_byte(register.addr())?;
        let new = (old & !clear) | set;
        if new != old {
            bus.write_byte(register.addr(), new)?;
        }
        trace!(register = register.name(), old, new, "modify");
        Ok(new)
    }

    pub fn set_flag(&self, flag: Flag) -> Result<(), TransportError> {
        self.modify(flag.register(), 0, flag.mask()).map(|_| ())
    }

    pub fn clear_flag(&self, flag: Flag) -> Result<(), TransportError> {
        self.modify(flag.register(), flag.mask(), 0).map(|_| ())
    }

    /// Current bits of `flag`, shifted down to bit 0
    pub fn read_flag(&self, flag: Flag) -> Result<u8, TransportError> {
        let value = self.read_register(flag.register())?;
        Ok(flag.extract(value) >> flag.mask().trailing_zeros())
    }
}
