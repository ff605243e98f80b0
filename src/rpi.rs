//! Raspberry Pi backends built on `rppal`
//!
//! Requires the `rpi` feature, `/dev/i2c-*` and GPIO access for the running
//! user.

use rppal::gpio::{Gpio, Trigger};
use rppal::i2c::I2c;
use tracing::debug;

use crate::error::TransportError;
use crate::gpio::{Edge, EdgeCallback, EdgeSource, EdgeSubscription, Pull};
use crate::transport::RegisterBus;

impl From<rppal::i2c::Error> for TransportError {
    fn from(e: rppal::i2c::Error) -> Self {
        TransportError::Bus(e.to_string())
    }
}

impl From<rppal::gpio::Error> for TransportError {
    fn from(e: rppal::gpio::Error) -> Self {
        TransportError::Gpio(e.to_string())
    }
}

/// Linux I2C transport
///
/// Single registers use SMBus byte transfers. Block reads are one combined
/// write-read with a repeated start, so FIFO drains are not capped at the
/// 32-byte SMBus block limit.
pub struct RppalI2c {
    bus: u8,
    address: u8,
    i2c: Option<I2c>,
}

impl RppalI2c {
    /// # Arguments
    /// * `bus` - I2C bus number (`/dev/i2c-<bus>`, 1 on current Pi models)
    /// * `address` - 7-bit device address (0x1D, or 0x1C with SA0 low)
    pub fn new(bus: u8, address: u8) -> Self {
        Self {
            bus,
            address,
            i2c: None,
        }
    }

    fn i2c(&self) -> Result<&I2c, TransportError> {
        self.i2c.as_ref().ok_or(TransportError::NotOpen)
    }
}

impl RegisterBus for RppalI2c {
    fn open(&mut self) -> Result<(), TransportError> {
        let mut i2c = I2c::with_bus(self.bus)?;
        i2c.set_slave_address(self.address as u16)?;
        debug!(bus = self.bus, address = self.address, "I2C bus opened");
        self.i2c = Some(i2c);
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.i2c = None;
        Ok(())
    }

    fn read_byte(&mut self, addr: u8) -> Result<u8, TransportError> {
        Ok(self.i2c()?.smbus_read_byte(addr)?)
    }

    fn write_byte(&mut self, addr: u8, value: u8) -> Result<(), TransportError> {
        Ok(self.i2c()?.smbus_write_byte(addr, value)?)
    }

    fn read_block(&mut self, addr: u8, buf: &mut [u8]) -> Result<(), TransportError> {
        Ok(self.i2c()?.write_read(&[addr], buf)?)
    }
}

/// GPIO edge interrupts through rppal's interrupt thread
pub struct RppalGpio {
    gpio: Gpio,
}

impl RppalGpio {
    pub fn new() -> Result<Self, TransportError> {
        Ok(Self { gpio: Gpio::new()? })
    }
}

impl EdgeSource for RppalGpio {
    fn subscribe(
        &mut self,
        pin: u8,
        edge: Edge,
        pull: Pull,
        mut callback: EdgeCallback,
    ) -> Result<EdgeSubscription, TransportError> {
        let input = self.gpio.get(pin)?;
        let mut input = match pull {
            Pull::Up => input.into_input_pullup(),
            Pull::Down => input.into_input_pulldown(),
            Pull::None => input.into_input(),
        };

        let trigger = match edge {
            Edge::Rising => Trigger::RisingEdge,
            Edge::Falling => Trigger::FallingEdge,
            Edge::Both => Trigger::Both,
        };
        input.set_async_interrupt(trigger, move |_level| callback())?;
        debug!(pin, %edge, "GPIO interrupt armed");

        // The pin lives in the revoke closure; dropping it releases the line
        Ok(EdgeSubscription::new(pin, move || {
            let _ = input.clear_async_interrupt();
        }))
    }
}
