//! I2C buses by friendly name, opened per device address.

mod driver;
mod i2cdev;

use std::sync::Arc;

pub use driver::{I2cDriver, I2C_BLOCK_MAX};
pub use i2cdev::I2cDriverI2cDev;

use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::manager::{ResourceManager, Slot};
use crate::pinmux::{MuxBinding, PinMux};
use crate::registry::DriverFactory;

/// Highest 7-bit device address.
pub const I2C_ADDRESS_MAX: u16 = 0x7f;

/// Catalog of I2C buses. Each bus may have one open device per address;
/// the bus pin-mux grant is held while any of them is open.
#[derive(Debug)]
pub struct I2cManager {
    inner: ResourceManager<u32, dyn I2cDriver>,
}

impl I2cManager {
    /// Empty I2C catalog sharing `pinmux` with the other managers.
    pub fn new(pinmux: Arc<PinMux>) -> Self {
        Self {
            inner: ResourceManager::new("i2c", I2cDriverI2cDev::COMPAT, pinmux),
        }
    }

    /// Names `/dev/i2c-<bus>`.
    pub fn register_i2c_dev_bus(&self, name: &str, bus: u32) -> Result<()> {
        self.inner.register(name, bus)
    }

    /// Binds `name` to the simple source `mux`.
    pub fn set_pin_mux(&self, name: &str, mux: &str) -> Result<()> {
        self.inner.set_mux(name, MuxBinding::simple(mux))
    }

    /// Binds `name` to `mux` routed over `group`. Refused with `Busy`
    /// while any device on the bus is open.
    pub fn set_pin_mux_with_group(
        &self,
        name: &str,
        mux: &str,
        group: &str,
    ) -> Result<()> {
        self.inner
            .set_mux(name, MuxBinding::source(mux, Some(group.to_owned())))
    }

    /// Registered bus names, sorted.
    pub fn buses(&self) -> Vec<String> {
        self.inner.names()
    }

    pub fn has_bus(&self, name: &str) -> bool {
        self.inner.contains(name)
    }

    /// Whether any device on the bus is open.
    pub fn is_open(&self, name: &str) -> bool {
        self.inner.is_open(name)
    }

    /// Registers `factory` under `compat`. The last registration wins
    /// until the registry is sealed.
    pub fn register_driver<F>(&self, compat: &str, factory: F) -> Result<()>
    where
        F: DriverFactory<Driver = dyn I2cDriver> + 'static,
    {
        self.inner.register_driver(compat, factory)
    }

    /// Rejects further driver registration.
    pub fn seal_drivers(&self) {
        self.inner.seal_drivers()
    }

    /// Opens the device at 7-bit `address` on bus `name`.
    ///
    /// The first open on a bus takes its mux grant; later addresses share
    /// it. Each address can be open once at a time.
    pub fn open(&self, name: &str, address: u16) -> Result<I2cDevice> {
        if address > I2C_ADDRESS_MAX {
            return Err(Error::InvalidArgument(format!(
                "i2c address {address:#x} is not 7-bit"
            )));
        }
        let handle = self
            .inner
            .open(name, Slot::Address(address), |driver, bus| {
                driver.init(*bus, address)
            })?;
        Ok(I2cDevice { address, handle })
    }
}

/// An open device on an I2C bus. Dropping it closes the device.
pub struct I2cDevice {
    address: u16,
    handle: Handle<u32, dyn I2cDriver>,
}

impl I2cDevice {
    pub fn bus_name(&self) -> &str {
        self.handle.name()
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    /// Raw read; fails unless the whole buffer is filled.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        self.handle.driver_mut()?.read(buf)
    }

    pub fn read_reg_byte(&mut self, reg: u8) -> Result<u8> {
        self.handle.driver_mut()?.read_reg_byte(reg)
    }

    pub fn read_reg_word(&mut self, reg: u8) -> Result<u16> {
        self.handle.driver_mut()?.read_reg_word(reg)
    }

    /// SMBus block read of up to [`I2C_BLOCK_MAX`] bytes from `reg`.
    pub fn read_reg_buffer(&mut self, reg: u8, buf: &mut [u8]) -> Result<()> {
        self.handle.driver_mut()?.read_reg_buffer(reg, buf)
    }

    /// Raw write; fails unless every byte is accepted.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.handle.driver_mut()?.write(data)
    }

    pub fn write_reg_byte(&mut self, reg: u8, value: u8) -> Result<()> {
        self.handle.driver_mut()?.write_reg_byte(reg, value)
    }

    pub fn write_reg_word(&mut self, reg: u8, value: u16) -> Result<()> {
        self.handle.driver_mut()?.write_reg_word(reg, value)
    }

    /// SMBus block write of up to [`I2C_BLOCK_MAX`] bytes at `reg`.
    pub fn write_reg_buffer(&mut self, reg: u8, data: &[u8]) -> Result<()> {
        self.handle.driver_mut()?.write_reg_buffer(reg, data)
    }
}

impl std::fmt::Debug for I2cDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("I2cDevice")
            .field("bus", &self.bus_name())
            .field("address", &self.address)
            .finish()
    }
}
