//! SPI chip selects by friendly name.

mod driver;
mod spidev;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use driver::{SpiDriver, SpiMode};
pub use spidev::SpiDriverSpiDev;

use crate::error::Result;
use crate::handle::Handle;
use crate::manager::{ResourceManager, Slot};
use crate::pinmux::{MuxBinding, PinMux};
use crate::registry::DriverFactory;

/// Where a friendly SPI name lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpiBus {
    pub bus: u32,
    pub chip_select: u32,
}

/// Catalog of SPI chip selects. Each one opens at most once.
#[derive(Debug)]
pub struct SpiManager {
    inner: ResourceManager<SpiBus, dyn SpiDriver>,
}

impl SpiManager {
    /// Empty SPI catalog sharing `pinmux` with the other managers.
    pub fn new(pinmux: Arc<PinMux>) -> Self {
        Self {
            inner: ResourceManager::new("spi", SpiDriverSpiDev::COMPAT, pinmux),
        }
    }

    /// Names `/dev/spidev<bus>.<chip_select>`.
    pub fn register_spi_dev_bus(
        &self,
        name: &str,
        bus: u32,
        chip_select: u32,
    ) -> Result<()> {
        self.inner.register(name, SpiBus { bus, chip_select })
    }

    /// Binds `name` to the simple source `mux`.
    pub fn set_pin_mux(&self, name: &str, mux: &str) -> Result<()> {
        self.inner.set_mux(name, MuxBinding::simple(mux))
    }

    /// Binds `name` to `mux` routed over `group`. Refused with `Busy`
    /// while the device is open.
    pub fn set_pin_mux_with_group(
        &self,
        name: &str,
        mux: &str,
        group: &str,
    ) -> Result<()> {
        self.inner
            .set_mux(name, MuxBinding::source(mux, Some(group.to_owned())))
    }

    /// Registered names, sorted.
    pub fn buses(&self) -> Vec<String> {
        self.inner.names()
    }

    pub fn has_bus(&self, name: &str) -> bool {
        self.inner.contains(name)
    }

    pub fn is_open(&self, name: &str) -> bool {
        self.inner.is_open(name)
    }

    /// Registers `factory` under `compat`. The last registration wins
    /// until the registry is sealed.
    pub fn register_driver<F>(&self, compat: &str, factory: F) -> Result<()>
    where
        F: DriverFactory<Driver = dyn SpiDriver> + 'static,
    {
        self.inner.register_driver(compat, factory)
    }

    /// Rejects further driver registration.
    pub fn seal_drivers(&self) {
        self.inner.seal_drivers()
    }

    /// Binds the chip select and takes its mux grant. Fails with `Busy` if
    /// it is already open or its pins are held.
    pub fn open(&self, name: &str) -> Result<SpiDevice> {
        let handle = self.inner.open(name, Slot::Whole, |driver, spi| {
            driver.init(spi.bus, spi.chip_select)
        })?;
        Ok(SpiDevice { handle })
    }
}

/// An open SPI chip select. Dropping it closes the device.
pub struct SpiDevice {
    handle: Handle<SpiBus, dyn SpiDriver>,
}

impl SpiDevice {
    pub fn name(&self) -> &str {
        self.handle.name()
    }

    /// Clocks out one byte, discarding what comes back.
    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.write_buffer(&[byte])
    }

    pub fn write_buffer(&mut self, data: &[u8]) -> Result<()> {
        self.handle.driver_mut()?.transfer(Some(data), None)
    }

    /// Full duplex; `rx` must be as long as `tx`.
    pub fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        self.handle.driver_mut()?.transfer(Some(tx), Some(rx))
    }

    pub fn set_mode(&mut self, mode: SpiMode) -> Result<()> {
        self.handle.driver_mut()?.set_mode(mode)
    }

    /// Requested clock; clamped to the controller's maximum.
    pub fn set_frequency(&mut self, hz: u32) -> Result<()> {
        self.handle.driver_mut()?.set_frequency(hz)
    }

    /// The clock transfers currently run at.
    pub fn frequency(&self) -> Result<u32> {
        Ok(self.handle.driver()?.frequency())
    }

    /// `true` sends the least significant bit first.
    pub fn set_bit_justification(&mut self, lsb_first: bool) -> Result<()> {
        self.handle.driver_mut()?.set_bit_justification(lsb_first)
    }

    pub fn set_bits_per_word(&mut self, bits: u8) -> Result<()> {
        self.handle.driver_mut()?.set_bits_per_word(bits)
    }

    pub fn bits_per_word(&self) -> Result<u8> {
        Ok(self.handle.driver()?.bits_per_word())
    }

    /// Microseconds to wait after each transfer before deselecting.
    pub fn set_delay(&mut self, usecs: u16) -> Result<()> {
        self.handle.driver_mut()?.set_delay(usecs)
    }

    pub fn delay(&self) -> Result<u16> {
        Ok(self.handle.driver()?.delay())
    }
}

impl std::fmt::Debug for SpiDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpiDevice").field("name", &self.name()).finish()
    }
}
