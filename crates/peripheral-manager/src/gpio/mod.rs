//! GPIO lines by friendly name.

mod driver;
mod sysfs;

use std::os::fd::OwnedFd;
use std::sync::Arc;

use tracing::warn;

pub use driver::{ActiveType, EdgeType, GpioDirection, GpioDriver, PinDirection};
pub use sysfs::{GpioDriverSysfs, DEFAULT_SYSFS_ROOT};

use crate::error::Result;
use crate::handle::Handle;
use crate::manager::{ResourceManager, Slot};
use crate::pinmux::{MuxBinding, PinMux};
use crate::registry::DriverFactory;

/// Catalog of GPIO lines, keyed by friendly name, each mapped to a sysfs
/// index.
#[derive(Debug)]
pub struct GpioManager {
    inner: ResourceManager<u32, dyn GpioDriver>,
}

impl GpioManager {
    /// Empty GPIO catalog sharing `pinmux` with the other managers.
    pub fn new(pinmux: Arc<PinMux>) -> Self {
        Self {
            inner: ResourceManager::new("gpio", GpioDriverSysfs::COMPAT, pinmux),
        }
    }

    /// Names sysfs line `index`. Fails with
    /// [`Error::AlreadyRegistered`](crate::Error::AlreadyRegistered) if `name` is taken.
    pub fn register_sysfs_gpio(&self, name: &str, index: u32) -> Result<()> {
        self.inner.register(name, index)
    }

    /// Opening `name` will take `pin` from the pin-mux table as GPIO.
    pub fn set_pin_mux(&self, name: &str, pin: &str) -> Result<()> {
        self.inner
            .set_mux(name, MuxBinding::Gpio { pin: pin.to_owned() })
    }

    /// Registered names, sorted.
    pub fn gpios(&self) -> Vec<String> {
        self.inner.names()
    }

    pub fn has_gpio(&self, name: &str) -> bool {
        self.inner.contains(name)
    }

    /// Whether a handle for `name` is alive.
    pub fn is_open(&self, name: &str) -> bool {
        self.inner.is_open(name)
    }

    /// Registers `factory` under `compat`. The last registration wins
    /// until the registry is sealed.
    pub fn register_driver<F>(&self, compat: &str, factory: F) -> Result<()>
    where
        F: DriverFactory<Driver = dyn GpioDriver> + 'static,
    {
        self.inner.register_driver(compat, factory)
    }

    /// Rejects further driver registration.
    pub fn seal_drivers(&self) {
        self.inner.seal_drivers()
    }

    /// Exports and binds the line, taking its mux pin when one is set.
    ///
    /// Fails with `NotFound` for an unknown name, `Busy` if it is already
    /// open or its pin is held, or the driver's error. Nothing is left held
    /// on failure.
    pub fn open(&self, name: &str) -> Result<GpioPin> {
        let handle = self
            .inner
            .open(name, Slot::Whole, |driver, index| driver.init(*index))?;
        Ok(GpioPin { handle, pad_output: None })
    }
}

/// An open GPIO line. Dropping it closes the line.
pub struct GpioPin {
    handle: Handle<u32, dyn GpioDriver>,
    /// Last pad direction set through the mux binding.
    pad_output: Option<bool>,
}

impl GpioPin {
    pub fn name(&self) -> &str {
        self.handle.name()
    }

    /// Drives the line. Only meaningful for outputs.
    pub fn set_value(&mut self, high: bool) -> Result<()> {
        self.handle.driver_mut()?.set_value(high)
    }

    /// Current level as the line reports it.
    pub fn value(&self) -> Result<bool> {
        self.handle.driver()?.value()
    }

    /// Pads behind a mux binding are switched before the line itself. If
    /// the line then refuses the change, the pad is switched back.
    pub fn set_direction(&mut self, direction: GpioDirection) -> Result<()> {
        let Some(MuxBinding::Gpio { pin }) = self.handle.mux() else {
            return self.handle.driver_mut()?.set_direction(direction);
        };
        let pin = pin.clone();
        let previous = match self.pad_output {
            Some(output) => Some(output),
            None => self
                .handle
                .driver()?
                .direction()
                .ok()
                .map(|d| d == PinDirection::Out),
        };

        let output = direction.is_output();
        self.handle.pinmux().set_gpio_direction(&pin, output)?;
        if let Err(e) = self.handle.driver_mut()?.set_direction(direction) {
            match previous {
                Some(previous) => {
                    if let Err(revert) =
                        self.handle.pinmux().set_gpio_direction(&pin, previous)
                    {
                        warn!(pin = %pin, error = %revert, "pad direction revert failed");
                    }
                }
                None => warn!(pin = %pin, "pad direction unknown, not reverted"),
            }
            return Err(e);
        }
        self.pad_output = Some(output);
        Ok(())
    }

    pub fn direction(&self) -> Result<PinDirection> {
        self.handle.driver()?.direction()
    }

    /// Edge that makes the polling descriptor readable.
    pub fn set_edge_trigger(&mut self, edge: EdgeType) -> Result<()> {
        self.handle.driver_mut()?.set_edge_trigger(edge)
    }

    pub fn set_active_type(&mut self, active: ActiveType) -> Result<()> {
        self.handle.driver_mut()?.set_active_type(active)
    }

    /// A fresh descriptor on the line's `value` file, for `poll`.
    pub fn polling_fd(&self) -> Result<OwnedFd> {
        self.handle.driver()?.polling_fd()
    }
}

impl std::fmt::Debug for GpioPin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpioPin").field("name", &self.name()).finish()
    }
}
