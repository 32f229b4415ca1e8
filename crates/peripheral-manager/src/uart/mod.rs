//! Serial lines by friendly name.

mod driver;
mod tty;

use std::os::fd::RawFd;
use std::path::PathBuf;
use std::sync::Arc;

pub use driver::{UartDriver, BAUD_RATES};
pub use tty::UartDriverTty;

use crate::error::Result;
use crate::handle::Handle;
use crate::manager::{ResourceManager, Slot};
use crate::pinmux::{MuxBinding, PinMux};
use crate::registry::DriverFactory;

/// Catalog of serial lines, each a tty node opened at most once.
#[derive(Debug)]
pub struct UartManager {
    inner: ResourceManager<PathBuf, dyn UartDriver>,
}

impl UartManager {
    /// Empty UART catalog sharing `pinmux` with the other managers.
    pub fn new(pinmux: Arc<PinMux>) -> Self {
        Self {
            inner: ResourceManager::new("uart", UartDriverTty::COMPAT, pinmux),
        }
    }

    /// `path` is the tty device node, used as given.
    pub fn register_uart_bus(
        &self,
        name: &str,
        path: impl Into<PathBuf>,
    ) -> Result<()> {
        self.inner.register(name, path.into())
    }

    /// Binds `name` to the simple source `mux`.
    pub fn set_pin_mux(&self, name: &str, mux: &str) -> Result<()> {
        self.inner.set_mux(name, MuxBinding::simple(mux))
    }

    /// Binds `name` to `mux` routed over `group`. Refused with `Busy`
    /// while the line is open.
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
    pub fn devices(&self) -> Vec<String> {
        self.inner.names()
    }

    pub fn has_device(&self, name: &str) -> bool {
        self.inner.contains(name)
    }

    pub fn is_open(&self, name: &str) -> bool {
        self.inner.is_open(name)
    }

    /// Registers `factory` under `compat`. The last registration wins
    /// until the registry is sealed.
    pub fn register_driver<F>(&self, compat: &str, factory: F) -> Result<()>
    where
        F: DriverFactory<Driver = dyn UartDriver> + 'static,
    {
        self.inner.register_driver(compat, factory)
    }

    /// Rejects further driver registration.
    pub fn seal_drivers(&self) {
        self.inner.seal_drivers()
    }

    /// Opens and configures the line. Canonical lines block and deliver
    /// whole lines; raw lines are non-blocking.
    pub fn open(&self, name: &str, canonical: bool) -> Result<UartDevice> {
        let handle = self.inner.open(name, Slot::Whole, |driver, path| {
            driver.init(path, canonical)
        })?;
        Ok(UartDevice { handle })
    }
}

/// An open serial line. Dropping it closes the line.
pub struct UartDevice {
    handle: Handle<PathBuf, dyn UartDriver>,
}

impl UartDevice {
    pub fn name(&self) -> &str {
        self.handle.name()
    }

    /// Fails with `InvalidArgument` for rates outside [`BAUD_RATES`].
    pub fn set_baudrate(&mut self, baudrate: u32) -> Result<()> {
        self.handle.driver_mut()?.set_baudrate(baudrate)
    }

    pub fn baudrate(&mut self) -> Result<u32> {
        self.handle.driver_mut()?.baudrate()
    }

    /// Bytes the kernel accepted; may be fewer than `data.len()`.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.handle.driver_mut()?.write(data)
    }

    /// Bytes read. A raw line with nothing buffered reports
    /// [`Error::WouldBlock`](crate::Error::WouldBlock).
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.handle.driver_mut()?.read(buf)
    }

    /// The line's descriptor, for `poll`. Owned by the device.
    pub fn polling_fd(&self) -> Result<RawFd> {
        self.handle.driver()?.polling_fd()
    }
}

impl std::fmt::Debug for UartDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UartDevice").field("name", &self.name()).finish()
    }
}
