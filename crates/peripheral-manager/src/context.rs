use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::chardev::CharDeviceSource;
use crate::error::Result;
use crate::gpio::{GpioDriver, GpioDriverSysfs, GpioManager, DEFAULT_SYSFS_ROOT};
use crate::i2c::{I2cDriver, I2cDriverI2cDev, I2cManager};
use crate::pinmux::PinMux;
use crate::spi::{SpiDriver, SpiDriverSpiDev, SpiManager};
use crate::uart::{UartDriver, UartDriverTty, UartManager};

pub const DEFAULT_DEV_ROOT: &str = "/dev";

/// Construction parameters of the built-in drivers.
#[derive(Clone)]
pub struct DriverParams {
    /// Directory holding `export` and the `gpioN` directories.
    pub gpio_sysfs_root: PathBuf,
    /// Directory holding `i2c-N` and `spidevB.C`.
    pub dev_root: PathBuf,
    /// Stand-in for the kernel. `None` issues real syscalls.
    pub char_devices: CharDeviceSource,
}

impl Default for DriverParams {
    fn default() -> Self {
        Self {
            gpio_sysfs_root: PathBuf::from(DEFAULT_SYSFS_ROOT),
            dev_root: PathBuf::from(DEFAULT_DEV_ROOT),
            char_devices: None,
        }
    }
}

impl fmt::Debug for DriverParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverParams")
            .field("gpio_sysfs_root", &self.gpio_sysfs_root)
            .field("dev_root", &self.dev_root)
            .field("char_devices", &self.char_devices.is_some())
            .finish()
    }
}

/// Every manager plus the pin-mux table they share.
///
/// Built explicitly and passed to whoever needs it. Dropping the context
/// while handles are alive is allowed; each catalog lives on until its
/// last handle is gone.
#[derive(Debug)]
pub struct PeripheralContext {
    pinmux: Arc<PinMux>,
    gpio: GpioManager,
    i2c: I2cManager,
    spi: SpiManager,
    uart: UartManager,
}

impl Default for PeripheralContext {
    fn default() -> Self {
        Self::new()
    }
}

impl PeripheralContext {
    /// Empty catalogs, no drivers.
    pub fn new() -> Self {
        let pinmux = Arc::new(PinMux::new());
        Self {
            gpio: GpioManager::new(Arc::clone(&pinmux)),
            i2c: I2cManager::new(Arc::clone(&pinmux)),
            spi: SpiManager::new(Arc::clone(&pinmux)),
            uart: UartManager::new(Arc::clone(&pinmux)),
            pinmux,
        }
    }

    /// [`new`](Self::new) followed by
    /// [`register_default_drivers`](Self::register_default_drivers).
    pub fn with_default_drivers(params: &DriverParams) -> Result<Self> {
        let ctx = Self::new();
        ctx.register_default_drivers(params)?;
        Ok(ctx)
    }

    pub fn register_default_drivers(&self, params: &DriverParams) -> Result<()> {
        let root = params.gpio_sysfs_root.clone();
        self.gpio.register_driver(GpioDriverSysfs::COMPAT, move || {
            Box::new(GpioDriverSysfs::new(root.clone())) as Box<dyn GpioDriver>
        })?;

        let (dev_root, source) = (params.dev_root.clone(), params.char_devices.clone());
        self.i2c.register_driver(I2cDriverI2cDev::COMPAT, move || {
            Box::new(I2cDriverI2cDev::new(dev_root.clone(), source.clone()))
                as Box<dyn I2cDriver>
        })?;

        let (dev_root, source) = (params.dev_root.clone(), params.char_devices.clone());
        self.spi.register_driver(SpiDriverSpiDev::COMPAT, move || {
            Box::new(SpiDriverSpiDev::new(dev_root.clone(), source.clone()))
                as Box<dyn SpiDriver>
        })?;

        let source = params.char_devices.clone();
        self.uart.register_driver(UartDriverTty::COMPAT, move || {
            Box::new(UartDriverTty::new(source.clone())) as Box<dyn UartDriver>
        })?;

        info!(?params, "default drivers registered");
        Ok(())
    }

    /// Rejects any further driver registration. Call once startup is done.
    pub fn seal_drivers(&self) {
        self.gpio.seal_drivers();
        self.i2c.seal_drivers();
        self.spi.seal_drivers();
        self.uart.seal_drivers();
    }

    pub fn pinmux(&self) -> &PinMux {
        &self.pinmux
    }

    pub fn gpio(&self) -> &GpioManager {
        &self.gpio
    }

    pub fn i2c(&self) -> &I2cManager {
        &self.i2c
    }

    pub fn spi(&self) -> &SpiManager {
        &self.spi
    }

    pub fn uart(&self) -> &UartManager {
        &self.uart
    }
}
