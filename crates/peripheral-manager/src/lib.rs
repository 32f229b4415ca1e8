//! Named access to GPIO, I2C, SPI and UART peripherals on embedded Linux.
//!
//! Board code registers pins, pin groups and mux sources with the
//! [`PinMux`] table and names its buses with the per-kind managers of a
//! [`PeripheralContext`]. Callers then open resources by name and get a
//! handle; the handle owns the driver and its pin-mux grant, and gives
//! both back when dropped.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod chardev;
mod context;
mod error;
pub mod gpio;
mod handle;
pub mod i2c;
mod manager;
mod pinmux;
mod registry;
mod service;
pub mod spi;
pub mod sys;
pub mod uart;

pub use chardev::{CharDevice, CharDeviceFactory, CharDeviceSource, SysCharDevice};
pub use context::{DriverParams, PeripheralContext, DEFAULT_DEV_ROOT};
pub use error::{Error, Result};
pub use pinmux::{MuxBinding, PinMux, PinMuxCallbacks, PinState};
pub use registry::{DriverFactory, DriverInfo, DriverRegistry};
pub use service::{PeripheralService, READ_MAX, SPI_TRANSFER_MAX};

/// Locks `mutex`, recovering the data if a holder panicked. Handle drops
/// must always be able to free their entry.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
