use std::os::fd::RawFd;
use std::path::Path;

use crate::error::Result;

/// Standard line rates. Anything else is rejected.
pub const BAUD_RATES: [u32; 19] = [
    0, 50, 75, 110, 134, 150, 200, 300, 600, 1200, 1800, 2400, 4800, 9600,
    19200, 38400, 57600, 115200, 230400,
];

/// Kernel access for one serial line.
pub trait UartDriver: Send {
    /// Opens `path`. Non-canonical lines are opened non-blocking and put
    /// in raw mode.
    fn init(&mut self, path: &Path, canonical: bool) -> Result<()>;

    fn set_baudrate(&mut self, baudrate: u32) -> Result<()>;

    fn baudrate(&mut self) -> Result<u32>;

    /// Returns the number of bytes the kernel accepted.
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Returns [`Error::WouldBlock`](crate::Error::WouldBlock) when a
    /// non-blocking line has nothing buffered.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Valid while the driver is bound.
    fn polling_fd(&self) -> Result<RawFd>;
}
