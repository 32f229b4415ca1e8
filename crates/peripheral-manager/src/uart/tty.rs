//! Serial lines through the tty layer.

use std::io;
use std::mem::MaybeUninit;
use std::os::fd::RawFd;
use std::os::raw::c_void;
use std::path::Path;

use libc::{speed_t, termios};
use tracing::{debug, error};

use super::driver::{UartDriver, BAUD_RATES};
use crate::chardev::{new_char_device, CharDeviceSource, OpenDevice};
use crate::error::{Error, Result};

/// Kernel codes for [`BAUD_RATES`], index for index.
const SPEED_CODES: [speed_t; BAUD_RATES.len()] = [
    libc::B0,
    libc::B50,
    libc::B75,
    libc::B110,
    libc::B134,
    libc::B150,
    libc::B200,
    libc::B300,
    libc::B600,
    libc::B1200,
    libc::B1800,
    libc::B2400,
    libc::B4800,
    libc::B9600,
    libc::B19200,
    libc::B38400,
    libc::B57600,
    libc::B115200,
    libc::B230400,
];

fn speed_for(baudrate: u32) -> Option<speed_t> {
    BAUD_RATES
        .iter()
        .position(|&rate| rate == baudrate)
        .map(|i| SPEED_CODES[i])
}

fn baudrate_for(speed: speed_t) -> Option<u32> {
    SPEED_CODES
        .iter()
        .position(|&code| code == speed)
        .map(|i| BAUD_RATES[i])
}

fn get_config(device: &mut OpenDevice) -> io::Result<termios> {
    let mut config = MaybeUninit::<termios>::zeroed();
    // SAFETY: TCGETS fills a `struct termios`.
    unsafe { device.ioctl(libc::TCGETS, config.as_mut_ptr() as *mut c_void) }?;
    // SAFETY: zeroed is a valid termios and the kernel only overwrote it.
    Ok(unsafe { config.assume_init() })
}

fn set_config(
    device: &mut OpenDevice,
    request: libc::Ioctl,
    config: &mut termios,
) -> io::Result<()> {
    // SAFETY: TCSETS and TCSETSF read a `struct termios`.
    unsafe { device.ioctl(request, config as *mut termios as *mut c_void) }?;
    Ok(())
}

/// 8N1, local, receiver on, parity errors ignored, reads return at once.
fn make_canonical(config: &mut termios) {
    config.c_cflag = libc::CS8 | libc::CLOCAL | libc::CREAD;
    config.c_lflag |= libc::ICANON;
    config.c_iflag = libc::IGNPAR;
    config.c_oflag = 0;
    config.c_cc[libc::VMIN] = 0;
    config.c_cc[libc::VTIME] = 0;
}

pub struct UartDriverTty {
    source: CharDeviceSource,
    device: Option<OpenDevice>,
}

impl UartDriverTty {
    pub const COMPAT: &'static str = "UARTDEV";

    pub fn new(source: CharDeviceSource) -> Self {
        Self { source, device: None }
    }

    fn device(&mut self) -> Result<&mut OpenDevice> {
        self.device
            .as_mut()
            .ok_or_else(|| Error::NotOpen("uart driver".into()))
    }
}

impl UartDriver for UartDriverTty {
    fn init(&mut self, path: &Path, canonical: bool) -> Result<()> {
        if self.device.is_some() {
            return Err(Error::Busy("uart driver already bound".into()));
        }
        let flags = if canonical {
            libc::O_RDWR
        } else {
            libc::O_RDWR | libc::O_NONBLOCK
        };
        let mut device =
            OpenDevice::open(new_char_device(&self.source), path, flags)
                .inspect_err(|e| {
                    error!(path = %path.display(), error = %e, "failed to open uart")
                })?;

        let mut config = get_config(&mut device).inspect_err(|e| {
            error!(path = %path.display(), error = %e, "failed to read tty config")
        })?;
        if canonical {
            make_canonical(&mut config);
        } else {
            // SAFETY: `config` is an initialized termios.
            unsafe { libc::cfmakeraw(&mut config) };
        }
        set_config(&mut device, libc::TCSETSF, &mut config).inspect_err(|e| {
            error!(path = %path.display(), error = %e, "failed to configure tty")
        })?;

        debug!(path = %path.display(), canonical, "uart opened");
        self.device = Some(device);
        Ok(())
    }

    fn set_baudrate(&mut self, baudrate: u32) -> Result<()> {
        let speed = speed_for(baudrate).ok_or_else(|| {
            Error::InvalidArgument(format!("unsupported baud rate {baudrate}"))
        })?;
        let device = self.device()?;
        let mut config = get_config(device)?;
        // SAFETY: `config` is an initialized termios.
        if unsafe { libc::cfsetspeed(&mut config, speed) } != 0 {
            return Err(Error::RemoteIo(io::Error::last_os_error()));
        }
        set_config(device, libc::TCSETS, &mut config).map_err(|e| {
            error!(baudrate, error = %e, "failed to set baud rate");
            Error::RemoteIo(e)
        })
    }

    fn baudrate(&mut self) -> Result<u32> {
        let config = get_config(self.device()?)?;
        // SAFETY: `config` is an initialized termios.
        let speed = unsafe { libc::cfgetospeed(&config) };
        baudrate_for(speed).ok_or_else(|| {
            Error::io_failure(&format!("non-standard line speed {speed:#o}"))
        })
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.device()?.write(data).map_err(|e| {
            error!(error = %e, "failed to write to uart");
            Error::RemoteIo(e)
        })
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.device()?.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                Err(Error::WouldBlock)
            }
            Err(e) => {
                error!(error = %e, "failed to read from uart");
                Err(Error::RemoteIo(e))
            }
        }
    }

    fn polling_fd(&self) -> Result<RawFd> {
        self.device
            .as_ref()
            .map(OpenDevice::fd)
            .ok_or_else(|| Error::NotOpen("uart driver".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_table_maps_both_ways() {
        for rate in BAUD_RATES {
            let code = speed_for(rate).unwrap();
            assert_eq!(baudrate_for(code), Some(rate));
        }
        assert_eq!(speed_for(9600), Some(libc::B9600));
        assert_eq!(speed_for(460_800), None);
    }
}
