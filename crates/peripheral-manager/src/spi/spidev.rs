//! The spidev character device (`/dev/spidevB.C`).

use std::os::raw::c_void;
use std::path::PathBuf;

use libc::Ioctl;
use tracing::{debug, error};

use super::driver::{SpiDriver, SpiMode};
use crate::chardev::{new_char_device, CharDeviceSource, OpenDevice};
use crate::error::{Error, Result};
use crate::sys::{
    spi_ioc_message, SpiIocTransfer, SPI_IOC_RD_MAX_SPEED_HZ,
    SPI_IOC_WR_BITS_PER_WORD, SPI_IOC_WR_LSB_FIRST, SPI_IOC_WR_MODE,
};

const DEFAULT_BITS_PER_WORD: u8 = 8;

pub struct SpiDriverSpiDev {
    dev_root: PathBuf,
    source: CharDeviceSource,
    device: Option<OpenDevice>,
    speed_hz: u32,
    bits_per_word: u8,
    delay_usecs: u16,
}

impl SpiDriverSpiDev {
    pub const COMPAT: &'static str = "SPIDEV";

    pub fn new(dev_root: impl Into<PathBuf>, source: CharDeviceSource) -> Self {
        Self {
            dev_root: dev_root.into(),
            source,
            device: None,
            speed_hz: 0,
            bits_per_word: DEFAULT_BITS_PER_WORD,
            delay_usecs: 0,
        }
    }

    fn device(&mut self) -> Result<&mut OpenDevice> {
        self.device
            .as_mut()
            .ok_or_else(|| Error::NotOpen("spi driver".into()))
    }

    fn max_frequency(device: &mut OpenDevice) -> Result<u32> {
        let mut hz: u32 = 0;
        // SAFETY: SPI_IOC_RD_MAX_SPEED_HZ writes one u32.
        unsafe {
            device.ioctl(SPI_IOC_RD_MAX_SPEED_HZ, &mut hz as *mut u32 as *mut c_void)
        }
        .map_err(|e| {
            error!(error = %e, "failed to read spi max frequency");
            Error::RemoteIo(e)
        })?;
        Ok(hz)
    }

    fn write_u8(&mut self, request: Ioctl, value: u8, what: &str) -> Result<()> {
        let mut value = value;
        let device = self.device()?;
        // SAFETY: the write requests used here read one u8.
        unsafe { device.ioctl(request, &mut value as *mut u8 as *mut c_void) }
            .map_err(|e| {
                error!(error = %e, "failed to set spi {what}");
                Error::RemoteIo(e)
            })?;
        Ok(())
    }
}

impl SpiDriver for SpiDriverSpiDev {
    fn init(&mut self, bus: u32, chip_select: u32) -> Result<()> {
        if self.device.is_some() {
            return Err(Error::Busy("spi driver already bound".into()));
        }
        let path = self.dev_root.join(format!("spidev{bus}.{chip_select}"));
        let mut device = OpenDevice::open(
            new_char_device(&self.source),
            &path,
            libc::O_RDWR,
        )?;
        let max = Self::max_frequency(&mut device)?;
        debug!(bus, chip_select, max_hz = max, "spidev opened");
        self.speed_hz = max;
        self.bits_per_word = DEFAULT_BITS_PER_WORD;
        self.delay_usecs = 0;
        self.device = Some(device);
        Ok(())
    }

    fn transfer(
        &mut self,
        tx: Option<&[u8]>,
        rx: Option<&mut [u8]>,
    ) -> Result<()> {
        let len = match (&tx, &rx) {
            (Some(tx), Some(rx)) if tx.len() != rx.len() => {
                return Err(Error::InvalidArgument(format!(
                    "spi tx of {} bytes with rx of {} bytes",
                    tx.len(),
                    rx.len()
                )));
            }
            (Some(tx), _) => tx.len(),
            (None, Some(rx)) => rx.len(),
            (None, None) => {
                return Err(Error::InvalidArgument(
                    "spi transfer without buffers".into(),
                ));
            }
        };
        let len = u32::try_from(len).map_err(|_| {
            Error::InvalidArgument(format!("spi transfer of {len} bytes"))
        })?;

        let mut msg = SpiIocTransfer {
            tx_buf: tx.map_or(0, |tx| tx.as_ptr() as u64),
            rx_buf: rx.map_or(0, |rx| rx.as_mut_ptr() as u64),
            len,
            speed_hz: self.speed_hz,
            delay_usecs: self.delay_usecs,
            bits_per_word: self.bits_per_word,
            ..Default::default()
        };
        let device = self.device()?;
        // SAFETY: `msg` is one `struct spi_ioc_transfer` whose buffers are
        // live for `len` bytes until the call returns.
        unsafe {
            device.ioctl(
                spi_ioc_message(1),
                &mut msg as *mut SpiIocTransfer as *mut c_void,
            )
        }
        .map_err(|e| {
            error!(error = %e, "spi transfer failed");
            Error::RemoteIo(e)
        })?;
        Ok(())
    }

    fn set_frequency(&mut self, hz: u32) -> Result<()> {
        let max = Self::max_frequency(self.device()?)?;
        self.speed_hz = hz.min(max);
        Ok(())
    }

    fn frequency(&self) -> u32 {
        self.speed_hz
    }

    fn set_mode(&mut self, mode: SpiMode) -> Result<()> {
        self.write_u8(SPI_IOC_WR_MODE, mode.bits(), "mode")
    }

    fn set_bit_justification(&mut self, lsb_first: bool) -> Result<()> {
        self.write_u8(SPI_IOC_WR_LSB_FIRST, u8::from(lsb_first), "bit justification")
    }

    fn set_bits_per_word(&mut self, bits: u8) -> Result<()> {
        self.write_u8(SPI_IOC_WR_BITS_PER_WORD, bits, "bits per word")?;
        self.bits_per_word = bits;
        Ok(())
    }

    fn bits_per_word(&self) -> u8 {
        self.bits_per_word
    }

    fn set_delay(&mut self, usecs: u16) -> Result<()> {
        self.delay_usecs = usecs;
        Ok(())
    }

    fn delay(&self) -> u16 {
        self.delay_usecs
    }
}
