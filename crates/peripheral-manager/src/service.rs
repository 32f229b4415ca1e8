//! Name-keyed facade over the managers.
//!
//! Keeps the handles callers have opened, keyed by friendly name (and
//! address for I2C), and exposes every operation as a plain call. This is
//! the surface an IPC layer maps its requests onto; [`Error::errno`] gives
//! the code to report.

use std::collections::BTreeMap;
use std::os::fd::{OwnedFd, RawFd};
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::context::PeripheralContext;
use crate::error::{Error, Result};
use crate::gpio::{ActiveType, EdgeType, GpioDirection, GpioPin, PinDirection};
use crate::i2c::{I2cDevice, I2C_BLOCK_MAX};
use crate::lock;
use crate::spi::{SpiDevice, SpiMode};
use crate::uart::UartDevice;

/// Largest SPI write or transfer accepted in one call.
pub const SPI_TRANSFER_MAX: usize = 32;

/// Largest raw I2C or UART read accepted in one call.
pub const READ_MAX: usize = 4096;

fn check_len(len: usize, max: usize, what: &str) -> Result<()> {
    if len > max {
        return Err(Error::InvalidArgument(format!(
            "{what} of {len} bytes exceeds {max}"
        )));
    }
    Ok(())
}

fn not_open(registered: bool, name: &str) -> Error {
    if registered {
        Error::NotOpen(name.to_owned())
    } else {
        Error::NotFound(name.to_owned())
    }
}

macro_rules! i2c_register_ops {
    ($($width:ident: $ty:ty),* $(,)?) => {
        paste::paste! {
            $(
                pub fn [<i2c_read_reg_ $width>](
                    &self,
                    name: &str,
                    address: u16,
                    reg: u8,
                ) -> Result<$ty> {
                    self.with_i2c(name, address, |dev| dev.[<read_reg_ $width>](reg))
                }

                pub fn [<i2c_write_reg_ $width>](
                    &self,
                    name: &str,
                    address: u16,
                    reg: u8,
                    value: $ty,
                ) -> Result<()> {
                    self.with_i2c(name, address, |dev| {
                        dev.[<write_reg_ $width>](reg, value)
                    })
                }
            )*
        }
    };
}

macro_rules! spi_setters {
    ($($field:ident: $ty:ty),* $(,)?) => {
        paste::paste! {
            $(
                pub fn [<spi_set_ $field>](&self, name: &str, value: $ty) -> Result<()> {
                    self.with_spi(name, |dev| dev.[<set_ $field>](value))
                }
            )*
        }
    };
}

/// Open handles by friendly name.
#[derive(Debug)]
pub struct PeripheralService {
    ctx: Arc<PeripheralContext>,
    gpio: Mutex<BTreeMap<String, GpioPin>>,
    i2c: Mutex<BTreeMap<(String, u16), I2cDevice>>,
    spi: Mutex<BTreeMap<String, SpiDevice>>,
    uart: Mutex<BTreeMap<String, UartDevice>>,
}

impl PeripheralService {
    pub fn new(ctx: Arc<PeripheralContext>) -> Self {
        Self {
            ctx,
            gpio: Mutex::default(),
            i2c: Mutex::default(),
            spi: Mutex::default(),
            uart: Mutex::default(),
        }
    }

    pub fn context(&self) -> &PeripheralContext {
        &self.ctx
    }

    fn with_gpio<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut GpioPin) -> Result<T>,
    ) -> Result<T> {
        match lock(&self.gpio).get_mut(name) {
            Some(pin) => f(pin),
            None => Err(not_open(self.ctx.gpio().has_gpio(name), name)),
        }
    }

    fn with_i2c<T>(
        &self,
        name: &str,
        address: u16,
        f: impl FnOnce(&mut I2cDevice) -> Result<T>,
    ) -> Result<T> {
        match lock(&self.i2c).get_mut(&(name.to_owned(), address)) {
            Some(dev) => f(dev),
            None => Err(not_open(self.ctx.i2c().has_bus(name), name)),
        }
    }

    fn with_spi<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut SpiDevice) -> Result<T>,
    ) -> Result<T> {
        match lock(&self.spi).get_mut(name) {
            Some(dev) => f(dev),
            None => Err(not_open(self.ctx.spi().has_bus(name), name)),
        }
    }

    fn with_uart<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut UartDevice) -> Result<T>,
    ) -> Result<T> {
        match lock(&self.uart).get_mut(name) {
            Some(dev) => f(dev),
            None => Err(not_open(self.ctx.uart().has_device(name), name)),
        }
    }

    // GPIO

    pub fn gpio_list(&self) -> Vec<String> {
        self.ctx.gpio().gpios()
    }

    pub fn gpio_open(&self, name: &str) -> Result<()> {
        let mut pins = lock(&self.gpio);
        if pins.contains_key(name) {
            return Err(Error::Busy(name.to_owned()));
        }
        let pin = self.ctx.gpio().open(name)?;
        pins.insert(name.to_owned(), pin);
        Ok(())
    }

    pub fn gpio_close(&self, name: &str) -> Result<()> {
        let pin = lock(&self.gpio).remove(name);
        match pin {
            Some(pin) => {
                drop(pin);
                info!(name, "gpio closed");
                Ok(())
            }
            None => Err(not_open(self.ctx.gpio().has_gpio(name), name)),
        }
    }

    pub fn gpio_set_direction(
        &self,
        name: &str,
        direction: GpioDirection,
    ) -> Result<()> {
        self.with_gpio(name, |pin| pin.set_direction(direction))
    }

    pub fn gpio_get_direction(&self, name: &str) -> Result<PinDirection> {
        self.with_gpio(name, |pin| pin.direction())
    }

    pub fn gpio_set_value(&self, name: &str, high: bool) -> Result<()> {
        self.with_gpio(name, |pin| pin.set_value(high))
    }

    pub fn gpio_get_value(&self, name: &str) -> Result<bool> {
        self.with_gpio(name, |pin| pin.value())
    }

    pub fn gpio_set_edge_trigger(&self, name: &str, edge: EdgeType) -> Result<()> {
        self.with_gpio(name, |pin| pin.set_edge_trigger(edge))
    }

    pub fn gpio_set_active_type(
        &self,
        name: &str,
        active: ActiveType,
    ) -> Result<()> {
        self.with_gpio(name, |pin| pin.set_active_type(active))
    }

    pub fn gpio_get_polling_fd(&self, name: &str) -> Result<OwnedFd> {
        self.with_gpio(name, |pin| pin.polling_fd())
    }

    // I2C

    pub fn i2c_list_buses(&self) -> Vec<String> {
        self.ctx.i2c().buses()
    }

    pub fn i2c_open(&self, name: &str, address: u16) -> Result<()> {
        let mut devices = lock(&self.i2c);
        let key = (name.to_owned(), address);
        if devices.contains_key(&key) {
            return Err(Error::Busy(format!("{name}@{address:#04x}")));
        }
        let dev = self.ctx.i2c().open(name, address)?;
        devices.insert(key, dev);
        Ok(())
    }

    pub fn i2c_close(&self, name: &str, address: u16) -> Result<()> {
        let dev = lock(&self.i2c).remove(&(name.to_owned(), address));
        match dev {
            Some(dev) => {
                drop(dev);
                info!(name, address, "i2c device closed");
                Ok(())
            }
            None => Err(not_open(self.ctx.i2c().has_bus(name), name)),
        }
    }

    pub fn i2c_read(&self, name: &str, address: u16, size: usize) -> Result<Vec<u8>> {
        check_len(size, READ_MAX, "i2c read")?;
        self.with_i2c(name, address, |dev| {
            let mut buf = vec![0; size];
            dev.read(&mut buf)?;
            Ok(buf)
        })
    }

    pub fn i2c_write(&self, name: &str, address: u16, data: &[u8]) -> Result<()> {
        self.with_i2c(name, address, |dev| dev.write(data))
    }

    i2c_register_ops!(byte: u8, word: u16);

    /// `size` is at most [`I2C_BLOCK_MAX`].
    pub fn i2c_read_reg_buffer(
        &self,
        name: &str,
        address: u16,
        reg: u8,
        size: usize,
    ) -> Result<Vec<u8>> {
        check_len(size, I2C_BLOCK_MAX, "i2c block read")?;
        self.with_i2c(name, address, |dev| {
            let mut buf = vec![0; size];
            dev.read_reg_buffer(reg, &mut buf)?;
            Ok(buf)
        })
    }

    pub fn i2c_write_reg_buffer(
        &self,
        name: &str,
        address: u16,
        reg: u8,
        data: &[u8],
    ) -> Result<()> {
        self.with_i2c(name, address, |dev| dev.write_reg_buffer(reg, data))
    }

    // SPI

    pub fn spi_list_buses(&self) -> Vec<String> {
        self.ctx.spi().buses()
    }

    pub fn spi_open(&self, name: &str) -> Result<()> {
        let mut devices = lock(&self.spi);
        if devices.contains_key(name) {
            return Err(Error::Busy(name.to_owned()));
        }
        let dev = self.ctx.spi().open(name)?;
        devices.insert(name.to_owned(), dev);
        Ok(())
    }

    pub fn spi_close(&self, name: &str) -> Result<()> {
        let dev = lock(&self.spi).remove(name);
        match dev {
            Some(dev) => {
                drop(dev);
                info!(name, "spi device closed");
                Ok(())
            }
            None => Err(not_open(self.ctx.spi().has_bus(name), name)),
        }
    }

    pub fn spi_write_byte(&self, name: &str, byte: u8) -> Result<()> {
        self.with_spi(name, |dev| dev.write_byte(byte))
    }

    pub fn spi_write_buffer(&self, name: &str, data: &[u8]) -> Result<()> {
        check_len(data.len(), SPI_TRANSFER_MAX, "spi write")?;
        self.with_spi(name, |dev| dev.write_buffer(data))
    }

    /// Clocks `tx` out and returns what was clocked in.
    pub fn spi_transfer(&self, name: &str, tx: &[u8]) -> Result<Vec<u8>> {
        check_len(tx.len(), SPI_TRANSFER_MAX, "spi transfer")?;
        self.with_spi(name, |dev| {
            let mut rx = vec![0; tx.len()];
            dev.transfer(tx, &mut rx)?;
            Ok(rx)
        })
    }

    /// `mode` is 0 to 3.
    pub fn spi_set_mode(&self, name: &str, mode: u8) -> Result<()> {
        let mode = SpiMode::try_from(mode)?;
        self.with_spi(name, |dev| dev.set_mode(mode))
    }

    spi_setters!(frequency: u32, bit_justification: bool, bits_per_word: u8);

    pub fn spi_set_delay(&self, name: &str, usecs: u32) -> Result<()> {
        let usecs = u16::try_from(usecs).map_err(|_| {
            Error::InvalidArgument(format!("spi delay of {usecs}us"))
        })?;
        self.with_spi(name, |dev| dev.set_delay(usecs))
    }

    pub fn spi_get_frequency(&self, name: &str) -> Result<u32> {
        self.with_spi(name, |dev| dev.frequency())
    }

    // UART

    pub fn uart_list(&self) -> Vec<String> {
        self.ctx.uart().devices()
    }

    pub fn uart_open(&self, name: &str, canonical: bool) -> Result<()> {
        let mut devices = lock(&self.uart);
        if devices.contains_key(name) {
            return Err(Error::Busy(name.to_owned()));
        }
        let dev = self.ctx.uart().open(name, canonical)?;
        devices.insert(name.to_owned(), dev);
        Ok(())
    }

    pub fn uart_close(&self, name: &str) -> Result<()> {
        let dev = lock(&self.uart).remove(name);
        match dev {
            Some(dev) => {
                drop(dev);
                info!(name, "uart closed");
                Ok(())
            }
            None => Err(not_open(self.ctx.uart().has_device(name), name)),
        }
    }

    pub fn uart_set_baudrate(&self, name: &str, baudrate: u32) -> Result<()> {
        self.with_uart(name, |dev| dev.set_baudrate(baudrate))
    }

    pub fn uart_get_baudrate(&self, name: &str) -> Result<u32> {
        self.with_uart(name, |dev| dev.baudrate())
    }

    pub fn uart_write(&self, name: &str, data: &[u8]) -> Result<usize> {
        self.with_uart(name, |dev| dev.write(data))
    }

    /// Up to `size` bytes; fewer when less is buffered.
    pub fn uart_read(&self, name: &str, size: usize) -> Result<Vec<u8>> {
        check_len(size, READ_MAX, "uart read")?;
        self.with_uart(name, |dev| {
            let mut buf = vec![0; size];
            let n = dev.read(&mut buf)?;
            buf.truncate(n);
            Ok(buf)
        })
    }

    pub fn uart_get_polling_fd(&self, name: &str) -> Result<RawFd> {
        self.with_uart(name, |dev| dev.polling_fd())
    }
}
