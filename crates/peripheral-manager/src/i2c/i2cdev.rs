//! The i2c-dev character device (`/dev/i2c-N`).

use std::os::raw::c_void;
use std::path::PathBuf;

use tracing::error;

use super::driver::{I2cDriver, I2C_BLOCK_MAX};
use crate::chardev::{new_char_device, CharDeviceSource, OpenDevice};
use crate::error::{Error, Result};
use crate::sys::{
    I2cSmbusData, I2cSmbusIoctlData, I2C_SLAVE, I2C_SMBUS,
    I2C_SMBUS_BYTE_DATA, I2C_SMBUS_I2C_BLOCK_DATA, I2C_SMBUS_READ,
    I2C_SMBUS_WORD_DATA, I2C_SMBUS_WRITE,
};

pub struct I2cDriverI2cDev {
    dev_root: PathBuf,
    source: CharDeviceSource,
    device: Option<OpenDevice>,
}

impl I2cDriverI2cDev {
    pub const COMPAT: &'static str = "I2CDEV";

    pub fn new(dev_root: impl Into<PathBuf>, source: CharDeviceSource) -> Self {
        Self { dev_root: dev_root.into(), source, device: None }
    }

    fn device(&mut self) -> Result<&mut OpenDevice> {
        self.device
            .as_mut()
            .ok_or_else(|| Error::NotOpen("i2c driver".into()))
    }

    fn smbus(
        &mut self,
        read_write: u8,
        command: u8,
        size: u32,
        data: &mut I2cSmbusData,
    ) -> Result<()> {
        let mut args = I2cSmbusIoctlData {
            read_write,
            command,
            size,
            data: data as *mut I2cSmbusData,
        };
        let device = self.device()?;
        // SAFETY: `args` and the union it points to outlive the call and
        // match `struct i2c_smbus_ioctl_data`.
        unsafe {
            device.ioctl(I2C_SMBUS, &mut args as *mut _ as *mut c_void)
        }
        .map_err(|e| {
            error!(command, size, error = %e, "I2C_SMBUS failed");
            Error::RemoteIo(e)
        })?;
        Ok(())
    }
}

fn check_block(len: usize) -> Result<()> {
    if len > I2C_BLOCK_MAX {
        error!(len, "i2c block transfer above {I2C_BLOCK_MAX} bytes");
        return Err(Error::InvalidArgument(format!(
            "i2c block of {len} bytes exceeds {I2C_BLOCK_MAX}"
        )));
    }
    Ok(())
}

fn check_count(moved: usize, wanted: usize) -> Result<()> {
    if moved != wanted {
        return Err(Error::io_failure("short i2c transfer"));
    }
    Ok(())
}

impl I2cDriver for I2cDriverI2cDev {
    fn init(&mut self, bus: u32, address: u16) -> Result<()> {
        if self.device.is_some() {
            return Err(Error::Busy("i2c driver already bound".into()));
        }
        let path = self.dev_root.join(format!("i2c-{bus}"));
        let mut device = OpenDevice::open(
            new_char_device(&self.source),
            &path,
            libc::O_RDWR,
        )?;
        // SAFETY: I2C_SLAVE takes the address itself, not a pointer.
        unsafe { device.ioctl(I2C_SLAVE, usize::from(address) as *mut c_void) }
            .map_err(|e| {
                error!(bus, address, error = %e, "failed to set I2C slave");
                Error::RemoteIo(e)
            })?;
        self.device = Some(device);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        let n = self.device()?.read(buf)?;
        check_count(n, buf.len())
    }

    fn read_reg_byte(&mut self, reg: u8) -> Result<u8> {
        let mut data = I2cSmbusData::default();
        self.smbus(I2C_SMBUS_READ, reg, I2C_SMBUS_BYTE_DATA, &mut data)?;
        // SAFETY: every bit pattern is a valid `u8`.
        Ok(unsafe { data.byte })
    }

    fn read_reg_word(&mut self, reg: u8) -> Result<u16> {
        let mut data = I2cSmbusData::default();
        self.smbus(I2C_SMBUS_READ, reg, I2C_SMBUS_WORD_DATA, &mut data)?;
        // SAFETY: every bit pattern is a valid `u16`.
        Ok(unsafe { data.word })
    }

    fn read_reg_buffer(&mut self, reg: u8, buf: &mut [u8]) -> Result<()> {
        check_block(buf.len())?;
        let mut block = [0u8; I2C_BLOCK_MAX + 2];
        block[0] = buf.len() as u8;
        let mut data = I2cSmbusData { block };
        self.smbus(I2C_SMBUS_READ, reg, I2C_SMBUS_I2C_BLOCK_DATA, &mut data)?;
        // SAFETY: the block view covers the whole union.
        let block = unsafe { data.block };
        buf.copy_from_slice(&block[1..=buf.len()]);
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let n = self.device()?.write(data)?;
        check_count(n, data.len())
    }

    fn write_reg_byte(&mut self, reg: u8, value: u8) -> Result<()> {
        let mut data = I2cSmbusData { byte: value };
        self.smbus(I2C_SMBUS_WRITE, reg, I2C_SMBUS_BYTE_DATA, &mut data)
    }

    fn write_reg_word(&mut self, reg: u8, value: u16) -> Result<()> {
        let mut data = I2cSmbusData { word: value };
        self.smbus(I2C_SMBUS_WRITE, reg, I2C_SMBUS_WORD_DATA, &mut data)
    }

    fn write_reg_buffer(&mut self, reg: u8, data: &[u8]) -> Result<()> {
        check_block(data.len())?;
        let mut block = [0u8; I2C_BLOCK_MAX + 2];
        block[0] = data.len() as u8;
        block[1..=data.len()].copy_from_slice(data);
        let mut data = I2cSmbusData { block };
        self.smbus(I2C_SMBUS_WRITE, reg, I2C_SMBUS_I2C_BLOCK_DATA, &mut data)
    }
}
