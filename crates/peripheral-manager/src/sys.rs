//! Kernel ABI for the i2c-dev and spidev character devices.
//!
//! Layouts mirror `<linux/i2c.h>`, `<linux/i2c-dev.h>` and
//! `<linux/spi/spidev.h>`. The tty requests come straight from `libc`.

use libc::Ioctl;

pub const I2C_SLAVE: Ioctl = 0x0703;
pub const I2C_SMBUS: Ioctl = 0x0720;

pub const I2C_SMBUS_READ: u8 = 1;
pub const I2C_SMBUS_WRITE: u8 = 0;

pub const I2C_SMBUS_BYTE_DATA: u32 = 2;
pub const I2C_SMBUS_WORD_DATA: u32 = 3;
pub const I2C_SMBUS_I2C_BLOCK_DATA: u32 = 8;

/// Largest payload of a single SMBus block transaction.
pub const I2C_SMBUS_BLOCK_MAX: usize = 32;

/// `union i2c_smbus_data`. `block[0]` carries the length.
#[repr(C)]
#[derive(Clone, Copy)]
pub union I2cSmbusData {
    pub byte: u8,
    pub word: u16,
    pub block: [u8; I2C_SMBUS_BLOCK_MAX + 2],
}

impl Default for I2cSmbusData {
    fn default() -> Self {
        I2cSmbusData { block: [0; I2C_SMBUS_BLOCK_MAX + 2] }
    }
}

/// `struct i2c_smbus_ioctl_data`, the argument of [`I2C_SMBUS`].
#[repr(C)]
pub struct I2cSmbusIoctlData {
    pub read_write: u8,
    pub command: u8,
    pub size: u32,
    pub data: *mut I2cSmbusData,
}

const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;

const IOC_NRSHIFT: u32 = 0;
const IOC_TYPESHIFT: u32 = 8;
const IOC_SIZESHIFT: u32 = 16;
const IOC_DIRSHIFT: u32 = 30;

const fn ioc(dir: u32, ty: u8, nr: u8, size: usize) -> Ioctl {
    ((dir << IOC_DIRSHIFT)
        | ((size as u32) << IOC_SIZESHIFT)
        | ((ty as u32) << IOC_TYPESHIFT)
        | ((nr as u32) << IOC_NRSHIFT)) as Ioctl
}

pub const SPI_IOC_MAGIC: u8 = b'k';

pub const SPI_CPHA: u8 = 0x01;
pub const SPI_CPOL: u8 = 0x02;

pub const SPI_IOC_RD_MODE: Ioctl = ioc(IOC_READ, SPI_IOC_MAGIC, 1, 1);
pub const SPI_IOC_WR_MODE: Ioctl = ioc(IOC_WRITE, SPI_IOC_MAGIC, 1, 1);
pub const SPI_IOC_RD_LSB_FIRST: Ioctl = ioc(IOC_READ, SPI_IOC_MAGIC, 2, 1);
pub const SPI_IOC_WR_LSB_FIRST: Ioctl = ioc(IOC_WRITE, SPI_IOC_MAGIC, 2, 1);
pub const SPI_IOC_RD_BITS_PER_WORD: Ioctl =
    ioc(IOC_READ, SPI_IOC_MAGIC, 3, 1);
pub const SPI_IOC_WR_BITS_PER_WORD: Ioctl =
    ioc(IOC_WRITE, SPI_IOC_MAGIC, 3, 1);
pub const SPI_IOC_RD_MAX_SPEED_HZ: Ioctl =
    ioc(IOC_READ, SPI_IOC_MAGIC, 4, 4);
pub const SPI_IOC_WR_MAX_SPEED_HZ: Ioctl =
    ioc(IOC_WRITE, SPI_IOC_MAGIC, 4, 4);

/// `struct spi_ioc_transfer`. Buffers are user-space addresses widened to
/// 64 bits regardless of the host word size.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SpiIocTransfer {
    pub tx_buf: u64,
    pub rx_buf: u64,
    pub len: u32,
    pub speed_hz: u32,
    pub delay_usecs: u16,
    pub bits_per_word: u8,
    pub cs_change: u8,
    pub tx_nbits: u8,
    pub rx_nbits: u8,
    pub word_delay_usecs: u8,
    pub pad: u8,
}

/// `SPI_IOC_MESSAGE(n)`.
pub const fn spi_ioc_message(n: usize) -> Ioctl {
    ioc(
        IOC_WRITE,
        SPI_IOC_MAGIC,
        0,
        n * core::mem::size_of::<SpiIocTransfer>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spidev_requests_match_kernel_headers() {
        assert_eq!(SPI_IOC_WR_MODE as u32, 0x4001_6b01);
        assert_eq!(SPI_IOC_RD_MODE as u32, 0x8001_6b01);
        assert_eq!(SPI_IOC_WR_LSB_FIRST as u32, 0x4001_6b02);
        assert_eq!(SPI_IOC_WR_BITS_PER_WORD as u32, 0x4001_6b03);
        assert_eq!(SPI_IOC_RD_MAX_SPEED_HZ as u32, 0x8004_6b04);
        assert_eq!(spi_ioc_message(1) as u32, 0x4020_6b00);
    }

    #[test]
    fn struct_layouts() {
        assert_eq!(core::mem::size_of::<SpiIocTransfer>(), 32);
        assert_eq!(core::mem::size_of::<I2cSmbusData>(), 34);
        assert_eq!(core::mem::align_of::<I2cSmbusData>(), 2);
    }
}
