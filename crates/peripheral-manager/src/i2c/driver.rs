use crate::error::Result;

/// Kernel access for one device address on an I2C bus.
///
/// Raw transfers succeed only when the whole buffer moved. Register block
/// transfers are limited to [`I2C_BLOCK_MAX`] bytes.
pub trait I2cDriver: Send {
    fn init(&mut self, bus: u32, address: u16) -> Result<()>;

    fn read(&mut self, buf: &mut [u8]) -> Result<()>;

    fn read_reg_byte(&mut self, reg: u8) -> Result<u8>;

    fn read_reg_word(&mut self, reg: u8) -> Result<u16>;

    fn read_reg_buffer(&mut self, reg: u8, buf: &mut [u8]) -> Result<()>;

    fn write(&mut self, data: &[u8]) -> Result<()>;

    fn write_reg_byte(&mut self, reg: u8, value: u8) -> Result<()>;

    fn write_reg_word(&mut self, reg: u8, value: u16) -> Result<()>;

    fn write_reg_buffer(&mut self, reg: u8, data: &[u8]) -> Result<()>;
}

/// Largest register block transfer.
pub const I2C_BLOCK_MAX: usize = crate::sys::I2C_SMBUS_BLOCK_MAX;
