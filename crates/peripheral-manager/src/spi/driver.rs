use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sys::{SPI_CPHA, SPI_CPOL};

/// Clock polarity and phase.
#[derive(
    Debug,
    Display,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
)]
pub enum SpiMode {
    #[default]
    #[display("0")]
    Mode0,
    #[display("1")]
    Mode1,
    #[display("2")]
    Mode2,
    #[display("3")]
    Mode3,
}

impl SpiMode {
    /// The `SPI_MODE_n` bits.
    pub fn bits(self) -> u8 {
        match self {
            SpiMode::Mode0 => 0,
            SpiMode::Mode1 => SPI_CPHA,
            SpiMode::Mode2 => SPI_CPOL,
            SpiMode::Mode3 => SPI_CPOL | SPI_CPHA,
        }
    }
}

impl TryFrom<u8> for SpiMode {
    type Error = Error;

    fn try_from(mode: u8) -> Result<Self> {
        match mode {
            0 => Ok(SpiMode::Mode0),
            1 => Ok(SpiMode::Mode1),
            2 => Ok(SpiMode::Mode2),
            3 => Ok(SpiMode::Mode3),
            other => {
                Err(Error::InvalidArgument(format!("spi mode {other}")))
            }
        }
    }
}

/// Kernel access for one SPI chip select.
pub trait SpiDriver: Send {
    fn init(&mut self, bus: u32, chip_select: u32) -> Result<()>;

    /// One transfer. Either side may be absent for half-duplex; when both
    /// are present they must be the same length.
    fn transfer(
        &mut self,
        tx: Option<&[u8]>,
        rx: Option<&mut [u8]>,
    ) -> Result<()>;

    /// Requests above the device maximum are clamped to it.
    fn set_frequency(&mut self, hz: u32) -> Result<()>;

    fn frequency(&self) -> u32;

    fn set_mode(&mut self, mode: SpiMode) -> Result<()>;

    fn set_bit_justification(&mut self, lsb_first: bool) -> Result<()>;

    fn set_bits_per_word(&mut self, bits: u8) -> Result<()>;

    fn bits_per_word(&self) -> u8;

    fn set_delay(&mut self, usecs: u16) -> Result<()>;

    fn delay(&self) -> u16;
}
