use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use peripheral_manager::gpio::{ActiveType, EdgeType, GpioDirection};

#[derive(Parser)]
#[command(author, version, about = "Drive board peripherals by friendly name", long_about = None)]
pub struct Cli {
    /// Board description (JSON). Defaults to the built-in rpi board.
    #[arg(long, global = true)]
    pub board: Option<PathBuf>,

    /// Root of the sysfs GPIO class directory
    #[arg(long, global = true, default_value = peripheral_manager::gpio::DEFAULT_SYSFS_ROOT)]
    pub sysfs_root: PathBuf,

    /// Directory holding the i2c-dev and spidev nodes
    #[arg(long, global = true, default_value = peripheral_manager::DEFAULT_DEV_ROOT)]
    pub dev_root: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List every registered peripheral and the pin-mux state
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// GPIO lines
    #[command(subcommand)]
    Gpio(GpioCommand),
    /// I2C devices
    #[command(subcommand)]
    I2c(I2cCommand),
    /// SPI buses
    #[command(subcommand)]
    Spi(SpiCommand),
    /// UARTs
    #[command(subcommand)]
    Uart(UartCommand),
}

#[derive(Subcommand)]
pub enum GpioCommand {
    /// Print the line level
    Get { name: String },
    /// Drive the line; switches it to output first
    Set {
        name: String,
        #[arg(action = ArgAction::Set, value_parser = parse_level)]
        high: bool,
        #[arg(long, value_enum)]
        active: Option<Active>,
    },
    /// Print the direction, or set it
    Direction {
        name: String,
        #[arg(value_enum)]
        direction: Option<Direction>,
        #[arg(long, value_enum)]
        edge: Option<Edge>,
    },
}

#[derive(Subcommand)]
pub enum I2cCommand {
    /// Raw read of `size` bytes
    Read {
        bus: String,
        #[arg(value_parser = parse_address)]
        address: u16,
        size: usize,
    },
    /// Read a register: a byte by default
    ReadReg {
        bus: String,
        #[arg(value_parser = parse_address)]
        address: u16,
        #[arg(value_parser = parse_byte)]
        reg: u8,
        #[arg(long, conflicts_with = "size")]
        word: bool,
        /// Block read of this many bytes
        #[arg(long)]
        size: Option<usize>,
    },
    /// Write one or more bytes starting at a register
    WriteReg {
        bus: String,
        #[arg(value_parser = parse_address)]
        address: u16,
        #[arg(value_parser = parse_byte)]
        reg: u8,
        #[arg(required = true, value_parser = parse_byte)]
        data: Vec<u8>,
    },
}

#[derive(Subcommand)]
pub enum SpiCommand {
    /// Full-duplex transfer; prints the received bytes
    Transfer {
        bus: String,
        #[arg(required = true, value_parser = parse_byte)]
        data: Vec<u8>,
        #[arg(long)]
        mode: Option<u8>,
        #[arg(long)]
        hz: Option<u32>,
    },
}

#[derive(Subcommand)]
pub enum UartCommand {
    Write {
        name: String,
        text: String,
        #[arg(long)]
        baud: Option<u32>,
    },
    /// Read whatever is buffered, up to `size` bytes
    Read {
        name: String,
        size: usize,
        #[arg(long)]
        baud: Option<u32>,
    },
    /// Print the baud rate, or set it
    Baud { name: String, rate: Option<u32> },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Direction {
    In,
    High,
    Low,
}

impl From<Direction> for GpioDirection {
    fn from(d: Direction) -> Self {
        match d {
            Direction::In => GpioDirection::In,
            Direction::High => GpioDirection::OutInitiallyHigh,
            Direction::Low => GpioDirection::OutInitiallyLow,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Edge {
    None,
    Rising,
    Falling,
    Both,
}

impl From<Edge> for EdgeType {
    fn from(e: Edge) -> Self {
        match e {
            Edge::None => EdgeType::None,
            Edge::Rising => EdgeType::Rising,
            Edge::Falling => EdgeType::Falling,
            Edge::Both => EdgeType::Both,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Active {
    Low,
    High,
}

impl From<Active> for ActiveType {
    fn from(a: Active) -> Self {
        match a {
            Active::Low => ActiveType::ActiveLow,
            Active::High => ActiveType::ActiveHigh,
        }
    }
}

fn parse_int(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("`{s}`: {e}"))
}

/// Decimal, or hex with a `0x` prefix.
pub fn parse_byte(s: &str) -> Result<u8, String> {
    let v = parse_int(s)?;
    u8::try_from(v).map_err(|_| format!("`{s}` does not fit in a byte"))
}

pub fn parse_address(s: &str) -> Result<u16, String> {
    let v = parse_int(s)?;
    u16::try_from(v).map_err(|_| format!("`{s}` is not an i2c address"))
}

pub fn parse_level(s: &str) -> Result<bool, String> {
    match s {
        "1" | "high" | "on" => Ok(true),
        "0" | "low" | "off" => Ok(false),
        _ => Err(format!("`{s}` is not a level (0/1, low/high)")),
    }
}
