//! Raspberry Pi 40-pin header, as exposed by the stock kernel: sysfs GPIO,
//! i2c-dev on buses 1 and 4, spidev0.0 and the PL011 on `/dev/ttyAMA0`.

use super::{Board, GpioSpec, GroupSpec, I2cSpec, MuxSpec, PinSpec, SpiSpec, UartSpec};

pub const NAME: &str = "rpi";

/// BCM lines exported through sysfs.
pub const SYSFS_GPIOS: [u32; 15] =
    [4, 5, 6, 12, 13, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25];

/// Header pins that carry an alternate function.
pub const MUXED_PINS: [u32; 10] = [1, 2, 3, 7, 8, 9, 10, 11, 14, 15];

fn pin(n: u32) -> String {
    format!("gpio{n}")
}

fn simple(name: &str, pins: &[u32]) -> GroupSpec {
    GroupSpec { name: name.to_owned(), pins: pins.iter().copied().map(pin).collect() }
}

fn mux(source: &str) -> Option<MuxSpec> {
    Some(MuxSpec { source: source.to_owned(), group: None })
}

pub fn board() -> Board {
    Board {
        name: NAME.to_owned(),
        pins: MUXED_PINS
            .iter()
            .map(|&n| PinSpec { name: pin(n), gpio: true })
            .collect(),
        // I2C4 shares gpio7 with SPI00 and needs gpio6, which is a plain
        // sysfs line here, so its registration is skipped.
        simple_sources: vec![
            simple("UART1", &[14, 15]),
            simple("I2C1", &[2, 3]),
            simple("I2C4", &[6, 7]),
            simple("SPI00", &[7, 8, 9, 10, 11]),
        ],
        gpio: SYSFS_GPIOS
            .iter()
            .map(|&n| GpioSpec { name: pin(n), index: n, mux: None })
            .collect(),
        i2c: vec![
            I2cSpec { name: "I2C1".to_owned(), bus: 1, mux: mux("I2C1") },
            I2cSpec { name: "I2C4".to_owned(), bus: 4, mux: None },
        ],
        spi: vec![SpiSpec {
            name: "SPI00".to_owned(),
            bus: 0,
            chip_select: 0,
            mux: mux("SPI00"),
        }],
        uart: vec![UartSpec {
            name: "UART1".to_owned(),
            path: "/dev/ttyAMA0".to_owned(),
            mux: None,
        }],
        ..Board::default()
    }
}
