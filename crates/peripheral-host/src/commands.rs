use anyhow::{Context, Result};
use peripheral_manager::{Error, PeripheralService};
use tracing::debug;

use crate::cli::{Commands, GpioCommand, I2cCommand, SpiCommand, UartCommand};

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn run(service: &PeripheralService, command: Commands) -> Result<()> {
    match command {
        Commands::List { json } => list(service, json),
        Commands::Gpio(cmd) => gpio(service, cmd),
        Commands::I2c(cmd) => i2c(service, cmd),
        Commands::Spi(cmd) => spi(service, cmd),
        Commands::Uart(cmd) => uart(service, cmd),
    }
}

fn list(service: &PeripheralService, json: bool) -> Result<()> {
    let pins = service.context().pinmux().pins();
    if json {
        let out = serde_json::json!({
            "gpio": service.gpio_list(),
            "i2c": service.i2c_list_buses(),
            "spi": service.spi_list_buses(),
            "uart": service.uart_list(),
            "pins": pins,
            "sources": service.context().pinmux().sources(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("gpio: {}", service.gpio_list().join(" "));
    println!("i2c:  {}", service.i2c_list_buses().join(" "));
    println!("spi:  {}", service.spi_list_buses().join(" "));
    println!("uart: {}", service.uart_list().join(" "));
    println!("pins:");
    for pin in pins {
        println!(
            "  {:<8} {:<5} {}",
            pin.name,
            if pin.gpio { "gpio" } else { "" },
            if pin.in_use { "in use" } else { "free" }
        );
    }
    Ok(())
}

fn gpio(service: &PeripheralService, cmd: GpioCommand) -> Result<()> {
    let name = match &cmd {
        GpioCommand::Get { name }
        | GpioCommand::Set { name, .. }
        | GpioCommand::Direction { name, .. } => name.clone(),
    };
    service
        .gpio_open(&name)
        .with_context(|| format!("opening gpio {name}"))?;

    let result = match cmd {
        GpioCommand::Get { .. } => service.gpio_get_value(&name).map(|high| {
            println!("{}", u8::from(high));
        }),
        GpioCommand::Set { high, active, .. } => (|| {
            if let Some(active) = active {
                service.gpio_set_active_type(&name, active.into())?;
            }
            let direction = if high {
                peripheral_manager::gpio::GpioDirection::OutInitiallyHigh
            } else {
                peripheral_manager::gpio::GpioDirection::OutInitiallyLow
            };
            service.gpio_set_direction(&name, direction)?;
            service.gpio_set_value(&name, high)
        })(),
        GpioCommand::Direction { direction, edge, .. } => (|| {
            if let Some(direction) = direction {
                service.gpio_set_direction(&name, direction.into())?;
            }
            if let Some(edge) = edge {
                service.gpio_set_edge_trigger(&name, edge.into())?;
            }
            if direction.is_none() && edge.is_none() {
                println!("{}", service.gpio_get_direction(&name)?);
            }
            Ok::<_, Error>(())
        })(),
    };

    service.gpio_close(&name)?;
    result.with_context(|| format!("gpio {name}"))
}

fn i2c(service: &PeripheralService, cmd: I2cCommand) -> Result<()> {
    let (bus, address) = match &cmd {
        I2cCommand::Read { bus, address, .. }
        | I2cCommand::ReadReg { bus, address, .. }
        | I2cCommand::WriteReg { bus, address, .. } => (bus.clone(), *address),
    };
    service
        .i2c_open(&bus, address)
        .with_context(|| format!("opening i2c {bus}@{address:#04x}"))?;

    let result = match cmd {
        I2cCommand::Read { size, .. } => service
            .i2c_read(&bus, address, size)
            .map(|data| println!("{}", hex(&data))),
        I2cCommand::ReadReg { reg, word: true, .. } => service
            .i2c_read_reg_word(&bus, address, reg)
            .map(|v| println!("{v:#06x}")),
        I2cCommand::ReadReg { reg, size: Some(size), .. } => service
            .i2c_read_reg_buffer(&bus, address, reg, size)
            .map(|data| println!("{}", hex(&data))),
        I2cCommand::ReadReg { reg, .. } => service
            .i2c_read_reg_byte(&bus, address, reg)
            .map(|v| println!("{v:#04x}")),
        I2cCommand::WriteReg { reg, data, .. } => match data.as_slice() {
            [byte] => service.i2c_write_reg_byte(&bus, address, reg, *byte),
            _ => service.i2c_write_reg_buffer(&bus, address, reg, &data),
        },
    };

    service.i2c_close(&bus, address)?;
    result.with_context(|| format!("i2c {bus}@{address:#04x}"))
}

fn spi(service: &PeripheralService, cmd: SpiCommand) -> Result<()> {
    let SpiCommand::Transfer { bus, data, mode, hz } = cmd;
    service
        .spi_open(&bus)
        .with_context(|| format!("opening spi {bus}"))?;

    let result = (|| {
        if let Some(mode) = mode {
            service.spi_set_mode(&bus, mode)?;
        }
        if let Some(hz) = hz {
            service.spi_set_frequency(&bus, hz)?;
            debug!(bus = %bus, hz = service.spi_get_frequency(&bus)?, "spi clock");
        }
        let rx = service.spi_transfer(&bus, &data)?;
        println!("{}", hex(&rx));
        Ok::<_, Error>(())
    })();

    service.spi_close(&bus)?;
    result.with_context(|| format!("spi {bus}"))
}

fn uart(service: &PeripheralService, cmd: UartCommand) -> Result<()> {
    let name = match &cmd {
        UartCommand::Write { name, .. }
        | UartCommand::Read { name, .. }
        | UartCommand::Baud { name, .. } => name.clone(),
    };
    service
        .uart_open(&name, false)
        .with_context(|| format!("opening uart {name}"))?;

    let result = match cmd {
        UartCommand::Write { text, baud, .. } => (|| {
            if let Some(baud) = baud {
                service.uart_set_baudrate(&name, baud)?;
            }
            let n = service.uart_write(&name, text.as_bytes())?;
            debug!(name = %name, written = n, "uart write");
            Ok::<_, Error>(())
        })(),
        UartCommand::Read { size, baud, .. } => (|| {
            if let Some(baud) = baud {
                service.uart_set_baudrate(&name, baud)?;
            }
            let data = match service.uart_read(&name, size) {
                Err(Error::WouldBlock) => Vec::new(),
                other => other?,
            };
            println!("{}", String::from_utf8_lossy(&data));
            Ok::<_, Error>(())
        })(),
        UartCommand::Baud { rate: Some(rate), .. } => {
            service.uart_set_baudrate(&name, rate)
        }
        UartCommand::Baud { rate: None, .. } => service
            .uart_get_baudrate(&name)
            .map(|rate| println!("{rate}")),
    };

    service.uart_close(&name)?;
    result.with_context(|| format!("uart {name}"))
}
