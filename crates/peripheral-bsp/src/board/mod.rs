use std::fs;
use std::path::Path;

use peripheral_manager::{PeripheralContext, PinMuxCallbacks};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

pub mod rpi;

/// A physical pin the pin-mux table arbitrates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinSpec {
    pub name: String,
    #[serde(default)]
    pub gpio: bool,
}

/// A named set of pins: a group, or a simple source when listed under
/// `simple_sources`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSpec {
    pub name: String,
    pub pins: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub name: String,
    pub groups: Vec<String>,
}

/// The source (and optionally the routing group) a bus takes when opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MuxSpec {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpioSpec {
    pub name: String,
    pub index: u32,
    /// Pin taken as GPIO while the line is open.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mux: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct I2cSpec {
    pub name: String,
    pub bus: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mux: Option<MuxSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpiSpec {
    pub name: String,
    pub bus: u32,
    pub chip_select: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mux: Option<MuxSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UartSpec {
    pub name: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mux: Option<MuxSpec>,
}

/// Everything a board registers at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Board {
    pub name: String,
    pub pins: Vec<PinSpec>,
    pub groups: Vec<GroupSpec>,
    pub sources: Vec<SourceSpec>,
    pub simple_sources: Vec<GroupSpec>,
    pub gpio: Vec<GpioSpec>,
    pub i2c: Vec<I2cSpec>,
    pub spi: Vec<SpiSpec>,
    pub uart: Vec<UartSpec>,
}

/// What [`Board::apply`] managed to register.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub registered: usize,
    /// One line per entry that failed, with the reason.
    pub skipped: Vec<String>,
}

impl ApplyReport {
    fn record(&mut self, what: String, result: peripheral_manager::Result<()>) {
        match result {
            Ok(()) => {
                debug!(entry = %what, "registered");
                self.registered += 1;
            }
            Err(e) => {
                warn!(entry = %what, error = %e, "board entry skipped");
                self.skipped.push(format!("{what}: {e}"));
            }
        }
    }

    /// Fails if anything was skipped.
    pub fn into_result(self) -> Result<usize> {
        if self.skipped.is_empty() {
            Ok(self.registered)
        } else {
            Err(Error::Register(self.skipped))
        }
    }
}

impl Board {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path.as_ref())?;
        let board = Self::from_json(&json)?;
        info!(
            board = %board.name,
            path = %path.as_ref().display(),
            "board description loaded"
        );
        Ok(board)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Registers the board with `ctx`.
    ///
    /// Order is pins, groups, sources, buses, then mux bindings, so every
    /// entry only refers to names registered before it. An entry that
    /// fails is logged and skipped; the rest still goes in. Every pin gets
    /// a clone of `callbacks`.
    pub fn apply(
        &self,
        ctx: &PeripheralContext,
        callbacks: &PinMuxCallbacks,
    ) -> ApplyReport {
        let mut report = ApplyReport::default();
        let mux = ctx.pinmux();

        for pin in &self.pins {
            report.record(
                format!("pin {}", pin.name),
                mux.register_pin(&pin.name, pin.gpio, callbacks.clone()),
            );
        }
        for group in &self.groups {
            report.record(
                format!("group {}", group.name),
                mux.register_group(&group.name, &group.pins),
            );
        }
        for source in &self.sources {
            report.record(
                format!("source {}", source.name),
                mux.register_source(&source.name, &source.groups),
            );
        }
        for source in &self.simple_sources {
            report.record(
                format!("simple source {}", source.name),
                mux.register_simple_source(&source.name, &source.pins),
            );
        }

        for gpio in &self.gpio {
            report.record(
                format!("gpio {}", gpio.name),
                ctx.gpio().register_sysfs_gpio(&gpio.name, gpio.index),
            );
        }
        for i2c in &self.i2c {
            report.record(
                format!("i2c {}", i2c.name),
                ctx.i2c().register_i2c_dev_bus(&i2c.name, i2c.bus),
            );
        }
        for spi in &self.spi {
            report.record(
                format!("spi {}", spi.name),
                ctx.spi().register_spi_dev_bus(&spi.name, spi.bus, spi.chip_select),
            );
        }
        for uart in &self.uart {
            report.record(
                format!("uart {}", uart.name),
                ctx.uart().register_uart_bus(&uart.name, &uart.path),
            );
        }

        for gpio in &self.gpio {
            if let Some(pin) = &gpio.mux {
                report.record(
                    format!("gpio {} mux {pin}", gpio.name),
                    ctx.gpio().set_pin_mux(&gpio.name, pin),
                );
            }
        }
        for i2c in &self.i2c {
            if let Some(spec) = &i2c.mux {
                report.record(
                    format!("i2c {} mux {}", i2c.name, spec.source),
                    match &spec.group {
                        Some(group) => ctx
                            .i2c()
                            .set_pin_mux_with_group(&i2c.name, &spec.source, group),
                        None => ctx.i2c().set_pin_mux(&i2c.name, &spec.source),
                    },
                );
            }
        }
        for spi in &self.spi {
            if let Some(spec) = &spi.mux {
                report.record(
                    format!("spi {} mux {}", spi.name, spec.source),
                    match &spec.group {
                        Some(group) => ctx
                            .spi()
                            .set_pin_mux_with_group(&spi.name, &spec.source, group),
                        None => ctx.spi().set_pin_mux(&spi.name, &spec.source),
                    },
                );
            }
        }
        for uart in &self.uart {
            if let Some(spec) = &uart.mux {
                report.record(
                    format!("uart {} mux {}", uart.name, spec.source),
                    match &spec.group {
                        Some(group) => ctx
                            .uart()
                            .set_pin_mux_with_group(&uart.name, &spec.source, group),
                        None => ctx.uart().set_pin_mux(&uart.name, &spec.source),
                    },
                );
            }
        }

        info!(
            board = %self.name,
            registered = report.registered,
            skipped = report.skipped.len(),
            "board applied"
        );
        report
    }
}
