//! The legacy `/sys/class/gpio` interface.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::os::fd::OwnedFd;
use std::path::{Path, PathBuf};

use tracing::{debug, error};

use super::driver::{ActiveType, EdgeType, GpioDirection, GpioDriver, PinDirection};
use crate::error::{Error, Result};

pub const DEFAULT_SYSFS_ROOT: &str = "/sys/class/gpio";

const EXPORT: &str = "export";
const DIRECTION: &str = "direction";
const VALUE: &str = "value";
const EDGE: &str = "edge";
const ACTIVE_LOW: &str = "active_low";

const VALUE_HIGH: &str = "1";
const VALUE_LOW: &str = "0";

fn direction_token(direction: GpioDirection) -> &'static str {
    match direction {
        GpioDirection::In => "in",
        GpioDirection::OutInitiallyHigh => "high",
        GpioDirection::OutInitiallyLow => "low",
    }
}

fn edge_token(edge: EdgeType) -> &'static str {
    match edge {
        EdgeType::None => "none",
        EdgeType::Rising => "rising",
        EdgeType::Falling => "falling",
        EdgeType::Both => "both",
    }
}

fn write_attr(path: &Path, value: &str) -> Result<()> {
    let mut file = OpenOptions::new().write(true).truncate(true).open(path)?;
    let written = file.write(value.as_bytes())?;
    if written != value.len() {
        return Err(Error::io_failure("short write to gpio attribute"));
    }
    Ok(())
}

fn read_attr(path: &Path) -> Result<String> {
    let mut buf = [0u8; 16];
    let n = File::open(path)?.read(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf[..n]).into_owned())
}

/// GPIO driver over sysfs attribute files.
#[derive(Debug)]
pub struct GpioDriverSysfs {
    root: PathBuf,
    pin_dir: Option<PathBuf>,
}

impl GpioDriverSysfs {
    pub const COMPAT: &'static str = "GPIOSYSFS";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), pin_dir: None }
    }

    fn attr(&self, name: &str) -> Result<PathBuf> {
        self.pin_dir
            .as_ref()
            .map(|dir| dir.join(name))
            .ok_or_else(|| Error::NotOpen("gpio driver".into()))
    }

    fn export(&self, index: u32) -> Result<PathBuf> {
        let dir = self.root.join(format!("gpio{index}"));
        if dir.exists() {
            return Ok(dir);
        }
        debug!(index, "exporting gpio");
        write_attr(&self.root.join(EXPORT), &index.to_string())
            .inspect_err(|e| error!(index, error = %e, "gpio export failed"))?;
        Ok(dir)
    }
}

impl Default for GpioDriverSysfs {
    fn default() -> Self {
        Self::new(DEFAULT_SYSFS_ROOT)
    }
}

impl GpioDriver for GpioDriverSysfs {
    fn init(&mut self, index: u32) -> Result<()> {
        let dir = self.export(index)?;
        if !fs::metadata(&dir)?.is_dir() {
            error!(path = %dir.display(), "gpio directory missing after export");
            return Err(Error::io_failure("gpio directory missing"));
        }
        self.pin_dir = Some(dir);
        Ok(())
    }

    fn set_value(&mut self, high: bool) -> Result<()> {
        let token = if high { VALUE_HIGH } else { VALUE_LOW };
        write_attr(&self.attr(VALUE)?, token).inspect_err(|e| {
            error!(error = %e, "failed to set gpio value, is it an output?")
        })
    }

    fn value(&self) -> Result<bool> {
        let raw = read_attr(&self.attr(VALUE)?)?;
        if raw.is_empty() {
            return Err(Error::io_failure("empty gpio value"));
        }
        Ok(raw.starts_with(VALUE_HIGH))
    }

    fn set_direction(&mut self, direction: GpioDirection) -> Result<()> {
        write_attr(&self.attr(DIRECTION)?, direction_token(direction))
    }

    fn direction(&self) -> Result<PinDirection> {
        let raw = read_attr(&self.attr(DIRECTION)?)?;
        match raw.trim() {
            "in" => Ok(PinDirection::In),
            "out" | "high" | "low" => Ok(PinDirection::Out),
            other => Err(Error::io_failure(&format!(
                "unexpected gpio direction {other:?}"
            ))),
        }
    }

    fn set_edge_trigger(&mut self, edge: EdgeType) -> Result<()> {
        write_attr(&self.attr(EDGE)?, edge_token(edge))
    }

    fn set_active_type(&mut self, active: ActiveType) -> Result<()> {
        let token = match active {
            ActiveType::ActiveLow => VALUE_HIGH,
            ActiveType::ActiveHigh => VALUE_LOW,
        };
        write_attr(&self.attr(ACTIVE_LOW)?, token)
    }

    fn polling_fd(&self) -> Result<OwnedFd> {
        let file =
            OpenOptions::new().read(true).write(true).open(self.attr(VALUE)?)?;
        Ok(file.into())
    }
}
