use std::os::fd::OwnedFd;

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Direction request. Outputs carry the level driven on switch-over so the
/// pin never glitches through the other level.
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum GpioDirection {
    #[display("in")]
    In,
    #[display("out_high")]
    OutInitiallyHigh,
    #[display("out_low")]
    OutInitiallyLow,
}

impl GpioDirection {
    pub fn is_output(self) -> bool {
        !matches!(self, GpioDirection::In)
    }
}

/// Direction as read back from the pin.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PinDirection {
    #[display("in")]
    In,
    #[display("out")]
    Out,
}

#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    #[display("none")]
    None,
    #[display("rising")]
    Rising,
    #[display("falling")]
    Falling,
    #[display("both")]
    Both,
}

#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ActiveType {
    #[display("active_low")]
    ActiveLow,
    #[display("active_high")]
    ActiveHigh,
}

/// Kernel access for one GPIO line.
pub trait GpioDriver: Send {
    /// Binds the driver to line `index`, exporting it first if needed.
    fn init(&mut self, index: u32) -> Result<()>;

    fn set_value(&mut self, high: bool) -> Result<()>;

    fn value(&self) -> Result<bool>;

    fn set_direction(&mut self, direction: GpioDirection) -> Result<()>;

    fn direction(&self) -> Result<PinDirection>;

    fn set_edge_trigger(&mut self, edge: EdgeType) -> Result<()>;

    fn set_active_type(&mut self, active: ActiveType) -> Result<()>;

    /// A descriptor that becomes readable on the configured edge.
    fn polling_fd(&self) -> Result<OwnedFd>;
}
