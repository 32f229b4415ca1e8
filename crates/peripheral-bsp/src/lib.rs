//! Board descriptions: which pins, pin groups, mux sources and buses a
//! board has, and the friendly names they are known by.
//!
//! A [`Board`] is plain data. Load one from JSON or take the built-in
//! [`rpi`] board, then [`Board::apply`] it to a
//! [`PeripheralContext`](peripheral_manager::PeripheralContext) at startup.

mod board;
mod error;

pub use board::*;
pub use error::{Error, Result};
