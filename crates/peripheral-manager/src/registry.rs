//! Compat-keyed driver registries.
//!
//! Every resource manager owns one registry for its driver interface `D`.
//! A registration binds a compat key to a factory that builds a fresh,
//! uninitialized driver on every probe.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Builds driver instances.
///
/// Any `Fn() -> Box<D>` closure is a factory, which is how the default
/// drivers capture their construction parameters.
pub trait DriverFactory: Send + Sync {
    /// The driver interface handed out, usually a `dyn` trait.
    type Driver: ?Sized;

    /// A fresh driver. It is not bound to any bus or pin yet.
    fn probe(&self) -> Box<Self::Driver>;
}

impl<D: ?Sized, F> DriverFactory for F
where
    F: Fn() -> Box<D> + Send + Sync,
{
    type Driver = D;

    fn probe(&self) -> Box<D> {
        self()
    }
}

/// A factory registered under its compat key.
pub struct DriverInfo<D: ?Sized> {
    compat: String,
    factory: Arc<dyn DriverFactory<Driver = D>>,
}

impl<D: ?Sized> DriverInfo<D> {
    pub fn new<F>(compat: impl Into<String>, factory: F) -> Self
    where
        F: DriverFactory<Driver = D> + 'static,
    {
        Self { compat: compat.into(), factory: Arc::new(factory) }
    }

    pub fn compat(&self) -> &str {
        &self.compat
    }

    pub fn probe(&self) -> Box<D> {
        self.factory.probe()
    }
}

impl<D: ?Sized> fmt::Debug for DriverInfo<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverInfo").field("compat", &self.compat).finish()
    }
}

/// Compat key to factory map.
///
/// Re-registering a key before the registry is sealed replaces the old
/// factory. Once sealed, registration fails.
pub struct DriverRegistry<D: ?Sized> {
    infos: BTreeMap<String, DriverInfo<D>>,
    sealed: bool,
}

impl<D: ?Sized> Default for DriverRegistry<D> {
    fn default() -> Self {
        Self { infos: BTreeMap::new(), sealed: false }
    }
}

impl<D: ?Sized> DriverRegistry<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, info: DriverInfo<D>) -> Result<()> {
        if self.sealed {
            warn!(compat = info.compat(), "registration after seal rejected");
            return Err(Error::RegistrySealed(info.compat.clone()));
        }
        let compat = info.compat.clone();
        if self.infos.insert(compat.clone(), info).is_some() {
            warn!(compat = %compat, "driver re-registered, replacing previous");
        } else {
            debug!(compat = %compat, "driver registered");
        }
        Ok(())
    }

    /// Builds a fresh driver for `compat`.
    pub fn probe(&self, compat: &str) -> Result<Box<D>> {
        self.infos
            .get(compat)
            .map(DriverInfo::probe)
            .ok_or_else(|| Error::NoDriver(compat.to_owned()))
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn compats(&self) -> Vec<String> {
        self.infos.keys().cloned().collect()
    }
}

impl<D: ?Sized> fmt::Debug for DriverRegistry<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("compats", &self.infos.keys().collect::<Vec<_>>())
            .field("sealed", &self.sealed)
            .finish()
    }
}
