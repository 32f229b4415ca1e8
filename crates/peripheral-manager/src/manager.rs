use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::lock;
use crate::pinmux::{MuxBinding, PinMux};
use crate::registry::{DriverFactory, DriverInfo, DriverRegistry};

/// Which part of a catalog entry a handle holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Slot {
    /// The whole resource: a GPIO pin, an SPI chip select, a UART.
    Whole,
    /// One device address on a shared bus.
    Address(u16),
}

/// A registered resource and its live claims.
pub(crate) struct Entry<R> {
    pub(crate) desc: R,
    pub(crate) mux: Option<MuxBinding>,
    pub(crate) claims: BTreeSet<Slot>,
}

pub(crate) type Catalog<R> = BTreeMap<String, Entry<R>>;

/// Catalog of named resources of one peripheral kind, the drivers that can
/// serve them, and the open path that ties both to the pin-mux table.
///
/// `R` is the physical descriptor (bus number, sysfs index, device path).
/// `D` is the driver interface of the kind.
pub(crate) struct ResourceManager<R, D: ?Sized> {
    kind: &'static str,
    compat: &'static str,
    catalog: Arc<Mutex<Catalog<R>>>,
    drivers: Mutex<DriverRegistry<D>>,
    pinmux: Arc<PinMux>,
}

impl<R, D: ?Sized> ResourceManager<R, D> {
    pub(crate) fn new(
        kind: &'static str,
        compat: &'static str,
        pinmux: Arc<PinMux>,
    ) -> Self {
        Self {
            kind,
            compat,
            catalog: Arc::new(Mutex::new(BTreeMap::new())),
            drivers: Mutex::new(DriverRegistry::new()),
            pinmux,
        }
    }

    pub(crate) fn register(&self, name: &str, desc: R) -> Result<()> {
        let mut catalog = lock(&self.catalog);
        if catalog.contains_key(name) {
            return Err(Error::AlreadyRegistered(format!(
                "{} {name}",
                self.kind
            )));
        }
        catalog.insert(
            name.to_owned(),
            Entry { desc, mux: None, claims: BTreeSet::new() },
        );
        debug!(kind = self.kind, name, "resource registered");
        Ok(())
    }

    /// Stores the grant `open` acquires for `name`. Refused while the
    /// resource is open, so a handle always releases what it was granted.
    pub(crate) fn set_mux(&self, name: &str, binding: MuxBinding) -> Result<()> {
        let mut catalog = lock(&self.catalog);
        let entry = catalog
            .get_mut(name)
            .ok_or_else(|| Error::NotFound(format!("{} {name}", self.kind)))?;
        if !entry.claims.is_empty() {
            return Err(Error::Busy(format!("{} {name}", self.kind)));
        }
        debug!(kind = self.kind, name, ?binding, "pin mux bound");
        entry.mux = Some(binding);
        Ok(())
    }

    pub(crate) fn names(&self) -> Vec<String> {
        lock(&self.catalog).keys().cloned().collect()
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        lock(&self.catalog).contains_key(name)
    }

    pub(crate) fn register_driver<F>(&self, compat: &str, factory: F) -> Result<()>
    where
        F: DriverFactory<Driver = D> + 'static,
    {
        lock(&self.drivers).register(DriverInfo::new(compat, factory))
    }

    pub(crate) fn seal_drivers(&self) {
        lock(&self.drivers).seal();
    }

    pub(crate) fn is_open(&self, name: &str) -> bool {
        lock(&self.catalog)
            .get(name)
            .is_some_and(|entry| !entry.claims.is_empty())
    }

    /// Binds a fresh driver to `slot` of `name`.
    ///
    /// The catalog stays locked for the whole call. Order: lookup, busy
    /// check, probe, `init`, mux grant, slot marked. Any failure drops the
    /// driver and leaves the entry as it was.
    pub(crate) fn open<F>(
        &self,
        name: &str,
        slot: Slot,
        init: F,
    ) -> Result<Handle<R, D>>
    where
        F: FnOnce(&mut D, &R) -> Result<()>,
    {
        let mut catalog = lock(&self.catalog);
        let entry = catalog
            .get_mut(name)
            .ok_or_else(|| Error::NotFound(format!("{} {name}", self.kind)))?;

        if entry.claims.contains(&slot) {
            warn!(kind = self.kind, name, ?slot, "already open");
            return Err(Error::Busy(format!("{} {name}", self.kind)));
        }

        let mut driver = lock(&self.drivers).probe(self.compat)?;
        init(&mut *driver, &entry.desc)?;

        // Shared buses hold one grant for all their open addresses.
        if entry.claims.is_empty() {
            if let Some(mux) = &entry.mux {
                self.pinmux.grant(mux)?;
            }
        }

        entry.claims.insert(slot);
        info!(kind = self.kind, name, ?slot, "opened");
        Ok(Handle::new(
            driver,
            name.to_owned(),
            slot,
            entry.mux.clone(),
            Arc::clone(&self.catalog),
            Arc::clone(&self.pinmux),
        ))
    }
}

impl<R, D: ?Sized> fmt::Debug for ResourceManager<R, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceManager")
            .field("kind", &self.kind)
            .field("compat", &self.compat)
            .field("resources", &lock(&self.catalog).len())
            .finish()
    }
}
