use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::error::{Error, Result};
use crate::lock;
use crate::manager::{Catalog, Slot};
use crate::pinmux::{MuxBinding, PinMux};

/// Exclusive ownership of one slot of a catalog entry, plus the driver
/// bound to it.
///
/// The handle keeps the entry's key and a share of the catalog, so the
/// catalog outlives its manager while handles remain. Dropping it releases
/// the mux grant (when it is the entry's last claim), tears down the
/// driver, and frees the slot, all under the catalog lock so no `open` can
/// observe a half-released entry.
pub(crate) struct Handle<R, D: ?Sized> {
    driver: Option<Box<D>>,
    name: String,
    slot: Slot,
    mux: Option<MuxBinding>,
    catalog: Arc<Mutex<Catalog<R>>>,
    pinmux: Arc<PinMux>,
}

impl<R, D: ?Sized> Handle<R, D> {
    /// Only called by `ResourceManager::open`, with the catalog locked and
    /// the slot already marked.
    pub(crate) fn new(
        driver: Box<D>,
        name: String,
        slot: Slot,
        mux: Option<MuxBinding>,
        catalog: Arc<Mutex<Catalog<R>>>,
        pinmux: Arc<PinMux>,
    ) -> Self {
        Self { driver: Some(driver), name, slot, mux, catalog, pinmux }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn mux(&self) -> Option<&MuxBinding> {
        self.mux.as_ref()
    }

    pub(crate) fn pinmux(&self) -> &PinMux {
        &self.pinmux
    }

    pub(crate) fn driver(&self) -> Result<&D> {
        self.driver
            .as_deref()
            .ok_or_else(|| Error::NotOpen(self.name.clone()))
    }

    pub(crate) fn driver_mut(&mut self) -> Result<&mut D> {
        match self.driver.as_deref_mut() {
            Some(driver) => Ok(driver),
            None => Err(Error::NotOpen(self.name.clone())),
        }
    }
}

impl<R, D: ?Sized> Drop for Handle<R, D> {
    fn drop(&mut self) {
        let mut catalog = lock(&self.catalog);

        let last = catalog
            .get(&self.name)
            .map_or(true, |entry| entry.claims.iter().all(|s| *s == self.slot));
        if last {
            if let Some(mux) = &self.mux {
                self.pinmux.release(mux);
            }
        }

        self.driver = None;

        if let Some(entry) = catalog.get_mut(&self.name) {
            entry.claims.remove(&self.slot);
        }
        debug!(name = %self.name, slot = ?self.slot, "handle released");
    }
}
