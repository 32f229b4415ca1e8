//! Pin-mux arbitration.
//!
//! Tracks every physical pin, the named groups of pins a function can be
//! routed onto, and the sources (logical functions) that may use those
//! groups. Pins are the unit of mutual exclusion: a grant either marks
//! every pin of a group in use and routes it, or leaves the table exactly
//! as it was.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::lock;

/// Routes `pin` to `source`, or to plain GPIO when `source` is `None`.
pub type MuxFn = dyn Fn(&str, Option<&str>) -> io::Result<()> + Send + Sync;

/// Sets the pad direction of `pin` (`true` for output).
pub type DirectionFn = dyn Fn(&str, bool) -> io::Result<()> + Send + Sync;

/// Board-supplied hooks that physically configure a pin.
///
/// They are called without the table lock held, so a hook may query the
/// [`PinMux`] it is registered with.
#[derive(Clone, Default)]
pub struct PinMuxCallbacks {
    pub mux: Option<Arc<MuxFn>>,
    pub direction: Option<Arc<DirectionFn>>,
}

impl PinMuxCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mux<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Option<&str>) -> io::Result<()> + Send + Sync + 'static,
    {
        self.mux = Some(Arc::new(f));
        self
    }

    pub fn with_direction<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, bool) -> io::Result<()> + Send + Sync + 'static,
    {
        self.direction = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for PinMuxCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinMuxCallbacks")
            .field("mux", &self.mux.is_some())
            .field("direction", &self.direction.is_some())
            .finish()
    }
}

#[derive(Debug)]
struct Pin {
    in_use: bool,
    gpio: bool,
    callbacks: PinMuxCallbacks,
}

/// Snapshot of one pin, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PinState {
    pub name: String,
    pub gpio: bool,
    pub in_use: bool,
}

/// A claim a resource manager asks the table for at open time and gives
/// back when the handle goes away.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MuxBinding {
    /// Route `group` to `source`.
    Source { source: String, group: String },
    /// Take a single pin as GPIO.
    Gpio { pin: String },
}

impl MuxBinding {
    /// Binding for a source registered with
    /// [`PinMux::register_simple_source`].
    pub fn simple(source: impl Into<String>) -> Self {
        let source = source.into();
        MuxBinding::Source { group: source.clone(), source }
    }

    /// Binding with an explicit group; the group defaults to the source
    /// name.
    pub fn source(source: impl Into<String>, group: Option<String>) -> Self {
        let source = source.into();
        let group = group.unwrap_or_else(|| source.clone());
        MuxBinding::Source { source, group }
    }
}

#[derive(Default)]
struct Table {
    pins: BTreeMap<String, Pin>,
    groups: BTreeMap<String, BTreeSet<String>>,
    sources: BTreeMap<String, BTreeSet<String>>,
}

impl Table {
    fn pin_mut(&mut self, name: &str) -> Result<&mut Pin> {
        self.pins
            .get_mut(name)
            .ok_or_else(|| Error::NotFound(format!("pin {name}")))
    }

    fn register_group(
        &mut self,
        name: &str,
        pins: BTreeSet<String>,
    ) -> Result<()> {
        if self.groups.contains_key(name) {
            return Err(Error::AlreadyRegistered(format!("group {name}")));
        }
        if let Some(missing) = pins.iter().find(|p| !self.pins.contains_key(*p))
        {
            return Err(Error::NotFound(format!("pin {missing}")));
        }
        self.groups.insert(name.to_owned(), pins);
        Ok(())
    }

    fn register_source(
        &mut self,
        name: &str,
        groups: BTreeSet<String>,
    ) -> Result<()> {
        if self.sources.contains_key(name) {
            return Err(Error::AlreadyRegistered(format!("source {name}")));
        }
        if let Some(missing) =
            groups.iter().find(|g| !self.groups.contains_key(*g))
        {
            return Err(Error::NotFound(format!("group {missing}")));
        }
        self.sources.insert(name.to_owned(), groups);
        Ok(())
    }

    /// Pins of `group`, provided `group` is one of `source`'s routings.
    fn routing(&self, source: &str, group: &str) -> Result<Vec<String>> {
        let groups = self
            .sources
            .get(source)
            .ok_or_else(|| Error::NotFound(format!("source {source}")))?;
        if !groups.contains(group) {
            return Err(Error::NotFound(format!(
                "group {group} for source {source}"
            )));
        }
        let pins = self
            .groups
            .get(group)
            .ok_or_else(|| Error::NotFound(format!("group {group}")))?;
        Ok(pins.iter().cloned().collect())
    }
}

/// The arbitration table. Shared by every resource manager, so it carries
/// its own lock.
#[derive(Default)]
pub struct PinMux {
    table: Mutex<Table>,
}

impl PinMux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_pin(
        &self,
        name: &str,
        gpio: bool,
        callbacks: PinMuxCallbacks,
    ) -> Result<()> {
        let mut table = lock(&self.table);
        if table.pins.contains_key(name) {
            return Err(Error::AlreadyRegistered(format!("pin {name}")));
        }
        table
            .pins
            .insert(name.to_owned(), Pin { in_use: false, gpio, callbacks });
        debug!(pin = name, gpio, "registered pin");
        Ok(())
    }

    pub fn register_group<I, S>(&self, name: &str, pins: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pins = pins.into_iter().map(Into::into).collect();
        lock(&self.table).register_group(name, pins)
    }

    pub fn register_source<I, S>(&self, name: &str, groups: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let groups = groups.into_iter().map(Into::into).collect();
        lock(&self.table).register_source(name, groups)
    }

    /// Registers a group and a source, both called `name`, in one step.
    ///
    /// If the source cannot be registered the group is removed again.
    pub fn register_simple_source<I, S>(&self, name: &str, pins: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pins = pins.into_iter().map(Into::into).collect();
        let mut table = lock(&self.table);
        table.register_group(name, pins)?;
        let groups = BTreeSet::from([name.to_owned()]);
        if let Err(e) = table.register_source(name, groups) {
            table.groups.remove(name);
            return Err(e);
        }
        Ok(())
    }

    /// Routes `group` to `source`.
    ///
    /// Fails with [`Error::Busy`] if any pin of the group is held. The pins
    /// are reserved under the table lock and the mux callbacks run after it
    /// is dropped. If a callback fails, the whole group is given back before
    /// the error is returned.
    pub fn set_source(&self, source: &str, group: &str) -> Result<()> {
        let calls = {
            let mut table = lock(&self.table);
            let pins = table.routing(source, group)?;

            if let Some(busy) = pins.iter().find(|p| table.pins[*p].in_use) {
                warn!(source, group, pin = %busy, "pin already in use");
                return Err(Error::Busy(format!("pin {busy}")));
            }

            let mut calls = Vec::with_capacity(pins.len());
            for name in pins {
                let pin = table.pin_mut(&name)?;
                pin.in_use = true;
                calls.push((name, pin.callbacks.mux.clone()));
            }
            calls
        };

        for (name, mux) in &calls {
            let Some(mux) = mux else { continue };
            if let Err(e) = mux(name, Some(source)) {
                warn!(
                    source,
                    group,
                    pin = %name,
                    error = %e,
                    "mux callback failed, rolling back"
                );
                let mut table = lock(&self.table);
                for (granted, _) in &calls {
                    if let Some(pin) = table.pins.get_mut(granted) {
                        pin.in_use = false;
                    }
                }
                return Err(Error::RemoteIo(e));
            }
        }
        debug!(source, group, "source granted");
        Ok(())
    }

    /// [`set_source`](Self::set_source) for a simple source.
    pub fn set_simple_source(&self, source: &str) -> Result<()> {
        self.set_source(source, source)
    }

    /// Gives back every pin of `group`. Never fails; unknown names are
    /// ignored and pins that were not held are logged.
    pub fn release_source(&self, source: &str, group: &str) {
        let mut table = lock(&self.table);
        let pins = match table.routing(source, group) {
            Ok(pins) => pins,
            Err(e) => {
                warn!(source, group, error = %e, "release of unknown routing");
                return;
            }
        };
        for name in pins {
            if let Some(pin) = table.pins.get_mut(&name) {
                if !pin.in_use {
                    warn!(pin = %name, source, "releasing pin that is not in use");
                }
                pin.in_use = false;
            }
        }
        debug!(source, group, "source released");
    }

    /// Takes a single pin as GPIO. The pin is reserved before its mux
    /// callback runs and freed again if the callback fails.
    pub fn set_gpio(&self, name: &str) -> Result<()> {
        let mux = {
            let mut table = lock(&self.table);
            let pin = table.pin_mut(name)?;
            if pin.in_use {
                warn!(pin = name, "pin already in use");
                return Err(Error::Busy(format!("pin {name}")));
            }
            pin.in_use = true;
            pin.callbacks.mux.clone()
        };
        if let Some(mux) = mux {
            if let Err(e) = mux(name, None) {
                self.release_gpio(name);
                return Err(Error::RemoteIo(e));
            }
        }
        Ok(())
    }

    pub fn release_gpio(&self, name: &str) {
        if let Some(pin) = lock(&self.table).pins.get_mut(name) {
            pin.in_use = false;
        }
    }

    /// Forwards to the pin's direction callback. The pin must be held.
    pub fn set_gpio_direction(&self, name: &str, output: bool) -> Result<()> {
        let direction = {
            let mut table = lock(&self.table);
            let pin = table.pin_mut(name)?;
            if !pin.in_use {
                warn!(pin = name, "direction change on a pin that is not held");
                return Err(Error::NotOpen(format!("pin {name}")));
            }
            pin.callbacks.direction.clone()
        };
        if let Some(direction) = direction {
            direction(name, output)?;
        }
        Ok(())
    }

    /// Acquires whatever `binding` describes.
    pub fn grant(&self, binding: &MuxBinding) -> Result<()> {
        match binding {
            MuxBinding::Source { source, group } => {
                self.set_source(source, group)
            }
            MuxBinding::Gpio { pin } => self.set_gpio(pin),
        }
    }

    /// Undoes [`grant`](Self::grant).
    pub fn release(&self, binding: &MuxBinding) {
        match binding {
            MuxBinding::Source { source, group } => {
                self.release_source(source, group)
            }
            MuxBinding::Gpio { pin } => self.release_gpio(pin),
        }
    }

    /// `None` if the pin is not registered.
    pub fn pin_in_use(&self, name: &str) -> Option<bool> {
        lock(&self.table).pins.get(name).map(|p| p.in_use)
    }

    pub fn pins(&self) -> Vec<PinState> {
        lock(&self.table)
            .pins
            .iter()
            .map(|(name, pin)| PinState {
                name: name.clone(),
                gpio: pin.gpio,
                in_use: pin.in_use,
            })
            .collect()
    }

    pub fn groups(&self) -> Vec<String> {
        lock(&self.table).groups.keys().cloned().collect()
    }

    pub fn sources(&self) -> Vec<String> {
        lock(&self.table).sources.keys().cloned().collect()
    }
}

impl fmt::Debug for PinMux {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = lock(&self.table);
        f.debug_struct("PinMux")
            .field("pins", &table.pins.len())
            .field("groups", &table.groups.len())
            .field("sources", &table.sources.len())
            .finish()
    }
}
