//! Owner of every port: a generational slab plus a name index.

use crate::error::{Error, Result};
use crate::port::{Port, PortBuffer, PortFlags, PortHandle};
use hashbrown::HashMap;

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    port: Option<Port>,
}

/// Port storage. Handles are `(slot index, generation)`; a slot's generation
/// is bumped each time it is vacated so stale handles never alias a new port.
#[derive(Debug, Default)]
pub(crate) struct PortRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    by_name: HashMap<String, PortHandle>,
    /// Registration order, used for query results.
    order: Vec<PortHandle>,
}

impl PortRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn get(&self, handle: PortHandle) -> Result<&Port> {
        self.slots
            .get(handle.index())
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.port.as_ref())
            .ok_or(Error::InvalidHandle(handle))
    }

    pub(crate) fn get_mut(&mut self, handle: PortHandle) -> Result<&mut Port> {
        self.slots
            .get_mut(handle.index())
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.port.as_mut())
            .ok_or(Error::InvalidHandle(handle))
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<PortHandle> {
        self.by_name.get(name).copied()
    }

    pub(crate) fn resolve(&self, name: &str) -> Result<PortHandle> {
        self.lookup(name)
            .ok_or_else(|| Error::UnknownPort(name.to_string()))
    }

    /// Registered handles in registration order.
    pub(crate) fn handles(&self) -> impl Iterator<Item = PortHandle> + '_ {
        self.order.iter().copied()
    }

    /// Upper bound on slot indices; sizes the worker's per-cycle snapshot.
    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Occupied slots as `(handle, port)`, in slot order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (PortHandle, &Port)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.port
                .as_ref()
                .map(|port| (PortHandle::new(i as u32, slot.generation), port))
        })
    }

    /// Inserts a port under `name`. Nothing changes on `DuplicateName`.
    pub(crate) fn insert(
        &mut self,
        name: String,
        flags: PortFlags,
        buffer: PortBuffer,
    ) -> Result<PortHandle> {
        if self.by_name.contains_key(&name) {
            return Err(Error::DuplicateName(name));
        }

        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        let handle = PortHandle::new(index, slot.generation);
        slot.port = Some(Port::new(name.clone(), flags, buffer));

        self.by_name.insert(name, handle);
        self.order.push(handle);
        Ok(handle)
    }

    /// Disconnects every edge of `handle`, then destroys the port.
    pub(crate) fn remove(&mut self, handle: PortHandle) -> Result<Port> {
        self.disconnect_all(handle)?;

        let slot = &mut self.slots[handle.index()];
        let port = slot.port.take().ok_or(Error::InvalidHandle(handle))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index() as u32);

        self.by_name.remove(&port.name);
        self.order.retain(|&h| h != handle);
        Ok(port)
    }

    pub(crate) fn rename(&mut self, handle: PortHandle, name: String) -> Result<()> {
        let current = &self.get(handle)?.name;
        if *current == name {
            return Ok(());
        }
        if self.by_name.contains_key(&name) {
            return Err(Error::DuplicateName(name));
        }

        let port = self.get_mut(handle)?;
        let old = core::mem::replace(&mut port.name, name.clone());
        self.by_name.remove(&old);
        self.by_name.insert(name, handle);
        Ok(())
    }
}
