//! Process-wide table mapping opaque handles to reference-counted instances.
//!
//! A handle encodes a slot index and the slot's generation, so a handle to a
//! freed slot never resolves to whatever instance later reuses that slot.
//! Every successful [`HandleDatabase::create`] or [`HandleDatabase::resolve`]
//! yields an [`InstanceRef`] guard. The guard's drop releases the reference,
//! and an instance is torn down only once it is marked destroyed and its
//! last guard is gone.

use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::errors::CfgError;

pub(crate) const REGISTRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::registry");

/// Opaque identifier for a registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Handle(u64);

impl Handle {
    fn new(index: u32, generation: u32) -> Self {
        Self((u64::from(generation) << 32) | u64::from(index))
    }

    pub(crate) const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub(crate) const fn as_raw(self) -> u64 {
        self.0
    }

    fn index(self) -> usize {
        usize::try_from(self.0 & 0xffff_ffff).unwrap_or(usize::MAX)
    }

    fn generation(self) -> u32 {
        u32::try_from(self.0 >> 32).unwrap_or(u32::MAX)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Callback run once per instance, just before it is freed.
pub(crate) type Destructor<T> = Box<dyn Fn(&T) + Send + Sync>;

struct Entry<T> {
    instance: Arc<T>,
    refs: usize,
    destroyed: bool,
}

struct Slot<T> {
    generation: u32,
    entry: Option<Entry<T>>,
}

struct Table<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
}

impl<T> Table<T> {
    fn entry_mut(&mut self, handle: Handle) -> Option<&mut Entry<T>> {
        let slot = self.slots.get_mut(handle.index())?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.entry.as_mut()
    }

    /// Empties the slot behind `handle` and queues it for reuse.
    fn vacate(&mut self, handle: Handle) -> Option<Entry<T>> {
        let slot = self.slots.get_mut(handle.index())?;
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index());
        Some(entry)
    }
}

/// Value handed back when the table cannot grow.
pub(crate) struct Rejected<T> {
    pub(crate) error: CfgError,
    pub(crate) value: T,
}

/// Handle table guarded by a single lock.
pub(crate) struct HandleDatabase<T> {
    table: Mutex<Table<T>>,
    destructor: Destructor<T>,
}

impl<T> HandleDatabase<T> {
    pub(crate) fn new(destructor: Destructor<T>) -> Self {
        Self {
            table: Mutex::new(Table {
                slots: Vec::new(),
                free: Vec::new(),
            }),
            destructor,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Table<T>> {
        // Every critical section leaves the table consistent, so a panic
        // elsewhere does not invalidate it.
        self.table
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Stores `value` and returns the creator's reference to it.
    pub(crate) fn create(&self, value: T) -> Result<InstanceRef<'_, T>, Rejected<T>> {
        let mut table = self.lock();
        let index = match table.free.pop() {
            Some(index) => index,
            None => {
                let fits_handle = u32::try_from(table.slots.len()).is_ok();
                if !fits_handle
                    || table.slots.try_reserve(1).is_err()
                    || table.free.try_reserve(1).is_err()
                {
                    return Err(Rejected {
                        error: CfgError::NoMemory,
                        value,
                    });
                }
                table.slots.push(Slot {
                    generation: 0,
                    entry: None,
                });
                table.slots.len().saturating_sub(1)
            }
        };
        let (Some(slot), Ok(raw_index)) = (table.slots.get_mut(index), u32::try_from(index)) else {
            return Err(Rejected {
                error: CfgError::Library("handle table slot vanished".to_owned()),
                value,
            });
        };
        let instance = Arc::new(value);
        slot.entry = Some(Entry {
            instance: Arc::clone(&instance),
            refs: 1,
            destroyed: false,
        });
        let handle = Handle::new(raw_index, slot.generation);
        drop(table);
        debug!(target: REGISTRY_TARGET, %handle, "handle created");
        Ok(InstanceRef {
            db: self,
            handle,
            instance,
        })
    }

    /// Takes a reference to the live instance behind `handle`.
    pub(crate) fn resolve(&self, handle: Handle) -> Result<InstanceRef<'_, T>, CfgError> {
        let mut table = self.lock();
        let entry = table
            .entry_mut(handle)
            .filter(|entry| !entry.destroyed)
            .ok_or(CfgError::BadHandle)?;
        entry.refs = entry.refs.saturating_add(1);
        let instance = Arc::clone(&entry.instance);
        drop(table);
        Ok(InstanceRef {
            db: self,
            handle,
            instance,
        })
    }

    /// Marks the instance behind `handle` for destruction.
    ///
    /// New resolutions fail from now on. The instance is freed when its last
    /// reference is released, or immediately when none is held. Marking an
    /// already marked entry has no further effect.
    pub(crate) fn mark_destroyed(&self, handle: Handle) -> Result<(), CfgError> {
        let mut table = self.lock();
        let entry = table.entry_mut(handle).ok_or(CfgError::BadHandle)?;
        if entry.destroyed {
            return Ok(());
        }
        entry.destroyed = true;
        let freed = if entry.refs == 0 {
            table.vacate(handle)
        } else {
            None
        };
        drop(table);
        debug!(target: REGISTRY_TARGET, %handle, "handle marked destroyed");
        if let Some(entry) = freed {
            self.free(handle, &entry);
        }
        Ok(())
    }

    fn release(&self, handle: Handle) {
        let mut table = self.lock();
        let Some(entry) = table.entry_mut(handle) else {
            return;
        };
        debug_assert!(entry.refs > 0, "handle reference count underflow");
        entry.refs = entry.refs.saturating_sub(1);
        let freed = if entry.refs == 0 && entry.destroyed {
            table.vacate(handle)
        } else {
            None
        };
        drop(table);
        if let Some(entry) = freed {
            self.free(handle, &entry);
        }
    }

    fn free(&self, handle: Handle, entry: &Entry<T>) {
        (self.destructor)(&entry.instance);
        debug!(target: REGISTRY_TARGET, %handle, "handle freed");
    }

    #[cfg(test)]
    fn live_entries(&self) -> usize {
        self.lock()
            .slots
            .iter()
            .filter(|slot| slot.entry.is_some())
            .count()
    }
}

/// Counted reference to a registered instance.
///
/// Dropping the guard releases the reference.
pub(crate) struct InstanceRef<'a, T> {
    db: &'a HandleDatabase<T>,
    handle: Handle,
    instance: Arc<T>,
}

impl<T> InstanceRef<'_, T> {
    pub(crate) const fn handle(&self) -> Handle {
        self.handle
    }
}

impl<T> Deref for InstanceRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.instance
    }
}

impl<T> Drop for InstanceRef<'_, T> {
    fn drop(&mut self) {
        self.db.release(self.handle);
    }
}
