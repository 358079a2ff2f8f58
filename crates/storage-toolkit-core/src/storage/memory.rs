use super::models::{AttachmentGroup, StoragePolicy, StoredObject};
use super::ObjectStore;
use crate::error::Error;
use crate::hasher;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Condvar, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-process object store. Holds precomputed hashes rather than content.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    hash_gate: StoreGate,
    delete_gate: StoreGate,
}

#[derive(Default)]
struct Inner {
    objects: BTreeMap<String, MemoryObject>,
    policies: Vec<StoragePolicy>,
    groups: Vec<AttachmentGroup>,
    references: Option<HashMap<String, u32>>,
    unavailable: Option<String>,
}

struct MemoryObject {
    object: StoredObject,
    content_hash: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_object(&self, object: StoredObject, content_hash: impl Into<String>) {
        self.write().objects.insert(
            object.name.clone(),
            MemoryObject {
                object,
                content_hash: Some(content_hash.into()),
            },
        );
    }

    pub fn insert_object_with_content(&self, object: StoredObject, content: &[u8]) {
        self.insert_object(object, hasher::hash_data(content));
    }

    /// An object whose content cannot be hashed.
    pub fn insert_unreadable_object(&self, object: StoredObject) {
        self.write().objects.insert(
            object.name.clone(),
            MemoryObject {
                object,
                content_hash: None,
            },
        );
    }

    pub fn add_policy(&self, policy: StoragePolicy) {
        self.write().policies.push(policy);
    }

    pub fn add_group(&self, group: AttachmentGroup) {
        self.write().groups.push(group);
    }

    /// Marks references as counted; objects without an explicit count report zero.
    pub fn set_reference_count(&self, name: &str, count: u32) {
        self.write()
            .references
            .get_or_insert_with(HashMap::new)
            .insert(name.to_string(), count);
    }

    /// Make listings fail with `StorageUnavailable` until cleared with `None`.
    pub fn set_unavailable(&self, reason: Option<&str>) {
        self.write().unavailable = reason.map(str::to_string);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().objects.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.read().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Block `content_hash` calls until the returned gate is released.
    pub fn pause_hashing(&self) -> StoreGate {
        self.hash_gate.close();
        self.hash_gate.clone()
    }

    /// Block `delete_object` calls until the returned gate is released.
    pub fn pause_deletes(&self) -> StoreGate {
        self.delete_gate.close();
        self.delete_gate.clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> Result<(), Error> {
        match &self.read().unavailable {
            Some(reason) => Err(Error::StorageUnavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

impl ObjectStore for MemoryStore {
    fn list_objects(&self) -> Result<Vec<StoredObject>, Error> {
        self.check_available()?;
        Ok(self
            .read()
            .objects
            .values()
            .map(|entry| entry.object.clone())
            .collect())
    }

    fn list_policies(&self) -> Result<Vec<StoragePolicy>, Error> {
        self.check_available()?;
        Ok(self.read().policies.clone())
    }

    fn list_groups(&self) -> Result<Vec<AttachmentGroup>, Error> {
        self.check_available()?;
        Ok(self.read().groups.clone())
    }

    fn content_hash(&self, object: &StoredObject) -> Result<String, Error> {
        self.hash_gate.wait();
        self.read()
            .objects
            .get(&object.name)
            .and_then(|entry| entry.content_hash.clone())
            .ok_or_else(|| Error::NotFound(format!("content of {}", object.name)))
    }

    fn reference_count(&self, name: &str) -> Result<Option<u32>, Error> {
        Ok(self
            .read()
            .references
            .as_ref()
            .map(|counts| counts.get(name).copied().unwrap_or(0)))
    }

    fn delete_object(&self, name: &str) -> Result<(), Error> {
        self.delete_gate.wait();
        let mut inner = self.write();
        match inner.objects.remove(name) {
            Some(_) => {
                if let Some(counts) = inner.references.as_mut() {
                    counts.remove(name);
                }
                Ok(())
            }
            None => Err(Error::NotFound(name.to_string())),
        }
    }
}

/// Shared open/closed latch used to hold store calls at a known point.
#[derive(Clone, Default)]
pub struct StoreGate {
    state: Arc<(Mutex<GateState>, Condvar)>,
}

#[derive(Default)]
struct GateState {
    closed: bool,
    waiting: usize,
}

impl StoreGate {
    fn close(&self) {
        let (state, _) = &*self.state;
        state.lock().unwrap_or_else(PoisonError::into_inner).closed = true;
    }

    pub fn release(&self) {
        let (state, condvar) = &*self.state;
        state.lock().unwrap_or_else(PoisonError::into_inner).closed = false;
        condvar.notify_all();
    }

    /// Block until at least `count` calls are parked on the gate.
    pub fn wait_for_blocked(&self, count: usize) {
        let (state, condvar) = &*self.state;
        let guard = state.lock().unwrap_or_else(PoisonError::into_inner);
        let _parked = condvar
            .wait_while(guard, |s| s.waiting < count)
            .unwrap_or_else(PoisonError::into_inner);
    }

    fn wait(&self) {
        let (state, condvar) = &*self.state;
        let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
        guard.waiting += 1;
        condvar.notify_all();
        let mut guard = condvar
            .wait_while(guard, |s| s.closed)
            .unwrap_or_else(PoisonError::into_inner);
        guard.waiting -= 1;
    }
}
