//! Surrogate identities for object keys.
//!
//! Objects have no value equality, so each object used as a key gets an
//! integer id from a side table. The table maps the object's address to
//! its id and holds a `Weak` back-reference: the object itself is never
//! touched, and while the `Weak` lives the address cannot be reused by
//! another object. Entries for dead objects are pruned lazily.
//!
//! Ids are assigned monotonically from 1 and never reset for the lifetime
//! of a registry. One registry exists per thread (`Rc` handles cannot
//! cross threads), so ids are comparable across every map on a thread.

use crate::error::InsertError;
use crate::value::{ObjectData, ObjectRef};
use core::cell::RefCell;
use hashbrown::HashMap;
use std::rc::Weak;

const MIN_PRUNE_THRESHOLD: usize = 64;

struct Stamp {
    id: u64,
    owner: Weak<ObjectData>,
}

pub struct SurrogateRegistry {
    next: u64,
    stamps: HashMap<usize, Stamp>,
    prune_at: usize,
}

impl SurrogateRegistry {
    pub fn new() -> Self {
        Self {
            next: 0,
            stamps: HashMap::new(),
            prune_at: MIN_PRUNE_THRESHOLD,
        }
    }

    /// The id of `obj`, if it has been stamped.
    pub fn peek(&self, obj: &ObjectRef) -> Option<u64> {
        let stamp = self.stamps.get(&obj.addr())?;
        debug_assert!(obj.is(&stamp.owner));
        Some(stamp.id)
    }

    /// The id of `obj`, stamping a fresh one on first use.
    ///
    /// A frozen object that was never stamped cannot be given an identity.
    pub fn stamp(&mut self, obj: &ObjectRef) -> Result<u64, InsertError> {
        if let Some(id) = self.peek(obj) {
            return Ok(id);
        }
        if obj.is_frozen() {
            tracing::debug!(object = ?obj, "rejecting frozen object key");
            return Err(InsertError::KeyNotExtensible);
        }
        if self.stamps.len() >= self.prune_at {
            self.prune();
        }
        self.next += 1;
        let id = self.next;
        self.stamps.insert(
            obj.addr(),
            Stamp {
                id,
                owner: obj.downgrade(),
            },
        );
        tracing::trace!(id, "stamped surrogate identity");
        Ok(id)
    }

    /// Number of tracked objects, dead ones included until pruned.
    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    /// Highest id assigned so far.
    pub fn last_id(&self) -> u64 {
        self.next
    }

    /// Drop entries whose objects are gone.
    pub fn prune(&mut self) {
        let before = self.stamps.len();
        self.stamps.retain(|_, s| s.owner.strong_count() > 0);
        self.prune_at = (self.stamps.len() * 2).max(MIN_PRUNE_THRESHOLD);
        tracing::debug!(
            before,
            after = self.stamps.len(),
            "pruned surrogate registry"
        );
    }
}

impl Default for SurrogateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    static REGISTRY: RefCell<SurrogateRegistry> = RefCell::new(SurrogateRegistry::new());
}

/// Run `f` against this thread's registry.
pub fn with_registry<R>(f: impl FnOnce(&mut SurrogateRegistry) -> R) -> R {
    REGISTRY.with(|r| f(&mut r.borrow_mut()))
}

/// Surrogate id of `obj` in this thread's registry, if stamped.
pub fn surrogate_id(obj: &ObjectRef) -> Option<u64> {
    REGISTRY.with(|r| r.borrow().peek(obj))
}

/// Stamp `obj` in this thread's registry.
pub fn stamp(obj: &ObjectRef) -> Result<u64, InsertError> {
    with_registry(|r| r.stamp(obj))
}
