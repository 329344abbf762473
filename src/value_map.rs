//! ValueMap: the public container over BucketStore.

use crate::bucket_store::{self, BucketStore, SetOutcome};
use crate::config::Layout;
use crate::error::{ConfigError, InsertError};
use crate::fingerprint::Digest;
use crate::value::Value;
use core::fmt;

/// A map from arbitrary [`Value`] keys to `V`.
///
/// Each call computes the key's [`Digest`] once and hands it to the bucket
/// store. `len()` is the live count of distinct fingerprints.
pub struct ValueMap<V = Value> {
    store: BucketStore<V>,
    size: usize,
}

impl<V> ValueMap<V> {
    pub fn new() -> Self {
        Self {
            store: BucketStore::new(),
            size: 0,
        }
    }

    pub fn with_layout(layout: Layout) -> Result<Self, ConfigError> {
        Ok(Self {
            store: BucketStore::with_layout(layout)?,
            size: 0,
        })
    }

    /// Build from `(key, value)` pairs; later pairs win on equal keys.
    pub fn from_entries<I>(entries: I) -> Result<Self, InsertError>
    where
        I: IntoIterator<Item = (Value, V)>,
    {
        let mut map = Self::new();
        map.extend_pairs(entries)?;
        Ok(map)
    }

    pub fn layout(&self) -> Layout {
        self.store.layout()
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[deprecated(note = "use `len`")]
    pub fn count(&self) -> usize {
        self.len()
    }

    /// Entry count obtained by walking every bucket chain. Always equal to
    /// `len()`.
    pub fn walk_len(&self) -> usize {
        self.store.walk_len()
    }

    pub fn get(&self, key: &Value) -> Option<&V> {
        self.get_key_value(key).map(|(_, v)| v)
    }

    /// The stored key (the most recently set representation) and its value.
    pub fn get_key_value(&self, key: &Value) -> Option<(&Value, &V)> {
        let digest = Digest::lookup(key)?;
        self.store.get(&digest)
    }

    pub fn get_mut(&mut self, key: &Value) -> Option<&mut V> {
        let digest = Digest::lookup(key)?;
        self.store.get_mut(&digest)
    }

    pub fn has(&self, key: &Value) -> bool {
        Digest::lookup(key).is_some_and(|d| self.store.contains(&d))
    }

    /// Insert or replace, returning the previous value.
    pub fn insert(&mut self, key: Value, value: V) -> Result<Option<V>, InsertError> {
        let digest = Digest::of(&key)?;
        Ok(self.insert_digest(&digest, key, value))
    }

    fn insert_digest(&mut self, digest: &Digest, key: Value, value: V) -> Option<V> {
        match self.store.set(digest, key, value) {
            SetOutcome::Inserted => {
                self.size += 1;
                None
            }
            SetOutcome::Replaced(old) => Some(old),
        }
    }

    /// Chainable insert.
    pub fn set(&mut self, key: Value, value: V) -> Result<&mut Self, InsertError> {
        self.insert(key, value)?;
        Ok(self)
    }

    /// Remove `key`, returning its value. Absent keys are a no-op.
    pub fn take(&mut self, key: &Value) -> Option<V> {
        let digest = Digest::lookup(key)?;
        let (_, value) = self.store.remove(&digest)?;
        self.size -= 1;
        Some(value)
    }

    /// Chainable remove. Absent keys are a no-op.
    pub fn remove(&mut self, key: &Value) -> &mut Self {
        self.take(key);
        self
    }

    /// Alias of [`ValueMap::remove`].
    pub fn delete(&mut self, key: &Value) -> &mut Self {
        self.remove(key)
    }

    /// First key, in enumeration order, whose value equals `value`.
    pub fn search(&self, value: &V) -> Option<&Value>
    where
        V: PartialEq,
    {
        self.store.search(value)
    }

    /// Replace the store with a fresh one of the same layout. Surrogate
    /// identities of object keys are unaffected.
    pub fn clear(&mut self) -> &mut Self {
        tracing::debug!(entries = self.size, "clearing map");
        self.store.clear();
        self.size = 0;
        self
    }

    /// Insert every pair, all or nothing with respect to key errors: the
    /// digests are computed first, so a rejected key leaves the map as it
    /// was.
    pub fn extend_pairs<I>(&mut self, entries: I) -> Result<&mut Self, InsertError>
    where
        I: IntoIterator<Item = (Value, V)>,
    {
        let staged = entries
            .into_iter()
            .map(|(k, v)| Digest::of(&k).map(|d| (d, k, v)))
            .collect::<Result<Vec<_>, _>>()?;
        for (digest, key, value) in staged {
            self.insert_digest(&digest, key, value);
        }
        Ok(self)
    }

    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            inner: self.store.iter(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }

    /// Owned snapshot of every `(key, value)` in enumeration order.
    pub fn entries(&self) -> Vec<(Value, V)>
    where
        V: Clone,
    {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// Visit `(value, key)` in enumeration order.
    pub fn for_each<F>(&self, mut visit: F) -> &Self
    where
        F: FnMut(&V, &Value),
    {
        for (k, v) in self.iter() {
            visit(v, k);
        }
        self
    }
}

impl<V: Clone> ValueMap<V> {
    /// Merge `other` into `self`; `other` wins on shared keys.
    pub fn copy(&mut self, other: &ValueMap<V>) -> &mut Self {
        for (key, value, stored) in other.store.iter_with_digest() {
            // Keys held by a live map are always resolvable; the stored
            // digest only covers a registry that lost track of them.
            let digest = Digest::lookup(key).unwrap_or(stored);
            self.insert_digest(&digest, key.clone(), value.clone());
        }
        self
    }

    /// Copy constructor.
    pub fn from_map(other: &ValueMap<V>) -> Self {
        other.clone()
    }

    /// Rebuild into a store of a different layout.
    pub fn clone_with_layout(&self, layout: Layout) -> Result<Self, ConfigError> {
        let mut map = Self::with_layout(layout)?;
        map.copy(self);
        Ok(map)
    }
}

impl ValueMap<Value> {
    /// Build from alternating `key, value, key, value, ...` arguments.
    pub fn from_flat<I>(args: I) -> Result<Self, InsertError>
    where
        I: IntoIterator<Item = Value>,
    {
        let mut map = Self::new();
        map.multi(args)?;
        Ok(map)
    }

    /// Bulk insert of alternating keys and values. An odd number of
    /// arguments is rejected and nothing is inserted.
    pub fn multi<I>(&mut self, args: I) -> Result<&mut Self, InsertError>
    where
        I: IntoIterator<Item = Value>,
    {
        let args: Vec<Value> = args.into_iter().collect();
        if args.len() % 2 != 0 {
            return Err(InsertError::UnpairedKey { count: args.len() });
        }
        let mut it = args.into_iter();
        let mut pairs = Vec::with_capacity(it.len() / 2);
        while let (Some(k), Some(v)) = (it.next(), it.next()) {
            pairs.push((k, v));
        }
        self.extend_pairs(pairs)
    }

    /// Build from a sequence of `[key, value]` pairs. The input is flattened
    /// one level, so pairs and loose alternating arguments may be mixed:
    /// `[[k1, v1], k2, v2]` is accepted.
    pub fn from_nested(input: &Value) -> Result<Self, InsertError> {
        let items = input
            .as_sequence()
            .ok_or(InsertError::UnpairedKey { count: 1 })?;
        let mut flat = Vec::with_capacity(items.len() * 2);
        for item in items.iter() {
            match item.as_sequence() {
                Some(inner) => flat.extend(inner.iter().cloned()),
                None => flat.push(item.clone()),
            }
        }
        Self::from_flat(flat)
    }

    /// Entries as a sequence of `[key, value]` pairs; the inverse of
    /// [`ValueMap::from_nested`].
    pub fn to_nested(&self) -> Value {
        Value::sequence(
            self.iter()
                .map(|(k, v)| Value::sequence([k.clone(), v.clone()])),
        )
    }
}

impl<V: Clone> Clone for ValueMap<V> {
    /// Re-inserts every entry into a fresh store of the same layout.
    fn clone(&self) -> Self {
        let mut map = Self {
            store: BucketStore::with_layout(self.layout()).unwrap_or_default(),
            size: 0,
        };
        map.copy(self);
        map
    }
}

impl<V> Default for ValueMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Same keys mapping to equal values.
impl<V: PartialEq> PartialEq for ValueMap<V> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<V: fmt::Debug> fmt::Debug for ValueMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Iterator over `(key, value)` in enumeration order. Every call to
/// `iter()` starts a fresh traversal.
pub struct Iter<'a, V> {
    inner: bucket_store::Iter<'a, V>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (&'a Value, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<V> ExactSizeIterator for Iter<'_, V> {}

impl<'a, V> IntoIterator for &'a ValueMap<V> {
    type Item = (&'a Value, &'a V);
    type IntoIter = Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ObjectRef;

    /// Invariant: mutators hand back the same map for chaining.
    #[test]
    fn chaining() {
        let mut m: ValueMap<i32> = ValueMap::new();
        m.set("a".into(), 1)
            .unwrap()
            .set("b".into(), 2)
            .unwrap()
            .remove(&"a".into())
            .delete(&"zzz".into());
        assert_eq!(m.len(), 1);
        let n = m.clear().len();
        assert_eq!(n, 0);
        let mut visited = 0;
        m.set(Value::Null, 0).unwrap().for_each(|_, _| visited += 1);
        assert_eq!(visited, 1);
    }

    /// Invariant: `size` tracks distinct fingerprints through inserts,
    /// overwrites and removals, and agrees with a full walk.
    #[test]
    #[allow(deprecated)]
    fn size_accounting() {
        let mut m: ValueMap<i32> = ValueMap::new();
        for i in 0..10 {
            m.set(Value::Int(i), 0).unwrap();
        }
        assert_eq!(m.len(), 10);
        for _ in 0..5 {
            m.set(Value::Float(3.0), 1).unwrap();
        }
        assert_eq!(m.len(), 10);
        m.remove(&Value::Int(3)).remove(&Value::Int(3));
        assert_eq!(m.len(), 9);
        assert_eq!(m.count(), m.len());
        assert_eq!(m.walk_len(), m.len());
    }

    /// Invariant: lookups of never-stored objects do not stamp them.
    #[test]
    fn lookup_of_unseen_object_does_not_stamp() {
        let m: ValueMap<i32> = ValueMap::new();
        let o = ObjectRef::new();
        assert!(!m.has(&Value::Object(o.clone())));
        assert_eq!(m.get(&Value::Object(o.clone())), None);
        assert_eq!(crate::identity::surrogate_id(&o), None);
    }

    /// Invariant: a bulk insert with a rejected key inserts nothing.
    #[test]
    fn extend_pairs_is_all_or_nothing() {
        let mut m: ValueMap<i32> = ValueMap::new();
        let frozen = ObjectRef::new();
        frozen.freeze();
        let res = m.extend_pairs([
            (Value::Int(1), 1),
            (Value::Object(frozen), 2),
        ]);
        assert_eq!(res.err(), Some(InsertError::KeyNotExtensible));
        assert!(m.is_empty());
    }

    /// Invariant: odd flat argument lists are rejected without inserting.
    #[test]
    fn multi_rejects_unpaired() {
        let mut m: ValueMap = ValueMap::new();
        let res = m.multi(["k".into(), "v".into(), "dangling".into()]);
        assert_eq!(res.err(), Some(InsertError::UnpairedKey { count: 3 }));
        assert!(m.is_empty());
        m.multi(Vec::new()).unwrap();
        assert!(m.is_empty());
    }

    /// Invariant: a non-sequence nested input is one unpaired argument.
    #[test]
    fn from_nested_requires_sequence() {
        assert_eq!(
            ValueMap::from_nested(&Value::Int(1)).err(),
            Some(InsertError::UnpairedKey { count: 1 })
        );
        let m = ValueMap::from_nested(&Value::sequence([
            Value::sequence(["k1".into(), "v1".into()]),
            "k2".into(),
            "v2".into(),
        ]))
        .unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m.get(&"k2".into()), Some(&Value::text("v2")));
    }

    /// Invariant: rebuilding into another layout keeps every entry.
    #[test]
    fn clone_with_layout_keeps_entries() {
        let mut m: ValueMap<i32> = ValueMap::new();
        for i in 0..100 {
            m.set(Value::Int(i), i as i32).unwrap();
        }
        let small = m
            .clone_with_layout(Layout::new().with_width_bits(2).with_depth(1))
            .unwrap();
        assert_eq!(small.layout().width_bits(), 2);
        assert_eq!(small, m);
        assert_eq!(small.walk_len(), 100);
    }

    #[test]
    fn debug_renders_as_map() {
        let mut m: ValueMap<i32> = ValueMap::new();
        m.set(Value::Bool(true), 1).unwrap();
        assert_eq!(format!("{:?}", m), "{Bool(true): 1}");
    }
}
