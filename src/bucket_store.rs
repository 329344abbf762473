//! BucketStore: layered fixed-width tables with chained buckets.
//!
//! Every layer has `1 << width_bits` slots indexed by successive bit
//! groups of the 32-bit hash (low bits first). Above the last level a slot
//! is empty or holds a nested layer; at the last level it is empty or
//! holds the head of a chain. Chain nodes live in a `SlotMap` arena and
//! link forward by arena key; they are walked iteratively.
//!
//! Matching is decided by fingerprint equality (the stored hash is only a
//! fast reject). A chain keeps insertion order: the first inserted node is
//! the head and is checked first. Enumeration order is slot-index order,
//! recursing into nested layers, chain order within a slot.
//!
//! Removing the last node of a chain empties its slot; a nested layer left
//! with no occupied slot is collapsed back to an empty slot, so churn does
//! not accumulate dead layers.

use crate::config::Layout;
use crate::error::ConfigError;
use crate::fingerprint::{Digest, Fingerprint};
use crate::value::Value;
use slotmap::{DefaultKey, SlotMap};

#[derive(Debug)]
struct Node<V> {
    hash: i32,
    fingerprint: Fingerprint,
    key: Value,
    value: V,
    next: Option<DefaultKey>,
}

impl<V> Node<V> {
    fn new(digest: &Digest, key: Value, value: V) -> Self {
        Self {
            hash: digest.hash(),
            fingerprint: digest.fingerprint().clone(),
            key,
            value,
            next: None,
        }
    }

    #[inline]
    fn matches(&self, digest: &Digest) -> bool {
        self.hash == digest.hash() && self.fingerprint == *digest.fingerprint()
    }
}

#[derive(Debug)]
enum Slot {
    Empty,
    Chain(DefaultKey),
    Layer(Box<Layer>),
}

#[derive(Debug)]
struct Layer {
    slots: Box<[Slot]>,
    occupied: usize,
}

impl Layer {
    fn new(width: usize) -> Self {
        Self {
            slots: std::iter::repeat_with(|| Slot::Empty).take(width).collect(),
            occupied: 0,
        }
    }
}

/// Result of [`BucketStore::set`].
#[derive(Debug, PartialEq, Eq)]
pub enum SetOutcome<V> {
    Inserted,
    /// The fingerprint was present; carries the previous value.
    Replaced(V),
}

pub struct BucketStore<V> {
    layout: Layout,
    root: Layer,
    nodes: SlotMap<DefaultKey, Node<V>>,
}

impl<V> BucketStore<V> {
    pub fn new() -> Self {
        Self::from_valid(Layout::default())
    }

    pub fn with_layout(layout: Layout) -> Result<Self, ConfigError> {
        Ok(Self::from_valid(layout.validate()?))
    }

    fn from_valid(layout: Layout) -> Self {
        Self {
            layout,
            root: Layer::new(layout.slots()),
            nodes: SlotMap::with_key(),
        }
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Number of stored nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Count entries by walking every layer and chain.
    pub fn walk_len(&self) -> usize {
        self.iter().count()
    }

    /// Drop every entry and every nested layer.
    pub fn clear(&mut self) {
        self.root = Layer::new(self.layout.slots());
        self.nodes.clear();
    }

    /// Head of the chain `digest` routes to.
    fn chain_head(&self, digest: &Digest) -> Option<DefaultKey> {
        let mut layer = &self.root;
        let mut level = 0;
        loop {
            match &layer.slots[self.layout.slot(digest.hash(), level)] {
                Slot::Empty => return None,
                Slot::Chain(head) => return Some(*head),
                Slot::Layer(child) => {
                    layer = &**child;
                    level += 1;
                }
            }
        }
    }

    fn find(&self, digest: &Digest) -> Option<DefaultKey> {
        let mut cur = self.chain_head(digest);
        while let Some(k) = cur {
            let node = self.nodes.get(k)?;
            if node.matches(digest) {
                return Some(k);
            }
            cur = node.next;
        }
        None
    }

    pub fn get(&self, digest: &Digest) -> Option<(&Value, &V)> {
        let k = self.find(digest)?;
        self.nodes.get(k).map(|n| (&n.key, &n.value))
    }

    pub fn get_mut(&mut self, digest: &Digest) -> Option<&mut V> {
        let k = self.find(digest)?;
        self.nodes.get_mut(k).map(|n| &mut n.value)
    }

    pub fn contains(&self, digest: &Digest) -> bool {
        self.find(digest).is_some()
    }

    /// Insert or replace. On replace the stored key is refreshed to `key`,
    /// so enumeration reflects the most recently set representation.
    pub fn set(&mut self, digest: &Digest, key: Value, value: V) -> SetOutcome<V> {
        let layout = self.layout;
        let hash = digest.hash();
        let mut layer = &mut self.root;
        let mut level = 0;
        loop {
            let idx = layout.slot(hash, level);
            if matches!(layer.slots[idx], Slot::Empty) {
                layer.occupied += 1;
                if level + 1 >= layout.depth() {
                    let k = self.nodes.insert(Node::new(digest, key, value));
                    layer.slots[idx] = Slot::Chain(k);
                    return SetOutcome::Inserted;
                }
                layer.slots[idx] = Slot::Layer(Box::new(Layer::new(layout.slots())));
                tracing::trace!(level = level + 1, slot = idx, "created bucket layer");
            }
            match &mut layer.slots[idx] {
                Slot::Layer(child) => {
                    layer = &mut **child;
                    level += 1;
                }
                Slot::Chain(head) => {
                    let head = *head;
                    return chain_set(&mut self.nodes, head, digest, key, value);
                }
                Slot::Empty => unreachable!("slot filled above"),
            }
        }
    }

    pub fn remove(&mut self, digest: &Digest) -> Option<(Value, V)> {
        remove_in(&mut self.root, &mut self.nodes, self.layout, digest, 0)
    }

    /// First key whose value equals `value`, in enumeration order.
    pub fn search(&self, value: &V) -> Option<&Value>
    where
        V: PartialEq,
    {
        self.iter().find(|(_, v)| *v == value).map(|(k, _)| k)
    }

    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            raw: self.raw_iter(),
        }
    }

    /// Enumeration-order entries together with their stored digests.
    pub(crate) fn iter_with_digest(&self) -> impl Iterator<Item = (&Value, &V, Digest)> + '_ {
        self.raw_iter().map(|n| {
            (
                &n.key,
                &n.value,
                Digest::from_parts(n.hash, n.fingerprint.clone()),
            )
        })
    }

    fn raw_iter(&self) -> RawIter<'_, V> {
        RawIter {
            nodes: &self.nodes,
            stack: vec![(&self.root, 0)],
            chain: None,
            remaining: self.nodes.len(),
        }
    }

    /// Structural self-check: occupancy counters, level discipline, and
    /// that every arena node is reachable exactly once. Returns the number
    /// of reachable nodes.
    #[cfg(test)]
    pub(crate) fn audit(&self) -> usize {
        fn walk<V>(
            layer: &Layer,
            level: u32,
            store: &BucketStore<V>,
            seen: &mut std::collections::HashSet<DefaultKey>,
        ) {
            let last = level + 1 >= store.layout.depth();
            let occupied = layer
                .slots
                .iter()
                .filter(|s| !matches!(s, Slot::Empty))
                .count();
            assert_eq!(occupied, layer.occupied, "occupancy counter drift");
            if level > 0 {
                assert!(occupied > 0, "empty nested layer left behind");
            }
            for (idx, slot) in layer.slots.iter().enumerate() {
                match slot {
                    Slot::Empty => {}
                    Slot::Layer(child) => {
                        assert!(!last, "layer below the last level");
                        walk(child, level + 1, store, seen);
                    }
                    Slot::Chain(head) => {
                        assert!(last, "chain above the last level");
                        let mut cur = Some(*head);
                        while let Some(k) = cur {
                            let node = store.nodes.get(k).expect("dangling chain link");
                            assert_eq!(
                                store.layout.slot(node.hash, level),
                                idx,
                                "node routed to the wrong slot"
                            );
                            assert!(seen.insert(k), "node reachable twice");
                            cur = node.next;
                        }
                    }
                }
            }
        }
        let mut seen = std::collections::HashSet::new();
        walk(&self.root, 0, self, &mut seen);
        assert_eq!(seen.len(), self.nodes.len(), "unreachable arena nodes");
        seen.len()
    }
}

impl<V> Default for BucketStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

fn chain_set<V>(
    nodes: &mut SlotMap<DefaultKey, Node<V>>,
    head: DefaultKey,
    digest: &Digest,
    key: Value,
    value: V,
) -> SetOutcome<V> {
    let mut tail = head;
    loop {
        let node = &mut nodes[tail];
        if node.matches(digest) {
            node.key = key;
            return SetOutcome::Replaced(std::mem::replace(&mut node.value, value));
        }
        match node.next {
            Some(next) => tail = next,
            None => break,
        }
    }
    let k = nodes.insert(Node::new(digest, key, value));
    nodes[tail].next = Some(k);
    SetOutcome::Inserted
}

/// Unlink the matching node from the chain at `head`. Returns the removed
/// entry and the chain's new head (`None` when the chain is now empty).
fn chain_remove<V>(
    nodes: &mut SlotMap<DefaultKey, Node<V>>,
    head: DefaultKey,
    digest: &Digest,
) -> Option<((Value, V), Option<DefaultKey>)> {
    let mut prev: Option<DefaultKey> = None;
    let mut cur = Some(head);
    while let Some(k) = cur {
        let node = nodes.get(k)?;
        let next = node.next;
        if node.matches(digest) {
            let removed = nodes.remove(k)?;
            let entry = (removed.key, removed.value);
            return match prev {
                None => Some((entry, next)),
                Some(p) => {
                    nodes[p].next = next;
                    Some((entry, Some(head)))
                }
            };
        }
        prev = Some(k);
        cur = next;
    }
    None
}

fn remove_in<V>(
    layer: &mut Layer,
    nodes: &mut SlotMap<DefaultKey, Node<V>>,
    layout: Layout,
    digest: &Digest,
    level: u32,
) -> Option<(Value, V)> {
    let idx = layout.slot(digest.hash(), level);
    let (entry, emptied) = match &mut layer.slots[idx] {
        Slot::Empty => return None,
        Slot::Layer(child) => {
            let entry = remove_in(child, nodes, layout, digest, level + 1)?;
            let emptied = child.occupied == 0;
            if emptied {
                tracing::trace!(level = level + 1, slot = idx, "collapsed empty bucket layer");
            }
            (entry, emptied)
        }
        Slot::Chain(head) => {
            let (entry, new_head) = chain_remove(nodes, *head, digest)?;
            match new_head {
                Some(h) => {
                    *head = h;
                    (entry, false)
                }
                None => (entry, true),
            }
        }
    };
    if emptied {
        layer.slots[idx] = Slot::Empty;
        layer.occupied -= 1;
    }
    Some(entry)
}

struct RawIter<'a, V> {
    nodes: &'a SlotMap<DefaultKey, Node<V>>,
    // (layer, next slot index to visit)
    stack: Vec<(&'a Layer, usize)>,
    chain: Option<DefaultKey>,
    remaining: usize,
}

impl<'a, V> Iterator for RawIter<'a, V> {
    type Item = &'a Node<V>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(k) = self.chain {
                let node = self.nodes.get(k)?;
                self.chain = node.next;
                self.remaining = self.remaining.saturating_sub(1);
                return Some(node);
            }
            let top = self.stack.last_mut()?;
            let layer: &'a Layer = top.0;
            let idx = top.1;
            if idx >= layer.slots.len() {
                self.stack.pop();
                continue;
            }
            top.1 += 1;
            match &layer.slots[idx] {
                Slot::Empty => {}
                Slot::Chain(head) => self.chain = Some(*head),
                Slot::Layer(child) => self.stack.push((&**child, 0)),
            }
        }
    }
}

/// Enumeration-order iterator over `(key, value)`.
pub struct Iter<'a, V> {
    raw: RawIter<'a, V>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (&'a Value, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.raw.next().map(|n| (&n.key, &n.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.raw.remaining, Some(self.raw.remaining))
    }
}

impl<V> ExactSizeIterator for Iter<'_, V> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::SurrogateRegistry;
    use crate::value::ObjectRef;

    fn digest(reg: &mut SurrogateRegistry, v: &Value) -> Digest {
        Digest::of_in(reg, v).unwrap()
    }

    /// Layout where every key shares one of two chains.
    fn tiny() -> BucketStore<i32> {
        BucketStore::with_layout(Layout::new().with_width_bits(1).with_depth(1)).unwrap()
    }

    /// Invariant: set/get/contains agree and replacing keeps one entry.
    #[test]
    fn set_get_replace() {
        let mut reg = SurrogateRegistry::new();
        let mut s: BucketStore<i32> = BucketStore::new();
        let k = Value::text("key");
        let d = digest(&mut reg, &k);
        assert_eq!(s.set(&d, k.clone(), 1), SetOutcome::Inserted);
        assert_eq!(s.get(&d).map(|(_, v)| *v), Some(1));
        assert!(s.contains(&d));
        assert_eq!(s.set(&d, k, 2), SetOutcome::Replaced(1));
        assert_eq!(s.len(), 1);
        assert_eq!(s.get(&d).map(|(_, v)| *v), Some(2));
        *s.get_mut(&d).unwrap() += 1;
        assert_eq!(s.get(&d).map(|(_, v)| *v), Some(3));
        assert_eq!(s.audit(), 1);
    }

    /// Invariant: replacing refreshes the stored key to the latest
    /// fingerprint-equal representation.
    #[test]
    fn replace_refreshes_key() {
        let mut reg = SurrogateRegistry::new();
        let mut s: BucketStore<&str> = BucketStore::new();
        let d = digest(&mut reg, &Value::Int(1));
        s.set(&d, Value::Int(1), "a");
        let d2 = digest(&mut reg, &Value::Float(1.0));
        assert_eq!(d, d2);
        s.set(&d2, Value::Float(1.0), "b");
        let (k, v) = s.get(&d).unwrap();
        assert!(matches!(k, Value::Float(_)));
        assert_eq!(*v, "b");
    }

    /// Invariant: under heavy collisions every key resolves to its own
    /// value, and removal from head, middle and tail keeps chains intact.
    #[test]
    fn collisions_resolve_by_fingerprint() {
        let mut reg = SurrogateRegistry::new();
        let mut s = tiny();
        let keys: Vec<Value> = (0..40).map(|i| Value::text(&format!("k{}", i))).collect();
        let digests: Vec<Digest> = keys.iter().map(|k| digest(&mut reg, k)).collect();
        for (i, (k, d)) in keys.iter().zip(&digests).enumerate() {
            assert_eq!(s.set(d, k.clone(), i as i32), SetOutcome::Inserted);
        }
        assert_eq!(s.audit(), 40);
        for (i, d) in digests.iter().enumerate() {
            assert_eq!(s.get(d).map(|(_, v)| *v), Some(i as i32));
        }
        for i in [0usize, 39, 20, 1, 38] {
            let (k, v) = s.remove(&digests[i]).unwrap();
            assert_eq!(k, keys[i]);
            assert_eq!(v, i as i32);
            assert!(!s.contains(&digests[i]));
            s.audit();
        }
        assert_eq!(s.len(), 35);
        assert_eq!(s.walk_len(), 35);
        for (i, d) in digests.iter().enumerate() {
            let expected = if [0usize, 39, 20, 1, 38].contains(&i) {
                None
            } else {
                Some(i as i32)
            };
            assert_eq!(s.get(d).map(|(_, v)| *v), expected);
        }
    }

    /// Invariant: removing an absent key is a no-op.
    #[test]
    fn remove_absent_is_noop() {
        let mut reg = SurrogateRegistry::new();
        let mut s = tiny();
        let a = digest(&mut reg, &Value::Int(1));
        let b = digest(&mut reg, &Value::Int(2));
        assert!(s.remove(&a).is_none());
        s.set(&a, Value::Int(1), 1);
        assert!(s.remove(&b).is_none());
        assert_eq!(s.len(), 1);
        s.audit();
    }

    /// Invariant: nested layers are created on demand and collapsed once
    /// their last entry is removed.
    #[test]
    fn nested_layers_collapse() {
        let mut reg = SurrogateRegistry::new();
        let mut s: BucketStore<i32> =
            BucketStore::with_layout(Layout::new().with_width_bits(2).with_depth(4)).unwrap();
        let keys: Vec<Value> = (0..64).map(Value::Int).collect();
        let digests: Vec<Digest> = keys.iter().map(|k| digest(&mut reg, k)).collect();
        for (k, d) in keys.iter().zip(&digests) {
            s.set(d, k.clone(), 0);
        }
        assert_eq!(s.audit(), 64);
        for d in &digests {
            s.remove(d).unwrap();
            s.audit();
        }
        assert!(s.is_empty());
        assert_eq!(s.root.occupied, 0);
    }

    /// Invariant: enumeration visits slots in index order and chains in
    /// insertion order.
    #[test]
    fn enumeration_order() {
        let mut reg = SurrogateRegistry::new();
        let mut s = tiny();
        let keys: Vec<Value> = (0..10).map(Value::Int).collect();
        for (i, k) in keys.iter().enumerate() {
            let d = digest(&mut reg, k);
            s.set(&d, k.clone(), i as i32);
        }
        let layout = s.layout();
        let mut expected: Vec<(usize, i32)> = keys
            .iter()
            .enumerate()
            .map(|(i, k)| (layout.slot(digest(&mut reg, k).hash(), 0), i as i32))
            .collect();
        // Stable sort keeps insertion order within a slot.
        expected.sort_by_key(|(slot, _)| *slot);
        let seen: Vec<i32> = s.iter().map(|(_, v)| *v).collect();
        let want: Vec<i32> = expected.into_iter().map(|(_, v)| v).collect();
        assert_eq!(seen, want);
        assert_eq!(s.iter().len(), 10);
        for (k, _, stored) in s.iter_with_digest() {
            assert_eq!(stored, digest(&mut reg, k));
        }
    }

    /// Invariant: search returns the first key in enumeration order whose
    /// value matches, or `None`.
    #[test]
    fn search_by_value() {
        let mut reg = SurrogateRegistry::new();
        let mut s: BucketStore<&str> = BucketStore::new();
        let o = Value::Object(ObjectRef::new());
        let d = digest(&mut reg, &o);
        s.set(&d, o.clone(), "value");
        assert_eq!(s.search(&"value"), Some(&o));
        assert_eq!(s.search(&"missing"), None);
    }

    /// Invariant: clear empties the store and it remains usable.
    #[test]
    fn clear_resets() {
        let mut reg = SurrogateRegistry::new();
        let mut s: BucketStore<i32> = BucketStore::new();
        let d = digest(&mut reg, &Value::Null);
        s.set(&d, Value::Null, 1);
        s.clear();
        assert!(s.is_empty());
        assert!(!s.contains(&d));
        assert_eq!(s.audit(), 0);
        s.set(&d, Value::Null, 2);
        assert_eq!(s.get(&d).map(|(_, v)| *v), Some(2));
    }
}
