#![cfg(test)]

// Property tests for BucketStore kept inside the crate so they can reach the
// structural audit.

use crate::bucket_store::{BucketStore, SetOutcome};
use crate::config::Layout;
use crate::fingerprint::{Digest, Fingerprint};
use crate::value::{ObjectRef, Value};
use proptest::prelude::*;
use std::collections::HashMap;

// Key recipes; objects are indices into a per-case pool so identity is
// shared across operations.
#[derive(Clone, Debug)]
enum KeySpec {
    Int(i8),
    Half(i8),
    Text(String),
    Seq(Vec<i8>),
    Null,
    Undefined,
    Bool(bool),
    Object(usize),
}

const OBJECTS: usize = 3;

fn build(recipe: &KeySpec, objects: &[ObjectRef]) -> Value {
    match recipe {
        KeySpec::Int(i) => Value::Int(*i as i64),
        KeySpec::Half(i) => Value::Float(*i as f64 / 2.0),
        KeySpec::Text(s) => Value::text(s),
        KeySpec::Seq(items) => Value::sequence(items.iter().map(|&i| Value::Int(i as i64))),
        KeySpec::Null => Value::Null,
        KeySpec::Undefined => Value::Undefined,
        KeySpec::Bool(b) => Value::Bool(*b),
        KeySpec::Object(i) => Value::Object(objects[*i].clone()),
    }
}

fn arb_key() -> impl Strategy<Value = KeySpec> {
    prop_oneof![
        (-4i8..4).prop_map(KeySpec::Int),
        (-8i8..8).prop_map(KeySpec::Half),
        "[a-c]{0,2}".prop_map(KeySpec::Text),
        proptest::collection::vec(0i8..3, 0..3).prop_map(KeySpec::Seq),
        Just(KeySpec::Null),
        Just(KeySpec::Undefined),
        any::<bool>().prop_map(KeySpec::Bool),
        (0..OBJECTS).prop_map(KeySpec::Object),
    ]
}

#[derive(Clone, Debug)]
enum Op {
    Set(KeySpec, i32),
    Remove(KeySpec),
    Get(KeySpec),
    Mutate(KeySpec, i32),
    Search(i32),
    Iterate,
    Clear,
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    let op = prop_oneof![
        6 => (arb_key(), 0i32..8).prop_map(|(k, v)| Op::Set(k, v)),
        3 => arb_key().prop_map(Op::Remove),
        3 => arb_key().prop_map(Op::Get),
        2 => (arb_key(), -3i32..3).prop_map(|(k, d)| Op::Mutate(k, d)),
        1 => (0i32..8).prop_map(Op::Search),
        1 => Just(Op::Iterate),
        1 => Just(Op::Clear),
    ];
    proptest::collection::vec(op, 1..80)
}

// Small geometries force shared slots, deep layers and long chains.
fn arb_layout() -> impl Strategy<Value = Layout> {
    (1u32..=3, 1u32..=3).prop_map(|(w, d)| Layout::new().with_width_bits(w).with_depth(d))
}

// Property: State-machine equivalence against std::collections::HashMap
// keyed by fingerprint.
// Invariants exercised across random operation sequences:
// - `set` reports Inserted exactly when the model lacks the fingerprint,
//   and Replaced(old) with the model's old value otherwise.
// - `get`/`contains` parity; the stored key digests to the probe's digest.
// - `remove` of an absent key is a no-op; of a present key returns its value.
// - `search` finds a key iff some model value matches.
// - `iter` yields each live entry exactly once.
// - After every op the structural audit holds and counts equal the model.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine(layout in arb_layout(), ops in arb_ops()) {
        let objects: Vec<ObjectRef> = (0..OBJECTS).map(|_| ObjectRef::new()).collect();
        let mut sut: BucketStore<i32> = BucketStore::with_layout(layout).unwrap();
        let mut model: HashMap<Fingerprint, i32> = HashMap::new();

        for op in ops {
            match op {
                Op::Set(recipe, v) => {
                    let key = build(&recipe, &objects);
                    let d = Digest::of(&key).unwrap();
                    let expected = model.insert(d.fingerprint().clone(), v);
                    match sut.set(&d, key, v) {
                        SetOutcome::Inserted => prop_assert!(expected.is_none()),
                        SetOutcome::Replaced(old) => prop_assert_eq!(Some(old), expected),
                    }
                }
                Op::Remove(recipe) => {
                    let d = Digest::of(&build(&recipe, &objects)).unwrap();
                    let removed = sut.remove(&d).map(|(_, v)| v);
                    prop_assert_eq!(removed, model.remove(d.fingerprint()));
                    prop_assert!(!sut.contains(&d));
                }
                Op::Get(recipe) => {
                    let d = Digest::of(&build(&recipe, &objects)).unwrap();
                    let got = sut.get(&d);
                    prop_assert_eq!(got.map(|(_, v)| *v), model.get(d.fingerprint()).copied());
                    prop_assert_eq!(sut.contains(&d), model.contains_key(d.fingerprint()));
                    if let Some((stored, _)) = got {
                        prop_assert_eq!(Digest::of(stored).unwrap(), d);
                    }
                }
                Op::Mutate(recipe, delta) => {
                    let d = Digest::of(&build(&recipe, &objects)).unwrap();
                    if let Some(v) = sut.get_mut(&d) {
                        *v += delta;
                        if let Some(m) = model.get_mut(d.fingerprint()) {
                            *m += delta;
                        } else {
                            prop_assert!(false, "store has a key the model lacks");
                        }
                    } else {
                        prop_assert!(!model.contains_key(d.fingerprint()));
                    }
                }
                Op::Search(v) => {
                    match sut.search(&v) {
                        Some(k) => {
                            let fp = Digest::of(k).unwrap().fingerprint().clone();
                            prop_assert_eq!(model.get(&fp), Some(&v));
                        }
                        None => prop_assert!(!model.values().any(|&m| m == v)),
                    }
                }
                Op::Iterate => {
                    let mut seen: HashMap<Fingerprint, i32> = HashMap::new();
                    for (k, v) in sut.iter() {
                        let fp = Digest::of(k).unwrap().fingerprint().clone();
                        prop_assert!(seen.insert(fp, *v).is_none(), "entry yielded twice");
                    }
                    prop_assert_eq!(&seen, &model);
                }
                Op::Clear => {
                    sut.clear();
                    model.clear();
                }
            }

            prop_assert_eq!(sut.audit(), model.len());
            prop_assert_eq!(sut.len(), model.len());
            prop_assert_eq!(sut.walk_len(), model.len());
            prop_assert_eq!(sut.is_empty(), model.is_empty());
        }
    }
}

// Property: the same key set stored under any two layouts enumerates the
// same entries.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_layout_independent(a in arb_layout(), b in arb_layout(), keys in proptest::collection::vec(arb_key(), 0..40)) {
        let objects: Vec<ObjectRef> = (0..OBJECTS).map(|_| ObjectRef::new()).collect();
        let mut left: BucketStore<usize> = BucketStore::with_layout(a).unwrap();
        let mut right: BucketStore<usize> = BucketStore::with_layout(b).unwrap();
        for (i, recipe) in keys.iter().enumerate() {
            let key = build(recipe, &objects);
            let d = Digest::of(&key).unwrap();
            left.set(&d, key.clone(), i);
            right.set(&d, key, i);
        }
        let collect = |s: &BucketStore<usize>| -> HashMap<Fingerprint, usize> {
            s.iter()
                .map(|(k, v)| (Digest::of(k).unwrap().fingerprint().clone(), *v))
                .collect()
        };
        prop_assert_eq!(collect(&left), collect(&right));
        prop_assert_eq!(left.audit(), right.audit());
    }
}
