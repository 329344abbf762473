use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use fingerprint_map::{Layout, ObjectRef, Value, ValueMap};
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn key(n: u64) -> Value {
    Value::text(&format!("k{:016x}", n))
}

fn seq_key(n: u64) -> Value {
    Value::sequence([
        Value::Int((n >> 32) as i64),
        Value::text("pair"),
        Value::sequence([Value::Int((n & 0xffff) as i64), Value::Bool(n & 1 == 0)]),
    ])
}

fn bench_insert(c: &mut Criterion) {
    let keys: Vec<Value> = lcg(1).take(10_000).map(key).collect();
    c.bench_function("value_map_insert_10k", |b| {
        b.iter_batched(
            || (ValueMap::<u64>::new(), keys.clone()),
            |(mut m, keys)| {
                for (i, k) in keys.into_iter().enumerate() {
                    m.set(k, i as u64).unwrap();
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_get_hit(c: &mut Criterion) {
    c.bench_function("value_map_get_hit", |b| {
        let mut m = ValueMap::new();
        let keys: Vec<_> = lcg(7).take(20_000).map(key).collect();
        for (i, k) in keys.iter().enumerate() {
            m.set(k.clone(), i as u64).unwrap();
        }
        let mut it = keys.iter().cycle();
        b.iter(|| {
            let k = it.next().unwrap();
            black_box(m.get(k).unwrap());
        })
    });
}

fn bench_get_miss(c: &mut Criterion) {
    c.bench_function("value_map_get_miss", |b| {
        let mut m = ValueMap::new();
        for (i, x) in lcg(11).take(10_000).enumerate() {
            m.set(key(x), i as u64).unwrap();
        }
        let mut miss = lcg(0xdead_beef);
        b.iter(|| {
            // generate keys unlikely in map
            let k = key(miss.next().unwrap());
            black_box(m.get(&k));
        })
    });
}

fn bench_sequence_keys(c: &mut Criterion) {
    c.bench_function("value_map_sequence_get_hit", |b| {
        let mut m = ValueMap::new();
        let keys: Vec<_> = lcg(13).take(10_000).map(seq_key).collect();
        for (i, k) in keys.iter().enumerate() {
            m.set(k.clone(), i as u64).unwrap();
        }
        let mut it = keys.iter().cycle();
        b.iter(|| {
            let k = it.next().unwrap();
            black_box(m.get(k));
        })
    });
}

fn bench_object_keys(c: &mut Criterion) {
    c.bench_function("value_map_object_get_hit", |b| {
        let mut m = ValueMap::new();
        let objects: Vec<Value> = (0..10_000).map(|_| Value::Object(ObjectRef::new())).collect();
        for (i, o) in objects.iter().enumerate() {
            m.set(o.clone(), i as u64).unwrap();
        }
        let mut it = objects.iter().cycle();
        b.iter(|| {
            let k = it.next().unwrap();
            black_box(m.get(k));
        })
    });
}

fn bench_narrow_layout(c: &mut Criterion) {
    c.bench_function("value_map_narrow_layout_get_hit", |b| {
        let mut m = ValueMap::with_layout(Layout::new().with_width_bits(4).with_depth(1)).unwrap();
        let keys: Vec<_> = lcg(17).take(2_000).map(key).collect();
        for (i, k) in keys.iter().enumerate() {
            m.set(k.clone(), i as u64).unwrap();
        }
        let mut it = keys.iter().cycle();
        b.iter(|| {
            let k = it.next().unwrap();
            black_box(m.get(k));
        })
    });
}

fn bench_clone(c: &mut Criterion) {
    c.bench_function("value_map_clone_10k", |b| {
        let mut m = ValueMap::new();
        for (i, x) in lcg(19).take(10_000).enumerate() {
            m.set(key(x), i as u64).unwrap();
        }
        b.iter(|| black_box(m.clone()))
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(8))
        .warm_up_time(Duration::from_secs(2))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_insert, bench_get_hit, bench_get_miss, bench_sequence_keys,
        bench_object_keys, bench_narrow_layout, bench_clone
}
criterion_main!(benches);
