//! Ring buffer throughput: unsynchronized vs spin-locked, plus stealing.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use farmem_queue::{CircularBuffer, SyncCircularBuffer};

const BATCH: usize = 1024;

fn push_pop(c: &mut Criterion) {
    let mut group = c.benchmark_group("push_pop");
    group.throughput(Throughput::Elements(BATCH as u64));

    group.bench_function("unsync", |b| {
        let mut buf: CircularBuffer<u64> = CircularBuffer::with_capacity(BATCH);
        b.iter(|| {
            for i in 0..BATCH as u64 {
                buf.push_back(black_box(i)).unwrap();
            }
            while let Some(x) = buf.pop_front() {
                black_box(x);
            }
        });
    });

    group.bench_function("spin_locked", |b| {
        let buf: SyncCircularBuffer<u64> = SyncCircularBuffer::with_capacity(BATCH);
        b.iter(|| {
            for i in 0..BATCH as u64 {
                buf.push_back(black_box(i)).unwrap();
            }
            while let Some(x) = buf.pop_front() {
                black_box(x);
            }
        });
    });

    group.finish();
}

fn steal(c: &mut Criterion) {
    let mut group = c.benchmark_group("work_steal");
    for &len in &[16usize, 256, 4096] {
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, &len| {
            let victim: SyncCircularBuffer<u64> = SyncCircularBuffer::with_capacity(len);
            let thief: SyncCircularBuffer<u64> = SyncCircularBuffer::with_capacity(len);
            b.iter(|| {
                for i in 0..len as u64 {
                    victim.push_back(i).unwrap();
                }
                black_box(thief.work_steal(&victim));
                victim.clear();
                thief.clear();
            });
        });
    }
    group.finish();
}

criterion_group!(benches, push_pop, steal);
criterion_main!(benches);
