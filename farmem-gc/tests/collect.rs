use std::sync::Mutex;

use farmem_collections::{ChunkList, ChunkNodes};
use farmem_gc::{Collector, ParallelError};
use farmem_region::{HEADER_SIZE, ObjectRef, Region, RegionBuf};
use proptest::prelude::*;

fn regions(n: u32) -> Vec<Region> {
    (0..n)
        .map(|i| Region::local(i, false, RegionBuf::new().unwrap()))
        .collect()
}

/// Fills `region` with objects whose id is a running `u32` key.
fn fill(region: &mut Region, first_key: u32, count: u32, payload: usize) -> u32 {
    let body = vec![0x5A; payload];
    let mut key = first_key;
    while key < first_key + count {
        if region.new_object(7, &key.to_le_bytes(), &body).is_none() {
            break;
        }
        key += 1;
    }
    key - first_key
}

fn key_of(obj: &ObjectRef<'_>) -> u32 {
    let id = obj.id();
    u32::from_le_bytes([id[0], id[1], id[2], id[3]])
}

#[test]
fn every_object_offered_once() {
    let mut regions = regions(4);
    let mut next = 0;
    for region in &mut regions {
        next += fill(region, next, 100_000, 900);
    }

    let seen = Mutex::new(Vec::new());
    let record = |_: u32, obj: &ObjectRef<'_>| {
        seen.lock().unwrap().push(key_of(obj));
        true
    };
    let mut gc = Collector::new(3);
    let stats = gc.sweep(&regions, &record).unwrap();

    let mut seen = seen.into_inner().unwrap();
    seen.sort_unstable();
    assert_eq!(seen, (0..next).collect::<Vec<_>>());
    assert_eq!(stats.objects_freed, 0);
    // Sealed regions contribute their filler to the scan count.
    assert_eq!(stats.objects_scanned, next as u64 + regions.len() as u64);
}

#[test]
fn liveness_panic_is_reported() {
    let mut regions = regions(1);
    fill(&mut regions[0], 0, 50, 16);

    let mut gc = Collector::new(2);
    let boom = |_: u32, obj: &ObjectRef<'_>| {
        assert!(key_of(obj) != 25, "liveness oracle failed");
        true
    };
    let err = gc.collect(&mut regions, &boom).unwrap_err();
    assert!(matches!(err, ParallelError::SlavePanicked { .. }));
    // The failed collection reset nothing.
    assert!(regions[0].first_free_byte() > HEADER_SIZE);
}

#[test]
fn reclaimed_region_takes_new_objects() {
    let mut regions = regions(1);
    fill(&mut regions[0], 0, 100_000, 4000);
    assert!(regions[0].new_object(0, b"", b"late").is_none());

    let mut gc = Collector::new(2);
    let stats = gc
        .collect(&mut regions, &|_: u32, _: &ObjectRef<'_>| false)
        .unwrap();
    assert_eq!(stats.regions_reset, 1);
    assert!(regions[0].new_object(0, b"", b"late").is_some());
}

#[test]
fn chunk_in_raw_allocation_survives_collection() {
    const RECORD: usize = 8;
    let mut regions = regions(1);
    let size = ChunkNodes::<RECORD>::size_for(4);
    let addr = regions[0].allocate_object(size as u32).unwrap();
    {
        // One record sets bit 0 of the used bitmap, which reads like a live
        // marker if taken for a header.
        let mut chunk = ChunkList::<RECORD>::format(regions[0].bytes_mut(addr, size));
        chunk.push_back(&[0xAB; RECORD]).unwrap();
    }
    let before = regions[0].bytes(addr, size).to_vec();

    let mut gc = Collector::new(2);
    let stats = gc
        .collect(&mut regions, &|_: u32, _: &ObjectRef<'_>| false)
        .unwrap();
    assert_eq!(stats.objects_freed, 0);
    assert_eq!(stats.regions_reset, 0);
    assert_eq!(regions[0].ref_cnt(), 1);
    assert_eq!(regions[0].bytes(addr, size), &before[..]);

    let mut chunk = ChunkList::<RECORD>::open(regions[0].bytes_mut(addr, size)).unwrap();
    assert_eq!(chunk.validate(), Ok(1));
    assert_eq!(chunk.pop_front(), Some([0xAB; RECORD]));
}

#[test]
fn objects_after_raw_allocation_are_offered() {
    let mut regions = regions(1);
    regions[0].new_object(7, &0u32.to_le_bytes(), b"").unwrap();
    regions[0].allocate_object(32).unwrap();
    regions[0].new_object(7, &1u32.to_le_bytes(), b"").unwrap();

    let seen = Mutex::new(Vec::new());
    let record = |_: u32, obj: &ObjectRef<'_>| {
        seen.lock().unwrap().push(key_of(obj));
        false
    };
    let mut gc = Collector::new(2);
    let stats = gc.collect(&mut regions, &record).unwrap();

    let mut seen = seen.into_inner().unwrap();
    seen.sort_unstable();
    assert_eq!(seen, [0, 1]);
    assert_eq!(stats.objects_freed, 2);
    assert_eq!(regions[0].ref_cnt(), 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn ref_counts_match_survivors(
        counts in prop::collection::vec(0u32..400, 1..5),
        payload in 0usize..3000,
        dead in prop::collection::hash_set(0u32..2000, 0..1500),
        threads in 1usize..4,
    ) {
        let mut regions = regions(counts.len() as u32);
        let mut first = Vec::new();
        let mut next = 0;
        for (region, &count) in regions.iter_mut().zip(&counts) {
            first.push(next);
            next += fill(region, next, count, payload);
        }
        first.push(next);

        let alive = |_: u32, obj: &ObjectRef<'_>| !dead.contains(&key_of(obj));
        let mut gc = Collector::new(threads);
        let stats = gc.collect(&mut regions, &alive).unwrap();

        let mut freed = 0u64;
        for (i, region) in regions.iter().enumerate() {
            let keys = first[i]..first[i + 1];
            let survivors = keys.clone().filter(|k| !dead.contains(k)).count() as u32;
            freed += (keys.len() as u32 - survivors) as u64;
            prop_assert_eq!(region.ref_cnt(), survivors);
            if survivors == 0 && !keys.is_empty() {
                prop_assert_eq!(region.first_free_byte(), HEADER_SIZE);
            }
        }
        prop_assert_eq!(stats.objects_freed, freed);
    }
}
