//! A chunk list stored in a region object survives being reopened.

use farmem_collections::{ChunkList, ChunkNodes};
use farmem_region::{Region, RegionBuf};

const RECORD: usize = 12;

#[test]
fn chunk_lives_in_region_object() {
    let mut region = Region::local(3, false, RegionBuf::new().unwrap());
    let size = ChunkNodes::<RECORD>::size_for(16);
    let addr = region.allocate_object(size as u32).unwrap();

    {
        let mut chunk = ChunkList::<RECORD>::format(region.bytes_mut(addr, size));
        for i in 0..16u8 {
            assert!(chunk.push_back(&[i; RECORD]).is_some());
        }
        assert!(chunk.is_full());
        assert_eq!(chunk.pop_front(), Some([0; RECORD]));
    }

    // Other allocations do not disturb the chunk.
    let other = region.allocate_object(64).unwrap();
    region.bytes_mut(other, 64).fill(0xFF);

    let mut chunk = ChunkList::<RECORD>::open(region.bytes_mut(addr, size)).unwrap();
    assert_eq!(chunk.len(), 15);
    assert_eq!(chunk.validate(), Ok(15));
    let firsts: Vec<u8> = chunk.iter().map(|r| r[0]).collect();
    assert_eq!(firsts, (1..16).collect::<Vec<_>>());
    assert!(chunk.push_front(&[0; RECORD]).is_some());
}

#[test]
fn chunk_copied_between_buffers() {
    let mut a = Region::local(0, false, RegionBuf::new().unwrap());
    let mut b = Region::local(1, false, RegionBuf::new().unwrap());
    let size = ChunkNodes::<4>::size_for(8);
    let src = a.allocate_object(size as u32).unwrap();
    // Offset the destination so the copy lands at a different address.
    b.allocate_object(40).unwrap();
    let dst = b.allocate_object(size as u32).unwrap();

    {
        let mut chunk = ChunkList::<4>::format(a.bytes_mut(src, size));
        chunk.push_back(&[1, 1, 1, 1]);
        chunk.push_back(&[2, 2, 2, 2]);
        chunk.push_front(&[0, 0, 0, 0]);
    }
    let copy = a.bytes(src, size).to_vec();
    b.bytes_mut(dst, size).copy_from_slice(&copy);

    let mut chunk = ChunkList::<4>::open(b.bytes_mut(dst, size)).unwrap();
    assert_eq!(chunk.pop_front(), Some([0; 4]));
    assert_eq!(chunk.pop_front(), Some([1; 4]));
    assert_eq!(chunk.pop_front(), Some([2; 4]));
    assert!(chunk.is_empty());
}
