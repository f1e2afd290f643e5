//! LocalList and ChunkList checked against a VecDeque model.

use std::collections::VecDeque;

use farmem_collections::{ChunkList, ChunkNodes, Cursor, Forward, LocalList, PoolRef};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    PushBack(u16),
    PushFront(u16),
    PopFront,
    PopBack,
    // Erase the element at this position (mod len).
    EraseAt(usize),
    // Insert before this position (mod len + 1) through a forward cursor.
    InsertAt(usize, u16),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<u16>().prop_map(Op::PushBack),
        any::<u16>().prop_map(Op::PushFront),
        Just(Op::PopFront),
        Just(Op::PopBack),
        any::<usize>().prop_map(Op::EraseAt),
        (any::<usize>(), any::<u16>()).prop_map(|(i, v)| Op::InsertAt(i, v)),
    ]
}

fn cursor_at(list: &LocalList<u16>, pos: usize) -> Cursor<PoolRef, Forward> {
    let mut at = list.begin();
    for _ in 0..pos {
        at = list.next(at);
    }
    at
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn local_list_matches_deque(ops in prop::collection::vec(op(), 0..200)) {
        let mut list = LocalList::new();
        let mut model = VecDeque::new();

        for op in ops {
            match op {
                Op::PushBack(v) => {
                    list.push_back(v);
                    model.push_back(v);
                }
                Op::PushFront(v) => {
                    list.push_front(v);
                    model.push_front(v);
                }
                Op::PopFront => prop_assert_eq!(list.pop_front(), model.pop_front()),
                Op::PopBack => prop_assert_eq!(list.pop_back(), model.pop_back()),
                Op::EraseAt(i) => {
                    if model.is_empty() {
                        continue;
                    }
                    let pos = i % model.len();
                    let (next, v) = list.erase(cursor_at(&list, pos));
                    prop_assert_eq!(Some(v), model.remove(pos));
                    prop_assert_eq!(list.get(next), model.get(pos));
                }
                Op::InsertAt(i, v) => {
                    let pos = i % (model.len() + 1);
                    let at = list.insert(cursor_at(&list, pos), v);
                    model.insert(pos, v);
                    prop_assert_eq!(list.get(at), Some(&v));
                }
            }
            prop_assert_eq!(list.len(), model.len());
            prop_assert!(list.validate().is_ok());
        }

        prop_assert!(list.iter().eq(model.iter()));
        prop_assert!(list.iter().rev().eq(model.iter().rev()));
    }

    #[test]
    fn chunk_list_matches_deque(ops in prop::collection::vec(op(), 0..200), nodes in 1usize..=64) {
        let mut block = vec![0u8; ChunkNodes::<2>::size_for(nodes)];
        let mut chunk = ChunkList::<2>::format(&mut block);
        let mut model: VecDeque<u16> = VecDeque::new();

        for op in ops {
            match op {
                Op::PushBack(v) => {
                    let pushed = chunk.push_back(&v.to_le_bytes()).is_some();
                    prop_assert_eq!(pushed, model.len() < nodes);
                    if pushed {
                        model.push_back(v);
                    }
                }
                Op::PushFront(v) | Op::InsertAt(_, v) => {
                    let pushed = chunk.push_front(&v.to_le_bytes()).is_some();
                    prop_assert_eq!(pushed, model.len() < nodes);
                    if pushed {
                        model.push_front(v);
                    }
                }
                Op::PopFront => {
                    prop_assert_eq!(chunk.pop_front().map(u16::from_le_bytes), model.pop_front());
                }
                Op::PopBack => {
                    prop_assert_eq!(chunk.pop_back().map(u16::from_le_bytes), model.pop_back());
                }
                Op::EraseAt(i) => {
                    if model.is_empty() {
                        continue;
                    }
                    let pos = i % model.len();
                    let node = chunk.nodes().nth(pos).unwrap();
                    prop_assert_eq!(Some(u16::from_le_bytes(chunk.remove(node))), model.remove(pos));
                }
            }
            prop_assert_eq!(chunk.len(), model.len());
            prop_assert_eq!(chunk.validate(), Ok(model.len()));
        }

        let values: Vec<u16> = chunk
            .iter()
            .map(|r| u16::from_le_bytes([r[0], r[1]]))
            .collect();
        prop_assert_eq!(values, Vec::from(model));
    }
}

#[test]
fn reverse_cursor_walks_back_to_front() {
    let list: LocalList<u32> = (0..10).collect();
    let mut at = list.rbegin();
    let mut seen = Vec::new();
    while at != list.rend() {
        seen.push(*list.get(at).unwrap());
        at = list.next(at);
    }
    assert_eq!(seen, (0..10).rev().collect::<Vec<_>>());
}

#[test]
fn erase_while_iterating_keeps_odds() {
    let mut list: LocalList<u32> = (0..100).collect();
    let mut at = list.begin();
    while at != list.end() {
        if list.get(at).is_some_and(|v| v % 2 == 0) {
            at = list.erase(at).0;
        } else {
            at = list.next(at);
        }
    }
    assert_eq!(list.len(), 50);
    assert!(list.iter().all(|v| v % 2 == 1));
    assert!(list.validate().is_ok());
}
