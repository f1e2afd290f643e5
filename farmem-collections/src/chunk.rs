//! List nodes laid out inside a byte block, such as an object in a region.
//!
//! ```text
//! 0           8           12          16
//! ┌───────────┬───────────┬───────────┬──────────────────┬─────┐
//! │ used bits │ head link │ tail link │ node 0           │ ... │
//! │ u64       │ next,prev │ next,prev │ next,prev,payload│     │
//! └───────────┴───────────┴───────────┴──────────────────┴─────┘
//! ```
//!
//! Links are `u16` node indices, little-endian, so the block has no
//! alignment requirement and survives being copied between memory tiers.
//! A chunk holds at most [`MAX_CHUNK_NODES`] nodes.

use crate::{Corruption, Cursor, Forward, GenericLocalList, Link, NodeOps};

/// Bytes before the first node.
pub const CHUNK_HEADER_SIZE: usize = 16;

/// Upper bound on nodes per chunk (one bit each in the used bitmap).
pub const MAX_CHUNK_NODES: usize = 64;

const LINK_SIZE: usize = 4;
const HEAD: u16 = u16::MAX - 1;
const TAIL: u16 = u16::MAX;
const HEAD_LINK: usize = 8;
const TAIL_LINK: usize = 12;

/// Node space over a chunk's bytes with `P`-byte payloads.
///
/// The state is the chunk itself (`[u8]`); handles are node indices.
#[derive(Debug)]
pub struct ChunkNodes<const P: usize>;

impl<const P: usize> ChunkNodes<P> {
    const NODE_SIZE: usize = LINK_SIZE + P;

    /// Nodes that fit in `len` bytes.
    pub fn capacity_for(len: usize) -> usize {
        (len.saturating_sub(CHUNK_HEADER_SIZE) / Self::NODE_SIZE).min(MAX_CHUNK_NODES)
    }

    /// Bytes needed for a chunk of `nodes` nodes.
    pub const fn size_for(nodes: usize) -> usize {
        CHUNK_HEADER_SIZE + nodes * (LINK_SIZE + P)
    }

    #[inline]
    fn link_offset(node: u16) -> usize {
        match node {
            HEAD => HEAD_LINK,
            TAIL => TAIL_LINK,
            i => CHUNK_HEADER_SIZE + i as usize * Self::NODE_SIZE,
        }
    }

    #[inline]
    fn payload_offset(node: u16) -> usize {
        Self::link_offset(node) + LINK_SIZE
    }

    fn used(bytes: &[u8]) -> u64 {
        let mut word = [0u8; 8];
        word.copy_from_slice(&bytes[..8]);
        u64::from_le_bytes(word)
    }

    fn set_used(bytes: &mut [u8], used: u64) {
        bytes[..8].copy_from_slice(&used.to_le_bytes());
    }

    fn mask(bytes: &[u8]) -> u64 {
        match Self::capacity_for(bytes.len()) {
            MAX_CHUNK_NODES => u64::MAX,
            n => (1u64 << n) - 1,
        }
    }
}

impl<const P: usize> NodeOps for ChunkNodes<P> {
    type Ref = u16;
    type State = [u8];

    #[inline]
    fn link(bytes: &[u8], node: u16) -> Link<u16> {
        let at = Self::link_offset(node);
        Link {
            next: u16::from_le_bytes([bytes[at], bytes[at + 1]]),
            prev: u16::from_le_bytes([bytes[at + 2], bytes[at + 3]]),
        }
    }

    #[inline]
    fn set_link(bytes: &mut [u8], node: u16, link: Link<u16>) {
        let at = Self::link_offset(node);
        bytes[at..at + 2].copy_from_slice(&link.next.to_le_bytes());
        bytes[at + 2..at + 4].copy_from_slice(&link.prev.to_le_bytes());
    }

    fn allocate(bytes: &mut [u8]) -> Option<u16> {
        let used = Self::used(bytes);
        let free = !used & Self::mask(bytes);
        if free == 0 {
            return None;
        }
        let idx = free.trailing_zeros();
        Self::set_used(bytes, used | (1 << idx));
        Some(idx as u16)
    }

    fn free(bytes: &mut [u8], node: u16) {
        let used = Self::used(bytes);
        debug_assert!(used & (1 << node) != 0, "double free of chunk node {node}");
        Self::set_used(bytes, used & !(1 << node));
    }
}

/// A fixed-capacity list of `P`-byte records stored entirely in `bytes`.
///
/// # Example
///
/// ```
/// use farmem_collections::{ChunkList, ChunkNodes};
///
/// let mut block = vec![0u8; ChunkNodes::<4>::size_for(8)];
/// let mut chunk = ChunkList::<4>::format(&mut block);
/// chunk.push_back(&[1, 2, 3, 4]).unwrap();
/// chunk.push_front(&[0; 4]).unwrap();
/// assert_eq!(chunk.len(), 2);
///
/// // The list lives in the bytes: reopen it from them.
/// let mut chunk = ChunkList::<4>::open(&mut block).unwrap();
/// assert_eq!(chunk.pop_back(), Some([1, 2, 3, 4]));
/// ```
pub struct ChunkList<'a, const P: usize> {
    bytes: &'a mut [u8],
    list: GenericLocalList<ChunkNodes<P>>,
}

impl<'a, const P: usize> ChunkList<'a, P> {
    /// Initializes an empty chunk in `bytes`.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` cannot hold a single node.
    pub fn format(bytes: &'a mut [u8]) -> Self {
        assert!(
            ChunkNodes::<P>::capacity_for(bytes.len()) > 0,
            "{} bytes cannot hold a chunk node of payload {P}",
            bytes.len()
        );
        ChunkNodes::<P>::set_used(bytes, 0);
        let list = GenericLocalList::<ChunkNodes<P>>::new(&mut *bytes, HEAD, TAIL);
        Self { bytes, list }
    }

    /// Reopens a chunk previously formatted in `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`Corruption`] if the links do not form a valid list.
    pub fn open(bytes: &'a mut [u8]) -> Result<Self, Corruption<u16>> {
        if ChunkNodes::<P>::capacity_for(bytes.len()) == 0 {
            return Err(Corruption {
                node: HEAD,
                next: TAIL,
                back: TAIL,
            });
        }
        Self::check_reachable(bytes)?;
        let list = GenericLocalList::<ChunkNodes<P>>::attach(HEAD, TAIL);
        list.validate(bytes)?;
        Ok(Self { bytes, list })
    }

    /// Walks `next` links from the head, requiring every hop to land on an
    /// in-use node and the walk to reach the tail within capacity.
    fn check_reachable(bytes: &[u8]) -> Result<(), Corruption<u16>> {
        let capacity = ChunkNodes::<P>::capacity_for(bytes.len());
        let used = ChunkNodes::<P>::used(bytes);
        let in_use = |n: u16| (n as usize) < capacity && used & (1 << n) != 0;

        let mut node = HEAD;
        for _ in 0..=capacity {
            let next = ChunkNodes::<P>::link(bytes, node).next;
            if next == TAIL {
                let tail = ChunkNodes::<P>::link(bytes, TAIL);
                if tail.next == HEAD && (tail.prev == HEAD || in_use(tail.prev)) {
                    return Ok(());
                }
                return Err(Corruption {
                    node: TAIL,
                    next: tail.next,
                    back: tail.prev,
                });
            }
            if !in_use(next) {
                return Err(Corruption {
                    node,
                    next,
                    back: next,
                });
            }
            node = next;
        }
        Err(Corruption {
            node,
            next: ChunkNodes::<P>::link(bytes, node).next,
            back: node,
        })
    }

    /// Maximum number of records.
    pub fn capacity(&self) -> usize {
        ChunkNodes::<P>::capacity_for(self.bytes.len())
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        ChunkNodes::<P>::used(self.bytes).count_ones() as usize
    }

    /// Returns `true` if there are no records.
    pub fn is_empty(&self) -> bool {
        self.list.is_empty(self.bytes)
    }

    /// Returns `true` if no record can be added.
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    fn write(&mut self, node: u16, record: &[u8; P]) {
        let at = ChunkNodes::<P>::payload_offset(node);
        self.bytes[at..at + P].copy_from_slice(record);
    }

    fn read(bytes: &[u8], node: u16) -> [u8; P] {
        let at = ChunkNodes::<P>::payload_offset(node);
        let mut out = [0u8; P];
        out.copy_from_slice(&bytes[at..at + P]);
        out
    }

    /// Appends a record. Returns its node index, or `None` if full.
    pub fn push_back(&mut self, record: &[u8; P]) -> Option<u16> {
        let node = self.list.insert(self.bytes, self.list.end())?.node();
        self.write(node, record);
        Some(node)
    }

    /// Prepends a record. Returns its node index, or `None` if full.
    pub fn push_front(&mut self, record: &[u8; P]) -> Option<u16> {
        let node = self.list.insert(self.bytes, self.list.rend())?.node();
        self.write(node, record);
        Some(node)
    }

    /// Removes the first record.
    pub fn pop_front(&mut self) -> Option<[u8; P]> {
        if self.is_empty() {
            return None;
        }
        let first = self.list.begin(self.bytes);
        Some(self.list.erase(self.bytes, first, Self::read_mut).1)
    }

    /// Removes the last record.
    pub fn pop_back(&mut self) -> Option<[u8; P]> {
        if self.is_empty() {
            return None;
        }
        let last = self.list.rbegin(self.bytes);
        Some(self.list.erase(self.bytes, last, Self::read_mut).1)
    }

    /// Removes the record at node index `node`.
    ///
    /// # Panics
    ///
    /// Panics if `node` is not a linked record of this chunk.
    pub fn remove(&mut self, node: u16) -> [u8; P] {
        assert!(
            (node as usize) < self.capacity() && ChunkNodes::<P>::used(self.bytes) & (1 << node) != 0,
            "chunk node {node} is not in use"
        );
        let at: Cursor<u16, Forward> = Cursor::new(node);
        self.list.erase(self.bytes, at, Self::read_mut).1
    }

    fn read_mut(bytes: &mut [u8], node: u16) -> [u8; P] {
        Self::read(bytes, node)
    }

    /// The payload of node `node`.
    pub fn record(&self, node: u16) -> &[u8] {
        let at = ChunkNodes::<P>::payload_offset(node);
        &self.bytes[at..at + P]
    }

    /// Mutable payload of node `node`.
    pub fn record_mut(&mut self, node: u16) -> &mut [u8] {
        let at = ChunkNodes::<P>::payload_offset(node);
        &mut self.bytes[at..at + P]
    }

    /// Node indices from front to back.
    pub fn nodes(&self) -> impl Iterator<Item = u16> + '_ {
        self.list.nodes(self.bytes)
    }

    /// Records from front to back.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.nodes().map(move |node| self.record(node))
    }

    /// Checks link symmetry. Returns the number of records.
    ///
    /// # Errors
    ///
    /// Returns the first broken link found.
    pub fn validate(&self) -> Result<usize, Corruption<u16>> {
        self.list.validate(self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Nodes8 = ChunkNodes<8>;

    fn block(nodes: usize) -> Vec<u8> {
        vec![0xAA; Nodes8::size_for(nodes)]
    }

    #[test]
    fn capacity_is_bounded() {
        assert_eq!(Nodes8::capacity_for(Nodes8::size_for(5)), 5);
        assert_eq!(Nodes8::capacity_for(Nodes8::size_for(5) - 1), 4);
        assert_eq!(Nodes8::capacity_for(Nodes8::size_for(200)), MAX_CHUNK_NODES);
        assert_eq!(Nodes8::capacity_for(3), 0);
    }

    #[test]
    fn format_ignores_previous_contents() {
        let mut bytes = block(4);
        let chunk = ChunkList::<8>::format(&mut bytes);
        assert!(chunk.is_empty());
        assert_eq!(chunk.len(), 0);
        assert_eq!(chunk.validate(), Ok(0));
    }

    #[test]
    fn fills_then_refuses() {
        let mut bytes = block(3);
        let mut chunk = ChunkList::<8>::format(&mut bytes);
        for i in 0..3u8 {
            assert_eq!(chunk.push_back(&[i; 8]), Some(i as u16));
        }
        assert!(chunk.is_full());
        assert_eq!(chunk.push_back(&[9; 8]), None);
        assert_eq!(chunk.validate(), Ok(3));
    }

    #[test]
    fn freed_slot_is_reused() {
        let mut bytes = block(3);
        let mut chunk = ChunkList::<8>::format(&mut bytes);
        chunk.push_back(&[0; 8]);
        let mid = chunk.push_back(&[1; 8]).unwrap();
        chunk.push_back(&[2; 8]);

        assert_eq!(chunk.remove(mid), [1; 8]);
        assert_eq!(chunk.push_front(&[7; 8]), Some(mid));
        let order: Vec<u8> = chunk.iter().map(|r| r[0]).collect();
        assert_eq!(order, [7, 0, 2]);
    }

    #[test]
    fn pops_in_order() {
        let mut bytes = block(8);
        let mut chunk = ChunkList::<8>::format(&mut bytes);
        for i in 0..4u8 {
            chunk.push_back(&[i; 8]);
        }
        assert_eq!(chunk.pop_front(), Some([0; 8]));
        assert_eq!(chunk.pop_back(), Some([3; 8]));
        assert_eq!(chunk.pop_back(), Some([2; 8]));
        assert_eq!(chunk.pop_front(), Some([1; 8]));
        assert_eq!(chunk.pop_front(), None);
    }

    #[test]
    fn full_sixty_four_nodes() {
        let mut bytes = block(MAX_CHUNK_NODES);
        let mut chunk = ChunkList::<8>::format(&mut bytes);
        for i in 0..MAX_CHUNK_NODES {
            assert!(chunk.push_back(&[i as u8; 8]).is_some());
        }
        assert!(chunk.push_back(&[0; 8]).is_none());
        assert_eq!(chunk.len(), MAX_CHUNK_NODES);
    }

    #[test]
    fn open_rejects_garbage() {
        let mut bytes = block(4);
        assert!(ChunkList::<8>::open(&mut bytes).is_err());
    }

    #[test]
    fn record_mut_edits_in_place() {
        let mut bytes = block(2);
        let mut chunk = ChunkList::<8>::format(&mut bytes);
        let n = chunk.push_back(&[0; 8]).unwrap();
        chunk.record_mut(n)[0] = 42;
        assert_eq!(chunk.record(n)[0], 42);
    }

    #[test]
    #[should_panic(expected = "cannot hold")]
    fn format_too_small_panics() {
        let mut bytes = vec![0u8; CHUNK_HEADER_SIZE + 2];
        let _ = ChunkList::<8>::format(&mut bytes);
    }
}
