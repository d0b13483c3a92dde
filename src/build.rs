//! Double-array construction.
//!
//! The builder consumes a sorted key set range by range: a work stack holds
//! `(begin, end, unit index)` entries, each popped entry groups its keys by
//! first byte, asks the offset finder for a collision-free base, reserves one
//! child unit per distinct byte, and pushes the child ranges back. A range
//! that has shrunk to a single key becomes a leaf; its unconsumed bytes move
//! to the tail region afterwards.
//!
//! Units are allocated in blocks of 256. Free units are threaded on a
//! circular doubly-linked list through per-unit `Extra` records; only the
//! last sixteen blocks keep their records, older blocks are fixed and their
//! records recycled for the newest block.

use std::collections::VecDeque;

use crate::key::{collect_keys, BuildKey};
use crate::tail::pack_tail;
use crate::unit::{Unit, OFFSET_MAX, UNIT_SIZE};
use crate::{DoubleArray, TrieError};

const BLOCK_SIZE: u32 = 256;
const NUM_OF_UNFIXED_BLOCKS: u32 = 16;

/// Builder-only bookkeeping for one unit, discarded when its block is fixed.
///
/// `lo` packs `is_fixed` with the free-list successor, `hi` packs `is_used`
/// (the slot serves as some node's base) with the predecessor.
#[derive(Clone, Copy, Debug, Default)]
struct Extra {
    lo: u32,
    hi: u32,
}

impl Extra {
    #[inline]
    fn is_fixed(self) -> bool {
        self.lo & 1 == 1
    }

    #[inline]
    fn set_is_fixed(&mut self) {
        self.lo |= 1;
    }

    #[inline]
    fn next(self) -> u32 {
        self.lo >> 1
    }

    #[inline]
    fn set_next(&mut self, next: u32) {
        self.lo = (self.lo & 1) | (next << 1);
    }

    #[inline]
    fn is_used(self) -> bool {
        self.hi & 1 == 1
    }

    #[inline]
    fn set_is_used(&mut self) {
        self.hi |= 1;
    }

    #[inline]
    fn prev(self) -> u32 {
        self.hi >> 1
    }

    #[inline]
    fn set_prev(&mut self, prev: u32) {
        self.hi = (self.hi & 1) | (prev << 1);
    }
}

/// Work-stack entry: `keys[begin..end]` hang below the unit at `index`.
#[derive(Clone, Copy)]
struct KeyRange {
    begin: u32,
    end: u32,
    index: u32,
}

struct Builder<'k, 'b> {
    keys: &'b mut [BuildKey<'k>],
    units: Vec<Unit>,
    /// Extra records of the unfixed block window, oldest block first.
    extras: VecDeque<Box<[Extra]>>,
    first_live_block: u32,
    /// Head of the free list, or `num_units()` when the list is empty.
    unfixed_index: u32,
    progress: &'b mut dyn FnMut(usize, usize),
}

impl DoubleArray {
    /// Builds a dictionary from strictly ascending keys.
    ///
    /// Each key is mapped to its position in the deduplicated key set.
    ///
    /// # Errors
    ///
    /// Fails on descending key order, an empty key, a key containing the
    /// byte `0x00`, or a trie that outgrows the 32-bit unit encoding. No
    /// partial dictionary is produced.
    pub fn build<K: AsRef<[u8]>>(keys: &[K]) -> Result<Self, TrieError> {
        Self::build_with(keys, None, |_, _| {})
    }

    /// Builds a dictionary with an explicit value per key.
    ///
    /// `values` must match `keys` in length. When a duplicate key is
    /// dropped, the value of the first occurrence is kept.
    pub fn build_with_values<K: AsRef<[u8]>>(
        keys: &[K],
        values: &[i32],
    ) -> Result<Self, TrieError> {
        Self::build_with(keys, Some(values), |_, _| {})
    }

    /// Builds a dictionary, reporting progress as `(leaves_done, total)`
    /// once per placed key.
    pub fn build_with<K, F>(
        keys: &[K],
        values: Option<&[i32]>,
        mut progress: F,
    ) -> Result<Self, TrieError>
    where
        K: AsRef<[u8]>,
        F: FnMut(usize, usize),
    {
        let mut keys = collect_keys(keys, values)?;
        let image = build_image(&mut keys, &mut progress)?;
        Ok(DoubleArray::from_image(image))
    }
}

fn build_image(
    keys: &mut [BuildKey<'_>],
    progress: &mut dyn FnMut(usize, usize),
) -> Result<Vec<u8>, TrieError> {
    if keys.is_empty() {
        return Ok(empty_image());
    }

    let mut builder = Builder {
        keys,
        units: Vec::new(),
        extras: VecDeque::new(),
        first_live_block: 0,
        unfixed_index: 0,
        progress,
    };
    builder.build_trie()?;

    let Builder { mut units, keys, .. } = builder;
    let tail = pack_tail(&mut units, keys)?;
    log::debug!(
        "double-array built: {} keys, {} trie units, {} tail bytes",
        keys.len(),
        units.len(),
        tail.len()
    );

    let mut bytes = Vec::with_capacity(units.len() * UNIT_SIZE + tail.len() + UNIT_SIZE);
    for unit in &units {
        bytes.extend_from_slice(&unit.raw().to_le_bytes());
    }
    bytes.extend_from_slice(&tail);
    while bytes.len() % UNIT_SIZE != 0 {
        bytes.push(0);
    }
    Ok(bytes)
}

/// The dictionary of the empty key set: just the two reserved units.
fn empty_image() -> Vec<u8> {
    let mut root = Unit::default();
    root.set_offset(1);
    let mut count = Unit::default();
    count.set_label(1);
    count.set_offset(2);
    let mut bytes = Vec::with_capacity(2 * UNIT_SIZE);
    bytes.extend_from_slice(&root.raw().to_le_bytes());
    bytes.extend_from_slice(&count.raw().to_le_bytes());
    bytes
}

impl<'k, 'b> Builder<'k, 'b> {
    fn build_trie(&mut self) -> Result<(), TrieError> {
        // 0 is the root, 1 carries the unit count once the build is done.
        self.reserve_index(0);
        self.reserve_index(1);

        // Root base 1 and a used slot 0 keep stray transitions from ever
        // resolving to the reserved units.
        self.extra_mut(0).set_is_used();
        self.units[0].set_offset(1);
        self.units[1].set_label(1);

        self.arrange_nodes()?;
        self.fix_all_blocks();

        let num_units = self.num_units();
        if num_units >= OFFSET_MAX << 8 {
            return Err(TrieError::OffsetOverflow(num_units));
        }
        self.units[1].set_offset(num_units);
        Ok(())
    }

    fn arrange_nodes(&mut self) -> Result<(), TrieError> {
        let total = self.keys.len();
        let mut stack = vec![KeyRange {
            begin: 0,
            end: total as u32,
            index: 0,
        }];
        let mut labels: Vec<u8> = Vec::new();
        let mut next_ranges: Vec<KeyRange> = Vec::new();
        let mut leaf_count = 0;

        while let Some(range) = stack.pop() {
            // A single remaining key becomes a leaf. Its cursor steps back
            // one byte so the tail suffix starts with the label that selects
            // this unit; the root itself can never be a leaf.
            if range.index != 0 && range.end - range.begin == 1 {
                let key = &mut self.keys[range.begin as usize];
                key.retreat();
                key.set_leaf_index(range.index);
                self.units[range.index as usize].set_is_leaf();
                leaf_count += 1;
                (self.progress)(leaf_count, total);
                continue;
            }

            // Group the range by first byte, consuming that byte.
            labels.clear();
            next_ranges.clear();
            labels.push(self.keys[range.begin as usize].byte_at(0));
            if labels[0] == 0 {
                // The first key ends here: terminal node with children.
                self.units[range.index as usize].set_is_end();
            }
            let mut next_begin = range.begin;
            for i in range.begin..range.end {
                let c = self.keys[i as usize].byte_at(0);
                if c != labels[labels.len() - 1] {
                    labels.push(c);
                    next_ranges.push(KeyRange {
                        begin: next_begin,
                        end: i,
                        index: 0,
                    });
                    next_begin = i;
                }
                self.keys[i as usize].advance();
            }
            next_ranges.push(KeyRange {
                begin: next_begin,
                end: range.end,
                index: 0,
            });

            let offset_index = self.find_offset_index(range.index, &labels);
            let offset = range.index ^ offset_index;
            if offset >= OFFSET_MAX << 8 {
                return Err(TrieError::OffsetOverflow(offset));
            }
            self.units[range.index as usize].set_offset(offset);

            // Reserve children in reverse so ranges pop in key order.
            for i in (0..labels.len()).rev() {
                let child_index = offset_index ^ u32::from(labels[i]);
                self.reserve_index(child_index);
                self.units[child_index as usize].set_label(labels[i]);
                let mut next = next_ranges[i];
                next.index = child_index;
                stack.push(next);
            }
            self.extra_mut(offset_index).set_is_used();
        }
        Ok(())
    }

    /// Finds a base index for `labels` hanging below the node at `index`.
    ///
    /// Walks the free list from its head and takes the first candidate whose
    /// slot is not already somebody's base, whose XOR distance from `index`
    /// fits the offset encoding, and whose sibling slots are all unfixed.
    /// With the list exhausted, falls back past the end of the array; OR-ing
    /// in the parent's low byte keeps that distance encodable too.
    fn find_offset_index(&self, index: u32, labels: &[u8]) -> u32 {
        const LOWER_MASK: u32 = OFFSET_MAX - 1;
        const UPPER_MASK: u32 = !LOWER_MASK;

        if self.unfixed_index < self.num_units() {
            let first = u32::from(labels[0]);
            let mut unfixed = self.unfixed_index;
            loop {
                let offset_index = unfixed ^ first;
                let offset = index ^ offset_index;
                if !self.extra(offset_index).is_used()
                    && (offset & LOWER_MASK == 0 || offset & UPPER_MASK == 0)
                {
                    let collision = labels[1..]
                        .iter()
                        .any(|&c| self.extra(offset_index ^ u32::from(c)).is_fixed());
                    if !collision {
                        return offset_index;
                    }
                }
                unfixed = self.extra(unfixed).next();
                if unfixed == self.unfixed_index {
                    break;
                }
            }
        }

        self.num_units() | (index & 0xFF)
    }

    /// Takes the unit at `index` off the free list and marks it fixed,
    /// growing the array first when `index` lies past it.
    fn reserve_index(&mut self, index: u32) {
        if index >= self.num_units() {
            self.expand();
        }
        debug_assert!(!self.extra(index).is_fixed());

        if index == self.unfixed_index {
            self.unfixed_index = self.extra(index).next();
            if self.unfixed_index == index {
                self.unfixed_index = self.num_units();
            }
        }
        let prev = self.extra(index).prev();
        let next = self.extra(index).next();
        self.extra_mut(prev).set_next(next);
        self.extra_mut(next).set_prev(prev);
        self.extra_mut(index).set_is_fixed();
    }

    /// Appends one block, recycling the oldest block's extra records once
    /// the window is full.
    fn expand(&mut self) {
        let src_num_units = self.num_units();
        let src_num_blocks = src_num_units / BLOCK_SIZE;
        let dest_num_units = src_num_units + BLOCK_SIZE;

        if src_num_blocks >= NUM_OF_UNFIXED_BLOCKS {
            self.fix_block(self.first_live_block);
        }

        self.units.resize(dest_num_units as usize, Unit::default());

        if src_num_blocks >= NUM_OF_UNFIXED_BLOCKS {
            if let Some(mut recycled) = self.extras.pop_front() {
                recycled.fill(Extra::default());
                self.extras.push_back(recycled);
            }
            self.first_live_block += 1;
        } else {
            self.extras
                .push_back(vec![Extra::default(); BLOCK_SIZE as usize].into_boxed_slice());
        }

        // Thread the new block into a circular list of its own.
        for i in src_num_units + 1..dest_num_units {
            self.extra_mut(i - 1).set_next(i);
            self.extra_mut(i).set_prev(i - 1);
        }
        self.extra_mut(src_num_units).set_prev(dest_num_units - 1);
        self.extra_mut(dest_num_units - 1).set_next(src_num_units);

        // Splice it in front of the head. With an empty list `unfixed_index`
        // already names the first new unit and every write is a no-op.
        let head = self.unfixed_index;
        let head_prev = self.extra(head).prev();
        self.extra_mut(src_num_units).set_prev(head_prev);
        self.extra_mut(dest_num_units - 1).set_next(head);
        self.extra_mut(head_prev).set_next(src_num_units);
        self.extra_mut(head).set_prev(dest_num_units - 1);
    }

    fn fix_all_blocks(&mut self) {
        for block_id in self.first_live_block..self.num_units() / BLOCK_SIZE {
            self.fix_block(block_id);
        }
    }

    /// Reserves every still-free unit of a block and patches its label to
    /// `index ^ unused_offset`. A transition that strays into such a unit
    /// can then never see a matching label, because no node uses
    /// `unused_offset` as its base.
    fn fix_block(&mut self, block_id: u32) {
        let begin = block_id * BLOCK_SIZE;
        let end = begin + BLOCK_SIZE;

        // The free list is ordered, so a head at or past `end` means the
        // block has no free units left.
        if self.unfixed_index >= end {
            return;
        }

        let mut unused_offset = begin;
        for offset in begin..end {
            if !self.extra(offset).is_used() {
                unused_offset = offset;
                break;
            }
        }
        debug_assert!(!self.extra(unused_offset).is_used());

        while self.unfixed_index < end {
            let index = self.unfixed_index;
            self.reserve_index(index);
            self.units[index as usize].set_label((index ^ unused_offset) as u8);
        }
    }

    #[inline]
    fn num_units(&self) -> u32 {
        self.units.len() as u32
    }

    #[inline]
    fn extra(&self, index: u32) -> Extra {
        let block = (index / BLOCK_SIZE - self.first_live_block) as usize;
        self.extras[block][(index % BLOCK_SIZE) as usize]
    }

    #[inline]
    fn extra_mut(&mut self, index: u32) -> &mut Extra {
        let block = (index / BLOCK_SIZE - self.first_live_block) as usize;
        &mut self.extras[block][(index % BLOCK_SIZE) as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::TrieView;

    #[test]
    fn empty_key_set_is_a_two_unit_skeleton() {
        let keys: Vec<&[u8]> = vec![];
        let da = DoubleArray::build(&keys).unwrap();
        assert_eq!(da.total_size(), 8);
        assert!(TrieView::is_valid_image(da.as_bytes()));
        assert_eq!(da.exact_match(b"a"), None);
        assert_eq!(da.exact_match(b""), None);
    }

    #[test]
    fn single_one_byte_key() {
        let keys: Vec<&[u8]> = vec![b"x"];
        let da = DoubleArray::build(&keys).unwrap();
        assert_eq!(da.exact_match(b"x"), Some(0));
        assert_eq!(da.exact_match(b"y"), None);
        assert_eq!(da.exact_match(b"xx"), None);
    }

    #[test]
    fn trie_region_is_block_aligned() {
        let keys: Vec<&[u8]> = vec![b"a", b"b", b"c"];
        let da = DoubleArray::build(&keys).unwrap();
        let trie_units =
            u32::from_le_bytes(da.as_bytes()[4..8].try_into().unwrap()) >> 10;
        assert_eq!(trie_units % BLOCK_SIZE, 0);
        assert!((trie_units as usize) <= da.num_units());
    }

    #[test]
    fn deterministic_output() {
        let keys: Vec<Vec<u8>> = (0..2000u32)
            .map(|i| format!("{i:05}").into_bytes())
            .collect();
        let a = DoubleArray::build(&keys).unwrap();
        let b = DoubleArray::build(&keys).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn progress_reports_each_leaf() {
        let keys: Vec<&[u8]> = vec![b"a", b"ab", b"ab", b"b"];
        let mut calls = Vec::new();
        let da = DoubleArray::build_with(&keys, None, |done, total| {
            calls.push((done, total));
        })
        .unwrap();
        // The duplicate is dropped before placement.
        assert_eq!(calls, vec![(1, 3), (2, 3), (3, 3)]);
        assert_eq!(da.exact_match(b"b"), Some(2));
    }

    #[test]
    fn multi_block_build() {
        // Three-digit-suffix fan-out forces the trie across many blocks.
        let keys: Vec<Vec<u8>> = (0..70_000u32)
            .map(|i| format!("{i:06}").into_bytes())
            .collect();
        let da = DoubleArray::build(&keys).unwrap();
        assert!(da.num_units() > 16 * BLOCK_SIZE as usize);
        for (i, key) in keys.iter().enumerate().step_by(617) {
            assert_eq!(da.exact_match(key), Some(i as i32));
        }
        assert_eq!(da.exact_match(b"070000"), None);
        assert_eq!(da.exact_match(b"00000"), None);
    }

    #[test]
    fn unsorted_build_fails() {
        let keys: Vec<&[u8]> = vec![b"b", b"a"];
        assert!(matches!(
            DoubleArray::build(&keys),
            Err(TrieError::UnsortedKeys)
        ));
    }
}
