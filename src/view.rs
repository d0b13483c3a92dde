//! Shared read-only view over a dictionary image.
//!
//! All three queries run here so that [`crate::DoubleArray`] and
//! [`crate::DoubleArrayRef`] share one implementation. A view never assumes
//! the image is well formed: every unit and tail access is bounds-checked,
//! so a truncated or corrupted file reports misses instead of panicking.

use crate::search::{Cursor, PrefixMatch, TraverseResult};
use crate::unit::{Unit, UNIT_SIZE, VALUE_SIZE};

/// Byte at `pos`, with the virtual zero terminator past the end.
#[inline]
fn key_byte(key: &[u8], pos: usize) -> u8 {
    key.get(pos).copied().unwrap_or(0)
}

/// Borrowed view of a packed image: `tail_start` bytes of little-endian
/// units followed by the tail region.
#[derive(Clone, Copy)]
pub(crate) struct TrieView<'a> {
    bytes: &'a [u8],
    tail_start: usize,
}

impl<'a> TrieView<'a> {
    /// Wraps an image. The unit count recorded in unit 1 locates the tail;
    /// it is clamped to the image so even a corrupt value stays in bounds.
    pub(crate) fn over(bytes: &'a [u8]) -> Self {
        let trie_units = if bytes.len() >= 2 * UNIT_SIZE {
            let raw = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
            Unit::from_raw(raw).offset() as usize
        } else {
            0
        };
        let tail_start = (trie_units * UNIT_SIZE).min(bytes.len());
        Self { bytes, tail_start }
    }

    /// Layout rules every loaded image must satisfy.
    pub(crate) fn is_valid_image(bytes: &[u8]) -> bool {
        if bytes.len() < 2 * UNIT_SIZE || bytes.len() % UNIT_SIZE != 0 {
            return false;
        }
        let raw = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let trie_units = Unit::from_raw(raw).offset() as usize;
        trie_units >= 2 && trie_units <= bytes.len() / UNIT_SIZE
    }

    #[inline]
    fn unit_at(&self, index: u32) -> Option<Unit> {
        let start = index as usize * UNIT_SIZE;
        if start + UNIT_SIZE > self.tail_start {
            return None;
        }
        let bytes = self.bytes.get(start..start + UNIT_SIZE)?;
        Some(Unit::from_raw(u32::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3],
        ])))
    }

    #[inline]
    fn tail_byte(&self, index: usize) -> Option<u8> {
        self.bytes.get(self.tail_start + index).copied()
    }

    #[inline]
    fn value_at(&self, index: usize) -> Option<i32> {
        let start = self.tail_start + index;
        let bytes = self.bytes.get(start..start + VALUE_SIZE)?;
        Some(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Value of the key ending exactly at the node `index`: its zero-label
    /// child is a leaf whose tail entry starts at the terminator.
    fn end_value(&self, index: u32, unit: Unit) -> Option<i32> {
        let stray = self.unit_at(index ^ unit.offset())?;
        if !stray.is_leaf() {
            return None;
        }
        self.value_at(stray.link() as usize + 1 + VALUE_SIZE * stray.value_id() as usize)
    }

    pub(crate) fn exact_match(&self, key: &[u8], start: Unit) -> Option<i32> {
        let mut pos = 0usize;
        let leaf = if start.is_leaf() {
            start
        } else {
            let mut index = start.index();
            loop {
                let c = key_byte(key, pos);
                let unit = self.unit_at(index)?;
                index ^= unit.offset() ^ u32::from(c);
                let next = self.unit_at(index)?;
                if next.is_leaf() {
                    break next;
                }
                // Nothing but a leaf may sit behind the terminator
                // transition.
                if next.label() != c || c == 0 {
                    return None;
                }
                pos += 1;
            }
        };

        // The stored suffix starts with the byte that selected the leaf, so
        // comparing it replays the label check the unit cannot carry.
        let mut ti = leaf.link() as usize;
        loop {
            let t = self.tail_byte(ti)?;
            if t != key_byte(key, pos) {
                return None;
            }
            if t == 0 {
                return self.value_at(ti + 1 + VALUE_SIZE * leaf.value_id() as usize);
            }
            ti += 1;
            pos += 1;
        }
    }

    pub(crate) fn common_prefix_search(
        self,
        query: &'a [u8],
        start: Unit,
    ) -> CommonPrefixIter<'a> {
        let state = if start.is_leaf() {
            PrefixState::Tail {
                leaf: start,
                ti: start.link() as usize,
            }
        } else {
            PrefixState::Nodes
        };
        CommonPrefixIter {
            view: self,
            query,
            pos: 0,
            index: start.index(),
            state,
        }
    }

    pub(crate) fn traverse(
        &self,
        key: &[u8],
        cursor: &mut Cursor,
        key_pos: &mut usize,
    ) -> TraverseResult {
        let mut agent = cursor.unit();
        let mut pos = *key_pos;

        if !agent.is_leaf() {
            let mut index = agent.index();
            let leaf = loop {
                let c = key_byte(key, pos);
                if c == 0 {
                    break None;
                }
                let Some(unit) = self.unit_at(index) else {
                    return Self::settle(cursor, key_pos, agent, pos, TraverseResult::Mismatch);
                };
                let next_index = index ^ unit.offset() ^ u32::from(c);
                let Some(next) = self.unit_at(next_index) else {
                    return Self::settle(cursor, key_pos, agent, pos, TraverseResult::Mismatch);
                };
                if next.is_leaf() {
                    index = next_index;
                    break Some(next);
                }
                if next.label() != c {
                    return Self::settle(cursor, key_pos, agent, pos, TraverseResult::Mismatch);
                }
                index = next_index;
                agent.set_index(index);
                pos += 1;
            };

            match leaf {
                None => {
                    // Key consumed while still between transitions.
                    let result = match self.unit_at(index) {
                        Some(node) if node.is_end() => match self.end_value(index, node) {
                            Some(value) => TraverseResult::Found(value),
                            None => TraverseResult::Mismatch,
                        },
                        Some(_) => TraverseResult::Incomplete,
                        None => TraverseResult::Mismatch,
                    };
                    return Self::settle(cursor, key_pos, agent, pos, result);
                }
                Some(leaf_unit) => agent = leaf_unit,
            }
        }

        // Tail mode; the link tracks how far the suffix has been consumed
        // so a later call picks up the comparison mid-entry.
        let mut ti = agent.link() as usize;
        loop {
            let c = key_byte(key, pos);
            let Some(t) = self.tail_byte(ti) else {
                agent.set_link(ti as u32);
                return Self::settle(cursor, key_pos, agent, pos, TraverseResult::Mismatch);
            };
            if t != c {
                agent.set_link(ti as u32);
                let result = if c == 0 {
                    TraverseResult::Incomplete
                } else {
                    TraverseResult::Mismatch
                };
                return Self::settle(cursor, key_pos, agent, pos, result);
            }
            if t == 0 {
                agent.set_link(ti as u32);
                let result = match self
                    .value_at(ti + 1 + VALUE_SIZE * agent.value_id() as usize)
                {
                    Some(value) => TraverseResult::Found(value),
                    None => TraverseResult::Mismatch,
                };
                return Self::settle(cursor, key_pos, agent, pos, result);
            }
            ti += 1;
            pos += 1;
        }
    }

    #[inline]
    fn settle(
        cursor: &mut Cursor,
        key_pos: &mut usize,
        agent: Unit,
        pos: usize,
        result: TraverseResult,
    ) -> TraverseResult {
        *cursor = Cursor::from_unit(agent);
        *key_pos = pos;
        result
    }
}

#[derive(Clone, Copy)]
enum PrefixState {
    Nodes,
    Tail { leaf: Unit, ti: usize },
    Done,
}

/// Iterator behind common-prefix search; see
/// [`crate::DoubleArray::common_prefix_search`].
pub(crate) struct CommonPrefixIter<'a> {
    view: TrieView<'a>,
    query: &'a [u8],
    pos: usize,
    index: u32,
    state: PrefixState,
}

impl CommonPrefixIter<'_> {
    /// Final comparison once a leaf is reached: the query matched the whole
    /// stored suffix when its terminator comes up while bytes still agree.
    fn finish_tail(&mut self, leaf: Unit, mut ti: usize) -> Option<PrefixMatch> {
        let mut pos = self.pos;
        let mut t = self.view.tail_byte(ti)?;
        if t != key_byte(self.query, pos) {
            return None;
        }
        while t != 0 && t == key_byte(self.query, pos) {
            ti += 1;
            pos += 1;
            t = self.view.tail_byte(ti)?;
        }
        if t != 0 {
            return None;
        }
        let value = self
            .view
            .value_at(ti + 1 + VALUE_SIZE * leaf.value_id() as usize)?;
        Some(PrefixMatch { value, len: pos })
    }
}

impl Iterator for CommonPrefixIter<'_> {
    type Item = PrefixMatch;

    fn next(&mut self) -> Option<PrefixMatch> {
        loop {
            match self.state {
                PrefixState::Done => return None,
                PrefixState::Tail { leaf, ti } => {
                    self.state = PrefixState::Done;
                    return self.finish_tail(leaf, ti);
                }
                PrefixState::Nodes => {
                    let Some(unit) = self.view.unit_at(self.index) else {
                        self.state = PrefixState::Done;
                        return None;
                    };
                    let c = key_byte(self.query, self.pos);

                    // A key ends at this node; report it before moving on.
                    let emit = if c != 0 && unit.is_end() {
                        self.view
                            .end_value(self.index, unit)
                            .map(|value| PrefixMatch {
                                value,
                                len: self.pos,
                            })
                    } else {
                        None
                    };

                    let next_index = self.index ^ unit.offset() ^ u32::from(c);
                    match self.view.unit_at(next_index) {
                        Some(next) if next.is_leaf() => {
                            self.state = PrefixState::Tail {
                                leaf: next,
                                ti: next.link() as usize,
                            };
                        }
                        Some(next) if next.label() == c && c != 0 => {
                            self.index = next_index;
                            self.pos += 1;
                        }
                        _ => self.state = PrefixState::Done,
                    }

                    if emit.is_some() {
                        return emit;
                    }
                }
            }
        }
    }
}
