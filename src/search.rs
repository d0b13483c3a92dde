//! Query API: exact match, common-prefix search, and resumable traversal.

use crate::unit::Unit;
use crate::DoubleArray;

/// A key reported by common-prefix search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrefixMatch {
    /// Value stored for the matched key.
    pub value: i32,
    /// Length in bytes of the matched key, a prefix of the query.
    pub len: usize,
}

/// Outcome of one [`DoubleArray::traverse`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraverseResult {
    /// The bytes walked so far spell a stored key; carries its value.
    Found(i32),
    /// The walk is alive inside the trie but no key ends here yet.
    Incomplete,
    /// A transition failed; no stored key continues the walked bytes.
    Mismatch,
}

/// Resumable position for [`DoubleArray::traverse`].
///
/// `Default` is the root. After a call the cursor names the node reached
/// (or, past a leaf, the tail position reached), so a subsequent call
/// continues where the previous one stopped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cursor {
    unit: Unit,
}

impl Cursor {
    #[inline]
    pub(crate) fn from_unit(unit: Unit) -> Self {
        Self { unit }
    }

    #[inline]
    pub(crate) fn unit(self) -> Unit {
        self.unit
    }
}

impl DoubleArray {
    /// Looks up `key` exactly. Returns its value, or `None` when the key is
    /// not in the dictionary.
    pub fn exact_match(&self, key: &[u8]) -> Option<i32> {
        self.view().exact_match(key, Unit::default())
    }

    /// Looks up `key` starting from a position previously reached by
    /// [`DoubleArray::traverse`], matching only the remaining bytes.
    pub fn exact_match_at(&self, key: &[u8], cursor: Cursor) -> Option<i32> {
        self.view().exact_match(key, cursor.unit())
    }

    /// Enumerates every stored key that is a prefix of `query`, shortest
    /// first. The iterator is lazy; bound it with
    /// [`Iterator::take`] to cap the number of results.
    pub fn common_prefix_search<'a>(
        &'a self,
        query: &'a [u8],
    ) -> impl Iterator<Item = PrefixMatch> + 'a {
        self.view().common_prefix_search(query, Unit::default())
    }

    /// Common-prefix search starting from a position previously reached by
    /// [`DoubleArray::traverse`]. Reported lengths count bytes of `query`,
    /// not of the bytes consumed before the starting position; a key that
    /// ends exactly at the starting position is reported with length 0.
    pub fn common_prefix_search_at<'a>(
        &'a self,
        query: &'a [u8],
        cursor: Cursor,
    ) -> impl Iterator<Item = PrefixMatch> + 'a {
        self.view().common_prefix_search(query, cursor.unit())
    }

    /// Walks `key` starting at `cursor` and `key_pos`, updating both to
    /// where the walk stopped.
    ///
    /// Returns [`TraverseResult::Found`] when the bytes up to the stop point
    /// spell a stored key, [`TraverseResult::Incomplete`] when the key ran
    /// out mid-trie, and [`TraverseResult::Mismatch`] when no stored key
    /// continues the walked bytes. After `Found` or `Incomplete` the walk
    /// may be resumed with more bytes.
    pub fn traverse(
        &self,
        key: &[u8],
        cursor: &mut Cursor,
        key_pos: &mut usize,
    ) -> TraverseResult {
        self.view().traverse(key, cursor, key_pos)
    }
}
