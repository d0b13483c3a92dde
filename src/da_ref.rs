//! Zero-copy dictionaries borrowed from external buffers.

use crate::search::{Cursor, PrefixMatch, TraverseResult};
use crate::unit::{Unit, UNIT_SIZE};
use crate::view::TrieView;
use crate::{DoubleArray, TrieError};

/// A dictionary borrowing its image from an external byte buffer, e.g. a
/// memory-mapped file or a slice of a larger archive.
///
/// Units are decoded with `from_le_bytes`, so the buffer needs no particular
/// alignment and the host byte order never matters. The caller keeps
/// ownership of the bytes and must keep them alive for the lifetime of the
/// ref and every outstanding query.
#[derive(Clone, Copy, Debug)]
pub struct DoubleArrayRef<'a> {
    bytes: &'a [u8],
}

impl<'a> DoubleArrayRef<'a> {
    /// Wraps a serialized image without copying it.
    ///
    /// # Errors
    ///
    /// Returns [`TrieError::InvalidImage`] when the buffer length is not a
    /// nonzero multiple of the unit size or the recorded unit count points
    /// outside the buffer.
    pub fn from_bytes(bytes: &'a [u8]) -> Result<Self, TrieError> {
        if !TrieView::is_valid_image(bytes) {
            return Err(TrieError::InvalidImage);
        }
        Ok(Self { bytes })
    }

    #[inline]
    fn view(&self) -> TrieView<'a> {
        TrieView::over(self.bytes)
    }

    /// Returns the number of 32-bit units in the image.
    pub fn num_units(&self) -> usize {
        self.bytes.len() / UNIT_SIZE
    }

    /// Returns the size of the image in bytes.
    pub fn total_size(&self) -> usize {
        self.bytes.len()
    }

    /// Returns the borrowed image.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Looks up `key` exactly; see [`DoubleArray::exact_match`].
    pub fn exact_match(&self, key: &[u8]) -> Option<i32> {
        self.view().exact_match(key, Unit::default())
    }

    /// Resumed lookup; see [`DoubleArray::exact_match_at`].
    pub fn exact_match_at(&self, key: &[u8], cursor: Cursor) -> Option<i32> {
        self.view().exact_match(key, cursor.unit())
    }

    /// Enumerates stored prefixes of `query`; see
    /// [`DoubleArray::common_prefix_search`].
    pub fn common_prefix_search(
        &self,
        query: &'a [u8],
    ) -> impl Iterator<Item = PrefixMatch> + 'a {
        self.view().common_prefix_search(query, Unit::default())
    }

    /// Resumed common-prefix search; see
    /// [`DoubleArray::common_prefix_search_at`].
    pub fn common_prefix_search_at(
        &self,
        query: &'a [u8],
        cursor: Cursor,
    ) -> impl Iterator<Item = PrefixMatch> + 'a {
        self.view().common_prefix_search(query, cursor.unit())
    }

    /// Resumable walk; see [`DoubleArray::traverse`].
    pub fn traverse(
        &self,
        key: &[u8],
        cursor: &mut Cursor,
        key_pos: &mut usize,
    ) -> TraverseResult {
        self.view().traverse(key, cursor, key_pos)
    }

    /// Copies the image into an owned [`DoubleArray`].
    pub fn to_owned(&self) -> DoubleArray {
        DoubleArray::from_image(self.bytes.to_vec())
    }
}
