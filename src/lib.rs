//! A compact double-array trie mapping byte keys to `i32` values.
//!
//! [`DoubleArray`] packs a static dictionary into a flat array of 32-bit
//! units. Transitions are computed with XOR (`child = parent ^ offset ^ byte`)
//! and shared key suffixes are folded into a byte tail appended to the same
//! array, so the whole dictionary is one contiguous, relocatable image that
//! can be written to disk and reloaded (or borrowed in place) byte for byte.
//!
//! Keys are opaque byte sequences. The byte `0x00` is reserved as the
//! in-array terminator and must not appear inside a key. Keys handed to the
//! builder must be strictly ascending; duplicates are dropped, keeping the
//! first occurrence.
//!
//! # Quick start
//!
//! ```
//! use dart_trie::DoubleArray;
//!
//! let keys: Vec<&[u8]> = vec![b"apple", b"apply", b"apricot"];
//! let da = DoubleArray::build(&keys).unwrap();
//! assert_eq!(da.exact_match(b"apply"), Some(1));
//! assert_eq!(da.exact_match(b"app"), None);
//! ```

#![warn(missing_docs)]

mod build;
mod da_ref;
mod key;
mod search;
mod serial;
mod tail;
mod unit;
mod view;

pub use da_ref::DoubleArrayRef;
pub use search::{Cursor, PrefixMatch, TraverseResult};

use thiserror::Error;

use crate::view::TrieView;

/// Errors raised while building, loading, or saving a dictionary.
///
/// Query misses are not errors: [`DoubleArray::exact_match`] returns `None`
/// and [`DoubleArray::traverse`] reports them through [`TraverseResult`].
#[derive(Debug, Error)]
pub enum TrieError {
    /// The key set was not in strictly ascending byte order.
    #[error("keys are not sorted in ascending order")]
    UnsortedKeys,
    /// A key contained the reserved byte `0x00`.
    #[error("key {0} contains a zero byte")]
    NulByte(usize),
    /// A key was empty; keys must be at least one byte long.
    #[error("key {0} is empty")]
    EmptyKey(usize),
    /// The value slice did not match the key slice in length.
    #[error("got {got} values for {keys} keys")]
    ValueCountMismatch {
        /// Number of keys passed to the builder.
        keys: usize,
        /// Number of values passed to the builder.
        got: usize,
    },
    /// A node offset exceeded the 32-bit unit encoding.
    #[error("node offset {0:#x} does not fit the unit encoding")]
    OffsetOverflow(u32),
    /// A tail link exceeded the 32-bit unit encoding.
    #[error("tail link {0:#x} does not fit the unit encoding")]
    LinkOverflow(usize),
    /// The byte image is not a valid dictionary.
    #[error("dictionary image is truncated or corrupted")]
    InvalidImage,
    /// An underlying I/O operation failed.
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// A double-array trie dictionary owning its packed byte image.
///
/// Created by [`DoubleArray::build`] or by loading a previously saved image
/// ([`DoubleArray::load`], [`DoubleArray::from_bytes`]). A dictionary is
/// immutable after construction; all query methods take `&self` and never
/// allocate, so a `DoubleArray` can be shared freely across threads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DoubleArray {
    bytes: Vec<u8>,
}

impl DoubleArray {
    pub(crate) fn from_image(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub(crate) fn view(&self) -> TrieView<'_> {
        TrieView::over(&self.bytes)
    }

    /// Returns the number of 32-bit units in the image, including the units
    /// whose storage holds tail bytes.
    pub fn num_units(&self) -> usize {
        self.bytes.len() / unit::UNIT_SIZE
    }

    /// Returns the size of the image in bytes.
    pub fn total_size(&self) -> usize {
        self.bytes.len()
    }

    /// Returns the raw little-endian image. Writing these bytes to a file
    /// produces a loadable dictionary; see [`DoubleArray::save`].
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the dictionary and returns its image.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_is_word_sized() {
        let da = DoubleArray::build(&[b"ab".as_ref(), b"cd".as_ref()]).unwrap();
        assert_eq!(da.total_size() % 4, 0);
        assert_eq!(da.num_units() * 4, da.total_size());
    }

    #[test]
    fn error_display() {
        assert_eq!(
            TrieError::UnsortedKeys.to_string(),
            "keys are not sorted in ascending order"
        );
        assert_eq!(
            TrieError::NulByte(3).to_string(),
            "key 3 contains a zero byte"
        );
    }
}
