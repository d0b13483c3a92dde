//! Loading and saving dictionary images.
//!
//! A dictionary file is the raw little-endian image with no header or
//! footer: `num_units * 4` bytes, the tail region stored in-array after the
//! unit count recorded in unit 1. The unit count doubles as the load-time
//! validity check.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::unit::UNIT_SIZE;
use crate::view::TrieView;
use crate::{DoubleArray, TrieError};

impl DoubleArray {
    /// Takes ownership of a serialized image.
    ///
    /// # Errors
    ///
    /// Returns [`TrieError::InvalidImage`] when the length is not a nonzero
    /// multiple of the unit size or the recorded unit count points outside
    /// the image.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, TrieError> {
        if !TrieView::is_valid_image(&bytes) {
            return Err(TrieError::InvalidImage);
        }
        Ok(Self::from_image(bytes))
    }

    /// Loads a dictionary file, sizing it from the file length.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TrieError> {
        Self::load_at(path, 0, None)
    }

    /// Loads a dictionary embedded in a larger file, starting at byte
    /// `offset`. Without an explicit `size` the image is assumed to reach
    /// the end of the file.
    pub fn load_at<P: AsRef<Path>>(
        path: P,
        offset: u64,
        size: Option<u64>,
    ) -> Result<Self, TrieError> {
        let mut file = File::open(path)?;
        let file_len = file.metadata()?.len();
        if offset > file_len {
            return Err(TrieError::InvalidImage);
        }
        let size = size.unwrap_or(file_len - offset);
        if size > file_len - offset {
            return Err(TrieError::InvalidImage);
        }

        file.seek(SeekFrom::Start(offset))?;
        let mut bytes = vec![0u8; size as usize];
        file.read_exact(&mut bytes)?;
        log::debug!("loaded dictionary: {} units", bytes.len() / UNIT_SIZE);
        Self::from_bytes(bytes)
    }

    /// Writes the raw image to a file, replacing it if present.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), TrieError> {
        let mut file = File::create(path)?;
        file.write_all(self.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct TempFile(PathBuf);

    impl TempFile {
        fn new(name: &str) -> Self {
            let mut path = std::env::temp_dir();
            path.push(format!("dart-trie-{}-{name}", std::process::id()));
            Self(path)
        }
    }

    impl Drop for TempFile {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    fn sample() -> DoubleArray {
        let keys: Vec<&[u8]> = vec![b"ba", b"ca", b"da"];
        DoubleArray::build(&keys).unwrap()
    }

    #[test]
    fn save_and_load_round_trip() {
        let da = sample();
        let tmp = TempFile::new("round-trip");
        da.save(&tmp.0).unwrap();
        let loaded = DoubleArray::load(&tmp.0).unwrap();
        assert_eq!(loaded, da);
        assert_eq!(loaded.exact_match(b"ca"), Some(1));
        assert_eq!(loaded.exact_match(b"a"), None);
    }

    #[test]
    fn load_at_reads_an_embedded_image() {
        let da = sample();
        let tmp = TempFile::new("embedded");

        let mut file_bytes = b"HEADERXX".to_vec();
        file_bytes.extend_from_slice(da.as_bytes());
        file_bytes.extend_from_slice(b"TRAIL");
        std::fs::write(&tmp.0, &file_bytes).unwrap();

        let loaded =
            DoubleArray::load_at(&tmp.0, 8, Some(da.total_size() as u64)).unwrap();
        assert_eq!(loaded, da);

        // Without an explicit size the ragged trailer rides along and
        // fails the length check.
        assert!(DoubleArray::load_at(&tmp.0, 8, None).is_err());
    }

    #[test]
    fn ragged_file_is_rejected() {
        let da = sample();
        let tmp = TempFile::new("ragged");
        let mut bytes = da.as_bytes().to_vec();
        bytes.push(0xFF);
        std::fs::write(&tmp.0, &bytes).unwrap();
        assert!(matches!(
            DoubleArray::load(&tmp.0),
            Err(TrieError::InvalidImage)
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let tmp = TempFile::new("missing");
        assert!(matches!(
            DoubleArray::load(&tmp.0),
            Err(TrieError::Io(_))
        ));
    }

    #[test]
    fn offset_past_eof_is_rejected() {
        let da = sample();
        let tmp = TempFile::new("offset-eof");
        da.save(&tmp.0).unwrap();
        assert!(DoubleArray::load_at(&tmp.0, 1 << 20, None).is_err());
    }

    #[test]
    fn from_bytes_round_trip() {
        let da = sample();
        let again = DoubleArray::from_bytes(da.clone().into_bytes()).unwrap();
        assert_eq!(again, da);
    }

    #[test]
    fn large_dictionary_buffer_round_trip() {
        let keys: Vec<Vec<u8>> = (0..100_000u32)
            .map(|i| format!("key-{i:07}").into_bytes())
            .collect();
        let da = DoubleArray::build(&keys).unwrap();

        let loaded = DoubleArray::from_bytes(da.as_bytes().to_vec()).unwrap();
        for (i, key) in keys.iter().enumerate().step_by(1013) {
            assert_eq!(loaded.exact_match(key), Some(i as i32));
        }
        assert_eq!(loaded.exact_match(b"key-0100000"), None);
        let prefixes: Vec<_> = loaded.common_prefix_search(b"key-0000000xyz").collect();
        assert_eq!(prefixes.len(), 1);
        assert_eq!(prefixes[0].value, 0);
    }
}
