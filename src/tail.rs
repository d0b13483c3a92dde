//! Tail packing: shared storage of leaf suffixes and values.
//!
//! After the trie is laid out, every leaf still owns an unconsumed suffix.
//! Keys are ordered so that equal suffixes become neighbors (stable sort by
//! reversed bytes, descending); a key whose suffix ends an already emitted
//! one reuses its bytes and only appends a value, distinguished by the leaf's
//! value id. Each tail entry is the suffix, a zero terminator, then the
//! packed values of every key sharing it.

use std::cmp::Ordering;

use crate::key::BuildKey;
use crate::unit::{Unit, LINK_MAX, VALUE_ID_MAX, VALUE_SIZE};
use crate::TrieError;

/// Orders keys by their reversed remaining suffix, longest first among
/// shared suffixes, so every mergeable key directly follows its host.
fn reversed_order(a: &BuildKey<'_>, b: &BuildKey<'_>) -> Ordering {
    let mut i = 0;
    loop {
        let (x, y) = (a.rbyte(i), b.rbyte(i));
        if x != y {
            return y.cmp(&x);
        }
        if x == 0 {
            return Ordering::Equal;
        }
        i += 1;
    }
}

/// Writes every leaf's suffix and value into a fresh tail region and patches
/// the leaf units with their value id and link.
pub(crate) fn pack_tail(
    units: &mut [Unit],
    keys: &mut [BuildKey<'_>],
) -> Result<Vec<u8>, TrieError> {
    let mut tail = Vec::new();
    if keys.is_empty() {
        return Ok(tail);
    }

    keys.sort_by(reversed_order);

    // Byte offset just past the terminator of the current entry's suffix.
    let mut base_link = 0usize;
    let mut values: Vec<i32> = Vec::new();

    for i in 0..keys.len() {
        let is_suffix = i > 0 && keys[i].is_suffix_of(&keys[i - 1]);
        let mut value_id = 0u32;
        if is_suffix {
            // An equal value inside the entry is reused outright.
            while (value_id as usize) < values.len()
                && values[value_id as usize] != keys[i].value()
            {
                value_id += 1;
            }
        }

        if !is_suffix || value_id >= VALUE_ID_MAX {
            base_link += VALUE_SIZE * values.len() + keys[i].remaining_len() + 1;
            values.clear();
            value_id = 0;
            tail.extend_from_slice(keys[i].remaining());
            tail.push(0);
        }

        let link = base_link - keys[i].remaining_len() - 1;
        if link >= LINK_MAX as usize {
            return Err(TrieError::LinkOverflow(link));
        }
        let leaf = &mut units[keys[i].leaf_index() as usize];
        leaf.set_value_id(value_id);
        leaf.set_link(link as u32);

        if value_id as usize == values.len() {
            values.push(keys[i].value());
            tail.extend_from_slice(&keys[i].value().to_le_bytes());
        }
    }
    Ok(tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DoubleArray;

    fn tail_of(da: &DoubleArray) -> &[u8] {
        let trie_units = u32::from_le_bytes(da.as_bytes()[4..8].try_into().unwrap()) >> 10;
        &da.as_bytes()[trie_units as usize * 4..]
    }

    fn count_entries(tail: &[u8], suffix: &[u8]) -> usize {
        let mut pattern = suffix.to_vec();
        pattern.push(0);
        (0..tail.len().saturating_sub(pattern.len() - 1))
            .filter(|&i| tail[i..].starts_with(&pattern))
            .count()
    }

    #[test]
    fn nested_suffix_is_stored_once() {
        // "aa" is a whole suffix of "baa": one tail entry serves both.
        let keys: Vec<&[u8]> = vec![b"aa", b"baa"];
        let da = DoubleArray::build(&keys).unwrap();

        let mut expected = b"baa\0".to_vec();
        expected.extend_from_slice(&1i32.to_le_bytes());
        expected.extend_from_slice(&0i32.to_le_bytes());
        let tail = tail_of(&da);
        assert!(tail.starts_with(&expected), "tail = {tail:?}");
        assert_eq!(count_entries(tail, b"baa"), 1);

        assert_eq!(da.exact_match(b"aa"), Some(0));
        assert_eq!(da.exact_match(b"baa"), Some(1));
        assert_eq!(da.exact_match(b"a"), None);
    }

    #[test]
    fn equal_values_share_a_slot() {
        let keys: Vec<&[u8]> = vec![b"a", b"ba"];
        let da = DoubleArray::build_with_values(&keys, &[7, 7]).unwrap();
        let mut expected = b"ba\0".to_vec();
        expected.extend_from_slice(&7i32.to_le_bytes());
        let tail = tail_of(&da);
        assert!(tail.starts_with(&expected), "tail = {tail:?}");
        // The second key reuses the first slot; no value is appended and
        // only image padding may follow.
        let rest = &tail[expected.len()..];
        assert!(rest.len() < 4 && rest.iter().all(|&b| b == 0));

        assert_eq!(da.exact_match(b"a"), Some(7));
        assert_eq!(da.exact_match(b"ba"), Some(7));
    }

    #[test]
    fn full_entry_spills_into_a_new_one() {
        // "z", "az", ..., "a{9}z": every suffix nests into the previous
        // entry, but one entry holds at most eight values.
        let mut keys: Vec<Vec<u8>> = (0..10usize)
            .map(|n| {
                let mut k = vec![b'a'; n];
                k.push(b'z');
                k
            })
            .collect();
        keys.sort();
        let da = DoubleArray::build(&keys).unwrap();

        let mut expected = b"az\0".to_vec();
        for v in 0i32..8 {
            expected.extend_from_slice(&v.to_le_bytes());
        }
        expected.extend_from_slice(b"z\0");
        expected.extend_from_slice(&8i32.to_le_bytes());
        expected.extend_from_slice(&9i32.to_le_bytes());
        let tail = tail_of(&da);
        assert!(tail.starts_with(&expected), "tail = {tail:?}");

        for (i, key) in keys.iter().enumerate() {
            assert_eq!(da.exact_match(key), Some(i as i32));
        }
    }

    #[test]
    fn long_shared_suffix() {
        let keys: Vec<&[u8]> = vec![b"ation", b"nation", b"station"];
        let da = DoubleArray::build(&keys).unwrap();
        for (i, key) in keys.iter().enumerate() {
            assert_eq!(da.exact_match(key), Some(i as i32));
        }
        assert_eq!(da.exact_match(b"tation"), None);
    }

    #[test]
    fn reversed_order_groups_suffixes() {
        let raw: Vec<&[u8]> = vec![b"a", b"ab", b"ba"];
        let mut keys = crate::key::collect_keys(&raw, None).unwrap();
        keys.sort_by(reversed_order);
        let order: Vec<&[u8]> = keys.iter().map(|k| k.remaining()).collect();
        // Descending by reversed bytes, longer before its own suffix.
        assert_eq!(order, vec![b"ab".as_ref(), b"ba".as_ref(), b"a".as_ref()]);
    }
}
