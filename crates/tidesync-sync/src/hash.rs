//! Content hashing for change detection
//!
//! A file counts as unchanged when the hash of its current bytes equals the
//! hash recorded at the last sync. This trusts the hash: two different
//! contents with the same 64-bit hash would be taken for the same file. The
//! chance is accepted in exchange for not storing file contents in the
//! metadata; it is a known trade-off, not a defect.
//!
//! Hashing content instead of comparing modification times keeps detection
//! independent of timestamp granularity and clock skew.

use xxhash_rust::xxh3::xxh3_64;

/// Hash of a file's contents as recorded in the metadata
///
/// The same function is used when metadata is written and when files are
/// compared against it. Changing it invalidates every recorded hash and makes
/// every file look modified on the next round.
pub fn content_hash(contents: &[u8]) -> u64 {
    xxh3_64(contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_hash_is_stable(bytes in proptest::collection::vec(any::<u8>(), 0..4096)) {
            prop_assert_eq!(content_hash(&bytes), content_hash(&bytes.clone()));
        }

        #[test]
        fn test_appending_changes_hash_in_practice(
            bytes in proptest::collection::vec(any::<u8>(), 0..1024),
            extra in any::<u8>(),
        ) {
            // Not a law, but a collision here would be a one-in-2^64 event.
            let mut longer = bytes.clone();
            longer.push(extra);
            prop_assert_ne!(content_hash(&bytes), content_hash(&longer));
        }
    }

    #[test]
    fn test_known_values() {
        assert_eq!(content_hash(b""), content_hash(&[]));
        assert_ne!(content_hash(b"hello"), content_hash(b"hello\n"));
    }
}
