//! Property-based tests for sitesync
//!
//! These tests verify invariants that must hold for all inputs:
//! - Remote paths always start with `/` and never carry URL syntax
//! - Entity tag normalization strips exactly one character per side
//! - Sync keys round-trip relative paths with `/` separators
//! - Compression decisions follow the blacklist and threshold
//!
//! Run with: cargo test --test property_tests

use proptest::prelude::*;

// ============================================================================
// REMOTE PATH TESTS
// ============================================================================

mod remote_path_tests {
    use super::*;
    use sitesync::sync::normalize_remote_path;

    proptest! {
        /// Invariant: normalized paths start with a single `/`
        #[test]
        fn leading_slash(key in "\\PC{0,60}") {
            let path = normalize_remote_path(&key);
            prop_assert!(path.starts_with('/'));
        }

        /// Invariant: no query, fragment or whitespace survives encoding
        #[test]
        fn no_url_syntax(key in "[a-z?#& =%/]{1,40}") {
            let path = normalize_remote_path(&key);
            prop_assert!(!path.contains('?'));
            prop_assert!(!path.contains('#'));
            prop_assert!(!path.contains(' '));
        }

        /// Invariant: segment structure is preserved
        #[test]
        fn segments_preserved(parts in prop::collection::vec("[a-zA-Z0-9._~$&+,:;=@-]{1,12}", 1..6)) {
            let key = parts.join("/");
            prop_assert_eq!(normalize_remote_path(&key), format!("/{}", key));
        }
    }
}

// ============================================================================
// ENTITY TAG TESTS
// ============================================================================

mod etag_tests {
    use super::*;
    use sitesync::sync::inventory::normalize_etag;

    proptest! {
        /// Invariant: a quoted value normalizes back to itself
        #[test]
        fn quoted_round_trip(inner in "[0-9a-f]{0,40}") {
            let quoted = format!("\"{}\"", inner);
            prop_assert_eq!(normalize_etag(&quoted), inner.as_str());
        }

        /// Invariant: never panics, result is two characters shorter or empty
        #[test]
        fn strips_two_chars(s in "\\PC{0,40}") {
            let normalized = normalize_etag(&s);
            let count = s.chars().count();
            prop_assert_eq!(normalized.chars().count(), count.saturating_sub(2));
        }
    }
}

// ============================================================================
// SYNC KEY TESTS
// ============================================================================

mod sync_key_tests {
    use super::*;
    use sitesync::sync::enumerate::sync_key;
    use std::path::{Path, PathBuf};

    proptest! {
        /// Invariant: the key is the relative path joined with `/`
        #[test]
        fn relative_components(parts in prop::collection::vec("[a-zA-Z0-9_-]{1,10}", 1..5)) {
            let root = Path::new("/srv/site");
            let path: PathBuf = parts.iter().fold(root.to_path_buf(), |p, part| p.join(part));
            prop_assert_eq!(sync_key(root, &path), Some(parts.join("/")));
        }
    }
}

// ============================================================================
// COMPRESSION POLICY TESTS
// ============================================================================

mod compression_tests {
    use super::*;
    use sitesync::sync::transform::{TransformPolicy, DEFAULT_COMPRESS_BLACKLIST};

    proptest! {
        /// Invariant: blacklisted extensions are never compressed
        #[test]
        fn blacklist_wins(idx in 0usize..DEFAULT_COMPRESS_BLACKLIST.len(), size in any::<u64>()) {
            let policy = TransformPolicy::default();
            prop_assert!(!policy.should_compress(Some(DEFAULT_COMPRESS_BLACKLIST[idx]), size));
        }

        /// Invariant: other extensions compress exactly above the threshold
        #[test]
        fn threshold_decides(ext in "(txt|html|css|js|json|md)", size in 0u64..5000) {
            let policy = TransformPolicy::default();
            prop_assert_eq!(policy.should_compress(Some(ext.as_str()), size), size > 500);
        }
    }
}
