// SPDX-License-Identifier: Apache-2.0
//! The bucket entity and its name predicate.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::unwrap_used)]
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9-]{1,61}[a-z0-9]$").unwrap())
}

/// Validates a bucket name: either `[a-z0-9][a-z0-9-]{1,61}[a-z0-9]` (3–63
/// chars) or exactly three alphanumeric lowercase characters.
#[must_use]
pub fn is_valid_bucket_name(name: &str) -> bool {
    if name.len() == 3 && name.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()) {
        return true;
    }
    name.len() >= 3 && name.len() <= 63 && name_pattern().is_match(name)
}

/// A bucket row plus its derived aggregates.
#[derive(Debug, Clone)]
pub struct Bucket {
    /// Internal numeric id.
    pub id: i64,
    /// Unique bucket name.
    pub name: String,
    /// Opaque owner identifier.
    pub owner_id: String,
    /// Whether any caller may read the bucket.
    pub public: bool,
    /// Quota in bytes; `0` means unlimited.
    pub quota_bytes: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-updated timestamp.
    pub updated_at: DateTime<Utc>,
    /// Number of objects currently in the bucket (derived).
    pub object_count: i64,
    /// Sum of object sizes currently in the bucket (derived).
    pub total_size: i64,
}

/// Options accepted by `CreateBucket` beyond name/owner.
#[derive(Debug, Clone, Default)]
pub struct CreateBucketOptions {
    /// Whether the bucket should be publicly readable.
    pub public: bool,
    /// Quota in bytes; `0` means unlimited.
    pub quota_bytes: i64,
}

#[cfg(test)]
mod tests {
    use super::is_valid_bucket_name;

    #[test]
    fn accepts_three_char_alphanumeric() {
        assert!(is_valid_bucket_name("abc"));
        assert!(is_valid_bucket_name("a1b"));
    }

    #[test]
    fn accepts_general_form() {
        assert!(is_valid_bucket_name("my-bucket"));
        assert!(is_valid_bucket_name("a--------------------------------------------------------b"));
    }

    #[test]
    fn rejects_uppercase_underscore_dot_space() {
        assert!(!is_valid_bucket_name("My-Bucket"));
        assert!(!is_valid_bucket_name("my_bucket"));
        assert!(!is_valid_bucket_name("my.bucket"));
        assert!(!is_valid_bucket_name("my bucket"));
    }

    #[test]
    fn rejects_leading_or_trailing_hyphen() {
        assert!(!is_valid_bucket_name("-bucket"));
        assert!(!is_valid_bucket_name("bucket-"));
    }

    #[test]
    fn rejects_bad_lengths() {
        assert!(!is_valid_bucket_name("ab"));
        assert!(!is_valid_bucket_name(&"a".repeat(64)));
    }
}

#[cfg(test)]
mod proptests {
    use super::is_valid_bucket_name;
    use proptest::prelude::*;

    proptest! {
        /// Any string assembled from the general-form alphabet, with
        /// lowercase-alphanumeric first/last characters, must validate —
        /// the predicate should never reject a name that matches its own
        /// grammar.
        #[test]
        fn generated_valid_names_are_always_accepted(
            first in "[a-z0-9]",
            middle in "[a-z0-9-]{0,59}",
            last in "[a-z0-9]",
        ) {
            let name = format!("{first}{middle}{last}");
            prop_assume!((3..=63).contains(&name.len()));
            prop_assert!(is_valid_bucket_name(&name));
        }

        /// Any string containing a character outside `[a-z0-9-]` must be
        /// rejected regardless of length or position.
        #[test]
        fn names_with_disallowed_characters_are_always_rejected(
            name in "[A-Za-z0-9_. ]{3,63}",
        ) {
            prop_assume!(name.bytes().any(|b| !(b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')));
            prop_assert!(!is_valid_bucket_name(&name));
        }
    }
}
