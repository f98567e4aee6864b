//! Identifier generation and the sortable timestamp encoding.

use chrono::{DateTime, NaiveDateTime, Utc};
use rand::Rng;

/// Timestamp layout for stored records. Fixed width, so lexicographic order
/// equals chronological order and secondary-index range queries sort correctly.
pub const SORTABLE_TIME: &str = "%Y%m%d.%H%M%S%.9f";

pub const RELEASE_PREFIX: &str = "R";
pub const BUILD_PREFIX: &str = "B";

/// Number of random letters following the kind prefix.
pub const ID_LENGTH: usize = 9;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// `prefix` followed by `len` random upper-case letters.
pub fn generate_id(prefix: &str, len: usize) -> String {
    let mut rng = rand::thread_rng();
    let mut id = String::with_capacity(prefix.len() + len);
    id.push_str(prefix);
    for _ in 0..len {
        id.push(ALPHABET[rng.gen_range(0..ALPHABET.len())] as char);
    }
    id
}

pub fn new_release_id() -> String {
    generate_id(RELEASE_PREFIX, ID_LENGTH)
}

/// Whether `id` has the shape produced by [`new_release_id`].
pub fn is_release_id(id: &str) -> bool {
    id.strip_prefix(RELEASE_PREFIX)
        .is_some_and(|rest| rest.len() == ID_LENGTH && rest.bytes().all(|b| b.is_ascii_uppercase()))
}

pub fn format_sortable(at: &DateTime<Utc>) -> String {
    at.format(SORTABLE_TIME).to_string()
}

pub fn parse_sortable(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(value, SORTABLE_TIME).map(|naive| naive.and_utc())
}
