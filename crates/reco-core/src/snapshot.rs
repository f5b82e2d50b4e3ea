//! Snapshot name generation
//!
//! Names have the form `<disk>-<zone>-<YYYYMMDDHHMMSS>-<random>`. The
//! `<disk>-<zone>` head is shortened when needed so that the timestamp and
//! the random suffix always survive and the whole name fits the compute
//! naming limit.

use chrono::{DateTime, Utc};
use rand::Rng;

/// Maximum length of a snapshot name, in bytes
pub const MAX_SNAPSHOT_NAME_LEN: usize = 63;
/// Maximum number of disk-name bytes kept in the prefix
pub const MAX_DISK_PREFIX_LEN: usize = 20;
/// Timestamp layout (`YYYYMMDDHHMMSS`)
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
/// Length of a formatted timestamp
pub const TIMESTAMP_LEN: usize = 14;
/// Length of the random suffix
pub const RANDOM_SUFFIX_LEN: usize = 8;

const SUFFIX_CHARACTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Snapshot name for `disk` in `zone`, stamped with the current time
pub fn random_snapshot_name<R: Rng>(zone: &str, disk: &str, rng: &mut R) -> String {
    snapshot_name_at(zone, disk, Utc::now(), rng)
}

/// Snapshot name for `disk` in `zone`, stamped with `at`
pub fn snapshot_name_at<R: Rng>(
    zone: &str,
    disk: &str,
    at: DateTime<Utc>,
    rng: &mut R,
) -> String {
    let head = format!("{}-{zone}", truncate_bytes(disk, MAX_DISK_PREFIX_LEN));
    let head_budget = MAX_SNAPSHOT_NAME_LEN - TIMESTAMP_LEN - RANDOM_SUFFIX_LEN - 2;
    let head = truncate_bytes(&head, head_budget);

    let suffix: String = (0..RANDOM_SUFFIX_LEN)
        .map(|_| char::from(SUFFIX_CHARACTERS[rng.random_range(0..SUFFIX_CHARACTERS.len())]))
        .collect();

    format!("{head}-{}-{suffix}", at.format(TIMESTAMP_FORMAT))
}

/// Longest prefix of `s` within `max` bytes that ends on a char boundary
fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
