//! Naming and timestamp utilities for Steward
//!
//! Provides the timestamp formats written into task records, audit log
//! identifiers, and the collision-free naming policy shared by every writer.

use chrono::{DateTime, Local, NaiveDateTime};
use sha2::{Digest, Sha256};

use crate::error::{Result, StewardError};

/// Highest suffix tried before giving up: `name`, `stem_2` ... `stem_100`
pub const MAX_NAME_SUFFIX: u32 = 100;

/// Timestamp format written into metadata and transition rows
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Shorter format accepted when reading hand-written records
const SHORT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Format a local timestamp for records
pub fn format_timestamp(at: &DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Current local time, formatted for records
pub fn timestamp_now() -> String {
    format_timestamp(&Local::now())
}

/// Parse a record timestamp (with or without seconds)
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, SHORT_TIMESTAMP_FORMAT))
        .ok()
}

/// Generate an audit log identifier
///
/// Format: `LOG_{date}_{HHMM}_{hex6}` where the suffix is derived from the
/// instant and the seed so two logs in the same minute do not share an id.
pub fn generate_log_id(at: &DateTime<Local>, seed: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(at.to_rfc3339().as_bytes());
    hasher.update(at.timestamp_subsec_nanos().to_le_bytes());
    hasher.update(seed.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("LOG_{}_{}", at.format("%Y-%m-%d_%H%M"), &digest[..6])
}

/// Split a file name into stem and extension (extension includes the dot)
pub fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}

/// Stem of a file name, without extension
pub fn name_stem(name: &str) -> &str {
    split_name(name).0
}

/// Pick the first name that is not taken.
///
/// Tries `name`, then `stem_2.ext`, `stem_3.ext` ... up to `stem_100.ext`.
/// Never returns a taken name; fails with `CollisionOverflow` instead.
pub fn collision_free_name<F>(name: &str, area: &str, taken: F) -> Result<String>
where
    F: Fn(&str) -> bool,
{
    if !taken(name) {
        return Ok(name.to_string());
    }

    let (stem, ext) = split_name(name);
    for counter in 2..=MAX_NAME_SUFFIX {
        let candidate = format!("{}_{}{}", stem, counter, ext);
        if !taken(&candidate) {
            return Ok(candidate);
        }
    }

    Err(StewardError::CollisionOverflow {
        name: name.to_string(),
        area: area.to_string(),
    })
}

/// Truncate to at most `max` characters on a char boundary
pub fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}
