//! Utility functions for parsing and validation

use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, Utc};

/// Render a timestamp the way update clients expect, e.g. `2024-05-01T12:00:00.000Z`
pub fn iso_timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Creation time of a file, falling back to its modification time on
/// filesystems that do not record birth times.
pub fn file_created_at(metadata: &std::fs::Metadata) -> std::io::Result<DateTime<Utc>> {
    let time: SystemTime = metadata.created().or_else(|_| metadata.modified())?;
    Ok(DateTime::<Utc>::from(time))
}

/// Whether `segment` can be used as a single directory name under the updates root
pub fn is_safe_path_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\', '\0'])
}

/// Bundle-relative form of a requested asset path.
///
/// Accepts both `assets/icon` and `<bundle dir>/assets/icon`.
pub fn strip_bundle_prefix<'a>(asset: &'a str, bundle_dir: &str) -> &'a str {
    asset
        .strip_prefix(bundle_dir)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(asset)
}
