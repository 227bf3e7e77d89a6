//! Content-type resolution for bundle assets

use crate::error::{OtaError, OtaResult};

/// Launch bundles are always served as JavaScript, whatever their extension.
pub const LAUNCH_ASSET_CONTENT_TYPE: &str = "application/javascript";

pub fn content_type_for(ext: Option<&str>, is_launch_asset: bool) -> OtaResult<String> {
    if is_launch_asset {
        return Ok(LAUNCH_ASSET_CONTENT_TYPE.to_string());
    }

    let ext = ext
        .map(|e| e.trim_start_matches('.'))
        .filter(|e| !e.is_empty())
        .ok_or_else(|| OtaError::UnknownContentType("<none>".to_string()))?;

    mime_guess::from_ext(ext)
        .first_raw()
        .map(str::to_string)
        .ok_or_else(|| OtaError::UnknownContentType(ext.to_string()))
}

/// Extension recorded in a manifest, e.g. `.png`, or `.bundle` for launch assets
pub fn file_extension_for(ext: Option<&str>, is_launch_asset: bool) -> String {
    if is_launch_asset {
        return ".bundle".to_string();
    }
    match ext.map(|e| e.trim_start_matches('.')) {
        Some(e) if !e.is_empty() => format!(".{e}"),
        _ => String::new(),
    }
}
