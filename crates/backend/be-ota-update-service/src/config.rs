//! Service configuration loaded from the environment.
//!
//! ## Environment Variables
//!
//! - `UPDATES_ROOT`: Root directory of published bundles (default: "updates")
//! - `OTA_PUBLIC_URL`: Base URL clients use to reach this server, used for
//!   asset URLs in manifests (default: "http://localhost:3000")
//! - `PRIVATE_KEY_PATH`: PEM-encoded RSA private key for code signing (optional)
//! - `ASSET_REQUEST_HEADERS`: Comma separated `name=value` pairs clients should
//!   send when downloading assets (optional)

use std::{collections::BTreeMap, path::PathBuf};

use axum::http::{HeaderName, HeaderValue};
use url::Url;

use crate::error::OtaError;

const DEFAULT_UPDATES_ROOT: &str = "updates";
const DEFAULT_PUBLIC_URL: &str = "http://localhost:3000";

#[derive(Debug, Clone)]
pub struct OtaConfig {
    pub updates_root: PathBuf,
    pub public_url: Url,
    pub private_key_path: Option<PathBuf>,
    pub asset_request_headers: BTreeMap<String, String>,
    pub analytics_enabled: bool,
}

impl OtaConfig {
    /// Configuration with defaults for everything but the bundle root
    pub fn new(updates_root: impl Into<PathBuf>) -> Self {
        Self {
            updates_root: updates_root.into(),
            public_url: Url::parse(DEFAULT_PUBLIC_URL).expect("default public URL is valid"),
            private_key_path: None,
            asset_request_headers: BTreeMap::new(),
            analytics_enabled: false,
        }
    }

    pub fn from_env() -> Result<Self, OtaError> {
        let updates_root = std::env::var("UPDATES_ROOT")
            .unwrap_or_else(|_| DEFAULT_UPDATES_ROOT.to_string())
            .into();

        let public_url =
            std::env::var("OTA_PUBLIC_URL").unwrap_or_else(|_| DEFAULT_PUBLIC_URL.to_string());
        let public_url = parse_public_url(&public_url)?;

        let private_key_path = std::env::var("PRIVATE_KEY_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let asset_request_headers =
            parse_asset_request_headers(&std::env::var("ASSET_REQUEST_HEADERS").unwrap_or_default())?;

        Ok(Self {
            updates_root,
            public_url,
            private_key_path,
            asset_request_headers,
            analytics_enabled: false,
        })
    }

    /// Download URL for an asset of the given bundle-relative path
    pub fn asset_url(&self, asset_path: &str, runtime_version: &str, platform: &str) -> String {
        let mut url = self.public_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["api", "assets"]);
        }
        url.query_pairs_mut()
            .clear()
            .append_pair("asset", asset_path)
            .append_pair("runtimeVersion", runtime_version)
            .append_pair("platform", platform);
        url.to_string()
    }
}

fn parse_public_url(raw: &str) -> Result<Url, OtaError> {
    let url = Url::parse(raw)
        .map_err(|e| OtaError::Config(format!("OTA_PUBLIC_URL '{raw}' is not a valid URL: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(OtaError::Config(format!(
            "OTA_PUBLIC_URL '{raw}' cannot be used as a base URL"
        )));
    }
    Ok(url)
}

fn parse_asset_request_headers(raw: &str) -> Result<BTreeMap<String, String>, OtaError> {
    let mut headers = BTreeMap::new();
    for pair in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (name, value) = pair.split_once('=').ok_or_else(|| {
            OtaError::Config(format!(
                "ASSET_REQUEST_HEADERS entry '{pair}' is not of the form name=value"
            ))
        })?;
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim();

        HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            OtaError::Config(format!("'{name}' is not a valid header name: {e}"))
        })?;
        HeaderValue::from_str(value).map_err(|e| {
            OtaError::Config(format!("'{value}' is not a valid header value: {e}"))
        })?;

        headers.insert(name, value.to_string());
    }
    Ok(headers)
}
