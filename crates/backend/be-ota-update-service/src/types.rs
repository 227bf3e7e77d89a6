//! Data types and structures for the OTA update service

use std::{collections::BTreeMap, path::PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::OtaError;

// ============================================================================
// Request types
// ============================================================================

/// Client platforms served by the update endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Android => "android",
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = OtaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ios" => Ok(Platform::Ios),
            "android" => Ok(Platform::Android),
            _ => Err(OtaError::UnsupportedPlatform),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Update protocol version spoken by the client.
///
/// Version 0 has no directives at all: clients always receive the latest
/// manifest. Version 1 adds rollback and no-update-available directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ProtocolVersion {
    #[default]
    V0,
    V1,
}

impl ProtocolVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolVersion::V0 => "0",
            ProtocolVersion::V1 => "1",
        }
    }

    pub fn supports_directives(&self) -> bool {
        *self >= ProtocolVersion::V1
    }
}

impl std::str::FromStr for ProtocolVersion {
    type Err = OtaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().parse::<u32>() {
            Ok(0) => Ok(ProtocolVersion::V0),
            Ok(1) => Ok(ProtocolVersion::V1),
            _ => Err(OtaError::InvalidProtocolVersion),
        }
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Validated manifest request, populated once from headers and query string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRequest {
    pub protocol_version: ProtocolVersion,
    pub platform: Platform,
    pub runtime_version: String,
    pub current_update_id: Option<String>,
    pub embedded_update_id: Option<String>,
    pub expect_signature: bool,
}

/// Query string fallbacks for the manifest endpoint
#[derive(Deserialize, Debug, Default)]
pub struct ManifestQuery {
    pub platform: Option<String>,
    #[serde(rename = "runtime-version")]
    pub runtime_version: Option<String>,
}

/// Query parameters for the asset endpoint
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct AssetQuery {
    pub asset: Option<String>,
    pub runtime_version: Option<String>,
    pub platform: Option<String>,
}

// ============================================================================
// Bundle storage types
// ============================================================================

/// A published update bundle: `<root>/<runtime_version>/<dir_name>/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateBundle {
    pub runtime_version: String,
    /// Publish timestamp the bundle directory is named after
    pub dir_name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateType {
    Normal,
    RollBack,
}

/// Asset entry as listed in a bundle's `metadata.json`
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FileMetadataAsset {
    pub path: String,
    pub ext: Option<String>,
}

/// Per-platform section of a bundle's `metadata.json`
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PlatformFileMetadata {
    /// Path of the launch bundle, relative to the bundle directory
    pub bundle: String,
    #[serde(default)]
    pub assets: Vec<FileMetadataAsset>,
}

/// Parsed `metadata.json`
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MetadataJson {
    /// Keyed by platform name; platforms this server does not serve are kept but ignored
    pub file_metadata: BTreeMap<String, PlatformFileMetadata>,
}

/// Bundle metadata together with the values derived from the file itself
#[derive(Debug, Clone)]
pub struct BundleMetadata {
    /// SHA-256 of the raw `metadata.json` bytes
    pub content_id: [u8; 32],
    pub created_at: DateTime<Utc>,
    pub metadata: MetadataJson,
}

impl BundleMetadata {
    pub fn platform(&self, platform: Platform) -> Result<&PlatformFileMetadata, OtaError> {
        self.metadata.file_metadata.get(platform.as_str()).ok_or_else(|| {
            OtaError::invalid_bundle(format!("no file metadata for platform {platform}"))
        })
    }
}

// ============================================================================
// Wire payloads
// ============================================================================

/// Asset description as sent to clients inside a manifest
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ManifestAsset {
    /// Base64url SHA-256 of the asset contents
    pub hash: String,
    /// Content-addressed key, stable across bundles
    pub key: String,
    pub file_extension: String,
    /// `null` when the declared extension maps to no known type
    pub content_type: Option<String>,
    pub url: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManifestExtra {
    pub expo_client: serde_json::Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub id: String,
    pub created_at: String,
    pub runtime_version: String,
    pub assets: Vec<ManifestAsset>,
    pub launch_asset: ManifestAsset,
    pub metadata: BTreeMap<String, String>,
    pub extra: ManifestExtra,
}

impl Manifest {
    /// All assets including the launch asset, launch asset last
    pub fn all_assets(&self) -> impl Iterator<Item = &ManifestAsset> {
        self.assets.iter().chain(std::iter::once(&self.launch_asset))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RollBackParameters {
    pub commit_time: String,
}

/// Non-manifest instructions to the client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Directive {
    RollBackToEmbedded {
        #[serde(rename = "createdAt")]
        created_at: String,
        parameters: RollBackParameters,
    },
    NoUpdateAvailable {
        #[serde(rename = "createdAt")]
        created_at: String,
    },
}

/// The single payload produced for a manifest request
#[derive(Debug, Clone, PartialEq)]
pub enum UpdatePayload {
    Manifest(Manifest),
    Directive(Directive),
}

impl UpdatePayload {
    /// Name of the multipart part carrying this payload
    pub fn part_name(&self) -> &'static str {
        match self {
            UpdatePayload::Manifest(_) => "manifest",
            UpdatePayload::Directive(_) => "directive",
        }
    }

    /// Outcome label for logs and analytics
    pub fn outcome(&self) -> &'static str {
        match self {
            UpdatePayload::Manifest(_) => "manifest",
            UpdatePayload::Directive(Directive::RollBackToEmbedded { .. }) => "roll_back",
            UpdatePayload::Directive(Directive::NoUpdateAvailable { .. }) => "no_update_available",
        }
    }

    /// Serialize exactly once; the result is both signed and transmitted.
    pub fn to_json(&self) -> Result<String, OtaError> {
        let json = match self {
            UpdatePayload::Manifest(manifest) => serde_json::to_string(manifest)?,
            UpdatePayload::Directive(directive) => serde_json::to_string(directive)?,
        };
        Ok(json)
    }
}

/// Result of a payload builder
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Serve(UpdatePayload),
    /// The client already runs what would be served
    NoUpdateNeeded,
}

/// `extensions` part of a multipart response
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseExtensions {
    pub asset_request_headers: BTreeMap<String, BTreeMap<String, String>>,
}
