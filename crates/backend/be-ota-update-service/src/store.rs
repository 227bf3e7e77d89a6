//! Read-only access to published update bundles.
//!
//! Layout on disk:
//!
//! ```text
//! <root>/<runtime version>/<publish timestamp>/
//!     metadata.json
//!     expoConfig.json
//!     rollback            (optional marker)
//!     bundles/...
//!     assets/...
//! ```

use std::{
    future::Future,
    path::{Component, Path, PathBuf},
};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, instrument};

use crate::{
    error::{OtaError, OtaResult},
    mime::{content_type_for, file_extension_for},
    types::{BundleMetadata, MetadataJson, UpdateBundle},
    utils::{file_created_at, is_safe_path_segment},
};

pub const METADATA_FILE: &str = "metadata.json";
pub const APP_CONFIG_FILE: &str = "expoConfig.json";
pub const ROLL_BACK_MARKER: &str = "rollback";

/// Hash, key and type of one asset file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAsset {
    pub hash: String,
    pub key: String,
    pub file_extension: String,
    pub content_type: Option<String>,
}

/// Source of published bundles.
///
/// Implementations must never modify the bundles they serve.
pub trait BundleStore: Send + Sync + 'static {
    /// The most recently published bundle for a runtime version.
    fn latest_bundle(
        &self,
        runtime_version: &str,
    ) -> impl Future<Output = OtaResult<UpdateBundle>> + Send;

    /// Names of the entries directly inside the bundle directory.
    fn bundle_entries(
        &self,
        bundle: &UpdateBundle,
    ) -> impl Future<Output = OtaResult<Vec<String>>> + Send;

    fn read_metadata(
        &self,
        bundle: &UpdateBundle,
    ) -> impl Future<Output = OtaResult<BundleMetadata>> + Send;

    fn read_app_config(
        &self,
        bundle: &UpdateBundle,
    ) -> impl Future<Output = OtaResult<serde_json::Value>> + Send;

    /// When the rollback marker of a bundle was published.
    fn roll_back_commit_time(
        &self,
        bundle: &UpdateBundle,
    ) -> impl Future<Output = OtaResult<DateTime<Utc>>> + Send;

    fn asset_metadata(
        &self,
        bundle: &UpdateBundle,
        file_path: &str,
        ext: Option<&str>,
        is_launch_asset: bool,
    ) -> impl Future<Output = OtaResult<ResolvedAsset>> + Send;

    /// Raw bytes of an asset. A missing file is `OtaError::AssetNotFound`.
    fn read_asset(
        &self,
        bundle: &UpdateBundle,
        file_path: &str,
    ) -> impl Future<Output = OtaResult<Vec<u8>>> + Send;
}

/// Bundle store backed by a local directory tree
#[derive(Debug, Clone)]
pub struct FsBundleStore {
    root: PathBuf,
}

impl FsBundleStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join a bundle-relative path, refusing anything that could leave the bundle.
    fn resolve(bundle: &UpdateBundle, file_path: &str) -> OtaResult<PathBuf> {
        let relative = Path::new(file_path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if file_path.is_empty() || escapes {
            return Err(OtaError::invalid_bundle(format!(
                "asset path escapes bundle: {file_path}"
            )));
        }
        Ok(bundle.path.join(relative))
    }
}

impl BundleStore for FsBundleStore {
    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn latest_bundle(&self, runtime_version: &str) -> OtaResult<UpdateBundle> {
        if !is_safe_path_segment(runtime_version) {
            return Err(OtaError::RuntimeVersionNotFound(runtime_version.to_string()));
        }

        let runtime_dir = self.root.join(runtime_version);
        let mut entries = match fs::read_dir(&runtime_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No directory for runtime version {}", runtime_version);
                return Err(OtaError::RuntimeVersionNotFound(runtime_version.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut latest: Option<(i64, String)> = None;
        while let Some(entry) = entries.next_entry().await? {
            if !fs::metadata(entry.path()).await?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            let Ok(timestamp) = name.parse::<i64>() else {
                debug!("Ignoring non-timestamp bundle directory: {}", name);
                continue;
            };
            if latest.as_ref().is_none_or(|(best, _)| timestamp > *best) {
                latest = Some((timestamp, name));
            }
        }

        let (_, dir_name) =
            latest.ok_or_else(|| OtaError::RuntimeVersionNotFound(runtime_version.to_string()))?;
        debug!("Latest bundle for {}: {}", runtime_version, dir_name);

        Ok(UpdateBundle {
            runtime_version: runtime_version.to_string(),
            path: runtime_dir.join(&dir_name),
            dir_name,
        })
    }

    async fn bundle_entries(&self, bundle: &UpdateBundle) -> OtaResult<Vec<String>> {
        let mut entries = fs::read_dir(&bundle.path).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    #[instrument(skip(self, bundle), fields(bundle = %bundle.path.display()))]
    async fn read_metadata(&self, bundle: &UpdateBundle) -> OtaResult<BundleMetadata> {
        let path = bundle.path.join(METADATA_FILE);
        let raw = fs::read(&path).await?;
        let created_at = file_created_at(&fs::metadata(&path).await?)?;

        let metadata: MetadataJson = serde_json::from_slice(&raw)
            .map_err(|e| OtaError::invalid_bundle(format!("malformed {METADATA_FILE}: {e}")))?;

        Ok(BundleMetadata {
            content_id: Sha256::digest(&raw).into(),
            created_at,
            metadata,
        })
    }

    async fn read_app_config(&self, bundle: &UpdateBundle) -> OtaResult<serde_json::Value> {
        let raw = fs::read(bundle.path.join(APP_CONFIG_FILE)).await?;
        serde_json::from_slice(&raw)
            .map_err(|e| OtaError::invalid_bundle(format!("malformed {APP_CONFIG_FILE}: {e}")))
    }

    async fn roll_back_commit_time(&self, bundle: &UpdateBundle) -> OtaResult<DateTime<Utc>> {
        let metadata = fs::metadata(bundle.path.join(ROLL_BACK_MARKER)).await?;
        Ok(file_created_at(&metadata)?)
    }

    async fn asset_metadata(
        &self,
        bundle: &UpdateBundle,
        file_path: &str,
        ext: Option<&str>,
        is_launch_asset: bool,
    ) -> OtaResult<ResolvedAsset> {
        let contents = match fs::read(Self::resolve(bundle, file_path)?).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(OtaError::invalid_bundle(format!(
                    "declared asset is missing: {file_path}"
                )));
            }
            Err(e) => return Err(e.into()),
        };
        let digest = Sha256::digest(&contents);
        let content_type = match content_type_for(ext, is_launch_asset) {
            Ok(content_type) => Some(content_type),
            Err(e) => {
                debug!("{file_path}: {e}");
                None
            }
        };

        Ok(ResolvedAsset {
            hash: URL_SAFE_NO_PAD.encode(digest),
            key: hex::encode(&digest[..16]),
            file_extension: file_extension_for(ext, is_launch_asset),
            content_type,
        })
    }

    async fn read_asset(&self, bundle: &UpdateBundle, file_path: &str) -> OtaResult<Vec<u8>> {
        match fs::read(Self::resolve(bundle, file_path)?).await {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(OtaError::AssetNotFound(file_path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
