//! Asset lookup for the download endpoint.
//!
//! Only paths declared in the latest bundle's metadata are ever opened.

use tracing::{debug, instrument};

use crate::{
    error::{OtaError, OtaResult},
    mime::content_type_for,
    store::BundleStore,
    types::Platform,
    utils::strip_bundle_prefix,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFile {
    pub content_type: String,
    pub contents: Vec<u8>,
}

#[instrument(skip(store))]
pub async fn load_asset<S: BundleStore>(
    store: &S,
    asset: &str,
    runtime_version: &str,
    platform: Platform,
) -> OtaResult<AssetFile> {
    let bundle = store.latest_bundle(runtime_version).await?;
    let metadata = store.read_metadata(&bundle).await?;
    let platform_metadata = metadata.platform(platform)?;

    let requested = strip_bundle_prefix(asset, &bundle.dir_name);
    let content_type = if requested == platform_metadata.bundle {
        content_type_for(None, true)?
    } else {
        let declared = platform_metadata
            .assets
            .iter()
            .find(|a| a.path == requested)
            .ok_or_else(|| {
                debug!("Asset {} is not declared by bundle {}", requested, bundle.dir_name);
                OtaError::AssetNotFound(asset.to_string())
            })?;
        content_type_for(declared.ext.as_deref(), false)?
    };

    let contents = store
        .read_asset(&bundle, requested)
        .await
        .map_err(|e| match e {
            OtaError::AssetNotFound(_) => OtaError::AssetNotFound(asset.to_string()),
            other => other,
        })?;
    debug!("Serving {} ({} bytes, {})", requested, contents.len(), content_type);

    Ok(AssetFile {
        content_type,
        contents,
    })
}
