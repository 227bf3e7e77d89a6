//! Manifest assembly for normal updates

use futures::future::try_join_all;
use tracing::{debug, instrument};
use uuid::{Builder, Uuid};

use crate::{
    config::OtaConfig,
    error::OtaResult,
    store::{BundleStore, ResolvedAsset},
    types::{
        Decision, Manifest, ManifestAsset, ManifestExtra, ManifestRequest, ProtocolVersion,
        UpdateBundle, UpdatePayload,
    },
    utils::iso_timestamp,
};

/// Manifest id derived from a bundle's content hash.
///
/// The first 16 hash bytes are laid out as an RFC 4122 UUID with the version
/// and variant bits forced (version 8, custom), so equal hashes always give
/// equal ids.
pub fn manifest_id(content_id: &[u8; 32]) -> Uuid {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&content_id[..16]);
    Builder::from_custom_bytes(bytes).into_uuid()
}

fn to_manifest_asset(resolved: ResolvedAsset, url: String) -> ManifestAsset {
    ManifestAsset {
        hash: resolved.hash,
        key: resolved.key,
        file_extension: resolved.file_extension,
        content_type: resolved.content_type,
        url,
    }
}

async fn resolve_asset<S: BundleStore>(
    store: &S,
    config: &OtaConfig,
    bundle: &UpdateBundle,
    request: &ManifestRequest,
    file_path: &str,
    ext: Option<&str>,
    is_launch_asset: bool,
) -> OtaResult<ManifestAsset> {
    let resolved = store
        .asset_metadata(bundle, file_path, ext, is_launch_asset)
        .await?;
    let url = config.asset_url(
        file_path,
        &request.runtime_version,
        request.platform.as_str(),
    );
    Ok(to_manifest_asset(resolved, url))
}

/// Build the manifest for a normal update, or report that the client is
/// already up to date.
#[instrument(skip_all, fields(
    bundle = %bundle.dir_name,
    platform = %request.platform,
    protocol_version = %request.protocol_version
))]
pub async fn build_manifest<S: BundleStore>(
    store: &S,
    config: &OtaConfig,
    bundle: &UpdateBundle,
    request: &ManifestRequest,
) -> OtaResult<Decision> {
    let metadata = store.read_metadata(bundle).await?;
    let id = manifest_id(&metadata.content_id).to_string();

    // Protocol 0 clients cannot express "nothing changed" and always get the manifest.
    if request.protocol_version == ProtocolVersion::V1
        && request
            .current_update_id
            .as_deref()
            .is_some_and(|current| current.eq_ignore_ascii_case(&id))
    {
        debug!("Client already runs update {}", id);
        return Ok(Decision::NoUpdateNeeded);
    }

    let platform_metadata = metadata.platform(request.platform)?;
    let app_config = store.read_app_config(bundle).await?;

    let assets = try_join_all(platform_metadata.assets.iter().map(|asset| {
        resolve_asset(
            store,
            config,
            bundle,
            request,
            &asset.path,
            asset.ext.as_deref(),
            false,
        )
    }))
    .await?;

    let launch_asset = resolve_asset(
        store,
        config,
        bundle,
        request,
        &platform_metadata.bundle,
        None,
        true,
    )
    .await?;

    debug!("Built manifest {} with {} assets", id, assets.len());

    Ok(Decision::Serve(UpdatePayload::Manifest(Manifest {
        id,
        created_at: iso_timestamp(metadata.created_at),
        runtime_version: request.runtime_version.clone(),
        assets,
        launch_asset,
        metadata: Default::default(),
        extra: ManifestExtra {
            expo_client: app_config,
        },
    })))
}
