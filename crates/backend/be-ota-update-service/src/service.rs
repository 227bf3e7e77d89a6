//! Update resolution and response assembly

use std::collections::BTreeMap;

use axum::{
    http::{HeaderName, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::{debug, instrument};

use crate::{
    config::OtaConfig,
    directive::{build_no_update_available, build_roll_back},
    error::OtaResult,
    manifest::build_manifest,
    multipart::MultipartBody,
    signing::SignatureService,
    store::{BundleStore, FsBundleStore, ROLL_BACK_MARKER},
    types::{Decision, ManifestRequest, ResponseExtensions, UpdateBundle, UpdatePayload, UpdateType},
};

const PAYLOAD_CONTENT_TYPE: &str = "application/json; charset=utf-8";
const EXTENSIONS_CONTENT_TYPE: &str = "application/json";

/// Whether a bundle is a regular update or a rollback to the embedded update
pub async fn classify_update<S: BundleStore>(
    store: &S,
    bundle: &UpdateBundle,
) -> OtaResult<UpdateType> {
    let entries = store.bundle_entries(bundle).await?;
    if entries.iter().any(|name| name == ROLL_BACK_MARKER) {
        Ok(UpdateType::RollBack)
    } else {
        Ok(UpdateType::Normal)
    }
}

/// Shared state, immutable after startup
pub struct AppState<S: BundleStore = FsBundleStore> {
    pub config: OtaConfig,
    pub store: S,
    pub signer: SignatureService,
}

impl AppState<FsBundleStore> {
    /// Build state from configuration, loading the signing key if one is configured.
    pub fn from_config(config: OtaConfig) -> OtaResult<Self> {
        let signer = match &config.private_key_path {
            Some(path) => SignatureService::from_pem_file(path)?,
            None => SignatureService::default(),
        };
        let store = FsBundleStore::new(config.updates_root.clone());
        Ok(Self::new(config, store, signer))
    }
}

impl<S: BundleStore> AppState<S> {
    pub fn new(config: OtaConfig, store: S, signer: SignatureService) -> Self {
        Self {
            config,
            store,
            signer,
        }
    }

    /// Decide what to send a client: a manifest, a rollback, or nothing new.
    #[instrument(skip(self, request), fields(
        platform = %request.platform,
        runtime_version = %request.runtime_version,
        protocol_version = %request.protocol_version
    ))]
    pub async fn resolve_update(&self, request: &ManifestRequest) -> OtaResult<UpdatePayload> {
        let bundle = self.store.latest_bundle(&request.runtime_version).await?;
        let update_type = classify_update(&self.store, &bundle).await?;
        debug!(?update_type, "Classified bundle {}", bundle.dir_name);

        let decision = match update_type {
            UpdateType::Normal => {
                build_manifest(&self.store, &self.config, &bundle, request).await?
            }
            UpdateType::RollBack => build_roll_back(&self.store, &bundle, request).await?,
        };

        match decision {
            Decision::Serve(payload) => Ok(payload),
            Decision::NoUpdateNeeded => {
                build_no_update_available(request.protocol_version, Utc::now())
            }
        }
    }

    /// Wrap a payload in the multipart envelope, signing it when asked to.
    pub async fn build_response(
        &self,
        request: &ManifestRequest,
        payload: &UpdatePayload,
    ) -> OtaResult<Response> {
        // The signed string and the transmitted string must be the same bytes.
        let json = payload.to_json()?;
        let (json, signature) = if request.expect_signature {
            let (json, signature) = self.signer.sign_in_background(json).await?;
            (json, Some(signature))
        } else {
            (json, None)
        };
        let extensions = serde_json::to_string(&self.response_extensions(payload))?;

        let mut part_headers = vec![("content-type", PAYLOAD_CONTENT_TYPE)];
        if let Some(signature) = signature.as_deref() {
            part_headers.push(("expo-signature", signature));
        }

        let body = MultipartBody::new()
            .part(payload.part_name(), &part_headers, json.as_bytes())
            .part(
                "extensions",
                &[("content-type", EXTENSIONS_CONTENT_TYPE)],
                extensions.as_bytes(),
            );

        let headers = [
            (
                HeaderName::from_static("expo-protocol-version"),
                request.protocol_version.as_str().to_string(),
            ),
            (
                HeaderName::from_static("expo-sfv-version"),
                "0".to_string(),
            ),
            (header::CACHE_CONTROL, "private, max-age=0".to_string()),
            (header::CONTENT_TYPE, body.content_type()),
        ];

        Ok((StatusCode::OK, headers, body.into_bytes()).into_response())
    }

    fn response_extensions(&self, payload: &UpdatePayload) -> ResponseExtensions {
        let asset_request_headers = match payload {
            UpdatePayload::Manifest(manifest) => manifest
                .all_assets()
                .map(|asset| {
                    (
                        asset.key.clone(),
                        self.config.asset_request_headers.clone(),
                    )
                })
                .collect(),
            UpdatePayload::Directive(_) => BTreeMap::new(),
        };
        ResponseExtensions {
            asset_request_headers,
        }
    }
}
