//! Eurora OTA Update Service
//!
//! Serves over-the-air updates to mobile clients speaking the Expo Updates
//! protocol (versions 0 and 1). Published bundles are read from a directory
//! tree; each manifest request is answered with a signed or unsigned
//! `multipart/mixed` body carrying either a manifest or a directive.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::debug;

pub mod analytics;
pub mod assets;
pub mod config;
pub mod directive;
pub mod error;
pub mod handlers;
pub mod manifest;
pub mod mime;
pub mod multipart;
pub mod service;
pub mod signing;
pub mod store;
pub mod types;
pub mod utils;

#[cfg(test)]
mod test_support;

use service::AppState;
use store::BundleStore;

/// Create the axum router
pub fn create_router<S: BundleStore>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route(
            "/api/manifest",
            get(handlers::get_manifest_handler::<S>).fallback(handlers::method_not_allowed),
        )
        .route(
            "/api/assets",
            get(handlers::get_asset_handler::<S>).fallback(handlers::method_not_allowed),
        )
        .route("/health", get(handlers::health_check))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Initialize the OTA update service and return the router
pub fn init_ota_service(config: OtaConfig) -> Result<Router> {
    debug!(
        "Initializing OTA update service with root: {}",
        config.updates_root.display()
    );

    let state = Arc::new(
        AppState::from_config(config).context("Failed to create OTA update service state")?,
    );
    if !state.signer.has_key() {
        debug!("No private key configured, signed manifests are unavailable");
    }

    Ok(create_router(state))
}

// Re-export commonly used types
pub use config::OtaConfig;
pub use error::{ErrorResponse, OtaError, OtaResult};
pub use signing::SignatureService;
pub use store::FsBundleStore;
pub use types::{Directive, Manifest, ManifestAsset, Platform, ProtocolVersion, UpdatePayload};
