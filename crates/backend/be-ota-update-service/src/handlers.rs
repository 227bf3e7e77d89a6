use std::sync::Arc;

use axum::{
    extract::{Query, State, rejection::QueryRejection},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::{Span, debug, field, instrument};

use crate::{
    analytics,
    assets::{AssetFile, load_asset},
    error::{OtaError, OtaResult},
    service::AppState,
    store::BundleStore,
    types::{AssetQuery, ManifestQuery, ManifestRequest, Platform, ProtocolVersion},
};

const PROTOCOL_VERSION_HEADER: &str = "expo-protocol-version";
const PLATFORM_HEADER: &str = "expo-platform";
const RUNTIME_VERSION_HEADER: &str = "expo-runtime-version";
const CURRENT_UPDATE_ID_HEADER: &str = "expo-current-update-id";
const EMBEDDED_UPDATE_ID_HEADER: &str = "expo-embedded-update-id";
const EXPECT_SIGNATURE_HEADER: &str = "expo-expect-signature";

/// Header value as a string, treating empty values as absent
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_protocol_version(headers: &HeaderMap) -> OtaResult<ProtocolVersion> {
    let mut values = headers.get_all(PROTOCOL_VERSION_HEADER).iter();
    let Some(value) = values.next() else {
        return Ok(ProtocolVersion::default());
    };
    if values.next().is_some() {
        return Err(OtaError::InvalidProtocolVersion);
    }
    value
        .to_str()
        .map_err(|_| OtaError::InvalidProtocolVersion)?
        .parse()
}

/// Validate manifest request headers, falling back to the query string for
/// platform and runtime version.
pub fn parse_manifest_request(
    headers: &HeaderMap,
    query: &ManifestQuery,
) -> OtaResult<ManifestRequest> {
    let protocol_version = parse_protocol_version(headers)?;

    let platform = header_str(headers, PLATFORM_HEADER)
        .or(non_empty(query.platform.as_deref()))
        .ok_or(OtaError::UnsupportedPlatform)?
        .parse::<Platform>()?;

    let runtime_version = header_str(headers, RUNTIME_VERSION_HEADER)
        .or(non_empty(query.runtime_version.as_deref()))
        .ok_or(OtaError::MissingRuntimeVersion)?
        .to_string();

    Ok(ManifestRequest {
        protocol_version,
        platform,
        runtime_version,
        current_update_id: header_str(headers, CURRENT_UPDATE_ID_HEADER).map(str::to_string),
        embedded_update_id: header_str(headers, EMBEDDED_UPDATE_ID_HEADER).map(str::to_string),
        expect_signature: header_str(headers, EXPECT_SIGNATURE_HEADER).is_some(),
    })
}

async fn serve_manifest<S: BundleStore>(
    state: &AppState<S>,
    headers: &HeaderMap,
    query: &ManifestQuery,
) -> OtaResult<(ManifestRequest, &'static str, Response)> {
    let request = parse_manifest_request(headers, query)?;
    let payload = state.resolve_update(&request).await?;
    let outcome = payload.outcome();
    let response = state.build_response(&request, &payload).await?;
    debug!("Responding with {}", outcome);
    Ok((request, outcome, response))
}

#[instrument(skip_all, fields(
    platform = ?headers.get(PLATFORM_HEADER),
    runtime_version = ?headers.get(RUNTIME_VERSION_HEADER)
))]
pub async fn get_manifest_handler<S: BundleStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    query: Result<Query<ManifestQuery>, QueryRejection>,
) -> Result<Response, OtaError> {
    // A malformed query string only drops the fallback values.
    let query = query.map(|Query(query)| query).unwrap_or_else(|rejection| {
        debug!("Ignoring manifest query string: {}", rejection.body_text());
        ManifestQuery::default()
    });
    let result = serve_manifest(&state, &headers, &query).await;

    if state.config.analytics_enabled {
        match &result {
            Ok((request, outcome, _)) => analytics::track_manifest_request(
                request.platform,
                &request.runtime_version,
                request.protocol_version,
                outcome,
                request.expect_signature,
            ),
            Err(e) => analytics::track_manifest_request_failed(
                header_str(&headers, PLATFORM_HEADER).or(query.platform.as_deref()),
                header_str(&headers, RUNTIME_VERSION_HEADER)
                    .or(query.runtime_version.as_deref()),
                e.kind(),
            ),
        }
    }

    result.map(|(_, _, response)| response)
}

async fn serve_asset<S: BundleStore>(
    state: &AppState<S>,
    query: &AssetQuery,
) -> OtaResult<(Platform, AssetFile)> {
    let asset = non_empty(query.asset.as_deref()).ok_or(OtaError::MissingAssetName)?;
    let platform = non_empty(query.platform.as_deref())
        .and_then(|p| p.parse::<Platform>().ok())
        .ok_or(OtaError::InvalidAssetPlatform)?;
    let runtime_version =
        non_empty(query.runtime_version.as_deref()).ok_or(OtaError::MissingRuntimeVersion)?;

    let file = load_asset(&state.store, asset, runtime_version, platform).await?;
    Ok((platform, file))
}

#[instrument(skip_all, fields(
    asset = field::Empty,
    runtime_version = field::Empty,
    platform = field::Empty
))]
pub async fn get_asset_handler<S: BundleStore>(
    State(state): State<Arc<AppState<S>>>,
    query: Result<Query<AssetQuery>, QueryRejection>,
) -> Result<Response, OtaError> {
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            let err = OtaError::InvalidQuery(rejection.body_text());
            if state.config.analytics_enabled {
                analytics::track_asset_request_failed(None, err.kind());
            }
            return Err(err);
        }
    };
    let span = Span::current();
    span.record("asset", field::debug(&query.asset));
    span.record("runtime_version", field::debug(&query.runtime_version));
    span.record("platform", field::debug(&query.platform));

    let result = serve_asset(&state, &query).await;

    if state.config.analytics_enabled {
        match &result {
            Ok((platform, file)) => analytics::track_asset_request(
                *platform,
                query.runtime_version.as_deref().unwrap_or_default(),
                &file.content_type,
            ),
            Err(e) => {
                analytics::track_asset_request_failed(query.runtime_version.as_deref(), e.kind())
            }
        }
    }

    let (_, file) = result?;
    let content_length = file.contents.len().to_string();
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, file.content_type),
            (header::CONTENT_LENGTH, content_length),
        ],
        file.contents,
    )
        .into_response())
}

pub async fn method_not_allowed() -> OtaError {
    OtaError::MethodNotAllowed
}

pub async fn health_check() -> StatusCode {
    StatusCode::OK
}
