use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::{error, warn};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum OtaError {
    #[error("Unsupported protocol version. Expected either 0 or 1.")]
    InvalidProtocolVersion,

    #[error("Unsupported platform. Expected either ios or android.")]
    UnsupportedPlatform,

    #[error("No runtimeVersion provided.")]
    MissingRuntimeVersion,

    #[error("No asset name provided.")]
    MissingAssetName,

    #[error("{0}")]
    InvalidQuery(String),

    #[error("No platform provided. Expected \"ios\" or \"android\".")]
    InvalidAssetPlatform,

    #[error("{0}")]
    UnsupportedProtocol(&'static str),

    #[error("Invalid Expo-Embedded-Update-ID request header specified.")]
    MissingEmbeddedUpdateId,

    #[error("Code signing requested but no key supplied when starting server.")]
    SigningKeyMissing,

    #[error("Unsupported runtime version: {0}")]
    RuntimeVersionNotFound(String),

    #[error("Asset \"{0}\" does not exist.")]
    AssetNotFound(String),

    #[error("Expected GET.")]
    MethodNotAllowed,

    #[error("Invalid update bundle: {0}")]
    InvalidBundle(String),

    #[error("No content type known for extension: {0}")]
    UnknownContentType(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OtaError {
    pub fn invalid_bundle(msg: impl Into<String>) -> Self {
        Self::InvalidBundle(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            OtaError::InvalidProtocolVersion
            | OtaError::UnsupportedPlatform
            | OtaError::MissingRuntimeVersion
            | OtaError::MissingAssetName
            | OtaError::InvalidQuery(_)
            | OtaError::InvalidAssetPlatform
            | OtaError::UnsupportedProtocol(_)
            | OtaError::MissingEmbeddedUpdateId
            | OtaError::SigningKeyMissing => StatusCode::BAD_REQUEST,
            OtaError::RuntimeVersionNotFound(_) | OtaError::AssetNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            OtaError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            OtaError::InvalidBundle(_)
            | OtaError::UnknownContentType(_)
            | OtaError::Config(_)
            | OtaError::Signing(_)
            | OtaError::Serialization(_)
            | OtaError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable tag, used for analytics.
    pub fn kind(&self) -> &'static str {
        match self {
            OtaError::InvalidProtocolVersion => "invalid_protocol_version",
            OtaError::UnsupportedPlatform | OtaError::InvalidAssetPlatform => "invalid_platform",
            OtaError::MissingRuntimeVersion => "missing_runtime_version",
            OtaError::MissingAssetName => "missing_asset_name",
            OtaError::InvalidQuery(_) => "invalid_query",
            OtaError::UnsupportedProtocol(_) => "unsupported_protocol",
            OtaError::MissingEmbeddedUpdateId => "missing_embedded_update_id",
            OtaError::SigningKeyMissing => "signing_key_missing",
            OtaError::RuntimeVersionNotFound(_) => "runtime_version_not_found",
            OtaError::AssetNotFound(_) => "asset_not_found",
            OtaError::MethodNotAllowed => "method_not_allowed",
            OtaError::InvalidBundle(_) => "invalid_bundle",
            OtaError::UnknownContentType(_) => "unknown_content_type",
            OtaError::Config(_) => "config",
            OtaError::Signing(_) => "signing_failed",
            OtaError::Serialization(_) => "serialization_failed",
            OtaError::Io(_) => "io",
        }
    }
}

impl IntoResponse for OtaError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(%status, error = %self, "OTA request failed");
        } else {
            warn!(%status, error = %self, "OTA request rejected");
        }

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

pub type OtaResult<T> = std::result::Result<T, OtaError>;
