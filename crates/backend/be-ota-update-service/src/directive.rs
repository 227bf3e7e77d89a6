//! Rollback and no-update-available directives

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use crate::{
    error::{OtaError, OtaResult},
    store::BundleStore,
    types::{
        Decision, Directive, ManifestRequest, ProtocolVersion, RollBackParameters, UpdateBundle,
        UpdatePayload,
    },
    utils::iso_timestamp,
};

/// Instruct the client to return to the update embedded in its binary.
#[instrument(skip_all, fields(bundle = %bundle.dir_name, protocol_version = %request.protocol_version))]
pub async fn build_roll_back<S: BundleStore>(
    store: &S,
    bundle: &UpdateBundle,
    request: &ManifestRequest,
) -> OtaResult<Decision> {
    if !request.protocol_version.supports_directives() {
        return Err(OtaError::UnsupportedProtocol(
            "Rollbacks not supported on protocol version 0",
        ));
    }

    let embedded_update_id = request
        .embedded_update_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or(OtaError::MissingEmbeddedUpdateId)?;

    if request
        .current_update_id
        .as_deref()
        .is_some_and(|current| current.eq_ignore_ascii_case(embedded_update_id))
    {
        debug!("Client already runs its embedded update");
        return Ok(Decision::NoUpdateNeeded);
    }

    let commit_time = iso_timestamp(store.roll_back_commit_time(bundle).await?);

    Ok(Decision::Serve(UpdatePayload::Directive(
        Directive::RollBackToEmbedded {
            created_at: commit_time.clone(),
            parameters: RollBackParameters { commit_time },
        },
    )))
}

/// Tell the client it already runs the latest update.
pub fn build_no_update_available(
    protocol_version: ProtocolVersion,
    now: DateTime<Utc>,
) -> OtaResult<UpdatePayload> {
    if !protocol_version.supports_directives() {
        return Err(OtaError::UnsupportedProtocol(
            "NoUpdateAvailable directive not available in protocol version 0",
        ));
    }

    Ok(UpdatePayload::Directive(Directive::NoUpdateAvailable {
        created_at: iso_timestamp(now),
    }))
}
