use posthog_rs::Event;

use crate::types::{Platform, ProtocolVersion};

fn capture_async(event: Event) {
    tokio::spawn(async move {
        if let Err(e) = posthog_rs::capture(event).await {
            tracing::error!("Failed to capture posthog event: {}", e);
        }
    });
}

pub fn track_manifest_request(
    platform: Platform,
    runtime_version: &str,
    protocol_version: ProtocolVersion,
    outcome: &str,
    signed: bool,
) {
    let mut event = Event::new_anon("manifest_request");
    event.insert_prop("platform", platform.as_str()).ok();
    event.insert_prop("runtime_version", runtime_version).ok();
    event
        .insert_prop("protocol_version", protocol_version.as_str())
        .ok();
    event.insert_prop("outcome", outcome).ok();
    event.insert_prop("signed", signed).ok();
    capture_async(event);
}

pub fn track_manifest_request_failed(
    platform: Option<&str>,
    runtime_version: Option<&str>,
    error_kind: &str,
) {
    let mut event = Event::new_anon("manifest_request_failed");
    if let Some(p) = platform {
        event.insert_prop("platform", p).ok();
    }
    if let Some(rv) = runtime_version {
        event.insert_prop("runtime_version", rv).ok();
    }
    event.insert_prop("error_kind", error_kind).ok();
    capture_async(event);
}

pub fn track_asset_request(platform: Platform, runtime_version: &str, content_type: &str) {
    let mut event = Event::new_anon("asset_request");
    event.insert_prop("platform", platform.as_str()).ok();
    event.insert_prop("runtime_version", runtime_version).ok();
    event.insert_prop("content_type", content_type).ok();
    capture_async(event);
}

pub fn track_asset_request_failed(runtime_version: Option<&str>, error_kind: &str) {
    let mut event = Event::new_anon("asset_request_failed");
    if let Some(rv) = runtime_version {
        event.insert_prop("runtime_version", rv).ok();
    }
    event.insert_prop("error_kind", error_kind).ok();
    capture_async(event);
}
