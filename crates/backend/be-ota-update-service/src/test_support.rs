//! Bundle trees on disk for tests

use std::path::{Path, PathBuf};

use base64::{
    Engine,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use tempfile::TempDir;

use crate::{config::OtaConfig, signing::SignatureService, store::FsBundleStore};

pub const TEST_PRIVATE_KEY: &str = include_str!("../testdata/private-key.pem");
pub const TEST_PUBLIC_KEY: &str = include_str!("../testdata/public-key.pem");

pub fn test_signer() -> SignatureService {
    SignatureService::new(Some(
        EncodingKey::from_rsa_pem(TEST_PRIVATE_KEY.as_bytes()).unwrap(),
    ))
}

/// Check an `expo-signature` header against the test public key
pub fn verify_signature(payload: &str, header: &str) -> bool {
    let sig = header
        .split(", ")
        .find_map(|member| member.strip_prefix("sig="))
        .map(|value| value.trim_matches('"'))
        .unwrap();
    let raw = STANDARD.decode(sig).unwrap();
    let key = DecodingKey::from_rsa_pem(TEST_PUBLIC_KEY.as_bytes()).unwrap();
    jsonwebtoken::crypto::verify(
        &URL_SAFE_NO_PAD.encode(raw),
        payload.as_bytes(),
        &key,
        Algorithm::RS256,
    )
    .unwrap()
}

pub struct BundleFixture {
    dir: TempDir,
}

impl BundleFixture {
    pub const ICON_BYTES: &'static [u8] = b"\x89PNG\r\n\x1a\nnot-really-a-png";
    pub const IOS_LAUNCH_BYTES: &'static [u8] = b"console.log('ios');";
    pub const ANDROID_LAUNCH_BYTES: &'static [u8] = b"console.log('android');";

    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn store(&self) -> FsBundleStore {
        FsBundleStore::new(self.root())
    }

    pub fn config(&self) -> OtaConfig {
        OtaConfig::new(self.root())
    }

    /// Publish a bundle with one PNG asset and a launch bundle per platform
    pub fn publish(&self, runtime_version: &str, timestamp: &str) -> PathBuf {
        self.publish_with_icon_ext(runtime_version, timestamp, Some("png"))
    }

    /// Publish a bundle whose icon asset declares `ext`, or no extension at all
    pub fn publish_with_icon_ext(
        &self,
        runtime_version: &str,
        timestamp: &str,
        ext: Option<&str>,
    ) -> PathBuf {
        let bundle = self.root().join(runtime_version).join(timestamp);
        std::fs::create_dir_all(bundle.join("assets")).unwrap();
        std::fs::create_dir_all(bundle.join("bundles")).unwrap();

        std::fs::write(bundle.join("assets/icon"), Self::ICON_BYTES).unwrap();
        std::fs::write(bundle.join("bundles/ios-launch.js"), Self::IOS_LAUNCH_BYTES).unwrap();
        std::fs::write(
            bundle.join("bundles/android-launch.js"),
            Self::ANDROID_LAUNCH_BYTES,
        )
        .unwrap();

        let mut icon = serde_json::json!({ "path": "assets/icon" });
        if let Some(ext) = ext {
            icon["ext"] = ext.into();
        }
        let metadata = serde_json::json!({
            "version": 0,
            "bundler": "metro",
            "fileMetadata": {
                "ios": {
                    "bundle": "bundles/ios-launch.js",
                    "assets": [icon]
                },
                "android": {
                    "bundle": "bundles/android-launch.js",
                    "assets": [icon]
                }
            }
        });
        std::fs::write(bundle.join("metadata.json"), metadata.to_string()).unwrap();

        let app_config = serde_json::json!({
            "name": "fixture-app",
            "slug": "fixture-app",
            "runtimeVersion": runtime_version,
        });
        std::fs::write(bundle.join("expoConfig.json"), app_config.to_string()).unwrap();

        bundle
    }

    /// Publish a bundle carrying the rollback marker
    pub fn publish_roll_back(&self, runtime_version: &str, timestamp: &str) -> PathBuf {
        let bundle = self.publish(runtime_version, timestamp);
        std::fs::write(bundle.join("rollback"), b"").unwrap();
        bundle
    }
}
