//! Code signing of update payloads.
//!
//! Payloads are signed with RSA-SHA256 (PKCS#1 v1.5) and the signature is sent
//! in the `expo-signature` part header as a structured field dictionary
//! (RFC 8941): `sig="<base64>", keyid="main"`.

use std::path::Path;

use base64::{
    Engine,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use jsonwebtoken::{Algorithm, EncodingKey};
use tracing::{debug, info};

use crate::error::{OtaError, OtaResult};

pub const SIGNATURE_KEY_ID: &str = "main";

#[derive(Clone, Default)]
pub struct SignatureService {
    key: Option<EncodingKey>,
}

impl SignatureService {
    pub fn new(key: Option<EncodingKey>) -> Self {
        Self { key }
    }

    /// Load a PEM-encoded RSA private key.
    pub fn from_pem_file(path: &Path) -> OtaResult<Self> {
        let pem = std::fs::read(path).map_err(|e| {
            OtaError::Config(format!(
                "failed to read private key {}: {e}",
                path.display()
            ))
        })?;
        let key = EncodingKey::from_rsa_pem(&pem).map_err(|e| {
            OtaError::Config(format!(
                "{} is not a valid RSA PEM key: {e}",
                path.display()
            ))
        })?;
        info!("Loaded code signing key from {}", path.display());
        Ok(Self::new(Some(key)))
    }

    pub fn has_key(&self) -> bool {
        self.key.is_some()
    }

    /// Sign the exact bytes that will be transmitted and return the
    /// `expo-signature` header value.
    pub fn sign(&self, payload: &str) -> OtaResult<String> {
        let key = self.key.as_ref().ok_or(OtaError::SigningKeyMissing)?;

        let signature = jsonwebtoken::crypto::sign(payload.as_bytes(), key, Algorithm::RS256)
            .map_err(|e| OtaError::Signing(e.to_string()))?;
        // The RS256 primitive yields base64url; the header carries standard base64.
        let raw = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|e| OtaError::Signing(e.to_string()))?;
        let signature = STANDARD.encode(raw);
        debug!("Signed payload of {} bytes", payload.len());

        serialize_dictionary(&[("sig", &signature), ("keyid", SIGNATURE_KEY_ID)])
    }

    /// Sign on the blocking pool, handing the payload back with its header value.
    pub async fn sign_in_background(&self, payload: String) -> OtaResult<(String, String)> {
        if !self.has_key() {
            return Err(OtaError::SigningKeyMissing);
        }
        let signer = self.clone();
        tokio::task::spawn_blocking(move || {
            let signature = signer.sign(&payload)?;
            Ok((payload, signature))
        })
        .await
        .map_err(|e| OtaError::Signing(format!("signing task failed: {e}")))?
    }
}

/// Serialize a structured field dictionary whose members are all sf-strings.
pub fn serialize_dictionary(members: &[(&str, &str)]) -> OtaResult<String> {
    let mut out = String::new();
    for (i, (key, value)) in members.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        serialize_key(key, &mut out)?;
        out.push('=');
        serialize_string(value, &mut out)?;
    }
    Ok(out)
}

fn serialize_key(key: &str, out: &mut String) -> OtaResult<()> {
    let mut chars = key.chars();
    let valid_first = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '*');
    let valid_rest = chars.all(|c| {
        c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-' | '.' | '*')
    });
    if !valid_first || !valid_rest {
        return Err(OtaError::Signing(format!(
            "invalid structured field key: {key:?}"
        )));
    }
    out.push_str(key);
    Ok(())
}

fn serialize_string(value: &str, out: &mut String) -> OtaResult<()> {
    out.push('"');
    for c in value.chars() {
        if !(' '..='~').contains(&c) {
            return Err(OtaError::Signing(format!(
                "invalid character in structured field string: {c:?}"
            )));
        }
        if c == '\\' || c == '"' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    Ok(())
}
