use std::fmt::Debug;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::prelude::*;
use serde_json::{json, Value as Json};
use serde_json_path::JsonPath;
use tracing::debug;

use crate::core::{
    credential_format::ClaimFormat,
    error::ProtocolError,
    presentation_exchange::{DescriptorMap, InputDescriptor},
};

/// A vp_token element located by a descriptor path: the wire value and its
/// decoded (or verified) form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub raw: Json,
    pub decoded: Json,
}

/// Caller-supplied cryptographic verification.
///
/// `verify` receives the raw wire value of a presentation or credential and
/// must return the verified, decoded claims, or fail on signature errors.
/// When supplied, its result replaces the structural decode.
#[async_trait]
pub trait PresentationVerifier: Debug {
    async fn verify(&self, raw: &Json) -> Result<Json>;
}

/// Find the descriptor map entry for an input descriptor.
///
/// Entries match by id. With `check_format`, the entry's format (or its
/// `path_nested`'s) must additionally be declared in the input descriptor's
/// format map.
pub fn descriptor_map_for<'a>(
    input_descriptor: &InputDescriptor,
    descriptor_map: &'a [DescriptorMap],
    check_format: bool,
) -> Option<&'a DescriptorMap> {
    descriptor_map.iter().find(|entry| {
        if entry.id != input_descriptor.id {
            return false;
        }
        if !check_format {
            return true;
        }
        input_descriptor.accepts_format(&entry.format)
            || entry
                .path_nested
                .as_ref()
                .is_some_and(|nested| input_descriptor.accepts_format(&nested.format))
    })
}

/// Query `value` with a JSONPath expression and return the first match.
///
/// A vp_token may be a bare value, an array, or a nested object graph; the
/// descriptor path addresses a single token within it.
pub fn extract_from_path(path: &str, value: &Json) -> Result<Option<Json>, ProtocolError> {
    let path = JsonPath::parse(path).map_err(|_| ProtocolError::UnmatchedPath {
        path: path.to_string(),
    })?;
    Ok(path.query(value).first().cloned())
}

/// Structurally decode a single vp_token element according to its declared
/// format. No cryptographic verification happens here.
pub fn decode_vp_token(token: &Json, format: &ClaimFormat) -> Result<Json, ProtocolError> {
    match format {
        ClaimFormat::JwtVpJson => {
            let compact = token
                .as_str()
                .ok_or_else(|| ProtocolError::decode("jwt_vp_json token must be a string"))?;
            decode_jwt_payload(compact).map_err(ProtocolError::decode)
        }
        ClaimFormat::VcSdJwt => {
            let compact = token
                .as_str()
                .ok_or_else(|| ProtocolError::decode("vc+sd-jwt token must be a string"))?;
            decode_sd_jwt(compact).map_err(ProtocolError::decode)
        }
        // Linked-data proofs are already JSON; accepted as-is.
        ClaimFormat::LdpVp => Ok(token.clone()),
        other => Err(ProtocolError::UnsupportedFormat(other.to_string())),
    }
}

/// Extract and decode the presentation addressed by a descriptor map entry.
pub async fn extract_presentation(
    vp_token: &Json,
    descriptor: &DescriptorMap,
    verifier: Option<&(dyn PresentationVerifier + Send + Sync)>,
) -> Result<Extracted, ProtocolError> {
    let raw = extract_from_path(&descriptor.path, vp_token)?.ok_or_else(|| {
        ProtocolError::UnmatchedPath {
            path: descriptor.path.clone(),
        }
    })?;

    let mut decoded = decode_vp_token(&raw, &descriptor.format)?;

    if let Some(verifier) = verifier {
        decoded = verifier
            .verify(&raw)
            .await
            .map_err(ProtocolError::validate)?;
    }

    debug!(descriptor = %descriptor.id, format = %descriptor.format, "extracted presentation");
    Ok(Extracted { raw, decoded })
}

/// Decode a credential presented directly in the vp_token, without a nested
/// path. Only `vc+sd-jwt` is presented this way, and its claims only exist
/// through verification: the verifier callback is mandatory here.
pub async fn extract_credential(
    raw: &Json,
    format: &ClaimFormat,
    verifier: Option<&(dyn PresentationVerifier + Send + Sync)>,
) -> Result<Json, ProtocolError> {
    if *format != ClaimFormat::VcSdJwt {
        return Err(ProtocolError::UnsupportedFormat(format.to_string()));
    }

    let Some(verifier) = verifier else {
        return Err(ProtocolError::validate(
            "a vc+sd-jwt credential requires a cryptographic verifier",
        ));
    };
    verifier.verify(raw).await.map_err(ProtocolError::validate)
}

/// Extract a credential nested inside an already-decoded presentation.
/// Only `jwt_vc_json` is supported as a nested format.
pub async fn extract_nested_credential(
    vp: &Json,
    format: &ClaimFormat,
    path: &str,
    verifier: Option<&(dyn PresentationVerifier + Send + Sync)>,
) -> Result<Extracted, ProtocolError> {
    if *format != ClaimFormat::JwtVcJson {
        return Err(ProtocolError::UnsupportedFormat(format.to_string()));
    }

    let raw = extract_from_path(path, vp)?.ok_or_else(|| ProtocolError::UnmatchedPath {
        path: path.to_string(),
    })?;

    let decoded = match verifier {
        Some(verifier) => verifier
            .verify(&raw)
            .await
            .map_err(ProtocolError::validate)?,
        None => {
            let compact = raw
                .as_str()
                .ok_or_else(|| ProtocolError::validate("jwt_vc_json credential must be a string"))?;
            decode_jwt_payload(compact).map_err(ProtocolError::validate)?
        }
    };

    Ok(Extracted { raw, decoded })
}

/// Decode the payload of a compact JWS without verifying its signature.
pub(crate) fn decode_jwt_payload(compact: &str) -> Result<Json> {
    let mut parts = compact.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(anyhow!("expected a three-part compact JWS"));
    };
    let bytes = BASE64_URL_SAFE_NO_PAD
        .decode(payload)
        .context("JWT payload is not base64url")?;
    serde_json::from_slice(&bytes).context("JWT payload is not JSON")
}

/// Structurally decode an SD-JWT: issuer-signed JWT payload, disclosures,
/// and the key-binding JWT when one is appended.
///
/// Segments are tilde-separated: `<jwt>~<disclosure>*~[<kb-jwt>]`. Each
/// disclosure is a base64url-encoded JSON array `[salt, name, value]`.
pub(crate) fn decode_sd_jwt(compact: &str) -> Result<Json> {
    let mut segments = compact.split('~');
    let issued = segments
        .next()
        .ok_or_else(|| anyhow!("empty sd-jwt"))?;
    let payload = decode_jwt_payload(issued).context("invalid issuer-signed JWT")?;

    let mut disclosures = Vec::new();
    let mut key_binding = None;
    for segment in segments {
        if segment.is_empty() {
            continue;
        }
        if segment.contains('.') {
            // The trailing segment of a presented SD-JWT is the KB-JWT.
            key_binding = Some(decode_jwt_payload(segment).context("invalid key-binding JWT")?);
            continue;
        }
        let bytes = BASE64_URL_SAFE_NO_PAD
            .decode(segment)
            .context("disclosure is not base64url")?;
        let disclosure: Json =
            serde_json::from_slice(&bytes).context("disclosure is not a JSON array")?;
        if !disclosure.is_array() {
            return Err(anyhow!("disclosure is not a JSON array"));
        }
        disclosures.push(disclosure);
    }

    let mut decoded = json!({
        "payload": payload,
        "disclosures": disclosures,
    });
    if let Some(kb) = key_binding {
        decoded["key_binding"] = kb;
    }
    Ok(decoded)
}
