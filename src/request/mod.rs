use base64::prelude::*;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};
use ssi_jwk::{Params, JWK};
use url::Url;

use crate::core::{
    casing::camel_to_snake,
    credential_format::{ClientIdScheme, ResponseMode, ResponseType},
};

use self::signer::RequestSigner;

pub mod signer;

/// `aud` default for signed request objects.
const SELF_ISSUED_V2: &str = "https://self-issued.me/v2";

/// Caller-misconfiguration errors of the request builder. These indicate a
/// contract violation by the relying party, not bad data from the holder.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("unsupported client identifier scheme: {0}")]
    UnsupportedClientIdScheme(String),

    #[error("exactly one of redirect_uri or response_uri must be provided")]
    MissingUri,

    #[error("client identifier scheme '{0}' requires a signing key")]
    MissingSignerKey(String),

    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// The OAuth2/OIDC4VP authorization request payload, in its wire (snake_case)
/// form. Serialized either as query parameters or as the claims of a signed
/// request object.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestObject {
    pub client_id: String,
    pub client_id_scheme: ClientIdScheme,
    pub response_type: ResponseType,
    pub response_mode: ResponseMode,
    pub nonce: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_uri: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_metadata: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_metadata_uri: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presentation_definition: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presentation_definition_uri: Option<Url>,
}

/// Inputs to the request builder. Absent fields are defaulted per the
/// protocol: random `nonce`/`state`, `response_type = vp_token`,
/// `response_mode = fragment`, `client_id_scheme = redirect_uri`.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    pub client_id_scheme: Option<ClientIdScheme>,
    pub response_type: Option<ResponseType>,
    pub response_mode: Option<ResponseMode>,
    pub nonce: Option<String>,
    pub state: Option<String>,
    pub redirect_uri: Option<Url>,
    pub response_uri: Option<Url>,
    pub scope: Option<String>,
    /// Arbitrary JSON; camelCase keys are normalized to the snake_case wire
    /// form.
    pub client_metadata: Option<Json>,
    pub client_metadata_uri: Option<Url>,
    /// Arbitrary JSON; camelCase keys are normalized to the snake_case wire
    /// form.
    pub presentation_definition: Option<Json>,
    pub presentation_definition_uri: Option<Url>,
    /// `iss` for signed request objects. Defaults to the client id.
    pub issuer: Option<String>,
    /// `aud` for signed request objects. Defaults to `https://self-issued.me/v2`.
    pub audience: Option<String>,
    /// JWS header `x5u`; preferred over `x5c` when both are given.
    pub x5u: Option<Url>,
    /// JWS header `x5c`: base64 DER certificates, leaf first.
    pub x5c: Vec<String>,
}

/// Build the authorization request payload, validating the client identifier
/// scheme and the redirect/response URI pair and filling protocol defaults.
pub fn request_object(
    client_id: &str,
    options: &RequestOptions,
) -> Result<RequestObject, RequestError> {
    let client_id_scheme = options.client_id_scheme.clone().unwrap_or_default();
    if let ClientIdScheme::Other(scheme) = client_id_scheme {
        return Err(RequestError::UnsupportedClientIdScheme(scheme));
    }

    // Exactly one of the two delivery URIs.
    if options.redirect_uri.is_some() == options.response_uri.is_some() {
        return Err(RequestError::MissingUri);
    }

    Ok(RequestObject {
        client_id: client_id.to_string(),
        client_id_scheme,
        response_type: options.response_type.clone().unwrap_or_default(),
        response_mode: options.response_mode.clone().unwrap_or_default(),
        nonce: options.nonce.clone().unwrap_or_else(random_token),
        state: options.state.clone().unwrap_or_else(random_token),
        redirect_uri: options.redirect_uri.clone(),
        response_uri: options.response_uri.clone(),
        scope: options.scope.clone(),
        client_metadata: options.client_metadata.as_ref().map(camel_to_snake),
        client_metadata_uri: options.client_metadata_uri.clone(),
        presentation_definition: options.presentation_definition.as_ref().map(camel_to_snake),
        presentation_definition_uri: options.presentation_definition_uri.clone(),
    })
}

/// Build and sign the authorization request as a compact JWS.
pub async fn request_object_jwt(
    client_id: &str,
    signer: &(dyn RequestSigner + Send + Sync),
    options: &RequestOptions,
) -> Result<String, RequestError> {
    let payload = request_object(client_id, options)?;

    let alg = jws_algorithm(signer.jwk())?;
    let mut header = json!({
        "alg": alg,
        "typ": "JWT",
    });
    if let Some((key, value)) = x509_certificate_info(options.x5u.as_ref(), &options.x5c) {
        header[key] = value;
    }

    let mut claims = serde_json::to_value(&payload)
        .map_err(anyhow::Error::from)?
        .as_object()
        .cloned()
        .unwrap_or_default();
    claims.insert(
        "iss".into(),
        json!(options.issuer.clone().unwrap_or_else(|| client_id.to_string())),
    );
    claims.insert(
        "aud".into(),
        json!(options.audience.clone().unwrap_or_else(|| SELF_ISSUED_V2.to_string())),
    );

    make_jwt(&header, &Json::Object(claims), signer)
        .await
        .map_err(RequestError::Other)
}

/// Select the JWS algorithm from the key type and curve of a JWK.
pub fn jws_algorithm(jwk: &JWK) -> Result<&'static str, RequestError> {
    match &jwk.params {
        Params::EC(ec) => match ec.curve.as_deref() {
            Some("P-256") => Ok("ES256"),
            Some(_) => Ok("ES256K"),
            None => Err(RequestError::UnsupportedKeyType(
                "EC key without a curve".into(),
            )),
        },
        Params::OKP(_) => Ok("EdDSA"),
        _ => Err(RequestError::UnsupportedKeyType(
            "expected an EC or OKP key".into(),
        )),
    }
}

/// JWS header entry advertising the signing certificate: `x5u` when given,
/// otherwise `x5c` when non-empty.
pub fn x509_certificate_info(x5u: Option<&Url>, x5c: &[String]) -> Option<(&'static str, Json)> {
    if let Some(x5u) = x5u {
        return Some(("x5u", json!(x5u.to_string())));
    }
    if !x5c.is_empty() {
        return Some(("x5c", json!(x5c)));
    }
    None
}

async fn make_jwt(
    header: &Json,
    claims: &Json,
    signer: &(dyn RequestSigner + Send + Sync),
) -> anyhow::Result<String> {
    let header_b64: String = serde_json::to_vec(header).map(|b| BASE64_URL_SAFE_NO_PAD.encode(b))?;
    let claims_b64 = serde_json::to_vec(claims).map(|b| BASE64_URL_SAFE_NO_PAD.encode(b))?;
    let payload = [header_b64.as_bytes(), b".", claims_b64.as_bytes()].concat();
    let signature = signer.sign(&payload).await;
    let signature_b64 = BASE64_URL_SAFE_NO_PAD.encode(signature);
    Ok(format!("{header_b64}.{claims_b64}.{signature_b64}"))
}

fn random_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}
