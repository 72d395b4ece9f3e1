use std::fmt;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value as Json};
use tracing::debug;
use uuid::Uuid;

use crate::core::{
    clock::{system_clock, Clock},
    credential_format::ClientIdScheme,
    error::ProtocolError,
    presentation_exchange::{
        DescriptorMap, InputDescriptor, PresentationDefinition, PresentationSubmission,
        SubmissionRequirement,
    },
    response::AuthResponsePayload,
};
use crate::endpoint::VpRequest;
use crate::extractor::{self, Extracted, PresentationVerifier};
use crate::request::{self, signer::RequestSigner, RequestError, RequestOptions};
use crate::store::Datastore;

use self::session::{RequestSession, SessionLocks};

pub mod session;

const DEFAULT_EXPIRED_IN: u64 = 3600;

fn session_key(id: &str) -> String {
    format!("request-session:{id}")
}

fn definition_key(id: &str) -> String {
    format!("presentation-definition:{id}")
}

/// An authorization request ready for out-of-band delivery to the wallet:
/// either a bag of plain query parameters, or a signed request object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthorizationRequest {
    ByParams {
        client_id: String,
        params: Map<String, Json>,
    },
    Signed {
        client_id: String,
        request: String,
    },
}

impl AuthorizationRequest {
    /// Render the unsigned variant as a URL query string. Non-string values
    /// are JSON-encoded, as the wire protocol expects.
    pub fn as_query(&self) -> Result<String> {
        let AuthorizationRequest::ByParams { params, .. } = self else {
            bail!("only an unsigned authorization request can be rendered as a query")
        };

        let pairs: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    Json::String(s) => Ok(s.clone()),
                    other => serde_json::to_string(other),
                };
                value.map(|v| (k.clone(), v))
            })
            .collect::<Result<_, _>>()?;

        serde_urlencoded::to_string(pairs).context("unable to encode query parameters")
    }
}

/// Options for [Verifier::start_request].
#[derive(Clone, Default)]
pub struct StartRequestOptions {
    /// Seconds until the verifier-side request expires. Defaults to 3600.
    pub expired_in: Option<u64>,
    /// Opaque application session value carried on the request record.
    pub session: Option<String>,
    /// Required for the x509 client identifier schemes.
    pub signer: Option<Arc<dyn RequestSigner + Send + Sync>>,
    /// Authorization request parameters, including the client identifier
    /// scheme that selects signed or unsigned delivery.
    pub request: RequestOptions,
}

/// The relying-party role: builds authorization requests, tracks their
/// one-time-use state, manages presentation definitions, and resolves
/// descriptors and credentials out of received responses.
///
/// The received [AuthResponsePayload] is always passed explicitly through
/// `get_descriptor` → `get_presentation` → `get_credential`; the verifier
/// holds no per-response state and can be shared across concurrent requests.
#[derive(Clone)]
pub struct Verifier {
    store: Arc<dyn Datastore + Send + Sync>,
    generate_nonce: Arc<dyn Fn() -> String + Send + Sync>,
    generate_id: Arc<dyn Fn() -> String + Send + Sync>,
    now: Clock,
    locks: SessionLocks,
}

impl fmt::Debug for Verifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Verifier")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl Verifier {
    /// Build a new verifier.
    pub fn builder() -> VerifierBuilder {
        VerifierBuilder::default()
    }

    /// Begin an authorization request for an initiated transaction.
    ///
    /// Persists the verifier-side request record (nonce, expiry, one-time-use
    /// state) and builds the wallet-facing request: plain query parameters
    /// for the `redirect_uri` scheme, a signed request object for the x509
    /// schemes.
    pub async fn start_request(
        &self,
        request: &VpRequest,
        client_id: &str,
        options: StartRequestOptions,
    ) -> Result<AuthorizationRequest, RequestError> {
        let scheme = options.request.client_id_scheme.clone().unwrap_or_default();

        let nonce = (self.generate_nonce)();
        let session = RequestSession {
            id: request.id.clone(),
            nonce: nonce.clone(),
            session: options.session,
            transaction_id: request.transaction_id.clone(),
            issued_at: (self.now)(),
            expired_in: options.expired_in.unwrap_or(DEFAULT_EXPIRED_IN),
            consumed_at: 0,
        };
        self.save(&session_key(&session.id), &session)
            .await
            .map_err(anyhow::Error::from)?;

        let mut request_options = options.request;
        request_options.nonce = Some(nonce);
        request_options.client_id_scheme = Some(scheme.clone());

        debug!(id = %request.id, scheme = %scheme, "starting authorization request");
        match scheme {
            ClientIdScheme::RedirectUri => {
                let payload = request::request_object(client_id, &request_options)?;
                let params = serde_json::to_value(&payload)
                    .map_err(anyhow::Error::from)?
                    .as_object()
                    .cloned()
                    .unwrap_or_default();
                Ok(AuthorizationRequest::ByParams {
                    client_id: client_id.to_string(),
                    params,
                })
            }
            ClientIdScheme::X509SanDns | ClientIdScheme::X509SanUri => {
                let Some(signer) = &options.signer else {
                    return Err(RequestError::MissingSignerKey(scheme.to_string()));
                };
                let jwt =
                    request::request_object_jwt(client_id, signer.as_ref(), &request_options)
                        .await?;
                Ok(AuthorizationRequest::Signed {
                    client_id: client_id.to_string(),
                    request: jwt,
                })
            }
            ClientIdScheme::Other(scheme) => {
                Err(RequestError::UnsupportedClientIdScheme(scheme))
            }
        }
    }

    /// Read the verifier-side request record, enforcing expiry (checked
    /// first) and one-time-use consumption.
    pub async fn get_request(&self, id: &str) -> Result<RequestSession, ProtocolError> {
        let session: RequestSession = self
            .fetch(&session_key(id))
            .await?
            .ok_or_else(|| ProtocolError::not_found_id("vp-request", id))?;

        if session.is_expired((self.now)()) {
            return Err(ProtocolError::expired("vp-request", id));
        }
        if session.is_consumed() {
            return Err(ProtocolError::consumed("vp-request", id));
        }
        Ok(session)
    }

    /// Mark the request as one-time-used. Inherits the error cases of
    /// [Verifier::get_request]; serialized per request id so concurrent
    /// consumers cannot double-spend.
    pub async fn consume_request(&self, id: &str) -> Result<RequestSession, ProtocolError> {
        let guard = self.locks.acquire(id).await;

        let result = async {
            let mut session = self.get_request(id).await?;
            session.consumed_at = (self.now)();
            self.save(&session_key(id), &session).await?;

            debug!(id, "consumed request");
            Ok(session)
        }
        .await;

        drop(guard);
        self.locks.prune(id).await;
        result
    }

    /// Create and persist a presentation definition with a fresh id.
    pub async fn generate_presentation_definition(
        &self,
        input_descriptors: Vec<InputDescriptor>,
        submission_requirements: Option<Vec<SubmissionRequirement>>,
        name: Option<String>,
        purpose: Option<String>,
    ) -> Result<PresentationDefinition, ProtocolError> {
        let definition = PresentationDefinition {
            id: (self.generate_id)(),
            input_descriptors,
            submission_requirements,
            name,
            purpose,
        };
        self.save(&definition_key(&definition.id), &definition)
            .await?;
        Ok(definition)
    }

    pub async fn get_presentation_definition(
        &self,
        id: &str,
    ) -> Result<Option<PresentationDefinition>, ProtocolError> {
        self.fetch(&definition_key(id)).await
    }

    /// The stored definition in its wire (snake_case JSON) form.
    pub async fn presentation_definition_map(
        &self,
        id: &str,
    ) -> Result<Option<Map<String, Json>>, ProtocolError> {
        let Some(definition) = self.get_presentation_definition(id).await? else {
            return Ok(None);
        };
        let map = serde_json::to_value(definition)
            .context("failed to serialize presentation definition")?
            .as_object()
            .cloned()
            .unwrap_or_default();
        Ok(Some(map))
    }

    /// Resolve the descriptor map entry for an input descriptor out of a
    /// received authorization response.
    pub async fn get_descriptor(
        &self,
        input_descriptor_id: &str,
        auth_response: &AuthResponsePayload,
        check_format: bool,
    ) -> Result<DescriptorMap, ProtocolError> {
        let submission = auth_response
            .presentation_submission
            .as_deref()
            .context("presentation_submission is missing from the response")?;
        let submission: PresentationSubmission =
            serde_json::from_str(submission).context("malformed presentation_submission")?;

        let definition = self
            .get_presentation_definition(&submission.definition_id)
            .await?
            .ok_or_else(|| {
                ProtocolError::not_found_id("presentation-definition", &submission.definition_id)
            })?;

        let input_descriptor = definition.input_descriptor(input_descriptor_id).ok_or_else(|| {
            ProtocolError::invalid_submission(format!(
                "no input descriptor '{input_descriptor_id}' in definition '{}'",
                definition.id
            ))
        })?;

        extractor::descriptor_map_for(input_descriptor, &submission.descriptor_map, check_format)
            .cloned()
            .ok_or(ProtocolError::NoSubmission)
    }

    /// Like [Verifier::get_descriptor], but a missing descriptor map entry is
    /// a successful `None` rather than an error.
    pub async fn get_optional_descriptor(
        &self,
        input_descriptor_id: &str,
        auth_response: &AuthResponsePayload,
        check_format: bool,
    ) -> Result<Option<DescriptorMap>, ProtocolError> {
        match self
            .get_descriptor(input_descriptor_id, auth_response, check_format)
            .await
        {
            Ok(descriptor) => Ok(Some(descriptor)),
            Err(ProtocolError::NoSubmission) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Extract the presentation a descriptor map entry points at inside the
    /// response's vp_token.
    pub async fn get_presentation(
        &self,
        descriptor: &DescriptorMap,
        auth_response: &AuthResponsePayload,
        verifier: Option<&(dyn PresentationVerifier + Send + Sync)>,
    ) -> Result<Extracted, ProtocolError> {
        let vp_token = auth_response
            .vp_token
            .as_ref()
            .ok_or_else(|| ProtocolError::invalid_submission("vp_token is missing"))?;

        extractor::extract_presentation(vp_token, descriptor, verifier)
            .await
            .map_err(as_submission_error)
    }

    /// Extract the credential out of an already-extracted presentation:
    /// through `path_nested` when the descriptor declares one, directly off
    /// the raw token otherwise.
    pub async fn get_credential(
        &self,
        descriptor: &DescriptorMap,
        presentation: &Extracted,
        verifier: Option<&(dyn PresentationVerifier + Send + Sync)>,
    ) -> Result<Extracted, ProtocolError> {
        match &descriptor.path_nested {
            Some(nested) => extractor::extract_nested_credential(
                &presentation.decoded,
                &nested.format,
                &nested.path,
                verifier,
            )
            .await
            .map_err(as_submission_error),
            None => {
                let decoded =
                    extractor::extract_credential(&presentation.raw, &descriptor.format, verifier)
                        .await
                        .map_err(as_submission_error)?;
                Ok(Extracted {
                    raw: presentation.raw.clone(),
                    decoded,
                })
            }
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ProtocolError> {
        let Some(value) = self.store.get(key).await? else {
            return Ok(None);
        };
        let record = serde_json::from_value(value)
            .with_context(|| format!("malformed record under '{key}'"))?;
        Ok(Some(record))
    }

    async fn save<T: Serialize>(&self, key: &str, record: &T) -> Result<(), ProtocolError> {
        let value = serde_json::to_value(record).context("failed to serialize record")?;
        self.store.put(key, value).await?;
        Ok(())
    }
}

/// Extractor failures describe a defective submission from the holder's
/// side; collapse them into a single reportable reason.
fn as_submission_error(err: ProtocolError) -> ProtocolError {
    match err {
        ProtocolError::UnmatchedPath { .. }
        | ProtocolError::UnsupportedFormat(_)
        | ProtocolError::Decode { .. }
        | ProtocolError::Validate { .. } => ProtocolError::invalid_submission(err.to_string()),
        other => other,
    }
}

/// Builder struct for [Verifier].
#[derive(Clone, Default)]
pub struct VerifierBuilder {
    store: Option<Arc<dyn Datastore + Send + Sync>>,
    generate_nonce: Option<Arc<dyn Fn() -> String + Send + Sync>>,
    generate_id: Option<Arc<dyn Fn() -> String + Send + Sync>>,
    now: Option<Clock>,
}

impl VerifierBuilder {
    /// Build the verifier.
    pub fn build(self) -> Result<Verifier> {
        let Some(store) = self.store else {
            bail!("datastore is required, see `with_datastore`")
        };

        Ok(Verifier {
            store,
            generate_nonce: self
                .generate_nonce
                .unwrap_or_else(|| Arc::new(|| Uuid::new_v4().to_string())),
            generate_id: self
                .generate_id
                .unwrap_or_else(|| Arc::new(|| Uuid::new_v4().to_string())),
            now: self.now.unwrap_or_else(system_clock),
            locks: SessionLocks::default(),
        })
    }

    /// Set the [Datastore] backing request and definition records.
    pub fn with_datastore(mut self, store: Arc<dyn Datastore + Send + Sync>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replace the default (random UUID) nonce generator.
    pub fn with_nonce_generator(
        mut self,
        generate_nonce: Arc<dyn Fn() -> String + Send + Sync>,
    ) -> Self {
        self.generate_nonce = Some(generate_nonce);
        self
    }

    /// Replace the default (random UUID) id generator.
    pub fn with_id_generator(
        mut self,
        generate_id: Arc<dyn Fn() -> String + Send + Sync>,
    ) -> Self {
        self.generate_id = Some(generate_id);
        self
    }

    /// Replace the default system clock.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.now = Some(clock);
        self
    }
}
