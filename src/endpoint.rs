use std::fmt;
use std::sync::Arc;

use anyhow::Context;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::core::{
    clock::{system_clock, Clock},
    credential_format::ResponseType,
    error::ProtocolError,
    response::{AuthResponsePayload, WireAuthResponse},
};
use crate::store::Datastore;

const DEFAULT_EXPIRED_IN: u64 = 3600;

fn request_key(id: &str) -> String {
    format!("vp-request:{id}")
}

fn response_key(id: &str) -> String {
    format!("auth-response:{id}")
}

/// The holder-facing transaction record created when a presentation exchange
/// is initiated. Immutable once stored; never deleted, its lifetime is
/// bounded only by the expiry check at read time.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VpRequest {
    pub id: String,
    pub response_type: ResponseType,
    /// Returned to the wallet in the `redirect_uri` member of the response
    /// endpoint's answer, when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri_returned_by_response_uri: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    pub issued_at: u64,
    pub expired_in: u64,
}

/// A stored authorization response, addressable by its one-time response
/// code. There is deliberately no consumed flag: exchanging the same code
/// repeatedly is idempotent until the record expires.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthResponse {
    /// The opaque response code.
    pub id: String,
    pub request_id: String,
    pub payload: AuthResponsePayload,
    pub issued_at: u64,
    pub expired_in: u64,
}

/// What the response endpoint hands back to the wallet: where to send the
/// user next, and the response code to deliver there.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthResponseReceipt {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<Url>,
    pub response_code: String,
}

#[derive(Clone, Debug, Default)]
pub struct InitiateTransactionOptions {
    pub response_type: ResponseType,
    pub redirect_uri_returned_by_response_uri: Option<Url>,
    /// Bind the transaction to an out-of-band transaction id that must be
    /// presented again at code exchange.
    pub use_transaction_id: bool,
    /// Seconds until the request expires. Defaults to 3600.
    pub expired_in: Option<u64>,
}

/// Receives the holder's authorization response, issues an opaque one-time
/// response code, and later exchanges that code for the stored response.
#[derive(Clone)]
pub struct ResponseEndpoint {
    store: Arc<dyn Datastore + Send + Sync>,
    generate_id: Arc<dyn Fn() -> String + Send + Sync>,
    now: Clock,
}

impl fmt::Debug for ResponseEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseEndpoint")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl ResponseEndpoint {
    pub fn new(store: Arc<dyn Datastore + Send + Sync>) -> Self {
        Self {
            store,
            generate_id: Arc::new(|| Uuid::new_v4().to_string()),
            now: system_clock(),
        }
    }

    /// Replace the default (random UUID) id generator.
    pub fn with_id_generator(mut self, generate_id: Arc<dyn Fn() -> String + Send + Sync>) -> Self {
        self.generate_id = generate_id;
        self
    }

    /// Replace the default system clock.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.now = clock;
        self
    }

    /// Create and persist a new presentation transaction.
    ///
    /// The response type is not validated here; field completeness is
    /// enforced against it when the response arrives.
    pub async fn initiate_transaction(
        &self,
        options: InitiateTransactionOptions,
    ) -> Result<VpRequest, ProtocolError> {
        let request = VpRequest {
            id: (self.generate_id)(),
            response_type: options.response_type,
            redirect_uri_returned_by_response_uri: options.redirect_uri_returned_by_response_uri,
            transaction_id: options.use_transaction_id.then(|| (self.generate_id)()),
            issued_at: (self.now)(),
            expired_in: options.expired_in.unwrap_or(DEFAULT_EXPIRED_IN),
        };

        self.save(&request_key(&request.id), &request).await?;
        debug!(id = %request.id, response_type = %request.response_type, "initiated transaction");
        Ok(request)
    }

    /// Pass-through read of a transaction record.
    pub async fn get_request(&self, id: &str) -> Result<Option<VpRequest>, ProtocolError> {
        self.fetch(&request_key(id)).await
    }

    /// Accept an authorization response posted by the wallet and issue a
    /// response code for it.
    pub async fn receive_auth_response(
        &self,
        wire: WireAuthResponse,
    ) -> Result<AuthResponseReceipt, ProtocolError> {
        let Some(state) = wire.state.clone() else {
            return Err(ProtocolError::InvalidAuthResponsePayload);
        };

        let request = self
            .get_request(&state)
            .await?
            .ok_or_else(|| ProtocolError::not_found_id("vp-request", &state))?;

        let payload = AuthResponsePayload::from(wire);
        validate_payload(&request.response_type, &payload)?;

        let response = AuthResponse {
            id: (self.generate_id)(),
            request_id: request.id.clone(),
            payload,
            issued_at: (self.now)(),
            expired_in: request.expired_in,
        };
        self.save(&response_key(&response.id), &response).await?;

        debug!(request = %request.id, "stored authorization response");
        Ok(AuthResponseReceipt {
            redirect_uri: request.redirect_uri_returned_by_response_uri,
            response_code: response.id,
        })
    }

    /// Exchange a response code for the stored authorization response,
    /// enforcing expiry and transaction binding.
    pub async fn exchange_response_code(
        &self,
        response_code: &str,
        transaction_id: Option<&str>,
    ) -> Result<AuthResponse, ProtocolError> {
        let mut response: AuthResponse = self
            .fetch(&response_key(response_code))
            .await?
            .ok_or_else(|| ProtocolError::not_found_id("response-code", response_code))?;

        if (self.now)() >= response.issued_at.saturating_add(response.expired_in) {
            return Err(ProtocolError::expired("VpResponse", response_code));
        }

        let request: VpRequest = self
            .fetch(&request_key(&response.request_id))
            .await?
            .ok_or_else(|| ProtocolError::not_found_id("vp-request", &response.request_id))?;

        if let Some(bound) = &request.transaction_id {
            if transaction_id != Some(bound.as_str()) {
                return Err(ProtocolError::not_found("transaction-id"));
            }
        }

        validate_payload(&request.response_type, &response.payload)?;

        // A vp_token that arrived as a JSON-encoded string is parsed into
        // structured form; parse failure keeps the raw string.
        if let Some(Json::String(s)) = &response.payload.vp_token {
            if let Ok(parsed) = serde_json::from_str::<Json>(s) {
                response.payload.vp_token = Some(parsed);
            }
        }

        Ok(response)
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

/// Field-presence validation keyed by the response type the request was
/// issued with.
fn validate_payload(
    response_type: &ResponseType,
    payload: &AuthResponsePayload,
) -> Result<(), ProtocolError> {
    let complete = match response_type {
        ResponseType::VpToken => {
            payload.vp_token.is_some() && payload.presentation_submission.is_some()
        }
        ResponseType::VpTokenIdToken => {
            payload.vp_token.is_some()
                && payload.presentation_submission.is_some()
                && payload.id_token.is_some()
        }
        ResponseType::IdToken => payload.id_token.is_some(),
        // An unknown stored response type can never be satisfied.
        ResponseType::Unsupported(_) => false,
    };

    if complete {
        Ok(())
    } else {
        Err(ProtocolError::InvalidAuthResponsePayload)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn sequential_ids(prefix: &'static str) -> Arc<dyn Fn() -> String + Send + Sync> {
        let counter = Arc::new(AtomicU64::new(0));
        Arc::new(move || format!("{prefix}-{}", counter.fetch_add(1, Ordering::Relaxed)))
    }

    fn fixed_clock(at: Arc<AtomicU64>) -> Clock {
        Arc::new(move || at.load(Ordering::Relaxed))
    }

    fn endpoint() -> (ResponseEndpoint, Arc<AtomicU64>) {
        let at = Arc::new(AtomicU64::new(1_000));
        let endpoint = ResponseEndpoint::new(Arc::new(MemoryStore::default()))
            .with_id_generator(sequential_ids("id"))
            .with_clock(fixed_clock(at.clone()));
        (endpoint, at)
    }

    fn vp_token_response(state: &str) -> WireAuthResponse {
        WireAuthResponse {
            state: Some(state.to_string()),
            vp_token: Some(json!("tok")),
            presentation_submission: Some("{}".to_string()),
            id_token: None,
        }
    }

    #[tokio::test]
    async fn initiate_persists_and_defaults_expiry() {
        let (endpoint, _) = endpoint();
        let request = endpoint
            .initiate_transaction(InitiateTransactionOptions {
                use_transaction_id: true,
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(request.expired_in, 3600);
        assert_eq!(request.issued_at, 1_000);
        assert!(request.transaction_id.is_some());
        assert_eq!(endpoint.get_request(&request.id).await.unwrap(), Some(request));
    }

    #[tokio::test]
    async fn idempotent_read() {
        let (endpoint, _) = endpoint();
        let request = endpoint
            .initiate_transaction(Default::default())
            .await
            .unwrap();

        let first = endpoint.get_request(&request.id).await.unwrap();
        let second = endpoint.get_request(&request.id).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn state_is_mandatory() {
        let (endpoint, _) = endpoint();
        let err = endpoint
            .receive_auth_response(WireAuthResponse {
                vp_token: Some(json!("tok")),
                presentation_submission: Some("{}".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidAuthResponsePayload));
    }

    #[tokio::test]
    async fn unknown_state_is_not_found() {
        let (endpoint, _) = endpoint();
        let err = endpoint
            .receive_auth_response(vp_token_response("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::NotFound { subject, .. } if subject == "vp-request"));
    }

    #[tokio::test]
    async fn response_type_field_completeness() {
        let (endpoint, _) = endpoint();
        let request = endpoint
            .initiate_transaction(InitiateTransactionOptions {
                response_type: ResponseType::VpTokenIdToken,
                ..Default::default()
            })
            .await
            .unwrap();

        // Missing id_token.
        let err = endpoint
            .receive_auth_response(vp_token_response(&request.id))
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidAuthResponsePayload));

        // All three present.
        let receipt = endpoint
            .receive_auth_response(WireAuthResponse {
                id_token: Some("c".into()),
                ..vp_token_response(&request.id)
            })
            .await
            .unwrap();
        assert!(!receipt.response_code.is_empty());
    }

    #[tokio::test]
    async fn id_token_only_flow() {
        let (endpoint, _) = endpoint();
        let request = endpoint
            .initiate_transaction(InitiateTransactionOptions {
                response_type: ResponseType::IdToken,
                ..Default::default()
            })
            .await
            .unwrap();

        let receipt = endpoint
            .receive_auth_response(WireAuthResponse {
                state: Some(request.id.clone()),
                id_token: Some("idtok".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let response = endpoint
            .exchange_response_code(&receipt.response_code, None)
            .await
            .unwrap();
        assert_eq!(response.payload.id_token.as_deref(), Some("idtok"));
    }

    #[tokio::test]
    async fn receipt_carries_redirect_uri() {
        let (endpoint, _) = endpoint();
        let redirect: Url = "https://rp.example.com/done".parse().unwrap();
        let request = endpoint
            .initiate_transaction(InitiateTransactionOptions {
                redirect_uri_returned_by_response_uri: Some(redirect.clone()),
                ..Default::default()
            })
            .await
            .unwrap();

        let receipt = endpoint
            .receive_auth_response(vp_token_response(&request.id))
            .await
            .unwrap();
        assert_eq!(receipt.redirect_uri, Some(redirect));
    }

    #[tokio::test]
    async fn unknown_code_is_not_found() {
        let (endpoint, _) = endpoint();
        let err = endpoint
            .exchange_response_code("nope", None)
            .await
            .unwrap_err();
        assert!(
            matches!(err, ProtocolError::NotFound { subject, .. } if subject == "response-code")
        );
    }

    #[tokio::test]
    async fn exchange_enforces_response_expiry() {
        let (endpoint, at) = endpoint();
        let request = endpoint
            .initiate_transaction(InitiateTransactionOptions {
                expired_in: Some(600),
                ..Default::default()
            })
            .await
            .unwrap();
        let receipt = endpoint
            .receive_auth_response(vp_token_response(&request.id))
            .await
            .unwrap();

        at.store(1_599, Ordering::Relaxed);
        assert!(endpoint
            .exchange_response_code(&receipt.response_code, None)
            .await
            .is_ok());

        at.store(1_600, Ordering::Relaxed);
        let err = endpoint
            .exchange_response_code(&receipt.response_code, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Expired { subject, .. } if subject == "VpResponse"));
    }

    #[tokio::test]
    async fn huge_expiry_saturates_instead_of_wrapping() {
        let (endpoint, at) = endpoint();
        let request = endpoint
            .initiate_transaction(InitiateTransactionOptions {
                expired_in: Some(u64::MAX),
                ..Default::default()
            })
            .await
            .unwrap();
        let receipt = endpoint
            .receive_auth_response(vp_token_response(&request.id))
            .await
            .unwrap();

        at.store(u64::MAX - 1, Ordering::Relaxed);
        assert!(endpoint
            .exchange_response_code(&receipt.response_code, None)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn transaction_binding() {
        let (endpoint, _) = endpoint();
        let request = endpoint
            .initiate_transaction(InitiateTransactionOptions {
                use_transaction_id: true,
                ..Default::default()
            })
            .await
            .unwrap();
        let transaction_id = request.transaction_id.clone().unwrap();
        let receipt = endpoint
            .receive_auth_response(vp_token_response(&request.id))
            .await
            .unwrap();

        for wrong in [None, Some("other")] {
            let err = endpoint
                .exchange_response_code(&receipt.response_code, wrong)
                .await
                .unwrap_err();
            assert!(
                matches!(err, ProtocolError::NotFound { subject, .. } if subject == "transaction-id")
            );
        }

        assert!(endpoint
            .exchange_response_code(&receipt.response_code, Some(&transaction_id))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn json_encoded_vp_token_is_parsed() {
        let (endpoint, _) = endpoint();
        let request = endpoint
            .initiate_transaction(Default::default())
            .await
            .unwrap();

        let receipt = endpoint
            .receive_auth_response(WireAuthResponse {
                vp_token: Some(json!("[\"tokenA\",\"tokenB\"]")),
                ..vp_token_response(&request.id)
            })
            .await
            .unwrap();

        let response = endpoint
            .exchange_response_code(&receipt.response_code, None)
            .await
            .unwrap();
        assert_eq!(response.payload.vp_token, Some(json!(["tokenA", "tokenB"])));
    }

    #[tokio::test]
    async fn plain_string_vp_token_is_kept() {
        let (endpoint, _) = endpoint();
        let request = endpoint
            .initiate_transaction(Default::default())
            .await
            .unwrap();
        let receipt = endpoint
            .receive_auth_response(vp_token_response(&request.id))
            .await
            .unwrap();

        let response = endpoint
            .exchange_response_code(&receipt.response_code, None)
            .await
            .unwrap();
        assert_eq!(response.payload.vp_token, Some(json!("tok")));
    }

    #[tokio::test]
    async fn exchange_is_idempotent() {
        let (endpoint, _) = endpoint();
        let request = endpoint
            .initiate_transaction(Default::default())
            .await
            .unwrap();
        let receipt = endpoint
            .receive_auth_response(vp_token_response(&request.id))
            .await
            .unwrap();

        let first = endpoint
            .exchange_response_code(&receipt.response_code, None)
            .await
            .unwrap();
        let second = endpoint
            .exchange_response_code(&receipt.response_code, None)
            .await
            .unwrap();
        assert_eq!(first, second);
    }
}
