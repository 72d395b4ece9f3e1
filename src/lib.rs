//! The relying-party (verifier) side of [OID4VP].
//!
//! [OID4VP]: <https://openid.net/specs/openid-4-verifiable-presentations-1_0.html>
//!
//! # Protocol Overview
//!
//! Here is a simplified overview of the flow, referencing the types and
//! methods implementing it.
//!
//! ## Authorization Request
//!
//! 1. *Verifier initiates a transaction*: [`ResponseEndpoint::initiate_transaction`]
//!    creates a [`VpRequest`] with a fresh id and, optionally, a transaction id
//!    the wallet is expected to echo back.
//! 2. *Verifier builds the request*: [`Verifier::start_request`] records the
//!    request's nonce and one-time-use state, then produces an
//!    [`AuthorizationRequest`]: plain query parameters under the
//!    `redirect_uri` client identifier scheme, or a signed request object
//!    (via a [`RequestSigner`]) under the x509 schemes.
//! 3. *Request delivery*: the request is delivered to the wallet, typically
//!    via QR code or deep link.
//!
//! ## Authorization Response
//!
//! 4. *Wallet responds*: the wallet posts its authorization response (vp_token,
//!    presentation submission) to the response endpoint.
//!    [`ResponseEndpoint::receive_auth_response`] validates it against the
//!    request's response type, stores it, and issues a one-time response code.
//! 5. *Verifier redeems the code*: [`ResponseEndpoint::exchange_response_code`]
//!    returns the stored [`AuthResponsePayload`], enforcing expiry and
//!    transaction binding.
//!
//! ## Verification
//!
//! 6. *Descriptor resolution*: [`Verifier::get_descriptor`] matches the
//!    response's presentation submission against the stored
//!    [`PresentationDefinition`].
//! 7. *Extraction*: [`Verifier::get_presentation`] and
//!    [`Verifier::get_credential`] locate tokens by JSONPath and decode them
//!    per their declared format; an injected [`PresentationVerifier`] supplies
//!    cryptographic verification.
//! 8. *Consumption*: [`Verifier::consume_request`] marks the request used;
//!    later reads fail terminally.
//!
//! The authorization response is always passed to the extraction methods
//! explicitly, so a single [`Verifier`] can serve concurrent requests.
//!
//! # Credential Formats
//!
//! The extractor decodes `jwt_vp_json` presentations, `vc+sd-jwt` credentials
//! (with disclosures and key-binding JWT), `ldp_vp` presentations, and
//! `jwt_vc_json` credentials nested inside a presentation. Format identifiers
//! live in the [`core::credential_format`] module.
//!
//! [`ResponseEndpoint::initiate_transaction`]: crate::endpoint::ResponseEndpoint::initiate_transaction
//! [`ResponseEndpoint::receive_auth_response`]: crate::endpoint::ResponseEndpoint::receive_auth_response
//! [`ResponseEndpoint::exchange_response_code`]: crate::endpoint::ResponseEndpoint::exchange_response_code
//! [`VpRequest`]: crate::endpoint::VpRequest
//! [`AuthResponsePayload`]: crate::core::response::AuthResponsePayload
//! [`Verifier`]: crate::verifier::Verifier
//! [`Verifier::start_request`]: crate::verifier::Verifier::start_request
//! [`Verifier::consume_request`]: crate::verifier::Verifier::consume_request
//! [`Verifier::get_descriptor`]: crate::verifier::Verifier::get_descriptor
//! [`Verifier::get_presentation`]: crate::verifier::Verifier::get_presentation
//! [`Verifier::get_credential`]: crate::verifier::Verifier::get_credential
//! [`AuthorizationRequest`]: crate::verifier::AuthorizationRequest
//! [`RequestSigner`]: crate::request::signer::RequestSigner
//! [`PresentationVerifier`]: crate::extractor::PresentationVerifier
//! [`PresentationDefinition`]: crate::core::presentation_exchange::PresentationDefinition

pub mod core;
pub mod endpoint;
pub mod extractor;
pub mod request;
pub mod store;
pub mod verifier;

pub use serde_json_path::JsonPath;
