use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Authorization response fields as posted by the wallet to the response
/// endpoint. Everything is optional on the wire; completeness is validated
/// against the response type the request was issued with.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireAuthResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// A single token string, or an array of token strings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vp_token: Option<Json>,
    /// JSON-encoded [PresentationSubmission](crate::core::presentation_exchange::PresentationSubmission).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presentation_submission: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

/// The validated body of a stored authorization response.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthResponsePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vp_token: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presentation_submission: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl From<WireAuthResponse> for AuthResponsePayload {
    fn from(wire: WireAuthResponse) -> Self {
        Self {
            vp_token: wire.vp_token,
            presentation_submission: wire.presentation_submission,
            id_token: wire.id_token,
        }
    }
}
