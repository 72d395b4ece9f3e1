use core::fmt;

/// Expected runtime failures of the protocol core.
///
/// Every public operation returns these rather than panicking or raising
/// opaque errors; storage and codec failures are converted to
/// [ProtocolError::Unexpected] at the boundary of each operation.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The referenced record does not exist in the datastore.
    #[error("{subject} is not found{}", Identified(.identifier))]
    NotFound {
        subject: &'static str,
        identifier: Option<String>,
    },

    /// The record exists but its lifetime has elapsed.
    #[error("{subject} is expired{}", Identified(.identifier))]
    Expired {
        subject: &'static str,
        identifier: Option<String>,
    },

    /// The request has already been consumed; one-time use is terminal.
    #[error("{subject} is already consumed{}", Identified(.identifier))]
    Consumed {
        subject: &'static str,
        identifier: Option<String>,
    },

    /// The presentation submission does not satisfy the presentation
    /// definition.
    #[error("invalid presentation submission: {reason}")]
    InvalidSubmission { reason: String },

    /// No descriptor map entry matches the input descriptor.
    #[error("no matching entry in the descriptor map")]
    NoSubmission,

    /// The declared credential format is not one the extractor can decode.
    #[error("unsupported credential format: {0}")]
    UnsupportedFormat(String),

    /// The descriptor path matched nothing in the vp_token.
    #[error("no value matched path '{path}' in the vp_token")]
    UnmatchedPath { path: String },

    /// The vp_token element is malformed for its declared format.
    #[error("failed to decode vp_token element: {cause}")]
    Decode { cause: String },

    /// The injected cryptographic verifier rejected the credential.
    #[error("credential verification failed: {cause}")]
    Validate { cause: String },

    /// The authorization response is missing fields required by the
    /// request's response type.
    #[error("invalid authorization response payload")]
    InvalidAuthResponsePayload,

    /// Datastore or serialization failure outside the protocol's control.
    #[error("unexpected error: {cause}")]
    Unexpected {
        #[from]
        cause: anyhow::Error,
    },
}

impl ProtocolError {
    pub fn not_found(subject: &'static str) -> Self {
        Self::NotFound {
            subject,
            identifier: None,
        }
    }

    pub fn not_found_id(subject: &'static str, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            subject,
            identifier: Some(identifier.into()),
        }
    }

    pub fn expired(subject: &'static str, identifier: impl Into<String>) -> Self {
        Self::Expired {
            subject,
            identifier: Some(identifier.into()),
        }
    }

    pub fn consumed(subject: &'static str, identifier: impl Into<String>) -> Self {
        Self::Consumed {
            subject,
            identifier: Some(identifier.into()),
        }
    }

    pub fn invalid_submission(reason: impl Into<String>) -> Self {
        Self::InvalidSubmission {
            reason: reason.into(),
        }
    }

    pub fn decode(cause: impl fmt::Display) -> Self {
        Self::Decode {
            cause: cause.to_string(),
        }
    }

    pub fn validate(cause: impl fmt::Display) -> Self {
        Self::Validate {
            cause: cause.to_string(),
        }
    }
}

struct Identified<'a>(&'a Option<String>);

impl fmt::Display for Identified<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(id) => write!(f, ": {id}"),
            None => Ok(()),
        }
    }
}
