use anyhow::Result;
use async_trait::async_trait;
use p256::ecdsa::{signature::Signer, Signature, SigningKey};
use ssi_jwk::JWK;

/// Signs request objects when the client identifier scheme requires a
/// certificate-bound JWS.
///
/// The JWS algorithm is not chosen by the signer; it is derived from the
/// public JWK by [jws_algorithm](crate::request::jws_algorithm).
#[async_trait]
pub trait RequestSigner {
    /// The public JWK of the signing key.
    fn jwk(&self) -> &JWK;

    async fn sign(&self, payload: &[u8]) -> Vec<u8>;
}

/// A [RequestSigner] over a P-256 key, signing with ES256.
#[derive(Debug)]
pub struct P256Signer {
    key: SigningKey,
    jwk: JWK,
}

impl P256Signer {
    pub fn new(key: SigningKey) -> Result<Self> {
        let pk: p256::PublicKey = key.verifying_key().into();
        let jwk = serde_json::from_str(&pk.to_jwk_string())?;
        Ok(Self { key, jwk })
    }
}

#[async_trait]
impl RequestSigner for P256Signer {
    fn jwk(&self) -> &JWK {
        &self.jwk
    }

    async fn sign(&self, payload: &[u8]) -> Vec<u8> {
        let sig: Signature = self.key.sign(payload);
        sig.to_vec()
    }
}
