use core::fmt;

use serde::{Deserialize, Serialize};

const FORMAT_JWT_VP_JSON: &str = "jwt_vp_json";
const FORMAT_JWT_VC_JSON: &str = "jwt_vc_json";
const FORMAT_VC_SD_JWT: &str = "vc+sd-jwt";
const FORMAT_LDP_VP: &str = "ldp_vp";

const RESPONSE_TYPE_VP_TOKEN: &str = "vp_token";
const RESPONSE_TYPE_VP_TOKEN_ID_TOKEN: &str = "vp_token id_token";
const RESPONSE_TYPE_ID_TOKEN: &str = "id_token";

const SCHEME_REDIRECT_URI: &str = "redirect_uri";
const SCHEME_X509_SAN_DNS: &str = "x509_san_dns";
const SCHEME_X509_SAN_URI: &str = "x509_san_uri";

const RESPONSE_MODE_FRAGMENT: &str = "fragment";
const RESPONSE_MODE_DIRECT_POST: &str = "direct_post";

/// Credential format designation used in descriptor maps and input
/// descriptor format maps.
///
/// Only the formats the extractor can decode get their own variant; anything
/// else is carried verbatim in `Other` and rejected at decode time.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ClaimFormat {
    JwtVpJson,
    JwtVcJson,
    VcSdJwt,
    LdpVp,
    Other(String),
}

impl From<String> for ClaimFormat {
    fn from(s: String) -> Self {
        match s.as_str() {
            FORMAT_JWT_VP_JSON => ClaimFormat::JwtVpJson,
            FORMAT_JWT_VC_JSON => ClaimFormat::JwtVcJson,
            FORMAT_VC_SD_JWT => ClaimFormat::VcSdJwt,
            FORMAT_LDP_VP => ClaimFormat::LdpVp,
            _ => ClaimFormat::Other(s),
        }
    }
}

impl From<&str> for ClaimFormat {
    fn from(s: &str) -> Self {
        s.to_string().into()
    }
}

impl From<ClaimFormat> for String {
    fn from(f: ClaimFormat) -> Self {
        match f {
            ClaimFormat::JwtVpJson => FORMAT_JWT_VP_JSON.into(),
            ClaimFormat::JwtVcJson => FORMAT_JWT_VC_JSON.into(),
            ClaimFormat::VcSdJwt => FORMAT_VC_SD_JWT.into(),
            ClaimFormat::LdpVp => FORMAT_LDP_VP.into(),
            ClaimFormat::Other(s) => s,
        }
    }
}

impl fmt::Display for ClaimFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimFormat::JwtVpJson => FORMAT_JWT_VP_JSON,
            ClaimFormat::JwtVcJson => FORMAT_JWT_VC_JSON,
            ClaimFormat::VcSdJwt => FORMAT_VC_SD_JWT,
            ClaimFormat::LdpVp => FORMAT_LDP_VP,
            ClaimFormat::Other(s) => s,
        }
        .fmt(f)
    }
}

/// `response_type` requested from the wallet, which determines the fields
/// that must be present in the authorization response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResponseType {
    #[default]
    VpToken,
    VpTokenIdToken,
    IdToken,
    Unsupported(String),
}

impl From<String> for ResponseType {
    fn from(s: String) -> Self {
        match s.as_str() {
            RESPONSE_TYPE_VP_TOKEN => ResponseType::VpToken,
            RESPONSE_TYPE_VP_TOKEN_ID_TOKEN => ResponseType::VpTokenIdToken,
            RESPONSE_TYPE_ID_TOKEN => ResponseType::IdToken,
            _ => ResponseType::Unsupported(s),
        }
    }
}

impl From<ResponseType> for String {
    fn from(rt: ResponseType) -> Self {
        match rt {
            ResponseType::VpToken => RESPONSE_TYPE_VP_TOKEN.into(),
            ResponseType::VpTokenIdToken => RESPONSE_TYPE_VP_TOKEN_ID_TOKEN.into(),
            ResponseType::IdToken => RESPONSE_TYPE_ID_TOKEN.into(),
            ResponseType::Unsupported(s) => s,
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseType::VpToken => RESPONSE_TYPE_VP_TOKEN,
            ResponseType::VpTokenIdToken => RESPONSE_TYPE_VP_TOKEN_ID_TOKEN,
            ResponseType::IdToken => RESPONSE_TYPE_ID_TOKEN,
            ResponseType::Unsupported(s) => s,
        }
        .fmt(f)
    }
}

/// Client Identifier Scheme asserted to the wallet. The x509 schemes require
/// the authorization request to be a signed request object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ClientIdScheme {
    #[default]
    RedirectUri,
    X509SanDns,
    X509SanUri,
    Other(String),
}

impl From<String> for ClientIdScheme {
    fn from(s: String) -> Self {
        match s.as_str() {
            SCHEME_REDIRECT_URI => ClientIdScheme::RedirectUri,
            SCHEME_X509_SAN_DNS => ClientIdScheme::X509SanDns,
            SCHEME_X509_SAN_URI => ClientIdScheme::X509SanUri,
            _ => ClientIdScheme::Other(s),
        }
    }
}

impl From<ClientIdScheme> for String {
    fn from(cis: ClientIdScheme) -> Self {
        match cis {
            ClientIdScheme::RedirectUri => SCHEME_REDIRECT_URI.into(),
            ClientIdScheme::X509SanDns => SCHEME_X509_SAN_DNS.into(),
            ClientIdScheme::X509SanUri => SCHEME_X509_SAN_URI.into(),
            ClientIdScheme::Other(s) => s,
        }
    }
}

impl fmt::Display for ClientIdScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientIdScheme::RedirectUri => SCHEME_REDIRECT_URI,
            ClientIdScheme::X509SanDns => SCHEME_X509_SAN_DNS,
            ClientIdScheme::X509SanUri => SCHEME_X509_SAN_URI,
            ClientIdScheme::Other(s) => s,
        }
        .fmt(f)
    }
}

/// `response_mode` of the authorization request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResponseMode {
    #[default]
    Fragment,
    DirectPost,
    Other(String),
}

impl From<String> for ResponseMode {
    fn from(s: String) -> Self {
        match s.as_str() {
            RESPONSE_MODE_FRAGMENT => ResponseMode::Fragment,
            RESPONSE_MODE_DIRECT_POST => ResponseMode::DirectPost,
            _ => ResponseMode::Other(s),
        }
    }
}

impl From<ResponseMode> for String {
    fn from(rm: ResponseMode) -> Self {
        match rm {
            ResponseMode::Fragment => RESPONSE_MODE_FRAGMENT.into(),
            ResponseMode::DirectPost => RESPONSE_MODE_DIRECT_POST.into(),
            ResponseMode::Other(s) => s,
        }
    }
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseMode::Fragment => RESPONSE_MODE_FRAGMENT,
            ResponseMode::DirectPost => RESPONSE_MODE_DIRECT_POST,
            ResponseMode::Other(s) => s,
        }
        .fmt(f)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn claim_format_wire_strings() {
        let format: ClaimFormat = serde_json::from_value(json!("vc+sd-jwt")).unwrap();
        assert_eq!(format, ClaimFormat::VcSdJwt);
        assert_eq!(serde_json::to_value(format).unwrap(), json!("vc+sd-jwt"));

        let unknown: ClaimFormat = serde_json::from_value(json!("ac_vp")).unwrap();
        assert_eq!(unknown, ClaimFormat::Other("ac_vp".into()));
    }

    #[test]
    fn response_type_wire_strings() {
        let rt: ResponseType = "vp_token id_token".to_string().into();
        assert_eq!(rt, ResponseType::VpTokenIdToken);
        assert_eq!(String::from(rt), "vp_token id_token");

        let rt: ResponseType = "code".to_string().into();
        assert_eq!(rt, ResponseType::Unsupported("code".into()));
    }

    #[test]
    fn client_id_scheme_default() {
        assert_eq!(ClientIdScheme::default(), ClientIdScheme::RedirectUri);
        assert_eq!(ClientIdScheme::from("did".to_string()).to_string(), "did");
    }
}
