use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use super::credential_format::ClaimFormat;

/// The verifier's declared input requirements.
///
/// Immutable once stored; see
/// <https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-definition>.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresentationDefinition {
    pub id: String,
    pub input_descriptors: Vec<InputDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_requirements: Option<Vec<SubmissionRequirement>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
}

impl PresentationDefinition {
    /// Find the input descriptor with the given id, if any.
    pub fn input_descriptor(&self, id: &str) -> Option<&InputDescriptor> {
        self.input_descriptors.iter().find(|d| d.id == id)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputDescriptor {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    /// Claim format configurations the verifier can process for this input,
    /// keyed by format designation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<HashMap<ClaimFormat, Json>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Constraints>,
}

impl InputDescriptor {
    /// Whether `format` is one of the formats declared for this input.
    /// An absent format map accepts any format.
    pub fn accepts_format(&self, format: &ClaimFormat) -> bool {
        match &self.format {
            Some(map) => map.contains_key(format),
            None => true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Constraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<ConstraintsField>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_disclosure: Option<ConstraintsLimitDisclosure>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConstraintsField {
    pub path: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintsLimitDisclosure {
    Required,
    Preferred,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum SubmissionRequirement {
    All(SubmissionRequirementBase),
    Pick(SubmissionRequirementPick),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmissionRequirementBase {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_nested: Option<Vec<SubmissionRequirement>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmissionRequirementPick {
    #[serde(flatten)]
    pub base: SubmissionRequirementBase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<u64>,
}

/// The holder's mapping of supplied tokens to the input descriptors of a
/// [PresentationDefinition]. Arrives on the wire as a JSON-encoded string
/// inside the authorization response.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresentationSubmission {
    pub id: String,
    pub definition_id: String,
    pub descriptor_map: Vec<DescriptorMap>,
}

/// An entry linking one input descriptor to a JSONPath location (and format)
/// inside the vp_token.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DescriptorMap {
    pub id: String,
    pub format: ClaimFormat,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_nested: Option<Box<PathNested>>,
}

/// Same shape as [DescriptorMap] minus `id`, locating a credential nested
/// inside an already-extracted presentation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PathNested {
    pub format: ClaimFormat,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_nested: Option<Box<PathNested>>,
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn presentation_definition_round_trip() {
        let value = json!({
            "id": "vp token example",
            "input_descriptors": [
                {
                    "id": "id card credential",
                    "format": {
                        "vc+sd-jwt": { "sd-jwt_alg_values": ["ES256"] }
                    },
                    "constraints": {
                        "limit_disclosure": "required",
                        "fields": [
                            {
                                "path": ["$.type"],
                                "filter": { "type": "string", "pattern": "IDCardCredential" }
                            }
                        ]
                    }
                }
            ],
            "submission_requirements": [
                { "rule": "pick", "count": 1, "from": "A" }
            ]
        });

        let definition: PresentationDefinition = serde_json::from_value(value.clone()).unwrap();
        assert!(definition
            .input_descriptor("id card credential")
            .unwrap()
            .accepts_format(&ClaimFormat::VcSdJwt));
        assert_eq!(serde_json::to_value(definition).unwrap(), value);
    }

    #[test]
    fn descriptor_map_nested() {
        let value = json!({
            "id": "employment_input",
            "format": "jwt_vp_json",
            "path": "$[0]",
            "path_nested": {
                "format": "jwt_vc_json",
                "path": "$.vp.verifiableCredential[0]"
            }
        });

        let map: DescriptorMap = serde_json::from_value(value).unwrap();
        assert_eq!(map.format, ClaimFormat::JwtVpJson);
        assert_eq!(map.path_nested.unwrap().format, ClaimFormat::JwtVcJson);
    }
}
