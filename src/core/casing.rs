use serde_json::{Map, Value as Json};

/// Key-casing translation between the snake_case wire protocol and
/// camelCase JSON supplied by application callers.
///
/// Objects are translated recursively, arrays element-wise, and primitives
/// pass through untouched. Only object keys are rewritten, never values.
pub fn camel_to_snake(value: &Json) -> Json {
    translate(value, camel_to_snake_key)
}

/// Inverse of [camel_to_snake].
pub fn snake_to_camel(value: &Json) -> Json {
    translate(value, snake_to_camel_key)
}

fn translate(value: &Json, key_fn: fn(&str) -> String) -> Json {
    match value {
        Json::Object(map) => {
            let translated: Map<String, Json> = map
                .iter()
                .map(|(k, v)| (key_fn(k), translate(v, key_fn)))
                .collect();
            Json::Object(translated)
        }
        Json::Array(arr) => Json::Array(arr.iter().map(|v| translate(v, key_fn)).collect()),
        other => other.clone(),
    }
}

pub fn camel_to_snake_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

pub fn snake_to_camel_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;
    for c in key.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.push(c.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_translation() {
        assert_eq!(camel_to_snake_key("clientIdScheme"), "client_id_scheme");
        assert_eq!(snake_to_camel_key("client_id_scheme"), "clientIdScheme");
        assert_eq!(camel_to_snake_key("x5c"), "x5c");
        assert_eq!(snake_to_camel_key("x5c"), "x5c");
    }

    #[test]
    fn round_trip() {
        let value = json!({
            "clientId": "https://verifier.example.com/cb",
            "responseType": "vp_token",
            "clientMetadata": {
                "vpFormats": {
                    "jwtVpJson": { "algValuesSupported": ["ES256"] }
                }
            },
            "inputDescriptors": [
                { "id": "mdl", "constraints": { "limitDisclosure": "required" } }
            ],
            "count": 2,
            "nested": [[{"pathNested": null}]]
        });

        assert_eq!(snake_to_camel(&camel_to_snake(&value)), value);
    }

    #[test]
    fn primitives_pass_through() {
        for value in [json!("someCamelString"), json!(42), json!(null), json!(true)] {
            assert_eq!(camel_to_snake(&value), value);
            assert_eq!(snake_to_camel(&value), value);
        }
    }
}
