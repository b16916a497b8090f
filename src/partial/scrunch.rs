use std::io::{Read, Write};

use anyhow::{Context, Result};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

const PACKED_KEY: &str = "gzip+hex";

/// A container packed as hex-encoded gzipped JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Packed {
    #[serde(rename = "gzip+hex")]
    pub data: String,
}

/// Wire form of one snapshot field.
///
/// Scalars travel as themselves. Arrays and objects, empty ones included,
/// are always packed, so a literal container on the wire can only come from
/// an older or hand-written payload and is accepted as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scrunched {
    Packed(Packed),
    Literal(Value),
}

impl Scrunched {
    #[inline]
    pub fn is_packed(&self) -> bool { matches!(self, Self::Packed(_)) }

    /// Only an object whose sole key is `gzip+hex` with a string value is
    /// packed. Anything else, one-element arrays included, is literal.
    pub fn from_value(value: Value) -> Self {
        let data = match &value {
            Value::Object(map) if map.len() == 1 => map.get(PACKED_KEY).and_then(Value::as_str).map(str::to_string),
            _ => None,
        };
        match data {
            Some(data) => Self::Packed(Packed { data }),
            None => Self::Literal(value),
        }
    }
}

impl<'de> Deserialize<'de> for Scrunched {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from_value)
    }
}

/// Encode a JSON value for a continuation payload.
pub fn scrunch(value: &Value) -> Result<Scrunched> {
    match value {
        Value::Array(_) | Value::Object(_) => {
            let json = serde_json::to_vec(value)?;
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&json)?;
            let zipped = encoder.finish().context("[partial::scrunch] Failed to gzip value")?;
            Ok(Scrunched::Packed(Packed { data: hex::encode(zipped) }))
        }
        scalar => Ok(Scrunched::Literal(scalar.clone())),
    }
}

/// Decode a value produced by [`scrunch`].
pub fn unscrunch(scrunched: &Scrunched) -> Result<Value> {
    match scrunched {
        Scrunched::Literal(value) => Ok(value.clone()),
        Scrunched::Packed(Packed { data }) => {
            let zipped = hex::decode(data).context("[partial::scrunch] Packed value is not valid hex")?;
            let mut json = Vec::new();
            GzDecoder::new(&zipped[..]).read_to_end(&mut json)
                .context("[partial::scrunch] Packed value is not valid gzip")?;
            serde_json::from_slice(&json).context("[partial::scrunch] Packed value is not valid JSON")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn through_wire(value: &Value) -> Value {
        let wire = serde_json::to_string(&scrunch(value).unwrap()).unwrap();
        unscrunch(&serde_json::from_str(&wire).unwrap()).unwrap()
    }

    #[test]
    fn scalars_pass_through() {
        for value in [json!(null), json!(0), json!(false), json!(true), json!("Yo"), json!(1.5)] {
            let scrunched = scrunch(&value).unwrap();
            assert_eq!(scrunched, Scrunched::Literal(value.clone()));
            assert_eq!(through_wire(&value), value);
        }
    }

    #[test]
    fn containers_are_packed() {
        for value in [json!(["Yo"]), json!({"Yo": "Yo"}), json!([]), json!({}), json!([null, {"a": [1, 2]}])] {
            let scrunched = scrunch(&value).unwrap();
            assert!(scrunched.is_packed(), "{value} should be packed");
            assert_eq!(through_wire(&value), value);
        }
    }

    #[test]
    fn packed_wire_form() {
        let wire = serde_json::to_value(scrunch(&json!({})).unwrap()).unwrap();
        let data = wire["gzip+hex"].as_str().unwrap();
        assert!(data.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(wire.as_object().unwrap().len(), 1);
    }

    #[test]
    fn plain_containers_unscrunch_to_themselves() {
        for value in [json!(["Yo"]), json!({"Yo": "Yo"})] {
            let parsed: Scrunched = serde_json::from_value(value.clone()).unwrap();
            assert_eq!(unscrunch(&parsed).unwrap(), value);
        }
    }

    #[test]
    fn single_element_arrays_stay_literal() {
        for value in [json!(["12/2047/2048"]), json!(["Yo"]), json!([{"gzip+hex": "00"}])] {
            let parsed: Scrunched = serde_json::from_value(value.clone()).unwrap();
            assert_eq!(parsed, Scrunched::Literal(value.clone()));
            assert_eq!(unscrunch(&parsed).unwrap(), value);
        }
    }

    #[test]
    fn only_exact_packed_objects_are_packed() {
        let packed: Scrunched = serde_json::from_value(json!({"gzip+hex": "1f8b"})).unwrap();
        assert!(packed.is_packed());

        for value in [json!({"gzip+hex": 5}), json!({"gzip+hex": "1f8b", "extra": 1}), json!({"GZIP+HEX": "1f8b"})] {
            let parsed: Scrunched = serde_json::from_value(value.clone()).unwrap();
            assert_eq!(parsed, Scrunched::Literal(value));
        }
    }

    #[test]
    fn corrupt_packing_is_an_error() {
        let bad = Scrunched::Packed(Packed { data: "zz".into() });
        assert!(unscrunch(&bad).is_err());
        let not_gzip = Scrunched::Packed(Packed { data: hex::encode(b"plain") });
        assert!(unscrunch(&not_gzip).is_err());
    }
}
