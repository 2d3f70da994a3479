//! CBOR decoding for the credential database (C2).
//!
//! The database is parsed once, at load, into a generic [`ciborium::Value`]
//! tree and then walked by [`crate::credential`] into the typed model. This
//! module only owns the walk: map/array/text/byte/int/bool/null/tag access
//! that tolerates key order and treats missing optional fields as empty
//! defaults, per the decoder's tolerance requirement.

use ciborium::Value;

use crate::error::CborError;

/// Parse a byte string into a [`Value`] tree. Tagged items are left
/// attached to their tag; callers that don't care about a specific tag can
/// use [`untag`] to read through it.
pub fn decode(bytes: &[u8]) -> Result<Value, CborError> {
    ciborium::de::from_reader(bytes).map_err(CborError::Io)
}

/// Read through any number of CBOR tags to the tagged value beneath them.
pub fn untag(value: &Value) -> &Value {
    let mut current = value;
    while let Value::Tag(_, inner) = current {
        current = inner;
    }
    current
}

/// Look up `key` in a CBOR map, tolerating any key ordering.
pub fn map_get<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.as_map()?.iter().find_map(|(k, v)| {
        if k.as_text() == Some(key) {
            Some(v)
        } else {
            None
        }
    })
}

/// Look up a required text-string key, erroring if the key is absent or not text.
pub fn require_text(value: &Value, key: &'static str) -> Result<String, CborError> {
    map_get(value, key)
        .ok_or(CborError::MissingKey(key))?
        .as_text()
        .map(str::to_owned)
        .ok_or(CborError::UnexpectedType { expected: "text" })
}

/// Look up an optional text-string key, defaulting to an empty string.
pub fn text_or_default(value: &Value, key: &str) -> String {
    map_get(value, key)
        .and_then(Value::as_text)
        .unwrap_or_default()
        .to_owned()
}

/// Look up an optional byte-string key, defaulting to an empty vector.
pub fn bytes_or_default(value: &Value, key: &str) -> Vec<u8> {
    map_get(value, key)
        .and_then(Value::as_bytes)
        .cloned()
        .unwrap_or_default()
}

/// Look up an optional array key, defaulting to an empty slice.
pub fn array_or_default(value: &Value, key: &str) -> Vec<Value> {
    map_get(value, key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Look up an optional map key.
pub fn map_or_none<'a>(value: &'a Value, key: &str) -> Option<&'a Vec<(Value, Value)>> {
    map_get(value, key).and_then(Value::as_map)
}

/// Decode a `[displayName, value, matchValue]` display triple.
pub fn display_triple(value: &Value) -> Result<(String, String, String), CborError> {
    let array = value
        .as_array()
        .ok_or(CborError::UnexpectedType { expected: "array" })?;
    let [display_name, display_value, match_value]: [&Value; 3] = array
        .iter()
        .collect::<Vec<_>>()
        .try_into()
        .map_err(|_| CborError::Truncated)?;
    let text = |v: &Value| -> Result<String, CborError> {
        v.as_text()
            .map(str::to_owned)
            .ok_or(CborError::UnexpectedType { expected: "text" })
    };
    Ok((text(display_name)?, text(display_value)?, text(match_value)?))
}

#[cfg(test)]
mod test {
    use super::*;

    fn map(pairs: Vec<(&str, Value)>) -> Value {
        Value::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (Value::Text(k.to_owned()), v))
                .collect(),
        )
    }

    #[test]
    fn map_get_is_order_independent() {
        let value = map(vec![
            ("b", Value::Integer(2.into())),
            ("a", Value::Integer(1.into())),
        ]);
        assert_eq!(map_get(&value, "a").and_then(Value::as_integer), Some(1.into()));
        assert_eq!(map_get(&value, "b").and_then(Value::as_integer), Some(2.into()));
    }

    #[test]
    fn missing_optional_yields_default() {
        let value = map(vec![]);
        assert_eq!(text_or_default(&value, "title"), "");
        assert!(bytes_or_default(&value, "bitmap").is_empty());
        assert!(array_or_default(&value, "claims").is_empty());
    }

    #[test]
    fn missing_required_errors() {
        let value = map(vec![]);
        assert!(matches!(
            require_text(&value, "title"),
            Err(CborError::MissingKey("title"))
        ));
    }

    #[test]
    fn untag_reads_through_nested_tags() {
        let inner = Value::Text("x".into());
        let tagged = Value::Tag(24, Box::new(Value::Tag(24, Box::new(inner.clone()))));
        assert_eq!(untag(&tagged), &inner);
    }

    #[test]
    fn display_triple_reads_three_text_elements() {
        let triple = Value::Array(vec![
            Value::Text("Age 21+".into()),
            Value::Text("true".into()),
            Value::Text("true".into()),
        ]);
        assert_eq!(
            display_triple(&triple).unwrap(),
            ("Age 21+".to_string(), "true".to_string(), "true".to_string())
        );
    }
}
