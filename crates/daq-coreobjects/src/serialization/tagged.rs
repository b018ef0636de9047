//! Tagged JSON object wrapper with typed field access.

use serde_json::{Map, Value as JsonValue};

use crate::error::{CoreObjectsError, CoreResult};

/// Key holding the type tag of every tagged object.
pub const TYPE_KEY: &str = "__type";

/// Type tags written by the serializer.
pub mod tags {
    /// PropertyObject.
    pub const PROPERTY_OBJECT: &str = "PropertyObject";
    /// Property descriptor.
    pub const PROPERTY: &str = "Property";
    /// PropertyClass.
    pub const PROPERTY_CLASS: &str = "PropertyClass";
    /// Expression.
    pub const EVAL_VALUE: &str = "EvalValue";
    /// Ratio.
    pub const RATIO: &str = "Ratio";
    /// Struct value.
    pub const STRUCT: &str = "Struct";
    /// Enumeration value.
    pub const ENUMERATION: &str = "Enumeration";
    /// Complex number.
    pub const COMPLEX: &str = "Complex";
    /// Hex-encoded bytes.
    pub const BINARY_DATA: &str = "BinaryData";
    /// Dictionary.
    pub const DICT: &str = "Dict";
    /// Callable signature.
    pub const CALLABLE_INFO: &str = "CallableInfo";
}

/// One tagged object. Missing optional fields read as `None`; missing
/// required fields fail with `NotFound`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SerializedObject {
    fields: Map<String, JsonValue>,
}

impl SerializedObject {
    /// Empty object tagged `tag`.
    pub fn new(tag: &str) -> Self {
        let mut fields = Map::new();
        fields.insert(TYPE_KEY.to_string(), JsonValue::String(tag.to_string()));
        Self { fields }
    }

    /// Wrap a JSON object; anything else is rejected.
    pub fn from_json(json: &JsonValue) -> CoreResult<Self> {
        match json {
            JsonValue::Object(fields) => Ok(Self {
                fields: fields.clone(),
            }),
            other => Err(CoreObjectsError::InvalidParameter(format!(
                "expected a serialized object, found {}",
                other
            ))),
        }
    }

    /// Type tag, if present.
    pub fn tag(&self) -> Option<&str> {
        self.fields.get(TYPE_KEY).and_then(JsonValue::as_str)
    }

    /// The json, or NoInterface for other items.
    pub fn into_json(self) -> JsonValue {
        JsonValue::Object(self.fields)
    }

    /// Set a field.
    pub fn write(&mut self, key: &str, value: impl Into<JsonValue>) {
        self.fields.insert(key.to_string(), value.into());
    }

    /// Write `value` unless it is `None`.
    pub fn write_optional(&mut self, key: &str, value: Option<JsonValue>) {
        if let Some(value) = value {
            self.write(key, value);
        }
    }

    /// Field names, including the tag key.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// True if a key exists.
    pub fn has_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Required optional field.
    pub fn read_optional(&self, key: &str) -> Option<&JsonValue> {
        self.fields.get(key)
    }

    /// Required field; NotFound when absent.
    pub fn read(&self, key: &str) -> CoreResult<&JsonValue> {
        self.fields.get(key).ok_or_else(|| {
            CoreObjectsError::NotFound(format!(
                "field '{}' in serialized {}",
                key,
                self.tag().unwrap_or("object")
            ))
        })
    }

    fn wrong_type(&self, key: &str, expected: &str) -> CoreObjectsError {
        CoreObjectsError::InvalidParameter(format!(
            "field '{}' in serialized {} is not {}",
            key,
            self.tag().unwrap_or("object"),
            expected
        ))
    }

    /// Required str field.
    pub fn read_str(&self, key: &str) -> CoreResult<&str> {
        self.read(key)?
            .as_str()
            .ok_or_else(|| self.wrong_type(key, "a string"))
    }

    /// Optional str field; `None` when absent or null.
    pub fn read_optional_str(&self, key: &str) -> CoreResult<Option<&str>> {
        match self.read_optional(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(v) => v.as_str().map(Some).ok_or_else(|| self.wrong_type(key, "a string")),
        }
    }

    /// Required i64 field.
    pub fn read_i64(&self, key: &str) -> CoreResult<i64> {
        self.read(key)?
            .as_i64()
            .ok_or_else(|| self.wrong_type(key, "an integer"))
    }

    /// Required f64 field.
    pub fn read_f64(&self, key: &str) -> CoreResult<f64> {
        self.read(key)?
            .as_f64()
            .ok_or_else(|| self.wrong_type(key, "a number"))
    }

    /// Required array field.
    pub fn read_array(&self, key: &str) -> CoreResult<&Vec<JsonValue>> {
        self.read(key)?
            .as_array()
            .ok_or_else(|| self.wrong_type(key, "an array"))
    }

    /// Optional array field; `None` when absent or null.
    pub fn read_optional_array(&self, key: &str) -> CoreResult<Option<&Vec<JsonValue>>> {
        match self.read_optional(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(v) => v.as_array().map(Some).ok_or_else(|| self.wrong_type(key, "an array")),
        }
    }

    /// Optional map field; `None` when absent or null.
    pub fn read_optional_map(&self, key: &str) -> CoreResult<Option<&Map<String, JsonValue>>> {
        match self.read_optional(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(v) => v.as_object().map(Some).ok_or_else(|| self.wrong_type(key, "an object")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_tag_and_fields() {
        let mut obj = SerializedObject::new(tags::RATIO);
        obj.write("num", 1);
        obj.write_optional("den", Some(json!(2)));
        obj.write_optional("skip", None);
        assert_eq!(obj.tag(), Some("Ratio"));
        assert_eq!(obj.read_i64("den").unwrap(), 2);
        assert!(!obj.has_key("skip"));
        assert_eq!(
            obj.into_json(),
            json!({"__type": "Ratio", "num": 1, "den": 2})
        );
    }

    #[test]
    fn test_missing_and_mistyped_fields() {
        let obj = SerializedObject::from_json(&json!({"__type": "X", "name": 5})).unwrap();
        assert_eq!(obj.read("absent").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(
            obj.read_str("name").unwrap_err().kind(),
            ErrorKind::InvalidParameter
        );
        assert_eq!(obj.read_optional_str("absent").unwrap(), None);
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(SerializedObject::from_json(&json!([1, 2])).is_err());
    }
}
