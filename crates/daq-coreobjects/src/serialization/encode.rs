//! Tree encoding for values, descriptors, classes and objects.

use serde_json::{Map, Value as JsonValue};

use super::tagged::{tags, SerializedObject, TYPE_KEY};
use super::Serializable;
use crate::error::{CoreObjectsError, CoreResult};
use crate::object::PropertyObject;
use crate::property::{CallableInfo, Property};
use crate::property_class::PropertyClass;
use crate::value::{CoreType, Value};

pub(super) fn value(value: &Value) -> CoreResult<JsonValue> {
    let json = match value {
        Value::Undefined => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Int(i) => JsonValue::from(*i),
        Value::Float(f) => JsonValue::from(*f),
        Value::String(s) => JsonValue::String(s.clone()),
        Value::List(items) => JsonValue::Array(items.iter().map(self::value).collect::<CoreResult<_>>()?),
        Value::Dict(dict) => {
            let mut entries = Vec::with_capacity(dict.len());
            for (k, v) in dict.iter() {
                let mut entry = Map::new();
                entry.insert("key".to_string(), self::value(k)?);
                entry.insert("value".to_string(), self::value(v)?);
                entries.push(JsonValue::Object(entry));
            }
            let mut out = SerializedObject::new(tags::DICT);
            out.write("values", entries);
            out.into_json()
        }
        Value::Ratio(r) => {
            let mut out = SerializedObject::new(tags::RATIO);
            out.write("num", r.numerator());
            out.write("den", r.denominator());
            out.into_json()
        }
        Value::Struct(s) => {
            let mut fields = Vec::with_capacity(s.fields().len());
            for (name, v) in s.fields() {
                let mut field = Map::new();
                field.insert("name".to_string(), JsonValue::String(name.clone()));
                field.insert("value".to_string(), self::value(v)?);
                fields.push(JsonValue::Object(field));
            }
            let mut out = SerializedObject::new(tags::STRUCT);
            out.write("typeName", s.type_name());
            out.write("fields", fields);
            out.into_json()
        }
        Value::Enumeration(e) => {
            let mut out = SerializedObject::new(tags::ENUMERATION);
            out.write("typeName", e.type_name());
            out.write("name", e.name());
            out.write("value", e.value());
            out.into_json()
        }
        Value::Object(obj) => obj.to_tree()?,
        Value::Function(_) | Value::Procedure(_) => {
            return Err(CoreObjectsError::NoInterface(
                "function and procedure values cannot be serialized".to_string(),
            ))
        }
        Value::BinaryData(bytes) => {
            let mut out = SerializedObject::new(tags::BINARY_DATA);
            out.write("data", hex::encode(bytes));
            out.into_json()
        }
        Value::Complex(c) => {
            let mut out = SerializedObject::new(tags::COMPLEX);
            out.write("real", c.re);
            out.write("imag", c.im);
            out.into_json()
        }
        Value::Eval(eval) => {
            let mut out = SerializedObject::new(tags::EVAL_VALUE);
            out.write("eval", eval.expression());
            out.into_json()
        }
    };
    Ok(json)
}

fn optional_value(slot: &Option<Value>) -> CoreResult<Option<JsonValue>> {
    slot.as_ref().map(value).transpose()
}

fn type_code(ty: CoreType) -> Option<JsonValue> {
    (ty != CoreType::Undefined).then(|| JsonValue::from(ty.code()))
}

pub(super) fn property(property: &Property) -> CoreResult<JsonValue> {
    let f = property.fields();
    let mut out = SerializedObject::new(tags::PROPERTY);
    out.write("name", f.name.as_str());
    out.write("valueType", f.value_type.code());
    out.write_optional("itemType", type_code(f.item_type));
    out.write_optional("keyType", type_code(f.key_type));
    out.write_optional("description", optional_value(&f.description)?);
    out.write_optional("unit", optional_value(&f.unit)?);
    out.write_optional("minValue", optional_value(&f.min_value)?);
    out.write_optional("maxValue", optional_value(&f.max_value)?);
    out.write_optional("defaultValue", optional_value(&f.default_value)?);
    out.write_optional("visible", optional_value(&f.visible)?);
    out.write_optional("readOnly", optional_value(&f.read_only)?);
    out.write_optional("selectionValues", optional_value(&f.selection_values)?);
    out.write_optional("suggestedValues", optional_value(&f.suggested_values)?);
    out.write_optional(
        "referencedProperty",
        f.referenced_property
            .as_ref()
            .map(|e| JsonValue::from(e.expression())),
    );
    out.write_optional(
        "coercer",
        f.coercer.as_ref().map(|c| JsonValue::from(c.eval().expression())),
    );
    out.write_optional(
        "validator",
        f.validator
            .as_ref()
            .map(|v| JsonValue::from(v.eval().expression())),
    );
    out.write_optional("callableInfo", f.callable_info.as_ref().map(callable_info).transpose()?);
    Ok(out.into_json())
}

pub(super) fn callable_info(info: &CallableInfo) -> CoreResult<JsonValue> {
    let mut json = serde_json::to_value(info)?;
    if let JsonValue::Object(map) = &mut json {
        map.insert(
            TYPE_KEY.to_string(),
            JsonValue::String(tags::CALLABLE_INFO.to_string()),
        );
    }
    Ok(json)
}

pub(super) fn class(class: &PropertyClass) -> CoreResult<JsonValue> {
    let mut out = SerializedObject::new(tags::PROPERTY_CLASS);
    out.write("name", class.name());
    out.write_optional("parent", class.parent_name().map(JsonValue::from));
    let properties = class
        .properties()
        .iter()
        .map(self::property)
        .collect::<CoreResult<Vec<_>>>()?;
    out.write("properties", properties);
    out.write_optional(
        "propertyOrder",
        class.property_order().map(|order| JsonValue::from(order.to_vec())),
    );
    Ok(out.into_json())
}

/// The caller holds the object's lock.
pub(super) fn object(obj: &PropertyObject) -> CoreResult<JsonValue> {
    let mut out = SerializedObject::new(tags::PROPERTY_OBJECT);
    out.write_optional("className", obj.class_name().map(JsonValue::from));

    let mut prop_values = Map::new();
    let mut default_children = Map::new();
    let stored = obj.explicit_values_no_lock()?;
    let local = obj.local_properties();
    for property in obj.all_properties_no_lock()? {
        let name = property.name();
        if let Some((_, v)) = stored.iter().find(|(n, _)| n == name) {
            if matches!(v, Value::Function(_) | Value::Procedure(_)) {
                tracing::debug!(property = %name, "Skipping callable value");
                continue;
            }
            prop_values.insert(name.to_string(), value(v)?);
            continue;
        }
        // Local descriptors carry their default child in full.
        if local.iter().any(|p| p.name() == name) {
            continue;
        }
        if let Some(Value::Object(child)) = &property.fields().default_value {
            if is_modified(child)? {
                default_children.insert(name.to_string(), child.to_tree()?);
            }
        }
    }
    out.write("propValues", prop_values);
    // Kept apart from `propValues` so a stored (frozen) object value is
    // never mistaken for an edited default child.
    if !default_children.is_empty() {
        out.write("defaultChildren", default_children);
    }

    let properties = local
        .iter()
        .map(self::property)
        .collect::<CoreResult<Vec<_>>>()?;
    out.write("properties", properties);
    out.write_optional(
        "propertyOrder",
        obj.property_order().map(JsonValue::from),
    );
    Ok(out.into_json())
}

/// True if `obj` or one of its default children holds explicit values.
fn is_modified(obj: &PropertyObject) -> CoreResult<bool> {
    let _guard = obj.lock();
    if !obj.explicit_values_no_lock()?.is_empty() {
        return Ok(true);
    }
    for property in obj.all_properties_no_lock()? {
        if let Some(Value::Object(child)) = &property.fields().default_value {
            if is_modified(child)? {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::EvalValue;
    use crate::property::PropertyBuilder;
    use crate::value::{list, Ratio, ValueDict};
    use num_complex::Complex64;
    use serde_json::json;

    #[test]
    fn test_primitive_values() {
        assert_eq!(value(&Value::Int(3)).unwrap(), json!(3));
        assert_eq!(value(&Value::Float(1.5)).unwrap(), json!(1.5));
        assert_eq!(value(&list(["a", "b"])).unwrap(), json!(["a", "b"]));
        assert_eq!(value(&Value::Undefined).unwrap(), JsonValue::Null);
    }

    #[test]
    fn test_tagged_values() {
        let ratio = value(&Value::Ratio(Ratio::new(1, 3).unwrap())).unwrap();
        assert_eq!(ratio, json!({"__type": "Ratio", "num": 1, "den": 3}));

        let bytes = value(&Value::BinaryData(vec![0xde, 0xad])).unwrap();
        assert_eq!(bytes, json!({"__type": "BinaryData", "data": "dead"}));

        let c = value(&Value::Complex(Complex64::new(1.0, -2.0))).unwrap();
        assert_eq!(c, json!({"__type": "Complex", "real": 1.0, "imag": -2.0}));

        let eval = value(&Value::Eval(EvalValue::new("$A + 1"))).unwrap();
        assert_eq!(eval, json!({"__type": "EvalValue", "eval": "$A + 1"}));

        let dict: ValueDict = [(1, "one")].into_iter().collect();
        assert_eq!(
            value(&Value::Dict(dict)).unwrap(),
            json!({"__type": "Dict", "values": [{"key": 1, "value": "one"}]})
        );
    }

    #[test]
    fn test_property_fields() {
        let p = PropertyBuilder::int("Level", 3)
            .max_value(EvalValue::new("$Max"))
            .read_only(true)
            .build()
            .unwrap();
        let json = property(&p).unwrap();
        assert_eq!(json["__type"], "Property");
        assert_eq!(json["name"], "Level");
        assert_eq!(json["valueType"], CoreType::Int.code());
        assert_eq!(json["defaultValue"], 3);
        assert_eq!(json["maxValue"]["eval"], "$Max");
        assert_eq!(json["readOnly"], true);
        assert!(json.get("minValue").is_none());
    }

    #[test]
    fn test_object_writes_only_explicit_values() {
        let obj = PropertyObject::new();
        obj.add_property(PropertyBuilder::int("A", 1).build().unwrap())
            .unwrap();
        obj.add_property(PropertyBuilder::int("B", 2).build().unwrap())
            .unwrap();
        obj.set_property_value("B", 5).unwrap();
        let json = obj.to_tree().unwrap();
        assert_eq!(json["propValues"], json!({"B": 5}));
        assert_eq!(json["properties"].as_array().unwrap().len(), 2);
        assert!(json.get("className").is_none());
    }
}
