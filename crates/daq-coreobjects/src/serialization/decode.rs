//! Rebuilding values, descriptors, classes and objects from tagged trees.

use serde_json::Value as JsonValue;

use super::tagged::{tags, SerializedObject, TYPE_KEY};
use super::{DeserializeContext, Deserialized, FactoryCallback};
use crate::error::{CoreObjectsError, CoreResult};
use crate::eval::EvalValue;
use crate::object::PropertyObject;
use crate::property::{CallableInfo, Coercer, Property, PropertyBuilder, Validator};
use crate::property_class::{PropertyClass, PropertyClassBuilder};
use crate::value::{CoreType, EnumerationValue, Ratio, StructValue, Value, ValueDict};
use num_complex::Complex64;

/// Rebuild the item described by `json`.
///
/// `factory`, when given, sees every tagged object first and may return a
/// replacement. Any failure aborts the whole call.
pub fn deserialize(
    json: &JsonValue,
    ctx: &DeserializeContext,
    factory: Option<&FactoryCallback>,
) -> CoreResult<Deserialized> {
    Decoder { ctx, factory }.decode(json)
}

const PROPERTY_KEYS: &[&str] = &[
    TYPE_KEY,
    "name",
    "valueType",
    "itemType",
    "keyType",
    "description",
    "unit",
    "minValue",
    "maxValue",
    "defaultValue",
    "visible",
    "readOnly",
    "selectionValues",
    "suggestedValues",
    "referencedProperty",
    "coercer",
    "validator",
    "callableInfo",
];

struct Decoder<'a> {
    ctx: &'a DeserializeContext,
    factory: Option<&'a FactoryCallback>,
}

impl Decoder<'_> {
    fn decode(&self, json: &JsonValue) -> CoreResult<Deserialized> {
        let value = match json {
            JsonValue::Null => Value::Undefined,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => Value::String(s.clone()),
            JsonValue::Array(items) => Value::List(
                items
                    .iter()
                    .map(|item| self.value(item))
                    .collect::<CoreResult<_>>()?,
            ),
            JsonValue::Object(_) => return self.tagged(&SerializedObject::from_json(json)?),
        };
        Ok(Deserialized::Value(value))
    }

    fn value(&self, json: &JsonValue) -> CoreResult<Value> {
        self.decode(json)?.into_value()
    }

    fn tagged(&self, obj: &SerializedObject) -> CoreResult<Deserialized> {
        if let Some(factory) = self.factory {
            if let Some(replacement) = factory(obj, self.ctx)? {
                return Ok(replacement);
            }
        }
        let tag = obj.tag().ok_or_else(|| {
            CoreObjectsError::InvalidParameter(format!("object without '{}' tag", TYPE_KEY))
        })?;
        let value = match tag {
            tags::PROPERTY_OBJECT => Value::Object(self.object(obj)?),
            tags::PROPERTY => return Ok(Deserialized::Property(self.property(obj)?)),
            tags::PROPERTY_CLASS => return Ok(Deserialized::Class(self.class(obj)?)),
            tags::CALLABLE_INFO => {
                let info: CallableInfo = serde_json::from_value(obj.clone().into_json())?;
                return Ok(Deserialized::CallableInfo(info));
            }
            tags::EVAL_VALUE => Value::Eval(EvalValue::new(obj.read_str("eval")?)),
            tags::RATIO => Value::Ratio(Ratio::new(obj.read_i64("num")?, obj.read_i64("den")?)?),
            tags::COMPLEX => Value::Complex(Complex64::new(obj.read_f64("real")?, obj.read_f64("imag")?)),
            tags::BINARY_DATA => {
                let bytes = hex::decode(obj.read_str("data")?).map_err(|e| {
                    CoreObjectsError::InvalidParameter(format!("binary data is not hex: {}", e))
                })?;
                Value::BinaryData(bytes)
            }
            tags::ENUMERATION => Value::Enumeration(EnumerationValue::new(
                obj.read_str("typeName")?,
                obj.read_str("name")?,
                obj.read_i64("value")?,
            )),
            tags::STRUCT => {
                let mut fields = Vec::new();
                for field in obj.read_array("fields")? {
                    let field = SerializedObject::from_json(field)?;
                    fields.push((field.read_str("name")?.to_string(), self.value(field.read("value")?)?));
                }
                Value::Struct(StructValue::new(obj.read_str("typeName")?, fields))
            }
            tags::DICT => {
                let mut dict = ValueDict::new();
                for entry in obj.read_array("values")? {
                    let entry = SerializedObject::from_json(entry)?;
                    dict.insert(self.value(entry.read("key")?)?, self.value(entry.read("value")?)?);
                }
                Value::Dict(dict)
            }
            other => {
                return Err(CoreObjectsError::NotFound(format!(
                    "serialized type tag '{}'",
                    other
                )))
            }
        };
        Ok(Deserialized::Value(value))
    }

    fn core_type(obj: &SerializedObject, key: &str) -> CoreResult<CoreType> {
        let code = obj.read_i64(key)?;
        u32::try_from(code)
            .ok()
            .and_then(CoreType::from_code)
            .ok_or_else(|| CoreObjectsError::InvalidParameter(format!("unknown type code {}", code)))
    }

    fn property(&self, obj: &SerializedObject) -> CoreResult<Property> {
        let name = obj.read_str("name")?;
        for key in obj.keys() {
            if !PROPERTY_KEYS.contains(&key) {
                tracing::warn!(property = %name, field = %key, "Ignoring unknown serialized field");
            }
        }

        let mut builder = PropertyBuilder::new(name, Self::core_type(obj, "valueType")?);
        if obj.has_key("itemType") {
            builder = builder.item_type(Self::core_type(obj, "itemType")?);
        }
        if obj.has_key("keyType") {
            builder = builder.key_type(Self::core_type(obj, "keyType")?);
        }

        let slots: [(&str, fn(PropertyBuilder, Value) -> PropertyBuilder); 9] = [
            ("description", |b, v| b.description(v)),
            ("unit", |b, v| b.unit(v)),
            ("minValue", |b, v| b.min_value(v)),
            ("maxValue", |b, v| b.max_value(v)),
            ("defaultValue", |b, v| b.default_value(v)),
            ("visible", |b, v| b.visible(v)),
            ("readOnly", |b, v| b.read_only(v)),
            ("selectionValues", |b, v| b.selection_values(v)),
            ("suggestedValues", |b, v| b.suggested_values(v)),
        ];
        for (key, set) in slots {
            if let Some(json) = obj.read_optional(key) {
                builder = set(builder, self.value(json)?);
            }
        }

        if let Some(target) = obj.read_optional_str("referencedProperty")? {
            builder = builder.referenced_property(EvalValue::new(target));
        }
        if let Some(expression) = obj.read_optional_str("coercer")? {
            builder = builder.coercer(Coercer::new(expression));
        }
        if let Some(expression) = obj.read_optional_str("validator")? {
            builder = builder.validator(Validator::new(expression));
        }
        if let Some(json) = obj.read_optional("callableInfo") {
            builder = builder.callable_info(self.decode(json)?.into_callable_info()?);
        }
        builder.build()
    }

    fn class(&self, obj: &SerializedObject) -> CoreResult<PropertyClass> {
        let mut builder = PropertyClassBuilder::new(obj.read_str("name")?);
        if let Some(parent) = obj.read_optional_str("parent")? {
            builder = builder.parent(parent);
        }
        for json in obj.read_array("properties")? {
            builder = builder.add_property(self.decode(json)?.into_property()?);
        }
        if let Some(order) = Self::order(obj)? {
            builder = builder.property_order(order);
        }
        builder.build()
    }

    fn order(obj: &SerializedObject) -> CoreResult<Option<Vec<String>>> {
        let Some(items) = obj.read_optional_array("propertyOrder")? else {
            return Ok(None);
        };
        items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    CoreObjectsError::InvalidParameter("property order entries must be strings".into())
                })
            })
            .collect::<CoreResult<Vec<_>>>()
            .map(Some)
    }

    fn object(&self, obj: &SerializedObject) -> CoreResult<PropertyObject> {
        let object = match (obj.read_optional_str("className")?, self.ctx.type_manager()) {
            (Some(class_name), Some(manager)) => PropertyObject::from_class(manager, class_name)?,
            (Some(class_name), None) => {
                return Err(CoreObjectsError::NotFound(format!(
                    "class '{}' (no type manager to resolve it)",
                    class_name
                )))
            }
            (None, Some(manager)) => PropertyObject::with_type_manager(manager),
            (None, None) => PropertyObject::with_config(self.ctx.config().clone()),
        };

        {
            let _guard = object.lock();
            if let Some(properties) = obj.read_optional_array("properties")? {
                for json in properties {
                    object.add_property(self.decode(json)?.into_property()?)?;
                }
            }
            if let Some(order) = Self::order(obj)? {
                object.set_property_order(order)?;
            }
            self.apply_values(&object, obj)?;
        }
        tracing::debug!(class = ?object.class_name(), "Property object deserialized");
        Ok(object)
    }

    /// Apply `propValues` in serialized order through the protected write
    /// path, then replay `defaultChildren` into the existing default children.
    fn apply_values(&self, object: &PropertyObject, obj: &SerializedObject) -> CoreResult<()> {
        if let Some(values) = obj.read_optional_map("propValues")? {
            for (name, json) in values {
                let value = self.value(json)?;
                object.set_protected_property_value(name, value)?;
            }
        }
        if let Some(children) = obj.read_optional_map("defaultChildren")? {
            for (name, json) in children {
                match self.default_child_for(object, name, json)? {
                    Some(child) => {
                        let _child_guard = child.lock();
                        self.apply_values(&child, &SerializedObject::from_json(json)?)?;
                    }
                    None => {
                        tracing::warn!(property = %name, "Default child does not match, storing it as a value");
                        let value = self.value(json)?;
                        object.set_protected_property_value(name, value)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// The existing default child of an Object-typed property when the
    /// serialized child has the same shape and can be applied into it.
    fn default_child_for(
        &self,
        object: &PropertyObject,
        name: &str,
        json: &JsonValue,
    ) -> CoreResult<Option<PropertyObject>> {
        let serialized = match SerializedObject::from_json(json) {
            Ok(s) if s.tag() == Some(tags::PROPERTY_OBJECT) => s,
            _ => return Ok(None),
        };
        let property = object.property_no_lock(name)?;
        let Some(Value::Object(child)) = property.fields().default_value.clone() else {
            return Ok(None);
        };
        if serialized.read_optional_str("className")? != child.class_name() {
            return Ok(None);
        }
        if let Some(properties) = serialized.read_optional_array("properties")? {
            for json in properties {
                let local = SerializedObject::from_json(json)?;
                if !child.has_property(local.read_str("name")?) {
                    return Ok(None);
                }
            }
        }
        Ok(Some(child))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::list;
    use crate::ErrorKind;
    use serde_json::json;

    fn decode(json: JsonValue) -> CoreResult<Deserialized> {
        deserialize(&json, &DeserializeContext::default(), None)
    }

    #[test]
    fn test_primitives() {
        assert_eq!(decode(json!(3)).unwrap().into_value().unwrap(), Value::Int(3));
        assert_eq!(decode(json!(2.5)).unwrap().into_value().unwrap(), Value::Float(2.5));
        assert_eq!(
            decode(json!(["x", "y"])).unwrap().into_value().unwrap(),
            list(["x", "y"])
        );
        assert_eq!(decode(JsonValue::Null).unwrap().into_value().unwrap(), Value::Undefined);
    }

    #[test]
    fn test_unknown_tag_fails() {
        let err = decode(json!({"__type": "Gizmo"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = decode(json!({"plain": 1})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn test_missing_required_field_fails() {
        let err = decode(json!({"__type": "Ratio", "num": 1})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_invalid_property_is_rejected() {
        let err = decode(json!({
            "__type": "Property",
            "name": "Bad",
            "valueType": CoreType::Object.code(),
            "defaultValue": 3
        }))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_unknown_class_fails() {
        let ctx = DeserializeContext::new(&crate::TypeManager::new());
        let err = deserialize(
            &json!({"__type": "PropertyObject", "className": "Missing"}),
            &ctx,
            None,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_factory_replaces_tagged_objects() {
        let factory: Box<FactoryCallback> = Box::new(
            |obj: &SerializedObject, _: &DeserializeContext| -> CoreResult<Option<Deserialized>> {
                Ok((obj.tag() == Some("Ratio")).then(|| Deserialized::Value(Value::Int(-1))))
            },
        );
        let out = deserialize(
            &json!([{"__type": "Ratio", "num": 1, "den": 2}, 4]),
            &DeserializeContext::default(),
            Some(&*factory),
        )
        .unwrap()
        .into_value()
        .unwrap();
        assert_eq!(out, list([-1, 4]));
    }
}
