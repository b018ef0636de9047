use daq_coreobjects::serialization::{
    deserialize, from_json_str, to_json_string, DeserializeContext, Deserialized, FactoryCallback,
    JsonSerializer, Serializable, SerializedObject,
};
use daq_coreobjects::value::list;
use daq_coreobjects::{
    CoreResult, CoreType, EnumerationType, ErrorKind, EvalValue, PropertyBuilder, PropertyClassBuilder,
    PropertyObject, Ratio, TypeManager, Validator, Value,
};

fn device_types() -> TypeManager {
    let types = TypeManager::new();
    types
        .add_type(EnumerationType::new("Coupling", ["DC", "AC"]))
        .unwrap();

    let filter = PropertyObject::new();
    filter
        .add_property(PropertyBuilder::float("Cutoff", 100.0).unit("Hz").build().unwrap())
        .unwrap();

    types
        .add_type(
            PropertyClassBuilder::new("Device")
                .add_property(PropertyBuilder::float("Gain", 1.0).build().unwrap())
                .add_property(
                    PropertyBuilder::selection("Mode", list(["slow", "fast"]), 0)
                        .build()
                        .unwrap(),
                )
                .add_property(
                    PropertyBuilder::string("Serial", "unknown")
                        .read_only(true)
                        .build()
                        .unwrap(),
                )
                .add_property(PropertyBuilder::object("Filter", filter).build().unwrap())
                .build()
                .unwrap(),
        )
        .unwrap();
    types
        .add_type(
            PropertyClassBuilder::new("Scope")
                .parent("Device")
                .add_property(
                    PropertyBuilder::enumeration(
                        "Coupling",
                        daq_coreobjects::EnumerationValue::new("Coupling", "DC", 0),
                    )
                    .build()
                    .unwrap(),
                )
                .build()
                .unwrap(),
        )
        .unwrap();
    types
}

fn configured_scope(types: &TypeManager) -> PropertyObject {
    let scope = PropertyObject::from_class(types, "Scope").unwrap();
    scope.set_property_value("Gain", 2.5).unwrap();
    scope.set_property_value("Mode", 1).unwrap();
    scope.set_property_value("Coupling", "AC").unwrap();
    scope
        .set_protected_property_value("Serial", "SN-0042")
        .unwrap();
    scope.set_property_value("Filter.Cutoff", 250.0).unwrap();
    scope
        .add_property(
            PropertyBuilder::int("Averages", 1)
                .validator(Validator::new("value > 0"))
                .build()
                .unwrap(),
        )
        .unwrap();
    scope.set_property_value("Averages", 16).unwrap();
    scope
        .add_property(PropertyBuilder::ratio("Scale", Ratio::new(1, 2).unwrap()).build().unwrap())
        .unwrap();
    scope
        .add_property(PropertyBuilder::float("Derived", 0.0).build().unwrap())
        .unwrap();
    scope
        .set_property_value("Derived", EvalValue::new("$Gain * 2"))
        .unwrap();
    scope.set_property_order(["Averages", "Gain"]).unwrap();
    scope
}

#[test]
fn test_object_round_trip_preserves_effective_values() {
    let types = device_types();
    let original = configured_scope(&types);

    let text = to_json_string(&original).unwrap();
    let restored = from_json_str(&text, &DeserializeContext::new(&types))
        .unwrap()
        .into_object()
        .unwrap();

    assert_eq!(restored.class_name(), Some("Scope"));
    for property in original.all_properties().unwrap() {
        let name = property.name();
        if property.value_type().unwrap() == CoreType::Object {
            continue;
        }
        assert_eq!(
            restored.property_value(name).unwrap(),
            original.property_value(name).unwrap(),
            "property {name}"
        );
    }
    assert_eq!(
        restored.property_value("Filter.Cutoff").unwrap(),
        Value::Float(250.0)
    );
    assert_eq!(
        restored.visible_properties().unwrap().len(),
        original.visible_properties().unwrap().len()
    );
    assert_eq!(
        restored.property_order(),
        Some(vec!["Averages".to_string(), "Gain".to_string()])
    );
    // Expressions stay live after the round trip.
    restored.set_property_value("Gain", 4.0).unwrap();
    assert_eq!(restored.property_value("Derived").unwrap(), Value::Float(8.0));
}

#[test]
fn test_unset_properties_are_not_written() {
    let types = device_types();
    let scope = PropertyObject::from_class(&types, "Scope").unwrap();
    let tree = scope.to_tree().unwrap();
    assert_eq!(tree["__type"], "PropertyObject");
    assert_eq!(tree["className"], "Scope");
    assert!(tree["propValues"].as_object().unwrap().is_empty());
    assert!(tree["properties"].as_array().unwrap().is_empty());
}

#[test]
fn test_values_are_written_in_property_order() {
    let types = device_types();
    let scope = PropertyObject::from_class(&types, "Scope").unwrap();
    scope.set_property_value("Coupling", "AC").unwrap();
    scope.set_property_value("Gain", 3.0).unwrap();
    let tree = scope.to_tree().unwrap();
    let keys: Vec<&String> = tree["propValues"].as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["Gain", "Coupling"]);
}

#[test]
fn test_unknown_class_aborts_deserialization() {
    let types = device_types();
    let text = to_json_string(&configured_scope(&types)).unwrap();
    let err = from_json_str(&text, &DeserializeContext::new(&TypeManager::new())).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_stored_values_rerun_the_write_pipeline() {
    let types = device_types();
    let text = to_json_string(&configured_scope(&types))
        .unwrap()
        .replace("\"Averages\":16", "\"Averages\":-1");
    let err = from_json_str(&text, &DeserializeContext::new(&types)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidateFailed);
}

#[test]
fn test_stored_object_values_stay_frozen() {
    let types = device_types();
    let scope = PropertyObject::from_class(&types, "Scope").unwrap();
    let replacement = PropertyObject::new();
    replacement
        .add_property(PropertyBuilder::float("Cutoff", 9.0).build().unwrap())
        .unwrap();
    scope.set_property_value("Filter", replacement).unwrap();

    let text = to_json_string(&scope).unwrap();
    let restored = from_json_str(&text, &DeserializeContext::new(&types))
        .unwrap()
        .into_object()
        .unwrap();

    let filter = restored.property_value("Filter").unwrap();
    assert!(filter.as_object().unwrap().is_frozen());
    assert_eq!(
        restored.property_value("Filter.Cutoff").unwrap(),
        Value::Float(9.0)
    );
    assert_eq!(
        restored
            .set_property_value("Filter.Cutoff", 3.0)
            .unwrap_err()
            .kind(),
        ErrorKind::Frozen
    );
}

#[test]
fn test_edited_default_children_stay_editable() {
    let types = device_types();
    let text = to_json_string(&configured_scope(&types)).unwrap();
    let restored = from_json_str(&text, &DeserializeContext::new(&types))
        .unwrap()
        .into_object()
        .unwrap();
    restored.set_property_value("Filter.Cutoff", 300.0).unwrap();
    assert_eq!(
        restored.property_value("Filter.Cutoff").unwrap(),
        Value::Float(300.0)
    );
}

#[test]
fn test_class_round_trip() {
    let types = device_types();
    let class = types.class("Scope").unwrap();
    let text = class.serialize_with(&JsonSerializer::pretty()).unwrap();
    let restored = from_json_str(&text, &DeserializeContext::default())
        .unwrap()
        .into_class()
        .unwrap();
    assert_eq!(restored.name(), "Scope");
    assert_eq!(restored.parent_name(), Some("Device"));
    assert_eq!(restored.properties().len(), 1);
    assert_eq!(
        restored.properties()[0].value_type().unwrap(),
        CoreType::Enumeration
    );
}

#[test]
fn test_property_round_trip_keeps_expressions() {
    let property = PropertyBuilder::int("Level", 3)
        .min_value(0)
        .max_value(EvalValue::new("$Max"))
        .description("Output level")
        .build()
        .unwrap();
    let text = to_json_string(&property).unwrap();
    let restored = from_json_str(&text, &DeserializeContext::default())
        .unwrap()
        .into_property()
        .unwrap();
    assert_eq!(restored.name(), "Level");
    assert_eq!(restored.default_value().unwrap(), Some(Value::Int(3)));
    assert_eq!(
        restored.description().unwrap().as_deref(),
        Some("Output level")
    );
    let tree = restored.to_tree().unwrap();
    assert_eq!(tree["maxValue"]["eval"], "$Max");
}

#[test]
fn test_deserializing_twice_is_idempotent() {
    let types = device_types();
    let ctx = DeserializeContext::new(&types);
    let text = to_json_string(&configured_scope(&types)).unwrap();
    let once = from_json_str(&text, &ctx).unwrap().into_object().unwrap();
    let twice = from_json_str(&to_json_string(&once).unwrap(), &ctx)
        .unwrap()
        .into_object()
        .unwrap();
    assert_eq!(to_json_string(&once).unwrap(), to_json_string(&twice).unwrap());
}

#[test]
fn test_factory_can_substitute_objects() {
    let types = device_types();
    let ctx = DeserializeContext::new(&types);
    let tree = configured_scope(&types).to_tree().unwrap();
    let replacement = PropertyObject::new();
    let substitute = replacement.clone();
    let factory: Box<FactoryCallback> = Box::new(
        move |obj: &SerializedObject, _: &DeserializeContext| -> CoreResult<Option<Deserialized>> {
            Ok((obj.tag() == Some("PropertyObject"))
                .then(|| Deserialized::Value(Value::Object(substitute.clone()))))
        },
    );
    let out = deserialize(&tree, &ctx, Some(&*factory))
        .unwrap()
        .into_object()
        .unwrap();
    assert!(out.ptr_eq(&replacement));
}
