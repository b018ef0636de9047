//! Construction-time consistency checks for property descriptors.
//!
//! A descriptor is checked exactly once, when [`PropertyBuilder::build`]
//! runs. Any violation aborts construction with `InvalidState`; no partially
//! valid [`Property`] is ever handed out.
//!
//! [`PropertyBuilder::build`]: super::PropertyBuilder::build
//! [`Property`]: super::Property

use super::PropertyFields;
use crate::error::{CoreObjectsError, CoreResult};
use crate::value::{common_type, CoreType, Value};

/// Name reported for descriptors built without one.
pub(crate) const UNNAMED: &str = "<unnamed>";

fn invalid(name: &str, message: &str) -> CoreObjectsError {
    CoreObjectsError::InvalidState(format!("property '{}': {}", name, message))
}

/// An empty description counts as unassigned.
fn description_assigned(fields: &PropertyFields) -> bool {
    match &fields.description {
        None => false,
        Some(Value::String(text)) => !text.is_empty(),
        Some(_) => true,
    }
}

fn container_item_allowed(ty: CoreType) -> bool {
    !matches!(
        ty,
        CoreType::Object | CoreType::Func | CoreType::Proc | CoreType::List | CoreType::Dict
    )
}

/// Run every rule in order; the first violation wins.
pub(crate) fn validate(fields: &mut PropertyFields) -> CoreResult<()> {
    if fields.name.is_empty() {
        fields.name = UNNAMED.to_string();
        return Err(invalid(UNNAMED, "name is not assigned"));
    }
    let name = fields.name.clone();
    let ty = fields.value_type;
    let is_reference = fields.referenced_property.is_some();

    // Default value presence.
    if ty.is_callable() || is_reference {
        if fields.default_value.is_some() {
            return Err(invalid(
                &name,
                "function, procedure and reference properties cannot have a default value",
            ));
        }
    } else if fields.default_value.is_none() {
        return Err(invalid(&name, "default value is not assigned"));
    }

    // Defaults other than objects are immutable values; an Object default
    // must actually hold an object.
    if ty == CoreType::Object {
        match &fields.default_value {
            Some(Value::Object(_)) | Some(Value::Eval(_)) => {}
            _ => return Err(invalid(&name, "object property default must be a property object")),
        }
        if fields.selection_values.is_some()
            || fields.suggested_values.is_some()
            || fields.coercer.is_some()
            || fields.validator.is_some()
            || fields.unit.is_some()
        {
            return Err(invalid(
                &name,
                "object properties cannot have selection values, suggested values, coercer, validator or unit",
            ));
        }
    }

    if (fields.min_value.is_some() || fields.max_value.is_some()) && !ty.is_numeric() {
        return Err(invalid(&name, "min/max values are only allowed on Int and Float properties"));
    }

    if fields.callable_info.is_some() && !ty.is_callable() {
        return Err(invalid(&name, "callable info is only allowed on Func and Proc properties"));
    }

    if is_reference {
        if ty != CoreType::Undefined {
            return Err(invalid(&name, "reference property value type must be Undefined"));
        }
        if description_assigned(fields)
            || fields.read_only.is_some()
            || fields.selection_values.is_some()
            || fields.suggested_values.is_some()
            || fields.coercer.is_some()
            || fields.validator.is_some()
            || fields.unit.is_some()
            || fields.min_value.is_some()
            || fields.max_value.is_some()
            || fields.callable_info.is_some()
        {
            return Err(invalid(&name, "reference property cannot carry metadata other than visibility"));
        }
    }

    if let Some(selection) = &fields.selection_values {
        if ty != CoreType::Int {
            return Err(invalid(&name, "selection values require an Int value type"));
        }
        if !matches!(selection, Value::List(_) | Value::Dict(_) | Value::Eval(_)) {
            return Err(invalid(&name, "selection values must be a list or a dictionary"));
        }
    }

    if fields.suggested_values.is_some()
        && !matches!(ty, CoreType::Int | CoreType::Float | CoreType::String)
    {
        return Err(invalid(&name, "suggested values require an Int, Float or String value type"));
    }

    if ty.is_container() {
        validate_container(fields)?;
    }

    if matches!(ty, CoreType::Struct | CoreType::Enumeration)
        && (description_assigned(fields)
            || fields.selection_values.is_some()
            || fields.suggested_values.is_some()
            || fields.coercer.is_some()
            || fields.validator.is_some()
            || fields.min_value.is_some()
            || fields.max_value.is_some()
            || fields.unit.is_some()
            || fields.callable_info.is_some())
    {
        return Err(invalid(&name, "struct and enumeration properties cannot carry constraints"));
    }

    normalize_default(fields)
}

fn validate_container(fields: &mut PropertyFields) -> CoreResult<()> {
    let name = fields.name.clone();
    // Infer element types from a literal default when not declared.
    match &fields.default_value {
        Some(Value::List(items)) => {
            if fields.item_type == CoreType::Undefined {
                fields.item_type = common_type(items.iter());
            }
            if items.iter().any(|item| !container_item_allowed(item.core_type())) {
                return Err(invalid(&name, "list items cannot be objects, callables or containers"));
            }
        }
        Some(Value::Dict(dict)) => {
            if fields.key_type == CoreType::Undefined {
                fields.key_type = dict.key_type();
            }
            if fields.item_type == CoreType::Undefined {
                fields.item_type = dict.value_type();
            }
            if dict.keys().chain(dict.values()).any(|v| !container_item_allowed(v.core_type())) {
                return Err(invalid(&name, "dictionary keys and values cannot be objects, callables or containers"));
            }
        }
        Some(Value::Eval(_)) => {}
        Some(other) => {
            return Err(invalid(
                &name,
                &format!("default value of type {} does not match {}", other.core_type(), fields.value_type),
            ))
        }
        None => {}
    }
    if !container_item_allowed(fields.item_type) || !container_item_allowed(fields.key_type) {
        return Err(invalid(&name, "container item and key types cannot be objects, callables or containers"));
    }
    Ok(())
}

/// Convert a literal default to the declared type.
fn normalize_default(fields: &mut PropertyFields) -> CoreResult<()> {
    let ty = fields.value_type;
    if ty == CoreType::Undefined || ty.is_container() || ty == CoreType::Object {
        return Ok(());
    }
    if let Some(default) = &fields.default_value {
        if matches!(default, Value::Eval(_)) || default.core_type() == ty {
            return Ok(());
        }
        let converted = default.convert_to(ty).map_err(|_| {
            invalid(
                &fields.name,
                &format!("default value of type {} does not match {}", default.core_type(), ty),
            )
        })?;
        fields.default_value = Some(converted);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::EvalValue;
    use crate::property::{Coercer, PropertyBuilder};
    use crate::value::{list, ValueDict};
    use crate::ErrorKind;

    fn assert_invalid(builder: PropertyBuilder) {
        let err = builder.build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState, "{}", err);
    }

    #[test]
    fn test_missing_name() {
        assert_invalid(PropertyBuilder::int("", 1));
    }

    #[test]
    fn test_default_presence() {
        assert_invalid(PropertyBuilder::new("NoDefault", CoreType::Int));
        assert_invalid(PropertyBuilder::reference("Ref", EvalValue::new("%A")).default_value(1));
    }

    #[test]
    fn test_min_max_only_numeric() {
        assert_invalid(PropertyBuilder::string("Name", "x").min_value(1));
        assert!(PropertyBuilder::float("Gain", 1.0).max_value(2.0).build().is_ok());
    }

    #[test]
    fn test_reference_must_be_bare() {
        assert_invalid(PropertyBuilder::reference("Ref", EvalValue::new("%A")).description("alias"));
        assert_invalid(PropertyBuilder::reference("Ref", EvalValue::new("%A")).read_only(true));
        // An empty description counts as unassigned.
        assert!(PropertyBuilder::reference("Ref", EvalValue::new("%A"))
            .description("")
            .build()
            .is_ok());
    }

    #[test]
    fn test_selection_requires_int() {
        assert_invalid(PropertyBuilder::string("Mode", "a").selection_values(list(["a", "b"])));
        assert_invalid(PropertyBuilder::int("Mode", 0).selection_values("a"));
    }

    #[test]
    fn test_suggested_value_types() {
        assert_invalid(PropertyBuilder::bool("Flag", true).suggested_values(list([true])));
        assert!(PropertyBuilder::float("Rate", 1.0)
            .suggested_values(list([1.0, 2.0]))
            .build()
            .is_ok());
    }

    #[test]
    fn test_container_item_types() {
        assert_invalid(PropertyBuilder::list(
            "Nested",
            Value::List(vec![list([1, 2])]),
            CoreType::Undefined,
        ));
        assert_invalid(PropertyBuilder::list("Objects", Value::List(vec![]), CoreType::Object));
        let dict: ValueDict = [(1, "a")].into_iter().collect();
        let p = PropertyBuilder::dict("Map", dict, CoreType::Undefined, CoreType::Undefined)
            .build()
            .unwrap();
        assert_eq!(p.key_type().unwrap(), CoreType::Int);
        assert_eq!(p.item_type().unwrap(), CoreType::String);
    }

    #[test]
    fn test_object_property_constraints() {
        let obj = crate::PropertyObject::new();
        assert_invalid(PropertyBuilder::object("Child", obj).coercer(Coercer::new("value")));
    }

    #[test]
    fn test_struct_and_enumeration_constraints() {
        let unit = crate::value::Unit::symbol("V");
        assert_invalid(
            PropertyBuilder::struct_property("Unit", unit.to_value()).description("engineering unit"),
        );
    }

    #[test]
    fn test_default_converted_to_declared_type() {
        let p = PropertyBuilder::float("Gain", 2).build().unwrap();
        assert_eq!(p.default_value().unwrap(), Some(Value::Float(2.0)));
        assert_invalid(PropertyBuilder::int("Count", "many"));
    }
}
