//! Fluent construction of [`Property`] descriptors.

use super::{validate, CallableInfo, Coercer, Property, PropertyFields, Validator};
use crate::error::CoreResult;
use crate::eval::EvalValue;
use crate::object::PropertyObject;
use crate::value::{CoreType, Ratio, Value, ValueDict};

/// Builder for [`Property`].
///
/// Metadata setters accept anything convertible into a [`Value`], including an
/// [`EvalValue`], so every slot may be expression-bound:
///
/// ```
/// use daq_coreobjects::property::PropertyBuilder;
/// use daq_coreobjects::eval::EvalValue;
///
/// let max = PropertyBuilder::int("Max", 100).build()?;
/// let level = PropertyBuilder::int("Level", 10)
///     .min_value(0)
///     .max_value(EvalValue::new("$Max - 1"))
///     .build()?;
/// # Ok::<(), daq_coreobjects::CoreObjectsError>(())
/// ```
#[derive(Debug, Clone)]
pub struct PropertyBuilder {
    fields: PropertyFields,
}

impl PropertyBuilder {
    /// Bare builder for `name` of type `value_type` with no default.
    pub fn new(name: impl Into<String>, value_type: CoreType) -> Self {
        Self {
            fields: PropertyFields::new(name.into(), value_type),
        }
    }

    fn with_default(name: impl Into<String>, ty: CoreType, default: Value) -> Self {
        Self::new(name, ty).default_value(default)
    }

    /// Bool property.
    pub fn bool(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self::with_default(name, CoreType::Bool, default.into())
    }

    /// Int property.
    pub fn int(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self::with_default(name, CoreType::Int, default.into())
    }

    /// Float property.
    pub fn float(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self::with_default(name, CoreType::Float, default.into())
    }

    /// String property.
    pub fn string(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self::with_default(name, CoreType::String, default.into())
    }

    /// Ratio property.
    pub fn ratio(name: impl Into<String>, default: Ratio) -> Self {
        Self::with_default(name, CoreType::Ratio, Value::Ratio(default))
    }

    /// List property; `item_type` may be `Undefined` to infer it from the default.
    pub fn list(name: impl Into<String>, default: impl Into<Value>, item_type: CoreType) -> Self {
        Self::with_default(name, CoreType::List, default.into()).item_type(item_type)
    }

    /// Dict property with fixed key and item types.
    pub fn dict(
        name: impl Into<String>,
        default: ValueDict,
        key_type: CoreType,
        item_type: CoreType,
    ) -> Self {
        Self::with_default(name, CoreType::Dict, Value::Dict(default))
            .key_type(key_type)
            .item_type(item_type)
    }

    /// Int property whose value indexes into `values` (a list).
    pub fn selection(name: impl Into<String>, values: impl Into<Value>, default_index: i64) -> Self {
        Self::int(name, default_index).selection_values(values)
    }

    /// Int property whose value is a key of `values`.
    pub fn sparse_selection(name: impl Into<String>, values: ValueDict, default_key: i64) -> Self {
        Self::int(name, default_key).selection_values(Value::Dict(values))
    }

    /// Object property; each owning instance receives its own copy of `default`.
    pub fn object(name: impl Into<String>, default: PropertyObject) -> Self {
        Self::with_default(name, CoreType::Object, Value::Object(default))
    }

    /// Pure alias of the property selected by `target` (e.g. `%Other`).
    pub fn reference(name: impl Into<String>, target: EvalValue) -> Self {
        Self::new(name, CoreType::Undefined).referenced_property(target)
    }

    /// Function property; carries no default.
    pub fn function(name: impl Into<String>, info: CallableInfo) -> Self {
        Self::new(name, CoreType::Func).callable_info(info)
    }

    /// Procedure property; carries no default.
    pub fn procedure(name: impl Into<String>, info: CallableInfo) -> Self {
        Self::new(name, CoreType::Proc).callable_info(info)
    }

    /// Struct property.
    pub fn struct_property(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self::with_default(name, CoreType::Struct, default.into())
    }

    /// Enumeration property; the default fixes the enumeration type.
    pub fn enumeration(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self::with_default(name, CoreType::Enumeration, default.into())
    }

    // -------------------------------------------------------------------------
    // Metadata
    // -------------------------------------------------------------------------

    /// Description.
    pub fn description(mut self, description: impl Into<Value>) -> Self {
        self.fields.description = Some(description.into());
        self
    }

    /// Engineering unit: a `Unit` struct, a bare symbol string or an expression.
    pub fn unit(mut self, unit: impl Into<Value>) -> Self {
        self.fields.unit = Some(unit.into());
        self
    }

    /// Lower clamp bound; may be an expression.
    pub fn min_value(mut self, min: impl Into<Value>) -> Self {
        self.fields.min_value = Some(min.into());
        self
    }

    /// Upper clamp bound; may be an expression.
    pub fn max_value(mut self, max: impl Into<Value>) -> Self {
        self.fields.max_value = Some(max.into());
        self
    }

    /// Default value.
    pub fn default_value(mut self, default: impl Into<Value>) -> Self {
        self.fields.default_value = Some(default.into());
        self
    }

    /// Visible.
    pub fn visible(mut self, visible: impl Into<Value>) -> Self {
        self.fields.visible = Some(visible.into());
        self
    }

    /// Reject public writes; protected writes still pass.
    pub fn read_only(mut self, read_only: impl Into<Value>) -> Self {
        self.fields.read_only = Some(read_only.into());
        self
    }

    /// List or dict of allowed keys (Int properties only).
    pub fn selection_values(mut self, values: impl Into<Value>) -> Self {
        self.fields.selection_values = Some(values.into());
        self
    }

    /// Suggested values.
    pub fn suggested_values(mut self, values: impl Into<Value>) -> Self {
        self.fields.suggested_values = Some(values.into());
        self
    }

    /// Turn this into a reference to the property named by `target`.
    pub fn referenced_property(mut self, target: EvalValue) -> Self {
        self.fields.referenced_property = Some(target);
        self
    }

    /// Coercer.
    pub fn coercer(mut self, coercer: Coercer) -> Self {
        self.fields.coercer = Some(coercer);
        self
    }

    /// Validator.
    pub fn validator(mut self, validator: Validator) -> Self {
        self.fields.validator = Some(validator);
        self
    }

    /// Callable info.
    pub fn callable_info(mut self, info: CallableInfo) -> Self {
        self.fields.callable_info = Some(info);
        self
    }

    /// Item type of List and Dict values.
    pub fn item_type(mut self, ty: CoreType) -> Self {
        self.fields.item_type = ty;
        self
    }

    /// Key type of Dict values.
    pub fn key_type(mut self, ty: CoreType) -> Self {
        self.fields.key_type = ty;
        self
    }

    /// Validate and build the property.
    pub fn build(self) -> CoreResult<Property> {
        let mut fields = self.fields;
        if let Err(e) = validate::validate(&mut fields) {
            tracing::debug!(property = %fields.name, error = %e, "Property rejected at construction");
            return Err(e);
        }
        Ok(Property::from_fields(fields))
    }
}

impl From<&Property> for PropertyBuilder {
    /// Builder pre-filled with every field of an existing property.
    fn from(property: &Property) -> Self {
        Self {
            fields: property.fields().clone(),
        }
    }
}
