//! Serialization bridge
//!
//! Property objects, classes and descriptors are written as a tree of tagged
//! JSON objects (`{"__type": "PropertyObject", ...}`). Scalars, strings and
//! lists map onto JSON primitives and arrays; every other payload carries a
//! `__type` tag so it can be rebuilt without a schema.
//!
//! Restoring a [`PropertyObject`] needs a [`DeserializeContext`]: the class
//! named by `className` must be registered in its [`TypeManager`], and stored
//! values are re-applied through the normal write pipeline, so coercers and
//! validators run exactly as for a live write.
//!
//! ```
//! use daq_coreobjects::property::PropertyBuilder;
//! use daq_coreobjects::serialization::{from_json_str, to_json_string, DeserializeContext};
//! use daq_coreobjects::{PropertyObject, Value};
//!
//! let obj = PropertyObject::new();
//! obj.add_property(PropertyBuilder::int("Count", 1).build()?)?;
//! obj.set_property_value("Count", 4)?;
//!
//! let text = to_json_string(&obj)?;
//! let restored = from_json_str(&text, &DeserializeContext::default())?.into_object()?;
//! assert_eq!(restored.property_value("Count")?, Value::Int(4));
//! # Ok::<(), daq_coreobjects::CoreObjectsError>(())
//! ```

mod decode;
mod encode;
mod tagged;

pub use decode::deserialize;
pub use tagged::{tags, SerializedObject, TYPE_KEY};

use serde_json::Value as JsonValue;
use std::sync::Arc;

use crate::config::CoreObjectsConfig;
use crate::error::{CoreObjectsError, CoreResult};
use crate::object::PropertyObject;
use crate::property::{CallableInfo, Property};
use crate::property_class::PropertyClass;
use crate::type_manager::TypeManager;
use crate::value::Value;

// =============================================================================
// Serializer
// =============================================================================

/// Text format for serialized trees.
pub trait Serializer {
    fn write_tree(&self, tree: &JsonValue) -> CoreResult<String>;
    fn read_tree(&self, text: &str) -> CoreResult<JsonValue>;
}

/// JSON text, compact by default.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer {
    /// Indent the output.
    pub pretty: bool,
}

impl JsonSerializer {
    /// Serializer producing indented output.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl Serializer for JsonSerializer {
    fn write_tree(&self, tree: &JsonValue) -> CoreResult<String> {
        let text = if self.pretty {
            serde_json::to_string_pretty(tree)?
        } else {
            serde_json::to_string(tree)?
        };
        Ok(text)
    }

    fn read_tree(&self, text: &str) -> CoreResult<JsonValue> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Anything that can be written as a tagged tree.
pub trait Serializable {
    fn to_tree(&self) -> CoreResult<JsonValue>;

    fn serialize_with(&self, serializer: &dyn Serializer) -> CoreResult<String> {
        serializer.write_tree(&self.to_tree()?)
    }
}

impl Serializable for Value {
    fn to_tree(&self) -> CoreResult<JsonValue> {
        encode::value(self)
    }
}

impl Serializable for Property {
    fn to_tree(&self) -> CoreResult<JsonValue> {
        encode::property(self)
    }
}

impl Serializable for PropertyClass {
    fn to_tree(&self) -> CoreResult<JsonValue> {
        encode::class(self)
    }
}

impl Serializable for PropertyObject {
    fn to_tree(&self) -> CoreResult<JsonValue> {
        let _guard = self.lock();
        encode::object(self)
    }
}

impl Serializable for CallableInfo {
    fn to_tree(&self) -> CoreResult<JsonValue> {
        encode::callable_info(self)
    }
}

/// Compact JSON text of `item`.
pub fn to_json_string<T: Serializable + ?Sized>(item: &T) -> CoreResult<String> {
    item.serialize_with(&JsonSerializer::default())
}

/// Parse JSON text and rebuild the tree it describes.
pub fn from_json_str(text: &str, ctx: &DeserializeContext) -> CoreResult<Deserialized> {
    let tree = JsonSerializer::default().read_tree(text)?;
    deserialize(&tree, ctx, None)
}

// =============================================================================
// Deserialization
// =============================================================================

/// Types and limits available while rebuilding objects.
#[derive(Debug, Clone)]
pub struct DeserializeContext {
    type_manager: Option<TypeManager>,
    config: Arc<CoreObjectsConfig>,
}

impl Default for DeserializeContext {
    fn default() -> Self {
        Self {
            type_manager: None,
            config: CoreObjectsConfig::shared_default(),
        }
    }
}

impl DeserializeContext {
    /// Context resolving classes and types through `type_manager`.
    pub fn new(type_manager: &TypeManager) -> Self {
        Self {
            type_manager: Some(type_manager.clone()),
            config: type_manager.config(),
        }
    }

    /// Type manager.
    pub fn type_manager(&self) -> Option<&TypeManager> {
        self.type_manager.as_ref()
    }

    /// Config.
    pub fn config(&self) -> &CoreObjectsConfig {
        &self.config
    }
}

/// Hook consulted before the built-in decoding of every tagged object. A
/// returned item replaces the default result.
pub type FactoryCallback =
    dyn Fn(&SerializedObject, &DeserializeContext) -> CoreResult<Option<Deserialized>>;

/// Result of rebuilding a tree.
#[derive(Debug, Clone)]
pub enum Deserialized {
    /// Plain value, including property objects.
    Value(Value),
    /// Property descriptor.
    Property(Property),
    /// Class definition.
    Class(PropertyClass),
    /// Callable signature.
    CallableInfo(CallableInfo),
}

impl Deserialized {
    fn mismatch(&self, expected: &str) -> CoreObjectsError {
        let found = match self {
            Deserialized::Value(v) => v.core_type().to_string(),
            Deserialized::Property(_) => "Property".to_string(),
            Deserialized::Class(_) => "PropertyClass".to_string(),
            Deserialized::CallableInfo(_) => "CallableInfo".to_string(),
        };
        CoreObjectsError::NoInterface(format!("expected {}, found {}", expected, found))
    }

    /// The value, or NoInterface for other items.
    pub fn into_value(self) -> CoreResult<Value> {
        match self {
            Deserialized::Value(v) => Ok(v),
            other => Err(other.mismatch("a value")),
        }
    }

    /// The object, or NoInterface for other items.
    pub fn into_object(self) -> CoreResult<PropertyObject> {
        match self {
            Deserialized::Value(Value::Object(obj)) => Ok(obj),
            other => Err(other.mismatch("a PropertyObject")),
        }
    }

    /// The property, or NoInterface for other items.
    pub fn into_property(self) -> CoreResult<Property> {
        match self {
            Deserialized::Property(p) => Ok(p),
            other => Err(other.mismatch("a Property")),
        }
    }

    /// The class, or NoInterface for other items.
    pub fn into_class(self) -> CoreResult<PropertyClass> {
        match self {
            Deserialized::Class(c) => Ok(c),
            other => Err(other.mismatch("a PropertyClass")),
        }
    }

    /// The callable info, or NoInterface for other items.
    pub fn into_callable_info(self) -> CoreResult<CallableInfo> {
        match self {
            Deserialized::CallableInfo(c) => Ok(c),
            other => Err(other.mismatch("a CallableInfo")),
        }
    }
}
