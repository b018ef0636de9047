//! `daq-coreobjects`
//!
//! Reflective property system for rust-daq configuration objects.
//!
//! Devices, channels and function blocks describe their settings as
//! *properties*: typed, named descriptors with metadata (unit, range,
//! selection values, visibility) that may be bound to expressions over
//! sibling properties. Property objects hold the values, raise change events
//! and serialize to a tagged JSON tree.
//!
//! ## Building Blocks
//!
//! - [`Property`]: immutable descriptor, built and validated by [`PropertyBuilder`]
//! - [`PropertyClass`]: named template with single inheritance, registered in a [`TypeManager`]
//! - [`PropertyObject`]: mutable instance with path addressing, batched updates, freezing and cloning
//! - [`EvalValue`]: expression (`"$Gain * 2"`, `"%Target"`) evaluated against an owner
//! - [`Event`]: synchronous change/read notification with per-handler recursion guard
//! - [`serialization`]: tagged-tree serializer and deserializer
//!
//! ## Example
//!
//! ```rust
//! use daq_coreobjects::{
//!     EvalValue, PropertyBuilder, PropertyClassBuilder, PropertyObject, TypeManager, Value,
//! };
//!
//! let types = TypeManager::new();
//! types.add_type(
//!     PropertyClassBuilder::new("Channel")
//!         .add_property(PropertyBuilder::float("Range", 10.0).unit("V").build()?)
//!         .add_property(
//!             PropertyBuilder::float("Offset", 0.0)
//!                 .max_value(EvalValue::new("$Range"))
//!                 .build()?,
//!         )
//!         .build()?,
//! )?;
//!
//! let channel = PropertyObject::from_class(&types, "Channel")?;
//! channel.set_property_value("Offset", 25.0)?;
//! assert_eq!(channel.property_value("Offset")?, Value::Float(10.0));
//! # Ok::<(), daq_coreobjects::CoreObjectsError>(())
//! ```

pub mod config;
pub mod error;
pub mod eval;
pub mod event;
pub mod object;
pub mod permission;
pub mod property;
pub mod property_class;
pub mod serialization;
pub mod type_manager;
pub mod value;

// Re-export commonly used types
pub use config::CoreObjectsConfig;
pub use error::{CoreObjectsError, CoreResult, ErrorKind};
pub use eval::{EvalContext, EvalValue};
pub use event::{EndUpdateEventArgs, Event, PropertyEventType, PropertyValueEventArgs};
pub use object::{PropertyObject, WeakPropertyObject};
pub use permission::{Permission, PermissionManager, Permissions};
pub use property::{ArgumentInfo, CallableInfo, Coercer, Property, PropertyBuilder, Validator};
pub use property_class::{PropertyClass, PropertyClassBuilder};
pub use type_manager::{EnumerationType, StructType, TypeDefinition, TypeManager};
pub use value::{
    Callable, CoreType, EnumerationValue, Ratio, StructValue, Unit, Value, ValueDict,
};
