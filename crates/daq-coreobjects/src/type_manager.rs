//! Named type registry
//!
//! [`TypeManager`] maps names to property classes, struct types and
//! enumeration types, all sharing one name space. Registration is explicit:
//! types are added with [`TypeManager::add_type`] and removed with
//! [`TypeManager::remove_type`]; nothing is registered implicitly and there is
//! no process-wide instance. Tests create isolated managers.
//!
//! The manager also carries the [`CoreObjectsConfig`] inherited by every
//! property object created from one of its classes.
//!
//! Removing a class that live objects still reference is not prevented; those
//! objects fail class lookups with `NotFound` afterwards.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::CoreObjectsConfig;
use crate::error::{CoreObjectsError, CoreResult};
use crate::property::Property;
use crate::property_class::PropertyClass;
use crate::value::{CoreType, EnumerationValue, StructValue, Value};

// =============================================================================
// Struct and enumeration types
// =============================================================================

/// Field layout of a struct type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructType {
    name: String,
    fields: Vec<(String, CoreType)>,
}

impl StructType {
    /// Struct type with ordered, typed fields.
    pub fn new(name: impl Into<String>, fields: Vec<(String, CoreType)>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields.
    pub fn fields(&self) -> &[(String, CoreType)] {
        &self.fields
    }

    /// Build a struct value, converting each field to its declared type.
    pub fn create(&self, values: Vec<Value>) -> CoreResult<StructValue> {
        if values.len() != self.fields.len() {
            return Err(CoreObjectsError::InvalidParameter(format!(
                "struct '{}' has {} fields, got {} values",
                self.name,
                self.fields.len(),
                values.len()
            )));
        }
        let fields = self
            .fields
            .iter()
            .zip(values)
            .map(|((name, ty), value)| Ok((name.clone(), value.convert_to(*ty)?)))
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(StructValue::new(self.name.clone(), fields))
    }
}

/// Enumerator names and their integer values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerationType {
    name: String,
    enumerators: Vec<(String, i64)>,
}

impl EnumerationType {
    /// Enumerators numbered from 0 in the given order.
    pub fn new<I, S>(name: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            enumerators: names.into_iter().map(Into::into).zip(0..).collect(),
        }
    }

    /// Enumeration with explicit integer values.
    pub fn with_values(name: impl Into<String>, enumerators: Vec<(String, i64)>) -> Self {
        Self {
            name: name.into(),
            enumerators,
        }
    }

    /// Name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enumerators.
    pub fn enumerators(&self) -> &[(String, i64)] {
        &self.enumerators
    }

    /// Value for an enumerator name; NotFound if unknown.
    pub fn value(&self, enumerator: &str) -> CoreResult<EnumerationValue> {
        self.enumerators
            .iter()
            .find(|(name, _)| name == enumerator)
            .map(|(name, value)| EnumerationValue::new(self.name.clone(), name.clone(), *value))
            .ok_or_else(|| {
                CoreObjectsError::NotFound(format!(
                    "enumerator '{}' in '{}'",
                    enumerator, self.name
                ))
            })
    }

    /// Value for an integer; NotFound if no enumerator has it.
    pub fn from_int(&self, value: i64) -> CoreResult<EnumerationValue> {
        self.enumerators
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(name, v)| EnumerationValue::new(self.name.clone(), name.clone(), *v))
            .ok_or_else(|| {
                CoreObjectsError::NotFound(format!("enumerator {} in '{}'", value, self.name))
            })
    }
}

/// Anything the registry can hold.
#[derive(Debug, Clone)]
pub enum TypeDefinition {
    /// Class.
    Class(PropertyClass),
    /// Struct.
    Struct(StructType),
    /// Enumeration.
    Enumeration(EnumerationType),
}

impl TypeDefinition {
    /// Registered name.
    pub fn name(&self) -> &str {
        match self {
            TypeDefinition::Class(c) => c.name(),
            TypeDefinition::Struct(s) => s.name(),
            TypeDefinition::Enumeration(e) => e.name(),
        }
    }
}

impl From<PropertyClass> for TypeDefinition {
    fn from(class: PropertyClass) -> Self {
        TypeDefinition::Class(class)
    }
}

impl From<StructType> for TypeDefinition {
    fn from(ty: StructType) -> Self {
        TypeDefinition::Struct(ty)
    }
}

impl From<EnumerationType> for TypeDefinition {
    fn from(ty: EnumerationType) -> Self {
        TypeDefinition::Enumeration(ty)
    }
}

// =============================================================================
// TypeManager
// =============================================================================

struct TypeManagerInner {
    types: RwLock<HashMap<String, TypeDefinition>>,
    config: Arc<CoreObjectsConfig>,
}

/// Explicit, injectable type registry (shared handle).
#[derive(Clone)]
pub struct TypeManager {
    inner: Arc<TypeManagerInner>,
}

impl Default for TypeManager {
    fn default() -> Self {
        Self::with_config(CoreObjectsConfig::default())
    }
}

impl fmt::Debug for TypeManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeManager")
            .field("types", &self.type_names())
            .finish()
    }
}

impl TypeManager {
    /// Empty registry with the default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty registry whose objects use `config`.
    pub fn with_config(config: CoreObjectsConfig) -> Self {
        Self {
            inner: Arc::new(TypeManagerInner {
                types: RwLock::new(HashMap::new()),
                config: Arc::new(config),
            }),
        }
    }

    /// Configuration inherited by objects created from this manager's classes.
    pub fn config(&self) -> Arc<CoreObjectsConfig> {
        self.inner.config.clone()
    }

    /// True if both handles share the same allocation.
    pub fn ptr_eq(&self, other: &TypeManager) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Register a type. Fails with `AlreadyExists` on a name clash and with
    /// `NotFound` when a class names an unregistered parent.
    pub fn add_type(&self, definition: impl Into<TypeDefinition>) -> CoreResult<()> {
        let definition = definition.into();
        let name = definition.name().to_string();
        let mut types = self.inner.types.write();
        if types.contains_key(&name) {
            return Err(CoreObjectsError::AlreadyExists(format!("type '{}'", name)));
        }
        if let TypeDefinition::Class(class) = &definition {
            if let Some(parent) = class.parent_name() {
                match types.get(parent) {
                    Some(TypeDefinition::Class(_)) => {}
                    _ => {
                        return Err(CoreObjectsError::NotFound(format!(
                            "parent class '{}' of '{}'",
                            parent, name
                        )))
                    }
                }
            }
        }
        types.insert(name.clone(), definition);
        tracing::debug!(type_name = %name, "Type registered");
        Ok(())
    }

    /// Remove and return a type; NotFound if absent.
    pub fn remove_type(&self, name: &str) -> CoreResult<TypeDefinition> {
        let removed = self
            .inner
            .types
            .write()
            .remove(name)
            .ok_or_else(|| CoreObjectsError::NotFound(format!("type '{}'", name)))?;
        tracing::debug!(type_name = %name, "Type removed");
        Ok(removed)
    }

    /// True if a type exists.
    pub fn has_type(&self, name: &str) -> bool {
        self.inner.types.read().contains_key(name)
    }

    /// Registered type of any kind; NotFound if absent.
    pub fn get_type(&self, name: &str) -> CoreResult<TypeDefinition> {
        self.inner
            .types
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| CoreObjectsError::NotFound(format!("type '{}'", name)))
    }

    /// Registered names, sorted.
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.types.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Registered class; NotFound if absent or not a class.
    pub fn class(&self, name: &str) -> CoreResult<PropertyClass> {
        match self.get_type(name)? {
            TypeDefinition::Class(class) => Ok(class),
            _ => Err(CoreObjectsError::NotFound(format!("class '{}'", name))),
        }
    }

    /// Struct type.
    pub fn struct_type(&self, name: &str) -> CoreResult<StructType> {
        match self.get_type(name)? {
            TypeDefinition::Struct(ty) => Ok(ty),
            _ => Err(CoreObjectsError::NotFound(format!("struct type '{}'", name))),
        }
    }

    /// Enumeration type.
    pub fn enumeration_type(&self, name: &str) -> CoreResult<EnumerationType> {
        match self.get_type(name)? {
            TypeDefinition::Enumeration(ty) => Ok(ty),
            _ => Err(CoreObjectsError::NotFound(format!(
                "enumeration type '{}'",
                name
            ))),
        }
    }

    /// Inheritance chain of `name`, root ancestor first.
    pub fn class_chain(&self, name: &str) -> CoreResult<Vec<PropertyClass>> {
        self.chain_from(self.class(name)?)
    }

    pub(crate) fn chain_from(&self, class: PropertyClass) -> CoreResult<Vec<PropertyClass>> {
        let limit = self.inner.config.max_reference_depth.max(1) * 4;
        let mut chain = vec![class];
        while let Some(parent) = chain.last().and_then(|c| c.parent_name().map(str::to_string)) {
            if chain.len() > limit {
                return Err(CoreObjectsError::InvalidState(format!(
                    "class chain of '{}' is too deep",
                    chain[0].name()
                )));
            }
            chain.push(self.class(&parent)?);
        }
        chain.reverse();
        Ok(chain)
    }

    /// Every property of `class_name`, inheritance resolved.
    pub fn class_properties(&self, class_name: &str) -> CoreResult<Vec<Property>> {
        self.class(class_name)?.all_properties(self)
    }

    /// Most derived declaration of `property` in the chain of `class_name`.
    pub fn class_property(&self, class_name: &str, property: &str) -> CoreResult<Option<Property>> {
        let chain = self.class_chain(class_name)?;
        Ok(chain
            .iter()
            .rev()
            .find_map(|class| class.property(property).cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::PropertyBuilder;
    use crate::property_class::PropertyClassBuilder;
    use crate::ErrorKind;

    #[test]
    fn test_add_remove_and_duplicates() {
        let manager = TypeManager::new();
        manager
            .add_type(PropertyClassBuilder::new("Device").build().unwrap())
            .unwrap();
        let err = manager
            .add_type(EnumerationType::new("Device", ["A"]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);

        assert!(manager.has_type("Device"));
        manager.remove_type("Device").unwrap();
        assert!(!manager.has_type("Device"));
        assert_eq!(
            manager.remove_type("Device").unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_parent_must_be_registered() {
        let manager = TypeManager::new();
        let err = manager
            .add_type(PropertyClassBuilder::new("Child").parent("Missing").build().unwrap())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_class_chain_root_first() {
        let manager = TypeManager::new();
        manager.add_type(PropertyClassBuilder::new("A").build().unwrap()).unwrap();
        manager
            .add_type(PropertyClassBuilder::new("B").parent("A").build().unwrap())
            .unwrap();
        manager
            .add_type(
                PropertyClassBuilder::new("C")
                    .parent("B")
                    .add_property(PropertyBuilder::int("X", 1).build().unwrap())
                    .build()
                    .unwrap(),
            )
            .unwrap();
        let chain: Vec<String> = manager
            .class_chain("C")
            .unwrap()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(chain, vec!["A", "B", "C"]);
        assert!(manager.class_property("C", "X").unwrap().is_some());
        assert!(manager.class_property("C", "Y").unwrap().is_none());
    }

    #[test]
    fn test_removed_parent_breaks_lookup() {
        let manager = TypeManager::new();
        manager.add_type(PropertyClassBuilder::new("A").build().unwrap()).unwrap();
        manager
            .add_type(PropertyClassBuilder::new("B").parent("A").build().unwrap())
            .unwrap();
        manager.remove_type("A").unwrap();
        assert_eq!(
            manager.class_chain("B").unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_struct_and_enumeration_types() {
        let manager = TypeManager::new();
        manager
            .add_type(StructType::new(
                "Range",
                vec![("Low".into(), CoreType::Float), ("High".into(), CoreType::Float)],
            ))
            .unwrap();
        manager
            .add_type(EnumerationType::new("Coupling", ["DC", "AC"]))
            .unwrap();

        let range = manager
            .struct_type("Range")
            .unwrap()
            .create(vec![Value::Int(-1), Value::Float(1.0)])
            .unwrap();
        assert_eq!(range.get("Low"), Some(&Value::Float(-1.0)));

        let coupling = manager.enumeration_type("Coupling").unwrap();
        assert_eq!(coupling.value("AC").unwrap().value(), 1);
        assert_eq!(coupling.from_int(0).unwrap().name(), "DC");
        assert!(coupling.value("GND").is_err());
        assert_eq!(
            manager.class("Coupling").unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }
}
