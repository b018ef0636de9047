//! Property classes
//!
//! A [`PropertyClass`] is a named, immutable template listing an ordered set
//! of properties, optionally derived from a parent class. Inheritance is
//! resolved at lookup time through a [`TypeManager`]: the chain is walked from
//! the root ancestor down to the class, and a property declared again further
//! down shadows the ancestor's entry with the same name.
//!
//! ```
//! use daq_coreobjects::property::PropertyBuilder;
//! use daq_coreobjects::property_class::PropertyClassBuilder;
//! use daq_coreobjects::type_manager::TypeManager;
//!
//! let manager = TypeManager::new();
//! manager.add_type(
//!     PropertyClassBuilder::new("Channel")
//!         .add_property(PropertyBuilder::float("Gain", 1.0).build()?)
//!         .build()?,
//! )?;
//! manager.add_type(
//!     PropertyClassBuilder::new("VoltageChannel")
//!         .parent("Channel")
//!         .add_property(PropertyBuilder::float("Range", 10.0).build()?)
//!         .build()?,
//! )?;
//! let class = manager.class("VoltageChannel")?;
//! assert_eq!(class.all_properties(&manager)?.len(), 2);
//! # Ok::<(), daq_coreobjects::CoreObjectsError>(())
//! ```

use std::fmt;
use std::sync::Arc;

use crate::error::{CoreObjectsError, CoreResult};
use crate::property::Property;
use crate::type_manager::TypeManager;

struct ClassInner {
    name: String,
    parent_name: Option<String>,
    properties: Vec<Property>,
    property_order: Option<Vec<String>>,
}

/// Immutable class template (shared handle).
#[derive(Clone)]
pub struct PropertyClass {
    inner: Arc<ClassInner>,
}

impl fmt::Debug for PropertyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyClass")
            .field("name", &self.inner.name)
            .field("parent", &self.inner.parent_name)
            .field(
                "properties",
                &self.inner.properties.iter().map(Property::name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl PropertyClass {
    /// Name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Parent name.
    pub fn parent_name(&self) -> Option<&str> {
        self.inner.parent_name.as_deref()
    }

    /// Properties declared directly on this class, in declaration order.
    pub fn properties(&self) -> &[Property] {
        &self.inner.properties
    }

    /// Directly declared property (no inheritance).
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.inner.properties.iter().find(|p| p.name() == name)
    }

    /// True if declared by this class, not a parent.
    pub fn has_own_property(&self, name: &str) -> bool {
        self.property(name).is_some()
    }

    /// Property order.
    pub fn property_order(&self) -> Option<&[String]> {
        self.inner.property_order.as_deref()
    }

    /// True if both handles share the same allocation.
    pub fn ptr_eq(&self, other: &PropertyClass) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Property resolved through the inheritance chain; the most derived
    /// declaration wins.
    pub fn inherited_property(&self, manager: &TypeManager, name: &str) -> CoreResult<Property> {
        if let Some(property) = self.property(name) {
            return Ok(property.clone());
        }
        match self.parent_name() {
            Some(parent) => manager.class(parent)?.inherited_property(manager, name),
            None => Err(CoreObjectsError::NotFound(format!(
                "property '{}' in class '{}'",
                name,
                self.name()
            ))),
        }
    }

    /// All properties of the chain, root ancestor first, shadowed entries
    /// replaced in place, then ordered by the most derived explicit order.
    pub fn all_properties(&self, manager: &TypeManager) -> CoreResult<Vec<Property>> {
        let chain = manager.chain_from(self.clone())?;
        let mut merged: Vec<Property> = Vec::new();
        let mut order: Option<&[String]> = None;
        for class in &chain {
            for property in class.properties() {
                match merged.iter().position(|p| p.name() == property.name()) {
                    Some(pos) => merged[pos] = property.clone(),
                    None => merged.push(property.clone()),
                }
            }
            if let Some(class_order) = class.property_order() {
                order = Some(class_order);
            }
        }
        Ok(match order {
            Some(order) => apply_property_order(merged, order),
            None => merged,
        })
    }
}

/// Named properties first (in `order`), then the rest in natural order.
/// Unknown names in `order` are ignored.
pub(crate) fn apply_property_order(mut properties: Vec<Property>, order: &[String]) -> Vec<Property> {
    let mut ordered = Vec::with_capacity(properties.len());
    for name in order {
        if let Some(pos) = properties.iter().position(|p| p.name() == name) {
            ordered.push(properties.remove(pos));
        }
    }
    ordered.extend(properties);
    ordered
}

/// Builder for [`PropertyClass`].
#[derive(Debug)]
pub struct PropertyClassBuilder {
    name: String,
    parent_name: Option<String>,
    properties: Vec<Property>,
    property_order: Option<Vec<String>>,
}

impl PropertyClassBuilder {
    /// Builder for a class named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent_name: None,
            properties: Vec::new(),
            property_order: None,
        }
    }

    /// Inherit from the registered class `parent_name`.
    pub fn parent(mut self, parent_name: impl Into<String>) -> Self {
        self.parent_name = Some(parent_name.into());
        self
    }

    /// Append a property. Owned properties are copied.
    pub fn add_property(mut self, property: Property) -> Self {
        let property = if property.owner().is_some() {
            property.deep_clone()
        } else {
            property
        };
        self.properties.push(property);
        self
    }

    /// Names listed first, in this order; the rest follow.
    pub fn property_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.property_order = Some(order.into_iter().map(Into::into).collect());
        self
    }

    /// Fails with AlreadyExists on duplicate property names.
    pub fn build(self) -> CoreResult<PropertyClass> {
        if self.name.is_empty() {
            return Err(CoreObjectsError::InvalidParameter(
                "class name is empty".into(),
            ));
        }
        for (i, property) in self.properties.iter().enumerate() {
            if self.properties[..i].iter().any(|p| p.name() == property.name()) {
                return Err(CoreObjectsError::AlreadyExists(format!(
                    "property '{}' declared twice in class '{}'",
                    property.name(),
                    self.name
                )));
            }
        }
        Ok(PropertyClass {
            inner: Arc::new(ClassInner {
                name: self.name,
                parent_name: self.parent_name,
                properties: self.properties,
                property_order: self.property_order,
            }),
        })
    }
}
