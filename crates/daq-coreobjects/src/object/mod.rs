//! Property objects
//!
//! A [`PropertyObject`] is the mutable container holding values for the
//! properties drawn from its class chain plus instance-local properties.
//!
//! # Values
//!
//! Stored values are sparse: a property without an explicit value reads its
//! (possibly expression-bound) default. Writes run the full pipeline (see
//! [`PropertyObject::set_property_value`]); failures leave the stored value
//! untouched.
//!
//! # Locking
//!
//! Every object owns a reentrant lock. Public operations take it for their
//! whole duration, including expression evaluation and event dispatch, so a
//! handler may write back into the same object from the same thread. The
//! `_no_lock` variants are for callers already holding it (see
//! [`PropertyObject::lock`]). Internal state sits behind a separate
//! short-lived lock that is never held across user code.
//!
//! # Class properties
//!
//! Class properties are shared templates. Each object works with its own
//! bound copy (created on first access), so expression metadata resolves
//! against the right owner and object-typed defaults are per instance.
//!
//! # Example
//!
//! ```
//! use daq_coreobjects::{PropertyObject, Value};
//! use daq_coreobjects::property::PropertyBuilder;
//!
//! let obj = PropertyObject::new();
//! obj.add_property(PropertyBuilder::int("Level", 5).min_value(0).max_value(10).build()?)?;
//! obj.set_property_value("Level", 42)?;
//! assert_eq!(obj.property_value("Level")?, Value::Int(10));
//! # Ok::<(), daq_coreobjects::CoreObjectsError>(())
//! ```

mod access;
mod context;
mod path;
mod update;

pub use context::ObjectEvalContext;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use crate::config::CoreObjectsConfig;
use crate::error::{CoreObjectsError, CoreResult};
use crate::event::{EndUpdateEventArgs, Event, PropertyValueEventArgs};
use crate::permission::PermissionManager;
use crate::property::Property;
use crate::property_class::apply_property_order;
use crate::type_manager::TypeManager;
use crate::value::Value;

/// Write recorded while an update batch is open.
#[derive(Debug, Clone)]
pub(crate) enum PendingWrite {
    Set { value: Value, protected: bool },
    Clear { protected: bool },
}

/// Per-instance copy of a class property.
#[derive(Clone)]
struct BoundClassProperty {
    source: Property,
    bound: Property,
}

#[derive(Default)]
struct ObjectState {
    local: Vec<Property>,
    class_cache: HashMap<String, BoundClassProperty>,
    values: HashMap<String, Value>,
    order: Option<Vec<String>>,
    frozen: bool,
    update_depth: usize,
    pending: Vec<(String, PendingWrite)>,
    write_events: HashMap<String, Event<PropertyValueEventArgs>>,
    read_events: HashMap<String, Event<PropertyValueEventArgs>>,
    owner: Option<WeakPropertyObject>,
}

struct ObjectInner {
    sync: ReentrantMutex<()>,
    state: RwLock<ObjectState>,
    class_name: Option<String>,
    type_manager: Option<TypeManager>,
    config: Arc<CoreObjectsConfig>,
    permissions: PermissionManager,
    on_any_write: Event<PropertyValueEventArgs>,
    on_any_read: Event<PropertyValueEventArgs>,
    on_end_update: Event<EndUpdateEventArgs>,
}

/// Mutable, reflectable configuration object (shared handle).
///
/// `Clone` copies the handle; [`PropertyObject::deep_clone`] copies the
/// object.
#[derive(Clone)]
pub struct PropertyObject {
    inner: Arc<ObjectInner>,
}

/// Non-owning handle used for back-references (property → owner).
#[derive(Clone)]
pub struct WeakPropertyObject {
    inner: Weak<ObjectInner>,
}

impl WeakPropertyObject {
    /// The object, if it is still alive.
    pub fn upgrade(&self) -> Option<PropertyObject> {
        self.inner.upgrade().map(|inner| PropertyObject { inner })
    }
}

impl fmt::Debug for WeakPropertyObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakPropertyObject")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl fmt::Debug for PropertyObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("PropertyObject");
        s.field("class_name", &self.inner.class_name);
        if let Some(state) = self.inner.state.try_read() {
            s.field("local", &state.local.iter().map(Property::name).collect::<Vec<_>>())
                .field("values", &state.values.len())
                .field("frozen", &state.frozen);
        }
        s.finish()
    }
}

impl Default for PropertyObject {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertyObject {
    // =========================================================================
    // Construction
    // =========================================================================

    /// Classless object with the default configuration.
    pub fn new() -> Self {
        Self::build(None, None, CoreObjectsConfig::shared_default())
    }

    /// Classless object with an explicit configuration.
    pub fn with_config(config: CoreObjectsConfig) -> Self {
        Self::build(None, None, Arc::new(config))
    }

    /// Object bound to `class_name`; fails with `NotFound` if the manager
    /// has no such class.
    pub fn from_class(type_manager: &TypeManager, class_name: &str) -> CoreResult<Self> {
        type_manager.class(class_name)?;
        Ok(Self::build(
            Some(class_name.to_string()),
            Some(type_manager.clone()),
            type_manager.config(),
        ))
    }

    /// Classless object with access to the manager's struct and enumeration
    /// types.
    pub fn with_type_manager(type_manager: &TypeManager) -> Self {
        Self::build(None, Some(type_manager.clone()), type_manager.config())
    }

    fn build(
        class_name: Option<String>,
        type_manager: Option<TypeManager>,
        config: Arc<CoreObjectsConfig>,
    ) -> Self {
        Self {
            inner: Arc::new(ObjectInner {
                sync: ReentrantMutex::new(()),
                state: RwLock::new(ObjectState::default()),
                class_name,
                type_manager,
                config,
                permissions: PermissionManager::new(),
                on_any_write: Event::new(),
                on_any_read: Event::new(),
                on_end_update: Event::new(),
            }),
        }
    }

    // =========================================================================
    // Identity, locking, configuration
    // =========================================================================

    /// Non-owning handle to this object.
    pub fn downgrade(&self) -> WeakPropertyObject {
        WeakPropertyObject {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// True if both handles refer to the same object.
    pub fn ptr_eq(&self, other: &PropertyObject) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Acquire the object's reentrant lock. Required around `_no_lock` calls.
    pub fn lock(&self) -> ReentrantMutexGuard<'_, ()> {
        self.inner.sync.lock()
    }

    /// Name of the class this object was created from.
    pub fn class_name(&self) -> Option<&str> {
        self.inner.class_name.as_deref()
    }

    /// Type manager.
    pub fn type_manager(&self) -> Option<&TypeManager> {
        self.inner.type_manager.as_ref()
    }

    /// Configuration inherited from the type manager.
    pub fn config(&self) -> &CoreObjectsConfig {
        &self.inner.config
    }

    /// Permissions of this object, inherited from the owner when unset.
    pub fn permission_manager(&self) -> &PermissionManager {
        &self.inner.permissions
    }

    /// Expression context over this object, optionally binding `value`.
    pub fn eval_context(&self, proposed: Option<Value>) -> ObjectEvalContext<'_> {
        ObjectEvalContext::new(self, proposed)
    }

    fn guard_handlers(&self) -> bool {
        self.inner.config.guard_recursive_handlers
    }

    // =========================================================================
    // Ownership
    // =========================================================================

    /// Attach this object to a parent object; permissions inherit from it.
    pub fn set_owner(&self, owner: &PropertyObject) -> CoreResult<()> {
        let _guard = self.lock();
        self.ensure_not_frozen("set owner")?;
        self.inner.state.write().owner = Some(owner.downgrade());
        self.inner.permissions.set_parent(owner.permission_manager());
        Ok(())
    }

    /// Owning object, if attached and still alive.
    pub fn owner(&self) -> Option<PropertyObject> {
        self.inner
            .state
            .read()
            .owner
            .as_ref()
            .and_then(WeakPropertyObject::upgrade)
    }

    // =========================================================================
    // Structure
    // =========================================================================

    fn ensure_not_frozen(&self, operation: &str) -> CoreResult<()> {
        if self.inner.state.read().frozen {
            return Err(CoreObjectsError::Frozen(format!(
                "cannot {} on a frozen object",
                operation
            )));
        }
        Ok(())
    }

    /// Add an instance-local property. A property owned elsewhere is copied.
    /// Local properties override class properties of the same name.
    pub fn add_property(&self, property: Property) -> CoreResult<()> {
        let _guard = self.lock();
        self.ensure_not_frozen("add property")?;
        if self
            .inner
            .state
            .read()
            .local
            .iter()
            .any(|p| p.name() == property.name())
        {
            return Err(CoreObjectsError::AlreadyExists(format!(
                "property '{}'",
                property.name()
            )));
        }
        let bound = property.clone_with_owner(self)?;
        tracing::debug!(property = %bound.name(), class = ?self.class_name(), "Property added");
        self.inner.state.write().local.push(bound);
        Ok(())
    }

    /// Remove an instance-local property and its stored value. Class
    /// properties cannot be removed (`NotFound`).
    pub fn remove_property(&self, name: &str) -> CoreResult<()> {
        let _guard = self.lock();
        self.ensure_not_frozen("remove property")?;
        let mut state = self.inner.state.write();
        let pos = state
            .local
            .iter()
            .position(|p| p.name() == name)
            .ok_or_else(|| CoreObjectsError::NotFound(format!("local property '{}'", name)))?;
        state.local.remove(pos);
        state.values.remove(name);
        tracing::debug!(property = %name, "Property removed");
        Ok(())
    }

    /// True for local and class properties.
    pub fn has_property(&self, name: &str) -> bool {
        let _guard = self.lock();
        self.property_no_lock(name).is_ok()
    }

    /// Bound descriptor of a local or class property.
    pub fn property(&self, name: &str) -> CoreResult<Property> {
        let _guard = self.lock();
        self.property_no_lock(name)
    }

    /// Local property first, then the class chain.
    pub fn property_no_lock(&self, name: &str) -> CoreResult<Property> {
        let local = self
            .inner
            .state
            .read()
            .local
            .iter()
            .find(|p| p.name() == name)
            .cloned();
        if let Some(property) = local {
            return Ok(property);
        }
        if let (Some(manager), Some(class_name)) = (self.type_manager(), self.class_name()) {
            if let Some(source) = manager.class_property(class_name, name)? {
                return self.bind_class_property(source);
            }
        }
        Err(CoreObjectsError::NotFound(format!("property '{}'", name)))
    }

    fn bind_class_property(&self, source: Property) -> CoreResult<Property> {
        let cached = self.inner.state.read().class_cache.get(source.name()).cloned();
        if let Some(entry) = cached {
            if entry.source.ptr_eq(&source) {
                return Ok(entry.bound);
            }
        }
        let bound = source.clone_with_owner(self)?;
        self.inner.state.write().class_cache.insert(
            source.name().to_string(),
            BoundClassProperty {
                source,
                bound: bound.clone(),
            },
        );
        Ok(bound)
    }

    /// Class chain properties followed by local ones, in display order.
    pub fn all_properties(&self) -> CoreResult<Vec<Property>> {
        let _guard = self.lock();
        self.all_properties_no_lock()
    }

    /// Lock-free variant of [`all_properties`](Self::all_properties).
    pub fn all_properties_no_lock(&self) -> CoreResult<Vec<Property>> {
        let mut properties = Vec::new();
        if let (Some(manager), Some(class_name)) = (self.type_manager(), self.class_name()) {
            for source in manager.class_properties(class_name)? {
                properties.push(self.bind_class_property(source)?);
            }
        }
        let (local, order) = {
            let state = self.inner.state.read();
            (state.local.clone(), state.order.clone())
        };
        for property in local {
            match properties.iter().position(|p| p.name() == property.name()) {
                Some(pos) => properties[pos] = property,
                None => properties.push(property),
            }
        }
        Ok(match order {
            Some(order) => apply_property_order(properties, &order),
            None => properties,
        })
    }

    /// Properties whose visible flag resolves true. Targets of reference
    /// properties are hidden behind their alias.
    pub fn visible_properties(&self) -> CoreResult<Vec<Property>> {
        let _guard = self.lock();
        let mut visible = Vec::new();
        for property in self.all_properties_no_lock()? {
            if property.visible_no_lock()? {
                visible.push(property);
            }
        }
        Ok(visible)
    }

    /// Explicit display order; unnamed properties follow in natural order.
    pub fn set_property_order<I, S>(&self, order: I) -> CoreResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let _guard = self.lock();
        self.ensure_not_frozen("set property order")?;
        self.inner.state.write().order = Some(order.into_iter().map(Into::into).collect());
        Ok(())
    }

    /// Property order.
    pub fn property_order(&self) -> Option<Vec<String>> {
        self.inner.state.read().order.clone()
    }

    /// Instance-local properties in insertion order.
    pub fn local_properties(&self) -> Vec<Property> {
        self.inner.state.read().local.clone()
    }

    /// Explicitly stored values in property display order.
    pub(crate) fn explicit_values_no_lock(&self) -> CoreResult<Vec<(String, Value)>> {
        let values = self.inner.state.read().values.clone();
        let mut explicit = Vec::with_capacity(values.len());
        for property in self.all_properties_no_lock()? {
            if let Some(value) = values.get(property.name()) {
                explicit.push((property.name().to_string(), value.clone()));
            }
        }
        Ok(explicit)
    }

    /// True if some reference property's chain ends at or passes through `name`.
    pub(crate) fn is_property_referenced_no_lock(&self, name: &str) -> CoreResult<bool> {
        let limit = self.config().max_reference_depth;
        for property in self.all_properties_no_lock()? {
            if !property.is_reference() || property.name() == name {
                continue;
            }
            let mut current = property;
            for _ in 0..limit {
                // A dangling reference does not mark anything as referenced.
                match current.referenced_property_no_lock() {
                    Ok(Some(next)) if next.name() == name => return Ok(true),
                    Ok(Some(next)) => current = next,
                    _ => break,
                }
            }
        }
        Ok(false)
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Per-property write event. Aliases resolve to their target's event.
    pub fn on_property_value_write(&self, name: &str) -> CoreResult<Event<PropertyValueEventArgs>> {
        let _guard = self.lock();
        let target = self.property_no_lock(name)?.resolve_reference_chain_no_lock()?;
        Ok(self
            .inner
            .state
            .write()
            .write_events
            .entry(target.name().to_string())
            .or_default()
            .clone())
    }

    /// Per-property read event. Aliases resolve to their target's event.
    pub fn on_property_value_read(&self, name: &str) -> CoreResult<Event<PropertyValueEventArgs>> {
        let _guard = self.lock();
        let target = self.property_no_lock(name)?.resolve_reference_chain_no_lock()?;
        Ok(self
            .inner
            .state
            .write()
            .read_events
            .entry(target.name().to_string())
            .or_default()
            .clone())
    }

    /// Raised after every property write on this object.
    pub fn on_any_property_value_write(&self) -> &Event<PropertyValueEventArgs> {
        &self.inner.on_any_write
    }

    /// Raised after every property read on this object.
    pub fn on_any_property_value_read(&self) -> &Event<PropertyValueEventArgs> {
        &self.inner.on_any_read
    }

    /// Raised once when the outermost update batch commits.
    pub fn on_end_update(&self) -> &Event<EndUpdateEventArgs> {
        &self.inner.on_end_update
    }

    // =========================================================================
    // Freeze / clone
    // =========================================================================

    /// Make the object (and every child object it holds) immutable.
    pub fn freeze(&self) -> CoreResult<()> {
        let _guard = self.lock();
        if self.is_frozen() {
            return Ok(());
        }
        // Bind every class property so object defaults are frozen too.
        let properties = self.all_properties_no_lock()?;
        let children: Vec<PropertyObject> = {
            let mut state = self.inner.state.write();
            state.frozen = true;
            state
                .values
                .values()
                .filter_map(|v| v.as_object().cloned())
                .collect()
        };
        let defaults = properties.iter().filter_map(|p| match &p.fields().default_value {
            Some(Value::Object(child)) => Some(child.clone()),
            _ => None,
        });
        for child in children.into_iter().chain(defaults) {
            child.freeze()?;
        }
        tracing::debug!(class = ?self.class_name(), "Property object frozen");
        Ok(())
    }

    /// True if frozen.
    pub fn is_frozen(&self) -> bool {
        self.inner.state.read().frozen
    }

    /// Deep copy: local properties, bound class properties, stored values
    /// (object values cloned and frozen again), property order and the open
    /// update batch with its pending writes. The copy is unowned, not frozen
    /// and has no object level handlers.
    pub fn deep_clone(&self) -> PropertyObject {
        let _guard = self.lock();
        let copy = Self::build(
            self.inner.class_name.clone(),
            self.inner.type_manager.clone(),
            self.inner.config.clone(),
        );
        if let Some(permissions) = self.inner.permissions.local_permissions() {
            copy.inner.permissions.set_permissions(permissions);
        }
        let (local, cache, values, order, update_depth, pending) = {
            let state = self.inner.state.read();
            (
                state.local.clone(),
                state.class_cache.clone(),
                state.values.clone(),
                state.order.clone(),
                state.update_depth,
                state.pending.clone(),
            )
        };

        let local: Vec<Property> = local
            .iter()
            .map(|p| {
                let c = p.deep_clone();
                c.attach(&copy);
                c
            })
            .collect();
        let cache: HashMap<String, BoundClassProperty> = cache
            .into_iter()
            .map(|(name, entry)| {
                let bound = entry.bound.deep_clone();
                bound.attach(&copy);
                (
                    name,
                    BoundClassProperty {
                        source: entry.source,
                        bound,
                    },
                )
            })
            .collect();
        let values: HashMap<String, Value> = values
            .into_iter()
            .map(|(name, value)| {
                let value = match value {
                    Value::Object(obj) => Value::Object(obj.frozen_copy()),
                    other => other,
                };
                (name, value)
            })
            .collect();

        {
            let mut state = copy.inner.state.write();
            state.local = local;
            state.class_cache = cache;
            state.values = values;
            state.order = order;
            state.update_depth = update_depth;
            state.pending = pending;
        }
        copy
    }

    /// Deep copy that is frozen; used for object-typed values.
    pub(crate) fn frozen_copy(&self) -> PropertyObject {
        let copy = self.deep_clone();
        {
            let mut state = copy.inner.state.write();
            state.update_depth = 0;
            state.pending.clear();
        }
        if let Err(e) = copy.freeze() {
            tracing::warn!(error = %e, "Freezing copied object failed");
            copy.inner.state.write().frozen = true;
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::EvalValue;
    use crate::property::PropertyBuilder;
    use crate::property_class::PropertyClassBuilder;
    use crate::ErrorKind;

    fn names(properties: &[Property]) -> Vec<String> {
        properties.iter().map(|p| p.name().to_string()).collect()
    }

    fn manager() -> TypeManager {
        let manager = TypeManager::new();
        manager
            .add_type(
                PropertyClassBuilder::new("Channel")
                    .add_property(PropertyBuilder::float("Gain", 1.0).build().unwrap())
                    .add_property(PropertyBuilder::int("Offset", 0).build().unwrap())
                    .build()
                    .unwrap(),
            )
            .unwrap();
        manager
    }

    #[test]
    fn test_from_class_unknown_fails() {
        let err = PropertyObject::from_class(&TypeManager::new(), "Nope").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_local_overrides_class_in_place() {
        let manager = manager();
        let obj = PropertyObject::from_class(&manager, "Channel").unwrap();
        obj.add_property(PropertyBuilder::float("Gain", 5.0).build().unwrap())
            .unwrap();
        obj.add_property(PropertyBuilder::string("Label", "ai0").build().unwrap())
            .unwrap();
        let all = obj.all_properties().unwrap();
        assert_eq!(names(&all), vec!["Gain", "Offset", "Label"]);
        assert_eq!(obj.property_value("Gain").unwrap(), Value::Float(5.0));
    }

    #[test]
    fn test_class_property_binding_is_stable_per_instance() {
        let manager = manager();
        let a = PropertyObject::from_class(&manager, "Channel").unwrap();
        let b = PropertyObject::from_class(&manager, "Channel").unwrap();
        let pa = a.property("Gain").unwrap();
        assert!(pa.ptr_eq(&a.property("Gain").unwrap()));
        assert!(pa.owner().unwrap().ptr_eq(&a));
        assert!(!pa.ptr_eq(&b.property("Gain").unwrap()));
    }

    #[test]
    fn test_add_duplicate_and_remove() {
        let obj = PropertyObject::new();
        obj.add_property(PropertyBuilder::int("A", 1).build().unwrap())
            .unwrap();
        assert_eq!(
            obj.add_property(PropertyBuilder::int("A", 2).build().unwrap())
                .unwrap_err()
                .kind(),
            ErrorKind::AlreadyExists
        );
        obj.remove_property("A").unwrap();
        assert!(!obj.has_property("A"));
        assert_eq!(obj.remove_property("A").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_class_property_cannot_be_removed() {
        let obj = PropertyObject::from_class(&manager(), "Channel").unwrap();
        assert_eq!(
            obj.remove_property("Gain").unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_property_order() {
        let obj = PropertyObject::from_class(&manager(), "Channel").unwrap();
        obj.add_property(PropertyBuilder::string("Label", "x").build().unwrap())
            .unwrap();
        obj.set_property_order(["Label", "Offset"]).unwrap();
        assert_eq!(
            names(&obj.all_properties().unwrap()),
            vec!["Label", "Offset", "Gain"]
        );
    }

    #[test]
    fn test_visible_properties_hide_reference_targets() {
        let obj = PropertyObject::new();
        obj.add_property(PropertyBuilder::int("Target", 1).build().unwrap())
            .unwrap();
        obj.add_property(PropertyBuilder::int("Hidden", 1).visible(false).build().unwrap())
            .unwrap();
        obj.add_property(
            PropertyBuilder::reference("Alias", EvalValue::new("%Target"))
                .build()
                .unwrap(),
        )
        .unwrap();
        assert_eq!(names(&obj.visible_properties().unwrap()), vec!["Alias"]);
        assert!(obj.property("Target").unwrap().is_referenced().unwrap());
        assert!(!obj.property("Alias").unwrap().is_referenced().unwrap());
    }

    #[test]
    fn test_freeze_blocks_mutation() {
        let obj = PropertyObject::new();
        obj.add_property(PropertyBuilder::int("A", 1).build().unwrap())
            .unwrap();
        obj.freeze().unwrap();
        assert!(obj.is_frozen());
        let frozen = |r: CoreResult<()>| assert_eq!(r.unwrap_err().kind(), ErrorKind::Frozen);
        frozen(obj.set_property_value("A", 2));
        frozen(obj.clear_property_value("A"));
        frozen(obj.add_property(PropertyBuilder::int("B", 1).build().unwrap()));
        frozen(obj.set_owner(&PropertyObject::new()));
        assert_eq!(obj.property_value("A").unwrap(), Value::Int(1));
    }

    #[test]
    fn test_freeze_is_recursive() {
        let child = PropertyObject::new();
        child
            .add_property(PropertyBuilder::int("X", 1).build().unwrap())
            .unwrap();
        let parent = PropertyObject::new();
        parent
            .add_property(PropertyBuilder::object("Child", child).build().unwrap())
            .unwrap();
        parent.freeze().unwrap();
        let stored = parent.property_value("Child").unwrap();
        assert!(stored.as_object().unwrap().is_frozen());
    }

    #[test]
    fn test_deep_clone_is_independent() {
        let obj = PropertyObject::from_class(&manager(), "Channel").unwrap();
        obj.set_property_value("Gain", 2.0).unwrap();
        let copy = obj.deep_clone();
        assert!(!copy.ptr_eq(&obj));
        assert_eq!(copy.property_value("Gain").unwrap(), Value::Float(2.0));
        copy.set_property_value("Gain", 3.0).unwrap();
        assert_eq!(obj.property_value("Gain").unwrap(), Value::Float(2.0));
        assert!(copy.property("Gain").unwrap().owner().unwrap().ptr_eq(&copy));
        assert!(copy.owner().is_none());
    }

    #[test]
    fn test_clone_mid_batch_commits_on_its_own() {
        let obj = PropertyObject::from_class(&manager(), "Channel").unwrap();
        obj.begin_update().unwrap();
        obj.set_property_value("Gain", 5.0).unwrap();
        let copy = obj.deep_clone();
        assert_eq!(copy.update_depth(), 1);
        assert_eq!(copy.property_value("Gain").unwrap(), Value::Float(1.0));

        copy.end_update().unwrap();
        assert_eq!(copy.property_value("Gain").unwrap(), Value::Float(5.0));
        assert!(obj.is_updating());
        assert_eq!(obj.property_value("Gain").unwrap(), Value::Float(1.0));

        obj.end_update().unwrap();
        assert_eq!(obj.property_value("Gain").unwrap(), Value::Float(5.0));
    }

    #[test]
    fn test_set_owner_links_permissions() {
        use crate::permission::{Permission, Permissions};
        let parent = PropertyObject::new();
        let child = PropertyObject::new();
        child.set_owner(&parent).unwrap();
        assert!(child.owner().unwrap().ptr_eq(&parent));
        parent
            .permission_manager()
            .set_permissions(Permissions::read_only());
        assert!(!child.permission_manager().is_allowed(Permission::Write));
    }
}
