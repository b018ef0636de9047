//! Property descriptors
//!
//! A [`Property`] describes one configuration slot of a [`PropertyObject`]:
//! its name, value type, default value, constraints (min/max, selection and
//! suggested values), behavioural hooks (coercer, validator, callable
//! signature) and the events raised when its value is read or written.
//!
//! # Ownership
//!
//! A property is owned by at most one object, referenced weakly so the
//! descriptor never keeps its owner alive. Attaching an owned property to a
//! different object requires a copy: [`Property::clone_with_owner`] returns the
//! property itself when the owner matches and a fresh deep copy otherwise;
//! [`Property::set_owner`] on an owned property fails with `AlreadyExists`.
//!
//! # Expressions and references
//!
//! Metadata slots hold [`Value`]s, so any slot may be an
//! [`EvalValue`](crate::eval::EvalValue) resolved against the owner when read.
//! A reference property (built with [`PropertyBuilder::reference`]) is a pure
//! alias; getters on it follow the reference chain to the final target
//! before reading metadata.
//!
//! Every getter comes in a locking form, which holds the owner's lock while
//! resolving, and a `_no_lock` form for callers already inside the owner's
//! locked scope.

mod builder;
mod callable;
mod validate;

pub use builder::PropertyBuilder;
pub use callable::{ArgumentInfo, CallableInfo};
pub(crate) use callable::core_type_code;

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

use crate::error::{CoreObjectsError, CoreResult};
use crate::eval::{EvalContext, EvalValue, MapContext};
use crate::event::{Event, PropertyEventType, PropertyValueEventArgs};
use crate::object::{PropertyObject, WeakPropertyObject};
use crate::value::{CoreType, Unit, Value};

// =============================================================================
// Coercer / Validator
// =============================================================================

fn context_for<'a>(
    owner: Option<&'a PropertyObject>,
    proposed: &Value,
) -> Box<dyn EvalContext + 'a> {
    match owner {
        Some(owner) => Box::new(owner.eval_context(Some(proposed.clone()))),
        None => Box::new(MapContext::new().with_proposed(proposed.clone())),
    }
}

/// Expression transforming a proposed value, e.g. `"if(value > 10, 10, value)"`.
#[derive(Debug, Clone)]
pub struct Coercer(EvalValue);

impl Coercer {
    /// Coercer from an expression over `value`.
    pub fn new(expression: impl AsRef<str>) -> Self {
        Self(EvalValue::new(expression))
    }

    /// Underlying expression.
    pub fn eval(&self) -> &EvalValue {
        &self.0
    }

    /// Coerce `value`; the caller holds the owner's lock.
    pub fn coerce(&self, owner: Option<&PropertyObject>, value: &Value) -> CoreResult<Value> {
        let ctx = context_for(owner, value);
        self.0.evaluate_with(ctx.as_ref()).map_err(|e| {
            CoreObjectsError::CoerceFailed(format!("'{}': {}", self.0.expression(), e))
        })
    }
}

/// Expression that must evaluate truthy for a proposed value, e.g. `"value > 5"`.
#[derive(Debug, Clone)]
pub struct Validator(EvalValue);

impl Validator {
    /// Validator from a boolean expression over `value`.
    pub fn new(expression: impl AsRef<str>) -> Self {
        Self(EvalValue::new(expression))
    }

    /// Underlying expression.
    pub fn eval(&self) -> &EvalValue {
        &self.0
    }

    /// Check `value`; the caller holds the owner's lock.
    pub fn validate(&self, owner: Option<&PropertyObject>, value: &Value) -> CoreResult<()> {
        let ctx = context_for(owner, value);
        let verdict = self.0.evaluate_with(ctx.as_ref()).map_err(|e| {
            CoreObjectsError::ValidateFailed(format!("'{}': {}", self.0.expression(), e))
        })?;
        if verdict.is_truthy() {
            Ok(())
        } else {
            Err(CoreObjectsError::ValidateFailed(format!(
                "value {} rejected by '{}'",
                value,
                self.0.expression()
            )))
        }
    }
}

// =============================================================================
// Property
// =============================================================================

/// Raw descriptor fields, as given to the builder.
#[derive(Debug, Clone)]
pub(crate) struct PropertyFields {
    /// Name.
    pub name: String,
    /// Value type.
    pub value_type: CoreType,
    /// Item type.
    pub item_type: CoreType,
    /// Key type.
    pub key_type: CoreType,
    /// Description.
    pub description: Option<Value>,
    /// Unit.
    pub unit: Option<Value>,
    /// Min value.
    pub min_value: Option<Value>,
    /// Max value.
    pub max_value: Option<Value>,
    /// Unresolved default; object defaults are the instance child.
    pub default_value: Option<Value>,
    /// Visible.
    pub visible: Option<Value>,
    /// Read only.
    pub read_only: Option<Value>,
    /// Selection values.
    pub selection_values: Option<Value>,
    /// Suggested values.
    pub suggested_values: Option<Value>,
    /// Target expression of a reference property.
    pub referenced_property: Option<EvalValue>,
    /// Coercer.
    pub coercer: Option<Coercer>,
    /// Validator.
    pub validator: Option<Validator>,
    /// Callable info.
    pub callable_info: Option<CallableInfo>,
}

impl PropertyFields {
    fn new(name: String, value_type: CoreType) -> Self {
        Self {
            name,
            value_type,
            item_type: CoreType::Undefined,
            key_type: CoreType::Undefined,
            description: None,
            unit: None,
            min_value: None,
            max_value: None,
            default_value: None,
            visible: None,
            read_only: None,
            selection_values: None,
            suggested_values: None,
            referenced_property: None,
            coercer: None,
            validator: None,
            callable_info: None,
        }
    }
}

struct PropertyInner {
    fields: PropertyFields,
    owner: RwLock<Option<WeakPropertyObject>>,
    on_write: Event<PropertyValueEventArgs>,
    on_read: Event<PropertyValueEventArgs>,
    on_selection_values_read: Event<PropertyValueEventArgs>,
    on_suggested_values_read: Event<PropertyValueEventArgs>,
}

/// Validated, immutable property descriptor (shared handle).
///
/// `Clone` copies the handle; use [`Property::deep_clone`] for an independent
/// copy.
#[derive(Clone)]
pub struct Property {
    inner: Arc<PropertyInner>,
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.inner.fields.name)
            .field("value_type", &self.inner.fields.value_type)
            .field("reference", &self.is_reference())
            .field("owned", &self.owner().is_some())
            .finish()
    }
}

impl Property {
    fn from_fields(fields: PropertyFields) -> Self {
        Self::with_events(
            fields,
            Event::new(),
            Event::new(),
            Event::new(),
            Event::new(),
        )
    }

    fn with_events(
        fields: PropertyFields,
        on_write: Event<PropertyValueEventArgs>,
        on_read: Event<PropertyValueEventArgs>,
        on_selection_values_read: Event<PropertyValueEventArgs>,
        on_suggested_values_read: Event<PropertyValueEventArgs>,
    ) -> Self {
        Self {
            inner: Arc::new(PropertyInner {
                fields,
                owner: RwLock::new(None),
                on_write,
                on_read,
                on_selection_values_read,
                on_suggested_values_read,
            }),
        }
    }

    pub(crate) fn fields(&self) -> &PropertyFields {
        &self.inner.fields
    }

    /// Name.
    pub fn name(&self) -> &str {
        &self.inner.fields.name
    }

    /// True if both handles refer to the same descriptor instance.
    pub fn ptr_eq(&self, other: &Property) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// True if this property is an alias of another property.
    pub fn is_reference(&self) -> bool {
        self.inner.fields.referenced_property.is_some()
    }

    // -------------------------------------------------------------------------
    // Ownership
    // -------------------------------------------------------------------------

    /// The owning object, if attached and still alive.
    pub fn owner(&self) -> Option<PropertyObject> {
        self.inner
            .owner
            .read()
            .as_ref()
            .and_then(WeakPropertyObject::upgrade)
    }

    /// Attach to `owner`. Fails with `AlreadyExists` if already owned.
    ///
    /// When the default value is an object, its permission manager is parented
    /// to the owner's.
    pub fn set_owner(&self, owner: &PropertyObject) -> CoreResult<()> {
        {
            let mut slot = self.inner.owner.write();
            if slot.as_ref().and_then(WeakPropertyObject::upgrade).is_some() {
                return Err(CoreObjectsError::AlreadyExists(format!(
                    "property '{}' already has an owner",
                    self.name()
                )));
            }
            *slot = Some(owner.downgrade());
        }
        self.link_default_child(owner);
        Ok(())
    }

    /// Set the owner without the single-ownership check (fresh copies only).
    pub(crate) fn attach(&self, owner: &PropertyObject) {
        *self.inner.owner.write() = Some(owner.downgrade());
        self.link_default_child(owner);
    }

    fn link_default_child(&self, owner: &PropertyObject) {
        if let Some(Value::Object(child)) = &self.inner.fields.default_value {
            child
                .permission_manager()
                .set_parent(owner.permission_manager());
        }
    }

    /// Unowned deep copy. Object defaults are deep-cloned; handlers are
    /// carried over to fresh events.
    pub fn deep_clone(&self) -> Property {
        let mut fields = self.inner.fields.clone();
        if let Some(Value::Object(obj)) = &fields.default_value {
            fields.default_value = Some(Value::Object(obj.deep_clone()));
        }
        Self::with_events(
            fields,
            self.inner.on_write.duplicate(),
            self.inner.on_read.duplicate(),
            self.inner.on_selection_values_read.duplicate(),
            self.inner.on_suggested_values_read.duplicate(),
        )
    }

    /// `self` if already owned by `owner`, otherwise a deep copy attached to it.
    pub fn clone_with_owner(&self, owner: &PropertyObject) -> CoreResult<Property> {
        if self.owner().is_some_and(|current| current.ptr_eq(owner)) {
            return Ok(self.clone());
        }
        let copy = self.deep_clone();
        copy.set_owner(owner)?;
        Ok(copy)
    }

    /// Run `f` while holding the owner's lock (if any).
    fn locked<T>(&self, f: impl FnOnce(&Self) -> CoreResult<T>) -> CoreResult<T> {
        match self.owner() {
            Some(owner) => {
                let _guard = owner.lock();
                f(self)
            }
            None => f(self),
        }
    }

    // -------------------------------------------------------------------------
    // Reference resolution
    // -------------------------------------------------------------------------

    /// One hop: the property this alias points at (`None` if not a reference
    /// or not attached).
    pub fn referenced_property(&self) -> CoreResult<Option<Property>> {
        self.locked(Self::referenced_property_no_lock)
    }

    /// Lock-free variant of [`referenced_property`](Self::referenced_property).
    pub fn referenced_property_no_lock(&self) -> CoreResult<Option<Property>> {
        let Some(reference) = &self.inner.fields.referenced_property else {
            return Ok(None);
        };
        let Some(owner) = self.owner() else {
            return Ok(None);
        };
        reference
            .bind(&owner)
            .resolve_property_no_lock()
            .map(Some)
    }

    /// Follow the reference chain to its final, non-reference target.
    /// Returns `self` for ordinary properties.
    pub fn resolve_reference_chain_no_lock(&self) -> CoreResult<Property> {
        let limit = self
            .owner()
            .map(|o| o.config().max_reference_depth)
            .unwrap_or_else(|| crate::config::CoreObjectsConfig::default().max_reference_depth);
        let mut current = self.clone();
        for _ in 0..=limit {
            match current.referenced_property_no_lock()? {
                Some(next) => current = next,
                None => return Ok(current),
            }
        }
        Err(CoreObjectsError::InvalidState(format!(
            "reference chain of '{}' exceeds {} hops",
            self.name(),
            limit
        )))
    }

    /// Follow references to the final target; a plain property resolves to itself.
    pub fn resolve_reference_chain(&self) -> CoreResult<Property> {
        self.locked(Self::resolve_reference_chain_no_lock)
    }

    /// True if some reference property of the owner resolves (directly or
    /// transitively) to this property.
    pub fn is_referenced(&self) -> CoreResult<bool> {
        self.locked(Self::is_referenced_no_lock)
    }

    /// Lock-free variant of [`is_referenced`](Self::is_referenced).
    pub fn is_referenced_no_lock(&self) -> CoreResult<bool> {
        match self.owner() {
            Some(owner) => owner.is_property_referenced_no_lock(self.name()),
            None => Ok(false),
        }
    }

    // -------------------------------------------------------------------------
    // Metadata getters
    // -------------------------------------------------------------------------

    /// Resolve an expression-bound slot against the owner.
    fn resolve_slot(&self, raw: &Option<Value>) -> CoreResult<Option<Value>> {
        match raw {
            Some(Value::Eval(eval)) => {
                let value = match self.owner() {
                    Some(owner) => eval.bind(&owner).result_no_lock()?,
                    None => eval.evaluate_with(&MapContext::new())?,
                };
                Ok(Some(value))
            }
            other => Ok(other.clone()),
        }
    }

    /// Read a slot of the final reference target.
    fn target_slot(&self, slot: fn(&PropertyFields) -> &Option<Value>) -> CoreResult<Option<Value>> {
        let target = self.resolve_reference_chain_no_lock()?;
        target.resolve_slot(slot(&target.inner.fields))
    }

    /// Declared type; for a reference, the type of its target.
    pub fn value_type(&self) -> CoreResult<CoreType> {
        self.locked(Self::value_type_no_lock)
    }

    /// Lock-free variant of [`value_type`](Self::value_type).
    pub fn value_type_no_lock(&self) -> CoreResult<CoreType> {
        Ok(self.resolve_reference_chain_no_lock()?.inner.fields.value_type)
    }

    /// Element type of List/Dict properties.
    pub fn item_type(&self) -> CoreResult<CoreType> {
        self.locked(|p| Ok(p.resolve_reference_chain_no_lock()?.inner.fields.item_type))
    }

    /// Key type.
    pub fn key_type(&self) -> CoreResult<CoreType> {
        self.locked(|p| Ok(p.resolve_reference_chain_no_lock()?.inner.fields.key_type))
    }

    /// Description, evaluated against the owner.
    pub fn description(&self) -> CoreResult<Option<String>> {
        self.locked(Self::description_no_lock)
    }

    /// Lock-free variant of [`description`](Self::description).
    pub fn description_no_lock(&self) -> CoreResult<Option<String>> {
        Ok(self
            .target_slot(|f| &f.description)?
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string())))
    }

    /// Unit.
    pub fn unit(&self) -> CoreResult<Option<Unit>> {
        self.locked(Self::unit_no_lock)
    }

    /// Lock-free variant of [`unit`](Self::unit).
    pub fn unit_no_lock(&self) -> CoreResult<Option<Unit>> {
        self.target_slot(|f| &f.unit)?
            .map(|v| Unit::from_value(&v))
            .transpose()
    }

    /// Evaluated lower bound.
    pub fn min_value(&self) -> CoreResult<Option<Value>> {
        self.locked(Self::min_value_no_lock)
    }

    /// Lock-free variant of [`min_value`](Self::min_value).
    pub fn min_value_no_lock(&self) -> CoreResult<Option<Value>> {
        self.target_slot(|f| &f.min_value)
    }

    /// Evaluated upper bound.
    pub fn max_value(&self) -> CoreResult<Option<Value>> {
        self.locked(Self::max_value_no_lock)
    }

    /// Lock-free variant of [`max_value`](Self::max_value).
    pub fn max_value_no_lock(&self) -> CoreResult<Option<Value>> {
        self.target_slot(|f| &f.max_value)
    }

    /// Default converted to the value type.
    pub fn default_value(&self) -> CoreResult<Option<Value>> {
        self.locked(Self::default_value_no_lock)
    }

    /// Default value converted to the declared type.
    pub fn default_value_no_lock(&self) -> CoreResult<Option<Value>> {
        let target = self.resolve_reference_chain_no_lock()?;
        let ty = target.inner.fields.value_type;
        match target.resolve_slot(&target.inner.fields.default_value)? {
            Some(value) if ty != CoreType::Object && !ty.is_container() => {
                Ok(Some(value.convert_to(ty)?))
            }
            other => Ok(other),
        }
    }

    /// Visible flag of this property (not of its reference target). A
    /// property that is the target of a reference is never visible; the alias
    /// represents it.
    pub fn visible(&self) -> CoreResult<bool> {
        self.locked(Self::visible_no_lock)
    }

    /// Lock-free variant of [`visible`](Self::visible).
    pub fn visible_no_lock(&self) -> CoreResult<bool> {
        let visible = self
            .resolve_slot(&self.inner.fields.visible)?
            .map_or(true, |v| v.is_truthy());
        Ok(visible && !self.is_referenced_no_lock()?)
    }

    /// Required only field.
    pub fn read_only(&self) -> CoreResult<bool> {
        self.locked(Self::read_only_no_lock)
    }

    /// Lock-free variant of [`read_only`](Self::read_only).
    pub fn read_only_no_lock(&self) -> CoreResult<bool> {
        Ok(self
            .target_slot(|f| &f.read_only)?
            .is_some_and(|v| v.is_truthy()))
    }

    /// Selection values; dispatches `on_selection_values_read` when attached.
    pub fn selection_values(&self) -> CoreResult<Option<Value>> {
        self.locked(Self::selection_values_no_lock)
    }

    /// Lock-free variant of [`selection_values`](Self::selection_values).
    pub fn selection_values_no_lock(&self) -> CoreResult<Option<Value>> {
        let values = self.target_slot(|f| &f.selection_values)?;
        self.dispatch_list_read(&self.inner.on_selection_values_read, values)
    }

    /// Suggested values; dispatches `on_suggested_values_read` when attached.
    pub fn suggested_values(&self) -> CoreResult<Option<Value>> {
        self.locked(Self::suggested_values_no_lock)
    }

    /// Lock-free variant of [`suggested_values`](Self::suggested_values).
    pub fn suggested_values_no_lock(&self) -> CoreResult<Option<Value>> {
        let values = self.target_slot(|f| &f.suggested_values)?;
        self.dispatch_list_read(&self.inner.on_suggested_values_read, values)
    }

    fn dispatch_list_read(
        &self,
        event: &Event<PropertyValueEventArgs>,
        values: Option<Value>,
    ) -> CoreResult<Option<Value>> {
        let (Some(values), Some(owner)) = (values.clone(), self.owner()) else {
            return Ok(values);
        };
        if !event.has_subscribers() {
            return Ok(Some(values));
        }
        let mut args =
            PropertyValueEventArgs::new(self.clone(), values, PropertyEventType::Read, false);
        event.trigger_with(&owner, &mut args, owner.config().guard_recursive_handlers)?;
        Ok(Some(args.into_value()))
    }

    /// Coercer.
    pub fn coercer(&self) -> CoreResult<Option<Coercer>> {
        self.locked(Self::coercer_no_lock)
    }

    /// Lock-free variant of [`coercer`](Self::coercer).
    pub fn coercer_no_lock(&self) -> CoreResult<Option<Coercer>> {
        Ok(self.resolve_reference_chain_no_lock()?.inner.fields.coercer.clone())
    }

    /// Validator.
    pub fn validator(&self) -> CoreResult<Option<Validator>> {
        self.locked(Self::validator_no_lock)
    }

    /// Lock-free variant of [`validator`](Self::validator).
    pub fn validator_no_lock(&self) -> CoreResult<Option<Validator>> {
        Ok(self.resolve_reference_chain_no_lock()?.inner.fields.validator.clone())
    }

    /// Callable info.
    pub fn callable_info(&self) -> CoreResult<Option<CallableInfo>> {
        self.locked(Self::callable_info_no_lock)
    }

    /// Lock-free variant of [`callable_info`](Self::callable_info).
    pub fn callable_info_no_lock(&self) -> CoreResult<Option<CallableInfo>> {
        Ok(self
            .resolve_reference_chain_no_lock()?
            .inner
            .fields
            .callable_info
            .clone())
    }

    // -------------------------------------------------------------------------
    // Value access through the owner
    // -------------------------------------------------------------------------

    fn require_owner(&self) -> CoreResult<PropertyObject> {
        self.owner().ok_or_else(|| {
            CoreObjectsError::NoOwner(format!("property '{}' is not attached", self.name()))
        })
    }

    /// Current value in the owning object.
    pub fn value(&self) -> CoreResult<Value> {
        self.require_owner()?.property_value(self.name())
    }

    /// Write through the owning object's public write path.
    pub fn set_value(&self, value: impl Into<Value>) -> CoreResult<()> {
        self.require_owner()?
            .set_property_value(self.name(), value.into())
    }

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    /// Raised after a value is written to this property.
    pub fn on_property_value_write(&self) -> &Event<PropertyValueEventArgs> {
        &self.inner.on_write
    }

    /// Raised when this property's value is read; handlers may override it.
    pub fn on_property_value_read(&self) -> &Event<PropertyValueEventArgs> {
        &self.inner.on_read
    }

    /// Raised when selection values are read.
    pub fn on_selection_values_read(&self) -> &Event<PropertyValueEventArgs> {
        &self.inner.on_selection_values_read
    }

    /// Raised when suggested values are read.
    pub fn on_suggested_values_read(&self) -> &Event<PropertyValueEventArgs> {
        &self.inner.on_suggested_values_read
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_set_owner_single_ownership() {
        let a = PropertyObject::new();
        let b = PropertyObject::new();
        let p = PropertyBuilder::int("Count", 1).build().unwrap();
        p.set_owner(&a).unwrap();
        assert!(p.owner().unwrap().ptr_eq(&a));
        let err = p.set_owner(&b).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_concurrent_set_owner_admits_one() {
        use std::sync::Barrier;
        let owners: Vec<PropertyObject> = (0..8).map(|_| PropertyObject::new()).collect();
        let p = PropertyBuilder::int("Count", 1).build().unwrap();
        let barrier = Barrier::new(owners.len());
        let accepted = std::thread::scope(|scope| {
            let handles: Vec<_> = owners
                .iter()
                .map(|owner| {
                    let (p, barrier) = (&p, &barrier);
                    scope.spawn(move || {
                        barrier.wait();
                        p.set_owner(owner).is_ok()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|ok| *ok)
                .count()
        });
        assert_eq!(accepted, 1);
        assert!(owners.iter().any(|o| p.owner().unwrap().ptr_eq(o)));
    }

    #[test]
    fn test_clone_with_owner_identity() {
        let a = PropertyObject::new();
        let b = PropertyObject::new();
        let p = PropertyBuilder::int("Count", 1).build().unwrap();
        let bound = p.clone_with_owner(&a).unwrap();
        assert!(!bound.ptr_eq(&p));
        assert!(bound.clone_with_owner(&a).unwrap().ptr_eq(&bound));
        let moved = bound.clone_with_owner(&b).unwrap();
        assert!(!moved.ptr_eq(&bound));
        assert!(moved.owner().unwrap().ptr_eq(&b));
    }

    #[test]
    fn test_deep_clone_copies_object_default() {
        let child = PropertyObject::new();
        let p = PropertyBuilder::object("Child", child.clone()).build().unwrap();
        let copy = p.deep_clone();
        let Some(Value::Object(copied)) = copy.default_value().unwrap() else {
            panic!("object default expected");
        };
        assert!(!copied.ptr_eq(&child));
    }

    #[test]
    fn test_unowned_value_access_fails() {
        let p = PropertyBuilder::int("Count", 1).build().unwrap();
        assert_eq!(p.value().unwrap_err().kind(), ErrorKind::NoOwner);
        assert_eq!(p.set_value(2).unwrap_err().kind(), ErrorKind::NoOwner);
    }

    #[test]
    fn test_expression_metadata_resolves_against_owner() {
        let obj = PropertyObject::new();
        obj.add_property(PropertyBuilder::float("Limit", 20.0).build().unwrap())
            .unwrap();
        obj.add_property(
            PropertyBuilder::float("Level", 1.0)
                .max_value(EvalValue::new("$Limit / 2"))
                .build()
                .unwrap(),
        )
        .unwrap();
        let level = obj.property("Level").unwrap();
        assert_eq!(level.max_value().unwrap(), Some(Value::Float(10.0)));
        obj.set_property_value("Limit", 8.0).unwrap();
        assert_eq!(level.max_value().unwrap(), Some(Value::Float(4.0)));
    }

    #[test]
    fn test_unowned_constant_expression() {
        let p = PropertyBuilder::int("Count", EvalValue::new("2 * 3")).build().unwrap();
        assert_eq!(p.default_value().unwrap(), Some(Value::Int(6)));
    }

    #[test]
    fn test_coercer_and_validator() {
        let coercer = Coercer::new("if(value > 10, 10, value)");
        assert_eq!(coercer.coerce(None, &Value::Int(42)).unwrap(), Value::Int(10));
        let validator = Validator::new("value > 5");
        assert!(validator.validate(None, &Value::Int(6)).is_ok());
        assert_eq!(
            validator.validate(None, &Value::Int(5)).unwrap_err().kind(),
            ErrorKind::ValidateFailed
        );
        assert_eq!(
            Coercer::new("value +").coerce(None, &Value::Int(1)).unwrap_err().kind(),
            ErrorKind::CoerceFailed
        );
    }
}
