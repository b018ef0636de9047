//! Value read/write/clear pipelines, path addressing and callable invocation.

use super::path::{parse_indexed, split_first};
use super::{PendingWrite, PropertyObject};
use crate::error::{CoreObjectsError, CoreResult};
use crate::event::{Event, PropertyEventType, PropertyValueEventArgs};
use crate::permission::Permission;
use crate::property::Property;
use crate::value::{CoreType, Value};

impl PropertyObject {
    // =========================================================================
    // Reads
    // =========================================================================

    /// Effective value at `path` (`Name`, `Child.Name`, `List[2]`).
    ///
    /// Unset properties read their default. Inside an update batch the
    /// pre-batch value is returned. Read handlers may override the result.
    pub fn property_value(&self, path: &str) -> CoreResult<Value> {
        let _guard = self.lock();
        self.property_value_no_lock(path)
    }

    /// [`property_value`](Self::property_value) for callers already holding the lock.
    pub fn property_value_no_lock(&self, path: &str) -> CoreResult<Value> {
        if !self.permission_manager().is_allowed(Permission::Read) {
            return Err(CoreObjectsError::AccessDenied(format!(
                "read access to '{}' is not permitted",
                path
            )));
        }
        self.read_value(path, self.config().fire_read_events)
    }

    pub(crate) fn read_value(&self, path: &str, fire_events: bool) -> CoreResult<Value> {
        let (head, rest) = split_first(path);
        if let Some(rest) = rest {
            let child = self.child_object(head)?;
            return if fire_events {
                child.property_value(rest)
            } else {
                let _child_guard = child.lock();
                child.read_value(rest, false)
            };
        }

        let (name, index) = parse_indexed(head)?;
        let target = self.property_no_lock(name)?.resolve_reference_chain_no_lock()?;
        let mut value = self.effective_value(&target)?;
        if fire_events {
            value = self.dispatch_read(&target, value)?;
        }
        tracing::trace!(property = %target.name(), "Property value read");

        match index {
            None => Ok(value),
            Some(index) => index_list(&value, name, index),
        }
    }

    /// Stored value or resolved default of a (non-reference) property.
    pub(crate) fn effective_value(&self, target: &Property) -> CoreResult<Value> {
        let stored = self.inner.state.read().values.get(target.name()).cloned();
        match stored {
            Some(Value::Eval(eval)) => {
                let ty = target.value_type_no_lock()?;
                eval.evaluate_as(&self.eval_context(None), ty)
            }
            Some(value) => Ok(value),
            None => Ok(target.default_value_no_lock()?.unwrap_or_default()),
        }
    }

    fn child_object(&self, name: &str) -> CoreResult<PropertyObject> {
        match self.read_value(name, false)? {
            Value::Object(child) => Ok(child),
            other => Err(CoreObjectsError::InvalidParameter(format!(
                "'{}' holds a {} value, not an object",
                name,
                other.core_type()
            ))),
        }
    }

    /// Value mapped through the property's selection values (list index or
    /// dictionary key).
    pub fn property_selection_value(&self, path: &str) -> CoreResult<Value> {
        let _guard = self.lock();
        self.property_selection_value_no_lock(path)
    }

    /// Lock-free variant of [`property_selection_value`](Self::property_selection_value).
    pub fn property_selection_value_no_lock(&self, path: &str) -> CoreResult<Value> {
        self.selection_value(path, self.config().fire_read_events)
    }

    pub(crate) fn selection_value(&self, path: &str, fire_events: bool) -> CoreResult<Value> {
        let (head, rest) = split_first(path);
        if let Some(rest) = rest {
            let child = self.child_object(head)?;
            let _child_guard = child.lock();
            return child.selection_value(rest, fire_events);
        }
        let key = self.read_value(head, fire_events)?;
        let target = self.property_no_lock(head)?.resolve_reference_chain_no_lock()?;
        let selection = target.selection_values_no_lock()?.ok_or_else(|| {
            CoreObjectsError::InvalidParameter(format!(
                "property '{}' has no selection values",
                target.name()
            ))
        })?;
        lookup_selection(&selection, &key, target.name())
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Write `value` at `path` through the public path.
    ///
    /// Pipeline: frozen check, reference resolution, read-only/permission
    /// check, batching, coercer, validator, type conversion, selection key
    /// check, min/max clamping, object copy-and-freeze. A value equal to the
    /// current effective value is a no-op. Otherwise it is stored and the
    /// property's write event, the object's per-property event and the
    /// any-property event fire in that order.
    pub fn set_property_value(&self, path: &str, value: impl Into<Value>) -> CoreResult<()> {
        let _guard = self.lock();
        self.set_property_value_no_lock(path, value.into())
    }

    /// Lock-free variant of [`set_property_value`](Self::set_property_value).
    pub fn set_property_value_no_lock(&self, path: &str, value: Value) -> CoreResult<()> {
        self.write_value(path, value, false, false)
    }

    /// Same pipeline as [`set_property_value`](Self::set_property_value) but
    /// bypasses the read-only flag and write permission.
    pub fn set_protected_property_value(
        &self,
        path: &str,
        value: impl Into<Value>,
    ) -> CoreResult<()> {
        let _guard = self.lock();
        self.write_value(path, value.into(), true, false)
    }

    pub(crate) fn write_value(
        &self,
        path: &str,
        value: Value,
        protected: bool,
        batch_commit: bool,
    ) -> CoreResult<()> {
        self.ensure_not_frozen("set property value")?;

        let (head, rest) = split_first(path);
        if let Some(rest) = rest {
            let child = self.child_object(head)?;
            return if protected {
                child.set_protected_property_value(rest, value)
            } else {
                child.set_property_value(rest, value)
            };
        }

        let (name, index) = parse_indexed(head)?;
        let target = self.property_no_lock(name)?.resolve_reference_chain_no_lock()?;
        if !protected {
            self.check_writable(&target)?;
        }

        let value = match index {
            Some(index) => self.replace_list_item(&target, index, value)?,
            None => value,
        };

        if !batch_commit && self.inner.state.read().update_depth > 0 {
            tracing::trace!(property = %target.name(), "Write deferred until end of update");
            self.record_pending(target.name(), PendingWrite::Set { value, protected });
            return Ok(());
        }

        let processed = self.process_value(&target, value)?;
        let previous = self.effective_value(&target)?;
        if !batch_commit && processed == previous {
            tracing::trace!(property = %target.name(), "Write skipped, value unchanged");
            return Ok(());
        }

        self.store(&target, processed.clone());
        let args = self.dispatch_write(&target, processed, PropertyEventType::Update, batch_commit)?;
        if args.is_overridden() {
            self.store(&target, args.into_value());
        }
        tracing::debug!(property = %target.name(), protected, "Property value written");
        Ok(())
    }

    fn store(&self, target: &Property, value: Value) {
        self.inner
            .state
            .write()
            .values
            .insert(target.name().to_string(), value);
    }

    fn check_writable(&self, target: &Property) -> CoreResult<()> {
        if target.read_only_no_lock()? {
            return Err(CoreObjectsError::AccessDenied(format!(
                "property '{}' is read-only",
                target.name()
            )));
        }
        if !self.permission_manager().is_allowed(Permission::Write) {
            return Err(CoreObjectsError::AccessDenied(format!(
                "write access to '{}' is not permitted",
                target.name()
            )));
        }
        Ok(())
    }

    /// New list value with item `index` replaced. A value already recorded in
    /// the open batch is used as the base.
    fn replace_list_item(&self, target: &Property, index: usize, item: Value) -> CoreResult<Value> {
        let pending = self
            .inner
            .state
            .read()
            .pending
            .iter()
            .find_map(|(name, write)| match write {
                PendingWrite::Set { value, .. } if name == target.name() => Some(value.clone()),
                _ => None,
            });
        let base = match pending {
            Some(value) => value,
            None => self.effective_value(target)?,
        };
        let Value::List(mut items) = base else {
            return Err(CoreObjectsError::InvalidParameter(format!(
                "property '{}' is not a list",
                target.name()
            )));
        };
        let len = items.len();
        let slot = items.get_mut(index).ok_or_else(|| {
            CoreObjectsError::OutOfRange(format!(
                "index {} out of range for '{}' (length {})",
                index,
                target.name(),
                len
            ))
        })?;
        *slot = item;
        Ok(Value::List(items))
    }

    /// Coerce, validate, convert, check selection, clamp and copy objects.
    fn process_value(&self, target: &Property, value: Value) -> CoreResult<Value> {
        if matches!(value, Value::Eval(_)) {
            return Ok(value);
        }
        let mut value = value;
        if let Some(coercer) = target.coercer_no_lock()? {
            value = coercer.coerce(Some(self), &value)?;
            tracing::trace!(property = %target.name(), %value, "Value coerced");
        }
        if let Some(validator) = target.validator_no_lock()? {
            validator.validate(Some(self), &value)?;
        }

        let ty = target.value_type_no_lock()?;
        value = self.convert_value(target, ty, value)?;

        if let Some(selection) = target.selection_values_no_lock()? {
            lookup_selection(&selection, &value, target.name()).map_err(|_| {
                CoreObjectsError::InvalidParameter(format!(
                    "{} is not a valid selection for '{}'",
                    value,
                    target.name()
                ))
            })?;
        }

        if ty.is_numeric() {
            value = self.clamp(target, ty, value)?;
        }

        if let Value::Object(obj) = value {
            value = Value::Object(obj.frozen_copy());
        }
        Ok(value)
    }

    fn convert_value(&self, target: &Property, ty: CoreType, value: Value) -> CoreResult<Value> {
        match (ty, value) {
            (CoreType::Undefined, value) => Ok(value),
            (CoreType::List, Value::List(items)) => {
                let item_type = target.fields().item_type;
                let items = items
                    .into_iter()
                    .map(|item| item.convert_to(item_type))
                    .collect::<CoreResult<Vec<_>>>()?;
                Ok(Value::List(items))
            }
            (CoreType::Enumeration, value @ (Value::String(_) | Value::Int(_))) => {
                self.convert_enumeration(target, value)
            }
            (CoreType::Object, value @ Value::Object(_)) => Ok(value),
            (CoreType::Object, other) => Err(CoreObjectsError::ConversionFailed(format!(
                "property '{}' expects an object, got {}",
                target.name(),
                other.core_type()
            ))),
            (ty, value) => value.convert_to(ty),
        }
    }

    /// Enumerator name or integer to the enumeration type of the default.
    fn convert_enumeration(&self, target: &Property, value: Value) -> CoreResult<Value> {
        let type_name = match target.default_value_no_lock()? {
            Some(Value::Enumeration(default)) => default.type_name().to_string(),
            _ => return value.convert_to(CoreType::Enumeration),
        };
        let manager = self.type_manager().ok_or_else(|| {
            CoreObjectsError::ConversionFailed(format!(
                "no type manager to resolve enumeration '{}'",
                type_name
            ))
        })?;
        let ty = manager.enumeration_type(&type_name)?;
        let converted = match &value {
            Value::Int(i) => ty.from_int(*i),
            other => ty.value(&other.to_string()),
        };
        converted
            .map(Value::Enumeration)
            .map_err(|e| CoreObjectsError::ConversionFailed(e.to_string()))
    }

    fn clamp(&self, target: &Property, ty: CoreType, value: Value) -> CoreResult<Value> {
        let Some(current) = value.as_float() else {
            return Ok(value);
        };
        if let Some(min) = target.min_value_no_lock()? {
            if min.as_float().is_some_and(|min| current < min) {
                tracing::trace!(property = %target.name(), %min, "Value clamped to minimum");
                return min.convert_to(ty);
            }
        }
        if let Some(max) = target.max_value_no_lock()? {
            if max.as_float().is_some_and(|max| current > max) {
                tracing::trace!(property = %target.name(), %max, "Value clamped to maximum");
                return max.convert_to(ty);
            }
        }
        Ok(value)
    }

    // =========================================================================
    // Clear
    // =========================================================================

    /// Remove the stored value so the default applies again.
    pub fn clear_property_value(&self, path: &str) -> CoreResult<()> {
        let _guard = self.lock();
        self.clear_property_value_no_lock(path)
    }

    /// Lock-free variant of [`clear_property_value`](Self::clear_property_value).
    pub fn clear_property_value_no_lock(&self, path: &str) -> CoreResult<()> {
        self.clear_value(path, false, false)
    }

    /// Clear bypassing the read-only flag and write permission.
    pub fn clear_protected_property_value(&self, path: &str) -> CoreResult<()> {
        let _guard = self.lock();
        self.clear_value(path, true, false)
    }

    pub(crate) fn clear_value(&self, path: &str, protected: bool, batch_commit: bool) -> CoreResult<()> {
        self.ensure_not_frozen("clear property value")?;

        let (head, rest) = split_first(path);
        if let Some(rest) = rest {
            let child = self.child_object(head)?;
            return if protected {
                child.clear_protected_property_value(rest)
            } else {
                child.clear_property_value(rest)
            };
        }

        let (name, index) = parse_indexed(head)?;
        if index.is_some() {
            return Err(CoreObjectsError::InvalidParameter(format!(
                "cannot clear a list item ('{}')",
                head
            )));
        }
        let target = self.property_no_lock(name)?.resolve_reference_chain_no_lock()?;
        if !protected {
            self.check_writable(&target)?;
        }

        if !batch_commit && self.inner.state.read().update_depth > 0 {
            self.record_pending(target.name(), PendingWrite::Clear { protected });
            return Ok(());
        }

        let removed = self.inner.state.write().values.remove(target.name());
        if removed.is_none() && !batch_commit {
            return Ok(());
        }

        let default = target.default_value_no_lock()?.unwrap_or_default();
        let args = self.dispatch_write(&target, default, PropertyEventType::Clear, batch_commit)?;
        if args.is_overridden() {
            self.store(&target, args.into_value());
        }
        tracing::debug!(property = %target.name(), "Property value cleared");
        Ok(())
    }

    // =========================================================================
    // Event dispatch
    // =========================================================================

    fn dispatch(
        &self,
        property_event: &Event<PropertyValueEventArgs>,
        object_event: Option<Event<PropertyValueEventArgs>>,
        any_event: &Event<PropertyValueEventArgs>,
        mut args: PropertyValueEventArgs,
    ) -> CoreResult<PropertyValueEventArgs> {
        let guard = self.guard_handlers();
        property_event.trigger_with(self, &mut args, guard)?;
        if let Some(event) = object_event {
            event.trigger_with(self, &mut args, guard)?;
        }
        any_event.trigger_with(self, &mut args, guard)?;
        Ok(args)
    }

    fn dispatch_write(
        &self,
        target: &Property,
        value: Value,
        event_type: PropertyEventType,
        is_updating: bool,
    ) -> CoreResult<PropertyValueEventArgs> {
        let object_event = self.inner.state.read().write_events.get(target.name()).cloned();
        let args = PropertyValueEventArgs::new(target.clone(), value, event_type, is_updating);
        self.dispatch(
            target.on_property_value_write(),
            object_event,
            &self.inner.on_any_write,
            args,
        )
    }

    fn dispatch_read(&self, target: &Property, value: Value) -> CoreResult<Value> {
        let object_event = self.inner.state.read().read_events.get(target.name()).cloned();
        let has_handlers = target.on_property_value_read().has_subscribers()
            || object_event.as_ref().is_some_and(Event::has_subscribers)
            || self.inner.on_any_read.has_subscribers();
        if !has_handlers {
            return Ok(value);
        }
        let is_updating = self.inner.state.read().update_depth > 0;
        let args = PropertyValueEventArgs::new(target.clone(), value, PropertyEventType::Read, is_updating);
        let args = self.dispatch(
            target.on_property_value_read(),
            object_event,
            &self.inner.on_any_read,
            args,
        )?;
        Ok(args.into_value())
    }

    // =========================================================================
    // Callables
    // =========================================================================

    /// Invoke the Function/Procedure value of `name` with `args`, converted
    /// per the property's callable info.
    pub fn call_property(&self, name: &str, args: &[Value]) -> CoreResult<Value> {
        let _guard = self.lock();
        if !self.permission_manager().is_allowed(Permission::Execute) {
            return Err(CoreObjectsError::AccessDenied(format!(
                "execute access to '{}' is not permitted",
                name
            )));
        }
        let target = self.property_no_lock(name)?.resolve_reference_chain_no_lock()?;
        let value = self.effective_value(&target)?;
        let callable = value.as_callable().ok_or_else(|| {
            CoreObjectsError::NoInterface(format!(
                "property '{}' holds a {} value, not a callable",
                name,
                value.core_type()
            ))
        })?;
        let args = match target.callable_info_no_lock()? {
            Some(info) => info.prepare_arguments(args)?,
            None => args.to_vec(),
        };
        tracing::debug!(property = %target.name(), "Calling property");
        callable.call(&args)
    }
}

fn index_list(value: &Value, name: &str, index: usize) -> CoreResult<Value> {
    let items = value.as_list().ok_or_else(|| {
        CoreObjectsError::InvalidParameter(format!("property '{}' is not a list", name))
    })?;
    items.get(index).cloned().ok_or_else(|| {
        CoreObjectsError::OutOfRange(format!(
            "index {} out of range for '{}' (length {})",
            index,
            name,
            items.len()
        ))
    })
}

/// Map `key` through a selection list (by index) or dictionary (by key).
fn lookup_selection(selection: &Value, key: &Value, name: &str) -> CoreResult<Value> {
    match selection {
        Value::List(_) => {
            let index = key
                .as_int()
                .and_then(|i| usize::try_from(i).ok())
                .ok_or_else(|| {
                    CoreObjectsError::InvalidParameter(format!(
                        "selection index {} for '{}' is not a non-negative integer",
                        key, name
                    ))
                })?;
            index_list(selection, name, index)
        }
        Value::Dict(dict) => dict.get(key).cloned().ok_or_else(|| {
            CoreObjectsError::NotFound(format!("selection key {} for '{}'", key, name))
        }),
        other => Err(CoreObjectsError::InvalidParameter(format!(
            "selection values of '{}' are a {}, expected a list or dictionary",
            name,
            other.core_type()
        ))),
    }
}
