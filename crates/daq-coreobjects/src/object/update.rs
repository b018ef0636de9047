//! Batched updates (`begin_update` / `end_update`).

use super::{PendingWrite, PropertyObject};
use crate::error::{CoreObjectsError, CoreResult};
use crate::event::EndUpdateEventArgs;

impl PropertyObject {
    /// Open (or nest) an update batch. Writes are recorded until the
    /// outermost [`end_update`](Self::end_update); reads keep returning the
    /// pre-batch values.
    pub fn begin_update(&self) -> CoreResult<()> {
        let _guard = self.lock();
        self.ensure_not_frozen("begin update")?;
        let depth = {
            let mut state = self.inner.state.write();
            state.update_depth += 1;
            state.update_depth
        };
        tracing::trace!(depth, "Update batch opened");
        Ok(())
    }

    /// Close an update batch. The outermost close applies each touched
    /// property's net write once, in first-touch order, then raises
    /// `on_end_update` with the touched names.
    ///
    /// A failing write does not stop the remaining ones; the first error is
    /// returned after `on_end_update` has fired.
    pub fn end_update(&self) -> CoreResult<()> {
        let _guard = self.lock();
        let pending = {
            let mut state = self.inner.state.write();
            if state.update_depth == 0 {
                return Err(CoreObjectsError::InvalidState(
                    "end_update called without a matching begin_update".to_string(),
                ));
            }
            state.update_depth -= 1;
            if state.update_depth > 0 {
                return Ok(());
            }
            std::mem::take(&mut state.pending)
        };

        let mut first_error = None;
        let mut touched = Vec::with_capacity(pending.len());
        for (name, write) in pending {
            let result = match write {
                PendingWrite::Set { value, protected } => {
                    self.write_value(&name, value, protected, true)
                }
                PendingWrite::Clear { protected } => self.clear_value(&name, protected, true),
            };
            if let Err(e) = result {
                tracing::warn!(property = %name, error = %e, "Batched write failed");
                first_error.get_or_insert(e);
            }
            touched.push(name);
        }

        tracing::debug!(count = touched.len(), "Update batch committed");
        let mut args = EndUpdateEventArgs::new(touched);
        let guard = self.guard_handlers();
        self.inner.on_end_update.trigger_with(self, &mut args, guard)?;
        first_error.map_or(Ok(()), Err)
    }

    /// Current nesting depth of update batches.
    pub fn update_depth(&self) -> usize {
        self.inner.state.read().update_depth
    }

    /// True while an update batch is open.
    pub fn is_updating(&self) -> bool {
        self.update_depth() > 0
    }

    /// Record a deferred write; the first touch fixes the position, the last
    /// write wins.
    pub(crate) fn record_pending(&self, name: &str, write: PendingWrite) {
        let mut state = self.inner.state.write();
        match state.pending.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = write,
            None => state.pending.push((name.to_string(), write)),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::event::PropertyEventType;
    use crate::property::{PropertyBuilder, Validator};
    use crate::{ErrorKind, PropertyObject, Value};
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn object() -> PropertyObject {
        let obj = PropertyObject::new();
        obj.add_property(PropertyBuilder::int("A", 1).build().unwrap())
            .unwrap();
        obj.add_property(PropertyBuilder::int("B", 2).build().unwrap())
            .unwrap();
        obj
    }

    #[test]
    fn test_end_update_without_begin_fails() {
        let obj = object();
        assert_eq!(obj.end_update().unwrap_err().kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_reads_see_pre_batch_values() {
        let obj = object();
        obj.begin_update().unwrap();
        obj.set_property_value("A", 10).unwrap();
        assert_eq!(obj.property_value("A").unwrap(), Value::Int(1));
        obj.end_update().unwrap();
        assert_eq!(obj.property_value("A").unwrap(), Value::Int(10));
    }

    #[test]
    fn test_commit_fires_once_per_property_in_first_touch_order() {
        let obj = object();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        obj.on_any_property_value_write().subscribe(move |_, args| {
            sink.lock()
                .push((args.property().name().to_string(), args.value().clone()));
            Ok(())
        });
        let ended = Arc::new(Mutex::new(Vec::new()));
        let ended_sink = ended.clone();
        obj.on_end_update().subscribe(move |_, args| {
            *ended_sink.lock() = args.properties().to_vec();
            Ok(())
        });

        obj.begin_update().unwrap();
        obj.set_property_value("B", 5).unwrap();
        obj.set_property_value("A", 3).unwrap();
        obj.set_property_value("B", 6).unwrap();
        obj.begin_update().unwrap();
        obj.set_property_value("A", 4).unwrap();
        obj.end_update().unwrap();
        assert!(seen.lock().is_empty());
        obj.end_update().unwrap();

        assert_eq!(
            *seen.lock(),
            vec![("B".to_string(), Value::Int(6)), ("A".to_string(), Value::Int(4))]
        );
        assert_eq!(*ended.lock(), vec!["B".to_string(), "A".to_string()]);
    }

    #[test]
    fn test_set_then_clear_applies_net_clear() {
        let obj = object();
        obj.set_property_value("A", 7).unwrap();
        let kinds = Arc::new(Mutex::new(Vec::new()));
        let sink = kinds.clone();
        obj.on_any_property_value_write().subscribe(move |_, args| {
            sink.lock().push(args.event_type());
            Ok(())
        });
        obj.begin_update().unwrap();
        obj.set_property_value("A", 8).unwrap();
        obj.clear_property_value("A").unwrap();
        obj.end_update().unwrap();
        assert_eq!(obj.property_value("A").unwrap(), Value::Int(1));
        assert_eq!(*kinds.lock(), vec![PropertyEventType::Clear]);
    }

    #[test]
    fn test_unchanged_value_still_fires_on_commit() {
        let obj = object();
        let count = Arc::new(Mutex::new(0));
        let sink = count.clone();
        obj.on_property_value_write("A")
            .unwrap()
            .subscribe(move |_, args| {
                assert!(args.is_updating());
                *sink.lock() += 1;
                Ok(())
            });
        obj.begin_update().unwrap();
        obj.set_property_value("A", 1).unwrap();
        obj.end_update().unwrap();
        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn test_failed_write_reported_after_commit() {
        let obj = object();
        obj.add_property(
            PropertyBuilder::int("Positive", 0)
                .validator(Validator::new("value >= 0"))
                .build()
                .unwrap(),
        )
        .unwrap();
        obj.begin_update().unwrap();
        obj.set_property_value("Positive", -3).unwrap();
        obj.set_property_value("A", 9).unwrap();
        let err = obj.end_update().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidateFailed);
        assert_eq!(obj.property_value("A").unwrap(), Value::Int(9));
        assert_eq!(obj.property_value("Positive").unwrap(), Value::Int(0));
        assert!(!obj.is_updating());
    }
}
