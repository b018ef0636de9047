//! Expression evaluation context backed by a property object.

use super::PropertyObject;
use crate::error::CoreResult;
use crate::eval::EvalContext;
use crate::property::Property;
use crate::value::Value;

/// Resolves `$Name`, `$Name:SelectedValue` and `%Name` against an object.
///
/// Reads go through the no-lock paths and do not raise read events; the
/// caller holds the object's lock.
pub struct ObjectEvalContext<'a> {
    object: &'a PropertyObject,
    proposed: Option<Value>,
}

impl<'a> ObjectEvalContext<'a> {
    pub(crate) fn new(object: &'a PropertyObject, proposed: Option<Value>) -> Self {
        Self { object, proposed }
    }
}

impl EvalContext for ObjectEvalContext<'_> {
    fn property_value(&self, path: &str) -> CoreResult<Value> {
        self.object.read_value(path, false)
    }

    fn property_selection_value(&self, path: &str) -> CoreResult<Value> {
        self.object.selection_value(path, false)
    }

    fn property(&self, name: &str) -> CoreResult<Property> {
        self.object.property_no_lock(name)
    }

    fn proposed_value(&self) -> Option<Value> {
        self.proposed.clone()
    }

    fn max_expression_depth(&self) -> usize {
        self.object.config().max_expression_depth
    }
}
