//! Expression evaluation (`EvalValue`)
//!
//! Property metadata, default values, coercers, validators and reference
//! targets may be given as small expressions that are resolved lazily against
//! an owning [`PropertyObject`]:
//!
//! ```text
//! "$MinProperty - 3"                  sibling value arithmetic
//! "value > 5 && value < 100"          validator over the proposed value
//! "if($UseExternal, %External, %Internal)"   reference property target
//! ```
//!
//! # Language
//!
//! | Syntax | Meaning |
//! |--------|---------|
//! | `1`, `2.5`, `'text'`, `"text"`, `True`, `False`, `[a, b]` | literals |
//! | `value` | proposed value (coercers and validators only) |
//! | `$Name`, `$Child.Name` | value of a sibling or nested property |
//! | `$Name:SelectedValue` | selection-mapped value |
//! | `%Name` | the property itself (reference targets) |
//! | `%Name:Value` | value of the referenced property |
//! | `- !`, `* /`, `+ -`, `== != < <= > >=`, `&&`, `\|\|` | operators |
//! | `if(c, a, b)`, `switch(v, k1, r1, ..., default)`, `min`, `max`, `abs`, `round` | functions |
//!
//! # Binding
//!
//! An [`EvalValue`] is an immutable parsed tree plus an optional weak owner.
//! [`EvalValue::bind`] returns a *new* value bound to another owner; the tree
//! is shared, never mutated. Evaluation always runs against an explicit
//! [`EvalContext`]; [`EvalValue::result`] builds that context from the bound
//! owner, acquiring the owner's lock, while [`EvalValue::result_no_lock`]
//! assumes the caller already holds it.
//!
//! # Failures
//!
//! - malformed syntax → `ParseFailed` (reported when evaluated)
//! - unknown `$`/`%` name → `NotFound`
//! - operator or result type mismatch → `ConversionFailed`

mod ast;
mod evaluator;
mod parser;
mod tokenizer;

use ast::{Expr, Function};
use evaluator::Operand;
use parser::parse;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{CoreObjectsError, CoreResult};
use crate::object::{PropertyObject, WeakPropertyObject};
use crate::property::Property;
use crate::value::{CoreType, Value};

// =============================================================================
// EvalContext
// =============================================================================

/// Resolution context supplying `$`/`%` names and the `value` binding.
pub trait EvalContext {
    /// Value of a sibling (or dotted nested) property.
    fn property_value(&self, path: &str) -> CoreResult<Value>;

    /// Selection-mapped value of a sibling property.
    fn property_selection_value(&self, path: &str) -> CoreResult<Value>;

    /// Property descriptor for `%Name`.
    fn property(&self, name: &str) -> CoreResult<Property>;

    /// Proposed value bound to `value`, if any.
    fn proposed_value(&self) -> Option<Value>;

    /// Maximum tree depth accepted by this context.
    fn max_expression_depth(&self) -> usize {
        crate::config::CoreObjectsConfig::default().max_expression_depth
    }
}

/// Context backed by a plain name→value map. Useful for evaluating
/// expressions without a property object.
#[derive(Debug, Clone, Default)]
pub struct MapContext {
    values: HashMap<String, Value>,
    proposed: Option<Value>,
}

impl MapContext {
    /// Empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named value.
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Bind `value`.
    pub fn with_proposed(mut self, value: impl Into<Value>) -> Self {
        self.proposed = Some(value.into());
        self
    }
}

impl EvalContext for MapContext {
    fn property_value(&self, path: &str) -> CoreResult<Value> {
        self.values
            .get(path)
            .cloned()
            .ok_or_else(|| CoreObjectsError::NotFound(format!("property '{}'", path)))
    }

    fn property_selection_value(&self, path: &str) -> CoreResult<Value> {
        self.property_value(path)
    }

    fn property(&self, name: &str) -> CoreResult<Property> {
        Err(CoreObjectsError::NotFound(format!(
            "property '{}' (no object context)",
            name
        )))
    }

    fn proposed_value(&self) -> Option<Value> {
        self.proposed.clone()
    }
}

// =============================================================================
// EvalValue
// =============================================================================

/// Lazily evaluated expression, optionally bound to an owner.
#[derive(Clone)]
pub struct EvalValue {
    expression: Arc<str>,
    parsed: Arc<Result<Expr, String>>,
    owner: Option<WeakPropertyObject>,
}

impl EvalValue {
    /// Parse `expression`. Syntax errors are kept and reported on evaluation.
    pub fn new(expression: impl AsRef<str>) -> Self {
        let expression: Arc<str> = Arc::from(expression.as_ref());
        let parsed = parse(&expression).map_err(|e| e.to_string());
        if let Err(message) = &parsed {
            tracing::trace!(expression = %expression, error = %message, "Expression failed to parse");
        }
        Self {
            expression,
            parsed: Arc::new(parsed),
            owner: None,
        }
    }

    /// Source text.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Parse error message, if the expression is malformed.
    pub fn parse_error(&self) -> Option<&str> {
        match &*self.parsed {
            Ok(_) => None,
            Err(message) => Some(message.as_str()),
        }
    }

    /// Names referenced through `$` or `%`, in source order.
    pub fn referenced_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if let Ok(expr) = &*self.parsed {
            expr.collect_names(&mut names);
        }
        names
    }

    /// True for a bare `%Name` (or a conditional over references), i.e. an
    /// expression that can produce a property rather than a value.
    pub fn is_reference(&self) -> bool {
        fn yields_property(expr: &Expr) -> bool {
            match expr {
                Expr::PropertyReference { as_value, .. } => !as_value,
                Expr::Call {
                    function: Function::If,
                    args,
                } => args[1..].iter().any(yields_property),
                Expr::Call {
                    function: Function::Switch,
                    args,
                } => args[1..].iter().any(yields_property),
                _ => false,
            }
        }
        matches!(&*self.parsed, Ok(expr) if yields_property(expr))
    }

    /// A copy of this expression bound to `owner`. The parsed tree is shared.
    pub fn bind(&self, owner: &PropertyObject) -> EvalValue {
        EvalValue {
            expression: self.expression.clone(),
            parsed: self.parsed.clone(),
            owner: Some(owner.downgrade()),
        }
    }

    /// An unbound copy.
    pub fn unbound(&self) -> EvalValue {
        EvalValue {
            owner: None,
            ..self.clone()
        }
    }

    /// The bound owner, if still alive.
    pub fn owner(&self) -> Option<PropertyObject> {
        self.owner.as_ref().and_then(WeakPropertyObject::upgrade)
    }

    fn tree(&self, ctx: &dyn EvalContext) -> CoreResult<&Expr> {
        let expr = match &*self.parsed {
            Ok(expr) => expr,
            Err(message) => return Err(CoreObjectsError::ParseFailed(message.clone())),
        };
        let limit = ctx.max_expression_depth();
        if expr.depth() > limit {
            return Err(CoreObjectsError::ParseFailed(format!(
                "expression '{}' exceeds the nesting limit of {}",
                self.expression, limit
            )));
        }
        Ok(expr)
    }

    /// Evaluate against an explicit context, producing a value.
    pub fn evaluate_with(&self, ctx: &dyn EvalContext) -> CoreResult<Value> {
        let expr = self.tree(ctx)?;
        evaluator::evaluate(expr, ctx)?.into_value()
    }

    /// Evaluate and convert to `target`.
    pub fn evaluate_as(&self, ctx: &dyn EvalContext, target: CoreType) -> CoreResult<Value> {
        self.evaluate_with(ctx)?.convert_to(target)
    }

    /// Evaluate a reference expression, producing the target property.
    pub fn resolve_property_with(&self, ctx: &dyn EvalContext) -> CoreResult<Property> {
        let expr = self.tree(ctx)?;
        match evaluator::evaluate(expr, ctx)? {
            Operand::Property(property) => Ok(property),
            Operand::Value(value) => Err(CoreObjectsError::ConversionFailed(format!(
                "reference '{}' evaluated to a {} value, not a property",
                self.expression,
                value.core_type()
            ))),
        }
    }

    fn bound_owner(&self) -> CoreResult<PropertyObject> {
        self.owner().ok_or_else(|| {
            CoreObjectsError::NoOwner(format!("expression '{}' is not bound", self.expression))
        })
    }

    /// Evaluate against the bound owner, acquiring its lock.
    pub fn result(&self) -> CoreResult<Value> {
        let owner = self.bound_owner()?;
        let _guard = owner.lock();
        self.evaluate_with(&owner.eval_context(None))
    }

    /// Evaluate against the bound owner; the caller must hold the owner's lock.
    pub fn result_no_lock(&self) -> CoreResult<Value> {
        let owner = self.bound_owner()?;
        self.evaluate_with(&owner.eval_context(None))
    }

    /// Resolve a reference expression against the bound owner, acquiring its lock.
    pub fn resolve_property(&self) -> CoreResult<Property> {
        let owner = self.bound_owner()?;
        let _guard = owner.lock();
        self.resolve_property_with(&owner.eval_context(None))
    }

    /// Resolve a reference expression; the caller must hold the owner's lock.
    pub fn resolve_property_no_lock(&self) -> CoreResult<Property> {
        let owner = self.bound_owner()?;
        self.resolve_property_with(&owner.eval_context(None))
    }
}

impl fmt::Debug for EvalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvalValue")
            .field("expression", &self.expression)
            .field("bound", &self.owner.is_some())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn eval(expr: &str, ctx: &MapContext) -> CoreResult<Value> {
        EvalValue::new(expr).evaluate_with(ctx)
    }

    #[test]
    fn test_sibling_arithmetic() {
        let ctx = MapContext::new().with_value("MinProperty", 10);
        assert_eq!(eval("$MinProperty - 3", &ctx).unwrap(), Value::Int(7));
        assert_eq!(eval("$MinProperty / 4", &ctx).unwrap(), Value::Float(2.5));
        assert_eq!(eval("$MinProperty * 1.5", &ctx).unwrap(), Value::Float(15.0));
    }

    #[test]
    fn test_proposed_value_validator() {
        let ctx = MapContext::new().with_proposed(7);
        assert_eq!(eval("value > 5", &ctx).unwrap(), Value::Bool(true));
        assert_eq!(eval("value > 5 && value < 6", &ctx).unwrap(), Value::Bool(false));
        let unbound = MapContext::new();
        assert_eq!(eval("value", &unbound).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_short_circuit_skips_missing_names() {
        let ctx = MapContext::new();
        assert_eq!(eval("False && $Missing", &ctx).unwrap(), Value::Bool(false));
        assert_eq!(eval("True || $Missing", &ctx).unwrap(), Value::Bool(true));
        assert_eq!(eval("if(True, 1, $Missing)", &ctx).unwrap(), Value::Int(1));
        assert_eq!(
            eval("$Missing + 1", &ctx).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_functions() {
        let ctx = MapContext::new().with_value("Mode", "fast");
        assert_eq!(eval("min(3, 9)", &ctx).unwrap(), Value::Int(3));
        assert_eq!(eval("max(3, 9.5)", &ctx).unwrap(), Value::Float(9.5));
        assert_eq!(eval("abs(-4)", &ctx).unwrap(), Value::Int(4));
        assert_eq!(eval("round(2.6)", &ctx).unwrap(), Value::Int(3));
        assert_eq!(
            eval("switch($Mode, 'slow', 1, 'fast', 2, 0)", &ctx).unwrap(),
            Value::Int(2)
        );
        assert_eq!(
            eval("switch($Mode, 'slow', 1, 7)", &ctx).unwrap(),
            Value::Int(7)
        );
    }

    #[test]
    fn test_string_concatenation_and_comparison() {
        let ctx = MapContext::new().with_value("Name", "ai");
        assert_eq!(eval("$Name + 0", &ctx).unwrap(), Value::from("ai0"));
        assert_eq!(eval("$Name == 'ai'", &ctx).unwrap(), Value::Bool(true));
        assert_eq!(eval("1 == 1.0", &ctx).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_failure_kinds() {
        let ctx = MapContext::new();
        assert_eq!(eval("1 +", &ctx).unwrap_err().kind(), ErrorKind::ParseFailed);
        assert_eq!(
            eval("'a' - 1", &ctx).unwrap_err().kind(),
            ErrorKind::ConversionFailed
        );
        assert_eq!(
            EvalValue::new("'abc'")
                .evaluate_as(&ctx, CoreType::Int)
                .unwrap_err()
                .kind(),
            ErrorKind::ConversionFailed
        );
        assert_eq!(
            eval("1 / 0", &ctx).unwrap_err().kind(),
            ErrorKind::InvalidParameter
        );
    }

    #[test]
    fn test_integer_division_overflow_is_an_error() {
        let ctx = MapContext::new().with_value("Low", i64::MIN);
        assert_eq!(
            eval("(-9223372036854775807 - 1) / -1", &ctx).unwrap_err().kind(),
            ErrorKind::OutOfRange
        );
        assert_eq!(
            eval("$Low / -1", &ctx).unwrap_err().kind(),
            ErrorKind::OutOfRange
        );
        assert_eq!(eval("$Low / 1", &ctx).unwrap(), Value::Int(i64::MIN));
    }

    #[test]
    fn test_parse_error_is_deferred() {
        let ev = EvalValue::new("if(");
        assert!(ev.parse_error().is_some());
        assert_eq!(ev.expression(), "if(");
    }

    #[test]
    fn test_referenced_names_and_reference_detection() {
        let ev = EvalValue::new("if($Switch, %A, %B)");
        assert_eq!(ev.referenced_names(), vec!["Switch", "A", "B"]);
        assert!(ev.is_reference());
        assert!(EvalValue::new("%Target").is_reference());
        assert!(!EvalValue::new("%Target:Value").is_reference());
        assert!(!EvalValue::new("$A + 1").is_reference());
    }

    #[test]
    fn test_unbound_result_has_no_owner() {
        let err = EvalValue::new("1 + 1").result().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoOwner);
    }

    #[test]
    fn test_list_literal() {
        let ctx = MapContext::new().with_value("X", 2);
        assert_eq!(
            eval("[1, $X, 3]", &ctx).unwrap(),
            Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
    }
}
