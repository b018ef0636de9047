//! Dynamically typed property values.
//!
//! [`Value`] is a tagged sum type covering every [`CoreType`]. Dispatch over the
//! held variant is done with pattern matching; conversions between variants go
//! through [`Value::convert_to`], which implements the lossless-or-documented
//! coercion rules used by the property write pipeline.
//!
//! Containers are homogeneous: a `List` holds items of a single `CoreType`, a
//! `Dict` has a single key type and a single value type. Nested containers and
//! containers of objects or callables are rejected when a property is
//! validated (see `property::validate`).

use num_complex::Complex64;
use std::fmt;
use std::sync::Arc;

use crate::error::{CoreObjectsError, CoreResult};
use crate::eval::EvalValue;
use crate::object::PropertyObject;

// =============================================================================
// CoreType
// =============================================================================

/// Closed tag set of value kinds.
///
/// Numeric codes match the serialized `valueType` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoreType {
    /// Bool.
    Bool,
    /// Int.
    Int,
    /// Float.
    Float,
    /// String.
    String,
    /// List.
    List,
    /// Dict.
    Dict,
    /// Ratio.
    Ratio,
    /// Procedure (callable without result).
    Proc,
    /// Property object.
    Object,
    /// Binary data.
    BinaryData,
    /// Function (callable with result).
    Func,
    /// Complex number.
    ComplexNumber,
    /// Struct.
    Struct,
    /// Enumeration.
    Enumeration,
    /// No type; also the item type of untyped containers.
    Undefined,
}

impl CoreType {
    /// Stable numeric code of this type.
    pub fn code(self) -> u32 {
        match self {
            CoreType::Bool => 0,
            CoreType::Int => 1,
            CoreType::Float => 2,
            CoreType::String => 3,
            CoreType::List => 4,
            CoreType::Dict => 5,
            CoreType::Ratio => 6,
            CoreType::Proc => 7,
            CoreType::Object => 8,
            CoreType::BinaryData => 9,
            CoreType::Func => 10,
            CoreType::ComplexNumber => 11,
            CoreType::Struct => 12,
            CoreType::Enumeration => 13,
            CoreType::Undefined => 0xFFFF,
        }
    }

    /// Inverse of [`CoreType::code`].
    pub fn from_code(code: u32) -> Option<Self> {
        let ty = match code {
            0 => CoreType::Bool,
            1 => CoreType::Int,
            2 => CoreType::Float,
            3 => CoreType::String,
            4 => CoreType::List,
            5 => CoreType::Dict,
            6 => CoreType::Ratio,
            7 => CoreType::Proc,
            8 => CoreType::Object,
            9 => CoreType::BinaryData,
            10 => CoreType::Func,
            11 => CoreType::ComplexNumber,
            12 => CoreType::Struct,
            13 => CoreType::Enumeration,
            0xFFFF => CoreType::Undefined,
            _ => return None,
        };
        Some(ty)
    }

    /// List or Dict.
    pub fn is_container(self) -> bool {
        matches!(self, CoreType::List | CoreType::Dict)
    }

    /// Func or Proc.
    pub fn is_callable(self) -> bool {
        matches!(self, CoreType::Func | CoreType::Proc)
    }

    /// Int or Float.
    pub fn is_numeric(self) -> bool {
        matches!(self, CoreType::Int | CoreType::Float)
    }
}

impl fmt::Display for CoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CoreType::Bool => "Bool",
            CoreType::Int => "Int",
            CoreType::Float => "Float",
            CoreType::String => "String",
            CoreType::List => "List",
            CoreType::Dict => "Dict",
            CoreType::Ratio => "Ratio",
            CoreType::Proc => "Proc",
            CoreType::Object => "Object",
            CoreType::BinaryData => "BinaryData",
            CoreType::Func => "Func",
            CoreType::ComplexNumber => "ComplexNumber",
            CoreType::Struct => "Struct",
            CoreType::Enumeration => "Enumeration",
            CoreType::Undefined => "Undefined",
        };
        write!(f, "{}", label)
    }
}

// =============================================================================
// Payload types
// =============================================================================

/// Rational number, always stored with a positive denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ratio {
    numerator: i64,
    denominator: i64,
}

impl Ratio {
    /// Create a ratio; a zero denominator is rejected.
    pub fn new(numerator: i64, denominator: i64) -> CoreResult<Self> {
        if denominator == 0 {
            return Err(CoreObjectsError::InvalidParameter(
                "ratio denominator must not be zero".into(),
            ));
        }
        let sign = if denominator < 0 { -1 } else { 1 };
        Ok(Self {
            numerator: numerator * sign,
            denominator: denominator * sign,
        })
    }

    /// Numerator.
    pub fn numerator(&self) -> i64 {
        self.numerator
    }

    /// Denominator.
    pub fn denominator(&self) -> i64 {
        self.denominator
    }

    /// Reduce by the greatest common divisor.
    pub fn simplified(&self) -> Self {
        let mut a = self.numerator.abs();
        let mut b = self.denominator;
        while b != 0 {
            let t = b;
            b = a % b;
            a = t;
        }
        let gcd = a.max(1);
        Self {
            numerator: self.numerator / gcd,
            denominator: self.denominator / gcd,
        }
    }

    /// The payload if this is a f64 value.
    pub fn as_f64(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Instance of a named struct type.
#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    type_name: String,
    fields: Vec<(String, Value)>,
}

impl StructValue {
    /// New instance.
    pub fn new(type_name: impl Into<String>, fields: Vec<(String, Value)>) -> Self {
        Self {
            type_name: type_name.into(),
            fields,
        }
    }

    /// Type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Fields.
    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    /// Field value by name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }
}

/// Enumerator of a named enumeration type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumerationValue {
    type_name: String,
    name: String,
    value: i64,
}

impl EnumerationValue {
    /// New instance.
    pub fn new(type_name: impl Into<String>, name: impl Into<String>, value: i64) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
            value,
        }
    }

    /// Type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Enumerator name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Integer value of the enumerator.
    pub fn value(&self) -> i64 {
        self.value
    }
}

/// Engineering unit. Carried as a `Struct` value of type [`Unit::TYPE_NAME`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Unit {
    /// Id.
    pub id: i64,
    /// Symbol.
    pub symbol: String,
    /// Name.
    pub name: String,
    /// Quantity.
    pub quantity: String,
}

impl Unit {
    /// Struct type name used for units.
    pub const TYPE_NAME: &'static str = "Unit";

    /// Unit with only a symbol (id -1).
    pub fn symbol(symbol: impl Into<String>) -> Self {
        Self {
            id: -1,
            symbol: symbol.into(),
            ..Default::default()
        }
    }

    /// Struct value with fields `Id`, `Symbol`, `Name`, `Quantity`.
    pub fn to_value(&self) -> Value {
        Value::Struct(StructValue::new(
            Self::TYPE_NAME,
            vec![
                ("Id".to_string(), Value::Int(self.id)),
                ("Symbol".to_string(), Value::String(self.symbol.clone())),
                ("Name".to_string(), Value::String(self.name.clone())),
                ("Quantity".to_string(), Value::String(self.quantity.clone())),
            ],
        ))
    }

    /// Read a unit back from a `Unit` struct (or a bare symbol string).
    pub fn from_value(value: &Value) -> CoreResult<Self> {
        match value {
            Value::String(symbol) => Ok(Self::symbol(symbol.clone())),
            Value::Struct(s) if s.type_name() == Self::TYPE_NAME => {
                let text = |field: &str| {
                    s.get(field)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                };
                Ok(Self {
                    id: s.get("Id").and_then(Value::as_int).unwrap_or(-1),
                    symbol: text("Symbol"),
                    name: text("Name"),
                    quantity: text("Quantity"),
                })
            }
            other => Err(CoreObjectsError::ConversionFailed(format!(
                "{} is not a unit",
                other.core_type()
            ))),
        }
    }
}

/// Signature of a callable value.
pub type CallableFn = dyn Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync;

/// Shared function or procedure body.
#[derive(Clone)]
pub struct Callable(Arc<CallableFn>);

impl Callable {
    /// Wrap a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Invoke the callable; user errors surface as `CallFailed`.
    pub fn call(&self, args: &[Value]) -> CoreResult<Value> {
        Ok((self.0)(args)?)
    }

    /// True if both handles share the same allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable").finish_non_exhaustive()
    }
}

/// Insertion-ordered dictionary with a single key type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueDict {
    entries: Vec<(Value, Value)>,
}

impl ValueDict {
    /// New instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `key`.
    pub fn insert(&mut self, key: impl Into<Value>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Value stored under `key`.
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Contains key.
    pub fn contains_key(&self, key: &Value) -> bool {
        self.get(key).is_some()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &(Value, Value)> {
        self.entries.iter()
    }

    /// Keys.
    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(k, _)| k)
    }

    /// Values.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    /// Common key type, `Undefined` if empty or mixed.
    pub fn key_type(&self) -> CoreType {
        common_type(self.keys())
    }

    /// Common value type, `Undefined` if empty or mixed.
    pub fn value_type(&self) -> CoreType {
        common_type(self.values())
    }
}

impl<K: Into<Value>, V: Into<Value>> FromIterator<(K, V)> for ValueDict {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut dict = ValueDict::new();
        for (k, v) in iter {
            dict.insert(k, v);
        }
        dict
    }
}

/// Common item type of a sequence of values, `Undefined` if empty or mixed.
pub fn common_type<'a>(items: impl Iterator<Item = &'a Value>) -> CoreType {
    let mut found = None;
    for item in items {
        let ty = item.core_type();
        match found {
            None => found = Some(ty),
            Some(prev) if prev != ty => return CoreType::Undefined,
            _ => {}
        }
    }
    found.unwrap_or(CoreType::Undefined)
}

// =============================================================================
// Value
// =============================================================================

/// A dynamically typed value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// No value.
    #[default]
    Undefined,
    /// Bool.
    Bool(bool),
    /// Int.
    Int(i64),
    /// Float.
    Float(f64),
    /// String.
    String(String),
    /// List.
    List(Vec<Value>),
    /// Dict.
    Dict(ValueDict),
    /// Ratio.
    Ratio(Ratio),
    /// Struct.
    Struct(StructValue),
    /// Enumeration.
    Enumeration(EnumerationValue),
    /// Shared handle; stored values are frozen copies.
    Object(PropertyObject),
    /// Function.
    Function(Callable),
    /// Procedure.
    Procedure(Callable),
    /// Binary data.
    BinaryData(Vec<u8>),
    /// Complex.
    Complex(Complex64),
    /// Lazily evaluated expression, resolved against an owner on read.
    Eval(EvalValue),
}

impl Value {
    /// The tag of the held variant. Expressions report `Undefined` since
    /// their type is only known once evaluated.
    pub fn core_type(&self) -> CoreType {
        match self {
            Value::Undefined | Value::Eval(_) => CoreType::Undefined,
            Value::Bool(_) => CoreType::Bool,
            Value::Int(_) => CoreType::Int,
            Value::Float(_) => CoreType::Float,
            Value::String(_) => CoreType::String,
            Value::List(_) => CoreType::List,
            Value::Dict(_) => CoreType::Dict,
            Value::Ratio(_) => CoreType::Ratio,
            Value::Struct(_) => CoreType::Struct,
            Value::Enumeration(_) => CoreType::Enumeration,
            Value::Object(_) => CoreType::Object,
            Value::Function(_) => CoreType::Func,
            Value::Procedure(_) => CoreType::Proc,
            Value::BinaryData(_) => CoreType::BinaryData,
            Value::Complex(_) => CoreType::ComplexNumber,
        }
    }

    /// True if undefined.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// The payload if this is a bool value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The payload if this is an int value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Float view of a numeric value (Int widens).
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// The payload if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The payload if this is a list value.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// The payload if this is a dict value.
    pub fn as_dict(&self) -> Option<&ValueDict> {
        match self {
            Value::Dict(dict) => Some(dict),
            _ => None,
        }
    }

    /// The payload if this is an object value.
    pub fn as_object(&self) -> Option<&PropertyObject> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// The payload if this is an expression.
    pub fn as_eval(&self) -> Option<&EvalValue> {
        match self {
            Value::Eval(eval) => Some(eval),
            _ => None,
        }
    }

    /// Function or procedure body.
    pub fn as_callable(&self) -> Option<&Callable> {
        match self {
            Value::Function(c) | Value::Procedure(c) => Some(c),
            _ => None,
        }
    }

    /// Truthiness used by conditions: false, 0, 0.0, "", empty containers and
    /// `Undefined` are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Dict(dict) => !dict.is_empty(),
            Value::Ratio(r) => r.numerator() != 0,
            Value::Complex(c) => c.norm() != 0.0,
            _ => true,
        }
    }

    /// Convert to `target`, failing with `ConversionFailed` when impossible.
    ///
    /// `Undefined` as target is the identity conversion.
    pub fn convert_to(&self, target: CoreType) -> CoreResult<Value> {
        if target == CoreType::Undefined || self.core_type() == target {
            return Ok(self.clone());
        }
        let converted = match (self, target) {
            (Value::Int(i), CoreType::Bool) => Some(Value::Bool(*i != 0)),
            (Value::Float(f), CoreType::Bool) => Some(Value::Bool(*f != 0.0)),
            (Value::String(s), CoreType::Bool) => match s.to_ascii_lowercase().as_str() {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },

            (Value::Bool(b), CoreType::Int) => Some(Value::Int(i64::from(*b))),
            (Value::Float(f), CoreType::Int) if f.is_finite() => Some(Value::Int(*f as i64)),
            (Value::String(s), CoreType::Int) => s
                .trim()
                .parse::<i64>()
                .ok()
                .or_else(|| {
                    s.trim()
                        .parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| f as i64)
                })
                .map(Value::Int),
            (Value::Ratio(r), CoreType::Int) => Some(Value::Int(r.numerator() / r.denominator())),
            (Value::Enumeration(e), CoreType::Int) => Some(Value::Int(e.value())),

            (Value::Bool(b), CoreType::Float) => Some(Value::Float(if *b { 1.0 } else { 0.0 })),
            (Value::Int(i), CoreType::Float) => Some(Value::Float(*i as f64)),
            (Value::String(s), CoreType::Float) => s.trim().parse::<f64>().ok().map(Value::Float),
            (Value::Ratio(r), CoreType::Float) => Some(Value::Float(r.as_f64())),

            (Value::Bool(_), CoreType::String)
            | (Value::Int(_), CoreType::String)
            | (Value::Float(_), CoreType::String)
            | (Value::Ratio(_), CoreType::String) => Some(Value::String(self.to_string())),
            (Value::Enumeration(e), CoreType::String) => Some(Value::String(e.name().to_string())),

            (Value::Int(i), CoreType::Ratio) => Ratio::new(*i, 1).ok().map(Value::Ratio),

            (Value::Int(i), CoreType::ComplexNumber) => {
                Some(Value::Complex(Complex64::new(*i as f64, 0.0)))
            }
            (Value::Float(f), CoreType::ComplexNumber) => {
                Some(Value::Complex(Complex64::new(*f, 0.0)))
            }
            _ => None,
        };
        converted.ok_or_else(|| {
            CoreObjectsError::ConversionFailed(format!(
                "cannot convert {} to {}",
                self.core_type(),
                target
            ))
        })
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => a == b,
            (Value::Ratio(a), Value::Ratio(b)) => a.simplified() == b.simplified(),
            (Value::Struct(a), Value::Struct(b)) => a == b,
            (Value::Enumeration(a), Value::Enumeration(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Procedure(a), Value::Procedure(b)) => a.ptr_eq(b),
            (Value::BinaryData(a), Value::BinaryData(b)) => a == b,
            (Value::Complex(a), Value::Complex(b)) => a == b,
            (Value::Eval(a), Value::Eval(b)) => a.expression() == b.expression(),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Dict(dict) => {
                write!(f, "{{")?;
                for (i, (k, v)) in dict.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Ratio(r) => write!(f, "{}", r),
            Value::Struct(s) => write!(f, "{}{{..}}", s.type_name()),
            Value::Enumeration(e) => write!(f, "{}", e.name()),
            Value::Object(_) => write!(f, "<PropertyObject>"),
            Value::Function(_) => write!(f, "<Function>"),
            Value::Procedure(_) => write!(f, "<Procedure>"),
            Value::BinaryData(bytes) => write!(f, "<{} bytes>", bytes.len()),
            Value::Complex(c) => write!(f, "{}", c),
            Value::Eval(e) => write!(f, "{}", e.expression()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<ValueDict> for Value {
    fn from(v: ValueDict) -> Self {
        Value::Dict(v)
    }
}

impl From<Ratio> for Value {
    fn from(v: Ratio) -> Self {
        Value::Ratio(v)
    }
}

impl From<StructValue> for Value {
    fn from(v: StructValue) -> Self {
        Value::Struct(v)
    }
}

impl From<EnumerationValue> for Value {
    fn from(v: EnumerationValue) -> Self {
        Value::Enumeration(v)
    }
}

impl From<Complex64> for Value {
    fn from(v: Complex64) -> Self {
        Value::Complex(v)
    }
}

impl From<PropertyObject> for Value {
    fn from(v: PropertyObject) -> Self {
        Value::Object(v)
    }
}

impl From<EvalValue> for Value {
    fn from(v: EvalValue) -> Self {
        Value::Eval(v)
    }
}

impl From<Unit> for Value {
    fn from(v: Unit) -> Self {
        v.to_value()
    }
}

/// Build a `Value::List` from anything convertible.
pub fn list<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Value {
    Value::List(items.into_iter().map(Into::into).collect())
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_core_type_codes_round_trip() {
        for ty in [
            CoreType::Bool,
            CoreType::Int,
            CoreType::Float,
            CoreType::String,
            CoreType::List,
            CoreType::Dict,
            CoreType::Ratio,
            CoreType::Proc,
            CoreType::Object,
            CoreType::BinaryData,
            CoreType::Func,
            CoreType::ComplexNumber,
            CoreType::Struct,
            CoreType::Enumeration,
            CoreType::Undefined,
        ] {
            assert_eq!(CoreType::from_code(ty.code()), Some(ty));
        }
        assert_eq!(CoreType::from_code(99), None);
    }

    #[test]
    fn test_numeric_conversions() {
        assert_eq!(Value::Int(3).convert_to(CoreType::Float).unwrap(), Value::Float(3.0));
        assert_eq!(Value::Float(3.9).convert_to(CoreType::Int).unwrap(), Value::Int(3));
        assert_eq!(Value::Bool(true).convert_to(CoreType::Int).unwrap(), Value::Int(1));
        assert_eq!(
            Value::from("2.5").convert_to(CoreType::Float).unwrap(),
            Value::Float(2.5)
        );
        assert_eq!(
            Value::Int(5).convert_to(CoreType::String).unwrap(),
            Value::from("5")
        );
    }

    #[test]
    fn test_conversion_failure() {
        let err = Value::from("abc").convert_to(CoreType::Int).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ConversionFailed);
        assert!(Value::List(vec![]).convert_to(CoreType::Int).is_err());
        assert!(Value::Float(f64::NAN).convert_to(CoreType::Int).is_err());
    }

    #[test]
    fn test_ratio_normalizes_sign_and_compares_simplified() {
        let r = Ratio::new(1, -2).unwrap();
        assert_eq!(r.numerator(), -1);
        assert_eq!(r.denominator(), 2);
        assert_eq!(
            Value::Ratio(Ratio::new(2, 4).unwrap()),
            Value::Ratio(Ratio::new(1, 2).unwrap())
        );
        assert!(Ratio::new(1, 0).is_err());
    }

    #[test]
    fn test_dict_insert_replaces_and_keeps_order() {
        let mut dict = ValueDict::new();
        dict.insert(0, "a");
        dict.insert(5, "d");
        dict.insert(0, "z");
        let keys: Vec<_> = dict.keys().cloned().collect();
        assert_eq!(keys, vec![Value::Int(0), Value::Int(5)]);
        assert_eq!(dict.get(&Value::Int(0)), Some(&Value::from("z")));
        assert_eq!(dict.key_type(), CoreType::Int);
        assert_eq!(dict.value_type(), CoreType::String);
    }

    #[test]
    fn test_unit_struct_round_trip() {
        let unit = Unit {
            id: 5,
            symbol: "V".into(),
            name: "volt".into(),
            quantity: "voltage".into(),
        };
        let value = unit.to_value();
        assert_eq!(value.core_type(), CoreType::Struct);
        assert_eq!(Unit::from_value(&value).unwrap(), unit);
        assert_eq!(Unit::from_value(&Value::from("ms")).unwrap().symbol, "ms");
    }

    #[test]
    fn test_callable_errors_surface_as_call_failed() {
        let f = Callable::new(|_| Err(anyhow::anyhow!("boom")));
        let err = f.call(&[]).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::CallFailed);
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Undefined.is_truthy());
        assert!(Value::Int(2).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(list([1, 2]).is_truthy());
    }
}
