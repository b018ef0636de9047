//! Call signatures for Function and Procedure properties.

use serde::{Deserialize, Serialize};

use crate::error::{CoreObjectsError, CoreResult};
use crate::value::{CoreType, Value};

/// One declared argument of a callable property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentInfo {
    /// Name.
    pub name: String,
    /// Type the argument is converted to before the call.
    #[serde(rename = "valueType", with = "core_type_code")]
    pub value_type: CoreType,
}

impl ArgumentInfo {
    /// New instance.
    pub fn new(name: impl Into<String>, value_type: CoreType) -> Self {
        Self {
            name: name.into(),
            value_type,
        }
    }
}

/// Argument list and return type of a Function/Procedure property.
///
/// Procedures declare [`CoreType::Undefined`] as return type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallableInfo {
    #[serde(default)]
    arguments: Vec<ArgumentInfo>,
    #[serde(rename = "returnType", with = "core_type_code", default = "undefined")]
    return_type: CoreType,
}

fn undefined() -> CoreType {
    CoreType::Undefined
}

impl Default for CallableInfo {
    fn default() -> Self {
        Self::procedure(Vec::new())
    }
}

impl CallableInfo {
    /// Signature of a function.
    pub fn new(arguments: Vec<ArgumentInfo>, return_type: CoreType) -> Self {
        Self {
            arguments,
            return_type,
        }
    }

    /// Signature of a procedure (no return value).
    pub fn procedure(arguments: Vec<ArgumentInfo>) -> Self {
        Self::new(arguments, CoreType::Undefined)
    }

    /// Arguments.
    pub fn arguments(&self) -> &[ArgumentInfo] {
        &self.arguments
    }

    /// Return type.
    pub fn return_type(&self) -> CoreType {
        self.return_type
    }

    /// Check arity and convert each argument to its declared type.
    pub fn prepare_arguments(&self, args: &[Value]) -> CoreResult<Vec<Value>> {
        if args.len() != self.arguments.len() {
            return Err(CoreObjectsError::InvalidParameter(format!(
                "expected {} arguments, got {}",
                self.arguments.len(),
                args.len()
            )));
        }
        self.arguments
            .iter()
            .zip(args)
            .map(|(info, arg)| {
                arg.convert_to(info.value_type).map_err(|_| {
                    CoreObjectsError::InvalidParameter(format!(
                        "argument '{}' expects {}, got {}",
                        info.name,
                        info.value_type,
                        arg.core_type()
                    ))
                })
            })
            .collect()
    }
}

/// Serde adapter writing a [`CoreType`] as its numeric code.
pub(crate) mod core_type_code {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use crate::value::CoreType;

    pub fn serialize<S: Serializer>(ty: &CoreType, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(ty.code())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<CoreType, D::Error> {
        let code = u32::deserialize(deserializer)?;
        CoreType::from_code(code).ok_or_else(|| D::Error::custom(format!("unknown core type {}", code)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_argumentless_procedure() {
        let info = CallableInfo::default();
        assert!(info.arguments().is_empty());
        assert_eq!(info.return_type(), CoreType::Undefined);
    }

    #[test]
    fn test_prepare_arguments_converts_and_checks_arity() {
        let info = CallableInfo::new(
            vec![
                ArgumentInfo::new("channel", CoreType::Int),
                ArgumentInfo::new("gain", CoreType::Float),
            ],
            CoreType::Bool,
        );
        let args = info
            .prepare_arguments(&[Value::Int(1), Value::Int(2)])
            .unwrap();
        assert_eq!(args, vec![Value::Int(1), Value::Float(2.0)]);

        let err = info.prepare_arguments(&[Value::Int(1)]).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidParameter);

        let err = info
            .prepare_arguments(&[Value::from("x"), Value::Int(2)])
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidParameter);
    }

    #[test]
    fn test_json_shape_uses_type_codes() {
        let info = CallableInfo::procedure(vec![ArgumentInfo::new("enable", CoreType::Bool)]);
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["returnType"], 0xFFFF);
        assert_eq!(json["arguments"][0]["valueType"], 0);
        let back: CallableInfo = serde_json::from_value(json).unwrap();
        assert_eq!(back, info);
    }
}
