//! Error types for the property system.
//!
//! Every fallible operation in this crate returns [`CoreResult`], whose error
//! type [`CoreObjectsError`] is a `thiserror` enum with one variant per failure
//! kind. Callers that need to branch on the failure (for example, retrying a
//! write through the protected API after an access-denied error) should match
//! on [`CoreObjectsError::kind`] rather than on the message text.
//!
//! ## Error Categories
//!
//! - **Lookup**: `NotFound`, `ArgumentNull`, `NoOwner`
//! - **Descriptor validation**: `InvalidState`
//! - **Path addressing**: `InvalidParameter`, `OutOfRange`
//! - **Write guards**: `AccessDenied`, `Frozen`, `AlreadyExists`
//! - **Value pipeline**: `ConversionFailed`, `NoInterface`, `CoerceFailed`, `ValidateFailed`
//! - **Expressions**: `ParseFailed`
//! - **Wrapped sources**: `CallFailed` (user callables), `Config` (figment),
//!   `Serialization` (serde_json)

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type CoreResult<T> = std::result::Result<T, CoreObjectsError>;

/// Distinguishable failure kind, independent of the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Required argument missing.
    ArgumentNull,
    /// Name, type or field does not exist.
    NotFound,
    /// Descriptor or object in an inconsistent state.
    InvalidState,
    /// Argument rejected by the operation.
    InvalidParameter,
    /// Index or arithmetic result out of range.
    OutOfRange,
    /// Read-only property or missing permission.
    AccessDenied,
    /// Mutation of a frozen object.
    Frozen,
    /// Duplicate property or type name.
    AlreadyExists,
    /// Value cannot be converted to the required type.
    ConversionFailed,
    /// Operation not supported by this kind of value.
    NoInterface,
    /// Coercer expression failed.
    CoerceFailed,
    /// Validator rejected the value.
    ValidateFailed,
    /// Property or expression is not bound to an object.
    NoOwner,
    /// Malformed expression.
    ParseFailed,
    /// User callable returned an error.
    CallFailed,
    /// Configuration could not be loaded.
    Config,
    /// JSON text could not be read or written.
    Serialization,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ErrorKind::ArgumentNull => "argument_null",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::InvalidParameter => "invalid_parameter",
            ErrorKind::OutOfRange => "out_of_range",
            ErrorKind::AccessDenied => "access_denied",
            ErrorKind::Frozen => "frozen",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::ConversionFailed => "conversion_failed",
            ErrorKind::NoInterface => "no_interface",
            ErrorKind::CoerceFailed => "coerce_failed",
            ErrorKind::ValidateFailed => "validate_failed",
            ErrorKind::NoOwner => "no_owner",
            ErrorKind::ParseFailed => "parse_failed",
            ErrorKind::CallFailed => "call_failed",
            ErrorKind::Config => "config",
            ErrorKind::Serialization => "serialization",
        };
        write!(f, "{}", label)
    }
}

/// Primary error type for property, class and property-object operations.
///
/// Write-pipeline failures (`CoerceFailed`, `ValidateFailed`,
/// `ConversionFailed`) are atomic: the stored value is left untouched.
#[derive(Error, Debug)]
pub enum CoreObjectsError {
    /// A required handle or argument was missing.
    #[error("Argument is null: {0}")]
    ArgumentNull(String),

    /// A property, class, type or field name could not be resolved.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An object is in a state that does not allow the operation, most often
    /// a property descriptor whose metadata combination is illegal.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A parameter was malformed, e.g. indexing a non-list property.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// An index addressed past the end of a list.
    #[error("Out of range: {0}")]
    OutOfRange(String),

    /// A read-only property (or a write-protected object) was written through
    /// the public path.
    ///
    /// **Recovery Strategy**: privileged callers may retry through
    /// `set_protected_property_value`.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// The object was frozen and can no longer be mutated.
    #[error("Object is frozen: {0}")]
    Frozen(String),

    /// A unique name or owner slot is already taken.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// A value could not be converted to the property's declared type.
    #[error("Conversion failed: {0}")]
    ConversionFailed(String),

    /// A value does not expose the capability the operation needs
    /// (e.g. calling a non-callable value).
    #[error("No interface: {0}")]
    NoInterface(String),

    /// The property's coercer expression failed.
    #[error("Coercion failed: {0}")]
    CoerceFailed(String),

    /// The property's validator expression rejected the value.
    #[error("Validation failed: {0}")]
    ValidateFailed(String),

    /// A property-level value or event was accessed while the property is not
    /// attached to a property object.
    #[error("Property has no owner: {0}")]
    NoOwner(String),

    /// An expression string could not be parsed.
    #[error("Expression parse error: {0}")]
    ParseFailed(String),

    /// A user supplied function or procedure returned an error.
    #[error("Callable failed: {0}")]
    CallFailed(#[from] anyhow::Error),

    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    /// Serialized text could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreObjectsError {
    /// Returns the failure kind for pattern matching.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreObjectsError::ArgumentNull(_) => ErrorKind::ArgumentNull,
            CoreObjectsError::NotFound(_) => ErrorKind::NotFound,
            CoreObjectsError::InvalidState(_) => ErrorKind::InvalidState,
            CoreObjectsError::InvalidParameter(_) => ErrorKind::InvalidParameter,
            CoreObjectsError::OutOfRange(_) => ErrorKind::OutOfRange,
            CoreObjectsError::AccessDenied(_) => ErrorKind::AccessDenied,
            CoreObjectsError::Frozen(_) => ErrorKind::Frozen,
            CoreObjectsError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            CoreObjectsError::ConversionFailed(_) => ErrorKind::ConversionFailed,
            CoreObjectsError::NoInterface(_) => ErrorKind::NoInterface,
            CoreObjectsError::CoerceFailed(_) => ErrorKind::CoerceFailed,
            CoreObjectsError::ValidateFailed(_) => ErrorKind::ValidateFailed,
            CoreObjectsError::NoOwner(_) => ErrorKind::NoOwner,
            CoreObjectsError::ParseFailed(_) => ErrorKind::ParseFailed,
            CoreObjectsError::CallFailed(_) => ErrorKind::CallFailed,
            CoreObjectsError::Config(_) => ErrorKind::Config,
            CoreObjectsError::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// True if this error has the given kind.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind() == kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreObjectsError::AccessDenied("property 'Gain' is read-only".to_string());
        assert_eq!(
            err.to_string(),
            "Access denied: property 'Gain' is read-only"
        );
    }

    #[test]
    fn test_error_kind_matching() {
        let err = CoreObjectsError::Frozen("Config".into());
        assert_eq!(err.kind(), ErrorKind::Frozen);
        assert!(err.is(ErrorKind::Frozen));
        assert!(!err.is(ErrorKind::AccessDenied));
    }

    #[test]
    fn test_callable_error_conversion() {
        let err: CoreObjectsError = anyhow::anyhow!("device offline").into();
        assert_eq!(err.kind(), ErrorKind::CallFailed);
        assert!(err.to_string().contains("device offline"));
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(ErrorKind::OutOfRange.to_string(), "out_of_range");
        assert_eq!(ErrorKind::ValidateFailed.to_string(), "validate_failed");
    }
}
