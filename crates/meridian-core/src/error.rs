//! Error types for Meridian.

use std::fmt;

use crate::meta::MetaError;
use crate::object::ObjectError;
use crate::property::PropertyError;

/// The main error type for Meridian operations.
#[derive(Debug)]
pub enum MeridianError {
    /// Meta-object system error.
    Meta(MetaError),
    /// Property-related error.
    Property(PropertyError),
    /// Object-related error.
    Object(ObjectError),
}

impl fmt::Display for MeridianError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Meta(err) => write!(f, "Meta-object error: {err}"),
            Self::Property(err) => write!(f, "Property error: {err}"),
            Self::Object(err) => write!(f, "Object error: {err}"),
        }
    }
}

impl std::error::Error for MeridianError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Meta(err) => Some(err),
            Self::Property(err) => Some(err),
            Self::Object(err) => Some(err),
        }
    }
}

impl From<MetaError> for MeridianError {
    fn from(err: MetaError) -> Self {
        Self::Meta(err)
    }
}

impl From<PropertyError> for MeridianError {
    fn from(err: PropertyError) -> Self {
        Self::Property(err)
    }
}

impl From<ObjectError> for MeridianError {
    fn from(err: ObjectError) -> Self {
        Self::Object(err)
    }
}

/// A specialized Result type for Meridian operations.
pub type Result<T> = std::result::Result<T, MeridianError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::Label;

    #[test]
    fn test_error_conversion_and_display() {
        let err: MeridianError = MetaError::SignalNotFound { label: Label(3) }.into();
        assert!(err.to_string().contains("label 3"));

        let err: MeridianError = ObjectError::InvalidObjectId.into();
        assert!(matches!(err, MeridianError::Object(_)));

        let err: MeridianError = PropertyError::NotFound { name: "x".into() }.into();
        assert!(err.to_string().contains("'x'"));
    }
}
