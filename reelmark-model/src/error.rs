use std::fmt::{self, Display};

/// Errors produced by model constructors and validation routines.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    InvalidUnitId(String),
    UnknownKind(String),
    InvalidValue { field: &'static str, value: f64 },
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::InvalidUnitId(raw) => {
                write!(f, "invalid unit id: {raw:?}")
            }
            ModelError::UnknownKind(kind) => {
                write!(f, "unknown unit kind: {kind:?}")
            }
            ModelError::InvalidValue { field, value } => {
                write!(f, "invalid {field}: {value}")
            }
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;
