use thiserror::Error;

use crate::arena::ObjectId;
use crate::object::ObjectKind;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("duplicate parameter `{0}` in parameter collection")]
    DuplicateParameter(String),

    #[error("there is no parameter named `{0}`")]
    UnknownParameter(String),

    #[error("too many arguments supplied: ordinal {ordinal} exceeds {count} parameter(s)")]
    ParameterOrdinalOutOfRange { ordinal: usize, count: usize },

    #[error("object {0} is not in the corpus")]
    UnknownObject(ObjectId),

    #[error("expected {expected:?} but `{name}` resolves to {found:?}")]
    KindMismatch {
        name: String,
        expected: ObjectKind,
        found: ObjectKind,
    },

    #[error("document `{0}` is not in the corpus")]
    UnknownDocument(String),

    #[error("`{0}` is not a valid corpus path")]
    InvalidCorpusPath(String),

    #[error("a document already exists at `{0}`")]
    DuplicateDocument(String),

    #[error("unable to load import `{path}`: {reason}")]
    ImportFailed { path: String, reason: String },
}

pub type ModelResult<T> = std::result::Result<T, ModelError>;
