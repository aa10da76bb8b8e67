//! Error types for declaration, bootstrap and update.
//!
//! Bootstrap errors are returned to the host and are expected to abort
//! startup. [`UpdateError`] never crosses the update callback boundary: it is
//! rendered into [`TransactionResult`](crate::TransactionResult) instead.

use std::path::PathBuf;

use crate::types::ParameterType;

/// Failure to insert a declaration into the store.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeclareError {
    #[error("parameter name is empty")]
    EmptyName,

    #[error("parameter '{0}' already declared")]
    AlreadyDeclared(String),

    #[error("parameter '{name}' of type {type_} requires a numeric range")]
    MissingConstraint { name: String, type_: ParameterType },

    #[error("parameter '{name}' of type {type_} cannot carry this numeric range")]
    UnexpectedConstraint { name: String, type_: ParameterType },

    #[error("parameter '{0}' has a lower bound greater than its upper bound")]
    InvalidBounds(String),

    #[error("parameter '{0}' has an invalid step")]
    InvalidStep(String),

    #[error("default value of parameter '{name}' is {actual}, expected {expected}")]
    DefaultTypeMismatch {
        name: String,
        expected: ParameterType,
        actual: ParameterType,
    },

    #[error("default value of parameter '{name}' violates its range: {reason}")]
    DefaultOutOfRange { name: String, reason: String },
}

/// Failure to turn one raw file record into a typed declaration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeclarationError {
    #[error("unsupported parameter type: {0}")]
    UnsupportedType(String),

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("numeric parameter is missing '{0}'")]
    MissingBound(&'static str),

    #[error("field '{field}' is not a valid {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },

    #[error("unknown boolean text representation: {0}")]
    InvalidBool(String),
}

/// Rejection reported by the host framework's native declaration mechanism.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HostError {
    #[error("parameter '{0}' already declared")]
    AlreadyDeclared(String),

    #[error("parameter '{0}' not declared")]
    NotDeclared(String),

    #[error("parameter '{0}' is read-only")]
    ReadOnly(String),

    #[error("parameter '{name}': type mismatch, expected {expected} but got {actual}")]
    TypeMismatch {
        name: String,
        expected: ParameterType,
        actual: ParameterType,
    },

    #[error("invalid value for parameter '{name}': {reason}")]
    InvalidValue { name: String, reason: String },
}

/// Fatal failure while bootstrapping the registry.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("parameters file not found: {path:?}")]
    FileMissing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in {path:?}: {source}")]
    FileMalformed {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid parameters file: {0}")]
    SchemaInvalid(String),

    #[error("failed to parse configuration of parameter {name}: {source}")]
    Declaration {
        name: String,
        #[source]
        source: DeclarationError,
    },

    #[error("failed to declare parameter {name}: {source}")]
    Declare {
        name: String,
        #[source]
        source: DeclareError,
    },

    #[error("host rejected parameter {name}: {source}")]
    Host {
        name: String,
        #[source]
        source: HostError,
    },

    #[error("initial value of parameter {name} rejected: {source}")]
    InitialValue {
        name: String,
        #[source]
        source: UpdateError,
    },

    #[error("invalid registry configuration: {0}")]
    Config(String),
}

/// Failure to read a ROS 2 parameter file of value overrides.
#[derive(Debug, thiserror::Error)]
pub enum OverrideError {
    #[error("failed to read parameter file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse parameter file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid parameter file: {0}")]
    Schema(String),
}

/// Failure to turn a `NAME=VALUE` assignment into a [`Parameter`](crate::Parameter).
#[derive(Debug, thiserror::Error)]
pub enum AssignmentError {
    #[error("expected NAME=VALUE, got '{0}'")]
    MissingSeparator(String),

    #[error("value of '{name}' is not valid YAML: {source}")]
    Yaml {
        name: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("value of '{name}': {source}")]
    Value {
        name: String,
        #[source]
        source: DeclarationError,
    },
}

/// Rejection of one item of an update batch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UpdateError {
    #[error("Parameter '{0}' type mismatch")]
    TypeMismatch(String),

    #[error("Parameter '{0}' is read-only")]
    ReadOnly(String),

    #[error("Parameter '{name}' out of range: {reason}")]
    OutOfRange { name: String, reason: String },

    #[error("Parameter '{0}' update validation failed")]
    ValidationRejected(String),
}

pub type Result<T> = std::result::Result<T, BootstrapError>;
