//! Parameter file loading.
//!
//! Parameter files declare every parameter a node manages:
//!
//! ```yaml
//! params:
//!   count:
//!     type: integer
//!     default_value: 5
//!     min_value: 0
//!     max_value: 10
//!     step: 1
//!     description: "Number of items."
//!     constraints: "Must be in [0, 10]."
//!     read_only: false
//!     var_name: count
//!     validator: validate_count
//!   label:
//!     type: string
//!     default_value: "x"
//!     description: "Display label."
//!     constraints: ""
//!     read_only: false
//! ```
//!
//! `min_value`, `max_value` and `step` are required for numeric types only.
//! `var_name` and `validator` are optional. Records are returned sorted by
//! name so declaration order never depends on the file layout.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use serde_yaml::{Mapping, Value};

use crate::error::{BootstrapError, DeclarationError};
use crate::types::{Declaration, ParameterType, ParameterValue};

/// Read and parse a parameter file.
pub fn read_params_file(path: &Path) -> Result<Value, BootstrapError> {
    let content = std::fs::read_to_string(path).map_err(|source| BootstrapError::FileMissing {
        path: path.to_path_buf(),
        source,
    })?;
    if content.trim().is_empty() {
        return Err(BootstrapError::SchemaInvalid(format!(
            "parameters file is empty: {:?}",
            path
        )));
    }
    serde_yaml::from_str(&content).map_err(|source| BootstrapError::FileMalformed {
        path: path.to_path_buf(),
        source,
    })
}

/// Extract the `params` mapping of a parsed document, sorted by name.
pub fn params_mapping(doc: &Value) -> Result<BTreeMap<String, Value>, BootstrapError> {
    let root = doc
        .as_mapping()
        .ok_or_else(|| BootstrapError::SchemaInvalid("document root must be a mapping".into()))?;
    let params = root
        .get("params")
        .ok_or_else(|| BootstrapError::SchemaInvalid("missing top-level 'params' key".into()))?
        .as_mapping()
        .ok_or_else(|| BootstrapError::SchemaInvalid("'params' must be a mapping".into()))?;

    let mut sorted = BTreeMap::new();
    for (key, record) in params {
        let name = key
            .as_str()
            .ok_or_else(|| BootstrapError::SchemaInvalid("parameter names must be strings".into()))?;
        sorted.insert(name.to_string(), record.clone());
    }
    Ok(sorted)
}

/// Parse a boolean encoded as text. Only `true`, `True`, `false` and `False`
/// are accepted.
pub fn parse_bool_str(word: &str) -> Result<bool, DeclarationError> {
    match word {
        "true" | "True" => Ok(true),
        "false" | "False" => Ok(false),
        _ => Err(DeclarationError::InvalidBool(word.to_string())),
    }
}

/// Build a typed declaration from one raw record.
pub fn parse_declaration(name: &str, record: &Value) -> Result<Declaration, DeclarationError> {
    let fields = record
        .as_mapping()
        .ok_or(DeclarationError::InvalidField {
            field: "record",
            expected: "mapping",
        })?;

    let tag = text(required(fields, "type")?, "type")?;
    let type_ =
        ParameterType::from_str(&tag).map_err(|_| DeclarationError::UnsupportedType(tag.clone()))?;

    let default = required(fields, "default_value")?;
    let default_value = match type_ {
        ParameterType::Bool => ParameterValue::Bool(boolean(default, "default_value")?),
        ParameterType::Integer => ParameterValue::Integer(integer(default, "default_value")?),
        ParameterType::Double => ParameterValue::Double(double(default, "default_value")?),
        ParameterType::String => ParameterValue::String(text(default, "default_value")?),
        ParameterType::BoolArray => {
            ParameterValue::BoolArray(sequence(default, |v| boolean(v, "default_value"))?)
        }
        ParameterType::IntegerArray => {
            ParameterValue::IntegerArray(sequence(default, |v| integer(v, "default_value"))?)
        }
        ParameterType::DoubleArray => {
            ParameterValue::DoubleArray(sequence(default, |v| double(v, "default_value"))?)
        }
        ParameterType::StringArray => {
            ParameterValue::StringArray(sequence(default, |v| text(v, "default_value"))?)
        }
        ParameterType::ByteArray => ParameterValue::ByteArray(sequence(default, byte)?),
    };

    let mut decl = Declaration::new(name, default_value)
        .with_description(text(required(fields, "description")?, "description")?)
        .with_additional_constraints(text(required(fields, "constraints")?, "constraints")?)
        .read_only(boolean(required(fields, "read_only")?, "read_only")?)
        .with_backing_field(optional_text(fields, "var_name")?)
        .with_validator(optional_text(fields, "validator")?);

    if type_.is_integer() {
        let step = integer(bound(fields, "step")?, "step")?;
        let step = u64::try_from(step).map_err(|_| DeclarationError::InvalidField {
            field: "step",
            expected: "non-negative integer",
        })?;
        decl = decl.with_integer_range(
            integer(bound(fields, "min_value")?, "min_value")?,
            integer(bound(fields, "max_value")?, "max_value")?,
            step,
        );
    } else if type_.is_floating_point() {
        decl = decl.with_floating_point_range(
            double(bound(fields, "min_value")?, "min_value")?,
            double(bound(fields, "max_value")?, "max_value")?,
            double(bound(fields, "step")?, "step")?,
        );
    }

    Ok(decl)
}

fn required<'a>(fields: &'a Mapping, key: &'static str) -> Result<&'a Value, DeclarationError> {
    fields.get(key).ok_or(DeclarationError::MissingField(key))
}

fn bound<'a>(fields: &'a Mapping, key: &'static str) -> Result<&'a Value, DeclarationError> {
    fields.get(key).ok_or(DeclarationError::MissingBound(key))
}

fn optional_text(fields: &Mapping, key: &'static str) -> Result<String, DeclarationError> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(v) => text(v, key),
    }
}

/// Any scalar reads as text.
fn text(value: &Value, field: &'static str) -> Result<String, DeclarationError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(DeclarationError::InvalidField {
            field,
            expected: "string",
        }),
    }
}

fn boolean(value: &Value, field: &'static str) -> Result<bool, DeclarationError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => parse_bool_str(s),
        _ => Err(DeclarationError::InvalidField {
            field,
            expected: "boolean",
        }),
    }
}

fn integer(value: &Value, field: &'static str) -> Result<i64, DeclarationError> {
    let invalid = DeclarationError::InvalidField {
        field,
        expected: "integer",
    };
    match value {
        Value::Number(n) => n.as_i64().ok_or(invalid),
        Value::String(s) => s.trim().parse().map_err(|_| invalid),
        _ => Err(invalid),
    }
}

fn double(value: &Value, field: &'static str) -> Result<f64, DeclarationError> {
    let invalid = DeclarationError::InvalidField {
        field,
        expected: "number",
    };
    match value {
        Value::Number(n) => n.as_f64().ok_or(invalid),
        Value::String(s) => s.trim().parse().map_err(|_| invalid),
        _ => Err(invalid),
    }
}

fn byte(value: &Value) -> Result<u8, DeclarationError> {
    let v = integer(value, "default_value")?;
    u8::try_from(v).map_err(|_| DeclarationError::InvalidField {
        field: "default_value",
        expected: "byte (0-255)",
    })
}

fn sequence<T>(
    value: &Value,
    item: impl Fn(&Value) -> Result<T, DeclarationError>,
) -> Result<Vec<T>, DeclarationError> {
    value
        .as_sequence()
        .ok_or(DeclarationError::InvalidField {
            field: "default_value",
            expected: "sequence",
        })?
        .iter()
        .map(item)
        .collect()
}

/// Convert a free-form YAML value to a [`ParameterValue`] of the requested
/// type, used for values typed on a command line.
pub fn coerce_value(value: &Value, type_: ParameterType) -> Result<ParameterValue, DeclarationError> {
    const FIELD: &str = "value";
    Ok(match type_ {
        ParameterType::Bool => ParameterValue::Bool(boolean(value, FIELD)?),
        ParameterType::Integer => ParameterValue::Integer(integer(value, FIELD)?),
        ParameterType::Double => ParameterValue::Double(double(value, FIELD)?),
        ParameterType::String => ParameterValue::String(text(value, FIELD)?),
        ParameterType::BoolArray => {
            ParameterValue::BoolArray(sequence(value, |v| boolean(v, FIELD))?)
        }
        ParameterType::IntegerArray => {
            ParameterValue::IntegerArray(sequence(value, |v| integer(v, FIELD))?)
        }
        ParameterType::DoubleArray => {
            ParameterValue::DoubleArray(sequence(value, |v| double(v, FIELD))?)
        }
        ParameterType::StringArray => {
            ParameterValue::StringArray(sequence(value, |v| text(v, FIELD))?)
        }
        ParameterType::ByteArray => ParameterValue::ByteArray(sequence(value, byte)?),
    })
}
