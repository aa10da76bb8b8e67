//! Typed parameter model.
//!
//! A [`Declaration`] is the write-once record the registry keeps per
//! parameter name; [`ParameterValue`] is what flows through an update batch.

use serde::Serialize;
use strum::{Display, EnumIter, EnumString};

/// ROS 2 `rcl_interfaces/msg/ParameterType` codes.
pub mod parameter_type {
    pub const BOOL: u8 = 1;
    pub const INTEGER: u8 = 2;
    pub const DOUBLE: u8 = 3;
    pub const STRING: u8 = 4;
    pub const BYTE_ARRAY: u8 = 5;
    pub const BOOL_ARRAY: u8 = 6;
    pub const INTEGER_ARRAY: u8 = 7;
    pub const DOUBLE_ARRAY: u8 = 8;
    pub const STRING_ARRAY: u8 = 9;
}

/// The type of a parameter value.
///
/// The string form (`integer`, `double_array`, ...) is the `type` tag used in
/// parameter files.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    Bool,
    BoolArray,
    Integer,
    IntegerArray,
    Double,
    DoubleArray,
    String,
    StringArray,
    ByteArray,
}

impl ParameterType {
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Bool => parameter_type::BOOL,
            Self::Integer => parameter_type::INTEGER,
            Self::Double => parameter_type::DOUBLE,
            Self::String => parameter_type::STRING,
            Self::ByteArray => parameter_type::BYTE_ARRAY,
            Self::BoolArray => parameter_type::BOOL_ARRAY,
            Self::IntegerArray => parameter_type::INTEGER_ARRAY,
            Self::DoubleArray => parameter_type::DOUBLE_ARRAY,
            Self::StringArray => parameter_type::STRING_ARRAY,
        }
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            parameter_type::BOOL => Some(Self::Bool),
            parameter_type::INTEGER => Some(Self::Integer),
            parameter_type::DOUBLE => Some(Self::Double),
            parameter_type::STRING => Some(Self::String),
            parameter_type::BYTE_ARRAY => Some(Self::ByteArray),
            parameter_type::BOOL_ARRAY => Some(Self::BoolArray),
            parameter_type::INTEGER_ARRAY => Some(Self::IntegerArray),
            parameter_type::DOUBLE_ARRAY => Some(Self::DoubleArray),
            parameter_type::STRING_ARRAY => Some(Self::StringArray),
            _ => None,
        }
    }

    /// Integer and integer-array parameters carry an [`IntegerRange`].
    pub fn is_integer(self) -> bool {
        matches!(self, Self::Integer | Self::IntegerArray)
    }

    /// Double and double-array parameters carry a [`FloatingPointRange`].
    pub fn is_floating_point(self) -> bool {
        matches!(self, Self::Double | Self::DoubleArray)
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_floating_point()
    }
}

/// A typed parameter value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(std::string::String),
    ByteArray(Vec<u8>),
    BoolArray(Vec<bool>),
    IntegerArray(Vec<i64>),
    DoubleArray(Vec<f64>),
    StringArray(Vec<std::string::String>),
}

impl ParameterValue {
    /// Returns the parameter type of this value.
    pub fn parameter_type(&self) -> ParameterType {
        match self {
            Self::Bool(_) => ParameterType::Bool,
            Self::Integer(_) => ParameterType::Integer,
            Self::Double(_) => ParameterType::Double,
            Self::String(_) => ParameterType::String,
            Self::ByteArray(_) => ParameterType::ByteArray,
            Self::BoolArray(_) => ParameterType::BoolArray,
            Self::IntegerArray(_) => ParameterType::IntegerArray,
            Self::DoubleArray(_) => ParameterType::DoubleArray,
            Self::StringArray(_) => ParameterType::StringArray,
        }
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for ParameterValue {
                fn from(v: $ty) -> Self {
                    Self::$variant(v)
                }
            }
        )*
    };
}

impl_from_value! {
    bool => Bool,
    i64 => Integer,
    f64 => Double,
    std::string::String => String,
    Vec<u8> => ByteArray,
    Vec<bool> => BoolArray,
    Vec<i64> => IntegerArray,
    Vec<f64> => DoubleArray,
    Vec<std::string::String> => StringArray,
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

/// Extraction of a concrete Rust value out of a [`ParameterValue`].
///
/// Implemented for every payload type so host fields can be mirrored with
/// their natural Rust type.
pub trait FromParameterValue: Sized {
    fn from_parameter_value(value: &ParameterValue) -> Option<Self>;
}

macro_rules! impl_from_parameter_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FromParameterValue for $ty {
                fn from_parameter_value(value: &ParameterValue) -> Option<Self> {
                    match value {
                        ParameterValue::$variant(v) => Some(v.clone()),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_from_parameter_value! {
    bool => Bool,
    i64 => Integer,
    f64 => Double,
    std::string::String => String,
    Vec<u8> => ByteArray,
    Vec<bool> => BoolArray,
    Vec<i64> => IntegerArray,
    Vec<f64> => DoubleArray,
    Vec<std::string::String> => StringArray,
}

impl FromParameterValue for ParameterValue {
    fn from_parameter_value(value: &ParameterValue) -> Option<Self> {
        Some(value.clone())
    }
}

/// A parameter with its name and value.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: std::string::String,
    pub value: ParameterValue,
}

impl Parameter {
    pub fn new(name: impl Into<std::string::String>, value: impl Into<ParameterValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Range constraint for floating point parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FloatingPointRange {
    pub from_value: f64,
    pub to_value: f64,
    pub step: f64,
}

impl FloatingPointRange {
    /// Check a single value against the range and step grid.
    ///
    /// The upper bound is always valid, even when off the step grid.
    pub fn check(&self, value: f64) -> Result<(), std::string::String> {
        if value.is_nan() {
            return Err("value is NaN".to_string());
        }
        if value < self.from_value || value > self.to_value {
            return Err(format!(
                "value {} out of range [{}, {}]",
                value, self.from_value, self.to_value
            ));
        }

        if self.step != 0.0 {
            let offset = value - self.from_value;
            let remainder = offset % self.step.abs();
            // Allow small floating point errors
            if remainder > 1e-9
                && (self.step.abs() - remainder) > 1e-9
                && (value - self.to_value).abs() > 1e-9
            {
                return Err(format!(
                    "value {} not on step grid (from={}, step={})",
                    value, self.from_value, self.step
                ));
            }
        }

        Ok(())
    }
}

/// Range constraint for integer parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IntegerRange {
    pub from_value: i64,
    pub to_value: i64,
    pub step: u64,
}

impl IntegerRange {
    /// Check a single value against the range and step grid.
    ///
    /// The upper bound is always valid, even when off the step grid.
    pub fn check(&self, value: i64) -> Result<(), std::string::String> {
        if value < self.from_value || value > self.to_value {
            return Err(format!(
                "value {} out of range [{}, {}]",
                value, self.from_value, self.to_value
            ));
        }

        if self.step != 0 {
            let offset = value.abs_diff(self.from_value);
            if offset % self.step != 0 && value != self.to_value {
                return Err(format!(
                    "value {} not on step grid (from={}, step={})",
                    value, self.from_value, self.step
                ));
            }
        }

        Ok(())
    }
}

/// Bounds and step of a numeric parameter. `step == 0` disables the grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NumericConstraint {
    Integer(IntegerRange),
    FloatingPoint(FloatingPointRange),
}

impl NumericConstraint {
    /// Whether the lower bound does not exceed the upper bound.
    pub fn is_ordered(&self) -> bool {
        match self {
            Self::Integer(r) => r.from_value <= r.to_value,
            Self::FloatingPoint(r) => r.from_value <= r.to_value,
        }
    }

    /// Check every numeric element of `value` against this constraint.
    ///
    /// Values whose kind does not match the constraint are left to the type
    /// check and pass here.
    pub fn check(&self, value: &ParameterValue) -> Result<(), std::string::String> {
        match (self, value) {
            (Self::Integer(r), ParameterValue::Integer(v)) => r.check(*v),
            (Self::Integer(r), ParameterValue::IntegerArray(vs)) => {
                vs.iter().try_for_each(|v| r.check(*v))
            }
            (Self::FloatingPoint(r), ParameterValue::Double(v)) => r.check(*v),
            (Self::FloatingPoint(r), ParameterValue::DoubleArray(vs)) => {
                vs.iter().try_for_each(|v| r.check(*v))
            }
            _ => Ok(()),
        }
    }
}

/// Write-once metadata for one declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: std::string::String,
    pub type_: ParameterType,
    pub default_value: ParameterValue,
    pub numeric_constraint: Option<NumericConstraint>,
    pub description: std::string::String,
    pub additional_constraints: std::string::String,
    pub read_only: bool,
    /// Name of the host field mirroring the live value.
    pub backing_field: Option<std::string::String>,
    /// Name of the host predicate consulted before accepting an update.
    pub validator: Option<std::string::String>,
}

impl Declaration {
    /// Create a declaration whose type is inferred from `default`.
    pub fn new(name: impl Into<std::string::String>, default: impl Into<ParameterValue>) -> Self {
        let default_value = default.into();
        Self {
            name: name.into(),
            type_: default_value.parameter_type(),
            default_value,
            numeric_constraint: None,
            description: std::string::String::new(),
            additional_constraints: std::string::String::new(),
            read_only: false,
            backing_field: None,
            validator: None,
        }
    }

    pub fn with_integer_range(mut self, from_value: i64, to_value: i64, step: u64) -> Self {
        self.numeric_constraint = Some(NumericConstraint::Integer(IntegerRange {
            from_value,
            to_value,
            step,
        }));
        self
    }

    pub fn with_floating_point_range(mut self, from_value: f64, to_value: f64, step: f64) -> Self {
        self.numeric_constraint = Some(NumericConstraint::FloatingPoint(FloatingPointRange {
            from_value,
            to_value,
            step,
        }));
        self
    }

    pub fn with_description(mut self, description: impl Into<std::string::String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_additional_constraints(
        mut self,
        constraints: impl Into<std::string::String>,
    ) -> Self {
        self.additional_constraints = constraints.into();
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Mirror the live value into the host field registered under `field`.
    /// An empty name means no mirrored field.
    pub fn with_backing_field(mut self, field: impl Into<std::string::String>) -> Self {
        self.backing_field = non_empty(field.into());
        self
    }

    /// Consult the host predicate registered under `validator` on update.
    /// An empty name means no predicate.
    pub fn with_validator(mut self, validator: impl Into<std::string::String>) -> Self {
        self.validator = non_empty(validator.into());
        self
    }

    /// Package this declaration the way the host framework receives it.
    pub fn to_native(&self) -> NativeDeclaration {
        let (integer_range, floating_point_range) = match self.numeric_constraint {
            Some(NumericConstraint::Integer(r)) => (vec![r], Vec::new()),
            Some(NumericConstraint::FloatingPoint(r)) => (Vec::new(), vec![r]),
            None => (Vec::new(), Vec::new()),
        };
        NativeDeclaration {
            name: self.name.clone(),
            type_: self.type_,
            default_value: self.default_value.clone(),
            description: self.description.clone(),
            additional_constraints: self.additional_constraints.clone(),
            read_only: self.read_only,
            dynamic_typing: false,
            integer_range,
            floating_point_range,
        }
    }
}

fn non_empty(s: std::string::String) -> Option<std::string::String> {
    if s.is_empty() { None } else { Some(s) }
}

/// The attributes forwarded to the host framework's own declaration
/// mechanism, shaped like an `rcl_interfaces/msg/ParameterDescriptor`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NativeDeclaration {
    pub name: std::string::String,
    #[serde(rename = "type")]
    pub type_: ParameterType,
    pub default_value: ParameterValue,
    pub description: std::string::String,
    pub additional_constraints: std::string::String,
    pub read_only: bool,
    pub dynamic_typing: bool,
    /// At most one element.
    pub integer_range: Vec<IntegerRange>,
    /// At most one element.
    pub floating_point_range: Vec<FloatingPointRange>,
}

impl NativeDeclaration {
    /// The single numeric range carried by this descriptor, if any.
    pub fn numeric_constraint(&self) -> Option<NumericConstraint> {
        self.integer_range
            .first()
            .copied()
            .map(NumericConstraint::Integer)
            .or_else(|| {
                self.floating_point_range
                    .first()
                    .copied()
                    .map(NumericConstraint::FloatingPoint)
            })
    }
}

/// Outcome of an update batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionResult {
    pub accepted: bool,
    pub failure_reason: std::string::String,
}

impl TransactionResult {
    pub fn success() -> Self {
        Self {
            accepted: true,
            failure_reason: std::string::String::new(),
        }
    }

    pub fn failure(reason: impl Into<std::string::String>) -> Self {
        Self {
            accepted: false,
            failure_reason: reason.into(),
        }
    }
}
