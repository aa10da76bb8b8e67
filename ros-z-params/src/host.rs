//! Host-side capabilities.
//!
//! The registry never reaches into the host node. Instead the host hands it
//! two narrow things:
//!
//! - a [`ParameterHost`], the node's own parameter-declaration mechanism;
//! - a [`HostBindings`] table of field setters and validator predicates,
//!   registered under the names parameter declarations refer to.
//!
//! A declaration referencing a name that has no binding is tolerated: a
//! missing field makes the write a no-op, a missing validator accepts.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::HostError;
use crate::types::{FromParameterValue, NativeDeclaration, Parameter, ParameterValue};

/// The host framework's native parameter mechanism.
pub trait ParameterHost: Send + Sync {
    /// Name of the node this registry serves, used in log spans.
    fn node_name(&self) -> &str;

    /// Declare a parameter natively.
    ///
    /// Returns the effective initial value, which is the default unless the
    /// host applies an override.
    fn declare_parameter(&self, decl: &NativeDeclaration) -> Result<ParameterValue, HostError>;
}

type FieldSetter = Arc<dyn Fn(&ParameterValue) + Send + Sync>;
type Validator = Arc<dyn Fn(&Parameter) -> bool + Send + Sync>;

/// Field setters and validators the host exposes to the registry.
#[derive(Clone, Default)]
pub struct HostBindings {
    fields: HashMap<String, FieldSetter>,
    validators: HashMap<String, Validator>,
}

impl HostBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a setter for the field called `name`.
    pub fn bind_field<F>(mut self, name: impl Into<String>, setter: F) -> Self
    where
        F: Fn(&ParameterValue) + Send + Sync + 'static,
    {
        self.fields.insert(name.into(), Arc::new(setter));
        self
    }

    /// Mirror updates into a shared cell of the field's natural Rust type.
    ///
    /// Values of another type are ignored; the registry only writes values
    /// that already passed the declared type check.
    pub fn mirror<T>(self, name: impl Into<String>, cell: Arc<RwLock<T>>) -> Self
    where
        T: FromParameterValue + Send + Sync + 'static,
    {
        self.bind_field(name, move |value| {
            if let Some(v) = T::from_parameter_value(value) {
                *cell.write() = v;
            }
        })
    }

    /// Register a predicate called `name`.
    pub fn bind_validator<F>(mut self, name: impl Into<String>, validator: F) -> Self
    where
        F: Fn(&Parameter) -> bool + Send + Sync + 'static,
    {
        self.validators.insert(name.into(), Arc::new(validator));
        self
    }

    pub(crate) fn field(&self, name: &str) -> Option<&FieldSetter> {
        self.fields.get(name)
    }

    pub(crate) fn validator(&self, name: &str) -> Option<&Validator> {
        self.validators.get(name)
    }
}

impl fmt::Debug for HostBindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields: Vec<&String> = self.fields.keys().collect();
        fields.sort();
        let mut validators: Vec<&String> = self.validators.keys().collect();
        validators.sort();
        f.debug_struct("HostBindings")
            .field("fields", &fields)
            .field("validators", &validators)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirror_writes_typed_value() {
        let cell = Arc::new(RwLock::new(0i64));
        let bindings = HostBindings::new().mirror("count", cell.clone());
        let setter = bindings.field("count").unwrap();
        setter(&ParameterValue::Integer(7));
        assert_eq!(*cell.read(), 7);
        // Wrong payload type leaves the field alone
        setter(&ParameterValue::Bool(true));
        assert_eq!(*cell.read(), 7);
    }

    #[test]
    fn test_validator_lookup() {
        let bindings =
            HostBindings::new().bind_validator("positive", |p: &Parameter| match p.value {
                ParameterValue::Integer(v) => v > 0,
                _ => false,
            });
        let validator = bindings.validator("positive").unwrap();
        assert!(validator(&Parameter::new("x", 1i64)));
        assert!(!validator(&Parameter::new("x", -1i64)));
        assert!(bindings.validator("missing").is_none());
        assert!(bindings.field("missing").is_none());
    }
}
