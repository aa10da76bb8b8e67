//! In-process parameter host.
//!
//! `NativeParameters` plays the role of a node's own parameter subsystem:
//! it keeps the live value and descriptor of every declared parameter,
//! applies overrides at declaration time and enforces type, range and
//! read-only rules on direct sets. It backs the command line tool and the
//! tests; a real node implements [`ParameterHost`] on its own runtime.
//!
//! Overrides can be read from a standard ROS 2 parameter file:
//!
//! ```yaml
//! /**:
//!   ros__parameters:
//!     dua.params_file_path: "/etc/robot/params.yaml"
//!
//! /my_ns/my_node:
//!   ros__parameters:
//!     count: 3
//! ```

use std::collections::HashMap;
use std::path::Path;

use parking_lot::RwLock;
use serde_yaml::Value;
use tracing::debug;

use crate::error::{HostError, OverrideError};
use crate::host::ParameterHost;
use crate::types::{NativeDeclaration, Parameter, ParameterType, ParameterValue};

#[derive(Debug, Clone)]
struct ParameterEntry {
    value: ParameterValue,
    descriptor: NativeDeclaration,
}

#[derive(Debug, Default)]
struct Inner {
    parameters: HashMap<String, ParameterEntry>,
    /// Names in declaration order.
    order: Vec<String>,
    overrides: HashMap<String, ParameterValue>,
}

/// Parameter host keeping values in memory.
#[derive(Debug)]
pub struct NativeParameters {
    node_name: String,
    inner: RwLock<Inner>,
}

impl NativeParameters {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Values that replace the default of matching parameters at declaration.
    pub fn with_overrides(self, overrides: HashMap<String, ParameterValue>) -> Self {
        self.inner.write().overrides.extend(overrides);
        self
    }

    pub fn get(&self, name: &str) -> Option<ParameterValue> {
        self.inner.read().parameters.get(name).map(|e| e.value.clone())
    }

    pub fn describe(&self, name: &str) -> Option<NativeDeclaration> {
        self.inner
            .read()
            .parameters
            .get(name)
            .map(|e| e.descriptor.clone())
    }

    /// Declared names in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.inner.read().order.clone()
    }

    pub fn has(&self, name: &str) -> bool {
        self.inner.read().parameters.contains_key(name)
    }

    /// Set a declared parameter after checking read-only, type and range.
    pub fn set(&self, param: &Parameter) -> Result<ParameterValue, HostError> {
        let mut inner = self.inner.write();
        let entry = inner
            .parameters
            .get_mut(&param.name)
            .ok_or_else(|| HostError::NotDeclared(param.name.clone()))?;

        if entry.descriptor.read_only {
            return Err(HostError::ReadOnly(param.name.clone()));
        }
        validate_value(&param.name, &param.value, &entry.descriptor)?;

        Ok(std::mem::replace(&mut entry.value, param.value.clone()))
    }
}

impl ParameterHost for NativeParameters {
    fn node_name(&self) -> &str {
        &self.node_name
    }

    fn declare_parameter(&self, decl: &NativeDeclaration) -> Result<ParameterValue, HostError> {
        let mut inner = self.inner.write();
        if inner.parameters.contains_key(&decl.name) {
            return Err(HostError::AlreadyDeclared(decl.name.clone()));
        }

        // Use override if available, otherwise use default
        let initial_value = inner
            .overrides
            .remove(&decl.name)
            .unwrap_or_else(|| decl.default_value.clone());
        validate_value(&decl.name, &initial_value, decl)?;

        debug!(
            "[PARAMS] {}: declared '{}' = {:?}",
            self.node_name, decl.name, initial_value
        );
        inner.parameters.insert(
            decl.name.clone(),
            ParameterEntry {
                value: initial_value.clone(),
                descriptor: decl.clone(),
            },
        );
        inner.order.push(decl.name.clone());
        Ok(initial_value)
    }
}

fn validate_value(
    name: &str,
    value: &ParameterValue,
    descriptor: &NativeDeclaration,
) -> Result<(), HostError> {
    if !descriptor.dynamic_typing && value.parameter_type() != descriptor.type_ {
        return Err(HostError::TypeMismatch {
            name: name.to_string(),
            expected: descriptor.type_,
            actual: value.parameter_type(),
        });
    }

    if let Some(constraint) = descriptor.numeric_constraint() {
        constraint
            .check(value)
            .map_err(|reason| HostError::InvalidValue {
                name: name.to_string(),
                reason,
            })?;
    }

    Ok(())
}

/// Read the overrides that a ROS 2 parameter file assigns to `node_fqn`.
pub fn read_overrides(
    path: &Path,
    node_fqn: &str,
) -> Result<HashMap<String, ParameterValue>, OverrideError> {
    let content = std::fs::read_to_string(path).map_err(|source| OverrideError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_overrides(&content, node_fqn)
}

/// Collect the overrides of every section whose selector matches
/// `node_fqn`. Sections apply in file order, so a later section wins.
pub fn parse_overrides(
    yaml: &str,
    node_fqn: &str,
) -> Result<HashMap<String, ParameterValue>, OverrideError> {
    let doc: Value = serde_yaml::from_str(yaml)?;
    let sections = doc
        .as_mapping()
        .ok_or_else(|| OverrideError::Schema("document root must be a mapping".into()))?;

    let mut overrides = HashMap::new();
    for (selector, section) in sections {
        let selector = selector
            .as_str()
            .ok_or_else(|| OverrideError::Schema("node selectors must be strings".into()))?;
        if !NodeSelector::parse(selector).matches(node_fqn) {
            continue;
        }
        let Some(values) = section.get("ros__parameters") else {
            continue;
        };
        let values = values.as_mapping().ok_or_else(|| {
            OverrideError::Schema(format!("ros__parameters of '{}' is not a mapping", selector))
        })?;

        for (name, raw) in values {
            let name = name
                .as_str()
                .ok_or_else(|| OverrideError::Schema("parameter names must be strings".into()))?;
            match infer_value(raw) {
                Some(value) => {
                    overrides.insert(name.to_string(), value);
                }
                None => debug!("[PARAMS] override '{}' has no parameter type, skipped", name),
            }
        }
    }

    Ok(overrides)
}

/// Node selector of a ROS 2 parameter file section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeSelector<'a> {
    /// `/**`: every node.
    Any,
    /// `/ns/**`: every node below `/ns`, at any depth.
    Subtree(&'a str),
    /// `/ns/*`: nodes directly inside `/ns`.
    Children(&'a str),
    Exact(&'a str),
}

impl<'a> NodeSelector<'a> {
    fn parse(selector: &'a str) -> Self {
        if selector == "/**" || selector == "**" {
            Self::Any
        } else if let Some(ns) = selector.strip_suffix("/**") {
            Self::Subtree(ns)
        } else if let Some(ns) = selector.strip_suffix("/*") {
            Self::Children(ns)
        } else {
            Self::Exact(selector)
        }
    }

    fn matches(self, node_fqn: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(name) => name == node_fqn,
            Self::Subtree(ns) => below(ns, node_fqn).is_some_and(|rest| !rest.is_empty()),
            Self::Children(ns) => {
                below(ns, node_fqn).is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
            }
        }
    }
}

/// The part of `node_fqn` after the namespace `ns`, if `node_fqn` lies
/// inside it. Namespaces only match on whole segments.
fn below<'n>(ns: &str, node_fqn: &'n str) -> Option<&'n str> {
    node_fqn.strip_prefix(ns)?.strip_prefix('/')
}

/// Type an untagged YAML value the way rclcpp does: booleans, integers,
/// doubles and strings, plus homogeneous arrays of them.
fn infer_value(raw: &Value) -> Option<ParameterValue> {
    match raw {
        Value::Bool(b) => Some(ParameterValue::Bool(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(ParameterValue::Integer(i)),
            None => n.as_f64().map(ParameterValue::Double),
        },
        Value::String(s) => Some(ParameterValue::String(s.clone())),
        Value::Sequence(items) => infer_array(items),
        _ => None,
    }
}

/// Arrays take the type of their first element. An integer array that also
/// holds doubles widens to a double array.
fn infer_array(items: &[Value]) -> Option<ParameterValue> {
    let Some(first) = items.first() else {
        return Some(ParameterValue::StringArray(Vec::new()));
    };
    fn all<T>(items: &[Value], f: impl Fn(&Value) -> Option<T>) -> Option<Vec<T>> {
        items.iter().map(f).collect()
    }

    match infer_value(first)?.parameter_type() {
        ParameterType::Bool => all(items, Value::as_bool).map(ParameterValue::BoolArray),
        ParameterType::Integer => all(items, Value::as_i64)
            .map(ParameterValue::IntegerArray)
            .or_else(|| all(items, Value::as_f64).map(ParameterValue::DoubleArray)),
        ParameterType::Double => all(items, Value::as_f64).map(ParameterValue::DoubleArray),
        ParameterType::String => {
            all(items, |v| v.as_str().map(str::to_string)).map(ParameterValue::StringArray)
        }
        _ => None,
    }
}
