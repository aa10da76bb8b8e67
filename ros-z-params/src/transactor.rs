//! Update transactions.
//!
//! A batch is walked in order. Each item is checked against its declaration
//! and the host validator, then written to the host field. The first
//! rejection stops the batch: items before it stay applied, nothing at or
//! after it is touched.

use tracing::{error, info, trace};

use crate::error::UpdateError;
use crate::format::format_update;
use crate::host::HostBindings;
use crate::store::DeclarationStore;
use crate::types::{Declaration, Parameter, TransactionResult};

/// Apply a batch of updates. Never fails: rejections are reported through
/// the returned [`TransactionResult`].
pub fn apply(
    store: &DeclarationStore,
    bindings: &HostBindings,
    batch: &[Parameter],
    verbose: bool,
) -> TransactionResult {
    for param in batch {
        match apply_one(store, bindings, param, verbose) {
            Ok(()) => {}
            Err(e) => {
                error!("[PARAMS] {}", e);
                return TransactionResult::failure(e.to_string());
            }
        }
    }
    TransactionResult::success()
}

fn apply_one(
    store: &DeclarationStore,
    bindings: &HostBindings,
    param: &Parameter,
    verbose: bool,
) -> Result<(), UpdateError> {
    let Some(decl) = store.lookup(&param.name) else {
        trace!("[PARAMS] '{}' not managed, skipping", param.name);
        return Ok(());
    };

    if param.value.parameter_type() != decl.type_ {
        return Err(UpdateError::TypeMismatch(param.name.clone()));
    }

    if decl.read_only {
        return Err(UpdateError::ReadOnly(param.name.clone()));
    }

    if let Some(constraint) = &decl.numeric_constraint {
        constraint
            .check(&param.value)
            .map_err(|reason| UpdateError::OutOfRange {
                name: param.name.clone(),
                reason,
            })?;
    }

    commit(decl, bindings, param)?;

    if verbose {
        info!("{}", format_update(param));
    }

    Ok(())
}

/// Run the host validator on a value that already passed the declared
/// checks, then write it to the backing field.
///
/// Also used at declaration time for the effective initial value.
pub(crate) fn commit(
    decl: &Declaration,
    bindings: &HostBindings,
    param: &Parameter,
) -> Result<(), UpdateError> {
    if let Some(validator) = decl.validator.as_deref().and_then(|v| bindings.validator(v)) {
        if !validator(param) {
            return Err(UpdateError::ValidationRejected(param.name.clone()));
        }
    }

    if let Some(setter) = decl.backing_field.as_deref().and_then(|f| bindings.field(f)) {
        setter(&param.value);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::RwLock;

    use super::*;
    use crate::types::ParameterValue;

    fn store_with(decls: Vec<Declaration>) -> DeclarationStore {
        let mut store = DeclarationStore::new();
        for decl in decls {
            store.declare(decl).unwrap();
        }
        store
    }

    #[test]
    fn test_unknown_name_is_skipped() {
        let store = DeclarationStore::new();
        let result = apply(
            &store,
            &HostBindings::new(),
            &[Parameter::new("unregistered", 1i64)],
            true,
        );
        assert_eq!(result, TransactionResult::success());
    }

    #[test]
    fn test_short_circuit_keeps_prefix() {
        let a = Arc::new(RwLock::new(0i64));
        let b = Arc::new(RwLock::new(0i64));
        let c = Arc::new(RwLock::new(0i64));
        let store = store_with(vec![
            Declaration::new("a", 0i64)
                .with_integer_range(0, 100, 0)
                .with_backing_field("a"),
            Declaration::new("b", 0i64)
                .with_integer_range(0, 100, 0)
                .with_backing_field("b"),
            Declaration::new("c", 0i64)
                .with_integer_range(0, 100, 0)
                .with_backing_field("c"),
        ]);
        let bindings = HostBindings::new()
            .mirror("a", a.clone())
            .mirror("b", b.clone())
            .mirror("c", c.clone());

        let result = apply(
            &store,
            &bindings,
            &[
                Parameter::new("a", 1i64),
                Parameter::new("b", "not an integer"),
                Parameter::new("c", 3i64),
            ],
            false,
        );

        assert!(!result.accepted);
        assert_eq!(result.failure_reason, "Parameter 'b' type mismatch");
        assert_eq!(*a.read(), 1);
        assert_eq!(*b.read(), 0);
        assert_eq!(*c.read(), 0);
    }

    #[test]
    fn test_validator_rejects() {
        let field = Arc::new(RwLock::new(String::from("init")));
        let store = store_with(vec![
            Declaration::new("label", "init")
                .with_backing_field("label")
                .with_validator("non_empty"),
        ]);
        let bindings = HostBindings::new()
            .mirror("label", field.clone())
            .bind_validator("non_empty", |p: &Parameter| {
                !matches!(&p.value, ParameterValue::String(s) if s.is_empty())
            });

        let result = apply(&store, &bindings, &[Parameter::new("label", "")], false);
        assert_eq!(
            result.failure_reason,
            "Parameter 'label' update validation failed"
        );
        assert_eq!(*field.read(), "init");

        let result = apply(&store, &bindings, &[Parameter::new("label", "ok")], false);
        assert!(result.accepted);
        assert_eq!(*field.read(), "ok");
    }

    #[test]
    fn test_unregistered_references_are_tolerated() {
        let store = store_with(vec![
            Declaration::new("flag", false)
                .with_backing_field("missing_field")
                .with_validator("missing_validator"),
        ]);
        let result = apply(
            &store,
            &HostBindings::new(),
            &[Parameter::new("flag", true)],
            false,
        );
        assert!(result.accepted);
    }

    #[test]
    fn test_read_only_rejected() {
        let store = store_with(vec![Declaration::new("fixed", "immutable").read_only(true)]);
        let result = apply(
            &store,
            &HostBindings::new(),
            &[Parameter::new("fixed", "changed")],
            false,
        );
        assert_eq!(result.failure_reason, "Parameter 'fixed' is read-only");
    }

    #[test]
    fn test_range_rejected() {
        let store = store_with(vec![
            Declaration::new("ratio", 0.5).with_floating_point_range(0.0, 1.0, 0.0),
        ]);
        let result = apply(
            &store,
            &HostBindings::new(),
            &[Parameter::new("ratio", 1.5)],
            false,
        );
        assert!(!result.accepted);
        assert!(result.failure_reason.starts_with("Parameter 'ratio' out of range"));
    }

    #[test]
    fn test_nan_rejected() {
        let field = Arc::new(RwLock::new(0.5f64));
        let store = store_with(vec![
            Declaration::new("ratio", 0.5)
                .with_floating_point_range(0.0, 1.0, 0.25)
                .with_backing_field("ratio"),
        ]);
        let bindings = HostBindings::new().mirror("ratio", field.clone());
        let result = apply(
            &store,
            &bindings,
            &[Parameter::new("ratio", f64::NAN)],
            false,
        );
        assert!(!result.accepted);
        assert!(result.failure_reason.starts_with("Parameter 'ratio' out of range"));
        assert_eq!(*field.read(), 0.5);
    }

    #[test]
    fn test_every_type_written_unchanged() {
        let values = vec![
            ParameterValue::Bool(true),
            ParameterValue::BoolArray(vec![true, false]),
            ParameterValue::Integer(4),
            ParameterValue::IntegerArray(vec![1, 2]),
            ParameterValue::Double(0.25),
            ParameterValue::DoubleArray(vec![0.5]),
            ParameterValue::String("s".into()),
            ParameterValue::StringArray(vec!["x".into()]),
            ParameterValue::ByteArray(vec![0, 1, 255]),
        ];
        for value in values {
            let mut decl = Declaration::new("p", value.clone()).with_backing_field("p");
            if decl.type_.is_integer() {
                decl = decl.with_integer_range(-10, 10, 0);
            } else if decl.type_.is_floating_point() {
                decl = decl.with_floating_point_range(-10.0, 10.0, 0.0);
            }
            let store = store_with(vec![decl]);
            let cell = Arc::new(RwLock::new(ParameterValue::Bool(false)));
            let bindings = HostBindings::new().mirror("p", cell.clone());

            let result = apply(&store, &bindings, &[Parameter::new("p", value.clone())], true);
            assert!(result.accepted, "{:?}", value);
            assert_eq!(*cell.read(), value);
        }
    }
}
