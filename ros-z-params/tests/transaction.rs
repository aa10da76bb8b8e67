//! Update batches against a bootstrapped registry.

mod common;

use std::sync::mpsc;
use std::sync::{Arc, OnceLock, Weak};
use std::thread;
use std::time::Duration;

use common::*;
use parking_lot::RwLock;
use proptest::prelude::*;
use ros_z_params::{
    AssignmentError, Builder, Declaration, DeclarationStore, DeclareError, HostBindings,
    HostError, NativeDeclaration, NativeParameters, Parameter, ParameterHost, ParameterValue,
    ParamsManager, TransactionResult,
};

struct Fields {
    count: Arc<RwLock<i64>>,
    label: Arc<RwLock<String>>,
    topics: Arc<RwLock<Vec<String>>>,
    enabled: Arc<RwLock<bool>>,
}

fn bootstrapped() -> (Fields, Arc<ParamsManager>) {
    let fields = Fields {
        count: Arc::new(RwLock::new(0)),
        label: Arc::new(RwLock::new(String::new())),
        topics: Arc::new(RwLock::new(Vec::new())),
        enabled: Arc::new(RwLock::new(false)),
    };
    let bindings = HostBindings::new()
        .mirror("count", fields.count.clone())
        .mirror("label", fields.label.clone())
        .mirror("topics", fields.topics.clone())
        .mirror("enabled", fields.enabled.clone())
        .bind_validator("validate_count", |p: &Parameter| {
            // Multiples of three are rejected
            matches!(p.value, ParameterValue::Integer(v) if v % 3 != 0)
        });
    let (_host, manager) = manager_with(bindings);
    manager.load_params_str(FIXTURE).expect("fixture loads");
    (fields, Arc::new(manager))
}

#[test]
fn test_fields_hold_declared_defaults() {
    let (fields, _manager) = bootstrapped();
    assert_eq!(*fields.count.read(), 5);
    assert_eq!(*fields.label.read(), "x");
    assert_eq!(
        *fields.topics.read(),
        vec!["/cmd_vel".to_string(), "/odom".to_string()]
    );
    assert!(*fields.enabled.read());
}

#[test]
fn test_batch_applies_in_order() {
    let (fields, manager) = bootstrapped();
    let result = manager.apply(&[
        Parameter::new("count", 4i64),
        Parameter::new("label", "first"),
        Parameter::new("label", "second"),
        Parameter::new("dua.topics", vec!["/scan".to_string()]),
        Parameter::new("dua.enabled", false),
    ]);
    assert_eq!(result, TransactionResult::success());
    assert_eq!(*fields.count.read(), 4);
    assert_eq!(*fields.label.read(), "second");
    assert_eq!(*fields.topics.read(), vec!["/scan".to_string()]);
    assert!(!*fields.enabled.read());
}

#[test]
fn test_type_mismatch_stops_batch() {
    let (fields, manager) = bootstrapped();
    let result = manager.apply(&[
        Parameter::new("label", "applied"),
        Parameter::new("count", 2.0),
        Parameter::new("dua.enabled", false),
    ]);
    assert!(!result.accepted);
    assert_eq!(result.failure_reason, "Parameter 'count' type mismatch");
    assert_eq!(*fields.label.read(), "applied");
    assert_eq!(*fields.count.read(), 5);
    assert!(*fields.enabled.read());
}

#[test]
fn test_validator_stops_batch() {
    let (fields, manager) = bootstrapped();
    let result = manager.apply(&[
        Parameter::new("label", "applied"),
        Parameter::new("count", 3i64),
        Parameter::new("dua.enabled", false),
    ]);
    assert_eq!(
        result,
        TransactionResult::failure("Parameter 'count' update validation failed")
    );
    assert_eq!(*fields.label.read(), "applied");
    assert_eq!(*fields.count.read(), 5);
    assert!(*fields.enabled.read());
}

#[test]
fn test_read_only_parameter_rejected() {
    let (_fields, manager) = bootstrapped();
    let result = manager.apply(&[Parameter::new("dua.gains", vec![1.0, 1.5])]);
    assert_eq!(
        result,
        TransactionResult::failure("Parameter 'dua.gains' is read-only")
    );
}

#[test]
fn test_unknown_names_are_ignored() {
    let (fields, manager) = bootstrapped();
    let result = manager.apply(&[
        Parameter::new("unregistered", vec![1u8, 2, 3]),
        Parameter::new("use_sim_time", true),
    ]);
    assert!(result.accepted);
    assert_eq!(*fields.count.read(), 5);
    assert_eq!(*fields.label.read(), "x");
}

#[test]
fn test_empty_batch_is_accepted() {
    let (_fields, manager) = bootstrapped();
    assert_eq!(manager.apply(&[]), TransactionResult::success());
}

#[test]
fn test_callback_closure() {
    let (fields, manager) = bootstrapped();
    let callback = manager.on_set_parameters_callback();
    let result = callback(&[Parameter::new("count", 8i64)]);
    assert!(result.accepted);
    assert_eq!(*fields.count.read(), 8);
}

#[test]
fn test_concurrent_batches_do_not_interleave() {
    let (fields, manager) = bootstrapped();
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let manager = manager.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    let label = format!("writer-{}", i);
                    let result = manager.apply(&[
                        Parameter::new("label", label.clone()),
                        Parameter::new("dua.topics", vec![label]),
                    ]);
                    assert!(result.accepted);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    // The last batch wrote both fields with the same writer id
    assert_eq!(vec![fields.label.read().clone()], *fields.topics.read());
}

#[test]
fn test_lookup_returns_same_declaration() {
    let (_fields, manager) = bootstrapped();
    assert_eq!(manager.lookup("count"), manager.lookup("count"));
    assert!(manager.lookup("missing").is_none());
}

#[test]
fn test_standalone_registry_without_file() {
    let host = Arc::new(NativeParameters::new("node"));
    let manager = ParamsManager::builder(host.clone()).build().unwrap();
    manager
        .declare(
            Declaration::new("rate", 10.0)
                .with_floating_point_range(1.0, 100.0, 0.0)
                .with_description("Loop rate in Hz."),
        )
        .unwrap();
    assert_eq!(host.get("rate"), Some(ParameterValue::Double(10.0)));
    assert!(manager.apply(&[Parameter::new("rate", 50.0)]).accepted);
    assert!(!manager.apply(&[Parameter::new("rate", 0.5)]).accepted);
}

/// Host that runs the registry's update callback while declaring, the way
/// ROS 2 client libraries announce the initial value of a new parameter.
struct CallbackHost {
    native: NativeParameters,
    manager: OnceLock<Weak<ParamsManager>>,
}

impl ParameterHost for CallbackHost {
    fn node_name(&self) -> &str {
        self.native.node_name()
    }

    fn declare_parameter(&self, decl: &NativeDeclaration) -> Result<ParameterValue, HostError> {
        let value = self.native.declare_parameter(decl)?;
        if let Some(manager) = self.manager.get().and_then(Weak::upgrade) {
            let result = manager.apply(&[Parameter::new(decl.name.as_str(), value.clone())]);
            if !result.accepted {
                return Err(HostError::InvalidValue {
                    name: decl.name.clone(),
                    reason: result.failure_reason,
                });
            }
        }
        Ok(value)
    }
}

#[test]
fn test_host_may_call_back_while_declaring() {
    let host = Arc::new(CallbackHost {
        native: NativeParameters::new("node"),
        manager: OnceLock::new(),
    });
    let flag = Arc::new(RwLock::new(false));
    let manager = Arc::new(
        ParamsManager::builder(host.clone())
            .with_bindings(HostBindings::new().mirror("flag", flag.clone()))
            .build()
            .unwrap(),
    );
    host.manager.set(Arc::downgrade(&manager)).unwrap();

    let (tx, rx) = mpsc::channel();
    let declaring = manager.clone();
    thread::spawn(move || {
        let result = declaring.declare(Declaration::new("flag", true).with_backing_field("flag"));
        tx.send(result.is_ok()).unwrap();
    });
    let declared = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("declare returned while the host called back");
    assert!(declared);
    assert!(*flag.read());
    assert!(manager.apply(&[Parameter::new("flag", false)]).accepted);
    assert!(!*flag.read());
}

#[test]
fn test_nan_rejected_for_bounded_double() {
    let (_host, manager) = manager_with(HostBindings::new());
    manager
        .declare(Declaration::new("ratio", 0.5).with_floating_point_range(0.0, 1.0, 0.25))
        .unwrap();
    let result = manager.apply(&[Parameter::new("ratio", f64::NAN)]);
    assert!(!result.accepted);
    assert!(result.failure_reason.starts_with("Parameter 'ratio' out of range"));
}

#[test]
fn test_parse_update_coerces_to_declared_type() {
    let (_fields, manager) = bootstrapped();
    assert_eq!(
        manager.parse_update("count=7").unwrap(),
        Parameter::new("count", 7i64)
    );
    assert_eq!(
        manager.parse_update("dua.gains=[1, 1.5]").unwrap(),
        Parameter::new("dua.gains", vec![1.0, 1.5])
    );
    assert_eq!(
        manager.parse_update("label=42").unwrap(),
        Parameter::new("label", "42")
    );
    // Unmanaged names keep the text
    assert_eq!(
        manager.parse_update("use_sim_time=true").unwrap(),
        Parameter::new("use_sim_time", "true")
    );
    assert!(matches!(
        manager.parse_update("count"),
        Err(AssignmentError::MissingSeparator(_))
    ));
    assert!(matches!(
        manager.parse_update("count=abc"),
        Err(AssignmentError::Value { .. })
    ));
    assert!(matches!(
        manager.parse_update("count=[1"),
        Err(AssignmentError::Yaml { .. })
    ));
}

proptest! {
    #[test]
    fn bounds_order_is_enforced(from in -1000i64..1000, to in -1000i64..1000, step in 0u64..5) {
        let mut store = DeclarationStore::new();
        let decl = Declaration::new("p", from).with_integer_range(from, to, step);
        let result = store.declare(decl);
        if from <= to {
            prop_assert!(result.is_ok());
            prop_assert!(store.contains("p"));
        } else {
            prop_assert_eq!(result, Err(DeclareError::InvalidBounds("p".to_string())));
            prop_assert!(!store.contains("p"));
        }
    }

    #[test]
    fn float_bounds_order_is_enforced(from in -1e6f64..1e6, to in -1e6f64..1e6) {
        let mut store = DeclarationStore::new();
        let decl = Declaration::new("p", from).with_floating_point_range(from, to, 0.0);
        prop_assert_eq!(store.declare(decl).is_ok(), from <= to);
    }

    #[test]
    fn accepted_integers_are_written_unchanged(value in 0i64..=10) {
        let cell = Arc::new(RwLock::new(-1i64));
        let host = Arc::new(NativeParameters::new("node"));
        let manager = ParamsManager::builder(host)
            .with_bindings(HostBindings::new().mirror("count", cell.clone()))
            .build()
            .unwrap();
        manager
            .declare(Declaration::new("count", 5i64).with_integer_range(0, 10, 1).with_backing_field("count"))
            .unwrap();
        let result = manager.apply(&[Parameter::new("count", value)]);
        prop_assert!(result.accepted);
        prop_assert_eq!(*cell.read(), value);
    }
}
