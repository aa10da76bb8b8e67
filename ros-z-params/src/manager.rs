//! Host-facing registry façade.
//!
//! `ParamsManager` ties the declaration store, the update transactor and the
//! bulk loader to one host:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      ParamsManager                       │
//! ├──────────────────────────────────────────────────────────┤
//! │  host: Arc<dyn ParameterHost>   native declare + value   │
//! │  store: RwLock<DeclarationStore>                         │
//! │  bindings: HostBindings         fields + validators      │
//! │  apply_lock: Mutex<()>          one batch at a time      │
//! └──────────────────────────────────────────────────────────┘
//!        init() ─► <ns>.params_file_path ─► loader ─► declare()
//!        on_set_parameters_callback() ─► apply()
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_yaml::Value;
use tracing::{debug, error, info, info_span};

use crate::error::{AssignmentError, BootstrapError, DeclareError, Result};
use crate::host::{HostBindings, ParameterHost};
use crate::loader;
use crate::store::DeclarationStore;
use crate::transactor;
use crate::types::{Declaration, Parameter, ParameterValue, TransactionResult};
use crate::Builder;

/// Namespace of the reserved bootstrap parameter when none is configured.
pub const DEFAULT_NAMESPACE: &str = "dua";

/// Suffix of the reserved bootstrap parameter.
pub const PARAMS_FILE_PATH: &str = "params_file_path";

/// Builder for [`ParamsManager`].
pub struct ParamsManagerBuilder {
    host: Arc<dyn ParameterHost>,
    namespace: String,
    verbose: bool,
    bindings: HostBindings,
}

impl ParamsManagerBuilder {
    pub fn new(host: Arc<dyn ParameterHost>) -> Self {
        Self {
            host,
            namespace: DEFAULT_NAMESPACE.to_string(),
            verbose: false,
            bindings: HostBindings::default(),
        }
    }

    /// Prefix of the reserved `<namespace>.params_file_path` parameter.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Log every accepted update at info level.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_bindings(mut self, bindings: HostBindings) -> Self {
        self.bindings = bindings;
        self
    }
}

impl Builder for ParamsManagerBuilder {
    type Output = ParamsManager;

    fn build(self) -> Result<ParamsManager> {
        if self.namespace.is_empty() {
            return Err(BootstrapError::Config(
                "parameter namespace must not be empty".into(),
            ));
        }
        Ok(ParamsManager {
            host: self.host,
            namespace: self.namespace,
            verbose: self.verbose,
            bindings: self.bindings,
            store: RwLock::new(DeclarationStore::new()),
            apply_lock: Mutex::new(()),
        })
    }
}

/// Typed parameter registry serving one host node.
///
/// Declarations are expected during bootstrap only; afterwards the host
/// feeds update batches through [`ParamsManager::apply`] or the closure from
/// [`ParamsManager::on_set_parameters_callback`]. Batches are serialized.
pub struct ParamsManager {
    host: Arc<dyn ParameterHost>,
    namespace: String,
    verbose: bool,
    bindings: HostBindings,
    store: RwLock<DeclarationStore>,
    apply_lock: Mutex<()>,
}

impl ParamsManager {
    pub fn builder(host: Arc<dyn ParameterHost>) -> ParamsManagerBuilder {
        ParamsManagerBuilder::new(host)
    }

    /// Full name of the reserved bootstrap parameter.
    pub fn params_file_parameter(&self) -> String {
        format!("{}.{}", self.namespace, PARAMS_FILE_PATH)
    }

    /// Declare the bootstrap parameter and, if it names a file, load it.
    pub fn init(&self) -> Result<()> {
        let span = info_span!("params", node = self.host.node_name());
        let _enter = span.enter();

        let name = self.params_file_parameter();
        let descriptor = Declaration::new(name.as_str(), "")
            .with_description("Path to the node parameters configuration YAML file.")
            .with_additional_constraints(
                "Must be a valid file path, if empty parameters are not configured.",
            )
            .read_only(true)
            .to_native();

        let path = match self.host.declare_parameter(&descriptor) {
            Ok(ParameterValue::String(path)) => path,
            Ok(other) => {
                return Err(fatal(BootstrapError::SchemaInvalid(format!(
                    "{} must be a string, got {}",
                    name,
                    other.parameter_type()
                ))));
            }
            Err(source) => return Err(fatal(BootstrapError::Host { name, source })),
        };

        if path.is_empty() {
            debug!("[PARAMS] {} is empty, no parameters file to load", name);
            return Ok(());
        }

        self.load_params_file(Path::new(&path))
    }

    /// Declare every parameter of a parameter file.
    pub fn load_params_file(&self, path: &Path) -> Result<()> {
        let doc = loader::read_params_file(path).map_err(fatal)?;
        self.load_document(&doc)?;
        info!("[PARAMS] Loaded parameters from {:?}", path);
        Ok(())
    }

    /// Declare every parameter of an in-memory parameter document.
    pub fn load_params_str(&self, yaml: &str) -> Result<()> {
        let doc: Value = serde_yaml::from_str(yaml).map_err(|source| {
            fatal(BootstrapError::FileMalformed {
                path: "<string>".into(),
                source,
            })
        })?;
        self.load_document(&doc)
    }

    fn load_document(&self, doc: &Value) -> Result<()> {
        let mapping = loader::params_mapping(doc).map_err(fatal)?;
        self.load_from_mapping(mapping)
    }

    /// Declare raw records in name order.
    ///
    /// Stops at the first malformed record; records before it stay declared.
    pub fn load_from_mapping(&self, mapping: BTreeMap<String, Value>) -> Result<()> {
        for (name, record) in mapping {
            let decl = loader::parse_declaration(&name, &record)
                .map_err(|source| fatal(BootstrapError::Declaration { name, source }))?;
            self.declare(decl).map_err(fatal)?;
        }
        Ok(())
    }

    /// Declare one parameter: natively on the host, then in the store.
    ///
    /// The effective initial value reported by the host (default or
    /// override) goes through the validator and is written to the backing
    /// field, so the field mirrors the live value from the start.
    pub fn declare(&self, decl: Declaration) -> Result<()> {
        let name = decl.name.clone();
        let declare_error = |source: DeclareError| BootstrapError::Declare {
            name: name.clone(),
            source,
        };
        self.store.read().check(&decl).map_err(declare_error)?;

        // No lock is held here: the host may invoke the update callback
        // while declaring.
        let initial = self
            .host
            .declare_parameter(&decl.to_native())
            .map_err(|source| BootstrapError::Host {
                name: name.clone(),
                source,
            })?;

        self.store
            .write()
            .declare(decl.clone())
            .map_err(declare_error)?;

        let _guard = self.apply_lock.lock();
        transactor::commit(&decl, &self.bindings, &Parameter::new(name.as_str(), initial))
            .map_err(|source| BootstrapError::InitialValue {
                name: name.clone(),
                source,
            })?;
        debug!("[PARAMS] Declared '{}'", name);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<Declaration> {
        self.store.read().lookup(name).cloned()
    }

    /// Declared names in lexicographic order.
    pub fn names(&self) -> Vec<String> {
        self.store.read().names()
    }

    /// Parse a `NAME=VALUE` assignment, `VALUE` written in YAML.
    ///
    /// The value is coerced to the declared type of `NAME`. Names the
    /// registry does not manage keep their value as text.
    pub fn parse_update(
        &self,
        assignment: &str,
    ) -> std::result::Result<Parameter, AssignmentError> {
        let (name, raw) = assignment
            .split_once('=')
            .ok_or_else(|| AssignmentError::MissingSeparator(assignment.to_string()))?;
        let raw: Value = serde_yaml::from_str(raw).map_err(|source| AssignmentError::Yaml {
            name: name.to_string(),
            source,
        })?;

        let value = match self.store.read().lookup(name) {
            Some(decl) => {
                loader::coerce_value(&raw, decl.type_).map_err(|source| AssignmentError::Value {
                    name: name.to_string(),
                    source,
                })?
            }
            None => ParameterValue::String(raw_text(&raw)),
        };
        Ok(Parameter::new(name, value))
    }

    /// Apply an update batch.
    pub fn apply(&self, batch: &[Parameter]) -> TransactionResult {
        let _guard = self.apply_lock.lock();
        let store = self.store.read();
        transactor::apply(&store, &self.bindings, batch, self.verbose)
    }

    /// The update callback to register with the host framework.
    pub fn on_set_parameters_callback(
        self: &Arc<Self>,
    ) -> impl Fn(&[Parameter]) -> TransactionResult + Send + Sync + use<> {
        let manager = Arc::clone(self);
        move |batch: &[Parameter]| manager.apply(batch)
    }
}

fn raw_text(raw: &Value) -> String {
    match raw {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

fn fatal(e: BootstrapError) -> BootstrapError {
    error!("[PARAMS] FATAL: {}", e);
    e
}
