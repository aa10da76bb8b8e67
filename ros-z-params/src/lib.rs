//! Typed, file-bootstrapped parameter registry for ros-z nodes.
//!
//! A node declares its parameters once, usually from a YAML file named by the
//! read-only `dua.params_file_path` parameter, and then routes every update
//! batch its framework receives through [`ParamsManager::apply`]:
//!
//! - **Declaration store**: write-once type, range, read-only flag and host
//!   bindings per name
//! - **Update transactor**: in-order validation that stops at the first
//!   rejected item and mirrors accepted values into host fields
//! - **Bulk loader**: deterministic, name-sorted declaration from a file
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use parking_lot::RwLock;
//! use ros_z_params::{Builder, HostBindings, NativeParameters, Parameter, ParamsManager};
//!
//! let count = Arc::new(RwLock::new(0i64));
//! let host = Arc::new(NativeParameters::new("my_node"));
//! let manager = ParamsManager::builder(host)
//!     .with_bindings(HostBindings::new().mirror("count", count.clone()))
//!     .build()?;
//! manager.load_params_file(std::path::Path::new("params.yaml"))?;
//!
//! let result = manager.apply(&[Parameter::new("count", 3i64)]);
//! assert!(result.accepted);
//! # Ok::<(), ros_z_params::BootstrapError>(())
//! ```

pub mod error;
pub mod format;
pub mod host;
pub mod loader;
pub mod manager;
pub mod native;
pub mod store;
pub mod transactor;
pub mod types;

pub use error::{
    AssignmentError, BootstrapError, DeclarationError, DeclareError, HostError, OverrideError, Result, UpdateError,
};
pub use host::{HostBindings, ParameterHost};
pub use manager::{ParamsManager, ParamsManagerBuilder};
pub use native::NativeParameters;
pub use store::DeclarationStore;
pub use types::{
    Declaration, FloatingPointRange, FromParameterValue, IntegerRange, NativeDeclaration,
    NumericConstraint, Parameter, ParameterType, ParameterValue, TransactionResult,
};

/// Builder pattern shared by the registry's configurable types.
///
/// Must be in scope to call `.build()`:
///
/// ```rust,ignore
/// use ros_z_params::Builder;
/// let manager = ParamsManager::builder(host).with_namespace("robot").build()?;
/// ```
pub trait Builder {
    /// The type produced by this builder.
    type Output;
    /// Consume the builder and construct the configured object.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::Config`] if the configuration is invalid.
    fn build(self) -> Result<Self::Output>;
}
