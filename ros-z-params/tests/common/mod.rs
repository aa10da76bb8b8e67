#![allow(dead_code)]

use std::io::Write;
use std::sync::Arc;

use ros_z_params::{Builder, HostBindings, NativeParameters, ParamsManager};
use tempfile::NamedTempFile;

pub const FIXTURE: &str = include_str!("../fixtures/params.yaml");

pub fn write_params_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write params");
    file
}

pub fn manager_with(bindings: HostBindings) -> (Arc<NativeParameters>, ParamsManager) {
    let host = Arc::new(NativeParameters::new("test_node"));
    let manager = ParamsManager::builder(host.clone())
        .with_bindings(bindings)
        .with_verbose(true)
        .build()
        .expect("manager");
    (host, manager)
}
