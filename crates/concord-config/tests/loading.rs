use std::io::Write;

use concord_config::{load, BackendChoice};
use concord_types::Identity;

fn write_fixture(contents: &str) -> tempfile::NamedTempFile {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    f
}

#[test]
fn loads_valid_config() {
    let f = write_fixture(
        "self_identity: 10.0.0.12\nbackend_choice: etcd\nbackend_endpoint: http://etcd.internal:2379\nforce_leave: false\n",
    );
    let config = load(f.path()).expect("should load without error");
    assert_eq!(config.self_identity, Identity::new("10.0.0.12"));
    assert_eq!(config.backend_choice, BackendChoice::Etcd);
    assert_eq!(config.backend_endpoint, "http://etcd.internal:2379");
    assert!(!config.force_leave);
}

#[test]
fn defaults_backend_choice_and_force_leave() {
    let f = write_fixture("self_identity: 10.0.0.12\nbackend_endpoint: http://etcd.internal:2379\n");
    let config = load(f.path()).expect("should load without error");
    assert_eq!(config.backend_choice, BackendChoice::Etcd);
    assert!(!config.force_leave);
}

#[test]
fn loads_spec_documented_backend_choice_labels() {
    let f = write_fixture(
        "self_identity: 10.0.0.12\nbackend_choice: native-cas\nbackend_endpoint: http://etcd.internal:2379\n",
    );
    let config = load(f.path()).expect("should load without error");
    assert_eq!(config.backend_choice, BackendChoice::Etcd);

    let f = write_fixture(
        "self_identity: 10.0.0.12\nbackend_choice: http-cas\nbackend_endpoint: http://consul.internal:8500\n",
    );
    let config = load(f.path()).expect("should load without error");
    assert_eq!(config.backend_choice, BackendChoice::Consul);
}

#[test]
fn unknown_backend_choice_is_a_conversion_error() {
    let f = write_fixture(
        "self_identity: 10.0.0.12\nbackend_choice: bogus\nbackend_endpoint: http://etcd.internal:2379\n",
    );
    assert!(load(f.path()).is_err());
}

#[test]
fn missing_file_returns_io_error() {
    let path = std::path::Path::new("/nonexistent/path/does/not/exist.yml");
    assert!(load(path).is_err());
}
