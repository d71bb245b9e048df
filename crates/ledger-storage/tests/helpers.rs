use std::fs;

use ledger_storage::{Peer, SledRegistry};
use tempfile::{tempdir, TempDir};

pub fn create_temp_registry(port: u16) -> (TempDir, SledRegistry) {
    // Create a temporary directory for the sled database
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let registry = SledRegistry::open(temp_dir.path(), Peer::new("127.0.0.1", port))
        .expect("Failed to open SledRegistry");
    (temp_dir, registry)
}

pub fn teardown_registry(temp_dir: TempDir, registry: SledRegistry) {
    let db_path = temp_dir.path().to_path_buf();
    registry.clear().expect("Failed to clear the registry");
    drop(registry);
    temp_dir.close().expect("Failed to delete temp dir");
    let _ = fs::remove_dir_all(&db_path);
    // Verify the directory is removed
    assert!(!db_path.exists(), "Database directory should be removed");
}
