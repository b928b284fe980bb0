//! Shared helpers for tests across the workspace.

use camino::Utf8PathBuf;
use std::collections::BTreeMap;
use tempfile::TempDir;

/// Create a temporary state directory, returning the guard and its UTF-8 path.
///
/// Keep the `TempDir` alive for the duration of the test.
pub fn temp_state_dir() -> (TempDir, Utf8PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
        .expect("temp dir path should be UTF-8");
    (dir, path)
}

/// Build an artifact map from `(name, content)` pairs.
pub fn artifacts(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(name, content)| ((*name).to_string(), (*content).to_string()))
        .collect()
}
