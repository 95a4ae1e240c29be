//! Test harness helpers.

use std::time::Duration;

use tempfile::{NamedTempFile, TempDir};
use tracing_subscriber::EnvFilter;

/// Create a temporary directory for testing.
///
/// # Panics
///
/// Panics if the temporary directory cannot be created.
#[must_use]
pub fn test_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// Create a temporary file with the given content.
///
/// # Panics
///
/// Panics if the file cannot be created or written.
#[must_use]
pub fn test_file(content: &str) -> NamedTempFile {
    use std::io::Write;

    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write to temp file");
    file.flush().expect("Failed to flush temp file");
    file
}

/// Install a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Poll `condition` every 5 ms until it holds.
///
/// # Panics
///
/// Panics with `what` if it still does not hold after two seconds.
pub async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_has_content() {
        let file = test_file("domain: untrusted\n");
        let text = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(text, "domain: untrusted\n");
    }

    #[tokio::test]
    async fn test_wait_until_returns_when_true() {
        let mut calls = 0;
        wait_until("third poll", || {
            calls += 1;
            calls >= 3
        })
        .await;
        assert_eq!(calls, 3);
    }
}
