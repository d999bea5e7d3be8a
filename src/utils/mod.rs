//! Utility functions for the extraction pipeline.

use std::path::{Path, PathBuf};

/// Initializes the global tracing subscriber.
///
/// Respects `RUST_LOG`; defaults to `info` when unset. Safe to call once at
/// application startup.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

/// Returns the first candidate path that exists on disk.
///
/// Probing for an optional file (a template document, a calibration
/// profile) is expected, common control flow; it gets an `Option`, not an
/// error.
pub fn find_first_existing<I, P>(candidates: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    candidates
        .into_iter()
        .map(|p| p.as_ref().to_path_buf())
        .find(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_first_existing_prefers_earlier_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.json");
        let b = dir.path().join("b.json");
        std::fs::write(&b, "{}").unwrap();

        assert_eq!(find_first_existing([&a, &b]), Some(b.clone()));
        std::fs::write(&a, "{}").unwrap();
        assert_eq!(find_first_existing([&a, &b]), Some(a));
    }

    #[test]
    fn test_find_first_existing_none_when_all_missing() {
        assert_eq!(
            find_first_existing(["/nonexistent/x", "/nonexistent/y"]),
            None
        );
    }
}
