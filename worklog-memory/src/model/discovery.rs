//! Model cache directory discovery
//!
//! Finds where downloaded model weights live across installation scenarios.

use std::path::{Path, PathBuf};

use crate::error::{MemoryError, Result};

/// Environment variable overriding the model cache location
pub const MODELS_PATH_ENV: &str = "WORKLOG_MODELS_PATH";

/// Resolve the model cache directory with priority:
/// 1. Explicit path (CLI flag / config)
/// 2. WORKLOG_MODELS_PATH environment variable
/// 3. User home directory (~/.worklog/models)
///
/// The directory is created if missing; models are fetched into it on first use.
pub fn resolve_model_cache_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    let chosen = if let Some(path) = explicit {
        log::info!("Using explicit model directory: {}", path.display());
        path.to_path_buf()
    } else if let Some(path) = std::env::var_os(MODELS_PATH_ENV).filter(|v| !v.is_empty()) {
        let path = PathBuf::from(path);
        log::info!("Using {}: {}", MODELS_PATH_ENV, path.display());
        path
    } else if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE"))
    {
        PathBuf::from(home).join(".worklog").join("models")
    } else {
        return Err(MemoryError::invalid_path(format!(
            "No model directory available. Checked:\n\
             - explicit --models-dir\n\
             - {} environment variable\n\
             - ~/.worklog/models (HOME/USERPROFILE unset)",
            MODELS_PATH_ENV
        )));
    };

    if chosen.exists() && !chosen.is_dir() {
        return Err(MemoryError::invalid_path(format!(
            "{} exists and is not a directory",
            chosen.display()
        )));
    }
    std::fs::create_dir_all(&chosen)?;
    Ok(chosen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_path_wins_and_is_created() {
        let temp = TempDir::new().unwrap();
        let wanted = temp.path().join("models");

        let resolved = resolve_model_cache_dir(Some(&wanted)).unwrap();

        assert_eq!(resolved, wanted);
        assert!(wanted.is_dir());
    }

    #[test]
    fn test_file_in_the_way_is_rejected() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("models");
        std::fs::write(&file, b"not a dir").unwrap();

        let err = resolve_model_cache_dir(Some(&file)).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }
}
