//! Shell settings, read once at startup from `<config dir>/fxi/settings.json`.

use std::path::{Path, PathBuf};

use fxi_kernel::PoolConfig;
use serde::Deserialize;

/// Lines per reader page.
pub const DEFAULT_PAGE_SIZE: usize = 550;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ShellSettings {
    /// Worker pool used by every application.
    pub pool: PoolConfig,
    pub reader_page_size: usize,
    /// Applications opened before the first input line is read.
    pub startup_apps: Vec<String>,
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            reader_page_size: DEFAULT_PAGE_SIZE,
            startup_apps: vec!["main".to_string()],
        }
    }
}

impl ShellSettings {
    /// Load from the default location. Never fails; problems are logged and
    /// defaults are used.
    pub fn load() -> Self {
        match default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                tracing::warn!("Could not determine config directory, using default settings");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no settings file");
                return Self::default();
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read settings");
                return Self::default();
            }
        };

        match serde_json::from_str::<Self>(&contents) {
            Ok(settings) => settings.sanitized(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "malformed settings, using defaults");
                Self::default()
            }
        }
    }

    fn sanitized(mut self) -> Self {
        if self.pool.max_workers == 0 {
            tracing::warn!("pool.max_workers must be at least 1");
            self.pool.max_workers = 1;
        }
        if self.reader_page_size == 0 {
            self.reader_page_size = DEFAULT_PAGE_SIZE;
        }
        self
    }
}

fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("fxi").join("settings.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ShellSettings::load_from(&dir.path().join("settings.json"));
        assert_eq!(settings, ShellSettings::default());
        assert_eq!(settings.pool.max_workers, 2);
        assert_eq!(settings.reader_page_size, 550);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"pool": {"idle_sleep_ms": 50}, "startup_apps": []}"#).unwrap();

        let settings = ShellSettings::load_from(&path);
        assert_eq!(settings.pool.idle_sleep_ms, 50);
        assert_eq!(settings.pool.max_workers, 2);
        assert_eq!(settings.reader_page_size, 550);
        assert!(settings.startup_apps.is_empty());
    }

    #[test]
    fn test_malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(ShellSettings::load_from(&path), ShellSettings::default());
    }

    #[test]
    fn test_zero_sizes_are_corrected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"pool": {"max_workers": 0}, "reader_page_size": 0}"#).unwrap();
        let settings = ShellSettings::load_from(&path);
        assert_eq!(settings.pool.max_workers, 1);
        assert_eq!(settings.reader_page_size, DEFAULT_PAGE_SIZE);
    }
}
