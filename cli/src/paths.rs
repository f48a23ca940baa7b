//! Path utilities for triage applications.

use std::io;
use std::path::PathBuf;

/// Default base configuration directory name.
pub const DEFAULT_BASE_DIR: &str = ".triage";

/// Default configuration filename.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Default database filename inside the data directory.
pub const DEFAULT_DB_FILE: &str = "triage.redb";

/// Provides access to the triage directory structure.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Application name.
    pub app_name: String,
    /// User's home directory.
    pub home_dir: PathBuf,
}

impl Paths {
    /// Creates a new Paths instance for the given app.
    pub fn new(app_name: impl Into<String>) -> io::Result<Self> {
        let home_dir = dirs::home_dir().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "could not find home directory")
        })?;
        Ok(Self {
            app_name: app_name.into(),
            home_dir,
        })
    }

    /// Returns the app-specific directory (~/.triage/<app>).
    pub fn app_dir(&self) -> PathBuf {
        self.home_dir.join(DEFAULT_BASE_DIR).join(&self.app_name)
    }

    /// Returns the data directory (~/.triage/<app>/data).
    pub fn data_dir(&self) -> PathBuf {
        self.app_dir().join("data")
    }

    /// Database path for a context: `kv_path` if set, else
    /// ~/.triage/<app>/data/<context>.redb. Creates the parent directory.
    pub fn db_path(&self, kv_path: &str, context: &str) -> io::Result<PathBuf> {
        let path = if kv_path.is_empty() {
            let file = if context.is_empty() {
                DEFAULT_DB_FILE.to_string()
            } else {
                format!("{context}.redb")
            };
            self.data_dir().join(file)
        } else {
            PathBuf::from(kv_path)
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths_in(dir: &tempfile::TempDir) -> Paths {
        Paths {
            app_name: "testapp".into(),
            home_dir: dir.path().to_path_buf(),
        }
    }

    #[test]
    fn test_paths_structure() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(&dir);
        assert!(paths.app_dir().ends_with(".triage/testapp"));
        assert!(paths.data_dir().ends_with("data"));
    }

    #[test]
    fn test_db_path() {
        let dir = tempfile::tempdir().unwrap();
        let paths = paths_in(&dir);

        let p = paths.db_path("", "work").unwrap();
        assert!(p.ends_with("data/work.redb"));
        assert!(paths.data_dir().is_dir());
        assert!(paths.db_path("", "").unwrap().ends_with(DEFAULT_DB_FILE));

        let custom = dir.path().join("x/custom.redb");
        let p = paths.db_path(custom.to_str().unwrap(), "work").unwrap();
        assert_eq!(p, custom);
        assert!(dir.path().join("x").is_dir());
    }
}
