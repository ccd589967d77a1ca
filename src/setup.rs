//! Per-application `setup.toml` loading
//!
//! Each app directory declares its title, owner and network identity. The file
//! is parsed with serde and then checked for empty values; any failure is a
//! [`DeployError::MalformedSetup`] and aborts the run.

use crate::error::{DeployError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Owner section of `setup.toml`
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Owner {
    pub name: String,
}

/// `[streamlit]` section of `setup.toml`
#[derive(Debug, Deserialize, Clone)]
struct RuntimeSection {
    port: u32,
    base_path: String,
    entry_file: String,
}

/// On-disk layout of `setup.toml`
#[derive(Debug, Deserialize, Clone)]
struct SetupFile {
    title: String,
    owner: Owner,
    streamlit: RuntimeSection,
}

/// Validated declaration for one application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSetup {
    /// Display name, also the source of the supervisord program name
    pub title: String,
    /// Informational only
    pub owner: Owner,
    /// Port the app binds. Wider than `u16` because collision breaking can
    /// append digits (see [`crate::registry`]).
    pub port: u32,
    /// URL prefix the app is reachable under
    pub base_path: String,
    /// Script handed to the runtime module
    pub entry_file: String,
    /// App directory, also the root of its virtual environment
    pub app_dir: PathBuf,
}

impl AppSetup {
    /// Build a setup in code (tests and callers that don't read from disk)
    pub fn new(title: &str, port: u32, base_path: &str, app_dir: impl Into<PathBuf>) -> Self {
        Self {
            title: title.to_string(),
            owner: Owner {
                name: String::new(),
            },
            port,
            base_path: base_path.to_string(),
            entry_file: "app.py".to_string(),
            app_dir: app_dir.into(),
        }
    }

    pub fn with_owner(mut self, name: &str) -> Self {
        self.owner.name = name.to_string();
        self
    }

    pub fn with_entry_file(mut self, entry_file: &str) -> Self {
        self.entry_file = entry_file.to_string();
        self
    }

    /// Whether the port fits in the TCP range
    pub fn port_is_valid(&self) -> bool {
        (1..=u32::from(u16::MAX)).contains(&self.port)
    }

    /// Parse `setup.toml` content; `path` is only used for error messages
    pub fn parse(content: &str, path: &Path, app_dir: &Path) -> Result<Self> {
        let file: SetupFile = toml::from_str(content).map_err(|e| DeployError::MalformedSetup {
            path: path.to_path_buf(),
            reason: e.message().to_string(),
        })?;

        let setup = Self {
            title: file.title,
            owner: file.owner,
            port: file.streamlit.port,
            base_path: file.streamlit.base_path,
            entry_file: file.streamlit.entry_file,
            app_dir: app_dir.to_path_buf(),
        };
        setup.validate(path)?;
        Ok(setup)
    }

    /// Load `<app_dir>/<setup_file>`
    pub fn load(app_dir: &Path, setup_file: &str) -> Result<Self> {
        let path = app_dir.join(setup_file);
        let content = std::fs::read_to_string(&path)
            .map_err(|_| DeployError::ConfigurationNotFound(path.clone()))?;
        Self::parse(&content, &path, app_dir)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        let mut missing = Vec::new();

        if self.title.trim().is_empty() {
            missing.push("title");
        }
        if self.base_path.trim().is_empty() {
            missing.push("streamlit.base_path");
        }
        if self.entry_file.trim().is_empty() {
            missing.push("streamlit.entry_file");
        }

        if !missing.is_empty() {
            return Err(DeployError::MalformedSetup {
                path: path.to_path_buf(),
                reason: format!("empty value for {}", missing.join(", ")),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const FULL_SETUP: &str = r#"
title = "Sales Dashboard"

[owner]
name = "Jane Doe"

[streamlit]
port = 8501
base_path = "/sales"
entry_file = "main.py"
"#;

    #[test]
    fn test_parse_setup() {
        let setup = AppSetup::parse(
            FULL_SETUP,
            Path::new("apps/sales/setup.toml"),
            Path::new("apps/sales"),
        )
        .unwrap();

        assert_eq!(setup.title, "Sales Dashboard");
        assert_eq!(setup.owner.name, "Jane Doe");
        assert_eq!(setup.port, 8501);
        assert_eq!(setup.base_path, "/sales");
        assert_eq!(setup.entry_file, "main.py");
        assert_eq!(setup.app_dir, PathBuf::from("apps/sales"));
        assert!(setup.port_is_valid());
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let content = format!("{FULL_SETUP}\n[extra]\nfoo = 1\n");
        let setup = AppSetup::parse(&content, Path::new("s.toml"), Path::new(".")).unwrap();
        assert_eq!(setup.title, "Sales Dashboard");
    }

    #[test]
    fn test_missing_key_is_malformed() {
        let content = r#"
title = "No Port"

[owner]
name = "x"

[streamlit]
base_path = "/np"
entry_file = "app.py"
"#;
        let err = AppSetup::parse(content, Path::new("apps/np/setup.toml"), Path::new("apps/np"))
            .unwrap_err();

        match err {
            DeployError::MalformedSetup { path, reason } => {
                assert_eq!(path, PathBuf::from("apps/np/setup.toml"));
                assert!(reason.contains("port"), "reason was: {reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_owner_is_malformed() {
        let content = r#"
title = "Orphan"

[streamlit]
port = 8501
base_path = "/o"
entry_file = "app.py"
"#;
        let err = AppSetup::parse(content, Path::new("s.toml"), Path::new(".")).unwrap_err();
        assert!(matches!(err, DeployError::MalformedSetup { .. }));
    }

    #[test]
    fn test_empty_values_are_malformed() {
        let content = r#"
title = ""

[owner]
name = "x"

[streamlit]
port = 8501
base_path = "/o"
entry_file = ""
"#;
        let err = AppSetup::parse(content, Path::new("s.toml"), Path::new(".")).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("title"));
        assert!(msg.contains("streamlit.entry_file"));
    }

    #[test]
    fn test_negative_port_is_malformed() {
        let content = FULL_SETUP.replace("port = 8501", "port = -1");
        let err = AppSetup::parse(&content, Path::new("s.toml"), Path::new(".")).unwrap_err();
        assert!(matches!(err, DeployError::MalformedSetup { .. }));
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("setup.toml"), FULL_SETUP).unwrap();

        let setup = AppSetup::load(dir.path(), "setup.toml").unwrap();
        assert_eq!(setup.app_dir, dir.path());
        assert_eq!(setup.port, 8501);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            AppSetup::load(dir.path(), "setup.toml"),
            Err(DeployError::ConfigurationNotFound(_))
        ));
    }

    #[test]
    fn test_builder_helpers() {
        let setup = AppSetup::new("Demo", 8501, "/demo/", "/srv/demo")
            .with_owner("ops")
            .with_entry_file("main.py");
        assert_eq!(setup.owner.name, "ops");
        assert_eq!(setup.entry_file, "main.py");
    }

    #[test]
    fn test_port_range() {
        assert!(AppSetup::new("a", 8501, "/a/", ".").port_is_valid());
        assert!(!AppSetup::new("a", 85012, "/a/", ".").port_is_valid());
        assert!(!AppSetup::new("a", 0, "/a/", ".").port_is_valid());
    }
}
