use crate::error::{DeployError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default name of the tool configuration file, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "appdeck.toml";

/// Global configuration for a deployment run
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Locations of inputs and shared output files
    #[serde(default)]
    pub paths: PathsConfig,

    /// How per-app environments are built and launched
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Settings for the generated nginx server stanza
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Liveness check settings (used by `appdeck-health`)
    #[serde(default)]
    pub health: HealthConfig,

    /// Hold an exclusive lock on each shared file while merging into it
    #[serde(default)]
    pub lock: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    /// Directory holding one sub-directory per application
    #[serde(default = "default_apps_root")]
    pub apps_root: PathBuf,

    /// Shared supervisord configuration file
    #[serde(default = "default_supervisor_conf")]
    pub supervisor_conf: PathBuf,

    /// Shared nginx configuration file
    #[serde(default = "default_proxy_conf")]
    pub proxy_conf: PathBuf,

    /// Directory supervisord writes program logs into
    #[serde(default = "default_supervisor_log_dir")]
    pub supervisor_log_dir: PathBuf,

    /// Name of the per-app declarative setup file
    #[serde(default = "default_setup_file")]
    pub setup_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            apps_root: default_apps_root(),
            supervisor_conf: default_supervisor_conf(),
            proxy_conf: default_proxy_conf(),
            supervisor_log_dir: default_supervisor_log_dir(),
            setup_file: default_setup_file(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RuntimeConfig {
    /// Interpreter used to create virtual environments
    #[serde(default = "default_python")]
    pub python: String,

    /// Virtual environment directory name inside each app
    #[serde(default = "default_venv_name")]
    pub venv_name: String,

    /// Module launched with `-m` by supervisord
    #[serde(default = "default_module")]
    pub module: String,

    /// Requirements file installed into each environment
    #[serde(default = "default_requirements")]
    pub requirements: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            python: default_python(),
            venv_name: default_venv_name(),
            module: default_module(),
            requirements: default_requirements(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProxyConfig {
    /// Port nginx listens on (default: 80)
    #[serde(default = "default_listen_port")]
    pub listen: u16,

    /// `server_name` directive of the generated stanza
    #[serde(default = "default_server_name")]
    pub server_name: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_port(),
            server_name: default_server_name(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HealthConfig {
    /// Report healthy without checking anything
    #[serde(default)]
    pub always_healthy: bool,

    /// supervisord programs whose status is not checked
    #[serde(default = "default_health_ignore")]
    pub ignore: Vec<String>,

    /// URLs that must answer 200
    #[serde(default = "default_health_urls")]
    pub urls: Vec<String>,

    /// Timeout for each URL check in seconds (default: 5)
    #[serde(default = "default_health_timeout")]
    pub timeout_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            always_healthy: false,
            ignore: default_health_ignore(),
            urls: default_health_urls(),
            timeout_secs: default_health_timeout(),
        }
    }
}

impl HealthConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_apps_root() -> PathBuf {
    PathBuf::from("apps")
}

fn default_supervisor_conf() -> PathBuf {
    PathBuf::from("supervisord.conf")
}

fn default_proxy_conf() -> PathBuf {
    PathBuf::from("nginx.conf")
}

fn default_supervisor_log_dir() -> PathBuf {
    PathBuf::from("/var/log/supervisor")
}

fn default_setup_file() -> String {
    "setup.toml".to_string()
}

fn default_python() -> String {
    "python".to_string()
}

fn default_venv_name() -> String {
    ".venv".to_string()
}

fn default_module() -> String {
    "streamlit".to_string()
}

fn default_requirements() -> String {
    "requirements.txt".to_string()
}

fn default_listen_port() -> u16 {
    80
}

fn default_server_name() -> String {
    "localhost".to_string()
}

fn default_health_ignore() -> Vec<String> {
    vec!["tail".to_string()]
}

fn default_health_urls() -> Vec<String> {
    vec!["http://localhost:80/app-1".to_string()]
}

fn default_health_timeout() -> u64 {
    5
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| DeployError::fs(path, e))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| DeployError::InvalidToolConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, else the default file if present, else built-in defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::load(DEFAULT_CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    /// Validate all configuration
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.paths.setup_file.is_empty() {
            errors.push("paths.setup_file must not be empty".to_string());
        }
        if self.runtime.venv_name.is_empty() {
            errors.push("runtime.venv_name must not be empty".to_string());
        }
        if self.runtime.module.is_empty() {
            errors.push("runtime.module must not be empty".to_string());
        }
        if self.proxy.server_name.trim().is_empty() {
            errors.push("proxy.server_name must not be empty".to_string());
        }

        if !errors.is_empty() {
            return Err(DeployError::InvalidToolConfig(format!(
                "\n  - {}",
                errors.join("\n  - ")
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
lock = true

[paths]
apps_root = "/srv/apps"
supervisor_conf = "/etc/supervisor/conf.d/apps.conf"
proxy_conf = "/etc/nginx/conf.d/apps.conf"

[runtime]
python = "python3.12"

[proxy]
listen = 8080
server_name = "apps.internal"

[health]
urls = ["http://localhost:8080/a/", "http://localhost:8080/b/"]
timeout_secs = 2
"#;

        let config: Config = toml::from_str(toml).unwrap();
        config.validate().unwrap();

        assert!(config.lock);
        assert_eq!(config.paths.apps_root, PathBuf::from("/srv/apps"));
        assert_eq!(
            config.paths.proxy_conf,
            PathBuf::from("/etc/nginx/conf.d/apps.conf")
        );
        assert_eq!(config.paths.setup_file, "setup.toml");
        assert_eq!(config.runtime.python, "python3.12");
        assert_eq!(config.runtime.venv_name, ".venv");
        assert_eq!(config.proxy.listen, 8080);
        assert_eq!(config.proxy.server_name, "apps.internal");
        assert_eq!(config.health.urls.len(), 2);
        assert_eq!(config.health.timeout(), Duration::from_secs(2));
        assert_eq!(config.health.ignore, vec!["tail".to_string()]);
    }

    #[test]
    fn test_empty_config() {
        let config: Config = toml::from_str("").unwrap();

        assert!(!config.lock);
        assert_eq!(config.paths.apps_root, PathBuf::from("apps"));
        assert_eq!(config.paths.supervisor_conf, PathBuf::from("supervisord.conf"));
        assert_eq!(config.paths.proxy_conf, PathBuf::from("nginx.conf"));
        assert_eq!(
            config.paths.supervisor_log_dir,
            PathBuf::from("/var/log/supervisor")
        );
        assert_eq!(config.runtime.module, "streamlit");
        assert_eq!(config.runtime.requirements, "requirements.txt");
        assert_eq!(config.proxy.listen, 80);
        assert_eq!(config.proxy.server_name, "localhost");
        assert!(!config.health.always_healthy);
    }

    #[test]
    fn test_validate_rejects_empty_values() {
        let toml = r#"
[runtime]
venv_name = ""
module = ""
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err().to_string();

        assert!(err.contains("runtime.venv_name"));
        assert!(err.contains("runtime.module"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appdeck.toml");
        std::fs::write(&path, "[proxy]\nlisten = 81\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.proxy.listen, 81);
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appdeck.toml");
        std::fs::write(&path, "[proxy\nlisten = 81\n").unwrap();

        assert!(matches!(
            Config::load(&path),
            Err(DeployError::InvalidToolConfig(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(dir.path().join("nope.toml"));
        assert!(matches!(result, Err(DeployError::FileSystemFailure { .. })));
    }
}
