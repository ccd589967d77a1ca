//! One deployment pass over every app directory
//!
//! `discover -> for each app: load -> resolve -> provision -> (deploy) supervisor
//! merge -> (deploy) proxy merge`. The pass is sequential and stops at the first
//! error: a malformed setup in one app aborts the whole run, and files already
//! merged for earlier apps are left as written.

use crate::config::Config;
use crate::error::{DeployError, Result};
use crate::merge::{ConfigMerger, MergeOutcome};
use crate::provision::Provisioner;
use crate::registry::IdentityRegistry;
use crate::setup::AppSetup;
use crate::{proxy, supervisor};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Switches taken from the command line
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Write the shared supervisord and nginx files
    pub deploy: bool,
    /// Rebuild each app's environment from scratch
    pub hard_reset: bool,
}

/// Result for one app
#[derive(Debug, Clone)]
pub struct DeployedApp {
    /// Directory name under the apps root
    pub dir_name: String,
    /// Setup after identity resolution
    pub setup: AppSetup,
    pub interpreter: PathBuf,
    /// `None` when not deploying
    pub supervisor: Option<MergeOutcome>,
    pub proxy: Option<MergeOutcome>,
}

/// Everything a run did, in discovery order
#[derive(Debug, Clone, Default)]
pub struct DeploymentReport {
    pub apps: Vec<DeployedApp>,
}

impl DeploymentReport {
    /// Number of shared-file writes performed
    pub fn writes(&self) -> usize {
        self.apps
            .iter()
            .flat_map(|app| [app.supervisor, app.proxy])
            .flatten()
            .filter(MergeOutcome::wrote)
            .count()
    }
}

/// List app directories under `apps_root`, sorted by name.
///
/// Returned paths are absolute: they end up in supervisord stanzas, which
/// supervisord resolves against its own working directory.
pub fn discover(apps_root: &Path) -> Result<Vec<PathBuf>> {
    if !apps_root.is_dir() {
        return Err(DeployError::ConfigurationNotFound(apps_root.to_path_buf()));
    }

    let root = std::path::absolute(apps_root).map_err(|e| DeployError::fs(apps_root, e))?;
    let entries = std::fs::read_dir(&root).map_err(|e| DeployError::fs(&root, e))?;

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| DeployError::fs(&root, e))?;
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Drives a deployment pass
pub struct DeploymentOrchestrator<P> {
    config: Config,
    provisioner: P,
    options: RunOptions,
}

impl<P: Provisioner> DeploymentOrchestrator<P> {
    pub fn new(config: Config, provisioner: P, options: RunOptions) -> Self {
        Self {
            config,
            provisioner,
            options,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn provisioner(&self) -> &P {
        &self.provisioner
    }

    pub async fn run(&self) -> Result<DeploymentReport> {
        let apps_root = &self.config.paths.apps_root;
        let app_dirs = discover(apps_root).map_err(|e| {
            error!(path = %apps_root.display(), kind = e.kind(), error = %e, "Could not list apps");
            e
        })?;

        info!(
            path = %apps_root.display(),
            count = app_dirs.len(),
            deploy = self.options.deploy,
            hard_reset = self.options.hard_reset,
            "Starting deployment pass"
        );

        let merger = ConfigMerger::from_config(&self.config);
        let mut registry = IdentityRegistry::new();
        let mut report = DeploymentReport::default();

        for (ordinal, app_dir) in app_dirs.iter().enumerate() {
            let deployed = self
                .deploy_app(app_dir, ordinal, &mut registry, &merger)
                .await
                .map_err(|e| {
                    error!(path = %app_dir.display(), kind = e.kind(), error = %e, "Deployment stopped");
                    e
                })?;
            report.apps.push(deployed);
        }

        info!(apps = report.apps.len(), writes = report.writes(), "Deployment pass finished");
        Ok(report)
    }

    async fn deploy_app(
        &self,
        app_dir: &Path,
        ordinal: usize,
        registry: &mut IdentityRegistry,
        merger: &ConfigMerger,
    ) -> Result<DeployedApp> {
        let dir_name = app_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!(app = %dir_name, "Building");

        info!(app = %dir_name, "Loading settings");
        let setup = AppSetup::load(app_dir, &self.config.paths.setup_file)?;
        let setup = registry.resolve(setup, ordinal);
        if !setup.port_is_valid() {
            warn!(app = %setup.title, port = setup.port, "Port is outside the TCP range, the app will not start");
        }

        info!(app = %dir_name, "Creating environment and installing dependencies");
        let interpreter = self
            .provisioner
            .ensure_environment(&setup, self.options.hard_reset)
            .await?;

        let (supervisor, proxy) = if self.options.deploy {
            info!(app = %dir_name, "Updating supervisor conf");
            let program = supervisor::render(&setup, &interpreter, &self.config);
            let supervisor = merger.append_supervisor(&program)?;

            info!(app = %dir_name, "Updating nginx conf");
            let locations = proxy::render_locations(&setup);
            let proxy = merger.merge_proxy(&locations)?;

            (Some(supervisor), Some(proxy))
        } else {
            info!(app = %dir_name, "Skipping supervisor update");
            info!(app = %dir_name, "Skipping nginx update");
            (None, None)
        };

        Ok(DeployedApp {
            dir_name,
            setup,
            interpreter,
            supervisor,
            proxy,
        })
    }
}
