//! Per-app Python environment provisioning
//!
//! Each app gets its own virtual environment inside its directory, created with
//! `python -m venv` and filled with `pip install -r requirements.txt`. An
//! existing environment is reused unless a hard reset was requested.

use crate::config::RuntimeConfig;
use crate::error::{DeployError, Result};
use crate::setup::AppSetup;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Makes an app's runtime environment ready and reports its interpreter
#[allow(async_fn_in_trait)]
pub trait Provisioner {
    /// Ensure the environment for `setup` exists; returns the interpreter path
    async fn ensure_environment(&self, setup: &AppSetup, hard_reset: bool) -> Result<PathBuf>;
}

/// Interpreter and pip locations inside a virtual environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VenvPaths {
    pub root: PathBuf,
    pub python: PathBuf,
    pub pip: PathBuf,
}

impl VenvPaths {
    pub fn new(app_dir: &Path, venv_name: &str) -> Self {
        let root = app_dir.join(venv_name);
        let bin = if cfg!(windows) {
            root.join("Scripts")
        } else {
            root.join("bin")
        };
        Self {
            python: bin.join("python"),
            pip: bin.join("pip"),
            root,
        }
    }
}

/// Provisioner backed by `venv` and `pip`
#[derive(Debug, Clone)]
pub struct VenvProvisioner {
    runtime: RuntimeConfig,
}

impl VenvProvisioner {
    pub fn new(runtime: RuntimeConfig) -> Self {
        Self { runtime }
    }

    pub fn paths(&self, setup: &AppSetup) -> VenvPaths {
        VenvPaths::new(&setup.app_dir, &self.runtime.venv_name)
    }

    async fn run(&self, setup: &AppSetup, command: &mut Command, shown: String) -> Result<()> {
        debug!(app = %setup.title, command = %shown, "Running");

        let status = command
            .status()
            .await
            .map_err(|e| DeployError::ProvisioningFailure {
                app: setup.title.clone(),
                command: shown.clone(),
                status: e.to_string(),
            })?;

        if !status.success() {
            return Err(DeployError::ProvisioningFailure {
                app: setup.title.clone(),
                command: shown,
                status: status.to_string(),
            });
        }

        Ok(())
    }
}

impl Provisioner for VenvProvisioner {
    async fn ensure_environment(&self, setup: &AppSetup, hard_reset: bool) -> Result<PathBuf> {
        let venv = self.paths(setup);

        if hard_reset && venv.root.exists() {
            info!(app = %setup.title, path = %venv.root.display(), "Wiping environment");
            tokio::fs::remove_dir_all(&venv.root)
                .await
                .map_err(|e| DeployError::fs(&venv.root, e))?;
        }

        if venv.root.exists() {
            warn!(
                app = %setup.title,
                path = %venv.root.display(),
                "Environment already exists, remove it with --hard-reset"
            );
            return Ok(venv.python);
        }

        debug!(app = %setup.title, "Creating environment");
        let mut create = Command::new(&self.runtime.python);
        create.arg("-m").arg("venv").arg(&venv.root);
        let shown = format!("{} -m venv {}", self.runtime.python, venv.root.display());
        self.run(setup, &mut create, shown).await?;

        debug!(app = %setup.title, "Installing requirements");
        let mut install = Command::new(&venv.pip);
        install
            .arg("install")
            .arg("-r")
            .arg(&self.runtime.requirements)
            .current_dir(&setup.app_dir);
        let shown = format!(
            "{} install -r {}",
            venv.pip.display(),
            self.runtime.requirements
        );
        self.run(setup, &mut install, shown).await?;

        Ok(venv.python)
    }
}
