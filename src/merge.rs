//! Merging rendered blocks into the shared supervisord and nginx files
//!
//! Both files outlive any single run and may be edited by hand between runs,
//! so they are never regenerated once they exist:
//!
//! - nginx: the block is inserted right above the catch-all marker, unless the
//!   exact block text is already present (re-runs are no-ops).
//! - supervisord: the stanza is appended after a blank line. There is no
//!   duplicate detection, so deploying the same app twice appends it twice.
//!
//! Before an existing file is touched it is copied to `<file>.bak`. Only one
//! backup generation is kept.

use crate::config::{Config, ProxyConfig};
use crate::error::{DeployError, Result};
use crate::lock::maybe_lock;
use crate::proxy::{insert_before_catch_all, render_server, ProxyBlock};
use crate::supervisor::SupervisorBlock;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// What a merge did to its target file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The file did not exist and was created
    Created,
    /// The block was inserted into an existing file
    Inserted,
    /// The block was already present, nothing was written
    Unchanged,
    /// The block was appended to the end of the file
    Appended,
}

impl MergeOutcome {
    pub fn wrote(&self) -> bool {
        !matches!(self, MergeOutcome::Unchanged)
    }
}

/// `<path>.bak`
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}

/// Copy `path` to its backup location, overwriting any previous backup
pub fn backup_file(path: &Path) -> Result<PathBuf> {
    let backup = backup_path(path);
    std::fs::copy(path, &backup).map_err(|e| DeployError::fs(&backup, e))?;
    debug!(path = %path.display(), backup = %backup.display(), "Backup written");
    Ok(backup)
}

/// Writes blocks into the two shared configuration files
#[derive(Debug, Clone)]
pub struct ConfigMerger {
    supervisor_conf: PathBuf,
    proxy_conf: PathBuf,
    proxy: ProxyConfig,
    lock: bool,
}

impl ConfigMerger {
    pub fn new(supervisor_conf: impl Into<PathBuf>, proxy_conf: impl Into<PathBuf>) -> Self {
        Self {
            supervisor_conf: supervisor_conf.into(),
            proxy_conf: proxy_conf.into(),
            proxy: ProxyConfig::default(),
            lock: false,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            supervisor_conf: config.paths.supervisor_conf.clone(),
            proxy_conf: config.paths.proxy_conf.clone(),
            proxy: config.proxy.clone(),
            lock: config.lock,
        }
    }

    pub fn with_lock(mut self, lock: bool) -> Self {
        self.lock = lock;
        self
    }

    pub fn supervisor_conf(&self) -> &Path {
        &self.supervisor_conf
    }

    pub fn proxy_conf(&self) -> &Path {
        &self.proxy_conf
    }

    /// Merge one app's location rules into the nginx file
    pub fn merge_proxy(&self, block: &ProxyBlock) -> Result<MergeOutcome> {
        let path = &self.proxy_conf;
        let _lock = maybe_lock(path, self.lock)?;

        if !path.exists() {
            info!(path = %path.display(), "Creating new nginx configuration");
            let content = render_server(std::slice::from_ref(block), &self.proxy);
            std::fs::write(path, content).map_err(|e| DeployError::fs(path, e))?;
            return Ok(MergeOutcome::Created);
        }

        let existing = std::fs::read_to_string(path).map_err(|e| DeployError::fs(path, e))?;
        backup_file(path)?;

        if existing.contains(block.as_str()) {
            debug!(path = %path.display(), "Location block already present");
            return Ok(MergeOutcome::Unchanged);
        }

        let merged = insert_before_catch_all(&existing, block)
            .ok_or_else(|| DeployError::MergeAnchorMissing(path.clone()))?;
        std::fs::write(path, merged).map_err(|e| DeployError::fs(path, e))?;
        info!(path = %path.display(), "Location block inserted");
        Ok(MergeOutcome::Inserted)
    }

    /// Append one app's `[program:]` stanza to the supervisord file
    pub fn append_supervisor(&self, block: &SupervisorBlock) -> Result<MergeOutcome> {
        let path = &self.supervisor_conf;
        let _lock = maybe_lock(path, self.lock)?;

        if path.exists() {
            backup_file(path)?;
        }

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| DeployError::fs(path, e))?;
        file.write_all(b"\n")
            .and_then(|()| file.write_all(block.as_str().as_bytes()))
            .map_err(|e| DeployError::fs(path, e))?;

        info!(path = %path.display(), "Program stanza appended");
        Ok(MergeOutcome::Appended)
    }
}
