//! Identity allocation across the apps of one run
//!
//! Titles, base paths and ports must be pairwise distinct within a run. When a
//! value was already taken, the app's discovery ordinal is used to derive a new
//! one:
//!
//! - title: `"<title> <ordinal>"`
//! - base path: `_<ordinal>` inserted before the trailing slash (`/a/` -> `/a_2/`)
//! - port: the ordinal's digits appended to the port (`8501` at 2 -> `85012`)
//!
//! This is best-effort, not collision-proof: two repeated collisions within the
//! same field can still produce a value that was taken, and the port rule can
//! leave the TCP range. Titles are compared exactly, so `Demo` and `demo` both
//! pass but share the supervisord program name and log files. Existing supervisord and nginx files depend on these
//! exact results, so the rules are kept as they are.

use crate::proxy::normalize_base_path;
use crate::setup::AppSetup;
use std::collections::HashSet;
use tracing::warn;

/// Names, paths and ports handed out so far in this run
#[derive(Debug, Default, Clone)]
pub struct IdentityRegistry {
    names: HashSet<String>,
    paths: HashSet<String>,
    ports: HashSet<u32>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn has_path(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn has_port(&self, port: u32) -> bool {
        self.ports.contains(&port)
    }

    /// Number of distinct (names, paths, ports) recorded
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.names.len(), self.paths.len(), self.ports.len())
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.paths.is_empty() && self.ports.is_empty()
    }

    /// Make `setup`'s identity unique against everything seen so far and record it
    pub fn resolve(&mut self, mut setup: AppSetup, ordinal: usize) -> AppSetup {
        if self.names.contains(&setup.title) {
            let title = format!("{} {}", setup.title, ordinal);
            warn!(from = %setup.title, to = %title, "Title already taken, renaming");
            setup.title = title;
        }
        self.names.insert(setup.title.clone());

        let path = normalize_base_path(&setup.base_path);
        setup.base_path = if self.paths.contains(&path) {
            let renamed = suffix_path(&path, ordinal);
            warn!(app = %setup.title, from = %path, to = %renamed, "Base path already taken, renaming");
            renamed
        } else {
            path
        };
        self.paths.insert(setup.base_path.clone());

        if self.ports.contains(&setup.port) {
            let port = suffix_port(setup.port, ordinal);
            warn!(app = %setup.title, from = setup.port, to = port, "Port already taken, reassigning");
            if u16::try_from(port).is_err() {
                warn!(app = %setup.title, port, "Reassigned port is outside the TCP range");
            }
            setup.port = port;
        }
        self.ports.insert(setup.port);

        setup
    }
}

/// `/a/` at 2 -> `/a_2/`, `/` at 2 -> `/_2/`. Expects a normalized path.
fn suffix_path(path: &str, ordinal: usize) -> String {
    let stem = path.strip_suffix('/').unwrap_or(path);
    if stem.is_empty() {
        return format!("/_{ordinal}/");
    }
    format!("{stem}_{ordinal}/")
}

/// `8501` at 2 -> `85012`. Saturates instead of wrapping for absurd inputs.
fn suffix_port(port: u32, ordinal: usize) -> u32 {
    format!("{port}{ordinal}").parse().unwrap_or(u32::MAX)
}
