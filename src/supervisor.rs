//! supervisord `[program:]` stanzas

use crate::config::Config;
use crate::setup::AppSetup;
use regex::Regex;
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

/// Rendered `[program:]` stanza for one app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorBlock(String);

impl SupervisorBlock {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SupervisorBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn non_alphanumeric() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-zA-Z0-9]").expect("valid regex"))
}

fn uppercase() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Z]").expect("valid regex"))
}

fn whitespace_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"))
}

/// Derive the supervisord program name from an app title.
///
/// Non-alphanumerics become separators, an underscore goes before every
/// uppercase letter except a leading one, runs of separators collapse to one
/// underscore and the result is lower-cased. `"Sales Dashboard"` gives
/// `"sales__dashboard"` because the space and the camel-case split each add a
/// separator; existing log file names rely on that.
pub fn program_name(title: &str) -> String {
    let spaced = non_alphanumeric().replace_all(title, " ");
    let split = uppercase().replace_all(&spaced, |caps: &regex::Captures<'_>| {
        let m = caps.get(0).map_or("", |m| m.as_str());
        let at = caps.get(0).map_or(0, |m| m.start());
        if at == 0 {
            m.to_string()
        } else {
            format!("_{m}")
        }
    });
    whitespace_run()
        .replace_all(&split, "_")
        .to_lowercase()
}

/// Render the `[program:]` stanza that launches `setup` with `interpreter`
pub fn render(setup: &AppSetup, interpreter: &Path, config: &Config) -> SupervisorBlock {
    let name = program_name(&setup.title);
    let log_dir = config.paths.supervisor_log_dir.display();

    SupervisorBlock(format!(
        "[program:{name}]\n\
         command={interpreter} -m {module} run {entry_file} --server.port={port} --server.baseUrlPath={base_path}\n\
         directory={directory}\n\
         autostart=true\n\
         autorestart=true\n\
         stderr_logfile={log_dir}/{name}.err.log\n\
         stdout_logfile={log_dir}/{name}.out.log\n",
        interpreter = interpreter.display(),
        module = config.runtime.module,
        entry_file = setup.entry_file,
        port = setup.port,
        base_path = setup.base_path,
        directory = setup.app_dir.display(),
    ))
}
