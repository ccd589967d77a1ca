//! appdeck - put many small web apps behind one supervisord and one nginx
//!
//! For every app directory this library:
//! - Loads and validates the app's `setup.toml`
//! - Gives the app a title, URL path and port no other app in the run uses
//! - Builds the app's virtual environment and installs its requirements
//! - Renders a supervisord `[program:]` stanza and a pair of nginx `location` rules
//! - Merges both into shared config files without touching unrelated entries,
//!   keeping a `.bak` copy of each file before it changes

pub mod config;
pub mod error;
pub mod health;
pub mod lock;
pub mod merge;
pub mod orchestrator;
pub mod provision;
pub mod proxy;
pub mod registry;
pub mod setup;
pub mod supervisor;
