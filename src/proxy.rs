//! nginx routing blocks for streaming web apps
//!
//! Each app gets two `location` rules bound to `127.0.0.1:<port>`: one for its
//! base path and one for the `_stcore/stream` websocket the runtime uses to
//! push updates. The first time the proxy file is written the rules are
//! wrapped in a `server {}` stanza that ends with a catch-all 404 rule; later
//! merges insert new rules right before that rule's marker comment.

use crate::config::ProxyConfig;
use crate::setup::AppSetup;
use std::fmt;

/// Comment line that precedes the catch-all rule; new blocks go right above it
pub const CATCH_ALL_MARKER: &str = "    # Default location block";

/// Read timeout for the streaming connection (24 hours)
pub const STREAM_READ_TIMEOUT_SECS: u64 = 86_400;

/// Path suffix of the runtime's push-update websocket
pub const STREAM_SUFFIX: &str = "_stcore/stream";

/// Rendered pair of `location` rules for one app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyBlock(String);

impl ProxyBlock {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProxyBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Make sure a base path starts and ends with `/`. Idempotent.
pub fn normalize_base_path(base_path: &str) -> String {
    let mut path = String::with_capacity(base_path.len() + 2);
    if !base_path.starts_with('/') {
        path.push('/');
    }
    path.push_str(base_path);
    if !path.ends_with('/') {
        path.push('/');
    }
    path
}

/// Render the root and stream `location` rules for one app
pub fn render_locations(setup: &AppSetup) -> ProxyBlock {
    let base_path = normalize_base_path(&setup.base_path);
    let port = setup.port;

    ProxyBlock(format!(
        r#"
    location {base_path} {{
        proxy_pass http://127.0.0.1:{port}{base_path};
        proxy_set_header Host $host;
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
        proxy_set_header X-Forwarded-Proto $scheme;
        proxy_http_version 1.1;
        proxy_set_header Upgrade $http_upgrade;
        proxy_set_header Connection "upgrade";
    }}

    location {base_path}{STREAM_SUFFIX} {{
        proxy_pass http://127.0.0.1:{port}{base_path}{STREAM_SUFFIX};
        proxy_http_version 1.1;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
        proxy_set_header Host $host;
        proxy_set_header Upgrade $http_upgrade;
        proxy_set_header Connection "upgrade";
        proxy_read_timeout {STREAM_READ_TIMEOUT_SECS};
    }}
    "#
    ))
}

/// Render a complete `server {}` stanza holding `blocks` and the catch-all rule
pub fn render_server(blocks: &[ProxyBlock], settings: &ProxyConfig) -> String {
    let locations = blocks
        .iter()
        .map(ProxyBlock::as_str)
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"
server {{
    listen {listen};
    server_name {server_name};

    # Streamlit apps
    {locations}

{CATCH_ALL_MARKER}
    location / {{
        return 404;
    }}
}}
"#,
        listen = settings.listen,
        server_name = settings.server_name,
    )
}

/// Insert `block` right above the catch-all marker. Returns `None` when the
/// marker is missing. Everything outside the inserted text is kept verbatim.
pub fn insert_before_catch_all(existing: &str, block: &ProxyBlock) -> Option<String> {
    let at = existing.find(CATCH_ALL_MARKER)?;

    let mut merged = String::with_capacity(existing.len() + block.as_str().len() + 8);
    merged.push_str(&existing[..at]);
    merged.push_str("    ");
    merged.push_str(block.as_str());
    merged.push('\n');
    merged.push_str(&existing[at..]);
    Some(merged)
}
