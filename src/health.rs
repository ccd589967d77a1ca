//! Liveness check for a deployed host
//!
//! Healthy means supervisord reports no program in `FATAL` state (ignoring the
//! configured names) and every configured URL answers `200`.

use crate::config::HealthConfig;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::process::Command;
use tracing::{debug, error, info};

/// Environment variable that forces a healthy result
pub const ALWAYS_HEALTHY_ENV: &str = "ALWAYS_HEALTHY";

/// One line of `supervisorctl status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessStatus {
    pub name: String,
    pub status: String,
    pub details: String,
}

/// Parse `supervisorctl status` output: `name status details...` per line.
/// Blank lines and lines with a single field are skipped.
pub fn parse_supervisor_status(output: &str) -> Vec<ProcessStatus> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let mut parts = line.splitn(2, char::is_whitespace);
            let name = parts.next()?;
            let rest = parts.next()?.trim_start();
            let mut parts = rest.splitn(2, char::is_whitespace);
            let status = parts.next().filter(|s| !s.is_empty())?;
            let details = parts.next().map(str::trim_start).unwrap_or("");
            Some(ProcessStatus {
                name: name.to_string(),
                status: status.to_string(),
                details: details.to_string(),
            })
        })
        .collect()
}

/// Run `supervisorctl status`; `None` when it cannot be run or exits non-zero
pub async fn fetch_supervisor_status() -> Option<Vec<ProcessStatus>> {
    let output = match Command::new("supervisorctl").arg("status").output().await {
        Ok(output) => output,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            error!("supervisorctl command not found. Is supervisor installed?");
            return None;
        }
        Err(e) => {
            error!(error = %e, "Error running supervisorctl");
            return None;
        }
    };

    if !output.status.success() {
        error!(
            status = %output.status,
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "Error running supervisorctl"
        );
        return None;
    }

    Some(parse_supervisor_status(&String::from_utf8_lossy(
        &output.stdout,
    )))
}

/// `false` when the list is empty or any non-ignored program is `FATAL`
pub fn all_running(processes: &[ProcessStatus], ignore: &[String]) -> bool {
    if processes.is_empty() {
        error!("No processes to check");
        return false;
    }

    let mut healthy = true;
    for process in processes {
        if ignore.iter().any(|name| name == &process.name) {
            continue;
        }
        if process.status == "FATAL" {
            error!(name = %process.name, details = %process.details, "Program is FATAL");
            healthy = false;
        } else {
            info!(name = %process.name, status = %process.status, details = %process.details, "Program status");
        }
    }
    healthy
}

/// Issue a plain HTTP/1.1 GET and report whether the status code is 200
pub async fn check_url(url: &str, timeout: Duration) -> bool {
    let url_without_scheme = url.strip_prefix("http://").unwrap_or(url);
    let (host_port, path) = url_without_scheme
        .split_once('/')
        .map(|(h, p)| (h, format!("/{}", p)))
        .unwrap_or((url_without_scheme, "/".to_string()));
    let addr = if host_port.contains(':') {
        host_port.to_string()
    } else {
        format!("{host_port}:80")
    };

    let mut stream = match tokio::time::timeout(timeout, TcpStream::connect(&addr)).await {
        Ok(Ok(s)) => s,
        Ok(Err(e)) => {
            debug!(url, error = %e, "Connection failed");
            return false;
        }
        Err(_) => {
            debug!(url, "Connection timed out");
            return false;
        }
    };

    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        path, host_port
    );
    if stream.write_all(request.as_bytes()).await.is_err() {
        return false;
    }

    let read_result = tokio::time::timeout(timeout, async {
        let mut reader = BufReader::new(stream);
        let mut status_line = String::new();
        reader.read_line(&mut status_line).await?;
        Ok::<_, std::io::Error>(status_line)
    })
    .await;

    match read_result {
        // Format: "HTTP/1.1 200 OK\r\n"
        Ok(Ok(status_line)) => status_line
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse::<u16>().ok())
            .is_some_and(|code| code == 200),
        _ => false,
    }
}

/// Runs the supervisor and URL checks
pub struct HealthChecker {
    config: HealthConfig,
}

impl HealthChecker {
    pub fn new(config: HealthConfig) -> Self {
        Self { config }
    }

    /// Honour `ALWAYS_HEALTHY=true` on top of the configured flag
    pub fn with_env_override(mut self) -> Self {
        if std::env::var(ALWAYS_HEALTHY_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("true")) {
            self.config.always_healthy = true;
        }
        self
    }

    pub async fn run(&self) -> bool {
        info!("Starting healthcheck");
        if self.config.always_healthy {
            info!("ALWAYS_HEALTHY enabled");
            return true;
        }
        let processes = fetch_supervisor_status().await;
        self.evaluate(processes.as_deref()).await
    }

    /// Decide health from an already-fetched supervisor status
    pub async fn evaluate(&self, processes: Option<&[ProcessStatus]>) -> bool {
        let processes = match processes {
            Some(processes) if !processes.is_empty() => processes,
            _ => {
                error!("UNHEALTHY - could not fetch supervisorctl status");
                return false;
            }
        };

        if !all_running(processes, &self.config.ignore) {
            return false;
        }

        for url in &self.config.urls {
            if check_url(url, self.config.timeout()).await {
                info!(url = %url, "Online");
            } else {
                error!(url = %url, "Can't reach");
                return false;
            }
        }

        info!("All checks passed");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    const STATUS: &str = "\
demo                             RUNNING   pid 123, uptime 1:02:03
sales__dashboard                 FATAL     Exited too quickly (process log may have details)

tail                             FATAL     can't find command
lonely
";

    async fn serve_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        format!("http://{}/demo/", addr)
    }

    fn status(name: &str, state: &str) -> ProcessStatus {
        ProcessStatus {
            name: name.to_string(),
            status: state.to_string(),
            details: String::new(),
        }
    }

    #[test]
    fn test_parse_supervisor_status() {
        let processes = parse_supervisor_status(STATUS);

        assert_eq!(processes.len(), 3);
        assert_eq!(processes[0].name, "demo");
        assert_eq!(processes[0].status, "RUNNING");
        assert_eq!(processes[0].details, "pid 123, uptime 1:02:03");
        assert_eq!(processes[1].status, "FATAL");
        assert_eq!(
            processes[1].details,
            "Exited too quickly (process log may have details)"
        );
        assert_eq!(processes[2].name, "tail");
    }

    #[test]
    fn test_parse_two_fields() {
        let processes = parse_supervisor_status("demo STOPPED\n");
        assert_eq!(processes, vec![status("demo", "STOPPED")]);
    }

    #[test]
    fn test_all_running() {
        let ignore = vec!["tail".to_string()];

        assert!(all_running(
            &[status("demo", "RUNNING"), status("tail", "FATAL")],
            &ignore
        ));
        assert!(!all_running(
            &[status("demo", "RUNNING"), status("other", "FATAL")],
            &ignore
        ));
        assert!(all_running(&[status("demo", "STARTING")], &ignore));
        assert!(!all_running(&[], &ignore));
    }

    #[tokio::test]
    async fn test_check_url_ok() {
        let url = serve_once("HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n").await;
        assert!(check_url(&url, Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn test_check_url_not_found() {
        let url = serve_once("HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n").await;
        assert!(!check_url(&url, Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn test_check_url_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        assert!(!check_url(&format!("http://{}/", addr), Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_always_healthy_short_circuits() {
        let checker = HealthChecker::new(HealthConfig {
            always_healthy: true,
            urls: vec!["http://127.0.0.1:1/never".to_string()],
            ..HealthConfig::default()
        });
        assert!(checker.run().await);
    }

    #[tokio::test]
    async fn test_evaluate() {
        let url = serve_once("HTTP/1.1 200 OK\r\n\r\n").await;
        let checker = HealthChecker::new(HealthConfig {
            urls: vec![url],
            ..HealthConfig::default()
        });

        let empty: Vec<ProcessStatus> = Vec::new();
        let fatal = vec![status("demo", "FATAL")];
        let running = vec![status("demo", "RUNNING"), status("tail", "FATAL")];

        assert!(!checker.evaluate(None).await);
        assert!(!checker.evaluate(Some(empty.as_slice())).await);
        assert!(!checker.evaluate(Some(fatal.as_slice())).await);
        assert!(checker.evaluate(Some(running.as_slice())).await);
    }
}
