//! Best-effort SSH session detection from the process environment.
//!
//! A forced command or session hook inherits sshd's environment but not its
//! knowledge of which key authenticated. This module gathers whatever the
//! environment and a couple of blocking OS probes (`ss`, `ps`, `whoami`)
//! will give up. Every probe fails soft: a miss is `"unknown"`, never an
//! error.

use std::io::IsTerminal;
use std::process::Command;

use serde::Serialize;

use crate::fingerprint::UNKNOWN;

/// Snapshot of the current session as seen from the environment.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub ip_address: String,
    pub username: String,
    pub connection_type: String,
    pub key_fingerprint: String,
    pub key_comment: String,
    pub ssh_user: Option<String>,
    pub port: String,
    pub client_version: String,
}

impl ConnectionInfo {
    /// Probe the environment and process table for connection details.
    pub fn detect() -> Self {
        tracing::debug!(
            "env USER={:?} LOGNAME={:?} SSH_USER={:?}",
            std::env::var("USER").ok(),
            std::env::var("LOGNAME").ok(),
            std::env::var("SSH_USER").ok(),
        );

        let hint = EnvHint::from_env();
        Self {
            ip_address: source_ip(),
            username: current_username(),
            connection_type: connection_type(),
            key_fingerprint: hint.fingerprint.unwrap_or_else(|| UNKNOWN.to_string()),
            key_comment: hint.comment.unwrap_or_else(|| UNKNOWN.to_string()),
            ssh_user: std::env::var("SSH_USER").ok(),
            port: source_port(),
            client_version: std::env::var("SSH_CLIENT_VERSION")
                .unwrap_or_else(|_| UNKNOWN.to_string()),
        }
    }
}

/// Caller-supplied key identity hints, the correlator's last fallback.
///
/// Kept as a plain value so the correlator can be constructed with a fixed
/// hint in tests instead of reading process-global state.
#[derive(Debug, Clone, Default)]
pub struct EnvHint {
    pub fingerprint: Option<String>,
    pub comment: Option<String>,
}

impl EnvHint {
    pub fn from_env() -> Self {
        Self {
            fingerprint: std::env::var("SSH_KEY_FINGERPRINT").ok(),
            comment: std::env::var("SSH_KEY_COMMENT").ok(),
        }
    }
}

/// Source IP: `SSH_CONNECTION`, then `SSH_CLIENT`, then an `ss -tnp` scan
/// for an established sshd peer.
fn source_ip() -> String {
    for var in ["SSH_CONNECTION", "SSH_CLIENT"] {
        if let Ok(value) = std::env::var(var) {
            if let Some(ip) = value.split_whitespace().next() {
                return ip.to_string();
            }
        }
    }

    if let Some(output) = run_capture("ss", &["-tnp"]) {
        for line in output.lines() {
            if line.contains("sshd") && line.contains("ESTAB") {
                let fields: Vec<&str> = line.split_whitespace().collect();
                if let Some(remote) = fields.get(3) {
                    if let Some((ip, _port)) = remote.rsplit_once(':') {
                        return ip.to_string();
                    }
                }
            }
        }
    }

    UNKNOWN.to_string()
}

fn current_username() -> String {
    for var in ["SSH_USER", "USER", "LOGNAME"] {
        if let Ok(value) = std::env::var(var) {
            if !value.is_empty() {
                return value;
            }
        }
    }

    run_capture("whoami", &[])
        .map(|out| out.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn connection_type() -> String {
    if std::env::var("SSH_ORIGINAL_COMMAND").is_ok() {
        return "Command execution".to_string();
    }
    if std::env::var("SSH_TUNNEL").is_ok() {
        return "Tunnel".to_string();
    }
    if std::io::stdin().is_terminal() && std::io::stdout().is_terminal() {
        return "Interactive shell".to_string();
    }

    // Non-interactive with no env markers: look at the parent command.
    let ppid = std::os::unix::process::parent_id().to_string();
    if let Some(parent_cmd) = run_capture("ps", &["-o", "cmd=", "-p", &ppid]) {
        let parent_cmd = parent_cmd.to_lowercase();
        if parent_cmd.contains("tunnel") {
            return "Tunnel".to_string();
        }
        if parent_cmd.contains("command") {
            return "Command execution".to_string();
        }
    }

    "Interactive shell".to_string()
}

fn source_port() -> String {
    for var in ["SSH_CONNECTION", "SSH_CLIENT"] {
        if let Ok(value) = std::env::var(var) {
            if let Some(port) = value.split_whitespace().nth(1) {
                return port.to_string();
            }
        }
    }
    UNKNOWN.to_string()
}

/// Run a utility and capture stdout; any failure is a soft miss.
fn run_capture(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_hint_default_is_empty() {
        let hint = EnvHint::default();
        assert!(hint.fingerprint.is_none());
        assert!(hint.comment.is_none());
    }

    #[test]
    fn test_connection_info_serializes_expected_shape() {
        let info = ConnectionInfo {
            ip_address: "10.0.0.5".into(),
            username: "alice".into(),
            connection_type: "Command execution".into(),
            key_fingerprint: UNKNOWN.into(),
            key_comment: UNKNOWN.into(),
            ssh_user: None,
            port: "5022".into(),
            client_version: UNKNOWN.into(),
        };

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["ip_address"], "10.0.0.5");
        assert_eq!(json["username"], "alice");
        assert_eq!(json["ssh_user"], serde_json::Value::Null);
        assert_eq!(json["port"], "5022");
    }
}
