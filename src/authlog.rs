//! Auth-log scanning and connection-evidence extraction.
//!
//! Reads a bounded tail of the sshd auth log and mines `Accepted ...` lines
//! for whatever the log format happened to include: a fingerprint (modern
//! SHA256-base64 or legacy hex-colon), a raw base64 key blob, the key
//! algorithm, the auth method. Extraction is driven by ordered pattern
//! tables so the precedence between overlapping formats is data, not
//! branching; the first matching pattern in each table wins.

use std::path::{Path, PathBuf};

use regex_lite::Regex;
use serde::Serialize;

use crate::fingerprint::UNKNOWN;

/// How the session authenticated, as reported by the log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMethod {
    Publickey,
    Password,
    KeyboardInteractive,
    Unknown,
}

impl AuthMethod {
    /// Substring containment in priority order; `publickey` outranks
    /// `password` so lines mentioning both resolve to the stronger claim.
    fn from_line(line: &str) -> Self {
        if line.contains("publickey") {
            Self::Publickey
        } else if line.contains("password") {
            Self::Password
        } else if line.contains("keyboard-interactive") {
            Self::KeyboardInteractive
        } else {
            Self::Unknown
        }
    }
}

/// Evidence extracted from a single auth-log line.
///
/// Every field degrades independently to `"unknown"`; construction never
/// fails. Consumed immediately by the correlator, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionRecord {
    pub fingerprint: String,
    pub key_type: String,
    pub key_data: String,
    pub auth_method: AuthMethod,
}

/// Fingerprint extraction table, most specific first.
///
/// SHA256-base64 forms (what current sshd logs) rank above the legacy
/// hex-colon forms; once one pattern matches the rest are not tried.
fn fingerprint_patterns() -> Vec<Regex> {
    [
        r"RSA SHA256:([A-Za-z0-9+/=]+)",
        r"ED25519 SHA256:([A-Za-z0-9+/=]+)",
        r"ECDSA SHA256:([A-Za-z0-9+/=]+)",
        r"DSA SHA256:([A-Za-z0-9+/=]+)",
        r"key fingerprint ([a-f0-9:]+)",
        r"fingerprint ([a-f0-9:]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
}

/// Key-data extraction table: a run of at least 50 base64 characters led by
/// a keyword. More reliable than the fingerprint for registry matching,
/// since the registry stores the same base64 text verbatim.
fn key_data_patterns() -> Vec<Regex> {
    [
        r"key ([A-Za-z0-9+/=]{50,})",
        r"RSA ([A-Za-z0-9+/=]{50,})",
        r"ED25519 ([A-Za-z0-9+/=]{50,})",
        r"ECDSA ([A-Za-z0-9+/=]{50,})",
        r"DSA ([A-Za-z0-9+/=]{50,})",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
}

fn key_type_pattern() -> Regex {
    Regex::new(r"(RSA|ECDSA|ED25519|DSA)").unwrap()
}

fn first_capture(patterns: &[Regex], line: &str) -> Option<String> {
    patterns
        .iter()
        .find_map(|re| re.captures(line))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Extract whatever evidence a log line carries. Total: fields the line
/// does not supply come back as `"unknown"`.
pub fn parse_connection_line(line: &str) -> ConnectionRecord {
    let fingerprint = first_capture(&fingerprint_patterns(), line)
        .unwrap_or_else(|| UNKNOWN.to_string());
    let key_data =
        first_capture(&key_data_patterns(), line).unwrap_or_else(|| UNKNOWN.to_string());
    let key_type = key_type_pattern()
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| UNKNOWN.to_string());

    ConnectionRecord {
        fingerprint,
        key_type,
        key_data,
        auth_method: AuthMethod::from_line(line),
    }
}

/// Bounded-tail scanner over the sshd auth log.
pub struct AuthLogScanner {
    path: PathBuf,
}

impl AuthLogScanner {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Find the most recent accepted connection for `(ip, username)`.
    ///
    /// Scans at most the last `max_lines` lines, newest first. An exact
    /// `Accepted <method> for <user> from <ip>` match is preferred; failing
    /// that, the same window is rescanned for any sshd `Accepted` line
    /// mentioning the IP (the username is then unverified). A missing log
    /// is a warning and no evidence, not an error.
    pub fn find_recent_connection(
        &self,
        ip: &str,
        username: &str,
        max_lines: usize,
    ) -> Option<ConnectionRecord> {
        let window = self.tail(max_lines)?;

        let accept_patterns: Vec<Regex> = ["publickey", "password", "keyboard-interactive"]
            .iter()
            .map(|method| {
                Regex::new(&format!(
                    "Accepted {} for {} from {}",
                    method,
                    regex_lite::escape(username),
                    regex_lite::escape(ip)
                ))
                .unwrap()
            })
            .collect();

        for line in window.iter().rev() {
            if accept_patterns.iter().any(|re| re.is_match(line)) {
                return Some(parse_connection_line(line));
            }
        }

        self.loose_match(&window, ip)
    }

    /// All sshd `Accepted` lines from `ip` in the last `max_lines` lines,
    /// newest first, any username. The correlator walks these until one
    /// yields usable key data.
    pub fn ip_activity(&self, ip: &str, max_lines: usize) -> Vec<ConnectionRecord> {
        let Some(window) = self.tail(max_lines) else {
            return Vec::new();
        };
        window
            .iter()
            .rev()
            .filter(|line| line.contains(ip) && line.contains("Accepted") && line.contains("sshd"))
            .map(|line| parse_connection_line(line))
            .collect()
    }

    fn loose_match(&self, window: &[String], ip: &str) -> Option<ConnectionRecord> {
        window
            .iter()
            .rev()
            .find(|line| line.contains(ip) && line.contains("Accepted") && line.contains("sshd"))
            .map(|line| parse_connection_line(line))
    }

    /// Read the last `max_lines` lines of the log, oldest first.
    fn tail(&self, max_lines: usize) -> Option<Vec<String>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("auth log not readable: {}: {}", self.path.display(), e);
                return None;
            }
        };

        let lines: Vec<String> = content.lines().map(str::to_string).collect();
        let start = lines.len().saturating_sub(max_lines);
        Some(lines[start..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const KEY_DATA: &str = "AAAAB3NzaC1yc2EAAAADAQABAAABAQC0123456789abcdefghijklmnopqrs";

    fn log_from(content: &str) -> (AuthLogScanner, NamedTempFile) {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        (AuthLogScanner::new(file.path()), file)
    }

    #[test]
    fn test_parse_sha256_fingerprint() {
        let line = "sshd[123]: Accepted publickey for alice from 10.0.0.5 port 5022 ssh2: RSA SHA256:abc123DEF+/=";
        let record = parse_connection_line(line);
        assert_eq!(record.fingerprint, "abc123DEF+/=");
        assert_eq!(record.key_type, "RSA");
        assert_eq!(record.auth_method, AuthMethod::Publickey);
    }

    #[test]
    fn test_parse_hex_colon_fingerprint() {
        let line = "sshd[99]: Found matching key fingerprint aa:bb:cc:dd";
        let record = parse_connection_line(line);
        assert_eq!(record.fingerprint, "aa:bb:cc:dd");
    }

    #[test]
    fn test_sha256_outranks_hex_colon() {
        let line = "sshd[7]: key fingerprint aa:bb also ED25519 SHA256:zzTop99";
        let record = parse_connection_line(line);
        assert_eq!(record.fingerprint, "zzTop99");
    }

    #[test]
    fn test_parse_key_data_requires_long_run() {
        let record = parse_connection_line(&format!("sshd[1]: Accepted publickey key {}", KEY_DATA));
        assert_eq!(record.key_data, KEY_DATA);

        let record = parse_connection_line("sshd[1]: Accepted publickey key AAAAshort");
        assert_eq!(record.key_data, UNKNOWN);
    }

    #[test]
    fn test_parse_barren_line_all_unknown() {
        let record = parse_connection_line("Jan 11 00:00:01 host CRON[1]: session opened");
        assert_eq!(record.fingerprint, UNKNOWN);
        assert_eq!(record.key_type, UNKNOWN);
        assert_eq!(record.key_data, UNKNOWN);
        assert_eq!(record.auth_method, AuthMethod::Unknown);
    }

    #[test]
    fn test_auth_method_priority() {
        // publickey wins over password when both substrings appear
        let line = "sshd[5]: Accepted publickey for root from 1.2.3.4 (password auth disabled)";
        assert_eq!(parse_connection_line(line).auth_method, AuthMethod::Publickey);
        assert_eq!(
            AuthMethod::from_line("Accepted keyboard-interactive for x"),
            AuthMethod::KeyboardInteractive
        );
    }

    #[test]
    fn test_exact_match_preferred_and_newest_first() {
        let content = "\
Jan 11 host sshd[1]: Accepted publickey for alice from 10.0.0.5 port 1 ssh2: RSA SHA256:older\n\
Jan 11 host sshd[2]: Accepted publickey for alice from 10.0.0.5 port 2 ssh2: RSA SHA256:newer\n\
Jan 11 host sshd[3]: Accepted publickey for bob from 10.9.9.9 port 3 ssh2: RSA SHA256:other\n";
        let (scanner, _file) = log_from(content);

        let record = scanner.find_recent_connection("10.0.0.5", "alice", 1000).unwrap();
        assert_eq!(record.fingerprint, "newer");
    }

    #[test]
    fn test_loose_fallback_ignores_username() {
        let content =
            "Jan 11 host sshd[4]: Accepted publickey for carol from 10.0.0.5 ssh2: RSA SHA256:carolkey\n";
        let (scanner, _file) = log_from(content);

        // alice never logged in, but 10.0.0.5 did
        let record = scanner.find_recent_connection("10.0.0.5", "alice", 1000).unwrap();
        assert_eq!(record.fingerprint, "carolkey");
    }

    #[test]
    fn test_regex_metacharacters_in_username_are_literal() {
        // If the dot in "svc.deploy" were a regex wildcard, the newer
        // svcXdeploy line would win the newest-first exact pass.
        let content = "\
Jan 11 host sshd[4]: Accepted publickey for svc.deploy from 10.0.0.5 ssh2: RSA SHA256:exact\n\
Jan 11 host sshd[5]: Accepted publickey for svcXdeploy from 10.0.0.5 ssh2: RSA SHA256:wildcard\n";
        let (scanner, _file) = log_from(content);

        let record = scanner.find_recent_connection("10.0.0.5", "svc.deploy", 1000).unwrap();
        assert_eq!(record.fingerprint, "exact");
    }

    #[test]
    fn test_window_bound_excludes_older_lines() {
        // 5000 filler lines after the only matching line; with a 1000-line
        // window the match must be invisible.
        let mut content = String::from(
            "Jan 11 host sshd[1]: Accepted publickey for alice from 10.0.0.5 ssh2: RSA SHA256:buried\n",
        );
        for i in 0..5000 {
            content.push_str(&format!("Jan 11 host CRON[{}]: session opened\n", i));
        }
        let (scanner, _file) = log_from(&content);

        assert!(scanner.find_recent_connection("10.0.0.5", "alice", 1000).is_none());
        // the full-file window still sees it
        assert!(scanner.find_recent_connection("10.0.0.5", "alice", 6000).is_some());
    }

    #[test]
    fn test_missing_log_yields_no_evidence() {
        let scanner = AuthLogScanner::new("/nonexistent/auth.log");
        assert!(scanner.find_recent_connection("10.0.0.5", "alice", 1000).is_none());
        assert!(scanner.ip_activity("10.0.0.5", 100).is_empty());
    }

    #[test]
    fn test_ip_activity_window_and_order() {
        let mut content = format!(
            "Jan 11 host sshd[1]: Accepted publickey for alice from 10.0.0.5 key {}\n\
             Jan 11 host sshd[2]: Accepted password for bob from 10.0.0.5 port 9 ssh2\n",
            KEY_DATA
        );
        for i in 0..200 {
            content.push_str(&format!("Jan 11 host CRON[{}]: session opened\n", i));
        }
        let (scanner, _file) = log_from(&content);

        // both sshd lines fall outside a 100-line window
        assert!(scanner.ip_activity("10.0.0.5", 100).is_empty());

        let records = scanner.ip_activity("10.0.0.5", 500);
        assert_eq!(records.len(), 2);
        // newest first: the bob line carries no key data, the alice line does
        assert_eq!(records[0].key_data, UNKNOWN);
        assert_eq!(records[1].key_data, KEY_DATA);
    }
}
