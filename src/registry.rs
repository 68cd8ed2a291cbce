//! Authorized-keys registry: parsing and fingerprint-indexed lookup.
//!
//! The registry is loaded once per invocation and indexed by MD5-colon
//! fingerprint. Lines that fail to parse are skipped, a missing file loads
//! as an empty registry; neither aborts the caller.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::fingerprint::{fingerprint_of, UNKNOWN};

/// One parsed line of the authorized_keys file.
///
/// Serialized field names match the tool's JSON output contract.
#[derive(Debug, Clone, Serialize)]
pub struct KeyEntry {
    /// Algorithm token, taken verbatim (not validated against a known set).
    #[serde(rename = "type")]
    pub key_type: String,
    /// Base64 key material, opaque; compared by exact string equality.
    #[serde(rename = "data")]
    pub key_data: String,
    /// MD5-colon fingerprint, or `"unknown"` if the data failed to decode.
    pub fingerprint: String,
    /// Trailing free-text token, empty if absent.
    pub comment: String,
    /// `key=value` tokens found between the key data and the last token.
    ///
    /// This reproduces the historical token-range rule: with exactly one
    /// trailing token nothing is scanned, and with several the comment
    /// position itself falls inside the scanned range. Downstream consumers
    /// depend on the current behavior, so it is asserted in tests rather
    /// than corrected.
    pub options: HashMap<String, String>,
    #[serde(rename = "full_line")]
    pub raw_line: String,
    pub line_number: usize,
}

/// In-memory view of an authorized_keys file.
pub struct KeyRegistry {
    path: PathBuf,
    index: HashMap<String, KeyEntry>,
}

impl KeyRegistry {
    /// Load the registry, building the fingerprint index.
    ///
    /// A missing file is a warning, not an error: the registry comes up
    /// empty and every lookup misses.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let mut index = HashMap::new();

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("authorized keys file not readable: {}: {}", path.display(), e);
                return Self { path, index };
            }
        };

        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match parse_line(line, idx + 1) {
                Some(entry) => {
                    // Later lines with the same fingerprint win the index;
                    // find_by_key_data still reaches the earlier ones.
                    index.insert(entry.fingerprint.clone(), entry);
                }
                None => {
                    tracing::warn!("skipping unparseable authorized_keys line {}", idx + 1);
                }
            }
        }

        tracing::debug!("loaded {} registry entries from {}", index.len(), path.display());
        Self { path, index }
    }

    /// Index lookup by MD5-colon fingerprint.
    pub fn find_by_fingerprint(&self, fingerprint: &str) -> Option<&KeyEntry> {
        self.index.get(fingerprint)
    }

    /// Find the first line whose base64 data token equals `key_data`.
    ///
    /// Deliberately re-reads the file rather than consulting the index, so
    /// registry edits made after load are picked up, and duplicate-data
    /// lines resolve first-match (the index resolves them last-wins).
    pub fn find_by_key_data(&self, key_data: &str) -> Option<KeyEntry> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return None,
        };

        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut tokens = line.split_whitespace();
            let (Some(_), Some(data)) = (tokens.next(), tokens.next()) else {
                continue;
            };
            if data == key_data {
                return parse_line(line, idx + 1);
            }
        }
        None
    }

    /// Comment for a fingerprint, or `"unknown"` when absent.
    pub fn comment_for(&self, fingerprint: &str) -> String {
        self.find_by_fingerprint(fingerprint)
            .map(|entry| entry.comment.clone())
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    /// Options for a fingerprint, empty when absent.
    pub fn options_for(&self, fingerprint: &str) -> HashMap<String, String> {
        self.find_by_fingerprint(fingerprint)
            .map(|entry| entry.options.clone())
            .unwrap_or_default()
    }

    /// The `SSH_USER` option for a fingerprint, if the key carries one.
    pub fn user_option_for(&self, fingerprint: &str) -> Option<String> {
        self.options_for(fingerprint).get("SSH_USER").cloned()
    }

    /// Iterate over all indexed entries (comment scans).
    pub fn entries(&self) -> impl Iterator<Item = &KeyEntry> {
        self.index.values()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Parse one registry line: `<type> <base64-data> [comment] [key=value ...]`.
///
/// Requires at least the type and data tokens; everything else is optional.
fn parse_line(line: &str, line_number: usize) -> Option<KeyEntry> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 2 {
        return None;
    }

    let key_type = parts[0].to_string();
    let key_data = parts[1].to_string();
    let comment = parts.get(2).copied().unwrap_or("").to_string();

    // Options live between the data token and the last token, exclusive.
    let mut options = HashMap::new();
    if parts.len() > 2 {
        for part in &parts[2..parts.len() - 1] {
            if let Some((name, value)) = part.split_once('=') {
                options.insert(name.to_string(), value.to_string());
            }
        }
    }

    Some(KeyEntry {
        fingerprint: fingerprint_of(&key_data),
        key_type,
        key_data,
        comment,
        options,
        raw_line: line.to_string(),
        line_number,
    })
}
