//! Correlation of registry, log, and environment signals into one best
//! guess at the authenticating key.
//!
//! The three evidence sources disagree in format (the registry computes
//! MD5-colon fingerprints, modern logs report SHA256-base64) and any of
//! them may be missing, so the chain below reconciles them by precedence
//! instead of merging: strategies run in table order and the first hit
//! wins. Raw key-data equality deliberately outranks everything after the
//! direct fingerprint lookup, because the base64 text in a log line matches
//! the registry verbatim while the fingerprints usually cannot.

use crate::authlog::{AuthLogScanner, ConnectionRecord};
use crate::detect::EnvHint;
use crate::fingerprint::UNKNOWN;
use crate::registry::{KeyEntry, KeyRegistry};

/// Lines of auth log examined by the primary scan.
pub const DEFAULT_LOG_WINDOW: usize = 1000;

/// Narrower window for the last-resort IP-only rescan.
const IP_RESCAN_WINDOW: usize = 100;

struct Context<'a> {
    ip: &'a str,
    evidence: Option<ConnectionRecord>,
}

type Strategy = fn(&Correlator, &Context) -> Option<KeyEntry>;

/// Fallback chain, evaluated in order, first `Some` wins. The environment
/// hint comes last: it is caller-supplied context, not observed evidence.
const STRATEGIES: &[(&str, Strategy)] = &[
    ("logged-fingerprint", Correlator::by_logged_fingerprint),
    ("logged-key-data", Correlator::by_logged_key_data),
    ("recent-ip-activity", Correlator::by_recent_ip_activity),
    ("environment-hint", Correlator::by_environment_hint),
];

/// Orchestrates the registry, the log scanner, and the environment hint.
pub struct Correlator {
    registry: KeyRegistry,
    scanner: AuthLogScanner,
    hint: EnvHint,
}

impl Correlator {
    pub fn new(registry: KeyRegistry, scanner: AuthLogScanner, hint: EnvHint) -> Self {
        Self {
            registry,
            scanner,
            hint,
        }
    }

    /// Resolve the key behind a session from `(ip, username)`.
    ///
    /// Returns `None` rather than guessing when no strategy produces a hit:
    /// misattributing a session to the wrong key is worse than no answer.
    pub fn resolve(&self, ip: &str, username: &str) -> Option<KeyEntry> {
        let context = Context {
            ip,
            evidence: self
                .scanner
                .find_recent_connection(ip, username, DEFAULT_LOG_WINDOW),
        };

        for (name, strategy) in STRATEGIES {
            if let Some(entry) = strategy(self, &context) {
                tracing::debug!("resolved via {} strategy: {}", name, entry.fingerprint);
                return Some(entry);
            }
        }

        tracing::debug!("no strategy matched for {}@{}", username, ip);
        None
    }

    /// Step 1: the logged fingerprint, looked up directly in the index.
    /// Only works when the log reports the same encoding the registry
    /// computes (legacy hex-colon).
    fn by_logged_fingerprint(&self, context: &Context) -> Option<KeyEntry> {
        let evidence = context.evidence.as_ref()?;
        if evidence.fingerprint == UNKNOWN {
            return None;
        }
        self.registry
            .find_by_fingerprint(&evidence.fingerprint)
            .cloned()
    }

    /// Step 2: exact base64 key-data equality against the registry file.
    fn by_logged_key_data(&self, context: &Context) -> Option<KeyEntry> {
        let evidence = context.evidence.as_ref()?;
        if evidence.key_data == UNKNOWN {
            return None;
        }
        self.registry.find_by_key_data(&evidence.key_data)
    }

    /// Step 3: rescan a fixed 100-line tail for accepted connections from
    /// this IP, any user, and retry the key-data match on each in turn.
    fn by_recent_ip_activity(&self, context: &Context) -> Option<KeyEntry> {
        self.scanner
            .ip_activity(context.ip, IP_RESCAN_WINDOW)
            .iter()
            .filter(|record| record.key_data != UNKNOWN)
            .find_map(|record| self.registry.find_by_key_data(&record.key_data))
    }

    /// Step 4: caller-supplied hints, fingerprint first, then a comment
    /// scan over the whole registry.
    fn by_environment_hint(&self, _context: &Context) -> Option<KeyEntry> {
        if let Some(fingerprint) = &self.hint.fingerprint {
            return self.registry.find_by_fingerprint(fingerprint).cloned();
        }
        if let Some(comment) = &self.hint.comment {
            return self
                .registry
                .entries()
                .find(|entry| &entry.comment == comment)
                .cloned();
        }
        None
    }
}
