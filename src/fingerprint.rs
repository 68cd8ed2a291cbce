//! Legacy OpenSSH MD5-colon fingerprint computation.
//!
//! The registry side of the correlation always speaks this format:
//! 16 colon-separated lowercase hex octet pairs over the decoded key blob,
//! the way `ssh-keygen -l -E md5` used to print it. Modern sshd log lines
//! report base64 SHA256 fingerprints instead; the correlator routes around
//! that mismatch by preferring raw key-data equality (see `correlate`).

use base64::Engine;
use md5::{Digest, Md5};

/// Sentinel carried wherever an extraction or decode failed.
///
/// The whole pipeline is total: failures become this value and flow
/// downstream instead of propagating as errors.
pub const UNKNOWN: &str = "unknown";

/// Compute the MD5-colon fingerprint of a base64-encoded key blob.
///
/// Any decode failure (bad alphabet, bad padding) degrades to [`UNKNOWN`].
pub fn fingerprint_of(key_data_b64: &str) -> String {
    let key_bytes = match base64::engine::general_purpose::STANDARD.decode(key_data_b64) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!("key data is not valid base64: {}", e);
            return UNKNOWN.to_string();
        }
    };

    let mut hasher = Md5::new();
    hasher.update(&key_bytes);
    let digest = hasher.finalize();

    digest
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_format() {
        // "AAAA" decodes to three zero bytes
        let fp = fingerprint_of("AAAA");
        assert_eq!(fp, "69:3e:9a:f8:4d:3d:fc:c7:1e:64:0e:00:5b:dc:5e:2e");
        assert_eq!(fp.len(), 47);
        assert_eq!(fp.chars().filter(|c| *c == ':').count(), 15);
        for octet in fp.split(':') {
            assert_eq!(octet.len(), 2);
            assert!(octet.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let blob = "AAAAC3NzaC1lZDI1NTE5AAAAIBRanDK33/M2A9M0Lc/TQ/pF5kfd8rplxF34cupZF1gD";
        let first = fingerprint_of(blob);
        let second = fingerprint_of(blob);
        assert_eq!(first, second);
        assert_eq!(first, "47:27:3b:26:d9:17:a2:fd:c5:7f:5b:83:47:47:ac:d4");
    }

    #[test]
    fn test_distinct_inputs_distinct_fingerprints() {
        assert_ne!(fingerprint_of("AAAA"), fingerprint_of("AAAB"));
    }

    #[test]
    fn test_malformed_base64_degrades_to_unknown() {
        assert_eq!(fingerprint_of("not-base64!!"), UNKNOWN);
        assert_eq!(fingerprint_of("AAA=A"), UNKNOWN);
    }
}
