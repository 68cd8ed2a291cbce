//! `keytrace find-key` - direct registry lookup by fingerprint.

use console::style;

use crate::error::Result;
use crate::registry::KeyRegistry;

pub fn execute(registry_path: &str, fingerprint: &str) -> Result<()> {
    let registry = KeyRegistry::load(registry_path);

    match registry.find_by_fingerprint(fingerprint) {
        Some(entry) => {
            if let Some(ssh_user) = registry.user_option_for(fingerprint) {
                tracing::debug!("key carries SSH_USER option: {}", ssh_user);
            }
            println!("{}", serde_json::to_string_pretty(entry)?);
        }
        None => println!(
            "{} No registry entry matches fingerprint {}",
            style("✗").red().bold(),
            style(fingerprint).cyan()
        ),
    }

    Ok(())
}
