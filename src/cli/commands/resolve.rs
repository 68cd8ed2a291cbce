//! `keytrace resolve` - the full correlation chain.

use console::style;

use crate::authlog::AuthLogScanner;
use crate::correlate::Correlator;
use crate::detect::EnvHint;
use crate::error::Result;
use crate::registry::KeyRegistry;

pub fn execute(registry_path: &str, log_path: &str, ip: &str, username: &str) -> Result<()> {
    let registry = KeyRegistry::load(registry_path);
    if registry.is_empty() {
        tracing::warn!("registry {} is empty, resolution can only miss", registry_path);
    }

    let correlator = Correlator::new(registry, AuthLogScanner::new(log_path), EnvHint::from_env());

    match correlator.resolve(ip, username) {
        Some(entry) => println!("{}", serde_json::to_string_pretty(&entry)?),
        None => println!(
            "{} Could not attribute the session {}@{} to any registered key",
            style("✗").red().bold(),
            style(username).cyan(),
            style(ip).cyan()
        ),
    }

    Ok(())
}
