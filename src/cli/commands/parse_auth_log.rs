//! `keytrace parse-auth-log` - show the raw evidence mined from the log.

use console::style;

use crate::authlog::AuthLogScanner;
use crate::error::Result;

pub fn execute(log_path: &str, ip: &str, username: &str, lines: usize) -> Result<()> {
    let scanner = AuthLogScanner::new(log_path);

    match scanner.find_recent_connection(ip, username, lines) {
        Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
        None => println!(
            "{} No accepted connection for {}@{} in the last {} log lines",
            style("✗").red().bold(),
            style(username).cyan(),
            style(ip).cyan(),
            lines
        ),
    }

    Ok(())
}
