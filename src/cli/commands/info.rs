//! `keytrace info` - probe and print the current session's connection info.

use crate::detect::ConnectionInfo;
use crate::error::Result;

pub fn execute() -> Result<()> {
    let info = ConnectionInfo::detect();
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}
