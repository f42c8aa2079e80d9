//! Splitting requested addresses into known users and unknown ones.

use taskpilot_core::directory::UserDirectory;
use taskpilot_core::error::ToolError;
use tracing::warn;

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Partition {
    pub known: Vec<String>,
    pub unknown: Vec<String>,
}

/// Lower-case each address, drop repeats, and check it against the directory.
pub(crate) async fn partition(
    directory: &dyn UserDirectory,
    addresses: &[String],
) -> Result<Partition, ToolError> {
    let mut out = Partition::default();
    for address in addresses {
        let email = address.trim().to_lowercase();
        if email.is_empty() || out.known.contains(&email) || out.unknown.contains(&email) {
            continue;
        }
        let exists = directory
            .contains(&email)
            .await
            .map_err(|e| ToolError::Failed(e.to_string()))?;
        if exists {
            out.known.push(email);
        } else {
            warn!(email = %email, "Address not found in the user directory, skipping");
            out.unknown.push(email);
        }
    }
    Ok(out)
}
