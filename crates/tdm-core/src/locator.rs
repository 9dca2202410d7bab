//! Locator validation at the submission boundary.

use crate::error::TdmError;

/// Scheme prefix every accepted locator must carry.
pub const MAGNET_PREFIX: &str = "magnet:";

/// Checks that `locator` is non-empty and starts with `magnet:`.
///
/// Only the prefix is checked here; whether the engine can actually resolve
/// the locator is decided later by `TransferEngine::start`.
pub fn validate(locator: &str) -> Result<&str, TdmError> {
    let trimmed = locator.trim();
    if trimmed.is_empty() {
        return Err(TdmError::Validation("magnet link is required".into()));
    }
    if !trimmed.starts_with(MAGNET_PREFIX) {
        return Err(TdmError::Validation("invalid magnet link format".into()));
    }
    Ok(trimmed)
}
