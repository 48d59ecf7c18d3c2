//! `profiles` subcommands.

use dogeared_shipping::store::ProfileStore;
use tracing::{error, info};

use super::{CliError, Stack};

/// List every profile configured for the owner.
pub async fn list(stack: &Stack) -> Result<(), CliError> {
    let profiles = stack.profiles.list(stack.owner).await?;
    if profiles.is_empty() {
        info!("No carrier profiles configured");
        return Ok(());
    }
    for profile in profiles {
        info!(
            id = %profile.id,
            carrier = %profile.carrier,
            active = profile.active,
            "{}",
            profile.label
        );
    }
    Ok(())
}

/// Verify every profile's credentials with a live login round-trip.
///
/// Failures are reported per profile; the command itself succeeds so one
/// bad profile does not hide the others' results.
pub async fn check(stack: &Stack) -> Result<(), CliError> {
    let profiles = stack.profiles.list(stack.owner).await?;
    if profiles.is_empty() {
        info!("No carrier profiles configured");
        return Ok(());
    }
    for profile in profiles {
        match stack.orchestrator.verify_credentials(&profile).await {
            Ok(expires_at) => info!(
                carrier = %profile.carrier,
                %expires_at,
                "Credentials OK: {}",
                profile.label
            ),
            Err(e) => error!(
                carrier = %profile.carrier,
                "Credentials FAILED: {}: {e}",
                profile.label
            ),
        }
    }
    Ok(())
}
