//! Profile and API key commands.

use super::{confirm, Portal};
use crate::output::{self, OutputFormat};
use anyhow::Result;

pub async fn profile_show(portal: &Portal, format: OutputFormat) -> Result<()> {
    let profile = portal.client.profile().await?;

    match format {
        OutputFormat::Text => {
            output::print_heading("Profile");
            output::print_row("Name", output::or_dash(&profile.name));
            output::print_row("Email", output::or_dash(&profile.email));
            output::print_row("Type", output::or_dash(&profile.kind));
            output::print_row("User ID", output::or_dash(&profile.user_id));
            output::print_row("API key", output::or_dash(&profile.api_key));
        }
        OutputFormat::Json => output::print_json(&profile)?,
    }
    Ok(())
}

/// Rotate the API key. The old key stops working immediately.
pub async fn profile_rotate_api_key(portal: &Portal, yes: bool, format: OutputFormat) -> Result<()> {
    if !yes && !confirm("Rotate your API key? The current key will stop working.") {
        output::print_success("Cancelled", format);
        return Ok(());
    }

    let api_key = portal.client.change_api_key().await?;

    match format {
        OutputFormat::Text => {
            println!("API key rotated.");
            output::print_row("New key", &api_key);
        }
        OutputFormat::Json => output::print_json(&serde_json::json!({ "api_key": api_key }))?,
    }
    Ok(())
}
