//! Wallet commands.

use super::Portal;
use crate::output::{self, OutputFormat};
use anyhow::Result;

pub async fn wallets_list(portal: &Portal, format: OutputFormat) -> Result<()> {
    let wallets = portal.client.wallets().await?;

    match format {
        OutputFormat::Text => {
            if wallets.is_empty() {
                println!("No wallets linked.");
                return Ok(());
            }
            output::print_heading(&format!("Wallets ({})", wallets.len()));
            for wallet in &wallets {
                println!(
                    "  {:<44} {}",
                    wallet.address,
                    output::or_dash(&wallet.created_at)
                );
            }
        }
        OutputFormat::Json => output::print_json(&wallets)?,
    }
    Ok(())
}

/// Link a wallet using a signature over the current session token.
pub async fn wallets_add(portal: &Portal, signature: &str, format: OutputFormat) -> Result<()> {
    let response = portal.client.add_wallet(signature).await?;

    match format {
        OutputFormat::Text => output::print_success("Wallet linked", format),
        OutputFormat::Json => output::print_json(&response)?,
    }
    Ok(())
}
