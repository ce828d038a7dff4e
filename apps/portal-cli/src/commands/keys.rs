//! SSH key commands.

use super::Portal;
use crate::output::{self, OutputFormat};
use anyhow::{Context, Result};
use std::path::Path;

pub async fn keys_list(portal: &Portal, format: OutputFormat) -> Result<()> {
    let keys = portal.client.ssh_keys().await?;

    match format {
        OutputFormat::Text => {
            if keys.is_empty() {
                println!("No SSH keys. Add one with 'portal keys add'.");
                return Ok(());
            }
            output::print_heading(&format!("SSH keys ({})", keys.len()));
            for key in &keys {
                println!(
                    "  {:<24} {:<20} {}",
                    key.id,
                    output::or_dash(&key.title),
                    output::or_dash(&key.fingerprint)
                );
            }
        }
        OutputFormat::Json => output::print_json(&keys)?,
    }
    Ok(())
}

/// Register a public key given inline or read from a `.pub` file.
pub async fn keys_add(
    portal: &Portal,
    title: &str,
    key: Option<&str>,
    key_file: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let public_key = match (key, key_file) {
        (Some(key), _) => key.to_string(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, None) => anyhow::bail!("Pass the public key with --key or --key-file"),
    };

    let added = portal.client.add_ssh_key(title, &public_key).await?;

    match format {
        OutputFormat::Text => output::print_success(&format!("Added SSH key {}", added.id), format),
        OutputFormat::Json => output::print_json(&added)?,
    }
    Ok(())
}

pub async fn keys_delete(portal: &Portal, id: &str, format: OutputFormat) -> Result<()> {
    portal.client.delete_ssh_key(id).await?;
    output::print_success(&format!("Deleted SSH key {}", id), format);
    Ok(())
}
