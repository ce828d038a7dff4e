//! Host commands.

use super::Portal;
use crate::output::{self, OutputFormat};
use anyhow::Result;

pub async fn hosts_list(portal: &Portal, format: OutputFormat) -> Result<()> {
    let hosts = portal.client.hosts().await?;

    match format {
        OutputFormat::Text => {
            if hosts.is_empty() {
                println!("No hosts available.");
                return Ok(());
            }
            output::print_heading(&format!("Hosts ({})", hosts.len()));
            for host in &hosts {
                println!(
                    "  {:<24} {:<20} {:<12} {}",
                    host.id,
                    output::or_dash(&host.name),
                    host.status(),
                    output::or_dash(&host.principal)
                );
            }
        }
        OutputFormat::Json => output::print_json(&hosts)?,
    }
    Ok(())
}
