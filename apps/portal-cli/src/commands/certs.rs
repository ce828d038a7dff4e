//! Certificate commands.

use super::Portal;
use crate::output::{self, OutputFormat};
use anyhow::{Context, Result};
use portal_api::{Certificate, CertificateFile};
use std::path::{Path, PathBuf};

pub async fn certs_list(portal: &Portal, format: OutputFormat) -> Result<()> {
    let certificates = portal.client.certificates().await?;

    match format {
        OutputFormat::Text => {
            if certificates.is_empty() {
                println!("No certificates. Issue one with 'portal certs create'.");
                return Ok(());
            }
            output::print_heading(&format!("Certificates ({})", certificates.len()));
            for cert in &certificates {
                let host = cert.hosts.as_ref().map(|h| h.name.as_str()).unwrap_or("");
                println!(
                    "  {:<24} {:<20} expires {}",
                    cert.id,
                    output::or_dash(host),
                    output::or_dash(&cert.expires_at)
                );
            }
        }
        OutputFormat::Json => output::print_json(&certificates)?,
    }
    Ok(())
}

pub async fn certs_show(portal: &Portal, id: &str, format: OutputFormat) -> Result<()> {
    let cert = portal.client.certificate(id).await?;

    match format {
        OutputFormat::Text => print_certificate(&cert),
        OutputFormat::Json => output::print_json(&cert)?,
    }
    Ok(())
}

pub async fn certs_create(
    portal: &Portal,
    key_id: &str,
    host_id: &str,
    format: OutputFormat,
) -> Result<()> {
    let cert = portal.client.create_certificate(key_id, host_id).await?;

    match format {
        OutputFormat::Text => {
            println!("Certificate issued.");
            print_certificate(&cert);
        }
        OutputFormat::Json => output::print_json(&cert)?,
    }
    Ok(())
}

/// Download the signed certificate for an SSH key and write it to disk.
pub async fn certs_download(
    portal: &Portal,
    key_id: &str,
    out: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let downloaded = portal.client.download_certificate(key_id).await?;
    let path = write_certificate(&downloaded.certificate, out)?;
    report_saved(&path, format);
    Ok(())
}

/// Write the certificate text of an issued certificate to disk.
pub async fn certs_save(
    portal: &Portal,
    id: &str,
    out: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let cert = portal.client.certificate(id).await?;
    if cert.cert.trim().is_empty() {
        anyhow::bail!("Certificate {} has no signed certificate text", id);
    }
    let path = write_certificate(&cert.cert, out)?;
    report_saved(&path, format);
    Ok(())
}

fn write_certificate(certificate: &str, out: Option<&Path>) -> Result<PathBuf> {
    match out {
        Some(path) => {
            CertificateFile::write_to(path, certificate)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            Ok(path.to_path_buf())
        }
        None => {
            let dir = std::env::current_dir()?;
            CertificateFile::write(&dir, certificate)
                .with_context(|| format!("Failed to write certificate to {}", dir.display()))
        }
    }
}

fn report_saved(path: &Path, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("Certificate saved to {}", path.display()),
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "status": "success", "path": path.display().to_string() })
        ),
    }
}

fn print_certificate(cert: &Certificate) {
    output::print_heading(&format!("Certificate {}", cert.id));
    if let Some(host) = &cert.hosts {
        output::print_row("Host", output::or_dash(&host.name));
    }
    if let Some(key) = &cert.ssh_keys {
        output::print_row("SSH key", output::or_dash(&key.title));
    }
    output::print_row("Principal", output::or_dash(&cert.principal));
    output::print_row("Valid from", output::or_dash(&cert.valid_at));
    output::print_row("Expires", output::or_dash(&cert.expires_at));
}
