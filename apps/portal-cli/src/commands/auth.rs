//! Authentication commands.

use super::Portal;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use portal_session::decode;
use std::io::{self, BufRead};
use tracing::info;

/// Where the credential for `login` comes from.
pub enum CredentialSource {
    Argument(String),
    Stdin,
    Prompt,
}

impl CredentialSource {
    fn read(self) -> Result<String> {
        let credential = match self {
            CredentialSource::Argument(credential) => credential,
            CredentialSource::Stdin => {
                let mut line = String::new();
                io::stdin().lock().read_line(&mut line)?;
                line
            }
            CredentialSource::Prompt => rpassword::prompt_password("Credential: ")?,
        };
        Ok(credential.trim().to_string())
    }
}

/// Sign in with an identity-provider credential.
pub async fn login(portal: &Portal, source: CredentialSource, format: OutputFormat) -> Result<()> {
    let credential = source.read()?;
    if credential.is_empty() {
        output::print_error("Credential is required", None, format);
        return Ok(());
    }

    let user = portal.client.sign_in(&credential)?;
    info!(email = %user.email, "CLI login");

    match format {
        OutputFormat::Text => output::print_success(&format!("Signed in as {}", user.email), format),
        OutputFormat::Json => output::print_json(&serde_json::json!({
            "status": "success",
            "user": user,
        }))?,
    }
    Ok(())
}

/// Sign out and clear the persisted session.
pub async fn logout(portal: &Portal, format: OutputFormat) -> Result<()> {
    portal.client.sign_out();
    output::print_success("Signed out", format);
    Ok(())
}

/// Show the current session.
pub async fn status(portal: &Portal, format: OutputFormat) -> Result<()> {
    let session = portal.session();
    let user = session.current_user();
    let expires_at = session
        .valid_token()
        .and_then(|token| decode(&token).ok())
        .and_then(|claims| claims.expires_at());
    let authenticated = session.is_authenticated();

    match format {
        OutputFormat::Text => {
            if authenticated {
                println!("Auth:     signed in");
                if let Some(user) = &user {
                    println!("Name:     {}", output::or_dash(&user.name));
                    println!("Email:    {}", user.email);
                }
                if let Some(expires_at) = expires_at {
                    println!("Expires:  {}", expires_at.to_rfc3339());
                }
            } else {
                println!("Auth:     not signed in");
            }
            println!("Session:  {}", portal.paths.session_file().display());
        }
        OutputFormat::Json => output::print_json(&serde_json::json!({
            "authenticated": authenticated,
            "state": session.fsm_state(),
            "user": user,
            "expires_at": expires_at.map(|at| at.to_rfc3339()),
        }))?,
    }
    Ok(())
}
