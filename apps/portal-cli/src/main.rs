//! Portal CLI - sign in and manage SSH keys, certificates and wallets.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use commands::{CredentialSource, Portal};
use portal_config::{init_logging, Config, Paths};
use std::path::PathBuf;
use tracing::debug;

/// Portal CLI - Access hosts with short-lived SSH certificates.
#[derive(Parser)]
#[command(name = "portal")]
#[command(about = "Portal CLI for SSH keys, certificates and wallets")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error); defaults to the config file
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with an identity-provider credential
    Login {
        /// Credential (prompted for when omitted)
        credential: Option<String>,
        /// Read the credential from stdin
        #[arg(long, conflicts_with = "credential")]
        stdin: bool,
    },

    /// Sign out and clear the saved session
    Logout,

    /// Show the current session
    Status,

    /// Show your profile or rotate your API key
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },

    /// List hosts you can access
    Hosts,

    /// Manage SSH keys
    Keys {
        #[command(subcommand)]
        command: KeyCommands,
    },

    /// Manage SSH certificates
    Certs {
        #[command(subcommand)]
        command: CertCommands,
    },

    /// Manage linked wallets
    Wallets {
        #[command(subcommand)]
        command: WalletCommands,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Show profile details
    Show,
    /// Issue a new API key
    RotateApiKey {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum KeyCommands {
    /// List SSH keys
    List,
    /// Add an SSH public key
    Add {
        /// Key title
        #[arg(short, long)]
        title: String,
        /// Public key text
        #[arg(short, long, conflicts_with = "key_file", required_unless_present = "key_file")]
        key: Option<String>,
        /// Path to a public key file
        #[arg(long)]
        key_file: Option<PathBuf>,
    },
    /// Delete an SSH key
    Delete {
        /// SSH key ID
        id: String,
    },
}

#[derive(Subcommand)]
enum CertCommands {
    /// List certificates
    List,
    /// Show certificate details
    Show {
        /// Certificate ID
        id: String,
    },
    /// Issue a certificate for a key and host
    Create {
        /// SSH key ID
        #[arg(long)]
        key_id: String,
        /// Host ID
        #[arg(long)]
        host_id: String,
    },
    /// Download the signed certificate for an SSH key
    Download {
        /// SSH key ID
        key_id: String,
        /// Output file (defaults to ./id_ed25519-cert.pub)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Save an issued certificate to disk
    Save {
        /// Certificate ID
        id: String,
        /// Output file (defaults to ./id_ed25519-cert.pub)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum WalletCommands {
    /// List linked wallets
    List,
    /// Link a wallet
    Add {
        /// Signature over the current session token
        #[arg(short, long)]
        signature: String,
    },
}

async fn run(portal: &Portal, command: Commands, format: output::OutputFormat) -> anyhow::Result<()> {
    match command {
        Commands::Login { credential, stdin } => {
            let source = match (credential, stdin) {
                (Some(credential), _) => CredentialSource::Argument(credential),
                (None, true) => CredentialSource::Stdin,
                (None, false) => CredentialSource::Prompt,
            };
            commands::login(portal, source, format).await
        }
        Commands::Logout => commands::logout(portal, format).await,
        Commands::Status => commands::status(portal, format).await,
        Commands::Profile { command } => match command {
            ProfileCommands::Show => commands::profile_show(portal, format).await,
            ProfileCommands::RotateApiKey { yes } => {
                commands::profile_rotate_api_key(portal, yes, format).await
            }
        },
        Commands::Hosts => commands::hosts_list(portal, format).await,
        Commands::Keys { command } => match command {
            KeyCommands::List => commands::keys_list(portal, format).await,
            KeyCommands::Add { title, key, key_file } => {
                commands::keys_add(portal, &title, key.as_deref(), key_file.as_deref(), format)
                    .await
            }
            KeyCommands::Delete { id } => commands::keys_delete(portal, &id, format).await,
        },
        Commands::Certs { command } => match command {
            CertCommands::List => commands::certs_list(portal, format).await,
            CertCommands::Show { id } => commands::certs_show(portal, &id, format).await,
            CertCommands::Create { key_id, host_id } => {
                commands::certs_create(portal, &key_id, &host_id, format).await
            }
            CertCommands::Download { key_id, out } => {
                commands::certs_download(portal, &key_id, out.as_deref(), format).await
            }
            CertCommands::Save { id, out } => {
                commands::certs_save(portal, &id, out.as_deref(), format).await
            }
        },
        Commands::Wallets { command } => match command {
            WalletCommands::List => commands::wallets_list(portal, format).await,
            WalletCommands::Add { signature } => {
                commands::wallets_add(portal, &signature, format).await
            }
        },
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let format = cli.format;

    let setup = Paths::new()
        .map_err(anyhow::Error::from)
        .and_then(|paths| Ok((Config::load(&paths)?, paths)));
    let (config, paths) = match setup {
        Ok(setup) => setup,
        Err(e) => {
            output::print_error(&e.to_string(), None, format);
            std::process::exit(1);
        }
    };

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    init_logging("portal-cli", level, Some(&paths), false);
    debug!(api_url = %config.api_url, "Starting portal CLI");

    let mut portal = match Portal::open(&config, paths) {
        Ok(portal) => portal,
        Err(e) => {
            output::print_error(&e.to_string(), None, format);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&portal, cli.command, format).await {
        let hint = portal.sign_in_hint(&e);
        output::print_error(&e.to_string(), hint, format);
        drop(portal);
        std::process::exit(1);
    }
}
