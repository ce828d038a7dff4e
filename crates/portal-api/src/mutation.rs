//! Resource keys and mutation invalidation rules.

use serde::{Deserialize, Serialize};

/// Cache key for a server resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "resource", content = "id", rename_all = "snake_case")]
pub enum ResourceKey {
    Profile,
    Hosts,
    SshKeys,
    Certificates,
    Certificate(String),
    Wallets,
}

impl ResourceKey {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceKey::Profile => ResourceKind::Profile,
            ResourceKey::Hosts => ResourceKind::Hosts,
            ResourceKey::SshKeys => ResourceKind::SshKeys,
            ResourceKey::Certificates => ResourceKind::Certificates,
            ResourceKey::Certificate(_) => ResourceKind::Certificate,
            ResourceKey::Wallets => ResourceKind::Wallets,
        }
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKey::Certificate(id) => write!(f, "certificate/{id}"),
            other => f.write_str(other.kind().as_str()),
        }
    }
}

/// Resource type, ignoring any id parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Profile,
    Hosts,
    SshKeys,
    Certificates,
    Certificate,
    Wallets,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Profile => "profile",
            ResourceKind::Hosts => "hosts",
            ResourceKind::SshKeys => "ssh-keys",
            ResourceKind::Certificates => "certificates",
            ResourceKind::Certificate => "certificate",
            ResourceKind::Wallets => "wallets",
        }
    }
}

/// Write operations. At most one of each kind runs at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    ChangeApiKey,
    CreateCertificate,
    AddSshKey,
    DeleteSshKey,
    AddWallet,
    DownloadCertificate,
}

impl MutationKind {
    /// Reads made stale by a successful mutation of this kind.
    pub fn invalidates(&self) -> &'static [ResourceKind] {
        match self {
            MutationKind::ChangeApiKey => &[ResourceKind::Profile],
            MutationKind::CreateCertificate => &[ResourceKind::Certificates],
            MutationKind::AddSshKey | MutationKind::DeleteSshKey => &[ResourceKind::SshKeys],
            MutationKind::AddWallet => &[ResourceKind::Wallets],
            MutationKind::DownloadCertificate => &[],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::ChangeApiKey => "change API key",
            MutationKind::CreateCertificate => "create certificate",
            MutationKind::AddSshKey => "add SSH key",
            MutationKind::DeleteSshKey => "delete SSH key",
            MutationKind::AddWallet => "add wallet",
            MutationKind::DownloadCertificate => "download certificate",
        }
    }
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
