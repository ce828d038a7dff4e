//! Wire types for the portal API.
//!
//! Entities are passed through as the server sends them. Missing fields
//! default and unknown fields are ignored.

use serde::{Deserialize, Serialize};

/// `{success, data}` wrapper used by most read endpoints.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub user_id: String,
    pub cuid: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub api_key: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKey {
    pub api_key: String,
}

/// Reported availability of a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostStatus {
    Online,
    Offline,
    Maintenance,
    Other(String),
}

impl HostStatus {
    pub fn as_str(&self) -> &str {
        match self {
            HostStatus::Online => "online",
            HostStatus::Offline => "offline",
            HostStatus::Maintenance => "maintenance",
            HostStatus::Other(other) => other,
        }
    }
}

impl From<&str> for HostStatus {
    fn from(value: &str) -> Self {
        match value {
            "online" => HostStatus::Online,
            "offline" => HostStatus::Offline,
            "maintenance" => HostStatus::Maintenance,
            other => HostStatus::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for HostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Host {
    pub id: String,
    pub principal: String,
    pub name: String,
    /// Raw status as sent; see [`Host::status`].
    #[serde(rename = "status")]
    pub status_raw: String,
    pub created_at: String,
    pub allowed: bool,
}

impl Host {
    pub fn status(&self) -> HostStatus {
        HostStatus::from(self.status_raw.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SshKey {
    pub id: String,
    pub title: String,
    pub public_key: String,
    pub fingerprint: String,
    pub created_at: String,
}

/// Host summary embedded in a certificate.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CertificateHost {
    pub id: String,
    pub name: String,
    pub principal: String,
    pub created_at: String,
}

/// Key summary embedded in a certificate.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CertificateKey {
    pub id: String,
    pub title: String,
    pub created_at: String,
    pub public_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Certificate {
    pub id: String,
    pub user_id: String,
    pub key_id: String,
    pub host_id: String,
    pub valid_at: String,
    pub expires_at: String,
    pub principal: String,
    pub cert: String,
    pub created_at: String,
    #[serde(alias = "host", skip_serializing_if = "Option::is_none")]
    pub hosts: Option<CertificateHost>,
    #[serde(alias = "ssh_key", skip_serializing_if = "Option::is_none")]
    pub ssh_keys: Option<CertificateKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Wallet {
    pub address: String,
    pub user_id: String,
    pub cuid: String,
    pub name: String,
    pub email: String,
    pub created_at: String,
}

/// Certificate text returned by the download endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadedCertificate {
    pub certificate: String,
}

/// Response to adding an SSH key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AddedSshKey {
    pub id: String,
}

/// Input for registering an SSH key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSshKey {
    pub title: String,
    pub public_key: String,
}

/// Input for issuing a certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCertificate {
    pub key_id: String,
    pub host_id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct AddSshKeyBody<'a> {
    pub title: &'a str,
    pub public_key: &'a str,
    pub id_token: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct AddWalletBody<'a> {
    pub id_token: &'a str,
    pub signature: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct GetCertificateBody<'a> {
    pub cert_id: &'a str,
}
