//! Storage key constants.

/// Storage keys used by the portal client
pub struct StorageKeys;

impl StorageKeys {
    /// Raw identity-provider credential
    pub const ID_TOKEN: &'static str = "id_token";

    /// Display profile derived from the credential (JSON)
    pub const USER: &'static str = "user";
}
