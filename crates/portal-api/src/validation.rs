//! Input checks run before any request is sent.

use crate::{ApiError, ApiResult, NewCertificate, NewSshKey};

/// Accepted public key prefixes.
pub const SSH_KEY_PREFIXES: &[&str] = &["ssh-rsa", "ssh-ed25519", "ssh-dss", "ecdsa-sha2"];

fn invalid(message: &str) -> ApiError {
    ApiError::Validation(message.to_string())
}

/// Check an SSH key submission and return it trimmed.
pub fn validate_new_ssh_key(title: &str, public_key: &str) -> ApiResult<NewSshKey> {
    let title = title.trim();
    if title.is_empty() {
        return Err(invalid("Please enter a title for your SSH key."));
    }

    let public_key = public_key.trim();
    if public_key.is_empty() {
        return Err(invalid("Please enter your SSH public key."));
    }

    if !SSH_KEY_PREFIXES
        .iter()
        .any(|prefix| public_key.starts_with(prefix))
    {
        return Err(invalid(
            "Invalid SSH public key format. Key must start with ssh-rsa, ssh-ed25519, ssh-dss, or ecdsa-sha2.",
        ));
    }

    Ok(NewSshKey {
        title: title.to_string(),
        public_key: public_key.to_string(),
    })
}

pub fn validate_new_certificate(key_id: &str, host_id: &str) -> ApiResult<NewCertificate> {
    let (key_id, host_id) = (key_id.trim(), host_id.trim());
    if key_id.is_empty() || host_id.is_empty() {
        return Err(invalid("Please select both a SSH key and a host."));
    }
    Ok(NewCertificate {
        key_id: key_id.to_string(),
        host_id: host_id.to_string(),
    })
}

pub fn validate_certificate_id(id: &str) -> ApiResult<&str> {
    non_empty(id, "Please provide a certificate id.")
}

pub fn validate_ssh_key_id(id: &str) -> ApiResult<&str> {
    non_empty(id, "Please provide an SSH key id.")
}

pub fn validate_signature(signature: &str) -> ApiResult<&str> {
    non_empty(signature, "Please provide a wallet signature.")
}

fn non_empty<'a>(value: &'a str, message: &str) -> ApiResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        Err(invalid(message))
    } else {
        Ok(value)
    }
}
