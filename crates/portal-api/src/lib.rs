//! Portal API client with a session-aware resource cache.
//!
//! [`PortalClient`] is the entry point: every read goes through a
//! [`ResourceCache`] that deduplicates fetches per key and serves stale
//! values while revalidating, and every mutation invalidates the reads it
//! affects. Tokens come only from the
//! [`SessionManager`](portal_session::SessionManager); a missing token or a
//! 401 ends the session through its unauthorized-recovery path.
//!
//! HTTP goes through the [`Transport`] trait so the client can run against
//! [`ReqwestTransport`] or an in-process double.

mod cache;
mod cert_file;
mod client;
mod error;
mod models;
mod mutation;
mod transport;
mod validation;

pub use cache::{CacheSnapshot, CacheStatus, EntryStatus, ResourceCache};
pub use cert_file::{CertificateFile, CERTIFICATE_FILE_NAME};
pub use client::PortalClient;
pub use error::{ApiError, ApiResult, GENERIC_FAILURE_MESSAGE, UNAUTHORIZED_MESSAGE};
pub use models::{
    AddedSshKey, ApiKey, Certificate, CertificateHost, CertificateKey, DownloadedCertificate,
    Host, HostStatus, NewCertificate, NewSshKey, Profile, SshKey, Wallet,
};
pub use mutation::{MutationKind, ResourceKey, ResourceKind};
pub use transport::{ApiRequest, ApiResponse, Method, ReqwestTransport, Transport, TransportError};
pub use validation::{
    validate_certificate_id, validate_new_certificate, validate_new_ssh_key, validate_signature,
    validate_ssh_key_id, SSH_KEY_PREFIXES,
};
