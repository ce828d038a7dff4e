//! Session-aware portal API client.

use crate::cache::{EntryStatus, ResourceCache};
use crate::models::{AddSshKeyBody, AddWalletBody, Envelope, GetCertificateBody};
use crate::transport::{summarize_response_body, ApiRequest, Method, Transport};
use crate::validation::{
    validate_certificate_id, validate_new_certificate, validate_new_ssh_key, validate_signature,
    validate_ssh_key_id,
};
use crate::{
    AddedSshKey, ApiError, ApiKey, ApiResult, Certificate, DownloadedCertificate, Host,
    MutationKind, Profile, ResourceKey, ResourceKind, SshKey, Wallet,
};
use parking_lot::Mutex;
use portal_session::{SessionEvent, SessionManager, User};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// One typed cache per resource.
#[derive(Clone, Default)]
struct Caches {
    profile: ResourceCache<ResourceKey, Profile>,
    hosts: ResourceCache<ResourceKey, Vec<Host>>,
    ssh_keys: ResourceCache<ResourceKey, Vec<SshKey>>,
    certificates: ResourceCache<ResourceKey, Vec<Certificate>>,
    certificate: ResourceCache<ResourceKey, Certificate>,
    wallets: ResourceCache<ResourceKey, Vec<Wallet>>,
}

impl Caches {
    fn invalidate(&self, kind: ResourceKind) {
        match kind {
            ResourceKind::Profile => self.profile.invalidate_all(),
            ResourceKind::Hosts => self.hosts.invalidate_all(),
            ResourceKind::SshKeys => self.ssh_keys.invalidate_all(),
            ResourceKind::Certificates => self.certificates.invalidate_all(),
            ResourceKind::Certificate => self.certificate.invalidate_all(),
            ResourceKind::Wallets => self.wallets.invalidate_all(),
        }
    }

    fn clear(&self) {
        self.profile.clear();
        self.hosts.clear();
        self.ssh_keys.clear();
        self.certificates.clear();
        self.certificate.clear();
        self.wallets.clear();
    }

    fn status(&self, key: &ResourceKey) -> EntryStatus {
        match key.kind() {
            ResourceKind::Profile => self.profile.status(key),
            ResourceKind::Hosts => self.hosts.status(key),
            ResourceKind::SshKeys => self.ssh_keys.status(key),
            ResourceKind::Certificates => self.certificates.status(key),
            ResourceKind::Certificate => self.certificate.status(key),
            ResourceKind::Wallets => self.wallets.status(key),
        }
    }
}

/// Marks a mutation kind as outstanding until dropped.
struct PendingGuard {
    pending: Arc<Mutex<HashSet<MutationKind>>>,
    kind: MutationKind,
}

impl PendingGuard {
    fn acquire(pending: &Arc<Mutex<HashSet<MutationKind>>>, kind: MutationKind) -> ApiResult<Self> {
        if !pending.lock().insert(kind) {
            return Err(ApiError::MutationInFlight(kind));
        }
        Ok(Self {
            pending: pending.clone(),
            kind,
        })
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.kind);
    }
}

fn to_body<T: Serialize>(value: &T) -> ApiResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| ApiError::Decode(e.to_string()))
}

fn decode_body<T: DeserializeOwned>(path: &str, body: &str) -> ApiResult<T> {
    let decoded = if body.trim().is_empty() {
        serde_json::from_value(serde_json::Value::Null)
    } else {
        serde_json::from_str(body)
    };
    decoded.map_err(|e| ApiError::Decode(format!("{path}: {e}")))
}

fn envelope_data<T>(path: &str, envelope: Envelope<T>) -> ApiResult<T> {
    envelope
        .data
        .ok_or_else(|| ApiError::Decode(format!("{path}: response has no data")))
}

/// Portal API client.
///
/// Cheap to clone; clones share the session, transport, caches and
/// in-progress mutation set.
#[derive(Clone)]
pub struct PortalClient {
    session: Arc<SessionManager>,
    transport: Arc<dyn Transport>,
    caches: Caches,
    pending: Arc<Mutex<HashSet<MutationKind>>>,
}

impl PortalClient {
    pub fn new(session: Arc<SessionManager>, transport: Arc<dyn Transport>) -> Self {
        Self {
            session,
            transport,
            caches: Caches::default(),
            pending: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    // ==========================================
    // Session
    // ==========================================

    /// Sign in and start from an empty cache.
    pub fn sign_in(&self, credential: &str) -> ApiResult<User> {
        let user = self.session.sign_in(credential)?;
        self.caches.clear();
        Ok(user)
    }

    /// Sign out and drop every cached resource.
    pub fn sign_out(&self) {
        self.session.sign_out();
        self.caches.clear();
    }

    /// Clear the caches whenever the session ends, including sign-outs the
    /// client did not initiate (expiry watch, another clone).
    pub fn clear_caches_on_sign_out(&self) -> JoinHandle<()> {
        let mut events = self.session.subscribe();
        let caches = self.caches.clone();

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::SignedOut { reason }) => {
                        debug!(reason = ?reason, "Session ended, clearing caches");
                        caches.clear();
                    }
                    Ok(SessionEvent::SignedIn { .. }) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Session events lagged, clearing caches");
                        caches.clear();
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    fn recover_unauthorized(&self) {
        self.session.handle_unauthorized();
        self.caches.clear();
    }

    fn require_token(&self) -> ApiResult<String> {
        match self.session.valid_token() {
            Some(token) => Ok(token),
            None => {
                warn!("No valid token for request, ending session");
                self.recover_unauthorized();
                Err(ApiError::Unauthenticated)
            }
        }
    }

    // ==========================================
    // Requests
    // ==========================================

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> ApiResult<T> {
        let token = self.require_token()?;
        self.call_with_token(token, method, path, body).await
    }

    async fn call_with_token<T: DeserializeOwned>(
        &self,
        token: String,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> ApiResult<T> {
        let request = ApiRequest {
            method,
            path: path.to_string(),
            body,
            token,
        };

        let response = self.transport.send(request).await.map_err(|e| {
            error!(method = %method, path, error = %e, "Request failed before a response");
            ApiError::from(e)
        })?;

        if response.status == 401 {
            warn!(method = %method, path, "Server rejected token");
            self.recover_unauthorized();
            return Err(ApiError::Unauthorized);
        }

        if !response.is_success() {
            let body_summary = summarize_response_body(&response.body);
            error!(
                method = %method,
                path,
                status = response.status,
                body_summary = %body_summary,
                "Request returned an error status"
            );
            return Err(ApiError::from_failed_body(response.status, &response.body));
        }

        decode_body(path, &response.body)
    }

    /// Read through `cache`, checking for a token before anything else.
    async fn cached<V, F, Fut>(
        &self,
        cache: &ResourceCache<ResourceKey, V>,
        key: ResourceKey,
        fetch: F,
    ) -> ApiResult<V>
    where
        V: Clone + Send + Sync + 'static,
        F: Fn(PortalClient) -> Fut,
        Fut: Future<Output = ApiResult<V>> + Send + 'static,
    {
        self.require_token()?;
        let client = self.clone();
        cache.read(key, move || fetch(client.clone())).await
    }

    /// Run a mutation of `kind`, then invalidate the reads it affects.
    async fn mutate<T, Fut>(&self, kind: MutationKind, operation: Fut) -> ApiResult<T>
    where
        Fut: Future<Output = ApiResult<T>>,
    {
        let _pending = PendingGuard::acquire(&self.pending, kind)?;
        debug!(mutation = %kind, "Mutation started");

        let result = operation.await;
        match &result {
            // The write reached the server even if its reply was odd.
            Ok(_) | Err(ApiError::Decode(_)) => {
                for resource in kind.invalidates() {
                    self.caches.invalidate(*resource);
                }
                info!(mutation = %kind, invalidated = ?kind.invalidates(), "Mutation completed");
            }
            Err(e) => warn!(mutation = %kind, error = %e, "Mutation failed"),
        }
        result
    }

    /// Whether a mutation of `kind` is outstanding.
    pub fn is_pending(&self, kind: MutationKind) -> bool {
        self.pending.lock().contains(&kind)
    }

    pub fn cache_status(&self, key: &ResourceKey) -> EntryStatus {
        self.caches.status(key)
    }

    /// Mark every cached read of `kind` stale.
    pub fn invalidate(&self, kind: ResourceKind) {
        self.caches.invalidate(kind);
    }

    // ==========================================
    // Reads
    // ==========================================

    pub async fn profile(&self) -> ApiResult<Profile> {
        self.cached(&self.caches.profile, ResourceKey::Profile, |client| async move {
            client.fetch_profile().await
        })
        .await
    }

    async fn fetch_profile(&self) -> ApiResult<Profile> {
        let path = "/user-query/my-profile";
        let envelope: Envelope<Profile> = self.call(Method::Get, path, None).await?;
        if !envelope.success {
            return Err(ApiError::request_failed(None, "Failed to fetch profile"));
        }
        envelope_data(path, envelope)
    }

    pub async fn hosts(&self) -> ApiResult<Vec<Host>> {
        self.cached(&self.caches.hosts, ResourceKey::Hosts, |client| async move {
            client.fetch_list("/user-query/my-hosts").await
        })
        .await
    }

    pub async fn ssh_keys(&self) -> ApiResult<Vec<SshKey>> {
        self.cached(&self.caches.ssh_keys, ResourceKey::SshKeys, |client| async move {
            client.fetch_list("/ssh-cert/get-keys").await
        })
        .await
    }

    pub async fn certificates(&self) -> ApiResult<Vec<Certificate>> {
        self.cached(
            &self.caches.certificates,
            ResourceKey::Certificates,
            |client| async move { client.fetch_list("/user-query/my-certificates").await },
        )
        .await
    }

    pub async fn wallets(&self) -> ApiResult<Vec<Wallet>> {
        self.cached(&self.caches.wallets, ResourceKey::Wallets, |client| async move {
            client.fetch_list("/user-query/my-wallets").await
        })
        .await
    }

    async fn fetch_list<T: DeserializeOwned>(&self, path: &str) -> ApiResult<Vec<T>> {
        let envelope: Envelope<Vec<T>> = self.call(Method::Get, path, None).await?;
        envelope_data(path, envelope)
    }

    pub async fn certificate(&self, id: &str) -> ApiResult<Certificate> {
        let id = validate_certificate_id(id)?.to_string();
        let key = ResourceKey::Certificate(id.clone());

        self.cached(&self.caches.certificate, key, move |client| {
            let id = id.clone();
            async move { client.fetch_certificate(&id).await }
        })
        .await
    }

    async fn fetch_certificate(&self, id: &str) -> ApiResult<Certificate> {
        let path = "/user-query/get-certificate";
        let body = to_body(&GetCertificateBody { cert_id: id })?;
        let envelope: Envelope<Certificate> = self.call(Method::Post, path, Some(body)).await?;
        envelope_data(path, envelope)
    }

    // ==========================================
    // Mutations
    // ==========================================

    /// Rotate the API key. Returns the new key.
    pub async fn change_api_key(&self) -> ApiResult<String> {
        self.mutate(MutationKind::ChangeApiKey, async {
            let path = "/user-query/change-api-key";
            let envelope: Envelope<ApiKey> = self.call(Method::Get, path, None).await?;
            if !envelope.success {
                return Err(ApiError::request_failed(None, "Failed to change API key"));
            }
            Ok(envelope_data(path, envelope)?.api_key)
        })
        .await
    }

    pub async fn create_certificate(&self, key_id: &str, host_id: &str) -> ApiResult<Certificate> {
        let request = validate_new_certificate(key_id, host_id)?;

        self.mutate(MutationKind::CreateCertificate, async {
            let path = "/ssh-cert/create-cert";
            let envelope: Envelope<Certificate> = self
                .call(Method::Post, path, Some(to_body(&request)?))
                .await?;
            if !envelope.success {
                return Err(ApiError::request_failed(None, "Failed to create certificate"));
            }
            envelope_data(path, envelope)
        })
        .await
    }

    /// Register an SSH public key. The session token is sent as `id_token`.
    pub async fn add_ssh_key(&self, title: &str, public_key: &str) -> ApiResult<AddedSshKey> {
        let key = validate_new_ssh_key(title, public_key)?;

        self.mutate(MutationKind::AddSshKey, async {
            let token = self.require_token()?;
            let body = to_body(&AddSshKeyBody {
                title: &key.title,
                public_key: &key.public_key,
                id_token: &token,
            })?;
            self.call_with_token(token.clone(), Method::Post, "/ssh-cert/add-key", Some(body))
                .await
        })
        .await
    }

    pub async fn delete_ssh_key(&self, id: &str) -> ApiResult<serde_json::Value> {
        let id = validate_ssh_key_id(id)?;

        self.mutate(MutationKind::DeleteSshKey, async {
            self.call(Method::Delete, &format!("/ssh-key/{id}"), None)
                .await
        })
        .await
    }

    /// Link a custodial wallet using a signature over the session token.
    pub async fn add_wallet(&self, signature: &str) -> ApiResult<serde_json::Value> {
        let signature = validate_signature(signature)?;

        self.mutate(MutationKind::AddWallet, async {
            let token = self.require_token()?;
            let body = to_body(&AddWalletBody {
                id_token: &token,
                signature,
            })?;
            self.call_with_token(token.clone(), Method::Post, "/google-add-wallet", Some(body))
                .await
        })
        .await
    }

    /// Fetch the signed certificate for an SSH key. Not cached.
    pub async fn download_certificate(&self, key_id: &str) -> ApiResult<DownloadedCertificate> {
        let key_id = validate_ssh_key_id(key_id)?;

        self.mutate(MutationKind::DownloadCertificate, async {
            self.call(Method::Get, &format!("/ssh-key/{key_id}/certificate"), None)
                .await
        })
        .await
    }
}

impl std::fmt::Debug for PortalClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortalClient")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
