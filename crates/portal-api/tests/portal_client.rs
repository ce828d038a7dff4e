mod common;

use common::{anonymous, settle, signed_in, MockTransport};
use portal_api::{
    ApiError, CacheStatus, CertificateFile, Method, MutationKind, ResourceKey, ResourceKind,
    TransportError,
};
use portal_session::{SessionEvent, SignOutReason};
use serde_json::json;
use std::time::Duration;

const SSH_KEYS: &str = "/ssh-cert/get-keys";
const ADD_KEY: &str = "/ssh-cert/add-key";
const HOSTS: &str = "/user-query/my-hosts";
const PROFILE: &str = "/user-query/my-profile";
const WALLETS: &str = "/user-query/my-wallets";
const ADD_WALLET: &str = "/google-add-wallet";

fn ssh_key(id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "title": format!("key {id}"),
        "public_key": "ssh-ed25519 AAAA",
        "fingerprint": "SHA256:abc",
        "created_at": "2024-01-01T00:00:00Z",
    })
}

fn script_profile(transport: &MockTransport, api_key: &str) {
    transport.respond(
        Method::Get,
        PROFILE,
        200,
        json!({
            "success": true,
            "data": {
                "user_id": "u1",
                "cuid": "c1",
                "name": "A",
                "type": "employee",
                "api_key": api_key,
                "email": "a@x.com",
            }
        }),
    );
}

#[tokio::test(start_paused = true)]
async fn concurrent_reads_issue_one_request() {
    let h = signed_in();
    h.transport
        .respond(Method::Get, SSH_KEYS, 200, json!({ "data": [ssh_key("k1")] }));
    h.transport
        .delay(Method::Get, SSH_KEYS, Duration::from_millis(50));

    let (a, b) = tokio::join!(h.client.ssh_keys(), h.client.ssh_keys());

    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(h.transport.calls_to(Method::Get, SSH_KEYS), 1);
}

#[tokio::test]
async fn adding_a_key_refreshes_the_key_list() {
    let h = signed_in();
    h.transport
        .respond(Method::Get, SSH_KEYS, 200, json!({ "data": [ssh_key("k1")] }));
    h.transport.respond(
        Method::Get,
        SSH_KEYS,
        200,
        json!({ "data": [ssh_key("k1"), ssh_key("k2")] }),
    );
    h.transport
        .respond(Method::Post, ADD_KEY, 200, json!({ "id": "k2" }));

    assert_eq!(h.client.ssh_keys().await.unwrap().len(), 1);
    settle().await;

    let added = h
        .client
        .add_ssh_key("  work laptop ", " ssh-ed25519 AAAAC3Nza user@host\n")
        .await
        .unwrap();
    assert_eq!(added.id, "k2");
    assert!(h.client.cache_status(&ResourceKey::SshKeys).invalidated);

    let keys = h.client.ssh_keys().await.unwrap();
    assert_eq!(
        keys.iter().map(|k| k.id.as_str()).collect::<Vec<_>>(),
        ["k1", "k2"]
    );
    assert_eq!(h.transport.calls_to(Method::Get, SSH_KEYS), 2);

    let post = h
        .transport
        .calls()
        .into_iter()
        .find(|call| call.path == ADD_KEY)
        .unwrap();
    assert_eq!(
        post.body,
        Some(json!({
            "title": "work laptop",
            "public_key": "ssh-ed25519 AAAAC3Nza user@host",
            "id_token": h.token,
        }))
    );
}

#[tokio::test]
async fn linking_a_wallet_refreshes_the_wallet_list() {
    let h = signed_in();
    h.transport
        .respond(Method::Get, WALLETS, 200, json!({ "data": [{ "address": "0xa" }] }));
    h.transport.respond(
        Method::Get,
        WALLETS,
        200,
        json!({ "data": [{ "address": "0xa" }, { "address": "0xb" }] }),
    );
    h.transport
        .respond(Method::Post, ADD_WALLET, 200, json!({ "ok": true }));

    assert_eq!(h.client.wallets().await.unwrap().len(), 1);
    settle().await;

    h.client.add_wallet(" 0xsig ").await.unwrap();
    assert!(h.client.cache_status(&ResourceKey::Wallets).invalidated);

    let wallets = h.client.wallets().await.unwrap();
    assert_eq!(
        wallets.iter().map(|w| w.address.as_str()).collect::<Vec<_>>(),
        ["0xa", "0xb"]
    );
    assert_eq!(h.transport.calls_to(Method::Get, WALLETS), 2);

    let post = h
        .transport
        .calls()
        .into_iter()
        .find(|call| call.path == ADD_WALLET)
        .unwrap();
    assert_eq!(
        post.body,
        Some(json!({ "id_token": h.token, "signature": "0xsig" }))
    );
}

#[tokio::test]
async fn every_request_carries_the_session_token() {
    let h = signed_in();
    h.transport.respond(Method::Get, HOSTS, 200, json!({ "success": true, "data": [] }));

    h.client.hosts().await.unwrap();

    let calls = h.transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].token, h.token);
    assert_eq!(calls[0].body, None);
}

#[tokio::test]
async fn unauthorized_response_ends_the_session() {
    let h = signed_in();
    script_profile(&h.transport, "key-1");
    h.client.profile().await.unwrap();
    settle().await;

    let mut events = h.session.subscribe();
    h.transport
        .respond(Method::Get, HOSTS, 401, json!({ "message": "jwt expired" }));

    let err = h.client.hosts().await.unwrap_err();

    assert_eq!(err, ApiError::Unauthorized);
    assert!(err.requires_sign_in());
    assert_eq!(err.to_string(), "Token expired or invalid");
    assert_eq!(h.session.valid_token(), None);
    assert!(!h.client.cache_status(&ResourceKey::Profile).has_value);
    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::SignedOut {
            reason: SignOutReason::Unauthorized
        }
    );
}

#[tokio::test]
async fn reads_without_a_token_make_no_requests() {
    let h = anonymous();
    let mut events = h.session.subscribe();

    let err = h.client.ssh_keys().await.unwrap_err();

    assert_eq!(err, ApiError::Unauthenticated);
    assert!(h.transport.calls().is_empty());
    let event = events.recv().await.unwrap();
    assert_eq!(
        event,
        SessionEvent::SignedOut {
            reason: SignOutReason::Unauthorized
        }
    );
    if let SessionEvent::SignedOut { reason } = event {
        assert_eq!(reason.redirect_path(), "/?expired=true");
    }
}

#[tokio::test]
async fn expired_credential_is_held_but_never_sent() {
    let h = anonymous();
    h.client.sign_in(&common::credential(-10)).unwrap();

    assert_eq!(h.session.valid_token(), None);
    assert_eq!(
        h.client.wallets().await.unwrap_err(),
        ApiError::Unauthenticated
    );
    assert!(h.transport.calls().is_empty());
}

#[tokio::test]
async fn mutations_without_a_token_make_no_requests() {
    let h = anonymous();

    assert_eq!(
        h.client.change_api_key().await.unwrap_err(),
        ApiError::Unauthenticated
    );
    assert_eq!(
        h.client
            .add_ssh_key("laptop", "ssh-rsa AAAA")
            .await
            .unwrap_err(),
        ApiError::Unauthenticated
    );
    assert!(h.transport.calls().is_empty());
    assert!(!h.client.is_pending(MutationKind::AddSshKey));
}

#[tokio::test]
async fn invalid_key_is_rejected_before_the_network() {
    let h = signed_in();

    let err = h
        .client
        .add_ssh_key("laptop", "AAAAB3NzaC1yc2E user@host")
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Validation(_)));
    assert!(err
        .to_string()
        .starts_with("Invalid SSH public key format"));
    assert!(h.transport.calls().is_empty());
    assert!(h.session.valid_token().is_some());
}

#[tokio::test]
async fn failed_responses_carry_the_server_message() {
    let h = signed_in();
    h.transport.respond(
        Method::Post,
        "/ssh-cert/create-cert",
        500,
        json!({ "message": "Host quota exceeded" }),
    );
    h.transport
        .respond_raw(Method::Get, HOSTS, 502, "<html>Bad gateway</html>");
    h.transport.fail(
        Method::Get,
        "/user-query/my-wallets",
        TransportError::Network("connection refused".to_string()),
    );

    assert_eq!(
        h.client.create_certificate("k1", "h1").await.unwrap_err(),
        ApiError::RequestFailed {
            status: Some(500),
            message: "Host quota exceeded".to_string()
        }
    );
    assert_eq!(
        h.client.hosts().await.unwrap_err(),
        ApiError::RequestFailed {
            status: Some(502),
            message: "Request failed".to_string()
        }
    );
    assert!(matches!(
        h.client.wallets().await.unwrap_err(),
        ApiError::RequestFailed { status: None, .. }
    ));
    // None of these end the session.
    assert!(h.session.valid_token().is_some());
}

#[tokio::test]
async fn failed_refetch_keeps_the_last_good_value() {
    let h = signed_in();
    h.transport.respond(
        Method::Get,
        HOSTS,
        200,
        json!({ "success": true, "data": [{ "id": "h1", "status": "online" }] }),
    );
    h.transport
        .respond(Method::Get, HOSTS, 503, json!({ "message": "maintenance" }));

    assert_eq!(h.client.hosts().await.unwrap().len(), 1);
    settle().await;
    h.client.invalidate(ResourceKind::Hosts);

    let err = h.client.hosts().await.unwrap_err();
    assert_eq!(err.to_string(), "maintenance");

    let status = h.client.cache_status(&ResourceKey::Hosts);
    assert!(status.has_value);
    assert_eq!(status.status, CacheStatus::Error);
    assert_eq!(status.last_error.as_deref(), Some("maintenance"));
}

#[tokio::test]
async fn cached_read_is_served_while_revalidating() {
    let h = signed_in();
    h.transport.respond(
        Method::Get,
        HOSTS,
        200,
        json!({ "success": true, "data": [{ "id": "h1" }] }),
    );
    h.transport.respond(
        Method::Get,
        HOSTS,
        200,
        json!({ "success": true, "data": [{ "id": "h1" }, { "id": "h2" }] }),
    );

    assert_eq!(h.client.hosts().await.unwrap().len(), 1);
    settle().await;

    // Stale value first, then the background fetch lands.
    assert_eq!(h.client.hosts().await.unwrap().len(), 1);
    settle().await;
    assert_eq!(h.transport.calls_to(Method::Get, HOSTS), 2);
    assert_eq!(h.client.hosts().await.unwrap().len(), 2);
}

#[tokio::test]
async fn profile_envelope_failure() {
    let h = signed_in();
    h.transport.respond(
        Method::Get,
        PROFILE,
        200,
        json!({ "success": false, "data": null }),
    );

    assert_eq!(
        h.client.profile().await.unwrap_err().to_string(),
        "Failed to fetch profile"
    );
}

#[tokio::test]
async fn rotating_the_api_key_invalidates_only_the_profile() {
    let h = signed_in();
    script_profile(&h.transport, "old-key");
    script_profile(&h.transport, "new-key");
    h.transport.respond(
        Method::Get,
        HOSTS,
        200,
        json!({ "success": true, "data": [] }),
    );
    h.transport.respond(
        Method::Get,
        "/user-query/change-api-key",
        200,
        json!({ "success": true, "data": { "api_key": "new-key" } }),
    );

    assert_eq!(h.client.profile().await.unwrap().api_key, "old-key");
    h.client.hosts().await.unwrap();
    settle().await;

    assert_eq!(h.client.change_api_key().await.unwrap(), "new-key");
    assert!(h.client.cache_status(&ResourceKey::Profile).invalidated);
    assert!(!h.client.cache_status(&ResourceKey::Hosts).invalidated);

    assert_eq!(h.client.profile().await.unwrap().api_key, "new-key");
}

#[tokio::test]
async fn change_api_key_envelope_failure_leaves_cache_alone() {
    let h = signed_in();
    script_profile(&h.transport, "old-key");
    h.transport.respond(
        Method::Get,
        "/user-query/change-api-key",
        200,
        json!({ "success": false }),
    );

    h.client.profile().await.unwrap();
    settle().await;

    assert_eq!(
        h.client.change_api_key().await.unwrap_err().to_string(),
        "Failed to change API key"
    );
    assert!(!h.client.cache_status(&ResourceKey::Profile).invalidated);
}

#[tokio::test]
async fn creating_a_certificate_invalidates_the_list_only() {
    let h = signed_in();
    h.transport.respond(
        Method::Get,
        "/user-query/my-certificates",
        200,
        json!({ "success": true, "data": [] }),
    );
    h.transport.respond(
        Method::Get,
        HOSTS,
        200,
        json!({ "success": true, "data": [] }),
    );
    h.transport.respond(
        Method::Post,
        "/ssh-cert/create-cert",
        200,
        json!({ "success": true, "data": { "id": "c1", "key_id": "k1", "host_id": "h1" } }),
    );

    h.client.certificates().await.unwrap();
    h.client.hosts().await.unwrap();
    settle().await;

    let cert = h.client.create_certificate("k1", "h1").await.unwrap();
    assert_eq!(cert.id, "c1");
    assert!(h.client.cache_status(&ResourceKey::Certificates).invalidated);
    assert!(!h.client.cache_status(&ResourceKey::Hosts).invalidated);

    let post = h.transport.calls().pop().unwrap();
    assert_eq!(post.body, Some(json!({ "key_id": "k1", "host_id": "h1" })));
}

#[tokio::test]
async fn create_certificate_requires_both_ids() {
    let h = signed_in();
    let err = h.client.create_certificate("k1", " ").await.unwrap_err();
    assert_eq!(err.to_string(), "Please select both a SSH key and a host.");
    assert!(h.transport.calls().is_empty());
}

#[tokio::test]
async fn certificate_by_id_is_cached_per_id() {
    let h = signed_in();
    h.transport.respond(
        Method::Post,
        "/user-query/get-certificate",
        200,
        json!({ "success": true, "data": { "id": "c1", "ssh_keys": { "title": "laptop" } } }),
    );

    let cert = h.client.certificate("c1").await.unwrap();
    assert_eq!(cert.ssh_keys.unwrap().title, "laptop");
    assert_eq!(
        h.transport.calls()[0].body,
        Some(json!({ "cert_id": "c1" }))
    );
    assert!(h
        .client
        .cache_status(&ResourceKey::Certificate("c1".to_string()))
        .has_value);
    assert!(!h
        .client
        .cache_status(&ResourceKey::Certificate("c2".to_string()))
        .has_value);
}

#[tokio::test(start_paused = true)]
async fn resubmitting_a_pending_mutation_is_refused() {
    let h = signed_in();
    h.transport
        .respond(Method::Post, "/google-add-wallet", 200, json!({ "ok": true }));
    h.transport
        .delay(Method::Post, "/google-add-wallet", Duration::from_millis(100));

    let first = tokio::spawn({
        let client = h.client.clone();
        async move { client.add_wallet("0xsig").await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(h.client.is_pending(MutationKind::AddWallet));
    assert_eq!(
        h.client.add_wallet("0xsig").await.unwrap_err(),
        ApiError::MutationInFlight(MutationKind::AddWallet)
    );

    assert_eq!(first.await.unwrap().unwrap(), json!({ "ok": true }));
    assert!(!h.client.is_pending(MutationKind::AddWallet));
    assert_eq!(h.transport.calls_to(Method::Post, "/google-add-wallet"), 1);

    let call = &h.transport.calls()[0];
    assert_eq!(
        call.body,
        Some(json!({ "id_token": h.token, "signature": "0xsig" }))
    );
}

#[tokio::test]
async fn deleting_a_key_hits_the_key_path() {
    let h = signed_in();
    h.transport
        .respond(Method::Get, SSH_KEYS, 200, json!({ "data": [ssh_key("k1")] }));
    h.transport.respond_raw(Method::Delete, "/ssh-key/k1", 204, "");

    h.client.ssh_keys().await.unwrap();
    settle().await;

    assert!(h.client.delete_ssh_key("k1").await.unwrap().is_null());
    assert!(h.client.cache_status(&ResourceKey::SshKeys).invalidated);
}

#[tokio::test]
async fn downloaded_certificate_can_be_saved() {
    let h = signed_in();
    h.transport.respond(
        Method::Get,
        "/ssh-key/k1/certificate",
        200,
        json!({ "certificate": "ssh-ed25519-cert-v01@openssh.com AAAA user" }),
    );

    let downloaded = h.client.download_certificate("k1").await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = CertificateFile::write(dir.path(), &downloaded.certificate).unwrap();

    assert!(path.ends_with("id_ed25519-cert.pub"));
    assert_eq!(
        std::fs::read_to_string(path).unwrap(),
        "ssh-ed25519-cert-v01@openssh.com AAAA user\n"
    );
}

#[tokio::test]
async fn sign_out_clears_token_and_caches() {
    let h = signed_in();
    script_profile(&h.transport, "key-1");
    h.client.profile().await.unwrap();
    settle().await;

    h.client.sign_out();

    assert_eq!(h.session.valid_token(), None);
    assert!(!h.client.cache_status(&ResourceKey::Profile).has_value);
    assert_eq!(
        h.client.profile().await.unwrap_err(),
        ApiError::Unauthenticated
    );
}

#[tokio::test]
async fn caches_follow_sign_outs_made_elsewhere() {
    let h = signed_in();
    script_profile(&h.transport, "key-1");
    let listener = h.client.clear_caches_on_sign_out();

    h.client.profile().await.unwrap();
    settle().await;
    assert!(h.client.cache_status(&ResourceKey::Profile).has_value);

    h.session.sign_out();
    settle().await;

    assert!(!h.client.cache_status(&ResourceKey::Profile).has_value);
    listener.abort();
}

#[tokio::test]
async fn malformed_credential_is_reported_and_session_kept() {
    let h = signed_in();
    let mut events = h.session.subscribe();

    let err = h.client.sign_in("only.two").unwrap_err();

    assert!(matches!(err, ApiError::InvalidCredential(_)));
    assert!(!err.requires_sign_in());
    assert_eq!(h.session.valid_token(), Some(h.token.clone()));
    assert!(events.try_recv().is_err());
    assert!(h.transport.calls().is_empty());
}
