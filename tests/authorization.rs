//! End-to-end token issuance tests
//!
//! Tests the full authorization flow including:
//! - Request validation order and rejections
//! - Scope containment of issued tokens
//! - Predicate denial and failure
//! - Server credential renewal against a moving clock

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use pretty_assertions::assert_eq;

use feeds_auth::Error;
use feeds_auth::feeds::{
    Action, AddressingMode, AuthorizationEngine, AuthorizationRequest, FixedClock, HmacSigner,
    TenantIdentity, sync_predicate,
};

const NOW: u64 = 1_700_000_000;

fn tenant() -> TenantIdentity {
    TenantIdentity::from_key_pair("app-1", "key-1:s3cr3t", None).unwrap()
}

fn engine_at(clock: Arc<FixedClock>) -> AuthorizationEngine {
    AuthorizationEngine::builder(tenant()).clock(clock).build().unwrap()
}

fn engine() -> AuthorizationEngine {
    engine_at(Arc::new(FixedClock::new(NOW)))
}

fn verifier() -> HmacSigner {
    HmacSigner::new(&tenant(), None)
}

/// Test the private feed scenario: predicate grants only `private-42`
#[tokio::test]
async fn test_private_feed_granted() {
    // GIVEN: a predicate that grants exactly one feed
    let engine = engine();
    let predicate = sync_predicate(|_, feed: &str| feed == "private-42");
    let request = AuthorizationRequest::new("READ", "feeds/private-42/items");

    // WHEN: the engine addresses the predicate by feed id
    let credential = engine.authorize_feed(&request, &predicate).await.unwrap();

    // THEN: the token carries exactly that scope
    let claims = verifier().verify(&credential.token, NOW).unwrap();
    assert_eq!(claims.scope.action, Action::Read);
    assert_eq!(claims.scope.path, "feeds/private-42/items");
    assert_eq!(claims.subject, None);
    assert_eq!(claims.issuer, "key-1");
}

/// Test the private feed scenario with a predicate that always refuses
#[tokio::test]
async fn test_private_feed_forbidden() {
    let engine = engine();
    let request = AuthorizationRequest::new("READ", "feeds/private-42/items");

    let err = engine
        .authorize(&request, &sync_predicate(|_, _| false))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Forbidden));
    assert!(engine.server_cache().current().is_none());
}

/// Test that no valid request is widened or narrowed
#[tokio::test]
async fn test_scope_containment_over_many_feeds() {
    let engine = engine();
    let verifier = verifier();
    let allow_all = sync_predicate(|_, _| true);

    for feed in ["a", "Z", "0", "feed-1", "private-42", "x-y-z", "ABCdef-123"] {
        let path = format!("feeds/{feed}/items");
        let credential = engine
            .authorize(&AuthorizationRequest::new("READ", &path), &allow_all)
            .await
            .unwrap();

        let claims = verifier.verify(&credential.token, NOW).unwrap();
        assert_eq!(claims.scope.path, path);
        assert_eq!(claims.scope.action, Action::Read);
        assert_eq!(credential.expires_at, claims.expires_at);
    }
}

/// Test that malformed paths never reach the predicate
#[tokio::test]
async fn test_invalid_paths_rejected_before_predicate() {
    let engine = engine();
    let calls = AtomicUsize::new(0);
    let predicate = sync_predicate(|_, _| {
        calls.fetch_add(1, Ordering::SeqCst);
        true
    });

    let invalid = [
        "",
        "feeds",
        "feeds//items",
        "feeds/a/items/",
        "/feeds/a/items",
        "feeds/a/item",
        "feeds/a/b/items",
        "feeds/a_b/items",
        "feeds/a.b/items",
        "feeds/ab c/items",
        "feeds/../items",
        "feeds/a/items\n",
        "FEEDS/a/items",
        "x/feeds/a/items",
        "feeds/é/items",
    ];

    for path in invalid {
        let err = engine
            .authorize(&AuthorizationRequest::new("READ", path), &predicate)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPath(_)), "path {path:?} gave {err:?}");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

/// Test that only READ is client-grantable
#[tokio::test]
async fn test_non_grantable_actions_rejected() {
    let engine = engine();
    let calls = AtomicUsize::new(0);
    let predicate = sync_predicate(|_, _| {
        calls.fetch_add(1, Ordering::SeqCst);
        true
    });

    for action in ["WRITE", "*", "ALL", "read", "Read", "", " READ", "READ "] {
        let err = engine
            .authorize(&AuthorizationRequest::new(action, "feeds/a/items"), &predicate)
            .await
            .unwrap_err();
        match err {
            Error::InvalidAction { accepted } => assert_eq!(accepted, vec![Action::Read]),
            other => panic!("action {action:?} gave {other:?}"),
        }
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

/// Test that missing fields are reported in action-then-path order
#[tokio::test]
async fn test_missing_fields() {
    let engine = engine();
    let allow_all = sync_predicate(|_, _| true);

    let cases = [
        (AuthorizationRequest::default(), "action"),
        (
            AuthorizationRequest {
                path: Some("feeds/a/items".to_string()),
                ..Default::default()
            },
            "action",
        ),
        (
            AuthorizationRequest {
                action: Some("READ".to_string()),
                ..Default::default()
            },
            "path",
        ),
    ];

    for (request, field) in cases {
        match engine.authorize(&request, &allow_all).await.unwrap_err() {
            Error::MissingField(missing) => assert_eq!(missing, field),
            other => panic!("expected missing {field}, got {other:?}"),
        }
    }

    // Action is validated before path: both bad reports the action.
    let both_bad = AuthorizationRequest::new("WRITE", "nope");
    assert!(matches!(
        engine.authorize(&both_bad, &allow_all).await.unwrap_err(),
        Error::InvalidAction { .. }
    ));
}

/// Test that a failing async predicate denies rather than bubbling up
#[tokio::test]
async fn test_predicate_failure_is_forbidden() {
    let engine = engine();
    let predicate = |_: Action, _: String| async {
        Err::<bool, _>(anyhow::anyhow!("permission store unreachable"))
    };

    let err = engine
        .authorize(&AuthorizationRequest::new("READ", "feeds/a/items"), &predicate)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Forbidden));
}

/// Test the addressing modes hand the predicate different resources
#[tokio::test]
async fn test_addressing_modes() {
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let predicate = {
        let seen = Arc::clone(&seen);
        move |_: Action, resource: String| {
            let seen = Arc::clone(&seen);
            async move {
                seen.lock().push(resource);
                Ok::<_, anyhow::Error>(true)
            }
        }
    };
    let request = AuthorizationRequest::new("READ", "feeds/news/items");

    let engine = AuthorizationEngine::builder(tenant())
        .clock(Arc::new(FixedClock::new(NOW)))
        .addressing(AddressingMode::FeedId)
        .build()
        .unwrap();

    engine.authorize(&request, &predicate).await.unwrap();
    engine.authorize_path(&request, &predicate).await.unwrap();
    engine.authorize_feed(&request, &predicate).await.unwrap();

    assert_eq!(
        *seen.lock(),
        vec![
            "news".to_string(),
            "feeds/news/items".to_string(),
            "news".to_string()
        ]
    );
}

/// Test subject and validity window of client tokens
#[tokio::test]
async fn test_subject_and_window() {
    let engine = AuthorizationEngine::builder(tenant())
        .clock(Arc::new(FixedClock::new(NOW)))
        .leeway(Duration::from_secs(10))
        .lifetime(Duration::from_secs(3600))
        .build()
        .unwrap();
    let request = AuthorizationRequest::new("READ", "feeds/a/items").with_subject("alice");

    let credential = engine
        .authorize(&request, &sync_predicate(|_, _| true))
        .await
        .unwrap();

    assert_eq!(credential.issued_at, NOW - 10);
    assert_eq!(credential.expires_at, NOW - 10 + 3600);
    let claims = verifier().verify(&credential.token, NOW).unwrap();
    assert_eq!(claims.subject.as_deref(), Some("alice"));
}

/// Test that identical inputs under a fixed clock sign identical tokens
#[tokio::test]
async fn test_deterministic_tokens() {
    let request = AuthorizationRequest::new("READ", "feeds/a/items");
    let allow_all = sync_predicate(|_, _| true);

    let first = engine().authorize(&request, &allow_all).await.unwrap();
    let second = engine().authorize(&request, &allow_all).await.unwrap();

    assert_eq!(first.token, second.token);
}

/// Test server credential reuse and renewal as the clock moves
#[tokio::test]
async fn test_server_token_renewal() {
    // GIVEN: an engine with no renewal margin so expiry is exact
    let clock = Arc::new(FixedClock::new(NOW));
    let engine = AuthorizationEngine::builder(tenant())
        .clock(clock.clone())
        .lifetime(Duration::from_secs(600))
        .cache_tolerance(Duration::ZERO)
        .build()
        .unwrap();

    // WHEN: the token is requested twice at the same instant
    let first = engine.server_token().await.unwrap();
    let again = engine.server_token().await.unwrap();

    // THEN: it is reused
    assert_eq!(first, again);
    let expires_at = engine.server_cache().current().unwrap().expires_at;

    // One second before expiry it is still served
    clock.set(expires_at - 1);
    assert_eq!(engine.server_token().await.unwrap(), first);

    // At expiry it is replaced
    clock.set(expires_at);
    let renewed = engine.server_token().await.unwrap();
    assert_ne!(renewed, first);
    assert!(engine.server_cache().current().unwrap().expires_at > expires_at);

    // The server credential has maximal scope and no subject
    let claims = verifier().verify(&renewed, expires_at).unwrap();
    assert_eq!(claims.scope.action, Action::All);
    assert_eq!(claims.scope.path, "*");
    assert_eq!(claims.subject, None);
}

/// Test that client issuance never touches the server credential
#[tokio::test]
async fn test_client_tokens_are_not_cached() {
    let engine = engine();
    engine
        .authorize(
            &AuthorizationRequest::new("READ", "feeds/a/items"),
            &sync_predicate(|_, _| true),
        )
        .await
        .unwrap();

    assert!(engine.server_cache().current().is_none());
}

mod properties {
    use std::sync::LazyLock;

    use proptest::prelude::*;
    use regex::Regex;

    use super::*;

    static VALID_PATH: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^feeds/[a-zA-Z0-9-]+/items$").unwrap());

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    /// Paths that do not have the `feeds/<id>/items` shape: arbitrary text,
    /// and valid paths with one character swapped or appended.
    fn arb_invalid_path() -> impl Strategy<Value = String> {
        prop_oneof![
            "\\PC{0,40}",
            ("[a-zA-Z0-9-]{1,16}", "[^a-zA-Z0-9-]").prop_map(|(id, bad)| format!("feeds/{id}{bad}/items")),
            ("[a-zA-Z0-9-]{1,16}", "\\PC{1,4}").prop_map(|(id, tail)| format!("feeds/{id}/items{tail}")),
            ("\\PC{1,4}", "[a-zA-Z0-9-]{1,16}").prop_map(|(head, id)| format!("{head}feeds/{id}/items")),
        ]
        .prop_filter("must not be a valid path", |p| !VALID_PATH.is_match(p))
    }

    fn rejects_without_consulting(request: &AuthorizationRequest) -> (Error, usize) {
        let calls = AtomicUsize::new(0);
        let predicate = sync_predicate(|_, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            true
        });
        let err = runtime()
            .block_on(engine().authorize(request, &predicate))
            .unwrap_err();
        (err, calls.load(Ordering::SeqCst))
    }

    proptest! {
        /// Every granted token carries exactly the requested scope.
        #[test]
        fn granted_scope_equals_requested(
            feed in "[a-zA-Z0-9-]{1,48}",
            subject in proptest::option::of("[a-zA-Z0-9@._-]{1,32}"),
        ) {
            let path = format!("feeds/{feed}/items");
            let mut request = AuthorizationRequest::new("READ", &path);
            if let Some(ref subject) = subject {
                request = request.with_subject(subject.clone());
            }

            let credential = runtime()
                .block_on(engine().authorize_feed(&request, &sync_predicate(|_, _| true)))
                .unwrap();

            let claims = verifier().verify(&credential.token, NOW).unwrap();
            prop_assert_eq!(claims.scope.action, Action::Read);
            prop_assert_eq!(claims.scope.path, path);
            prop_assert_eq!(claims.subject, subject);
        }

        /// Malformed paths are rejected before the predicate runs.
        #[test]
        fn invalid_paths_never_reach_predicate(path in arb_invalid_path()) {
            let (err, calls) = rejects_without_consulting(&AuthorizationRequest::new("READ", &path));
            prop_assert!(matches!(err, Error::InvalidPath(_)), "path {:?} gave {:?}", path, err);
            prop_assert_eq!(calls, 0);
        }

        /// Anything other than `READ` is rejected before the predicate runs.
        #[test]
        fn non_grantable_actions_never_reach_predicate(
            action in "\\PC{0,12}".prop_filter("must not be READ", |a| a != "READ"),
            feed in "[a-zA-Z0-9-]{1,16}",
        ) {
            let request = AuthorizationRequest::new(action, format!("feeds/{feed}/items"));
            let (err, calls) = rejects_without_consulting(&request);
            prop_assert!(matches!(err, Error::InvalidAction { .. }), "gave {:?}", err);
            prop_assert_eq!(calls, 0);
        }
    }
}
