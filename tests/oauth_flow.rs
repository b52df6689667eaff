mod support;

use std::time::{Duration, Instant};

use hh_vacancy_bot::oauth::coordinator::AuthFlowOutcome;
use hh_vacancy_bot::oauth::registry::AwaitedRedirect;
use support::{state_param, AuthHarness};

#[tokio::test(flavor = "multi_thread")]
async fn full_flow_stores_credential_for_owner() {
    let harness = AuthHarness::start(Duration::from_secs(30), 200).await;
    let owner = harness.create_user(42);

    let attempt = harness.coordinator.begin(owner).expect("begin");
    let state = state_param(&attempt.authorize_url);
    assert_eq!(state, attempt.token);

    let (status, body) = harness
        .redirect(&format!("code=abc&state={state}"))
        .await;
    assert_eq!(status, 200);
    assert!(body.contains("успешно"));

    let redirect = harness.coordinator.await_completion(attempt).await;
    assert_eq!(redirect, AwaitedRedirect::Code("abc".to_string()));

    let outcome = harness
        .coordinator
        .complete(owner, redirect)
        .await
        .expect("complete");
    let credential = match outcome {
        AuthFlowOutcome::Succeeded(credential) => credential,
        other => panic!("expected success, got {other:?}"),
    };
    assert_eq!(credential.access_token, "stub-access-token");

    let stored = harness.stored_credential(owner).expect("stored");
    assert_eq!(stored.access_token, "stub-access-token");
    assert_eq!(stored.refresh_token.as_deref(), Some("stub-refresh-token"));
    assert!(stored.expires_at.is_some());

    // The attempt was claimed: its token is gone from the registry.
    assert!(harness.registry.is_empty());
    harness.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn no_redirect_times_out_within_a_unit_and_clears_registry() {
    let timeout = Duration::from_millis(600);
    let harness = AuthHarness::start(timeout, 200).await;
    let owner = harness.create_user(7);

    let attempt = harness.coordinator.begin(owner).expect("begin");
    let token = attempt.token.clone();

    let started = Instant::now();
    let redirect = harness.coordinator.await_completion(attempt).await;
    let elapsed = started.elapsed();

    assert_eq!(redirect, AwaitedRedirect::TimedOut);
    assert!(elapsed >= timeout, "returned before the timeout: {elapsed:?}");
    assert!(
        elapsed < timeout * 3,
        "returned far too late: {elapsed:?}"
    );
    assert!(!harness.registry.contains(&token));

    let outcome = harness
        .coordinator
        .complete(owner, redirect)
        .await
        .expect("complete");
    assert!(matches!(outcome, AuthFlowOutcome::TimedOut));
    assert!(harness.stored_credential(owner).is_none());
    harness.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn provider_denial_is_reported_with_its_reason() {
    let harness = AuthHarness::start(Duration::from_secs(30), 200).await;
    let owner = harness.create_user(9);

    let attempt = harness.coordinator.begin(owner).expect("begin");
    let state = state_param(&attempt.authorize_url);

    let (status, _body) = harness
        .redirect(&format!("error=access_denied&state={state}"))
        .await;
    assert_eq!(status, 200);

    let redirect = harness.coordinator.await_completion(attempt).await;
    assert_eq!(
        redirect,
        AwaitedRedirect::ProviderError("access_denied".to_string())
    );

    let outcome = harness
        .coordinator
        .complete(owner, redirect)
        .await
        .expect("complete");
    match outcome {
        AuthFlowOutcome::ProviderDenied(reason) => assert_eq!(reason, "access_denied"),
        other => panic!("expected denial, got {other:?}"),
    }
    assert!(harness.stored_credential(owner).is_none());
    harness.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_state_gets_generic_error_and_registry_is_untouched() {
    let harness = AuthHarness::start(Duration::from_secs(30), 200).await;
    let owner = harness.create_user(11);

    let attempt = harness.coordinator.begin(owner).expect("begin");
    let live_token = attempt.token.clone();
    assert_eq!(harness.registry.len(), 1);

    let (status, body) = harness
        .redirect("code=abc&state=never-issued-token")
        .await;
    assert_eq!(status, 400);
    assert!(body.contains("недействительна"));

    // Size and contents identical: the live attempt is still pending.
    assert_eq!(harness.registry.len(), 1);
    assert!(harness.registry.contains(&live_token));
    harness.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_redirect_matches_unknown_state_response() {
    let harness = AuthHarness::start(Duration::from_secs(30), 200).await;
    let owner = harness.create_user(12);

    let attempt = harness.coordinator.begin(owner).expect("begin");
    let state = state_param(&attempt.authorize_url);

    let (first_status, _) = harness.redirect(&format!("code=abc&state={state}")).await;
    assert_eq!(first_status, 200);

    let (dup_status, dup_body) = harness
        .redirect(&format!("code=other&state={state}"))
        .await;
    let (unknown_status, unknown_body) = harness
        .redirect("code=other&state=never-issued-token")
        .await;

    // A replayed token and a never-issued token are indistinguishable.
    assert_eq!(dup_status, 400);
    assert_eq!(dup_status, unknown_status);
    assert_eq!(dup_body, unknown_body);

    // The first delivery still wins.
    let redirect = harness.coordinator.await_completion(attempt).await;
    assert_eq!(redirect, AwaitedRedirect::Code("abc".to_string()));
    harness.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn redirect_without_parameters_is_a_bad_request() {
    let harness = AuthHarness::start(Duration::from_secs(30), 200).await;
    let owner = harness.create_user(13);
    let _attempt = harness.coordinator.begin(owner).expect("begin");

    let (status, _body) = harness.redirect("").await;
    assert_eq!(status, 400);

    // State present but neither code nor error: still a bad request.
    let (status, _body) = harness.redirect("state=whatever").await;
    assert_eq!(status, 400);

    assert_eq!(harness.registry.len(), 1);
    harness.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_attempts_do_not_interfere() {
    let harness = AuthHarness::start(Duration::from_secs(30), 200).await;
    let owner_a = harness.create_user(21);
    let owner_b = harness.create_user(22);

    let attempt_a = harness.coordinator.begin(owner_a).expect("begin a");
    let attempt_b = harness.coordinator.begin(owner_b).expect("begin b");
    assert_ne!(attempt_a.token, attempt_b.token);

    let state_a = state_param(&attempt_a.authorize_url);
    let (status, _) = harness
        .redirect(&format!("code=code-a&state={state_a}"))
        .await;
    assert_eq!(status, 200);

    let redirect_a = harness.coordinator.await_completion(attempt_a).await;
    assert_eq!(redirect_a, AwaitedRedirect::Code("code-a".to_string()));

    // The second attempt is still waiting, untouched.
    assert!(harness.registry.contains(&attempt_b.token));

    let state_b = state_param(&attempt_b.authorize_url);
    let (status, _) = harness
        .redirect(&format!("code=code-b&state={state_b}"))
        .await;
    assert_eq!(status, 200);
    let redirect_b = harness.coordinator.await_completion(attempt_b).await;
    assert_eq!(redirect_b, AwaitedRedirect::Code("code-b".to_string()));
    harness.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_exchange_surfaces_as_exchange_failed() {
    let harness = AuthHarness::start(Duration::from_secs(30), 400).await;
    let owner = harness.create_user(33);

    let attempt = harness.coordinator.begin(owner).expect("begin");
    let state = state_param(&attempt.authorize_url);
    harness.redirect(&format!("code=abc&state={state}")).await;

    let redirect = harness.coordinator.await_completion(attempt).await;
    let outcome = harness
        .coordinator
        .complete(owner, redirect)
        .await
        .expect("complete");

    match outcome {
        AuthFlowOutcome::ExchangeFailed(detail) => {
            assert!(detail.contains("invalid_grant"));
        }
        other => panic!("expected exchange failure, got {other:?}"),
    }
    // Codes are single-use: nothing was stored and the attempt is gone.
    assert!(harness.stored_credential(owner).is_none());
    assert!(harness.registry.is_empty());
    harness.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn late_redirect_after_timeout_is_a_noop() {
    let harness = AuthHarness::start(Duration::from_millis(300), 200).await;
    let owner = harness.create_user(55);

    let attempt = harness.coordinator.begin(owner).expect("begin");
    let state = state_param(&attempt.authorize_url);

    let redirect = harness.coordinator.await_completion(attempt).await;
    assert_eq!(redirect, AwaitedRedirect::TimedOut);

    // The provider redirects long after the attempt expired and was claimed.
    let (status, body) = harness.redirect(&format!("code=late&state={state}")).await;
    assert_eq!(status, 400);
    assert!(body.contains("недействительна"));
    harness.shutdown().await;
}
