mod common;

use std::sync::Arc;

use chrono::NaiveDate;
use common::{build_fake_state, build_state, credentials, pair_body, wait_until, FakeBackend, Hold};
use futures::future::join_all;
use mockito::{Matcher, Mock, Server, ServerGuard};
use sessiongate::models::InterestForm;
use sessiongate::session::{GateDecision, ProfileSetup};

const CHECK_PATH: &str = "/interest-form/check-first-login";

async fn mock_login(server: &mut ServerGuard) -> Mock {
    server
        .mock("POST", "/auth/login")
        .with_status(200)
        .with_body(pair_body("A0", "R0"))
        .create_async()
        .await
}

fn setup_form() -> InterestForm {
    InterestForm {
        name: "Ada".to_string(),
        surname: "Lovelace".to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(1990, 12, 10).unwrap(),
        height: 170,
        weight: 60.5,
        gender: Some("female".to_string()),
        profile_photo: None,
    }
}

#[tokio::test]
async fn test_unauthenticated_session_is_sent_to_sign_in_without_query() {
    let mut server = Server::new_async().await;
    let check = server.mock("GET", CHECK_PATH).expect(0).create_async().await;

    let (state, _) = build_state(server.url());

    assert_eq!(state.gate.decide().await, GateDecision::SignIn);
    assert_eq!(state.gate.setup_status(), ProfileSetup::Unknown);
    check.assert_async().await;
}

#[tokio::test]
async fn test_completed_setup_is_queried_once_per_session() {
    let mut server = Server::new_async().await;
    let _login = mock_login(&mut server).await;
    let check = server
        .mock("GET", CHECK_PATH)
        .match_header("authorization", "Bearer A0")
        .with_status(200)
        .with_body("true")
        .expect(1)
        .create_async()
        .await;

    let (state, _) = build_state(server.url());
    state.session.login(&credentials()).await.unwrap();

    assert_eq!(state.gate.decide().await, GateDecision::Allow);
    assert_eq!(state.gate.decide().await, GateDecision::Allow);
    assert_eq!(state.gate.setup_status(), ProfileSetup::Complete);
    check.assert_async().await;
}

#[tokio::test]
async fn test_missing_form_routes_to_setup() {
    let mut server = Server::new_async().await;
    let _login = mock_login(&mut server).await;
    let _check = server
        .mock("GET", CHECK_PATH)
        .with_status(404)
        .create_async()
        .await;

    let (state, _) = build_state(server.url());
    state.session.login(&credentials()).await.unwrap();

    assert_eq!(state.gate.decide().await, GateDecision::Setup);
    assert_eq!(state.gate.setup_status(), ProfileSetup::Incomplete);
}

#[tokio::test]
async fn test_failing_check_fails_open() {
    let mut server = Server::new_async().await;
    let _login = mock_login(&mut server).await;
    let check = server
        .mock("GET", CHECK_PATH)
        .with_status(500)
        .with_body("database unavailable")
        .expect(1)
        .create_async()
        .await;

    let (state, _) = build_state(server.url());
    state.session.login(&credentials()).await.unwrap();

    assert_eq!(state.gate.decide().await, GateDecision::Allow);
    assert_eq!(state.gate.decide().await, GateDecision::Allow);
    check.assert_async().await;
}

#[tokio::test]
async fn test_submitted_setup_allows_access_without_requery() {
    let mut server = Server::new_async().await;
    let _login = mock_login(&mut server).await;
    let check = server
        .mock("GET", CHECK_PATH)
        .with_status(200)
        .with_body("false")
        .expect(1)
        .create_async()
        .await;
    let submit = server
        .mock("POST", "/interest-form/submit")
        .match_header("authorization", "Bearer A0")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "name": "Ada",
            "dateOfBirth": "1990-12-10",
            "gender": "female"
        })))
        .with_status(200)
        .with_body(r#"{"id": 7}"#)
        .expect(1)
        .create_async()
        .await;

    let (state, _) = build_state(server.url());
    state.session.login(&credentials()).await.unwrap();

    assert_eq!(state.gate.decide().await, GateDecision::Setup);
    state.gate.submit_setup(&setup_form()).await.unwrap();
    assert_eq!(state.gate.decide().await, GateDecision::Allow);

    check.assert_async().await;
    submit.assert_async().await;
}

#[tokio::test]
async fn test_failed_submit_keeps_setup_pending() {
    let mut server = Server::new_async().await;
    let _login = mock_login(&mut server).await;
    let _check = server
        .mock("GET", CHECK_PATH)
        .with_status(200)
        .with_body("false")
        .create_async()
        .await;
    let _submit = server
        .mock("POST", "/interest-form/submit")
        .with_status(400)
        .with_body("height must be positive")
        .create_async()
        .await;

    let (state, _) = build_state(server.url());
    state.session.login(&credentials()).await.unwrap();

    assert_eq!(state.gate.decide().await, GateDecision::Setup);
    let err = state.gate.submit_setup(&setup_form()).await.unwrap_err();
    assert_eq!(err.status(), Some(http::StatusCode::BAD_REQUEST));
    assert_eq!(state.gate.decide().await, GateDecision::Setup);
}

#[tokio::test]
async fn test_new_session_queries_again() {
    let mut server = Server::new_async().await;
    let _login = mock_login(&mut server).await;
    let check = server
        .mock("GET", CHECK_PATH)
        .with_status(200)
        .with_body("true")
        .expect(2)
        .create_async()
        .await;

    let (state, _) = build_state(server.url());

    state.session.login(&credentials()).await.unwrap();
    assert_eq!(state.gate.decide().await, GateDecision::Allow);

    state.session.logout().await.unwrap();
    assert_eq!(state.gate.decide().await, GateDecision::SignIn);

    state.session.login(&credentials()).await.unwrap();
    assert_eq!(state.gate.setup_status(), ProfileSetup::Unknown);
    assert_eq!(state.gate.decide().await, GateDecision::Allow);

    check.assert_async().await;
}

#[tokio::test]
async fn test_expired_session_during_check_routes_to_sign_in() {
    let mut server = Server::new_async().await;
    let _login = mock_login(&mut server).await;
    let _check = server
        .mock("GET", CHECK_PATH)
        .with_status(401)
        .create_async()
        .await;
    let _refresh = server
        .mock("POST", "/auth/refresh-token")
        .with_status(403)
        .create_async()
        .await;

    let (state, _) = build_state(server.url());
    state.session.login(&credentials()).await.unwrap();

    assert_eq!(state.gate.decide().await, GateDecision::SignIn);
    assert!(!state.session.is_authenticated());
}

#[tokio::test]
async fn test_setup_status_reports_checking_while_query_runs() {
    let backend = Arc::new(FakeBackend::holding(Hold::Resources));
    let (state, _) = build_fake_state(backend.clone());
    state.session.login(&credentials()).await.unwrap();

    let gate = state.gate.clone();
    let first = tokio::spawn(async move { gate.decide().await });
    wait_until(|| {
        let gate = state.gate.clone();
        async move { gate.setup_status() == ProfileSetup::Checking }
    })
    .await;

    // A second caller shares the pending answer instead of querying again.
    let gate = state.gate.clone();
    let second = tokio::spawn(async move { gate.decide().await });
    assert_eq!(state.gate.setup_status(), ProfileSetup::Checking);

    backend.release();
    assert_eq!(first.await.unwrap(), GateDecision::Allow);
    assert_eq!(second.await.unwrap(), GateDecision::Allow);
    assert_eq!(state.gate.setup_status(), ProfileSetup::Complete);
    assert_eq!(backend.resource_requests(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_settled_setup_is_never_reported_as_checking() {
    let backend = Arc::new(FakeBackend::new());
    let (state, _) = build_fake_state(backend.clone());
    state.session.login(&credentials()).await.unwrap();
    assert_eq!(state.gate.decide().await, GateDecision::Allow);

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let gate = state.gate.clone();
            tokio::spawn(async move {
                for _ in 0..50 {
                    assert_eq!(gate.decide().await, GateDecision::Allow);
                    assert_eq!(gate.setup_status(), ProfileSetup::Complete);
                }
            })
        })
        .collect();
    for _ in 0..500 {
        assert_eq!(state.gate.setup_status(), ProfileSetup::Complete);
        tokio::task::yield_now().await;
    }

    for result in join_all(handles).await {
        result.unwrap();
    }
    assert_eq!(backend.resource_requests(), 1);
}
