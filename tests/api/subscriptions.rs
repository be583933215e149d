use chrono::Duration;

use reqwest::{header, StatusCode};

use wiremock::matchers::*;
use wiremock::{Mock, ResponseTemplate};

use crate::helpers::{NewSubscriber, TestApp, FRONTEND_URL};

/// Subscribe and return the token from the verification email
async fn subscribe_and_get_token(app: &TestApp, email: &str) -> String {
    let res = app
        .subscribe(&NewSubscriber::new(email))
        .await
        .expect("Failed to execute request");
    assert_eq!(StatusCode::OK, res.status());

    let emails = app.sent_emails().await;
    app.email_links(emails.last().expect("No email was sent")).token()
}

#[tokio::test]
async fn subscribe_creates_a_pending_subscriber_and_sends_one_email() {
    let app = TestApp::spawn().await;
    app.recaptcha_passes().await;

    Mock::given(path("/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&app.email_server)
        .await;

    let res = app
        .subscribe(&NewSubscriber::new("a@x.com"))
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::OK, res.status());
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(true, body["success"]);
    assert_eq!("a@x.com", body["data"]);

    let subscribers = app.store.subscribers();
    assert_eq!(1, subscribers.len());
    assert_eq!("a@x.com", subscribers[0].email.as_ref());
    assert!(!subscribers[0].is_verified());
}

#[tokio::test]
async fn verification_email_links_match() {
    let app = TestApp::spawn().await;
    app.recaptcha_passes().await;
    app.email_accepts().await;

    app.subscribe(&NewSubscriber::new("a@x.com"))
        .await
        .expect("Failed to execute request");

    let emails = app.sent_emails().await;
    assert_eq!("Subscription Verification", emails[0]["Subject"]);
    assert_eq!("a@x.com", emails[0]["To"]);

    let links = app.email_links(&emails[0]);
    assert_eq!(links.html, links.plain_text);
    assert_eq!("/subscriptions/verify", links.html.path());
}

#[tokio::test]
async fn subscribe_returns_bad_request_for_invalid_data() {
    let app = TestApp::spawn().await;
    app.recaptcha_passes().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.email_server)
        .await;

    let test_cases: Vec<(&str, NewSubscriber)> = vec![
        (
            "missing email",
            NewSubscriber {
                email: None,
                recaptcha_token: Some("token".into()),
            },
        ),
        (
            "missing reCAPTCHA token",
            NewSubscriber {
                email: Some("a@x.com".into()),
                recaptcha_token: None,
            },
        ),
        (
            "blank reCAPTCHA token",
            NewSubscriber {
                email: Some("a@x.com".into()),
                recaptcha_token: Some("   ".into()),
            },
        ),
        (
            "blank email",
            NewSubscriber {
                email: Some("  ".into()),
                recaptcha_token: Some("token".into()),
            },
        ),
        (
            "malformed email",
            NewSubscriber {
                email: Some("bad email address".into()),
                recaptcha_token: Some("token".into()),
            },
        ),
    ];

    for (desc, new_subscriber) in test_cases {
        let res = app
            .subscribe(&new_subscriber)
            .await
            .expect("Failed to execute request");

        assert_eq!(
            StatusCode::BAD_REQUEST,
            res.status(),
            "API did not fail with 400 when payload was {}",
            desc
        );
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(400, body["status"], "Error body was not JSON for {}", desc);
    }
    assert!(app.store.subscribers().is_empty());
}

#[tokio::test]
async fn failed_recaptcha_is_rejected_without_side_effects() {
    let app = TestApp::spawn().await;
    app.recaptcha_fails().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.email_server)
        .await;

    let res = app
        .subscribe(&NewSubscriber::new("a@x.com"))
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::BAD_REQUEST, res.status());
    assert!(app.store.subscribers().is_empty());
}

#[tokio::test]
async fn unreachable_recaptcha_is_an_internal_error() {
    let app = TestApp::spawn().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(503))
        .mount(&app.recaptcha_server)
        .await;

    let res = app
        .subscribe(&NewSubscriber::new("a@x.com"))
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, res.status());
    assert!(app.store.subscribers().is_empty());
}

#[tokio::test]
async fn second_subscribe_within_the_window_sends_nothing() {
    let app = TestApp::spawn().await;
    app.recaptcha_passes().await;
    app.email_accepts().await;
    subscribe_and_get_token(&app, "a@x.com").await;

    let res = app
        .subscribe(&NewSubscriber::new("a@x.com"))
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::BAD_REQUEST, res.status());
    assert_eq!(1, app.sent_emails().await.len());
}

#[tokio::test]
async fn subscribe_after_expiry_resends_with_a_new_token() {
    let app = TestApp::spawn().await;
    app.recaptcha_passes().await;
    app.email_accepts().await;
    let first_token = subscribe_and_get_token(&app, "a@x.com").await;

    app.clock.advance(Duration::hours(25));
    let res = app
        .subscribe(&NewSubscriber::new("a@x.com"))
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::OK, res.status());
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!("Verification email has been resent", body["message"]);

    let emails = app.sent_emails().await;
    assert_eq!(2, emails.len());
    let second_token = app.email_links(&emails[1]).token();
    assert_ne!(first_token, second_token);

    // The replaced token is no longer redeemable
    let res = app.verify(&first_token).await.expect("Failed to execute request");
    assert_eq!(StatusCode::NOT_FOUND, res.status());

    // The fresh one is
    let res = app.verify(&second_token).await.expect("Failed to execute request");
    assert_eq!(StatusCode::OK, res.status());
    let subscribers = app.store.subscribers();
    assert!(subscribers[0].is_verified());
    assert!(subscribers[0].unsubscribe_token().is_some());
}

#[tokio::test]
async fn verify_with_an_expired_token_is_gone() {
    let app = TestApp::spawn().await;
    app.recaptcha_passes().await;
    app.email_accepts().await;
    let token = subscribe_and_get_token(&app, "a@x.com").await;

    app.clock.advance(Duration::hours(25));
    let res = app.verify(&token).await.expect("Failed to execute request");

    assert_eq!(StatusCode::GONE, res.status());
    assert!(!app.store.subscribers()[0].is_verified());
}

#[tokio::test]
async fn verify_with_an_unknown_token_is_not_found() {
    let app = TestApp::spawn().await;

    let res = app.verify("no-such-token").await.expect("Failed to execute request");

    assert_eq!(StatusCode::NOT_FOUND, res.status());
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!("Not Found", body["error"]);
}

#[tokio::test]
async fn verify_without_a_token_is_a_bad_request() {
    let app = TestApp::spawn().await;

    let res = app
        .request(reqwest::Method::GET, "subscriptions/verify")
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::BAD_REQUEST, res.status());
}

#[tokio::test]
async fn verified_subscriber_cannot_subscribe_again() {
    let app = TestApp::spawn().await;
    app.recaptcha_passes().await;
    app.email_accepts().await;
    let token = subscribe_and_get_token(&app, "a@x.com").await;
    app.verify(&token).await.expect("Failed to execute request");

    let res = app
        .subscribe(&NewSubscriber::new("A@X.com"))
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::CONFLICT, res.status());
    assert_eq!(1, app.sent_emails().await.len());
}

#[tokio::test]
async fn unsubscribe_deletes_the_subscriber_once() {
    let app = TestApp::spawn().await;
    app.recaptcha_passes().await;
    app.email_accepts().await;
    let token = subscribe_and_get_token(&app, "a@x.com").await;
    app.verify(&token).await.expect("Failed to execute request");

    let unsubscribe_token = app.store.subscribers()[0]
        .unsubscribe_token()
        .expect("Verified subscriber has no unsubscribe token")
        .to_string();

    let res = app
        .unsubscribe(&unsubscribe_token)
        .await
        .expect("Failed to execute request");
    assert_eq!(StatusCode::OK, res.status());
    assert!(app.store.subscribers().is_empty());

    let res = app
        .unsubscribe(&unsubscribe_token)
        .await
        .expect("Failed to execute request");
    assert_eq!(StatusCode::NOT_FOUND, res.status());
}

#[tokio::test]
async fn subscriber_is_kept_if_email_send_fails() {
    let app = TestApp::spawn().await;
    app.recaptcha_passes().await;

    Mock::given(path("/email"))
        .and(method("POST"))
        // Ensure that send-email fails
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&app.email_server)
        .await;

    let res = app
        .subscribe(&NewSubscriber::new("a@x.com"))
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, res.status());
    assert_eq!(1, app.store.subscribers().len());
}

#[tokio::test]
async fn link_requests_redirect_to_the_frontend_when_configured() {
    let app = TestApp::spawn_redirecting().await;
    app.recaptcha_passes().await;
    app.email_accepts().await;
    let token = subscribe_and_get_token(&app, "a@x.com").await;

    let location = |res: &reqwest::Response| {
        res.headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };

    let res = app.verify(&token).await.expect("Failed to execute request");
    assert_eq!(StatusCode::FOUND, res.status());
    assert_eq!(
        Some(format!("{}/confirmation?status=subscribed", FRONTEND_URL)),
        location(&res)
    );

    let res = app.verify(&token).await.expect("Failed to execute request");
    assert_eq!(
        Some(format!("{}/confirmation?status=not_found", FRONTEND_URL)),
        location(&res)
    );

    let unsubscribe_token = app.store.subscribers()[0]
        .unsubscribe_token()
        .unwrap()
        .to_string();
    let res = app
        .unsubscribe(&unsubscribe_token)
        .await
        .expect("Failed to execute request");
    assert_eq!(
        Some(format!("{}/confirmation?status=unsubscribed", FRONTEND_URL)),
        location(&res)
    );
}

#[tokio::test]
async fn expired_link_redirects_with_expired_status() {
    let app = TestApp::spawn_redirecting().await;
    app.recaptcha_passes().await;
    app.email_accepts().await;
    let token = subscribe_and_get_token(&app, "a@x.com").await;

    app.clock.advance(Duration::hours(25));
    let res = app.verify(&token).await.expect("Failed to execute request");

    assert_eq!(StatusCode::FOUND, res.status());
    assert_eq!(
        format!("{}/confirmation?status=expired", FRONTEND_URL),
        res.headers()[header::LOCATION].to_str().unwrap()
    );
}
