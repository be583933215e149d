use reqwest::StatusCode;

use wiremock::matchers::*;
use wiremock::{Mock, ResponseTemplate};

use ceramic_affair::domain::{Subscriber, TokenPolicy};
use ceramic_affair::repo::SubscriberStore;

use crate::helpers::{Newsletter, TestApp};

fn newsletter() -> Newsletter {
    Newsletter {
        subject: Some("Spring glazes".into()),
        content: Some("<p>New celadon bowls are in the shop.</p>".into()),
    }
}

async fn add_subscriber(app: &TestApp, email: &str, verified: bool) {
    let subscriber = Subscriber::new(
        email.parse().expect("Failed to parse email"),
        &TokenPolicy::default(),
        chrono::Utc::now(),
    );
    let subscriber = if verified {
        subscriber.into_verified().unwrap()
    } else {
        subscriber
    };
    SubscriberStore::insert(&*app.store, &subscriber)
        .await
        .expect("Failed to insert subscriber");
}

#[tokio::test]
async fn newsletters_are_delivered_to_verified_subscribers_only() {
    let app = TestApp::spawn().await;
    add_subscriber(&app, "verified@x.com", true).await;
    add_subscriber(&app, "pending@x.com", false).await;

    Mock::given(path("/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&app.email_server)
        .await;

    let token = app.admin_token().await;
    let res = app
        .publish_newsletter(Some(&token), &newsletter())
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::OK, res.status());
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(1, body["data"]["delivered"]);
    assert_eq!(0, body["data"]["failed"]);

    let emails = app.sent_emails().await;
    assert_eq!("verified@x.com", emails[0]["To"]);
    assert_eq!("Spring glazes", emails[0]["Subject"]);
    assert_eq!(1, app.store.newsletters().len());
}

#[tokio::test]
async fn newsletter_footer_unsubscribes_the_recipient() {
    let app = TestApp::spawn().await;
    add_subscriber(&app, "verified@x.com", true).await;
    app.email_accepts().await;

    let token = app.admin_token().await;
    app.publish_newsletter(Some(&token), &newsletter())
        .await
        .expect("Failed to execute request");

    let emails = app.sent_emails().await;
    let links = app.email_links(&emails[0]);
    assert_eq!(links.html, links.plain_text);
    assert_eq!("/subscriptions/unsubscribe", links.html.path());

    let res = app
        .unsubscribe(&links.token())
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::OK, res.status());
    assert!(app.store.subscribers().is_empty());
}

#[tokio::test]
async fn failed_deliveries_are_reported() {
    let app = TestApp::spawn().await;
    add_subscriber(&app, "verified@x.com", true).await;

    Mock::given(path("/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&app.email_server)
        .await;

    let token = app.admin_token().await;
    let res = app
        .publish_newsletter(Some(&token), &newsletter())
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::OK, res.status());
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(0, body["data"]["delivered"]);
    assert_eq!(1, body["data"]["failed"]);
}

#[tokio::test]
async fn newsletters_returns_bad_request_for_invalid_data() {
    let app = TestApp::spawn().await;
    let token = app.admin_token().await;

    let test_cases = vec![
        (
            "missing subject",
            Newsletter {
                subject: None,
                content: Some("content".into()),
            },
        ),
        (
            "missing content",
            Newsletter {
                subject: Some("subject".into()),
                content: None,
            },
        ),
        (
            "blank subject",
            Newsletter {
                subject: Some(" ".into()),
                content: Some("content".into()),
            },
        ),
    ];

    for (desc, newsletter) in test_cases {
        let res = app
            .publish_newsletter(Some(&token), &newsletter)
            .await
            .expect("Failed to execute request");

        assert_eq!(
            StatusCode::BAD_REQUEST,
            res.status(),
            "API did not fail with 400 when payload was {}",
            desc
        );
    }
    assert!(app.store.newsletters().is_empty());
}

#[tokio::test]
async fn requests_without_a_token_are_rejected() {
    let app = TestApp::spawn().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.email_server)
        .await;

    let res = app
        .publish_newsletter(None, &newsletter())
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::UNAUTHORIZED, res.status());
}

#[tokio::test]
async fn requests_with_a_forged_token_are_rejected() {
    let app = TestApp::spawn().await;
    let token = app.admin_token().await;
    let (payload, _) = token.split_once('.').unwrap();
    let forged = format!("{}.{}", payload, "c2lnbmF0dXJl");

    let res = app
        .publish_newsletter(Some(&forged), &newsletter())
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::UNAUTHORIZED, res.status());
    assert!(app.store.newsletters().is_empty());
}

#[tokio::test]
async fn template_is_blank_until_an_admin_saves_it() {
    let app = TestApp::spawn().await;
    let token = app.admin_token().await;

    let res = app
        .get_template(Some(&token))
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::OK, res.status());
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!("", body["data"]["subject"]);
    assert_eq!("", body["data"]["content"]);
}

#[tokio::test]
async fn saved_template_replaces_the_previous_one() {
    let app = TestApp::spawn().await;
    let token = app.admin_token().await;

    for subject in ["First draft", "Autumn firing"] {
        let res = app
            .put_template(
                Some(&token),
                &Newsletter {
                    subject: Some(subject.into()),
                    content: Some("<p>Stoneware is back</p>".into()),
                },
            )
            .await
            .expect("Failed to execute request");
        assert_eq!(StatusCode::OK, res.status());
    }

    let body: serde_json::Value = app
        .get_template(Some(&token))
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();
    assert_eq!("Autumn firing", body["data"]["subject"]);
    assert_eq!("<p>Stoneware is back</p>", body["data"]["content"]);
}

#[tokio::test]
async fn blank_template_is_rejected() {
    let app = TestApp::spawn().await;
    let token = app.admin_token().await;

    let res = app
        .put_template(
            Some(&token),
            &Newsletter {
                subject: Some("Subject".into()),
                content: Some("   ".into()),
            },
        )
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::BAD_REQUEST, res.status());
}

#[tokio::test]
async fn template_requires_an_admin_session() {
    let app = TestApp::spawn().await;

    let res = app
        .get_template(None)
        .await
        .expect("Failed to execute request");
    assert_eq!(StatusCode::UNAUTHORIZED, res.status());

    let res = app
        .put_template(None, &newsletter())
        .await
        .expect("Failed to execute request");
    assert_eq!(StatusCode::UNAUTHORIZED, res.status());
}
