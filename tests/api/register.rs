use crate::helpers::{assert_detail, spawn_app};

use std::time::Duration;

use wiremock::{
    matchers::{method, path},
    Mock, ResponseTemplate,
};

#[tokio::test]
async fn register_returns_201_for_a_new_email() {
    let app = spawn_app().await;
    app.mock_email_api(200, 1).await;

    let response = app
        .post_register(&serde_json::json!({"email": "user@example.com"}))
        .await;

    assert_eq!(201, response.status().as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Email registered successfully.");
}

#[tokio::test]
async fn register_persists_exactly_one_subscriber() {
    let app = spawn_app().await;
    app.mock_email_api(200, 1).await;

    app.post_register(&serde_json::json!({"email": "user@example.com"}))
        .await;

    assert_eq!(app.stored_emails().await, vec!["user@example.com"]);
}

#[tokio::test]
async fn register_sends_a_notification_to_the_new_subscriber() {
    let app = spawn_app().await;
    app.mock_email_api(200, 1).await;

    app.post_register(&serde_json::json!({"email": "user@example.com"}))
        .await;

    let email_request = &app.email_server.received_requests().await.unwrap()[0];
    let body: serde_json::Value = serde_json::from_slice(&email_request.body).unwrap();
    assert_eq!(body["To"], "user@example.com");
}

#[tokio::test]
async fn registering_twice_returns_409_without_a_second_email() {
    let app = spawn_app().await;
    // The mock server fails the test on drop unless exactly one email went out
    app.mock_email_api(200, 1).await;
    let body = serde_json::json!({"email": "user@example.com"});

    let first = app.post_register(&body).await;
    let second = app.post_register(&body).await;

    assert_eq!(201, first.status().as_u16());
    assert_eq!(409, second.status().as_u16());
    let detail: serde_json::Value = second.json().await.unwrap();
    assert_detail(&detail, "Email already registered.");
    assert_eq!(app.stored_emails().await.len(), 1);
}

#[tokio::test]
async fn duplicate_detection_ignores_case() {
    let app = spawn_app().await;
    app.mock_email_api(200, 1).await;

    app.post_register(&serde_json::json!({"email": "user@example.com"}))
        .await;
    let response = app
        .post_register(&serde_json::json!({"email": "User@EXAMPLE.com"}))
        .await;

    assert_eq!(409, response.status().as_u16());
    assert_eq!(app.stored_emails().await, vec!["user@example.com"]);
}

#[tokio::test]
async fn register_returns_404_when_email_is_missing() {
    let app = spawn_app().await;
    app.mock_email_api(200, 0).await;

    let test_cases = vec![
        (serde_json::json!({}), "empty object"),
        (serde_json::json!({"name": "Ursula"}), "unrelated field"),
        (serde_json::json!({"email": null}), "null email"),
    ];

    for (body, description) in test_cases {
        let response = app.post_register(&body).await;

        assert_eq!(
            404,
            response.status().as_u16(),
            "The API did not return 404 when the payload was an {}",
            description
        );
        let detail: serde_json::Value = response.json().await.unwrap();
        assert_detail(&detail, "Email field expected.");
    }
    assert!(app.stored_emails().await.is_empty());
}

#[tokio::test]
async fn register_returns_406_for_malformed_email() {
    let app = spawn_app().await;
    app.mock_email_api(200, 0).await;

    let test_cases = vec![
        (serde_json::json!({"email": "not-an-email"}), "plain word"),
        (serde_json::json!({"email": ""}), "empty string"),
        (serde_json::json!({"email": "@example.com"}), "missing local part"),
        (serde_json::json!({"email": "user@"}), "missing domain"),
        (serde_json::json!({"email": 42}), "number"),
    ];

    for (body, description) in test_cases {
        let response = app.post_register(&body).await;

        assert_eq!(
            406,
            response.status().as_u16(),
            "The API did not return 406 when the email was a {}",
            description
        );
        let detail: serde_json::Value = response.json().await.unwrap();
        assert_detail(&detail, "Email format is not valid.");
    }
    assert!(app.stored_emails().await.is_empty());
}

#[tokio::test]
async fn register_returns_422_for_a_body_that_is_not_json() {
    let app = spawn_app().await;

    let response = app.post_register_raw("email=user%40example.com").await;

    assert_eq!(422, response.status().as_u16());
    let detail: serde_json::Value = response.json().await.unwrap();
    assert_detail(&detail, "Request body is not valid JSON.");
}

#[tokio::test]
async fn register_returns_422_for_json_that_is_not_an_object() {
    let app = spawn_app().await;
    app.mock_email_api(200, 0).await;

    let test_cases = vec![
        (serde_json::json!([]), "empty array"),
        (serde_json::json!(["user@example.com"]), "array"),
        (serde_json::json!("user@example.com"), "bare string"),
    ];

    for (body, description) in test_cases {
        let response = app.post_register(&body).await;

        assert_eq!(
            422,
            response.status().as_u16(),
            "The API did not return 422 when the payload was an {}",
            description
        );
        let detail: serde_json::Value = response.json().await.unwrap();
        assert_detail(&detail, "Request body must be a JSON object.");
    }
    assert!(app.stored_emails().await.is_empty());
}

#[tokio::test]
async fn concurrent_registrations_of_one_email_store_a_single_row() {
    let app = spawn_app().await;
    // Holding the first request inside the notification keeps its insert
    // uncommitted while the second one reaches the store.
    Mock::given(path("/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .expect(1)
        .mount(&app.email_server)
        .await;

    let lower = serde_json::json!({"email": "race@example.com"});
    let upper = serde_json::json!({"email": "RACE@example.com"});
    let (first, second) = tokio::join!(app.post_register(&lower), app.post_register(&upper));

    let mut statuses = vec![first.status().as_u16(), second.status().as_u16()];
    statuses.sort_unstable();
    assert_eq!(statuses, vec![201, 409]);
    assert_eq!(app.stored_emails().await.len(), 1);
    assert_eq!(app.email_server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn failed_notification_returns_500_and_stores_nothing() {
    let app = spawn_app().await;
    app.mock_email_api(500, 1).await;

    let response = app
        .post_register(&serde_json::json!({"email": "user@example.com"}))
        .await;

    assert_eq!(500, response.status().as_u16());
    let detail: serde_json::Value = response.json().await.unwrap();
    assert_detail(&detail, "Internal server error.");
    assert!(app.stored_emails().await.is_empty());
}

#[tokio::test]
async fn email_can_be_registered_after_a_failed_notification() {
    let app = spawn_app().await;
    let body = serde_json::json!({"email": "user@example.com"});

    app.mock_email_api(500, 1).await;
    let failed = app.post_register(&body).await;
    assert_eq!(500, failed.status().as_u16());

    app.email_server.reset().await;
    app.mock_email_api(200, 1).await;
    let retried = app.post_register(&body).await;

    assert_eq!(201, retried.status().as_u16());
    assert_eq!(app.stored_emails().await, vec!["user@example.com"]);
}
