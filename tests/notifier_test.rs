//! Webhook notifier integration tests

mod common;

use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use orthowatch::artifacts::Attachment;
use orthowatch::config::NotifierConfig;
use orthowatch::error::OrthowatchError;
use orthowatch::notify::{NotificationPayload, Notifier, WebhookNotifier};

fn notifier(server: &MockServer) -> WebhookNotifier {
    WebhookNotifier::new(&common::notifier_config(&format!("{}/hook", server.uri()))).unwrap()
}

fn body_text(request: &wiremock::Request) -> String {
    String::from_utf8_lossy(&request.body).into_owned()
}

#[tokio::test]
async fn test_text_only_message_is_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(body_json(json!({"content": "Nowe arkusze", "flags": 4})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    notifier(&server)
        .notify(&NotificationPayload::new("Nowe arkusze"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_embeds_flag_can_be_disabled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_json(json!({"content": "hello"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let config = NotifierConfig {
        suppress_embeds: false,
        ..common::notifier_config(&server.uri())
    };
    WebhookNotifier::new(&config)
        .unwrap()
        .notify(&NotificationPayload::new("hello"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_attachments_are_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let payload = NotificationPayload::new("Nowe arkusze")
        .with_attachment(Attachment::geojson(
            "2024-06-01",
            "2024-06-10",
            br#"{"type":"FeatureCollection","features":[]}"#.to_vec(),
        ))
        .with_attachment(Attachment::png("2024-06-01", "2024-06-10", vec![0x89, b'P', b'N', b'G']));
    notifier(&server).notify(&payload).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let body = body_text(&requests[0]);
    assert!(body.contains("name=\"content\""));
    assert!(body.contains("Nowe arkusze"));
    assert!(body.contains("name=\"flags\""));
    assert!(body.contains("name=\"file\"; filename=\"zasiegi_2024-06-01_2024-06-10.geojson\""));
    assert!(body.contains("application/geo+json"));
    assert!(body.contains("name=\"image\"; filename=\"zasiegi_2024-06-01_2024-06-10.png\""));
    assert!(body.contains("image/png"));
}

#[tokio::test]
async fn test_long_message_is_truncated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    notifier(&server)
        .notify(&NotificationPayload::new("x".repeat(2500)))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let sent: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(sent["content"].as_str().unwrap().chars().count(), 2000);
}

#[tokio::test]
async fn test_rejected_delivery_is_delivery_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"message":"Invalid Form Body"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let err = notifier(&server)
        .notify(&NotificationPayload::new("hello"))
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<OrthowatchError>(),
        Some(OrthowatchError::Delivery(_))
    ));
    assert!(err.to_string().contains("400"));
    assert!(err.to_string().contains("Invalid Form Body"));
}

#[tokio::test]
async fn test_unreachable_webhook_is_delivery_error() {
    let notifier = WebhookNotifier::new(&common::notifier_config("http://127.0.0.1:9/hook")).unwrap();
    let err = notifier
        .notify(&NotificationPayload::new("hello"))
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<OrthowatchError>(),
        Some(OrthowatchError::Delivery(_))
    ));
}
