use credential_storage::RefreshCredentials;
use http_transport::testing::ScriptedTransport;
use http_transport::{HttpResponse, HttpTransport, Method};
use qr_api::{GenerateQrRequest, QrApiError, QrClient, VALIDATION_FALLBACK_MESSAGE};
use serde_json::json;
use session_engine::{SessionConfig, SessionManager};
use std::sync::Arc;
use url::Url;

fn client(transport: &Arc<ScriptedTransport>) -> QrClient {
    let transport: Arc<dyn HttpTransport> = transport.clone();
    let config = SessionConfig::new(Url::parse("http://api.test/api/").unwrap());
    QrClient::new(SessionManager::new(
        transport,
        RefreshCredentials::cookie(),
        config,
    ))
}

fn resource(id: &str, code: &str) -> serde_json::Value {
    json!({ "id": id, "code": code, "type": "ticket", "oneTime": true, "isValid": true })
}

#[tokio::test]
async fn generate_unwraps_envelope() {
    let transport = ScriptedTransport::new();
    transport.on(Method::POST, "/qr/generate", |req| {
        assert_eq!(req.body.as_ref().unwrap()["type"], "ticket");
        HttpResponse::json(201, &json!({ "qr": resource("qr-1", "ABC123") }))
    });

    let qr = client(&transport)
        .generate(&GenerateQrRequest {
            kind: "ticket".into(),
            payload: json!({ "seat": "A1" }),
            one_time: true,
            expires_at: None,
        })
        .await
        .unwrap();

    assert_eq!(qr.id, "qr-1");
    assert_eq!(qr.code, "ABC123");
}

#[tokio::test]
async fn history_accepts_bare_and_wrapped_lists() {
    let transport = ScriptedTransport::new();
    transport.on(Method::GET, "/qr/history", |_| {
        HttpResponse::json(200, &json!([resource("qr-1", "A"), resource("qr-2", "B")]))
    });
    let qr = client(&transport);
    assert_eq!(qr.history().await.unwrap().len(), 2);

    transport.on(Method::GET, "/qr/history", |_| {
        HttpResponse::json(200, &json!({ "data": [resource("qr-3", "C")] }))
    });
    let history = qr.history().await.unwrap();
    assert_eq!(history[0].id, "qr-3");
}

#[tokio::test]
async fn get_and_delete_by_id() {
    let transport = ScriptedTransport::new();
    transport.on(Method::GET, "/qr/qr-9", |_| {
        HttpResponse::json(200, &resource("qr-9", "Z"))
    });
    transport.on(Method::DELETE, "/qr/qr-9", |_| HttpResponse::empty(204));
    let qr = client(&transport);

    assert_eq!(qr.get("qr-9").await.unwrap().code, "Z");
    qr.delete("qr-9").await.unwrap();
    assert_eq!(transport.count("/qr/qr-9"), 2);
}

#[tokio::test]
async fn validate_returns_resource_and_message() {
    let transport = ScriptedTransport::new();
    transport.on(Method::POST, "/qr/validate", |req| {
        assert_eq!(req.body, Some(json!({ "code": "ABC123" })));
        HttpResponse::json(
            200,
            &json!({ "message": "Welcome!", "qr": resource("qr-1", "ABC123") }),
        )
    });

    let outcome = client(&transport).validate("ABC123").await.unwrap();

    assert_eq!(outcome.message, "Welcome!");
    assert_eq!(outcome.qr.unwrap().id, "qr-1");
}

#[tokio::test]
async fn validation_rejection_surfaces_server_message() {
    let transport = ScriptedTransport::new();
    transport.on(Method::POST, "/qr/validate", |_| {
        HttpResponse::json(410, &json!({ "error": "QR code already used" }))
    });

    let err = client(&transport).validate("ABC123").await.unwrap_err();

    match err {
        QrApiError::ValidationRejected(message) => assert_eq!(message, "QR code already used"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn validation_rejection_without_message_uses_fallback() {
    let transport = ScriptedTransport::new();
    transport.on(Method::POST, "/qr/validate", |_| HttpResponse::empty(400));
    let qr = client(&transport);

    match qr.validate("ABC123").await.unwrap_err() {
        QrApiError::ValidationRejected(message) => {
            assert_eq!(message, VALIDATION_FALLBACK_MESSAGE)
        }
        other => panic!("unexpected error: {other:?}"),
    }

    transport.on(Method::POST, "/qr/validate", |_| {
        HttpResponse::json(200, &json!({ "valid": false }))
    });
    assert!(matches!(
        qr.validate("ABC123").await,
        Err(QrApiError::ValidationRejected(message)) if message == VALIDATION_FALLBACK_MESSAGE
    ));
}

#[tokio::test]
async fn server_errors_are_not_validation_rejections() {
    let transport = ScriptedTransport::new();
    transport.on(Method::POST, "/qr/validate", |_| HttpResponse::text(500, "boom"));

    let err = client(&transport).validate("ABC123").await.unwrap_err();

    assert!(matches!(err, QrApiError::Auth(_)));
    assert!(!err.requires_login());
}

#[tokio::test]
async fn consumed_one_time_code_validates() {
    let transport = ScriptedTransport::new();
    transport.on(Method::POST, "/qr/validate", |_| {
        HttpResponse::json(
            200,
            &json!({
                "id": "qr-1",
                "code": "ABC123",
                "oneTime": true,
                "isValid": false,
                "validatedAt": "2024-05-01T12:00:00Z"
            }),
        )
    });

    let outcome = client(&transport).validate("ABC123").await.unwrap();

    let qr = outcome.qr.unwrap();
    assert_eq!(qr.id, "qr-1");
    assert!(qr.validated_at.is_some());
    assert_eq!(outcome.message, "QR code validated");
}

#[tokio::test]
async fn ids_are_sent_as_one_path_segment() {
    let transport = ScriptedTransport::new();
    transport.on(Method::GET, "/qr/a%2Fb%3Fc%23d", |_| {
        HttpResponse::json(200, &resource("a/b?c#d", "Z"))
    });
    let qr = client(&transport);

    assert_eq!(qr.get("a/b?c#d").await.unwrap().id, "a/b?c#d");
    let request = &transport.requests()[0];
    assert_eq!(request.url.path(), "/api/qr/a%2Fb%3Fc%23d");
    assert_eq!(request.url.query(), None);

    for id in ["", ".", ".."] {
        assert!(matches!(qr.delete(id).await, Err(QrApiError::InvalidId(_))));
    }
    assert_eq!(transport.requests().len(), 1);
}
