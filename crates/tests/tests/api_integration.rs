use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use pdfchunk_extract::PdfTextExtractor;
use pdfchunk_storage::DocumentStorage;
use pdfchunk_tests::{app_with_extractor, test_config, text_app, OUTPUT_BUCKET};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn send(app: &Router, request: Request<Body>) -> anyhow::Result<(StatusCode, Value)> {
    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await?;
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body)?
    };
    Ok((status, value))
}

fn post_json(uri: &str, client: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", client)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn upload(text: &str) -> Value {
    json!({ "pdf": STANDARD.encode(text), "filename": "doc.pdf" })
}

#[tokio::test]
async fn health_reports_configuration() -> anyhow::Result<()> {
    let app = text_app(&test_config(500, 10), DocumentStorage::memory());
    let request = Request::builder().uri("/health").body(Body::empty())?;

    let (status, body) = send(&app, request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["chunk_size"], 500);
    assert_eq!(body["storage_backend"], "memory");
    assert_eq!(body["rate_limit_backend"], "memory");
    Ok(())
}

#[tokio::test]
async fn chunk_endpoint_returns_normalized_chunks() -> anyhow::Result<()> {
    let app = text_app(&test_config(20, 10), DocumentStorage::memory());
    let request = post_json(
        "/v1/chunk",
        "198.51.100.1",
        &upload("SPEAKER: First line.   Second line."),
    );

    let (status, body) = send(&app, request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["chunks"], json!(["SPEAKER:\nFirst line.", "Second line."]));
    assert_eq!(body["num_chunks"], 2);
    assert_eq!(
        body["total_characters"],
        "SPEAKER:\nFirst line.\n\nSecond line.".chars().count()
    );
    assert!(body.get("error").is_none());
    Ok(())
}

#[tokio::test]
async fn missing_document_is_a_client_error() -> anyhow::Result<()> {
    let app = text_app(&test_config(100, 10), DocumentStorage::memory());

    let (status, body) = send(
        &app,
        post_json("/v1/chunk", "198.51.100.2", &json!({ "filename": "empty.pdf" })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "success": false, "error": "No PDF data in request" }));

    let request = Request::builder()
        .method("POST")
        .uri("/v1/chunk")
        .header("x-forwarded-for", "198.51.100.2")
        .body(Body::from("{not json"))?;
    let (status, body) = send(&app, request).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid JSON body");

    let (status, body) = send(
        &app,
        post_json("/v1/chunk", "198.51.100.2", &json!({ "pdf": "%%%not-base64%%%" })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap_or_default()
        .starts_with("Invalid base64 encoded PDF data"));
    Ok(())
}

#[tokio::test]
async fn unreadable_pdf_maps_to_generic_server_error() -> anyhow::Result<()> {
    let app = app_with_extractor(
        &test_config(100, 10),
        DocumentStorage::memory(),
        Arc::new(PdfTextExtractor),
    );

    let (status, body) = send(
        &app,
        post_json("/v1/chunk", "198.51.100.3", &upload("definitely not a pdf")),
    )
    .await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "success": false, "error": "Internal server error" }));
    Ok(())
}

#[tokio::test]
async fn chunk_endpoint_is_rate_limited_per_client() -> anyhow::Result<()> {
    let app = text_app(&test_config(100, 2), DocumentStorage::memory());

    for _ in 0..2 {
        let (status, _) = send(&app, post_json("/v1/chunk", "203.0.113.7", &upload("Hi."))).await?;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(&app, post_json("/v1/chunk", "203.0.113.7", &upload("Hi."))).await?;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["success"], false);
    assert_eq!(
        body["error"],
        "Rate limit exceeded. Maximum 2 requests per hour."
    );

    // Other clients keep their own budget.
    let (status, _) = send(&app, post_json("/v1/chunk", "203.0.113.8", &upload("Hi."))).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn oversized_body_is_refused() -> anyhow::Result<()> {
    let mut config = test_config(100, 10);
    config.max_body_bytes = 64;
    let app = text_app(&config, DocumentStorage::memory());

    let payload = upload(&"x".repeat(200)).to_string();
    let request = Request::builder()
        .method("POST")
        .uri("/v1/chunk")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, payload.len())
        .header("x-forwarded-for", "198.51.100.4")
        .body(Body::from(payload))?;

    let response = app.oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    Ok(())
}

#[tokio::test]
async fn storage_event_writes_parts_to_output_bucket() -> anyhow::Result<()> {
    let storage = DocumentStorage::memory();
    let document = format!("{}\n\n{}", "a".repeat(60), "b".repeat(60));
    storage
        .put_object("uploads", "reports/Annual Review.pdf", Bytes::from(document))
        .await?;

    let app = text_app(&test_config(80, 10), storage.clone());
    let event = json!({
        "Records": [{
            "s3": {
                "bucket": { "name": "uploads" },
                "object": { "key": "reports/Annual+Review.pdf", "size": 122 }
            }
        }]
    });

    let (status, body) = send(&app, post_json("/v1/events/storage", "10.0.0.1", &event)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Successfully processed reports/Annual Review.pdf");
    assert_eq!(body["chunks_created"], 2);

    let first = storage
        .get_object(OUTPUT_BUCKET, "reports/Annual Review_part1.txt")
        .await?;
    assert_eq!(first.as_ref(), "a".repeat(60).as_bytes());
    let second = storage
        .get_object(OUTPUT_BUCKET, "reports/Annual Review_part2.txt")
        .await?;
    assert_eq!(second.as_ref(), "b".repeat(60).as_bytes());
    Ok(())
}

#[tokio::test]
async fn storage_event_for_missing_object_fails_generically() -> anyhow::Result<()> {
    let app = text_app(&test_config(80, 10), DocumentStorage::memory());
    let event = json!({
        "Records": [{ "s3": { "bucket": { "name": "uploads" }, "object": { "key": "nope.pdf" } } }]
    });

    let (status, body) = send(&app, post_json("/v1/events/storage", "10.0.0.1", &event)).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal server error");

    let (status, body) = send(
        &app,
        post_json("/v1/events/storage", "10.0.0.1", &json!({ "unexpected": true })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid storage event");
    Ok(())
}

#[tokio::test]
async fn invoke_accepts_base64_web_events_and_limits_by_source_ip() -> anyhow::Result<()> {
    let app = text_app(&test_config(100, 1), DocumentStorage::memory());
    let inner = upload("Hello.   World.").to_string();
    let event = json!({
        "body": STANDARD.encode(inner),
        "isBase64Encoded": true,
        "requestContext": { "http": { "sourceIp": "192.0.2.44" } }
    });

    let (status, body) = send(&app, post_json("/v1/invoke", "10.0.0.9", &event)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["chunks"], json!(["Hello.\n\nWorld."]));

    // Same sourceIp from a different forwarding hop is still the same client.
    let (status, body) = send(&app, post_json("/v1/invoke", "10.0.0.10", &event)).await?;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        body["error"],
        "Rate limit exceeded. Maximum 1 requests per hour."
    );
    Ok(())
}

#[tokio::test]
async fn invoke_dispatches_storage_events() -> anyhow::Result<()> {
    let storage = DocumentStorage::memory();
    storage
        .put_object("uploads", "memo.PDF", Bytes::from_static(b"Short memo."))
        .await?;
    let app = text_app(&test_config(100, 1), storage.clone());

    let event = json!({
        "Records": [{ "s3": { "bucket": { "name": "uploads" }, "object": { "key": "memo.PDF" } } }]
    });
    let (status, body) = send(&app, post_json("/v1/invoke", "10.0.0.1", &event)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcomes"][0]["output_keys"], json!(["memo_part1.txt"]));

    let part = storage.get_object(OUTPUT_BUCKET, "memo_part1.txt").await?;
    assert_eq!(part.as_ref(), b"Short memo.");
    Ok(())
}

#[tokio::test]
async fn invoke_rejects_malformed_records_without_touching_the_limiter() -> anyhow::Result<()> {
    let app = text_app(&test_config(100, 1), DocumentStorage::memory());
    let broken = json!({ "Records": [{ "s3": { "bucket": { "name": "uploads" } } }] });

    for _ in 0..3 {
        let (status, body) = send(&app, post_json("/v1/invoke", "10.0.0.1", &broken)).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid storage event");
    }

    // A web event with no sourceIp is keyed as "unknown"; its single slot is still free.
    let event = json!({ "body": upload("Fine.").to_string() });
    let (status, _) = send(&app, post_json("/v1/invoke", "10.0.0.1", &event)).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}
