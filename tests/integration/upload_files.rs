//! Integration tests for the file-upload collaborator.
//!
//! Drives the router directly: a multipart POST stores the file under the
//! configured directory and the returned URL serves the original bytes back
//! through the static file service.
//!
//! Verification command: `cargo test --test upload_files`

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use huddle_relay::config::RelayConfig;
use huddle_relay::relay::{RelayState, build_router};

const BOUNDARY: &str = "huddle-test-boundary";

fn temp_upload_dir(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("huddle-upload-{tag}-{}", uuid::Uuid::now_v7()))
}

fn router_with_dir(dir: &PathBuf, public_url: Option<&str>) -> axum::Router {
    let config = RelayConfig {
        upload_dir: dir.clone(),
        public_url: public_url.map(ToString::to_string),
        ..RelayConfig::default()
    };
    build_router(Arc::new(RelayState::from_config(&config))).unwrap()
}

/// Builds a multipart POST with one file field.
fn file_upload_request(filename: &str, content: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; \
             filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn upload_stores_file_and_serves_it_back() {
    let dir = temp_upload_dir("store");
    let app = router_with_dir(&dir, None);
    let content = b"%PDF-1.4 donation receipt";

    let response = app
        .clone()
        .oneshot(file_upload_request("receipt.pdf", content))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = response_json(response).await;
    let url = body["url"].as_str().unwrap();
    assert!(url.starts_with("/files/"));
    assert!(url.ends_with(".pdf"));

    // The URL is fetchable and returns the original bytes.
    let fetched = app
        .oneshot(Request::builder().uri(url).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(fetched.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(fetched.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(bytes.as_ref(), content);

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn upload_url_uses_configured_public_prefix() {
    let dir = temp_upload_dir("prefix");
    let app = router_with_dir(&dir, Some("https://cdn.example.org/"));

    let response = app
        .oneshot(file_upload_request("avatar.png", b"png bytes"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = response_json(response).await;
    let url = body["url"].as_str().unwrap();
    assert!(
        url.starts_with("https://cdn.example.org/files/"),
        "got: {url}"
    );

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn upload_without_file_field_is_rejected() {
    let dir = temp_upload_dir("nofile");
    let app = router_with_dir(&dir, None);

    // A multipart body with a plain text field and no filename.
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhello\r\n--{BOUNDARY}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("no file"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn unknown_file_is_not_found() {
    let dir = temp_upload_dir("missing");
    let app = router_with_dir(&dir, None);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/files/no-such-file.png")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let _ = std::fs::remove_dir_all(&dir);
}
