use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::dispatcher::{Dispatcher, UploadedImage};
use crate::error::GatewayResult;
use crate::task::Task;

const IMAGE_FIELD: &str = "image";

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

pub fn router(dispatcher: Arc<Dispatcher>, body_limit: usize) -> Router {
    let image_router = Router::new()
        .route(Task::ExtractText.route(), post(handle_ocr))
        .route(Task::NovelizeFaithful.route(), post(handle_novel))
        .route(Task::NovelizeOriginal.route(), post(handle_original_novel))
        .layer(DefaultBodyLimit::max(body_limit));

    Router::new()
        .route("/", get(handle_probe))
        .route("/agree", get(handle_consent))
        .merge(image_router)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { dispatcher })
}

#[axum_macros::debug_handler]
async fn handle_probe(State(state): State<AppState>) -> Json<Value> {
    Json(state.dispatcher.probe())
}

#[axum_macros::debug_handler]
async fn handle_consent(State(state): State<AppState>) -> GatewayResult<(StatusCode, Json<Value>)> {
    Ok((StatusCode::OK, Json(state.dispatcher.consent().await?)))
}

#[axum_macros::debug_handler]
async fn handle_ocr(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> GatewayResult<(StatusCode, Json<Value>)> {
    handle_image_task(&state, Task::ExtractText, multipart).await
}

#[axum_macros::debug_handler]
async fn handle_novel(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> GatewayResult<(StatusCode, Json<Value>)> {
    handle_image_task(&state, Task::NovelizeFaithful, multipart).await
}

#[axum_macros::debug_handler]
async fn handle_original_novel(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> GatewayResult<(StatusCode, Json<Value>)> {
    handle_image_task(&state, Task::NovelizeOriginal, multipart).await
}

async fn handle_image_task(
    state: &AppState,
    task: Task,
    multipart: Result<Multipart, MultipartRejection>,
) -> GatewayResult<(StatusCode, Json<Value>)> {
    // A body that is not multipart at all fails the same way a broken one does
    let multipart = multipart.map_err(|rejection| {
        warn!(%task, "Rejected request body: {}", rejection.body_text());
        anyhow::anyhow!(rejection.body_text())
    })?;
    let image = read_image(multipart).await?;
    let result = state.dispatcher.run(task, image).await?;
    Ok((StatusCode::OK, Json(result)))
}

/// Buffers the first `image` field. Only file parts are images: an empty text field
/// counts as absent, a text field with content is rejected.
async fn read_image(mut multipart: Multipart) -> anyhow::Result<Option<UploadedImage>> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let is_file = field.file_name().is_some();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;
        if !is_file {
            if bytes.is_empty() {
                return Ok(None);
            }
            anyhow::bail!("Field {} is not a file upload", IMAGE_FIELD);
        }
        return Ok(Some(UploadedImage {
            bytes,
            content_type,
        }));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use axum::response::Response;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::dispatcher::{LIVENESS_MESSAGE, MISSING_IMAGE_MESSAGE};
    use crate::inference::testing::{StubClient, UnreachableClient};
    use crate::inference::InferenceClient;

    use super::*;

    const BOUNDARY: &str = "manga-gateway-test-boundary";
    const FIXTURE: &[u8] = include_bytes!("../tests/fixtures/solid_10x10.png");

    enum Part<'a> {
        File(&'a str, &'a str, &'a [u8]),
        Text(&'a str, &'a str),
    }

    fn multipart_body(parts: &[Part]) -> Vec<u8> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::File(name, file_name, bytes) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: image/png\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                }
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}")
                            .as_bytes(),
                    );
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn app(client: Arc<dyn InferenceClient>) -> Router {
        let dispatcher = Dispatcher::new(
            client,
            "@cf/meta/llama-3.2-11b-vision-instruct",
            Duration::from_secs(5),
        );
        router(Arc::new(dispatcher), 10_000_000)
    }

    fn upload(path: &str, parts: &[Part]) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn probe_ignores_headers_and_body() {
        let request = Request::builder()
            .uri("/")
            .header("x-anything", "1")
            .body(Body::from("junk"))
            .unwrap();

        let response = app(Arc::new(UnreachableClient)).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "message": LIVENESS_MESSAGE }));
    }

    #[tokio::test]
    async fn ocr_returns_model_output_verbatim() {
        let stub = Arc::new(StubClient::replying(json!({ "response": "こんにちは" })));

        let response = app(stub.clone())
            .oneshot(upload("/ocr", &[Part::File("image", "page.png", FIXTURE)]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "response": "こんにちは" }));
        let calls = stub.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1.prompt, Task::ExtractText.prompt());
        assert_eq!(calls[0].1.image.as_deref(), Some(FIXTURE));
    }

    #[tokio::test]
    async fn image_bytes_pass_through_untouched() {
        let stub = Arc::new(StubClient::replying(json!({})));
        // CRLF and boundary-looking bytes inside the payload must survive
        let payload: &[u8] = b"\x00\xff\r\n--not-a-boundary\r\n\x89PNG";

        app(stub.clone())
            .oneshot(upload(
                "/original-novel",
                &[
                    Part::Text("note", "ignored"),
                    Part::File("image", "odd.bin", payload),
                ],
            ))
            .await
            .unwrap();

        let calls = stub.calls();
        assert_eq!(calls[0].1.image.as_deref(), Some(payload));
        assert_eq!(calls[0].1.prompt, Task::NovelizeOriginal.prompt());
    }

    #[tokio::test]
    async fn missing_image_is_a_client_error_on_every_route() {
        for task in Task::ALL {
            let response = app(Arc::new(UnreachableClient))
                .oneshot(upload(task.route(), &[Part::Text("caption", "hello")]))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{task}");
            assert_eq!(json_body(response).await, json!({ "error": MISSING_IMAGE_MESSAGE }));
        }
    }

    #[tokio::test]
    async fn novel_without_image_field() {
        let response = app(Arc::new(UnreachableClient))
            .oneshot(upload("/novel", &[]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await, json!({ "error": "Image file is required" }));
    }

    #[tokio::test]
    async fn empty_text_image_field_counts_as_missing() {
        let response = app(Arc::new(UnreachableClient))
            .oneshot(upload("/ocr", &[Part::Text("image", "")]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn text_image_field_never_reaches_the_model() {
        let response = app(Arc::new(UnreachableClient))
            .oneshot(upload("/ocr", &[Part::Text("image", "hello")]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(response).await,
            json!({ "error": "Field image is not a file upload" })
        );
    }

    #[tokio::test]
    async fn non_multipart_body_is_a_server_error() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/ocr")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();

        let response = app(Arc::new(UnreachableClient)).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn model_failure_maps_to_error_envelope_everywhere() {
        for task in Task::ALL {
            let response = app(Arc::new(StubClient::failing("AiError: 3010: Invalid input")))
                .oneshot(upload(task.route(), &[Part::File("image", "p.png", FIXTURE)]))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(
                json_body(response).await,
                json!({ "error": "AiError: 3010: Invalid input" })
            );
        }

        let request = Request::builder().uri("/agree").body(Body::empty()).unwrap();
        let response = app(Arc::new(StubClient::failing("network down")))
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await, json!({ "error": "network down" }));
    }

    #[tokio::test]
    async fn agree_has_a_stable_shape() {
        let stub = Arc::new(StubClient::replying(json!({ "response": "Thank you for agreeing" })));
        let app = app(stub.clone());

        for _ in 0..3 {
            let request = Request::builder().uri("/agree").body(Body::empty()).unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(
                json_body(response).await,
                json!({ "status": "agreed", "result": { "response": "Thank you for agreeing" } })
            );
        }
        assert_eq!(stub.calls().len(), 3);
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected_before_the_model() {
        let dispatcher = Dispatcher::new(
            Arc::new(UnreachableClient),
            "@cf/meta/llama-3.2-11b-vision-instruct",
            Duration::from_secs(5),
        );
        let app = router(Arc::new(dispatcher), 64);
        let big = vec![7u8; 1024];

        let response = app
            .oneshot(upload("/ocr", &[Part::File("image", "big.png", &big)]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
