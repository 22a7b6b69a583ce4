use crate::auth::Authenticated;
use crate::sink::EventSink;
use crate::types::{EventPayload, Metadata, TelemetryAck, TelemetryEventSchema};
use axum::{
    extract::State,
    response::Json,
    routing::post,
    Router,
};
use hwf_core::error_builder;
use hwf_core::problemdetails::{Problem, ProblemDetails};
use std::sync::Arc;
use tracing::error;
use utoipa::OpenApi;

pub struct AppState {
    pub sink: Arc<dyn EventSink>,
    pub metadata: Arc<Metadata>,
}

/// Record one telemetry event
///
/// The payload is forwarded together with the server metadata to the active
/// sink. The response is sent once the sink is done with the event.
#[utoipa::path(
    post,
    path = "/telemetry/event",
    request_body(content = TelemetryEventSchema, description = "Any JSON object; the listed keys are read when present"),
    responses(
        (status = 200, description = "Event accepted", body = TelemetryAck),
        (status = 401, description = "Missing or invalid server token", body = ProblemDetails),
        (status = 422, description = "Body is not a JSON object"),
        (status = 500, description = "The sink failed to handle the event", body = ProblemDetails)
    ),
    tag = "Telemetry",
    security(
        ("token_auth" = [])
    )
)]
pub async fn record_telemetry_event(
    _auth: Authenticated,
    State(state): State<Arc<AppState>>,
    Json(event): Json<EventPayload>,
) -> Result<Json<TelemetryAck>, Problem> {
    state
        .sink
        .handle_event(&event, &state.metadata)
        .await
        .map_err(|e| {
            error!("Sink {} failed to handle event: {}", state.sink.name(), e);
            error_builder::internal_server_error()
                .title("Failed to handle telemetry event")
                .detail(format!("Error: {}", e))
                .value("sink", state.sink.name())
                .build()
        })?;

    Ok(Json(TelemetryAck::ok()))
}

pub fn configure_routes() -> Router<Arc<AppState>> {
    Router::new().route("/telemetry/event", post(record_telemetry_event))
}

#[derive(OpenApi)]
#[openapi(
    paths(record_telemetry_event),
    components(schemas(TelemetryEventSchema, TelemetryAck, ProblemDetails)),
    tags(
        (name = "Telemetry", description = "Notebook interaction events")
    )
)]
pub struct TelemetryApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{token_auth_middleware, ServerToken};
    use crate::sink::SinkError;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::extract::Request;
    use axum::http::{Request as HttpRequest, StatusCode};
    use axum::middleware::Next;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<(EventPayload, Metadata)>>,
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn handle_event(
            &self,
            event: &EventPayload,
            metadata: &Metadata,
        ) -> Result<(), SinkError> {
            self.events
                .lock()
                .unwrap()
                .push((event.clone(), metadata.clone()));
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl EventSink for FailingSink {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn handle_event(&self, _: &EventPayload, _: &Metadata) -> Result<(), SinkError> {
            Err(SinkError::Configuration("collector unreachable".to_string()))
        }
    }

    fn create_app(sink: Arc<dyn EventSink>) -> Router {
        let metadata = json!({ "env": "prod" }).as_object().cloned().unwrap();
        let token = Arc::new(ServerToken::new("secret"));

        configure_routes()
            .with_state(Arc::new(AppState {
                sink,
                metadata: Arc::new(metadata),
            }))
            .layer(axum::middleware::from_fn(move |req: Request, next: Next| {
                token_auth_middleware(token.clone(), req, next)
            }))
    }

    fn post_event(body: &str, authorization: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder()
            .method("POST")
            .uri("/telemetry/event")
            .header("Content-Type", "application/json");
        if let Some(value) = authorization {
            builder = builder.header("Authorization", value);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_accepted_event_reaches_sink_with_metadata() {
        let sink = Arc::new(RecordingSink::default());
        let app = create_app(sink.clone());

        let response = app
            .oneshot(post_event(
                r#"{"event_name":"save_notebook","path":"nb1"}"#,
                Some("token secret"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "ok": true }));

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0["event_name"], "save_notebook");
        assert_eq!(events[0].1["env"], "prod");
    }

    #[tokio::test]
    async fn test_missing_token_is_rejected_before_sink() {
        let sink = Arc::new(RecordingSink::default());
        let app = create_app(sink.clone());

        let response = app.oneshot(post_event("{}", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()["content-type"],
            "application/problem+json"
        );
        assert!(sink.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_token_is_rejected() {
        let sink = Arc::new(RecordingSink::default());
        let app = create_app(sink.clone());

        let response = app
            .oneshot(post_event("{}", Some("Bearer nope")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(sink.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sink_failure_is_server_error() {
        let app = create_app(Arc::new(FailingSink));

        let response = app
            .oneshot(post_event("{}", Some("Bearer secret")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["title"], "Failed to handle telemetry event");
        assert_eq!(body["sink"], "failing");
        assert!(body["detail"]
            .as_str()
            .unwrap()
            .contains("collector unreachable"));
    }

    #[tokio::test]
    async fn test_non_object_body_never_reaches_sink() {
        let sink = Arc::new(RecordingSink::default());
        let app = create_app(sink.clone());

        let response = app
            .clone()
            .oneshot(post_event("[1, 2]", Some("token secret")))
            .await
            .unwrap();
        assert!(response.status().is_client_error());

        let response = app
            .oneshot(post_event("{not json", Some("token secret")))
            .await
            .unwrap();
        assert!(response.status().is_client_error());

        assert!(sink.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_only_post_is_routed() {
        let app = create_app(Arc::new(RecordingSink::default()));

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("GET")
                    .uri("/telemetry/event?token=secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn test_openapi_documents_event_route() {
        let doc = TelemetryApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/telemetry/event"));
    }
}
