//! HTTP sensor that transmits events to a collector endpoint.

use crate::envelope::Envelope;
use crate::error::CaliperError;
use crate::events::Event;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;
use tracing::{debug, warn};

/// Collector connection options
#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub host: String,
    pub auth_scheme: String,
    pub api_key: String,
    /// Unset means a slow collector only delays the caller
    pub timeout: Option<Duration>,
}

impl HttpOptions {
    /// Bearer-authenticated options without a request timeout
    pub fn bearer(host: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            auth_scheme: "Bearer".to_string(),
            api_key: api_key.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn authorization(&self) -> String {
        format!("{} {}", self.auth_scheme, self.api_key)
    }
}

/// Outcome of a successful transmission
#[derive(Debug, Clone)]
pub struct SendReport {
    pub event_id: String,
    pub status: u16,
}

/// A sensor owns one HTTP client for its whole lifetime and sends each event
/// individually. There is no batching and no retry.
pub struct Sensor {
    id: String,
    options: HttpOptions,
    client: reqwest::Client,
    debug: bool,
}

impl Sensor {
    pub fn new(
        id: impl Into<String>,
        options: HttpOptions,
        debug: bool,
    ) -> Result<Self, CaliperError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("hwf-caliper/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            id: id.into(),
            options,
            client,
            debug,
        })
    }

    pub fn host(&self) -> &str {
        &self.options.host
    }

    /// Send one event. Entities whose ids appear in `described` are sent by
    /// reference only.
    pub async fn send(&self, event: &Event, described: &[&str]) -> Result<SendReport, CaliperError> {
        let envelope = Envelope::new(&self.id, vec![event.to_json(described)]);

        if self.debug {
            debug!(
                "Sending envelope to {}: {}",
                self.options.host,
                serde_json::to_string(&envelope)?
            );
        }

        let response = self
            .client
            .post(&self.options.host)
            .header(AUTHORIZATION, self.options.authorization())
            .header(CONTENT_TYPE, "application/json")
            .json(&envelope)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                "Collector {} rejected event {}: {} {}",
                self.options.host, event.id, status, body
            );
            return Err(CaliperError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Event {} accepted with status {}", event.id, status);

        Ok(SendReport {
            event_id: event.id.clone(),
            status: status.as_u16(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Entity;
    use crate::events::{Action, EventType};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_event() -> Event {
        Event::builder(EventType::ToolUseEvent, Action::Used)
            .actor(Entity::person("urn:umich:jupyter:user:u1"))
            .ed_app(Entity::software_application("urn:umich:jupyter:notebook"))
            .object(Entity::software_application("__unknown__"))
            .session(Entity::session("urn:umich:jupyter:session:__unknown__"))
            .build()
            .unwrap()
    }

    fn create_sensor(mock_server: &MockServer) -> Sensor {
        let options = HttpOptions::bearer(
            format!("{}/caliper/event", mock_server.uri()),
            "test_key_12345",
        );
        Sensor::new("urn:umich:jupyter:sensor", options, true).unwrap()
    }

    #[tokio::test]
    async fn test_send_posts_envelope_with_bearer_auth() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/caliper/event"))
            .and(header("Authorization", "Bearer test_key_12345"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let sensor = create_sensor(&mock_server);
        let event = sample_event();
        let report = sensor
            .send(&event, &["urn:umich:jupyter:user:u1"])
            .await
            .unwrap();

        assert_eq!(report.status, 200);
        assert_eq!(report.event_id, event.id);

        let requests = mock_server.received_requests().await.unwrap();
        let body: serde_json::Value = requests[0].body_json().unwrap();
        assert_eq!(body["sensor"], "urn:umich:jupyter:sensor");
        assert_eq!(body["data"][0]["actor"], "urn:umich:jupyter:user:u1");
        assert_eq!(body["data"][0]["session"]["type"], "Session");
    }

    #[tokio::test]
    async fn test_send_surfaces_rejection() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/caliper/event"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&mock_server)
            .await;

        let sensor = create_sensor(&mock_server);
        let result = sensor.send(&sample_event(), &[]).await;

        match result {
            Err(CaliperError::Rejected { status, body }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "bad key");
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_slow_collector_only_delays_send() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(300)))
            .expect(1)
            .mount(&mock_server)
            .await;

        let sensor = create_sensor(&mock_server);
        assert!(sensor.options.timeout.is_none());

        let started = std::time::Instant::now();
        let report = sensor.send(&sample_event(), &[]).await.unwrap();

        assert_eq!(report.status, 200);
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_send_surfaces_transport_failure() {
        let options = HttpOptions::bearer("http://127.0.0.1:1/caliper/event", "key")
            .with_timeout(Duration::from_secs(2));
        let sensor = Sensor::new("urn:umich:jupyter:sensor", options, false).unwrap();

        let result = sensor.send(&sample_event(), &[]).await;
        assert!(matches!(result, Err(CaliperError::Http(_))));
    }
}
