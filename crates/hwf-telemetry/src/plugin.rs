use crate::auth::{token_auth_middleware, ServerToken};
use crate::handlers::{configure_routes, AppState, TelemetryApiDoc};
use crate::sink::build_sink;
use axum::extract::Request;
use axum::middleware::Next;
use hwf_config::ServerConfig;
use hwf_core::plugin::{
    middleware_helpers, HwfPlugin, PluginContext, PluginError, PluginFuture,
    PluginMiddlewareCollection, PluginRoutes, ServiceRegistrationContext,
};
use std::sync::Arc;
use tracing::debug;

const PLUGIN_NAME: &str = "telemetry";

/// Mounts the telemetry endpoint. The sink, the metadata and the server token
/// are built once at registration and shared by every request.
pub struct TelemetryPlugin {
    config: Arc<ServerConfig>,
}

impl TelemetryPlugin {
    pub fn new(config: Arc<ServerConfig>) -> Self {
        Self { config }
    }
}

impl HwfPlugin for TelemetryPlugin {
    fn name(&self) -> &'static str {
        PLUGIN_NAME
    }

    fn register_services<'a>(&'a self, context: &'a ServiceRegistrationContext) -> PluginFuture<'a> {
        Box::pin(async move {
            let sink = build_sink(&self.config).map_err(|e| {
                PluginError::PluginRegistrationFailed {
                    plugin_name: PLUGIN_NAME.to_string(),
                    error: e.to_string(),
                }
            })?;

            context.register_service(Arc::new(ServerToken::new(&self.config.token)));
            context.register_plugin_state(
                PLUGIN_NAME,
                Arc::new(AppState {
                    sink,
                    metadata: Arc::new(self.config.metadata.clone()),
                }),
            );

            debug!("Telemetry services registered successfully");
            Ok(())
        })
    }

    fn configure_routes(&self, context: &PluginContext) -> Option<PluginRoutes> {
        let state = context.get_plugin_state::<AppState>(PLUGIN_NAME)?;
        Some(PluginRoutes::new(configure_routes().with_state(state)))
    }

    fn openapi_schema(&self) -> Option<utoipa::openapi::OpenApi> {
        Some(<TelemetryApiDoc as utoipa::OpenApi>::openapi())
    }

    fn configure_middleware(&self, context: &PluginContext) -> Option<PluginMiddlewareCollection> {
        let token = context.get_service::<ServerToken>()?;
        let mut collection = PluginMiddlewareCollection::new();

        collection.add_auth_middleware(
            "token_auth",
            PLUGIN_NAME,
            "/telemetry/",
            move |req: Request, next: Next| token_auth_middleware(token.clone(), req, next),
        );
        collection.add_observability_middleware(
            "request_logging",
            PLUGIN_NAME,
            middleware_helpers::logging_middleware(PLUGIN_NAME),
        );

        Some(collection)
    }
}
