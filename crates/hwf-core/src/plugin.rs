//! Plugin system for service registration and route configuration
//!
//! Plugins are constructed once per process. During initialization each plugin
//! registers the long-lived services it owns (sinks, clients, shared state);
//! afterwards the manager collects their routes, middleware and OpenAPI
//! fragments into a single application router.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use thiserror::Error;
use tracing::debug;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::openapi::{ComponentsBuilder, InfoBuilder, OpenApi, OpenApiBuilder};

// Re-export for plugin implementations
pub use axum;
pub use utoipa;

/// Middleware execution priority. Lower values run first (outermost).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MiddlewarePriority {
    /// Logging and metrics middleware
    Observability,
    /// Authentication and authorization
    Security,
}

impl MiddlewarePriority {
    pub fn value(&self) -> u16 {
        match self {
            MiddlewarePriority::Observability => 0,
            MiddlewarePriority::Security => 100,
        }
    }
}

/// When a middleware runs
#[derive(Debug, Clone)]
pub enum MiddlewareCondition {
    Always,
    /// Only for request paths containing the pattern
    PathMatches(String),
}

impl MiddlewareCondition {
    pub fn matches(&self, req: &Request) -> bool {
        match self {
            MiddlewareCondition::Always => true,
            MiddlewareCondition::PathMatches(pattern) => req.uri().path().contains(pattern),
        }
    }
}

pub type MiddlewareFuture = Pin<Box<dyn Future<Output = Result<Response, StatusCode>> + Send>>;

/// Type alias for middleware handler function
pub type MiddlewareHandler = Arc<dyn Fn(Request, Next) -> MiddlewareFuture + Send + Sync>;

/// Plugin middleware definition
pub struct PluginMiddleware {
    pub name: String,
    pub plugin_name: String,
    pub priority: MiddlewarePriority,
    pub condition: MiddlewareCondition,
    pub handler: MiddlewareHandler,
}

impl std::fmt::Debug for PluginMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginMiddleware")
            .field("name", &self.name)
            .field("plugin_name", &self.plugin_name)
            .field("priority", &self.priority)
            .field("condition", &self.condition)
            .field("handler", &"<function>")
            .finish()
    }
}

/// Collection of middleware from a plugin
#[derive(Default)]
pub struct PluginMiddlewareCollection {
    pub middleware: Vec<PluginMiddleware>,
}

impl PluginMiddlewareCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_middleware<F, Fut>(
        &mut self,
        name: impl Into<String>,
        plugin_name: impl Into<String>,
        priority: MiddlewarePriority,
        condition: MiddlewareCondition,
        handler: F,
    ) where
        F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, StatusCode>> + Send + 'static,
    {
        self.middleware.push(PluginMiddleware {
            name: name.into(),
            plugin_name: plugin_name.into(),
            priority,
            condition,
            handler: Arc::new(move |req, next| Box::pin(handler(req, next))),
        });
    }

    /// Add authentication middleware restricted to a path pattern
    pub fn add_auth_middleware<F, Fut>(
        &mut self,
        name: impl Into<String>,
        plugin_name: impl Into<String>,
        path_pattern: impl Into<String>,
        handler: F,
    ) where
        F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, StatusCode>> + Send + 'static,
    {
        self.add_middleware(
            name,
            plugin_name,
            MiddlewarePriority::Security,
            MiddlewareCondition::PathMatches(path_pattern.into()),
            handler,
        );
    }

    /// Add logging/metrics middleware
    pub fn add_observability_middleware<F, Fut>(
        &mut self,
        name: impl Into<String>,
        plugin_name: impl Into<String>,
        handler: F,
    ) where
        F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, StatusCode>> + Send + 'static,
    {
        self.add_middleware(
            name,
            plugin_name,
            MiddlewarePriority::Observability,
            MiddlewareCondition::Always,
            handler,
        );
    }
}

/// Errors that can occur during plugin operations
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Plugin registration failed for '{plugin_name}': {error}")]
    PluginRegistrationFailed { plugin_name: String, error: String },
}

pub type PluginFuture<'a> = Pin<Box<dyn Future<Output = Result<(), PluginError>> + Send + 'a>>;

/// Core plugin trait
pub trait HwfPlugin: Send + Sync {
    /// Unique identifier for this plugin
    fn name(&self) -> &'static str;

    /// Register services that this plugin provides
    fn register_services<'a>(&'a self, context: &'a ServiceRegistrationContext)
        -> PluginFuture<'a>;

    /// Configure HTTP routes for this plugin
    fn configure_routes(&self, _context: &PluginContext) -> Option<PluginRoutes> {
        None
    }

    /// Provide OpenAPI schema for this plugin's endpoints
    fn openapi_schema(&self) -> Option<OpenApi> {
        None
    }

    /// Configure middleware for this plugin
    fn configure_middleware(&self, _context: &PluginContext) -> Option<PluginMiddlewareCollection> {
        None
    }
}

/// Route configuration returned by plugins
pub struct PluginRoutes {
    pub router: Router,
}

impl PluginRoutes {
    pub fn new(router: Router) -> Self {
        Self { router }
    }
}

type AnyMap<K> = RwLock<HashMap<K, Box<dyn Any + Send + Sync>>>;

/// Type-keyed registry of shared services
#[derive(Default)]
pub struct ServiceRegistry {
    services: AnyMap<TypeId>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Send + Sync + 'static + ?Sized>(&self, service: Arc<T>) {
        debug!("Registering service: {}", std::any::type_name::<T>());
        self.services
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(TypeId::of::<T>(), Box::new(service));
    }

    pub fn get<T: Send + Sync + 'static + ?Sized>(&self) -> Option<Arc<T>> {
        self.services
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&TypeId::of::<T>())
            .and_then(|any| any.downcast_ref::<Arc<T>>())
            .cloned()
    }
}

/// Registry for plugin-specific state (used for routing)
#[derive(Default)]
pub struct PluginStateRegistry {
    states: AnyMap<String>,
}

impl PluginStateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_state<T: Send + Sync + 'static + ?Sized>(&self, plugin_name: &str, state: Arc<T>) {
        debug!("Registering plugin state for: {}", plugin_name);
        self.states
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(plugin_name.to_string(), Box::new(state));
    }

    pub fn get_state<T: Send + Sync + 'static + ?Sized>(&self, plugin_name: &str) -> Option<Arc<T>> {
        self.states
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(plugin_name)
            .and_then(|any| any.downcast_ref::<Arc<T>>())
            .cloned()
    }
}

/// Read-only context handed to plugins once services are registered
pub struct PluginContext {
    service_registry: Arc<ServiceRegistry>,
    state_registry: Arc<PluginStateRegistry>,
}

impl PluginContext {
    pub fn get_service<T: Send + Sync + 'static + ?Sized>(&self) -> Option<Arc<T>> {
        self.service_registry.get::<T>()
    }

    pub fn get_plugin_state<T: Send + Sync + 'static + ?Sized>(&self, plugin_name: &str) -> Option<Arc<T>> {
        self.state_registry.get_state::<T>(plugin_name)
    }
}

/// Context used while plugins register their services
#[derive(Default)]
pub struct ServiceRegistrationContext {
    service_registry: Arc<ServiceRegistry>,
    state_registry: Arc<PluginStateRegistry>,
}

impl ServiceRegistrationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_service<T: Send + Sync + 'static + ?Sized>(&self, service: Arc<T>) {
        self.service_registry.register(service);
    }

    pub fn register_plugin_state<T: Send + Sync + 'static + ?Sized>(&self, plugin_name: &str, state: Arc<T>) {
        self.state_registry.register_state(plugin_name, state);
    }

    pub fn create_plugin_context(&self) -> PluginContext {
        PluginContext {
            service_registry: self.service_registry.clone(),
            state_registry: self.state_registry.clone(),
        }
    }
}

/// Registers plugins, initializes them in order and builds the application router
#[derive(Default)]
pub struct PluginManager {
    plugins: Vec<Box<dyn HwfPlugin>>,
    context: ServiceRegistrationContext,
}

impl PluginManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin (order matters for dependencies)
    pub fn register_plugin(&mut self, plugin: Box<dyn HwfPlugin>) {
        debug!("Registering plugin: {}", plugin.name());
        self.plugins.push(plugin);
    }

    pub async fn initialize_plugins(&mut self) -> Result<(), PluginError> {
        debug!("Initializing {} plugins", self.plugins.len());

        for plugin in &self.plugins {
            plugin.register_services(&self.context).await.map_err(|e| {
                PluginError::PluginRegistrationFailed {
                    plugin_name: plugin.name().to_string(),
                    error: e.to_string(),
                }
            })?;

            debug!("Successfully initialized plugin: {}", plugin.name());
        }

        Ok(())
    }

    /// Build the application with every plugin route mounted under `base_url`.
    ///
    /// The unified OpenAPI document is served unauthenticated at
    /// `<base_url>openapi.json`.
    pub fn build_application(&self, base_url: &str) -> Router {
        let plugin_context = self.context.create_plugin_context();
        let mut api_router = Router::new();

        for plugin in &self.plugins {
            if let Some(plugin_routes) = plugin.configure_routes(&plugin_context) {
                debug!("Adding routes for plugin: {}", plugin.name());
                api_router = api_router.merge(plugin_routes.router);
            }
        }

        let middleware = self.collect_middleware(&plugin_context);
        api_router = apply_middleware_to_router(api_router, middleware);

        let openapi = self.build_unified_openapi();
        api_router = api_router.route(
            "/openapi.json",
            get(move || {
                let openapi = openapi.clone();
                async move { Json(openapi) }
            }),
        );

        let mount = base_url.trim_end_matches('/');
        if mount.is_empty() {
            api_router
        } else {
            Router::new().nest(mount, api_router)
        }
    }

    fn build_unified_openapi(&self) -> OpenApi {
        let mut combined = OpenApiBuilder::new()
            .info(
                InfoBuilder::new()
                    .title("HWF Telemetry")
                    .description(Some("Notebook interaction telemetry forwarding API"))
                    .version(env!("CARGO_PKG_VERSION"))
                    .build(),
            )
            .components(Some(
                ComponentsBuilder::new()
                    .security_scheme(
                        "token_auth",
                        SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                            "Authorization",
                            "Server token. Use format: `token <your-token>` or `Bearer <your-token>`",
                        ))),
                    )
                    .build(),
            ))
            .build();

        for plugin in &self.plugins {
            if let Some(plugin_openapi) = plugin.openapi_schema() {
                debug!("Merging OpenAPI schema for plugin: {}", plugin.name());
                combined.merge(plugin_openapi);
            }
        }

        combined
    }

    fn collect_middleware(&self, plugin_context: &PluginContext) -> Vec<PluginMiddleware> {
        let mut all_middleware = Vec::new();

        for plugin in &self.plugins {
            if let Some(collection) = plugin.configure_middleware(plugin_context) {
                all_middleware.extend(collection.middleware);
            }
        }

        all_middleware.sort_by_key(|mw| mw.priority.value());

        for mw in &all_middleware {
            debug!(
                "  - {} (priority: {}) from {}",
                mw.name,
                mw.priority.value(),
                mw.plugin_name
            );
        }

        all_middleware
    }
}

// The last layer added is the outermost, so layers go on in reverse priority order.
fn apply_middleware_to_router(mut router: Router, middleware: Vec<PluginMiddleware>) -> Router {
    for mw in middleware.into_iter().rev() {
        debug!("Applying middleware: {} from plugin: {}", mw.name, mw.plugin_name);

        let handler = mw.handler;
        let condition = mw.condition;

        router = router.layer(axum::middleware::from_fn(move |req: Request, next: Next| {
            let handler = handler.clone();
            let condition = condition.clone();

            async move {
                if condition.matches(&req) {
                    handler(req, next).await
                } else {
                    Ok(next.run(req).await)
                }
            }
        }));
    }

    router
}

/// Helper functions for common middleware patterns
pub mod middleware_helpers {
    use super::*;

    /// Log method, URI, status and latency of every request at debug level
    pub fn logging_middleware(
        plugin_name: &str,
    ) -> impl Fn(Request, Next) -> MiddlewareFuture + Send + Sync + 'static {
        let plugin_name = plugin_name.to_string();
        move |req: Request, next: Next| {
            let plugin_name = plugin_name.clone();
            Box::pin(async move {
                let method = req.method().clone();
                let uri = req.uri().clone();
                let start = std::time::Instant::now();

                let response = next.run(req).await;

                debug!(
                    "[{}] {} {} - Response: {} ({:?})",
                    plugin_name,
                    method,
                    uri,
                    response.status(),
                    start.elapsed()
                );

                Ok(response)
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use axum::routing::post;
    use std::sync::Mutex;
    use tower::ServiceExt;

    struct Greeting(&'static str);

    struct GreetingPlugin {
        order: Arc<Mutex<Vec<&'static str>>>,
    }

    impl HwfPlugin for GreetingPlugin {
        fn name(&self) -> &'static str {
            "greeting"
        }

        fn register_services<'a>(
            &'a self,
            context: &'a ServiceRegistrationContext,
        ) -> PluginFuture<'a> {
            Box::pin(async move {
                context.register_service(Arc::new(Greeting("hello")));
                Ok(())
            })
        }

        fn configure_routes(&self, context: &PluginContext) -> Option<PluginRoutes> {
            let greeting = context.get_service::<Greeting>()?;
            let router = Router::new().route(
                "/greet",
                post(move || {
                    let greeting = greeting.clone();
                    async move { greeting.0 }
                }),
            );
            Some(PluginRoutes::new(router))
        }

        fn configure_middleware(&self, _context: &PluginContext) -> Option<PluginMiddlewareCollection> {
            let mut collection = PluginMiddlewareCollection::new();

            let order = self.order.clone();
            collection.add_auth_middleware("auth", "greeting", "/greet", move |req, next: Next| {
                let order = order.clone();
                async move {
                    order.lock().unwrap().push("security");
                    Ok(next.run(req).await)
                }
            });

            let order = self.order.clone();
            collection.add_observability_middleware("log", "greeting", move |req, next: Next| {
                let order = order.clone();
                async move {
                    order.lock().unwrap().push("observability");
                    Ok(next.run(req).await)
                }
            });

            Some(collection)
        }
    }

    #[test]
    fn test_service_registry_roundtrip() {
        let registry = ServiceRegistry::new();
        registry.register(Arc::new(Greeting("hi")));

        assert_eq!(registry.get::<Greeting>().unwrap().0, "hi");
        assert!(registry.get::<String>().is_none());
    }

    #[test]
    fn test_plugin_state_is_keyed_by_name() {
        let registry = PluginStateRegistry::new();
        registry.register_state("a", Arc::new(1_u32));

        assert_eq!(*registry.get_state::<u32>("a").unwrap(), 1);
        assert!(registry.get_state::<u32>("b").is_none());
        assert!(registry.get_state::<String>("a").is_none());
    }

    #[tokio::test]
    async fn test_application_mounts_under_base_url_in_priority_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut manager = PluginManager::new();
        manager.register_plugin(Box::new(GreetingPlugin {
            order: order.clone(),
        }));
        manager.initialize_plugins().await.unwrap();

        let app = manager.build_application("/hub/");

        let response = app
            .clone()
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/hub/greet")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(*order.lock().unwrap(), vec!["observability", "security"]);

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/hub/openapi.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
