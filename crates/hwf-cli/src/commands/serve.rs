use axum::Router;
use clap::Args;
use hwf_config::{CaliperSettings, ServerConfig, SinkKind};
use hwf_core::plugin::PluginManager;
use hwf_telemetry::TelemetryPlugin;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

#[derive(Args)]
pub struct ServeCommand {
    /// Address to bind the server to
    #[arg(long, default_value = "127.0.0.1:8888", env = "HWF_ADDRESS")]
    pub address: String,

    /// Path prefix every route is mounted under
    #[arg(long, default_value = "/", env = "HWF_BASE_URL")]
    pub base_url: String,

    /// Token clients must present. A random one is generated when omitted
    #[arg(long, env = "HWF_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Where accepted events go: console or caliper
    #[arg(long, default_value = "caliper", env = "HWF_SINK")]
    pub sink: SinkKind,

    /// Collector endpoint URL
    #[arg(long, env = "HWF_CALIPER_ENDPOINT")]
    pub caliper_endpoint: Option<String>,

    /// Collector bearer credential
    #[arg(long, env = "HWF_CALIPER_API_KEY", hide_env_values = true)]
    pub caliper_api_key: Option<String>,

    /// Sensor identity announced in every envelope
    #[arg(long, env = "HWF_CALIPER_SENSOR_ID")]
    pub caliper_sensor_id: Option<String>,

    /// Log every outgoing envelope at debug level
    #[arg(long, env = "HWF_CALIPER_DEBUG")]
    pub caliper_debug: bool,

    /// Collector request timeout in seconds. Without it a slow collector
    /// only delays the response
    #[arg(long, env = "HWF_CALIPER_TIMEOUT_SECS")]
    pub caliper_timeout_secs: Option<u64>,

    /// Metadata attached to every event, as KEY=VALUE (repeatable)
    #[arg(long = "metadata", value_name = "KEY=VALUE")]
    pub metadata: Vec<String>,

    /// JSON or YAML file with metadata attached to every event
    #[arg(long, env = "HWF_METADATA_FILE")]
    pub metadata_file: Option<PathBuf>,
}

impl ServeCommand {
    pub fn into_config(self) -> anyhow::Result<ServerConfig> {
        let defaults = CaliperSettings::default();
        let caliper = CaliperSettings {
            endpoint_url: self.caliper_endpoint.unwrap_or(defaults.endpoint_url),
            api_key: self.caliper_api_key.unwrap_or(defaults.api_key),
            sensor_id: self.caliper_sensor_id.unwrap_or(defaults.sensor_id),
            debug: self.caliper_debug,
            timeout_secs: self.caliper_timeout_secs,
            ..defaults
        };

        let config = ServerConfig::new(self.address, &self.base_url, self.token)
            .with_sink(self.sink)
            .with_caliper(caliper)
            .with_metadata(self.metadata_file.as_deref(), &self.metadata)?;

        config.validate()?;
        Ok(config)
    }

    pub fn execute(self) -> anyhow::Result<()> {
        let config = Arc::new(self.into_config()?);

        if config.sink == SinkKind::Caliper
            && config.caliper.api_key == CaliperSettings::default().api_key
        {
            warn!("Collector credential is the placeholder value; events will likely be rejected");
        }

        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(start_server(config))
    }
}

pub async fn build_app(config: Arc<ServerConfig>) -> anyhow::Result<Router> {
    let mut plugin_manager = PluginManager::new();
    plugin_manager.register_plugin(Box::new(TelemetryPlugin::new(config.clone())));

    debug!("Initializing plugins");
    plugin_manager
        .initialize_plugins()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize plugins: {}", e))?;

    Ok(plugin_manager
        .build_application(&config.base_url)
        .layer(TraceLayer::new_for_http()))
}

async fn start_server(config: Arc<ServerConfig>) -> anyhow::Result<()> {
    let app = build_app(config.clone()).await?;

    let listener = TcpListener::bind(&config.address).await?;
    log_startup(&config);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Telemetry server stopped");
    Ok(())
}

fn log_startup(config: &ServerConfig) {
    info!(
        "Telemetry server listening on {} (sink: {}, metadata keys: {})",
        config.address,
        config.sink,
        config.metadata.len()
    );
    info!("Events are accepted at POST {}", config.event_route());

    // Operator-supplied tokens stay out of the log
    if config.token_generated {
        info!("Generated server token: {}", config.token);
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown..."),
        Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
    }
}
