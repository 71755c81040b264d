use {
    tracing::{subscriber::set_global_default, Subscriber},
    tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer},
    tracing_log::LogTracer,
    tracing_subscriber::{fmt::MakeWriter, layer::SubscriberExt, EnvFilter, Registry},
};

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Failed to install the log bridge")]
    LogBridge(#[from] tracing_log::log::SetLoggerError),
    #[error("A global tracing subscriber is already installed")]
    GlobalDefault(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Builds a bunyan-formatted subscriber writing to `sink`.
///
/// `RUST_LOG` takes precedence over `default_filter` when it is set.
pub fn get_subscriber<Sink>(
    name: String,
    default_filter: String,
    sink: Sink,
) -> impl Subscriber + Send + Sync
where
    Sink: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let formatting_layer = BunyanFormattingLayer::new(name, sink);
    Registry::default()
        .with(env_filter)
        .with(JsonStorageLayer)
        .with(formatting_layer)
}

/// Installs `subscriber` process-wide. Must be called at most once.
pub fn init_subscriber(subscriber: impl Subscriber + Send + Sync) -> Result<(), TelemetryError> {
    LogTracer::init()?;
    set_global_default(subscriber)?;
    Ok(())
}
