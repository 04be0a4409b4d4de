use tracing::subscriber::set_global_default;
use tracing::Subscriber;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::{fmt::MakeWriter, layer::SubscriberExt, EnvFilter, Registry};

/// Composes the tracing layers used by every service into one Subscriber.
///
/// # Arguments
/// - `name`: name of the service, attached to every trace
/// - `fallback_env_filter`: filter level used when RUST_LOG is not set
/// - `sink`: where the bunyan-formatted traces are written
pub fn get_tracing_subscriber<Sink>(
    name: String,
    fallback_env_filter: String,
    sink: Sink,
) -> impl Subscriber + Send + Sync
where
    // The sink must implement `MakeWriter` for all choices of the lifetime parameter
    Sink: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback_env_filter));

    let formatting_layer = BunyanFormattingLayer::new(name, sink);

    Registry::default()
        .with(env_filter)
        // Stores span data in a JSON format usable by the formatting layer,
        // and propagates context from parent spans to their children
        .with(JsonStorageLayer)
        .with(formatting_layer)
}

/// Registers a Subscriber as the global default to process span data.
///
/// Should only be called once per process.
pub fn init_tracing_subscriber(subscriber: impl Subscriber + Send + Sync) {
    // Redirects all `log` events to our subscriber
    LogTracer::init().expect("Failed to set logger");

    set_global_default(subscriber).expect("Failed to set subscriber");
}
