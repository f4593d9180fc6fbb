use tracing::Subscriber;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Build a JSON subscriber filtered by `RUST_LOG`, falling back to `default_filter`
pub fn get_subscriber(default_filter: &str) -> impl Subscriber + Send + Sync {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let formatting_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .json();

    Registry::default().with(env_filter).with(formatting_layer)
}

/// Install structured JSON logging for the process
///
/// Security events carry a `security_event = true` field so they can be
/// filtered downstream.
pub fn init_telemetry() {
    get_subscriber("info").init();
}
