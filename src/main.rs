use session_guard::configuration::get_configuration;
use session_guard::startup::Application;
use session_guard::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    // Missing or unusable secrets are fatal here, never per request
    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    let application = Application::build(configuration).map_err(|e| {
        tracing::error!("Failed to build application: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, "Startup error")
    })?;
    tracing::info!(port = application.port(), "Server started successfully");

    application.run_until_stopped().await
}
