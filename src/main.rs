use std::net::TcpListener;
use std::sync::Arc;

use kilroy::configuration::get_configuration;
use kilroy::identity::InMemoryMemberStore;
use kilroy::startup::run;
use kilroy::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry("info");

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!(session = ?config.session, "Configuration loaded successfully");
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

    let address = configuration.application.address();
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let store = Arc::new(InMemoryMemberStore::new());
    let server = run(listener, configuration.session, store)?;
    tracing::info!("Server started successfully");

    server.await
}
