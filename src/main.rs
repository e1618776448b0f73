use code_cast::api::router;
use code_cast::command::ProcessRunner;
use code_cast::config::load_config;
use code_cast::logging::{FileLogger, setup_logging};
use code_cast::settings::Settings;
use code_cast::AppState;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let file_logger = settings.log_directory.clone().map(FileLogger::new);
    // Keeps the file writer flushing until shutdown
    let _log_guard = match setup_logging(file_logger.as_ref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    // The config is re-read per webhook; this only reports problems early.
    match load_config(&settings.config_dir).await {
        Ok(config) => info!(
            "Using config at {:?} with {} listener(s)",
            settings.config_dir,
            config.listeners.len()
        ),
        Err(e) => warn!("{}; webhooks will fail until it is fixed", e),
    }

    let bind_address = settings.bind_address.clone();
    let state = Arc::new(AppState::new(settings, Arc::new(ProcessRunner)));
    let app = router(state);

    let listener = match tokio::net::TcpListener::bind(&bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", bind_address, e);
            std::process::exit(1);
        }
    };
    info!("Listening on {}", bind_address);

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
