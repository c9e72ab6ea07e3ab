use std::process::ExitCode;

use tracing::{error, info};

use quill::web::WebServer;
use quill::{Config, Database};

#[tokio::main]
async fn main() -> ExitCode {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    // Load configuration
    let config = match Config::load_with_env(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {path}: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e}");
        return ExitCode::FAILURE;
    }

    // Initialize logging
    if let Err(e) = quill::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        quill::logging::init_console_only(&config.logging.level);
    }

    info!("Quill - session-authenticated blog service");

    let db = match Database::from_config(&config.database).await {
        Ok(db) => db,
        Err(e) => {
            error!(error = %e, path = %config.database.path, "Failed to open database");
            return ExitCode::FAILURE;
        }
    };

    let server = match WebServer::new(&config, db) {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "Failed to set up web server");
            return ExitCode::FAILURE;
        }
    };

    info!(addr = %server.addr(), "Starting web server");
    if let Err(e) = server.run().await {
        error!(error = %e, "Web server stopped");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
