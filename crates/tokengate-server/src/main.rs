use std::path::PathBuf;

use clap::Parser;
use tokengate_server::ServerBuilder;
use tokengate_server::config::loader::{DEFAULT_CONFIG_PATH, load_config};

/// OAuth 2.0 token endpoint server.
#[derive(Debug, Parser)]
#[command(name = "tokengate-server", version, about)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(
        short,
        long,
        env = "TOKENGATE_CONFIG",
        default_value = DEFAULT_CONFIG_PATH
    )]
    config: PathBuf,

    /// Override the listen port from the configuration
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist - it's optional
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    let args = Args::parse();

    // Initialize tracing early with the default level
    tokengate_server::observability::init_tracing();

    let config_path = args.config.to_string_lossy().to_string();
    let explicit = args.config.as_os_str() != DEFAULT_CONFIG_PATH;
    let mut cfg = match load_config(explicit.then_some(config_path.as_str())) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };
    if let Some(port) = args.port {
        cfg.server.port = port;
    }

    tracing::info!(
        path = %config_path,
        issuer = %cfg.auth.issuer,
        clients = cfg.clients.len(),
        "Configuration loaded"
    );

    tokengate_server::observability::apply_logging_level(&cfg.logging.level);

    let server = match ServerBuilder::new().with_config(cfg).build().await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Server initialization failed: {e}");
            std::process::exit(2);
        }
    };

    if let Err(err) = server.run().await {
        eprintln!("Server error: {err}");
        std::process::exit(1);
    }
}
