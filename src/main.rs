use std::process::ExitCode;

use catmusic_server::{App, Config, Router, Server};
use tracing::error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    // The music API handlers live with the deployment that mounts them; the
    // stock binary serves the front-end build only.
    let api = Router::new();

    let app = App::new(&config, api);
    if let Err(e) = Server::bind(config.addr()).serve(app).await {
        error!("server error: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

/// Human-readable output by default, JSON when `LOG_FORMAT=json`.
/// `RUST_LOG` overrides the `catmusic_server=info` default.
fn init_tracing() {
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("catmusic_server=info"));

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(filter)
            .init();
    }
}
