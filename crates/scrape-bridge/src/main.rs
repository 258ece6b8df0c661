use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use scrape_bridge::{ScrapeBridge, Settings, transport::serve};

/// Initialize tracing with SCRAPE_BRIDGE_LOG and LOG_FORMAT support.
fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match std::env::var("SCRAPE_BRIDGE_LOG").as_deref() {
            Ok("debug") => "debug",
            Ok("warn") | Ok("warning") => "warn",
            Ok("error") => "error",
            _ => "info",
        };

        EnvFilter::new(format!("scrape_bridge={level},tower_http={level}"))
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("scrape-bridge {}", env!("CARGO_PKG_VERSION"));

    let settings = Settings::from_env()?;
    let bridge = Arc::new(ScrapeBridge::new(settings.bridge));

    let config = bridge.config();
    info!(
        program = %config.worker.program,
        args = ?config.worker.args,
        max_workers = ?config.max_concurrent_workers,
        timeout = ?config.worker_timeout,
        kill_on_disconnect = config.kill_on_disconnect,
        "Worker configuration"
    );

    serve(settings.server, bridge).await
}
