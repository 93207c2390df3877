// src/main.rs

use std::str::FromStr;

use clap::Parser;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use recast::api::http::router;
use recast::config::CONFIG;
use recast::state::build_app_state;

#[derive(Parser)]
#[command(name = "recast", version, about = "Repository discovery and history recasting service")]
struct Cli {
    /// Bind host (overrides RECAST_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides RECAST_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Enable the periodic console status display
    #[arg(long)]
    display: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = Level::from_str(&CONFIG.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting recast v{}", env!("CARGO_PKG_VERSION"));
    info!("Clone directory: {}", CONFIG.clone_directory);
    info!(
        "Text generation: {}",
        if CONFIG.llm_api_key_opt().is_some() { "enabled" } else { "disabled" }
    );

    let state = build_app_state()?;
    if cli.display || CONFIG.status_display {
        state.tracker.clone().start();
        info!("Console status display enabled");
    }
    state.tracker.add_output_line("recast server starting", "system");

    let app = router(state);
    let host = cli.host.unwrap_or_else(|| CONFIG.host.clone());
    let port = cli.port.unwrap_or(CONFIG.port);
    let bind_address = format!("{}:{}", host, port);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("recast listening on http://{}", bind_address);
    axum::serve(listener, app).await?;

    Ok(())
}
