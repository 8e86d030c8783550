//! `mvc-router` host binary.
//!
//! Loads an application config, builds the [`App`] and serves it until
//! Ctrl+C or SIGTERM.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use serde_json::json;
use tokio::net::TcpListener;

use mvc_router::config::load_config;
use mvc_router::lifecycle::signals;
use mvc_router::mvc::{ActionOutput, Controller, FnController};
use mvc_router::observability::{logging, metrics};
use mvc_router::{register_controller, ApiResponse, App, HttpServer, RouteError, Shutdown};

#[derive(Debug, Parser)]
#[command(name = "mvc-router", version, about = "Serve an MVC application")]
struct Cli {
    /// Application config file (TOML).
    #[arg(short, long, default_value = "config/app.toml")]
    config: PathBuf,

    /// Override `listener.bindAddress`.
    #[arg(long)]
    bind: Option<String>,
}

fn index_controller() -> Box<dyn Controller> {
    Box::new(FnController::new().action("index", |cx, _args| async move {
        let name = cx.ctx.app().config().name.clone();
        let body = ApiResponse::ok(json!({ "app": name, "message": "It works" }));
        Ok::<_, RouteError>(ActionOutput::Api(body))
    }))
}

register_controller!("IndexController", index_controller);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.config)?;
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if config.base_dir.is_none() {
        config.base_dir = cli.config.parent().map(Path::to_path_buf);
    }

    logging::init(&config.observability)?;
    tracing::info!(config = %cli.config.display(), "mvc-router v0.1.0 starting");

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let app = App::builder(config).build()?;
    let server = HttpServer::new(app.clone())?;

    let listener = TcpListener::bind(&app.config().listener.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        request_timeout_secs = app.config().timeouts.request_secs,
        "Listening for connections"
    );

    let shutdown = Arc::new(Shutdown::new());
    let server_shutdown = shutdown.subscribe();
    let trigger = shutdown.clone();
    tokio::spawn(async move { trigger.trigger_on(signals::terminate()).await });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
