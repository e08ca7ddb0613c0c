mod utils;
mod config;
mod commands;
mod services;

use std::path::PathBuf;
use std::sync::Arc;
use anyhow::{anyhow, Result};
use axum::{
    Router,
    ServiceExt,
    body::Body,
    extract::Request
};
use tokio::{net::TcpListener, task::JoinHandle};
use hyper_util::{client::legacy::connect::HttpConnector, rt::TokioExecutor};
use rustyline_async::Readline;
use crate::commands::CommandManager;
use crate::config::{ConfigError, DevConfig, ProxyRule};

type HttpClient = hyper_util::client::legacy::Client<HttpConnector, Body>;

#[derive(Clone)]
pub struct ServerContext {
    pub config: Arc<DevConfig>,
    pub rules: Arc<[ProxyRule]>,
    pub client: HttpClient,
}

impl ServerContext {
    pub fn new(config: DevConfig) -> Result<Self, ConfigError> {
        let rules = config.compile_rules()?;
        let client: HttpClient = hyper_util::client::legacy::Client::<(), ()>::builder(TokioExecutor::new())
            .build(HttpConnector::new());
        Ok(Self {
            config: Arc::new(config),
            rules: rules.into(),
            client,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // init
    let console = Readline::new("devgate> ".to_string()).ok();
    let _guard = utils::init_tracing(console.as_ref().map(|(_, out)| out.clone()));
    utils::banner();

    // load config, nothing is applied until all of it validates
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(config::DEFAULT_CONFIG_PATH));
    let context = match load_context(&config_path) {
        Ok(context) => context,
        Err(err) => {
            let error_msg = format!("Failed to load config {}: {}", config_path.display(), err);
            tracing::error!("{error_msg}");
            return Err(anyhow!("{error_msg}"));
        }
    };
    for rule in context.rules.iter() {
        tracing::info!("Proxy rule {rule}");
    }

    // init app
    let app = create_router(&context);
    let app = app.with_state(context.clone());

    // init server
    let addr = context.config.dev_server.bind_addr()?;
    let server = match TcpListener::bind(addr).await {
        Ok(server) => server,
        Err(err) => {
            let error_msg = format!("Failed to bind TCP listener: {}", err);
            tracing::error!("{error_msg}");
            return Err(anyhow!("{error_msg}"));
        }
    };

    let console = console.map(|(rl, out)| CommandManager::new(context).run(rl, out));
    if console.is_none() {
        tracing::info!("No terminal attached, console commands disabled");
    }

    tracing::info!("Server is listening at {addr}");
    axum::serve(server, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(shutdown_signal(console))
        .await?;
    tracing::info!("Server stopped");

    Ok(())
}

fn load_context(path: &std::path::Path) -> Result<ServerContext, ConfigError> {
    let config = config::load_or_create_config(path)?;
    let output_dir = config::prepare_output_dir(&config)?;
    tracing::info!("Build output directory: {}", output_dir.display());
    ServerContext::new(config)
}

async fn shutdown_signal(console: Option<JoinHandle<()>>) {
    match console {
        Some(console) => {
            let _ = console.await;
        }
        None => {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {err}");
                std::future::pending::<()>().await;
            }
            tracing::info!("Received Ctrl+C, shutting down...");
        }
    }
}

fn create_router(context: &ServerContext) -> Router<ServerContext> {
    let mut router = Router::new();
    // setup all routes
    router = services::api::setup_routes(router);
    router = services::web::setup_routes(router);
    router = services::default::setup_routes(router);
    // proxy rules run before any route, so it goes on last
    services::reverse_proxy::setup_routes(router, context)
}
