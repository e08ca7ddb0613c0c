use axum::{
    Router,
    routing::get,
    extract::State,
    Json
};
use serde::Serialize;
use crate::{
    ServerContext,
    config::DevConfig
};

pub const CONFIG_PATH: &str = "/__devgate/config";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigReport {
    config: DevConfig,
    /// Compiled rules in evaluation order.
    rules: Vec<String>,
}

pub fn setup_routes(router: Router<ServerContext>) -> Router<ServerContext> {
    tracing::info!("Setting up route for API service");
    router
        .route(CONFIG_PATH, get(show_config))
}

async fn show_config(
    State(context): State<ServerContext>,
) -> Json<ConfigReport> {
    Json(ConfigReport {
        config: context.config.as_ref().clone(),
        rules: context.rules.iter().map(ToString::to_string).collect(),
    })
}
