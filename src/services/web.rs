use std::path::{Component, Path, PathBuf};
use axum::{
    Router,
    routing::get,
    response::Response,
    http::{header, HeaderMap, StatusCode, Uri},
    extract::State,
    body::Body
};
use tokio::{
    fs::{self, File},
    io::AsyncReadExt
};
use crate::{
    ServerContext,
    config::DevConfig
};

const NOT_FOUND: &str = include_str!("./not_found.html");

pub fn setup_routes(router: Router<ServerContext>) -> Router<ServerContext> {
    tracing::info!("Setting up route for Web service");
    router
        .route("/", get(get_file))
        .route("/*path", get(get_file))
}

/// Maps a request path onto a file below `output_dir`. Directories resolve
/// to their `index.html`; anything escaping the directory resolves to nothing.
pub async fn local_file(output_dir: &Path, request_path: &str) -> Option<PathBuf> {
    let relative = Path::new(request_path.trim_start_matches('/'));
    if relative.components().any(|part| !matches!(part, Component::Normal(_))) {
        return None;
    }
    let path = output_dir.join(relative);
    if is_file(&path).await {
        return Some(path);
    }
    let index = path.join("index.html");
    is_file(&index).await.then_some(index)
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path).await.is_ok_and(|metadata| metadata.is_file())
}

/// Whether the dev server answers this request itself: the file exists, or
/// it is a page navigation that the app's `index.html` handles.
pub async fn serves_locally(config: &DevConfig, headers: &HeaderMap, path: &str) -> bool {
    let wants_html = headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"));
    wants_html || local_file(&config.output_dir, path).await.is_some()
}

fn is_virtual_route(path: &str) -> bool {
    !path.rsplit('/').next().unwrap_or("").contains('.')
}

async fn get_file(
    State(context): State<ServerContext>,
    uri: Uri,
) -> Result<Response, StatusCode> {
    let config = &context.config;
    let output_dir = config.output_dir.as_path();
    let path = uri.path();
    match local_file(output_dir, path).await {
        // file, access an exist file
        Some(file_path) => serve_file_by_path(&file_path).await,
        // not a file, SPA route
        None if is_virtual_route(path) && config.dev_server.history_api_fallback => {
            serve_file_by_path(&output_dir.join("index.html")).await
        }
        // 404
        None => {
            let message = format!("Not found file {}", path);
            tracing::warn!("{message}");
            Ok(Response::builder()
                .status(StatusCode::NOT_FOUND)
                .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
                .body(Body::from(NOT_FOUND.replace("%MESSAGE%", message.as_str())))
                .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?)
        },
    }
}

async fn serve_file_by_path(file_path: &Path) -> Result<Response, StatusCode> {
    let mut file = match File::open(file_path).await {
        Ok(file) => file,
        Err(_) => {
            tracing::warn!("Not found file {}", file_path.display());
            return Err(StatusCode::NOT_FOUND);
        },
    };

    let mut contents = Vec::new();
    if let Err(err) = file.read_to_end(&mut contents).await {
        tracing::error!("Error in reading file {}: {}", file_path.display(), err);
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    let mime_type = mime_guess::from_path(file_path).first_or_octet_stream();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime_type.as_ref())
        .body(contents.into())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
