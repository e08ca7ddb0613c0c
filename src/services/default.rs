use axum::{
    http::{header, Method, StatusCode, Uri},
    response::IntoResponse,
    response::Response,
    body::Body,
    Router
};
use crate::ServerContext;

const NOT_FOUND: &str = include_str!("./not_found.html");

pub fn setup_routes(router: Router<ServerContext>) -> Router<ServerContext> {
    router.fallback(handle_default)
}

async fn handle_default(method: Method, uri: Uri) -> impl IntoResponse {
    let message = format!("{} '{}' is not handled by the dev server", method, uri.path());
    tracing::warn!("{}", message);
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        Body::from(NOT_FOUND.replace("%MESSAGE%", message.as_str())),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn names_method_and_path() {
        let response: Response = handle_default(Method::DELETE, Uri::from_static("/nowhere"))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("DELETE '/nowhere'"), "{body}");
    }
}
