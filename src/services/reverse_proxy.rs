use std::collections::HashSet;
use axum::{
    Router,
    body::Body,
    extract::{Request, State},
    http::{
        header::{self, HeaderMap, HeaderName},
        StatusCode,
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use lazy_static::lazy_static;
use crate::{
    ServerContext,
    config::{find_rule, ProxyRule},
    services::{web, websocket_proxy},
};

lazy_static! {
    static ref HOP_BY_HOP: HashSet<HeaderName> = [
        header::CONNECTION,
        HeaderName::from_static("keep-alive"),
        header::PROXY_AUTHENTICATE,
        header::PROXY_AUTHORIZATION,
        header::TE,
        header::TRAILER,
        header::TRANSFER_ENCODING,
        header::UPGRADE,
    ].into_iter().collect();
}

pub fn setup_routes(router: Router<ServerContext>, context: &ServerContext) -> Router<ServerContext> {
    if context.rules.is_empty() {
        return router;
    }
    tracing::info!("Setting up {} reverse proxy rule(s)", context.rules.len());
    router.layer(middleware::from_fn_with_state(context.clone(), forward_to))
}

async fn forward_to(
    State(context): State<ServerContext>,
    req: Request,
    next: Next,
) -> Response {
    let Some(rule) = find_rule(&context.rules, req.uri().path()) else {
        return next.run(req).await;
    };
    if rule.fallback_only && web::serves_locally(&context.config, req.headers(), req.uri().path()).await {
        return next.run(req).await;
    }
    if rule.ws && is_upgrade_request(req.headers()) {
        return websocket_proxy::forward_to(&context, rule, req).await;
    }
    match forward_http(&context, rule, req).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn forward_http(
    context: &ServerContext,
    rule: &ProxyRule,
    mut req: Request,
) -> Result<Response, (StatusCode, String)> {
    let path = req.uri().path().to_string();
    let uri = rule.forward_uri(req.uri()).map_err(|err| {
        tracing::error!("Could not build upstream URI for {path}: {err}");
        (StatusCode::BAD_REQUEST, format!("Proxy error: bad request path {path}"))
    })?;
    tracing::debug!("{} {} -> {}", req.method(), req.uri(), uri);

    *req.uri_mut() = uri;
    strip_hop_by_hop(req.headers_mut());
    if rule.change_origin {
        req.headers_mut().insert(header::HOST, rule.host_header().clone());
    }

    let response = context.client.request(req).await.map_err(|err| {
        let message = format!("Proxy error: could not proxy request {path} to {}: {err}", rule.target());
        tracing::error!("{message}");
        (StatusCode::BAD_GATEWAY, message)
    })?;

    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Ok(Response::from_parts(parts, Body::new(body)))
}

pub(crate) fn is_upgrade_request(headers: &HeaderMap) -> bool {
    let connection_upgrade = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));
    connection_upgrade && headers.contains_key(header::UPGRADE)
}

/// Removes hop-by-hop headers, including any the `Connection` header names.
pub(crate) fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect();
    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn detects_upgrade_requests() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, Upgrade"));
        headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
        assert!(is_upgrade_request(&headers));

        headers.remove(header::UPGRADE);
        assert!(!is_upgrade_request(&headers));
    }

    #[test]
    fn strips_hop_by_hop_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("close, x-session-hint"));
        headers.insert("x-session-hint", HeaderValue::from_static("1"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(header::HOST, HeaderValue::from_static("localhost:8088"));

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 2);
        assert_eq!(headers[header::ACCEPT], "application/json");
        assert_eq!(headers[header::HOST], "localhost:8088");
    }
}
