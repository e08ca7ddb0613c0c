use std::time::Duration;
use axum::{
    extract::{
        ws::{self, WebSocket, WebSocketUpgrade},
        FromRequestParts, Request,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use tokio::{net::TcpStream, select, time::timeout};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        protocol::{frame::coding::CloseCode, CloseFrame, Message},
    },
    MaybeTlsStream, WebSocketStream,
};
use crate::{
    ServerContext,
    config::ProxyRule,
    services::reverse_proxy::strip_hop_by_hop,
};

type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Accepts a websocket upgrade and bridges it to the rule's target. The
/// upstream connection is opened first so a dead backend yields a 502
/// instead of a socket that closes right away.
pub async fn forward_to(context: &ServerContext, rule: &ProxyRule, req: Request) -> Response {
    let (mut parts, _body) = req.into_parts();
    let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, context).await {
        Ok(upgrade) => upgrade,
        Err(rejection) => return rejection.into_response(),
    };

    let path = parts.uri.path().to_string();
    let uri = match rule.websocket_uri(&parts.uri) {
        Ok(uri) => uri,
        Err(err) => {
            tracing::error!("Could not build upstream websocket URI for {path}: {err}");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };
    let mut upstream_req = match uri.clone().into_client_request() {
        Ok(upstream_req) => upstream_req,
        Err(err) => {
            tracing::error!("Could not build upstream websocket request for {path}: {err}");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    // end-to-end headers (cookies, auth, origin, subprotocols) travel with the handshake
    let mut headers = parts.headers.clone();
    strip_hop_by_hop(&mut headers);
    for (name, value) in headers.iter() {
        let key = name.as_str();
        if name == header::HOST
            || (key.starts_with("sec-websocket-") && name != header::SEC_WEBSOCKET_PROTOCOL)
        {
            continue;
        }
        upstream_req.headers_mut().append(name.clone(), value.clone());
    }
    let host = if rule.change_origin {
        Some(rule.host_header().clone())
    } else {
        parts.headers.get(header::HOST).cloned()
    };
    if let Some(host) = host {
        upstream_req.headers_mut().insert(header::HOST, host);
    }

    let (upstream, response) = match connect_async(upstream_req).await {
        Ok(connected) => connected,
        Err(err) => {
            let message = format!("Proxy error: could not proxy websocket {path} to {uri}: {err}");
            tracing::error!("{message}");
            return (StatusCode::BAD_GATEWAY, message).into_response();
        }
    };
    tracing::debug!("Websocket {path} -> {uri}");

    let upgrade = match response
        .headers()
        .get(header::SEC_WEBSOCKET_PROTOCOL)
        .and_then(|value| value.to_str().ok())
    {
        Some(protocol) => upgrade.protocols([protocol.to_string()]),
        None => upgrade,
    };
    upgrade.on_upgrade(move |socket| bridge(socket, upstream, path))
}

async fn bridge(client: WebSocket, upstream: UpstreamSocket, path: String) {
    let (mut client_tx, mut client_rx) = client.split();
    let (mut upstream_tx, mut upstream_rx) = upstream.split();

    // Each side keeps reading after a close frame: tungstenite queues the
    // close reply and only flushes it on the next read.
    let client_to_upstream = async {
        while let Some(Ok(msg)) = client_rx.next().await {
            let closing = matches!(msg, ws::Message::Close(_));
            if let Err(err) = upstream_tx.send(to_upstream(msg)).await {
                if !closing {
                    tracing::warn!("Websocket {path}: sending to upstream failed: {err}");
                }
                break;
            }
        }
        let _ = upstream_tx.close().await;
    };
    let upstream_to_client = async {
        while let Some(result) = upstream_rx.next().await {
            let msg = match result {
                Ok(msg) => msg,
                Err(err) => {
                    tracing::warn!("Websocket {path}: upstream error: {err}");
                    break;
                }
            };
            let Some(msg) = to_client(msg) else { continue };
            let closing = matches!(msg, ws::Message::Close(_));
            if let Err(err) = client_tx.send(msg).await {
                if !closing {
                    tracing::warn!("Websocket {path}: sending to client failed: {err}");
                }
                break;
            }
        }
        let _ = client_tx.close().await;
    };
    tokio::pin!(client_to_upstream, upstream_to_client);

    // once one side is done the other gets a moment to finish its close handshake
    select! {
        _ = &mut client_to_upstream => {
            let _ = timeout(CLOSE_TIMEOUT, upstream_to_client).await;
        }
        _ = &mut upstream_to_client => {
            let _ = timeout(CLOSE_TIMEOUT, client_to_upstream).await;
        }
    }
    tracing::debug!("Websocket {path} closed");
}

fn to_upstream(msg: ws::Message) -> Message {
    match msg {
        ws::Message::Text(text) => Message::Text(text),
        ws::Message::Binary(data) => Message::Binary(data),
        ws::Message::Ping(data) => Message::Ping(data),
        ws::Message::Pong(data) => Message::Pong(data),
        ws::Message::Close(frame) => Message::Close(frame.map(|frame| CloseFrame {
            code: CloseCode::from(frame.code),
            reason: frame.reason,
        })),
    }
}

/// Raw frames never come out of a tungstenite read, hence the `Option`.
fn to_client(msg: Message) -> Option<ws::Message> {
    match msg {
        Message::Text(text) => Some(ws::Message::Text(text)),
        Message::Binary(data) => Some(ws::Message::Binary(data)),
        Message::Ping(data) => Some(ws::Message::Ping(data)),
        Message::Pong(data) => Some(ws::Message::Pong(data)),
        Message::Close(frame) => Some(ws::Message::Close(frame.map(|frame| ws::CloseFrame {
            code: frame.code.into(),
            reason: frame.reason,
        }))),
        Message::Frame(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_codes_survive_both_directions() {
        let msg = ws::Message::Close(Some(ws::CloseFrame {
            code: 4001,
            reason: "session expired".into(),
        }));
        let Message::Close(Some(frame)) = to_upstream(msg) else {
            panic!("expected a close frame");
        };
        assert_eq!(u16::from(frame.code), 4001);

        let Some(ws::Message::Close(Some(frame))) = to_client(Message::Close(Some(frame))) else {
            panic!("expected a close frame");
        };
        assert_eq!(frame.code, 4001);
        assert_eq!(frame.reason, "session expired");
    }

    #[test]
    fn data_frames_keep_payload() {
        assert_eq!(to_upstream(ws::Message::Text("hi".into())), Message::Text("hi".into()));
        assert_eq!(to_client(Message::Binary(vec![1, 2, 3])), Some(ws::Message::Binary(vec![1, 2, 3])));
    }
}
