//! Upstream forwarding.
//!
//! # Responsibilities
//! - Forward requests that passed the guard to the protected site
//! - Preserve method, path, query, headers and body
//! - Append the peer address to `X-Forwarded-For`
//! - Stream the upstream response back unchanged
//!
//! # Design Decisions
//! - Single upstream, single attempt: no retries, no load balancing
//! - Upstream connection failure maps to 502 Bad Gateway

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{
        header::{HeaderValue, InvalidHeaderValue},
        uri::{Authority, InvalidUri, Scheme},
        HeaderName, Request, StatusCode, Uri,
    },
    response::{IntoResponse, Response},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::http::request::RequestIdExt;
use crate::http::middleware::xmlrpc_guard::source_ip;
use crate::observability::metrics;

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Client and target for forwarded requests.
#[derive(Clone)]
pub struct ProxyState {
    pub client: Client<HttpConnector, Body>,
    pub upstream: Authority,
}

impl ProxyState {
    pub fn new(upstream: &str, connect_timeout: Duration) -> Result<Self, InvalidUri> {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));

        Ok(Self {
            client: Client::builder(TokioExecutor::new()).build(connector),
            upstream: upstream.parse()?,
        })
    }

    /// Point a request URI at the upstream, keeping path and query.
    pub fn upstream_uri(&self, uri: &Uri) -> Result<Uri, axum::http::Error> {
        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(self.upstream.clone())
            .path_and_query(path_and_query)
            .build()
    }
}

fn append_forwarded_for(
    req: &mut Request<Body>,
    peer: Option<SocketAddr>,
) -> Result<(), InvalidHeaderValue> {
    let Some(peer) = peer else {
        return Ok(());
    };
    let ip = source_ip(peer);

    let value = match req.headers().get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) => format!("{existing}, {ip}"),
        None => ip,
    };
    req.headers_mut()
        .insert(X_FORWARDED_FOR, HeaderValue::from_str(&value)?);
    Ok(())
}

/// Forward a request to the upstream site.
pub async fn forward_handler(State(state): State<ProxyState>, mut request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let method = request.method().to_string();
    let request_id = request.request_id().to_string();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    match state.upstream_uri(request.uri()) {
        Ok(uri) => *request.uri_mut() = uri,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Could not build upstream URI");
            metrics::record_request(&method, 400, start_time);
            return (StatusCode::BAD_REQUEST, "Bad request").into_response();
        }
    }

    if let Err(e) = append_forwarded_for(&mut request, peer) {
        tracing::debug!(request_id = %request_id, error = %e, "Dropping unrepresentable X-Forwarded-For");
    }

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        uri = %request.uri(),
        "Forwarding request"
    );

    match state.client.request(request).await {
        Ok(response) => {
            let status = response.status();
            metrics::record_request(&method, status.as_u16(), start_time);

            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Upstream error");
            metrics::record_request(&method, 502, start_time);
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}
