//! XML-RPC guard middleware.
//!
//! Builds a [`RequestContext`] from the HTTP request and applies the
//! [`AccessGuard`] decision. A halted request gets the rejection response
//! and the inner service is never called.
//!
//! The XML-RPC check runs on a normalized path (percent-decoded, `.`/`..`
//! resolved, repeated slashes collapsed) and also matches PATH_INFO
//! suffixes, so `//xmlrpc.php`, `/xmlrpc%2Ephp` and `/xmlrpc.php/x` are
//! classified the same way the upstream's script dispatch would see them.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use percent_encoding::percent_decode_str;

use crate::config::GuardConfig;
use crate::http::request::RequestIdExt;
use crate::observability::metrics;
use crate::security::{AccessGuard, Decision, RangeError, RequestContext};

/// Name of the query parameter carrying the provider identity claim.
pub const FOR_PARAM: &str = "for";

/// Everything the middleware needs, compiled from [`GuardConfig`].
#[derive(Debug, Clone)]
pub struct GuardState {
    pub enabled: bool,
    pub guard: AccessGuard,
    pub xmlrpc_paths: Vec<String>,
    pub rejection_message: String,
    pub rejection_status: StatusCode,
}

impl GuardState {
    pub fn from_config(config: &GuardConfig) -> Result<Self, RangeError> {
        Ok(Self {
            enabled: config.enabled,
            guard: AccessGuard::from_entries(config.provider_identity.clone(), &config.ranges)?,
            xmlrpc_paths: config.xmlrpc_paths.iter().map(|p| normalize_path(p)).collect(),
            rejection_message: config.rejection_message.clone(),
            // Validation rejects bad codes; fall back rather than panic if it was skipped.
            rejection_status: StatusCode::from_u16(config.rejection_status)
                .unwrap_or(StatusCode::FORBIDDEN),
        })
    }

    /// Whether a raw request path resolves to one of the XML-RPC scripts.
    pub fn is_xmlrpc_path(&self, raw_path: &str) -> bool {
        let path = normalize_path(raw_path);
        self.xmlrpc_paths.iter().any(|script| {
            path == *script
                || path
                    .strip_prefix(script.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    /// Build the guard's view of a request.
    pub fn request_context<B>(&self, req: &Request<B>) -> RequestContext {
        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        RequestContext {
            is_xmlrpc: self.is_xmlrpc_path(req.uri().path()),
            for_param: req.uri().query().and_then(for_param),
            source_ip: peer.map(source_ip).unwrap_or_default(),
        }
    }

    fn rejection(&self) -> Response {
        (self.rejection_status, self.rejection_message.clone()).into_response()
    }
}

/// Canonical form of a request path: decoded once, dot segments resolved,
/// empty segments dropped. Backslashes count as separators.
pub fn normalize_path(raw: &str) -> String {
    let decoded = percent_decode_str(raw).decode_utf8_lossy();
    let mut segments: Vec<&str> = Vec::new();

    for segment in decoded.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    format!("/{}", segments.join("/"))
}

/// Hot-swappable guard state shared by every request.
pub type SharedGuardState = Arc<ArcSwap<GuardState>>;

pub fn shared(state: GuardState) -> SharedGuardState {
    Arc::new(ArcSwap::from_pointee(state))
}

/// Decoded value of the `for` parameter. The last occurrence wins.
pub fn for_param(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .filter(|(key, _)| key == FOR_PARAM)
        .last()
        .map(|(_, value)| value.into_owned())
}

/// Render the peer address; IPv4-mapped IPv6 peers become plain dotted quads.
pub fn source_ip(addr: SocketAddr) -> String {
    match addr.ip().to_canonical() {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => v6.to_string(),
    }
}

pub async fn xmlrpc_guard_middleware(
    State(shared): State<SharedGuardState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let state = shared.load_full();

    if !state.enabled {
        return next.run(request).await;
    }

    let ctx = state.request_context(&request);
    let decision = state.guard.enforce(&ctx);
    metrics::record_decision(decision);

    match decision {
        Decision::NotApplicable => next.run(request).await,
        Decision::Authorized => {
            tracing::debug!(
                request_id = %request.request_id(),
                source_ip = %ctx.source_ip,
                "Provider call authorized"
            );
            next.run(request).await
        }
        Decision::Halted => {
            tracing::warn!(
                request_id = %request.request_id(),
                source_ip = %ctx.source_ip,
                path = %request.uri().path(),
                "Rejected XML-RPC call claiming provider identity from outside its ranges"
            );
            state.rejection()
        }
    }
}
