//! Request metadata extractor.
//!
//! Collects the four values recorded on every operation span.

use crate::pipeline::RequestInfo;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::{HOST, USER_AGENT};
use axum::http::request::Parts;
use std::convert::Infallible;
use std::net::SocketAddr;

const UNKNOWN_PEER: &str = "unknown";
const UNKNOWN_AGENT: &str = "Unknown";

impl<S> FromRequestParts<S> for RequestInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let url = if parts.uri.scheme().is_some() {
            parts.uri.to_string()
        } else {
            match parts.headers.get(HOST).and_then(|v| v.to_str().ok()) {
                Some(host) => format!("http://{host}{}", parts.uri),
                None => parts.uri.to_string(),
            }
        };

        let peer_ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map_or_else(|| UNKNOWN_PEER.to_string(), |info| info.0.ip().to_string());

        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(UNKNOWN_AGENT);

        Ok(RequestInfo::new(
            parts.method.as_str(),
            url,
            peer_ip,
            user_agent,
        ))
    }
}
