//! Client identification utilities
//!
//! Identifies clients via HTTP headers and captures the request facts that
//! the decision engine inspects.

use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Method, Request, header};

/// Key used for clients whose address cannot be determined
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Request facts handed to the decision engine
#[derive(Debug, Clone)]
pub struct RequestMetadata {
    /// Client IP address (direct peer, or X-Forwarded-For when trusted)
    pub ip: Option<IpAddr>,
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
}

impl RequestMetadata {
    /// Capture metadata from an incoming request
    ///
    /// The direct peer address is read from axum's `ConnectInfo` extension
    /// when the server was started with connect info. `X-Forwarded-For` is
    /// only consulted when `trust_proxy_headers` is set.
    pub fn from_request<B>(request: &Request<B>, trust_proxy_headers: bool) -> Self {
        Self {
            ip: client_ip(request, trust_proxy_headers),
            method: request.method().clone(),
            path: request.uri().path().to_string(),
            query: request.uri().query().map(str::to_string),
            headers: request.headers().clone(),
        }
    }

    /// User-Agent header, if present and valid UTF-8
    pub fn user_agent(&self) -> Option<&str> {
        self.headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
    }

    /// Client address as a bucket key component
    pub fn ip_key(&self) -> String {
        self.ip
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
    }
}

/// Client IP of a request, see [`extract_client_ip`]
pub fn client_ip<B>(request: &Request<B>, trust_proxy_headers: bool) -> Option<IpAddr> {
    let direct_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    extract_client_ip(request.headers(), direct_ip, trust_proxy_headers)
}

/// Extract client IP address
///
/// The header is client-controlled unless a reverse proxy overwrites it, so
/// X-Forwarded-For is read only when `trust_proxy_headers` is set. Otherwise
/// (or when the header is unusable) the direct connection IP is returned.
///
/// ## Arguments
/// * `headers` - HTTP request headers
/// * `direct_ip` - Direct connection IP address
/// * `trust_proxy_headers` - Whether a trusted proxy sets X-Forwarded-For
///
/// ## Returns
/// The client IP address, or None if not determinable
pub fn extract_client_ip(
    headers: &HeaderMap,
    direct_ip: Option<IpAddr>,
    trust_proxy_headers: bool,
) -> Option<IpAddr> {
    if !trust_proxy_headers {
        return direct_ip;
    }

    // First IP in the list
    if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first_ip) = xff.split(',').next() {
            if let Ok(ip) = first_ip.trim().parse::<IpAddr>() {
                return Some(ip);
            }
        }
    }
    direct_ip
}
