//! Client network identity for rate-limit keying.

use axum::http::HeaderMap;
use ipnet::IpNet;
use std::net::{IpAddr, SocketAddr};

/// CIDR ranges whose `X-Forwarded-For` headers are believed.
///
/// Without this gate any client could spoof its rate-limit identity by
/// sending a forged header.
#[derive(Debug, Clone, Default)]
pub struct TrustedProxies {
    ranges: Vec<IpNet>,
}

impl TrustedProxies {
    /// Parse a comma-separated CIDR list; invalid entries are skipped with a
    /// warning.
    pub fn parse(list: &str) -> Self {
        let ranges = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|s| match s.parse::<IpNet>() {
                Ok(net) => Some(net),
                Err(e) => {
                    tracing::warn!(range = s, "Ignoring invalid trusted proxy range: {}", e);
                    None
                }
            })
            .collect();
        Self { ranges }
    }

    fn is_trusted(&self, ip: IpAddr) -> bool {
        self.ranges.iter().any(|net| net.contains(&ip))
    }

    /// Resolve the client address for a request.
    ///
    /// If the socket peer is a trusted proxy, walk `X-Forwarded-For` from
    /// the right and return the first hop that is not itself a trusted
    /// proxy. Otherwise the peer address is the client.
    pub fn client_ip(&self, peer: SocketAddr, headers: &HeaderMap) -> IpAddr {
        if !self.is_trusted(peer.ip()) {
            return peer.ip();
        }

        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        for hop in forwarded.rsplit(',') {
            if let Ok(ip) = hop.trim().parse::<IpAddr>() {
                if !self.is_trusted(ip) {
                    return ip;
                }
            }
        }
        peer.ip()
    }
}
