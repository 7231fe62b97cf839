//! Caller metadata extraction.
//!
//! The client address is the socket peer. Forwarded headers are only honoured
//! when that peer is one of the configured trusted proxies.

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, header::USER_AGENT, request::Parts},
};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use super::AppState;
use crate::domain::ClientMeta;

/// Extractor wrapping the [`ClientMeta`] of the current request.
#[derive(Debug, Clone)]
pub struct Client(pub ClientMeta);

impl FromRequestParts<Arc<AppState>> for Client {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        Ok(Self(resolve_client(
            peer,
            &parts.headers,
            &state.trusted_proxies,
        )))
    }
}

#[must_use]
pub fn resolve_client(peer: Option<IpAddr>, headers: &HeaderMap, trusted: &[IpAddr]) -> ClientMeta {
    let forwarded = peer
        .filter(|ip| trusted.contains(ip))
        .and_then(|_| forwarded_ip(headers));

    let ip = forwarded
        .or(peer)
        .map_or_else(|| ClientMeta::UNKNOWN.to_string(), |ip| ip.to_string());

    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|ua| !ua.is_empty())
        .unwrap_or(ClientMeta::UNKNOWN)
        .to_string();

    ClientMeta::new(ip, user_agent)
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(value) = headers.get("x-forwarded-for")
        && let Ok(value) = value.to_str()
        && let Some(first) = value.split(',').next()
        && let Ok(ip) = first.trim().parse()
    {
        return Some(ip);
    }

    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Parses configured proxy addresses, skipping entries that are not IPs.
#[must_use]
pub fn parse_trusted_proxies(entries: &[String]) -> Vec<IpAddr> {
    entries
        .iter()
        .filter_map(|entry| match entry.trim().parse() {
            Ok(ip) => Some(ip),
            Err(_) => {
                tracing::warn!(entry = %entry, "Ignoring invalid trusted proxy address");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn peer_address_wins_without_trusted_proxy() {
        let peer: IpAddr = "203.0.113.7".parse().unwrap();
        let h = headers(&[("x-forwarded-for", "10.0.0.1"), ("user-agent", "curl/8")]);

        let client = resolve_client(Some(peer), &h, &[]);
        assert_eq!(client.ip, "203.0.113.7");
        assert_eq!(client.user_agent, "curl/8");
    }

    #[test]
    fn trusted_proxy_forwards_first_hop() {
        let proxy: IpAddr = "127.0.0.1".parse().unwrap();
        let h = headers(&[("x-forwarded-for", "198.51.100.4, 127.0.0.1")]);

        let client = resolve_client(Some(proxy), &h, &[proxy]);
        assert_eq!(client.ip, "198.51.100.4");
        assert_eq!(client.user_agent, ClientMeta::UNKNOWN);

        let h = headers(&[("x-real-ip", "198.51.100.9")]);
        assert_eq!(resolve_client(Some(proxy), &h, &[proxy]).ip, "198.51.100.9");
    }

    #[test]
    fn missing_peer_is_unknown() {
        let client = resolve_client(None, &HeaderMap::new(), &[]);
        assert_eq!(client, ClientMeta::default());
    }

    #[test]
    fn invalid_proxy_entries_are_skipped() {
        let parsed = parse_trusted_proxies(&["10.0.0.1".into(), "proxy.local".into()]);
        assert_eq!(parsed, vec!["10.0.0.1".parse::<IpAddr>().unwrap()]);
    }
}
