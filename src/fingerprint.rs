/// Request Fingerprinting
///
/// A fingerprint is a SHA-256 digest of the client IP and user agent seen on
/// a request. It is bound to a token family at login and compared again on
/// every rotation.
///
/// The client IP is the TCP peer address. Forwarding headers are honoured
/// only when the peer is one of the configured trusted proxies.

use actix_web::HttpRequest;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::net::IpAddr;

/// Reverse proxies allowed to report the client address via
/// `Forwarded` / `X-Forwarded-For`
#[derive(Debug, Clone, Default)]
pub struct TrustedProxies(Vec<IpAddr>);

impl TrustedProxies {
    pub fn new(proxies: Vec<IpAddr>) -> Self {
        Self(proxies)
    }

    /// Client address of `req`
    pub fn client_ip(&self, req: &HttpRequest) -> String {
        let peer = req.peer_addr().map(|addr| addr.ip());

        match peer {
            Some(ip) if self.0.contains(&ip) => req
                .connection_info()
                .realip_remote_addr()
                .map(str::to_string)
                .unwrap_or_else(|| ip.to_string()),
            Some(ip) => ip.to_string(),
            None => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hash client IP and user agent into a fingerprint
    ///
    /// Missing values hash as empty strings.
    pub fn from_parts(ip: &str, user_agent: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(ip.as_bytes());
        hasher.update(b"|");
        hasher.update(user_agent.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Derive the fingerprint of an incoming request
    pub fn from_request(req: &HttpRequest, proxies: &TrustedProxies) -> Self {
        let ip = proxies.client_ip(req);
        let user_agent = req
            .headers()
            .get(actix_web::http::header::USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .unwrap_or_default();

        Self::from_parts(&ip, user_agent)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_same_inputs_same_fingerprint() {
        let a = Fingerprint::from_parts("10.0.0.1", "Mozilla/5.0");
        let b = Fingerprint::from_parts("10.0.0.1", "Mozilla/5.0");

        assert_eq!(a, b);
        // SHA-256 hex
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_different_user_agent_changes_fingerprint() {
        let a = Fingerprint::from_parts("10.0.0.1", "Mozilla/5.0");
        let b = Fingerprint::from_parts("10.0.0.1", "curl/8.0");

        assert_ne!(a, b);
    }

    #[test]
    fn test_separator_prevents_ambiguity() {
        let a = Fingerprint::from_parts("10.0.0.1", "2agent");
        let b = Fingerprint::from_parts("10.0.0.12", "agent");

        assert_ne!(a, b);
    }

    #[test]
    fn test_from_request_uses_peer_and_user_agent() {
        let req = TestRequest::default()
            .peer_addr("192.168.1.20:5555".parse().unwrap())
            .insert_header(("User-Agent", "test-agent"))
            .to_http_request();

        assert_eq!(
            Fingerprint::from_request(&req, &TrustedProxies::default()),
            Fingerprint::from_parts("192.168.1.20", "test-agent")
        );
    }

    #[test]
    fn test_forwarded_header_ignored_from_untrusted_peer() {
        let req = TestRequest::default()
            .peer_addr("203.0.113.9:4444".parse().unwrap())
            .insert_header(("X-Forwarded-For", "198.51.100.4"))
            .insert_header(("User-Agent", "victim-agent"))
            .to_http_request();

        let fingerprint = Fingerprint::from_request(&req, &TrustedProxies::default());

        assert_ne!(fingerprint, Fingerprint::from_parts("198.51.100.4", "victim-agent"));
        assert_eq!(fingerprint, Fingerprint::from_parts("203.0.113.9", "victim-agent"));
    }

    #[test]
    fn test_forwarded_header_used_behind_trusted_proxy() {
        let proxy: IpAddr = "10.0.0.2".parse().unwrap();
        let req = TestRequest::default()
            .peer_addr("10.0.0.2:8000".parse().unwrap())
            .insert_header(("X-Forwarded-For", "198.51.100.4"))
            .insert_header(("User-Agent", "browser"))
            .to_http_request();

        assert_eq!(
            Fingerprint::from_request(&req, &TrustedProxies::new(vec![proxy])),
            Fingerprint::from_parts("198.51.100.4", "browser")
        );
    }

    #[test]
    fn test_missing_peer_hashes_empty_ip() {
        let req = TestRequest::default()
            .insert_header(("User-Agent", "agent"))
            .to_http_request();

        assert_eq!(
            Fingerprint::from_request(&req, &TrustedProxies::default()),
            Fingerprint::from_parts("", "agent")
        );
    }
}
