use std::{
    convert::Infallible,
    net::{IpAddr, SocketAddr},
};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::request::Parts,
};

use crate::config::SourceFallback;

/// IP address of the connected client, when the server was started with
/// connect info (`into_make_service_with_connect_info`).
#[derive(Debug, Clone, Copy)]
pub struct PeerAddr(pub Option<IpAddr>);

impl<S> FromRequestParts<S> for PeerAddr
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip()),
        ))
    }
}

impl PeerAddr {
    /// The `source` stored for readings that do not name one.
    pub fn fallback_source(self, fallback: &SourceFallback) -> String {
        match (fallback, self.0) {
            (SourceFallback::PeerAddress, Some(ip)) => ip.to_string(),
            (SourceFallback::PeerAddress, None) => "unknown".to_owned(),
            (SourceFallback::Literal(label), _) => label.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    #[test]
    fn literal_fallback_ignores_peer() {
        let peer = PeerAddr(Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7))));
        assert_eq!(peer.fallback_source(&SourceFallback::default()), "unknown");
    }

    #[test]
    fn peer_fallback_uses_ip() {
        let peer = PeerAddr(Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7))));
        assert_eq!(peer.fallback_source(&SourceFallback::PeerAddress), "10.0.0.7");
    }

    #[test]
    fn peer_fallback_without_connect_info() {
        assert_eq!(
            PeerAddr(None).fallback_source(&SourceFallback::PeerAddress),
            "unknown"
        );
    }
}
