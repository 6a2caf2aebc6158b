use std::fmt;
use std::str::FromStr;

use crate::error::TransportError;

/// Host and port of a tuner service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// Create a new endpoint.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    /// Parse `host:port` or `[v6-host]:port`.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| TransportError::InvalidEndpoint {
            input: input.to_string(),
            reason,
        };

        let (host, port) = input.rsplit_once(':').ok_or_else(|| invalid("missing port"))?;
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);

        if host.is_empty() {
            return Err(invalid("missing host"));
        }
        let port = port.parse::<u16>().map_err(|_| invalid("invalid port"))?;

        Ok(Self::new(host, port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_and_port() {
        let endpoint: Endpoint = "192.168.7.2:9502".parse().unwrap();
        assert_eq!(endpoint, Endpoint::new("192.168.7.2", 9502));
        assert_eq!(endpoint.to_string(), "192.168.7.2:9502");
    }

    #[test]
    fn parses_bracketed_ipv6() {
        let endpoint: Endpoint = "[::1]:9502".parse().unwrap();
        assert_eq!(endpoint.host, "::1");
        assert_eq!(endpoint.to_string(), "[::1]:9502");
    }

    #[test]
    fn rejects_missing_or_bad_port() {
        assert!(matches!(
            "localhost".parse::<Endpoint>(),
            Err(TransportError::InvalidEndpoint { reason: "missing port", .. })
        ));
        assert!(matches!(
            "localhost:99999".parse::<Endpoint>(),
            Err(TransportError::InvalidEndpoint { reason: "invalid port", .. })
        ));
        assert!(matches!(
            ":9502".parse::<Endpoint>(),
            Err(TransportError::InvalidEndpoint { reason: "missing host", .. })
        ));
    }
}
