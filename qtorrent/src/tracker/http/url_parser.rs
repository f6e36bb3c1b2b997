/// `TrackerUrl` struct containing a tracker url information.
///
/// To create a new `TrackerUrl` use the method builder `parse()`.
#[derive(Debug, PartialEq, Clone)]
pub struct TrackerUrl {
    pub protocol: ConnectionProtocol,
    pub host: String,
    pub port: u16,
    pub endpoint: String,
}

/// Posible `TrackerUrl` Connection Protocol values.
#[derive(Debug, PartialEq, Clone)]
pub enum ConnectionProtocol {
    Http,
    Https,
}

/// Posible `TrackerUrl` Errors.
#[derive(Debug, PartialEq)]
pub enum TrackerUrlError {
    InvalidTrackerUrl,
    UnsupportedConnectionProtocol,
    InvalidPortNumber,
}

impl TrackerUrl {
    /// Builds a new `TrackerUrl` from a &str tracker url.
    ///
    /// It returns a `TrackerUrlError` if:
    /// - the url format is invalid.
    /// - the url connection protocol is unsupported.
    /// - the url port number is not a number.
    pub fn parse(url: &str) -> Result<Self, TrackerUrlError> {
        let (protocol, rest) = if let Some(rest) = url.strip_prefix("https://") {
            (ConnectionProtocol::Https, rest)
        } else if let Some(rest) = url.strip_prefix("http://") {
            (ConnectionProtocol::Http, rest)
        } else {
            return Err(TrackerUrlError::UnsupportedConnectionProtocol);
        };

        let (authority, endpoint) = match rest.split_once('/') {
            Some((authority, endpoint)) => (authority, endpoint.to_string()),
            None => (rest, String::new()),
        };
        if authority.is_empty() {
            return Err(TrackerUrlError::InvalidTrackerUrl);
        }

        let (host, port) = match authority.split_once(':') {
            Some((host, port)) => {
                let port: u16 = port
                    .parse()
                    .map_err(|_| TrackerUrlError::InvalidPortNumber)?;
                (host.to_string(), port)
            }
            None => {
                let default = match protocol {
                    ConnectionProtocol::Https => 443,
                    ConnectionProtocol::Http => 80,
                };
                (authority.to_string(), default)
            }
        };
        if host.is_empty() {
            return Err(TrackerUrlError::InvalidTrackerUrl);
        }

        Ok(Self {
            protocol,
            host,
            port,
            endpoint,
        })
    }
}
