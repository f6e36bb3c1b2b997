use std::net::SocketAddr;

use bencoder::bencode::Bencode;

/// `BtPeer` struct containing an individual peer endpoint as reported by
/// the tracker. Two peers are the same peer when `(ip, port)` match.
#[derive(Debug, Clone)]
pub struct BtPeer {
    pub peer_id: Option<Vec<u8>>,
    pub ip: String,
    pub port: u16,
}

impl std::fmt::Display for BtPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

impl PartialEq for BtPeer {
    fn eq(&self, other: &Self) -> bool {
        self.ip == other.ip && self.port == other.port
    }
}

impl Eq for BtPeer {}

impl std::hash::Hash for BtPeer {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.ip.hash(state);
        self.port.hash(state);
    }
}

/// Posible `BtPeer` errors
#[derive(Debug, PartialEq)]
pub enum BtPeerError {
    InvalidPeerId,
    InvalidIp,
    InvalidPort,
    NotADict,
}

impl BtPeer {
    pub fn new(ip: String, port: u16) -> Self {
        Self {
            peer_id: None,
            ip,
            port,
        }
    }

    /// Builds a new `BtPeer` from a bencoded peer dictionary out of the
    /// tracker response peer list.
    ///
    /// It returns a `BtPeerError` if:
    /// - The peer ID is invalid.
    /// - The peer IP is invalid.
    /// - The peer Port is invalid.
    /// - The bencoded peer is not a Dict.
    pub fn from(bencode: &Bencode) -> Result<BtPeer, BtPeerError> {
        let mut peer_id = None;
        let mut ip = String::new();
        let mut port = None;

        let d = match bencode {
            Bencode::Dict(d) => d,
            _ => return Err(BtPeerError::NotADict),
        };

        for (k, v) in d.iter() {
            if k == b"peer id" {
                peer_id = Some(Self::create_peer_id(v)?);
            } else if k == b"ip" {
                ip = Self::create_ip(v)?;
            } else if k == b"port" {
                port = Some(Self::create_port(v)?);
            }
        }

        let port = match port {
            Some(port) => port,
            None => return Err(BtPeerError::InvalidPort),
        };
        if ip.is_empty() {
            return Err(BtPeerError::InvalidIp);
        }

        Ok(BtPeer { peer_id, ip, port })
    }

    fn create_peer_id(bencode: &Bencode) -> Result<Vec<u8>, BtPeerError> {
        match bencode {
            Bencode::Bytes(bytes) => Ok(bytes.clone()),
            _ => Err(BtPeerError::InvalidPeerId),
        }
    }

    fn create_ip(bencode: &Bencode) -> Result<String, BtPeerError> {
        let ip = match bencode {
            Bencode::Bytes(bytes) => bytes,
            _ => return Err(BtPeerError::InvalidIp),
        };

        String::from_utf8(ip.to_vec()).map_err(|_| BtPeerError::InvalidIp)
    }

    fn create_port(bencode: &Bencode) -> Result<u16, BtPeerError> {
        match bencode {
            Bencode::Int(n) if (0..=i64::from(u16::MAX)).contains(n) => Ok(*n as u16),
            _ => Err(BtPeerError::InvalidPort),
        }
    }

    /// The dialable socket address of this endpoint.
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        format!("{}:{}", self.ip, self.port).parse().ok()
    }
}
