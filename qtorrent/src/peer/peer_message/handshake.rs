/// The fixed 68-byte handshake: `pstrlen | pstr | reserved | info_hash | peer_id`.
/// Is the first message sent to start a connection with a peer.
#[derive(Debug, PartialEq, Eq)]
pub struct Handshake {
    pub info_hash: [u8; 20],
    pub peer_id: [u8; 20],
}

const PSTR: &[u8] = b"BitTorrent protocol";

pub const HANDSHAKE_LENGTH: usize = 68;

#[derive(Debug, PartialEq)]
pub enum FromHandshakeError {
    InvalidLength,
    InvalidProtocol,
}

impl Handshake {
    /// Creates a new `Handshake` message.
    pub fn new(info_hash: [u8; 20], peer_id: [u8; 20]) -> Self {
        Self { info_hash, peer_id }
    }

    /// Converts a `Handshake` message to its 68 wire bytes.
    pub fn as_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HANDSHAKE_LENGTH);
        bytes.push(PSTR.len() as u8);
        bytes.extend_from_slice(PSTR);
        bytes.extend_from_slice(&[0; 8]);
        bytes.extend_from_slice(&self.info_hash);
        bytes.extend_from_slice(&self.peer_id);
        bytes
    }

    /// Parses a byte array into a `Handshake` message.
    ///
    /// The first byte must be 19 and the protocol string must be exactly
    /// `"BitTorrent protocol"`, anything else is a protocol error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FromHandshakeError> {
        if bytes.len() != HANDSHAKE_LENGTH {
            return Err(FromHandshakeError::InvalidLength);
        }
        if bytes[0] as usize != PSTR.len() || &bytes[1..20] != PSTR {
            return Err(FromHandshakeError::InvalidProtocol);
        }

        let mut info_hash = [0; 20];
        let mut peer_id = [0; 20];
        info_hash.copy_from_slice(&bytes[28..48]);
        peer_id.copy_from_slice(&bytes[48..68]);

        Ok(Self { info_hash, peer_id })
    }
}
