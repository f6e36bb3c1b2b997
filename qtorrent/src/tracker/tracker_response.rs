use bencoder::bencode::{Bencode, BencodeError};

use crate::peer::bt_peer::{BtPeer, BtPeerError};

/// `TrackerResponse` struct containing a decoded announce response.
///
/// To create a new `TrackerResponse` use the method builder `from()`.
#[derive(Debug)]
pub struct TrackerResponse {
    pub interval: i64,
    pub complete: i64,
    pub incomplete: i64,
    pub tracker_id: Option<String>,
    pub peers: Vec<BtPeer>,
}

/// Posible `TrackerResponse` errors.
#[derive(Debug, PartialEq)]
pub enum FromTrackerResponseError {
    /// The tracker rejected the announce with a `failure reason`.
    AnnounceFailure(String),
    DecodeResponseError(BencodeError),
    NotADict,
    InvalidInterval,
    InvalidComplete,
    InvalidIncomplete,
    InvalidTrackerId,
    InvalidPeers(BtPeerError),
    /// Compact peer bytes whose length is not a multiple of 6.
    InvalidCompactPeers,
    InvalidPeersFormat,
}

impl TrackerResponse {
    /// Builds a new `TrackerResponse` decoding a bencoded byte buffer
    /// containing the tracker's response.
    ///
    /// Peers come either as a list of dictionaries or as a compact byte
    /// string of 6-byte records (4 ip bytes, 2 port bytes big-endian).
    /// Records announcing port 0 are dropped, they cannot be dialed.
    ///
    /// It returns a `FromTrackerResponseError` if:
    /// - The tracker reported a failure reason.
    /// - There was a problem decoding the response.
    /// - Any consumed field has the wrong shape.
    pub fn from(response: &[u8]) -> Result<TrackerResponse, FromTrackerResponseError> {
        let decoded = Bencode::decode(response)
            .map_err(FromTrackerResponseError::DecodeResponseError)?;

        let d = match decoded {
            Bencode::Dict(d) => d,
            _ => return Err(FromTrackerResponseError::NotADict),
        };

        let mut interval = 0;
        let mut complete = 0;
        let mut incomplete = 0;
        let mut tracker_id = None;
        let mut peers = Vec::new();

        for (k, v) in d.iter() {
            if k == b"failure reason" {
                return Err(Self::create_failure(v));
            } else if k == b"interval" {
                interval = Self::create_int(v, FromTrackerResponseError::InvalidInterval)?;
            } else if k == b"complete" {
                complete = Self::create_int(v, FromTrackerResponseError::InvalidComplete)?;
            } else if k == b"incomplete" {
                incomplete = Self::create_int(v, FromTrackerResponseError::InvalidIncomplete)?;
            } else if k == b"tracker id" {
                tracker_id = Some(Self::create_tracker_id(v)?);
            } else if k == b"peers" {
                peers = Self::create_peers(v)?;
            }
        }

        Ok(TrackerResponse {
            interval,
            complete,
            incomplete,
            tracker_id,
            peers,
        })
    }

    fn create_failure(bencode: &Bencode) -> FromTrackerResponseError {
        let reason = match bencode {
            Bencode::Bytes(bytes) => String::from_utf8_lossy(bytes).to_string(),
            _ => String::from("unreadable failure reason"),
        };
        FromTrackerResponseError::AnnounceFailure(reason)
    }

    fn create_int(
        bencode: &Bencode,
        error: FromTrackerResponseError,
    ) -> Result<i64, FromTrackerResponseError> {
        match bencode {
            Bencode::Int(n) => Ok(*n),
            _ => Err(error),
        }
    }

    fn create_tracker_id(bencode: &Bencode) -> Result<String, FromTrackerResponseError> {
        match bencode {
            Bencode::Bytes(bytes) => String::from_utf8(bytes.to_vec())
                .map_err(|_| FromTrackerResponseError::InvalidTrackerId),
            _ => Err(FromTrackerResponseError::InvalidTrackerId),
        }
    }

    fn create_peers(bencode: &Bencode) -> Result<Vec<BtPeer>, FromTrackerResponseError> {
        match bencode {
            Bencode::List(list) => Self::create_peers_from_dicts(list),
            Bencode::Bytes(bytes) => Self::create_peers_from_compact(bytes),
            _ => Err(FromTrackerResponseError::InvalidPeersFormat),
        }
    }

    fn create_peers_from_dicts(
        list: &[Bencode],
    ) -> Result<Vec<BtPeer>, FromTrackerResponseError> {
        let mut peers = Vec::new();
        for item in list {
            let peer = BtPeer::from(item).map_err(FromTrackerResponseError::InvalidPeers)?;
            if peer.port != 0 {
                peers.push(peer);
            }
        }
        Ok(peers)
    }

    fn create_peers_from_compact(bytes: &[u8]) -> Result<Vec<BtPeer>, FromTrackerResponseError> {
        if bytes.len() % 6 != 0 {
            return Err(FromTrackerResponseError::InvalidCompactPeers);
        }

        Ok(bytes
            .chunks_exact(6)
            .map(|record| {
                let ip = format!("{}.{}.{}.{}", record[0], record[1], record[2], record[3]);
                let port = u16::from_be_bytes([record[4], record[5]]);
                BtPeer::new(ip, port)
            })
            .filter(|peer| peer.port != 0)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_from_tracker_response_with_dict_peers() {
        let peer_dict = build_peer_dict(b"id1".to_vec(), b"127.0.0.1".to_vec(), 6868);
        let peer_dict2 = build_peer_dict(b"id2".to_vec(), b"127.0.0.2".to_vec(), 4242);

        let mut dict = BTreeMap::new();
        dict.insert(b"interval".to_vec(), Bencode::Int(900));
        dict.insert(b"complete".to_vec(), Bencode::Int(10));
        dict.insert(b"incomplete".to_vec(), Bencode::Int(25));
        dict.insert(
            b"peers".to_vec(),
            Bencode::List(vec![Bencode::Dict(peer_dict), Bencode::Dict(peer_dict2)]),
        );

        let response = TrackerResponse::from(&Bencode::Dict(dict).to_bytes()).unwrap();

        assert_eq!(response.interval, 900);
        assert_eq!(response.complete, 10);
        assert_eq!(response.incomplete, 25);
        assert_eq!(response.tracker_id, None);
        assert_eq!(response.peers.len(), 2);
        assert_eq!(response.peers[0].ip, "127.0.0.1");
        assert_eq!(response.peers[1].port, 4242);
    }

    #[test]
    fn test_from_tracker_response_with_compact_peers() {
        let mut compact = vec![127, 0, 0, 1];
        compact.extend(6868u16.to_be_bytes());
        compact.extend([10, 0, 0, 2]);
        compact.extend(51413u16.to_be_bytes());

        let response = TrackerResponse::from(&build_response_bytes(compact)).unwrap();

        assert_eq!(response.peers.len(), 2);
        assert_eq!(response.peers[0].ip, "127.0.0.1");
        assert_eq!(response.peers[0].port, 6868);
        assert_eq!(response.peers[1].ip, "10.0.0.2");
        assert_eq!(response.peers[1].port, 51413);
    }

    #[test]
    fn test_compact_peers_with_port_zero_are_dropped() {
        let mut compact = vec![127, 0, 0, 1];
        compact.extend(0u16.to_be_bytes());
        compact.extend([10, 0, 0, 2]);
        compact.extend(51413u16.to_be_bytes());

        let response = TrackerResponse::from(&build_response_bytes(compact)).unwrap();

        assert_eq!(response.peers.len(), 1);
        assert_eq!(response.peers[0].ip, "10.0.0.2");
    }

    #[test]
    fn test_dict_peers_with_port_zero_are_dropped() {
        let peer_dict = build_peer_dict(b"id1".to_vec(), b"127.0.0.1".to_vec(), 0);

        let mut dict = BTreeMap::new();
        dict.insert(b"interval".to_vec(), Bencode::Int(900));
        dict.insert(
            b"peers".to_vec(),
            Bencode::List(vec![Bencode::Dict(peer_dict)]),
        );

        let response = TrackerResponse::from(&Bencode::Dict(dict).to_bytes()).unwrap();

        assert!(response.peers.is_empty());
    }

    #[test]
    fn test_compact_peers_with_bad_length() {
        let compact = vec![127, 0, 0, 1, 26];

        assert_eq!(
            TrackerResponse::from(&build_response_bytes(compact)).unwrap_err(),
            FromTrackerResponseError::InvalidCompactPeers
        );
    }

    #[test]
    fn test_failure_reason() {
        let mut dict = BTreeMap::new();
        dict.insert(
            b"failure reason".to_vec(),
            Bencode::Bytes(b"unregistered torrent".to_vec()),
        );

        assert_eq!(
            TrackerResponse::from(&Bencode::Dict(dict).to_bytes()).unwrap_err(),
            FromTrackerResponseError::AnnounceFailure("unregistered torrent".to_string())
        );
    }

    #[test]
    fn test_tracker_id_is_kept() {
        let mut dict = BTreeMap::new();
        dict.insert(b"interval".to_vec(), Bencode::Int(900));
        dict.insert(b"tracker id".to_vec(), Bencode::Bytes(b"tid-1".to_vec()));
        dict.insert(b"peers".to_vec(), Bencode::Bytes(vec![]));

        let response = TrackerResponse::from(&Bencode::Dict(dict).to_bytes()).unwrap();

        assert_eq!(response.tracker_id, Some("tid-1".to_string()));
    }

    #[test]
    fn test_not_bencode() {
        assert!(matches!(
            TrackerResponse::from(b"not bencode").unwrap_err(),
            FromTrackerResponseError::DecodeResponseError(_)
        ));
    }

    #[test]
    fn test_not_a_dict() {
        assert_eq!(
            TrackerResponse::from(b"i1e").unwrap_err(),
            FromTrackerResponseError::NotADict
        );
    }

    // Auxiliary functions

    fn build_peer_dict(peer_id: Vec<u8>, ip: Vec<u8>, port: i64) -> BTreeMap<Vec<u8>, Bencode> {
        let mut peer_dict = BTreeMap::new();
        peer_dict.insert(b"peer id".to_vec(), Bencode::Bytes(peer_id));
        peer_dict.insert(b"ip".to_vec(), Bencode::Bytes(ip));
        peer_dict.insert(b"port".to_vec(), Bencode::Int(port));
        peer_dict
    }

    fn build_response_bytes(compact_peers: Vec<u8>) -> Vec<u8> {
        let mut dict = BTreeMap::new();
        dict.insert(b"interval".to_vec(), Bencode::Int(900));
        dict.insert(b"peers".to_vec(), Bencode::Bytes(compact_peers));
        Bencode::Dict(dict).to_bytes()
    }
}
