use std::fmt::Write;

use sha1::{Digest, Sha1};

use bencoder::bencode::Bencode;

use super::info::{FromInfoError, Info};

/// A parsed metainfo file.
///
/// `info_hash` is the SHA-1 of the bencoded `info` dictionary exactly as
/// it appeared on disk, which is the torrent's identity on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Torrent {
    pub announce_url: String,
    pub info: Info,
    pub info_hash: [u8; 20],
}

#[derive(Debug, PartialEq)]
pub enum FromTorrentError {
    MissingAnnounce,
    MissingInfo,
    FromInfoError(FromInfoError),
    NotADict,
}

impl Torrent {
    pub fn from(bencode: Bencode) -> Result<Torrent, FromTorrentError> {
        let mut announce_url = String::new();
        let mut info_bencode = None;

        let d = match bencode {
            Bencode::Dict(d) => d,
            _ => return Err(FromTorrentError::NotADict),
        };

        for (k, v) in d.iter() {
            if k == b"announce" {
                announce_url = Torrent::create_announce(v)?;
            } else if k == b"info" {
                info_bencode = Some(v.clone());
            }
        }

        if announce_url.is_empty() {
            return Err(FromTorrentError::MissingAnnounce);
        }

        let info_bencode = match info_bencode {
            Some(value) => value,
            None => return Err(FromTorrentError::MissingInfo),
        };

        let info = Info::from(&info_bencode).map_err(FromTorrentError::FromInfoError)?;
        let info_hash = Torrent::create_info_hash(&info_bencode);

        Ok(Torrent {
            announce_url,
            info,
            info_hash,
        })
    }

    fn create_announce(bencode: &Bencode) -> Result<String, FromTorrentError> {
        let announce_url = match bencode {
            Bencode::Bytes(bytes) => bytes,
            _ => return Err(FromTorrentError::MissingAnnounce),
        };

        String::from_utf8(announce_url.to_vec()).map_err(|_| FromTorrentError::MissingAnnounce)
    }

    /// Hashes the bencoded `info` value. Re-encoding a decoded dictionary
    /// is byte identical to the original because bencoded dictionary keys
    /// are sorted, so unknown keys survive the round trip.
    pub fn create_info_hash(info_bencode: &Bencode) -> [u8; 20] {
        Sha1::digest(info_bencode.to_bytes()).into()
    }

    /// Returns the name of the torrent.
    pub fn name(&self) -> String {
        self.info.name.clone()
    }

    /// Returns the nominal size of pieces of the torrent.
    pub fn piece_length(&self) -> u32 {
        self.info.piece_length as u32
    }

    /// Returns the total payload length in bytes.
    pub fn length(&self) -> u64 {
        self.info.length as u64
    }

    /// Returns the number of pieces of the torrent.
    pub fn total_pieces(&self) -> u32 {
        (self.info.pieces.len() / 20) as u32
    }

    /// Returns the real size of the piece at `index`: the last piece is
    /// whatever remains after the full sized ones.
    pub fn piece_length_at(&self, index: u32) -> u32 {
        let remainder = self.length() % u64::from(self.piece_length());
        if index + 1 == self.total_pieces() && remainder != 0 {
            remainder as u32
        } else {
            self.piece_length()
        }
    }

    /// Returns the expected 20-byte SHA-1 digest of the piece at `index`.
    pub fn piece_hash(&self, index: u32) -> &[u8] {
        let start = index as usize * 20;
        &self.info.pieces[start..start + 20]
    }

    /// Returns the info hash as a lowercase hex string, for display.
    pub fn info_hash_hex(&self) -> String {
        let mut hex = String::with_capacity(40);
        for byte in self.info_hash {
            let _ = write!(&mut hex, "{:02x}", byte);
        }
        hex
    }
}
