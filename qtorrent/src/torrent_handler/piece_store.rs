use rand::prelude::IteratorRandom;
use sha1::{Digest, Sha1};
use tracing::warn;

use crate::peer::peer_message::Bitfield;
use crate::torrent_parser::torrent::Torrent;

/// What a delivered block did to its piece.
#[derive(Debug, PartialEq, Eq)]
pub enum BlockOutcome {
    /// The piece was already verified; the block is dropped.
    AlreadyComplete,
    /// A block at this offset was already buffered; the block is dropped.
    Duplicate,
    /// Stored; the piece still misses data.
    Stored,
    /// Stored and the piece is now complete and verified.
    PieceCompleted,
}

#[derive(Debug, PartialEq)]
pub enum PieceStoreError {
    InvalidPieceIndex { index: u32 },
    PieceDigestMismatch { index: u32 },
}

/// Piece bookkeeping for one torrent.
///
/// Accumulates non-overlapping blocks per piece, verifies a finished
/// piece against its expected digest, and picks the next piece for a
/// peer: first free piece in index order, or a random in-flight one once
/// nothing is free (endgame).
#[derive(Debug)]
pub struct PieceStore {
    total_length: u64,
    piece_length: u32,
    piece_hashes: Vec<[u8; 20]>,
    complete_pieces: Vec<Option<Vec<u8>>>,
    piece_blocks: Vec<Vec<(u32, Vec<u8>)>>,
    piece_requests: Vec<Vec<usize>>,
    completed_count: u32,
}

impl PieceStore {
    pub fn new(torrent: &Torrent) -> Self {
        let total_pieces = torrent.total_pieces() as usize;
        let mut piece_hashes = Vec::with_capacity(total_pieces);
        for index in 0..torrent.total_pieces() {
            let mut hash = [0; 20];
            hash.copy_from_slice(torrent.piece_hash(index));
            piece_hashes.push(hash);
        }

        Self {
            total_length: torrent.length(),
            piece_length: torrent.piece_length(),
            piece_hashes,
            complete_pieces: vec![None; total_pieces],
            piece_blocks: vec![Vec::new(); total_pieces],
            piece_requests: vec![Vec::new(); total_pieces],
            completed_count: 0,
        }
    }

    pub fn total_pieces(&self) -> u32 {
        self.piece_hashes.len() as u32
    }

    pub fn completed_count(&self) -> u32 {
        self.completed_count
    }

    pub fn is_piece_complete(&self, index: u32) -> bool {
        matches!(self.complete_pieces.get(index as usize), Some(Some(_)))
    }

    pub fn is_all_complete(&self) -> bool {
        self.completed_count == self.total_pieces()
    }

    /// The real length of the piece at `index` (the last one may be short).
    pub fn piece_length_at(&self, index: u32) -> u32 {
        let remainder = self.total_length % u64::from(self.piece_length);
        if index + 1 == self.total_pieces() && remainder != 0 {
            remainder as u32
        } else {
            self.piece_length
        }
    }

    /// Registers that `peer` was assigned `index`.
    pub fn register_request(&mut self, index: u32, peer: usize) {
        let requests = &mut self.piece_requests[index as usize];
        if !requests.contains(&peer) {
            requests.push(peer);
        }
    }

    /// Removes and returns the peers registered on `index`.
    pub fn take_requesters(&mut self, index: u32) -> Vec<usize> {
        std::mem::take(&mut self.piece_requests[index as usize])
    }

    /// Accumulates one delivered block.
    ///
    /// A block for a complete piece or at an already-buffered offset is
    /// dropped without error. When the buffered bytes reach the piece
    /// length the piece is assembled and digest-checked: on a match it is
    /// stored and the buffers released, on a mismatch all buffered blocks
    /// are discarded and the error is returned.
    pub fn add_block(
        &mut self,
        index: u32,
        begin: u32,
        block: Vec<u8>,
    ) -> Result<BlockOutcome, PieceStoreError> {
        if index >= self.total_pieces() {
            return Err(PieceStoreError::InvalidPieceIndex { index });
        }
        if self.is_piece_complete(index) {
            return Ok(BlockOutcome::AlreadyComplete);
        }

        let blocks = &mut self.piece_blocks[index as usize];
        if blocks.iter().any(|(offset, _)| *offset == begin) {
            return Ok(BlockOutcome::Duplicate);
        }
        blocks.push((begin, block));

        let buffered: usize = blocks.iter().map(|(_, data)| data.len()).sum();
        if buffered < self.piece_length_at(index) as usize {
            return Ok(BlockOutcome::Stored);
        }

        self.assemble_piece(index)?;
        Ok(BlockOutcome::PieceCompleted)
    }

    fn assemble_piece(&mut self, index: u32) -> Result<(), PieceStoreError> {
        let expected_length = self.piece_length_at(index) as usize;
        let blocks = &mut self.piece_blocks[index as usize];
        blocks.sort_by_key(|(offset, _)| *offset);

        let mut piece = Vec::with_capacity(expected_length);
        for (_, data) in blocks.iter() {
            piece.extend_from_slice(data);
        }

        let digest: [u8; 20] = Sha1::digest(&piece).into();
        if piece.len() != expected_length || digest != self.piece_hashes[index as usize] {
            warn!("Piece {} failed verification, discarding its blocks", index);
            blocks.clear();
            return Err(PieceStoreError::PieceDigestMismatch { index });
        }

        blocks.clear();
        blocks.shrink_to_fit();
        self.complete_pieces[index as usize] = Some(piece);
        self.completed_count += 1;
        Ok(())
    }

    /// Picks the piece `peer_pieces` should work on next.
    ///
    /// Normal pass: the first incomplete piece, in index order, that
    /// nobody has been assigned and the peer claims to have. Endgame:
    /// once no such piece exists, a random incomplete piece the peer has,
    /// in-flight requests notwithstanding. `None` means this peer has no
    /// work left at all.
    pub fn choose_next_piece(&self, peer_pieces: &Bitfield) -> Option<u32> {
        let normal = (0..self.total_pieces()).find(|&index| {
            !self.is_piece_complete(index)
                && self.piece_requests[index as usize].is_empty()
                && peer_pieces.has_piece(index)
        });
        if normal.is_some() {
            return normal;
        }

        (0..self.total_pieces())
            .filter(|&index| !self.is_piece_complete(index) && peer_pieces.has_piece(index))
            .choose(&mut rand::thread_rng())
    }

    /// Concatenates the verified pieces in index order, consuming them.
    pub fn take_payload(&mut self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(self.total_length as usize);
        for piece in self.complete_pieces.iter_mut() {
            if let Some(piece) = piece.take() {
                payload.extend(piece);
            }
        }
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::torrent_parser::info::Info;

    #[test]
    fn test_single_block_completes_piece() {
        let mut store = build_store(&[b"ABCD"], 4);

        let outcome = store.add_block(0, 0, b"ABCD".to_vec()).unwrap();

        assert_eq!(outcome, BlockOutcome::PieceCompleted);
        assert!(store.is_all_complete());
        assert_eq!(store.take_payload(), b"ABCD");
    }

    #[test]
    fn test_blocks_assemble_in_offset_order() {
        let mut store = build_store(&[b"ABCD"], 4);

        // Deliver out of order: the store sorts by offset on completion.
        assert_eq!(
            store.add_block(0, 2, b"CD".to_vec()).unwrap(),
            BlockOutcome::Stored
        );
        assert_eq!(
            store.add_block(0, 0, b"AB".to_vec()).unwrap(),
            BlockOutcome::PieceCompleted
        );
        assert_eq!(store.take_payload(), b"ABCD");
    }

    #[test]
    fn test_duplicate_block_is_dropped() {
        let mut store = build_store(&[b"ABCD"], 4);

        assert_eq!(
            store.add_block(0, 0, b"AB".to_vec()).unwrap(),
            BlockOutcome::Stored
        );
        assert_eq!(
            store.add_block(0, 0, b"AB".to_vec()).unwrap(),
            BlockOutcome::Duplicate
        );
        assert_eq!(
            store.add_block(0, 2, b"CD".to_vec()).unwrap(),
            BlockOutcome::PieceCompleted
        );
    }

    #[test]
    fn test_block_for_complete_piece_is_dropped() {
        let mut store = build_store(&[b"ABCD"], 4);
        store.add_block(0, 0, b"ABCD".to_vec()).unwrap();

        assert_eq!(
            store.add_block(0, 0, b"ABCD".to_vec()).unwrap(),
            BlockOutcome::AlreadyComplete
        );
        assert_eq!(store.completed_count(), 1);
    }

    #[test]
    fn test_digest_mismatch_discards_blocks() {
        let mut store = build_store(&[b"WXYZ"], 4);

        let result = store.add_block(0, 0, b"ABCD".to_vec());

        assert_eq!(
            result.unwrap_err(),
            PieceStoreError::PieceDigestMismatch { index: 0 }
        );
        assert!(!store.is_piece_complete(0));
        // The buffers were discarded: the piece can be refilled.
        assert_eq!(
            store.add_block(0, 0, b"WXYZ".to_vec()).unwrap(),
            BlockOutcome::PieceCompleted
        );
    }

    #[test]
    fn test_invalid_index_is_an_error() {
        let mut store = build_store(&[b"ABCD"], 4);

        assert_eq!(
            store.add_block(1, 0, b"ABCD".to_vec()).unwrap_err(),
            PieceStoreError::InvalidPieceIndex { index: 1 }
        );
    }

    #[test]
    fn test_short_last_piece_length() {
        let store = build_store(&[b"ABCD", b"EF"], 4);

        assert_eq!(store.piece_length_at(0), 4);
        assert_eq!(store.piece_length_at(1), 2);
    }

    #[test]
    fn test_short_last_piece_completes_with_short_block() {
        let mut store = build_store(&[b"ABCD", b"EF"], 4);

        store.add_block(0, 0, b"ABCD".to_vec()).unwrap();
        assert_eq!(
            store.add_block(1, 0, b"EF".to_vec()).unwrap(),
            BlockOutcome::PieceCompleted
        );
        assert_eq!(store.take_payload(), b"ABCDEF");
    }

    #[test]
    fn test_choose_prefers_first_unrequested_piece() {
        let mut store = build_store(&[b"ABCD", b"EFGH", b"IJKL"], 4);
        let everything = Bitfield::new(vec![0b11100000]);

        assert_eq!(store.choose_next_piece(&everything), Some(0));
        store.register_request(0, 0);
        assert_eq!(store.choose_next_piece(&everything), Some(1));
    }

    #[test]
    fn test_choose_skips_pieces_the_peer_lacks() {
        let store = build_store(&[b"ABCD", b"EFGH"], 4);
        let only_second = Bitfield::new(vec![0b01000000]);

        assert_eq!(store.choose_next_piece(&only_second), Some(1));
    }

    #[test]
    fn test_choose_endgame_picks_an_in_flight_piece() {
        let mut store = build_store(&[b"ABCD", b"EFGH"], 4);
        let everything = Bitfield::new(vec![0b11000000]);
        store.register_request(0, 0);
        store.register_request(1, 1);

        // Nothing is free, so the pick must be one of the in-flight pieces.
        let pick = store.choose_next_piece(&everything).unwrap();
        assert!(pick == 0 || pick == 1);
    }

    #[test]
    fn test_choose_none_when_peer_has_nothing_useful() {
        let mut store = build_store(&[b"ABCD", b"EFGH"], 4);
        let only_first = Bitfield::new(vec![0b10000000]);
        store.add_block(0, 0, b"ABCD".to_vec()).unwrap();

        assert_eq!(store.choose_next_piece(&only_first), None);
    }

    #[test]
    fn test_requester_registration_dedupes() {
        let mut store = build_store(&[b"ABCD"], 4);

        store.register_request(0, 3);
        store.register_request(0, 3);
        store.register_request(0, 5);

        assert_eq!(store.take_requesters(0), vec![3, 5]);
        assert_eq!(store.take_requesters(0), Vec::<usize>::new());
    }

    // Auxiliary functions

    fn build_store(pieces: &[&[u8]], piece_length: i64) -> PieceStore {
        PieceStore::new(&build_torrent(pieces, piece_length))
    }

    fn build_torrent(pieces: &[&[u8]], piece_length: i64) -> Torrent {
        let mut digests = Vec::new();
        let mut length = 0;
        for piece in pieces {
            let digest: [u8; 20] = Sha1::digest(piece).into();
            digests.extend(digest);
            length += piece.len() as i64;
        }

        Torrent {
            announce_url: "http://example.com/announce".to_string(),
            info: Info {
                length,
                name: "test".to_string(),
                piece_length,
                pieces: digests,
                files: None,
            },
            info_hash: [1; 20],
        }
    }
}
