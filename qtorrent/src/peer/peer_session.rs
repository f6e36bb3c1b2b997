use tracing::debug;

use crate::conn_manager::{ConnHandle, ConnId};

use super::{
    bt_peer::BtPeer,
    peer_message::{
        bitfield::BitfieldError,
        handshake::{FromHandshakeError, HANDSHAKE_LENGTH},
        Bitfield, Handshake, Message, MessageError,
    },
    session_status::SessionStatus,
};

/// Anything larger than this cannot be a legitimate frame from a peer we
/// only download from (the biggest expected message is a piece block).
const MAX_MESSAGE_LENGTH: u32 = 10 * crate::config::constants::BLOCK_LENGTH;

#[derive(Debug)]
pub enum PeerSessionError {
    InvalidHandshake(FromHandshakeError),
    InfoHashMismatch,
    UnexpectedBitfield,
    InvalidBitfield(BitfieldError),
    InvalidMessage(MessageError),
    MessageLengthTooLong { length: u32 },
    PieceIndexOutOfRange { index: u32 },
}

/// The request this session is currently waiting a block for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingBlock {
    pub index: u32,
    pub begin: u32,
    pub length: u32,
}

/// A PeerSession is the per-connection protocol state machine.
///
/// It owns the carried receive buffer and the wire framing: bytes go in
/// through `handle_data`, whole messages come out. All socket I/O happens
/// elsewhere; the session only writes through its `ConnHandle`. The
/// coordinator owns every session and drives it by slot index.
#[derive(Debug)]
pub struct PeerSession {
    pub peer: BtPeer,
    conn: Option<ConnHandle>,
    recv_buffer: Vec<u8>,
    pub is_started: bool,
    pub conn_failed: bool,
    dialed: bool,
    pub status: SessionStatus,
    pub peer_pieces: Bitfield,
    pub requested_piece: Option<u32>,
    pending_block: Option<PendingBlock>,
    received_first_message: bool,
    total_pieces: u32,
    info_hash: [u8; 20],
    client_peer_id: [u8; 20],
}

impl PeerSession {
    pub fn new(
        peer: BtPeer,
        total_pieces: u32,
        info_hash: [u8; 20],
        client_peer_id: [u8; 20],
    ) -> Self {
        Self {
            peer,
            conn: None,
            recv_buffer: Vec::new(),
            is_started: false,
            conn_failed: false,
            dialed: false,
            status: SessionStatus::new(),
            peer_pieces: Bitfield::for_pieces(total_pieces),
            requested_piece: None,
            pending_block: None,
            received_first_message: false,
            total_pieces,
            info_hash,
            client_peer_id,
        }
    }

    /// Handshake exchanged and the connection still stands.
    pub fn is_active(&self) -> bool {
        self.is_started && !self.conn_failed
    }

    pub fn was_dialed(&self) -> bool {
        self.dialed
    }

    pub fn mark_dialed(&mut self) {
        self.dialed = true;
    }

    pub fn conn_id(&self) -> Option<ConnId> {
        self.conn.as_ref().map(|conn| conn.id())
    }

    pub fn pending_block(&self) -> Option<PendingBlock> {
        self.pending_block
    }

    /// The dial succeeded: adopt the handle and open with our handshake.
    pub fn on_connected(&mut self, handle: ConnHandle) {
        debug!("{}: connected, sending handshake", self.peer);
        let handshake = Handshake::new(self.info_hash, self.client_peer_id);
        handle.write(handshake.as_bytes());
        self.conn = Some(handle);
    }

    /// The connection is gone (dial failure, EOF or reset).
    pub fn on_connection_closed(&mut self) {
        self.conn = None;
        self.conn_failed = true;
    }

    /// Closes the connection and marks the session as terminally done.
    pub fn disconnect(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.disconnect();
        }
        self.conn_failed = true;
    }

    /// The torrent finished: no more work for any session.
    pub fn on_torrent_completed(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.disconnect();
        }
        self.requested_piece = None;
        self.pending_block = None;
    }

    /// Appends `data` to the receive buffer and parses every whole frame
    /// in it. Until the handshake arrives the first 68 bytes are parsed
    /// as one; afterwards frames are length-prefixed messages. A partial
    /// frame stays buffered for the next read without error.
    pub fn handle_data(&mut self, data: &[u8]) -> Result<Vec<Message>, PeerSessionError> {
        self.recv_buffer.extend_from_slice(data);
        let mut messages = Vec::new();
        let mut consumed = 0;

        loop {
            let remaining = self.recv_buffer.len() - consumed;

            if !self.is_started {
                if remaining < HANDSHAKE_LENGTH {
                    break;
                }
                let frame: Vec<u8> =
                    self.recv_buffer[consumed..consumed + HANDSHAKE_LENGTH].to_vec();
                self.accept_handshake(&frame)?;
                consumed += HANDSHAKE_LENGTH;
                continue;
            }

            if remaining < 4 {
                break;
            }
            let prefix = u32::from_be_bytes([
                self.recv_buffer[consumed],
                self.recv_buffer[consumed + 1],
                self.recv_buffer[consumed + 2],
                self.recv_buffer[consumed + 3],
            ]);

            if prefix == 0 {
                messages.push(Message::KeepAlive);
                consumed += 4;
                continue;
            }
            if prefix > MAX_MESSAGE_LENGTH {
                return Err(PeerSessionError::MessageLengthTooLong { length: prefix });
            }
            if remaining < 4 + prefix as usize {
                break;
            }

            let body_start = consumed + 4;
            let body_end = body_start + prefix as usize;
            let message = Message::from_frame_payload(&self.recv_buffer[body_start..body_end])
                .map_err(PeerSessionError::InvalidMessage)?;

            // A bitfield is only legal as the very first message.
            if matches!(message, Message::Bitfield { .. }) && self.received_first_message {
                return Err(PeerSessionError::UnexpectedBitfield);
            }
            self.received_first_message = true;

            debug!("{}: received {}", self.peer, message.name());
            messages.push(message);
            consumed += 4 + prefix as usize;
        }

        self.recv_buffer.drain(..consumed);
        Ok(messages)
    }

    fn accept_handshake(&mut self, frame: &[u8]) -> Result<(), PeerSessionError> {
        let handshake =
            Handshake::from_bytes(frame).map_err(PeerSessionError::InvalidHandshake)?;
        if handshake.info_hash != self.info_hash {
            return Err(PeerSessionError::InfoHashMismatch);
        }

        self.peer.peer_id = Some(handshake.peer_id.to_vec());
        self.is_started = true;
        debug!("{}: handshake ok", self.peer);
        Ok(())
    }

    /// Replaces the claimed-pieces set from a received bitfield payload.
    pub fn set_peer_bitfield(&mut self, payload: Vec<u8>) -> Result<(), PeerSessionError> {
        self.peer_pieces = Bitfield::from_message_payload(payload, self.total_pieces)
            .map_err(PeerSessionError::InvalidBitfield)?;
        Ok(())
    }

    /// Records a `have` announcement.
    pub fn record_have(&mut self, index: u32) -> Result<(), PeerSessionError> {
        if index >= self.total_pieces {
            return Err(PeerSessionError::PieceIndexOutOfRange { index });
        }
        self.peer_pieces.set_bit(index, true);
        Ok(())
    }

    /// Tells the peer we want its pieces.
    pub fn send_interested(&mut self) {
        self.write_message(&Message::Interested);
        self.status.am_interested = true;
    }

    /// Requests one block and remembers it as outstanding.
    pub fn send_request(&mut self, index: u32, begin: u32, length: u32) {
        self.write_message(&Message::Request {
            index,
            begin,
            length,
        });
        self.pending_block = Some(PendingBlock {
            index,
            begin,
            length,
        });
    }

    /// Clears the outstanding request once its block arrived.
    pub fn note_block_received(&mut self, index: u32, begin: u32) {
        if let Some(pending) = self.pending_block {
            if pending.index == index && pending.begin == begin {
                self.pending_block = None;
            }
        }
    }

    /// Withdraws the outstanding request, if any (endgame lost the race).
    pub fn cancel_pending_block(&mut self) {
        if let Some(pending) = self.pending_block.take() {
            self.write_message(&Message::Cancel {
                index: pending.index,
                begin: pending.begin,
                length: pending.length,
            });
        }
    }

    fn write_message(&self, message: &Message) {
        if let Some(conn) = &self.conn {
            debug!("{}: sending {}", self.peer, message.name());
            conn.write(message.as_bytes());
        }
    }
}
