use std::collections::HashMap;

use logger::logger_sender::LoggerSender;
use tracing::{debug, info, warn};

use super::piece_store::{BlockOutcome, PieceStore, PieceStoreError};
use crate::config::cfg::Cfg;
use crate::conn_manager::{ConnId, ConnManager, NetEvent};
use crate::peer::bt_peer::BtPeer;
use crate::peer::peer_message::Message;
use crate::peer::peer_session::{PeerSession, PeerSessionError};
use crate::torrent_parser::torrent::Torrent;
use crate::tracker::tracker_handler::{TrackerHandler, TrackerHandlerError};

/// Progress and terminal events a coordinator reports upward.
///
/// The orchestrator drains these after every dispatched connection
/// event; they replace direct callbacks so that nothing holds a
/// reference back into the client.
#[derive(Debug)]
pub enum TorrentNotification {
    PieceCompleted { downloaded: u32, total: u32 },
    TorrentCompleted { payload: Vec<u8> },
    TorrentFailed { error: CoordinatorError },
}

#[derive(Debug)]
pub enum CoordinatorError {
    AnnounceError(TrackerHandlerError),
    /// The tracker answered but no dialable peer came back.
    NoPeersAvailable,
    PieceDigestMismatch { index: u32 },
    /// Every known endpoint was tried and none is alive.
    NoUsablePeers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TorrentState {
    Downloading,
    Completed,
    Failed,
}

/// Drives one torrent: owns its peer sessions and piece store, routes
/// connection events to sessions, assigns pieces, and reacts to peer
/// churn by dialing replacements in tracker order.
///
/// Sessions are addressed by their slot in `peers`; the slot is the
/// stable peer handle for the piece store's request registrations.
pub struct TorrentCoordinator {
    torrent: Torrent,
    config: Cfg,
    client_peer_id: [u8; 20],
    block_length: u32,
    store: PieceStore,
    peers: Vec<PeerSession>,
    conn_peers: HashMap<ConnId, usize>,
    notifications: Vec<TorrentNotification>,
    state: TorrentState,
    logger_sender: LoggerSender,
}

impl TorrentCoordinator {
    pub fn new(
        torrent: Torrent,
        config: Cfg,
        client_peer_id: [u8; 20],
        block_length: u32,
        logger_sender: LoggerSender,
    ) -> Self {
        let store = PieceStore::new(&torrent);
        Self {
            torrent,
            config,
            client_peer_id,
            block_length,
            store,
            peers: Vec::new(),
            conn_peers: HashMap::new(),
            notifications: Vec::new(),
            state: TorrentState::Downloading,
            logger_sender,
        }
    }

    pub fn torrent(&self) -> &Torrent {
        &self.torrent
    }

    /// Announces to the tracker and dials the first peers.
    ///
    /// The announce is the one blocking step of a torrent and runs
    /// before any socket exists. Peers keep the tracker response order,
    /// which is also the replacement order on churn.
    pub fn start(&mut self, conn_manager: &mut dyn ConnManager) -> Result<(), CoordinatorError> {
        let tracker =
            TrackerHandler::new(&self.torrent, self.config.tcp_port, self.client_peer_id)
                .map_err(CoordinatorError::AnnounceError)?;
        let response = tracker.announce().map_err(CoordinatorError::AnnounceError)?;

        info!(
            "{}: tracker returned {} peers",
            self.torrent.name(),
            response.peers.len()
        );
        self.logger_sender.info(&format!(
            "{}: tracker returned {} peers",
            self.torrent.name(),
            response.peers.len()
        ));

        self.add_peers(response.peers);
        if self.peers.is_empty() {
            return Err(CoordinatorError::NoPeersAvailable);
        }

        self.dial_replacements(conn_manager);
        if self.dialing_or_active_count() == 0 {
            return Err(CoordinatorError::NoPeersAvailable);
        }
        Ok(())
    }

    /// Whether `conn` belongs to one of this torrent's sessions.
    pub fn owns_conn(&self, conn: ConnId) -> bool {
        self.conn_peers.contains_key(&conn)
    }

    /// Torrent reached a terminal state, successful or not.
    pub fn is_finished(&self) -> bool {
        self.state != TorrentState::Downloading
    }

    /// Drains the pending upward notifications.
    pub fn take_notifications(&mut self) -> Vec<TorrentNotification> {
        std::mem::take(&mut self.notifications)
    }

    /// Dispatches one connection event to the owning session.
    pub fn handle_event(&mut self, event: NetEvent, conn_manager: &mut dyn ConnManager) {
        match event {
            NetEvent::Connected { conn, handle } => {
                if self.state != TorrentState::Downloading {
                    handle.disconnect();
                    self.conn_peers.remove(&conn);
                    return;
                }
                if let Some(&idx) = self.conn_peers.get(&conn) {
                    self.peers[idx].on_connected(handle);
                }
            }
            NetEvent::ConnectionFailed { conn } => {
                if let Some(idx) = self.conn_peers.remove(&conn) {
                    debug!("{}: dial failed", self.peers[idx].peer);
                    self.peers[idx].on_connection_closed();
                    self.handle_peer_stopped(conn_manager);
                }
            }
            NetEvent::ConnectionLost { conn } => {
                if let Some(idx) = self.conn_peers.remove(&conn) {
                    debug!("{}: connection lost", self.peers[idx].peer);
                    self.peers[idx].on_connection_closed();
                    self.handle_peer_stopped(conn_manager);
                }
            }
            NetEvent::DataReceived { conn, data } => {
                if self.conn_peers.contains_key(&conn) {
                    self.handle_peer_data(conn, data, conn_manager);
                }
            }
        }
    }

    /// Creates one session per previously unseen endpoint, in order.
    fn add_peers(&mut self, peers: Vec<BtPeer>) {
        for peer in peers {
            if self.peers.iter().any(|session| session.peer == peer) {
                continue;
            }
            self.peers.push(PeerSession::new(
                peer,
                self.torrent.total_pieces(),
                self.torrent.info_hash,
                self.client_peer_id,
            ));
        }
    }

    /// Dials never-tried peers until the peer cap is reached or the list
    /// runs out.
    fn dial_replacements(&mut self, conn_manager: &mut dyn ConnManager) {
        while self.dialing_or_active_count() < self.config.max_peers_per_torrent as usize {
            let candidate = self.peers.iter().position(|peer| !peer.was_dialed());
            let idx = match candidate {
                Some(idx) => idx,
                None => break,
            };

            self.peers[idx].mark_dialed();
            match self.peers[idx].peer.socket_addr() {
                Some(addr) => {
                    info!("{}: dialing", self.peers[idx].peer);
                    let conn = conn_manager.connect_peer(addr);
                    self.conn_peers.insert(conn, idx);
                }
                None => {
                    warn!("{}: endpoint is not a dialable address", self.peers[idx].peer);
                    self.peers[idx].conn_failed = true;
                }
            }
        }
    }

    /// Sessions that hold or may still produce a live connection.
    fn dialing_or_active_count(&self) -> usize {
        self.peers
            .iter()
            .filter(|peer| peer.was_dialed() && !peer.conn_failed)
            .count()
    }

    fn handle_peer_data(
        &mut self,
        conn: ConnId,
        data: Vec<u8>,
        conn_manager: &mut dyn ConnManager,
    ) {
        let idx = match self.conn_peers.get(&conn) {
            Some(&idx) => idx,
            None => return,
        };

        let was_started = self.peers[idx].is_started;
        let messages = match self.peers[idx].handle_data(&data) {
            Ok(messages) => messages,
            Err(err) => {
                warn!("{}: protocol error: {:?}", self.peers[idx].peer, err);
                self.drop_peer(conn, idx, conn_manager);
                return;
            }
        };

        if !was_started && self.peers[idx].is_started {
            self.logger_sender
                .info(&format!("{}: handshake ok", self.peers[idx].peer));
            self.advance_peer(idx, conn_manager);
        }

        for message in messages {
            if self.state != TorrentState::Downloading {
                break;
            }
            if let Err(err) = self.handle_message(idx, message, conn_manager) {
                warn!("{}: protocol error: {:?}", self.peers[idx].peer, err);
                self.drop_peer(conn, idx, conn_manager);
                return;
            }
        }
    }

    fn handle_message(
        &mut self,
        idx: usize,
        message: Message,
        conn_manager: &mut dyn ConnManager,
    ) -> Result<(), PeerSessionError> {
        match message {
            Message::KeepAlive => {}
            Message::Choke => self.peers[idx].status.peer_choking = true,
            Message::Unchoke => {
                self.peers[idx].status.peer_choking = false;
                self.advance_peer(idx, conn_manager);
            }
            Message::Interested => self.peers[idx].status.peer_interested = true,
            Message::NotInterested => self.peers[idx].status.peer_interested = false,
            Message::Have { piece_index } => self.peers[idx].record_have(piece_index)?,
            Message::Bitfield { payload } => self.peers[idx].set_peer_bitfield(payload)?,
            Message::Piece {
                index,
                begin,
                block,
            } => self.handle_block(idx, index, begin, block, conn_manager)?,
            // We do not serve uploads: requests are noted and left alone.
            Message::Request { .. } | Message::Cancel { .. } | Message::Port { .. } => {
                debug!(
                    "{}: ignoring {} message",
                    self.peers[idx].peer,
                    message.name()
                );
            }
        }
        Ok(())
    }

    /// Applies one delivered block per the assembly rules: drop blocks
    /// for finished pieces and duplicate offsets, complete the piece
    /// when the last block lands, keep the peer busy otherwise.
    fn handle_block(
        &mut self,
        idx: usize,
        index: u32,
        begin: u32,
        block: Vec<u8>,
        conn_manager: &mut dyn ConnManager,
    ) -> Result<(), PeerSessionError> {
        self.peers[idx].note_block_received(index, begin);

        match self.store.add_block(index, begin, block) {
            Ok(BlockOutcome::AlreadyComplete) => {
                if self.peers[idx].requested_piece == Some(index) {
                    self.peers[idx].requested_piece = None;
                }
                self.advance_peer(idx, conn_manager);
            }
            Ok(BlockOutcome::Duplicate) | Ok(BlockOutcome::Stored) => {
                self.request_next_block(idx, index, begin);
            }
            Ok(BlockOutcome::PieceCompleted) => {
                self.complete_piece(idx, index, conn_manager);
            }
            Err(PieceStoreError::InvalidPieceIndex { index }) => {
                return Err(PeerSessionError::PieceIndexOutOfRange { index });
            }
            Err(PieceStoreError::PieceDigestMismatch { index }) => {
                self.fail_torrent(CoordinatorError::PieceDigestMismatch { index });
            }
        }
        Ok(())
    }

    /// Asks for the block after `begin`, clamped to the piece end.
    fn request_next_block(&mut self, idx: usize, index: u32, begin: u32) {
        let piece_length = self.store.piece_length_at(index);
        let begin_next = begin + self.block_length;
        if begin_next >= piece_length {
            // Everything up to the piece end is already requested or
            // buffered; the missing data is on its way.
            return;
        }
        let length = (piece_length - begin_next).min(self.block_length);
        self.peers[idx].send_request(index, begin_next, length);
    }

    fn complete_piece(&mut self, finisher: usize, index: u32, conn_manager: &mut dyn ConnManager) {
        for requester in self.store.take_requesters(index) {
            if self.peers[requester].requested_piece == Some(index) {
                self.peers[requester].requested_piece = None;
                if requester != finisher {
                    // The race is over for everybody else.
                    self.peers[requester].cancel_pending_block();
                }
            }
        }

        let downloaded = self.store.completed_count();
        let total = self.store.total_pieces();
        info!(
            "{}: piece {} verified ({} / {})",
            self.torrent.name(),
            index,
            downloaded,
            total
        );
        self.logger_sender.info(&format!(
            "{}: {} / {} pieces complete",
            self.torrent.name(),
            downloaded,
            total
        ));
        self.notifications
            .push(TorrentNotification::PieceCompleted { downloaded, total });

        self.advance_peer(finisher, conn_manager);

        if self.store.is_all_complete() {
            self.complete_torrent();
        }
    }

    fn complete_torrent(&mut self) {
        self.state = TorrentState::Completed;
        let payload = self.store.take_payload();

        for peer in &mut self.peers {
            peer.on_torrent_completed();
        }
        self.conn_peers.clear();

        info!("{}: download complete", self.torrent.name());
        self.logger_sender
            .info(&format!("{}: download complete", self.torrent.name()));
        self.notifications
            .push(TorrentNotification::TorrentCompleted { payload });
    }

    fn fail_torrent(&mut self, error: CoordinatorError) {
        warn!("{}: download failed: {:?}", self.torrent.name(), error);
        self.logger_sender.error(&format!(
            "{}: download failed: {:?}",
            self.torrent.name(),
            error
        ));

        self.state = TorrentState::Failed;
        for peer in &mut self.peers {
            peer.on_torrent_completed();
        }
        self.conn_peers.clear();
        self.notifications
            .push(TorrentNotification::TorrentFailed { error });
    }

    /// The outbound decision tree of a session, run after every state
    /// change that could enable new work: handshake ok, unchoke, block
    /// landed, piece finished.
    fn advance_peer(&mut self, idx: usize, conn_manager: &mut dyn ConnManager) {
        if self.state != TorrentState::Downloading {
            return;
        }
        if self.peers[idx].conn_id().is_none() || !self.peers[idx].is_started {
            return;
        }
        if self.peers[idx].status.peer_choking {
            if !self.peers[idx].status.am_interested {
                self.peers[idx].send_interested();
            }
            return;
        }
        if self.peers[idx].requested_piece.is_some() {
            // A block reply will re-enter here.
            return;
        }

        match self.store.choose_next_piece(&self.peers[idx].peer_pieces) {
            Some(piece) => {
                self.store.register_request(piece, idx);
                let length = self.store.piece_length_at(piece).min(self.block_length);
                self.peers[idx].requested_piece = Some(piece);
                self.peers[idx].send_request(piece, 0, length);
            }
            None => {
                debug!("{}: no work left for this peer", self.peers[idx].peer);
                if let Some(conn) = self.peers[idx].conn_id() {
                    self.conn_peers.remove(&conn);
                }
                self.peers[idx].disconnect();
                self.handle_peer_stopped(conn_manager);
            }
        }
    }

    fn drop_peer(&mut self, conn: ConnId, idx: usize, conn_manager: &mut dyn ConnManager) {
        self.conn_peers.remove(&conn);
        self.peers[idx].disconnect();
        self.handle_peer_stopped(conn_manager);
    }

    /// A peer failed or bowed out: dial the next never-tried endpoint,
    /// in tracker order, while the cap allows. With nothing left to dial
    /// and nothing alive the torrent cannot finish, so it fails instead
    /// of waiting forever.
    fn handle_peer_stopped(&mut self, conn_manager: &mut dyn ConnManager) {
        if self.state != TorrentState::Downloading || self.store.is_all_complete() {
            return;
        }
        if self.dialing_or_active_count() < self.config.max_peers_per_torrent as usize {
            self.dial_replacements(conn_manager);
        }
        if self.dialing_or_active_count() == 0 {
            self.fail_torrent(CoordinatorError::NoUsablePeers);
        }
    }
}
