use std::time::Duration;

use logger::logger_sender::LoggerSender;
use rand::Rng;
use tracing::{debug, error, info};

use crate::config::cfg::Cfg;
use crate::config::constants::BLOCK_LENGTH;
use crate::conn_manager::{ConnManager, EventHandler, NetEvent, ThreadedConnManager};
use crate::storage_manager::manager::save_payload;
use crate::torrent_handler::coordinator::{TorrentCoordinator, TorrentNotification};
use crate::torrent_parser::torrent::Torrent;

/// Posible `BtClient` errors.
#[derive(Debug)]
pub enum BtClientError {
    NoTorrentsAdded,
    NoTorrentStarted,
    DownloadsFailed { failed: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TorrentOutcome {
    Completed,
    Failed,
}

struct ActiveTorrent {
    coordinator: TorrentCoordinator,
    outcome: Option<TorrentOutcome>,
}

/// The client facade: holds the added torrents, runs one event loop for
/// all of them, routes connection events to the owning coordinator, and
/// materializes finished payloads. The loop is stopped as soon as every
/// torrent reached a terminal state.
pub struct BtClient {
    config: Cfg,
    client_peer_id: [u8; 20],
    logger_sender: LoggerSender,
    torrents: Vec<ActiveTorrent>,
}

impl BtClient {
    pub fn new(config: Cfg, logger_sender: LoggerSender, client_peer_id: [u8; 20]) -> Self {
        Self {
            config,
            client_peer_id,
            logger_sender,
            torrents: Vec::new(),
        }
    }

    /// Registers a parsed torrent for download.
    pub fn add_torrent(&mut self, torrent: Torrent) {
        info!("Added torrent {} ({})", torrent.name(), torrent.info_hash_hex());
        let coordinator = TorrentCoordinator::new(
            torrent,
            self.config.clone(),
            self.client_peer_id,
            BLOCK_LENGTH,
            self.logger_sender.clone(),
        );
        self.torrents.push(ActiveTorrent {
            coordinator,
            outcome: None,
        });
    }

    /// Announces every torrent, then runs the event loop to completion.
    ///
    /// A torrent whose announce fails is not started; the rest proceed.
    /// Returns an error if nothing could start or any download failed,
    /// so the caller can exit non-zero.
    pub fn run(&mut self) -> Result<(), BtClientError> {
        if self.torrents.is_empty() {
            return Err(BtClientError::NoTorrentsAdded);
        }

        let mut conn_manager =
            ThreadedConnManager::new(Duration::from_secs(self.config.connect_seconds_timeout));

        for entry in self.torrents.iter_mut() {
            if let Err(err) = entry.coordinator.start(&mut conn_manager) {
                let name = entry.coordinator.torrent().name();
                error!("{}: could not start: {:?}", name, err);
                self.logger_sender
                    .error(&format!("{}: could not start: {:?}", name, err));
                entry.outcome = Some(TorrentOutcome::Failed);
            }
        }

        if self.torrents.iter().all(|entry| entry.outcome.is_some()) {
            return Err(BtClientError::NoTorrentStarted);
        }

        conn_manager.start_event_loop(self);

        let failed = self
            .torrents
            .iter()
            .filter(|entry| entry.outcome == Some(TorrentOutcome::Failed))
            .count();
        if failed > 0 {
            return Err(BtClientError::DownloadsFailed { failed });
        }
        Ok(())
    }

    fn drain_notifications(&mut self, conn_manager: &mut dyn ConnManager) {
        for entry in self.torrents.iter_mut() {
            for notification in entry.coordinator.take_notifications() {
                match notification {
                    TorrentNotification::PieceCompleted { downloaded, total } => {
                        debug!(
                            "{}: {} / {} pieces",
                            entry.coordinator.torrent().name(),
                            downloaded,
                            total
                        );
                    }
                    TorrentNotification::TorrentCompleted { payload } => {
                        let torrent = entry.coordinator.torrent();
                        match save_payload(torrent, &payload, &self.config.download_directory) {
                            Ok(()) => {
                                info!("{}: saved", torrent.name());
                                self.logger_sender.info(&format!("{}: saved", torrent.name()));
                                entry.outcome = Some(TorrentOutcome::Completed);
                            }
                            Err(err) => {
                                error!("{}: could not save: {}", torrent.name(), err);
                                self.logger_sender
                                    .error(&format!("{}: could not save: {}", torrent.name(), err));
                                entry.outcome = Some(TorrentOutcome::Failed);
                            }
                        }
                    }
                    TorrentNotification::TorrentFailed { error } => {
                        entry.outcome = Some(TorrentOutcome::Failed);
                        error!(
                            "{}: failed: {:?}",
                            entry.coordinator.torrent().name(),
                            error
                        );
                    }
                }
            }
        }

        if self.torrents.iter().all(|entry| entry.outcome.is_some()) {
            conn_manager.stop_event_loop();
        }
    }
}

impl EventHandler for BtClient {
    fn handle_event(&mut self, event: NetEvent, conn_manager: &mut dyn ConnManager) {
        let conn = event.conn();
        if let Some(entry) = self
            .torrents
            .iter_mut()
            .find(|entry| entry.coordinator.owns_conn(conn))
        {
            entry.coordinator.handle_event(event, conn_manager);
        }
        // Events for connections nobody owns (e.g. the trailing loss
        // after a voluntary disconnect) are dropped here.
        self.drain_notifications(conn_manager);
    }
}

/// Builds a fresh 20-byte peer id: client prefix plus random digits.
pub fn generate_peer_id() -> [u8; 20] {
    let mut peer_id = *b"-QT0100-000000000000";
    let mut rng = rand::thread_rng();
    for byte in peer_id.iter_mut().skip(8) {
        *byte = rng.gen_range(b'0'..=b'9');
    }
    peer_id
}
