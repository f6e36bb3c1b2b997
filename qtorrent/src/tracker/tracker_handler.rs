use super::http::http_handler::{HttpHandler, HttpHandlerError};
use super::http::query_params::QueryParams;
use super::http::url_parser::{TrackerUrl, TrackerUrlError};
use super::tracker_response::{FromTrackerResponseError, TrackerResponse};
use crate::torrent_parser::torrent::Torrent;

/// `TrackerHandler` struct for communicating with a bt tracker.
///
/// To create a new `TrackerHandler` use the method builder `new()`.
///
/// To announce and get the tracker's peer list use the method `announce()`.
#[derive(Debug)]
pub struct TrackerHandler {
    pub tracker_url: TrackerUrl,
    info_hash: [u8; 20],
    total_length: u64,
    client_port: u16,
    client_peer_id: [u8; 20],
}

/// Posible `TrackerHandler` errors.
#[derive(Debug)]
pub enum TrackerHandlerError {
    UrlParseError(TrackerUrlError),
    HttpHandlerError(HttpHandlerError),
    FromTrackerResponseError(FromTrackerResponseError),
}

impl TrackerHandler {
    /// Builds a new `TrackerHandler` for a torrent.
    ///
    /// It returns a `TrackerHandlerError` if there was an error parsing
    /// the torrent's announce url.
    pub fn new(
        torrent: &Torrent,
        client_port: u16,
        client_peer_id: [u8; 20],
    ) -> Result<Self, TrackerHandlerError> {
        let tracker_url = TrackerUrl::parse(torrent.announce_url.as_str())
            .map_err(TrackerHandlerError::UrlParseError)?;

        Ok(Self {
            tracker_url,
            info_hash: torrent.info_hash,
            total_length: torrent.length(),
            client_port,
            client_peer_id,
        })
    }

    /// Issues the announce request and decodes the peer list.
    ///
    /// This is the one blocking call of a torrent's life cycle and it
    /// happens before any peer is dialed.
    ///
    /// It returns a `TrackerHandlerError` if:
    /// - There was a problem reaching the tracker.
    /// - The tracker reported a failure or the response did not decode.
    pub fn announce(&self) -> Result<TrackerResponse, TrackerHandlerError> {
        let query_params = QueryParams::new(
            self.info_hash,
            self.client_peer_id,
            self.client_port,
            self.total_length,
        );

        let http_handler = HttpHandler::new(self.tracker_url.clone(), query_params);
        let response = http_handler
            .request()
            .map_err(TrackerHandlerError::HttpHandlerError)?;

        TrackerResponse::from(&response).map_err(TrackerHandlerError::FromTrackerResponseError)
    }
}
