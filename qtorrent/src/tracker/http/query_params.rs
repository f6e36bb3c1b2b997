use url_encoder::url_encoder::encode;

/// `QueryParams` struct containing the announce query parameters.
///
/// To build the query string use the method `build()`.
#[derive(Debug)]
pub struct QueryParams {
    info_hash: [u8; 20],
    peer_id: [u8; 20],
    client_port: u16,
    left: u64,
}

impl QueryParams {
    pub fn new(info_hash: [u8; 20], peer_id: [u8; 20], client_port: u16, left: u64) -> Self {
        Self {
            info_hash,
            peer_id,
            client_port,
            left,
        }
    }

    /// Builds the query string: the raw info hash and peer id are
    /// percent-encoded, nothing has been uploaded or downloaded yet.
    pub fn build(&self) -> String {
        format!(
            "?info_hash={}&peer_id={}&port={}&uploaded=0&downloaded=0&left={}&event=started",
            encode(&self.info_hash),
            encode(&self.peer_id),
            self.client_port,
            self.left
        )
    }
}
