/// The four protocol flags of a peer session.
///
/// Both directions start out choked and not interested.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    /// We are choking the peer
    pub am_choking: bool,
    /// We are interested in the peer
    pub am_interested: bool,
    /// The peer is choking us
    pub peer_choking: bool,
    /// The peer is interested in us
    pub peer_interested: bool,
}

impl SessionStatus {
    pub fn new() -> Self {
        Self {
            am_choking: true,
            am_interested: false,
            peer_choking: true,
            peer_interested: false,
        }
    }
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::new()
    }
}
