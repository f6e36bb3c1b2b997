pub const TCP_PORT: &str = "TCP_PORT";
pub const LOG_DIRECTORY: &str = "LOG_DIRECTORY";
pub const DOWNLOAD_DIRECTORY: &str = "DOWNLOAD_DIRECTORY";
pub const CONNECT_SECONDS_TIMEOUT: &str = "CONNECT_SECONDS_TIMEOUT";
pub const MAX_PEERS_PER_TORRENT: &str = "MAX_PEERS_PER_TORRENT";
pub const MAX_LOG_FILE_KB_SIZE: &str = "MAX_LOG_FILE_KB_SIZE";

/// Every setting a config file must define, once each.
pub const SETTINGS: [&str; 6] = [
    TCP_PORT,
    LOG_DIRECTORY,
    DOWNLOAD_DIRECTORY,
    CONNECT_SECONDS_TIMEOUT,
    MAX_PEERS_PER_TORRENT,
    MAX_LOG_FILE_KB_SIZE,
];

/// Conventional request size: 2^14 bytes.
pub const BLOCK_LENGTH: u32 = 16384;
