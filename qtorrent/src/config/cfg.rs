use std::collections::HashMap;
use std::fs;
use std::str::FromStr;

use super::constants;

/// `Cfg` struct containing the config file information, previusly created with `Cfg::new`.
///
/// - `tcp_port`: port announced to the tracker,
/// - `log_directory`: directory where the log files will be stored,
/// - `download_directory`: directory where the downloaded files will be stored,
/// - `connect_seconds_timeout`: timeout in seconds for dialing a peer,
/// - `max_peers_per_torrent`: maximum number of simultaneous peers that a torrent can have,
/// - `max_log_file_kb_size`: max file size in kilobytes the log can have,
#[derive(Debug, Clone)]
pub struct Cfg {
    pub tcp_port: u16,
    pub log_directory: String,
    pub download_directory: String,
    pub connect_seconds_timeout: u64,
    pub max_peers_per_torrent: u32,
    pub max_log_file_kb_size: u32,
}

/// Posible config file errors.
#[derive(Debug, PartialEq)]
pub enum CfgError {
    FileNotReadable(String),
    MalformedLine { line_number: usize, line: String },
    UnknownSetting(String),
    DuplicateSetting(String),
    MissingSetting(&'static str),
    InvalidNumber { setting: &'static str, value: String },
}

impl Cfg {
    /// Loads a config file with one `KEY=value` entry per line.
    ///
    /// Blank lines and lines starting with `#` are skipped, whitespace
    /// around keys and values is trimmed. Every setting in
    /// `constants::SETTINGS` must appear exactly once; a value may
    /// itself contain `=`.
    ///
    /// # Errors
    ///
    /// - `FileNotReadable` if the file could not be opened or read.
    /// - `MalformedLine` for a non-comment line without `=`.
    /// - `UnknownSetting` / `DuplicateSetting` for a bad or repeated key.
    /// - `MissingSetting` naming the first absent key.
    /// - `InvalidNumber` for a numeric setting that does not parse.
    pub fn new(path: &str) -> Result<Self, CfgError> {
        let contents = fs::read_to_string(path)
            .map_err(|err| CfgError::FileNotReadable(format!("{}: {}", path, err)))?;
        let entries = Self::parse_entries(&contents)?;

        Ok(Self {
            tcp_port: Self::number(&entries, constants::TCP_PORT)?,
            log_directory: Self::text(&entries, constants::LOG_DIRECTORY)?,
            download_directory: Self::text(&entries, constants::DOWNLOAD_DIRECTORY)?,
            connect_seconds_timeout: Self::number(&entries, constants::CONNECT_SECONDS_TIMEOUT)?,
            max_peers_per_torrent: Self::number(&entries, constants::MAX_PEERS_PER_TORRENT)?,
            max_log_file_kb_size: Self::number(&entries, constants::MAX_LOG_FILE_KB_SIZE)?,
        })
    }

    fn parse_entries(contents: &str) -> Result<HashMap<String, String>, CfgError> {
        let mut entries = HashMap::new();

        for (index, raw) in contents.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, value) = match line.split_once('=') {
                Some((key, value)) => (key.trim(), value.trim()),
                None => {
                    return Err(CfgError::MalformedLine {
                        line_number: index + 1,
                        line: raw.to_string(),
                    })
                }
            };

            if !constants::SETTINGS.contains(&key) {
                return Err(CfgError::UnknownSetting(key.to_string()));
            }
            if entries
                .insert(key.to_string(), value.to_string())
                .is_some()
            {
                return Err(CfgError::DuplicateSetting(key.to_string()));
            }
        }

        Ok(entries)
    }

    fn text(
        entries: &HashMap<String, String>,
        setting: &'static str,
    ) -> Result<String, CfgError> {
        entries
            .get(setting)
            .cloned()
            .ok_or(CfgError::MissingSetting(setting))
    }

    fn number<F: FromStr>(
        entries: &HashMap<String, String>,
        setting: &'static str,
    ) -> Result<F, CfgError> {
        let value = Self::text(entries, setting)?;
        value
            .parse()
            .map_err(|_| CfgError::InvalidNumber { setting, value })
    }
}
