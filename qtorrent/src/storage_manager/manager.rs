use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use tracing::{info, warn};

use crate::torrent_parser::info::FileEntry;
use crate::torrent_parser::torrent::Torrent;

/// Writes a completed payload under the download directory.
///
/// A single file torrent becomes one file named after the torrent. A
/// multi file torrent becomes a directory tree: the payload is split by
/// the declared file lengths, in declaration order. File boundaries may
/// fall in the middle of a piece; since the payload is already fully
/// reconstructed that needs no special handling.
pub fn save_payload(
    torrent: &Torrent,
    payload: &[u8],
    download_directory: &str,
) -> io::Result<()> {
    match &torrent.info.files {
        None => save_single_file(torrent, payload, download_directory),
        Some(entries) => save_multiple_files(torrent, entries, payload, download_directory),
    }
}

fn save_single_file(torrent: &Torrent, payload: &[u8], download_directory: &str) -> io::Result<()> {
    fs::create_dir_all(download_directory)?;
    let path = Path::new(download_directory).join(&torrent.info.name);

    let mut file = File::create(&path)?;
    file.write_all(payload)?;

    info!("Saved {}", path.display());
    Ok(())
}

fn save_multiple_files(
    torrent: &Torrent,
    entries: &[FileEntry],
    payload: &[u8],
    download_directory: &str,
) -> io::Result<()> {
    let base_dir = Path::new(download_directory).join(&torrent.info.name);

    let mut begin = 0usize;
    for entry in entries {
        let end = begin + entry.length as usize;
        if end > payload.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "declared file lengths exceed the payload ({} > {})",
                    end,
                    payload.len()
                ),
            ));
        }

        let path = base_dir.join(&entry.path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(&path)?;
        file.write_all(&payload[begin..end])?;
        info!("Saved {}", path.display());

        begin = end;
    }

    if begin != payload.len() {
        warn!(
            "{}: payload has {} bytes not covered by any declared file",
            torrent.info.name,
            payload.len() - begin
        );
    }
    Ok(())
}
