use bencoder::bencode::Bencode;

/// The decoded `info` dictionary of a metainfo file.
///
/// `length` is always the total payload size: for multi file torrents it
/// is the sum of the declared file lengths and `files` holds the layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Info {
    pub length: i64,
    pub name: String,
    pub piece_length: i64,
    pub pieces: Vec<u8>,
    pub files: Option<Vec<FileEntry>>,
}

/// One entry of a multi file layout. `path` is the relative path inside
/// the torrent directory, components joined with `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: String,
    pub length: i64,
}

#[derive(Debug, PartialEq)]
pub enum FromInfoError {
    MissingLength,
    MissingName,
    MissingPieceLength,
    MissingPieces,
    InvalidPiecesLength,
    InvalidFiles,
    NotADict,
}

impl Info {
    pub fn from(bencode: &Bencode) -> Result<Info, FromInfoError> {
        let mut name = String::new();
        let mut length = None;
        let mut piece_length = 0;
        let mut pieces = Vec::new();
        let mut files = None;

        let d = match bencode {
            Bencode::Dict(d) => d,
            _ => return Err(FromInfoError::NotADict),
        };

        for (k, v) in d.iter() {
            if k == b"name" {
                name = Info::create_name(v)?;
            } else if k == b"length" {
                length = Some(Info::create_length(v)?);
            } else if k == b"piece length" {
                piece_length = Info::create_piece_length(v)?;
            } else if k == b"pieces" {
                pieces = Info::create_pieces(v)?;
            } else if k == b"files" {
                files = Some(Info::create_files(v)?);
            }
        }

        if name.is_empty() {
            return Err(FromInfoError::MissingName);
        }
        if piece_length <= 0 {
            return Err(FromInfoError::MissingPieceLength);
        }
        if pieces.is_empty() || pieces.len() % 20 != 0 {
            return Err(FromInfoError::InvalidPiecesLength);
        }

        // A multi file torrent declares no top level length.
        let length = match (&files, length) {
            (Some(entries), _) => entries.iter().map(|f| f.length).sum(),
            (None, Some(length)) => length,
            (None, None) => return Err(FromInfoError::MissingLength),
        };

        Ok(Info {
            length,
            name,
            piece_length,
            pieces,
            files,
        })
    }

    fn create_name(bencode: &Bencode) -> Result<String, FromInfoError> {
        let bytes = match bencode {
            Bencode::Bytes(bytes) => bytes,
            _ => return Err(FromInfoError::MissingName),
        };

        String::from_utf8(bytes.to_vec()).map_err(|_| FromInfoError::MissingName)
    }

    fn create_length(bencode: &Bencode) -> Result<i64, FromInfoError> {
        match bencode {
            Bencode::Int(n) => Ok(*n),
            _ => Err(FromInfoError::MissingLength),
        }
    }

    fn create_piece_length(bencode: &Bencode) -> Result<i64, FromInfoError> {
        match bencode {
            Bencode::Int(n) => Ok(*n),
            _ => Err(FromInfoError::MissingPieceLength),
        }
    }

    fn create_pieces(bencode: &Bencode) -> Result<Vec<u8>, FromInfoError> {
        match bencode {
            Bencode::Bytes(bytes) => Ok(bytes.to_vec()),
            _ => Err(FromInfoError::MissingPieces),
        }
    }

    fn create_files(bencode: &Bencode) -> Result<Vec<FileEntry>, FromInfoError> {
        let list = match bencode {
            Bencode::List(list) => list,
            _ => return Err(FromInfoError::InvalidFiles),
        };

        let mut entries = Vec::new();
        for item in list {
            entries.push(Self::create_file_entry(item)?);
        }
        if entries.is_empty() {
            return Err(FromInfoError::InvalidFiles);
        }
        Ok(entries)
    }

    fn create_file_entry(bencode: &Bencode) -> Result<FileEntry, FromInfoError> {
        let d = match bencode {
            Bencode::Dict(d) => d,
            _ => return Err(FromInfoError::InvalidFiles),
        };

        let mut path_components = Vec::new();
        let mut length = None;

        for (k, v) in d.iter() {
            if k == b"length" {
                match v {
                    Bencode::Int(n) => length = Some(*n),
                    _ => return Err(FromInfoError::InvalidFiles),
                }
            } else if k == b"path" {
                let list = match v {
                    Bencode::List(list) => list,
                    _ => return Err(FromInfoError::InvalidFiles),
                };
                for component in list {
                    match component {
                        Bencode::Bytes(bytes) => path_components.push(
                            String::from_utf8(bytes.to_vec())
                                .map_err(|_| FromInfoError::InvalidFiles)?,
                        ),
                        _ => return Err(FromInfoError::InvalidFiles),
                    }
                }
            }
        }

        match (path_components.is_empty(), length) {
            (false, Some(length)) => Ok(FileEntry {
                path: path_components.join("/"),
                length,
            }),
            _ => Err(FromInfoError::InvalidFiles),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_from_info_single_file() {
        let mut info = BTreeMap::new();
        info.insert(b"length".to_vec(), Bencode::Int(25));
        info.insert(b"name".to_vec(), Bencode::Bytes(b"test1".to_vec()));
        info.insert(b"piece length".to_vec(), Bencode::Int(10));
        info.insert(b"pieces".to_vec(), Bencode::Bytes(vec![0xab; 60]));
        let bencode = Bencode::Dict(info);

        let info = Info::from(&bencode).unwrap();
        assert_eq!(info.length, 25);
        assert_eq!(info.name, "test1");
        assert_eq!(info.piece_length, 10);
        assert_eq!(info.pieces, vec![0xab; 60]);
        assert_eq!(info.files, None);
    }

    #[test]
    fn test_from_info_empty_is_an_error() {
        let bencode = Bencode::Dict(BTreeMap::new());
        assert_eq!(Info::from(&bencode).unwrap_err(), FromInfoError::MissingName);
    }

    #[test]
    fn test_from_info_missing_length() {
        let mut info = BTreeMap::new();
        info.insert(b"name".to_vec(), Bencode::Bytes(b"test1".to_vec()));
        info.insert(b"piece length".to_vec(), Bencode::Int(10));
        info.insert(b"pieces".to_vec(), Bencode::Bytes(vec![0xab; 20]));
        let bencode = Bencode::Dict(info);

        assert_eq!(
            Info::from(&bencode).unwrap_err(),
            FromInfoError::MissingLength
        );
    }

    #[test]
    fn test_from_info_pieces_not_multiple_of_twenty() {
        let mut info = BTreeMap::new();
        info.insert(b"length".to_vec(), Bencode::Int(25));
        info.insert(b"name".to_vec(), Bencode::Bytes(b"test1".to_vec()));
        info.insert(b"piece length".to_vec(), Bencode::Int(10));
        info.insert(b"pieces".to_vec(), Bencode::Bytes(vec![0xab; 21]));
        let bencode = Bencode::Dict(info);

        assert_eq!(
            Info::from(&bencode).unwrap_err(),
            FromInfoError::InvalidPiecesLength
        );
    }

    #[test]
    fn test_from_info_not_a_dict() {
        let bencode = Bencode::Int(1);
        assert_eq!(Info::from(&bencode).unwrap_err(), FromInfoError::NotADict);
    }

    #[test]
    fn test_from_info_multiple_files() {
        let file1 = build_file_entry(vec![b"a.txt".to_vec()], 3);
        let file2 = build_file_entry(vec![b"sub".to_vec(), b"b.txt".to_vec()], 4);

        let mut info = BTreeMap::new();
        info.insert(b"name".to_vec(), Bencode::Bytes(b"dir".to_vec()));
        info.insert(b"piece length".to_vec(), Bencode::Int(4));
        info.insert(b"pieces".to_vec(), Bencode::Bytes(vec![0xab; 40]));
        info.insert(b"files".to_vec(), Bencode::List(vec![file1, file2]));
        let bencode = Bencode::Dict(info);

        let info = Info::from(&bencode).unwrap();
        assert_eq!(info.length, 7);
        let files = info.files.unwrap();
        assert_eq!(files[0], FileEntry { path: "a.txt".to_string(), length: 3 });
        assert_eq!(
            files[1],
            FileEntry { path: "sub/b.txt".to_string(), length: 4 }
        );
    }

    #[test]
    fn test_from_info_file_entry_without_path() {
        let mut entry = BTreeMap::new();
        entry.insert(b"length".to_vec(), Bencode::Int(3));

        let mut info = BTreeMap::new();
        info.insert(b"name".to_vec(), Bencode::Bytes(b"dir".to_vec()));
        info.insert(b"piece length".to_vec(), Bencode::Int(4));
        info.insert(b"pieces".to_vec(), Bencode::Bytes(vec![0xab; 20]));
        info.insert(
            b"files".to_vec(),
            Bencode::List(vec![Bencode::Dict(entry)]),
        );
        let bencode = Bencode::Dict(info);

        assert_eq!(
            Info::from(&bencode).unwrap_err(),
            FromInfoError::InvalidFiles
        );
    }

    // Auxiliary functions

    fn build_file_entry(path: Vec<Vec<u8>>, length: i64) -> Bencode {
        let mut entry = BTreeMap::new();
        entry.insert(b"length".to_vec(), Bencode::Int(length));
        entry.insert(
            b"path".to_vec(),
            Bencode::List(path.into_iter().map(Bencode::Bytes).collect()),
        );
        Bencode::Dict(entry)
    }
}
