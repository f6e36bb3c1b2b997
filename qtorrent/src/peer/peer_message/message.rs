/// A peer wire message, one variant per message kind.
///
/// Frames look like `length_prefix: u32 BE | msg_id: u8 | payload`; a
/// zero length prefix is a keep-alive with no id and no payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    KeepAlive,
    Choke,
    Unchoke,
    Interested,
    NotInterested,
    Have {
        piece_index: u32,
    },
    Bitfield {
        payload: Vec<u8>,
    },
    Request {
        index: u32,
        begin: u32,
        length: u32,
    },
    Piece {
        index: u32,
        begin: u32,
        block: Vec<u8>,
    },
    Cancel {
        index: u32,
        begin: u32,
        length: u32,
    },
    Port {
        port: u16,
    },
}

#[derive(Debug, PartialEq)]
pub enum MessageError {
    EmptyFrame,
    UnknownId(u8),
    PayloadLengthMismatch { id: u8, length: usize },
}

impl Message {
    /// Serializes the message into a full frame, length prefix included.
    pub fn as_bytes(&self) -> Vec<u8> {
        let (id, payload) = match self {
            Message::KeepAlive => return vec![0, 0, 0, 0],
            Message::Choke => (0, vec![]),
            Message::Unchoke => (1, vec![]),
            Message::Interested => (2, vec![]),
            Message::NotInterested => (3, vec![]),
            Message::Have { piece_index } => (4, piece_index.to_be_bytes().to_vec()),
            Message::Bitfield { payload } => (5, payload.clone()),
            Message::Request {
                index,
                begin,
                length,
            } => (6, Self::block_descriptor(*index, *begin, *length)),
            Message::Piece {
                index,
                begin,
                block,
            } => {
                let mut payload = Vec::with_capacity(8 + block.len());
                payload.extend(index.to_be_bytes());
                payload.extend(begin.to_be_bytes());
                payload.extend(block);
                (7, payload)
            }
            Message::Cancel {
                index,
                begin,
                length,
            } => (8, Self::block_descriptor(*index, *begin, *length)),
            Message::Port { port } => (9, port.to_be_bytes().to_vec()),
        };

        let mut bytes = Vec::with_capacity(5 + payload.len());
        bytes.extend((payload.len() as u32 + 1).to_be_bytes());
        bytes.push(id);
        bytes.extend(payload);
        bytes
    }

    /// Parses the body of a frame (the bytes after the length prefix:
    /// `msg_id | payload`). Keep-alives have an empty body and are
    /// recognized by the caller from the zero prefix alone.
    pub fn from_frame_payload(body: &[u8]) -> Result<Message, MessageError> {
        let (id, payload) = match body.split_first() {
            Some((id, payload)) => (*id, payload),
            None => return Err(MessageError::EmptyFrame),
        };

        let message = match id {
            0 => Message::Choke,
            1 => Message::Unchoke,
            2 => Message::Interested,
            3 => Message::NotInterested,
            4 => Message::Have {
                piece_index: Self::read_u32(id, payload, 0)?,
            },
            5 => Message::Bitfield {
                payload: payload.to_vec(),
            },
            6 => {
                let (index, begin, length) = Self::read_block_descriptor(id, payload)?;
                Message::Request {
                    index,
                    begin,
                    length,
                }
            }
            7 => {
                if payload.len() < 8 {
                    return Err(MessageError::PayloadLengthMismatch {
                        id,
                        length: payload.len(),
                    });
                }
                Message::Piece {
                    index: Self::read_u32(id, payload, 0)?,
                    begin: Self::read_u32(id, payload, 4)?,
                    block: payload[8..].to_vec(),
                }
            }
            8 => {
                let (index, begin, length) = Self::read_block_descriptor(id, payload)?;
                Message::Cancel {
                    index,
                    begin,
                    length,
                }
            }
            9 => {
                if payload.len() != 2 {
                    return Err(MessageError::PayloadLengthMismatch {
                        id,
                        length: payload.len(),
                    });
                }
                Message::Port {
                    port: u16::from_be_bytes([payload[0], payload[1]]),
                }
            }
            other => return Err(MessageError::UnknownId(other)),
        };

        // Flag messages carry no payload.
        if matches!(id, 0..=3) && !payload.is_empty() {
            return Err(MessageError::PayloadLengthMismatch {
                id,
                length: payload.len(),
            });
        }
        if matches!(id, 4 | 6 | 8) {
            let expected = if id == 4 { 4 } else { 12 };
            if payload.len() != expected {
                return Err(MessageError::PayloadLengthMismatch {
                    id,
                    length: payload.len(),
                });
            }
        }

        Ok(message)
    }

    /// The message kind as a short name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Message::KeepAlive => "keep-alive",
            Message::Choke => "choke",
            Message::Unchoke => "unchoke",
            Message::Interested => "interested",
            Message::NotInterested => "not_interested",
            Message::Have { .. } => "have",
            Message::Bitfield { .. } => "bitfield",
            Message::Request { .. } => "request",
            Message::Piece { .. } => "piece",
            Message::Cancel { .. } => "cancel",
            Message::Port { .. } => "port",
        }
    }

    fn block_descriptor(index: u32, begin: u32, length: u32) -> Vec<u8> {
        let mut payload = Vec::with_capacity(12);
        payload.extend(index.to_be_bytes());
        payload.extend(begin.to_be_bytes());
        payload.extend(length.to_be_bytes());
        payload
    }

    fn read_block_descriptor(id: u8, payload: &[u8]) -> Result<(u32, u32, u32), MessageError> {
        Ok((
            Self::read_u32(id, payload, 0)?,
            Self::read_u32(id, payload, 4)?,
            Self::read_u32(id, payload, 8)?,
        ))
    }

    fn read_u32(id: u8, payload: &[u8], offset: usize) -> Result<u32, MessageError> {
        match payload.get(offset..offset + 4) {
            Some(bytes) => Ok(u32::from_be_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3],
            ])),
            None => Err(MessageError::PayloadLengthMismatch {
                id,
                length: payload.len(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keep_alive_as_bytes() {
        assert_eq!(Message::KeepAlive.as_bytes(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_interested_as_bytes() {
        assert_eq!(Message::Interested.as_bytes(), vec![0, 0, 0, 1, 2]);
    }

    #[test]
    fn test_request_as_bytes() {
        let msg = Message::Request {
            index: 1,
            begin: 16384,
            length: 16384,
        };

        let mut expected = vec![0, 0, 0, 13, 6];
        expected.extend(1u32.to_be_bytes());
        expected.extend(16384u32.to_be_bytes());
        expected.extend(16384u32.to_be_bytes());

        assert_eq!(msg.as_bytes(), expected);
    }

    #[test]
    fn test_piece_as_bytes() {
        let msg = Message::Piece {
            index: 0,
            begin: 4,
            block: b"data".to_vec(),
        };

        let mut expected = vec![0, 0, 0, 13, 7];
        expected.extend(0u32.to_be_bytes());
        expected.extend(4u32.to_be_bytes());
        expected.extend(b"data");

        assert_eq!(msg.as_bytes(), expected);
    }

    #[test]
    fn test_every_message_kind_roundtrips() {
        let messages = vec![
            Message::Choke,
            Message::Unchoke,
            Message::Interested,
            Message::NotInterested,
            Message::Have { piece_index: 42 },
            Message::Bitfield {
                payload: vec![0b10110000, 0b00000001],
            },
            Message::Request {
                index: 3,
                begin: 32768,
                length: 16384,
            },
            Message::Piece {
                index: 9,
                begin: 16384,
                block: vec![0xaa; 37],
            },
            Message::Cancel {
                index: 3,
                begin: 32768,
                length: 16384,
            },
            Message::Port { port: 6881 },
        ];

        for msg in messages {
            let frame = msg.as_bytes();
            let decoded = Message::from_frame_payload(&frame[4..]).unwrap();
            assert_eq!(decoded, msg);
        }
    }

    #[test]
    fn test_from_frame_payload_unknown_id() {
        assert_eq!(
            Message::from_frame_payload(&[10]).unwrap_err(),
            MessageError::UnknownId(10)
        );
    }

    #[test]
    fn test_from_frame_payload_empty() {
        assert_eq!(
            Message::from_frame_payload(&[]).unwrap_err(),
            MessageError::EmptyFrame
        );
    }

    #[test]
    fn test_from_frame_payload_short_have() {
        assert_eq!(
            Message::from_frame_payload(&[4, 0, 0]).unwrap_err(),
            MessageError::PayloadLengthMismatch { id: 4, length: 2 }
        );
    }

    #[test]
    fn test_from_frame_payload_oversized_request() {
        let mut body = vec![6];
        body.extend([0; 13]);

        assert_eq!(
            Message::from_frame_payload(&body).unwrap_err(),
            MessageError::PayloadLengthMismatch { id: 6, length: 13 }
        );
    }

    #[test]
    fn test_from_frame_payload_short_piece() {
        let body = [7, 0, 0, 0, 0];

        assert_eq!(
            Message::from_frame_payload(&body).unwrap_err(),
            MessageError::PayloadLengthMismatch { id: 7, length: 4 }
        );
    }

    #[test]
    fn test_from_frame_payload_flag_with_payload() {
        assert_eq!(
            Message::from_frame_payload(&[1, 0]).unwrap_err(),
            MessageError::PayloadLengthMismatch { id: 1, length: 1 }
        );
    }

    #[test]
    fn test_piece_with_empty_block_roundtrips() {
        let msg = Message::Piece {
            index: 0,
            begin: 0,
            block: vec![],
        };
        let frame = msg.as_bytes();

        assert_eq!(Message::from_frame_payload(&frame[4..]).unwrap(), msg);
    }
}
