/// Represents a Bitfield.
///
/// It contains information about the pieces that the peer has, one bit
/// per piece, most significant bit first: bit 0 of byte 0 is piece 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitfield {
    bitfield: Vec<u8>,
}

#[derive(Debug, PartialEq)]
pub enum BitfieldError {
    WrongLength { expected: usize, received: usize },
}

impl Bitfield {
    pub fn new(bitfield: Vec<u8>) -> Bitfield {
        Bitfield { bitfield }
    }

    /// Creates an all-zero bitfield sized for `total_pieces` pieces.
    pub fn for_pieces(total_pieces: u32) -> Bitfield {
        Bitfield {
            bitfield: vec![0; Self::bytes_for(total_pieces)],
        }
    }

    /// Builds a bitfield from a received `bitfield` message payload.
    ///
    /// The payload must be exactly the number of bytes needed to hold one
    /// bit per piece; trailing pad bits inside the last byte are ignored
    /// because no piece index ever reaches them.
    pub fn from_message_payload(
        payload: Vec<u8>,
        total_pieces: u32,
    ) -> Result<Bitfield, BitfieldError> {
        let expected = Self::bytes_for(total_pieces);
        if payload.len() != expected {
            return Err(BitfieldError::WrongLength {
                expected,
                received: payload.len(),
            });
        }
        Ok(Bitfield { bitfield: payload })
    }

    /// Returns whether the bitfield has the piece with the given index.
    pub fn has_piece(&self, index: u32) -> bool {
        let byte_index = (index / 8) as usize;
        let byte = match self.bitfield.get(byte_index) {
            Some(byte) => *byte,
            None => return false,
        };

        let bit_index = 7 - (index % 8); // Gets the bit index in the byte (from the right)

        (byte >> bit_index) & 1 != 0
    }

    /// Sets the indexth bit to the given value.
    pub fn set_bit(&mut self, index: u32, value: bool) {
        let byte_index = (index / 8) as usize;
        if byte_index >= self.bitfield.len() {
            return;
        }

        let bit_index = 7 - (index % 8);
        let bit = 1 << bit_index;

        if value {
            self.bitfield[byte_index] |= bit;
        } else {
            self.bitfield[byte_index] &= !bit;
        }
    }

    pub fn get_vec(&self) -> Vec<u8> {
        self.bitfield.clone()
    }

    fn bytes_for(total_pieces: u32) -> usize {
        (total_pieces as usize + 7) / 8
    }
}
