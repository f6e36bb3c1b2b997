use std::collections::BTreeMap;

/// A bencoded value: integer, byte string, list or dictionary.
///
/// Dictionary keys are raw byte strings kept in a `BTreeMap` so that
/// re-encoding a decoded dictionary preserves the canonical key order.
#[derive(PartialEq, Debug, Clone)]
pub enum Bencode {
    Int(i64),
    Bytes(Vec<u8>),
    List(Vec<Bencode>),
    Dict(BTreeMap<Vec<u8>, Bencode>),
}

/// Posible decoding errors.
#[derive(PartialEq, Debug)]
pub enum BencodeError {
    UnexpectedEnd,
    UnknownPrefix(u8),
    InvalidInteger,
    InvalidStringLength,
    InvalidDictKey,
}

pub trait ToBencode {
    fn to_bencode(&self) -> Bencode;
}

impl ToBencode for String {
    fn to_bencode(&self) -> Bencode {
        Bencode::Bytes(self.as_bytes().to_vec())
    }
}

impl ToBencode for i64 {
    fn to_bencode(&self) -> Bencode {
        Bencode::Int(*self)
    }
}

impl ToBencode for u64 {
    fn to_bencode(&self) -> Bencode {
        Bencode::Int(*self as i64)
    }
}

impl ToBencode for u32 {
    fn to_bencode(&self) -> Bencode {
        Bencode::Int((*self).into())
    }
}

impl ToBencode for u16 {
    fn to_bencode(&self) -> Bencode {
        Bencode::Int((*self).into())
    }
}

impl ToBencode for Vec<u8> {
    fn to_bencode(&self) -> Bencode {
        Bencode::Bytes(self.clone())
    }
}

impl ToBencode for BTreeMap<Vec<u8>, Bencode> {
    fn to_bencode(&self) -> Bencode {
        Bencode::Dict(self.clone())
    }
}

impl<T: ToBencode> ToBencode for Vec<T> {
    fn to_bencode(&self) -> Bencode {
        Bencode::List(self.iter().map(|v| v.to_bencode()).collect())
    }
}

impl Bencode {
    /// Decodes the first bencoded value in `data`.
    ///
    /// Trailing bytes after the value are ignored, which matches what
    /// trackers and torrent files actually send.
    ///
    /// # Example
    ///
    /// ```rust
    /// use bencoder::bencode::Bencode;
    ///
    /// let bencode = Bencode::decode(b"5:hello").unwrap();
    /// assert_eq!(bencode, Bencode::Bytes(b"hello".to_vec()));
    ///
    /// let bencode = Bencode::decode(b"i-42e").unwrap();
    /// assert_eq!(bencode, Bencode::Int(-42));
    /// ```
    pub fn decode(data: &[u8]) -> Result<Bencode, BencodeError> {
        let mut decoder = Decoder { data, pos: 0 };
        decoder.parse_value()
    }

    /// Encodes a value implementing `ToBencode` into its wire bytes.
    pub fn encode<T: ToBencode>(value: &T) -> Vec<u8> {
        value.to_bencode().to_bytes()
    }

    /// Serializes this value into its bencoded byte form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_into(&mut out);
        out
    }

    fn write_into(&self, out: &mut Vec<u8>) {
        match self {
            Bencode::Int(n) => {
                out.push(b'i');
                out.extend(n.to_string().into_bytes());
                out.push(b'e');
            }
            Bencode::Bytes(bytes) => {
                out.extend(bytes.len().to_string().into_bytes());
                out.push(b':');
                out.extend(bytes);
            }
            Bencode::List(items) => {
                out.push(b'l');
                for item in items {
                    item.write_into(out);
                }
                out.push(b'e');
            }
            Bencode::Dict(entries) => {
                out.push(b'd');
                for (key, value) in entries {
                    out.extend(key.len().to_string().into_bytes());
                    out.push(b':');
                    out.extend(key);
                    value.write_into(out);
                }
                out.push(b'e');
            }
        }
    }
}

struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn peek(&self) -> Result<u8, BencodeError> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(BencodeError::UnexpectedEnd)
    }

    fn bump(&mut self) -> Result<u8, BencodeError> {
        let byte = self.peek()?;
        self.pos += 1;
        Ok(byte)
    }

    fn parse_value(&mut self) -> Result<Bencode, BencodeError> {
        match self.peek()? {
            b'i' => self.parse_int(),
            b'l' => self.parse_list(),
            b'd' => self.parse_dict(),
            b'0'..=b'9' => self.parse_bytes().map(Bencode::Bytes),
            other => Err(BencodeError::UnknownPrefix(other)),
        }
    }

    fn parse_int(&mut self) -> Result<Bencode, BencodeError> {
        self.bump()?; // 'i'
        let start = self.pos;
        while self.peek()? != b'e' {
            self.pos += 1;
        }
        let digits = &self.data[start..self.pos];
        self.bump()?; // 'e'

        let text = std::str::from_utf8(digits).map_err(|_| BencodeError::InvalidInteger)?;
        let number: i64 = text.parse().map_err(|_| BencodeError::InvalidInteger)?;
        Ok(Bencode::Int(number))
    }

    fn parse_bytes(&mut self) -> Result<Vec<u8>, BencodeError> {
        let start = self.pos;
        while self.peek()? != b':' {
            self.pos += 1;
        }
        let digits = &self.data[start..self.pos];
        self.bump()?; // ':'

        let text =
            std::str::from_utf8(digits).map_err(|_| BencodeError::InvalidStringLength)?;
        let length: usize = text.parse().map_err(|_| BencodeError::InvalidStringLength)?;

        if self.pos + length > self.data.len() {
            return Err(BencodeError::UnexpectedEnd);
        }
        let bytes = self.data[self.pos..self.pos + length].to_vec();
        self.pos += length;
        Ok(bytes)
    }

    fn parse_list(&mut self) -> Result<Bencode, BencodeError> {
        self.bump()?; // 'l'
        let mut items = Vec::new();
        while self.peek()? != b'e' {
            items.push(self.parse_value()?);
        }
        self.bump()?; // 'e'
        Ok(Bencode::List(items))
    }

    fn parse_dict(&mut self) -> Result<Bencode, BencodeError> {
        self.bump()?; // 'd'
        let mut entries = BTreeMap::new();
        while self.peek()? != b'e' {
            let key = match self.parse_value()? {
                Bencode::Bytes(key) => key,
                _ => return Err(BencodeError::InvalidDictKey),
            };
            let value = self.parse_value()?;
            entries.insert(key, value);
        }
        self.bump()?; // 'e'
        Ok(Bencode::Dict(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_positive_int() {
        assert_eq!(Bencode::decode(b"i123e").unwrap(), Bencode::Int(123));
    }

    #[test]
    fn test_decode_negative_int() {
        assert_eq!(Bencode::decode(b"i-7e").unwrap(), Bencode::Int(-7));
    }

    #[test]
    fn test_decode_bytes() {
        assert_eq!(
            Bencode::decode(b"4:spam").unwrap(),
            Bencode::Bytes(b"spam".to_vec())
        );
    }

    #[test]
    fn test_decode_empty_bytes() {
        assert_eq!(Bencode::decode(b"0:").unwrap(), Bencode::Bytes(vec![]));
    }

    #[test]
    fn test_decode_list() {
        assert_eq!(
            Bencode::decode(b"l4:spami3ee").unwrap(),
            Bencode::List(vec![Bencode::Bytes(b"spam".to_vec()), Bencode::Int(3)])
        );
    }

    #[test]
    fn test_decode_dict() {
        let mut expected = BTreeMap::new();
        expected.insert(b"bar".to_vec(), Bencode::Bytes(b"spam".to_vec()));
        expected.insert(b"foo".to_vec(), Bencode::Int(42));

        assert_eq!(
            Bencode::decode(b"d3:bar4:spam3:fooi42ee").unwrap(),
            Bencode::Dict(expected)
        );
    }

    #[test]
    fn test_decode_truncated_bytes() {
        assert_eq!(
            Bencode::decode(b"10:short").unwrap_err(),
            BencodeError::UnexpectedEnd
        );
    }

    #[test]
    fn test_decode_truncated_list() {
        assert_eq!(
            Bencode::decode(b"li1e").unwrap_err(),
            BencodeError::UnexpectedEnd
        );
    }

    #[test]
    fn test_decode_unknown_prefix() {
        assert_eq!(
            Bencode::decode(b"x123").unwrap_err(),
            BencodeError::UnknownPrefix(b'x')
        );
    }

    #[test]
    fn test_decode_bad_integer() {
        assert_eq!(
            Bencode::decode(b"i12x4e").unwrap_err(),
            BencodeError::InvalidInteger
        );
    }

    #[test]
    fn test_decode_non_bytes_dict_key() {
        assert_eq!(
            Bencode::decode(b"di1ei2ee").unwrap_err(),
            BencodeError::InvalidDictKey
        );
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        assert_eq!(Bencode::decode(b"i1etrailing").unwrap(), Bencode::Int(1));
    }

    #[test]
    fn test_encode_int() {
        assert_eq!(Bencode::Int(-12).to_bytes(), b"i-12e");
    }

    #[test]
    fn test_encode_bytes() {
        assert_eq!(Bencode::Bytes(b"spam".to_vec()).to_bytes(), b"4:spam");
    }

    #[test]
    fn test_encode_dict_is_key_ordered() {
        let mut dict = BTreeMap::new();
        dict.insert(b"zz".to_vec(), Bencode::Int(1));
        dict.insert(b"aa".to_vec(), Bencode::Int(2));

        assert_eq!(Bencode::Dict(dict).to_bytes(), b"d2:aai2e2:zzi1ee");
    }

    #[test]
    fn test_roundtrip_nested() {
        let data = b"d4:infod6:lengthi100e4:name4:test12:piece lengthi20eee".to_vec();
        let decoded = Bencode::decode(&data).unwrap();

        assert_eq!(decoded.to_bytes(), data);
    }

    #[test]
    fn test_encode_to_bencode_types() {
        assert_eq!(Bencode::encode(&String::from("ab")), b"2:ab");
        assert_eq!(Bencode::encode(&7i64), b"i7e");
        assert_eq!(Bencode::encode(&vec![1i64, 2]), b"li1ei2ee");
    }
}
