/// Percent-encodes raw bytes for use inside a URL query string.
///
/// Unreserved characters (RFC 3986: letters, digits, `-`, `_`, `.`, `~`)
/// pass through; every other byte becomes `%XX`. Info hashes are raw
/// 20-byte digests, so most of their bytes take the escaped form.
pub fn encode(bytes: &[u8]) -> String {
    let mut encoded = String::with_capacity(bytes.len() * 3);
    for &byte in bytes {
        if is_unreserved(byte) {
            encoded.push(byte as char);
        } else {
            encoded.push('%');
            encoded.push_str(&format!("{:02X}", byte));
        }
    }
    encoded
}

fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~')
}
