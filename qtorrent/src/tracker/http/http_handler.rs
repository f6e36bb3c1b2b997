use native_tls::HandshakeError;
use native_tls::TlsConnector;
use std::io::Error as IOError;
use std::io::{Read, Write};
use std::net::TcpStream;

use super::query_params::QueryParams;
use super::url_parser::{ConnectionProtocol, TrackerUrl};

/// `HttpHandler` struct to make the announce **HTTP** request.
///
/// Use `request()` to issue the GET; it speaks plain HTTP or TLS
/// depending on the tracker url protocol.
#[derive(Debug)]
pub struct HttpHandler {
    tracker_url: TrackerUrl,
    query_params: QueryParams,
}

/// Posible `HttpHandler` errors
#[derive(Debug)]
pub enum HttpHandlerError {
    CreateTlsConnectorError(native_tls::Error),
    TcpStreamConnectError(IOError),
    TlsStreamConnectError,
    ErrorWritingStream(IOError),
    ErrorReadingStream(IOError),
}

impl HttpHandler {
    /// Builds a new `HttpHandler` from a **TrackerUrl** and a **QueryParams**.
    pub fn new(tracker_url: TrackerUrl, query_params: QueryParams) -> Self {
        Self {
            tracker_url,
            query_params,
        }
    }

    /// Issues the announce GET and returns the response body bytes.
    ///
    /// It returns an `HttpHandlerError` if:
    /// - There was a problem creating a TlsConnector.
    /// - There was a problem connecting to the tracker url.
    /// - There was a problem writing to the tracker stream.
    /// - There was a problem reading the tracker stream.
    pub fn request(&self) -> Result<Vec<u8>, HttpHandlerError> {
        match self.tracker_url.protocol {
            ConnectionProtocol::Https => self.https_request(),
            ConnectionProtocol::Http => self.http_request(),
        }
    }

    fn https_request(&self) -> Result<Vec<u8>, HttpHandlerError> {
        let connector = TlsConnector::new().map_err(HttpHandlerError::CreateTlsConnectorError)?;
        let stream = self.connect_tcp_stream()?;
        let stream = connector
            .connect(self.tracker_url.host.as_str(), stream)
            .map_err(|err| match err {
                HandshakeError::Failure(_) | HandshakeError::WouldBlock(_) => {
                    HttpHandlerError::TlsStreamConnectError
                }
            })?;
        self.request_and_decode(stream)
    }

    fn http_request(&self) -> Result<Vec<u8>, HttpHandlerError> {
        self.request_and_decode(self.connect_tcp_stream()?)
    }

    fn connect_tcp_stream(&self) -> Result<TcpStream, HttpHandlerError> {
        let connect_url = format!("{}:{}", self.tracker_url.host, self.tracker_url.port);
        TcpStream::connect(connect_url).map_err(HttpHandlerError::TcpStreamConnectError)
    }

    fn request_and_decode<A>(&self, mut stream: A) -> Result<Vec<u8>, HttpHandlerError>
    where
        A: Write + Read,
    {
        let request = self.build_request();

        stream
            .write_all(request.as_bytes())
            .map_err(HttpHandlerError::ErrorWritingStream)?;

        let mut response = vec![];
        stream
            .read_to_end(&mut response)
            .map_err(HttpHandlerError::ErrorReadingStream)?;

        Ok(Self::response_body(&response).to_vec())
    }

    fn build_request(&self) -> String {
        format!(
            "GET /{}{} HTTP/1.1\r\nHost: {}\r\nUser-Agent: QTorrent/0.1\r\nConnection: close\r\n\r\n",
            self.tracker_url.endpoint,
            self.query_params.build(),
            self.tracker_url.host
        )
    }

    /// The body starts after the first blank line of the response.
    fn response_body(response: &[u8]) -> &[u8] {
        let mut i = 0;
        while i + 3 < response.len() {
            if &response[i..i + 4] == b"\r\n\r\n" {
                return &response[i + 4..];
            }
            i += 1;
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::http::url_parser;

    /// A stream that records what is written and plays back a canned
    /// response, so no test touches the network.
    struct FakeStream {
        written: Vec<u8>,
        response: Vec<u8>,
        position: usize,
    }

    impl Write for FakeStream {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Read for FakeStream {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let remaining = &self.response[self.position..];
            let n = remaining.len().min(buf.len());
            buf[..n].copy_from_slice(&remaining[..n]);
            self.position += n;
            Ok(n)
        }
    }

    #[test]
    fn test_request_line_and_headers() {
        let handler = build_handler();
        let mut stream = FakeStream {
            written: vec![],
            response: b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\nd8:intervali900ee"
                .to_vec(),
            position: 0,
        };

        let body = handler.request_and_decode(&mut stream).unwrap();
        let written = String::from_utf8(stream.written.clone()).unwrap();

        assert!(written.starts_with("GET /announce?info_hash="));
        assert!(written.contains("&port=6881&uploaded=0&downloaded=0&left=100&event=started"));
        assert!(written.contains("Host: tracker.example.org\r\n"));
        assert!(written.ends_with("\r\n\r\n"));
        assert_eq!(body, b"d8:intervali900ee");
    }

    #[test]
    fn test_response_body_without_headers_is_passed_through() {
        assert_eq!(HttpHandler::response_body(b"d2:abe"), b"d2:abe");
    }

    #[test]
    fn test_response_body_skips_headers() {
        assert_eq!(
            HttpHandler::response_body(b"HTTP/1.1 200 OK\r\nX: y\r\n\r\nbody"),
            b"body"
        );
    }

    // Auxiliary functions

    fn build_handler() -> HttpHandler {
        HttpHandler::new(
            url_parser::TrackerUrl::parse("http://tracker.example.org/announce").unwrap(),
            QueryParams::new([0xab; 20], *b"-QT0100-123456789012", 6881, 100),
        )
    }
}
