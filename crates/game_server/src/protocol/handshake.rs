//! HTTP upgrade handshake.

use crate::error::ProtocolError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha1::{Digest, Sha1};
use std::collections::HashMap;

/// Appended to the client key before hashing, fixed by RFC 6455.
pub const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Subprotocol name a client offers to enable the payload cipher.
pub const CIPHER_PROTOCOL: &str = "go.chacha20poly1305";

pub const BAD_REQUEST_RESPONSE: &str =
    "HTTP/1.1 400 Bad Request\r\nConnection: close\r\nContent-Length: 0\r\n\r\n";

/// Whether the first bytes of a connection look like an upgrade request.
pub fn is_handshake(bytes: &[u8]) -> bool {
    bytes.starts_with(b"GET")
}

/// Length of the request head including the blank line, once it is complete.
pub fn request_end(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .map(|position| position + 4)
}

/// `Sec-WebSocket-Accept` token for a client key.
pub fn accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.trim().as_bytes());
    hasher.update(WEBSOCKET_GUID.as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// A parsed upgrade request. Header names are stored lowercase.
#[derive(Debug, Clone)]
pub struct HandshakeRequest {
    pub path: String,
    headers: HashMap<String, String>,
}

impl HandshakeRequest {
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let mut lines = raw.split("\r\n");
        let request_line = lines
            .next()
            .ok_or_else(|| ProtocolError::MalformedHandshake("empty request".to_string()))?;

        let mut parts = request_line.split_whitespace();
        let (Some("GET"), Some(path)) = (parts.next(), parts.next()) else {
            return Err(ProtocolError::MalformedHandshake(format!(
                "unexpected request line '{request_line}'"
            )));
        };

        let mut headers = HashMap::new();
        for line in lines.take_while(|line| !line.is_empty()) {
            let (name, value) = line.split_once(':').ok_or_else(|| {
                ProtocolError::MalformedHandshake(format!("bad header line '{line}'"))
            })?;
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }

        Ok(Self {
            path: path.to_string(),
            headers,
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn key(&self) -> Result<&str, ProtocolError> {
        self.header("Sec-WebSocket-Key")
            .filter(|key| !key.is_empty())
            .ok_or(ProtocolError::MissingKey)
    }

    /// Whether `Sec-WebSocket-Protocol` lists `protocol`.
    pub fn offers_protocol(&self, protocol: &str) -> bool {
        self.header("Sec-WebSocket-Protocol")
            .map(|list| list.split(',').any(|p| p.trim() == protocol))
            .unwrap_or(false)
    }
}

/// The `101 Switching Protocols` reply, with the selected subprotocol if any.
pub fn switching_protocols_response(key: &str, protocol: Option<&str>) -> String {
    let mut response = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {}\r\n",
        accept_key(key)
    );
    if let Some(protocol) = protocol {
        response.push_str(&format!("Sec-WebSocket-Protocol: {protocol}\r\n"));
    }
    response.push_str("\r\n");
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUEST: &str = "GET /chat HTTP/1.1\r\n\
        Host: server.example.com\r\n\
        Upgrade: websocket\r\n\
        Connection: Upgrade\r\n\
        sec-websocket-key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
        Sec-WebSocket-Protocol: chat, go.chacha20poly1305\r\n\
        Sec-WebSocket-Version: 13\r\n\r\n";

    #[test]
    fn test_accept_key_matches_rfc_example() {
        assert_eq!(
            accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
        assert_eq!(accept_key("abc"), accept_key("abc"));
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let request = HandshakeRequest::parse(REQUEST).unwrap();
        assert_eq!(request.path, "/chat");
        assert_eq!(request.key().unwrap(), "dGhlIHNhbXBsZSBub25jZQ==");
        assert_eq!(request.header("UPGRADE"), Some("websocket"));
        assert!(request.offers_protocol(CIPHER_PROTOCOL));
        assert!(!request.offers_protocol("go"));
    }

    #[test]
    fn test_missing_key_is_rejected() {
        let request = HandshakeRequest::parse("GET / HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
        assert!(matches!(request.key(), Err(ProtocolError::MissingKey)));
        assert!(HandshakeRequest::parse("POST / HTTP/1.1\r\n\r\n").is_err());
    }

    #[test]
    fn test_request_end_and_detection() {
        assert!(is_handshake(REQUEST.as_bytes()));
        assert!(!is_handshake(b"\x81\x85"));
        assert_eq!(request_end(REQUEST.as_bytes()), Some(REQUEST.len()));
        assert_eq!(request_end(b"GET / HTTP/1.1\r\n"), None);
    }

    #[test]
    fn test_response_echoes_protocol() {
        let response = switching_protocols_response("dGhlIHNhbXBsZSBub25jZQ==", Some(CIPHER_PROTOCOL));
        assert!(response.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(response.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
        assert!(response.contains("Sec-WebSocket-Protocol: go.chacha20poly1305\r\n"));
        assert!(response.ends_with("\r\n\r\n"));
    }
}
