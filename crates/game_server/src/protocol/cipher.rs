//! Optional payload encryption negotiated during the handshake.
//!
//! When both sides know the same pre-shared secret, the payload of every text
//! frame is `base64(ChaCha20-Poly1305(plaintext))`. The key is
//! `SHA-256(secret || Sec-WebSocket-Key)`, so it differs per connection. Each
//! direction keeps its own message counter and the 12-byte nonce is
//! `direction byte, three zero bytes, counter as u64 big-endian`.

use crate::error::ProtocolError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use sha2::{Digest, Sha256};
use std::fmt;

const SERVER_DIRECTION: u8 = b'S';
const CLIENT_DIRECTION: u8 = b'C';

/// Which end of the connection a cipher pair belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

/// One direction of payload protection.
#[derive(Clone)]
pub enum PayloadCipher {
    Passthrough,
    ChaCha20Poly1305 {
        aead: ChaCha20Poly1305,
        direction: u8,
        counter: u64,
    },
}

impl fmt::Debug for PayloadCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadCipher::Passthrough => f.write_str("Passthrough"),
            PayloadCipher::ChaCha20Poly1305 {
                direction, counter, ..
            } => f
                .debug_struct("ChaCha20Poly1305")
                .field("direction", &(*direction as char))
                .field("counter", counter)
                .finish(),
        }
    }
}

/// Per-connection key derived from the shared secret and the handshake key.
pub fn derive_key(secret: &str, handshake_key: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(handshake_key.trim().as_bytes());
    hasher.finalize().into()
}

impl PayloadCipher {
    /// `(outbound, inbound)` ciphers for one end of a connection.
    pub fn pair(role: Role, key: &[u8; 32]) -> (PayloadCipher, PayloadCipher) {
        let aead = ChaCha20Poly1305::new(Key::from_slice(key));
        let (sending, receiving) = match role {
            Role::Server => (SERVER_DIRECTION, CLIENT_DIRECTION),
            Role::Client => (CLIENT_DIRECTION, SERVER_DIRECTION),
        };
        (
            PayloadCipher::ChaCha20Poly1305 {
                aead: aead.clone(),
                direction: sending,
                counter: 0,
            },
            PayloadCipher::ChaCha20Poly1305 {
                aead,
                direction: receiving,
                counter: 0,
            },
        )
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, PayloadCipher::ChaCha20Poly1305 { .. })
    }

    /// Protects an outgoing text payload.
    pub fn seal(&mut self, plaintext: &str) -> Result<String, ProtocolError> {
        match self {
            PayloadCipher::Passthrough => Ok(plaintext.to_string()),
            PayloadCipher::ChaCha20Poly1305 {
                aead,
                direction,
                counter,
            } => {
                let nonce = nonce_for(*direction, *counter);
                let sealed = aead
                    .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
                    .map_err(|_| ProtocolError::Cipher("encryption failed".to_string()))?;
                *counter += 1;
                Ok(STANDARD.encode(sealed))
            }
        }
    }

    /// Recovers an incoming text payload.
    pub fn open(&mut self, payload: &str) -> Result<String, ProtocolError> {
        match self {
            PayloadCipher::Passthrough => Ok(payload.to_string()),
            PayloadCipher::ChaCha20Poly1305 {
                aead,
                direction,
                counter,
            } => {
                let sealed = STANDARD
                    .decode(payload.trim())
                    .map_err(|e| ProtocolError::Cipher(format!("bad base64: {e}")))?;
                let nonce = nonce_for(*direction, *counter);
                let plain = aead
                    .decrypt(Nonce::from_slice(&nonce), sealed.as_slice())
                    .map_err(|_| ProtocolError::Cipher("authentication failed".to_string()))?;
                *counter += 1;
                String::from_utf8(plain).map_err(|_| ProtocolError::InvalidUtf8)
            }
        }
    }
}

fn nonce_for(direction: u8, counter: u64) -> [u8; 12] {
    let mut nonce = [0u8; 12];
    nonce[0] = direction;
    nonce[4..].copy_from_slice(&counter.to_be_bytes());
    nonce
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_is_identity() {
        let mut cipher = PayloadCipher::Passthrough;
        assert_eq!(cipher.seal("Place_custom/1/2,2").unwrap(), "Place_custom/1/2,2");
        assert_eq!(cipher.open("1/Joined").unwrap(), "1/Joined");
        assert!(!cipher.is_encrypted());
    }

    #[test]
    fn test_client_and_server_interoperate() {
        let key = derive_key("secret", "dGhlIHNhbXBsZSBub25jZQ==");
        let (mut server_out, mut server_in) = PayloadCipher::pair(Role::Server, &key);
        let (mut client_out, mut client_in) = PayloadCipher::pair(Role::Client, &key);

        for text in ["Create_custom/0/tok,9,area", "Skip_custom/1/"] {
            let wire = client_out.seal(text).unwrap();
            assert_ne!(wire, text);
            assert_eq!(server_in.open(&wire).unwrap(), text);
        }
        let wire = server_out.seal("1/Created:custom").unwrap();
        assert_eq!(client_in.open(&wire).unwrap(), "1/Created:custom");
    }

    #[test]
    fn test_replay_and_wrong_direction_fail() {
        let key = derive_key("secret", "k");
        let (mut server_out, mut server_in) = PayloadCipher::pair(Role::Server, &key);
        let (_, mut client_in) = PayloadCipher::pair(Role::Client, &key);

        let wire = server_out.seal("hello").unwrap();
        assert!(server_in.open(&wire).is_err());
        assert_eq!(client_in.open(&wire).unwrap(), "hello");
        assert!(matches!(client_in.open(&wire), Err(ProtocolError::Cipher(_))));
    }

    #[test]
    fn test_keys_differ_per_handshake() {
        assert_ne!(derive_key("secret", "a"), derive_key("secret", "b"));
        assert_ne!(derive_key("one", "a"), derive_key("two", "a"));
    }
}
