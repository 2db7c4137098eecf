//! Wire protocol: HTTP upgrade, frame codec and the optional payload cipher.
//!
//! Everything here is synchronous and operates on byte buffers; the
//! connection layer owns the sockets.

pub mod cipher;
pub mod frame;
pub mod handshake;

pub use cipher::{derive_key, PayloadCipher, Role};
pub use frame::{Frame, Message, MessageAssembler, OpCode};
pub use handshake::{HandshakeRequest, CIPHER_PROTOCOL};

use crate::error::ProtocolError;

/// Outcome of accepting an upgrade request.
#[derive(Debug)]
pub struct Upgrade {
    /// Raw `101 Switching Protocols` response to write back
    pub response: String,
    pub outbound: PayloadCipher,
    pub inbound: PayloadCipher,
}

/// Accepts an upgrade request and negotiates payload protection.
///
/// The cipher is selected only when the client offers [`CIPHER_PROTOCOL`] and
/// the server has a shared secret; otherwise payloads pass through.
///
/// # Arguments
///
/// * `request` - The parsed handshake
/// * `shared_secret` - Secret configured on the server, if any
pub fn upgrade(
    request: &HandshakeRequest,
    shared_secret: Option<&str>,
) -> Result<Upgrade, ProtocolError> {
    let key = request.key()?;

    match shared_secret {
        Some(secret) if request.offers_protocol(CIPHER_PROTOCOL) => {
            let (outbound, inbound) = PayloadCipher::pair(Role::Server, &derive_key(secret, key));
            Ok(Upgrade {
                response: handshake::switching_protocols_response(key, Some(CIPHER_PROTOCOL)),
                outbound,
                inbound,
            })
        }
        _ => Ok(Upgrade {
            response: handshake::switching_protocols_response(key, None),
            outbound: PayloadCipher::Passthrough,
            inbound: PayloadCipher::Passthrough,
        }),
    }
}
