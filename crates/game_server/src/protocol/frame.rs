//! RFC 6455 frame codec and message reassembly.

use crate::error::ProtocolError;

/// Close status sent when the server shuts a connection normally.
pub const CLOSE_NORMAL: u16 = 1000;
/// Close status for protocol violations.
pub const CLOSE_PROTOCOL_ERROR: u16 = 1002;
/// Close status for frames over the size limit.
pub const CLOSE_TOO_BIG: u16 = 1009;

const MAX_CONTROL_PAYLOAD: usize = 125;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl OpCode {
    fn from_bits(bits: u8) -> Result<Self, ProtocolError> {
        match bits {
            0x0 => Ok(OpCode::Continuation),
            0x1 => Ok(OpCode::Text),
            0x2 => Ok(OpCode::Binary),
            0x8 => Ok(OpCode::Close),
            0x9 => Ok(OpCode::Ping),
            0xA => Ok(OpCode::Pong),
            other => Err(ProtocolError::MalformedFrame(format!(
                "unknown opcode {other:#x}"
            ))),
        }
    }

    fn bits(self) -> u8 {
        match self {
            OpCode::Continuation => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
        }
    }

    pub fn is_control(self) -> bool {
        matches!(self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }
}

/// A single frame with its payload already unmasked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub fin: bool,
    pub opcode: OpCode,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(opcode: OpCode, payload: Vec<u8>) -> Self {
        Self {
            fin: true,
            opcode,
            payload,
        }
    }

    pub fn text(text: &str) -> Self {
        Self::new(OpCode::Text, text.as_bytes().to_vec())
    }

    pub fn pong(payload: Vec<u8>) -> Self {
        Self::new(OpCode::Pong, payload)
    }

    /// Close frame, with the status code as its first two bytes when given.
    pub fn close(code: Option<u16>) -> Self {
        let payload = code.map(|c| c.to_be_bytes().to_vec()).unwrap_or_default();
        Self::new(OpCode::Close, payload)
    }

    pub fn close_code(&self) -> Option<u16> {
        match (self.opcode, self.payload.as_slice()) {
            (OpCode::Close, [high, low, ..]) => Some(u16::from_be_bytes([*high, *low])),
            _ => None,
        }
    }

    /// Encodes the frame as the server sends it: unmasked.
    pub fn encode(&self) -> Vec<u8> {
        self.encode_with_mask(None)
    }

    /// Encodes the frame as a client must send it.
    pub fn encode_masked(&self, mask: [u8; 4]) -> Vec<u8> {
        self.encode_with_mask(Some(mask))
    }

    fn encode_with_mask(&self, mask: Option<[u8; 4]>) -> Vec<u8> {
        let len = self.payload.len();
        let mut out = Vec::with_capacity(len + 14);
        let fin_bit = if self.fin { 0x80 } else { 0 };
        out.push(fin_bit | self.opcode.bits());

        let mask_bit = if mask.is_some() { 0x80 } else { 0 };
        if len < 126 {
            out.push(mask_bit | len as u8);
        } else if len <= u16::MAX as usize {
            out.push(mask_bit | 126);
            out.extend_from_slice(&(len as u16).to_be_bytes());
        } else {
            out.push(mask_bit | 127);
            out.extend_from_slice(&(len as u64).to_be_bytes());
        }

        match mask {
            Some(key) => {
                out.extend_from_slice(&key);
                out.extend(
                    self.payload
                        .iter()
                        .enumerate()
                        .map(|(i, byte)| byte ^ key[i % 4]),
                );
            }
            None => out.extend_from_slice(&self.payload),
        }
        out
    }

    /// Decodes one frame from the front of `buffer`.
    ///
    /// # Arguments
    ///
    /// * `buffer` - Bytes received so far
    /// * `max_payload` - Largest payload accepted
    /// * `require_mask` - Whether unmasked frames are a violation (true for client frames)
    ///
    /// # Returns
    ///
    /// `Ok(None)` when more bytes are needed, otherwise the frame and the
    /// number of bytes it used.
    pub fn decode(
        buffer: &[u8],
        max_payload: usize,
        require_mask: bool,
    ) -> Result<Option<(Frame, usize)>, ProtocolError> {
        let [first, second, ..] = buffer else {
            return Ok(None);
        };

        if first & 0x70 != 0 {
            return Err(ProtocolError::MalformedFrame(
                "reserved bits set".to_string(),
            ));
        }
        let fin = first & 0x80 != 0;
        let opcode = OpCode::from_bits(first & 0x0F)?;
        let masked = second & 0x80 != 0;
        if require_mask && !masked {
            return Err(ProtocolError::UnmaskedFrame);
        }

        let mut offset = 2;
        let declared = match second & 0x7F {
            126 => {
                let Some(bytes) = buffer.get(2..4) else {
                    return Ok(None);
                };
                offset = 4;
                u64::from(u16::from_be_bytes([bytes[0], bytes[1]]))
            }
            127 => {
                let Some(bytes) = buffer.get(2..10) else {
                    return Ok(None);
                };
                offset = 10;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(bytes);
                u64::from_be_bytes(raw)
            }
            short => u64::from(short),
        };

        if opcode.is_control() && (!fin || declared > MAX_CONTROL_PAYLOAD as u64) {
            return Err(ProtocolError::MalformedFrame(
                "control frame is fragmented or too long".to_string(),
            ));
        }
        if declared > max_payload as u64 {
            return Err(ProtocolError::FrameTooLarge {
                size: declared,
                max: max_payload,
            });
        }
        let len = declared as usize;

        let mask = if masked {
            let Some(bytes) = buffer.get(offset..offset + 4) else {
                return Ok(None);
            };
            offset += 4;
            Some([bytes[0], bytes[1], bytes[2], bytes[3]])
        } else {
            None
        };

        let Some(body) = buffer.get(offset..offset + len) else {
            return Ok(None);
        };
        let payload = match mask {
            Some(key) => body
                .iter()
                .enumerate()
                .map(|(i, byte)| byte ^ key[i % 4])
                .collect(),
            None => body.to_vec(),
        };

        Ok(Some((
            Frame {
                fin,
                opcode,
                payload,
            },
            offset + len,
        )))
    }
}

/// A complete application-level message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close(Option<u16>),
}

/// Joins fragmented data frames into whole messages.
///
/// Control frames may arrive between fragments and are returned immediately.
#[derive(Debug)]
pub struct MessageAssembler {
    max_message: usize,
    kind: Option<OpCode>,
    buffer: Vec<u8>,
}

impl MessageAssembler {
    pub fn new(max_message: usize) -> Self {
        Self {
            max_message,
            kind: None,
            buffer: Vec::new(),
        }
    }

    pub fn push(&mut self, frame: Frame) -> Result<Option<Message>, ProtocolError> {
        match frame.opcode {
            OpCode::Ping => return Ok(Some(Message::Ping(frame.payload))),
            OpCode::Pong => return Ok(Some(Message::Pong(frame.payload))),
            OpCode::Close => return Ok(Some(Message::Close(frame.close_code()))),
            OpCode::Continuation => {
                if self.kind.is_none() {
                    return Err(ProtocolError::MalformedFrame(
                        "continuation without a started message".to_string(),
                    ));
                }
            }
            OpCode::Text | OpCode::Binary => {
                if self.kind.is_some() {
                    return Err(ProtocolError::MalformedFrame(
                        "new message before the previous one finished".to_string(),
                    ));
                }
                self.kind = Some(frame.opcode);
            }
        }

        if self.buffer.len() + frame.payload.len() > self.max_message {
            return Err(ProtocolError::FrameTooLarge {
                size: (self.buffer.len() + frame.payload.len()) as u64,
                max: self.max_message,
            });
        }
        self.buffer.extend_from_slice(&frame.payload);

        if !frame.fin {
            return Ok(None);
        }

        let payload = std::mem::take(&mut self.buffer);
        match self.kind.take() {
            Some(OpCode::Text) => String::from_utf8(payload)
                .map(|text| Some(Message::Text(text)))
                .map_err(|_| ProtocolError::InvalidUtf8),
            _ => Ok(Some(Message::Binary(payload))),
        }
    }
}
