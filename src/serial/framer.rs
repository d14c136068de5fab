//! Frame codec.
//!
//! [`FrameDecoder`] is incremental: it keeps a partial frame between
//! calls and only yields a [`SerialMessage`] once every declared payload
//! byte has arrived.

use alloc::vec::Vec;

use super::{SerialLink, SerialMessage, FRAME_START, HEADER_LEN};
use crate::config::MAX_FRAME_DATA;
use crate::error::ProtocolError;

/// Big-endian bytes of `number`.
pub fn split_int_to_bytes(number: i32) -> [u8; 4] {
    number.to_be_bytes()
}

/// Inverse of [`split_int_to_bytes`].
pub fn join_bytes_to_int(bytes: [u8; 4]) -> i32 {
    i32::from_be_bytes(bytes)
}

/// Serialise one frame.
pub fn encode(kind: u8, id: u8, data: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    if data.len() > MAX_FRAME_DATA {
        let len = i32::try_from(data.len()).unwrap_or(i32::MAX);
        return Err(ProtocolError::LengthTooLarge(len));
    }
    // Bounded by MAX_FRAME_DATA above.
    let len = data.len() as i32;

    let mut frame = Vec::with_capacity(1 + HEADER_LEN + data.len());
    frame.push(FRAME_START);
    frame.push(kind);
    frame.push(id);
    frame.extend_from_slice(&split_int_to_bytes(len));
    frame.extend_from_slice(data);
    Ok(frame)
}

/// Result of one [`FrameDecoder::decode_next`] call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decoded {
    Message(SerialMessage),
    /// Input ran dry before a frame completed.
    Incomplete,
    /// Incidental byte read outside any frame.
    NotAFrame(u8),
    /// Bad header; the frame was dropped.
    Error(ProtocolError),
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Idle,
    Header {
        buf: [u8; HEADER_LEN],
        filled: usize,
    },
    Data {
        kind: u8,
        id: u8,
        expected: usize,
        data: Vec<u8>,
    },
    /// Discarding until the next start byte.
    Resync,
}

#[derive(Debug, Default)]
pub struct FrameDecoder {
    state: State,
}

impl FrameDecoder {
    pub const fn new() -> Self {
        Self { state: State::Idle }
    }

    /// Between frames.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::Idle)
    }

    /// Drop any partial frame.
    pub fn reset(&mut self) {
        self.state = State::Idle;
    }

    /// Read from `link` until a frame completes, an incidental byte is
    /// seen, a header is rejected, or no byte is available.
    pub fn decode_next<L: SerialLink>(&mut self, link: &mut L) -> Decoded {
        while let Some(byte) = link.read_byte() {
            if let Some(decoded) = self.push(byte) {
                return decoded;
            }
        }
        Decoded::Incomplete
    }

    /// Feed one byte.
    pub fn push(&mut self, byte: u8) -> Option<Decoded> {
        match &mut self.state {
            State::Idle => {
                if byte == FRAME_START {
                    self.start_header();
                    None
                } else {
                    Some(Decoded::NotAFrame(byte))
                }
            }
            State::Resync => {
                if byte == FRAME_START {
                    self.start_header();
                }
                None
            }
            State::Header { buf, filled } => {
                buf[*filled] = byte;
                *filled += 1;
                if *filled < HEADER_LEN {
                    return None;
                }
                let (kind, id) = (buf[0], buf[1]);
                let len = join_bytes_to_int([buf[2], buf[3], buf[4], buf[5]]);
                self.begin_payload(kind, id, len)
            }
            State::Data {
                kind,
                id,
                expected,
                data,
            } => {
                data.push(byte);
                if data.len() < *expected {
                    return None;
                }
                let message = SerialMessage {
                    id: *id,
                    kind: *kind,
                    data: core::mem::take(data),
                };
                self.state = State::Idle;
                Some(Decoded::Message(message))
            }
        }
    }

    fn start_header(&mut self) {
        self.state = State::Header {
            buf: [0; HEADER_LEN],
            filled: 0,
        };
    }

    fn begin_payload(&mut self, kind: u8, id: u8, len: i32) -> Option<Decoded> {
        let error = if len < 0 {
            ProtocolError::NegativeLength(len)
        } else if len as usize > MAX_FRAME_DATA {
            ProtocolError::LengthTooLarge(len)
        } else if len == 0 {
            self.state = State::Idle;
            return Some(Decoded::Message(SerialMessage {
                id,
                kind,
                data: Vec::new(),
            }));
        } else {
            let expected = len as usize;
            self.state = State::Data {
                kind,
                id,
                expected,
                data: Vec::with_capacity(expected),
            };
            return None;
        };

        warn!("Dropping frame: {}", error);
        self.state = State::Resync;
        Some(Decoded::Error(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(decoder: &mut FrameDecoder, bytes: &[u8]) -> Vec<Decoded> {
        bytes.iter().filter_map(|b| decoder.push(*b)).collect()
    }

    #[test]
    fn split_join_round_trip() {
        for x in [0, 1, -1, 255, 256, -256, i32::MAX, i32::MIN, 0x0102_0304] {
            assert_eq!(join_bytes_to_int(split_int_to_bytes(x)), x);
        }
        assert_eq!(split_int_to_bytes(0x0102_0304), [1, 2, 3, 4]);
        assert_eq!(split_int_to_bytes(-2), [0xFF, 0xFF, 0xFF, 0xFE]);
    }

    #[test]
    fn encode_layout() {
        let frame = encode(3, 9, b"ab").unwrap();
        assert_eq!(frame, [0xFF, 3, 9, 0, 0, 0, 2, b'a', b'b']);
        assert_eq!(encode(6, 1, &[]).unwrap(), [0xFF, 6, 1, 0, 0, 0, 0]);
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        let data = alloc::vec![0u8; MAX_FRAME_DATA + 1];
        assert!(matches!(
            encode(7, 1, &data),
            Err(ProtocolError::LengthTooLarge(_))
        ));
    }

    #[test]
    fn decode_round_trip() {
        let payload: Vec<u8> = (0..=255).collect();
        let mut decoder = FrameDecoder::new();
        let out = feed(&mut decoder, &encode(7, 42, &payload).unwrap());
        assert_eq!(
            out,
            [Decoded::Message(SerialMessage {
                id: 42,
                kind: 7,
                data: payload
            })]
        );
        assert!(decoder.is_idle());
    }

    #[test]
    fn payload_may_contain_start_bytes() {
        let mut decoder = FrameDecoder::new();
        let out = feed(&mut decoder, &encode(3, 1, &[0xFF, 0xFF]).unwrap());
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn incidental_bytes_are_reported() {
        let mut decoder = FrameDecoder::new();
        let mut bytes = b"hi".to_vec();
        bytes.extend(encode(0, 5, &[]).unwrap());
        let out = feed(&mut decoder, &bytes);
        assert_eq!(out[0], Decoded::NotAFrame(b'h'));
        assert_eq!(out[1], Decoded::NotAFrame(b'i'));
        assert!(matches!(out[2], Decoded::Message(ref m) if m.id == 5 && m.data.is_empty()));
    }

    #[test]
    fn partial_frame_waits_for_rest() {
        let frame = encode(3, 2, b"xyz").unwrap();
        let mut decoder = FrameDecoder::new();
        assert!(feed(&mut decoder, &frame[..5]).is_empty());
        assert!(!decoder.is_idle());
        assert_eq!(feed(&mut decoder, &frame[5..]).len(), 1);
    }

    #[test]
    fn bad_lengths_resync_on_next_start() {
        let mut decoder = FrameDecoder::new();
        let out = feed(&mut decoder, &[0xFF, 2, 1, 0xFF, 0xFF, 0xFF, 0xFB]);
        assert_eq!(out, [Decoded::Error(ProtocolError::NegativeLength(-5))]);

        // Trailing garbage is swallowed, not passed through.
        assert!(feed(&mut decoder, b"junk").is_empty());
        let out = feed(&mut decoder, &encode(2, 3, &[]).unwrap());
        assert!(matches!(out[..], [Decoded::Message(_)]));

        let out = feed(&mut decoder, &[0xFF, 2, 1, 0x7F, 0, 0, 0]);
        assert_eq!(
            out,
            [Decoded::Error(ProtocolError::LengthTooLarge(0x7F00_0000))]
        );
    }
}
