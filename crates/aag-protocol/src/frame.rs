//! Wire framing: splitting a response buffer into 15-byte blocks and
//! recognizing the terminating Handshake sequence.

use thiserror::Error;

/// `!` + 0x11 + 12 spaces + `0`. Terminates every device response.
pub const HANDSHAKE: [u8; 15] = [
    b'!', 0x11, b' ', b' ', b' ', b' ', b' ', b' ', b' ', b' ', b' ', b' ', b' ', b' ', b'0',
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("response buffer length {len} is not a multiple of 15")]
    BadAlignment { len: usize },
    #[error("response buffer does not end with the handshake block")]
    MissingHandshake,
    #[error("response block does not begin with '!'")]
    TruncatedBlock,
}

/// A single 14-byte information block: a 2-byte response code and a
/// 12-byte payload, trailing spaces trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseBlock {
    pub code: String,
    pub payload: String,
}

impl ResponseBlock {
    pub fn new(code: impl Into<String>, payload: impl Into<String>) -> Self {
        Self { code: code.into(), payload: payload.into() }
    }
}

/// Split a raw response buffer into information blocks, verifying the
/// final block is the Handshake and every block starts with `!`.
pub fn decode_blocks(buf: &[u8]) -> Result<Vec<ResponseBlock>, FrameError> {
    if buf.is_empty() || buf.len() % 15 != 0 {
        return Err(FrameError::BadAlignment { len: buf.len() });
    }

    let chunks: Vec<&[u8]> = buf.chunks(15).collect();
    let (last, rest) = chunks.split_last().expect("non-empty, checked above");

    if *last != HANDSHAKE {
        return Err(FrameError::MissingHandshake);
    }

    let mut blocks = Vec::with_capacity(rest.len());
    for chunk in rest {
        if chunk[0] != b'!' {
            return Err(FrameError::TruncatedBlock);
        }
        let code = String::from_utf8_lossy(&chunk[1..3]).into_owned();
        let payload = String::from_utf8_lossy(&chunk[3..15]).trim_end().to_string();
        blocks.push(ResponseBlock::new(code, payload));
    }

    Ok(blocks)
}

/// Re-encode information blocks followed by the Handshake. Round-trips
/// with `decode_blocks` for well-formed input: payloads are re-padded
/// with trailing spaces to 12 bytes, which is exactly what decoding
/// trimmed.
pub fn encode_response(blocks: &[ResponseBlock]) -> Vec<u8> {
    let mut out = Vec::with_capacity(blocks.len() * 15 + 15);
    for block in blocks {
        out.push(b'!');
        out.extend_from_slice(block.code.as_bytes());
        let mut payload = block.payload.clone().into_bytes();
        payload.resize(12, b' ');
        out.extend_from_slice(&payload);
    }
    out.extend_from_slice(&HANDSHAKE);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(code: &str, payload: &str) -> Vec<u8> {
        let mut v = vec![b'!'];
        v.extend_from_slice(code.as_bytes());
        let mut p = payload.as_bytes().to_vec();
        p.resize(12, b' ');
        v.extend_from_slice(&p);
        v
    }

    #[test]
    fn decodes_single_block_response() {
        let mut buf = block("1 ", "-2000");
        buf.extend_from_slice(&HANDSHAKE);
        let blocks = decode_blocks(&buf).unwrap();
        assert_eq!(blocks, vec![ResponseBlock::new("1 ", "-2000")]);
    }

    #[test]
    fn rejects_length_not_multiple_of_15() {
        let buf = vec![0u8; 20];
        assert_eq!(decode_blocks(&buf), Err(FrameError::BadAlignment { len: 20 }));
    }

    #[test]
    fn rejects_missing_handshake() {
        let mut buf = block("1 ", "100");
        buf.extend_from_slice(&block("2 ", "200"));
        assert_eq!(decode_blocks(&buf), Err(FrameError::MissingHandshake));
    }

    #[test]
    fn rejects_block_not_starting_with_bang() {
        let mut buf = block("1 ", "100");
        buf[0] = b'?';
        buf.extend_from_slice(&HANDSHAKE);
        assert_eq!(decode_blocks(&buf), Err(FrameError::TruncatedBlock));
    }

    #[test]
    fn empty_buffer_is_bad_alignment() {
        assert_eq!(decode_blocks(&[]), Err(FrameError::BadAlignment { len: 0 }));
    }

    #[test]
    fn decode_then_encode_round_trips() {
        let mut buf = block("6 ", "1234");
        buf.extend_from_slice(&block("3 ", "5678"));
        buf.extend_from_slice(&HANDSHAKE);

        let blocks = decode_blocks(&buf).unwrap();
        let re_encoded = encode_response(&blocks);
        assert_eq!(re_encoded, buf);
    }

    #[test]
    fn preserves_sign_and_decimal_separator() {
        let mut buf = block("1 ", "-12.34");
        buf.extend_from_slice(&HANDSHAKE);
        let blocks = decode_blocks(&buf).unwrap();
        assert_eq!(blocks[0].payload, "-12.34");
    }
}
