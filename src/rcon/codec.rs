use crate::error::{BoardError, BoardResult};
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

// Packet types. The server answers a login with type 2, which shares its
// value with the command type.
pub const LOGIN: i32 = 3;
pub const COMMAND: i32 = 2;
pub const AUTH_RESPONSE: i32 = 2;
pub const RESPONSE: i32 = 0;

// Request id the server uses to reject a login.
pub const AUTH_FAILED_ID: i32 = -1;

// id + type + two NUL terminators
const BODY_OVERHEAD: usize = 10;
// Largest command the game server accepts.
const MAX_COMMAND_LEN: usize = 1446;
// Reply fragments are at most 4096 bytes, anything far above is garbage.
const MAX_BODY_LEN: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: i32,
    pub kind: i32,
    pub payload: String,
}

impl Packet {
    pub fn new(id: i32, kind: i32, payload: &str) -> Self {
        Packet {
            id,
            kind,
            payload: payload.to_string(),
        }
    }
}

/// Frames: `len:i32le | id:i32le | type:i32le | payload | 0 0`, where `len`
/// counts every byte after itself.
#[derive(Debug, Default)]
pub struct RconCodec;

impl Decoder for RconCodec {
    type Item = Packet;
    type Error = BoardError;

    fn decode(&mut self, src: &mut BytesMut) -> BoardResult<Option<Packet>> {
        if src.len() < 4 {
            return Ok(None);
        }

        let mut prefix = &src[..4];
        let declared = prefix.get_i32_le();
        let body_len = match usize::try_from(declared) {
            Ok(len) if (BODY_OVERHEAD..=MAX_BODY_LEN).contains(&len) => len,
            _ => {
                return Err(BoardError::Protocol(format!(
                    "invalid frame length {declared}"
                )))
            }
        };

        if src.len() < 4 + body_len {
            src.reserve(4 + body_len - src.len());
            return Ok(None);
        }

        src.advance(4);
        let mut body = src.split_to(body_len);
        let id = body.get_i32_le();
        let kind = body.get_i32_le();
        let payload = String::from_utf8_lossy(&body[..body_len - BODY_OVERHEAD]).into_owned();

        Ok(Some(Packet { id, kind, payload }))
    }
}

impl Encoder<Packet> for RconCodec {
    type Error = BoardError;

    fn encode(&mut self, packet: Packet, dst: &mut BytesMut) -> BoardResult<()> {
        let payload = packet.payload.as_bytes();
        if payload.len() > MAX_COMMAND_LEN {
            return Err(BoardError::Protocol(format!(
                "command of {} bytes exceeds {MAX_COMMAND_LEN}",
                payload.len()
            )));
        }

        dst.reserve(4 + BODY_OVERHEAD + payload.len());
        dst.put_i32_le((BODY_OVERHEAD + payload.len()) as i32);
        dst.put_i32_le(packet.id);
        dst.put_i32_le(packet.kind);
        dst.put_slice(payload);
        dst.put_u8(0);
        dst.put_u8(0);
        Ok(())
    }
}
