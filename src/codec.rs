// SMPP v3.4 codec - separates wire format concerns from the PDU domain models.
//
// Every PDU implements Encodable/Decodable against the 16-byte header plus
// a command-specific body. The header keeps its fields as raw integers so
// that a PDU with an unknown command_id can still be captured as Frame::Raw
// and answered with a generic_nack instead of killing the decode.

use crate::datatypes::{CommandId, CommandStatus};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::collections::HashMap;
use std::io::Cursor;
use thiserror::Error;

/// Upper bound on command_length to prevent memory exhaustion on a
/// garbled or hostile stream.
pub const MAX_PDU_SIZE: u32 = 65536; // 64KB

/// SMPP v3.4 PDU header (16 bytes, common to all PDUs).
///
/// Fields are stored raw: `command_id` and `command_status` values outside
/// the known enums must survive decoding so the session can nack them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PduHeader {
    pub command_length: u32,
    pub command_id: u32,
    pub command_status: u32,
    pub sequence_number: u32,
}

impl PduHeader {
    pub const SIZE: usize = 16;

    /// Decode a PDU header, validating only the length bounds.
    pub fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        if buf.remaining() < Self::SIZE {
            return Err(CodecError::TruncatedHeader);
        }

        let command_length = buf.get_u32();
        let command_id = buf.get_u32();
        let command_status = buf.get_u32();
        let sequence_number = buf.get_u32();

        if command_length < Self::SIZE as u32 || command_length > MAX_PDU_SIZE {
            return Err(CodecError::InvalidPduLength {
                length: command_length,
                min: Self::SIZE as u32,
                max: MAX_PDU_SIZE,
            });
        }

        Ok(PduHeader {
            command_length,
            command_id,
            command_status,
            sequence_number,
        })
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.command_length);
        buf.put_u32(self.command_id);
        buf.put_u32(self.command_status);
        buf.put_u32(self.sequence_number);
    }

    /// The typed command id, if this header carries a known one.
    pub fn known_command(&self) -> Option<CommandId> {
        CommandId::try_from(self.command_id).ok()
    }

    /// The typed command status; values the enum does not know collapse
    /// to `CommandStatus::Unknown` but the raw value stays in the header.
    pub fn status(&self) -> CommandStatus {
        CommandStatus::try_from(self.command_status).unwrap_or(CommandStatus::Unknown)
    }
}

/// Trait for PDUs that can be encoded to wire bytes.
pub trait Encodable {
    /// Encode this PDU (header and body) into the buffer.
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError>;

    /// Encode to a frozen byte string with command_length fixed up to the
    /// actual encoded size.
    fn to_bytes(&self) -> Result<Bytes, CodecError> {
        let mut buf = BytesMut::new();
        self.encode(&mut buf)?;

        debug_assert!(buf.len() >= PduHeader::SIZE);
        let length = buf.len() as u32;
        buf[0..4].copy_from_slice(&length.to_be_bytes());

        Ok(buf.freeze())
    }
}

/// Trait for PDUs that can be decoded from a header plus body bytes.
pub trait Decodable: Sized {
    /// Decode the PDU body. The cursor is positioned just past the header.
    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError>;

    /// The command_id this PDU type answers to.
    fn command_id() -> CommandId;

    fn validate_header(header: &PduHeader) -> Result<(), CodecError> {
        if header.known_command() != Some(Self::command_id()) {
            return Err(CodecError::UnexpectedCommandId {
                expected: Self::command_id(),
                actual: header.command_id,
            });
        }
        Ok(())
    }
}

/// Codec errors with enough context to log and classify.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("truncated PDU header: fewer than 16 octets available")]
    TruncatedHeader,

    #[error("truncated PDU body: expected {expected} octets, got {actual}")]
    TruncatedBody { expected: usize, actual: usize },

    #[error("invalid command_length {length}: must be within {min}..={max}")]
    InvalidPduLength { length: u32, min: u32, max: u32 },

    #[error("unexpected command_id: expected {expected:?}, got {actual:#010x}")]
    UnexpectedCommandId { expected: CommandId, actual: u32 },

    #[error("malformed PDU in field '{field}': {reason}")]
    MalformedPdu { field: &'static str, reason: String },

    #[error("field '{field}' exceeds maximum length {max}: {actual}")]
    FieldTooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Decode a C-octet string: ASCII octets up to the first NUL, at most
/// `max_len` octets including the terminator. A missing terminator within
/// the declared body is a malformed PDU.
pub fn decode_cstring(
    buf: &mut Cursor<&[u8]>,
    max_len: usize,
    field: &'static str,
) -> Result<String, CodecError> {
    let start = buf.position() as usize;
    let bytes = buf.get_ref();
    let limit = bytes.len().min(start + max_len);

    let nul = bytes[start..limit]
        .iter()
        .position(|&b| b == 0)
        .ok_or(CodecError::MalformedPdu {
            field,
            reason: "C-octet string is missing its NUL terminator".to_string(),
        })?;

    let value = String::from_utf8(bytes[start..start + nul].to_vec()).map_err(|e| {
        CodecError::MalformedPdu {
            field,
            reason: format!("not valid ASCII/UTF-8: {e}"),
        }
    })?;

    buf.set_position((start + nul + 1) as u64);
    Ok(value)
}

/// Encode a C-octet string: the bytes followed by a single NUL. An empty
/// string encodes as the lone NUL octet.
pub fn encode_cstring(
    buf: &mut BytesMut,
    value: &str,
    max_len: usize,
    field: &'static str,
) -> Result<(), CodecError> {
    if value.len() + 1 > max_len {
        return Err(CodecError::FieldTooLong {
            field,
            max: max_len - 1,
            actual: value.len(),
        });
    }
    buf.put_slice(value.as_bytes());
    buf.put_u8(0);
    Ok(())
}

pub fn decode_u8(buf: &mut Cursor<&[u8]>, field: &'static str) -> Result<u8, CodecError> {
    if buf.remaining() < 1 {
        return Err(CodecError::MalformedPdu {
            field,
            reason: "body ended before a 1-octet integer".to_string(),
        });
    }
    Ok(buf.get_u8())
}

pub fn decode_u32(buf: &mut Cursor<&[u8]>, field: &'static str) -> Result<u32, CodecError> {
    if buf.remaining() < 4 {
        return Err(CodecError::MalformedPdu {
            field,
            reason: "body ended before a 4-octet integer".to_string(),
        });
    }
    Ok(buf.get_u32())
}

/// A decoded SMPP frame: one of the operations this client speaks, or a
/// raw header+body for anything else.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    BindTransceiver(crate::datatypes::BindTransceiver),
    BindTransceiverResp(crate::datatypes::BindTransceiverResp),
    Unbind(crate::datatypes::Unbind),
    UnbindResp(crate::datatypes::UnbindResp),
    EnquireLink(crate::datatypes::EnquireLink),
    EnquireLinkResp(crate::datatypes::EnquireLinkResp),
    SubmitSm(Box<crate::datatypes::SubmitSm>),
    SubmitSmResp(crate::datatypes::SubmitSmResp),
    DeliverSm(Box<crate::datatypes::DeliverSm>),
    DeliverSmResp(crate::datatypes::DeliverSmResp),
    GenericNack(crate::datatypes::GenericNack),

    /// Unknown command_id: header parsed, body retained, so the session
    /// can answer with generic_nack and keep the stream in sync.
    Raw { header: PduHeader, body: Bytes },
}

impl Frame {
    pub fn command_id(&self) -> u32 {
        match self {
            Frame::BindTransceiver(_) => CommandId::BindTransceiver as u32,
            Frame::BindTransceiverResp(_) => CommandId::BindTransceiverResp as u32,
            Frame::Unbind(_) => CommandId::Unbind as u32,
            Frame::UnbindResp(_) => CommandId::UnbindResp as u32,
            Frame::EnquireLink(_) => CommandId::EnquireLink as u32,
            Frame::EnquireLinkResp(_) => CommandId::EnquireLinkResp as u32,
            Frame::SubmitSm(_) => CommandId::SubmitSm as u32,
            Frame::SubmitSmResp(_) => CommandId::SubmitSmResp as u32,
            Frame::DeliverSm(_) => CommandId::DeliverSm as u32,
            Frame::DeliverSmResp(_) => CommandId::DeliverSmResp as u32,
            Frame::GenericNack(_) => CommandId::GenericNack as u32,
            Frame::Raw { header, .. } => header.command_id,
        }
    }

    pub fn sequence_number(&self) -> u32 {
        match self {
            Frame::BindTransceiver(pdu) => pdu.sequence_number,
            Frame::BindTransceiverResp(pdu) => pdu.sequence_number,
            Frame::Unbind(pdu) => pdu.sequence_number,
            Frame::UnbindResp(pdu) => pdu.sequence_number,
            Frame::EnquireLink(pdu) => pdu.sequence_number,
            Frame::EnquireLinkResp(pdu) => pdu.sequence_number,
            Frame::SubmitSm(pdu) => pdu.sequence_number,
            Frame::SubmitSmResp(pdu) => pdu.sequence_number,
            Frame::DeliverSm(pdu) => pdu.sequence_number,
            Frame::DeliverSmResp(pdu) => pdu.sequence_number,
            Frame::GenericNack(pdu) => pdu.sequence_number,
            Frame::Raw { header, .. } => header.sequence_number,
        }
    }

    pub fn command_status(&self) -> u32 {
        match self {
            Frame::BindTransceiver(pdu) => pdu.command_status,
            Frame::BindTransceiverResp(pdu) => pdu.command_status,
            Frame::Unbind(pdu) => pdu.command_status,
            Frame::UnbindResp(pdu) => pdu.command_status,
            Frame::EnquireLink(pdu) => pdu.command_status,
            Frame::EnquireLinkResp(pdu) => pdu.command_status,
            Frame::SubmitSm(pdu) => pdu.command_status,
            Frame::SubmitSmResp(pdu) => pdu.command_status,
            Frame::DeliverSm(pdu) => pdu.command_status,
            Frame::DeliverSmResp(pdu) => pdu.command_status,
            Frame::GenericNack(pdu) => pdu.command_status,
            Frame::Raw { header, .. } => header.command_status,
        }
    }

    /// The smpp_command name used in log events and hook calls.
    pub fn command_name(&self) -> &'static str {
        match CommandId::try_from(self.command_id()) {
            Ok(id) => id.name(),
            Err(_) => "unknown",
        }
    }

    pub fn is_response(&self) -> bool {
        self.command_id() & 0x8000_0000 != 0
    }

    /// Check whether the buffer holds at least one complete PDU without
    /// allocating anything for it.
    pub fn check(buf: &mut Cursor<&[u8]>) -> Result<(), CodecError> {
        if buf.remaining() < 4 {
            return Err(CodecError::TruncatedHeader);
        }

        let pos = buf.position();
        let command_length = buf.get_u32();
        buf.set_position(pos);

        if command_length < PduHeader::SIZE as u32 || command_length > MAX_PDU_SIZE {
            return Err(CodecError::InvalidPduLength {
                length: command_length,
                min: PduHeader::SIZE as u32,
                max: MAX_PDU_SIZE,
            });
        }

        if buf.remaining() < command_length as usize {
            return Err(CodecError::TruncatedBody {
                expected: command_length as usize,
                actual: buf.remaining(),
            });
        }

        Ok(())
    }
}

/// Registry of PDU decoders keyed by command_id.
type DecoderFn =
    Box<dyn Fn(PduHeader, &mut Cursor<&[u8]>) -> Result<Frame, CodecError> + Send + Sync>;

pub struct PduRegistry {
    decoders: HashMap<u32, DecoderFn>,
}

impl PduRegistry {
    /// A registry with every operation of this client registered.
    pub fn new() -> Self {
        let mut registry = Self {
            decoders: HashMap::new(),
        };

        registry.register::<crate::datatypes::BindTransceiver, _>(Frame::BindTransceiver);
        registry.register::<crate::datatypes::BindTransceiverResp, _>(Frame::BindTransceiverResp);
        registry.register::<crate::datatypes::Unbind, _>(Frame::Unbind);
        registry.register::<crate::datatypes::UnbindResp, _>(Frame::UnbindResp);
        registry.register::<crate::datatypes::EnquireLink, _>(Frame::EnquireLink);
        registry.register::<crate::datatypes::EnquireLinkResp, _>(Frame::EnquireLinkResp);
        registry.register::<crate::datatypes::SubmitSm, _>(|pdu| Frame::SubmitSm(Box::new(pdu)));
        registry.register::<crate::datatypes::SubmitSmResp, _>(Frame::SubmitSmResp);
        registry.register::<crate::datatypes::DeliverSm, _>(|pdu| Frame::DeliverSm(Box::new(pdu)));
        registry.register::<crate::datatypes::DeliverSmResp, _>(Frame::DeliverSmResp);
        registry.register::<crate::datatypes::GenericNack, _>(Frame::GenericNack);

        registry
    }

    fn register<T, F>(&mut self, frame_constructor: F)
    where
        T: Decodable + 'static,
        F: Fn(T) -> Frame + Send + Sync + 'static,
    {
        let command_id = T::command_id() as u32;
        let decoder = Box::new(move |header: PduHeader, buf: &mut Cursor<&[u8]>| {
            let pdu = T::decode(header, buf)?;
            Ok(frame_constructor(pdu))
        });
        self.decoders.insert(command_id, decoder);
    }

    /// Decode one PDU given its parsed header. Unknown command ids come
    /// back as `Frame::Raw`.
    pub fn decode_pdu(
        &self,
        header: PduHeader,
        buf: &mut Cursor<&[u8]>,
    ) -> Result<Frame, CodecError> {
        match self.decoders.get(&header.command_id) {
            Some(decoder) => decoder(header, buf),
            None => {
                let body_size = header.command_length as usize - PduHeader::SIZE;
                if buf.remaining() < body_size {
                    return Err(CodecError::TruncatedBody {
                        expected: body_size,
                        actual: buf.remaining(),
                    });
                }
                let body = buf.copy_to_bytes(body_size);
                tracing::warn!(
                    command_id = format_args!("{:#010x}", header.command_id),
                    "unknown PDU command_id, retaining as raw frame"
                );
                Ok(Frame::Raw { header, body })
            }
        }
    }

    pub fn is_registered(&self, command_id: CommandId) -> bool {
        self.decoders.contains_key(&(command_id as u32))
    }
}

impl Default for PduRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::{EnquireLink, GenericNack, Unbind};

    #[test]
    fn pdu_header_encode_decode() {
        let header = PduHeader {
            command_length: 24,
            command_id: CommandId::EnquireLink as u32,
            command_status: 0,
            sequence_number: 42,
        };

        let mut buf = BytesMut::new();
        header.encode(&mut buf);

        let mut cursor = Cursor::new(buf.as_ref());
        let decoded = PduHeader::decode(&mut cursor).unwrap();

        assert_eq!(header, decoded);
    }

    #[test]
    fn header_rejects_impossible_length() {
        let data: &[u8] = &[
            0x00, 0x00, 0x00, 0x08, // command_length below header size
            0x00, 0x00, 0x00, 0x15, // command_id
            0x00, 0x00, 0x00, 0x00, // command_status
            0x00, 0x00, 0x00, 0x01, // sequence_number
        ];
        let mut cursor = Cursor::new(data);

        let result = PduHeader::decode(&mut cursor);
        assert!(matches!(result, Err(CodecError::InvalidPduLength { .. })));
    }

    #[test]
    fn header_short_read_is_truncated() {
        let data: &[u8] = &[0x00, 0x00, 0x00];
        let mut cursor = Cursor::new(data);
        assert!(matches!(
            PduHeader::decode(&mut cursor),
            Err(CodecError::TruncatedHeader)
        ));
    }

    #[test]
    fn decode_cstring_stops_at_nul() {
        let data = b"hello\0world";
        let mut cursor = Cursor::new(&data[..]);
        let value = decode_cstring(&mut cursor, 16, "test").unwrap();
        assert_eq!(value, "hello");
        assert_eq!(cursor.position(), 6);
    }

    #[test]
    fn decode_cstring_missing_nul_is_malformed() {
        let data = b"no-terminator";
        let mut cursor = Cursor::new(&data[..]);
        let result = decode_cstring(&mut cursor, 64, "test");
        assert!(matches!(result, Err(CodecError::MalformedPdu { .. })));
    }

    #[test]
    fn encode_cstring_appends_single_nul() {
        let mut buf = BytesMut::new();
        encode_cstring(&mut buf, "CMT", 6, "service_type").unwrap();
        assert_eq!(buf.as_ref(), b"CMT\0");

        let mut empty = BytesMut::new();
        encode_cstring(&mut empty, "", 6, "service_type").unwrap();
        assert_eq!(empty.as_ref(), b"\0");
    }

    #[test]
    fn encode_cstring_enforces_max_len() {
        let mut buf = BytesMut::new();
        let result = encode_cstring(&mut buf, "toolongvalue", 6, "service_type");
        assert!(matches!(result, Err(CodecError::FieldTooLong { .. })));
    }

    #[test]
    fn encoded_request_satisfies_length_invariant() {
        let pdu = EnquireLink::new(3);
        let bytes = pdu.to_bytes().unwrap();

        let prefix = u32::from_be_bytes(bytes[0..4].try_into().unwrap());
        assert_eq!(prefix as usize, bytes.len());
        assert_eq!(bytes.len(), 16);

        let command_id = u32::from_be_bytes(bytes[4..8].try_into().unwrap());
        assert!(command_id <= 0x0000_01FF);
    }

    #[test]
    fn registry_decodes_header_only_pdus() {
        let registry = PduRegistry::new();

        for bytes in [
            EnquireLink::new(1).to_bytes().unwrap(),
            Unbind::new(2).to_bytes().unwrap(),
            GenericNack::invalid_command_id(3).to_bytes().unwrap(),
        ] {
            let mut cursor = Cursor::new(bytes.as_ref());
            let header = PduHeader::decode(&mut cursor).unwrap();
            registry.decode_pdu(header, &mut cursor).unwrap();
        }
    }

    #[test]
    fn registry_returns_raw_for_unknown_command() {
        let registry = PduRegistry::new();

        // query_sm is not an operation of this client
        let unknown_command_id = 0x0000_0003u32;
        let mut pdu = Vec::new();
        pdu.extend_from_slice(&20u32.to_be_bytes());
        pdu.extend_from_slice(&unknown_command_id.to_be_bytes());
        pdu.extend_from_slice(&0u32.to_be_bytes());
        pdu.extend_from_slice(&77u32.to_be_bytes());
        pdu.extend_from_slice(&[0x01, 0x02, 0x03, 0x04]);

        let mut cursor = Cursor::new(pdu.as_slice());
        let header = PduHeader::decode(&mut cursor).unwrap();
        let frame = registry.decode_pdu(header, &mut cursor).unwrap();

        match frame {
            Frame::Raw { header, body } => {
                assert_eq!(header.command_id, unknown_command_id);
                assert_eq!(header.sequence_number, 77);
                assert_eq!(body.as_ref(), &[0x01, 0x02, 0x03, 0x04]);
            }
            other => panic!("expected Raw frame, got {other:?}"),
        }
    }

    #[test]
    fn frame_check_reports_incomplete_body() {
        let mut data = Vec::new();
        data.extend_from_slice(&32u32.to_be_bytes());
        data.extend_from_slice(&[0u8; 8]);

        let mut cursor = Cursor::new(data.as_slice());
        assert!(matches!(
            Frame::check(&mut cursor),
            Err(CodecError::TruncatedBody { .. })
        ));
    }
}
