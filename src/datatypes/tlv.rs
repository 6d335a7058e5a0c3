use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;

use crate::codec::CodecError;

/// TLV tag constants per SMPP v3.4 specification, Section 5.3.2.
/// Unknown tags are tolerated on receipt; tags supplied by the caller on
/// submit_sm pass through unmodified.
pub mod tags {
    /// receipted_message_id (5.3.2.12): the SMSC message id a delivery
    /// receipt refers to.
    pub const RECEIPTED_MESSAGE_ID: u16 = 0x001E;
    /// message_payload (5.3.2.32): message content when it exceeds the
    /// 254-octet short_message field.
    pub const MESSAGE_PAYLOAD: u16 = 0x0424;
    /// message_state (5.3.2.35)
    pub const MESSAGE_STATE: u16 = 0x0427;
    /// user_message_reference (5.3.2.17)
    pub const USER_MESSAGE_REFERENCE: u16 = 0x0204;
    /// sar_msg_ref_num (5.3.2.22)
    pub const SAR_MSG_REF_NUM: u16 = 0x020E;
    /// sar_total_segments (5.3.2.23)
    pub const SAR_TOTAL_SEGMENTS: u16 = 0x020F;
    /// sar_segment_seqnum (5.3.2.24)
    pub const SAR_SEGMENT_SEQNUM: u16 = 0x0210;
    /// more_messages_to_send (5.3.2.34)
    pub const MORE_MESSAGES_TO_SEND: u16 = 0x0426;
    /// network_error_code (5.3.2.31)
    pub const NETWORK_ERROR_CODE: u16 = 0x0423;
}

/// An optional parameter: tag (u16), length (u16), value (length octets).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tlv {
    pub tag: u16,
    pub value: Bytes,
}

impl Tlv {
    pub fn new(tag: u16, value: impl Into<Bytes>) -> Self {
        Self {
            tag,
            value: value.into(),
        }
    }

    /// A message_payload TLV carrying an oversized message body.
    pub fn message_payload(body: impl Into<Bytes>) -> Self {
        Self::new(tags::MESSAGE_PAYLOAD, body)
    }

    pub fn encoded_len(&self) -> usize {
        4 + self.value.len()
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.tag);
        buf.put_u16(self.value.len() as u16);
        buf.put_slice(&self.value);
    }

    pub fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        if buf.remaining() < 4 {
            return Err(CodecError::MalformedPdu {
                field: "tlv",
                reason: "body ended inside a TLV tag/length".to_string(),
            });
        }

        let tag = buf.get_u16();
        let length = buf.get_u16() as usize;

        if buf.remaining() < length {
            return Err(CodecError::MalformedPdu {
                field: "tlv",
                reason: format!("TLV {tag:#06x} declares {length} octets but fewer remain"),
            });
        }

        let value = buf.copy_to_bytes(length);
        Ok(Self { tag, value })
    }

    /// Decode TLVs until the cursor is exhausted. Order and unknown tags
    /// are preserved.
    pub fn decode_all(buf: &mut Cursor<&[u8]>) -> Result<Vec<Self>, CodecError> {
        let mut tlvs = Vec::new();
        while buf.has_remaining() {
            tlvs.push(Self::decode(buf)?);
        }
        Ok(tlvs)
    }

    /// The value as a C-octet string (delivery receipt ids are carried
    /// NUL-terminated by most SMSCs; a bare string is tolerated).
    pub fn value_as_cstring(&self) -> Option<String> {
        let end = self
            .value
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.value.len());
        std::str::from_utf8(&self.value[..end])
            .ok()
            .map(str::to_owned)
    }
}

/// Find a tag in a decoded TLV list.
pub fn find_tlv(tlvs: &[Tlv], tag: u16) -> Option<&Tlv> {
    tlvs.iter().find(|t| t.tag == tag)
}
