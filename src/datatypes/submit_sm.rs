// submit_sm and its response (Sections 4.4.1 / 4.4.2). The short message
// body is kept as raw octets: the text has already been through the
// per-message encoding by the time a PDU exists.

use bytes::{Buf, Bytes, BytesMut};
use std::io::Cursor;

use crate::codec::{
    decode_cstring, decode_u8, encode_cstring, CodecError, Decodable, Encodable, PduHeader,
};
use crate::datatypes::{CommandId, Tlv};

/// Inline short_message ceiling; longer content moves to the
/// message_payload TLV with sm_length = 0 (Section 4.4.1).
pub const MAX_SHORT_MESSAGE_LEN: usize = 254;

/// submit_sm PDU (Section 4.4.1) - submit a short message for onward
/// transmission to a mobile subscriber.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitSm {
    pub command_status: u32,
    pub sequence_number: u32,

    pub service_type: String,
    pub source_addr_ton: u8,
    pub source_addr_npi: u8,
    pub source_addr: String,
    pub dest_addr_ton: u8,
    pub dest_addr_npi: u8,
    pub destination_addr: String,
    pub esm_class: u8,
    pub protocol_id: u8,
    pub priority_flag: u8,
    pub schedule_delivery_time: String,
    pub validity_period: String,
    pub registered_delivery: u8,
    pub replace_if_present_flag: u8,
    pub data_coding: u8,
    pub sm_default_msg_id: u8,
    /// Encoded message octets; at most 254, else empty with the content
    /// carried in a message_payload TLV.
    pub short_message: Bytes,
    pub tlvs: Vec<Tlv>,
}

impl Decodable for SubmitSm {
    fn command_id() -> CommandId {
        CommandId::SubmitSm
    }

    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;
        let (body, tlvs) = decode_sm_body(header, buf)?;
        Ok(SubmitSm {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
            service_type: body.service_type,
            source_addr_ton: body.source_addr_ton,
            source_addr_npi: body.source_addr_npi,
            source_addr: body.source_addr,
            dest_addr_ton: body.dest_addr_ton,
            dest_addr_npi: body.dest_addr_npi,
            destination_addr: body.destination_addr,
            esm_class: body.esm_class,
            protocol_id: body.protocol_id,
            priority_flag: body.priority_flag,
            schedule_delivery_time: body.schedule_delivery_time,
            validity_period: body.validity_period,
            registered_delivery: body.registered_delivery,
            replace_if_present_flag: body.replace_if_present_flag,
            data_coding: body.data_coding,
            sm_default_msg_id: body.sm_default_msg_id,
            short_message: body.short_message,
            tlvs,
        })
    }
}

impl Encodable for SubmitSm {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        if self.short_message.len() > MAX_SHORT_MESSAGE_LEN {
            return Err(CodecError::FieldTooLong {
                field: "short_message",
                max: MAX_SHORT_MESSAGE_LEN,
                actual: self.short_message.len(),
            });
        }

        let header = PduHeader {
            command_length: 0,
            command_id: CommandId::SubmitSm as u32,
            command_status: self.command_status,
            sequence_number: self.sequence_number,
        };
        header.encode(buf);

        encode_sm_body(
            buf,
            &SmBody {
                service_type: self.service_type.clone(),
                source_addr_ton: self.source_addr_ton,
                source_addr_npi: self.source_addr_npi,
                source_addr: self.source_addr.clone(),
                dest_addr_ton: self.dest_addr_ton,
                dest_addr_npi: self.dest_addr_npi,
                destination_addr: self.destination_addr.clone(),
                esm_class: self.esm_class,
                protocol_id: self.protocol_id,
                priority_flag: self.priority_flag,
                schedule_delivery_time: self.schedule_delivery_time.clone(),
                validity_period: self.validity_period.clone(),
                registered_delivery: self.registered_delivery,
                replace_if_present_flag: self.replace_if_present_flag,
                data_coding: self.data_coding,
                sm_default_msg_id: self.sm_default_msg_id,
                short_message: self.short_message.clone(),
            },
        )?;

        for tlv in &self.tlvs {
            tlv.encode(buf);
        }
        Ok(())
    }
}

/// submit_sm_resp PDU (Section 4.4.2). The body carries the SMSC-assigned
/// message_id, used later to match delivery receipts. Rejections may omit
/// the body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitSmResp {
    pub command_status: u32,
    pub sequence_number: u32,
    pub message_id: String,
}

impl SubmitSmResp {
    pub fn new(sequence_number: u32, message_id: impl Into<String>) -> Self {
        Self {
            command_status: 0,
            sequence_number,
            message_id: message_id.into(),
        }
    }

    pub fn error(sequence_number: u32, command_status: u32) -> Self {
        Self {
            command_status,
            sequence_number,
            message_id: String::new(),
        }
    }
}

impl Decodable for SubmitSmResp {
    fn command_id() -> CommandId {
        CommandId::SubmitSmResp
    }

    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;

        let message_id = if header.command_length as usize > PduHeader::SIZE {
            decode_cstring(buf, 65, "message_id")?
        } else {
            String::new()
        };

        Ok(SubmitSmResp {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
            message_id,
        })
    }
}

impl Encodable for SubmitSmResp {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        let header = PduHeader {
            command_length: 0,
            command_id: CommandId::SubmitSmResp as u32,
            command_status: self.command_status,
            sequence_number: self.sequence_number,
        };
        header.encode(buf);
        encode_cstring(buf, &self.message_id, 65, "message_id")?;
        Ok(())
    }
}

/// The mandatory body shared by submit_sm and deliver_sm (Section 4.6.1
/// mirrors 4.4.1 field for field).
pub(crate) struct SmBody {
    pub service_type: String,
    pub source_addr_ton: u8,
    pub source_addr_npi: u8,
    pub source_addr: String,
    pub dest_addr_ton: u8,
    pub dest_addr_npi: u8,
    pub destination_addr: String,
    pub esm_class: u8,
    pub protocol_id: u8,
    pub priority_flag: u8,
    pub schedule_delivery_time: String,
    pub validity_period: String,
    pub registered_delivery: u8,
    pub replace_if_present_flag: u8,
    pub data_coding: u8,
    pub sm_default_msg_id: u8,
    pub short_message: Bytes,
}

pub(crate) fn encode_sm_body(buf: &mut BytesMut, body: &SmBody) -> Result<(), CodecError> {
    encode_cstring(buf, &body.service_type, 6, "service_type")?;
    buf.extend_from_slice(&[body.source_addr_ton, body.source_addr_npi]);
    encode_cstring(buf, &body.source_addr, 21, "source_addr")?;
    buf.extend_from_slice(&[body.dest_addr_ton, body.dest_addr_npi]);
    encode_cstring(buf, &body.destination_addr, 21, "destination_addr")?;
    buf.extend_from_slice(&[body.esm_class, body.protocol_id, body.priority_flag]);
    encode_cstring(buf, &body.schedule_delivery_time, 17, "schedule_delivery_time")?;
    encode_cstring(buf, &body.validity_period, 17, "validity_period")?;
    buf.extend_from_slice(&[
        body.registered_delivery,
        body.replace_if_present_flag,
        body.data_coding,
        body.sm_default_msg_id,
        body.short_message.len() as u8,
    ]);
    buf.extend_from_slice(&body.short_message);
    Ok(())
}

pub(crate) fn decode_sm_body(
    header: PduHeader,
    buf: &mut Cursor<&[u8]>,
) -> Result<(SmBody, Vec<Tlv>), CodecError> {
    let body_end = buf.position() as usize + (header.command_length as usize - PduHeader::SIZE);

    let service_type = decode_cstring(buf, 6, "service_type")?;
    let source_addr_ton = decode_u8(buf, "source_addr_ton")?;
    let source_addr_npi = decode_u8(buf, "source_addr_npi")?;
    let source_addr = decode_cstring(buf, 21, "source_addr")?;
    let dest_addr_ton = decode_u8(buf, "dest_addr_ton")?;
    let dest_addr_npi = decode_u8(buf, "dest_addr_npi")?;
    let destination_addr = decode_cstring(buf, 21, "destination_addr")?;
    let esm_class = decode_u8(buf, "esm_class")?;
    let protocol_id = decode_u8(buf, "protocol_id")?;
    let priority_flag = decode_u8(buf, "priority_flag")?;
    let schedule_delivery_time = decode_cstring(buf, 17, "schedule_delivery_time")?;
    let validity_period = decode_cstring(buf, 17, "validity_period")?;
    let registered_delivery = decode_u8(buf, "registered_delivery")?;
    let replace_if_present_flag = decode_u8(buf, "replace_if_present_flag")?;
    let data_coding = decode_u8(buf, "data_coding")?;
    let sm_default_msg_id = decode_u8(buf, "sm_default_msg_id")?;

    let sm_length = decode_u8(buf, "sm_length")? as usize;
    if buf.remaining() < sm_length {
        return Err(CodecError::MalformedPdu {
            field: "short_message",
            reason: format!("sm_length {sm_length} exceeds remaining body octets"),
        });
    }
    let short_message = buf.copy_to_bytes(sm_length);

    // whatever remains of the declared body is optional parameters
    let tlv_len = body_end.saturating_sub(buf.position() as usize);
    let tlvs = if tlv_len > 0 {
        let tlv_bytes = buf.copy_to_bytes(tlv_len);
        let mut tlv_cursor = Cursor::new(tlv_bytes.as_ref());
        Tlv::decode_all(&mut tlv_cursor)?
    } else {
        Vec::new()
    };

    Ok((
        SmBody {
            service_type,
            source_addr_ton,
            source_addr_npi,
            source_addr,
            dest_addr_ton,
            dest_addr_npi,
            destination_addr,
            esm_class,
            protocol_id,
            priority_flag,
            schedule_delivery_time,
            validity_period,
            registered_delivery,
            replace_if_present_flag,
            data_coding,
            sm_default_msg_id,
            short_message,
        },
        tlvs,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::tlv::tags;

    fn sample() -> SubmitSm {
        SubmitSm {
            command_status: 0,
            sequence_number: 2,
            service_type: "CMT".to_string(),
            source_addr_ton: 1,
            source_addr_npi: 1,
            source_addr: "254700".to_string(),
            dest_addr_ton: 1,
            dest_addr_npi: 1,
            destination_addr: "254711".to_string(),
            esm_class: 8,
            protocol_id: 0,
            priority_flag: 0,
            schedule_delivery_time: String::new(),
            validity_period: String::new(),
            registered_delivery: 5,
            replace_if_present_flag: 0,
            data_coding: 0,
            sm_default_msg_id: 0,
            short_message: Bytes::from_static(b"Hello"),
            tlvs: Vec::new(),
        }
    }

    #[test]
    fn submit_sm_roundtrip() {
        let original = sample();
        let bytes = original.to_bytes().unwrap();

        assert_eq!(&bytes[0..4], &(bytes.len() as u32).to_be_bytes());
        assert_eq!(&bytes[4..8], &(CommandId::SubmitSm as u32).to_be_bytes());

        let mut cursor = Cursor::new(bytes.as_ref());
        let header = PduHeader::decode(&mut cursor).unwrap();
        let decoded = SubmitSm::decode(header, &mut cursor).unwrap();

        assert_eq!(original, decoded);
    }

    #[test]
    fn submit_sm_roundtrip_with_tlvs() {
        let mut original = sample();
        original.tlvs = vec![
            Tlv::new(tags::USER_MESSAGE_REFERENCE, Bytes::from_static(&[0x00, 0x07])),
            Tlv::new(0x1501, Bytes::from_static(b"vendor")),
        ];

        let bytes = original.to_bytes().unwrap();
        let mut cursor = Cursor::new(bytes.as_ref());
        let header = PduHeader::decode(&mut cursor).unwrap();
        let decoded = SubmitSm::decode(header, &mut cursor).unwrap();

        assert_eq!(original, decoded);
    }

    #[test]
    fn sm_length_reflects_encoded_octets() {
        let mut original = sample();
        original.short_message = Bytes::from(vec![0x41u8; 254]);
        let bytes = original.to_bytes().unwrap();

        let mut cursor = Cursor::new(bytes.as_ref());
        let header = PduHeader::decode(&mut cursor).unwrap();
        let decoded = SubmitSm::decode(header, &mut cursor).unwrap();
        assert_eq!(decoded.short_message.len(), 254);
    }

    #[test]
    fn oversized_short_message_is_rejected() {
        let mut original = sample();
        original.short_message = Bytes::from(vec![0x41u8; 255]);
        assert!(matches!(
            original.to_bytes(),
            Err(CodecError::FieldTooLong { .. })
        ));
    }

    #[test]
    fn payload_tlv_in_place_of_short_message() {
        let mut original = sample();
        original.short_message = Bytes::new();
        original.tlvs = vec![Tlv::message_payload(Bytes::from(vec![0x42u8; 300]))];

        let bytes = original.to_bytes().unwrap();
        let mut cursor = Cursor::new(bytes.as_ref());
        let header = PduHeader::decode(&mut cursor).unwrap();
        let decoded = SubmitSm::decode(header, &mut cursor).unwrap();

        assert!(decoded.short_message.is_empty());
        assert_eq!(decoded.tlvs[0].tag, tags::MESSAGE_PAYLOAD);
        assert_eq!(decoded.tlvs[0].value.len(), 300);
    }

    #[test]
    fn submit_sm_resp_roundtrip() {
        let original = SubmitSmResp::new(2, "MID-9");
        let bytes = original.to_bytes().unwrap();

        let mut cursor = Cursor::new(bytes.as_ref());
        let header = PduHeader::decode(&mut cursor).unwrap();
        let decoded = SubmitSmResp::decode(header, &mut cursor).unwrap();

        assert_eq!(original, decoded);
        assert_eq!(decoded.message_id, "MID-9");
    }

    #[test]
    fn submit_sm_resp_rejection_without_body() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&16u32.to_be_bytes());
        raw.extend_from_slice(&(CommandId::SubmitSmResp as u32).to_be_bytes());
        raw.extend_from_slice(&0x0000_0058u32.to_be_bytes()); // ESME_RTHROTTLED
        raw.extend_from_slice(&9u32.to_be_bytes());

        let mut cursor = Cursor::new(raw.as_slice());
        let header = PduHeader::decode(&mut cursor).unwrap();
        let decoded = SubmitSmResp::decode(header, &mut cursor).unwrap();

        assert_eq!(decoded.command_status, 0x58);
        assert!(decoded.message_id.is_empty());
    }
}
