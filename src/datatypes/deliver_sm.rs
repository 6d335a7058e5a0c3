// deliver_sm and its response (Sections 4.6.1 / 4.6.2). The body mirrors
// submit_sm; delivery receipts carry the original message id in the
// receipted_message_id TLV.

use bytes::{Bytes, BytesMut};
use std::io::Cursor;

use crate::codec::{encode_cstring, CodecError, Decodable, Encodable, PduHeader};
use crate::datatypes::submit_sm::{decode_sm_body, encode_sm_body, SmBody};
use crate::datatypes::tlv::{find_tlv, tags};
use crate::datatypes::{CommandId, Tlv};

/// deliver_sm PDU (Section 4.6.1) - an SMSC-originated message or a
/// delivery receipt for an earlier submit_sm.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliverSm {
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
    /// Raw message octets; the encoding is whatever data_coding declares.
    pub short_message: Bytes,
    pub tlvs: Vec<Tlv>,
}

impl DeliverSm {
    /// The receipted_message_id TLV value, present on delivery receipts.
    pub fn receipted_message_id(&self) -> Option<String> {
        find_tlv(&self.tlvs, tags::RECEIPTED_MESSAGE_ID).and_then(Tlv::value_as_cstring)
    }
}

impl Decodable for DeliverSm {
    fn command_id() -> CommandId {
        CommandId::DeliverSm
    }

    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;
        let (body, tlvs) = decode_sm_body(header, buf)?;
        Ok(DeliverSm {
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

impl Encodable for DeliverSm {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        let header = PduHeader {
            command_length: 0,
            command_id: CommandId::DeliverSm as u32,
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

/// deliver_sm_resp PDU (Section 4.6.2). The message_id field is unused
/// and set to NULL, so the body is a single NUL octet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliverSmResp {
    pub command_status: u32,
    pub sequence_number: u32,
}

impl DeliverSmResp {
    pub fn new(sequence_number: u32) -> Self {
        Self {
            command_status: 0,
            sequence_number,
        }
    }
}

impl Decodable for DeliverSmResp {
    fn command_id() -> CommandId {
        CommandId::DeliverSmResp
    }

    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        use bytes::Buf;

        Self::validate_header(&header)?;

        // the unused message_id octet, when present
        let extra = (header.command_length as usize)
            .saturating_sub(PduHeader::SIZE)
            .min(buf.remaining());
        buf.advance(extra);

        Ok(DeliverSmResp {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
        })
    }
}

impl Encodable for DeliverSmResp {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        let header = PduHeader {
            command_length: 0,
            command_id: CommandId::DeliverSmResp as u32,
            command_status: self.command_status,
            sequence_number: self.sequence_number,
        };
        header.encode(buf);
        encode_cstring(buf, "", 1, "message_id")?;
        Ok(())
    }
}
