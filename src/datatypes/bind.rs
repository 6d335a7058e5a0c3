// bind_transceiver and its response (Sections 4.2.5 / 4.2.6). A
// transceiver bind authorizes both submission and reception over the one
// connection, which is the only bind mode this client speaks.

use bytes::BytesMut;
use std::io::Cursor;

use crate::codec::{
    decode_cstring, decode_u8, encode_cstring, CodecError, Decodable, Encodable, PduHeader,
};
use crate::datatypes::CommandId;

/// bind_transceiver PDU (Section 4.2.5).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindTransceiver {
    pub command_status: u32,
    pub sequence_number: u32,

    /// Identifies the ESME requesting to bind (max 15 chars).
    pub system_id: String,
    /// Password used by the SMSC to authenticate the ESME (max 8 chars).
    pub password: String,
    /// Type of ESME system (max 12 chars, may be empty).
    pub system_type: String,
    /// SMPP protocol version supported by the ESME; 0x34 for v3.4.
    pub interface_version: u8,
    pub addr_ton: u8,
    pub addr_npi: u8,
    /// ESME address range served via this session (may be empty).
    pub address_range: String,
}

impl Decodable for BindTransceiver {
    fn command_id() -> CommandId {
        CommandId::BindTransceiver
    }

    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;

        let system_id = decode_cstring(buf, 16, "system_id")?;
        let password = decode_cstring(buf, 9, "password")?;
        let system_type = decode_cstring(buf, 13, "system_type")?;
        let interface_version = decode_u8(buf, "interface_version")?;
        let addr_ton = decode_u8(buf, "addr_ton")?;
        let addr_npi = decode_u8(buf, "addr_npi")?;
        let address_range = decode_cstring(buf, 41, "address_range")?;

        Ok(BindTransceiver {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
            system_id,
            password,
            system_type,
            interface_version,
            addr_ton,
            addr_npi,
            address_range,
        })
    }
}

impl Encodable for BindTransceiver {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        let header = PduHeader {
            command_length: 0, // fixed up by to_bytes
            command_id: CommandId::BindTransceiver as u32,
            command_status: self.command_status,
            sequence_number: self.sequence_number,
        };
        header.encode(buf);

        encode_cstring(buf, &self.system_id, 16, "system_id")?;
        encode_cstring(buf, &self.password, 9, "password")?;
        encode_cstring(buf, &self.system_type, 13, "system_type")?;
        buf.extend_from_slice(&[self.interface_version, self.addr_ton, self.addr_npi]);
        encode_cstring(buf, &self.address_range, 41, "address_range")?;
        Ok(())
    }
}

/// bind_transceiver_resp PDU (Section 4.2.6). The body carries only the
/// SMSC's system_id; on a refused bind some SMSCs omit the body entirely,
/// which is tolerated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindTransceiverResp {
    pub command_status: u32,
    pub sequence_number: u32,
    pub system_id: String,
}

impl BindTransceiverResp {
    pub fn new(sequence_number: u32, system_id: impl Into<String>) -> Self {
        Self {
            command_status: 0,
            sequence_number,
            system_id: system_id.into(),
        }
    }
}

impl Decodable for BindTransceiverResp {
    fn command_id() -> CommandId {
        CommandId::BindTransceiverResp
    }

    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;

        let system_id = if header.command_length as usize > PduHeader::SIZE {
            decode_cstring(buf, 16, "system_id")?
        } else {
            String::new()
        };

        Ok(BindTransceiverResp {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
            system_id,
        })
    }
}

impl Encodable for BindTransceiverResp {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        let header = PduHeader {
            command_length: 0,
            command_id: CommandId::BindTransceiverResp as u32,
            command_status: self.command_status,
            sequence_number: self.sequence_number,
        };
        header.encode(buf);
        encode_cstring(buf, &self.system_id, 16, "system_id")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_transceiver_roundtrip() {
        let original = BindTransceiver {
            command_status: 0,
            sequence_number: 1,
            system_id: "smppclient1".to_string(),
            password: "password".to_string(),
            system_type: String::new(),
            interface_version: 0x34,
            addr_ton: 0,
            addr_npi: 0,
            address_range: String::new(),
        };

        let bytes = original.to_bytes().unwrap();

        // header + "smppclient1\0" + "password\0" + "\0" + 3 octets + "\0"
        assert_eq!(bytes.len(), 16 + 12 + 9 + 1 + 3 + 1);
        assert_eq!(&bytes[0..4], &(bytes.len() as u32).to_be_bytes());

        let mut cursor = Cursor::new(bytes.as_ref());
        let header = PduHeader::decode(&mut cursor).unwrap();
        let decoded = BindTransceiver::decode(header, &mut cursor).unwrap();

        assert_eq!(original, decoded);
    }

    #[test]
    fn bind_resp_roundtrip() {
        let original = BindTransceiverResp::new(1, "SMSC-SIM");
        let bytes = original.to_bytes().unwrap();

        let mut cursor = Cursor::new(bytes.as_ref());
        let header = PduHeader::decode(&mut cursor).unwrap();
        let decoded = BindTransceiverResp::decode(header, &mut cursor).unwrap();

        assert_eq!(original, decoded);
    }

    #[test]
    fn refused_bind_resp_without_body() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&16u32.to_be_bytes());
        raw.extend_from_slice(&(CommandId::BindTransceiverResp as u32).to_be_bytes());
        raw.extend_from_slice(&0x0000_000Du32.to_be_bytes()); // ESME_RBINDFAIL
        raw.extend_from_slice(&1u32.to_be_bytes());

        let mut cursor = Cursor::new(raw.as_slice());
        let header = PduHeader::decode(&mut cursor).unwrap();
        let decoded = BindTransceiverResp::decode(header, &mut cursor).unwrap();

        assert_eq!(decoded.command_status, 0x0000_000D);
        assert!(decoded.system_id.is_empty());
    }

    #[test]
    fn overlong_system_id_is_rejected_on_encode() {
        let pdu = BindTransceiver {
            command_status: 0,
            sequence_number: 1,
            system_id: "a-system-id-way-beyond-fifteen-chars".to_string(),
            password: "pw".to_string(),
            system_type: String::new(),
            interface_version: 0x34,
            addr_ton: 0,
            addr_npi: 0,
            address_range: String::new(),
        };
        assert!(pdu.to_bytes().is_err());
    }
}
