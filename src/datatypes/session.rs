// Session management PDUs: unbind, enquire_link and generic_nack are all
// bare 16-byte headers, differing only in command_id and status.

use crate::datatypes::{CommandId, CommandStatus};
use crate::macros::impl_header_only_pdu;

/// unbind PDU (Section 4.2.1) - request to terminate the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Unbind {
    pub command_status: u32,
    pub sequence_number: u32,
}

/// unbind_resp PDU (Section 4.2.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnbindResp {
    pub command_status: u32,
    pub sequence_number: u32,
}

/// enquire_link PDU (Section 4.11.1) - confidence check of the link.
/// The recipient answers with enquire_link_resp carrying the same
/// sequence number.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnquireLink {
    pub command_status: u32,
    pub sequence_number: u32,
}

/// enquire_link_resp PDU (Section 4.11.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnquireLinkResp {
    pub command_status: u32,
    pub sequence_number: u32,
}

/// generic_nack PDU (Section 4.3.1) - sent when the received PDU cannot
/// be acted on (unknown command_id, unparseable header).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GenericNack {
    pub command_status: u32,
    pub sequence_number: u32,
}

impl_header_only_pdu!(Unbind, CommandId::Unbind);
impl_header_only_pdu!(UnbindResp, CommandId::UnbindResp);
impl_header_only_pdu!(EnquireLink, CommandId::EnquireLink);
impl_header_only_pdu!(EnquireLinkResp, CommandId::EnquireLinkResp);
impl_header_only_pdu!(GenericNack, CommandId::GenericNack);

impl Unbind {
    pub fn new(sequence_number: u32) -> Self {
        Self {
            command_status: 0,
            sequence_number,
        }
    }
}

impl UnbindResp {
    pub fn new(sequence_number: u32) -> Self {
        Self {
            command_status: 0,
            sequence_number,
        }
    }
}

impl EnquireLink {
    pub fn new(sequence_number: u32) -> Self {
        Self {
            command_status: 0,
            sequence_number,
        }
    }
}

impl EnquireLinkResp {
    pub fn new(sequence_number: u32) -> Self {
        Self {
            command_status: 0,
            sequence_number,
        }
    }
}

impl GenericNack {
    pub fn invalid_command_id(sequence_number: u32) -> Self {
        Self {
            command_status: CommandStatus::InvalidCommandId as u32,
            sequence_number,
        }
    }

    pub fn invalid_command_length(sequence_number: u32) -> Self {
        Self {
            command_status: CommandStatus::InvalidCommandLength as u32,
            sequence_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Decodable, Encodable, PduHeader};
    use std::io::Cursor;

    #[test]
    fn enquire_link_roundtrips_as_bare_header() {
        let original = EnquireLink::new(42);
        let bytes = original.to_bytes().unwrap();

        // command_length = 16, empty body
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[0..4], &16u32.to_be_bytes());

        let mut cursor = Cursor::new(bytes.as_ref());
        let header = PduHeader::decode(&mut cursor).unwrap();
        let decoded = EnquireLink::decode(header, &mut cursor).unwrap();

        assert_eq!(original, decoded);
    }

    #[test]
    fn unbind_roundtrip() {
        let original = Unbind::new(123);
        let bytes = original.to_bytes().unwrap();

        let mut cursor = Cursor::new(bytes.as_ref());
        let header = PduHeader::decode(&mut cursor).unwrap();
        let decoded = Unbind::decode(header, &mut cursor).unwrap();

        assert_eq!(original, decoded);
    }

    #[test]
    fn generic_nack_carries_error_status() {
        let nack = GenericNack::invalid_command_id(456);
        let bytes = nack.to_bytes().unwrap();

        let mut cursor = Cursor::new(bytes.as_ref());
        let header = PduHeader::decode(&mut cursor).unwrap();
        assert_eq!(header.command_status, CommandStatus::InvalidCommandId as u32);

        let decoded = GenericNack::decode(header, &mut cursor).unwrap();
        assert_eq!(nack, decoded);
    }

    #[test]
    fn wrong_command_id_is_rejected() {
        let bytes = Unbind::new(7).to_bytes().unwrap();
        let mut cursor = Cursor::new(bytes.as_ref());
        let header = PduHeader::decode(&mut cursor).unwrap();
        assert!(EnquireLink::decode(header, &mut cursor).is_err());
    }
}
