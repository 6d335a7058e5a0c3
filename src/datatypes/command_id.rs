// SMPP v3.4 command identifiers for the operations of a transceiver-bound
// ESME, per specification Table 4-1.

use num_enum::TryFromPrimitive;

/// SMPP v3.4 command identifiers (Table 4-1).
///
/// Bit 31 is the response indicator: requests occupy 0x00000000-0x000001FF,
/// responses 0x80000000-0x800001FF with the low bits matching the request.
/// Only the operations of a transceiver session are represented; anything
/// else decodes as a raw frame and is answered with generic_nack.
#[derive(TryFromPrimitive)]
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandId {
    /// generic_nack (Section 4.3.1) - error response when the received PDU
    /// itself cannot be acted on
    GenericNack = 0x8000_0000,

    /// submit_sm (Section 4.4.1) - submit a short message
    SubmitSm = 0x0000_0004,
    /// submit_sm_resp (Section 4.4.2)
    SubmitSmResp = 0x8000_0004,

    /// deliver_sm (Section 4.6.1) - SMSC-originated message or delivery
    /// receipt
    DeliverSm = 0x0000_0005,
    /// deliver_sm_resp (Section 4.6.2)
    DeliverSmResp = 0x8000_0005,

    /// unbind (Section 4.2.1)
    Unbind = 0x0000_0006,
    /// unbind_resp (Section 4.2.2)
    UnbindResp = 0x8000_0006,

    /// bind_transceiver (Section 4.2.5)
    BindTransceiver = 0x0000_0009,
    /// bind_transceiver_resp (Section 4.2.6)
    BindTransceiverResp = 0x8000_0009,

    /// enquire_link (Section 4.11.1) - link confidence check
    EnquireLink = 0x0000_0015,
    /// enquire_link_resp (Section 4.11.2)
    EnquireLinkResp = 0x8000_0015,
}

impl CommandId {
    /// Check if this command_id represents a response PDU.
    pub fn is_response(&self) -> bool {
        (*self as u32) & 0x8000_0000 != 0
    }

    /// The snake_case operation name used in log events, hook calls and
    /// the job protocol.
    pub fn name(&self) -> &'static str {
        match self {
            CommandId::GenericNack => "generic_nack",
            CommandId::SubmitSm => "submit_sm",
            CommandId::SubmitSmResp => "submit_sm_resp",
            CommandId::DeliverSm => "deliver_sm",
            CommandId::DeliverSmResp => "deliver_sm_resp",
            CommandId::Unbind => "unbind",
            CommandId::UnbindResp => "unbind_resp",
            CommandId::BindTransceiver => "bind_transceiver",
            CommandId::BindTransceiverResp => "bind_transceiver_resp",
            CommandId::EnquireLink => "enquire_link",
            CommandId::EnquireLinkResp => "enquire_link_resp",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_bit() {
        assert!(!CommandId::SubmitSm.is_response());
        assert!(CommandId::SubmitSmResp.is_response());
        assert!(!CommandId::EnquireLink.is_response());
        assert!(CommandId::EnquireLinkResp.is_response());
        assert!(CommandId::GenericNack.is_response());
    }

    #[test]
    fn wire_values_match_table_4_1() {
        assert_eq!(CommandId::BindTransceiver as u32, 0x0000_0009);
        assert_eq!(CommandId::BindTransceiverResp as u32, 0x8000_0009);
        assert_eq!(CommandId::SubmitSm as u32, 0x0000_0004);
        assert_eq!(CommandId::DeliverSm as u32, 0x0000_0005);
        assert_eq!(CommandId::Unbind as u32, 0x0000_0006);
        assert_eq!(CommandId::EnquireLink as u32, 0x0000_0015);
        assert_eq!(CommandId::GenericNack as u32, 0x8000_0000);
    }

    #[test]
    fn unknown_value_is_rejected() {
        assert!(CommandId::try_from(0x0000_0003u32).is_err());
        assert!(CommandId::try_from(0x0000_000Au32).is_err());
    }
}
