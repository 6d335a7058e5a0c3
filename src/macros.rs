// Macros that cut boilerplate in the PDU implementations. Header-only
// PDUs (unbind, enquire_link, generic_nack and their responses) differ
// only in command_id.

/// Implement Encodable/Decodable for a PDU that carries no body.
macro_rules! impl_header_only_pdu {
    ($pdu_type:ident, $command_id:expr) => {
        impl $crate::codec::Decodable for $pdu_type {
            fn command_id() -> $crate::datatypes::CommandId {
                $command_id
            }

            fn decode(
                header: $crate::codec::PduHeader,
                buf: &mut std::io::Cursor<&[u8]>,
            ) -> Result<Self, $crate::codec::CodecError> {
                use bytes::Buf;

                Self::validate_header(&header)?;

                // skip any body bytes a lax peer may have appended
                let extra = (header.command_length as usize)
                    .saturating_sub($crate::codec::PduHeader::SIZE)
                    .min(buf.remaining());
                buf.advance(extra);

                Ok($pdu_type {
                    command_status: header.command_status,
                    sequence_number: header.sequence_number,
                })
            }
        }

        impl $crate::codec::Encodable for $pdu_type {
            fn encode(
                &self,
                buf: &mut bytes::BytesMut,
            ) -> Result<(), $crate::codec::CodecError> {
                let header = $crate::codec::PduHeader {
                    command_length: $crate::codec::PduHeader::SIZE as u32,
                    command_id: $command_id as u32,
                    command_status: self.command_status,
                    sequence_number: self.sequence_number,
                };
                header.encode(buf);
                Ok(())
            }
        }
    };
}

pub(crate) use impl_header_only_pdu;
