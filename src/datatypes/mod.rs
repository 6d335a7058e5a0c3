//! Domain models for the SMPP v3.4 operations of a transceiver session.

mod bind;
mod command_id;
mod command_status;
mod deliver_sm;
mod session;
pub(crate) mod submit_sm;
pub mod tlv;

pub use bind::{BindTransceiver, BindTransceiverResp};
pub use command_id::CommandId;
pub use command_status::CommandStatus;
pub use deliver_sm::{DeliverSm, DeliverSmResp};
pub use session::{EnquireLink, EnquireLinkResp, GenericNack, Unbind, UnbindResp};
pub use submit_sm::{SubmitSm, SubmitSmResp, MAX_SHORT_MESSAGE_LEN};
pub use tlv::Tlv;
