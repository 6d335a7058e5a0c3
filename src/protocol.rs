//! The job protocol: what gets queued into a broker.
//!
//! A job is a JSON object tagged by `smpp_command`; version `"1"` is the
//! only protocol version. Application code enqueues `submit_sm` jobs; the
//! session itself enqueues the replies it owes the SMSC (`deliver_sm_resp`,
//! `enquire_link_resp`) so that one dispatcher drains one queue.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::encoding::{CodecErrorPolicy, MessageEncoding};

/// The current job protocol version.
pub const PROTOCOL_VERSION: &str = "1";

fn default_version() -> String {
    PROTOCOL_VERSION.to_string()
}

/// A broker-dequeued unit of outbound work.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "smpp_command", rename_all = "snake_case")]
pub enum OutboundJob {
    SubmitSm(SubmitSmJob),
    DeliverSmResp(ReplyJob),
    EnquireLinkResp(ReplyJob),
    Unbind(UnbindJob),
}

impl OutboundJob {
    pub fn log_id(&self) -> &str {
        match self {
            OutboundJob::SubmitSm(job) => &job.log_id,
            OutboundJob::DeliverSmResp(job) | OutboundJob::EnquireLinkResp(job) => &job.log_id,
            OutboundJob::Unbind(job) => &job.log_id,
        }
    }

    pub fn command_name(&self) -> &'static str {
        match self {
            OutboundJob::SubmitSm(_) => "submit_sm",
            OutboundJob::DeliverSmResp(_) => "deliver_sm_resp",
            OutboundJob::EnquireLinkResp(_) => "enquire_link_resp",
            OutboundJob::Unbind(_) => "unbind",
        }
    }

    /// Only submit_sm jobs pass through rate-limit and throttle admission;
    /// replies the session owes the SMSC bypass both.
    pub fn is_admission_controlled(&self) -> bool {
        matches!(self, OutboundJob::SubmitSm(_))
    }

    /// Validate the protocol fields a permissive deserializer lets through.
    pub fn validate(&self) -> Result<(), JobError> {
        let version = match self {
            OutboundJob::SubmitSm(job) => &job.version,
            OutboundJob::DeliverSmResp(job) | OutboundJob::EnquireLinkResp(job) => &job.version,
            OutboundJob::Unbind(job) => &job.version,
        };
        if version != PROTOCOL_VERSION {
            return Err(JobError::UnsupportedVersion {
                version: version.clone(),
            });
        }

        if let OutboundJob::SubmitSm(job) = self {
            for (field, value) in [
                ("short_message", &job.short_message),
                ("source_addr", &job.source_addr),
                ("destination_addr", &job.destination_addr),
            ] {
                if value.is_empty() {
                    return Err(JobError::MissingField { field });
                }
            }
        }
        Ok(())
    }

    /// Parse a job from its JSON wire form and validate it.
    pub fn from_json(json: &str) -> Result<Self, JobError> {
        let job: OutboundJob = serde_json::from_str(json)?;
        job.validate()?;
        Ok(job)
    }

    pub fn to_json(&self) -> Result<String, JobError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A submit_sm job. Optional fields override the session defaults of the
/// client configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubmitSmJob {
    #[serde(default = "default_version")]
    pub version: String,
    pub log_id: String,
    pub short_message: String,
    pub source_addr: String,
    pub destination_addr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook_metadata: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<MessageEncoding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<CodecErrorPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_addr_ton: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_addr_npi: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest_addr_ton: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest_addr_npi: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub esm_class: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_id: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_flag: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_delivery_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validity_period: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_delivery: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replace_if_present_flag: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sm_default_msg_id: Option<u8>,

    /// Caller-supplied optional parameters, appended to the PDU untouched.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tlvs: Vec<JobTlv>,
}

impl SubmitSmJob {
    pub fn new(
        log_id: impl Into<String>,
        short_message: impl Into<String>,
        source_addr: impl Into<String>,
        destination_addr: impl Into<String>,
    ) -> Self {
        Self {
            version: default_version(),
            log_id: log_id.into(),
            short_message: short_message.into(),
            source_addr: source_addr.into(),
            destination_addr: destination_addr.into(),
            hook_metadata: None,
            encoding: None,
            errors: None,
            service_type: None,
            source_addr_ton: None,
            source_addr_npi: None,
            dest_addr_ton: None,
            dest_addr_npi: None,
            esm_class: None,
            protocol_id: None,
            priority_flag: None,
            schedule_delivery_time: None,
            validity_period: None,
            registered_delivery: None,
            replace_if_present_flag: None,
            sm_default_msg_id: None,
            tlvs: Vec::new(),
        }
    }

    pub fn with_hook_metadata(mut self, hook_metadata: impl Into<String>) -> Self {
        self.hook_metadata = Some(hook_metadata.into());
        self
    }

    pub fn with_encoding(mut self, encoding: MessageEncoding) -> Self {
        self.encoding = Some(encoding);
        self
    }
}

/// A caller-supplied TLV in a submit job; the value is carried as UTF-8
/// text and passed through byte for byte.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobTlv {
    pub tag: u16,
    pub value: String,
}

/// A reply the session owes the SMSC for a request it received; the
/// sequence number echoes the request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplyJob {
    #[serde(default = "default_version")]
    pub version: String,
    pub log_id: String,
    pub sequence_number: u32,
}

impl ReplyJob {
    pub fn new(log_id: impl Into<String>, sequence_number: u32) -> Self {
        Self {
            version: default_version(),
            log_id: log_id.into(),
            sequence_number,
        }
    }
}

/// A request to unbind the session cleanly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnbindJob {
    #[serde(default = "default_version")]
    pub version: String,
    pub log_id: String,
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("unsupported job protocol version: {version:?} (expected \"1\")")]
    UnsupportedVersion { version: String },

    #[error("submit_sm job is missing required field '{field}'")]
    MissingField { field: &'static str },

    #[error("job is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_job_json_roundtrip() {
        let job = OutboundJob::SubmitSm(
            SubmitSmJob::new("L1", "Hello", "254700", "254711").with_hook_metadata("order=7"),
        );

        let json = job.to_json().unwrap();
        let back = OutboundJob::from_json(&json).unwrap();
        assert_eq!(job, back);
    }

    #[test]
    fn tag_field_selects_the_variant() {
        let json = r#"{
            "smpp_command": "submit_sm",
            "version": "1",
            "log_id": "L1",
            "short_message": "Hello",
            "source_addr": "254700",
            "destination_addr": "254711"
        }"#;

        let job = OutboundJob::from_json(json).unwrap();
        assert!(matches!(job, OutboundJob::SubmitSm(_)));
        assert_eq!(job.log_id(), "L1");
        assert!(job.is_admission_controlled());
    }

    #[test]
    fn replies_bypass_admission() {
        let job = OutboundJob::EnquireLinkResp(ReplyJob::new("x", 5));
        assert!(!job.is_admission_controlled());
        let job = OutboundJob::DeliverSmResp(ReplyJob::new("x", 6));
        assert!(!job.is_admission_controlled());
    }

    #[test]
    fn wrong_version_is_rejected() {
        let json = r#"{
            "smpp_command": "submit_sm",
            "version": "2",
            "log_id": "L1",
            "short_message": "Hello",
            "source_addr": "254700",
            "destination_addr": "254711"
        }"#;

        assert!(matches!(
            OutboundJob::from_json(json),
            Err(JobError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn submit_requires_message_and_addresses() {
        let json = r#"{
            "smpp_command": "submit_sm",
            "version": "1",
            "log_id": "L1",
            "short_message": "",
            "source_addr": "254700",
            "destination_addr": "254711"
        }"#;

        assert!(matches!(
            OutboundJob::from_json(json),
            Err(JobError::MissingField {
                field: "short_message"
            })
        ));
    }

    #[test]
    fn unknown_command_is_rejected() {
        let json = r#"{"smpp_command": "query_sm", "version": "1", "log_id": "L1"}"#;
        assert!(matches!(
            OutboundJob::from_json(json),
            Err(JobError::Json(_))
        ));
    }

    #[test]
    fn job_overrides_deserialize() {
        let json = r#"{
            "smpp_command": "submit_sm",
            "log_id": "L2",
            "short_message": "Pris: 100€",
            "source_addr": "254700",
            "destination_addr": "254711",
            "encoding": "ucs2",
            "errors": "ignore",
            "registered_delivery": 0,
            "tlvs": [{"tag": 516, "value": "x"}]
        }"#;

        let job = OutboundJob::from_json(json).unwrap();
        match job {
            OutboundJob::SubmitSm(job) => {
                assert_eq!(job.encoding, Some(MessageEncoding::Ucs2));
                assert_eq!(job.errors, Some(CodecErrorPolicy::Ignore));
                assert_eq!(job.registered_delivery, Some(0));
                assert_eq!(job.tlvs.len(), 1);
                assert_eq!(job.tlvs[0].tag, 0x0204);
            }
            other => panic!("expected submit job, got {other:?}"),
        }
    }
}
