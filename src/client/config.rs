//! Client configuration.
//!
//! Every recognized option with its default; the binary deserializes this
//! from a JSON declaration, library callers build it in code. Reference
//! made to NULL settings of C-octet string fields in Section 3.1 of the
//! specification means a lone 0x00 octet, so the empty string is the
//! right default for those.

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::encoding::{CodecErrorPolicy, MessageEncoding};

/// Length of generated client ids and log ids.
const TOKEN_LEN: usize = 17;

/// A random lowercase alphanumeric token, used for `client_id` and for
/// the log ids of client-originated PDUs.
pub fn random_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect()
}

#[derive(Clone, Debug, Deserialize)]
pub struct ClientConfig {
    // SMPP session parameters
    pub smsc_host: String,
    pub smsc_port: u16,
    pub system_id: String,
    pub password: String,
    #[serde(default)]
    pub system_type: String,
    #[serde(default)]
    pub addr_ton: u8,
    #[serde(default)]
    pub addr_npi: u8,
    #[serde(default)]
    pub address_range: String,
    #[serde(default = "defaults::interface_version")]
    pub interface_version: u8,

    // submit_sm defaults, overridable per job
    #[serde(default = "defaults::service_type")]
    pub service_type: String,
    #[serde(default = "defaults::ton_npi")]
    pub source_addr_ton: u8,
    #[serde(default = "defaults::ton_npi")]
    pub source_addr_npi: u8,
    #[serde(default = "defaults::ton_npi")]
    pub dest_addr_ton: u8,
    #[serde(default = "defaults::ton_npi")]
    pub dest_addr_npi: u8,
    /// store-and-forward with delivery receipt
    #[serde(default = "defaults::esm_class")]
    pub esm_class: u8,
    #[serde(default)]
    pub protocol_id: u8,
    #[serde(default)]
    pub priority_flag: u8,
    #[serde(default)]
    pub schedule_delivery_time: String,
    #[serde(default)]
    pub validity_period: String,
    #[serde(default = "defaults::registered_delivery")]
    pub registered_delivery: u8,
    #[serde(default)]
    pub replace_if_present_flag: u8,
    #[serde(default)]
    pub sm_default_msg_id: u8,
    #[serde(default)]
    pub encoding: MessageEncoding,
    #[serde(default)]
    pub codec_error_policy: CodecErrorPolicy,

    // session timers
    #[serde(default = "defaults::enquire_link_interval")]
    pub enquire_link_interval: f64,
    #[serde(default = "defaults::socket_timeout")]
    pub socket_timeout: f64,
    #[serde(default = "defaults::drain_duration")]
    pub drain_duration: f64,
    #[serde(default = "defaults::hook_timeout")]
    pub hook_timeout: f64,

    /// Reconnect and rebind after a lost session.
    #[serde(default = "defaults::auto_reconnect")]
    pub auto_reconnect: bool,

    /// Identifies this client instance in every log record.
    #[serde(default = "random_token")]
    pub client_id: String,

    /// Arbitrary key/values attached to the client's log span.
    #[serde(default)]
    pub log_metadata: HashMap<String, String>,
}

mod defaults {
    pub fn interface_version() -> u8 {
        0x34
    }
    pub fn service_type() -> String {
        "CMT".to_string()
    }
    pub fn ton_npi() -> u8 {
        1
    }
    pub fn esm_class() -> u8 {
        8
    }
    pub fn registered_delivery() -> u8 {
        5
    }
    pub fn enquire_link_interval() -> f64 {
        55.0
    }
    pub fn socket_timeout() -> f64 {
        30.0
    }
    pub fn drain_duration() -> f64 {
        8.0
    }
    pub fn hook_timeout() -> f64 {
        15.0
    }
    pub fn auto_reconnect() -> bool {
        true
    }
}

impl ClientConfig {
    /// A config with every optional field at its default.
    pub fn new(
        smsc_host: impl Into<String>,
        smsc_port: u16,
        system_id: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            smsc_host: smsc_host.into(),
            smsc_port,
            system_id: system_id.into(),
            password: password.into(),
            system_type: String::new(),
            addr_ton: 0,
            addr_npi: 0,
            address_range: String::new(),
            interface_version: defaults::interface_version(),
            service_type: defaults::service_type(),
            source_addr_ton: defaults::ton_npi(),
            source_addr_npi: defaults::ton_npi(),
            dest_addr_ton: defaults::ton_npi(),
            dest_addr_npi: defaults::ton_npi(),
            esm_class: defaults::esm_class(),
            protocol_id: 0,
            priority_flag: 0,
            schedule_delivery_time: String::new(),
            validity_period: String::new(),
            registered_delivery: defaults::registered_delivery(),
            replace_if_present_flag: 0,
            sm_default_msg_id: 0,
            encoding: MessageEncoding::default(),
            codec_error_policy: CodecErrorPolicy::default(),
            enquire_link_interval: defaults::enquire_link_interval(),
            socket_timeout: defaults::socket_timeout(),
            drain_duration: defaults::drain_duration(),
            hook_timeout: defaults::hook_timeout(),
            auto_reconnect: defaults::auto_reconnect(),
            client_id: random_token(),
            log_metadata: HashMap::new(),
        }
    }

    pub fn enquire_link_interval(&self) -> Duration {
        Duration::from_secs_f64(self.enquire_link_interval)
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.socket_timeout)
    }

    pub fn drain_duration(&self) -> Duration {
        Duration::from_secs_f64(self.drain_duration)
    }

    pub fn hook_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.hook_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_json_applies_documented_defaults() {
        let cfg: ClientConfig = serde_json::from_str(
            r#"{
                "smsc_host": "127.0.0.1",
                "smsc_port": 2775,
                "system_id": "smppclient1",
                "password": "password"
            }"#,
        )
        .unwrap();

        assert_eq!(cfg.interface_version, 0x34);
        assert_eq!(cfg.service_type, "CMT");
        assert_eq!(cfg.source_addr_ton, 1);
        assert_eq!(cfg.dest_addr_npi, 1);
        assert_eq!(cfg.esm_class, 8);
        assert_eq!(cfg.registered_delivery, 5);
        assert_eq!(cfg.encoding, MessageEncoding::Gsm0338);
        assert_eq!(cfg.codec_error_policy, CodecErrorPolicy::Strict);
        assert_eq!(cfg.enquire_link_interval, 55.0);
        assert_eq!(cfg.socket_timeout, 30.0);
        assert_eq!(cfg.drain_duration, 8.0);
        assert_eq!(cfg.client_id.len(), 17);
        assert!(cfg.auto_reconnect);
    }

    #[test]
    fn missing_mandatory_field_fails() {
        let result: Result<ClientConfig, _> = serde_json::from_str(
            r#"{"smsc_host": "127.0.0.1", "smsc_port": 2775, "system_id": "x"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn overrides_and_metadata_deserialize() {
        let cfg: ClientConfig = serde_json::from_str(
            r#"{
                "smsc_host": "smsc.example.com",
                "smsc_port": 2775,
                "system_id": "x",
                "password": "y",
                "encoding": "ucs2",
                "codec_error_policy": "replace",
                "enquire_link_interval": 20.0,
                "client_id": "fixed-client-id-01",
                "log_metadata": {"environment": "staging"}
            }"#,
        )
        .unwrap();

        assert_eq!(cfg.encoding, MessageEncoding::Ucs2);
        assert_eq!(cfg.codec_error_policy, CodecErrorPolicy::Replace);
        assert_eq!(cfg.enquire_link_interval(), Duration::from_secs(20));
        assert_eq!(cfg.client_id, "fixed-client-id-01");
        assert_eq!(cfg.log_metadata["environment"], "staging");
    }

    #[test]
    fn random_tokens_are_distinct() {
        let a = random_token();
        let b = random_token();
        assert_eq!(a.len(), 17);
        assert_ne!(a, b);
    }
}
