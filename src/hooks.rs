//! User hooks around the wire.
//!
//! `to_smsc` fires just before a PDU's bytes are written; `from_smsc`
//! fires just after a complete inbound PDU has been decoded. Hooks see
//! the PDU bytes but must not mutate them, and nothing a hook does (error
//! or overrun) ever affects the session: failures are logged and dropped.

use async_trait::async_trait;
use tracing::info;

#[async_trait]
pub trait Hook: Send + Sync {
    /// Called just before writing `pdu` to the socket.
    async fn to_smsc(
        &self,
        smpp_command: &str,
        log_id: &str,
        hook_metadata: &str,
        pdu: &[u8],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Called just after a complete PDU has been decoded.
    async fn from_smsc(
        &self,
        smpp_command: &str,
        log_id: &str,
        hook_metadata: &str,
        command_status: u32,
        pdu: &[u8],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Default hook: logs each direction and does nothing else.
#[derive(Debug, Default)]
pub struct LogHook;

#[async_trait]
impl Hook for LogHook {
    async fn to_smsc(
        &self,
        smpp_command: &str,
        log_id: &str,
        hook_metadata: &str,
        pdu: &[u8],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!(
            event = "hook.to_smsc",
            smpp_command,
            log_id,
            hook_metadata,
            pdu_len = pdu.len(),
            "sending request to SMSC"
        );
        Ok(())
    }

    async fn from_smsc(
        &self,
        smpp_command: &str,
        log_id: &str,
        hook_metadata: &str,
        command_status: u32,
        pdu: &[u8],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!(
            event = "hook.from_smsc",
            smpp_command,
            log_id,
            hook_metadata,
            command_status,
            pdu_len = pdu.len(),
            "received response from SMSC"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHook {
        requests: AtomicUsize,
        responses: AtomicUsize,
    }

    #[async_trait]
    impl Hook for CountingHook {
        async fn to_smsc(
            &self,
            _smpp_command: &str,
            _log_id: &str,
            _hook_metadata: &str,
            _pdu: &[u8],
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn from_smsc(
            &self,
            _smpp_command: &str,
            _log_id: &str,
            _hook_metadata: &str,
            _command_status: u32,
            _pdu: &[u8],
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.responses.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn custom_hooks_observe_both_directions() {
        let hook = CountingHook {
            requests: AtomicUsize::new(0),
            responses: AtomicUsize::new(0),
        };

        hook.to_smsc("submit_sm", "L1", "", b"\0\0\0\x10").await.unwrap();
        hook.from_smsc("submit_sm_resp", "L1", "", 0, b"\0\0\0\x10")
            .await
            .unwrap();

        assert_eq!(hook.requests.load(Ordering::SeqCst), 1);
        assert_eq!(hook.responses.load(Ordering::SeqCst), 1);
    }
}
