//! The SMPP session engine.
//!
//! A `Client` owns the TCP connection, binds as a transceiver and then
//! runs three cooperating loops against the one duplex socket:
//!
//! - the **dispatcher** dequeues jobs from the broker, passes submits
//!   through rate-limit and throttle admission, encodes and writes;
//! - the **reader** owns the read half, decodes inbound PDUs and routes
//!   them (correlation, throttle bookkeeping, replies, hooks);
//! - the **link prober** sends periodic enquire_link PDUs and tears the
//!   session down when the SMSC stops answering.
//!
//! The write half sits behind one async mutex held for the duration of a
//! complete PDU write; interleaved writes would garble the framing, and
//! this is the only lock the design requires. A correlation entry for a
//! request is always stored before that request's bytes reach the socket,
//! so a response can never arrive first.

mod config;
mod error;

pub use config::{random_token, ClientConfig};
pub use error::{ClientError, ClientResult};

use bytes::Bytes;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, Notify};
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use crate::broker::{Broker, InMemoryBroker};
use crate::codec::{CodecError, Encodable, Frame, PduRegistry};
use crate::connection::{split, FrameReader, FrameWriter};
use crate::correlater::{Correlater, MemoryCorrelater};
use crate::datatypes::{
    BindTransceiver, CommandStatus, DeliverSmResp, EnquireLink, EnquireLinkResp, GenericNack,
    SubmitSm, Tlv, Unbind, UnbindResp, MAX_SHORT_MESSAGE_LEN,
};
use crate::hooks::{Hook, LogHook};
use crate::protocol::{OutboundJob, ReplyJob, SubmitSmJob};
use crate::ratelimiter::{RateLimiter, TokenBucket};
use crate::sequence::{AtomicSequence, SequenceGenerator, MAX_SEQUENCE_NUMBER};
use crate::throttle::{SlidingWindowThrottle, ThrottleHandler};

/// States of an SMPP transceiver session (Section 2.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No network connection to the SMSC.
    Closed,
    /// TCP connect in progress.
    Connecting,
    /// Connected, bind_transceiver not yet acknowledged.
    OpenUnbound,
    /// Bound as transceiver; traffic may flow in both directions.
    BoundTrx,
    /// Session is winding down; no new work is accepted.
    Unbinding,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Closed => "CLOSED",
            SessionState::Connecting => "CONNECTING",
            SessionState::OpenUnbound => "OPEN_UNBOUND",
            SessionState::BoundTrx => "BOUND_TRX",
            SessionState::Unbinding => "UNBINDING",
        };
        f.write_str(name)
    }
}

/// Reconnect/retry backoff ladder: half a second doubling up to a
/// sixteen-minute ceiling.
fn retry_after(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(11);
    let wait = Duration::from_millis(500).saturating_mul(1 << exponent);
    wait.min(Duration::from_secs(16 * 60))
}

/// Builder for a [`Client`]; every pluggable component has a documented
/// default.
pub struct ClientBuilder {
    config: ClientConfig,
    broker: Option<Arc<dyn Broker>>,
    hook: Option<Arc<dyn Hook>>,
    rate_limiter: Option<Arc<dyn RateLimiter>>,
    throttle_handler: Option<Arc<dyn ThrottleHandler>>,
    sequence_generator: Option<Arc<dyn SequenceGenerator>>,
    correlater: Option<Arc<dyn Correlater>>,
}

impl ClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            broker: None,
            hook: None,
            rate_limiter: None,
            throttle_handler: None,
            sequence_generator: None,
            correlater: None,
        }
    }

    pub fn broker(mut self, broker: Arc<dyn Broker>) -> Self {
        self.broker = Some(broker);
        self
    }

    pub fn hook(mut self, hook: Arc<dyn Hook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn rate_limiter(mut self, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    pub fn throttle_handler(mut self, throttle_handler: Arc<dyn ThrottleHandler>) -> Self {
        self.throttle_handler = Some(throttle_handler);
        self
    }

    pub fn sequence_generator(mut self, sequence_generator: Arc<dyn SequenceGenerator>) -> Self {
        self.sequence_generator = Some(sequence_generator);
        self
    }

    pub fn correlater(mut self, correlater: Arc<dyn Correlater>) -> Self {
        self.correlater = Some(correlater);
        self
    }

    pub fn build(self) -> Client {
        Client {
            config: self.config,
            broker: self.broker.unwrap_or_else(|| Arc::new(InMemoryBroker::default())),
            hook: self.hook.unwrap_or_else(|| Arc::new(LogHook)),
            rate_limiter: self
                .rate_limiter
                .unwrap_or_else(|| Arc::new(TokenBucket::default())),
            throttle_handler: self
                .throttle_handler
                .unwrap_or_else(|| Arc::new(SlidingWindowThrottle::default())),
            sequence_generator: self
                .sequence_generator
                .unwrap_or_else(|| Arc::new(AtomicSequence::new())),
            correlater: self
                .correlater
                .unwrap_or_else(|| Arc::new(MemoryCorrelater::default())),
            registry: PduRegistry::new(),
            state: RwLock::new(SessionState::Closed),
            writer: Mutex::new(None),
            pong: Notify::new(),
            shutdown: CancellationToken::new(),
        }
    }
}

/// An asynchronous SMPP v3.4 transceiver client.
pub struct Client {
    config: ClientConfig,
    broker: Arc<dyn Broker>,
    hook: Arc<dyn Hook>,
    rate_limiter: Arc<dyn RateLimiter>,
    throttle_handler: Arc<dyn ThrottleHandler>,
    sequence_generator: Arc<dyn SequenceGenerator>,
    correlater: Arc<dyn Correlater>,
    registry: PduRegistry,
    state: RwLock<SessionState>,
    /// The single-writer lock: held for the duration of one complete PDU
    /// write so frames never interleave on the wire.
    writer: Mutex<Option<FrameWriter>>,
    pong: Notify,
    shutdown: CancellationToken,
}

impl Client {
    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    /// A client with every pluggable component at its default.
    pub fn new(config: ClientConfig) -> Self {
        ClientBuilder::new(config).build()
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Hand a submit job to the broker. The session sends it when it is
    /// bound and admission control allows.
    pub async fn send_message(&self, job: SubmitSmJob) -> ClientResult<()> {
        let job = OutboundJob::SubmitSm(job);
        job.validate().map_err(ClientError::Job)?;
        info!(
            event = "client.send_message",
            log_id = job.log_id(),
            smpp_command = job.command_name(),
            "enqueueing message"
        );
        self.broker.enqueue(job).await?;
        Ok(())
    }

    /// Request a clean stop: the session drains, unbinds and `run`
    /// returns.
    pub fn stop(&self) {
        info!(event = "client.stop", "shutdown requested");
        self.shutdown.cancel();
    }

    /// Run the client until stopped or until an unrecoverable error.
    ///
    /// Connects and binds, runs the session loops, and on session loss
    /// reconnects with exponential backoff when `auto_reconnect` is set.
    /// A bind rejected by the SMSC is never retried automatically.
    pub async fn run(&self) -> ClientResult<()> {
        let span = tracing::info_span!(
            "smpp_client",
            client_id = %self.config.client_id,
            smsc_host = %self.config.smsc_host,
            system_id = %self.config.system_id,
            log_metadata = ?self.config.log_metadata,
        );
        self.run_inner().instrument(span).await
    }

    async fn run_inner(&self) -> ClientResult<()> {
        let mut attempt: u32 = 0;
        loop {
            if self.shutdown.is_cancelled() {
                self.set_state(SessionState::Closed);
                return Ok(());
            }

            match self.connect_and_bind().await {
                Ok(mut reader) => {
                    attempt = 0;
                    let end = self.run_session(&mut reader).await;
                    self.teardown(&mut reader, &end).await;
                    match end {
                        ClientError::Shutdown | ClientError::UnbindRequested => return Ok(()),
                        end if !self.config.auto_reconnect => return Err(end),
                        end => {
                            warn!(event = "client.session_lost", error = %end, "session ended");
                        }
                    }
                }
                Err(e @ ClientError::BindRejected { .. }) => {
                    self.close_writer().await;
                    self.set_state(SessionState::Closed);
                    error!(event = "client.bind", error = %e, "SMSC refused the bind; not retrying");
                    return Err(e);
                }
                Err(e) => {
                    self.close_writer().await;
                    self.set_state(SessionState::Closed);
                    if !self.config.auto_reconnect {
                        return Err(e);
                    }
                    warn!(event = "client.connect", error = %e, "connection attempt failed");
                }
            }

            attempt += 1;
            let wait = retry_after(attempt);
            info!(
                event = "client.reconnect",
                attempt,
                wait = wait.as_secs_f64(),
                "waiting before reconnecting"
            );
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.shutdown.cancelled() => {
                    self.set_state(SessionState::Closed);
                    return Ok(());
                }
            }
        }
    }

    // ---- session establishment -------------------------------------------

    async fn connect_and_bind(&self) -> ClientResult<FrameReader> {
        self.set_state(SessionState::Connecting);
        let socket_timeout = self.config.socket_timeout();

        let addr = (self.config.smsc_host.as_str(), self.config.smsc_port);
        let socket = timeout(socket_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| ClientError::Timeout {
                operation: "connect",
                seconds: self.config.socket_timeout,
            })??;

        let (reader, writer) = split(socket);
        *self.writer.lock().await = Some(writer);
        self.set_state(SessionState::OpenUnbound);
        info!(
            event = "client.connect",
            smsc_port = self.config.smsc_port,
            "connected to SMSC"
        );

        let mut reader = reader;
        self.bind_transceiver(&mut reader).await?;
        self.set_state(SessionState::BoundTrx);
        Ok(reader)
    }

    async fn bind_transceiver(&self, reader: &mut FrameReader) -> ClientResult<()> {
        let log_id = random_token();
        let sequence_number = self.next_sequence();

        let pdu = BindTransceiver {
            command_status: 0,
            sequence_number,
            system_id: self.config.system_id.clone(),
            password: self.config.password.clone(),
            system_type: self.config.system_type.clone(),
            interface_version: self.config.interface_version,
            addr_ton: self.config.addr_ton,
            addr_npi: self.config.addr_npi,
            address_range: self.config.address_range.clone(),
        };
        let bytes = pdu.to_bytes()?;

        self.correlater.put(sequence_number, &log_id, "").await;
        // the bind PDU carries the password, so the log event carries ids only
        info!(
            event = "client.bind",
            %log_id,
            sequence_number,
            "sending bind_transceiver"
        );
        self.send_pdu("bind_transceiver", &log_id, "", &bytes).await?;

        let frame = timeout(
            self.config.socket_timeout(),
            reader.read_frame(&self.registry),
        )
        .await
        .map_err(|_| ClientError::Timeout {
            operation: "bind_transceiver_resp",
            seconds: self.config.socket_timeout,
        })??
        .ok_or(ClientError::ConnectionClosed)?;

        let (frame, raw) = frame;
        match frame {
            Frame::BindTransceiverResp(resp) => {
                let (log_id, hook_metadata) = self
                    .correlater
                    .get(resp.sequence_number)
                    .await
                    .unwrap_or_default();
                self.call_from_smsc_hook(
                    "bind_transceiver_resp",
                    &log_id,
                    &hook_metadata,
                    resp.command_status,
                    &raw,
                )
                .await;

                if resp.command_status != 0 {
                    return Err(ClientError::BindRejected {
                        status: resp.command_status,
                    });
                }
                info!(
                    event = "client.bind",
                    %log_id,
                    smsc_system_id = %resp.system_id,
                    "bound as transceiver"
                );
                Ok(())
            }
            other => Err(ClientError::UnexpectedPdu {
                operation: "bind",
                expected: "bind_transceiver_resp",
                actual: other.command_name().to_string(),
            }),
        }
    }

    // ---- the three loops --------------------------------------------------

    async fn run_session(&self, reader: &mut FrameReader) -> ClientError {
        info!(event = "client.session", "session loops starting");
        tokio::select! {
            e = self.dispatch_outbound() => e,
            e = self.read_inbound(reader) => e,
            e = self.probe_link() => e,
            _ = self.shutdown.cancelled() => ClientError::Shutdown,
        }
    }

    /// Dispatcher loop: drain the broker and write to the socket.
    async fn dispatch_outbound(&self) -> ClientError {
        let mut dequeue_retry: u32 = 0;
        loop {
            let job = match self.broker.dequeue().await {
                Ok(job) => {
                    dequeue_retry = 0;
                    job
                }
                Err(e @ crate::broker::BrokerError::Closed) => return ClientError::Broker(e),
                Err(e) => {
                    dequeue_retry += 1;
                    let wait = retry_after(dequeue_retry);
                    error!(
                        event = "client.dispatch",
                        error = %e,
                        retry_count = dequeue_retry,
                        wait = wait.as_secs_f64(),
                        "broker dequeue failed"
                    );
                    tokio::time::sleep(wait).await;
                    continue;
                }
            };

            if let Err(end) = self.dispatch_job(job).await {
                return end;
            }
        }
    }

    /// Send one dequeued job. Per-message failures (encoding) drop the
    /// job and return Ok; transport failures end the session.
    async fn dispatch_job(&self, job: OutboundJob) -> ClientResult<()> {
        if job.is_admission_controlled() {
            self.rate_limiter.acquire().await;
            while !self.throttle_handler.allow_request().await {
                let delay = self.throttle_handler.throttle_delay().await;
                info!(
                    event = "client.dispatch",
                    delay = delay.as_secs_f64(),
                    "parked by throttle handler"
                );
                tokio::time::sleep(delay).await;
            }
        }

        match job {
            OutboundJob::SubmitSm(job) => {
                let log_id = job.log_id.clone();
                let hook_metadata = job.hook_metadata.clone().unwrap_or_default();

                let (sequence_number, bytes) = match self.build_submit_sm(&job) {
                    Ok(built) => built,
                    Err(e) => {
                        error!(
                            event = "client.dispatch",
                            %log_id,
                            smpp_command = "submit_sm",
                            error = %e,
                            "dropping job: submit_sm could not be built"
                        );
                        return Ok(());
                    }
                };

                // correlation strictly precedes the socket write
                self.correlater
                    .put(sequence_number, &log_id, &hook_metadata)
                    .await;
                self.send_pdu("submit_sm", &log_id, &hook_metadata, &bytes)
                    .await?;
                info!(
                    event = "client.dispatch",
                    %log_id,
                    sequence_number,
                    smpp_command = "submit_sm",
                    "submitted"
                );
            }
            OutboundJob::DeliverSmResp(reply) => {
                let bytes = DeliverSmResp::new(reply.sequence_number).to_bytes()?;
                self.send_pdu("deliver_sm_resp", &reply.log_id, "", &bytes)
                    .await?;
            }
            OutboundJob::EnquireLinkResp(reply) => {
                let bytes = EnquireLinkResp::new(reply.sequence_number).to_bytes()?;
                self.send_pdu("enquire_link_resp", &reply.log_id, "", &bytes)
                    .await?;
            }
            OutboundJob::Unbind(job) => {
                let sequence_number = self.next_sequence();
                self.correlater.put(sequence_number, &job.log_id, "").await;
                let bytes = Unbind::new(sequence_number).to_bytes()?;
                self.send_pdu("unbind", &job.log_id, "", &bytes).await?;
                return Err(ClientError::UnbindRequested);
            }
        }
        Ok(())
    }

    /// Build a submit_sm PDU from a job, applying the per-message
    /// encoding and the session defaults.
    fn build_submit_sm(&self, job: &SubmitSmJob) -> Result<(u32, Bytes), CodecError> {
        let encoding = job.encoding.unwrap_or(self.config.encoding);
        let policy = job.errors.unwrap_or(self.config.codec_error_policy);

        let encoded =
            encoding
                .encode(&job.short_message, policy)
                .map_err(|e| CodecError::MalformedPdu {
                    field: "short_message",
                    reason: e.to_string(),
                })?;

        let mut tlvs: Vec<Tlv> = Vec::new();
        let short_message = if encoded.len() > MAX_SHORT_MESSAGE_LEN {
            // oversized content moves to message_payload with sm_length 0
            tlvs.push(Tlv::message_payload(encoded));
            Bytes::new()
        } else {
            Bytes::from(encoded)
        };
        tlvs.extend(
            job.tlvs
                .iter()
                .map(|t| Tlv::new(t.tag, Bytes::from(t.value.clone().into_bytes()))),
        );

        let sequence_number = self.next_sequence();
        let pdu = SubmitSm {
            command_status: 0,
            sequence_number,
            service_type: job
                .service_type
                .clone()
                .unwrap_or_else(|| self.config.service_type.clone()),
            source_addr_ton: job.source_addr_ton.unwrap_or(self.config.source_addr_ton),
            source_addr_npi: job.source_addr_npi.unwrap_or(self.config.source_addr_npi),
            source_addr: job.source_addr.clone(),
            dest_addr_ton: job.dest_addr_ton.unwrap_or(self.config.dest_addr_ton),
            dest_addr_npi: job.dest_addr_npi.unwrap_or(self.config.dest_addr_npi),
            destination_addr: job.destination_addr.clone(),
            esm_class: job.esm_class.unwrap_or(self.config.esm_class),
            protocol_id: job.protocol_id.unwrap_or(self.config.protocol_id),
            priority_flag: job.priority_flag.unwrap_or(self.config.priority_flag),
            schedule_delivery_time: job
                .schedule_delivery_time
                .clone()
                .unwrap_or_else(|| self.config.schedule_delivery_time.clone()),
            validity_period: job
                .validity_period
                .clone()
                .unwrap_or_else(|| self.config.validity_period.clone()),
            registered_delivery: job
                .registered_delivery
                .unwrap_or(self.config.registered_delivery),
            replace_if_present_flag: job
                .replace_if_present_flag
                .unwrap_or(self.config.replace_if_present_flag),
            data_coding: encoding.data_coding(),
            sm_default_msg_id: job.sm_default_msg_id.unwrap_or(self.config.sm_default_msg_id),
            short_message,
            tlvs,
        };

        Ok((sequence_number, pdu.to_bytes()?))
    }

    /// Reader loop: decode inbound PDUs and route them.
    async fn read_inbound(&self, reader: &mut FrameReader) -> ClientError {
        loop {
            let (frame, raw) = match reader.read_frame(&self.registry).await {
                Ok(Some(read)) => read,
                Ok(None) => return ClientError::ConnectionClosed,
                Err(CodecError::Io(e)) => {
                    error!(event = "client.read", error = %e, "socket read failed");
                    return ClientError::Transport(e);
                }
                Err(e) => {
                    error!(
                        event = "client.read",
                        error = %e,
                        "inbound stream can no longer be framed"
                    );
                    // the header itself was unusable: nack with a NULL
                    // sequence number, best effort, then tear down
                    if let Ok(nack) = GenericNack::invalid_command_length(0).to_bytes() {
                        let _ = self.write_pdu(&nack).await;
                    }
                    return ClientError::Framing(e);
                }
            };

            if let Err(end) = self.handle_frame(frame, raw).await {
                return end;
            }
        }
    }

    /// Route one decoded inbound PDU.
    async fn handle_frame(&self, frame: Frame, raw: Bytes) -> ClientResult<()> {
        let sequence_number = frame.sequence_number();
        let command_status = frame.command_status();
        let smpp_command = frame.command_name();

        let (log_id, hook_metadata) = match &frame {
            // responses correlate by the sequence number we assigned
            Frame::BindTransceiverResp(_)
            | Frame::SubmitSmResp(_)
            | Frame::UnbindResp(_)
            | Frame::EnquireLinkResp(_)
            | Frame::GenericNack(_) => self
                .correlater
                .get(sequence_number)
                .await
                .unwrap_or_default(),
            // delivery receipts correlate by the SMSC message id
            Frame::DeliverSm(pdu) => match pdu.receipted_message_id() {
                Some(message_id) => self
                    .correlater
                    .get_by_message_id(&message_id)
                    .await
                    .unwrap_or_default(),
                None => Default::default(),
            },
            _ => Default::default(),
        };

        if command_status == 0 {
            debug!(
                event = "client.read",
                smpp_command, %log_id, sequence_number, "received PDU"
            );
        } else {
            error!(
                event = "client.read",
                smpp_command,
                %log_id,
                sequence_number,
                command_status = format_args!("{command_status:#010x}"),
                "received error response"
            );
        }

        match &frame {
            Frame::SubmitSmResp(resp) => {
                if command_status != 0 {
                    warn!(
                        event = "client.read",
                        %log_id,
                        sequence_number,
                        retryable = CommandStatus::is_retryable(command_status),
                        "submit_sm rejected by SMSC"
                    );
                }

                // submit outcomes drive the throttle window
                if CommandStatus::is_throttle(command_status) {
                    self.throttle_handler.throttled().await;
                } else {
                    self.throttle_handler.not_throttled().await;
                }

                if command_status == 0 && !resp.message_id.is_empty() {
                    // the delivery receipt will reference this id
                    self.correlater
                        .put_message_id(&resp.message_id, &log_id, &hook_metadata)
                        .await;
                }
            }
            Frame::DeliverSm(_) => {
                let reply =
                    OutboundJob::DeliverSmResp(ReplyJob::new(random_token(), sequence_number));
                if let Err(e) = self.broker.enqueue(reply).await {
                    error!(
                        event = "client.read",
                        sequence_number,
                        error = %e,
                        "could not enqueue deliver_sm_resp"
                    );
                }
            }
            Frame::EnquireLink(_) => {
                let reply =
                    OutboundJob::EnquireLinkResp(ReplyJob::new(random_token(), sequence_number));
                if let Err(e) = self.broker.enqueue(reply).await {
                    error!(
                        event = "client.read",
                        sequence_number,
                        error = %e,
                        "could not enqueue enquire_link_resp"
                    );
                }
            }
            Frame::EnquireLinkResp(_) => {
                // liveness proof for the prober
                self.pong.notify_one();
            }
            Frame::Unbind(_) => {
                let resp_log_id = random_token();
                if let Ok(bytes) = UnbindResp::new(sequence_number).to_bytes() {
                    let _ = self
                        .send_pdu("unbind_resp", &resp_log_id, "", &bytes)
                        .await;
                }
                self.call_from_smsc_hook(
                    smpp_command,
                    &log_id,
                    &hook_metadata,
                    command_status,
                    &raw,
                )
                .await;
                return Err(ClientError::PeerUnbind);
            }
            Frame::Raw { .. } => {
                warn!(
                    event = "client.read",
                    command_id = format_args!("{:#010x}", frame.command_id()),
                    sequence_number,
                    "unknown command_id, answering with generic_nack"
                );
                let nack = GenericNack::invalid_command_id(sequence_number).to_bytes()?;
                self.send_pdu("generic_nack", &random_token(), "", &nack)
                    .await?;
            }
            // nothing to do beyond logging and the hook
            Frame::BindTransceiverResp(_)
            | Frame::UnbindResp(_)
            | Frame::GenericNack(_)
            | Frame::SubmitSm(_)
            | Frame::DeliverSmResp(_)
            | Frame::BindTransceiver(_) => {}
        }

        self.call_from_smsc_hook(smpp_command, &log_id, &hook_metadata, command_status, &raw)
            .await;
        Ok(())
    }

    /// Link prober loop: periodic enquire_link, teardown when the SMSC
    /// stops answering within socket_timeout.
    async fn probe_link(&self) -> ClientError {
        let interval = self.config.enquire_link_interval();
        let socket_timeout = self.config.socket_timeout();

        loop {
            tokio::time::sleep(interval).await;
            self.correlater.sweep().await;

            let log_id = random_token();
            let sequence_number = self.next_sequence();
            let bytes = match EnquireLink::new(sequence_number).to_bytes() {
                Ok(bytes) => bytes,
                Err(e) => return ClientError::Framing(e),
            };

            self.correlater.put(sequence_number, &log_id, "").await;
            debug!(
                event = "client.enquire_link",
                %log_id, sequence_number, "probing link"
            );
            if let Err(e) = self.send_pdu("enquire_link", &log_id, "", &bytes).await {
                return e;
            }

            match timeout(socket_timeout, self.pong.notified()).await {
                Ok(()) => debug!(event = "client.enquire_link", %log_id, "link is alive"),
                Err(_) => {
                    return ClientError::LinkTimeout {
                        seconds: self.config.socket_timeout,
                    }
                }
            }
        }
    }

    // ---- teardown ---------------------------------------------------------

    /// Wind the session down: best-effort unbind, a bounded wait for
    /// unbind_resp, then close the socket.
    async fn teardown(&self, reader: &mut FrameReader, end: &ClientError) {
        self.set_state(SessionState::Unbinding);
        info!(event = "client.teardown", reason = %end, "unbinding");

        // an application unbind job already put the PDU on the wire, and
        // a peer-initiated unbind was answered with unbind_resp
        if !matches!(
            end,
            ClientError::UnbindRequested | ClientError::PeerUnbind
        ) {
            let log_id = random_token();
            let sequence_number = self.next_sequence();
            self.correlater.put(sequence_number, &log_id, "").await;
            if let Ok(bytes) = Unbind::new(sequence_number).to_bytes() {
                let _ = self.send_pdu("unbind", &log_id, "", &bytes).await;
            }
        }

        // drain until unbind_resp or the window closes
        let deadline = Instant::now() + self.config.drain_duration();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match timeout(remaining, reader.read_frame(&self.registry)).await {
                Ok(Ok(Some((Frame::UnbindResp(_), _)))) => {
                    debug!(event = "client.teardown", "unbind_resp received");
                    break;
                }
                // late responses still drain; anything else ends the wait
                Ok(Ok(Some(_))) => continue,
                Ok(Ok(None)) | Ok(Err(_)) | Err(_) => break,
            }
        }

        self.close_writer().await;
        self.set_state(SessionState::Closed);
        info!(event = "client.teardown", "connection closed");
    }

    async fn close_writer(&self) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
    }

    // ---- shared plumbing --------------------------------------------------

    fn next_sequence(&self) -> u32 {
        let sequence_number = self.sequence_generator.next_sequence();
        // protect the wire from a misbehaving custom generator
        if sequence_number == 0 || sequence_number > MAX_SEQUENCE_NUMBER {
            warn!(
                event = "client.sequence",
                sequence_number, "generator produced an out-of-range sequence number"
            );
            return (sequence_number % MAX_SEQUENCE_NUMBER).max(1);
        }
        sequence_number
    }

    /// Fire the to_smsc hook, then write the PDU under the writer lock.
    async fn send_pdu(
        &self,
        smpp_command: &str,
        log_id: &str,
        hook_metadata: &str,
        bytes: &[u8],
    ) -> ClientResult<()> {
        self.call_to_smsc_hook(smpp_command, log_id, hook_metadata, bytes)
            .await;
        self.write_pdu(bytes).await
    }

    async fn write_pdu(&self, bytes: &[u8]) -> ClientResult<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(ClientError::ConnectionClosed)?;
        timeout(self.config.socket_timeout(), writer.write_pdu(bytes))
            .await
            .map_err(|_| ClientError::Timeout {
                operation: "write",
                seconds: self.config.socket_timeout,
            })?
            .map_err(ClientError::Transport)
    }

    async fn call_to_smsc_hook(
        &self,
        smpp_command: &str,
        log_id: &str,
        hook_metadata: &str,
        pdu: &[u8],
    ) {
        let started = Instant::now();
        if let Err(e) = self
            .hook
            .to_smsc(smpp_command, log_id, hook_metadata, pdu)
            .await
        {
            error!(
                event = "client.hook",
                smpp_command, log_id, error = %e,
                "to_smsc hook failed"
            );
        }
        self.warn_on_hook_overrun("to_smsc", smpp_command, log_id, started);
    }

    async fn call_from_smsc_hook(
        &self,
        smpp_command: &str,
        log_id: &str,
        hook_metadata: &str,
        command_status: u32,
        pdu: &[u8],
    ) {
        let started = Instant::now();
        if let Err(e) = self
            .hook
            .from_smsc(smpp_command, log_id, hook_metadata, command_status, pdu)
            .await
        {
            error!(
                event = "client.hook",
                smpp_command, log_id, error = %e,
                "from_smsc hook failed"
            );
        }
        self.warn_on_hook_overrun("from_smsc", smpp_command, log_id, started);
    }

    /// Hook timeout is soft: the hook is always awaited to completion,
    /// an overrun is only logged.
    fn warn_on_hook_overrun(
        &self,
        which: &'static str,
        smpp_command: &str,
        log_id: &str,
        started: Instant,
    ) {
        let elapsed = started.elapsed();
        if elapsed > self.config.hook_timeout() {
            warn!(
                event = "client.hook",
                hook = which,
                smpp_command,
                log_id,
                elapsed = elapsed.as_secs_f64(),
                budget = self.config.hook_timeout,
                "hook overran its budget"
            );
        }
    }

    fn set_state(&self, next: SessionState) {
        let mut state = self.state.write();
        if *state != next {
            info!(event = "client.state", from = %state, to = %next, "session state change");
            *state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_ladder_doubles_and_caps() {
        assert_eq!(retry_after(1), Duration::from_millis(500));
        assert_eq!(retry_after(2), Duration::from_secs(1));
        assert_eq!(retry_after(3), Duration::from_secs(2));
        assert_eq!(retry_after(11), Duration::from_millis(500 * 1024));
        assert_eq!(retry_after(50), Duration::from_secs(16 * 60));
    }

    #[test]
    fn session_state_names_match_the_protocol() {
        assert_eq!(SessionState::BoundTrx.to_string(), "BOUND_TRX");
        assert_eq!(SessionState::OpenUnbound.to_string(), "OPEN_UNBOUND");
        assert_eq!(SessionState::Closed.to_string(), "CLOSED");
    }

    #[tokio::test]
    async fn build_submit_sm_applies_session_defaults() {
        let client = Client::new(ClientConfig::new("127.0.0.1", 2775, "sys", "pw"));
        let job = SubmitSmJob::new("L1", "Hello", "254700", "254711");

        let (sequence_number, bytes) = client.build_submit_sm(&job).unwrap();
        assert_eq!(sequence_number, 1);

        let mut cursor = std::io::Cursor::new(bytes.as_ref());
        let header = crate::codec::PduHeader::decode(&mut cursor).unwrap();
        let frame = client.registry.decode_pdu(header, &mut cursor).unwrap();
        match frame {
            Frame::SubmitSm(pdu) => {
                assert_eq!(pdu.service_type, "CMT");
                assert_eq!(pdu.esm_class, 8);
                assert_eq!(pdu.registered_delivery, 5);
                assert_eq!(pdu.data_coding, 0);
                assert_eq!(pdu.short_message.as_ref(), b"Hello");
                assert!(pdu.tlvs.is_empty());
            }
            other => panic!("expected submit_sm, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn oversized_message_moves_to_payload_tlv() {
        let client = Client::new(ClientConfig::new("127.0.0.1", 2775, "sys", "pw"));
        let long_text = "a".repeat(255);
        let job = SubmitSmJob::new("L1", long_text, "254700", "254711");

        let (_, bytes) = client.build_submit_sm(&job).unwrap();

        let mut cursor = std::io::Cursor::new(bytes.as_ref());
        let header = crate::codec::PduHeader::decode(&mut cursor).unwrap();
        let frame = client.registry.decode_pdu(header, &mut cursor).unwrap();
        match frame {
            Frame::SubmitSm(pdu) => {
                assert!(pdu.short_message.is_empty());
                assert_eq!(pdu.tlvs[0].tag, crate::datatypes::tlv::tags::MESSAGE_PAYLOAD);
                assert_eq!(pdu.tlvs[0].value.len(), 255);
            }
            other => panic!("expected submit_sm, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn boundary_254_stays_inline() {
        let client = Client::new(ClientConfig::new("127.0.0.1", 2775, "sys", "pw"));
        let job = SubmitSmJob::new("L1", "a".repeat(254), "254700", "254711");

        let (_, bytes) = client.build_submit_sm(&job).unwrap();

        let mut cursor = std::io::Cursor::new(bytes.as_ref());
        let header = crate::codec::PduHeader::decode(&mut cursor).unwrap();
        let frame = client.registry.decode_pdu(header, &mut cursor).unwrap();
        match frame {
            Frame::SubmitSm(pdu) => {
                assert_eq!(pdu.short_message.len(), 254);
                assert!(pdu.tlvs.is_empty());
            }
            other => panic!("expected submit_sm, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn strict_policy_rejects_unencodable_job() {
        let client = Client::new(ClientConfig::new("127.0.0.1", 2775, "sys", "pw"));
        let job = SubmitSmJob::new("L1", "snowman ☃", "254700", "254711");

        assert!(client.build_submit_sm(&job).is_err());
    }

    #[tokio::test]
    async fn send_message_rejects_invalid_jobs() {
        let client = Client::new(ClientConfig::new("127.0.0.1", 2775, "sys", "pw"));
        let job = SubmitSmJob::new("L1", "", "254700", "254711");

        assert!(matches!(
            client.send_message(job).await,
            Err(ClientError::Job(_))
        ));
    }
}
