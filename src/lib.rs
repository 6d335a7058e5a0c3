//! esmelink - an asynchronous SMPP v3.4 client.
//!
//! The client binds to an SMSC in transceiver mode and thereafter
//! continuously dequeues application send requests from a broker, turns
//! them into SMPP PDUs, reads whatever the SMSC sends back, keeps the
//! link alive with periodic enquire_link probes, and survives
//! disconnects, throttling and rate limits.
//!
//! # Example
//!
//! ```rust,no_run
//! use esmelink::{Client, ClientConfig, SubmitSmJob};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new("127.0.0.1", 2775, "smppclient1", "password");
//!     let client = std::sync::Arc::new(Client::new(config));
//!
//!     let runner = {
//!         let client = client.clone();
//!         tokio::spawn(async move { client.run().await })
//!     };
//!
//!     let job = SubmitSmJob::new("L1", "Hello", "254700111222", "254711000999");
//!     client.send_message(job).await?;
//!
//!     // ... later
//!     client.stop();
//!     runner.await??;
//!     Ok(())
//! }
//! ```

pub mod broker;
pub mod client;
pub mod codec;
pub mod connection;
pub mod correlater;
pub mod datatypes;
pub mod encoding;
pub mod hooks;
mod macros;
pub mod protocol;
pub mod ratelimiter;
pub mod sequence;
pub mod throttle;


pub use broker::{Broker, BrokerError, InMemoryBroker};
pub use client::{
    random_token, Client, ClientBuilder, ClientConfig, ClientError, ClientResult, SessionState,
};
pub use codec::{CodecError, Decodable, Encodable, Frame, PduHeader, PduRegistry};
pub use correlater::{Correlater, MemoryCorrelater};
pub use encoding::{CodecErrorPolicy, EncodeError, MessageEncoding};
pub use hooks::{Hook, LogHook};
pub use protocol::{JobError, JobTlv, OutboundJob, ReplyJob, SubmitSmJob, UnbindJob};
pub use ratelimiter::{RateLimiter, TokenBucket};
pub use sequence::{AtomicSequence, SequenceGenerator};
pub use throttle::{SlidingWindowThrottle, ThrottleHandler};
