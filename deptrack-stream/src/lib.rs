//! deptrack-stream: realtime notification channel with capped exponential backoff.

pub mod client;
pub mod frame;
pub mod hub;
pub mod machine;
pub mod transport;

pub use client::{ClientStatus, StreamClient, StreamConfig};
pub use frame::{parse_frame, FrameOutcome, StreamFrame};
pub use hub::{HubSubscription, LocalTransport, NotificationHub};
pub use machine::{Action, BackoffPolicy, ConnectionMachine, ConnectionState};
pub use transport::{FrameSource, HttpTransport, LineReader, Transport};
