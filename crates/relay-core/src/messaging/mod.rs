//! Messenger-facing abstractions: the inbound envelope and the outbound port.

pub mod port;
pub mod throttled;
pub mod types;
